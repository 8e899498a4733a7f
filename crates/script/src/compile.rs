//! Checks a parsed unit against its symbols and produces an [`Artifact`].
//!
//! Every name a unit uses must resolve when it is compiled: the parent and
//! each called unit must be script artifacts reachable through the symbol
//! resolver, and every call must name a method the target type has.

use std::collections::BTreeSet;
use std::sync::Arc;

use kiln_registry::{
	Artifact, CompileUnit, Compiler, Diagnostic, RouteDescriptor, Symbol, SymbolResolver, TypeInfo,
};
use rustc_hash::FxHashMap;

use crate::ast::{Expr, FnDecl, Target, UnitDecl};
use crate::parser::parse;
use crate::span::Span;

/// Compiled unit: the checked syntax tree plus its parent chain.
#[derive(Debug)]
pub struct ScriptType {
	decl: UnitDecl,
	info: Arc<TypeInfo>,
	parent: Option<Arc<ScriptType>>,
}

impl ScriptType {
	pub fn decl(&self) -> &UnitDecl {
		&self.decl
	}

	pub fn info(&self) -> &Arc<TypeInfo> {
		&self.info
	}

	pub fn parent(&self) -> Option<&Arc<ScriptType>> {
		self.parent.as_ref()
	}

	/// Finds `name` on this type or its ancestors, with the defining type.
	pub fn find_fn(&self, name: &str) -> Option<(&ScriptType, &FnDecl)> {
		let mut ty = Some(self);
		while let Some(current) = ty {
			if let Some(f) = current.decl.function(name) {
				return Some((current, f));
			}
			ty = current.parent.as_deref();
		}
		None
	}
}

/// The unit language's [`Compiler`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptCompiler;

impl ScriptCompiler {
	pub fn new() -> Self {
		Self
	}
}

/// Script type behind a resolved symbol, if it is a script artifact.
pub(crate) fn script_type(symbols: &dyn SymbolResolver, name: &str) -> Option<Arc<ScriptType>> {
	symbols.resolve(name).into_iter().find_map(|symbol| match symbol {
		Symbol::Artifact(artifact) => artifact.payload_arc::<ScriptType>(),
		Symbol::Source(_) => None,
	})
}

fn error(span: Span, message: impl Into<String>) -> Diagnostic {
	Diagnostic::error(message, span.line, span.column)
}

struct Checker<'a> {
	decl: &'a UnitDecl,
	parent: Option<&'a Arc<ScriptType>>,
	capabilities: &'a BTreeSet<String>,
	/// Called unit name to its type.
	units: FxHashMap<String, Option<Arc<ScriptType>>>,
	/// Last path segment of each `use` to the full path.
	uses: FxHashMap<&'a str, &'a str>,
	symbols: &'a dyn SymbolResolver,
	diagnostics: Vec<Diagnostic>,
}

impl Checker<'_> {
	fn unit_type(&mut self, name: &str) -> Option<Arc<ScriptType>> {
		if let Some(ty) = self.units.get(name) {
			return ty.clone();
		}
		let path = self.uses.get(name).copied().unwrap_or(name);
		let ty = script_type(self.symbols, path);
		self.units.insert(name.to_string(), ty.clone());
		ty
	}

	fn function(&mut self, f: &FnDecl) {
		self.expr(f, &f.body);
	}

	fn expr(&mut self, f: &FnDecl, expr: &Expr) {
		match expr {
			Expr::Str(_) | Expr::Int(_) | Expr::Bool(_) | Expr::Null => {}
			Expr::Param(name, span) => {
				if !f.params.contains(name) {
					self.diagnostics
						.push(error(*span, format!("unknown name `{name}` in `{}`", f.name)));
				}
			}
			Expr::Sum(terms) => {
				for term in terms {
					self.expr(f, term);
				}
			}
			Expr::Call {
				target,
				method,
				args,
				span,
			} => {
				for arg in args {
					self.expr(f, arg);
				}
				self.call(target, method, args.len(), *span);
			}
		}
	}

	fn call(&mut self, target: &Target, method: &str, arity: usize, span: Span) {
		let (owner, callee): (String, Option<usize>) = match target {
			Target::SelfRef => {
				if !self.capabilities.contains(method) {
					self.diagnostics
						.push(error(span, format!("`{}` has no method `{method}`", self.decl.name)));
					return;
				}
				let params = match self.decl.function(method) {
					Some(own) => Some(own.params.len()),
					None => self.parent.and_then(|p| p.find_fn(method)).map(|(_, f)| f.params.len()),
				};
				(self.decl.name.clone(), params)
			}
			Target::Super => {
				let Some(parent) = self.parent else {
					self.diagnostics
						.push(error(span, format!("`{}` has no parent for `super`", self.decl.name)));
					return;
				};
				let Some((_, f)) = parent.find_fn(method) else {
					self.diagnostics
						.push(error(span, format!("parent `{}` has no method `{method}`", parent.info.name)));
					return;
				};
				(parent.info.name.clone(), Some(f.params.len()))
			}
			Target::Unit(name) => {
				let Some(ty) = self.unit_type(name) else {
					self.diagnostics.push(error(span, format!("unknown unit `{name}`")));
					return;
				};
				let Some((_, f)) = ty.find_fn(method) else {
					self.diagnostics
						.push(error(span, format!("unit `{name}` has no method `{method}`")));
					return;
				};
				(name.clone(), Some(f.params.len()))
			}
		};
		if let Some(expected) = callee
			&& expected != arity
		{
			self.diagnostics.push(error(
				span,
				format!("`{owner}.{method}` takes {expected} argument(s), {arity} given"),
			));
		}
	}
}

impl Compiler for ScriptCompiler {
	fn compile(&self, unit: &CompileUnit<'_>, symbols: &dyn SymbolResolver) -> Result<Artifact, Vec<Diagnostic>> {
		let decl = parse(unit.source).map_err(|err| vec![Diagnostic::from(err)])?;
		let mut diagnostics = Vec::new();

		if decl.name != unit.physical.as_str() {
			diagnostics.push(error(
				decl.name_span,
				format!("unit declares `{}` but is compiled as `{}`", decl.name, unit.physical),
			));
		}

		let parent = match &decl.parent {
			Some((name, span)) => match script_type(symbols, name) {
				Some(ty) => Some(ty),
				None => {
					diagnostics.push(error(*span, format!("unknown parent unit `{name}`")));
					None
				}
			},
			None => None,
		};

		for (path, span) in &decl.uses {
			if symbols.resolve(path).is_empty() {
				diagnostics.push(error(*span, format!("unresolved import `{path}`")));
			}
		}

		let mut seen = BTreeSet::new();
		for f in &decl.functions {
			if !seen.insert(f.name.as_str()) {
				diagnostics.push(error(f.span, format!("duplicate function `{}`", f.name)));
			}
		}

		let mut capabilities: BTreeSet<String> = parent
			.as_ref()
			.map(|p| p.info.capabilities.clone())
			.unwrap_or_default();
		capabilities.extend(decl.functions.iter().map(|f| f.name.clone()));

		let mut routes: Vec<RouteDescriptor> = Vec::new();
		for route in &decl.routes {
			if !capabilities.contains(&route.target) {
				diagnostics.push(error(
					route.span,
					format!("route {} targets unknown method `{}`", route.path, route.target),
				));
			}
			if routes.iter().any(|r| r.path == route.path) {
				diagnostics.push(error(route.span, format!("duplicate route {}", route.path)));
			}
			routes.push(RouteDescriptor::new(route.path.clone(), route.target.clone()));
		}
		if let Some(parent) = &parent {
			let inherited = parent
				.info
				.routes
				.iter()
				.filter(|r| !routes.iter().any(|own| own.path == r.path))
				.cloned()
				.collect::<Vec<_>>();
			routes.splice(0..0, inherited);
		}

		let mut checker = Checker {
			decl: &decl,
			parent: parent.as_ref(),
			capabilities: &capabilities,
			units: FxHashMap::default(),
			uses: decl
				.uses
				.iter()
				.map(|(path, _)| (path.rsplit('.').next().unwrap_or(path), path.as_str()))
				.collect(),
			symbols,
			diagnostics: Vec::new(),
		};
		for f in &decl.functions {
			checker.function(f);
		}
		diagnostics.append(&mut checker.diagnostics);

		if !diagnostics.is_empty() {
			tracing::debug!(physical = %unit.physical, errors = diagnostics.len(), "compilation failed");
			return Err(diagnostics);
		}

		let info = Arc::new(TypeInfo {
			name: unit.physical.to_string(),
			parent: parent.as_ref().map(|p| p.info.clone()),
			capabilities,
			routes,
			component: decl.component,
		});
		let ty = Arc::new(ScriptType {
			decl,
			info: info.clone(),
			parent,
		});
		tracing::debug!(physical = %unit.physical, unit_type = %info, "compiled");
		Ok(Artifact::new(unit.physical.clone(), info, ty))
	}
}
