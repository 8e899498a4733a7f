//! Minimal unit language for exercising the registry without a real compiler.
//!
//! A unit is `[passive] unit NAME [extends PARENT] { word word ... }`. Plain
//! words become methods, `route:/path=method` declares a route, a word naming
//! a known artifact is a reference that must resolve, and `!fail` makes the
//! compiler reject the unit. Every method answers with the physical name of
//! the type that was called.

use std::collections::BTreeSet;
use std::sync::Arc;

use regex::Regex;
use serde_json::{Value, json};

use crate::bridge::{
	Artifact, CompileUnit, Compiler, Diagnostic, InstanceFactory, LinkContext, Loader, Symbol, SymbolResolver,
};
use crate::component::{Component, InvokeError, TypeInfo};
use crate::dialect::Dialect;
use crate::routes::RouteDescriptor;

pub(crate) struct FixtureDialect;

impl Dialect for FixtureDialect {
	fn self_name(&self, source: &str) -> Option<String> {
		let re = Regex::new(r"\bunit\s+(\w+)").ok()?;
		Some(re.captures(source)?.get(1)?.as_str().to_string())
	}

	fn declares_parent(&self, source: &str, name: &str) -> bool {
		Regex::new(&format!(r"\bunit\s+{}\s+extends\s+\w+", regex::escape(name)))
			.is_ok_and(|re| re.is_match(source))
	}

	fn attach_parent(&self, source: &str, name: &str, parent: &str) -> String {
		let needle = format!("unit {name}");
		source.replacen(&needle, &format!("{needle} extends {parent}"), 1)
	}
}

fn artifact_type(symbols: &dyn SymbolResolver, name: &str) -> Option<Arc<TypeInfo>> {
	symbols.resolve(name).into_iter().find_map(|s| match s {
		Symbol::Artifact(a) => Some(a.type_info().clone()),
		Symbol::Source(_) => None,
	})
}

pub(crate) struct FixtureCompiler;

impl Compiler for FixtureCompiler {
	fn compile(&self, unit: &CompileUnit<'_>, symbols: &dyn SymbolResolver) -> Result<Artifact, Vec<Diagnostic>> {
		let header = Regex::new(r"(passive\s+)?unit\s+(\w+)(?:\s+extends\s+(\w+))?\s*\{([^}]*)\}")
			.map_err(|e| vec![Diagnostic::error(e.to_string(), 1, 1)])?;
		let caps = header
			.captures(unit.source)
			.ok_or_else(|| vec![Diagnostic::error("expected unit declaration", 1, 1)])?;
		if unit.source.contains("!fail") {
			return Err(vec![Diagnostic::error("forced failure", 1, 1)]);
		}

		let parent = match caps.get(3) {
			Some(p) => Some(
				artifact_type(symbols, p.as_str())
					.ok_or_else(|| vec![Diagnostic::error(format!("unknown parent {}", p.as_str()), 1, 1)])?,
			),
			None => None,
		};
		let mut capabilities: BTreeSet<String> = parent
			.as_ref()
			.map(|p| p.capabilities.clone())
			.unwrap_or_default();
		let mut routes = parent.as_ref().map(|p| p.routes.clone()).unwrap_or_default();
		for word in caps[4].split_whitespace() {
			if let Some(route) = word.strip_prefix("route:") {
				let (path, method) = route.split_once('=').unwrap_or((route, route));
				routes.push(RouteDescriptor::new(path, method));
			} else if word.chars().next().is_some_and(char::is_uppercase) {
				if artifact_type(symbols, word).is_none() {
					return Err(vec![Diagnostic::error(format!("unknown unit {word}"), 1, 1)]);
				}
			} else {
				capabilities.insert(word.to_string());
			}
		}

		let info = TypeInfo {
			name: caps[2].to_string(),
			parent,
			capabilities,
			routes,
			component: caps.get(1).is_none(),
		};
		Ok(Artifact::new(unit.physical.clone(), Arc::new(info), Arc::new(())))
	}
}

pub(crate) struct FixtureLoader;

impl Loader for FixtureLoader {
	fn load(&self, artifact: &Artifact) -> Result<Arc<dyn InstanceFactory>, String> {
		Ok(Arc::new(FixtureFactory(artifact.type_info().clone())))
	}
}

struct FixtureFactory(Arc<TypeInfo>);

impl InstanceFactory for FixtureFactory {
	fn type_info(&self) -> &Arc<TypeInfo> {
		&self.0
	}

	fn instantiate(&self, _: &LinkContext) -> Result<Arc<dyn Component>, String> {
		Ok(Arc::new(FixtureComponent(self.0.clone())))
	}
}

pub(crate) struct FixtureComponent(pub(crate) Arc<TypeInfo>);

impl Component for FixtureComponent {
	fn type_info(&self) -> &Arc<TypeInfo> {
		&self.0
	}

	fn invoke(&self, method: &str, _: &[Value]) -> Result<Value, InvokeError> {
		if self.0.has_capability(method) {
			Ok(json!(self.0.name))
		} else {
			Err(InvokeError::UnknownMethod {
				type_name: self.0.name.clone(),
				method: method.to_string(),
			})
		}
	}
}

/// Resolver knowing a fixed set of static units by source.
pub(crate) struct StaticNames(pub(crate) Vec<&'static str>);

impl SymbolResolver for StaticNames {
	fn resolve(&self, path: &str) -> Vec<Symbol> {
		if self.0.contains(&path) {
			vec![Symbol::Source(Arc::from(format!("unit {path} {{}}")))]
		} else {
			Vec::new()
		}
	}
}
