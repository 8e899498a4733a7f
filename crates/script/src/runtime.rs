//! Loading and interpreting compiled units.
//!
//! Calls on `self` dispatch from the instance's own type, `super` calls start
//! at the parent of the type that defines the running function, and calls on
//! another unit go through a [`Handle`](kiln_registry::Handle) looked up in the
//! registry directory at call time, so they always reach that unit's current
//! instance.

use std::cell::Cell;
use std::thread::LocalKey;
use std::sync::Arc;

use kiln_registry::{Artifact, Component, InstanceFactory, InvokeError, LinkContext, Loader, TypeInfo};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::ast::{Expr, FnDecl, Target};
use crate::compile::ScriptType;

/// Nested calls allowed on one thread before a call fails.
pub const MAX_CALL_DEPTH: usize = 64;

/// Nested expression evaluations allowed on one thread, across all calls.
pub const MAX_EVAL_NESTING: usize = 512;

thread_local! {
	static CALLS: Cell<usize> = const { Cell::new(0) };
	static NESTING: Cell<usize> = const { Cell::new(0) };
}

/// Holds one level of a thread-local depth counter.
struct DepthGuard(&'static LocalKey<Cell<usize>>);

impl DepthGuard {
	fn enter(counter: &'static LocalKey<Cell<usize>>, limit: usize, what: &str) -> Result<Self, InvokeError> {
		counter.with(|depth| {
			let next = depth.get() + 1;
			if next > limit {
				return Err(InvokeError::Failed(format!("{what} limit of {limit} exceeded")));
			}
			depth.set(next);
			Ok(DepthGuard(counter))
		})
	}

	fn call() -> Result<Self, InvokeError> {
		Self::enter(&CALLS, MAX_CALL_DEPTH, "call depth")
	}

	fn nesting() -> Result<Self, InvokeError> {
		Self::enter(&NESTING, MAX_EVAL_NESTING, "expression nesting")
	}
}

impl Drop for DepthGuard {
	fn drop(&mut self) {
		self.0.with(|depth| depth.set(depth.get().saturating_sub(1)));
	}
}

/// The unit language's [`Loader`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptLoader;

impl ScriptLoader {
	pub fn new() -> Self {
		Self
	}
}

impl Loader for ScriptLoader {
	fn load(&self, artifact: &Artifact) -> Result<Arc<dyn InstanceFactory>, String> {
		let ty = artifact
			.payload_arc::<ScriptType>()
			.ok_or_else(|| format!("{} was not produced by the script compiler", artifact.physical()))?;
		Ok(Arc::new(ScriptFactory { ty }))
	}
}

pub struct ScriptFactory {
	ty: Arc<ScriptType>,
}

impl ScriptFactory {
	pub fn new(ty: Arc<ScriptType>) -> Self {
		Self { ty }
	}
}

impl InstanceFactory for ScriptFactory {
	fn type_info(&self) -> &Arc<TypeInfo> {
		self.ty.info()
	}

	fn instantiate(&self, link: &LinkContext) -> Result<Arc<dyn Component>, String> {
		Ok(Arc::new(ScriptInstance {
			ty: self.ty.clone(),
			link: link.clone(),
		}))
	}
}

/// A live unit instance.
pub struct ScriptInstance {
	ty: Arc<ScriptType>,
	link: LinkContext,
}

impl ScriptInstance {
	fn call(&self, defining: &ScriptType, f: &FnDecl, args: &[Value]) -> Result<Value, InvokeError> {
		if f.params.len() != args.len() {
			return Err(InvokeError::Arity {
				method: f.name.clone(),
				expected: f.params.len(),
				got: args.len(),
			});
		}
		let _depth = DepthGuard::call()?;
		let frame = Frame {
			defining,
			params: f.params.iter().map(String::as_str).zip(args).collect(),
		};
		self.eval(&frame, &f.body)
	}

	fn eval(&self, frame: &Frame<'_>, expr: &Expr) -> Result<Value, InvokeError> {
		match expr {
			Expr::Str(s) => Ok(Value::String(s.clone())),
			Expr::Int(i) => Ok(Value::from(*i)),
			Expr::Bool(b) => Ok(Value::Bool(*b)),
			Expr::Null => Ok(Value::Null),
			Expr::Param(name, _) => frame
				.params
				.get(name.as_str())
				.map(|v| (*v).clone())
				.ok_or_else(|| InvokeError::Failed(format!("unbound name `{name}`"))),
			Expr::Sum(terms) => {
				let _nesting = DepthGuard::nesting()?;
				let mut terms = terms.iter();
				let mut total = match terms.next() {
					Some(first) => self.eval(frame, first)?,
					None => Value::Null,
				};
				for term in terms {
					total = add(total, self.eval(frame, term)?)?;
				}
				Ok(total)
			}
			Expr::Call {
				target,
				method,
				args,
				..
			} => {
				let _nesting = DepthGuard::nesting()?;
				let args = args
					.iter()
					.map(|arg| self.eval(frame, arg))
					.collect::<Result<Vec<_>, _>>()?;
				match target {
					Target::SelfRef => self.invoke(method, &args),
					Target::Super => {
						let (defining, f) = frame
							.defining
							.parent()
							.and_then(|p| p.find_fn(method))
							.ok_or_else(|| InvokeError::UnknownMethod {
								type_name: format!("super of {}", frame.defining.info().name),
								method: method.clone(),
							})?;
						self.call(defining, f, &args)
					}
					Target::Unit(name) => {
						let handle = self.link.directory().handle(name).ok_or_else(|| {
							InvokeError::NotInstalled {
								identity: name.clone(),
							}
						})?;
						let _depth = DepthGuard::call()?;
						handle.invoke(method, &args)
					}
				}
			}
		}
	}
}

struct Frame<'a> {
	/// Type whose function is running; `super` starts at its parent.
	defining: &'a ScriptType,
	params: FxHashMap<&'a str, &'a Value>,
}

/// Integer addition when both sides are integers, string concatenation otherwise.
fn add(lhs: Value, rhs: Value) -> Result<Value, InvokeError> {
	if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
		return a
			.checked_add(b)
			.map(Value::from)
			.ok_or_else(|| InvokeError::Failed(format!("integer overflow in {a} + {b}")));
	}
	if let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) {
		return Ok(Value::from(a + b));
	}
	Ok(Value::String(format!("{}{}", display(&lhs), display(&rhs))))
}

fn display(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

impl Component for ScriptInstance {
	fn type_info(&self) -> &Arc<TypeInfo> {
		self.ty.info()
	}

	fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, InvokeError> {
		let (defining, f) = self
			.ty
			.find_fn(method)
			.ok_or_else(|| InvokeError::UnknownMethod {
				type_name: self.ty.info().name.clone(),
				method: method.to_string(),
			})?;
		self.call(defining, f, args)
	}
}
