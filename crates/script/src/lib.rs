//! The kiln unit language.
//!
//! A small scripting language whose units can be submitted to a
//! [`LiveRegistry`](kiln_registry::LiveRegistry) at runtime:
//!
//! ```text
//! use Helper;
//! component unit Greeter extends Base {
//!     route "/greet" -> greet;
//!     fn greet(name) = "hi " + name;
//!     fn loud(name) = self.greet(name) + "!";
//!     fn helped() = Helper.help();
//! }
//! ```
//!
//! [`ScriptDialect`], [`ScriptCompiler`] and [`ScriptLoader`] plug into the
//! registry's collaborator seams; [`StaticUnits`] serves host-defined units
//! through its symbol resolver.

pub mod ast;
pub mod compile;
pub mod dialect;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod span;
pub mod static_units;

use std::sync::Arc;

use kiln_registry::{LiveRegistry, LiveRegistryBuilder};

pub use compile::{ScriptCompiler, ScriptType};
pub use dialect::ScriptDialect;
pub use parser::{MAX_NESTING, ParseError, parse};
pub use runtime::{MAX_CALL_DEPTH, MAX_EVAL_NESTING, ScriptFactory, ScriptInstance, ScriptLoader};
pub use static_units::{StaticUnitError, StaticUnits};

/// Registry builder wired to the unit language.
pub fn registry_builder() -> LiveRegistryBuilder {
	LiveRegistry::builder(
		Arc::new(ScriptDialect::new()),
		Arc::new(ScriptCompiler::new()),
		Arc::new(ScriptLoader::new()),
	)
}
