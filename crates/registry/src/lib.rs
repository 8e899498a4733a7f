//! Live unit registry.
//!
//! Operators submit replacement source for a running unit; the registry
//! rewrites it under a fresh physical name, compiles and loads it through
//! pluggable collaborators, and atomically redirects every [`Handle`] to the
//! new instance. Units that mention the reloaded unit by name are resubmitted
//! once so they pick up its new version.
//!
//! # Layout
//!
//! - [`identity`] and [`ledger`] - identities, physical versions and their chains
//! - [`graph`] - textual reference edges between units
//! - [`store`] - rewritten sources and artifacts per physical version
//! - [`rewrite`] - renaming and reference resolution of submitted source
//! - [`bridge`] - compiler, loader and symbol resolution seams
//! - [`instances`] - live instances and handles
//! - [`processor`] - install and teardown hooks
//! - [`routes`] - route rebinding seam and an in-memory route table
//! - [`live`] - the service tying it together
//!
//! The source language is opaque to this crate; a [`Dialect`] supplies the few
//! textual facts the rewriter needs.

pub mod bridge;
pub mod cascade;
pub mod component;
pub mod config;
pub mod dialect;
pub mod error;
pub mod graph;
pub mod identity;
pub mod instances;
pub mod ledger;
pub mod live;
pub mod locks;
pub mod processor;
pub mod rewrite;
pub mod routes;
pub mod store;
pub mod text;

#[cfg(test)]
mod test_fixtures;

pub use bridge::{
	Artifact, CompileUnit, Compiler, Diagnostic, InstanceFactory, LinkContext, Loader, NoSymbols, Severity, Symbol,
	SymbolResolver,
};
pub use cascade::CascadeReport;
pub use component::{Component, Directory, InvokeError, TypeInfo};
pub use config::RegistryConfig;
pub use dialect::Dialect;
pub use error::RegistryError;
pub use identity::{Generation, Identity, PhysicalVersion};
pub use instances::{Handle, InstanceRegistry, Installed};
pub use ledger::{Removal, VersionEntry, VersionLedger, VersionState};
pub use live::{LiveRegistry, LiveRegistryBuilder, SubmitStatus, Submission, UnitSummary, UnregisterStatus};
pub use processor::{InstanceProcessor, ProcessorChain};
pub use routes::{NoRoutes, Rebinder, RouteDescriptor, RouteError, RouteTable};
pub use serde_json::Value;
