//! A registry wired for the console, and command execution against it.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use kiln_registry::{LinkContext, LiveRegistry, RouteTable, UnregisterStatus};
use kiln_script::StaticUnits;
use serde::Serialize;

use crate::commands::{Command, HELP};
use crate::config::ConsoleConfig;

/// What the REPL should do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
	Print(String),
	Quit,
}

pub struct Session {
	registry: LiveRegistry,
	routes: Arc<RouteTable>,
	statics: Arc<StaticUnits>,
}

fn pretty(value: &impl Serialize) -> Result<String> {
	Ok(serde_json::to_string_pretty(value)?)
}

fn read_unit(path: &Path) -> Result<String> {
	std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

impl Session {
	/// Defines static units, installs static instances and submits preloads, in that order.
	pub fn new(config: &ConsoleConfig) -> Result<Self> {
		let routes = Arc::new(RouteTable::new());
		let statics = Arc::new(StaticUnits::new());
		for path in &config.static_units {
			let info = statics
				.define(&read_unit(path)?)
				.with_context(|| format!("defining static unit from {}", path.display()))?;
			tracing::info!(unit = %info, path = %path.display(), "static unit defined");
		}

		let registry = kiln_script::registry_builder()
			.symbols(statics.clone())
			.rebinder(routes.clone())
			.config(config.registry.clone())
			.build();

		let link = LinkContext::new(registry.directory());
		for entry in &config.static_instance {
			let instance = statics
				.instantiate(&entry.unit, &link)
				.with_context(|| format!("static instance for '{}'", entry.identity))?;
			registry.install_static(&entry.identity, instance);
		}

		let session = Self {
			registry,
			routes,
			statics,
		};
		for path in &config.preload {
			let submission = session.submit(path)?;
			tracing::info!(identity = %submission.identity, physical = %submission.physical, "preloaded");
		}
		Ok(session)
	}

	pub fn registry(&self) -> &LiveRegistry {
		&self.registry
	}

	fn submit(&self, path: &Path) -> Result<kiln_registry::Submission> {
		let source = read_unit(path)?;
		self.registry
			.submit(None, &source)
			.with_context(|| format!("submitting {}", path.display()))
	}

	pub fn execute(&self, command: Command) -> Result<Outcome> {
		let output = match command {
			Command::Submit(path) => pretty(&self.submit(&path)?)?,
			Command::Unregister(identity) => match self.registry.unregister(&identity) {
				UnregisterStatus::Ok => format!("unregistered {identity}"),
				UnregisterStatus::NotFound => format!("{identity} is not registered"),
			},
			Command::Discard(physical) => {
				let removal = self.registry.discard_version(&physical)?;
				if removal.orphaned {
					format!("discarded {}; '{}' is gone", removal.physical, removal.identity)
				} else {
					format!("discarded {}", removal.physical)
				}
			}
			Command::List => {
				let mut out = pretty(&self.registry.list_units())?;
				let statics = self.statics.names();
				if !statics.is_empty() {
					out.push_str(&format!("\nstatic units: {}", statics.join(", ")));
				}
				out
			}
			Command::Source(name) => self.registry.get_source(&name)?.to_string(),
			Command::History(identity) => pretty(&self.registry.version_entries(&identity)?)?,
			Command::Dependents(identity) => pretty(&self.registry.dependents_of(&identity))?,
			Command::Call {
				identity,
				method,
				args,
			} => {
				let value = self
					.registry
					.handle(&identity)
					.invoke(&method, &args)
					.with_context(|| format!("calling {identity}.{method}"))?;
				pretty(&value)?
			}
			Command::Route { path, args } => {
				let directory = self.registry.directory();
				let value = self
					.routes
					.dispatch(&path, directory.as_ref(), &args)
					.with_context(|| format!("dispatching {path}"))?;
				pretty(&value)?
			}
			Command::Help => HELP.to_string(),
			Command::Quit => return Ok(Outcome::Quit),
		};
		Ok(Outcome::Print(output))
	}
}
