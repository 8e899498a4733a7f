//! Console command line parsing.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

pub const HELP: &str = "\
commands:
  submit FILE                  compile and install the unit in FILE
  unregister ID                remove a unit and all of its versions
  discard VERSION              remove one physical version
  list                         show every known unit
  source NAME                  print the source of a unit or version
  history ID                   show the version chain of a unit
  dependents ID                show units referring to ID
  call ID METHOD [JSON-ARGS]   invoke a method through the unit's handle
  route PATH [JSON-ARGS]       dispatch a bound route
  help                         show this text
  quit                         leave the console";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
	Submit(PathBuf),
	Unregister(String),
	Discard(String),
	List,
	Source(String),
	History(String),
	Dependents(String),
	Call {
		identity: String,
		method: String,
		args: Vec<Value>,
	},
	Route {
		path: String,
		args: Vec<Value>,
	},
	Help,
	Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
	#[error("unknown command `{0}`; try `help`")]
	Unknown(String),

	#[error("`{command}` needs {argument}")]
	MissingArgument {
		command: &'static str,
		argument: &'static str,
	},

	#[error("`{0}` takes no further arguments")]
	TrailingInput(&'static str),

	#[error("invalid JSON arguments: {0}")]
	Args(String),
}

/// Splits off the first whitespace-delimited word.
fn word(input: &str) -> Option<(&str, &str)> {
	let input = input.trim_start();
	if input.is_empty() {
		return None;
	}
	match input.find(char::is_whitespace) {
		Some(end) => Some((&input[..end], input[end..].trim_start())),
		None => Some((input, "")),
	}
}

/// Parses the argument tail: nothing, a JSON array, or a single JSON value.
fn json_args(input: &str) -> Result<Vec<Value>, CommandError> {
	let input = input.trim();
	if input.is_empty() {
		return Ok(Vec::new());
	}
	match serde_json::from_str::<Value>(input).map_err(|e| CommandError::Args(e.to_string()))? {
		Value::Array(values) => Ok(values),
		value => Ok(vec![value]),
	}
}

impl Command {
	/// Parses one console line. A blank line asks for help.
	pub fn parse(line: &str) -> Result<Self, CommandError> {
		let Some((name, rest)) = word(line) else {
			return Ok(Self::Help);
		};

		let single = |command: &'static str, argument: &'static str| {
			let (arg, tail) = word(rest).ok_or(CommandError::MissingArgument { command, argument })?;
			if !tail.is_empty() {
				return Err(CommandError::TrailingInput(command));
			}
			Ok(arg.to_string())
		};
		let bare = |command: &'static str, parsed: Self| {
			if rest.is_empty() {
				Ok(parsed)
			} else {
				Err(CommandError::TrailingInput(command))
			}
		};

		match name {
			"submit" => {
				let path = rest.trim();
				if path.is_empty() {
					return Err(CommandError::MissingArgument {
						command: "submit",
						argument: "a file",
					});
				}
				Ok(Self::Submit(PathBuf::from(path)))
			}
			"unregister" => single("unregister", "an identity").map(Self::Unregister),
			"discard" => single("discard", "a version").map(Self::Discard),
			"source" => single("source", "a name").map(Self::Source),
			"history" => single("history", "an identity").map(Self::History),
			"dependents" => single("dependents", "an identity").map(Self::Dependents),
			"list" => bare("list", Self::List),
			"help" => bare("help", Self::Help),
			"quit" | "exit" => bare("quit", Self::Quit),
			"call" => {
				let missing = |argument| CommandError::MissingArgument {
					command: "call",
					argument,
				};
				let (identity, rest) = word(rest).ok_or_else(|| missing("an identity"))?;
				let (method, rest) = word(rest).ok_or_else(|| missing("a method"))?;
				Ok(Self::Call {
					identity: identity.to_string(),
					method: method.to_string(),
					args: json_args(rest)?,
				})
			}
			"route" => {
				let (path, rest) = word(rest).ok_or(CommandError::MissingArgument {
					command: "route",
					argument: "a path",
				})?;
				Ok(Self::Route {
					path: path.to_string(),
					args: json_args(rest)?,
				})
			}
			other => Err(CommandError::Unknown(other.to_string())),
		}
	}
}
