//! Kiln operator console.
//!
//! Builds a live registry over the unit language, applies the optional
//! configuration file and then reads commands from stdin, one per line.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

mod commands;
mod config;
mod session;

use commands::Command;
use config::ConsoleConfig;
use session::{Outcome, Session};

/// Console command line arguments.
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(about = "Submit and call live units")]
struct Args {
	/// Configuration file (TOML)
	#[arg(short, long, value_name = "FILE")]
	config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	let config = match &args.config {
		Some(path) => ConsoleConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
		None => ConsoleConfig::default(),
	};
	let session = Session::new(&config)?;
	info!(units = session.registry().list_units().len(), "kiln console ready");

	let stdin = std::io::stdin();
	let mut stdout = std::io::stdout();
	for line in stdin.lock().lines() {
		let line = line?;
		if line.trim().is_empty() {
			continue;
		}
		let command = match Command::parse(&line) {
			Ok(command) => command,
			Err(err) => {
				eprintln!("error: {err}");
				continue;
			}
		};
		match session.execute(command) {
			Ok(Outcome::Print(text)) => writeln!(stdout, "{text}")?,
			Ok(Outcome::Quit) => break,
			Err(err) => eprintln!("error: {err:#}"),
		}
		stdout.flush()?;
	}

	Ok(())
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::fmt::format::FmtSpan;
	use tracing_subscriber::prelude::*;

	if let Some(log_dir) = std::env::var("KILN_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let pid = std::process::id();
		let log_path = log_dir.join(format!("kiln.{pid}.log"));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
				if verbose {
					EnvFilter::new("kiln_registry=trace,kiln_script=trace,debug")
				} else {
					EnvFilter::new("kiln_registry=debug,kiln_script=debug,info")
				}
			});

			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_span_events(FmtSpan::CLOSE)
				.with_target(true);

			tracing_subscriber::registry()
				.with(filter)
				.with(file_layer)
				.init();

			tracing::info!(path = ?log_path, "console tracing initialized");
			return;
		}
	}

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		EnvFilter::new(if verbose { "debug" } else { "info" })
	});
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}
