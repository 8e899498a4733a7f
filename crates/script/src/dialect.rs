//! Textual hooks the registry's rewriter uses on unit sources.

use kiln_registry::Dialect;
use regex::{Captures, Regex};

use crate::lexer::{Lexer, TokenKind};
use crate::span::Span;

const HEADER: &str = r"(?m)^[ \t]*(?:component[ \t]+)?unit[ \t]+";

/// [`Dialect`] for the unit language.
///
/// The unit header is matched textually and must start its line. Unit
/// mentions are identifier tokens, so string literals and comments are never
/// renamed.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptDialect;

impl ScriptDialect {
	pub fn new() -> Self {
		Self
	}
}

fn header(rest: &str) -> Option<Regex> {
	Regex::new(&format!("{HEADER}{rest}")).ok()
}

/// Identifier tokens spelling `name`.
fn identifiers<'a>(source: &'a str, name: &'a str) -> impl Iterator<Item = Span> + 'a {
	Lexer::new(source)
		.filter(move |t| t.kind == TokenKind::Ident && &source[t.span.start..t.span.end] == name)
		.map(|t| t.span)
}

impl Dialect for ScriptDialect {
	fn self_name(&self, source: &str) -> Option<String> {
		let re = header(r"([A-Za-z_][A-Za-z0-9_]*)")?;
		Some(re.captures(source)?.get(1)?.as_str().to_string())
	}

	fn declares_parent(&self, source: &str, name: &str) -> bool {
		header(&format!(r"{}\s+extends\s+[A-Za-z_]", regex::escape(name)))
			.is_some_and(|re| re.is_match(source))
	}

	fn attach_parent(&self, source: &str, name: &str, parent: &str) -> String {
		match header(&format!(r"{}\b", regex::escape(name))) {
			Some(re) => re
				.replacen(source, 1, |caps: &Captures<'_>| format!("{} extends {parent}", &caps[0]))
				.into_owned(),
			None => source.to_string(),
		}
	}

	fn mentions(&self, source: &str, name: &str) -> bool {
		identifiers(source, name).next().is_some()
	}

	fn rename(&self, source: &str, from: &str, to: &str) -> Option<String> {
		let mut renamed = String::with_capacity(source.len());
		let mut copied = 0;
		for span in identifiers(source, from) {
			renamed.push_str(&source[copied..span.start]);
			renamed.push_str(to);
			copied = span.end;
		}
		if copied == 0 {
			return None;
		}
		renamed.push_str(&source[copied..]);
		Some(renamed)
	}
}
