//! Source-language hooks the rewriter needs.
//!
//! The registry never parses submitted source. Everything it must know about
//! the language (the unit's declared name, whether it already names a parent
//! and how to attach one) goes through a [`Dialect`].
//!
//! Mentions of other units default to whole-word matching on the raw text. A
//! dialect that can tokenize its source should override [`Dialect::mentions`]
//! and [`Dialect::rename`] so string literals and comments are left alone.

use std::borrow::Cow;

use crate::text::{contains_word, replace_word};

/// Textual knowledge of one source language.
pub trait Dialect: Send + Sync {
	/// Name the source declares for itself, if any.
	fn self_name(&self, source: &str) -> Option<String>;

	/// Whether the unit declared as `name` already names a parent.
	fn declares_parent(&self, source: &str, name: &str) -> bool;

	/// Returns `source` with `parent` attached as the parent of unit `name`.
	fn attach_parent(&self, source: &str, name: &str, parent: &str) -> String;

	/// Whether `source` mentions the unit `name`.
	fn mentions(&self, source: &str, name: &str) -> bool {
		contains_word(source, name)
	}

	/// Returns `source` with every mention of unit `from` replaced by `to`, or
	/// `None` when there is no mention.
	fn rename(&self, source: &str, from: &str, to: &str) -> Option<String> {
		match replace_word(source, from, to) {
			Cow::Owned(renamed) => Some(renamed),
			Cow::Borrowed(_) => None,
		}
	}
}
