//! Whole-word text operations used by the rewriter.

use std::borrow::Cow;

use regex::{NoExpand, Regex};

/// Normalizes line endings to `\n`.
///
/// With `unescape` set, the two-character escape sequences `\r\n` that arrive
/// in JSON-escaped payloads are normalized as well.
pub fn normalize_line_endings(source: &str, unescape: bool) -> String {
	let normalized = source.replace("\r\n", "\n");
	if unescape {
		normalized.replace("\\r\\n", "\n")
	} else {
		normalized
	}
}

fn word_pattern(word: &str) -> Option<Regex> {
	if word.is_empty() {
		return None;
	}
	Regex::new(&format!(r"\b{}\b", regex::escape(word))).ok()
}

/// Returns true when `word` occurs in `text` delimited by word boundaries.
pub fn contains_word(text: &str, word: &str) -> bool {
	word_pattern(word).is_some_and(|re| re.is_match(text))
}

/// Replaces every whole-word occurrence of `word` with `replacement`.
pub fn replace_word<'t>(text: &'t str, word: &str, replacement: &str) -> Cow<'t, str> {
	match word_pattern(word) {
		Some(re) => re.replace_all(text, NoExpand(replacement)),
		None => Cow::Borrowed(text),
	}
}
