//! Byte spans with line/column positions.

/// Line start offsets of a source text.
#[derive(Debug, Clone)]
pub struct LineIndex {
	/// `line_starts[0] == 0`.
	line_starts: Vec<usize>,
}

impl LineIndex {
	pub fn new(source: &str) -> Self {
		let mut line_starts = vec![0];
		line_starts.extend(source.match_indices('\n').map(|(offset, _)| offset + 1));
		Self { line_starts }
	}

	/// 1-based line and column of a byte offset.
	pub fn line_col(&self, offset: usize) -> (usize, usize) {
		let line_idx = match self.line_starts.binary_search(&offset) {
			Ok(idx) => idx,
			Err(idx) => idx.saturating_sub(1),
		};
		(line_idx + 1, offset - self.line_starts[line_idx] + 1)
	}
}

/// A region of source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
	pub start: usize,
	pub end: usize,
	pub line: usize,
	pub column: usize,
}

impl Span {
	pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
		Self {
			start,
			end,
			line,
			column,
		}
	}
}
