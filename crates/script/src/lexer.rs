//! Tokens of the unit language.

use logos::Logos;

use crate::span::{LineIndex, Span};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n]+|#[^\n]*")]
pub enum TokenKind {
	#[token("component")]
	Component,
	#[token("unit")]
	Unit,
	#[token("extends")]
	Extends,
	#[token("use")]
	Use,
	#[token("route")]
	Route,
	#[token("fn")]
	Fn,
	#[token("self")]
	SelfKw,
	#[token("super")]
	Super,
	#[token("true")]
	True,
	#[token("false")]
	False,
	#[token("null")]
	Null,

	#[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
	Ident,
	#[regex(r"[0-9]+")]
	IntLit,
	#[regex(r#""([^"\\]|\\.)*""#)]
	StringLit,

	#[token("{")]
	LBrace,
	#[token("}")]
	RBrace,
	#[token("(")]
	LParen,
	#[token(")")]
	RParen,
	#[token(",")]
	Comma,
	#[token(";")]
	Semi,
	#[token(".")]
	Dot,
	#[token("=")]
	Eq,
	#[token("+")]
	Plus,
	#[token("->")]
	Arrow,

	Error,
	Eof,
}

impl TokenKind {
	pub fn describe(self) -> &'static str {
		match self {
			Self::Component => "`component`",
			Self::Unit => "`unit`",
			Self::Extends => "`extends`",
			Self::Use => "`use`",
			Self::Route => "`route`",
			Self::Fn => "`fn`",
			Self::SelfKw => "`self`",
			Self::Super => "`super`",
			Self::True => "`true`",
			Self::False => "`false`",
			Self::Null => "`null`",
			Self::Ident => "identifier",
			Self::IntLit => "integer",
			Self::StringLit => "string",
			Self::LBrace => "`{`",
			Self::RBrace => "`}`",
			Self::LParen => "`(`",
			Self::RParen => "`)`",
			Self::Comma => "`,`",
			Self::Semi => "`;`",
			Self::Dot => "`.`",
			Self::Eq => "`=`",
			Self::Plus => "`+`",
			Self::Arrow => "`->`",
			Self::Error => "invalid token",
			Self::Eof => "end of input",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
	pub kind: TokenKind,
	pub span: Span,
}

/// Token stream ending in exactly one [`TokenKind::Eof`].
pub struct Lexer<'src> {
	inner: logos::Lexer<'src, TokenKind>,
	source: &'src str,
	line_index: LineIndex,
	finished: bool,
}

impl<'src> Lexer<'src> {
	pub fn new(source: &'src str) -> Self {
		Self {
			inner: TokenKind::lexer(source),
			source,
			line_index: LineIndex::new(source),
			finished: false,
		}
	}

	fn span(&self, start: usize, end: usize) -> Span {
		let (line, column) = self.line_index.line_col(start);
		Span::new(start, end, line, column)
	}
}

impl Iterator for Lexer<'_> {
	type Item = Token;

	fn next(&mut self) -> Option<Token> {
		if self.finished {
			return None;
		}
		let (kind, range) = match self.inner.next() {
			Some(Ok(kind)) => (kind, self.inner.span()),
			Some(Err(())) => (TokenKind::Error, self.inner.span()),
			None => {
				self.finished = true;
				(TokenKind::Eof, self.source.len()..self.source.len())
			}
		};
		Some(Token {
			kind,
			span: self.span(range.start, range.end),
		})
	}
}
