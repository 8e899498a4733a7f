//! Recursive-descent parser.
//!
//! ```text
//! file   := use* "component"? "unit" IDENT ("extends" IDENT)? "{" member* "}"
//! use    := "use" IDENT ("." IDENT)* ";"
//! member := "route" STRING "->" IDENT ";"
//!         | "fn" IDENT "(" (IDENT ("," IDENT)*)? ")" "=" expr ";"
//! expr   := term ("+" term)*
//! term   := STRING | INT | "true" | "false" | "null" | "(" expr ")"
//!         | ("self" | "super" | IDENT) "." IDENT "(" (expr ("," expr)*)? ")"
//!         | IDENT
//! ```

use kiln_registry::Diagnostic;

use crate::ast::{Expr, FnDecl, RouteDecl, Target, UnitDecl};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::span::Span;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
	pub message: String,
	pub line: usize,
	pub column: usize,
}

impl ParseError {
	fn at(span: Span, message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			line: span.line,
			column: span.column,
		}
	}
}

impl From<ParseError> for Diagnostic {
	fn from(err: ParseError) -> Self {
		Diagnostic::error(err.message, err.line, err.column)
	}
}

/// Parses one unit.
pub fn parse(source: &str) -> Result<UnitDecl, ParseError> {
	Parser::new(source).unit()
}

/// Parenthesized and argument expressions nested deeper than this are rejected.
pub const MAX_NESTING: usize = 32;

struct Parser<'src> {
	source: &'src str,
	tokens: Vec<Token>,
	pos: usize,
	/// Open `expr` productions.
	depth: usize,
}

impl<'src> Parser<'src> {
	fn new(source: &'src str) -> Self {
		Self {
			source,
			tokens: Lexer::new(source).collect(),
			pos: 0,
			depth: 0,
		}
	}

	fn peek(&self) -> Token {
		self.tokens[self.pos.min(self.tokens.len() - 1)]
	}

	fn peek_kind(&self, ahead: usize) -> TokenKind {
		self.tokens
			.get(self.pos + ahead)
			.map_or(TokenKind::Eof, |t| t.kind)
	}

	fn bump(&mut self) -> Token {
		let token = self.peek();
		if token.kind != TokenKind::Eof {
			self.pos += 1;
		}
		token
	}

	fn text(&self, token: Token) -> &'src str {
		&self.source[token.span.start..token.span.end]
	}

	fn eat(&mut self, kind: TokenKind) -> bool {
		if self.peek().kind == kind {
			self.bump();
			true
		} else {
			false
		}
	}

	fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
		let token = self.peek();
		if token.kind == kind {
			Ok(self.bump())
		} else {
			Err(self.unexpected(token, kind.describe()))
		}
	}

	fn unexpected(&self, token: Token, expected: &str) -> ParseError {
		let found = match token.kind {
			TokenKind::Ident | TokenKind::Error => format!("`{}`", self.text(token)),
			kind => kind.describe().to_string(),
		};
		ParseError::at(token.span, format!("expected {expected}, found {found}"))
	}

	fn ident(&mut self) -> Result<(String, Span), ParseError> {
		let token = self.expect(TokenKind::Ident)?;
		Ok((self.text(token).to_string(), token.span))
	}

	fn unit(&mut self) -> Result<UnitDecl, ParseError> {
		let mut uses = Vec::new();
		while self.eat(TokenKind::Use) {
			let (mut path, span) = self.ident()?;
			while self.eat(TokenKind::Dot) {
				path.push('.');
				path.push_str(&self.ident()?.0);
			}
			self.expect(TokenKind::Semi)?;
			uses.push((path, span));
		}

		let component = self.eat(TokenKind::Component);
		self.expect(TokenKind::Unit)?;
		let (name, name_span) = self.ident()?;
		let parent = if self.eat(TokenKind::Extends) {
			Some(self.ident()?)
		} else {
			None
		};
		self.expect(TokenKind::LBrace)?;

		let mut routes = Vec::new();
		let mut functions = Vec::new();
		loop {
			let token = self.peek();
			match token.kind {
				TokenKind::RBrace => {
					self.bump();
					break;
				}
				TokenKind::Route => routes.push(self.route()?),
				TokenKind::Fn => functions.push(self.function()?),
				_ => return Err(self.unexpected(token, "`route`, `fn` or `}`")),
			}
		}
		let trailing = self.peek();
		if trailing.kind != TokenKind::Eof {
			return Err(self.unexpected(trailing, "end of input"));
		}

		Ok(UnitDecl {
			component,
			name,
			name_span,
			parent,
			uses,
			routes,
			functions,
		})
	}

	fn route(&mut self) -> Result<RouteDecl, ParseError> {
		let start = self.expect(TokenKind::Route)?;
		let path = self.expect(TokenKind::StringLit)?;
		let path = unescape(self.text(path), path.span)?;
		self.expect(TokenKind::Arrow)?;
		let (target, _) = self.ident()?;
		self.expect(TokenKind::Semi)?;
		Ok(RouteDecl {
			path,
			target,
			span: start.span,
		})
	}

	fn function(&mut self) -> Result<FnDecl, ParseError> {
		self.expect(TokenKind::Fn)?;
		let (name, span) = self.ident()?;
		self.expect(TokenKind::LParen)?;
		let mut params = Vec::new();
		if !self.eat(TokenKind::RParen) {
			loop {
				params.push(self.ident()?.0);
				if self.eat(TokenKind::RParen) {
					break;
				}
				self.expect(TokenKind::Comma)?;
			}
		}
		self.expect(TokenKind::Eq)?;
		let body = self.expr()?;
		self.expect(TokenKind::Semi)?;
		Ok(FnDecl {
			name,
			params,
			body,
			span,
		})
	}

	fn expr(&mut self) -> Result<Expr, ParseError> {
		if self.depth == MAX_NESTING {
			return Err(ParseError::at(self.peek().span, "expression nested too deeply"));
		}
		self.depth += 1;
		let expr = self.sum();
		self.depth -= 1;
		expr
	}

	fn sum(&mut self) -> Result<Expr, ParseError> {
		let first = self.term()?;
		if self.peek().kind != TokenKind::Plus {
			return Ok(first);
		}
		let mut terms = vec![first];
		while self.eat(TokenKind::Plus) {
			terms.push(self.term()?);
		}
		Ok(Expr::Sum(terms))
	}

	fn term(&mut self) -> Result<Expr, ParseError> {
		let token = self.peek();
		match token.kind {
			TokenKind::StringLit => {
				self.bump();
				Ok(Expr::Str(unescape(self.text(token), token.span)?))
			}
			TokenKind::IntLit => {
				self.bump();
				self.text(token)
					.parse()
					.map(Expr::Int)
					.map_err(|_| ParseError::at(token.span, "integer literal out of range"))
			}
			TokenKind::True => {
				self.bump();
				Ok(Expr::Bool(true))
			}
			TokenKind::False => {
				self.bump();
				Ok(Expr::Bool(false))
			}
			TokenKind::Null => {
				self.bump();
				Ok(Expr::Null)
			}
			TokenKind::LParen => {
				self.bump();
				let inner = self.expr()?;
				self.expect(TokenKind::RParen)?;
				Ok(inner)
			}
			TokenKind::SelfKw => {
				self.bump();
				self.call(Target::SelfRef, token.span)
			}
			TokenKind::Super => {
				self.bump();
				self.call(Target::Super, token.span)
			}
			TokenKind::Ident if self.peek_kind(1) == TokenKind::Dot => {
				self.bump();
				self.call(Target::Unit(self.text(token).to_string()), token.span)
			}
			TokenKind::Ident => {
				self.bump();
				Ok(Expr::Param(self.text(token).to_string(), token.span))
			}
			_ => Err(self.unexpected(token, "expression")),
		}
	}

	fn call(&mut self, target: Target, span: Span) -> Result<Expr, ParseError> {
		self.expect(TokenKind::Dot)?;
		let (method, _) = self.ident()?;
		self.expect(TokenKind::LParen)?;
		let mut args = Vec::new();
		if !self.eat(TokenKind::RParen) {
			loop {
				args.push(self.expr()?);
				if self.eat(TokenKind::RParen) {
					break;
				}
				self.expect(TokenKind::Comma)?;
			}
		}
		Ok(Expr::Call {
			target,
			method,
			args,
			span,
		})
	}
}

/// Strips the quotes of a string literal and resolves its escapes.
fn unescape(literal: &str, span: Span) -> Result<String, ParseError> {
	let inner = &literal[1..literal.len() - 1];
	let mut out = String::with_capacity(inner.len());
	let mut chars = inner.chars();
	while let Some(c) = chars.next() {
		if c != '\\' {
			out.push(c);
			continue;
		}
		match chars.next() {
			Some('n') => out.push('\n'),
			Some('t') => out.push('\t'),
			Some('r') => out.push('\r'),
			Some('"') => out.push('"'),
			Some('\\') => out.push('\\'),
			other => {
				return Err(ParseError::at(
					span,
					format!("unknown escape `\\{}`", other.map(String::from).unwrap_or_default()),
				));
			}
		}
	}
	Ok(out)
}
