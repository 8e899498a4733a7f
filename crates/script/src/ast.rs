//! Syntax tree of one unit.

use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct UnitDecl {
	/// Instantiated on load.
	pub component: bool,
	pub name: String,
	pub name_span: Span,
	pub parent: Option<(String, Span)>,
	pub uses: Vec<(String, Span)>,
	pub routes: Vec<RouteDecl>,
	pub functions: Vec<FnDecl>,
}

impl UnitDecl {
	pub fn function(&self, name: &str) -> Option<&FnDecl> {
		self.functions.iter().find(|f| f.name == name)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecl {
	pub path: String,
	pub target: String,
	pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
	pub name: String,
	pub params: Vec<String>,
	pub body: Expr,
	pub span: Span,
}

/// Receiver of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
	/// Dynamic dispatch from the called instance's own type.
	SelfRef,
	/// Lookup from the parent of the type defining the calling function.
	Super,
	/// Another unit, by name.
	Unit(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
	Str(String),
	Int(i64),
	Bool(bool),
	Null,
	Param(String, Span),
	/// Left-to-right `+` over two or more terms.
	Sum(Vec<Expr>),
	Call {
		target: Target,
		method: String,
		args: Vec<Expr>,
		span: Span,
	},
}
