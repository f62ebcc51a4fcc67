// AST node types for the textual program format.
//
// Every node carries a `SimpleSpan` for error reporting in later phases.
//
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

/// A parsed program: operations in program order.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub ops: Vec<OpDecl>,
    pub span: Span,
}

/// `%result = name(%operand, ...) in [loop, ...] {attr = value, ...}`
#[derive(Debug, Clone, PartialEq)]
pub struct OpDecl {
    pub result: Ident,
    pub name: Ident,
    pub operands: Vec<Ident>,
    pub loops: Vec<Ident>,
    pub attrs: Vec<AttrDecl>,
    pub span: Span,
}

/// A name with its location. Value names are stored without the `%`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// `name` (unit attribute) or `name = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrDecl {
    pub name: Ident,
    pub value: Option<AttrValue>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<AttrValue>),
}
