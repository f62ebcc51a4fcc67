// resolve.rs — Build a `Program` arena from a parsed AST
//
// Interns loop names, resolves `%value` operands to operation handles and
// converts attribute literals. After construction the program is verified
// and every violated obligation is reported with the span of the offending
// operation.
//
// Preconditions: `ast` is a well-formed AST from the parser.
// Postconditions: returns the built program plus all accumulated diagnostics;
//                 a span is recorded for every operation that was built.
// Failure modes: unknown, duplicate or forward-referenced values and
//                structural violations produce `Diagnostic` entries.
//                Construction continues past errors.
// Side effects: none.

use std::collections::HashMap;

use chumsky::error::Rich;
use chumsky::span::{SimpleSpan, Span as _};
use thiserror::Error;

use crate::ast::{self, AttrValue, Span};
use crate::diag::{codes, Diagnostic};
use crate::id::OpId;
use crate::ir::{Attribute, OpSpec, Program};
use crate::lexer::Token;
use crate::verify::verify_diagnostics;

// ── Public types ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct BuildResult {
    pub program: Program,
    /// Source span of each operation built from the AST.
    pub spans: HashMap<OpId, Span>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Failure to turn source text into a well-formed program.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{} syntax error(s)", .0.len())]
    Parse(Vec<Rich<'static, Token, SimpleSpan>>),
    #[error("{} error(s) in program", .0.iter().filter(|d| d.is_error()).count())]
    Build(Vec<Diagnostic>),
}

// ── Public entry points ─────────────────────────────────────────────────────

pub fn build_program(program: &ast::Program) -> BuildResult {
    let mut builder = ProgramBuilder::default();
    for decl in &program.ops {
        builder.build_op(program, decl);
    }
    builder.check_structure();
    BuildResult {
        program: builder.program,
        spans: builder.spans,
        diagnostics: builder.diagnostics,
    }
}

/// Parse and build `source`, failing on any error-level diagnostic.
pub fn load_program(source: &str) -> Result<Program, LoadError> {
    let parsed = crate::parser::parse(source);
    if !parsed.errors.is_empty() {
        return Err(LoadError::Parse(parsed.errors));
    }
    let Some(ast) = parsed.program else {
        return Err(LoadError::Parse(Vec::new()));
    };
    let built = build_program(&ast);
    if built.has_errors() {
        return Err(LoadError::Build(built.diagnostics));
    }
    Ok(built.program)
}

// ── Builder ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ProgramBuilder {
    program: Program,
    spans: HashMap<OpId, Span>,
    diagnostics: Vec<Diagnostic>,
}

impl ProgramBuilder {
    fn build_op(&mut self, ast: &ast::Program, decl: &ast::OpDecl) {
        let mut operands = Vec::with_capacity(decl.operands.len());
        for operand in &decl.operands {
            match self.program.value(&operand.name) {
                Some(id) => operands.push(id),
                None => self.report_missing(ast, operand),
            }
        }

        let nest = decl
            .loops
            .iter()
            .map(|l| self.program.intern_loop(&l.name))
            .collect();

        let mut spec = OpSpec::new(decl.name.name.clone())
            .result(decl.result.name.clone())
            .operands(operands);
        for attr in &decl.attrs {
            let value = attr.value.as_ref().map_or(Attribute::Unit, convert_attr);
            spec.attrs.insert(attr.name.name.clone(), value);
        }

        if let Some(previous) = self.program.value(&decl.result.name) {
            let mut diag = Diagnostic::error(
                decl.result.span,
                format!("value %{} is already defined", decl.result.name),
            )
            .with_code(codes::E0102);
            if let Some(&span) = self.spans.get(&previous) {
                diag = diag.with_related(span, "first definition here");
            }
            self.diagnostics.push(diag);
            return;
        }

        match self.program.push(spec, nest) {
            Ok(id) => {
                self.spans.insert(id, decl.span);
            }
            Err(err) => self
                .diagnostics
                .push(Diagnostic::error(decl.span, err.to_string())),
        }
    }

    fn report_missing(&mut self, ast: &ast::Program, operand: &ast::Ident) {
        let later = ast
            .ops
            .iter()
            .find(|op| op.result.name == operand.name && op.span.start() > operand.span.start());
        let diag = match later {
            Some(def) => Diagnostic::error(
                operand.span,
                format!("value %{} is used before its definition", operand.name),
            )
            .with_code(codes::E0103)
            .with_related(def.result.span, "defined here")
            .with_hint("operations must appear after the values they read"),
            None => Diagnostic::error(operand.span, format!("unknown value %{}", operand.name))
                .with_code(codes::E0101),
        };
        self.diagnostics.push(diag);
    }

    fn check_structure(&mut self) {
        let violations = verify_diagnostics(&self.program, &self.spans);
        self.diagnostics.extend(violations);
    }
}

fn convert_attr(value: &AttrValue) -> Attribute {
    match value {
        AttrValue::Bool(b) => Attribute::Bool(*b),
        AttrValue::Int(n) => Attribute::Int(*n),
        AttrValue::Float(x) => Attribute::Float(*x),
        AttrValue::Str(s) => Attribute::Str(s.clone()),
        AttrValue::Array(items) => Attribute::Array(items.iter().map(convert_attr).collect()),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
