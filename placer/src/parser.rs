// Parser for the textual program format.
//
// Parses a token stream (from the lexer) into an AST. Uses chumsky
// combinators. Grammar:
//
//   program   := NEWLINE* (op (NEWLINE+ op)*)? NEWLINE*
//   op        := VALUE '=' IDENT '(' (VALUE (',' VALUE)*)? ')' nest? attrs?
//   nest      := 'in' '[' (IDENT (',' IDENT)*)? ']'
//   attrs     := '{' (attr (',' attr)* ','?)? '}'
//   attr      := IDENT ('=' value)?
//   value     := INT | FLOAT | STRING | 'true' | 'false' | '[' (value (',' value)*)? ']'
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub program: Option<Program>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse a program source string. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = program_parser(source);
    let (program, parse_errors) = parser.parse(stream).into_output_errors();

    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        program,
        errors: all_errors,
    }
}

// All rules are built inside `program_parser` so the `source` reference is
// captured once and shared by every combinator that slices identifier text.

fn program_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Program, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    // `%name`, stored without the sigil.
    let value_name = just(Token::Value).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start() + 1..span.end()].to_string(),
            span,
        }
    });

    // ── Attribute values ──

    let attr_value = recursive(|value| {
        let array = value
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(AttrValue::Array);

        select! {
            Token::Int(n) => AttrValue::Int(n),
            Token::Float(x) => AttrValue::Float(x),
            Token::StringLit(s) => AttrValue::Str(s),
            Token::True => AttrValue::Bool(true),
            Token::False => AttrValue::Bool(false),
        }
        .or(array)
    });

    let attr = ident
        .clone()
        .then(just(Token::Equals).ignore_then(attr_value).or_not())
        .map_with(|(name, value), e| AttrDecl {
            name,
            value,
            span: e.span(),
        });

    let attrs = attr
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LBrace), just(Token::RBrace))
        .or_not()
        .map(Option::unwrap_or_default);

    // ── Loop nest ──

    let nest = just(Token::In)
        .ignore_then(
            ident
                .clone()
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBracket), just(Token::RBracket)),
        )
        .or_not()
        .map(Option::unwrap_or_default);

    // ── Operation ──

    let operands = value_name
        .clone()
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let op = value_name
        .then_ignore(just(Token::Equals))
        .then(ident)
        .then(operands)
        .then(nest)
        .then(attrs)
        .map_with(|((((result, name), operands), loops), attrs), e| OpDecl {
            result,
            name,
            operands,
            loops,
            attrs,
            span: e.span(),
        });

    let newlines = just(Token::Newline).repeated();

    newlines
        .ignore_then(
            op.separated_by(just(Token::Newline).repeated().at_least(1))
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .map_with(|ops, e| Program {
            ops,
            span: e.span(),
        })
}

// ── Tests ───────────────────────────────────────────────────────────────────
