// Lexer for the textual loop-nest program format.
//
// Uses the `logos` crate for DFA-based lexing. Newlines are significant:
// every operation occupies one line.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Token types.
///
/// Identifiers and value names carry no payload; use the span to retrieve
/// the text from the source.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+|#[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("in")]
    In,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // ── Symbols ──
    #[token("=")]
    Equals,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    // ── Literals ──
    //
    // The float regex requires a fraction or an exponent so that plain
    // integers lex as `Int`.
    #[regex(r"-?[0-9]+(\.[0-9]+([eE][+-]?[0-9]+)?|[eE][+-]?[0-9]+)", parse_float)]
    Float(f64),

    #[regex(r"-?[0-9]+", parse_int)]
    Int(i64),

    /// String literal with `\"` and `\\` escapes.
    #[regex(r#""([^"\\\n]|\\.)*""#, parse_string)]
    StringLit(String),

    // ── Names ──
    /// Value name: `%` followed by one or more name characters.
    #[regex(r"%[a-zA-Z0-9_.]+")]
    Value,

    /// Identifier: `[a-zA-Z_][a-zA-Z0-9_.]*`
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_.]*")]
    Ident,

    // ── Structure ──
    /// One or more newlines (operation terminator).
    #[regex(r"\n+")]
    Newline,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::In => write!(f, "in"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Equals => write!(f, "="),
            Token::Comma => write!(f, ","),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Float(v) => write!(f, "{v:?}"),
            Token::Int(v) => write!(f, "{v}"),
            Token::StringLit(s) => write!(f, "\"{s}\""),
            Token::Value => write!(f, "<value>"),
            Token::Ident => write!(f, "<ident>"),
            Token::Newline => write!(f, "<newline>"),
        }
    }
}

// ── Callbacks ──

fn parse_float(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<i64> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                '"' => result.push('"'),
                '\\' => result.push('\\'),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

// ── Public API ──

/// Lex a program source string into tokens.
///
/// Lexing is non-fatal: errors are collected and the lexer continues past
/// bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn operation_line() {
        let tokens = lex_ok("%b = mul(%a, %a) in [i]");
        assert_eq!(
            tokens,
            vec![
                Token::Value,
                Token::Equals,
                Token::Ident,
                Token::LParen,
                Token::Value,
                Token::Comma,
                Token::Value,
                Token::RParen,
                Token::In,
                Token::LBracket,
                Token::Ident,
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn keyword_vs_ident() {
        assert_eq!(lex_ok("in inner"), vec![Token::In, Token::Ident]);
        assert_eq!(lex_ok("true trueish"), vec![Token::True, Token::Ident]);
    }

    #[test]
    fn numbers() {
        assert_eq!(
            lex_ok("4 -2 0.5 1e3 -2.5e-1"),
            vec![
                Token::Int(4),
                Token::Int(-2),
                Token::Float(0.5),
                Token::Float(1000.0),
                Token::Float(-0.25),
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            lex_ok(r#""a\"b\\c""#),
            vec![Token::StringLit(r#"a"b\c"#.into())]
        );
    }

    #[test]
    fn comments_and_newlines() {
        let tokens = lex_ok("# header\n\n%a = load()  # trailing\n");
        assert_eq!(
            tokens,
            vec![
                Token::Newline,
                Token::Value,
                Token::Equals,
                Token::Ident,
                Token::LParen,
                Token::RParen,
                Token::Newline,
            ]
        );
    }

    #[test]
    fn value_spans() {
        let result = lex("%acc.0 = x()");
        assert_eq!(result.tokens[0], (Token::Value, Span { start: 0, end: 6 }));
    }

    #[test]
    fn bad_character_is_reported() {
        let result = lex("%a = f() ; ");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains(';'));
    }
}
