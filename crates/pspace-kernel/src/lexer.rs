//! Lexer for value expressions (`DATAFILE_VALUES`, `CMD_*_VALUES`).
//!
//! Converts expression text into tokens using the logos lexer generator.
//!
//! # Token Categories
//!
//! - **Operators**: `+`, `-`, `*`, `/`, `//`, `%`, `**`
//! - **Punctuation**: `(`, `)`, `,`
//! - **Literals**: integers and floats (`3`, `2.5`, `1e-6`, `.5`)
//! - **Identifiers**: parameter names, derived fields, function names

use logos::{Logos, Span};
use std::fmt;

/// A token with its span in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(token: T, span: Span) -> Self {
        Self { token, span }
    }
}

/// Lexer error types.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LexerError {
    #[default]
    UnexpectedCharacter,
    InvalidNumber(String),
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexerError::UnexpectedCharacter => write!(f, "unexpected character"),
            LexerError::InvalidNumber(s) => write!(f, "invalid number: {}", s),
        }
    }
}

/// Tokens of the expression language.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexerError)]
#[logos(skip r"[ \t]+")]
pub enum Token {
    #[token("**")]
    DoubleStar,

    #[token("*")]
    Star,

    #[token("//")]
    DoubleSlash,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(",")]
    Comma,

    /// Integer literal - value is the parsed i64
    #[regex(r"[0-9]+", lex_int)]
    Int(i64),

    /// Float literal - value is the parsed f64
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", lex_float)]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", lex_float)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", lex_float)]
    Float(f64),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

/// Lex an integer literal.
fn lex_int(lex: &mut logos::Lexer<Token>) -> Result<i64, LexerError> {
    lex.slice()
        .parse()
        .map_err(|_| LexerError::InvalidNumber(lex.slice().to_string()))
}

/// Lex a float literal.
fn lex_float(lex: &mut logos::Lexer<Token>) -> Result<f64, LexerError> {
    lex.slice()
        .parse()
        .map_err(|_| LexerError::InvalidNumber(lex.slice().to_string()))
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::DoubleStar => write!(f, "**"),
            Token::Star => write!(f, "*"),
            Token::DoubleSlash => write!(f, "//"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Int(n) => write!(f, "{}", n),
            Token::Float(x) => write!(f, "{}", x),
            Token::Ident(s) => write!(f, "{}", s),
        }
    }
}

/// Tokenize an expression. Stops at the first error.
pub fn tokenize(source: &str) -> Result<Vec<Spanned<Token>>, Spanned<LexerError>> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push(Spanned::new(token, span)),
            Err(err) => return Err(Spanned::new(err, span)),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        tokenize(source)
            .expect("lexing should succeed")
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn operators() {
        assert_eq!(
            lex("+ - * / // % **"),
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::DoubleSlash,
                Token::Percent,
                Token::DoubleStar,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(lex("42"), vec![Token::Int(42)]);
        assert_eq!(lex("2.5"), vec![Token::Float(2.5)]);
        assert_eq!(lex("1e-6"), vec![Token::Float(1e-6)]);
        assert_eq!(lex("1."), vec![Token::Float(1.0)]);
        assert_eq!(lex(".5"), vec![Token::Float(0.5)]);
    }

    #[test]
    fn identifiers_and_calls() {
        assert_eq!(
            lex("round(J*10)"),
            vec![
                Token::Ident("round".into()),
                Token::LParen,
                Token::Ident("J".into()),
                Token::Star,
                Token::Int(10),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn spans_point_into_source() {
        let tokens = tokenize("J + 10").expect("lexing should succeed");
        assert_eq!(tokens[0].span, 0..1);
        assert_eq!(tokens[2].span, 4..6);
    }

    #[test]
    fn unexpected_character() {
        let err = tokenize("J $ 2").expect_err("should fail");
        assert_eq!(err.token, LexerError::UnexpectedCharacter);
        assert_eq!(err.span, 2..3);
    }

    #[test]
    fn integer_overflow_is_invalid_number() {
        let err = tokenize("99999999999999999999").expect_err("should fail");
        assert!(matches!(err.token, LexerError::InvalidNumber(_)));
    }
}
