//! The token alphabet produced by the [`crate::tokenizer::Tokenizer`].

use crate::location::Location;
use std::fmt::Display;

/// A single lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    Tilde,
    Equals,
    Path(String),
    Float(f64),
    Integer(i64),
    Str(String),
    Bool(bool),
    Null,
    Eof,
}

impl Token {
    /// A short name used in "unexpected token" diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Token::LBrace => "'{'",
            Token::RBrace => "'}'",
            Token::LBracket => "'['",
            Token::RBracket => "']'",
            Token::Colon => "':'",
            Token::Tilde => "'~'",
            Token::Equals => "'='",
            Token::Path(_) => "PATH",
            Token::Float(_) => "FLOAT",
            Token::Integer(_) => "INTEGER",
            Token::Str(_) => "STRING",
            Token::Bool(_) => "BOOLEAN",
            Token::Null => "NULL",
            Token::Eof => "EOF",
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Path(p) => write!(f, "{p}"),
            Token::Float(v) => write!(f, "{v}"),
            Token::Integer(v) => write!(f, "{v}"),
            Token::Str(v) => write!(f, "{v:?}"),
            Token::Bool(v) => write!(f, "{}", if *v { "True" } else { "False" }),
            Token::Null => f.write_str("None"),
            other => f.write_str(other.kind_name()),
        }
    }
}

/// A token paired with the location of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub location: Location,
}
