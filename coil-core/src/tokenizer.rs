//! Lazy tokenizer: turns a line-producing [`LineSource`] into a stream of
//! [`Token`]s with a single slot of pushback.
//!
//! Single-threaded and stateful. `line()`/`column()` always reflect the
//! start of the most recently produced token.

use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CoilError, Result};
use crate::location::Location;
use crate::source::LineSource;
use crate::token::{Spanned, Token};

const KEY: &str = r"-?[A-Za-z_][A-Za-z0-9_-]*";

fn path_pattern() -> String {
    format!(r"^(?:@|\.+)?{key}(?:\.{key})*", key = KEY)
}

static KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(&format!("^{KEY}$")).unwrap());
static PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(&path_pattern()).unwrap());
static FLOAT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+\.[0-9]+").unwrap());
static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+").unwrap());
static BOOLEAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:True|False|None)").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:#[^\n]*|\s+)").unwrap());

/// Returns true if `s` is a valid coil identifier (see grammar in `§3.3`).
pub fn is_valid_key(s: &str) -> bool {
    KEY_RE.is_match(s)
}

pub(crate) struct Tokenizer<'a> {
    source: &'a mut dyn LineSource,
    path: Option<Rc<str>>,
    buffer: String,
    line: u32,
    column: u32,
    pushback: Option<Spanned>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a mut dyn LineSource, path: Option<Rc<str>>) -> Self {
        Tokenizer {
            source,
            path,
            buffer: String::new(),
            line: 0,
            column: 1,
            pushback: None,
        }
    }

    fn here(&self) -> Location {
        Location::new(self.path.clone(), self.line.max(1), self.column)
    }

    fn pull_line(&mut self) -> bool {
        match self.source.next_line() {
            Some(mut line) => {
                if !line.ends_with('\n') {
                    line.push('\n');
                }
                self.buffer = line;
                self.line += 1;
                self.column = 1;
                true
            }
            None => false,
        }
    }

    fn advance(&mut self, n: usize) {
        self.buffer.drain(..n);
        self.column += n as u32;
    }

    /// Peek at the next token without consuming it.
    pub fn peek(&mut self) -> Result<Spanned> {
        let tok = self.next_token()?;
        self.pushback = Some(tok.clone());
        Ok(tok)
    }

    /// Push a single token back; only valid when nothing is already pending.
    pub fn push_back(&mut self, token: Spanned) {
        debug_assert!(self.pushback.is_none(), "tokenizer only supports one pushback slot");
        self.pushback = Some(token);
    }

    /// Read the next token, requiring it to be one of `expected` if given.
    pub fn next(&mut self, expected: &[&str]) -> Result<Spanned> {
        let tok = self.next_token()?;
        if !expected.is_empty() && !expected.contains(&tok.token.kind_name()) {
            return Err(CoilError::syntax(
                tok.location.clone(),
                format!(
                    "unexpected {}, looking for {}",
                    tok.token.kind_name(),
                    expected.join(" ")
                ),
            ));
        }
        Ok(tok)
    }

    fn next_token(&mut self) -> Result<Spanned> {
        if let Some(tok) = self.pushback.take() {
            return Ok(tok);
        }

        loop {
            if self.buffer.is_empty() {
                if !self.pull_line() {
                    return Ok(Spanned {
                        token: Token::Eof,
                        location: self.here(),
                    });
                }
            }

            if let Some(m) = WHITESPACE_RE.find(&self.buffer) {
                self.advance(m.end());
                continue;
            }
            break;
        }

        let loc = self.here();

        for (ch, tok) in [
            ('{', Token::LBrace),
            ('}', Token::RBrace),
            ('[', Token::LBracket),
            (']', Token::RBracket),
            (':', Token::Colon),
            ('~', Token::Tilde),
            ('=', Token::Equals),
        ] {
            if self.buffer.starts_with(ch) {
                self.advance(1);
                return Ok(Spanned { token: tok, location: loc });
            }
        }

        if let Some(m) = FLOAT_RE.find(&self.buffer) {
            let text = m.as_str().to_owned();
            self.advance(m.end());
            let value: f64 = text.parse().map_err(|_| {
                CoilError::lexical(loc.clone(), format!("invalid float literal: {text}"))
            })?;
            return Ok(Spanned { token: Token::Float(value), location: loc });
        }

        if let Some(m) = INTEGER_RE.find(&self.buffer) {
            let text = m.as_str().to_owned();
            self.advance(m.end());
            let value: i64 = text.parse().map_err(|_| {
                CoilError::lexical(loc.clone(), format!("invalid integer literal: {text}"))
            })?;
            return Ok(Spanned { token: Token::Integer(value), location: loc });
        }

        if let Some(m) = BOOLEAN_RE.find(&self.buffer) {
            let text = m.as_str();
            self.advance(m.end());
            let token = if text == "None" {
                Token::Null
            } else {
                Token::Bool(text == "True")
            };
            return Ok(Spanned { token, location: loc });
        }

        if let Some(m) = PATH_RE.find(&self.buffer) {
            let text = m.as_str().to_owned();
            self.advance(m.end());
            return Ok(Spanned { token: Token::Path(text), location: loc });
        }

        if self.buffer.starts_with('\'') || self.buffer.starts_with('"') {
            return self.parse_string(loc);
        }

        Err(CoilError::lexical(
            loc,
            format!("unrecognized input: {}", self.buffer.trim_end()),
        ))
    }

    fn parse_string(&mut self, loc: Location) -> Result<Spanned> {
        let quote = self.buffer.chars().next().unwrap();
        let triple = self.buffer.starts_with(&format!("{quote}{quote}{quote}"));
        let quote_len = if triple { 3 } else { 1 };
        self.advance(quote_len);

        let mut raw = String::new();
        loop {
            if self.buffer.is_empty() {
                if !self.pull_line() {
                    return Err(CoilError::syntax(loc, "unterminated string"));
                }
            }

            let mut chars = self.buffer.char_indices().peekable();
            let mut consumed = 0usize;
            let mut terminated = false;

            while let Some((idx, c)) = chars.next() {
                if c == '\\' {
                    // Keep the escape pair raw; unescaping happens afterwards.
                    if let Some(&(next_idx, next_c)) = chars.peek() {
                        raw.push('\\');
                        raw.push(next_c);
                        chars.next();
                        consumed = next_idx + next_c.len_utf8();
                        continue;
                    } else {
                        // Backslash at end of buffer; treat as literal and
                        // continue onto the next line.
                        raw.push('\\');
                        consumed = idx + 1;
                        continue;
                    }
                }
                if c == quote {
                    if triple {
                        let rest = &self.buffer[idx..];
                        if rest.starts_with(&format!("{quote}{quote}{quote}")) {
                            consumed = idx + 3;
                            terminated = true;
                            break;
                        } else {
                            raw.push(c);
                            consumed = idx + 1;
                        }
                    } else {
                        consumed = idx + 1;
                        terminated = true;
                        break;
                    }
                } else {
                    raw.push(c);
                    consumed = idx + c.len_utf8();
                }
            }

            self.advance(consumed);

            if terminated {
                break;
            }
            if !triple {
                return Err(CoilError::syntax(loc, "unterminated string"));
            }
            // Triple-quoted strings may span lines; the newline left in the
            // buffer was already copied into `raw` above.
        }

        Ok(Spanned {
            token: Token::Str(unescape(&raw)),
            location: loc,
        })
    }
}

/// Applies the coil string-escape rules: `\\ \n \r \t \' \"` are recognized;
/// any other `\x` passes through as the literal character `x` (the leading
/// backslash is dropped).
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('\'') => out.push('\''),
                Some('"') => out.push('"'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StrLines;

    fn tokens(text: &str) -> Vec<Token> {
        let mut lines = StrLines::new(text);
        let mut tz = Tokenizer::new(&mut lines, None);
        let mut out = Vec::new();
        loop {
            let tok = tz.next(&[]).unwrap();
            let done = matches!(tok.token, Token::Eof);
            out.push(tok.token);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn simple_attribute() {
        let toks = tokens("a: 1\n");
        assert_eq!(
            toks,
            vec![
                Token::Path("a".into()),
                Token::Colon,
                Token::Integer(1),
                Token::Eof
            ]
        );
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        let toks = tokens("# comment\n  a : 1   # trailing\n");
        assert_eq!(
            toks,
            vec![
                Token::Path("a".into()),
                Token::Colon,
                Token::Integer(1),
                Token::Eof
            ]
        );
    }

    #[test]
    fn triple_quoted_string_spans_lines() {
        let toks = tokens("\"\"\"line one\nline two\"\"\"\n");
        assert_eq!(
            toks,
            vec![Token::Str("line one\nline two".into()), Token::Eof]
        );
    }

    #[test]
    fn unknown_escape_drops_backslash() {
        let toks = tokens("'a\\qb'\n");
        assert_eq!(toks, vec![Token::Str("aqb".into()), Token::Eof]);
    }

    #[test]
    fn paths_with_dots_and_at() {
        let toks = tokens("@extends: ..A.b\n");
        assert_eq!(
            toks,
            vec![
                Token::Path("@extends".into()),
                Token::Colon,
                Token::Path("..A.b".into()),
                Token::Eof
            ]
        );
    }
}
