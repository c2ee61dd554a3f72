//! Tokenizer for Skald source text.
//!
//! Scans left to right with a character cursor. Keywords are not a separate
//! token kind; the parser distinguishes them by text. Only `true`/`false`
//! are classified eagerly (as `BoolLiteral`), so they can never be used as
//! identifiers.

use crate::ast::Location;
use crate::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    IntLiteral,
    BoolLiteral,
    Operator,
    Punctuation,
    /// Synthesized by the parser when it peeks past the last token.
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
    pub location: Location,
}

impl Token {
    pub fn new(text: impl Into<String>, kind: TokenKind, location: Location) -> Self {
        Token {
            text: text.into(),
            kind,
            location,
        }
    }
}

/// Two-character operators, tried before the single-character ones.
const TWO_CHAR_OPERATORS: [&str; 4] = ["==", "!=", "<=", ">="];
const ONE_CHAR_OPERATORS: [char; 8] = ['=', '<', '>', '+', '-', '*', '/', '%'];
const PUNCTUATION: [char; 7] = ['(', ')', '{', '}', ',', ';', ':'];

/// Tokenize `source`, reporting locations against `filename`.
///
/// Comments run from `#` or `//` to the end of the line. The first character
/// that matches no rule raises a lex error.
pub fn tokenize(source: &str, filename: &str) -> Result<Vec<Token>, CompileError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;
    let mut column = 1;

    while pos < chars.len() {
        let ch = chars[pos];
        let location = Location::new(filename, line, column);

        // Whitespace
        if ch.is_whitespace() {
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
            pos += 1;
            continue;
        }

        // Comments: '#' or '//' to end of line
        if ch == '#' || (ch == '/' && chars.get(pos + 1) == Some(&'/')) {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
                column += 1;
            }
            continue;
        }

        // Identifiers, keywords and boolean literals
        if ch.is_ascii_alphabetic() || ch == '_' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            column += pos - start;
            let kind = if text == "true" || text == "false" {
                TokenKind::BoolLiteral
            } else {
                TokenKind::Identifier
            };
            tokens.push(Token::new(text, kind, location));
            continue;
        }

        // Integer literals
        if ch.is_ascii_digit() {
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            column += pos - start;
            tokens.push(Token::new(text, TokenKind::IntLiteral, location));
            continue;
        }

        // Operators, longest match first
        if pos + 1 < chars.len() {
            let pair: String = chars[pos..pos + 2].iter().collect();
            if TWO_CHAR_OPERATORS.contains(&pair.as_str()) {
                tokens.push(Token::new(pair, TokenKind::Operator, location));
                pos += 2;
                column += 2;
                continue;
            }
        }
        if ONE_CHAR_OPERATORS.contains(&ch) {
            tokens.push(Token::new(ch.to_string(), TokenKind::Operator, location));
            pos += 1;
            column += 1;
            continue;
        }

        if PUNCTUATION.contains(&ch) {
            tokens.push(Token::new(ch.to_string(), TokenKind::Punctuation, location));
            pos += 1;
            column += 1;
            continue;
        }

        return Err(CompileError::lex(
            location,
            format!("unrecognized character '{}'", ch),
        ));
    }

    Ok(tokens)
}
