//! Expression lexer
//!
//! Tokens are operators (`->`, `//`), parentheses, and terms. Terms come
//! bare (a maximal run of non-space, non-syntax characters) or quoted with
//! `'` or `"`, where `\` escapes the enclosing quote character and itself.
//! Every token carries the byte offset it started at for error reporting.

use convoy_core::{Error, Result};

/// One lexical token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A bare or quoted script name / argument
    Term { text: String, quoted: bool },
    /// `->`
    Arrow,
    /// `//`
    Parallel,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
}

/// A token with the byte offset of its first character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannedToken {
    pub token: Token,
    pub pos: usize,
}

/// Tokenize an expression string
pub fn lex(input: &str) -> Result<Vec<SpannedToken>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, ch) = chars[i];
        match ch {
            c if c.is_whitespace() => {
                i += 1;
            }
            '(' => {
                tokens.push(SpannedToken { token: Token::OpenParen, pos });
                i += 1;
            }
            ')' => {
                tokens.push(SpannedToken { token: Token::CloseParen, pos });
                i += 1;
            }
            '-' if matches!(chars.get(i + 1), Some((_, '>'))) => {
                tokens.push(SpannedToken { token: Token::Arrow, pos });
                i += 2;
            }
            '/' if matches!(chars.get(i + 1), Some((_, '/'))) => {
                tokens.push(SpannedToken { token: Token::Parallel, pos });
                i += 2;
            }
            quote @ ('\'' | '"') => {
                let (text, next) = lex_quoted(&chars, i, quote)?;
                tokens.push(SpannedToken {
                    token: Token::Term { text, quoted: true },
                    pos,
                });
                i = next;
            }
            _ => {
                let (text, next) = lex_bare(&chars, i);
                tokens.push(SpannedToken {
                    token: Token::Term { text, quoted: false },
                    pos,
                });
                i = next;
            }
        }
    }

    Ok(tokens)
}

/// Consume a quoted term starting at the opening quote
fn lex_quoted(chars: &[(usize, char)], start: usize, quote: char) -> Result<(String, usize)> {
    let open_pos = chars[start].0;
    let mut text = String::new();
    let mut i = start + 1;
    loop {
        match chars.get(i) {
            None => {
                return Err(Error::parse(open_pos, "unterminated quoted term"));
            }
            Some(&(_, '\\')) => match chars.get(i + 1) {
                // Only the quote character and the backslash are escapable;
                // any other backslash passes through literally.
                Some(&(_, c)) if c == quote || c == '\\' => {
                    text.push(c);
                    i += 2;
                }
                _ => {
                    text.push('\\');
                    i += 1;
                }
            },
            Some(&(_, c)) if c == quote => {
                return Ok((text, i + 1));
            }
            Some(&(_, c)) => {
                text.push(c);
                i += 1;
            }
        }
    }
}

/// Consume a bare term: a maximal run of non-space, non-syntax characters
fn lex_bare(chars: &[(usize, char)], start: usize) -> (String, usize) {
    let mut text = String::new();
    let mut i = start;
    while let Some(&(_, c)) = chars.get(i) {
        if c.is_whitespace() || matches!(c, '(' | ')' | '\'' | '"') {
            break;
        }
        if c == '-' && matches!(chars.get(i + 1), Some((_, '>'))) {
            break;
        }
        if c == '/' && matches!(chars.get(i + 1), Some((_, '/'))) {
            break;
        }
        text.push(c);
        i += 1;
    }
    (text, i)
}
