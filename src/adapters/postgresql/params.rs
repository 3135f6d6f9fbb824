//! Named parameter rewriting
//!
//! Query templates use `:startDate` / `:tillDate`. PostgreSQL only accepts
//! positional `$n` placeholders, so known names are rewritten in order of
//! first appearance. Casts (`::date`), string literals (including `E'...'`
//! escape strings and `$tag$...$tag$` bodies), quoted identifiers, comments
//! and unknown `:names` pass through unchanged.

use crate::adapters::source::{END_PARAM, START_PARAM};

/// A template rewritten for positional binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalQuery {
    /// SQL text with `$n` placeholders
    pub sql: String,

    /// Parameter name bound at each position (`names[0]` is `$1`)
    pub names: Vec<&'static str>,
}

/// Rewrites `:startDate` / `:tillDate` to `$n` placeholders
pub fn to_positional(template: &str) -> PositionalQuery {
    let chars: Vec<char> = template.chars().collect();
    let mut sql = String::with_capacity(template.len());
    let mut names: Vec<&'static str> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            'E' | 'e' if chars.get(i + 1) == Some(&'\'') && !follows_ident(&chars, i) => {
                let end = skip_escape_string(&chars, i + 1);
                sql.extend(&chars[i..end]);
                i = end;
            }
            '$' if !follows_ident(&chars, i) && dollar_tag(&chars, i).is_some() => {
                let end = skip_dollar_quoted(&chars, i);
                sql.extend(&chars[i..end]);
                i = end;
            }
            '\'' | '"' => {
                let end = skip_quoted(&chars, i, c);
                sql.extend(&chars[i..end]);
                i = end;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == '\n')
                    .map_or(chars.len(), |p| i + p);
                sql.extend(&chars[i..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = skip_block_comment(&chars, i);
                sql.extend(&chars[i..end]);
                i = end;
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                sql.push_str("::");
                i += 2;
            }
            ':' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_ident_char(chars[end], end == start) {
                    end += 1;
                }
                let ident: String = chars[start..end].iter().collect();
                match known_param(&ident) {
                    Some(name) => {
                        let position = match names.iter().position(|n| *n == name) {
                            Some(p) => p + 1,
                            None => {
                                names.push(name);
                                names.len()
                            }
                        };
                        sql.push('$');
                        sql.push_str(&position.to_string());
                    }
                    None => {
                        sql.push(':');
                        sql.push_str(&ident);
                    }
                }
                i = end;
            }
            _ => {
                sql.push(c);
                i += 1;
            }
        }
    }

    PositionalQuery { sql, names }
}

fn known_param(ident: &str) -> Option<&'static str> {
    match ident {
        START_PARAM => Some(START_PARAM),
        END_PARAM => Some(END_PARAM),
        _ => None,
    }
}

fn is_ident_char(c: char, first: bool) -> bool {
    if first {
        c.is_ascii_alphabetic() || c == '_'
    } else {
        c.is_ascii_alphanumeric() || c == '_'
    }
}

/// Returns the index just past a quoted run starting at `open`
///
/// A doubled quote inside the run is an escaped quote.
fn skip_quoted(chars: &[char], open: usize, quote: char) -> usize {
    let mut i = open + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

/// Returns the index just past an `E'...'` literal whose quote is at `open`
///
/// Backslash escapes the next character, so `\'` does not close the literal.
fn skip_escape_string(chars: &[char], open: usize) -> usize {
    let mut i = open + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '\'' if chars.get(i + 1) == Some(&'\'') => i += 2,
            '\'' => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

/// Length of the `$tag$` opener at `open`, if there is one
///
/// The tag is empty or an identifier, so positional `$1` never qualifies.
fn dollar_tag(chars: &[char], open: usize) -> Option<usize> {
    let mut i = open + 1;
    while i < chars.len() && is_ident_char(chars[i], i == open + 1) {
        i += 1;
    }
    (chars.get(i) == Some(&'$')).then(|| i + 1 - open)
}

fn skip_dollar_quoted(chars: &[char], open: usize) -> usize {
    let Some(len) = dollar_tag(chars, open) else {
        return open + 1;
    };
    let tag = &chars[open..open + len];
    let mut i = open + len;
    while i + len <= chars.len() {
        if &chars[i..i + len] == tag {
            return i + len;
        }
        i += 1;
    }
    chars.len()
}

/// Whether the character before `i` continues an identifier
fn follows_ident(chars: &[char], i: usize) -> bool {
    i > 0 && (chars[i - 1].is_ascii_alphanumeric() || chars[i - 1] == '_' || chars[i - 1] == '$')
}

fn skip_block_comment(chars: &[char], open: usize) -> usize {
    let mut i = open + 2;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}
