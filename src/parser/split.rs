// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Splitting option and segment text at top-level separators

use crate::error::{ODataError, Result};

/// Split `text` at every `separator` outside quotes, parentheses and brackets
///
/// Returns each piece with its byte offset in `text`. Single-quoted runs use `''` as an
/// escaped quote; double-quoted runs use backslash escapes.
pub fn split_top_level(text: &str, separator: char) -> Result<Vec<(usize, &str)>> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' => skip_single_quoted(text, i, &mut chars)?,
            '"' => skip_double_quoted(text, i, &mut chars)?,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ODataError::syntax(text, i, format!("unbalanced '{c}'")))?;
            }
            c if c == separator && depth == 0 => {
                pieces.push((start, &text[start..i]));
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ODataError::syntax(text, text.len(), "unbalanced parentheses"));
    }
    pieces.push((start, &text[start..]));
    Ok(pieces)
}

fn skip_single_quoted(
    text: &str,
    open: usize,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Result<()> {
    while let Some((_, c)) = chars.next() {
        if c == '\'' {
            if chars.peek().is_some_and(|(_, next)| *next == '\'') {
                chars.next();
                continue;
            }
            return Ok(());
        }
    }
    Err(ODataError::UnterminatedLiteral {
        what: "quoted literal".to_string(),
        position: open,
        text: text.to_string(),
    })
}

fn skip_double_quoted(
    text: &str,
    open: usize,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Result<()> {
    while let Some((_, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '"' => return Ok(()),
            _ => {}
        }
    }
    Err(ODataError::UnterminatedLiteral {
        what: "double-quoted string".to_string(),
        position: open,
        text: text.to_string(),
    })
}

/// Byte offset of the first `target` outside quotes and parentheses
pub fn find_top_level(text: &str, target: char) -> Result<Option<usize>> {
    let pieces = split_top_level(text, target)?;
    Ok((pieces.len() > 1).then(|| pieces[1].0 - target.len_utf8()))
}

/// Split `name(args)` into the name and the text between the outer parentheses
///
/// The closing parenthesis must end the text.
pub fn split_parenthesized(text: &str) -> Result<(&str, Option<&str>)> {
    let Some(open) = text.find(['(', '\'']) else {
        return Ok((text, None));
    };
    if text.as_bytes()[open] == b'\'' {
        return Ok((text, None));
    }
    check_balanced(text)?;
    let inner_end = text.len() - 1;
    if !text.ends_with(')') {
        return Err(ODataError::syntax(text, inner_end, "text after closing parenthesis"));
    }
    let inner = &text[open + 1..inner_end];
    if check_balanced(inner).is_err() {
        return Err(ODataError::syntax(text, open, "more than one parenthesized group"));
    }
    Ok((&text[..open], Some(inner)))
}

/// Fails when quotes, parentheses or brackets in `text` do not pair up
pub fn check_balanced(text: &str) -> Result<()> {
    split_top_level(text, '\u{0}').map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_respects_nesting_and_quotes() {
        let pieces = split_top_level("a,b(c,d),'e,f',[1,2]", ',').expect("split");
        let texts: Vec<&str> = pieces.iter().map(|(_, s)| *s).collect();
        assert_eq!(texts, vec!["a", "b(c,d)", "'e,f'", "[1,2]"]);
        assert_eq!(pieces[1].0, 2);
    }

    #[test]
    fn test_split_errors() {
        assert!(split_top_level("a(b", ',').is_err());
        assert!(split_top_level("a)b", ',').is_err());
        assert!(split_top_level("'abc", ',').is_err());
    }

    #[test]
    fn test_find_top_level() {
        assert_eq!(find_top_level("Name='a=b'", '=').expect("find"), Some(4));
        assert_eq!(find_top_level("'a=b'", '=').expect("find"), None);
    }

    #[test]
    fn test_split_parenthesized() {
        assert_eq!(split_parenthesized("People(1)").expect("key"), ("People", Some("1")));
        assert_eq!(split_parenthesized("Fn()").expect("call"), ("Fn", Some("")));
        assert_eq!(split_parenthesized("People").expect("plain"), ("People", None));
        assert_eq!(
            split_parenthesized("Orders(Name='a(b')").expect("quoted paren"),
            ("Orders", Some("Name='a(b'"))
        );
        assert!(split_parenthesized("People(1)(2)").is_err());
        assert!(split_parenthesized("People(1)x").is_err());
    }
}
