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

//! Parser for `$search` expressions
//!
//! Terms are words or double-quoted phrases combined with `NOT`, `AND` and `OR`, in
//! that order of precedence. Juxtaposed terms are implicitly AND-ed.

use crate::ast::{BinaryOperator, QueryToken, UnaryOperator};
use crate::error::{ODataError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SearchToken {
    OpenParen,
    CloseParen,
    Phrase(String),
    Word(String),
    And,
    Or,
    Not,
    End,
}

struct SearchLexer<'a> {
    text: &'a str,
    pos: usize,
}

impl SearchLexer<'_> {
    fn next_token(&mut self) -> Result<(SearchToken, usize)> {
        let rest = &self.text[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
        let start = self.pos;
        let Some(c) = trimmed.chars().next() else {
            return Ok((SearchToken::End, start));
        };
        let token = match c {
            '(' => {
                self.pos += 1;
                SearchToken::OpenParen
            }
            ')' => {
                self.pos += 1;
                SearchToken::CloseParen
            }
            '"' => SearchToken::Phrase(self.scan_phrase(start)?),
            _ => {
                let len = trimmed
                    .find(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '"'))
                    .unwrap_or(trimmed.len());
                self.pos += len;
                match &trimmed[..len] {
                    "AND" => SearchToken::And,
                    "OR" => SearchToken::Or,
                    "NOT" => SearchToken::Not,
                    word => SearchToken::Word(word.to_string()),
                }
            }
        };
        Ok((token, start))
    }

    /// Phrase in double quotes; `\"` and `\\` are escapes
    fn scan_phrase(&mut self, start: usize) -> Result<String> {
        let mut phrase = String::new();
        let mut chars = self.text[start + 1..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos = start + 1 + i + 1;
                    return Ok(phrase);
                }
                '\\' => match chars.next() {
                    Some((_, escaped @ ('"' | '\\'))) => phrase.push(escaped),
                    _ => {
                        return Err(ODataError::syntax(self.text, start + 1 + i, "invalid escape in search phrase"));
                    }
                },
                other => phrase.push(other),
            }
        }
        Err(ODataError::UnterminatedLiteral {
            what: "search phrase".to_string(),
            position: start,
            text: self.text.to_string(),
        })
    }
}

struct SearchParser<'a> {
    lexer: SearchLexer<'a>,
    token: SearchToken,
    position: usize,
    depth: usize,
    max_depth: usize,
}

/// Parse a `$search` expression
pub fn parse_search(text: &str, max_depth: usize) -> Result<QueryToken> {
    log::trace!("parsing search '{text}'");
    let mut parser = SearchParser {
        lexer: SearchLexer { text, pos: 0 },
        token: SearchToken::End,
        position: 0,
        depth: 0,
        max_depth,
    };
    parser.advance()?;
    let expression = parser.parse_or()?;
    if parser.token != SearchToken::End {
        return Err(parser.unexpected());
    }
    Ok(expression)
}

impl SearchParser<'_> {
    fn advance(&mut self) -> Result<()> {
        let (token, position) = self.lexer.next_token()?;
        self.token = token;
        self.position = position;
        Ok(())
    }

    fn unexpected(&self) -> ODataError {
        let found = match &self.token {
            SearchToken::End => "end of input".to_string(),
            other => format!("{other:?}"),
        };
        ODataError::syntax(self.lexer.text, self.position, format!("unexpected {found} in search expression"))
    }

    fn parse_or(&mut self) -> Result<QueryToken> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ODataError::RecursionDepthExceeded {
                max: self.max_depth,
            });
        }
        let mut left = self.parse_and()?;
        while self.token == SearchToken::Or {
            self.advance()?;
            let right = self.parse_and()?;
            left = QueryToken::binary(BinaryOperator::Or, left, right);
        }
        self.depth -= 1;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<QueryToken> {
        let mut left = self.parse_not()?;
        loop {
            match self.token {
                SearchToken::And => self.advance()?,
                SearchToken::Word(_) | SearchToken::Phrase(_) | SearchToken::Not | SearchToken::OpenParen => {}
                _ => return Ok(left),
            }
            let right = self.parse_not()?;
            left = QueryToken::binary(BinaryOperator::And, left, right);
        }
    }

    fn parse_not(&mut self) -> Result<QueryToken> {
        let mut negations = 0usize;
        while self.token == SearchToken::Not {
            negations += 1;
            self.advance()?;
        }
        let mut term = self.parse_primary()?;
        for _ in 0..negations {
            term = QueryToken::unary(UnaryOperator::Not, term);
        }
        Ok(term)
    }

    fn parse_primary(&mut self) -> Result<QueryToken> {
        match std::mem::replace(&mut self.token, SearchToken::End) {
            SearchToken::Word(word) => {
                self.advance()?;
                Ok(QueryToken::search_term(word, false))
            }
            SearchToken::Phrase(phrase) => {
                self.advance()?;
                Ok(QueryToken::search_term(phrase, true))
            }
            SearchToken::OpenParen => {
                self.advance()?;
                let inner = self.parse_or()?;
                if self.token != SearchToken::CloseParen {
                    return Err(self.unexpected());
                }
                self.advance()?;
                Ok(inner)
            }
            other => {
                self.token = other;
                Err(self.unexpected())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn word(text: &str) -> QueryToken {
        QueryToken::search_term(text, false)
    }

    #[test]
    fn test_implicit_and_and_precedence() {
        let parsed = parse_search("blue OR red green", 10).expect("search");
        let expected = QueryToken::binary(
            BinaryOperator::Or,
            word("blue"),
            QueryToken::binary(BinaryOperator::And, word("red"), word("green")),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_not_and_phrases() {
        let parsed = parse_search("NOT \"light \\\"blue\\\"\" AND (a OR b)", 10).expect("search");
        let expected = QueryToken::binary(
            BinaryOperator::And,
            QueryToken::unary(UnaryOperator::Not, QueryToken::search_term("light \"blue\"", true)),
            QueryToken::binary(BinaryOperator::Or, word("a"), word("b")),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_search_errors() {
        assert!(parse_search("", 10).is_err());
        assert!(parse_search("a OR", 10).is_err());
        assert!(parse_search("(a", 10).is_err());
        assert!(matches!(
            parse_search("\"open", 10),
            Err(ODataError::UnterminatedLiteral { .. })
        ));
        assert!(matches!(
            parse_search("((((a))))", 3),
            Err(ODataError::RecursionDepthExceeded { max: 3 })
        ));
    }
}
