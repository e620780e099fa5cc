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

//! Lexer for filter, orderby, select/expand and key expressions
//!
//! Produces one [`Token`] per call to [`Lexer::next_token`]. Whitespace between tokens
//! is skipped, but positions always refer to byte offsets in the original text so
//! errors can point at the offending character.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_xid::UnicodeXID;

use super::token::{Token, TokenKind};
use crate::error::{ODataError, Result};
use crate::literal::natural_numeric_kind;

static GUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("guid pattern")
});

static DATE_TIME_OFFSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}(:[0-9]{2}(\.[0-9]+)?)?([Zz]|[+-][0-9]{2}:[0-9]{2})")
        .expect("date-time-offset pattern")
});

static DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[0-9]{4}-[0-9]{2}-[0-9]{2}").expect("date pattern"));

static TIME_OF_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{2}:[0-9]{2}(:[0-9]{2}(\.[0-9]+)?)?").expect("time-of-day pattern")
});

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?(?:[0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?|INF|NaN)[LlMmDdFf]?")
        .expect("number pattern")
});

/// Typed literal prefixes written as `prefix'...'`
fn typed_prefix_kind(prefix: &str) -> Option<TokenKind> {
    let lower = prefix.to_ascii_lowercase();
    Some(match lower.as_str() {
        "binary" | "x" => TokenKind::BinaryLiteral,
        "duration" => TokenKind::DurationLiteral,
        "geography" => TokenKind::GeographyLiteral,
        "geometry" => TokenKind::GeometryLiteral,
        "guid" => TokenKind::GuidLiteral,
        "date" => TokenKind::DateLiteral,
        "datetimeoffset" | "datetime" => TokenKind::DateTimeOffsetLiteral,
        "time" | "timeofday" => TokenKind::TimeOfDayLiteral,
        _ => return None,
    })
}

pub fn is_identifier_start(c: char) -> bool {
    c.is_xid_start() || c == '_' || c == '$'
}

pub fn is_identifier_continue(c: char) -> bool {
    c.is_xid_continue()
}

/// Tokenizer over one expression string
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    text: &'a str,
    pos: usize,
    token: Token<'a>,
    max_depth: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer positioned before the first token
    pub fn new(text: &'a str, max_depth: usize) -> Self {
        Self {
            text,
            pos: 0,
            token: Token::new(TokenKind::End, "", 0),
            max_depth,
        }
    }

    /// Create a lexer and read the first token
    pub fn start(text: &'a str, max_depth: usize) -> Result<Self> {
        let mut lexer = Self::new(text, max_depth);
        lexer.next_token()?;
        Ok(lexer)
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// The token most recently read
    pub fn current(&self) -> Token<'a> {
        self.token
    }

    /// Byte offset just past the current token
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.token.kind == TokenKind::End
    }

    /// The token after the current one, without consuming anything
    pub fn peek(&self) -> Result<Token<'a>> {
        self.clone().next_token()
    }

    /// Whether the next unread character is `c`, with no whitespace in between
    pub fn next_char_is(&self, c: char) -> bool {
        self.text[self.pos..].starts_with(c)
    }

    /// Advance and return the new current token
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(c) = self.text[start..].chars().next() else {
            self.token = Token::new(TokenKind::End, "", start);
            return Ok(self.token);
        };

        let kind = match c {
            '(' => self.punctuation(TokenKind::OpenParen),
            ')' => self.punctuation(TokenKind::CloseParen),
            ',' => self.punctuation(TokenKind::Comma),
            '/' => self.punctuation(TokenKind::Slash),
            '.' => self.punctuation(TokenKind::Dot),
            '*' => self.punctuation(TokenKind::Star),
            '=' => self.punctuation(TokenKind::Equal),
            ';' => self.punctuation(TokenKind::Semicolon),
            ':' => self.punctuation(TokenKind::Colon),
            '\'' => {
                self.scan_quoted(start)?;
                TokenKind::StringLiteral
            }
            '@' => {
                self.pos += 1;
                if !self.text[self.pos..].starts_with(is_identifier_start) {
                    return Err(ODataError::syntax(self.text, start, "parameter alias needs a name"));
                }
                self.scan_identifier();
                TokenKind::ParameterAlias
            }
            '[' | '{' => {
                self.scan_bracketed(start)?;
                TokenKind::BracketedExpression
            }
            '-' => {
                let rest = &self.text[start + 1..];
                if rest.starts_with(|c: char| c.is_ascii_digit()) || rest.starts_with("INF") {
                    self.scan_numeric_like(start)?
                } else {
                    self.punctuation(TokenKind::Minus)
                }
            }
            c if c.is_ascii_digit() => self.scan_numeric_like(start)?,
            c if is_identifier_start(c) => self.scan_word(start)?,
            other => {
                return Err(ODataError::InvalidCharacter {
                    character: other,
                    position: start,
                    text: self.text.to_string(),
                });
            }
        };

        self.token = Token::new(kind, &self.text[start..self.pos], start);
        log::trace!("token {:?} {:?} at {}", self.token.kind, self.token.text, start);
        Ok(self.token)
    }

    /// Read `a.b.c` starting at the current identifier, optionally ending in `.*`
    ///
    /// On return the current token is the last one consumed.
    pub fn read_dotted_identifier(&mut self, accept_star: bool) -> Result<&'a str> {
        let first = self.token;
        if first.kind != TokenKind::Identifier {
            return Err(ODataError::syntax(self.text, first.position, format!("identifier expected, found {first}")));
        }
        let mut end = first.position + first.text.len();
        loop {
            let rest = &self.text[end..];
            let Some(after_dot) = rest.strip_prefix('.') else {
                break;
            };
            if accept_star && after_dot.starts_with('*') {
                end += 2;
                self.pos = end;
                break;
            }
            if !after_dot.starts_with(is_identifier_start) {
                break;
            }
            self.pos = end + 1;
            self.scan_identifier();
            end = self.pos;
        }
        self.pos = end;
        let text = &self.text[first.position..end];
        self.token = Token::new(TokenKind::Identifier, text, first.position);
        Ok(text)
    }

    fn punctuation(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.text[self.pos..].trim_start();
        self.pos = self.text.len() - trimmed.len();
    }

    fn scan_identifier(&mut self) {
        let rest = &self.text[self.pos..];
        let mut chars = rest.char_indices();
        let mut end = rest.len();
        if let Some((_, first)) = chars.next() {
            if !is_identifier_start(first) {
                return;
            }
            for (i, c) in chars {
                if !is_identifier_continue(c) {
                    end = i;
                    break;
                }
            }
        }
        self.pos += end;
    }

    /// Identifiers, keywords, `prefix'...'` literals, bare GUIDs and `INF`/`NaN`
    fn scan_word(&mut self, start: usize) -> Result<TokenKind> {
        if GUID.is_match(&self.text[start..]) {
            let matched = GUID.find(&self.text[start..]).map_or(0, |m| m.end());
            self.pos = start + matched;
            return Ok(TokenKind::GuidLiteral);
        }

        self.scan_identifier();
        let word = &self.text[start..self.pos];

        if self.next_char_is('\'') {
            let kind = typed_prefix_kind(word).unwrap_or(TokenKind::QuotedLiteral);
            self.scan_quoted(self.pos)?;
            return Ok(kind);
        }

        // `Namespace.Type'...'`
        let mut lookahead = self.pos;
        while self.text[lookahead..].starts_with('.')
            && self.text[lookahead + 1..].starts_with(is_identifier_start)
        {
            let save = self.pos;
            self.pos = lookahead + 1;
            self.scan_identifier();
            lookahead = self.pos;
            self.pos = save;
        }
        if lookahead > self.pos && self.text[lookahead..].starts_with('\'') {
            self.scan_quoted(lookahead)?;
            return Ok(TokenKind::QuotedLiteral);
        }

        Ok(match word {
            "null" => TokenKind::NullLiteral,
            "true" | "false" => TokenKind::BooleanLiteral,
            _ if word.starts_with("INF") || word.starts_with("NaN") => {
                match natural_numeric_kind(word) {
                    Ok(kind) => TokenKind::from_numeric_type(kind),
                    Err(_) => TokenKind::Identifier,
                }
            }
            _ => TokenKind::Identifier,
        })
    }

    /// Numbers, bare dates, timestamps, times of day and GUIDs starting with a digit
    fn scan_numeric_like(&mut self, start: usize) -> Result<TokenKind> {
        let rest = &self.text[start..];
        if let Some(m) = GUID.find(rest) {
            self.pos = start + m.end();
            return Ok(TokenKind::GuidLiteral);
        }
        if let Some(m) = DATE_TIME_OFFSET.find(rest) {
            self.pos = start + m.end();
            return Ok(TokenKind::DateTimeOffsetLiteral);
        }
        if let Some(m) = DATE.find(rest) {
            self.pos = start + m.end();
            return Ok(TokenKind::DateLiteral);
        }
        if let Some(m) = TIME_OF_DAY.find(rest) {
            self.pos = start + m.end();
            return Ok(TokenKind::TimeOfDayLiteral);
        }
        let Some(m) = NUMBER.find(rest) else {
            return Err(ODataError::syntax(self.text, start, "malformed number"));
        };
        self.pos = start + m.end();
        let kind = natural_numeric_kind(m.as_str())?;
        Ok(TokenKind::from_numeric_type(kind))
    }

    /// Consume a single-quoted literal starting at `quote`, with `''` as an escaped quote
    fn scan_quoted(&mut self, quote: usize) -> Result<()> {
        let bytes = self.text.as_bytes();
        let mut i = quote + 1;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                self.pos = i + 1;
                return Ok(());
            }
            i += 1;
        }
        Err(ODataError::UnterminatedLiteral {
            what: "quoted literal".to_string(),
            position: quote,
            text: self.text.to_string(),
        })
    }

    /// Consume a JSON array or object, honouring strings and nesting
    fn scan_bracketed(&mut self, start: usize) -> Result<()> {
        let bytes = self.text.as_bytes();
        let mut stack: Vec<u8> = Vec::new();
        let mut i = start;
        let mut in_string = false;
        while i < bytes.len() {
            let b = bytes[i];
            if in_string {
                match b {
                    b'\\' => i += 1,
                    b'"' => in_string = false,
                    _ => {}
                }
            } else {
                match b {
                    b'"' => in_string = true,
                    b'[' | b'{' => {
                        stack.push(if b == b'[' { b']' } else { b'}' });
                        if stack.len() > self.max_depth {
                            return Err(ODataError::RecursionDepthExceeded { max: self.max_depth });
                        }
                    }
                    b']' | b'}' => {
                        if stack.pop() != Some(b) {
                            return Err(ODataError::syntax(self.text, i, "mismatched bracket"));
                        }
                        if stack.is_empty() {
                            self.pos = i + 1;
                            return Ok(());
                        }
                    }
                    _ => {}
                }
            }
            i += 1;
        }
        Err(ODataError::UnterminatedLiteral {
            what: "bracketed expression".to_string(),
            position: start,
            text: self.text.to_string(),
        })
    }
}

/// Tokenize a whole expression, for diagnostics and tooling
pub fn tokenize(text: &str, max_depth: usize) -> Result<Vec<Token<'_>>> {
    let mut lexer = Lexer::new(text, max_depth);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        if token.kind == TokenKind::End {
            return Ok(tokens);
        }
        tokens.push(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text, 100)
            .expect("tokenizes")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_filter_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds("Name eq 'O''Neil' and Age gt -5"),
            vec![Identifier, Identifier, StringLiteral, Identifier, Identifier, Identifier, IntegerLiteral]
        );
        assert_eq!(
            kinds("startswith(Name,'A')"),
            vec![Identifier, OpenParen, Identifier, Comma, StringLiteral, CloseParen]
        );
    }

    #[rstest]
    #[case("42", TokenKind::IntegerLiteral)]
    #[case("42L", TokenKind::Int64Literal)]
    #[case("3000000000", TokenKind::Int64Literal)]
    #[case("1.5", TokenKind::DecimalLiteral)]
    #[case("1.5e3", TokenKind::DoubleLiteral)]
    #[case("1.5f", TokenKind::SingleLiteral)]
    #[case("INF", TokenKind::DoubleLiteral)]
    #[case("-INF", TokenKind::DoubleLiteral)]
    #[case("NaN", TokenKind::DoubleLiteral)]
    #[case("null", TokenKind::NullLiteral)]
    #[case("true", TokenKind::BooleanLiteral)]
    #[case("2024-01-31", TokenKind::DateLiteral)]
    #[case("2024-01-31T10:00:00Z", TokenKind::DateTimeOffsetLiteral)]
    #[case("2024-01-31T10:00+01:00", TokenKind::DateTimeOffsetLiteral)]
    #[case("13:45:00", TokenKind::TimeOfDayLiteral)]
    #[case("01234567-89ab-cdef-0123-456789abcdef", TokenKind::GuidLiteral)]
    #[case("abcdef01-89ab-cdef-0123-456789abcdef", TokenKind::GuidLiteral)]
    #[case("duration'P1D'", TokenKind::DurationLiteral)]
    #[case("binary'AQID'", TokenKind::BinaryLiteral)]
    #[case("X'0102'", TokenKind::BinaryLiteral)]
    #[case("geography'POINT(1 2)'", TokenKind::GeographyLiteral)]
    #[case("NS.Color'Red,Green'", TokenKind::QuotedLiteral)]
    #[case("@p1", TokenKind::ParameterAlias)]
    #[case("[1,[2,3],{\"a\":\"]\"}]", TokenKind::BracketedExpression)]
    #[case("$it", TokenKind::Identifier)]
    fn test_single_token(#[case] text: &str, #[case] kind: TokenKind) {
        let tokens = tokenize(text, 100).expect("tokenizes");
        assert_eq!(tokens.len(), 1, "tokens: {tokens:?}");
        assert_eq!(tokens[0].kind, kind);
        assert_eq!(tokens[0].text, text);
    }

    #[test]
    fn test_positions_include_whitespace() {
        let tokens = tokenize("  a  eq 1", 10).expect("tokenizes");
        assert_eq!(tokens[0].position, 2);
        assert_eq!(tokens[1].position, 5);
        assert_eq!(tokens[2].position, 8);
    }

    #[test]
    fn test_lexical_errors() {
        assert!(matches!(
            tokenize("Name eq 'abc", 10),
            Err(ODataError::UnterminatedLiteral { position: 8, .. })
        ));
        assert!(matches!(
            tokenize("a # b", 10),
            Err(ODataError::InvalidCharacter { character: '#', position: 2, .. })
        ));
        assert!(matches!(
            tokenize("[1,2", 10),
            Err(ODataError::UnterminatedLiteral { .. })
        ));
        assert!(matches!(
            tokenize("[[[1]]]", 2),
            Err(ODataError::RecursionDepthExceeded { max: 2 })
        ));
    }

    #[test]
    fn test_overflow_surfaces_from_lexer() {
        let huge = format!("1{}", "0".repeat(400));
        assert!(matches!(
            tokenize(&huge, 10),
            Err(ODataError::LiteralConversion(crate::literal::ConversionError::Overflow { .. }))
        ));
    }

    #[test]
    fn test_dotted_identifier() {
        let mut lexer = Lexer::start("NS.Person/Name", 10).expect("lexer");
        assert_eq!(lexer.read_dotted_identifier(false).expect("dotted"), "NS.Person");
        assert_eq!(lexer.next_token().expect("slash").kind, TokenKind::Slash);

        let mut lexer = Lexer::start("NS.*,Name", 10).expect("lexer");
        assert_eq!(lexer.read_dotted_identifier(true).expect("wildcard"), "NS.*");
        assert_eq!(lexer.next_token().expect("comma").kind, TokenKind::Comma);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let lexer = Lexer::start("a eq b", 10).expect("lexer");
        assert!(lexer.peek().expect("peek").is_identifier("eq"));
        assert!(lexer.current().is_identifier("a"));
    }
}
