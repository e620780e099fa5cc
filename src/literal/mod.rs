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

//! Literal conversion
//!
//! Converts literal text, exactly as it appears in a URI after percent-decoding, into
//! typed [`ODataValue`]s, and renders values back into literal text. Conversion never
//! coerces silently: a literal either denotes a value of the requested type or fails
//! with a [`ConversionError`] saying why.

pub mod enum_literal;
pub mod numeric;
pub mod primitive;
pub mod spatial;

use thiserror::Error;

pub use enum_literal::parse_enum_value;
pub use numeric::{natural_numeric, natural_numeric_kind};
pub use primitive::{convert, format_duration, to_uri_literal};

/// Why a literal could not be converted to its target type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("'{text}' is not a valid {type_name} literal: {reason}")]
    InvalidLiteral {
        text: String,
        type_name: String,
        reason: String,
    },

    #[error("Literal '{text}' has suffix '{suffix}' which does not denote {type_name}")]
    SuffixMismatch {
        text: String,
        suffix: char,
        type_name: String,
    },

    #[error("Literal '{text}' is out of range for {type_name}")]
    Overflow { text: String, type_name: String },
}

impl ConversionError {
    pub(crate) fn invalid(text: &str, type_name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidLiteral {
            text: text.to_string(),
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn overflow(text: &str, type_name: &str) -> Self {
        Self::Overflow {
            text: text.to_string(),
            type_name: type_name.to_string(),
        }
    }
}

/// Inner text of a single-quoted literal, with doubled quotes collapsed
pub fn unquote(text: &str) -> Option<String> {
    let inner = text.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            // A lone quote inside the literal ends it early
            if chars.next() != Some('\'') {
                return None;
            }
        }
        out.push(c);
    }
    Some(out)
}

/// Single-quote `value`, doubling embedded quotes
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Split `prefix'body'` into the body when the prefix matches one of `prefixes`
/// (ASCII case-insensitive). A bare `'body'` is accepted too.
pub(crate) fn strip_typed_prefix<'a>(text: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    let quote_at = text.find('\'')?;
    let prefix = &text[..quote_at];
    if !prefix.is_empty() && !prefixes.iter().any(|p| p.eq_ignore_ascii_case(prefix)) {
        return None;
    }
    let rest = &text[quote_at..];
    if rest.len() < 2 || !rest.ends_with('\'') {
        return None;
    }
    Some(&rest[1..rest.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_unquote() {
        assert_eq!(unquote("'it''s'"), Some("it's".to_string()));
        assert_eq!(unquote("'a'b'"), None);
        assert_eq!(unquote("abc"), None);
        assert_eq!(quote("it's"), "'it''s'");
    }

    #[test]
    fn test_typed_prefix() {
        assert_eq!(strip_typed_prefix("duration'P1D'", &["duration"]), Some("P1D"));
        assert_eq!(strip_typed_prefix("'P1D'", &["duration"]), Some("P1D"));
        assert_eq!(strip_typed_prefix("Duration'P1D'", &["duration"]), Some("P1D"));
        assert_eq!(strip_typed_prefix("binary'AA'", &["duration"]), None);
        assert_eq!(strip_typed_prefix("P1D", &["duration"]), None);
    }
}
