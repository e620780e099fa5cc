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

//! Lexical tokens of the query-option expression language

use std::fmt;

use crate::model::EdmPrimitiveKind;

/// Lexical class of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Identifiers, including word operators such as `eq` and `and`
    Identifier,
    NullLiteral,
    BooleanLiteral,
    StringLiteral,
    /// Unsuffixed integer fitting Int32
    IntegerLiteral,
    Int64Literal,
    SingleLiteral,
    DoubleLiteral,
    DecimalLiteral,
    GuidLiteral,
    DateLiteral,
    DateTimeOffsetLiteral,
    TimeOfDayLiteral,
    DurationLiteral,
    BinaryLiteral,
    GeographyLiteral,
    GeometryLiteral,
    /// `Namespace.Type'...'`, usually an enum literal
    QuotedLiteral,
    /// `@name`
    ParameterAlias,
    /// JSON array or object, brackets included
    BracketedExpression,
    OpenParen,
    CloseParen,
    Comma,
    Slash,
    Dot,
    Star,
    Equal,
    Semicolon,
    Colon,
    Minus,
    End,
}

impl TokenKind {
    /// Natural primitive type of a literal token
    pub fn literal_type(self) -> Option<EdmPrimitiveKind> {
        use EdmPrimitiveKind as K;
        Some(match self {
            Self::BooleanLiteral => K::Boolean,
            Self::StringLiteral => K::String,
            Self::IntegerLiteral => K::Int32,
            Self::Int64Literal => K::Int64,
            Self::SingleLiteral => K::Single,
            Self::DoubleLiteral => K::Double,
            Self::DecimalLiteral => K::Decimal,
            Self::GuidLiteral => K::Guid,
            Self::DateLiteral => K::Date,
            Self::DateTimeOffsetLiteral => K::DateTimeOffset,
            Self::TimeOfDayLiteral => K::TimeOfDay,
            Self::DurationLiteral => K::Duration,
            Self::BinaryLiteral => K::Binary,
            Self::GeographyLiteral => K::Geography,
            Self::GeometryLiteral => K::Geometry,
            _ => return None,
        })
    }

    pub fn is_literal(self) -> bool {
        self == Self::NullLiteral || self.literal_type().is_some()
    }

    pub fn from_numeric_type(kind: EdmPrimitiveKind) -> Self {
        match kind {
            EdmPrimitiveKind::Int64 => Self::Int64Literal,
            EdmPrimitiveKind::Single => Self::SingleLiteral,
            EdmPrimitiveKind::Double => Self::DoubleLiteral,
            EdmPrimitiveKind::Decimal => Self::DecimalLiteral,
            _ => Self::IntegerLiteral,
        }
    }
}

/// A token and the slice of input it was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of the first character
    pub position: usize,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, text: &'a str, position: usize) -> Self {
        Self {
            kind,
            text,
            position,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Identifier token with exactly this text
    pub fn is_identifier(&self, text: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == text
    }

    pub fn identifier(&self) -> Option<&'a str> {
        (self.kind == TokenKind::Identifier).then_some(self.text)
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == TokenKind::End {
            f.write_str("end of input")
        } else {
            write!(f, "'{}'", self.text)
        }
    }
}
