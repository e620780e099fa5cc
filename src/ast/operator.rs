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

//! Operators of the filter expression language

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators, all written as lowercase keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Logical operators
    /// Logical OR (or)
    Or,
    /// Logical AND (and)
    And,

    // Comparison operators
    /// Equality (eq)
    Equal,
    /// Inequality (ne)
    NotEqual,
    /// Greater than (gt)
    GreaterThan,
    /// Greater than or equal (ge)
    GreaterThanOrEqual,
    /// Less than (lt)
    LessThan,
    /// Less than or equal (le)
    LessThanOrEqual,
    /// Enum flag test (has)
    Has,

    // Arithmetic operators
    /// Addition (add)
    Add,
    /// Subtraction (sub)
    Subtract,
    /// Multiplication (mul)
    Multiply,
    /// Division (div), integral for integral operands
    Divide,
    /// Decimal division (divby)
    DivideBy,
    /// Modulo (mod)
    Modulo,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// Arithmetic negation (-)
    Negate,
    /// Logical negation (not)
    Not,
}

impl BinaryOperator {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "or" => Self::Or,
            "and" => Self::And,
            "eq" => Self::Equal,
            "ne" => Self::NotEqual,
            "gt" => Self::GreaterThan,
            "ge" => Self::GreaterThanOrEqual,
            "lt" => Self::LessThan,
            "le" => Self::LessThanOrEqual,
            "has" => Self::Has,
            "add" => Self::Add,
            "sub" => Self::Subtract,
            "mul" => Self::Multiply,
            "div" => Self::Divide,
            "divby" => Self::DivideBy,
            "mod" => Self::Modulo,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Or => "or",
            Self::And => "and",
            Self::Equal => "eq",
            Self::NotEqual => "ne",
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEqual => "ge",
            Self::LessThan => "lt",
            Self::LessThanOrEqual => "le",
            Self::Has => "has",
            Self::Add => "add",
            Self::Subtract => "sub",
            Self::Multiply => "mul",
            Self::Divide => "div",
            Self::DivideBy => "divby",
            Self::Modulo => "mod",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::Or | Self::And)
    }

    /// Equality and ordering comparisons, which always yield Boolean
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::GreaterThan
                | Self::GreaterThanOrEqual
                | Self::LessThan
                | Self::LessThanOrEqual
        )
    }

    /// Comparisons that need ordered operands
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            Self::GreaterThan | Self::GreaterThanOrEqual | Self::LessThan | Self::LessThanOrEqual
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::DivideBy | Self::Modulo
        )
    }
}

impl UnaryOperator {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::Not => "not",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_round_trip() {
        for keyword in [
            "or", "and", "eq", "ne", "gt", "ge", "lt", "le", "has", "add", "sub", "mul", "div",
            "divby", "mod",
        ] {
            let op = BinaryOperator::from_keyword(keyword).expect("known keyword");
            assert_eq!(op.keyword(), keyword);
        }
        assert_eq!(BinaryOperator::from_keyword("EQ"), None);
    }

    #[test]
    fn test_classification() {
        assert!(!BinaryOperator::Has.is_comparison());
        assert!(BinaryOperator::LessThan.is_relational());
        assert!(BinaryOperator::DivideBy.is_arithmetic());
        assert!(BinaryOperator::And.is_logical());
    }
}
