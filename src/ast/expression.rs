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

//! Untyped syntax tree for filter, orderby and search expressions
//!
//! Nothing here is resolved against metadata: a `PropertyAccess` is just a name and
//! `FunctionCall` is just a name with arguments. The binder gives them meaning.

use serde::Serialize;

use super::operator::{BinaryOperator, UnaryOperator};
use crate::model::ODataValue;

/// Syntax tree node
///
/// Large variants are boxed to keep the enum small.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum QueryToken {
    /// Literal with its natural value and source text
    Literal(LiteralToken),

    /// `Namespace.Type'...'`, bound as an enum member list or a typed literal
    CustomLiteral {
        type_name: String,
        /// Text between the quotes, with doubled quotes collapsed
        body: String,
        text: String,
    },

    /// JSON array or object
    Json { value: serde_json::Value, text: String },

    /// `source/name` or a bare `name`
    PropertyAccess {
        name: String,
        source: Option<Box<QueryToken>>,
    },

    /// Qualified name in a path, a type cast such as `NS.Manager`
    DottedIdentifier {
        name: String,
        source: Option<Box<QueryToken>>,
    },

    FunctionCall(Box<FunctionCallToken>),

    BinaryOperator {
        operator: BinaryOperator,
        left: Box<QueryToken>,
        right: Box<QueryToken>,
    },

    UnaryOperator {
        operator: UnaryOperator,
        operand: Box<QueryToken>,
    },

    /// `left in right`
    In {
        left: Box<QueryToken>,
        right: Box<QueryToken>,
    },

    Any(Box<LambdaToken>),
    All(Box<LambdaToken>),

    /// `$it`, `$this` or a lambda variable
    RangeVariable { name: String },

    /// `@name`, resolved from the query string
    ParameterAlias { name: String },

    /// `source/$count`
    CountSegment { source: Box<QueryToken> },

    /// `(a,b,c)` on the right of `in`
    Collection(Vec<QueryToken>),

    /// Word or phrase in a search expression
    SearchTerm { text: String, phrase: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiteralToken {
    pub value: ODataValue,
    pub text: String,
}

/// Function or operation call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCallToken {
    /// Possibly qualified name, e.g. `contains` or `NS.MostExpensive`
    pub name: String,
    pub arguments: Vec<NamedValue>,
    /// Instance the call is made on, for bound operations
    pub source: Option<Box<QueryToken>>,
}

/// Argument that may carry a parameter name, as in `Fn(p=1)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedValue {
    pub name: Option<String>,
    pub value: QueryToken,
}

/// `source/any(x: body)` or `source/all(x: body)`
///
/// `any()` with no arguments has neither a parameter nor a body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LambdaToken {
    pub source: QueryToken,
    pub parameter: Option<String>,
    pub body: Option<QueryToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderByToken {
    pub expression: QueryToken,
    pub direction: OrderDirection,
}

impl QueryToken {
    pub fn literal(value: ODataValue, text: impl Into<String>) -> Self {
        Self::Literal(LiteralToken {
            value,
            text: text.into(),
        })
    }

    pub fn property(name: impl Into<String>, source: Option<QueryToken>) -> Self {
        Self::PropertyAccess {
            name: name.into(),
            source: source.map(Box::new),
        }
    }

    pub fn binary(operator: BinaryOperator, left: QueryToken, right: QueryToken) -> Self {
        Self::BinaryOperator {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(operator: UnaryOperator, operand: QueryToken) -> Self {
        Self::UnaryOperator {
            operator,
            operand: Box::new(operand),
        }
    }

    pub fn function(name: impl Into<String>, arguments: Vec<NamedValue>, source: Option<QueryToken>) -> Self {
        Self::FunctionCall(Box::new(FunctionCallToken {
            name: name.into(),
            arguments,
            source: source.map(Box::new),
        }))
    }

    pub fn search_term(text: impl Into<String>, phrase: bool) -> Self {
        Self::SearchTerm {
            text: text.into(),
            phrase,
        }
    }
}

impl NamedValue {
    pub fn positional(value: QueryToken) -> Self {
        Self { name: None, value }
    }
}
