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

//! Error types for OData URI parsing
//!
//! Failures split into two categories: malformed input and failed semantics in query
//! options are bad requests, while path segments that resolve to nothing are not-found.
//! Parsing stops at the first failure, so every error describes exactly one problem.

use thiserror::Error;

use crate::literal::ConversionError;
use crate::path::ODataPath;

/// Result type alias for URI parsing operations
pub type Result<T> = std::result::Result<T, ODataError>;

/// How a failure maps onto a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed syntax or invalid query semantics (400)
    BadRequest,
    /// Path resolution found no resource (404)
    NotFound,
}

/// Path resolution stopped at a segment nothing in the model matches
#[derive(Debug, Clone, PartialEq)]
pub struct UnrecognizedPathError {
    /// Segments resolved before the failure
    pub parsed: ODataPath,
    /// The segment that matched nothing
    pub segment: String,
    /// Raw segments after the offending one
    pub remaining: Vec<String>,
}

/// Every failure the parser and binder report
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ODataError {
    #[error("Syntax error at position {position} in '{text}': {message}")]
    Syntax {
        position: usize,
        text: String,
        message: String,
    },

    #[error("Invalid character '{character}' at position {position} in '{text}'")]
    InvalidCharacter {
        character: char,
        position: usize,
        text: String,
    },

    #[error("Unterminated {what} starting at position {position} in '{text}'")]
    UnterminatedLiteral {
        what: String,
        position: usize,
        text: String,
    },

    #[error("Maximum recursion depth of {max} exceeded")]
    RecursionDepthExceeded { max: usize },

    #[error("Duplicate key property '{name}'")]
    DuplicateKey { name: String },

    #[error("Duplicate parameter '{name}'")]
    DuplicateParameter { name: String },

    #[error("Query option '{name}' specified more than once")]
    DuplicateQueryOption { name: String },

    #[error("Invalid value '{value}' for query option '{option}': {reason}")]
    InvalidQueryOption {
        option: String,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    LiteralConversion(#[from] ConversionError),

    #[error(
        "No resource matches segment '{}' (resolved {} segment(s), {} remaining)",
        .0.segment,
        .0.parsed.len(),
        .0.remaining.len()
    )]
    UnrecognizedPath(Box<UnrecognizedPathError>),

    #[error("Resource not found for segment '{segment}': {message}")]
    ResourceNotFound { segment: String, message: String },

    #[error("Invalid segment '{segment}': {message}")]
    InvalidPath { segment: String, message: String },

    #[error("Property '{property}' is not declared on type '{type_name}'")]
    PropertyNotDeclared { type_name: String, property: String },

    #[error("Unknown type '{type_name}'")]
    UnknownType { type_name: String },

    #[error("Unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error(
        "No function signature for '{name}' matches the arguments; known signatures: {}",
        signatures.join("; ")
    )]
    NoApplicableFunction {
        name: String,
        signatures: Vec<String>,
    },

    #[error(
        "Call to '{name}' is ambiguous at parameter {parameter_index}; candidates: {}",
        candidates.join("; ")
    )]
    AmbiguousFunction {
        name: String,
        parameter_index: usize,
        candidates: Vec<String>,
    },

    #[error("Operator '{operator}' is not defined for operands of type {left} and {right}")]
    IncompatibleOperands {
        operator: String,
        left: String,
        right: String,
    },

    #[error("Type mismatch: expected {expected}, got {actual} in {context}")]
    TypeMismatch {
        expected: String,
        actual: String,
        context: String,
    },

    #[error("Invalid enum literal '{text}': {reason}")]
    InvalidEnumLiteral { text: String, reason: String },

    #[error("Parameter alias '{alias}' refers to itself")]
    ParameterAliasCycle { alias: String },

    #[error("{message}")]
    InvalidBinding { message: String },

    #[error("Invalid model: {message}")]
    InvalidModel { message: String },
}

impl ODataError {
    pub fn syntax(text: &str, position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            text: text.to_string(),
            message: message.into(),
        }
    }

    pub fn binding(message: impl Into<String>) -> Self {
        Self::InvalidBinding {
            message: message.into(),
        }
    }

    pub fn invalid_path(segment: &str, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            segment: segment.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(segment: &str, message: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            segment: segment.to_string(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnrecognizedPath(_) | Self::ResourceNotFound { .. } => ErrorCategory::NotFound,
            _ => ErrorCategory::BadRequest,
        }
    }

    /// Structured details when the failure is an unrecognized path
    pub fn as_unrecognized_path(&self) -> Option<&UnrecognizedPathError> {
        match self {
            Self::UnrecognizedPath(details) => Some(details),
            _ => None,
        }
    }
}
