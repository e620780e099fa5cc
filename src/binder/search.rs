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

//! `$search` trees to semantic nodes

use crate::ast::{BinaryOperator, QueryToken, UnaryOperator};
use crate::error::{ODataError, Result};
use crate::model::{EdmPrimitiveKind, EdmTypeRef};
use crate::semantic::{SearchClause, SemanticNode};

/// Bind a parsed `$search` expression
///
/// Search trees only contain terms combined with `AND`, `OR` and `NOT`; they need no
/// model. Nesting deeper than `max_depth` fails.
pub fn bind_search(token: &QueryToken, max_depth: usize) -> Result<SearchClause> {
    Ok(SearchClause {
        expression: bind_term(token, 1, max_depth)?,
    })
}

fn boolean() -> EdmTypeRef {
    EdmTypeRef::primitive(EdmPrimitiveKind::Boolean, false)
}

/// Terms joined by `AND`/`OR` are walked along the left spine and `NOT` runs are unrolled,
/// so only a parenthesized group reached as an operand adds a level.
fn bind_term(token: &QueryToken, depth: usize, max_depth: usize) -> Result<SemanticNode> {
    if depth > max_depth {
        return Err(ODataError::RecursionDepthExceeded { max: max_depth });
    }
    let mut steps = Vec::new();
    let mut leftmost = token;
    while let QueryToken::BinaryOperator {
        operator: operator @ (BinaryOperator::And | BinaryOperator::Or),
        left,
        right,
    } = leftmost
    {
        steps.push((*operator, right.as_ref()));
        leftmost = left.as_ref();
    }
    let mut node = bind_negations(leftmost, depth, max_depth)?;
    for (operator, right) in steps.into_iter().rev() {
        node = SemanticNode::BinaryOperator {
            operator,
            left: Box::new(node),
            right: Box::new(bind_negations(right, depth, max_depth)?),
            type_ref: boolean(),
        };
    }
    Ok(node)
}

fn bind_negations(token: &QueryToken, depth: usize, max_depth: usize) -> Result<SemanticNode> {
    let mut negations = 0usize;
    let mut operand = token;
    while let QueryToken::UnaryOperator {
        operator: UnaryOperator::Not,
        operand: inner,
    } = operand
    {
        negations += 1;
        operand = inner.as_ref();
    }
    let mut node = match operand {
        QueryToken::SearchTerm { text, .. } => SemanticNode::SearchTerm { text: text.clone() },
        QueryToken::BinaryOperator {
            operator: BinaryOperator::And | BinaryOperator::Or,
            ..
        } => bind_term(operand, depth + 1, max_depth)?,
        other => {
            return Err(ODataError::binding(format!(
                "unexpected node in $search expression: {other:?}"
            )));
        }
    };
    for _ in 0..negations {
        node = SemanticNode::UnaryOperator {
            operator: UnaryOperator::Not,
            operand: Box::new(node),
            type_ref: boolean(),
        };
    }
    Ok(node)
}
