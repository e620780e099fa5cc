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

//! Typed query nodes
//!
//! Every node carries the type it evaluates to; only open properties and calls whose
//! overload could not be fixed statically have none. Nodes are never mutated once built.

use std::fmt;

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::literal::to_uri_literal;
use crate::model::{EdmPrimitiveKind, EdmTypeRef, EnumValue, NavigationSource, ODataValue};

/// `$it`, `$this` or a lambda parameter
#[derive(Debug, Clone, PartialEq)]
pub struct RangeVariable {
    pub name: String,
    pub type_ref: EdmTypeRef,
    pub navigation_source: Option<NavigationSource>,
}

impl RangeVariable {
    pub const IMPLICIT: &'static str = "$it";

    pub fn implicit(type_ref: EdmTypeRef, navigation_source: Option<NavigationSource>) -> Self {
        Self {
            name: Self::IMPLICIT.to_string(),
            type_ref,
            navigation_source,
        }
    }
}

/// Lambda over a collection with its own range variable
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaNode {
    pub source: SemanticNode,
    /// Absent for the parameterless `any()`
    pub range_variable: Option<RangeVariable>,
    pub body: Option<SemanticNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SemanticNode {
    /// Literal value; untyped only for `null`
    Constant {
        value: ODataValue,
        type_ref: Option<EdmTypeRef>,
        /// Literal text as written, used to retype unsuffixed numbers
        text: String,
    },
    /// List literal on the right of `in`
    CollectionConstant {
        items: Vec<SemanticNode>,
        type_ref: EdmTypeRef,
    },
    EnumValue {
        value: EnumValue,
        type_ref: EdmTypeRef,
    },
    RangeVariableReference(RangeVariable),
    SingleValuePropertyAccess {
        source: Box<SemanticNode>,
        property: String,
        type_ref: EdmTypeRef,
    },
    CollectionPropertyAccess {
        source: Box<SemanticNode>,
        property: String,
        type_ref: EdmTypeRef,
    },
    SingleNavigation {
        source: Box<SemanticNode>,
        navigation: String,
        type_ref: EdmTypeRef,
        navigation_source: Option<NavigationSource>,
    },
    CollectionNavigation {
        source: Box<SemanticNode>,
        navigation: String,
        type_ref: EdmTypeRef,
        navigation_source: Option<NavigationSource>,
    },
    /// Undeclared property on an open type
    OpenPropertyAccess {
        source: Box<SemanticNode>,
        name: String,
    },
    /// Cast of a structured value or collection to a related type
    ResourceCast {
        source: Box<SemanticNode>,
        type_ref: EdmTypeRef,
    },
    SingleValueFunctionCall {
        name: String,
        arguments: Vec<SemanticNode>,
        type_ref: EdmTypeRef,
    },
    CollectionFunctionCall {
        name: String,
        arguments: Vec<SemanticNode>,
        type_ref: EdmTypeRef,
    },
    BinaryOperator {
        operator: BinaryOperator,
        left: Box<SemanticNode>,
        right: Box<SemanticNode>,
        type_ref: EdmTypeRef,
    },
    UnaryOperator {
        operator: UnaryOperator,
        operand: Box<SemanticNode>,
        type_ref: EdmTypeRef,
    },
    /// Implicit conversion inserted by the binder
    Convert {
        source: Box<SemanticNode>,
        type_ref: EdmTypeRef,
    },
    In {
        left: Box<SemanticNode>,
        right: Box<SemanticNode>,
    },
    Any(Box<LambdaNode>),
    All(Box<LambdaNode>),
    /// `collection/$count`
    Count {
        source: Box<SemanticNode>,
    },
    SearchTerm {
        text: String,
    },
}

fn boolean() -> EdmTypeRef {
    EdmTypeRef::primitive(EdmPrimitiveKind::Boolean, false)
}

impl SemanticNode {
    pub fn null() -> Self {
        Self::Constant {
            value: ODataValue::Null,
            type_ref: None,
            text: "null".to_string(),
        }
    }

    /// Type of the value the node yields
    pub fn type_ref(&self) -> Option<EdmTypeRef> {
        match self {
            Self::Constant { type_ref, .. } => type_ref.clone(),
            Self::SingleValueFunctionCall { type_ref, .. }
            | Self::BinaryOperator { type_ref, .. }
            | Self::UnaryOperator { type_ref, .. }
            | Self::CollectionConstant { type_ref, .. }
            | Self::EnumValue { type_ref, .. }
            | Self::SingleValuePropertyAccess { type_ref, .. }
            | Self::CollectionPropertyAccess { type_ref, .. }
            | Self::SingleNavigation { type_ref, .. }
            | Self::CollectionNavigation { type_ref, .. }
            | Self::ResourceCast { type_ref, .. }
            | Self::CollectionFunctionCall { type_ref, .. }
            | Self::Convert { type_ref, .. } => Some(type_ref.clone()),
            Self::RangeVariableReference(variable) => Some(variable.type_ref.clone()),
            Self::OpenPropertyAccess { .. } => None,
            Self::In { .. } | Self::Any(_) | Self::All(_) | Self::SearchTerm { .. } => {
                Some(boolean())
            }
            Self::Count { .. } => Some(EdmTypeRef::primitive(EdmPrimitiveKind::Int64, false)),
        }
    }

    pub fn is_null_constant(&self) -> bool {
        matches!(self, Self::Constant { value, .. } if value.is_null())
    }

    pub fn is_collection(&self) -> bool {
        self.type_ref().is_some_and(|t| t.is_collection())
    }

    /// Navigation source of a node that stands for entities
    pub fn navigation_source(&self) -> Option<NavigationSource> {
        match self {
            Self::RangeVariableReference(variable) => variable.navigation_source.clone(),
            Self::SingleNavigation {
                navigation_source, ..
            }
            | Self::CollectionNavigation {
                navigation_source, ..
            } => navigation_source.clone(),
            Self::ResourceCast { source, .. } => source.navigation_source(),
            _ => None,
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[SemanticNode]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_lambda(f: &mut fmt::Formatter<'_>, keyword: &str, lambda: &LambdaNode) -> fmt::Result {
    write!(f, "{}/{keyword}(", lambda.source)?;
    if let (Some(variable), Some(body)) = (&lambda.range_variable, &lambda.body) {
        write!(f, "{}:{body}", variable.name)?;
    }
    f.write_str(")")
}

/// Compact rendering in filter syntax, fully parenthesized
impl fmt::Display for SemanticNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant { value, .. } => f.write_str(&to_uri_literal(value)),
            Self::CollectionConstant { items, .. } => {
                f.write_str("(")?;
                write_list(f, items)?;
                f.write_str(")")
            }
            Self::EnumValue { value, .. } => {
                f.write_str(&to_uri_literal(&ODataValue::Enum(value.clone())))
            }
            Self::RangeVariableReference(variable) => f.write_str(&variable.name),
            Self::SingleValuePropertyAccess {
                source, property, ..
            }
            | Self::CollectionPropertyAccess {
                source, property, ..
            }
            | Self::SingleNavigation {
                source,
                navigation: property,
                ..
            }
            | Self::CollectionNavigation {
                source,
                navigation: property,
                ..
            }
            | Self::OpenPropertyAccess {
                source,
                name: property,
            } => write!(f, "{source}/{property}"),
            Self::ResourceCast { source, type_ref } => {
                write!(f, "{source}/{}", type_ref.element_type().full_name())
            }
            Self::SingleValueFunctionCall {
                name, arguments, ..
            }
            | Self::CollectionFunctionCall {
                name, arguments, ..
            } => {
                write!(f, "{name}(")?;
                write_list(f, arguments)?;
                f.write_str(")")
            }
            Self::BinaryOperator {
                operator,
                left,
                right,
                ..
            } => write!(f, "({left} {operator} {right})"),
            Self::UnaryOperator {
                operator: UnaryOperator::Negate,
                operand,
                ..
            } => write!(f, "(-{operand})"),
            Self::UnaryOperator {
                operator: UnaryOperator::Not,
                operand,
                ..
            } => write!(f, "(not {operand})"),
            Self::Convert { source, type_ref } => {
                write!(f, "convert({source},{})", type_ref.full_name())
            }
            Self::In { left, right } => write!(f, "({left} in {right})"),
            Self::Any(lambda) => write_lambda(f, "any", lambda),
            Self::All(lambda) => write_lambda(f, "all", lambda),
            Self::Count { source } => write!(f, "{source}/$count"),
            Self::SearchTerm { text } => write!(f, "{text:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i32) -> SemanticNode {
        SemanticNode::Constant {
            value: ODataValue::Int32(value),
            type_ref: Some(EdmTypeRef::primitive(EdmPrimitiveKind::Int32, false)),
            text: value.to_string(),
        }
    }

    #[test]
    fn test_display_and_types() {
        let it = SemanticNode::RangeVariableReference(RangeVariable::implicit(
            EdmTypeRef::untyped(),
            None,
        ));
        let age = SemanticNode::SingleValuePropertyAccess {
            source: Box::new(it),
            property: "Age".to_string(),
            type_ref: EdmTypeRef::primitive(EdmPrimitiveKind::Int32, true),
        };
        let node = SemanticNode::BinaryOperator {
            operator: BinaryOperator::GreaterThan,
            left: Box::new(age),
            right: Box::new(int(3)),
            type_ref: boolean(),
        };
        assert_eq!(node.to_string(), "($it/Age gt 3)");
        assert!(node.type_ref().is_some_and(|t| t.is_boolean()));
        assert!(SemanticNode::null().is_null_constant());
        assert_eq!(SemanticNode::null().type_ref(), None);
    }
}
