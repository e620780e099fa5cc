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

//! Constants, enum literals and collection literals

use std::sync::Arc;

use crate::ast::{LiteralToken, QueryToken};
use crate::error::{ODataError, Result};
use crate::literal::numeric::natural_numeric;
use crate::literal::parse_enum_value;
use crate::literal::primitive::convert_primitive;
use crate::model::{EdmPrimitiveKind, EdmTypeRef, EnumType, ODataValue};
use crate::semantic::SemanticNode;

use super::Binder;

pub(super) fn constant(value: ODataValue, text: impl Into<String>) -> SemanticNode {
    let type_ref = match &value {
        ODataValue::Null => None,
        ODataValue::Json(_) => Some(EdmTypeRef::untyped()),
        other => other.kind().map(|kind| EdmTypeRef::primitive(kind, false)),
    };
    SemanticNode::Constant {
        value,
        type_ref,
        text: text.into(),
    }
}

pub(super) fn bind_literal(literal: &LiteralToken) -> SemanticNode {
    constant(literal.value.clone(), literal.text.clone())
}

pub(super) fn bind_json(value: &serde_json::Value, text: &str) -> SemanticNode {
    constant(ODataValue::Json(value.clone()), text)
}

fn enum_error(text: &str, reason: impl Into<String>) -> ODataError {
    ODataError::InvalidEnumLiteral {
        text: text.to_string(),
        reason: reason.into(),
    }
}

impl Binder<'_> {
    /// `NS.Color'Red,Green'`
    pub(super) fn bind_custom_literal(
        &self,
        type_name: &str,
        body: &str,
        text: &str,
    ) -> Result<SemanticNode> {
        let enum_type = self
            .model
            .find_enum_type(type_name)
            .ok_or_else(|| enum_error(text, format!("'{type_name}' is not an enum type")))?;
        let value = parse_enum_value(&enum_type, body).map_err(|e| enum_error(text, e.to_string()))?;
        Ok(SemanticNode::EnumValue {
            value,
            type_ref: EdmTypeRef::enumeration(enum_type, false),
        })
    }

    /// Bring `node` to `enum_type`, parsing string and integral constants as members
    pub(super) fn coerce_to_enum(
        &self,
        node: SemanticNode,
        enum_type: &Arc<EnumType>,
    ) -> Result<SemanticNode> {
        let full_name = enum_type.full_name();
        let literal_text = match &node {
            SemanticNode::Constant { value, .. } if value.is_null() => return Ok(node),
            SemanticNode::Constant {
                value: ODataValue::String(text),
                ..
            } => Some(text.clone()),
            SemanticNode::Constant { value, text, .. }
                if value.kind().is_some_and(EdmPrimitiveKind::is_integral) =>
            {
                Some(text.clone())
            }
            _ => None,
        };
        if let Some(text) = literal_text {
            let value =
                parse_enum_value(enum_type, &text).map_err(|e| enum_error(&text, e.to_string()))?;
            return Ok(SemanticNode::EnumValue {
                value,
                type_ref: EdmTypeRef::enumeration(Arc::clone(enum_type), false),
            });
        }
        match node.type_ref() {
            None => Ok(node),
            Some(t) if t.is_untyped() => Ok(node),
            Some(t) if t.as_enum().is_some_and(|e| e.full_name() == full_name) => Ok(node),
            Some(t) => Err(ODataError::TypeMismatch {
                expected: full_name,
                actual: t.full_name(),
                context: "enum operand".to_string(),
            }),
        }
    }

    /// `(a,b,c)`; items are literals, brought to `element` when one is known
    pub(super) fn bind_collection(
        &mut self,
        items: &[QueryToken],
        element: Option<&EdmTypeRef>,
    ) -> Result<SemanticNode> {
        self.state.enter()?;
        let bound = items
            .iter()
            .map(|item| self.bind(item))
            .collect::<Result<Vec<_>>>();
        self.state.leave();
        self.collection_constant(bound?, element)
    }

    /// JSON array on the right of `in`
    pub(super) fn bind_json_collection(
        &self,
        items: &[serde_json::Value],
        element: Option<&EdmTypeRef>,
    ) -> Result<SemanticNode> {
        let target_kind = element.and_then(EdmTypeRef::as_primitive);
        let mut bound = Vec::with_capacity(items.len());
        for item in items {
            let text = item.to_string();
            let node = match item {
                serde_json::Value::Null => SemanticNode::null(),
                serde_json::Value::Bool(b) => constant(ODataValue::Boolean(*b), text),
                serde_json::Value::Number(_) => constant(natural_numeric(&text)?, text),
                serde_json::Value::String(s) => match target_kind {
                    Some(kind) if kind != EdmPrimitiveKind::String => {
                        constant(convert_primitive(s, kind)?, s.clone())
                    }
                    _ => constant(ODataValue::String(s.clone()), text),
                },
                other => constant(ODataValue::Json(other.clone()), text),
            };
            bound.push(node);
        }
        self.collection_constant(bound, element)
    }

    fn collection_constant(
        &self,
        items: Vec<SemanticNode>,
        element: Option<&EdmTypeRef>,
    ) -> Result<SemanticNode> {
        let mut converted = Vec::with_capacity(items.len());
        for item in items {
            if !matches!(
                item,
                SemanticNode::Constant { .. } | SemanticNode::EnumValue { .. }
            ) {
                return Err(ODataError::binding(format!(
                    "collection literals may only contain literal values, found {item}"
                )));
            }
            let item = match element {
                Some(target) if !target.is_collection() => {
                    self.coerce_to_type(item, target, "collection item")?
                }
                _ => item,
            };
            converted.push(item);
        }
        let element_type = element
            .filter(|t| !t.is_collection())
            .cloned()
            .or_else(|| converted.iter().find_map(SemanticNode::type_ref))
            .unwrap_or_else(EdmTypeRef::untyped);
        Ok(SemanticNode::CollectionConstant {
            items: converted,
            type_ref: EdmTypeRef::collection(element_type),
        })
    }
}
