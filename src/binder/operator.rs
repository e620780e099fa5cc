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

//! Operators, `in` and implicit conversions

use crate::ast::{BinaryOperator, QueryToken, UnaryOperator};
use crate::error::{ODataError, Result};
use crate::literal::numeric::{is_numeric_literal, retype_literal};
use crate::model::{EdmPrimitiveKind, EdmTypeRef};
use crate::registry::{
    ArgumentType, Resolution, binary_signatures, resolve_overload, unary_signatures, widening_cost,
};
use crate::semantic::SemanticNode;

use super::Binder;

/// How `node` presents itself to overload resolution
pub(super) fn argument_type(node: &SemanticNode) -> ArgumentType<'_> {
    if node.is_null_constant() {
        return ArgumentType::Null;
    }
    if let SemanticNode::Constant {
        type_ref: Some(t),
        text,
        ..
    } = node
    {
        if let Some(kind) = t.as_primitive().filter(|k| k.is_numeric()) {
            if is_numeric_literal(text) {
                return ArgumentType::NumericLiteral { kind, text };
            }
        }
    }
    match node.type_ref() {
        None => ArgumentType::Dynamic,
        Some(t) if t.is_untyped() => ArgumentType::Dynamic,
        Some(t) => match t.as_primitive() {
            Some(kind) => ArgumentType::Primitive {
                kind,
                nullable: t.nullable,
            },
            None => ArgumentType::NonPrimitive,
        },
    }
}

fn type_name(node: &SemanticNode) -> String {
    match node.type_ref() {
        Some(t) => t.full_name(),
        None if node.is_null_constant() => "null".to_string(),
        None => "Edm.Untyped".to_string(),
    }
}

fn is_nullable(node: &SemanticNode) -> bool {
    node.is_null_constant() || node.type_ref().is_none_or(|t| t.nullable)
}

fn boolean(nullable: bool) -> EdmTypeRef {
    EdmTypeRef::primitive(EdmPrimitiveKind::Boolean, nullable)
}

/// Result type of an operator whose operands leave the overload open
fn deferred_type(operator: BinaryOperator, nullable: bool) -> EdmTypeRef {
    if operator.is_arithmetic() {
        EdmTypeRef::untyped()
    } else {
        boolean(nullable)
    }
}

enum ChainStep<'t> {
    Binary(BinaryOperator, &'t QueryToken),
    In(&'t QueryToken),
}

fn is_structural(node: &SemanticNode) -> bool {
    node.type_ref()
        .is_some_and(|t| t.is_collection() || t.as_structured().is_some())
}

impl Binder<'_> {
    /// Bring `node` to `target`, inserting a conversion or retyping a literal
    pub(super) fn coerce_to_type(
        &self,
        node: SemanticNode,
        target: &EdmTypeRef,
        context: &str,
    ) -> Result<SemanticNode> {
        if node.is_null_constant() || target.is_untyped() {
            return Ok(node);
        }
        let Some(actual) = node.type_ref() else {
            return Ok(node);
        };
        if actual.is_untyped() {
            return Ok(node);
        }
        if let Some(enum_type) = target.as_enum() {
            return self.coerce_to_enum(node, enum_type);
        }
        let mismatch = || ODataError::TypeMismatch {
            expected: target.full_name(),
            actual: actual.full_name(),
            context: context.to_string(),
        };
        if let Some(expected) = target.element_type().as_structured() {
            let related = actual
                .element_type()
                .as_structured()
                .is_some_and(|ty| self.model.is_derived_from(ty, &expected.full_name()));
            return if related && actual.is_collection() == target.is_collection() {
                Ok(node)
            } else {
                Err(mismatch())
            };
        }
        let (Some(from), Some(to)) = (actual.as_primitive(), target.as_primitive()) else {
            return if actual.is_equivalent_to(target) {
                Ok(node)
            } else {
                Err(mismatch())
            };
        };
        if from == to {
            return Ok(node);
        }
        if let SemanticNode::Constant { text, .. } = &node {
            if let Some(value) = retype_literal(text, to) {
                return Ok(SemanticNode::Constant {
                    value,
                    type_ref: Some(EdmTypeRef::primitive(to, false)),
                    text: text.clone(),
                });
            }
        }
        if widening_cost(from, to).is_some() {
            return Ok(SemanticNode::Convert {
                source: Box::new(node),
                type_ref: target.clone().with_nullable(actual.nullable),
            });
        }
        Err(mismatch())
    }

    /// Left-deep run of binary and `in` operators such as `a and b and c`
    ///
    /// The left spine is walked without recursion, so a long flat chain costs no stack.
    pub(super) fn bind_operator_chain(&mut self, token: &QueryToken) -> Result<SemanticNode> {
        let mut steps = Vec::new();
        let mut leftmost = token;
        loop {
            match leftmost {
                QueryToken::BinaryOperator {
                    operator,
                    left,
                    right,
                } => {
                    steps.push(ChainStep::Binary(*operator, right.as_ref()));
                    leftmost = left.as_ref();
                }
                QueryToken::In { left, right } => {
                    steps.push(ChainStep::In(right.as_ref()));
                    leftmost = left.as_ref();
                }
                _ => break,
            }
        }

        let mut node = self.bind_token(leftmost)?;
        for step in steps.into_iter().rev() {
            node = match step {
                ChainStep::Binary(operator, right) => {
                    let right = self.bind_token(right)?;
                    self.binary_node(operator, node, right)?
                }
                ChainStep::In(right) => self.in_node(node, right)?,
            };
        }
        Ok(node)
    }

    /// Run of prefix operators such as `not not x` or `-(-x)`, bound innermost first
    pub(super) fn bind_unary_chain(&mut self, token: &QueryToken) -> Result<SemanticNode> {
        let mut operators = Vec::new();
        let mut operand = token;
        while let QueryToken::UnaryOperator {
            operator,
            operand: inner,
        } = operand
        {
            operators.push(*operator);
            operand = inner.as_ref();
        }
        let mut node = self.bind_token(operand)?;
        for operator in operators.into_iter().rev() {
            node = self.unary_node(operator, node)?;
        }
        Ok(node)
    }

    fn binary_node(
        &self,
        operator: BinaryOperator,
        left: SemanticNode,
        right: SemanticNode,
    ) -> Result<SemanticNode> {
        let incompatible = |left: &SemanticNode, right: &SemanticNode| ODataError::IncompatibleOperands {
            operator: operator.keyword().to_string(),
            left: type_name(left),
            right: type_name(right),
        };
        let node = |left: SemanticNode, right: SemanticNode, type_ref: EdmTypeRef| {
            SemanticNode::BinaryOperator {
                operator,
                left: Box::new(left),
                right: Box::new(right),
                type_ref,
            }
        };
        let nullable = is_nullable(&left) || is_nullable(&right);

        if operator == BinaryOperator::Has {
            let left_type = left.type_ref();
            return match left_type.as_ref().and_then(EdmTypeRef::as_enum) {
                Some(enum_type) => {
                    let right = self.coerce_to_enum(right, enum_type)?;
                    Ok(node(left, right, boolean(nullable)))
                }
                None if left_type.as_ref().is_none_or(EdmTypeRef::is_untyped) => {
                    Ok(node(left, right, boolean(nullable)))
                }
                None => Err(incompatible(&left, &right)),
            };
        }

        let enum_type = [&left, &right]
            .iter()
            .find_map(|n| n.type_ref().and_then(|t| t.as_enum().cloned()));
        if let Some(enum_type) = enum_type {
            if !operator.is_comparison() {
                return Err(incompatible(&left, &right));
            }
            let left = self.coerce_to_enum(left, &enum_type)?;
            let right = self.coerce_to_enum(right, &enum_type)?;
            return Ok(node(left, right, boolean(nullable)));
        }

        if is_structural(&left) || is_structural(&right) {
            let against_null = left.is_null_constant() || right.is_null_constant();
            return if matches!(operator, BinaryOperator::Equal | BinaryOperator::NotEqual)
                && against_null
            {
                Ok(node(left, right, boolean(false)))
            } else {
                Err(incompatible(&left, &right))
            };
        }

        if left.is_null_constant() && right.is_null_constant() {
            return Ok(node(left, right, deferred_type(operator, true)));
        }

        let arguments = [argument_type(&left), argument_type(&right)];
        let resolution = resolve_overload(operator.keyword(), binary_signatures(operator), &arguments)
            .map_err(|e| match e {
                ODataError::NoApplicableFunction { .. } => incompatible(&left, &right),
                other => other,
            })?;
        match resolution {
            Resolution::Resolved(signature) => {
                let context = format!("operand of '{operator}'");
                let left = self.coerce_to_type(left, &signature.parameters[0].to_type_ref(), &context)?;
                let right =
                    self.coerce_to_type(right, &signature.parameters[1].to_type_ref(), &context)?;
                let type_ref = EdmTypeRef::primitive(signature.return_type.kind, nullable);
                Ok(node(left, right, type_ref))
            }
            Resolution::Deferred => Ok(node(left, right, deferred_type(operator, nullable))),
        }
    }

    fn unary_node(&self, operator: UnaryOperator, operand: SemanticNode) -> Result<SemanticNode> {
        let node = |operand: SemanticNode, type_ref: EdmTypeRef| SemanticNode::UnaryOperator {
            operator,
            operand: Box::new(operand),
            type_ref,
        };
        if operand.is_null_constant() {
            let type_ref = match operator {
                UnaryOperator::Not => boolean(true),
                UnaryOperator::Negate => EdmTypeRef::untyped(),
            };
            return Ok(node(operand, type_ref));
        }

        let arguments = [argument_type(&operand)];
        let resolution = resolve_overload(operator.keyword(), unary_signatures(operator), &arguments)
            .map_err(|e| match e {
                ODataError::NoApplicableFunction { .. } => ODataError::TypeMismatch {
                    expected: match operator {
                        UnaryOperator::Not => "Edm.Boolean".to_string(),
                        UnaryOperator::Negate => "a numeric or duration value".to_string(),
                    },
                    actual: type_name(&operand),
                    context: format!("operand of '{}'", operator.keyword()),
                },
                other => other,
            })?;
        match resolution {
            Resolution::Resolved(signature) => {
                let nullable = is_nullable(&operand);
                let operand = self.coerce_to_type(
                    operand,
                    &signature.parameters[0].to_type_ref(),
                    operator.keyword(),
                )?;
                Ok(node(
                    operand,
                    EdmTypeRef::primitive(signature.return_type.kind, nullable),
                ))
            }
            Resolution::Deferred => {
                let type_ref = match operator {
                    UnaryOperator::Not => boolean(true),
                    UnaryOperator::Negate => EdmTypeRef::untyped(),
                };
                Ok(node(operand, type_ref))
            }
        }
    }

    fn in_node(&mut self, left: SemanticNode, right: &QueryToken) -> Result<SemanticNode> {
        let left_type = left.type_ref();
        if left_type.as_ref().is_some_and(EdmTypeRef::is_collection) {
            return Err(ODataError::binding(format!(
                "the left operand of 'in' must be a single value, found {left}"
            )));
        }
        let hint = left_type.filter(|t| !t.is_untyped());

        let right = match right {
            QueryToken::Collection(items) => self.bind_collection(items, hint.as_ref())?,
            QueryToken::Json {
                value: serde_json::Value::Array(items),
                ..
            } => self.bind_json_collection(items, hint.as_ref())?,
            other => {
                let bound = self.bind_token(other)?;
                match bound.type_ref() {
                    None => bound,
                    Some(t) if t.is_untyped() => bound,
                    Some(t) if t.is_collection() => {
                        if let Some(hint) = &hint {
                            self.check_in_element(hint, t.element_type())?;
                        }
                        bound
                    }
                    Some(t) => {
                        return Err(ODataError::TypeMismatch {
                            expected: "a collection".to_string(),
                            actual: t.full_name(),
                            context: "right operand of 'in'".to_string(),
                        });
                    }
                }
            }
        };
        Ok(SemanticNode::In {
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn check_in_element(&self, left: &EdmTypeRef, element: &EdmTypeRef) -> Result<()> {
        let compatible = match (left.as_primitive(), element.as_primitive()) {
            (Some(a), Some(b)) => widening_cost(a, b).is_some() || widening_cost(b, a).is_some(),
            _ => match (left.as_structured(), element.as_structured()) {
                (Some(a), Some(b)) => self.model.is_related(a, b),
                _ => element.is_untyped() || left.full_name() == element.full_name(),
            },
        };
        if compatible {
            Ok(())
        } else {
            Err(ODataError::TypeMismatch {
                expected: left.full_name(),
                actual: element.full_name(),
                context: "items of 'in'".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{model, range_variable};
    use crate::binder::{ParameterAliases, bind_filter};
    use crate::config::ParserSettings;
    use crate::error::{ODataError, Result};
    use crate::model::EdmPrimitiveKind;
    use crate::parser::parse_filter;
    use crate::semantic::SemanticNode;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn bind(set: &str, text: &str) -> Result<SemanticNode> {
        let model = model();
        let settings = ParserSettings::default();
        let mut aliases = ParameterAliases::default();
        let token = parse_filter(text, settings.max_depth)?;
        bind_filter(&model, &settings, &mut aliases, range_variable(&model, set), &token)
            .map(|c| c.expression)
    }

    #[rstest]
    #[case("Age gt Score", "(convert($it/Age,Edm.Double) gt $it/Score)")]
    #[case("Score gt 1.5", "($it/Score gt 1.5D)")]
    #[case("Salary gt 2", "($it/Salary gt 2M)")]
    #[case("not (Age gt 3)", "(not ($it/Age gt 3))")]
    #[case("Name eq null", "($it/Name eq null)")]
    #[case("BestFriend eq null", "($it/BestFriend eq null)")]
    fn test_operator_binding(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(bind("People", text).expect("binds").to_string(), expected);
    }

    #[test]
    fn test_arithmetic_result_type() {
        let node = bind("People", "Age add 1 gt 3").expect("binds");
        let SemanticNode::BinaryOperator { left, .. } = node else {
            panic!("expected comparison");
        };
        let kind = left.type_ref().and_then(|t| t.as_primitive());
        assert_eq!(kind, Some(EdmPrimitiveKind::Int32));
    }

    #[test]
    fn test_date_arithmetic() {
        let node = bind("People", "Born sub Born gt duration'PT1H'").expect("binds");
        let SemanticNode::BinaryOperator { left, .. } = node else {
            panic!("expected comparison");
        };
        let kind = left.type_ref().and_then(|t| t.as_primitive());
        assert_eq!(kind, Some(EdmPrimitiveKind::Duration));
    }

    #[test]
    fn test_incompatible_operands() {
        let err = bind("People", "Name eq 1").expect_err("string vs int");
        assert!(matches!(err, ODataError::IncompatibleOperands { ref operator, .. } if operator == "eq"));
        assert!(bind("People", "Home eq Home").is_err());
        assert!(bind("People", "true gt false").is_err());
    }

    #[test]
    fn test_not_requires_boolean() {
        assert!(matches!(
            bind("People", "not Name"),
            Err(ODataError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_open_property_comparison_is_deferred() {
        let node = bind("Bags", "Size gt 3").expect("binds");
        assert!(node.type_ref().is_some_and(|t| t.is_boolean()));
        let node = bind("Bags", "Size add 1 gt 3").expect("binds");
        let SemanticNode::BinaryOperator { left, .. } = node else {
            panic!("expected comparison");
        };
        assert!(left.type_ref().is_some_and(|t| t.is_untyped()));

        for text in ["-Size gt 3", "null add null eq 1"] {
            let node = bind("Bags", text).expect("binds");
            let SemanticNode::BinaryOperator { left, .. } = node else {
                panic!("expected comparison");
            };
            assert!(left.type_ref().is_some_and(|t| t.is_untyped()), "{text}");
        }
    }

    #[test]
    fn test_has_requires_enum() {
        assert!(bind("People", "Favorite has NS.Color'Red'").is_ok());
        assert!(matches!(
            bind("People", "Age has NS.Color'Red'"),
            Err(ODataError::IncompatibleOperands { .. })
        ));
    }
}
