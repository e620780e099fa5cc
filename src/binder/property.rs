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

//! Member access, type casts and `$count` on bound sources

use crate::ast::QueryToken;
use crate::error::{ODataError, Result};
use crate::model::{EdmTypeRef, PropertyLookup};
use crate::semantic::SemanticNode;

use super::Binder;

impl Binder<'_> {
    fn bind_source(&mut self, source: Option<&QueryToken>) -> Result<SemanticNode> {
        match source {
            Some(token) => self.bind_token(token),
            None => Ok(SemanticNode::RangeVariableReference(
                self.state.implicit().clone(),
            )),
        }
    }

    pub(super) fn bind_property_access(
        &mut self,
        name: &str,
        source: Option<&QueryToken>,
    ) -> Result<SemanticNode> {
        // A bare lambda parameter name reads as a property token without a source
        if source.is_none() {
            if let Some(variable) = self.state.lookup(name) {
                return Ok(SemanticNode::RangeVariableReference(variable.clone()));
            }
        }
        let parent = self.bind_source(source)?;
        self.member_access(parent, name)
    }

    /// Resolve `name` on the type of `parent`
    pub(super) fn member_access(&self, parent: SemanticNode, name: &str) -> Result<SemanticNode> {
        let parent_type = match parent.type_ref() {
            None => return Ok(open_property(parent, name)),
            Some(t) if t.is_untyped() => return Ok(open_property(parent, name)),
            Some(t) => t,
        };
        if parent_type.is_collection() {
            return Err(ODataError::binding(format!(
                "property '{name}' cannot be accessed on collection {parent}; use any() or all()"
            )));
        }
        let Some(structured) = parent_type.as_structured() else {
            return Err(ODataError::binding(format!(
                "property '{name}' cannot be accessed on a value of type {}",
                parent_type.full_name()
            )));
        };

        match self.model.find_property(structured, name) {
            Some(PropertyLookup::Structural(property)) => {
                let type_ref = self.model.property_type(&property).ok_or_else(|| {
                    ODataError::UnknownType {
                        type_name: property.type_name.clone(),
                    }
                })?;
                let source = Box::new(parent);
                Ok(if type_ref.is_collection() {
                    SemanticNode::CollectionPropertyAccess {
                        source,
                        property: property.name,
                        type_ref,
                    }
                } else {
                    SemanticNode::SingleValuePropertyAccess {
                        source,
                        property: property.name,
                        type_ref,
                    }
                })
            }
            Some(PropertyLookup::Navigation(navigation)) => {
                let type_ref = self.model.navigation_type(&navigation).ok_or_else(|| {
                    ODataError::UnknownType {
                        type_name: navigation.target_type.clone(),
                    }
                })?;
                let navigation_source = parent.navigation_source().and_then(|source| {
                    self.model
                        .navigation_target(&source, &navigation.name, &navigation)
                });
                let source = Box::new(parent);
                Ok(if navigation.collection {
                    SemanticNode::CollectionNavigation {
                        source,
                        navigation: navigation.name,
                        type_ref,
                        navigation_source,
                    }
                } else {
                    SemanticNode::SingleNavigation {
                        source,
                        navigation: navigation.name,
                        type_ref,
                        navigation_source,
                    }
                })
            }
            None if self.model.is_open_type(structured) => Ok(open_property(parent, name)),
            None => Err(ODataError::PropertyNotDeclared {
                type_name: structured.full_name(),
                property: name.to_string(),
            }),
        }
    }

    /// `NS.Employee` or `Friends/NS.Employee`
    pub(super) fn bind_dotted_identifier(
        &mut self,
        name: &str,
        source: Option<&QueryToken>,
    ) -> Result<SemanticNode> {
        let parent = self.bind_source(source)?;
        self.cast_to(parent, name)
    }

    pub(super) fn cast_to(&self, parent: SemanticNode, type_name: &str) -> Result<SemanticNode> {
        let target = self
            .model
            .find_structured_type(type_name)
            .ok_or_else(|| ODataError::UnknownType {
                type_name: type_name.to_string(),
            })?;
        let Some(parent_type) = parent.type_ref() else {
            return Ok(SemanticNode::ResourceCast {
                source: Box::new(parent),
                type_ref: EdmTypeRef::structured(target, true),
            });
        };
        let element = parent_type.element_type();
        if let Some(current) = element.as_structured() {
            if !self.model.is_related(current, &target) {
                return Err(ODataError::binding(format!(
                    "type '{type_name}' is not related to {}",
                    current.full_name()
                )));
            }
        } else if !element.is_untyped() {
            return Err(ODataError::binding(format!(
                "cannot cast a value of type {} to '{type_name}'",
                element.full_name()
            )));
        }
        let cast = EdmTypeRef::structured(target, element.nullable);
        let type_ref = if parent_type.is_collection() {
            EdmTypeRef::collection(cast)
        } else {
            cast
        };
        Ok(SemanticNode::ResourceCast {
            source: Box::new(parent),
            type_ref,
        })
    }

    pub(super) fn bind_count(&mut self, source: &QueryToken) -> Result<SemanticNode> {
        let source = self.bind_token(source)?;
        if !source.is_collection() {
            return Err(ODataError::binding(format!(
                "$count requires a collection, found {source}"
            )));
        }
        Ok(SemanticNode::Count {
            source: Box::new(source),
        })
    }

    pub(super) fn bind_range_variable(&mut self, name: &str) -> Result<SemanticNode> {
        self.state
            .lookup(name)
            .cloned()
            .map(SemanticNode::RangeVariableReference)
            .ok_or_else(|| ODataError::binding(format!("range variable '{name}' is not in scope")))
    }
}

fn open_property(parent: SemanticNode, name: &str) -> SemanticNode {
    SemanticNode::OpenPropertyAccess {
        source: Box::new(parent),
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{model, range_variable};
    use crate::binder::{ParameterAliases, bind_filter};
    use crate::config::ParserSettings;
    use crate::error::{ODataError, Result};
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
    #[case("Home/City eq 'Oslo'", "($it/Home/City eq 'Oslo')")]
    #[case("BestFriend/Name eq 'Bo'", "($it/BestFriend/Name eq 'Bo')")]
    #[case("Friends/$count gt 2", "($it/Friends/$count gt 2L)")]
    #[case("NS.Employee/Level eq 1", "($it/NS.Employee/Level eq 1L)")]
    fn test_member_paths(#[case] text: &str, #[case] expected: &str) {
        let node = bind("People", text).expect("binds");
        assert_eq!(node.to_string(), expected);
    }

    #[test]
    fn test_navigation_follows_binding() {
        let node = bind("People", "BestFriend/Name eq 'Bo'").expect("binds");
        let SemanticNode::BinaryOperator { left, .. } = node else {
            panic!("expected comparison");
        };
        let SemanticNode::SingleValuePropertyAccess { source, .. } = left.as_ref() else {
            panic!("expected property access");
        };
        let set = source.navigation_source().expect("bound navigation");
        assert_eq!(set.name(), "People");
    }

    #[test]
    fn test_open_type_accepts_unknown_property() {
        let node = bind("Bags", "Color eq 'red'").expect("binds");
        let SemanticNode::BinaryOperator { left, .. } = node else {
            panic!("expected comparison");
        };
        assert!(matches!(*left, SemanticNode::OpenPropertyAccess { .. }));
    }

    #[test]
    fn test_cast_errors() {
        assert!(matches!(
            bind("People", "NS.Missing/Level eq 1"),
            Err(ODataError::UnknownType { .. })
        ));
        assert!(bind("People", "NS.Bag/ID eq 1").is_err());
    }

    #[test]
    fn test_collection_property_needs_lambda() {
        assert!(bind("People", "Friends/Name eq 'x'").is_err());
        assert!(bind("People", "Name/$count eq 1").is_err());
    }
}
