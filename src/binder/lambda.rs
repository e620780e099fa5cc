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

//! `any` and `all` over collections

use crate::ast::LambdaToken;
use crate::error::{ODataError, Result};
use crate::model::EdmTypeRef;
use crate::semantic::{LambdaNode, RangeVariable, SemanticNode};

use super::Binder;

impl Binder<'_> {
    pub(super) fn bind_lambda(&mut self, lambda: &LambdaToken, any: bool) -> Result<SemanticNode> {
        let keyword = if any { "any" } else { "all" };
        let source = self.bind_token(&lambda.source)?;
        let element = match source.type_ref() {
            Some(t) if t.is_collection() => t.element_type().clone(),
            None => EdmTypeRef::untyped(),
            Some(t) if t.is_untyped() => t,
            Some(t) => {
                return Err(ODataError::binding(format!(
                    "{keyword}() requires a collection, found {}",
                    t.full_name()
                )));
            }
        };

        let node = match (&lambda.parameter, &lambda.body) {
            (Some(name), Some(body)) => {
                let variable = RangeVariable {
                    name: name.clone(),
                    type_ref: element,
                    navigation_source: source.navigation_source(),
                };
                self.state.push_lambda(variable.clone())?;
                let body = self.bind(body);
                self.state.pop_lambda();
                let body = body?;
                Self::expect_boolean(&body, &format!("{keyword}() body"))?;
                LambdaNode {
                    source,
                    range_variable: Some(variable),
                    body: Some(body),
                }
            }
            _ if any => LambdaNode {
                source,
                range_variable: None,
                body: None,
            },
            _ => {
                return Err(ODataError::binding("all() requires a lambda variable and body"));
            }
        };
        Ok(if any {
            SemanticNode::Any(Box::new(node))
        } else {
            SemanticNode::All(Box::new(node))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{model, range_variable};
    use crate::binder::{ParameterAliases, bind_filter};
    use crate::config::ParserSettings;
    use crate::error::Result;
    use crate::parser::parse_filter;
    use crate::semantic::SemanticNode;
    use pretty_assertions::assert_eq;

    fn bind(text: &str) -> Result<SemanticNode> {
        let model = model();
        let settings = ParserSettings::default();
        let mut aliases = ParameterAliases::default();
        let token = parse_filter(text, settings.max_depth)?;
        bind_filter(&model, &settings, &mut aliases, range_variable(&model, "People"), &token)
            .map(|c| c.expression)
    }

    #[test]
    fn test_any_over_navigation() {
        let node = bind("Friends/any(f: f/Age gt 30)").expect("binds");
        assert_eq!(node.to_string(), "$it/Friends/any(f:(f/Age gt 30))");
        let SemanticNode::Any(lambda) = node else {
            panic!("expected any");
        };
        let variable = lambda.range_variable.expect("variable");
        assert_eq!(variable.type_ref.full_name(), "NS.Person");
        assert_eq!(variable.navigation_source.map(|s| s.name()), Some("People".to_string()));
    }

    #[test]
    fn test_nested_lambdas_see_outer_variables() {
        let node = bind("Friends/any(f: f/Friends/all(g: g/Age gt f/Age))").expect("binds");
        assert!(matches!(node, SemanticNode::Any(_)));
    }

    #[test]
    fn test_any_over_primitive_collection() {
        let node = bind("Emails/any(e: endswith(e, '.org'))").expect("binds");
        assert!(matches!(node, SemanticNode::Any(_)));
        assert!(bind("Emails/any()").is_ok());
    }

    #[test]
    fn test_lambda_errors() {
        assert!(bind("Name/any(x: x eq 'a')").is_err());
        assert!(bind("Friends/any(f: f/Name)").is_err());
        assert!(bind("Friends/all()").is_err());
    }
}
