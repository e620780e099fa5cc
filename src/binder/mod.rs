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

//! Semantic binding of syntax trees against the model
//!
//! A [`Binder`] walks one clause's untyped tree inside a [`BindingState`] and produces
//! typed [`SemanticNode`]s. Names resolve against the current type and the model;
//! operators and built-in functions resolve through the overload tables, with implicit
//! conversions inserted where a promotion was needed.

mod alias;
mod function;
mod lambda;
mod literal;
mod operator;
mod property;
mod search;
mod select_expand;
mod state;

pub use alias::ParameterAliases;
pub use search::bind_search;
pub use select_expand::bind_select_expand;
pub use state::BindingState;

use crate::ast::{OrderByToken, QueryToken};
use crate::config::ParserSettings;
use crate::error::{ODataError, Result};
use crate::model::EdmModel;
use crate::parser::parse_filter;
use crate::semantic::{FilterClause, OrderByClause, OrderByItem, RangeVariable, SemanticNode};

use alias::AliasLookup;

/// Binds the trees of one clause
pub struct Binder<'a> {
    model: &'a dyn EdmModel,
    settings: &'a ParserSettings,
    aliases: &'a mut ParameterAliases,
    state: BindingState,
}

impl<'a> Binder<'a> {
    pub fn new(
        model: &'a dyn EdmModel,
        settings: &'a ParserSettings,
        aliases: &'a mut ParameterAliases,
        implicit: RangeVariable,
    ) -> Self {
        Self {
            model,
            settings,
            aliases,
            state: BindingState::new(implicit, settings.max_depth),
        }
    }

    pub fn state(&self) -> &BindingState {
        &self.state
    }

    /// Bind one expression
    ///
    /// Each call is one nesting level, matching the parser: the clause itself, function
    /// arguments, lambda bodies, `in` list items and parameter alias values.
    pub fn bind(&mut self, token: &QueryToken) -> Result<SemanticNode> {
        self.state.enter()?;
        let result = self.bind_token(token);
        self.state.leave();
        result
    }

    /// Bind a token that belongs to the expression currently being bound
    fn bind_token(&mut self, token: &QueryToken) -> Result<SemanticNode> {
        match token {
            QueryToken::Literal(literal) => Ok(literal::bind_literal(literal)),
            QueryToken::CustomLiteral {
                type_name,
                body,
                text,
            } => self.bind_custom_literal(type_name, body, text),
            QueryToken::Json { value, text } => Ok(literal::bind_json(value, text)),
            QueryToken::PropertyAccess { name, source } => {
                self.bind_property_access(name, source.as_deref())
            }
            QueryToken::DottedIdentifier { name, source } => {
                self.bind_dotted_identifier(name, source.as_deref())
            }
            QueryToken::FunctionCall(call) => self.bind_function_call(call),
            QueryToken::BinaryOperator { .. } | QueryToken::In { .. } => {
                self.bind_operator_chain(token)
            }
            QueryToken::UnaryOperator { .. } => self.bind_unary_chain(token),
            QueryToken::Any(lambda) => self.bind_lambda(lambda, true),
            QueryToken::All(lambda) => self.bind_lambda(lambda, false),
            QueryToken::RangeVariable { name } => self.bind_range_variable(name),
            QueryToken::ParameterAlias { name } => self.bind_alias(name),
            QueryToken::CountSegment { source } => self.bind_count(source),
            QueryToken::Collection(items) => self.bind_collection(items, None),
            QueryToken::SearchTerm { text, .. } => Err(ODataError::binding(format!(
                "search term '{text}' is only valid in $search"
            ))),
        }
    }

    fn bind_alias(&mut self, name: &str) -> Result<SemanticNode> {
        match self.aliases.begin(name)? {
            AliasLookup::Cached(node) => Ok(node),
            AliasLookup::Missing => Ok(SemanticNode::null()),
            AliasLookup::Pending(text) => {
                let token = parse_filter(&text, self.settings.max_depth)?;
                let node = self.bind(&token)?;
                self.aliases.finish(name, node.clone());
                Ok(node)
            }
        }
    }

    /// Fail unless `node` can stand where a boolean is required
    fn expect_boolean(node: &SemanticNode, context: &str) -> Result<()> {
        match node.type_ref() {
            None => Ok(()),
            Some(t) if t.is_boolean() || t.is_untyped() => Ok(()),
            Some(t) => Err(ODataError::TypeMismatch {
                expected: "Edm.Boolean".to_string(),
                actual: t.full_name(),
                context: context.to_string(),
            }),
        }
    }
}

/// Bind a `$filter` tree; the result must be boolean
pub fn bind_filter(
    model: &dyn EdmModel,
    settings: &ParserSettings,
    aliases: &mut ParameterAliases,
    range_variable: RangeVariable,
    token: &QueryToken,
) -> Result<FilterClause> {
    let mut binder = Binder::new(model, settings, aliases, range_variable.clone());
    let expression = binder.bind(token)?;
    Binder::expect_boolean(&expression, "$filter")?;
    Ok(FilterClause {
        expression,
        range_variable,
    })
}

/// Bind `$orderby` items; each must be a single primitive or enum value
pub fn bind_order_by(
    model: &dyn EdmModel,
    settings: &ParserSettings,
    aliases: &mut ParameterAliases,
    range_variable: RangeVariable,
    tokens: &[OrderByToken],
) -> Result<OrderByClause> {
    let mut binder = Binder::new(model, settings, aliases, range_variable.clone());
    let mut items = Vec::with_capacity(tokens.len());
    for token in tokens {
        let expression = binder.bind(&token.expression)?;
        if let Some(t) = expression.type_ref() {
            if t.is_collection() || t.as_structured().is_some() {
                return Err(ODataError::TypeMismatch {
                    expected: "a single primitive value".to_string(),
                    actual: t.full_name(),
                    context: "$orderby".to_string(),
                });
            }
        }
        items.push(OrderByItem {
            expression,
            direction: token.direction,
        });
    }
    Ok(OrderByClause {
        items,
        range_variable,
    })
}
