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

//! Built-in, type and schema function calls

use std::sync::Arc;

use crate::ast::{FunctionCallToken, NamedValue, QueryToken};
use crate::error::{ODataError, Result};
use crate::literal::quote;
use crate::model::{EdmPrimitiveKind, EdmTypeRef, ODataValue, Operation};
use crate::registry::{Resolution, builtin_signatures, resolve_overload};
use crate::semantic::SemanticNode;

use super::Binder;
use super::literal::constant;
use super::operator::argument_type;

fn describe(operation: &Operation) -> String {
    let parameters: Vec<String> = operation
        .non_binding_parameters()
        .iter()
        .map(|p| format!("{}: {}", p.name, p.type_name))
        .collect();
    format!("{}({})", operation.full_name(), parameters.join(", "))
}

impl Binder<'_> {
    pub(super) fn bind_function_call(&mut self, call: &FunctionCallToken) -> Result<SemanticNode> {
        match call.name.as_str() {
            "isof" | "cast" => return self.bind_type_function(call),
            name if builtin_signatures(name).is_some() => return self.bind_builtin(call),
            _ => {}
        }
        if call.name.contains('.') {
            return self.bind_schema_function(call);
        }
        Err(ODataError::UnknownFunction {
            name: call.name.clone(),
        })
    }

    fn positional_arguments<'t>(&self, call: &'t FunctionCallToken) -> Result<Vec<&'t QueryToken>> {
        call.arguments
            .iter()
            .map(|argument| match &argument.name {
                Some(name) => Err(ODataError::binding(format!(
                    "'{}' does not take named arguments, found '{name}'",
                    call.name
                ))),
                None => Ok(&argument.value),
            })
            .collect()
    }

    fn bind_builtin(&mut self, call: &FunctionCallToken) -> Result<SemanticNode> {
        if call.source.is_some() {
            return Err(ODataError::binding(format!(
                "built-in function '{}' cannot be called on a path",
                call.name
            )));
        }
        let candidates = builtin_signatures(&call.name).unwrap_or_default();
        let tokens = self.positional_arguments(call)?;
        let mut arguments = Vec::with_capacity(tokens.len());
        for token in tokens {
            arguments.push(self.bind(token)?);
        }

        let types: Vec<_> = arguments.iter().map(argument_type).collect();
        let resolution = resolve_overload(&call.name, candidates, &types)?;
        match resolution {
            Resolution::Resolved(signature) => {
                let context = format!("argument of {}()", call.name);
                let arguments = arguments
                    .into_iter()
                    .zip(signature.parameters.iter())
                    .map(|(argument, parameter)| {
                        self.coerce_to_type(argument, &parameter.to_type_ref(), &context)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(SemanticNode::SingleValueFunctionCall {
                    name: call.name.clone(),
                    arguments,
                    type_ref: signature.return_type.to_type_ref(),
                })
            }
            Resolution::Deferred => Ok(SemanticNode::SingleValueFunctionCall {
                name: call.name.clone(),
                arguments,
                type_ref: EdmTypeRef::untyped(),
            }),
        }
    }

    /// `isof(T)`, `isof(x, T)`, `cast(T)` and `cast(x, T)`
    fn bind_type_function(&mut self, call: &FunctionCallToken) -> Result<SemanticNode> {
        let tokens = self.positional_arguments(call)?;
        let (source, type_token) = match tokens.as_slice() {
            [type_token] => (None, *type_token),
            [source, type_token] => (Some(*source), *type_token),
            _ => {
                return Err(ODataError::binding(format!(
                    "{}() takes one or two arguments, found {}",
                    call.name,
                    tokens.len()
                )));
            }
        };
        let type_name = type_argument(type_token).ok_or_else(|| {
            ODataError::binding(format!("the last argument of {}() must be a type name", call.name))
        })?;
        let target = self
            .model
            .resolve_type_name(&type_name, true)
            .ok_or_else(|| ODataError::UnknownType {
                type_name: type_name.clone(),
            })?;
        let source = match source {
            Some(token) => self.bind(token)?,
            None => SemanticNode::RangeVariableReference(self.state.implicit().clone()),
        };
        let is_collection = source.is_collection();
        let name_node = constant(ODataValue::String(type_name.clone()), quote(&type_name));
        let arguments = vec![source, name_node];

        if call.name == "isof" {
            return Ok(SemanticNode::SingleValueFunctionCall {
                name: call.name.clone(),
                arguments,
                type_ref: EdmTypeRef::primitive(EdmPrimitiveKind::Boolean, false),
            });
        }
        if is_collection {
            return Ok(SemanticNode::CollectionFunctionCall {
                name: call.name.clone(),
                arguments,
                type_ref: EdmTypeRef::collection(target),
            });
        }
        Ok(SemanticNode::SingleValueFunctionCall {
            name: call.name.clone(),
            arguments,
            type_ref: target,
        })
    }

    /// Function declared in the model, bound to the call's source or to `$it`, or unbound
    fn bind_schema_function(&mut self, call: &FunctionCallToken) -> Result<SemanticNode> {
        let binding = match call.source.as_deref() {
            Some(token) => self.bind_token(token)?,
            None => SemanticNode::RangeVariableReference(self.state.implicit().clone()),
        };
        let bound = binding
            .type_ref()
            .map(|t| self.model.find_bound_operations(&call.name, &t))
            .unwrap_or_default();
        let (overloads, binding) = if !bound.is_empty() {
            (bound, Some(binding))
        } else if call.source.is_none() {
            (self.model.find_unbound_operations(&call.name), None)
        } else {
            (Vec::new(), None)
        };
        let functions: Vec<Arc<Operation>> = overloads.into_iter().filter(|op| op.is_function()).collect();
        if functions.is_empty() {
            return Err(ODataError::UnknownFunction {
                name: call.name.clone(),
            });
        }

        let names = argument_names(&call.name, &call.arguments)?;
        let operation = functions
            .iter()
            .find(|op| {
                let parameters = op.non_binding_parameters();
                parameters.len() == names.len()
                    && parameters.iter().all(|p| names.contains(&p.name.as_str()))
            })
            .cloned()
            .ok_or_else(|| ODataError::NoApplicableFunction {
                name: call.name.clone(),
                signatures: functions.iter().map(|op| describe(op)).collect(),
            })?;

        let mut arguments = Vec::with_capacity(operation.parameters.len());
        if let Some(binding) = binding {
            arguments.push(binding);
        }
        for parameter in operation.non_binding_parameters() {
            let token = call
                .arguments
                .iter()
                .find(|a| a.name.as_deref() == Some(parameter.name.as_str()))
                .map(|a| &a.value)
                .ok_or_else(|| ODataError::binding(format!("missing parameter '{}'", parameter.name)))?;
            let node = self.bind(token)?;
            let node = match self.model.resolve_type_name(&parameter.type_name, parameter.nullable) {
                Some(target) => {
                    self.coerce_to_type(node, &target, &format!("parameter '{}'", parameter.name))?
                }
                None => {
                    return Err(ODataError::UnknownType {
                        type_name: parameter.type_name.clone(),
                    });
                }
            };
            arguments.push(node);
        }

        let return_type = operation
            .return_type
            .as_ref()
            .map(|rt| {
                self.model
                    .resolve_type_name(&rt.type_name, rt.nullable)
                    .ok_or_else(|| ODataError::UnknownType {
                        type_name: rt.type_name.clone(),
                    })
            })
            .transpose()?;
        log::debug!("Bound function call {}", describe(&operation));
        Ok(match return_type {
            Some(type_ref) if type_ref.is_collection() => SemanticNode::CollectionFunctionCall {
                name: operation.full_name(),
                arguments,
                type_ref,
            },
            type_ref => SemanticNode::SingleValueFunctionCall {
                name: operation.full_name(),
                arguments,
                type_ref: type_ref.unwrap_or_else(EdmTypeRef::untyped),
            },
        })
    }
}

fn type_argument(token: &QueryToken) -> Option<String> {
    match token {
        QueryToken::DottedIdentifier { name, source: None }
        | QueryToken::PropertyAccess { name, source: None } => Some(name.clone()),
        QueryToken::Literal(literal) => literal.value.as_str().map(str::to_string),
        _ => None,
    }
}

fn argument_names<'t>(function: &str, arguments: &'t [NamedValue]) -> Result<Vec<&'t str>> {
    arguments
        .iter()
        .map(|argument| {
            argument.name.as_deref().ok_or_else(|| {
                ODataError::binding(format!("arguments of '{function}' must be named"))
            })
        })
        .collect()
}
