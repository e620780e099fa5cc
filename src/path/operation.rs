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

//! Operation and operation-import segments

use std::sync::Arc;

use crate::binder::ParameterAliases;
use crate::config::ParserSettings;
use crate::error::{ODataError, Result};
use crate::model::{EdmModel, EdmTypeRef, NavigationSource, Operation, PropertyLookup};
use crate::parser::parse_function_parameters;

use super::key::segment_value;
use super::segment::NamedSegmentValue;

/// Overloads callable from a segment written as `name` or `name(...)`
///
/// Functions need parentheses, even when empty; actions never take them.
pub(crate) fn callable<'o>(
    segment: &str,
    overloads: &'o [Arc<Operation>],
    parameters: Option<&str>,
) -> Result<Vec<&'o Arc<Operation>>> {
    let wanted: Vec<&Arc<Operation>> = overloads
        .iter()
        .filter(|op| op.is_function() == parameters.is_some())
        .collect();
    if wanted.is_empty() {
        let message = if parameters.is_some() {
            "actions cannot be called with parentheses"
        } else {
            "functions must be called with parentheses"
        };
        return Err(ODataError::invalid_path(segment, message));
    }
    Ok(wanted)
}

/// Choose the overload whose parameter names match the supplied ones
///
/// An exact name match wins; otherwise an overload whose omitted parameters are all
/// nullable is accepted. Actions take their parameters from the request body, so the
/// first action overload is the one addressed.
pub(crate) fn select_overload<'o>(
    segment: &str,
    candidates: &[&'o Arc<Operation>],
    supplied: &[(String, String)],
) -> Result<&'o Arc<Operation>> {
    if let Some(action) = candidates.first().filter(|op| !op.is_function()) {
        return Ok(action);
    }
    fn declares(op: &Operation, name: &str) -> bool {
        op.non_binding_parameters().iter().any(|p| p.name == name)
    }
    let exact = candidates.iter().find(|op| {
        op.non_binding_parameters().len() == supplied.len()
            && supplied.iter().all(|(name, _)| declares(op, name))
    });
    let lenient = || {
        candidates.iter().find(|op| {
            supplied.iter().all(|(name, _)| declares(op, name))
                && op
                    .non_binding_parameters()
                    .iter()
                    .all(|p| p.nullable || supplied.iter().any(|(name, _)| *name == p.name))
        })
    };
    exact
        .or_else(lenient)
        .copied()
        .ok_or_else(|| {
            let names: Vec<&str> = supplied.iter().map(|(name, _)| name.as_str()).collect();
            ODataError::not_found(
                segment,
                format!("no overload takes the parameters ({})", names.join(", ")),
            )
        })
}

/// Parse a parameter list and convert the values in declaration order
pub(crate) fn operation_parameters(
    model: &dyn EdmModel,
    settings: &ParserSettings,
    aliases: Option<&ParameterAliases>,
    operation: &Operation,
    supplied: &[(String, String)],
) -> Result<Vec<NamedSegmentValue>> {
    let mut values = Vec::with_capacity(supplied.len());
    for parameter in operation.non_binding_parameters() {
        let Some((_, raw)) = supplied.iter().find(|(name, _)| *name == parameter.name) else {
            continue;
        };
        let target = model
            .resolve_type_name(&parameter.type_name, parameter.nullable)
            .ok_or_else(|| ODataError::UnknownType {
                type_name: parameter.type_name.clone(),
            })?;
        values.push(NamedSegmentValue {
            name: parameter.name.clone(),
            value: segment_value(raw, &target, settings, aliases, false)?,
        });
    }
    Ok(values)
}

pub(crate) fn parse_parameters(parameters: Option<&str>) -> Result<Vec<(String, String)>> {
    parameters.map_or_else(|| Ok(Vec::new()), parse_function_parameters)
}

pub(crate) fn return_type(model: &dyn EdmModel, operation: &Operation) -> Result<Option<EdmTypeRef>> {
    operation
        .return_type
        .as_ref()
        .map(|rt| {
            model
                .resolve_type_name(&rt.type_name, rt.nullable)
                .ok_or_else(|| ODataError::UnknownType {
                    type_name: rt.type_name.clone(),
                })
        })
        .transpose()
}

/// Navigation source of the entities a bound operation returns, from its entity set path
///
/// The path starts with the binding parameter name and continues with navigation
/// properties followed from the binding source.
pub(crate) fn entity_set_path_target(
    model: &dyn EdmModel,
    operation: &Operation,
    binding_source: Option<&NavigationSource>,
) -> Option<NavigationSource> {
    let path = operation.entity_set_path.as_deref()?;
    let mut source = binding_source?.clone();
    for name in path.split('/').skip(1) {
        let ty = model.navigation_source_type(&source)?;
        let PropertyLookup::Navigation(navigation) = model.find_property(&ty, name)? else {
            return None;
        };
        source = model.navigation_target(&source, name, &navigation)?;
    }
    Some(source)
}
