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

//! Overload resolution with type promotion
//!
//! A candidate is viable when every argument promotes to its parameter. Candidates that
//! keep more literals in their written type rank first. Among those the winner must be
//! at least as cheap as every other candidate at every argument position; when no single
//! candidate dominates, the call is ambiguous.

use crate::error::{ODataError, Result};

use super::promotion::{ArgumentType, LITERAL_RETYPE_COST, promotion_cost};
use super::signature::FunctionSignature;

/// Outcome of resolving a call against its overloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'s> {
    Resolved(&'s FunctionSignature),
    /// A dynamic argument leaves more than one overload open; binding keeps the call
    /// untyped instead of guessing
    Deferred,
}

impl<'s> Resolution<'s> {
    pub fn signature(self) -> Option<&'s FunctionSignature> {
        match self {
            Self::Resolved(signature) => Some(signature),
            Self::Deferred => None,
        }
    }
}

fn costs(signature: &FunctionSignature, arguments: &[ArgumentType<'_>]) -> Option<Vec<u32>> {
    if signature.arity() != arguments.len() {
        return None;
    }
    arguments
        .iter()
        .zip(signature.parameters.iter())
        .map(|(argument, parameter)| promotion_cost(argument, *parameter))
        .collect()
}

/// Number of literals the candidate would have to re-read in another type
fn retypes(cost: &[u32]) -> usize {
    cost.iter().filter(|&&c| c >= LITERAL_RETYPE_COST).count()
}

fn dominates(a: &[u32], b: &[u32]) -> bool {
    a.iter().zip(b).all(|(x, y)| x <= y)
}

/// Pick the best overload of `name` for `arguments`
pub fn resolve_overload<'s>(
    name: &str,
    candidates: &'s [FunctionSignature],
    arguments: &[ArgumentType<'_>],
) -> Result<Resolution<'s>> {
    let viable: Vec<(&'s FunctionSignature, Vec<u32>)> = candidates
        .iter()
        .filter_map(|signature| costs(signature, arguments).map(|c| (signature, c)))
        .collect();

    if viable.is_empty() {
        return Err(ODataError::NoApplicableFunction {
            name: name.to_string(),
            signatures: candidates.iter().map(ToString::to_string).collect(),
        });
    }

    if viable.len() > 1 && arguments.iter().any(ArgumentType::is_dynamic) {
        log::debug!("Deferring '{name}': dynamic argument leaves {} overloads", viable.len());
        return Ok(Resolution::Deferred);
    }

    let fewest = viable.iter().map(|(_, c)| retypes(c)).min().unwrap_or(0);
    let ranked: Vec<(&'s FunctionSignature, Vec<u32>)> = viable
        .into_iter()
        .filter(|(_, c)| retypes(c) == fewest)
        .collect();

    let winners: Vec<&(&FunctionSignature, Vec<u32>)> = ranked
        .iter()
        .filter(|(_, cost)| ranked.iter().all(|(_, other)| dominates(cost, other)))
        .collect();

    match winners.as_slice() {
        [(signature, cost)] => {
            log::debug!("Resolved '{name}' to {signature} (cost {cost:?})");
            Ok(Resolution::Resolved(*signature))
        }
        _ => {
            let contenders: Vec<&(&FunctionSignature, Vec<u32>)> = if winners.is_empty() {
                let best = ranked.iter().map(|(_, c)| c.iter().sum::<u32>()).min();
                ranked
                    .iter()
                    .filter(|(_, c)| Some(c.iter().sum::<u32>()) == best)
                    .collect()
            } else {
                winners
            };
            Err(ambiguity(name, &contenders, &ranked))
        }
    }
}

fn ambiguity(
    name: &str,
    contenders: &[&(&FunctionSignature, Vec<u32>)],
    viable: &[(&FunctionSignature, Vec<u32>)],
) -> ODataError {
    let pool: Vec<&FunctionSignature> = if contenders.len() > 1 {
        contenders.iter().map(|(s, _)| *s).collect()
    } else {
        viable.iter().map(|(s, _)| *s).collect()
    };
    let arity = pool.first().map_or(0, |s| s.arity());
    let parameter_index = (0..arity)
        .find(|&i| pool.windows(2).any(|w| w[0].parameter(i) != w[1].parameter(i)))
        .unwrap_or(0);
    ODataError::AmbiguousFunction {
        name: name.to_string(),
        parameter_index,
        candidates: pool.iter().map(ToString::to_string).collect(),
    }
}
