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

//! Lazily bound, memoized parameter aliases

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::error::{ODataError, Result};
use crate::semantic::SemanticNode;

#[derive(Debug, Clone)]
enum AliasState {
    Resolving,
    Bound(SemanticNode),
}

/// What the binder should do for an alias reference
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AliasLookup {
    /// Already bound in this session
    Cached(SemanticNode),
    /// Not supplied in the query string; evaluates to `null`
    Missing,
    /// Needs binding; the alias is now marked as in progress
    Pending(String),
}

/// Alias values from the query string with the nodes bound for them so far
///
/// Each alias is bound at most once per session. An alias whose value refers back to
/// itself, directly or through other aliases, fails instead of looping.
#[derive(Debug, Clone, Default)]
pub struct ParameterAliases {
    raw: IndexMap<String, String>,
    states: FxHashMap<String, AliasState>,
}

impl ParameterAliases {
    /// `raw` maps `@name` to the decoded value text
    pub fn new(raw: IndexMap<String, String>) -> Self {
        Self {
            raw,
            states: FxHashMap::default(),
        }
    }

    pub fn raw_value(&self, name: &str) -> Option<&str> {
        self.raw.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.raw.contains_key(name)
    }

    pub(crate) fn begin(&mut self, name: &str) -> Result<AliasLookup> {
        match self.states.get(name) {
            Some(AliasState::Bound(node)) => return Ok(AliasLookup::Cached(node.clone())),
            Some(AliasState::Resolving) => {
                return Err(ODataError::ParameterAliasCycle {
                    alias: name.to_string(),
                });
            }
            None => {}
        }
        let Some(text) = self.raw.get(name) else {
            return Ok(AliasLookup::Missing);
        };
        let text = text.clone();
        self.states.insert(name.to_string(), AliasState::Resolving);
        Ok(AliasLookup::Pending(text))
    }

    pub(crate) fn finish(&mut self, name: &str, node: SemanticNode) {
        log::debug!("Bound parameter alias {name} to {node}");
        self.states.insert(name.to_string(), AliasState::Bound(node));
    }

    /// Aliases bound so far, in query string order
    pub fn bound(&self) -> IndexMap<String, SemanticNode> {
        self.raw
            .keys()
            .filter_map(|name| match self.states.get(name) {
                Some(AliasState::Bound(node)) => Some((name.clone(), node.clone())),
                _ => None,
            })
            .collect()
    }
}
