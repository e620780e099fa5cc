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

//! Binding scope: range variables in play and the recursion guard

use crate::error::{ODataError, Result};
use crate::model::EdmTypeRef;
use crate::semantic::RangeVariable;

/// Scope threaded through one clause's binding
#[derive(Debug, Clone)]
pub struct BindingState {
    implicit: RangeVariable,
    /// Lambda parameters, innermost last
    lambdas: Vec<RangeVariable>,
    depth: usize,
    max_depth: usize,
}

impl BindingState {
    pub fn new(implicit: RangeVariable, max_depth: usize) -> Self {
        Self {
            implicit,
            lambdas: Vec::new(),
            depth: 0,
            max_depth,
        }
    }

    pub fn implicit(&self) -> &RangeVariable {
        &self.implicit
    }

    pub fn implicit_type(&self) -> &EdmTypeRef {
        &self.implicit.type_ref
    }

    /// `$it` and `$this` name the implicit variable; anything else is a lambda parameter
    pub fn lookup(&self, name: &str) -> Option<&RangeVariable> {
        if name == RangeVariable::IMPLICIT || name == "$this" {
            return Some(&self.implicit);
        }
        self.lambdas.iter().rev().find(|v| v.name == name)
    }

    pub fn push_lambda(&mut self, variable: RangeVariable) -> Result<()> {
        if self.lookup(&variable.name).is_some() {
            return Err(ODataError::binding(format!(
                "range variable '{}' is already in scope",
                variable.name
            )));
        }
        self.lambdas.push(variable);
        Ok(())
    }

    pub fn pop_lambda(&mut self) {
        self.lambdas.pop();
    }

    pub fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ODataError::RecursionDepthExceeded {
                max: self.max_depth,
            });
        }
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(name: &str) -> RangeVariable {
        RangeVariable {
            name: name.to_string(),
            type_ref: EdmTypeRef::untyped(),
            navigation_source: None,
        }
    }

    #[test]
    fn test_scopes() {
        let mut state = BindingState::new(RangeVariable::implicit(EdmTypeRef::untyped(), None), 2);
        assert!(state.lookup("$this").is_some());
        state.push_lambda(variable("o")).expect("push");
        assert!(state.lookup("o").is_some());
        assert!(state.push_lambda(variable("o")).is_err());
        state.pop_lambda();
        assert!(state.lookup("o").is_none());
    }

    #[test]
    fn test_depth_guard() {
        let mut state = BindingState::new(RangeVariable::implicit(EdmTypeRef::untyped(), None), 2);
        state.enter().expect("1");
        state.enter().expect("2");
        assert!(state.enter().is_err());
    }
}
