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

//! Untyped trees for `$select` and `$expand`

use serde::Serialize;

use super::expression::{OrderByToken, QueryToken};

/// One comma-separated item of `$select`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectTermToken {
    /// Path segments; the last may be `*` or `Namespace.*`
    pub path: Vec<String>,
    pub options: NestedOptions,
}

/// One comma-separated item of `$expand`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandTermToken {
    /// Navigation path, possibly with type-cast segments; `*` alone expands everything
    pub path: Vec<String>,
    /// Ends in `/$ref`
    pub is_ref: bool,
    /// Ends in `/$count`
    pub is_count: bool,
    pub options: NestedOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectToken {
    pub terms: Vec<SelectTermToken>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpandToken {
    pub terms: Vec<ExpandTermToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LevelsToken {
    Max,
    Value(i64),
}

/// Options in parentheses after a select or expand item
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NestedOptions {
    pub filter: Option<QueryToken>,
    pub order_by: Option<Vec<OrderByToken>>,
    pub top: Option<i64>,
    pub skip: Option<i64>,
    pub count: Option<bool>,
    pub levels: Option<LevelsToken>,
    pub search: Option<QueryToken>,
    pub select: Option<SelectToken>,
    pub expand: Option<ExpandToken>,
}

impl NestedOptions {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
