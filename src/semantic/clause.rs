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

//! Bound query option clauses

use crate::ast::OrderDirection;
use crate::model::NavigationSource;
use crate::path::PathSegment;

use super::node::{RangeVariable, SemanticNode};

#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub expression: SemanticNode,
    pub range_variable: RangeVariable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expression: SemanticNode,
    pub direction: OrderDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub items: Vec<OrderByItem>,
    pub range_variable: RangeVariable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchClause {
    pub expression: SemanticNode,
}

/// Bound `$levels`; `max` is replaced by the configured expansion limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelsClause {
    pub is_max: bool,
    pub level: i64,
}

/// Options that apply to a selected collection or an expanded navigation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedClauses {
    pub filter: Option<FilterClause>,
    pub order_by: Option<OrderByClause>,
    pub top: Option<i64>,
    pub skip: Option<i64>,
    pub count: Option<bool>,
    pub search: Option<SearchClause>,
    pub levels: Option<LevelsClause>,
    pub select_expand: Option<Box<SelectExpandClause>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// Property, type-cast, navigation link or operation path
    Path {
        path: Vec<PathSegment>,
        options: NestedClauses,
    },
    Wildcard,
    /// `Namespace.*`: every operation in the namespace
    NamespaceWildcard(String),
    ExpandedNavigation {
        path: Vec<PathSegment>,
        navigation_source: Option<NavigationSource>,
        options: NestedClauses,
    },
    ExpandedReference {
        path: Vec<PathSegment>,
        navigation_source: Option<NavigationSource>,
        options: NestedClauses,
    },
    ExpandedCount {
        path: Vec<PathSegment>,
        filter: Option<FilterClause>,
        search: Option<SearchClause>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectExpandClause {
    pub items: Vec<SelectItem>,
    /// No explicit `$select`, or `*` among the selected items
    pub all_selected: bool,
}

impl SelectExpandClause {
    pub fn selected(&self) -> impl Iterator<Item = &SelectItem> {
        self.items.iter().filter(|item| {
            matches!(
                item,
                SelectItem::Path { .. } | SelectItem::Wildcard | SelectItem::NamespaceWildcard(_)
            )
        })
    }

    pub fn expanded(&self) -> impl Iterator<Item = &SelectItem> {
        self.items.iter().filter(|item| {
            matches!(
                item,
                SelectItem::ExpandedNavigation { .. }
                    | SelectItem::ExpandedReference { .. }
                    | SelectItem::ExpandedCount { .. }
            )
        })
    }
}
