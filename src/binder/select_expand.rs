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

//! Binding `$select` and `$expand` against the target type
//!
//! Select paths walk complex properties and type casts and may end in a navigation
//! link, a bound operation or an open property. Expand paths must reach exactly one
//! navigation property, optionally followed by a cast. Nested options bind against the
//! element type of what the item selects.

use std::sync::Arc;

use crate::ast::{ExpandTermToken, ExpandToken, LevelsToken, NestedOptions, SelectTermToken, SelectToken};
use crate::config::ParserSettings;
use crate::error::{ODataError, Result};
use crate::model::{EdmModel, EdmTypeRef, NavigationSource, PropertyLookup, StructuredType};
use crate::path::PathSegment;
use crate::semantic::{LevelsClause, NestedClauses, RangeVariable, SelectExpandClause, SelectItem};

use super::search::bind_search;
use super::{ParameterAliases, bind_filter, bind_order_by};

/// Bind `$select` and `$expand` for entities or complex values of `type_ref`
pub fn bind_select_expand(
    model: &dyn EdmModel,
    settings: &ParserSettings,
    aliases: &mut ParameterAliases,
    type_ref: &EdmTypeRef,
    navigation_source: Option<&NavigationSource>,
    select: Option<&SelectToken>,
    expand: Option<&ExpandToken>,
) -> Result<SelectExpandClause> {
    let element = type_ref.element_type();
    let structured = element.as_structured().ok_or_else(|| {
        ODataError::binding(format!(
            "$select and $expand need a structured type, found {}",
            type_ref.full_name()
        ))
    })?;
    let mut binder = SelectExpandBinder {
        model,
        settings,
        aliases,
    };
    binder.bind(structured, navigation_source, select, expand)
}

struct SelectExpandBinder<'a> {
    model: &'a dyn EdmModel,
    settings: &'a ParserSettings,
    aliases: &'a mut ParameterAliases,
}

/// Segments of one select or expand path with what they lead to
struct ResolvedPath {
    segments: Vec<PathSegment>,
    type_ref: EdmTypeRef,
    navigation_source: Option<NavigationSource>,
    ends_in_navigation: bool,
}

impl SelectExpandBinder<'_> {
    fn bind(
        &mut self,
        ty: &Arc<StructuredType>,
        source: Option<&NavigationSource>,
        select: Option<&SelectToken>,
        expand: Option<&ExpandToken>,
    ) -> Result<SelectExpandClause> {
        let mut clause = SelectExpandClause {
            items: Vec::new(),
            all_selected: select.is_none(),
        };
        for term in select.map(|s| s.terms.as_slice()).unwrap_or_default() {
            let item = self.bind_select_term(ty, source, term)?;
            if item == SelectItem::Wildcard {
                clause.all_selected = true;
            }
            clause.items.push(item);
        }
        for term in expand.map(|e| e.terms.as_slice()).unwrap_or_default() {
            if term.path.len() == 1 && term.path[0] == "*" {
                let items = self.bind_expand_all(ty, source, term)?;
                clause.items.extend(items);
            } else {
                let item = self.bind_expand_term(ty, source, term)?;
                clause.items.push(item);
            }
        }
        Ok(clause)
    }

    fn bind_select_term(
        &mut self,
        ty: &Arc<StructuredType>,
        source: Option<&NavigationSource>,
        term: &SelectTermToken,
    ) -> Result<SelectItem> {
        match term.path.as_slice() {
            [only] if only == "*" => return Ok(SelectItem::Wildcard),
            [only] if only.ends_with(".*") => {
                let namespace = only.trim_end_matches(".*");
                return Ok(SelectItem::NamespaceWildcard(namespace.to_string()));
            }
            path if path.last().is_some_and(|s| s == "*" || s.ends_with(".*")) => {
                return Err(ODataError::binding(format!(
                    "wildcard '{}' must be a select item of its own",
                    path.join("/")
                )));
            }
            _ => {}
        }
        let resolved = self.resolve_path(ty, source, &term.path, false)?;
        let options = self.bind_options(
            &term.options,
            resolved.type_ref.element_type(),
            resolved.navigation_source.as_ref(),
        )?;
        Ok(SelectItem::Path {
            path: resolved.segments,
            options,
        })
    }

    fn bind_expand_term(
        &mut self,
        ty: &Arc<StructuredType>,
        source: Option<&NavigationSource>,
        term: &ExpandTermToken,
    ) -> Result<SelectItem> {
        let resolved = self.resolve_path(ty, source, &term.path, true)?;
        if !resolved.ends_in_navigation {
            return Err(ODataError::binding(format!(
                "'{}' is not a navigation property and cannot be expanded",
                term.path.join("/")
            )));
        }
        self.expanded_item(resolved, term)
    }

    fn expanded_item(&mut self, resolved: ResolvedPath, term: &ExpandTermToken) -> Result<SelectItem> {
        let element = resolved.type_ref.element_type().clone();
        let source = resolved.navigation_source;
        if term.is_count {
            let variable = RangeVariable::implicit(element, source);
            let filter = term
                .options
                .filter
                .as_ref()
                .map(|token| bind_filter(self.model, self.settings, self.aliases, variable, token))
                .transpose()?;
            let search = term
                .options
                .search
                .as_ref()
                .map(|token| bind_search(token, self.settings.max_depth))
                .transpose()?;
            return Ok(SelectItem::ExpandedCount {
                path: resolved.segments,
                filter,
                search,
            });
        }
        let options = self.bind_options(&term.options, &element, source.as_ref())?;
        Ok(if term.is_ref {
            SelectItem::ExpandedReference {
                path: resolved.segments,
                navigation_source: source,
                options,
            }
        } else {
            SelectItem::ExpandedNavigation {
                path: resolved.segments,
                navigation_source: source,
                options,
            }
        })
    }

    /// `*` and `*/$ref`: every navigation property of the type
    fn bind_expand_all(
        &mut self,
        ty: &Arc<StructuredType>,
        source: Option<&NavigationSource>,
        term: &ExpandTermToken,
    ) -> Result<Vec<SelectItem>> {
        let mut items = Vec::new();
        for navigation in self.model.navigation_properties(ty) {
            let resolved = self.resolve_path(ty, source, std::slice::from_ref(&navigation.name), true)?;
            items.push(self.expanded_item(resolved, term)?);
        }
        log::debug!("Expanded '*' on {} to {} navigation properties", ty.full_name(), items.len());
        Ok(items)
    }

    fn resolve_path(
        &self,
        ty: &Arc<StructuredType>,
        source: Option<&NavigationSource>,
        path: &[String],
        expand: bool,
    ) -> Result<ResolvedPath> {
        let mut current = EdmTypeRef::structured(Arc::clone(ty), false);
        let mut source = source.cloned();
        let mut segments = Vec::with_capacity(path.len());
        let mut binding_path: Vec<&str> = Vec::new();
        let mut ends_in_navigation = false;

        for (i, name) in path.iter().enumerate() {
            let is_last = i + 1 == path.len();
            let Some(structured) = current.element_type().as_structured().cloned() else {
                return Err(ODataError::invalid_path(
                    name,
                    format!("cannot follow a value of type {}", current.full_name()),
                ));
            };

            if name.contains('.') {
                if let Some(target) = self.model.find_structured_type(name) {
                    if !self.model.is_derived_from(&target, &structured.full_name()) {
                        return Err(ODataError::binding(format!(
                            "type '{name}' does not derive from {}",
                            structured.full_name()
                        )));
                    }
                    let cast = EdmTypeRef::structured(target, current.element_type().nullable);
                    current = if current.is_collection() {
                        EdmTypeRef::collection(cast)
                    } else {
                        cast
                    };
                    segments.push(PathSegment::TypeCast {
                        type_ref: current.clone(),
                        navigation_source: source.clone(),
                    });
                    binding_path.push(name);
                    continue;
                }
                if !expand {
                    if let Some(operation) = self.model.find_bound_operations(name, &current).first() {
                        if !is_last {
                            return Err(ODataError::invalid_path(
                                name,
                                "an operation must be the last segment of a select item",
                            ));
                        }
                        let type_ref = operation.return_type.as_ref().and_then(|rt| {
                            self.model.resolve_type_name(&rt.type_name, rt.nullable)
                        });
                        segments.push(PathSegment::Operation {
                            operation: Arc::clone(operation),
                            parameters: Vec::new(),
                            type_ref,
                            navigation_source: None,
                        });
                        continue;
                    }
                }
                return Err(ODataError::UnknownType {
                    type_name: name.clone(),
                });
            }

            if ends_in_navigation {
                return Err(ODataError::invalid_path(
                    name,
                    "only a type cast may follow a navigation property; use a nested option",
                ));
            }
            match self.model.find_property(&structured, name) {
                Some(PropertyLookup::Structural(property)) => {
                    let type_ref = self.model.property_type(&property).ok_or_else(|| {
                        ODataError::UnknownType {
                            type_name: property.type_name.clone(),
                        }
                    })?;
                    current = type_ref.clone();
                    segments.push(PathSegment::Property { property, type_ref });
                    binding_path.push(name);
                }
                Some(PropertyLookup::Navigation(navigation)) => {
                    let type_ref = self.model.navigation_type(&navigation).ok_or_else(|| {
                        ODataError::UnknownType {
                            type_name: navigation.target_type.clone(),
                        }
                    })?;
                    binding_path.push(name);
                    let target = source.as_ref().and_then(|s| {
                        self.model
                            .navigation_target(s, &binding_path.join("/"), &navigation)
                    });
                    source = target;
                    current = type_ref.clone();
                    segments.push(PathSegment::NavigationProperty {
                        navigation,
                        type_ref,
                        navigation_source: source.clone(),
                    });
                    ends_in_navigation = true;
                }
                None if !expand && is_last && self.model.is_open_type(&structured) => {
                    segments.push(PathSegment::OpenProperty { name: name.clone() });
                    current = EdmTypeRef::untyped();
                }
                None => {
                    return Err(ODataError::PropertyNotDeclared {
                        type_name: structured.full_name(),
                        property: name.clone(),
                    });
                }
            }
        }

        Ok(ResolvedPath {
            segments,
            type_ref: current,
            navigation_source: source,
            ends_in_navigation,
        })
    }

    fn bind_options(
        &mut self,
        options: &NestedOptions,
        element: &EdmTypeRef,
        source: Option<&NavigationSource>,
    ) -> Result<NestedClauses> {
        let variable = || RangeVariable::implicit(element.clone(), source.cloned());
        let mut clauses = NestedClauses {
            top: options.top,
            skip: options.skip,
            count: options.count,
            ..NestedClauses::default()
        };
        if let Some(token) = &options.filter {
            clauses.filter = Some(bind_filter(
                self.model,
                self.settings,
                self.aliases,
                variable(),
                token,
            )?);
        }
        if let Some(tokens) = &options.order_by {
            clauses.order_by = Some(bind_order_by(
                self.model,
                self.settings,
                self.aliases,
                variable(),
                tokens,
            )?);
        }
        if let Some(token) = &options.search {
            clauses.search = Some(bind_search(token, self.settings.max_depth)?);
        }
        clauses.levels = options.levels.map(|levels| match levels {
            LevelsToken::Max => LevelsClause {
                is_max: true,
                level: self.settings.maximum_expansion_depth as i64,
            },
            LevelsToken::Value(level) => LevelsClause {
                is_max: false,
                level,
            },
        });
        if options.select.is_some() || options.expand.is_some() {
            let structured = element.as_structured().ok_or_else(|| {
                ODataError::binding(format!(
                    "nested $select and $expand need a structured type, found {}",
                    element.full_name()
                ))
            })?;
            let nested = self.bind(
                structured,
                source,
                options.select.as_ref(),
                options.expand.as_ref(),
            )?;
            clauses.select_expand = Some(Box::new(nested));
        }
        Ok(clauses)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{model, range_variable};
    use super::*;
    use crate::model::InMemoryModel;
    use crate::parser::{parse_expand, parse_select};
    use pretty_assertions::assert_eq;

    fn bind(model: &InMemoryModel, select: Option<&str>, expand: Option<&str>) -> Result<SelectExpandClause> {
        let settings = ParserSettings::default();
        let select = select.map(|s| parse_select(s, &settings)).transpose()?;
        let expand = expand.map(|e| parse_expand(e, &settings)).transpose()?;
        let variable = range_variable(model, "People");
        let mut aliases = ParameterAliases::default();
        bind_select_expand(
            model,
            &settings,
            &mut aliases,
            &variable.type_ref,
            variable.navigation_source.as_ref(),
            select.as_ref(),
            expand.as_ref(),
        )
    }

    fn path_kinds(item: &SelectItem) -> Vec<&'static str> {
        let path = match item {
            SelectItem::Path { path, .. }
            | SelectItem::ExpandedNavigation { path, .. }
            | SelectItem::ExpandedReference { path, .. }
            | SelectItem::ExpandedCount { path, .. } => path,
            _ => return Vec::new(),
        };
        path.iter().map(PathSegment::kind_name).collect()
    }

    #[test]
    fn test_select_paths() {
        let model = model();
        let clause = bind(&model, Some("Name,Home/City,NS.Employee/Level,NS.IsAdult"), None)
            .expect("binds");
        assert!(!clause.all_selected);
        let kinds: Vec<Vec<&str>> = clause.items.iter().map(path_kinds).collect();
        assert_eq!(
            kinds,
            vec![
                vec!["Property"],
                vec!["Property", "Property"],
                vec!["TypeCast", "Property"],
                vec!["Operation"],
            ]
        );
    }

    #[test]
    fn test_select_wildcards() {
        let model = model();
        let clause = bind(&model, Some("*,NS.*"), None).expect("binds");
        assert!(clause.all_selected);
        assert_eq!(clause.items[1], SelectItem::NamespaceWildcard("NS".to_string()));
        assert!(bind(&model, None, None).expect("binds").all_selected);
    }

    #[test]
    fn test_select_errors() {
        let model = model();
        assert!(matches!(
            bind(&model, Some("Nickname"), None),
            Err(ODataError::PropertyNotDeclared { .. })
        ));
        assert!(bind(&model, Some("Name/Length"), None).is_err());
        assert!(bind(&model, Some("Friends/Name"), None).is_err());
    }

    #[test]
    fn test_expand_with_nested_options() {
        let model = model();
        let clause = bind(
            &model,
            None,
            Some("Friends($filter=Age gt 3;$select=Name;$levels=max)"),
        )
        .expect("binds");
        let SelectItem::ExpandedNavigation {
            navigation_source,
            options,
            ..
        } = &clause.items[0]
        else {
            panic!("expected expanded navigation");
        };
        assert_eq!(navigation_source.as_ref().map(|s| s.name()), Some("People".to_string()));
        assert!(options.filter.is_some());
        assert_eq!(
            options.levels,
            Some(LevelsClause {
                is_max: true,
                level: 8
            })
        );
        let nested = options.select_expand.as_ref().expect("nested select");
        assert_eq!(nested.items.len(), 1);
    }

    #[test]
    fn test_expand_star_ref_and_count() {
        let model = model();
        let clause = bind(&model, None, Some("*")).expect("binds");
        assert_eq!(clause.expanded().count(), 2);

        let clause = bind(&model, None, Some("Friends/$ref,Friends/$count($filter=Age gt 1)"))
            .expect("binds");
        assert!(matches!(clause.items[0], SelectItem::ExpandedReference { .. }));
        assert!(matches!(
            clause.items[1],
            SelectItem::ExpandedCount { filter: Some(_), .. }
        ));
    }

    #[test]
    fn test_expand_cast_after_navigation() {
        let model = model();
        let clause = bind(&model, None, Some("Friends/NS.Employee($select=Level)")).expect("binds");
        assert_eq!(path_kinds(&clause.items[0]), vec!["NavigationProperty", "TypeCast"]);
        assert!(bind(&model, None, Some("Name")).is_err());
        assert!(bind(&model, None, Some("BestFriend/Friends")).is_err());
    }
}
