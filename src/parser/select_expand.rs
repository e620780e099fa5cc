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

//! `$select` and `$expand` grammar
//!
//! Items are split at top-level commas, each item into a slash-separated path and an
//! optional parenthesized list of `;`-separated nested options. Nested `$filter`,
//! `$orderby` and `$search` reuse the expression and search parsers; nested `$select`
//! and `$expand` recurse one level deeper against the same depth limit.

use crate::ast::{ExpandTermToken, ExpandToken, NestedOptions, SelectTermToken, SelectToken};
use crate::config::ParserSettings;
use crate::error::{ODataError, Result};

use super::expression::{parse_filter, parse_order_by};
use super::lexer::{is_identifier_continue, is_identifier_start};
use super::query_options::{parse_count, parse_levels, parse_non_negative};
use super::search::parse_search;
use super::split::{split_parenthesized, split_top_level};

/// Parse a `$select` value
pub fn parse_select(text: &str, settings: &ParserSettings) -> Result<SelectToken> {
    SelectExpandParser::new(settings).select(text, 1)
}

/// Parse an `$expand` value
pub fn parse_expand(text: &str, settings: &ParserSettings) -> Result<ExpandToken> {
    SelectExpandParser::new(settings).expand(text, 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Select,
    Expand,
}

struct SelectExpandParser<'s> {
    settings: &'s ParserSettings,
}

impl<'s> SelectExpandParser<'s> {
    fn new(settings: &'s ParserSettings) -> Self {
        Self { settings }
    }

    fn enter(&self, depth: usize) -> Result<()> {
        if depth > self.settings.max_depth {
            return Err(ODataError::RecursionDepthExceeded {
                max: self.settings.max_depth,
            });
        }
        Ok(())
    }

    fn select(&self, text: &str, depth: usize) -> Result<SelectToken> {
        self.enter(depth)?;
        let mut terms = Vec::new();
        for (offset, item) in items(text)? {
            let (path_text, options_text) = split_parenthesized(item.trim())?;
            let path = parse_path(text, offset, path_text, Clause::Select)?;
            let options = match options_text {
                Some(body) => self.options(body, depth, Clause::Select)?,
                None => NestedOptions::default(),
            };
            if path.last().is_some_and(|s| is_wildcard(s)) && !options.is_empty() {
                return Err(ODataError::syntax(
                    text,
                    offset,
                    "a wildcard select item cannot carry options",
                ));
            }
            terms.push(SelectTermToken { path, options });
        }
        Ok(SelectToken { terms })
    }

    fn expand(&self, text: &str, depth: usize) -> Result<ExpandToken> {
        self.enter(depth)?;
        let mut terms = Vec::new();
        for (offset, item) in items(text)? {
            let (path_text, options_text) = split_parenthesized(item.trim())?;
            let mut path = parse_path(text, offset, path_text, Clause::Expand)?;
            let is_ref = path.last().is_some_and(|s| s == "$ref");
            let is_count = path.last().is_some_and(|s| s == "$count");
            if is_ref || is_count {
                path.pop();
            }
            if path.is_empty() {
                return Err(ODataError::syntax(text, offset, "expand item has no navigation path"));
            }
            if path.iter().any(|s| s.starts_with('$')) {
                return Err(ODataError::syntax(
                    text,
                    offset,
                    "$ref and $count may only end an expand item",
                ));
            }
            if path.iter().skip(1).any(|s| s == "*") {
                return Err(ODataError::syntax(text, offset, "'*' must be the whole expand path"));
            }
            let options = match options_text {
                Some(body) => self.options(body, depth, Clause::Expand)?,
                None => NestedOptions::default(),
            };
            if is_ref && (options.select.is_some() || options.expand.is_some()) {
                return Err(ODataError::syntax(
                    text,
                    offset,
                    "$select and $expand are not allowed on a $ref item",
                ));
            }
            if is_count
                && (options.order_by.is_some()
                    || options.select.is_some()
                    || options.expand.is_some()
                    || options.top.is_some()
                    || options.skip.is_some()
                    || options.levels.is_some())
            {
                return Err(ODataError::syntax(
                    text,
                    offset,
                    "only $filter and $search are allowed on a $count item",
                ));
            }
            if path[0] == "*" && !is_ref && !options.is_empty() && !only_levels(&options) {
                return Err(ODataError::syntax(
                    text,
                    offset,
                    "'*' only accepts the $levels option",
                ));
            }
            terms.push(ExpandTermToken {
                path,
                is_ref,
                is_count,
                options,
            });
        }
        Ok(ExpandToken { terms })
    }

    fn options(&self, body: &str, depth: usize, clause: Clause) -> Result<NestedOptions> {
        let max_depth = self.settings.max_depth;
        let mut options = NestedOptions::default();
        let mut seen: Vec<String> = Vec::new();
        for (offset, pair) in split_top_level(body, ';')? {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (raw_name, value) = pair
                .split_once('=')
                .ok_or_else(|| ODataError::syntax(body, offset, "expected 'name=value'"))?;
            let name = self.option_name(raw_name.trim(), body, offset)?;
            if seen.contains(&name) {
                return Err(ODataError::DuplicateQueryOption { name });
            }
            match name.as_str() {
                "$filter" => options.filter = Some(parse_filter(value, max_depth)?),
                "$orderby" => options.order_by = Some(parse_order_by(value, max_depth)?),
                "$top" => options.top = Some(parse_non_negative("$top", value)?),
                "$skip" => options.skip = Some(parse_non_negative("$skip", value)?),
                "$count" => options.count = parse_count(Some(value))?,
                "$search" => options.search = Some(parse_search(value, max_depth)?),
                "$select" => options.select = Some(self.select(value, depth + 1)?),
                "$levels" if clause == Clause::Expand => {
                    options.levels = Some(parse_levels(value)?)
                }
                "$expand" if clause == Clause::Expand => {
                    options.expand = Some(self.expand(value, depth + 1)?)
                }
                _ => {
                    return Err(ODataError::InvalidQueryOption {
                        option: name,
                        value: value.to_string(),
                        reason: format!("not allowed inside a nested {clause:?} item")
                            .to_lowercase(),
                    });
                }
            }
            seen.push(name);
        }
        Ok(options)
    }

    fn option_name(&self, raw: &str, body: &str, offset: usize) -> Result<String> {
        let lowered = raw.to_ascii_lowercase();
        if lowered.starts_with('$') {
            Ok(lowered)
        } else if self.settings.enable_no_dollar_query_options && !lowered.is_empty() {
            Ok(format!("${lowered}"))
        } else {
            Err(ODataError::syntax(
                body,
                offset,
                format!("nested option '{raw}' must start with '$'"),
            ))
        }
    }
}

fn only_levels(options: &NestedOptions) -> bool {
    NestedOptions {
        levels: None,
        ..options.clone()
    }
    .is_empty()
}

/// Comma-separated items; a blank item is an error
fn items(text: &str) -> Result<Vec<(usize, &str)>> {
    let items = split_top_level(text, ',')?;
    if let Some((offset, _)) = items.iter().find(|(_, item)| item.trim().is_empty()) {
        return Err(ODataError::syntax(text, *offset, "empty item"));
    }
    Ok(items)
}

fn is_wildcard(segment: &str) -> bool {
    segment == "*" || segment.ends_with(".*")
}

fn parse_path(text: &str, offset: usize, path: &str, clause: Clause) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        let segment = segment.trim();
        let valid = match segment {
            "*" => true,
            "$ref" | "$count" => clause == Clause::Expand,
            _ => match segment.strip_suffix(".*") {
                Some(namespace) => clause == Clause::Select && is_dotted_identifier(namespace),
                None => is_dotted_identifier(segment),
            },
        };
        if !valid {
            return Err(ODataError::syntax(
                text,
                offset,
                format!("invalid path segment '{segment}'"),
            ));
        }
        segments.push(segment.to_string());
    }
    if segments[..segments.len() - 1].iter().any(|s| is_wildcard(s) && clause == Clause::Select) {
        return Err(ODataError::syntax(text, offset, "a wildcard must end the select path"));
    }
    Ok(segments)
}

fn is_dotted_identifier(text: &str) -> bool {
    !text.is_empty()
        && text.split('.').all(|part| {
            let mut chars = part.chars();
            chars.next().is_some_and(is_identifier_start) && chars.all(is_identifier_continue)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{LevelsToken, QueryToken};
    use pretty_assertions::assert_eq;

    fn settings() -> ParserSettings {
        ParserSettings::default()
    }

    #[test]
    fn test_select_paths() {
        let select = parse_select("Name, Address/City, NS.Manager/Budget, *, NS.*", &settings())
            .expect("select");
        let paths: Vec<Vec<String>> = select.terms.into_iter().map(|t| t.path).collect();
        assert_eq!(
            paths,
            vec![
                vec!["Name".to_string()],
                vec!["Address".to_string(), "City".to_string()],
                vec!["NS.Manager".to_string(), "Budget".to_string()],
                vec!["*".to_string()],
                vec!["NS.*".to_string()],
            ]
        );
    }

    #[test]
    fn test_select_rejects_bad_items() {
        assert!(parse_select("Name,,Age", &settings()).is_err());
        assert!(parse_select("*/Name", &settings()).is_err());
        assert!(parse_select("Name/$ref", &settings()).is_err());
        assert!(parse_select("1Name", &settings()).is_err());
    }

    #[test]
    fn test_nested_select_options() {
        let select = parse_select("Emails($filter=$this eq 'a';$top=2)", &settings())
            .expect("nested select");
        let options = &select.terms[0].options;
        assert!(matches!(options.filter, Some(QueryToken::BinaryOperator { .. })));
        assert_eq!(options.top, Some(2));
    }

    #[test]
    fn test_expand_with_options() {
        let expand = parse_expand(
            "Orders($filter=Total gt 10;$orderby=Total desc;$top=5;$skip=1;$count=true;$select=Id;$expand=Items($levels=2))",
            &settings(),
        )
        .expect("expand");
        let term = &expand.terms[0];
        assert_eq!(term.path, vec!["Orders".to_string()]);
        assert!(term.options.filter.is_some());
        assert_eq!(term.options.order_by.as_ref().map(Vec::len), Some(1));
        assert_eq!(term.options.top, Some(5));
        assert_eq!(term.options.skip, Some(1));
        assert_eq!(term.options.count, Some(true));
        assert_eq!(term.options.select.as_ref().map(|s| s.terms.len()), Some(1));
        let nested = &term.options.expand.as_ref().expect("nested expand").terms[0];
        assert_eq!(nested.options.levels, Some(LevelsToken::Value(2)));
    }

    #[test]
    fn test_expand_ref_count_and_star() {
        let expand =
            parse_expand("Friends/$ref, Orders/$count, *($levels=max)", &settings()).expect("expand");
        assert!(expand.terms[0].is_ref);
        assert_eq!(expand.terms[0].path, vec!["Friends".to_string()]);
        assert!(expand.terms[1].is_count);
        assert_eq!(expand.terms[2].path, vec!["*".to_string()]);
        assert_eq!(expand.terms[2].options.levels, Some(LevelsToken::Max));

        assert!(parse_expand("*/$ref", &settings()).is_ok());
        assert!(parse_expand("Friends/$ref($select=Name)", &settings()).is_err());
        assert!(parse_expand("Orders/$count($top=1)", &settings()).is_err());
        assert!(parse_expand("*($top=1)", &settings()).is_err());
    }

    #[test]
    fn test_duplicate_and_unknown_nested_options() {
        let err = parse_expand("Orders($top=1;$top=2)", &settings()).expect_err("duplicate");
        assert_eq!(
            err,
            ODataError::DuplicateQueryOption {
                name: "$top".to_string()
            }
        );
        assert!(parse_select("Name($levels=1)", &settings()).is_err());
        assert!(parse_expand("Orders($format=json)", &settings()).is_err());
    }

    #[test]
    fn test_no_dollar_nested_options() {
        assert!(parse_expand("Orders(top=1)", &settings()).is_err());
        let expand = parse_expand("Orders(top=1)", &ParserSettings::lenient()).expect("lenient");
        assert_eq!(expand.terms[0].options.top, Some(1));
    }

    #[test]
    fn test_expand_depth_limit() {
        let settings = ParserSettings::default().with_max_depth(3);
        assert!(parse_expand("A($expand=B($expand=C))", &settings).is_ok());
        let err = parse_expand("A($expand=B($expand=C($expand=D)))", &settings)
            .expect_err("too deep");
        assert_eq!(err, ODataError::RecursionDepthExceeded { max: 3 });
    }
}
