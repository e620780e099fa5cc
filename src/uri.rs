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

//! Request URI entry point
//!
//! [`ODataUriParser`] holds one request's state: the split query options, the parameter
//! alias table and the resolved path. Each `parse_*` method handles one piece, so a host
//! can parse only what it needs; [`ODataUriParser::parse_uri`] parses everything.

use indexmap::IndexMap;
use url::Url;

use crate::binder::{
    ParameterAliases, bind_filter, bind_order_by, bind_search, bind_select_expand,
};
use crate::config::ParserSettings;
use crate::error::{ODataError, Result};
use crate::model::{EdmModel, EdmTypeRef, NavigationSource};
use crate::parser::{
    QueryOptions, parse_count, parse_expand, parse_filter, parse_order_by, parse_search,
    parse_select, parse_skip, parse_top,
};
use crate::path::{BatchReferenceCallback, ODataPath, PathResolver, PathSegment};
use crate::semantic::{
    FilterClause, OrderByClause, RangeVariable, SearchClause, SelectExpandClause, SemanticNode,
};

/// Everything parsed from one request URI
#[derive(Debug, Clone, PartialEq)]
pub struct ODataUri {
    pub service_root: Option<Url>,
    pub path: ODataPath,
    pub filter: Option<FilterClause>,
    pub order_by: Option<OrderByClause>,
    pub select_expand: Option<SelectExpandClause>,
    pub top: Option<i64>,
    pub skip: Option<i64>,
    pub count: Option<bool>,
    pub search: Option<SearchClause>,
    /// Entity addressed by `$id`, resolved as a path
    pub id: Option<ODataPath>,
    pub skip_token: Option<String>,
    pub delta_token: Option<String>,
    pub format: Option<String>,
    /// Non-system options, passed through untouched
    pub custom_query_options: Vec<(String, String)>,
    /// Aliases the clauses referenced, bound to their values
    pub parameter_aliases: IndexMap<String, SemanticNode>,
}

/// Parser for one request URI against a model
pub struct ODataUriParser<'a> {
    model: &'a dyn EdmModel,
    settings: ParserSettings,
    service_root: Option<Url>,
    resource_path: String,
    options: QueryOptions,
    aliases: ParameterAliases,
    batch: Option<&'a dyn BatchReferenceCallback>,
    path: Option<ODataPath>,
}

impl<'a> ODataUriParser<'a> {
    /// `request_uri` may be absolute or relative to `service_root`; without a service
    /// root it is taken as a service-relative path with an optional query string
    pub fn new(
        model: &'a dyn EdmModel,
        settings: ParserSettings,
        service_root: Option<&str>,
        request_uri: &str,
    ) -> Result<Self> {
        let service_root = service_root.map(parse_service_root).transpose()?;
        let (resource_path, query) = match &service_root {
            Some(root) => relative_to_root(root, request_uri)?,
            None => split_request(request_uri),
        };
        let options = QueryOptions::parse(&query, &settings)?;
        let aliases = ParameterAliases::new(options.aliases().clone());
        log::debug!("Parsing request path '{resource_path}' with query '{query}'");
        Ok(Self {
            model,
            settings,
            service_root,
            resource_path,
            options,
            aliases,
            batch: None,
            path: None,
        })
    }

    /// Resolve leading `$<content-id>` segments inside a batch request
    pub fn with_batch_callback(mut self, batch: &'a dyn BatchReferenceCallback) -> Self {
        self.batch = Some(batch);
        self
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    pub fn query_options(&self) -> &QueryOptions {
        &self.options
    }

    /// Resolve the resource path; resolved once and reused by the other parsers
    pub fn parse_path(&mut self) -> Result<ODataPath> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let path = self.resolver().resolve_str(&self.resource_path)?;
        self.path = Some(path.clone());
        Ok(path)
    }

    pub fn parse_filter(&mut self) -> Result<Option<FilterClause>> {
        let Some(text) = self.options.get("$filter").map(str::to_string) else {
            return Ok(None);
        };
        let token = parse_filter(&text, self.settings.max_depth)?;
        let range_variable = self.range_variable()?;
        bind_filter(self.model, &self.settings, &mut self.aliases, range_variable, &token).map(Some)
    }

    pub fn parse_order_by(&mut self) -> Result<Option<OrderByClause>> {
        let Some(text) = self.options.get("$orderby").map(str::to_string) else {
            return Ok(None);
        };
        let tokens = parse_order_by(&text, self.settings.max_depth)?;
        let range_variable = self.range_variable()?;
        bind_order_by(self.model, &self.settings, &mut self.aliases, range_variable, &tokens)
            .map(Some)
    }

    pub fn parse_select_and_expand(&mut self) -> Result<Option<SelectExpandClause>> {
        let select = self.options.get("$select").map(str::to_string);
        let expand = self.options.get("$expand").map(str::to_string);
        if select.is_none() && expand.is_none() {
            return Ok(None);
        }
        let select = select.map(|text| parse_select(&text, &self.settings)).transpose()?;
        let expand = expand.map(|text| parse_expand(&text, &self.settings)).transpose()?;
        let (type_ref, navigation_source) = self.query_target()?;
        bind_select_expand(
            self.model,
            &self.settings,
            &mut self.aliases,
            &type_ref,
            navigation_source.as_ref(),
            select.as_ref(),
            expand.as_ref(),
        )
        .map(Some)
    }

    pub fn parse_top(&self) -> Result<Option<i64>> {
        self.options.get("$top").map(parse_top).transpose()
    }

    pub fn parse_skip(&self) -> Result<Option<i64>> {
        self.options.get("$skip").map(parse_skip).transpose()
    }

    pub fn parse_count(&self) -> Result<Option<bool>> {
        parse_count(self.options.get("$count"))
    }

    pub fn parse_search(&self) -> Result<Option<SearchClause>> {
        let Some(text) = self.options.get("$search") else {
            return Ok(None);
        };
        let token = parse_search(text, self.settings.max_depth)?;
        bind_search(&token, self.settings.max_depth).map(Some)
    }

    /// Opaque paging token, returned as sent
    pub fn parse_skip_token(&self) -> Option<String> {
        self.options.get("$skiptoken").map(str::to_string)
    }

    pub fn parse_delta_token(&self) -> Option<String> {
        self.options.get("$deltatoken").map(str::to_string)
    }

    pub fn parse_format(&self) -> Option<String> {
        self.options.get("$format").map(str::to_string)
    }

    /// Resolve the entity id given in `$id`, absolute or relative to the service root
    pub fn parse_id(&self) -> Result<Option<ODataPath>> {
        let Some(id) = self.options.get("$id") else {
            return Ok(None);
        };
        let path = match &self.service_root {
            Some(root) => relative_to_root(root, id)?.0,
            None => split_request(id).0,
        };
        self.resolver().resolve_str(&path).map(Some)
    }

    /// Parse the path and every query option present
    pub fn parse_uri(&mut self) -> Result<ODataUri> {
        let path = self.parse_path()?;
        let filter = self.parse_filter()?;
        let order_by = self.parse_order_by()?;
        let select_expand = self.parse_select_and_expand()?;
        Ok(ODataUri {
            service_root: self.service_root.clone(),
            path,
            filter,
            order_by,
            select_expand,
            top: self.parse_top()?,
            skip: self.parse_skip()?,
            count: self.parse_count()?,
            search: self.parse_search()?,
            id: self.parse_id()?,
            skip_token: self.parse_skip_token(),
            delta_token: self.parse_delta_token(),
            format: self.parse_format(),
            custom_query_options: self.options.custom().to_vec(),
            parameter_aliases: self.aliases.bound(),
        })
    }

    fn resolver(&self) -> PathResolver<'_> {
        let resolver = PathResolver::new(self.model, &self.settings).with_aliases(&self.aliases);
        match self.batch {
            Some(batch) => resolver.with_batch_callback(batch),
            None => resolver,
        }
    }

    fn range_variable(&mut self) -> Result<RangeVariable> {
        let (type_ref, navigation_source) = self.query_target()?;
        Ok(RangeVariable::implicit(
            type_ref.element_type().clone(),
            navigation_source,
        ))
    }

    /// Type and navigation source the query options apply to
    ///
    /// `$count` and `$ref` apply the options to the collection before them.
    fn query_target(&mut self) -> Result<(EdmTypeRef, Option<NavigationSource>)> {
        let path = self.parse_path()?;
        let segments = path.segments();
        let index = segments
            .iter()
            .rposition(|segment| !matches!(segment, PathSegment::Count | PathSegment::Ref { .. }))
            .ok_or_else(|| ODataError::binding("query options need a resource path"))?;
        let target = &segments[index];
        let type_ref = match target {
            PathSegment::OpenProperty { .. } | PathSegment::PathTemplate { .. } => {
                EdmTypeRef::untyped()
            }
            _ => target.type_ref().cloned().ok_or_else(|| {
                ODataError::binding(format!("query options cannot apply to {target}"))
            })?,
        };
        let navigation_source = ODataPath::new(segments[..=index].to_vec()).navigation_source();
        Ok((type_ref, navigation_source))
    }
}

fn parse_service_root(root: &str) -> Result<Url> {
    let mut url = Url::parse(root)
        .map_err(|e| ODataError::invalid_path(root, format!("invalid service root: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Resource path and raw query of a request under `root`
fn relative_to_root(root: &Url, request_uri: &str) -> Result<(String, String)> {
    let url = root
        .join(request_uri)
        .map_err(|e| ODataError::invalid_path(request_uri, format!("invalid request URI: {e}")))?;
    let under_root = url.scheme() == root.scheme()
        && url.host_str() == root.host_str()
        && url.port_or_known_default() == root.port_or_known_default()
        && url.path().starts_with(root.path());
    if !under_root {
        return Err(ODataError::invalid_path(
            request_uri,
            format!("request URI is not under the service root {root}"),
        ));
    }
    let path = url.path()[root.path().len()..].to_string();
    Ok((path, url.query().unwrap_or_default().to_string()))
}

/// Split a service-relative request into path and query, accepting absolute URIs too
fn split_request(request_uri: &str) -> (String, String) {
    if let Ok(url) = Url::parse(request_uri) {
        return (
            url.path().to_string(),
            url.query().unwrap_or_default().to_string(),
        );
    }
    match request_uri.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (request_uri.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::test_support::model;
    use crate::model::InMemoryModel;
    use pretty_assertions::assert_eq;

    fn parser<'m>(model: &'m InMemoryModel, uri: &str) -> ODataUriParser<'m> {
        ODataUriParser::new(
            model,
            ParserSettings::default(),
            Some("https://host/service/"),
            uri,
        )
        .expect("request splits")
    }

    #[test]
    fn test_full_uri() {
        let model = model();
        let mut parser = parser(
            &model,
            "https://host/service/People?$filter=Age%20gt%20@min&$orderby=Name%20desc&$top=5&$count=true&@min=30&debug=1",
        );
        let uri = parser.parse_uri().expect("uri parses");
        assert_eq!(uri.path.to_string(), "EntitySet(People)");
        assert_eq!(
            uri.filter.map(|f| f.expression.to_string()),
            Some("($it/Age gt 30)".to_string())
        );
        assert_eq!(uri.order_by.map(|o| o.items.len()), Some(1));
        assert_eq!(uri.top, Some(5));
        assert_eq!(uri.count, Some(true));
        assert_eq!(uri.custom_query_options, vec![("debug".to_string(), "1".to_string())]);
        assert_eq!(uri.parameter_aliases.keys().collect::<Vec<_>>(), vec!["@min"]);
    }

    #[test]
    fn test_relative_request_and_count_target() {
        let model = model();
        let mut parser = parser(&model, "People(1)/Friends/$count?$filter=Age%20gt%203");
        let filter = parser.parse_filter().expect("filter binds").expect("present");
        assert_eq!(filter.range_variable.navigation_source.map(|s| s.name()), Some("People".to_string()));
    }

    #[test]
    fn test_foreign_uri_rejected() {
        let model = model();
        let result = ODataUriParser::new(
            &model,
            ParserSettings::default(),
            Some("https://host/service"),
            "https://other/service/People",
        );
        assert!(matches!(result, Err(ODataError::InvalidPath { .. })));
    }

    #[test]
    fn test_id_and_tokens() {
        let model = model();
        let parser = parser(
            &model,
            "People/$ref?$id=https://host/service/People(4)&$skiptoken=abc&$format=json",
        );
        let id = parser.parse_id().expect("id resolves").expect("present");
        assert_eq!(id.to_string(), "EntitySet(People)/Key(ID=4)");
        assert_eq!(parser.parse_skip_token().as_deref(), Some("abc"));
        assert_eq!(parser.parse_format().as_deref(), Some("json"));
        assert_eq!(parser.parse_delta_token(), None);
    }

    #[test]
    fn test_without_service_root() {
        let model = model();
        let mut parser = ODataUriParser::new(
            &model,
            ParserSettings::default(),
            None,
            "People?$select=Name&$search=blue",
        )
        .expect("request splits");
        let clause = parser
            .parse_select_and_expand()
            .expect("select binds")
            .expect("present");
        assert_eq!(clause.selected().count(), 1);
        assert!(parser.parse_search().expect("search parses").is_some());
    }

    #[test]
    fn test_invalid_scalar_options() {
        let model = model();
        let parser = parser(&model, "People?$top=-1&$count=True");
        assert!(parser.parse_top().is_err());
        assert!(parser.parse_count().is_err());
    }
}
