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

//! Metadata-driven resource path resolution
//!
//! The resolver walks raw segments left to right. Each step looks only at the last
//! resolved segment (its type and navigation source) plus the small amount of state in
//! [`Walk`], and yields zero or more resolved segments: `People(1)` yields an entity set
//! followed by a key, while the key-as-segment escape `$` yields nothing by itself.

use std::sync::Arc;

use crate::binder::ParameterAliases;
use crate::config::ParserSettings;
use crate::error::{ODataError, Result, UnrecognizedPathError};
use crate::model::{
    EdmModel, EdmPrimitiveKind, EdmTypeRef, NavigationProperty, NavigationSource, Operation,
    PropertyLookup, SchemaType, StructuredType,
};
use crate::parser::path::template_name;
use crate::parser::{parse_segment_identifier, split_path};

use super::batch::BatchReferenceCallback;
use super::key::{entity_type_of, implicit_key_values, key_segment, previous_keys};
use super::operation::{
    callable, entity_set_path_target, operation_parameters, parse_parameters, return_type,
    select_overload,
};
use super::segment::{NamedSegmentValue, ODataPath, PathSegment};

/// Resolves raw path segments against a model
///
/// One resolver serves one request; it borrows the session's settings, the alias values
/// of the query string and, inside a batch, the content-id callback.
pub struct PathResolver<'a> {
    model: &'a dyn EdmModel,
    settings: &'a ParserSettings,
    aliases: Option<&'a ParameterAliases>,
    batch: Option<&'a dyn BatchReferenceCallback>,
}

/// Mutable state of one walk
#[derive(Default)]
struct Walk {
    segments: Vec<PathSegment>,
    /// Members followed since the last navigation source, for navigation bindings
    binding_path: Vec<String>,
    /// Set by the `$` escape; the next segment is a key
    key_escape: bool,
}

impl Walk {
    fn previous(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    fn previous_type(&self) -> Option<EdmTypeRef> {
        self.previous().and_then(PathSegment::type_ref).cloned()
    }

    /// Navigation source in effect; structural properties keep their owner's source
    fn previous_source(&self) -> Option<NavigationSource> {
        self.segments
            .iter()
            .rev()
            .find(|segment| !matches!(segment, PathSegment::Property { .. }))
            .and_then(PathSegment::navigation_source)
    }
}

impl<'a> PathResolver<'a> {
    pub fn new(model: &'a dyn EdmModel, settings: &'a ParserSettings) -> Self {
        Self {
            model,
            settings,
            aliases: None,
            batch: None,
        }
    }

    /// Alias values used by `@name` key values and operation parameters
    pub fn with_aliases(mut self, aliases: &'a ParameterAliases) -> Self {
        self.aliases = Some(aliases);
        self
    }

    pub fn with_batch_callback(mut self, batch: &'a dyn BatchReferenceCallback) -> Self {
        self.batch = Some(batch);
        self
    }

    /// Split and resolve a path relative to the service root
    pub fn resolve_str(&self, path: &str) -> Result<ODataPath> {
        self.resolve(&split_path(path)?)
    }

    /// Resolve percent-decoded segments
    pub fn resolve(&self, raw: &[String]) -> Result<ODataPath> {
        if raw.len() > self.settings.max_depth {
            return Err(ODataError::RecursionDepthExceeded {
                max: self.settings.max_depth,
            });
        }
        let mut walk = Walk::default();
        for (index, segment) in raw.iter().enumerate() {
            let resolved = if walk.segments.is_empty() {
                self.first_segment(segment)?
            } else {
                self.next_segment(&mut walk, segment)?
            };
            let Some(resolved) = resolved else {
                return Err(ODataError::UnrecognizedPath(Box::new(UnrecognizedPathError {
                    parsed: ODataPath::new(walk.segments),
                    segment: segment.clone(),
                    remaining: raw[index + 1..].to_vec(),
                })));
            };
            for segment in &resolved {
                log::debug!("Resolved path segment {segment}");
            }
            walk.segments.extend(resolved);
        }
        if walk.key_escape {
            return Err(ODataError::invalid_path("$", "the key escape must be followed by a key"));
        }
        Ok(ODataPath::new(walk.segments))
    }

    fn first_segment(&self, raw: &str) -> Result<Option<Vec<PathSegment>>> {
        match raw {
            "$metadata" => return Ok(Some(vec![PathSegment::Metadata])),
            "$batch" => return Ok(Some(vec![PathSegment::Batch])),
            _ => {}
        }
        if let Some(content_id) = raw.strip_prefix('$') {
            let reference = self.batch.and_then(|batch| batch.resolve(content_id));
            return Ok(reference.map(|reference| {
                vec![PathSegment::BatchReference {
                    content_id: content_id.to_string(),
                    type_ref: reference.type_ref,
                    navigation_source: reference.navigation_source,
                }]
            }));
        }
        if let Some(name) = self.template(raw) {
            return Ok(Some(vec![PathSegment::PathTemplate {
                name: name.to_string(),
            }]));
        }

        let (identifier, parameters) = parse_segment_identifier(raw)?;
        if let Some(entity_set) = self.model.find_entity_set(identifier) {
            let entity_type = self
                .model
                .find_structured_type(&entity_set.entity_type)
                .ok_or_else(|| ODataError::UnknownType {
                    type_name: entity_set.entity_type.clone(),
                })?;
            let type_ref = EdmTypeRef::collection(EdmTypeRef::structured(entity_type, false));
            let source = NavigationSource::EntitySet(Arc::clone(&entity_set));
            let mut resolved = vec![PathSegment::EntitySet {
                entity_set,
                type_ref: type_ref.clone(),
            }];
            if let Some(keys) = parameters {
                resolved.push(self.key(&type_ref, Some(source), keys, false, Vec::new())?);
            }
            return Ok(Some(resolved));
        }
        if let Some(singleton) = self.model.find_singleton(identifier) {
            if parameters.is_some() {
                return Err(ODataError::invalid_path(raw, "a singleton cannot take a key"));
            }
            let entity_type = self
                .model
                .find_structured_type(&singleton.entity_type)
                .ok_or_else(|| ODataError::UnknownType {
                    type_name: singleton.entity_type.clone(),
                })?;
            return Ok(Some(vec![PathSegment::Singleton {
                singleton,
                type_ref: EdmTypeRef::structured(entity_type, false),
            }]));
        }

        let imports = self.model.find_operation_imports(identifier);
        if imports.is_empty() {
            return Ok(None);
        }
        let overloads: Vec<Arc<Operation>> =
            imports.iter().map(|import| Arc::clone(&import.operation)).collect();
        let supplied = parse_parameters(parameters)?;
        let candidates = callable(raw, &overloads, parameters)?;
        let operation = select_overload(raw, &candidates, &supplied)?;
        let Some(import) = imports
            .iter()
            .find(|import| Arc::ptr_eq(&import.operation, operation))
        else {
            return Ok(None);
        };
        let navigation_source = import.entity_set.as_deref().and_then(|name| {
            self.model
                .find_entity_set(name)
                .map(NavigationSource::EntitySet)
                .or_else(|| self.model.find_singleton(name).map(NavigationSource::Singleton))
        });
        Ok(Some(vec![PathSegment::OperationImport {
            import: Arc::clone(import),
            parameters: operation_parameters(self.model, self.settings, self.aliases, operation, &supplied)?,
            type_ref: return_type(self.model, operation)?,
            navigation_source,
        }]))
    }

    fn next_segment(&self, walk: &mut Walk, raw: &str) -> Result<Option<Vec<PathSegment>>> {
        if let Some(previous) = walk.previous() {
            check_continuation(previous, raw)?;
        }
        if let Some(PathSegment::Ref { navigation_source }) = walk.previous() {
            return self.after_ref(walk, navigation_source.clone(), raw).map(Some);
        }
        let Some(current) = walk.previous_type() else {
            return self.after_untyped(walk, raw);
        };

        if walk.key_escape {
            walk.key_escape = false;
            return self.key_as_segment(walk, &current, raw).map(Some);
        }

        match raw {
            "$count" => {
                if !current.is_collection() {
                    return Err(ODataError::invalid_path(raw, "$count must follow a collection"));
                }
                return Ok(Some(vec![PathSegment::Count]));
            }
            "$value" => return self.value_segment(&current, raw).map(Some),
            "$ref" => return self.ref_segment(walk, raw).map(Some),
            "$metadata" | "$batch" => {
                return Err(ODataError::invalid_path(raw, "must be the first segment"));
            }
            "$" if self.settings.key_as_segment() => {
                walk.key_escape = true;
                return Ok(Some(Vec::new()));
            }
            _ => {}
        }

        if let Some(name) = self.template(raw) {
            if entity_type_of(&current).is_some() && current.is_collection() {
                return self.key_as_segment(walk, &current, raw).map(Some);
            }
            return Ok(Some(vec![PathSegment::PathTemplate {
                name: name.to_string(),
            }]));
        }

        let (identifier, parameters) = parse_segment_identifier(raw)?;
        if identifier.contains('.') {
            if let Some(SchemaType::Structured(target)) = self.model.find_type(identifier) {
                return self
                    .type_cast(walk, &current, target, identifier, parameters, raw)
                    .map(Some);
            }
            return self.bound_operation(walk, &current, identifier, parameters, raw);
        }

        if current.is_collection() {
            if self.settings.key_as_segment() && entity_type_of(&current).is_some() {
                return self.key_as_segment(walk, &current, raw).map(Some);
            }
            return Ok(None);
        }
        let Some(structured) = current.as_structured() else {
            return Ok(None);
        };
        match self.model.find_property(structured, identifier) {
            Some(PropertyLookup::Structural(property)) => {
                if parameters.is_some() {
                    return Err(ODataError::invalid_path(raw, "a property cannot take a key"));
                }
                let type_ref = self.model.property_type(&property).ok_or_else(|| {
                    ODataError::UnknownType {
                        type_name: property.type_name.clone(),
                    }
                })?;
                walk.binding_path.push(property.name.clone());
                Ok(Some(vec![PathSegment::Property { property, type_ref }]))
            }
            Some(PropertyLookup::Navigation(navigation)) => {
                self.navigation(walk, navigation, parameters).map(Some)
            }
            None if self.model.is_open_type(structured) => {
                if parameters.is_some() {
                    return Err(ODataError::invalid_path(raw, "an open property cannot take a key"));
                }
                Ok(Some(vec![PathSegment::OpenProperty {
                    name: identifier.to_string(),
                }]))
            }
            None => Ok(None),
        }
    }

    /// A collection of references may be narrowed to one entity with a segment key
    fn after_ref(
        &self,
        walk: &Walk,
        navigation_source: Option<NavigationSource>,
        raw: &str,
    ) -> Result<Vec<PathSegment>> {
        let referenced = walk
            .segments
            .len()
            .checked_sub(2)
            .and_then(|index| walk.segments[index].type_ref())
            .filter(|type_ref| type_ref.is_collection());
        match referenced {
            Some(type_ref) if self.settings.key_as_segment() => {
                Ok(vec![self.key(type_ref, navigation_source, raw, true, Vec::new())?])
            }
            _ => Err(ODataError::invalid_path(raw, "$ref must be the last segment")),
        }
    }

    /// After an open property, a template or a batch reference without a type only
    /// `$value` and further open members make sense
    fn after_untyped(&self, walk: &Walk, raw: &str) -> Result<Option<Vec<PathSegment>>> {
        match walk.previous() {
            Some(PathSegment::OpenProperty { .. }) if raw == "$value" => {
                Ok(Some(vec![PathSegment::Value { type_ref: None }]))
            }
            Some(PathSegment::OpenProperty { .. } | PathSegment::PathTemplate { .. }) => {
                let (identifier, parameters) = parse_segment_identifier(raw)?;
                if parameters.is_some() || identifier.starts_with('$') {
                    return Ok(None);
                }
                Ok(Some(vec![PathSegment::OpenProperty {
                    name: identifier.to_string(),
                }]))
            }
            _ => Ok(None),
        }
    }

    fn template<'s>(&self, raw: &'s str) -> Option<&'s str> {
        template_name(raw).filter(|_| self.settings.enable_uri_template_parsing)
    }

    fn key(
        &self,
        collection_type: &EdmTypeRef,
        navigation_source: Option<NavigationSource>,
        text: &str,
        as_segment: bool,
        implicit: Vec<NamedSegmentValue>,
    ) -> Result<PathSegment> {
        key_segment(
            self.model,
            self.settings,
            self.aliases,
            collection_type,
            navigation_source,
            text,
            as_segment,
            implicit,
        )
    }

    fn key_as_segment(&self, walk: &Walk, current: &EdmTypeRef, raw: &str) -> Result<Vec<PathSegment>> {
        let implicit = self.implicit_keys_for_previous(walk);
        Ok(vec![self.key(current, walk.previous_source(), raw, true, implicit)?])
    }

    /// Implicit key values when the previous segment is a collection navigation
    fn implicit_keys_for_previous(&self, walk: &Walk) -> Vec<NamedSegmentValue> {
        let count = walk.segments.len();
        match walk.previous() {
            Some(PathSegment::NavigationProperty { navigation, .. }) => {
                implicit_key_values(self.model, navigation, previous_keys(&walk.segments[..count - 1]))
            }
            _ => Vec::new(),
        }
    }

    fn navigation(
        &self,
        walk: &mut Walk,
        navigation: NavigationProperty,
        parameters: Option<&str>,
    ) -> Result<Vec<PathSegment>> {
        let type_ref = self.model.navigation_type(&navigation).ok_or_else(|| {
            ODataError::UnknownType {
                type_name: navigation.target_type.clone(),
            }
        })?;
        walk.binding_path.push(navigation.name.clone());
        let binding_path = walk.binding_path.join("/");
        walk.binding_path.clear();
        let navigation_source = walk
            .previous_source()
            .and_then(|source| self.model.navigation_target(&source, &binding_path, &navigation));

        let mut resolved = Vec::with_capacity(2);
        if let Some(keys) = parameters {
            if !navigation.collection {
                return Err(ODataError::invalid_path(
                    &navigation.name,
                    "a single-valued navigation property cannot take a key",
                ));
            }
            let implicit = implicit_key_values(self.model, &navigation, previous_keys(&walk.segments));
            let key = self.key(&type_ref, navigation_source.clone(), keys, false, implicit)?;
            resolved.push(PathSegment::NavigationProperty {
                navigation,
                type_ref,
                navigation_source,
            });
            resolved.push(key);
        } else {
            resolved.push(PathSegment::NavigationProperty {
                navigation,
                type_ref,
                navigation_source,
            });
        }
        Ok(resolved)
    }

    fn type_cast(
        &self,
        walk: &mut Walk,
        current: &EdmTypeRef,
        target: Arc<StructuredType>,
        identifier: &str,
        parameters: Option<&str>,
        raw: &str,
    ) -> Result<Vec<PathSegment>> {
        let related = current
            .element_type()
            .as_structured()
            .is_some_and(|ty| self.model.is_related(ty, &target));
        if !related {
            return Err(ODataError::not_found(
                raw,
                format!("type {identifier} is not related to {}", current.full_name()),
            ));
        }
        let element = EdmTypeRef::structured(target, current.element_type().nullable);
        let type_ref = if current.is_collection() {
            EdmTypeRef::collection(element)
        } else {
            element
        };
        let navigation_source = walk.previous_source();
        walk.binding_path.push(identifier.to_string());

        let mut resolved = vec![PathSegment::TypeCast {
            type_ref: type_ref.clone(),
            navigation_source: navigation_source.clone(),
        }];
        if let Some(keys) = parameters {
            resolved.push(self.key(&type_ref, navigation_source, keys, false, Vec::new())?);
        }
        Ok(resolved)
    }

    fn bound_operation(
        &self,
        walk: &mut Walk,
        current: &EdmTypeRef,
        identifier: &str,
        parameters: Option<&str>,
        raw: &str,
    ) -> Result<Option<Vec<PathSegment>>> {
        let overloads = self.model.find_bound_operations(identifier, current);
        if overloads.is_empty() {
            return Ok(None);
        }
        let supplied = parse_parameters(parameters)?;
        let candidates = callable(raw, &overloads, parameters)?;
        let operation = select_overload(raw, &candidates, &supplied)?;
        let navigation_source = entity_set_path_target(self.model, operation, walk.previous_source().as_ref());
        walk.binding_path.clear();
        Ok(Some(vec![PathSegment::Operation {
            operation: Arc::clone(operation),
            parameters: operation_parameters(self.model, self.settings, self.aliases, operation, &supplied)?,
            type_ref: return_type(self.model, operation)?,
            navigation_source,
        }]))
    }

    /// `$value` on a primitive or enum value, or on an entity as its media stream
    fn value_segment(&self, current: &EdmTypeRef, raw: &str) -> Result<Vec<PathSegment>> {
        let type_ref = if current.is_collection() {
            None
        } else if current.is_primitive() || current.is_enum() {
            Some(current.clone())
        } else if current.is_entity() {
            Some(EdmTypeRef::primitive(EdmPrimitiveKind::Stream, false))
        } else {
            None
        };
        match type_ref {
            Some(type_ref) => Ok(vec![PathSegment::Value {
                type_ref: Some(type_ref),
            }]),
            None => Err(ODataError::invalid_path(
                raw,
                format!("$value cannot follow a value of type {}", current.full_name()),
            )),
        }
    }

    /// `$ref` after a navigation property, or after a key on one
    fn ref_segment(&self, walk: &Walk, raw: &str) -> Result<Vec<PathSegment>> {
        let follows_navigation = walk
            .segments
            .iter()
            .rev()
            .find(|segment| !matches!(segment, PathSegment::Key { .. } | PathSegment::TypeCast { .. }))
            .is_some_and(|segment| matches!(segment, PathSegment::NavigationProperty { .. }));
        if !follows_navigation {
            return Err(ODataError::invalid_path(raw, "$ref must follow a navigation property"));
        }
        Ok(vec![PathSegment::Ref {
            navigation_source: walk.previous_source(),
        }])
    }
}

/// Reject any segment after one that must end the path
fn check_continuation(previous: &PathSegment, raw: &str) -> Result<()> {
    let operation = match previous {
        segment if segment.is_terminal() => {
            return Err(ODataError::invalid_path(
                raw,
                format!("no segment may follow {segment}"),
            ));
        }
        PathSegment::Operation { operation, .. } => operation,
        PathSegment::OperationImport { import, .. } => &import.operation,
        _ => return Ok(()),
    };
    if !operation.is_function() {
        return Err(ODataError::invalid_path(
            raw,
            format!("no segment may follow the action {}", operation.full_name()),
        ));
    }
    if !operation.is_composable {
        return Err(ODataError::invalid_path(
            raw,
            format!("function {} is not composable", operation.full_name()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyConvention;
    use crate::model::{InMemoryModel, ModelBuilder, ODataValue};
    use crate::path::{BatchReference, SegmentValue};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn model() -> InMemoryModel {
        ModelBuilder::new("NS")
            .complex_type("Address", |t| {
                t.property("City", "Edm.String", true)
                    .navigation("Country", "NS.Country", false)
            })
            .entity_type("Person", |t| {
                t.key(&["ID"])
                    .property("ID", "Edm.Int32", false)
                    .property("Name", "Edm.String", true)
                    .property("Photo", "Edm.Stream", true)
                    .property("Home", "NS.Address", true)
                    .property("Emails", "Collection(Edm.String)", false)
                    .navigation("Friends", "NS.Person", true)
                    .navigation("BestFriend", "NS.Person", false)
            })
            .entity_type("Employee", |t| t.base("NS.Person").property("Level", "Edm.Int32", false))
            .entity_type("Country", |t| t.key(&["Code"]).property("Code", "Edm.String", false))
            .entity_type("Dog", |t| {
                t.key(&["ID"])
                    .property("ID", "Edm.Int32", false)
                    .navigation("MyPeople", "NS.Person", true)
            })
            .entity_type("Bag", |t| t.key(&["ID"]).open().property("ID", "Edm.Int32", false))
            .entity_set(
                "People",
                "Person",
                &[("Friends", "People"), ("BestFriend", "People"), ("Home/Country", "Countries")],
            )
            .entity_set("Dogs", "Dog", &[("MyPeople", "People")])
            .entity_set("Countries", "Country", &[])
            .entity_set("Bags", "Bag", &[])
            .singleton("Me", "Person", &[("Friends", "People")])
            .function("Adults", |f| {
                f.bound_to("Collection(NS.Person)")
                    .returns("Collection(NS.Person)", false)
                    .composable()
                    .entity_set_path("people")
            })
            .function("Rank", |f| f.bound_to("NS.Person").returns("Edm.Int32", false))
            .action("Promote", |a| a.bound_to("NS.Person").parameter("level", "Edm.Int32", false))
            .function("Oldest", |f| f.parameter("min", "Edm.Int32", false).returns("NS.Person", true))
            .operation_import("GetOldest", "Oldest", Some("People"))
            .build()
    }

    fn resolve(path: &str) -> Result<ODataPath> {
        let model = model();
        let settings = ParserSettings::default();
        PathResolver::new(&model, &settings).resolve_str(path)
    }

    fn resolve_with(path: &str, settings: ParserSettings) -> Result<ODataPath> {
        let model = model();
        PathResolver::new(&model, &settings).resolve_str(path)
    }

    fn shape(path: &str) -> String {
        resolve(path).expect("path resolves").to_string()
    }

    #[test]
    fn test_key_then_navigation_key() {
        let path = resolve("Dogs(1)/MyPeople(2)").expect("path resolves");
        assert_eq!(
            path.to_string(),
            "EntitySet(Dogs)/Key(ID=1)/NavigationProperty(MyPeople)->People/Key(ID=2)"
        );
        assert_eq!(path.len(), 4);
        assert_eq!(path.navigation_source().map(|s| s.name()), Some("People".to_string()));
        let Some(PathSegment::Key { keys, .. }) = path.last() else {
            panic!("expected a key segment");
        };
        assert_eq!(keys[0].value, SegmentValue::Literal(ODataValue::Int32(2)));
    }

    #[rstest]
    #[case("People", "EntitySet(People)")]
    #[case("People/$count", "EntitySet(People)/$count")]
    #[case("People(1)/Name/$value", "EntitySet(People)/Key(ID=1)/Property(Name)/$value")]
    #[case("People(1)/Friends/$ref", "EntitySet(People)/Key(ID=1)/NavigationProperty(Friends)->People/$ref")]
    #[case("People(1)/Friends(2)/$ref", "EntitySet(People)/Key(ID=1)/NavigationProperty(Friends)->People/Key(ID=2)/$ref")]
    #[case("People/NS.Employee", "EntitySet(People)/TypeCast(Collection(NS.Employee))")]
    #[case("People/NS.Employee(3)/Level", "EntitySet(People)/TypeCast(Collection(NS.Employee))/Key(ID=3)/Property(Level)")]
    #[case("Me/BestFriend/Name", "Singleton(Me)/NavigationProperty(BestFriend)/Property(Name)")]
    #[case("People(1)/Home/Country", "EntitySet(People)/Key(ID=1)/Property(Home)/NavigationProperty(Country)->Countries")]
    #[case("Bags(1)/Color", "EntitySet(Bags)/Key(ID=1)/OpenProperty(Color)")]
    #[case("People/NS.Adults()/$count", "EntitySet(People)/Operation(NS.Adults())/$count")]
    #[case("People(1)/NS.Promote", "EntitySet(People)/Key(ID=1)/Operation(NS.Promote())")]
    #[case("GetOldest(min=18)", "OperationImport(GetOldest(min=18))")]
    #[case("$metadata", "$metadata")]
    #[case("People(1)/Photo/$value", "EntitySet(People)/Key(ID=1)/Property(Photo)/$value")]
    fn test_resolves(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(shape(path), expected);
    }

    #[test]
    fn test_navigation_sources() {
        let path = resolve("People/NS.Adults()").expect("path resolves");
        assert_eq!(path.navigation_source().map(|s| s.name()), Some("People".to_string()));
        let path = resolve("GetOldest(min=18)").expect("path resolves");
        assert_eq!(path.navigation_source().map(|s| s.name()), Some("People".to_string()));
        let path = resolve("Me/Friends").expect("path resolves");
        assert_eq!(path.navigation_source().map(|s| s.name()), Some("People".to_string()));
    }

    #[rstest]
    #[case("People(1)/$count")]
    #[case("People/$count/$value")]
    #[case("People(1)/Home/$value")]
    #[case("People/$ref")]
    #[case("People(1)/Friends/$ref/Name")]
    #[case("Me(1)")]
    #[case("People(1)/NS.Promote/Name")]
    #[case("People(1)/NS.Rank()/Name")]
    #[case("People(1)/$metadata")]
    #[case("GetOldest")]
    #[case("People(Name='x')")]
    fn test_invalid_paths(#[case] path: &str) {
        let error = resolve(path).expect_err("path is invalid");
        assert!(
            matches!(error, ODataError::InvalidPath { .. } | ODataError::ResourceNotFound { .. } | ODataError::Syntax { .. }),
            "{path}: {error:?}"
        );
    }

    #[test]
    fn test_unrelated_cast_is_not_found() {
        let error = resolve("People/NS.Dog").expect_err("unrelated cast");
        assert!(matches!(error, ODataError::ResourceNotFound { .. }));
        assert_eq!(error.category(), crate::error::ErrorCategory::NotFound);
    }

    #[test]
    fn test_unrecognized_path_keeps_prefix_and_rest() {
        let error = resolve("People(1)/Nope/Name/$value").expect_err("unknown member");
        let details = error.as_unrecognized_path().expect("structured failure");
        assert_eq!(details.parsed.to_string(), "EntitySet(People)/Key(ID=1)");
        assert_eq!(details.segment, "Nope");
        assert_eq!(details.remaining, vec!["Name".to_string(), "$value".to_string()]);

        let error = resolve("Cats(1)").expect_err("unknown set");
        let details = error.as_unrecognized_path().expect("structured failure");
        assert!(details.parsed.is_empty());
    }

    #[test]
    fn test_key_as_segment() {
        let settings = ParserSettings::default().with_key_convention(KeyConvention::KeyAsSegment);
        let path = resolve_with("Dogs/1/MyPeople/2/Name", settings.clone()).expect("path resolves");
        assert_eq!(
            path.to_string(),
            "EntitySet(Dogs)/Key(ID=1)/NavigationProperty(MyPeople)->People/Key(ID=2)/Property(Name)"
        );
        let path = resolve_with("Countries/$/Friends", settings.clone()).expect("escaped key");
        let Some(PathSegment::Key { keys, .. }) = path.last() else {
            panic!("expected a key segment");
        };
        assert_eq!(keys[0].value, SegmentValue::Literal(ODataValue::String("Friends".to_string())));
        let path = resolve_with("People(1)/Friends/$ref/2", settings.clone()).expect("reference key");
        assert_eq!(path.last().map(PathSegment::kind_name), Some("Key"));
        assert!(resolve_with("Dogs/$", settings).is_err());
        assert!(resolve("Dogs/1").expect_err("parentheses only").as_unrecognized_path().is_some());
    }

    #[test]
    fn test_templates() {
        let path = resolve_with("People/{id}/Name", ParserSettings::lenient()).expect("template key");
        let Some(PathSegment::Key { keys, .. }) = path.segments().get(1) else {
            panic!("expected a key segment");
        };
        assert_eq!(keys[0].value, SegmentValue::Template("id".to_string()));
        let path = resolve_with("{root}/Anything", ParserSettings::lenient()).expect("template root");
        assert_eq!(path.to_string(), "PathTemplate({root})/OpenProperty(Anything)");
        assert!(resolve("{root}").is_err());
    }

    #[test]
    fn test_batch_reference() {
        let model = model();
        let settings = ParserSettings::default();
        let people = model.find_entity_set("People").expect("set");
        let person = model.find_structured_type("NS.Person").expect("type");
        let callback = move |id: &str| {
            (id == "1").then(|| BatchReference {
                type_ref: EdmTypeRef::structured(Arc::clone(&person), false),
                navigation_source: Some(NavigationSource::EntitySet(Arc::clone(&people))),
            })
        };
        let resolver = PathResolver::new(&model, &settings).with_batch_callback(&callback);
        let path = resolver.resolve_str("$1/Friends").expect("reference resolves");
        assert_eq!(
            path.to_string(),
            "BatchReference(1)/NavigationProperty(Friends)->People"
        );
        assert!(resolver.resolve_str("$2/Friends").is_err());
    }

    #[test]
    fn test_alias_key_value() {
        let model = model();
        let settings = ParserSettings::default();
        let mut raw = IndexMap::new();
        raw.insert("@id".to_string(), "5".to_string());
        let aliases = ParameterAliases::new(raw);
        let path = PathResolver::new(&model, &settings)
            .with_aliases(&aliases)
            .resolve_str("People(@id)")
            .expect("alias key");
        assert_eq!(path.to_string(), "EntitySet(People)/Key(ID=5)");
    }

    #[test]
    fn test_segment_count_limit() {
        let settings = ParserSettings::default().with_max_depth(3);
        assert!(resolve_with("People(1)/BestFriend/Name", settings.clone()).is_ok());
        assert_eq!(
            resolve_with("People(1)/BestFriend/BestFriend/Name", settings),
            Err(ODataError::RecursionDepthExceeded { max: 3 })
        );
    }
}
