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

//! Key predicates and segment value conversion
//!
//! A key must name exactly the key properties declared on the root-most type of the
//! hierarchy. Values the previous segment already fixes through a referential
//! constraint may be left out and are filled in from that segment's key.

use std::sync::Arc;

use crate::binder::ParameterAliases;
use crate::config::ParserSettings;
use crate::error::{ODataError, Result};
use crate::literal::convert;
use crate::model::{
    EdmModel, EdmTypeRef, EdmPrimitiveKind, NavigationProperty, NavigationSource, ODataValue,
    PropertyLookup, StructuredType,
};
use crate::parser::path::template_name;
use crate::parser::{KeyValueText, parse_key_values};

use super::segment::{NamedSegmentValue, PathSegment, SegmentValue};

/// Convert the raw text of a key value or operation parameter
///
/// `@alias` reads the alias value from the query string (an absent alias is `null`),
/// `{name}` becomes a template when template parsing is enabled, and `bare_strings`
/// accepts unquoted string keys as written in key-as-segment paths.
pub(crate) fn segment_value(
    raw: &str,
    target: &EdmTypeRef,
    settings: &ParserSettings,
    aliases: Option<&ParameterAliases>,
    bare_strings: bool,
) -> Result<SegmentValue> {
    if settings.enable_uri_template_parsing {
        if let Some(name) = template_name(raw) {
            return Ok(SegmentValue::Template(name.to_string()));
        }
    }
    let text = match raw.strip_prefix('@') {
        Some(_) => aliases.and_then(|a| a.raw_value(raw)).unwrap_or("null"),
        None => raw,
    };
    if target.is_collection() || target.as_structured().is_some() {
        let value = serde_json::from_str(text).map_err(|e| {
            ODataError::invalid_path(raw, format!("expected a JSON value for {}: {e}", target.full_name()))
        })?;
        return Ok(SegmentValue::Literal(ODataValue::Json(value)));
    }
    let is_bare_string = bare_strings
        && target.as_primitive() == Some(EdmPrimitiveKind::String)
        && !text.starts_with('\'')
        && text != "null";
    if is_bare_string {
        return Ok(SegmentValue::Literal(ODataValue::String(text.to_string())));
    }
    Ok(SegmentValue::Literal(convert(text, target)?))
}

/// Values for the target's key fixed by the key of the previous segment
///
/// Looks at constraints declared on `navigation` itself and on its partner.
pub(crate) fn implicit_key_values(
    model: &dyn EdmModel,
    navigation: &NavigationProperty,
    previous_keys: &[NamedSegmentValue],
) -> Vec<NamedSegmentValue> {
    let lookup = |name: &str| {
        previous_keys
            .iter()
            .find(|k| k.name == name)
            .map(|k| k.value.clone())
    };
    let mut implicit: Vec<NamedSegmentValue> = Vec::new();
    let mut add = |name: &str, value: Option<SegmentValue>| {
        if let Some(value) = value {
            if !implicit.iter().any(|k| k.name == name) {
                implicit.push(NamedSegmentValue {
                    name: name.to_string(),
                    value,
                });
            }
        }
    };

    for constraint in &navigation.referential_constraints {
        add(&constraint.referenced_property, lookup(&constraint.property));
    }
    let partner = navigation.partner.as_deref().and_then(|partner| {
        let target = model.find_structured_type(&navigation.target_type)?;
        match model.find_property(&target, partner)? {
            PropertyLookup::Navigation(nav) => Some(nav),
            PropertyLookup::Structural(_) => None,
        }
    });
    if let Some(partner) = partner {
        for constraint in &partner.referential_constraints {
            add(&constraint.property, lookup(&constraint.referenced_property));
        }
    }
    implicit
}

/// Build the key segment for an entity collection of `collection_type`
///
/// `text` is the inside of the parentheses, or the whole segment in key-as-segment form.
#[allow(clippy::too_many_arguments)]
pub(crate) fn key_segment(
    model: &dyn EdmModel,
    settings: &ParserSettings,
    aliases: Option<&ParameterAliases>,
    collection_type: &EdmTypeRef,
    navigation_source: Option<NavigationSource>,
    text: &str,
    as_segment: bool,
    implicit: Vec<NamedSegmentValue>,
) -> Result<PathSegment> {
    let element = collection_type.element_type();
    let entity_type = element
        .as_structured()
        .filter(|_| collection_type.is_collection() && element.is_entity())
        .ok_or_else(|| {
            ODataError::invalid_path(text, format!("{} cannot take a key", collection_type.full_name()))
        })?;
    let key_properties = model.key_properties(entity_type);
    if key_properties.is_empty() {
        return Err(ODataError::invalid_path(
            text,
            format!("type {} declares no key", entity_type.full_name()),
        ));
    }

    let supplied = if as_segment {
        vec![KeyValueText {
            name: None,
            value: text.to_string(),
        }]
    } else {
        parse_key_values(text)?
    };

    let mut keys: Vec<NamedSegmentValue> = Vec::with_capacity(key_properties.len());
    let explicit_names: Vec<&str> = supplied.iter().filter_map(|k| k.name.as_deref()).collect();
    let mut positional = supplied.iter().find(|k| k.name.is_none());
    for property in &key_properties {
        let named = supplied
            .iter()
            .find(|k| k.name.as_deref() == Some(property.name.as_str()));
        let raw = match named {
            Some(value) => Some(value.value.as_str()),
            None if implicit.iter().any(|k| k.name == property.name) => None,
            None => positional.take().map(|k| k.value.as_str()),
        };
        let value = match raw {
            Some(raw) => {
                let target = model.property_type(property).ok_or_else(|| ODataError::UnknownType {
                    type_name: property.type_name.clone(),
                })?;
                segment_value(raw, &target, settings, aliases, as_segment)?
            }
            None => match implicit.iter().find(|k| k.name == property.name) {
                Some(implicit) => implicit.value.clone(),
                None => {
                    return Err(ODataError::invalid_path(
                        text,
                        format!("key property '{}' of {} is missing", property.name, entity_type.full_name()),
                    ));
                }
            },
        };
        keys.push(NamedSegmentValue {
            name: property.name.clone(),
            value,
        });
    }

    if positional.is_some() {
        return Err(ODataError::invalid_path(
            text,
            format!(
                "a single key value cannot address {} with a composite key",
                entity_type.full_name()
            ),
        ));
    }
    if let Some(unknown) = explicit_names
        .iter()
        .find(|name| !key_properties.iter().any(|p| p.name == **name))
    {
        return Err(ODataError::invalid_path(
            text,
            format!("'{unknown}' is not a key property of {}", entity_type.full_name()),
        ));
    }

    Ok(PathSegment::Key {
        keys,
        type_ref: EdmTypeRef::structured(Arc::clone(entity_type), false),
        navigation_source,
    })
}

/// Key values of the entity the segments before a navigation property address
pub(crate) fn previous_keys(segments: &[PathSegment]) -> &[NamedSegmentValue] {
    for segment in segments.iter().rev() {
        match segment {
            PathSegment::Key { keys, .. } => return keys,
            PathSegment::TypeCast { .. } => continue,
            _ => break,
        }
    }
    &[]
}

pub(crate) fn entity_type_of(type_ref: &EdmTypeRef) -> Option<&Arc<StructuredType>> {
    type_ref.element_type().as_structured().filter(|_| type_ref.element_type().is_entity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InMemoryModel, ModelBuilder};
    use pretty_assertions::assert_eq;

    fn model() -> InMemoryModel {
        ModelBuilder::new("NS")
            .entity_type("Order", |t| {
                t.key(&["ID"])
                    .property("ID", "Edm.Int32", false)
                    .navigation_with_partner("Items", "NS.Item", true, "Order")
            })
            .entity_type("Item", |t| {
                t.key(&["OrderID", "ItemNo"])
                    .property("OrderID", "Edm.Int32", false)
                    .property("ItemNo", "Edm.Int32", false)
                    .property("Sku", "Edm.String", true)
                    .constrained_navigation("Order", "NS.Order", Some("Items"), &[("OrderID", "ID")])
            })
            .entity_set("Orders", "Order", &[("Items", "Items")])
            .entity_set("Items", "Item", &[("Order", "Orders")])
            .build()
    }

    fn items_type(model: &InMemoryModel) -> EdmTypeRef {
        let ty = model.find_structured_type("NS.Item").expect("item type");
        EdmTypeRef::collection(EdmTypeRef::structured(ty, false))
    }

    fn int(name: &str, value: i32) -> NamedSegmentValue {
        NamedSegmentValue {
            name: name.to_string(),
            value: SegmentValue::Literal(ODataValue::Int32(value)),
        }
    }

    #[test]
    fn test_composite_key() {
        let model = model();
        let settings = ParserSettings::default();
        let segment = key_segment(
            &model,
            &settings,
            None,
            &items_type(&model),
            None,
            "ItemNo=2,OrderID=1",
            false,
            Vec::new(),
        )
        .expect("key");
        let PathSegment::Key { keys, .. } = segment else {
            panic!("expected key");
        };
        assert_eq!(keys, vec![int("OrderID", 1), int("ItemNo", 2)]);
    }

    #[test]
    fn test_implicit_completion_from_partner_constraint() {
        let model = model();
        let settings = ParserSettings::default();
        let order = model.find_structured_type("NS.Order").expect("order");
        let Some(PropertyLookup::Navigation(items)) = model.find_property(&order, "Items") else {
            panic!("navigation expected");
        };
        let implicit = implicit_key_values(&model, &items, &[int("ID", 7)]);
        assert_eq!(implicit, vec![int("OrderID", 7)]);

        let segment = key_segment(
            &model,
            &settings,
            None,
            &items_type(&model),
            None,
            "2",
            false,
            implicit,
        )
        .expect("completed key");
        let PathSegment::Key { keys, .. } = segment else {
            panic!("expected key");
        };
        assert_eq!(keys, vec![int("OrderID", 7), int("ItemNo", 2)]);
    }

    #[test]
    fn test_key_errors() {
        let model = model();
        let settings = ParserSettings::default();
        let ty = items_type(&model);
        let key = |text: &str| key_segment(&model, &settings, None, &ty, None, text, false, Vec::new());
        assert!(key("1").is_err());
        assert!(key("OrderID=1").is_err());
        assert!(key("OrderID=1,ItemNo=2,Sku='x'").is_err());
        assert!(key("OrderID=1,ItemNo='x'").is_err());
        assert!(matches!(
            key("OrderID=1,OrderID=2"),
            Err(ODataError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_segment_values() {
        let settings = ParserSettings::lenient();
        let string = EdmTypeRef::primitive(EdmPrimitiveKind::String, false);
        assert_eq!(
            segment_value("abc", &string, &settings, None, true).expect("bare"),
            SegmentValue::Literal(ODataValue::String("abc".to_string()))
        );
        assert_eq!(
            segment_value("{id}", &string, &settings, None, false).expect("template"),
            SegmentValue::Template("id".to_string())
        );
        assert_eq!(
            segment_value("@missing", &string, &settings, None, false).expect("alias"),
            SegmentValue::Literal(ODataValue::Null)
        );
        assert!(segment_value("abc", &string, &ParserSettings::default(), None, false).is_err());
    }
}
