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

//! Resolved path segments
//!
//! A closed set of segment kinds; consumers match exhaustively instead of visiting.

use std::fmt;
use std::sync::Arc;

use crate::literal::to_uri_literal;
use crate::model::{
    EdmTypeRef, EntitySet, NavigationProperty, NavigationSource, ODataValue,
    Operation, OperationImport, Singleton, StructuralProperty,
};

/// Value supplied for a key property or operation parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentValue {
    Literal(ODataValue),
    /// `{name}` placeholder, kept when URI template parsing is enabled
    Template(String),
}

impl fmt::Display for SegmentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.write_str(&to_uri_literal(value)),
            Self::Template(name) => write!(f, "{{{name}}}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedSegmentValue {
    pub name: String,
    pub value: SegmentValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    EntitySet {
        entity_set: Arc<EntitySet>,
        type_ref: EdmTypeRef,
    },
    Singleton {
        singleton: Arc<Singleton>,
        type_ref: EdmTypeRef,
    },
    Key {
        keys: Vec<NamedSegmentValue>,
        type_ref: EdmTypeRef,
        navigation_source: Option<NavigationSource>,
    },
    NavigationProperty {
        navigation: NavigationProperty,
        type_ref: EdmTypeRef,
        navigation_source: Option<NavigationSource>,
    },
    TypeCast {
        type_ref: EdmTypeRef,
        navigation_source: Option<NavigationSource>,
    },
    Property {
        property: StructuralProperty,
        type_ref: EdmTypeRef,
    },
    /// Undeclared member of an open type
    OpenProperty {
        name: String,
    },
    OperationImport {
        import: Arc<OperationImport>,
        parameters: Vec<NamedSegmentValue>,
        type_ref: Option<EdmTypeRef>,
        navigation_source: Option<NavigationSource>,
    },
    /// Bound function or action
    Operation {
        operation: Arc<Operation>,
        parameters: Vec<NamedSegmentValue>,
        type_ref: Option<EdmTypeRef>,
        navigation_source: Option<NavigationSource>,
    },
    Count,
    Value {
        type_ref: Option<EdmTypeRef>,
    },
    Metadata,
    Batch,
    Ref {
        navigation_source: Option<NavigationSource>,
    },
    /// Leading `$<content-id>` inside a batch request
    BatchReference {
        content_id: String,
        type_ref: EdmTypeRef,
        navigation_source: Option<NavigationSource>,
    },
    /// `{name}` segment, kept when URI template parsing is enabled
    PathTemplate {
        name: String,
    },
}

impl PathSegment {
    /// Type the segment yields; `None` for open properties and keyword segments
    pub fn type_ref(&self) -> Option<&EdmTypeRef> {
        match self {
            Self::EntitySet { type_ref, .. }
            | Self::Singleton { type_ref, .. }
            | Self::Key { type_ref, .. }
            | Self::NavigationProperty { type_ref, .. }
            | Self::TypeCast { type_ref, .. }
            | Self::Property { type_ref, .. }
            | Self::BatchReference { type_ref, .. } => Some(type_ref),
            Self::OperationImport { type_ref, .. }
            | Self::Operation { type_ref, .. }
            | Self::Value { type_ref } => type_ref.as_ref(),
            Self::OpenProperty { .. }
            | Self::Count
            | Self::Metadata
            | Self::Batch
            | Self::Ref { .. }
            | Self::PathTemplate { .. } => None,
        }
    }

    /// Navigation source the segment targets, if it targets one
    pub fn navigation_source(&self) -> Option<NavigationSource> {
        match self {
            Self::EntitySet { entity_set, .. } => {
                Some(NavigationSource::EntitySet(Arc::clone(entity_set)))
            }
            Self::Singleton { singleton, .. } => {
                Some(NavigationSource::Singleton(Arc::clone(singleton)))
            }
            Self::Key {
                navigation_source, ..
            }
            | Self::NavigationProperty {
                navigation_source, ..
            }
            | Self::TypeCast {
                navigation_source, ..
            }
            | Self::OperationImport {
                navigation_source, ..
            }
            | Self::Operation {
                navigation_source, ..
            }
            | Self::Ref { navigation_source }
            | Self::BatchReference {
                navigation_source, ..
            } => navigation_source.clone(),
            _ => None,
        }
    }

    /// Short kind name, e.g. `EntitySet` or `Key`
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::EntitySet { .. } => "EntitySet",
            Self::Singleton { .. } => "Singleton",
            Self::Key { .. } => "Key",
            Self::NavigationProperty { .. } => "NavigationProperty",
            Self::TypeCast { .. } => "TypeCast",
            Self::Property { .. } => "Property",
            Self::OpenProperty { .. } => "OpenProperty",
            Self::OperationImport { .. } => "OperationImport",
            Self::Operation { .. } => "Operation",
            Self::Count => "Count",
            Self::Value { .. } => "Value",
            Self::Metadata => "Metadata",
            Self::Batch => "Batch",
            Self::Ref { .. } => "Ref",
            Self::BatchReference { .. } => "BatchReference",
            Self::PathTemplate { .. } => "PathTemplate",
        }
    }

    pub fn is_collection(&self) -> bool {
        self.type_ref().is_some_and(EdmTypeRef::is_collection)
    }

    /// Segment after which no further segment may follow
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Count | Self::Value { .. } | Self::Metadata | Self::Batch
        )
    }

    /// Primitive or enum value, possibly returned by an operation
    pub fn is_primitive_valued(&self) -> bool {
        self.type_ref()
            .is_some_and(|t| !t.is_collection() && (t.is_primitive() || t.is_enum()))
    }
}

fn write_values(f: &mut fmt::Formatter<'_>, values: &[NamedSegmentValue]) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}={}", value.name, value.value)?;
    }
    Ok(())
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntitySet { entity_set, .. } => write!(f, "EntitySet({})", entity_set.name),
            Self::Singleton { singleton, .. } => write!(f, "Singleton({})", singleton.name),
            Self::Key { keys, .. } => {
                f.write_str("Key(")?;
                write_values(f, keys)?;
                f.write_str(")")
            }
            Self::NavigationProperty {
                navigation,
                navigation_source,
                ..
            } => {
                write!(f, "NavigationProperty({})", navigation.name)?;
                if let Some(source) = navigation_source {
                    write!(f, "->{}", source.name())?;
                }
                Ok(())
            }
            Self::TypeCast { type_ref, .. } => write!(f, "TypeCast({})", type_ref.full_name()),
            Self::Property { property, .. } => write!(f, "Property({})", property.name),
            Self::OpenProperty { name } => write!(f, "OpenProperty({name})"),
            Self::OperationImport {
                import, parameters, ..
            } => {
                write!(f, "OperationImport({}(", import.name)?;
                write_values(f, parameters)?;
                f.write_str("))")
            }
            Self::Operation {
                operation,
                parameters,
                ..
            } => {
                write!(f, "Operation({}(", operation.full_name())?;
                write_values(f, parameters)?;
                f.write_str("))")
            }
            Self::Count => f.write_str("$count"),
            Self::Value { .. } => f.write_str("$value"),
            Self::Metadata => f.write_str("$metadata"),
            Self::Batch => f.write_str("$batch"),
            Self::Ref { .. } => f.write_str("$ref"),
            Self::BatchReference { content_id, .. } => write!(f, "BatchReference({content_id})"),
            Self::PathTemplate { name } => write!(f, "PathTemplate({{{name}}})"),
        }
    }
}

/// Ordered, read-only sequence of resolved segments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ODataPath {
    segments: Vec<PathSegment>,
}

impl ODataPath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathSegment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn first(&self) -> Option<&PathSegment> {
        self.segments.first()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Navigation source of the last segment that has one
    ///
    /// Stops at `$count`, `$value` and open properties, after which no source applies.
    pub fn navigation_source(&self) -> Option<NavigationSource> {
        for segment in self.segments.iter().rev() {
            match segment {
                PathSegment::Count
                | PathSegment::Value { .. }
                | PathSegment::OpenProperty { .. }
                | PathSegment::Property { .. } => return None,
                _ => {
                    if let Some(source) = segment.navigation_source() {
                        return Some(source);
                    }
                }
            }
        }
        None
    }

    /// Type of the last segment
    pub fn target_type(&self) -> Option<&EdmTypeRef> {
        self.segments.last().and_then(PathSegment::type_ref)
    }

    pub fn into_segments(self) -> Vec<PathSegment> {
        self.segments
    }
}

impl<'a> IntoIterator for &'a ODataPath {
    type Item = &'a PathSegment;
    type IntoIter = std::slice::Iter<'a, PathSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

impl fmt::Display for ODataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}
