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

//! Type references for the Entity Data Model
//!
//! `EdmTypeRef` is the currency of the whole pipeline: every resolved path segment and
//! every bound semantic node carries one (or `None` for dynamic values).

use super::schema::{EnumType, StructuredKind, StructuredType};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Primitive kinds known to the Entity Data Model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdmPrimitiveKind {
    Binary,
    Boolean,
    Byte,
    Date,
    DateTimeOffset,
    Decimal,
    Double,
    Duration,
    Guid,
    Int16,
    Int32,
    Int64,
    SByte,
    Single,
    Stream,
    String,
    TimeOfDay,
    Geography,
    GeographyPoint,
    GeographyLineString,
    GeographyPolygon,
    GeographyMultiPoint,
    GeographyMultiLineString,
    GeographyMultiPolygon,
    GeographyCollection,
    Geometry,
    GeometryPoint,
    GeometryLineString,
    GeometryPolygon,
    GeometryMultiPoint,
    GeometryMultiLineString,
    GeometryMultiPolygon,
    GeometryCollection,
}

/// Process-wide primitive type table, keyed by qualified name (`Edm.Int32`)
static PRIMITIVE_TABLE: Lazy<FxHashMap<&'static str, EdmPrimitiveKind>> = Lazy::new(|| {
    EdmPrimitiveKind::ALL
        .iter()
        .map(|kind| (kind.qualified_name(), *kind))
        .collect()
});

impl EdmPrimitiveKind {
    /// Every primitive kind, in declaration order
    pub const ALL: [EdmPrimitiveKind; 33] = [
        Self::Binary,
        Self::Boolean,
        Self::Byte,
        Self::Date,
        Self::DateTimeOffset,
        Self::Decimal,
        Self::Double,
        Self::Duration,
        Self::Guid,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::SByte,
        Self::Single,
        Self::Stream,
        Self::String,
        Self::TimeOfDay,
        Self::Geography,
        Self::GeographyPoint,
        Self::GeographyLineString,
        Self::GeographyPolygon,
        Self::GeographyMultiPoint,
        Self::GeographyMultiLineString,
        Self::GeographyMultiPolygon,
        Self::GeographyCollection,
        Self::Geometry,
        Self::GeometryPoint,
        Self::GeometryLineString,
        Self::GeometryPolygon,
        Self::GeometryMultiPoint,
        Self::GeometryMultiLineString,
        Self::GeometryMultiPolygon,
        Self::GeometryCollection,
    ];

    /// Qualified name in the `Edm` namespace
    pub const fn qualified_name(self) -> &'static str {
        match self {
            Self::Binary => "Edm.Binary",
            Self::Boolean => "Edm.Boolean",
            Self::Byte => "Edm.Byte",
            Self::Date => "Edm.Date",
            Self::DateTimeOffset => "Edm.DateTimeOffset",
            Self::Decimal => "Edm.Decimal",
            Self::Double => "Edm.Double",
            Self::Duration => "Edm.Duration",
            Self::Guid => "Edm.Guid",
            Self::Int16 => "Edm.Int16",
            Self::Int32 => "Edm.Int32",
            Self::Int64 => "Edm.Int64",
            Self::SByte => "Edm.SByte",
            Self::Single => "Edm.Single",
            Self::Stream => "Edm.Stream",
            Self::String => "Edm.String",
            Self::TimeOfDay => "Edm.TimeOfDay",
            Self::Geography => "Edm.Geography",
            Self::GeographyPoint => "Edm.GeographyPoint",
            Self::GeographyLineString => "Edm.GeographyLineString",
            Self::GeographyPolygon => "Edm.GeographyPolygon",
            Self::GeographyMultiPoint => "Edm.GeographyMultiPoint",
            Self::GeographyMultiLineString => "Edm.GeographyMultiLineString",
            Self::GeographyMultiPolygon => "Edm.GeographyMultiPolygon",
            Self::GeographyCollection => "Edm.GeographyCollection",
            Self::Geometry => "Edm.Geometry",
            Self::GeometryPoint => "Edm.GeometryPoint",
            Self::GeometryLineString => "Edm.GeometryLineString",
            Self::GeometryPolygon => "Edm.GeometryPolygon",
            Self::GeometryMultiPoint => "Edm.GeometryMultiPoint",
            Self::GeometryMultiLineString => "Edm.GeometryMultiLineString",
            Self::GeometryMultiPolygon => "Edm.GeometryMultiPolygon",
            Self::GeometryCollection => "Edm.GeometryCollection",
        }
    }

    /// Unqualified name (`Int32`)
    pub fn name(self) -> &'static str {
        &self.qualified_name()[4..]
    }

    /// Look up a primitive kind by its qualified name
    pub fn from_qualified_name(name: &str) -> Option<Self> {
        PRIMITIVE_TABLE.get(name).copied()
    }

    /// Integral numeric kinds
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            Self::Byte | Self::SByte | Self::Int16 | Self::Int32 | Self::Int64
        )
    }

    /// Any numeric kind, integral or not
    pub fn is_numeric(self) -> bool {
        self.is_integral() || matches!(self, Self::Single | Self::Double | Self::Decimal)
    }

    pub fn is_geography(self) -> bool {
        matches!(
            self,
            Self::Geography
                | Self::GeographyPoint
                | Self::GeographyLineString
                | Self::GeographyPolygon
                | Self::GeographyMultiPoint
                | Self::GeographyMultiLineString
                | Self::GeographyMultiPolygon
                | Self::GeographyCollection
        )
    }

    pub fn is_geometry(self) -> bool {
        matches!(
            self,
            Self::Geometry
                | Self::GeometryPoint
                | Self::GeometryLineString
                | Self::GeometryPolygon
                | Self::GeometryMultiPoint
                | Self::GeometryMultiLineString
                | Self::GeometryMultiPolygon
                | Self::GeometryCollection
        )
    }

    pub fn is_spatial(self) -> bool {
        self.is_geography() || self.is_geometry()
    }

    /// Abstract spatial root a concrete spatial kind derives from
    pub fn spatial_root(self) -> Option<Self> {
        if self.is_geography() {
            Some(Self::Geography)
        } else if self.is_geometry() {
            Some(Self::Geometry)
        } else {
            None
        }
    }
}

impl fmt::Display for EdmPrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.qualified_name())
    }
}

/// Type definition a reference points at
#[derive(Debug, Clone)]
pub enum EdmType {
    Primitive(EdmPrimitiveKind),
    Entity(Arc<StructuredType>),
    Complex(Arc<StructuredType>),
    Enum(Arc<EnumType>),
    Collection(Box<EdmTypeRef>),
    /// `Edm.Untyped`
    Untyped,
}

impl PartialEq for EdmType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Primitive(a), Self::Primitive(b)) => a == b,
            (Self::Entity(a), Self::Entity(b)) | (Self::Complex(a), Self::Complex(b)) => {
                a.full_name() == b.full_name()
            }
            (Self::Enum(a), Self::Enum(b)) => a.full_name() == b.full_name(),
            (Self::Collection(a), Self::Collection(b)) => a.definition == b.definition,
            (Self::Untyped, Self::Untyped) => true,
            _ => false,
        }
    }
}

/// A type plus nullability facet
#[derive(Debug, Clone, PartialEq)]
pub struct EdmTypeRef {
    pub definition: EdmType,
    pub nullable: bool,
}

impl EdmTypeRef {
    pub fn primitive(kind: EdmPrimitiveKind, nullable: bool) -> Self {
        Self {
            definition: EdmType::Primitive(kind),
            nullable,
        }
    }

    /// Wrap a structured type, picking entity or complex by its kind
    pub fn structured(ty: Arc<StructuredType>, nullable: bool) -> Self {
        let definition = match ty.kind {
            StructuredKind::Entity => EdmType::Entity(ty),
            StructuredKind::Complex => EdmType::Complex(ty),
        };
        Self {
            definition,
            nullable,
        }
    }

    pub fn enumeration(ty: Arc<EnumType>, nullable: bool) -> Self {
        Self {
            definition: EdmType::Enum(ty),
            nullable,
        }
    }

    pub fn collection(element: EdmTypeRef) -> Self {
        Self {
            definition: EdmType::Collection(Box::new(element)),
            nullable: false,
        }
    }

    pub fn untyped() -> Self {
        Self {
            definition: EdmType::Untyped,
            nullable: true,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.definition, EdmType::Collection(_))
    }

    /// Element type of a collection, or the type itself
    pub fn element_type(&self) -> &EdmTypeRef {
        match &self.definition {
            EdmType::Collection(element) => element,
            _ => self,
        }
    }

    pub fn as_primitive(&self) -> Option<EdmPrimitiveKind> {
        match self.definition {
            EdmType::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn as_structured(&self) -> Option<&Arc<StructuredType>> {
        match &self.definition {
            EdmType::Entity(ty) | EdmType::Complex(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&Arc<EnumType>> {
        match &self.definition {
            EdmType::Enum(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn is_entity(&self) -> bool {
        matches!(self.definition, EdmType::Entity(_))
    }

    pub fn is_complex(&self) -> bool {
        matches!(self.definition, EdmType::Complex(_))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.definition, EdmType::Primitive(_))
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.definition, EdmType::Enum(_))
    }

    pub fn is_untyped(&self) -> bool {
        matches!(self.definition, EdmType::Untyped)
    }

    pub fn is_boolean(&self) -> bool {
        self.as_primitive() == Some(EdmPrimitiveKind::Boolean)
    }

    /// Same definition, ignoring nullability
    pub fn is_equivalent_to(&self, other: &EdmTypeRef) -> bool {
        self.definition == other.definition
    }

    /// Qualified name, `Collection(...)` for collections
    pub fn full_name(&self) -> String {
        match &self.definition {
            EdmType::Primitive(kind) => kind.qualified_name().to_string(),
            EdmType::Entity(ty) | EdmType::Complex(ty) => ty.full_name(),
            EdmType::Enum(ty) => ty.full_name(),
            EdmType::Collection(element) => format!("Collection({})", element.full_name()),
            EdmType::Untyped => "Edm.Untyped".to_string(),
        }
    }
}

impl fmt::Display for EdmTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())?;
        if self.nullable && !self.is_collection() {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// Split `Collection(X)` into `(X, true)`, anything else into `(name, false)`
pub fn split_collection_type_name(name: &str) -> (&str, bool) {
    let trimmed = name.trim();
    match trimmed
        .strip_prefix("Collection(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (inner.trim(), true),
        None => (trimmed, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_table_lookup() {
        assert_eq!(
            EdmPrimitiveKind::from_qualified_name("Edm.Int32"),
            Some(EdmPrimitiveKind::Int32)
        );
        assert_eq!(
            EdmPrimitiveKind::from_qualified_name("Edm.GeographyPoint"),
            Some(EdmPrimitiveKind::GeographyPoint)
        );
        assert_eq!(EdmPrimitiveKind::from_qualified_name("Int32"), None);
        assert_eq!(EdmPrimitiveKind::Int64.name(), "Int64");
    }

    #[test]
    fn test_spatial_roots() {
        assert_eq!(
            EdmPrimitiveKind::GeometryPolygon.spatial_root(),
            Some(EdmPrimitiveKind::Geometry)
        );
        assert_eq!(EdmPrimitiveKind::Double.spatial_root(), None);
    }

    #[test]
    fn test_collection_names() {
        let ty = EdmTypeRef::collection(EdmTypeRef::primitive(EdmPrimitiveKind::String, true));
        assert_eq!(ty.full_name(), "Collection(Edm.String)");
        assert_eq!(ty.element_type().as_primitive(), Some(EdmPrimitiveKind::String));
        assert_eq!(
            split_collection_type_name("Collection(NS.Address)"),
            ("NS.Address", true)
        );
        assert_eq!(split_collection_type_name("Edm.Int32"), ("Edm.Int32", false));
    }
}
