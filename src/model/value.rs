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

//! Runtime values produced by literal conversion

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::types::EdmPrimitiveKind;

/// A converted literal value
///
/// Values are typed by construction: a `Int32` value always came from a literal whose
/// natural or target type was `Edm.Int32`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum ODataValue {
    Null,
    Boolean(bool),
    Byte(u8),
    SByte(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Single(f32),
    Double(f64),
    Decimal(Decimal),
    String(String),
    Guid(Uuid),
    Date(NaiveDate),
    DateTimeOffset(DateTime<FixedOffset>),
    TimeOfDay(NaiveTime),
    Duration(#[serde(serialize_with = "serialize_duration")] TimeDelta),
    Binary(Vec<u8>),
    Spatial(SpatialValue),
    Enum(EnumValue),
    /// JSON array or object written inline in a query
    Json(serde_json::Value),
    Collection(Vec<ODataValue>),
}

fn serialize_duration<S: serde::Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&crate::literal::format_duration(value))
}

impl ODataValue {
    /// Primitive kind of the value, when it has one
    pub fn kind(&self) -> Option<EdmPrimitiveKind> {
        let kind = match self {
            Self::Boolean(_) => EdmPrimitiveKind::Boolean,
            Self::Byte(_) => EdmPrimitiveKind::Byte,
            Self::SByte(_) => EdmPrimitiveKind::SByte,
            Self::Int16(_) => EdmPrimitiveKind::Int16,
            Self::Int32(_) => EdmPrimitiveKind::Int32,
            Self::Int64(_) => EdmPrimitiveKind::Int64,
            Self::Single(_) => EdmPrimitiveKind::Single,
            Self::Double(_) => EdmPrimitiveKind::Double,
            Self::Decimal(_) => EdmPrimitiveKind::Decimal,
            Self::String(_) => EdmPrimitiveKind::String,
            Self::Guid(_) => EdmPrimitiveKind::Guid,
            Self::Date(_) => EdmPrimitiveKind::Date,
            Self::DateTimeOffset(_) => EdmPrimitiveKind::DateTimeOffset,
            Self::TimeOfDay(_) => EdmPrimitiveKind::TimeOfDay,
            Self::Duration(_) => EdmPrimitiveKind::Duration,
            Self::Binary(_) => EdmPrimitiveKind::Binary,
            Self::Spatial(spatial) => spatial.kind,
            Self::Null | Self::Enum(_) | Self::Json(_) | Self::Collection(_) => return None,
        };
        Some(kind)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integral payload widened to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Byte(v) => Some(i64::from(*v)),
            Self::SByte(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ODataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::literal::to_uri_literal(self))
    }
}

/// Value of an enumeration type
///
/// Two enum values are equal when they have the same type and the same numeric value,
/// regardless of how the members were spelled.
#[derive(Debug, Clone, Serialize)]
pub struct EnumValue {
    pub type_name: String,
    pub value: i64,
    /// Member names as resolved, in canonical order
    pub text: String,
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.value == other.value
    }
}

/// A coordinate in a spatial value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
    pub m: Option<f64>,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            z: None,
            m: None,
        }
    }
}

/// Shape of a spatial value in well-known-text terms
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Shape {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Vec<Position>>),
    MultiPoint(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
    Collection(Vec<Shape>),
}

impl Shape {
    /// Concrete kind for this shape in the geography or geometry family
    pub fn kind(&self, geography: bool) -> EdmPrimitiveKind {
        use EdmPrimitiveKind::*;
        match (self, geography) {
            (Shape::Point(_), true) => GeographyPoint,
            (Shape::LineString(_), true) => GeographyLineString,
            (Shape::Polygon(_), true) => GeographyPolygon,
            (Shape::MultiPoint(_), true) => GeographyMultiPoint,
            (Shape::MultiLineString(_), true) => GeographyMultiLineString,
            (Shape::MultiPolygon(_), true) => GeographyMultiPolygon,
            (Shape::Collection(_), true) => GeographyCollection,
            (Shape::Point(_), false) => GeometryPoint,
            (Shape::LineString(_), false) => GeometryLineString,
            (Shape::Polygon(_), false) => GeometryPolygon,
            (Shape::MultiPoint(_), false) => GeometryMultiPoint,
            (Shape::MultiLineString(_), false) => GeometryMultiLineString,
            (Shape::MultiPolygon(_), false) => GeometryMultiPolygon,
            (Shape::Collection(_), false) => GeometryCollection,
        }
    }
}

/// A geography or geometry literal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialValue {
    /// Concrete kind, e.g. `Edm.GeographyPoint`
    pub kind: EdmPrimitiveKind,
    pub srid: Option<u32>,
    pub shape: Shape,
}

impl SpatialValue {
    pub fn is_geography(&self) -> bool {
        self.kind.is_geography()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_equality_ignores_spelling() {
        let a = EnumValue {
            type_name: "NS.Color".to_string(),
            value: 3,
            text: "Red,Green".to_string(),
        };
        let b = EnumValue {
            type_name: "NS.Color".to_string(),
            value: 3,
            text: "3".to_string(),
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_value_kinds() {
        assert_eq!(ODataValue::Int32(1).kind(), Some(EdmPrimitiveKind::Int32));
        assert_eq!(ODataValue::Null.kind(), None);
        let point = SpatialValue {
            kind: EdmPrimitiveKind::GeographyPoint,
            srid: Some(4326),
            shape: Shape::Point(Position::new(1.0, 2.0)),
        };
        assert_eq!(
            ODataValue::Spatial(point).kind(),
            Some(EdmPrimitiveKind::GeographyPoint)
        );
        assert_eq!(ODataValue::Int16(7).as_i64(), Some(7));
    }
}
