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

//! Well-known-text parsing and formatting for geography and geometry literals
//!
//! Accepted forms follow the OData ABNF: an optional `SRID=n;` prefix followed by
//! `POINT`, `LINESTRING`, `POLYGON`, `MULTIPOINT`, `MULTILINESTRING`, `MULTIPOLYGON` or
//! `COLLECTION` (also spelled `GEOMETRYCOLLECTION`/`GEOGRAPHYCOLLECTION`). Keywords are
//! case-insensitive.

use std::fmt::Write;

use super::ConversionError;
use crate::model::{EdmPrimitiveKind, Position, Shape, SpatialValue};

/// Nesting limit for `COLLECTION(...)` literals
const MAX_COLLECTION_NESTING: usize = 32;

/// Parse the body of a `geography'...'` or `geometry'...'` literal
pub fn parse_wkt(text: &str, geography: bool) -> Result<SpatialValue, ConversionError> {
    let type_name = if geography { "Edm.Geography" } else { "Edm.Geometry" };
    let mut parser = WktParser {
        input: text.as_bytes(),
        text,
        pos: 0,
        type_name,
    };
    let srid = parser.parse_srid()?;
    let shape = parser.parse_shape(0)?;
    parser.skip_whitespace();
    if parser.pos != parser.input.len() {
        return Err(parser.error("trailing characters after shape"));
    }
    Ok(SpatialValue {
        kind: shape.kind(geography),
        srid,
        shape,
    })
}

struct WktParser<'a> {
    input: &'a [u8],
    text: &'a str,
    pos: usize,
    type_name: &'static str,
}

impl WktParser<'_> {
    fn error(&self, reason: &str) -> ConversionError {
        ConversionError::invalid(self.text, self.type_name, format!("{reason} at offset {}", self.pos))
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), ConversionError> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn keyword(&mut self) -> String {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        self.text[start..self.pos].to_ascii_uppercase()
    }

    fn parse_srid(&mut self) -> Result<Option<u32>, ConversionError> {
        self.skip_whitespace();
        let rest = &self.text[self.pos..];
        if !rest
            .get(..5)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("SRID="))
        {
            return Ok(None);
        }
        self.pos += 5;
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let srid = self.text[start..self.pos]
            .parse::<u32>()
            .map_err(|_| self.error("invalid SRID"))?;
        self.expect(b';')?;
        Ok(Some(srid))
    }

    fn parse_shape(&mut self, nesting: usize) -> Result<Shape, ConversionError> {
        if nesting > MAX_COLLECTION_NESTING {
            return Err(self.error("collection nesting too deep"));
        }
        let keyword = self.keyword();
        self.expect(b'(')?;
        let shape = match keyword.as_str() {
            "POINT" => Shape::Point(self.parse_position()?),
            "LINESTRING" => Shape::LineString(self.parse_positions()?),
            "POLYGON" => Shape::Polygon(self.parse_rings()?),
            "MULTIPOINT" => Shape::MultiPoint(self.parse_multi_point()?),
            "MULTILINESTRING" => Shape::MultiLineString(self.parse_rings_or_empty()?),
            "MULTIPOLYGON" => {
                let mut polygons = Vec::new();
                if !self.at_close() {
                    loop {
                        self.expect(b'(')?;
                        polygons.push(self.parse_rings()?);
                        self.expect(b')')?;
                        if !self.eat(b',') {
                            break;
                        }
                    }
                }
                Shape::MultiPolygon(polygons)
            }
            "COLLECTION" | "GEOMETRYCOLLECTION" | "GEOGRAPHYCOLLECTION" => {
                let mut shapes = Vec::new();
                if !self.at_close() {
                    loop {
                        shapes.push(self.parse_shape(nesting + 1)?);
                        if !self.eat(b',') {
                            break;
                        }
                    }
                }
                Shape::Collection(shapes)
            }
            "" => return Err(self.error("expected a shape keyword")),
            other => return Err(self.error(&format!("unknown shape '{other}'"))),
        };
        self.expect(b')')?;
        Ok(shape)
    }

    fn at_close(&mut self) -> bool {
        self.skip_whitespace();
        self.peek() == Some(b')')
    }

    fn parse_number(&mut self) -> Result<f64, ConversionError> {
        self.skip_whitespace();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'))
        {
            self.pos += 1;
        }
        let text = &self.text[start..self.pos];
        let value = text
            .parse::<f64>()
            .map_err(|_| self.error(&format!("invalid coordinate '{text}'")))?;
        if !value.is_finite() {
            return Err(self.error("coordinate out of range"));
        }
        Ok(value)
    }

    fn at_number(&mut self) -> bool {
        self.skip_whitespace();
        self.peek()
            .is_some_and(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.'))
    }

    fn parse_position(&mut self) -> Result<Position, ConversionError> {
        let x = self.parse_number()?;
        let y = self.parse_number()?;
        let mut position = Position::new(x, y);
        if self.at_number() {
            position.z = Some(self.parse_number()?);
            if self.at_number() {
                position.m = Some(self.parse_number()?);
            }
        }
        Ok(position)
    }

    fn parse_positions(&mut self) -> Result<Vec<Position>, ConversionError> {
        let mut positions = vec![self.parse_position()?];
        while self.eat(b',') {
            positions.push(self.parse_position()?);
        }
        Ok(positions)
    }

    fn parse_rings(&mut self) -> Result<Vec<Vec<Position>>, ConversionError> {
        let mut rings = Vec::new();
        loop {
            self.expect(b'(')?;
            rings.push(self.parse_positions()?);
            self.expect(b')')?;
            if !self.eat(b',') {
                break;
            }
        }
        Ok(rings)
    }

    fn parse_rings_or_empty(&mut self) -> Result<Vec<Vec<Position>>, ConversionError> {
        if self.at_close() {
            return Ok(Vec::new());
        }
        self.parse_rings()
    }

    /// Both `MULTIPOINT((1 2),(3 4))` and `MULTIPOINT(1 2,3 4)`
    fn parse_multi_point(&mut self) -> Result<Vec<Position>, ConversionError> {
        let mut points = Vec::new();
        if self.at_close() {
            return Ok(points);
        }
        loop {
            if self.eat(b'(') {
                points.push(self.parse_position()?);
                self.expect(b')')?;
            } else {
                points.push(self.parse_position()?);
            }
            if !self.eat(b',') {
                break;
            }
        }
        Ok(points)
    }
}

/// Render the body of a spatial literal, without the `geography'...'` wrapper
pub fn format_wkt(value: &SpatialValue) -> String {
    let mut out = String::new();
    if let Some(srid) = value.srid {
        let _ = write!(out, "SRID={srid};");
    }
    format_shape(&mut out, &value.shape);
    out
}

fn format_position(out: &mut String, position: &Position) {
    let _ = write!(out, "{} {}", position.x, position.y);
    if let Some(z) = position.z {
        let _ = write!(out, " {z}");
        if let Some(m) = position.m {
            let _ = write!(out, " {m}");
        }
    }
}

fn format_positions(out: &mut String, positions: &[Position]) {
    for (i, position) in positions.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        format_position(out, position);
    }
}

fn format_rings(out: &mut String, rings: &[Vec<Position>]) {
    for (i, ring) in rings.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('(');
        format_positions(out, ring);
        out.push(')');
    }
}

fn format_shape(out: &mut String, shape: &Shape) {
    match shape {
        Shape::Point(position) => {
            out.push_str("POINT(");
            format_position(out, position);
        }
        Shape::LineString(positions) => {
            out.push_str("LINESTRING(");
            format_positions(out, positions);
        }
        Shape::Polygon(rings) => {
            out.push_str("POLYGON(");
            format_rings(out, rings);
        }
        Shape::MultiPoint(points) => {
            out.push_str("MULTIPOINT(");
            for (i, point) in points.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push('(');
                format_position(out, point);
                out.push(')');
            }
        }
        Shape::MultiLineString(lines) => {
            out.push_str("MULTILINESTRING(");
            format_rings(out, lines);
        }
        Shape::MultiPolygon(polygons) => {
            out.push_str("MULTIPOLYGON(");
            for (i, polygon) in polygons.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push('(');
                format_rings(out, polygon);
                out.push(')');
            }
        }
        Shape::Collection(shapes) => {
            out.push_str("COLLECTION(");
            for (i, shape) in shapes.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                format_shape(out, shape);
            }
        }
    }
    out.push(')');
}

/// Whether a parsed spatial value can stand where `target` is expected
pub fn fits_kind(value: &SpatialValue, target: EdmPrimitiveKind) -> bool {
    value.kind == target || value.kind.spatial_root() == Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_point_with_srid() {
        let value = parse_wkt("SRID=4326;POINT(-122.1 47.6)", true).expect("point");
        assert_eq!(value.kind, EdmPrimitiveKind::GeographyPoint);
        assert_eq!(value.srid, Some(4326));
        assert_eq!(value.shape, Shape::Point(Position::new(-122.1, 47.6)));
        assert_eq!(format_wkt(&value), "SRID=4326;POINT(-122.1 47.6)");
    }

    #[test]
    fn test_polygon_and_collection() {
        let polygon = parse_wkt("Polygon((0 0,1 0,1 1,0 0))", false).expect("polygon");
        assert_eq!(polygon.kind, EdmPrimitiveKind::GeometryPolygon);
        let collection = parse_wkt(
            "SRID=0;Collection(Point(1 2),LineString(0 0,1 1))",
            false,
        )
        .expect("collection");
        assert_eq!(collection.kind, EdmPrimitiveKind::GeometryCollection);
        let reparsed = parse_wkt(&format_wkt(&collection), false).expect("reparse");
        assert_eq!(reparsed, collection);
    }

    #[test]
    fn test_multipoint_forms() {
        let nested = parse_wkt("MULTIPOINT((1 2),(3 4))", true).expect("nested");
        let flat = parse_wkt("MULTIPOINT(1 2,3 4)", true).expect("flat");
        assert_eq!(nested, flat);
        let empty = parse_wkt("MultiPoint()", true).expect("empty");
        assert_eq!(empty.shape, Shape::MultiPoint(Vec::new()));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(parse_wkt("POINT(1)", true).is_err());
        assert!(parse_wkt("CIRCLE(1 2)", true).is_err());
        assert!(parse_wkt("POINT(1 2) junk", true).is_err());
    }

    #[test]
    fn test_multibyte_text_is_an_error() {
        assert!(parse_wkt("Sé€ POINT(1 2)", true).is_err());
        assert!(parse_wkt("Sé€", false).is_err());
        assert!(parse_wkt("€", true).is_err());
    }

    #[test]
    fn test_fits_kind() {
        let point = parse_wkt("POINT(1 2)", true).expect("point");
        assert!(fits_kind(&point, EdmPrimitiveKind::Geography));
        assert!(fits_kind(&point, EdmPrimitiveKind::GeographyPoint));
        assert!(!fits_kind(&point, EdmPrimitiveKind::GeographyPolygon));
    }
}
