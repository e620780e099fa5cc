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

//! Conversion between literal text and typed values

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat, TimeDelta};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use super::enum_literal::parse_enum_value;
use super::numeric::convert_numeric;
use super::spatial::{fits_kind, format_wkt, parse_wkt};
use super::{ConversionError, quote, strip_typed_prefix, unquote};
use crate::model::{EdmPrimitiveKind, EdmType, EdmTypeRef, ODataValue};

static URL_SAFE: Lazy<GeneralPurpose> = Lazy::new(|| {
    GeneralPurpose::new(
        &alphabet::URL_SAFE,
        GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
    )
});

static STANDARD: Lazy<GeneralPurpose> = Lazy::new(|| {
    GeneralPurpose::new(
        &alphabet::STANDARD,
        GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
    )
});

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-])?P(?:([0-9]+)D)?(?:T(?:([0-9]+)H)?(?:([0-9]+)M)?(?:([0-9]+)(?:\.([0-9]{1,12}))?S)?)?$")
        .expect("duration pattern")
});

/// Convert literal `text` into a value of `target`
///
/// `null` converts to [`ODataValue::Null`] for any target; the caller decides whether
/// null is acceptable in its position.
pub fn convert(text: &str, target: &EdmTypeRef) -> Result<ODataValue, ConversionError> {
    if text == "null" {
        return Ok(ODataValue::Null);
    }
    match &target.definition {
        EdmType::Primitive(kind) => convert_primitive(text, *kind),
        EdmType::Enum(enum_type) => {
            let type_name = enum_type.full_name();
            let body = match text.find('\'') {
                Some(at) if at > 0 => {
                    if text[..at] != type_name {
                        return Err(ConversionError::invalid(
                            text,
                            &type_name,
                            format!("literal is qualified with '{}'", &text[..at]),
                        ));
                    }
                    unquote(&text[at..])
                }
                Some(_) => unquote(text),
                None => Some(text.to_string()),
            }
            .ok_or_else(|| ConversionError::invalid(text, &type_name, "unterminated quote"))?;
            parse_enum_value(enum_type, &body).map(ODataValue::Enum)
        }
        EdmType::Collection(element) => {
            Err(ConversionError::invalid(text, &format!("Collection({})", element.full_name()), "collections have no literal form"))
        }
        EdmType::Entity(ty) | EdmType::Complex(ty) => Err(ConversionError::invalid(
            text,
            &ty.full_name(),
            "structured types have no literal form",
        )),
        EdmType::Untyped => serde_json::from_str(text)
            .map(ODataValue::Json)
            .map_err(|e| ConversionError::invalid(text, "Edm.Untyped", e.to_string())),
    }
}

/// Convert literal text into a primitive value of `kind`
pub fn convert_primitive(text: &str, kind: EdmPrimitiveKind) -> Result<ODataValue, ConversionError> {
    let type_name = kind.qualified_name();
    if text == "null" {
        return Ok(ODataValue::Null);
    }
    use EdmPrimitiveKind as K;
    match kind {
        K::Boolean => {
            if text.eq_ignore_ascii_case("true") {
                Ok(ODataValue::Boolean(true))
            } else if text.eq_ignore_ascii_case("false") {
                Ok(ODataValue::Boolean(false))
            } else {
                Err(ConversionError::invalid(text, type_name, "expected true or false"))
            }
        }
        K::Byte | K::SByte | K::Int16 | K::Int32 | K::Int64 | K::Single | K::Double | K::Decimal => {
            convert_numeric(text, kind)
        }
        K::String => unquote(text)
            .map(ODataValue::String)
            .ok_or_else(|| ConversionError::invalid(text, type_name, "strings are single-quoted")),
        K::Guid => {
            let body = strip_typed_prefix(text, &["guid"]).unwrap_or(text);
            if body.len() != 36 {
                return Err(ConversionError::invalid(text, type_name, "expected 8-4-4-4-12 hex digits"));
            }
            Uuid::parse_str(body)
                .map(ODataValue::Guid)
                .map_err(|e| ConversionError::invalid(text, type_name, e.to_string()))
        }
        K::Date => {
            let body = strip_typed_prefix(text, &["date"]).unwrap_or(text);
            NaiveDate::parse_from_str(body, "%Y-%m-%d")
                .map(ODataValue::Date)
                .map_err(|e| ConversionError::invalid(text, type_name, e.to_string()))
        }
        K::DateTimeOffset => {
            let body = strip_typed_prefix(text, &["datetimeoffset", "datetime"]).unwrap_or(text);
            parse_date_time_offset(body)
                .map(ODataValue::DateTimeOffset)
                .ok_or_else(|| ConversionError::invalid(text, type_name, "expected an ISO 8601 timestamp with offset"))
        }
        K::TimeOfDay => {
            let body = strip_typed_prefix(text, &["time", "timeofday"]).unwrap_or(text);
            NaiveTime::parse_from_str(body, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(body, "%H:%M"))
                .map(ODataValue::TimeOfDay)
                .map_err(|e| ConversionError::invalid(text, type_name, e.to_string()))
        }
        K::Duration => {
            let body = strip_typed_prefix(text, &["duration"]).unwrap_or(text);
            parse_duration(body)
                .map(ODataValue::Duration)
                .ok_or_else(|| ConversionError::invalid(text, type_name, "expected an ISO 8601 day-time duration"))
        }
        K::Binary => {
            if let Some(hex_body) = strip_typed_prefix(text, &["X"]).filter(|_| !text.starts_with('\'')) {
                return hex::decode(hex_body)
                    .map(ODataValue::Binary)
                    .map_err(|e| ConversionError::invalid(text, type_name, e.to_string()));
            }
            let body = strip_typed_prefix(text, &["binary"])
                .ok_or_else(|| ConversionError::invalid(text, type_name, "expected binary'...'"))?;
            URL_SAFE
                .decode(body)
                .or_else(|_| STANDARD.decode(body))
                .map(ODataValue::Binary)
                .map_err(|e| ConversionError::invalid(text, type_name, e.to_string()))
        }
        K::Stream => Err(ConversionError::invalid(text, type_name, "streams have no literal form")),
        spatial => {
            let geography = spatial.is_geography();
            let prefix = if geography { "geography" } else { "geometry" };
            let body = strip_typed_prefix(text, &[prefix])
                .ok_or_else(|| ConversionError::invalid(text, type_name, format!("expected {prefix}'...'")))?;
            let value = parse_wkt(body, geography)?;
            if !fits_kind(&value, spatial) {
                return Err(ConversionError::invalid(
                    text,
                    type_name,
                    format!("literal is a {}", value.kind.qualified_name()),
                ));
            }
            Ok(ODataValue::Spatial(value))
        }
    }
}

fn parse_date_time_offset(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(value) = DateTime::parse_from_rfc3339(text) {
        return Some(value);
    }
    // Seconds are optional in OData timestamps
    let (stamp, offset) = if let Some(stamp) = text.strip_suffix('Z').or_else(|| text.strip_suffix('z')) {
        (stamp, "+00:00")
    } else {
        let split = text.len().checked_sub(6)?;
        (text.get(..split)?, text.get(split..)?)
    };
    DateTime::parse_from_str(&format!("{stamp}{offset}"), "%Y-%m-%dT%H:%M%:z").ok()
}

/// Parse an ISO 8601 day-time duration such as `P1DT2H30M15.5S`
pub fn parse_duration(text: &str) -> Option<TimeDelta> {
    let captures = DURATION.captures(text)?;
    // `P` and `PT` alone carry no component
    if captures.iter().skip(2).all(|c| c.is_none()) {
        return None;
    }
    let number = |index: usize| -> Option<i64> {
        captures.get(index).map_or(Some(0), |m| m.as_str().parse().ok())
    };
    let nanos = match captures.get(6) {
        Some(fraction) => {
            let digits = fraction.as_str();
            let padded = format!("{digits:0<9}");
            padded.get(..9)?.parse::<i64>().ok()?
        }
        None => 0,
    };
    let total = TimeDelta::try_days(number(2)?)?
        .checked_add(&TimeDelta::try_hours(number(3)?)?)?
        .checked_add(&TimeDelta::try_minutes(number(4)?)?)?
        .checked_add(&TimeDelta::try_seconds(number(5)?)?)?
        .checked_add(&TimeDelta::nanoseconds(nanos))?;
    if captures.get(1).is_some_and(|sign| sign.as_str() == "-") {
        Some(-total)
    } else {
        Some(total)
    }
}

/// ISO 8601 day-time form of `value`
pub fn format_duration(value: &TimeDelta) -> String {
    let negative = *value < TimeDelta::zero();
    let magnitude = value.abs();
    let days = magnitude.num_days();
    let hours = magnitude.num_hours() % 24;
    let minutes = magnitude.num_minutes() % 60;
    let seconds = magnitude.num_seconds() % 60;
    let nanos = magnitude.subsec_nanos();

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('P');
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    out.push('T');
    if hours > 0 {
        out.push_str(&format!("{hours}H"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}M"));
    }
    if nanos > 0 {
        let fraction = format!("{nanos:09}");
        out.push_str(&format!("{seconds}.{}S", fraction.trim_end_matches('0')));
    } else if seconds > 0 || out.ends_with('T') {
        out.push_str(&format!("{seconds}S"));
    }
    out
}

/// Render `value` as URI literal text
///
/// Numeric types outside their natural typing keep a suffix so the rendered text
/// converts back to the same type and value.
pub fn to_uri_literal(value: &ODataValue) -> String {
    match value {
        ODataValue::Null => "null".to_string(),
        ODataValue::Boolean(b) => b.to_string(),
        ODataValue::Byte(v) => v.to_string(),
        ODataValue::SByte(v) => v.to_string(),
        ODataValue::Int16(v) => v.to_string(),
        ODataValue::Int32(v) => v.to_string(),
        ODataValue::Int64(v) => format!("{v}L"),
        ODataValue::Single(v) => format!("{}F", format_float(f64::from(*v), Some(*v))),
        ODataValue::Double(v) => format!("{}D", format_float(*v, None)),
        ODataValue::Decimal(v) => format!("{v}M"),
        ODataValue::String(s) => quote(s),
        ODataValue::Guid(g) => g.hyphenated().to_string(),
        ODataValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        ODataValue::DateTimeOffset(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ODataValue::TimeOfDay(t) => t.format("%H:%M:%S%.f").to_string(),
        ODataValue::Duration(d) => format!("duration'{}'", format_duration(d)),
        ODataValue::Binary(bytes) => format!("binary'{}'", URL_SAFE.encode(bytes)),
        ODataValue::Spatial(spatial) => {
            let prefix = if spatial.is_geography() { "geography" } else { "geometry" };
            format!("{prefix}'{}'", format_wkt(spatial))
        }
        ODataValue::Enum(e) => format!("{}{}", e.type_name, quote(&e.text)),
        ODataValue::Json(json) => json.to_string(),
        ODataValue::Collection(items) => {
            let rendered: Vec<String> = items.iter().map(to_uri_literal).collect();
            format!("({})", rendered.join(","))
        }
    }
}

fn format_float(value: f64, single: Option<f32>) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        (if value > 0.0 { "INF" } else { "-INF" }).to_string()
    } else if let Some(single) = single {
        format!("{single:?}")
    } else {
        format!("{value:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn primitive(kind: EdmPrimitiveKind) -> EdmTypeRef {
        EdmTypeRef::primitive(kind, true)
    }

    #[rstest]
    #[case(EdmPrimitiveKind::Boolean, "true")]
    #[case(EdmPrimitiveKind::Byte, "255")]
    #[case(EdmPrimitiveKind::Int32, "-42")]
    #[case(EdmPrimitiveKind::Int64, "9000000000")]
    #[case(EdmPrimitiveKind::Decimal, "12.50")]
    #[case(EdmPrimitiveKind::Double, "1.5e10")]
    #[case(EdmPrimitiveKind::Double, "INF")]
    #[case(EdmPrimitiveKind::Single, "0.25")]
    #[case(EdmPrimitiveKind::String, "'O''Neil'")]
    #[case(EdmPrimitiveKind::Guid, "01234567-89ab-cdef-0123-456789abcdef")]
    #[case(EdmPrimitiveKind::Date, "2024-02-29")]
    #[case(EdmPrimitiveKind::DateTimeOffset, "2012-12-03T07:16:23Z")]
    #[case(EdmPrimitiveKind::DateTimeOffset, "2012-12-03T07:16:23.25+02:00")]
    #[case(EdmPrimitiveKind::TimeOfDay, "07:59:59.999")]
    #[case(EdmPrimitiveKind::Duration, "duration'P1DT2H3M4.5S'")]
    #[case(EdmPrimitiveKind::Duration, "duration'-PT30S'")]
    #[case(EdmPrimitiveKind::Binary, "binary'T0RhdGE'")]
    #[case(EdmPrimitiveKind::GeographyPoint, "geography'SRID=4326;POINT(1 2)'")]
    fn test_convert_render_round_trip(#[case] kind: EdmPrimitiveKind, #[case] text: &str) {
        let target = primitive(kind);
        let value = convert(text, &target).expect("valid literal");
        let rendered = to_uri_literal(&value);
        assert_eq!(convert(&rendered, &target).expect("rendered literal"), value);
    }

    #[test]
    fn test_temporal_forms() {
        assert!(convert("2012-12-03T07:16Z", &primitive(EdmPrimitiveKind::DateTimeOffset)).is_ok());
        assert!(convert("2024-02-30", &primitive(EdmPrimitiveKind::Date)).is_err());
        assert_eq!(
            parse_duration("P1DT1H"),
            Some(TimeDelta::hours(25))
        );
        assert_eq!(parse_duration("P"), None);
        assert_eq!(parse_duration("PT"), None);
        assert_eq!(format_duration(&TimeDelta::zero()), "PT0S");
    }

    #[test]
    fn test_binary_forms() {
        let target = primitive(EdmPrimitiveKind::Binary);
        assert_eq!(convert("X'0aff'", &target), Ok(ODataValue::Binary(vec![0x0a, 0xff])));
        assert_eq!(
            convert("binary'AQID'", &target),
            Ok(ODataValue::Binary(vec![1, 2, 3]))
        );
    }

    #[test]
    fn test_spatial_kind_checked() {
        let polygon = primitive(EdmPrimitiveKind::GeographyPolygon);
        assert!(convert("geography'POINT(1 2)'", &polygon).is_err());
        assert!(convert("geometry'POINT(1 2)'", &primitive(EdmPrimitiveKind::Geometry)).is_ok());
    }

    #[test]
    fn test_strings_need_quotes() {
        assert!(convert("abc", &primitive(EdmPrimitiveKind::String)).is_err());
        assert_eq!(convert("null", &primitive(EdmPrimitiveKind::String)), Ok(ODataValue::Null));
    }
}
