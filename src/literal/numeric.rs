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

//! Numeric literal typing and range checks

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::ConversionError;
use crate::model::{EdmPrimitiveKind, ODataValue};

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?$").expect("numeric literal pattern")
});

/// Parsed shape of a numeric literal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NumberShape<'a> {
    /// Text without the type suffix
    body: &'a str,
    suffix: Option<char>,
    special: bool,
    fraction: bool,
    exponent: bool,
}

fn is_special(body: &str) -> bool {
    matches!(body, "INF" | "-INF" | "NaN")
}

fn shape(text: &str) -> Option<NumberShape<'_>> {
    if is_special(text) {
        return Some(NumberShape {
            body: text,
            suffix: None,
            special: true,
            fraction: false,
            exponent: false,
        });
    }
    let last = text.chars().last()?;
    let (body, suffix) = if matches!(last.to_ascii_uppercase(), 'L' | 'M' | 'D' | 'F') {
        (&text[..text.len() - 1], Some(last.to_ascii_uppercase()))
    } else {
        (text, None)
    };
    if is_special(body) {
        return Some(NumberShape {
            body,
            suffix,
            special: true,
            fraction: false,
            exponent: false,
        });
    }
    let captures = NUMBER.captures(body)?;
    Some(NumberShape {
        body,
        suffix,
        special: false,
        fraction: captures.get(1).is_some(),
        exponent: captures.get(2).is_some(),
    })
}

fn suffix_kind(suffix: char) -> EdmPrimitiveKind {
    match suffix {
        'L' => EdmPrimitiveKind::Int64,
        'M' => EdmPrimitiveKind::Decimal,
        'D' => EdmPrimitiveKind::Double,
        _ => EdmPrimitiveKind::Single,
    }
}

fn special_double(body: &str) -> f64 {
    match body {
        "INF" => f64::INFINITY,
        "-INF" => f64::NEG_INFINITY,
        _ => f64::NAN,
    }
}

/// Whether `text` looks like a numeric literal at all
pub fn is_numeric_literal(text: &str) -> bool {
    shape(text).is_some()
}

/// Natural type of a numeric literal
///
/// Unsuffixed integers take the narrowest of Int32, Int64, Decimal and Double that holds
/// them; a fractional part makes a literal Decimal (Double when out of Decimal range);
/// an exponent makes it Double. Suffixes pin the type.
pub fn natural_numeric_kind(text: &str) -> Result<EdmPrimitiveKind, ConversionError> {
    natural_numeric(text).map(|value| value.kind().unwrap_or(EdmPrimitiveKind::Double))
}

/// Convert a numeric literal to a value of its natural type
pub fn natural_numeric(text: &str) -> Result<ODataValue, ConversionError> {
    let shape = shape(text).ok_or_else(|| ConversionError::invalid(text, "numeric", "not a number"))?;
    if let Some(suffix) = shape.suffix {
        return convert_numeric(text, suffix_kind(suffix));
    }
    if shape.special || shape.exponent {
        return convert_numeric(text, EdmPrimitiveKind::Double);
    }
    if shape.fraction {
        return convert_numeric(text, EdmPrimitiveKind::Decimal)
            .or_else(|_| convert_numeric(text, EdmPrimitiveKind::Double));
    }
    for kind in [
        EdmPrimitiveKind::Int32,
        EdmPrimitiveKind::Int64,
        EdmPrimitiveKind::Decimal,
        EdmPrimitiveKind::Double,
    ] {
        match convert_numeric(text, kind) {
            Ok(value) => return Ok(value),
            Err(ConversionError::Overflow { .. }) => continue,
            Err(other) => return Err(other),
        }
    }
    Err(ConversionError::overflow(text, "numeric"))
}

/// Convert a numeric literal to exactly `target`
///
/// An unsuffixed literal may be read as any numeric type able to hold it. A suffix
/// must name `target` itself.
pub fn convert_numeric(text: &str, target: EdmPrimitiveKind) -> Result<ODataValue, ConversionError> {
    let type_name = target.qualified_name();
    let shape = shape(text).ok_or_else(|| ConversionError::invalid(text, type_name, "not a number"))?;

    if let Some(suffix) = shape.suffix {
        if suffix_kind(suffix) != target {
            return Err(ConversionError::SuffixMismatch {
                text: text.to_string(),
                suffix,
                type_name: type_name.to_string(),
            });
        }
    }

    if target.is_integral() {
        if shape.special || shape.fraction || shape.exponent {
            return Err(ConversionError::invalid(text, type_name, "integral types take whole numbers only"));
        }
        return convert_integral(shape.body, text, target);
    }

    match target {
        EdmPrimitiveKind::Double => {
            let value = if shape.special {
                special_double(shape.body)
            } else {
                parse_float(shape.body, text, type_name)?
            };
            Ok(ODataValue::Double(value))
        }
        EdmPrimitiveKind::Single => {
            let value = if shape.special {
                special_double(shape.body) as f32
            } else {
                let wide = parse_float(shape.body, text, type_name)?;
                let narrow = wide as f32;
                if narrow.is_infinite() {
                    return Err(ConversionError::overflow(text, type_name));
                }
                narrow
            };
            Ok(ODataValue::Single(value))
        }
        EdmPrimitiveKind::Decimal => {
            if shape.special {
                return Err(ConversionError::invalid(text, type_name, "decimals have no infinity or NaN"));
            }
            let parsed = if shape.exponent {
                Decimal::from_scientific(shape.body)
            } else {
                Decimal::from_str(shape.body)
            };
            parsed
                .map(ODataValue::Decimal)
                .map_err(|_| ConversionError::overflow(text, type_name))
        }
        _ => Err(ConversionError::invalid(text, type_name, "not a numeric type")),
    }
}

fn parse_float(body: &str, text: &str, type_name: &str) -> Result<f64, ConversionError> {
    let value = f64::from_str(body).map_err(|e| ConversionError::invalid(text, type_name, e.to_string()))?;
    if value.is_infinite() {
        return Err(ConversionError::overflow(text, type_name));
    }
    Ok(value)
}

fn convert_integral(body: &str, text: &str, target: EdmPrimitiveKind) -> Result<ODataValue, ConversionError> {
    let type_name = target.qualified_name();
    // The regex has already vouched for the digits, so a parse failure is a range failure
    let value = i128::from_str(body).map_err(|_| ConversionError::overflow(text, type_name))?;
    let overflow = || ConversionError::overflow(text, type_name);
    Ok(match target {
        EdmPrimitiveKind::Byte => ODataValue::Byte(u8::try_from(value).map_err(|_| overflow())?),
        EdmPrimitiveKind::SByte => ODataValue::SByte(i8::try_from(value).map_err(|_| overflow())?),
        EdmPrimitiveKind::Int16 => ODataValue::Int16(i16::try_from(value).map_err(|_| overflow())?),
        EdmPrimitiveKind::Int32 => ODataValue::Int32(i32::try_from(value).map_err(|_| overflow())?),
        _ => ODataValue::Int64(i64::try_from(value).map_err(|_| overflow())?),
    })
}

/// Re-read an unsuffixed numeric literal as `target` when the value fits
///
/// Used when an operator or function needs a literal in a type that is not reachable by
/// widening, e.g. a Decimal literal compared against a Double property.
pub fn retype_literal(text: &str, target: EdmPrimitiveKind) -> Option<ODataValue> {
    let shape = shape(text)?;
    if shape.suffix.is_some() || !target.is_numeric() {
        return None;
    }
    convert_numeric(text, target).ok()
}
