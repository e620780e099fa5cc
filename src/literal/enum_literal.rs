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

//! Enum member lists

use super::ConversionError;
use crate::model::{EnumType, EnumValue};

/// Resolve a comma-separated member list such as `Red,Green` against `enum_type`
///
/// Members may be given by name or by underlying value. Flag enums OR the members
/// together; other enums accept exactly one. A number that matches no declared member
/// is kept as a raw underlying value so newer servers' values still parse.
pub fn parse_enum_value(enum_type: &EnumType, text: &str) -> Result<EnumValue, ConversionError> {
    let type_name = enum_type.full_name();
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(ConversionError::invalid(text, &type_name, "empty member name"));
    }
    if !enum_type.is_flags && parts.len() > 1 {
        return Err(ConversionError::invalid(
            text,
            &type_name,
            "only flag enums accept more than one member",
        ));
    }

    let mut value = 0i64;
    for part in parts {
        value |= member_value(enum_type, part).ok_or_else(|| {
            ConversionError::invalid(text, &type_name, format!("'{part}' is not a member"))
        })?;
    }

    Ok(EnumValue {
        text: canonical_text(enum_type, value),
        type_name,
        value,
    })
}

fn member_value(enum_type: &EnumType, part: &str) -> Option<i64> {
    if let Some(member) = enum_type.member(part) {
        return Some(member.value);
    }
    let digits = part.strip_prefix('-').unwrap_or(part);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return part.parse().ok();
    }
    None
}

/// Member names covering `value` in declaration order, or the number itself
pub fn canonical_text(enum_type: &EnumType, value: i64) -> String {
    if let Some(member) = enum_type.member_by_value(value) {
        return member.name.clone();
    }
    if enum_type.is_flags && value > 0 {
        let mut covered = 0i64;
        let names: Vec<&str> = enum_type
            .members
            .iter()
            .filter(|m| m.value != 0 && m.value & value == m.value)
            .inspect(|m| covered |= m.value)
            .map(|m| m.name.as_str())
            .collect();
        if covered == value {
            return names.join(",");
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdmPrimitiveKind, EnumMember};

    fn color(is_flags: bool) -> EnumType {
        EnumType {
            namespace: "NS".to_string(),
            name: "ColorFlags".to_string(),
            underlying_type: EdmPrimitiveKind::Int32,
            is_flags,
            members: vec![
                EnumMember {
                    name: "Red".to_string(),
                    value: 1,
                },
                EnumMember {
                    name: "Green".to_string(),
                    value: 2,
                },
                EnumMember {
                    name: "Blue".to_string(),
                    value: 4,
                },
            ],
        }
    }

    #[test]
    fn test_flags_are_order_independent() {
        let ty = color(true);
        let a = parse_enum_value(&ty, "Red,Green").expect("flags");
        let b = parse_enum_value(&ty, "Green,Red").expect("flags");
        assert_eq!(a.value, 3);
        assert_eq!(a, b);
        assert_eq!(a.text, "Red,Green");
    }

    #[test]
    fn test_numeric_members() {
        let ty = color(false);
        assert_eq!(parse_enum_value(&ty, "2").expect("numeric").text, "Green");
        // Unknown values are kept for forward compatibility
        assert_eq!(parse_enum_value(&ty, "42").expect("raw").value, 42);
    }

    #[test]
    fn test_rejections() {
        assert!(parse_enum_value(&color(false), "Red,Green").is_err());
        assert!(parse_enum_value(&color(true), "Purple").is_err());
        assert!(parse_enum_value(&color(true), "Red,,Green").is_err());
        assert!(parse_enum_value(&color(true), "4x").is_err());
    }
}
