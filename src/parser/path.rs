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

//! Resource path syntax: segment splitting, key predicates and parameter lists
//!
//! Nothing here consults the model. The path resolver decides what each piece means.

use percent_encoding::percent_decode_str;

use crate::error::{ODataError, Result};

use super::split::{find_top_level, split_parenthesized, split_top_level};

/// Split a resource path into percent-decoded segments
///
/// Leading and trailing slashes are ignored. Slashes inside quotes or parentheses do
/// not split, so `Files('a/b')` stays one segment.
pub fn split_path(path: &str) -> Result<Vec<String>> {
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_err(|e| ODataError::invalid_path(path, format!("not valid UTF-8: {e}")))?;
    let trimmed = decoded.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let mut segments = Vec::new();
    for (offset, segment) in split_top_level(trimmed, '/')? {
        if segment.is_empty() {
            return Err(ODataError::syntax(trimmed, offset, "empty path segment"));
        }
        segments.push(segment.to_string());
    }
    Ok(segments)
}

/// A segment split into its identifier and the text inside trailing parentheses
///
/// `People(1)` gives `("People", Some("1"))` and `GetAll()` gives `("GetAll", Some(""))`.
pub fn parse_segment_identifier(segment: &str) -> Result<(&str, Option<&str>)> {
    let (identifier, parenthesized) = split_parenthesized(segment)?;
    if identifier.is_empty() && parenthesized.is_some() {
        return Err(ODataError::invalid_path(segment, "segment has no identifier"));
    }
    Ok((identifier, parenthesized))
}

/// One value in a key predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValueText {
    /// Property name, absent for the single positional form `(1)`
    pub name: Option<String>,
    /// Literal text or parameter alias
    pub value: String,
}

/// Parse the inside of a key predicate: `1`, `Id=1` or `OrderId=1,ItemNo=2`
///
/// Only a single positional value is allowed and it cannot mix with named values.
pub fn parse_key_values(text: &str) -> Result<Vec<KeyValueText>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut values: Vec<KeyValueText> = Vec::new();
    for (offset, part) in split_top_level(text, ',')? {
        let part = part.trim();
        if part.is_empty() {
            return Err(ODataError::syntax(text, offset, "empty key value"));
        }
        let value = match find_top_level(part, '=')? {
            Some(eq) => {
                let name = part[..eq].trim();
                if name.is_empty() {
                    return Err(ODataError::syntax(text, offset, "key value has no name"));
                }
                if values.iter().any(|v| v.name.as_deref() == Some(name)) {
                    return Err(ODataError::DuplicateKey {
                        name: name.to_string(),
                    });
                }
                KeyValueText {
                    name: Some(name.to_string()),
                    value: part[eq + 1..].trim().to_string(),
                }
            }
            None => KeyValueText {
                name: None,
                value: part.to_string(),
            },
        };
        values.push(value);
    }
    let positional = values.iter().filter(|v| v.name.is_none()).count();
    if positional > 1 || (positional == 1 && values.len() > 1) {
        return Err(ODataError::syntax(
            text,
            0,
            "a positional key value must be the only key value",
        ));
    }
    Ok(values)
}

/// Parse a function parameter list: `a=1,b='x'`; every parameter is named
pub fn parse_function_parameters(text: &str) -> Result<Vec<(String, String)>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut parameters: Vec<(String, String)> = Vec::new();
    for (offset, part) in split_top_level(text, ',')? {
        let part = part.trim();
        let eq = find_top_level(part, '=')?
            .ok_or_else(|| ODataError::syntax(text, offset, "expected 'name=value'"))?;
        let name = part[..eq].trim();
        if name.is_empty() {
            return Err(ODataError::syntax(text, offset, "parameter has no name"));
        }
        if parameters.iter().any(|(existing, _)| existing == name) {
            return Err(ODataError::DuplicateParameter {
                name: name.to_string(),
            });
        }
        parameters.push((name.to_string(), part[eq + 1..].trim().to_string()));
    }
    Ok(parameters)
}

/// Name of a URI template segment such as `{id}`
pub fn template_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|name| !name.is_empty() && !name.contains(['{', '}']))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn named(name: &str, value: &str) -> KeyValueText {
        KeyValueText {
            name: Some(name.to_string()),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_split_path() {
        assert_eq!(
            split_path("/People(1)/Friends/").expect("path"),
            vec!["People(1)".to_string(), "Friends".to_string()]
        );
        assert_eq!(
            split_path("Files('a%2Fb')/$value").expect("encoded slash"),
            vec!["Files('a/b')".to_string(), "$value".to_string()]
        );
        assert!(split_path("").expect("empty").is_empty());
        assert!(split_path("People//Friends").is_err());
    }

    #[test]
    fn test_segment_identifier() {
        assert_eq!(
            parse_segment_identifier("People(1)").expect("key"),
            ("People", Some("1"))
        );
        assert_eq!(parse_segment_identifier("$count").expect("keyword"), ("$count", None));
        assert!(parse_segment_identifier("(1)").is_err());
    }

    #[test]
    fn test_key_values() {
        assert_eq!(
            parse_key_values("1").expect("positional"),
            vec![KeyValueText {
                name: None,
                value: "1".to_string()
            }]
        );
        assert_eq!(
            parse_key_values("OrderId=1, Name='a=b'").expect("named"),
            vec![named("OrderId", "1"), named("Name", "'a=b'")]
        );
        assert_eq!(
            parse_key_values("Id=1,Id=2").expect_err("duplicate"),
            ODataError::DuplicateKey {
                name: "Id".to_string()
            }
        );
        assert!(parse_key_values("1,Id=2").is_err());
        assert!(parse_key_values("1,2").is_err());
    }

    #[test]
    fn test_function_parameters() {
        assert_eq!(
            parse_function_parameters("a=1,b=@x").expect("parameters"),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "@x".to_string())
            ]
        );
        assert_eq!(
            parse_function_parameters("a=1,a=2").expect_err("duplicate"),
            ODataError::DuplicateParameter {
                name: "a".to_string()
            }
        );
        assert!(parse_function_parameters("1").is_err());
    }

    #[test]
    fn test_template_name() {
        assert_eq!(template_name("{id}"), Some("id"));
        assert_eq!(template_name("{}"), None);
        assert_eq!(template_name("id"), None);
    }
}
