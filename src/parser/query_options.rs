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

//! Query string decoding and scalar query option values

use indexmap::IndexMap;
use percent_encoding::percent_decode_str;

use crate::ast::LevelsToken;
use crate::config::ParserSettings;
use crate::error::{ODataError, Result};

/// System query options the parser knows by name
pub const SYSTEM_QUERY_OPTIONS: &[&str] = &[
    "$filter",
    "$orderby",
    "$select",
    "$expand",
    "$top",
    "$skip",
    "$count",
    "$search",
    "$format",
    "$id",
    "$skiptoken",
    "$deltatoken",
];

/// Raw query options split into system options, parameter aliases and custom options
///
/// Values are percent-decoded but otherwise untouched; parsing each option is up to
/// the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    system: IndexMap<String, String>,
    aliases: IndexMap<String, String>,
    custom: Vec<(String, String)>,
}

impl QueryOptions {
    /// Decode a raw query string such as `$filter=Name%20eq%20'a'&$top=5`
    ///
    /// A leading `?` is ignored and `+` is kept literally.
    pub fn parse(query: &str, settings: &ParserSettings) -> Result<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut pairs = Vec::new();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            pairs.push((decode(name, name)?, decode(name, value)?));
        }
        Self::from_pairs(pairs, settings)
    }

    /// Classify already-decoded name/value pairs
    pub fn from_pairs<I, K, V>(pairs: I, settings: &ParserSettings) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut options = Self::default();
        for (name, value) in pairs {
            let name = name.into().trim().to_string();
            let value = value.into();
            if name.starts_with('@') {
                if options.aliases.contains_key(&name) {
                    return Err(ODataError::DuplicateQueryOption { name });
                }
                options.aliases.insert(name, value);
            } else if let Some(system) = system_option_name(&name, settings) {
                let system = system.to_string();
                if options.system.contains_key(&system) {
                    return Err(ODataError::DuplicateQueryOption { name: system });
                }
                options.system.insert(system, value);
            } else if name.starts_with('$') {
                return Err(ODataError::InvalidQueryOption {
                    option: name,
                    value,
                    reason: "unsupported system query option".to_string(),
                });
            } else {
                options.custom.push((name, value));
            }
        }
        log::debug!(
            "Query options: {} system, {} alias(es), {} custom",
            options.system.len(),
            options.aliases.len(),
            options.custom.len()
        );
        Ok(options)
    }

    /// Value of a system option, looked up by its `$` name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.system.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.system.contains_key(name)
    }

    pub fn system(&self) -> impl Iterator<Item = (&str, &str)> {
        self.system.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parameter alias definitions keyed by `@name`
    pub fn aliases(&self) -> &IndexMap<String, String> {
        &self.aliases
    }

    pub fn custom(&self) -> &[(String, String)] {
        &self.custom
    }

    pub fn is_empty(&self) -> bool {
        self.system.is_empty() && self.aliases.is_empty() && self.custom.is_empty()
    }
}

/// Canonical `$name` when `name` is a system option
///
/// Matching ignores case. Without the `$` prefix a name only matches when the settings
/// allow it.
pub fn system_option_name(name: &str, settings: &ParserSettings) -> Option<&'static str> {
    let lowered = name.to_ascii_lowercase();
    let candidate = match lowered.strip_prefix('$') {
        Some(_) => lowered,
        None if settings.enable_no_dollar_query_options => format!("${lowered}"),
        None => return None,
    };
    SYSTEM_QUERY_OPTIONS
        .iter()
        .copied()
        .find(|known| *known == candidate)
}

fn decode(option: &str, raw: &str) -> Result<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| ODataError::InvalidQueryOption {
            option: option.to_string(),
            value: raw.to_string(),
            reason: format!("not valid UTF-8 after percent-decoding: {e}"),
        })
}

fn invalid(option: &str, value: &str, reason: &str) -> ODataError {
    ODataError::InvalidQueryOption {
        option: option.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a `$top` or `$skip` value
pub fn parse_non_negative(option: &str, value: &str) -> Result<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(option, value, "value is empty"));
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(option, value, "expected a non-negative integer"));
    }
    trimmed
        .parse::<i64>()
        .map_err(|_| invalid(option, value, "integer out of range"))
}

pub fn parse_top(value: &str) -> Result<i64> {
    parse_non_negative("$top", value)
}

pub fn parse_skip(value: &str) -> Result<i64> {
    parse_non_negative("$skip", value)
}

/// Parse a `$count` value: absent yields `None`, otherwise exactly `true` or `false` after trimming
pub fn parse_count(value: Option<&str>) -> Result<Option<bool>> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.trim() {
        "" => Err(invalid("$count", value, "value is empty")),
        "true" => Ok(Some(true)),
        "false" => Ok(Some(false)),
        _ => Err(invalid("$count", value, "expected 'true' or 'false'")),
    }
}

/// Parse a `$levels` value: `max` or a non-negative integer
pub fn parse_levels(value: &str) -> Result<LevelsToken> {
    if value.trim().eq_ignore_ascii_case("max") {
        return Ok(LevelsToken::Max);
    }
    parse_non_negative("$levels", value).map(LevelsToken::Value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_parse_query_string() {
        let options = QueryOptions::parse(
            "?$filter=Name%20eq%20'a+b'&$top=5&@p=1&custom=x",
            &ParserSettings::default(),
        )
        .expect("query");
        assert_eq!(options.get("$filter"), Some("Name eq 'a+b'"));
        assert_eq!(options.get("$top"), Some("5"));
        assert_eq!(options.aliases().get("@p").map(String::as_str), Some("1"));
        assert_eq!(options.custom(), &[("custom".to_string(), "x".to_string())]);
    }

    #[test]
    fn test_duplicate_system_option() {
        let err = QueryOptions::parse("$top=1&$TOP=2", &ParserSettings::default())
            .expect_err("duplicate");
        assert_eq!(
            err,
            ODataError::DuplicateQueryOption {
                name: "$top".to_string()
            }
        );
    }

    #[rstest]
    #[case("$bogus=1")]
    #[case("$apply=aggregate(Age with sum as Total)")]
    #[case("$compute=Age add 1 as Next")]
    #[case("$index=2")]
    #[case("$schemaversion=1.0")]
    fn test_unsupported_system_option(#[case] query: &str) {
        let err = QueryOptions::parse(query, &ParserSettings::default()).expect_err("unsupported");
        assert!(matches!(err, ODataError::InvalidQueryOption { .. }));
    }

    #[test]
    fn test_no_dollar_options() {
        let strict = QueryOptions::parse("filter=a&top=1", &ParserSettings::default())
            .expect("custom options");
        assert!(strict.get("$filter").is_none());
        assert_eq!(strict.custom().len(), 2);

        let lenient = QueryOptions::parse("filter=a&top=1", &ParserSettings::lenient())
            .expect("system options");
        assert_eq!(lenient.get("$filter"), Some("a"));
        assert_eq!(lenient.get("$top"), Some("1"));
    }

    #[rstest]
    #[case("0", 0)]
    #[case("42", 42)]
    #[case(" 7 ", 7)]
    fn test_top_values(#[case] text: &str, #[case] expected: i64) {
        assert_eq!(parse_top(text).expect("top"), expected);
    }

    #[rstest]
    #[case("")]
    #[case("-1")]
    #[case("1.5")]
    #[case("abc")]
    #[case("99999999999999999999")]
    fn test_invalid_top_values(#[case] text: &str) {
        assert!(parse_top(text).is_err());
    }

    #[test]
    fn test_count_values() {
        assert_eq!(parse_count(None).expect("absent"), None);
        assert_eq!(parse_count(Some("true")).expect("true"), Some(true));
        assert_eq!(parse_count(Some(" false ")).expect("false"), Some(false));
        assert!(parse_count(Some("True")).is_err());
        assert!(parse_count(Some("yes")).is_err());
        let err = parse_count(Some("")).expect_err("empty");
        assert_eq!(err.to_string(), "Invalid value '' for query option '$count': value is empty");
    }

    #[test]
    fn test_levels() {
        assert_eq!(parse_levels("max").expect("max"), LevelsToken::Max);
        assert_eq!(parse_levels("3").expect("3"), LevelsToken::Value(3));
        assert!(parse_levels("-1").is_err());
    }
}
