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

//! Parser settings

use serde::{Deserialize, Serialize};

/// Default recursion limit shared by every recursive grammar
///
/// Parsing and binding an expression nested this deep fits a 2 MiB thread stack in an
/// unoptimized build.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// How entity keys are written in a resource path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyConvention {
    /// `People(1)` and `Orders(OrderID=1,ItemNo=2)`
    #[default]
    Parentheses,
    /// `People/1`, with parentheses still accepted
    KeyAsSegment,
}

/// Per-session settings for URI parsing
///
/// The settings are selected by the host, never inferred from the URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParserSettings {
    /// Maximum recursion depth for expressions, search, select/expand nesting,
    /// bracketed literals and the number of path segments
    pub max_depth: usize,

    pub key_convention: KeyConvention,

    /// Accept `{name}` path segments and key values
    pub enable_uri_template_parsing: bool,

    /// Accept query options written without the `$` prefix, e.g. `filter=...`
    pub enable_no_dollar_query_options: bool,

    /// Depth substituted for `$levels=max`
    pub maximum_expansion_depth: usize,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            key_convention: KeyConvention::Parentheses,
            enable_uri_template_parsing: false,
            enable_no_dollar_query_options: false,
            maximum_expansion_depth: 8,
        }
    }
}

impl ParserSettings {
    /// Tight limits for untrusted input
    pub fn strict() -> Self {
        Self {
            max_depth: 32,
            maximum_expansion_depth: 4,
            ..Self::default()
        }
    }

    /// Accept every optional syntax
    pub fn lenient() -> Self {
        Self {
            enable_uri_template_parsing: true,
            enable_no_dollar_query_options: true,
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_key_convention(mut self, key_convention: KeyConvention) -> Self {
        self.key_convention = key_convention;
        self
    }

    pub fn key_as_segment(&self) -> bool {
        self.key_convention == KeyConvention::KeyAsSegment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(ParserSettings::default().max_depth, DEFAULT_MAX_DEPTH);
        assert!(ParserSettings::strict().max_depth < DEFAULT_MAX_DEPTH);
        assert!(ParserSettings::lenient().enable_uri_template_parsing);
        assert!(
            ParserSettings::default()
                .with_key_convention(KeyConvention::KeyAsSegment)
                .key_as_segment()
        );
    }

    #[test]
    fn test_deserialize_partial() {
        let settings: ParserSettings =
            serde_json::from_str(r#"{ "maxDepth": 10, "keyConvention": "keyAsSegment" }"#)
                .expect("settings");
        assert_eq!(settings.max_depth, 10);
        assert!(settings.key_as_segment());
        assert_eq!(settings.maximum_expansion_depth, 8);
    }
}
