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

//! OData query and path syntax
//!
//! Turns option and segment text into untyped trees. Identifiers are not resolved
//! against any model here; see the binder and the path resolver for that.

pub mod expression;
pub mod lexer;
pub mod path;
pub mod query_options;
pub mod search;
pub mod select_expand;
pub mod split;
pub mod token;

pub use expression::{
    ExpressionParser, Precedence, literal_value, parse_expression, parse_filter, parse_order_by,
};
pub use lexer::{Lexer, tokenize};
pub use path::{
    KeyValueText, parse_function_parameters, parse_key_values, parse_segment_identifier,
    split_path,
};
pub use query_options::{QueryOptions, parse_count, parse_levels, parse_skip, parse_top};
pub use search::parse_search;
pub use select_expand::{parse_expand, parse_select};
pub use token::{Token, TokenKind};
