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

//! OData v4 request URI parsing
//!
//! Turns a request URI into a resolved resource path and typed query trees, checked
//! against an Entity Data Model. The pipeline runs leaves first:
//!
//! - [`parser`] tokenizes and parses option text into untyped syntax trees ([`ast`])
//! - [`literal`] converts literal text into typed [`model::ODataValue`]s
//! - [`path`] resolves resource path segments against the model
//! - [`registry`] holds the built-in function and operator signatures and picks overloads
//! - [`binder`] binds syntax trees into typed [`semantic`] nodes
//!
//! [`ODataUriParser`] drives all of them for one request.
//!
//! ```no_run
//! use octofhir_odata_uri::{ModelDocument, ODataUriParser, ParserSettings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let document = std::fs::read_to_string("model.json")?;
//! let model = ModelDocument::from_json(&document)?.into_model()?;
//! let mut parser = ODataUriParser::new(
//!     &model,
//!     ParserSettings::default(),
//!     Some("https://example.com/odata/"),
//!     "People(1)/Friends?$filter=Age gt 30&$top=5",
//! )?;
//! let uri = parser.parse_uri()?;
//! println!("{}", uri.path);
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod binder;
pub mod config;
pub mod error;
pub mod literal;
pub mod model;
pub mod parser;
pub mod path;
pub mod registry;
pub mod semantic;
pub mod uri;

pub use config::{KeyConvention, ParserSettings};
pub use error::{ErrorCategory, ODataError, Result, UnrecognizedPathError};
pub use model::{EdmModel, InMemoryModel, ModelBuilder, ModelDocument, ODataValue};
pub use path::{BatchReference, BatchReferenceCallback, ODataPath, PathResolver, PathSegment};
pub use semantic::SemanticNode;
pub use uri::{ODataUri, ODataUriParser};
