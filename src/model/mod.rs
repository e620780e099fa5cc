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

//! Entity Data Model abstractions
//!
//! The parser only reads the model. [`EdmModel`] is the seam: [`InMemoryModel`] is the
//! bundled implementation, and services with their own metadata store implement the
//! trait directly.

pub mod document;
pub mod memory;
pub mod provider;
pub mod schema;
pub mod types;
pub mod value;

pub use document::ModelDocument;
pub use memory::{InMemoryModel, ModelBuilder, OperationBuilder, TypeBuilder};
pub use provider::{EdmModel, PropertyLookup};
pub use schema::{
    ContainedSet, EntitySet, EnumMember, EnumType, NavigationProperty, NavigationSource,
    Operation, OperationImport, OperationKind, OperationParameter, ReferentialConstraint,
    ReturnType, SchemaType, Singleton, StructuralProperty, StructuredKind, StructuredType,
};
pub use types::{EdmPrimitiveKind, EdmType, EdmTypeRef};
pub use value::{EnumValue, ODataValue, Position, Shape, SpatialValue};
