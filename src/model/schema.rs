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

//! Schema items of the Entity Data Model
//!
//! These are plain read-only records. Cross references (base types, property types,
//! navigation targets) are kept as qualified names and resolved through an [`EdmModel`].
//!
//! [`EdmModel`]: super::provider::EdmModel

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::types::EdmPrimitiveKind;

fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

/// Entity or complex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructuredKind {
    Entity,
    Complex,
}

/// Entity type or complex type
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredType {
    pub namespace: String,
    pub name: String,
    pub kind: StructuredKind,
    /// Qualified name of the base type
    pub base_type: Option<String>,
    pub is_open: bool,
    pub is_abstract: bool,
    /// Declared key, only ever present on the root-most entity type
    pub key: Vec<String>,
    pub properties: IndexMap<String, StructuralProperty>,
    pub navigation_properties: IndexMap<String, NavigationProperty>,
}

impl StructuredType {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: StructuredKind) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind,
            base_type: None,
            is_open: false,
            is_abstract: false,
            key: Vec::new(),
            properties: IndexMap::new(),
            navigation_properties: IndexMap::new(),
        }
    }

    pub fn full_name(&self) -> String {
        qualify(&self.namespace, &self.name)
    }

    pub fn is_entity(&self) -> bool {
        self.kind == StructuredKind::Entity
    }
}

/// Primitive, enum, complex or collection-valued property
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralProperty {
    pub name: String,
    /// Type in CSDL syntax, e.g. `Edm.String` or `Collection(NS.Address)`
    pub type_name: String,
    pub nullable: bool,
}

impl StructuralProperty {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        }
    }
}

/// Dependent/principal property pair of a referential constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferentialConstraint {
    /// Property on the declaring (dependent) type
    pub property: String,
    /// Property on the navigation target (principal)
    pub referenced_property: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationProperty {
    pub name: String,
    /// Qualified name of the target entity type
    pub target_type: String,
    pub collection: bool,
    pub nullable: bool,
    pub partner: Option<String>,
    pub contains_target: bool,
    pub referential_constraints: Vec<ReferentialConstraint>,
}

impl NavigationProperty {
    pub fn new(name: impl Into<String>, target_type: impl Into<String>, collection: bool) -> Self {
        Self {
            name: name.into(),
            target_type: target_type.into(),
            collection,
            nullable: !collection,
            partner: None,
            contains_target: false,
            referential_constraints: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub namespace: String,
    pub name: String,
    pub underlying_type: EdmPrimitiveKind,
    pub is_flags: bool,
    pub members: Vec<EnumMember>,
}

impl EnumType {
    pub fn full_name(&self) -> String {
        qualify(&self.namespace, &self.name)
    }

    pub fn member(&self, name: &str) -> Option<&EnumMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_by_value(&self, value: i64) -> Option<&EnumMember> {
        self.members.iter().find(|m| m.value == value)
    }
}

/// Any named schema type other than primitives
#[derive(Debug, Clone)]
pub enum SchemaType {
    Structured(Arc<StructuredType>),
    Enum(Arc<EnumType>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Function,
    Action,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationParameter {
    pub name: String,
    pub type_name: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnType {
    pub type_name: String,
    pub nullable: bool,
}

/// Function or action declared in a schema
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub namespace: String,
    pub name: String,
    pub kind: OperationKind,
    /// When bound, the first parameter is the binding parameter
    pub is_bound: bool,
    pub is_composable: bool,
    pub parameters: Vec<OperationParameter>,
    pub return_type: Option<ReturnType>,
    /// Entity set path relative to the binding parameter, e.g. `bindingParameter/Orders`
    pub entity_set_path: Option<String>,
}

impl Operation {
    pub fn full_name(&self) -> String {
        qualify(&self.namespace, &self.name)
    }

    pub fn is_function(&self) -> bool {
        self.kind == OperationKind::Function
    }

    pub fn binding_parameter(&self) -> Option<&OperationParameter> {
        if self.is_bound {
            self.parameters.first()
        } else {
            None
        }
    }

    /// Parameters a caller supplies explicitly
    pub fn non_binding_parameters(&self) -> &[OperationParameter] {
        if self.is_bound && !self.parameters.is_empty() {
            &self.parameters[1..]
        } else {
            &self.parameters
        }
    }
}

/// Entity container member exposing an unbound operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationImport {
    pub name: String,
    pub operation: Arc<Operation>,
    /// Entity set the returned entities belong to
    pub entity_set: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntitySet {
    pub name: String,
    /// Qualified name of the element entity type
    pub entity_type: String,
    /// Navigation property path to target entity set or singleton name
    pub navigation_bindings: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Singleton {
    pub name: String,
    pub entity_type: String,
    pub navigation_bindings: IndexMap<String, String>,
}

/// Navigation source reached through a containment navigation property
#[derive(Debug, Clone, PartialEq)]
pub struct ContainedSet {
    pub parent: String,
    pub navigation_property: String,
    pub entity_type: String,
}

/// Entity set, singleton or contained set a path segment targets
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationSource {
    EntitySet(Arc<EntitySet>),
    Singleton(Arc<Singleton>),
    Contained(Arc<ContainedSet>),
}

impl NavigationSource {
    pub fn name(&self) -> String {
        match self {
            Self::EntitySet(set) => set.name.clone(),
            Self::Singleton(singleton) => singleton.name.clone(),
            Self::Contained(contained) => {
                format!("{}/{}", contained.parent, contained.navigation_property)
            }
        }
    }

    /// Qualified name of the entity type
    pub fn entity_type(&self) -> &str {
        match self {
            Self::EntitySet(set) => &set.entity_type,
            Self::Singleton(singleton) => &singleton.entity_type,
            Self::Contained(contained) => &contained.entity_type,
        }
    }

    pub fn navigation_bindings(&self) -> Option<&IndexMap<String, String>> {
        match self {
            Self::EntitySet(set) => Some(&set.navigation_bindings),
            Self::Singleton(singleton) => Some(&singleton.navigation_bindings),
            Self::Contained(_) => None,
        }
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self, Self::Singleton(_))
    }
}
