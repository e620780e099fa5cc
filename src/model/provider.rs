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

//! Read-only model provider abstraction
//!
//! The parser never owns metadata. Everything it knows about types, sets and operations
//! comes through [`EdmModel`], which hosts implement over whatever metadata store they
//! have. The provided methods build the derived queries (inheritance walks, key lookup,
//! bound-operation matching) on top of the handful of required lookups.

use std::sync::Arc;

use super::schema::{
    EntitySet, EnumType, NavigationProperty, NavigationSource, Operation, OperationImport,
    SchemaType, Singleton, StructuralProperty, StructuredType,
};
use super::types::{EdmPrimitiveKind, EdmTypeRef, split_collection_type_name};

/// Upper bound on inheritance chains; a validated model never gets close
const MAX_INHERITANCE_DEPTH: usize = 64;

/// Member found on a structured type
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyLookup {
    Structural(StructuralProperty),
    Navigation(NavigationProperty),
}

/// Read-only view of an Entity Data Model
pub trait EdmModel: Send + Sync {
    /// Find a structured or enum type by qualified name
    fn find_type(&self, qualified_name: &str) -> Option<SchemaType>;

    fn find_entity_set(&self, name: &str) -> Option<Arc<EntitySet>>;

    fn find_singleton(&self, name: &str) -> Option<Arc<Singleton>>;

    /// All operation imports sharing a name (function imports may be overloaded)
    fn find_operation_imports(&self, name: &str) -> Vec<Arc<OperationImport>>;

    /// All overloads of a schema operation, bound and unbound
    fn find_operations(&self, qualified_name: &str) -> Vec<Arc<Operation>>;

    /// Types deriving (directly or indirectly) from the named type
    fn derived_types(&self, qualified_name: &str) -> Vec<Arc<StructuredType>>;

    /// Navigation source reached from `source` through `navigation`, following
    /// navigation property bindings or containment
    fn navigation_target(
        &self,
        source: &NavigationSource,
        binding_path: &str,
        navigation: &NavigationProperty,
    ) -> Option<NavigationSource>;

    fn find_structured_type(&self, qualified_name: &str) -> Option<Arc<StructuredType>> {
        match self.find_type(qualified_name)? {
            SchemaType::Structured(ty) => Some(ty),
            SchemaType::Enum(_) => None,
        }
    }

    fn find_enum_type(&self, qualified_name: &str) -> Option<Arc<EnumType>> {
        match self.find_type(qualified_name)? {
            SchemaType::Enum(ty) => Some(ty),
            SchemaType::Structured(_) => None,
        }
    }

    /// Resolve a CSDL type name (`Edm.Int32`, `NS.Address`, `Collection(NS.Address)`)
    fn resolve_type_name(&self, type_name: &str, nullable: bool) -> Option<EdmTypeRef> {
        let (element_name, is_collection) = split_collection_type_name(type_name);
        let element = if let Some(kind) = EdmPrimitiveKind::from_qualified_name(element_name) {
            EdmTypeRef::primitive(kind, nullable)
        } else if element_name == "Edm.Untyped" {
            EdmTypeRef::untyped()
        } else {
            match self.find_type(element_name)? {
                SchemaType::Structured(ty) => EdmTypeRef::structured(ty, nullable),
                SchemaType::Enum(ty) => EdmTypeRef::enumeration(ty, nullable),
            }
        };
        Some(if is_collection {
            EdmTypeRef::collection(element)
        } else {
            element
        })
    }

    fn base_type(&self, ty: &StructuredType) -> Option<Arc<StructuredType>> {
        ty.base_type
            .as_deref()
            .and_then(|name| self.find_structured_type(name))
    }

    /// The type followed by its ancestors, most derived first
    fn inheritance_chain(&self, ty: &Arc<StructuredType>) -> Vec<Arc<StructuredType>> {
        let mut chain = vec![Arc::clone(ty)];
        while chain.len() < MAX_INHERITANCE_DEPTH {
            match chain.last().and_then(|current| self.base_type(current)) {
                Some(base) => chain.push(base),
                None => break,
            }
        }
        chain
    }

    /// Open if the type or any ancestor is declared open
    fn is_open_type(&self, ty: &Arc<StructuredType>) -> bool {
        self.inheritance_chain(ty).iter().any(|t| t.is_open)
    }

    /// Find a declared or inherited member by name
    fn find_property(&self, ty: &Arc<StructuredType>, name: &str) -> Option<PropertyLookup> {
        for current in self.inheritance_chain(ty) {
            if let Some(property) = current.properties.get(name) {
                return Some(PropertyLookup::Structural(property.clone()));
            }
            if let Some(navigation) = current.navigation_properties.get(name) {
                return Some(PropertyLookup::Navigation(navigation.clone()));
            }
        }
        None
    }

    /// Declared and inherited navigation properties, base type members first
    fn navigation_properties(&self, ty: &Arc<StructuredType>) -> Vec<NavigationProperty> {
        let mut chain = self.inheritance_chain(ty);
        chain.reverse();
        chain
            .iter()
            .flat_map(|t| t.navigation_properties.values().cloned())
            .collect()
    }

    /// Declared and inherited structural properties, base type members first
    fn structural_properties(&self, ty: &Arc<StructuredType>) -> Vec<StructuralProperty> {
        let mut chain = self.inheritance_chain(ty);
        chain.reverse();
        chain
            .iter()
            .flat_map(|t| t.properties.values().cloned())
            .collect()
    }

    /// Key properties declared on the root-most type of the hierarchy, in order
    fn key_properties(&self, ty: &Arc<StructuredType>) -> Vec<StructuralProperty> {
        let chain = self.inheritance_chain(ty);
        let Some(root) = chain.iter().rev().find(|t| !t.key.is_empty()) else {
            return Vec::new();
        };
        root.key
            .iter()
            .filter_map(|name| {
                chain
                    .iter()
                    .find_map(|t| t.properties.get(name))
                    .cloned()
            })
            .collect()
    }

    /// `true` when `ty` is `ancestor` or derives from it
    fn is_derived_from(&self, ty: &Arc<StructuredType>, ancestor: &str) -> bool {
        self.inheritance_chain(ty)
            .iter()
            .any(|t| t.full_name() == ancestor)
    }

    /// Types are related when one derives from the other
    fn is_related(&self, a: &Arc<StructuredType>, b: &Arc<StructuredType>) -> bool {
        self.is_derived_from(a, &b.full_name()) || self.is_derived_from(b, &a.full_name())
    }

    fn property_type(&self, property: &StructuralProperty) -> Option<EdmTypeRef> {
        self.resolve_type_name(&property.type_name, property.nullable)
    }

    /// Entity type, wrapped in a collection for collection-valued navigation
    fn navigation_type(&self, navigation: &NavigationProperty) -> Option<EdmTypeRef> {
        let target = self.find_structured_type(&navigation.target_type)?;
        let element = EdmTypeRef::structured(target, navigation.nullable && !navigation.collection);
        Some(if navigation.collection {
            EdmTypeRef::collection(element)
        } else {
            element
        })
    }

    fn navigation_source_type(&self, source: &NavigationSource) -> Option<Arc<StructuredType>> {
        self.find_structured_type(source.entity_type())
    }

    /// Overloads of `qualified_name` whose binding parameter accepts `binding_type`
    fn find_bound_operations(
        &self,
        qualified_name: &str,
        binding_type: &EdmTypeRef,
    ) -> Vec<Arc<Operation>> {
        self.find_operations(qualified_name)
            .into_iter()
            .filter(|operation| {
                operation
                    .binding_parameter()
                    .is_some_and(|parameter| self.binding_accepts(&parameter.type_name, binding_type))
            })
            .collect()
    }

    fn find_unbound_operations(&self, qualified_name: &str) -> Vec<Arc<Operation>> {
        self.find_operations(qualified_name)
            .into_iter()
            .filter(|operation| !operation.is_bound)
            .collect()
    }

    /// Whether a binding parameter declared as `parameter_type` accepts `actual`.
    /// Derived structured types bind to operations declared on their ancestors.
    fn binding_accepts(&self, parameter_type: &str, actual: &EdmTypeRef) -> bool {
        let (parameter_element, parameter_collection) = split_collection_type_name(parameter_type);
        if parameter_collection != actual.is_collection() {
            return false;
        }
        let actual_element = actual.element_type();
        match actual_element.as_structured() {
            Some(ty) => self.is_derived_from(ty, parameter_element),
            None => actual_element.full_name() == parameter_element,
        }
    }
}
