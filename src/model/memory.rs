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

//! In-memory model implementation and fluent builder
//!
//! Used by the CLI (through the JSON document loader), tests and benchmarks. Hosts with
//! their own metadata store implement [`EdmModel`] directly instead.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::provider::EdmModel;
use super::schema::{
    ContainedSet, EntitySet, EnumMember, EnumType, NavigationProperty, NavigationSource,
    Operation, OperationImport, OperationKind, OperationParameter, ReferentialConstraint,
    ReturnType, SchemaType, Singleton, StructuralProperty, StructuredKind, StructuredType,
};
use super::types::EdmPrimitiveKind;

/// Entity Data Model held entirely in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryModel {
    types: FxHashMap<String, SchemaType>,
    entity_sets: IndexMap<String, Arc<EntitySet>>,
    singletons: IndexMap<String, Arc<Singleton>>,
    operations: FxHashMap<String, Vec<Arc<Operation>>>,
    operation_imports: FxHashMap<String, Vec<Arc<OperationImport>>>,
}

impl InMemoryModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_structured_type(&mut self, ty: StructuredType) {
        self.types
            .insert(ty.full_name(), SchemaType::Structured(Arc::new(ty)));
    }

    pub fn add_enum_type(&mut self, ty: EnumType) {
        self.types.insert(ty.full_name(), SchemaType::Enum(Arc::new(ty)));
    }

    pub fn add_entity_set(&mut self, set: EntitySet) {
        self.entity_sets.insert(set.name.clone(), Arc::new(set));
    }

    pub fn add_singleton(&mut self, singleton: Singleton) {
        self.singletons
            .insert(singleton.name.clone(), Arc::new(singleton));
    }

    pub fn add_operation(&mut self, operation: Operation) {
        self.operations
            .entry(operation.full_name())
            .or_default()
            .push(Arc::new(operation));
    }

    /// Expose every overload of `operation_name` under `name` in the container
    pub fn add_operation_import(
        &mut self,
        name: &str,
        operation_name: &str,
        entity_set: Option<&str>,
    ) {
        let imports: Vec<Arc<OperationImport>> = self
            .find_unbound_operations(operation_name)
            .into_iter()
            .map(|operation| {
                Arc::new(OperationImport {
                    name: name.to_string(),
                    operation,
                    entity_set: entity_set.map(str::to_string),
                })
            })
            .collect();
        if imports.is_empty() {
            log::warn!("operation import '{name}' refers to unknown operation '{operation_name}'");
        }
        self.operation_imports
            .entry(name.to_string())
            .or_default()
            .extend(imports);
    }

    pub fn entity_sets(&self) -> impl Iterator<Item = &Arc<EntitySet>> {
        self.entity_sets.values()
    }

    pub fn singletons(&self) -> impl Iterator<Item = &Arc<Singleton>> {
        self.singletons.values()
    }

    pub fn structured_types(&self) -> impl Iterator<Item = &Arc<StructuredType>> {
        self.types.values().filter_map(|ty| match ty {
            SchemaType::Structured(ty) => Some(ty),
            SchemaType::Enum(_) => None,
        })
    }

    fn find_navigation_source(&self, name: &str) -> Option<NavigationSource> {
        self.entity_sets
            .get(name)
            .map(|set| NavigationSource::EntitySet(Arc::clone(set)))
            .or_else(|| {
                self.singletons
                    .get(name)
                    .map(|s| NavigationSource::Singleton(Arc::clone(s)))
            })
    }
}

impl EdmModel for InMemoryModel {
    fn find_type(&self, qualified_name: &str) -> Option<SchemaType> {
        self.types.get(qualified_name).cloned()
    }

    fn find_entity_set(&self, name: &str) -> Option<Arc<EntitySet>> {
        self.entity_sets.get(name).cloned()
    }

    fn find_singleton(&self, name: &str) -> Option<Arc<Singleton>> {
        self.singletons.get(name).cloned()
    }

    fn find_operation_imports(&self, name: &str) -> Vec<Arc<OperationImport>> {
        self.operation_imports.get(name).cloned().unwrap_or_default()
    }

    fn find_operations(&self, qualified_name: &str) -> Vec<Arc<Operation>> {
        self.operations.get(qualified_name).cloned().unwrap_or_default()
    }

    fn derived_types(&self, qualified_name: &str) -> Vec<Arc<StructuredType>> {
        let mut derived: Vec<Arc<StructuredType>> = self
            .types
            .values()
            .filter_map(|ty| match ty {
                SchemaType::Structured(ty) => Some(ty),
                SchemaType::Enum(_) => None,
            })
            .filter(|ty| ty.full_name() != qualified_name && self.is_derived_from(ty, qualified_name))
            .cloned()
            .collect();
        derived.sort_by_key(|ty| ty.full_name());
        derived
    }

    fn navigation_target(
        &self,
        source: &NavigationSource,
        binding_path: &str,
        navigation: &NavigationProperty,
    ) -> Option<NavigationSource> {
        if navigation.contains_target {
            return Some(NavigationSource::Contained(Arc::new(ContainedSet {
                parent: source.name(),
                navigation_property: navigation.name.clone(),
                entity_type: navigation.target_type.clone(),
            })));
        }
        let bindings = source.navigation_bindings()?;
        bindings
            .get(binding_path)
            .or_else(|| bindings.get(&navigation.name))
            .and_then(|target| self.find_navigation_source(target))
    }
}

/// Fluent construction of an [`InMemoryModel`] within one namespace
#[derive(Debug)]
pub struct ModelBuilder {
    namespace: String,
    model: InMemoryModel,
    imports: Vec<(String, String, Option<String>)>,
}

impl ModelBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            model: InMemoryModel::new(),
            imports: Vec::new(),
        }
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}.{}", self.namespace, name)
    }

    pub fn entity_type(
        mut self,
        name: &str,
        configure: impl FnOnce(TypeBuilder) -> TypeBuilder,
    ) -> Self {
        let builder = TypeBuilder::new(&self.namespace, name, StructuredKind::Entity);
        self.model.add_structured_type(configure(builder).ty);
        self
    }

    pub fn complex_type(
        mut self,
        name: &str,
        configure: impl FnOnce(TypeBuilder) -> TypeBuilder,
    ) -> Self {
        let builder = TypeBuilder::new(&self.namespace, name, StructuredKind::Complex);
        self.model.add_structured_type(configure(builder).ty);
        self
    }

    /// Enum with `Edm.Int32` underlying type
    pub fn enum_type(mut self, name: &str, is_flags: bool, members: &[(&str, i64)]) -> Self {
        self.model.add_enum_type(EnumType {
            namespace: self.namespace.clone(),
            name: name.to_string(),
            underlying_type: EdmPrimitiveKind::Int32,
            is_flags,
            members: members
                .iter()
                .map(|(name, value)| EnumMember {
                    name: (*name).to_string(),
                    value: *value,
                })
                .collect(),
        });
        self
    }

    /// Entity set with `(navigation path, target)` bindings
    pub fn entity_set(mut self, name: &str, entity_type: &str, bindings: &[(&str, &str)]) -> Self {
        self.model.add_entity_set(EntitySet {
            name: name.to_string(),
            entity_type: self.qualified(entity_type),
            navigation_bindings: collect_bindings(bindings),
        });
        self
    }

    pub fn singleton(mut self, name: &str, entity_type: &str, bindings: &[(&str, &str)]) -> Self {
        self.model.add_singleton(Singleton {
            name: name.to_string(),
            entity_type: self.qualified(entity_type),
            navigation_bindings: collect_bindings(bindings),
        });
        self
    }

    pub fn function(
        mut self,
        name: &str,
        configure: impl FnOnce(OperationBuilder) -> OperationBuilder,
    ) -> Self {
        let builder = OperationBuilder::new(&self.namespace, name, OperationKind::Function);
        self.model.add_operation(configure(builder).operation);
        self
    }

    pub fn action(
        mut self,
        name: &str,
        configure: impl FnOnce(OperationBuilder) -> OperationBuilder,
    ) -> Self {
        let builder = OperationBuilder::new(&self.namespace, name, OperationKind::Action);
        self.model.add_operation(configure(builder).operation);
        self
    }

    /// Import an unbound function or action; resolved when the model is built
    pub fn operation_import(mut self, name: &str, operation: &str, entity_set: Option<&str>) -> Self {
        self.imports.push((
            name.to_string(),
            self.qualified(operation),
            entity_set.map(str::to_string),
        ));
        self
    }

    pub fn build(mut self) -> InMemoryModel {
        for (name, operation, entity_set) in std::mem::take(&mut self.imports) {
            self.model
                .add_operation_import(&name, &operation, entity_set.as_deref());
        }
        self.model
    }
}

fn collect_bindings(bindings: &[(&str, &str)]) -> IndexMap<String, String> {
    bindings
        .iter()
        .map(|(path, target)| ((*path).to_string(), (*target).to_string()))
        .collect()
}

/// Builder for one entity or complex type
#[derive(Debug)]
pub struct TypeBuilder {
    ty: StructuredType,
}

impl TypeBuilder {
    fn new(namespace: &str, name: &str, kind: StructuredKind) -> Self {
        Self {
            ty: StructuredType::new(namespace, name, kind),
        }
    }

    pub fn key(mut self, key: &[&str]) -> Self {
        self.ty.key = key.iter().map(|k| (*k).to_string()).collect();
        self
    }

    pub fn base(mut self, base_type: &str) -> Self {
        self.ty.base_type = Some(base_type.to_string());
        self
    }

    pub fn open(mut self) -> Self {
        self.ty.is_open = true;
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.ty.is_abstract = true;
        self
    }

    pub fn property(mut self, name: &str, type_name: &str, nullable: bool) -> Self {
        self.ty.properties.insert(
            name.to_string(),
            StructuralProperty::new(name, type_name, nullable),
        );
        self
    }

    pub fn navigation(self, name: &str, target_type: &str, collection: bool) -> Self {
        self.navigation_with(NavigationProperty::new(name, target_type, collection))
    }

    /// Navigation property with a declared partner on the target type
    pub fn navigation_with_partner(
        self,
        name: &str,
        target_type: &str,
        collection: bool,
        partner: &str,
    ) -> Self {
        let mut navigation = NavigationProperty::new(name, target_type, collection);
        navigation.partner = Some(partner.to_string());
        self.navigation_with(navigation)
    }

    /// Navigation property declaring referential constraints `(property, referenced)`
    pub fn constrained_navigation(
        self,
        name: &str,
        target_type: &str,
        partner: Option<&str>,
        constraints: &[(&str, &str)],
    ) -> Self {
        let mut navigation = NavigationProperty::new(name, target_type, false);
        navigation.partner = partner.map(str::to_string);
        navigation.referential_constraints = constraints
            .iter()
            .map(|(property, referenced)| ReferentialConstraint {
                property: (*property).to_string(),
                referenced_property: (*referenced).to_string(),
            })
            .collect();
        self.navigation_with(navigation)
    }

    pub fn containment(self, name: &str, target_type: &str, collection: bool) -> Self {
        let mut navigation = NavigationProperty::new(name, target_type, collection);
        navigation.contains_target = true;
        self.navigation_with(navigation)
    }

    pub fn navigation_with(mut self, navigation: NavigationProperty) -> Self {
        self.ty
            .navigation_properties
            .insert(navigation.name.clone(), navigation);
        self
    }
}

/// Builder for one function or action overload
#[derive(Debug)]
pub struct OperationBuilder {
    operation: Operation,
}

impl OperationBuilder {
    fn new(namespace: &str, name: &str, kind: OperationKind) -> Self {
        Self {
            operation: Operation {
                namespace: namespace.to_string(),
                name: name.to_string(),
                kind,
                is_bound: false,
                is_composable: false,
                parameters: Vec::new(),
                return_type: None,
                entity_set_path: None,
            },
        }
    }

    /// Bind to `type_name`; the binding parameter is always the first parameter
    pub fn bound_to(mut self, type_name: &str) -> Self {
        self.operation.is_bound = true;
        self.operation.parameters.insert(
            0,
            OperationParameter {
                name: "bindingParameter".to_string(),
                type_name: type_name.to_string(),
                nullable: false,
            },
        );
        self
    }

    pub fn parameter(mut self, name: &str, type_name: &str, nullable: bool) -> Self {
        self.operation.parameters.push(OperationParameter {
            name: name.to_string(),
            type_name: type_name.to_string(),
            nullable,
        });
        self
    }

    pub fn returns(mut self, type_name: &str, nullable: bool) -> Self {
        self.operation.return_type = Some(ReturnType {
            type_name: type_name.to_string(),
            nullable,
        });
        self
    }

    pub fn composable(mut self) -> Self {
        self.operation.is_composable = true;
        self
    }

    pub fn entity_set_path(mut self, path: &str) -> Self {
        self.operation.entity_set_path = Some(path.to_string());
        self
    }
}
