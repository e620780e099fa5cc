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

//! JSON model documents
//!
//! A compact JSON rendering of a CSDL schema, used by the command line tool and by
//! fixtures. Every type reference is a qualified name or a `Collection(...)` of one.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::memory::InMemoryModel;
use super::provider::EdmModel;
use super::schema::{
    EntitySet, EnumMember, EnumType, NavigationProperty, Operation, OperationKind,
    OperationParameter, ReferentialConstraint, ReturnType, Singleton, StructuralProperty,
    StructuredKind, StructuredType,
};
use super::types::{EdmPrimitiveKind, split_collection_type_name};
use crate::error::{ODataError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDocument {
    pub namespace: String,
    #[serde(default)]
    pub entity_types: Vec<StructuredTypeDocument>,
    #[serde(default)]
    pub complex_types: Vec<StructuredTypeDocument>,
    #[serde(default)]
    pub enum_types: Vec<EnumTypeDocument>,
    #[serde(default)]
    pub entity_sets: Vec<EntitySetDocument>,
    #[serde(default)]
    pub singletons: Vec<EntitySetDocument>,
    #[serde(default)]
    pub functions: Vec<OperationDocument>,
    #[serde(default)]
    pub actions: Vec<OperationDocument>,
    #[serde(default)]
    pub function_imports: Vec<OperationImportDocument>,
    #[serde(default)]
    pub action_imports: Vec<OperationImportDocument>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredTypeDocument {
    pub name: String,
    #[serde(default)]
    pub key: Vec<String>,
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default)]
    pub open: bool,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub properties: Vec<PropertyDocument>,
    #[serde(default)]
    pub navigation_properties: Vec<NavigationDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationDocument {
    pub name: String,
    /// `NS.Type` or `Collection(NS.Type)`
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub partner: Option<String>,
    #[serde(default)]
    pub contains_target: bool,
    #[serde(default)]
    pub referential_constraints: Vec<ReferentialConstraint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumTypeDocument {
    pub name: String,
    #[serde(default)]
    pub underlying_type: Option<String>,
    #[serde(default)]
    pub is_flags: bool,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySetDocument {
    pub name: String,
    #[serde(alias = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub navigation_bindings: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDocument {
    pub name: String,
    #[serde(default)]
    pub is_bound: bool,
    #[serde(default)]
    pub is_composable: bool,
    #[serde(default)]
    pub parameters: Vec<PropertyDocument>,
    #[serde(default)]
    pub return_type: Option<ReturnTypeDocument>,
    #[serde(default)]
    pub entity_set_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnTypeDocument {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationImportDocument {
    pub name: String,
    /// Qualified name of the imported function or action
    #[serde(alias = "function", alias = "action")]
    pub operation: String,
    #[serde(default)]
    pub entity_set: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl ModelDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ODataError::InvalidModel {
            message: e.to_string(),
        })
    }

    /// Build the model, checking that every referenced type exists
    pub fn into_model(self) -> Result<InMemoryModel> {
        let namespace = self.namespace;
        let mut model = InMemoryModel::new();

        for ty in self.enum_types {
            let underlying_type = match ty.underlying_type.as_deref() {
                None => EdmPrimitiveKind::Int32,
                Some(name) => EdmPrimitiveKind::from_qualified_name(name)
                    .filter(|kind| kind.is_integral())
                    .ok_or_else(|| invalid(format!("enum '{}' has invalid underlying type '{name}'", ty.name)))?,
            };
            model.add_enum_type(EnumType {
                namespace: namespace.clone(),
                name: ty.name,
                underlying_type,
                is_flags: ty.is_flags,
                members: ty.members,
            });
        }

        for (kind, types) in [
            (StructuredKind::Entity, self.entity_types),
            (StructuredKind::Complex, self.complex_types),
        ] {
            for ty in types {
                model.add_structured_type(structured_type(&namespace, kind, ty));
            }
        }

        for (kind, operations) in [
            (OperationKind::Function, self.functions),
            (OperationKind::Action, self.actions),
        ] {
            for operation in operations {
                model.add_operation(Operation {
                    namespace: namespace.clone(),
                    name: operation.name,
                    kind,
                    is_bound: operation.is_bound,
                    is_composable: operation.is_composable,
                    parameters: operation
                        .parameters
                        .into_iter()
                        .map(|p| OperationParameter {
                            name: p.name,
                            type_name: p.type_name,
                            nullable: p.nullable,
                        })
                        .collect(),
                    return_type: operation.return_type.map(|r| ReturnType {
                        type_name: r.type_name,
                        nullable: r.nullable,
                    }),
                    entity_set_path: operation.entity_set_path,
                });
            }
        }

        for set in self.entity_sets {
            model.add_entity_set(EntitySet {
                name: set.name,
                entity_type: set.entity_type,
                navigation_bindings: set.navigation_bindings,
            });
        }
        for singleton in self.singletons {
            model.add_singleton(Singleton {
                name: singleton.name,
                entity_type: singleton.entity_type,
                navigation_bindings: singleton.navigation_bindings,
            });
        }
        for import in self.function_imports.into_iter().chain(self.action_imports) {
            model.add_operation_import(&import.name, &import.operation, import.entity_set.as_deref());
        }

        validate(&model)?;
        log::debug!(
            "loaded model for namespace '{namespace}' with {} entity set(s)",
            model.entity_sets().count()
        );
        Ok(model)
    }
}

fn structured_type(namespace: &str, kind: StructuredKind, doc: StructuredTypeDocument) -> StructuredType {
    let mut ty = StructuredType::new(namespace, doc.name, kind);
    ty.key = doc.key;
    ty.base_type = doc.base_type;
    ty.is_open = doc.open;
    ty.is_abstract = doc.is_abstract;
    for property in doc.properties {
        ty.properties.insert(
            property.name.clone(),
            StructuralProperty::new(property.name, property.type_name, property.nullable),
        );
    }
    for navigation in doc.navigation_properties {
        let (target, collection) = split_collection_type_name(&navigation.type_name);
        let mut property = NavigationProperty::new(navigation.name.clone(), target, collection);
        if let Some(nullable) = navigation.nullable {
            property.nullable = nullable;
        }
        property.partner = navigation.partner;
        property.contains_target = navigation.contains_target;
        property.referential_constraints = navigation.referential_constraints;
        ty.navigation_properties.insert(navigation.name, property);
    }
    ty
}

fn invalid(message: String) -> ODataError {
    ODataError::InvalidModel { message }
}

fn validate(model: &InMemoryModel) -> Result<()> {
    let require_type = |name: &str, context: &str| -> Result<()> {
        if model.resolve_type_name(name, true).is_some() {
            Ok(())
        } else {
            Err(invalid(format!("{context} refers to unknown type '{name}'")))
        }
    };

    for set in model.entity_sets() {
        require_type(&set.entity_type, &format!("entity set '{}'", set.name))?;
    }
    for singleton in model.singletons() {
        require_type(&singleton.entity_type, &format!("singleton '{}'", singleton.name))?;
    }
    for ty in model.structured_types() {
        if let Some(base) = &ty.base_type {
            require_type(base, &format!("type '{}'", ty.full_name()))?;
        }
        for property in ty.properties.values() {
            require_type(
                &property.type_name,
                &format!("property '{}.{}'", ty.full_name(), property.name),
            )?;
        }
        for navigation in ty.navigation_properties.values() {
            if model.find_structured_type(&navigation.target_type).is_none() {
                return Err(invalid(format!(
                    "navigation property '{}.{}' targets unknown type '{}'",
                    ty.full_name(),
                    navigation.name,
                    navigation.target_type
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyLookup;

    const DOCUMENT: &str = r#"{
        "namespace": "Shop",
        "enumTypes": [
            { "name": "Color", "isFlags": true, "members": [
                { "name": "Red", "value": 1 }, { "name": "Green", "value": 2 } ] }
        ],
        "entityTypes": [
            { "name": "Product", "key": ["Id"],
              "properties": [
                { "name": "Id", "type": "Edm.Int32", "nullable": false },
                { "name": "Color", "type": "Shop.Color" } ],
              "navigationProperties": [
                { "name": "Parts", "type": "Collection(Shop.Product)" } ] }
        ],
        "entitySets": [
            { "name": "Products", "entityType": "Shop.Product",
              "navigationBindings": { "Parts": "Products" } }
        ],
        "functions": [
            { "name": "Cheapest", "returnType": { "type": "Shop.Product" } }
        ],
        "functionImports": [
            { "name": "Cheapest", "function": "Shop.Cheapest", "entitySet": "Products" }
        ]
    }"#;

    #[test]
    fn test_load_document() {
        let model = ModelDocument::from_json(DOCUMENT)
            .and_then(ModelDocument::into_model)
            .expect("document loads");
        let product = model.find_structured_type("Shop.Product").expect("type");
        assert!(matches!(
            model.find_property(&product, "Parts"),
            Some(PropertyLookup::Navigation(nav)) if nav.collection
        ));
        assert!(model.find_enum_type("Shop.Color").expect("enum").is_flags);
        assert_eq!(model.find_operation_imports("Cheapest").len(), 1);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"{ "namespace": "Shop",
            "entitySets": [ { "name": "Things", "entityType": "Shop.Thing" } ] }"#;
        let error = ModelDocument::from_json(json)
            .and_then(ModelDocument::into_model)
            .unwrap_err();
        assert!(matches!(error, ODataError::InvalidModel { .. }));
    }
}
