//! schema::registry
//!
//! The table of registered type schemas.
//!
//! # Invariants
//!
//! - Every registered type except the two roots names a registered supertype
//! - A type's node class matches its supertype's node class
//! - Member names are unique across a type's whole supertype chain
//!
//! Chain walks go from the most-derived type toward the root; effective
//! member lists are reported root first so base members come before the
//! members a subtype adds.

use std::collections::HashMap;

use crate::core::types::{NodeClass, NodeId};
use crate::core::value::{Value, ValueType};

use super::{
    ChildDeclaration, MemberDescriptor, MethodDescriptor, SchemaError, TypeSchema,
    TypeSchemaBuilder, BASE_DATA_VARIABLE_TYPE, BASE_OBJECT_TYPE, BASE_VARIABLE_TYPE,
    FOLDER_TYPE, PROPERTY_TYPE,
};

/// Registered schemas keyed by type name.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, TypeSchema>,
    order: Vec<String>,
    type_nodes: HashMap<String, NodeId>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TypeRegistry {
    /// Registry seeded with the built-in types.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            types: HashMap::new(),
            order: Vec::new(),
            type_nodes: HashMap::new(),
        };
        for schema in builtin_schemas() {
            registry.insert(schema);
        }
        registry
    }

    fn insert(&mut self, schema: TypeSchema) {
        self.order.push(schema.name().to_string());
        self.types.insert(schema.name().to_string(), schema);
    }

    /// Register a schema after validating it against the registry.
    pub fn register(&mut self, schema: TypeSchema) -> Result<(), SchemaError> {
        if self.types.contains_key(schema.name()) {
            return Err(SchemaError::DuplicateType(schema.name().to_string()));
        }

        let supertype = schema
            .supertype()
            .ok_or_else(|| SchemaError::MissingSupertype(schema.name().to_string()))?;
        let parent = self
            .types
            .get(supertype)
            .ok_or_else(|| SchemaError::UnknownSupertype {
                type_name: schema.name().to_string(),
                supertype: supertype.to_string(),
            })?;
        if parent.node_class() != schema.node_class() {
            return Err(SchemaError::NodeClassMismatch {
                type_name: schema.name().to_string(),
                expected: parent.node_class(),
                found: schema.node_class(),
            });
        }

        let inherited: Vec<&str> = self
            .effective_members(supertype)?
            .into_iter()
            .map(|m| m.name.as_str())
            .collect();
        let mut seen: Vec<&str> = Vec::new();
        for member in schema.members() {
            let name = member.name.as_str();
            if inherited.contains(&name) || seen.contains(&name) {
                return Err(SchemaError::DuplicateMember {
                    type_name: schema.name().to_string(),
                    member: member.name.clone(),
                });
            }
            seen.push(name);
        }

        log::debug!(
            "registered type '{}' (supertype '{}')",
            schema.name(),
            supertype
        );
        self.insert(schema);
        Ok(())
    }

    /// Drop a registration whose store side could not be created.
    pub(crate) fn remove(&mut self, name: &str) {
        self.types.remove(name);
        self.order.retain(|n| n != name);
        self.type_nodes.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&TypeSchema> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Type names in registration order, built-ins first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn supertype(&self, name: &str) -> Option<&str> {
        self.types.get(name).and_then(|s| s.supertype())
    }

    /// True for the two root types, where chain walks stop.
    pub fn is_root(name: &str) -> bool {
        name == BASE_OBJECT_TYPE || name == BASE_VARIABLE_TYPE
    }

    /// The type and its supertypes, most-derived first.
    pub fn chain(&self, name: &str) -> Result<Vec<&TypeSchema>, SchemaError> {
        let mut chain = Vec::new();
        let mut current = Some(name);
        while let Some(type_name) = current {
            let schema = self
                .types
                .get(type_name)
                .ok_or_else(|| SchemaError::UnknownType(type_name.to_string()))?;
            if chain.len() > self.types.len() {
                return Err(SchemaError::CyclicSupertype(name.to_string()));
            }
            chain.push(schema);
            current = schema.supertype();
        }
        Ok(chain)
    }

    /// True if `name` is `ancestor` or derives from it.
    pub fn is_subtype_of(&self, name: &str, ancestor: &str) -> bool {
        self.chain(name)
            .map(|chain| chain.iter().any(|s| s.name() == ancestor))
            .unwrap_or(false)
    }

    /// Every member visible on `name`, root members first.
    pub fn effective_members(&self, name: &str) -> Result<Vec<&MemberDescriptor>, SchemaError> {
        let chain = self.chain(name)?;
        Ok(chain
            .into_iter()
            .rev()
            .flat_map(|s| s.members().iter())
            .collect())
    }

    pub fn member(&self, type_name: &str, member: &str) -> Option<&MemberDescriptor> {
        self.effective_members(type_name)
            .ok()?
            .into_iter()
            .find(|m| m.name == member)
    }

    /// Explicit mandatory children across the chain, root first.
    pub fn mandatory_children(&self, name: &str) -> Result<Vec<&ChildDeclaration>, SchemaError> {
        let chain = self.chain(name)?;
        Ok(chain
            .into_iter()
            .rev()
            .flat_map(|s| s.mandatory_children().iter())
            .collect())
    }

    /// True if some type in the chain declares an optional child `child`.
    pub fn declares_optional_child(&self, name: &str, child: &str) -> bool {
        self.chain(name)
            .map(|chain| {
                chain
                    .iter()
                    .any(|s| s.optional_children().iter().any(|c| c.name == child))
            })
            .unwrap_or(false)
    }

    /// Methods across the chain, root first.
    pub fn methods(&self, name: &str) -> Result<Vec<&MethodDescriptor>, SchemaError> {
        let chain = self.chain(name)?;
        Ok(chain
            .into_iter()
            .rev()
            .flat_map(|s| s.methods().iter())
            .collect())
    }

    /// Record the store node that represents type `name`.
    pub fn set_type_node(&mut self, name: &str, id: NodeId) {
        self.type_nodes.insert(name.to_string(), id);
    }

    pub fn type_node(&self, name: &str) -> Option<&NodeId> {
        self.type_nodes.get(name)
    }

    /// Generic fallback type for an instance node class.
    pub fn generic_type_for(node_class: NodeClass) -> Option<&'static str> {
        match node_class {
            NodeClass::Variable => Some(BASE_DATA_VARIABLE_TYPE),
            NodeClass::Object => Some(BASE_OBJECT_TYPE),
            _ => None,
        }
    }
}

fn base_members(builder: TypeSchemaBuilder) -> TypeSchemaBuilder {
    builder
        .value("displayName", ValueType::String)
        .value("description", ValueType::String)
        .value_with_default("writeMask", ValueType::UInt64, Value::UInt64(0))
}

fn builtin_schemas() -> Vec<TypeSchema> {
    vec![
        base_members(TypeSchemaBuilder::root(BASE_OBJECT_TYPE, NodeClass::Object))
            .extensible()
            .build(),
        base_members(TypeSchemaBuilder::root(
            BASE_VARIABLE_TYPE,
            NodeClass::Variable,
        ))
        .value("value", ValueType::Variant)
        .value("dataType", ValueType::String)
        .value_with_default("accessLevel", ValueType::UInt64, Value::UInt64(1))
        .abstract_type()
        .extensible()
        .build(),
        TypeSchema::variable_type(BASE_DATA_VARIABLE_TYPE)
            .supertype(BASE_VARIABLE_TYPE)
            .extensible()
            .build(),
        TypeSchema::variable_type(PROPERTY_TYPE)
            .supertype(BASE_VARIABLE_TYPE)
            .build(),
        TypeSchema::object_type(FOLDER_TYPE).extensible().build(),
    ]
}
