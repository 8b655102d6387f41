//! schema
//!
//! Runtime type schemas for typed node wrappers.
//!
//! # Overview
//!
//! A [`TypeSchema`] describes one node type: its instance node class,
//! its supertype, and the ordered members a wrapper of that type exposes.
//! Members are either node-typed (a structural child that must exist with
//! the member's name) or value members (an attribute held by the store).
//! Schemas are built at runtime and registered in a [`TypeRegistry`];
//! there is no reflection.
//!
//! # Example
//!
//! ```
//! use nodebind::core::value::{Value, ValueType};
//! use nodebind::schema::TypeSchema;
//!
//! let schema = TypeSchema::object_type("TemperatureSensor")
//!     .value_with_default("value", ValueType::Double, Value::Double(0.0))
//!     .read_only("serialNumber", ValueType::String)
//!     .child("Status", "BaseDataVariableType")
//!     .optional_child("Calibration", "BaseDataVariableType")
//!     .build();
//!
//! assert_eq!(schema.name(), "TemperatureSensor");
//! assert_eq!(schema.supertype(), Some("BaseObjectType"));
//! assert_eq!(schema.members().len(), 3);
//! ```

pub mod registry;

pub use registry::TypeRegistry;

use thiserror::Error;

use crate::core::types::NodeClass;
use crate::core::value::{Value, ValueType};

/// Root of the object type hierarchy.
pub const BASE_OBJECT_TYPE: &str = "BaseObjectType";
/// Root of the variable type hierarchy.
pub const BASE_VARIABLE_TYPE: &str = "BaseVariableType";
/// Generic data variable.
pub const BASE_DATA_VARIABLE_TYPE: &str = "BaseDataVariableType";
/// Generic property.
pub const PROPERTY_TYPE: &str = "PropertyType";
/// Generic folder.
pub const FOLDER_TYPE: &str = "FolderType";

/// Errors from schema registration and lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("type '{0}' is already registered")]
    DuplicateType(String),

    #[error("type '{type_name}' names unknown supertype '{supertype}'")]
    UnknownSupertype { type_name: String, supertype: String },

    #[error("type '{0}' must name a supertype")]
    MissingSupertype(String),

    #[error("type '{type_name}' is a {found} type but its supertype is a {expected} type")]
    NodeClassMismatch {
        type_name: String,
        expected: NodeClass,
        found: NodeClass,
    },

    #[error("type '{type_name}' declares member '{member}' more than once in its chain")]
    DuplicateMember { type_name: String, member: String },

    #[error("type '{0}' has a cyclic supertype chain")]
    CyclicSupertype(String),
}

/// What a member holds.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberKind {
    /// A structural child of the given type, bound by browse name.
    Child { type_name: String },
    /// A store attribute.
    Value {
        value_type: ValueType,
        writable: bool,
        default: Value,
    },
}

/// One member of a type schema.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDescriptor {
    pub name: String,
    pub kind: MemberKind,
}

impl MemberDescriptor {
    pub fn child(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Child {
                type_name: type_name.into(),
            },
        }
    }

    pub fn value(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Value {
                value_type,
                writable: true,
                default: Value::Null,
            },
        }
    }

    pub fn read_only(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Value {
                value_type,
                writable: false,
                default: Value::Null,
            },
        }
    }

    /// Set the value written when an instance is bound with the member unset.
    /// Has no effect on node-typed members.
    pub fn with_default(mut self, value: Value) -> Self {
        if let MemberKind::Value { default, .. } = &mut self.kind {
            *default = value;
        }
        self
    }

    pub fn is_node_typed(&self) -> bool {
        matches!(self.kind, MemberKind::Child { .. })
    }

    /// Declared child type for node-typed members.
    pub fn child_type(&self) -> Option<&str> {
        match &self.kind {
            MemberKind::Child { type_name } => Some(type_name),
            MemberKind::Value { .. } => None,
        }
    }

    pub fn value_type(&self) -> Option<ValueType> {
        match &self.kind {
            MemberKind::Value { value_type, .. } => Some(*value_type),
            MemberKind::Child { .. } => None,
        }
    }

    pub fn default_value(&self) -> Option<&Value> {
        match &self.kind {
            MemberKind::Value { default, .. } => Some(default),
            MemberKind::Child { .. } => None,
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.kind, MemberKind::Value { writable: true, .. })
    }

    /// Writable, non-node-typed and representable: the members that
    /// appear in an attribute map.
    pub fn is_serializable(&self) -> bool {
        match &self.kind {
            MemberKind::Value {
                value_type,
                writable,
                ..
            } => *writable && value_type.is_representable(),
            MemberKind::Child { .. } => false,
        }
    }
}

/// A child declared on a type node by name and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDeclaration {
    pub name: String,
    pub type_name: String,
}

/// A method declared on a type node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    pub optional: bool,
}

/// Schema of one node type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSchema {
    name: String,
    node_class: NodeClass,
    supertype: Option<String>,
    is_abstract: bool,
    extensible: bool,
    members: Vec<MemberDescriptor>,
    mandatory_children: Vec<ChildDeclaration>,
    optional_children: Vec<ChildDeclaration>,
    methods: Vec<MethodDescriptor>,
}

impl TypeSchema {
    /// Start an object type deriving from `BaseObjectType`.
    pub fn object_type(name: impl Into<String>) -> TypeSchemaBuilder {
        TypeSchemaBuilder::new(name.into(), NodeClass::Object, Some(BASE_OBJECT_TYPE))
    }

    /// Start a variable type deriving from `BaseDataVariableType`.
    pub fn variable_type(name: impl Into<String>) -> TypeSchemaBuilder {
        TypeSchemaBuilder::new(
            name.into(),
            NodeClass::Variable,
            Some(BASE_DATA_VARIABLE_TYPE),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node class of instances (`Object` or `Variable`).
    pub fn node_class(&self) -> NodeClass {
        self.node_class
    }

    /// Node class of the type node itself.
    pub fn type_node_class(&self) -> NodeClass {
        match self.node_class {
            NodeClass::Variable => NodeClass::VariableType,
            _ => NodeClass::ObjectType,
        }
    }

    pub fn supertype(&self) -> Option<&str> {
        self.supertype.as_deref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Extensible types accept children beyond their declared members.
    pub fn is_extensible(&self) -> bool {
        self.extensible
    }

    /// Members declared by this type only, in declaration order.
    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    pub fn mandatory_children(&self) -> &[ChildDeclaration] {
        &self.mandatory_children
    }

    pub fn optional_children(&self) -> &[ChildDeclaration] {
        &self.optional_children
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Builder for [`TypeSchema`].
#[derive(Debug, Clone)]
pub struct TypeSchemaBuilder {
    schema: TypeSchema,
}

impl TypeSchemaBuilder {
    fn new(name: String, node_class: NodeClass, supertype: Option<&str>) -> Self {
        Self {
            schema: TypeSchema {
                name,
                node_class,
                supertype: supertype.map(str::to_string),
                is_abstract: false,
                extensible: false,
                members: Vec::new(),
                mandatory_children: Vec::new(),
                optional_children: Vec::new(),
                methods: Vec::new(),
            },
        }
    }

    /// A root type with no supertype. Only built-in roots use this.
    pub(crate) fn root(name: &str, node_class: NodeClass) -> Self {
        Self::new(name.to_string(), node_class, None)
    }

    pub fn supertype(mut self, name: impl Into<String>) -> Self {
        self.schema.supertype = Some(name.into());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.schema.is_abstract = true;
        self
    }

    pub fn extensible(mut self) -> Self {
        self.schema.extensible = true;
        self
    }

    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.schema.members.push(member);
        self
    }

    /// Node-typed member bound to the child named `name`.
    pub fn child(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.member(MemberDescriptor::child(name, type_name))
    }

    /// Writable value member.
    pub fn value(self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.member(MemberDescriptor::value(name, value_type))
    }

    /// Writable value member initialized to `default` on bind.
    pub fn value_with_default(
        self,
        name: impl Into<String>,
        value_type: ValueType,
        default: Value,
    ) -> Self {
        self.member(MemberDescriptor::value(name, value_type).with_default(default))
    }

    /// Read-only value member.
    pub fn read_only(self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.member(MemberDescriptor::read_only(name, value_type))
    }

    /// Child required on every instance but not exposed as a member.
    pub fn mandatory_child(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.schema.mandatory_children.push(ChildDeclaration {
            name: name.into(),
            type_name: type_name.into(),
        });
        self
    }

    /// Child created only on demand by materialization.
    pub fn optional_child(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.schema.optional_children.push(ChildDeclaration {
            name: name.into(),
            type_name: type_name.into(),
        });
        self
    }

    pub fn method(mut self, name: impl Into<String>) -> Self {
        self.schema.methods.push(MethodDescriptor {
            name: name.into(),
            optional: false,
        });
        self
    }

    pub fn optional_method(mut self, name: impl Into<String>) -> Self {
        self.schema.methods.push(MethodDescriptor {
            name: name.into(),
            optional: true,
        });
        self
    }

    pub fn build(self) -> TypeSchema {
        self.schema
    }
}
