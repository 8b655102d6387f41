//! space::typed
//!
//! Strongly-typed handles over bound nodes.
//!
//! A handle is a `NodeId` tagged with the Rust type that describes it.
//! [`NodeType`] names the registered schema a handle stands for and
//! [`TypeDefinition`] supplies that schema for registration, so an
//! application type is declared once:
//!
//! ```
//! use nodebind::core::types::NodeId;
//! use nodebind::core::value::{Value, ValueType};
//! use nodebind::schema::TypeSchema;
//! use nodebind::space::{AddressSpace, NodeType, TypeDefinition};
//!
//! struct Boiler(NodeId);
//!
//! impl NodeType for Boiler {
//!     const TYPE_NAME: &'static str = "Boiler";
//!
//!     fn from_id(id: NodeId) -> Self {
//!         Boiler(id)
//!     }
//!
//!     fn id(&self) -> &NodeId {
//!         &self.0
//!     }
//! }
//!
//! impl TypeDefinition for Boiler {
//!     fn schema() -> TypeSchema {
//!         TypeSchema::object_type(Self::TYPE_NAME)
//!             .value_with_default("pressure", ValueType::Double, Value::Double(1.0))
//!             .build()
//!     }
//! }
//!
//! let mut space = AddressSpace::in_memory().unwrap();
//! space.register::<Boiler>().unwrap();
//! let objects = space.objects_folder().clone();
//! let boiler: Boiler = space.create(&objects, "Boiler1", None).unwrap();
//! assert_eq!(
//!     space.read_member(boiler.id(), "pressure").unwrap(),
//!     Value::Double(1.0)
//! );
//! ```

use crate::core::types::NodeId;
use crate::core::value::Value;
use crate::schema::{
    TypeSchema, BASE_DATA_VARIABLE_TYPE, BASE_OBJECT_TYPE, FOLDER_TYPE, PROPERTY_TYPE,
};
use crate::store::StoreAdapter;

use super::{AddressSpace, InstantiateError, MemberError};

/// A Rust handle type for one registered node type.
pub trait NodeType: Sized {
    /// Registered type name the handle stands for.
    const TYPE_NAME: &'static str;

    fn from_id(id: NodeId) -> Self;

    fn id(&self) -> &NodeId;
}

/// A handle type that also owns its schema.
pub trait TypeDefinition: NodeType {
    fn schema() -> TypeSchema;
}

macro_rules! builtin_handle {
    ($(#[$doc:meta])* $name:ident => $type_name:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(NodeId);

        impl NodeType for $name {
            const TYPE_NAME: &'static str = $type_name;

            fn from_id(id: NodeId) -> Self {
                Self(id)
            }

            fn id(&self) -> &NodeId {
                &self.0
            }
        }
    };
}

builtin_handle!(
    /// Handle for a `BaseObjectType` instance.
    BaseObject => BASE_OBJECT_TYPE
);
builtin_handle!(
    /// Handle for a `BaseDataVariableType` instance.
    BaseDataVariable => BASE_DATA_VARIABLE_TYPE
);
builtin_handle!(
    /// Handle for a `PropertyType` instance.
    Property => PROPERTY_TYPE
);
builtin_handle!(
    /// Handle for a `FolderType` instance.
    Folder => FOLDER_TYPE
);

impl BaseDataVariable {
    pub fn value<S: StoreAdapter>(&self, space: &AddressSpace<S>) -> Result<Value, MemberError> {
        space.read_member(&self.0, "value")
    }

    pub fn set_value<S: StoreAdapter>(
        &self,
        space: &mut AddressSpace<S>,
        value: impl Into<Value>,
    ) -> Result<(), MemberError> {
        space.write_member(&self.0, "value", value)
    }
}

impl Property {
    pub fn value<S: StoreAdapter>(&self, space: &AddressSpace<S>) -> Result<Value, MemberError> {
        space.read_member(&self.0, "value")
    }

    pub fn set_value<S: StoreAdapter>(
        &self,
        space: &mut AddressSpace<S>,
        value: impl Into<Value>,
    ) -> Result<(), MemberError> {
        space.write_member(&self.0, "value", value)
    }
}

impl<S: StoreAdapter> AddressSpace<S> {
    /// A `T` handle for `id` if the bound wrapper's type is `T` or derives
    /// from it.
    pub fn typed<T: NodeType>(&self, id: &NodeId) -> Option<T> {
        let node = self.node(id)?;
        self.registry
            .is_subtype_of(node.type_name(), T::TYPE_NAME)
            .then(|| T::from_id(id.clone()))
    }

    /// Instantiate `T` under `parent`.
    pub fn create<T: NodeType>(
        &mut self,
        parent: &NodeId,
        browse_name: &str,
        node_id: Option<NodeId>,
    ) -> Result<T, InstantiateError> {
        let id = self.create_instance(T::TYPE_NAME, parent, browse_name, node_id)?;
        Ok(T::from_id(id))
    }

    pub fn add_folder(&mut self, parent: &NodeId, browse_name: &str) -> Result<Folder, InstantiateError> {
        self.create(parent, browse_name, None)
    }

    pub fn add_base_object(
        &mut self,
        parent: &NodeId,
        browse_name: &str,
    ) -> Result<BaseObject, InstantiateError> {
        self.create(parent, browse_name, None)
    }

    pub fn add_base_data_variable(
        &mut self,
        parent: &NodeId,
        browse_name: &str,
    ) -> Result<BaseDataVariable, InstantiateError> {
        self.create(parent, browse_name, None)
    }

    /// Add a property. Properties hang off their parent through
    /// `HasProperty` rather than `HasComponent`.
    pub fn add_property(&mut self, parent: &NodeId, browse_name: &str) -> Result<Property, InstantiateError> {
        self.create(parent, browse_name, None)
    }
}
