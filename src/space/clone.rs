//! space::clone
//!
//! Duplicate one node's state under a new identity.
//!
//! A clone is a fresh instance of the source's type whose writable members
//! are copied through a scratch [`MemorySerializer`]. Mandatory children
//! come from instantiation and start with their defaults; they are not
//! copied. Outgoing edges of registered kinds are re-created from the
//! clone.

use thiserror::Error;

use crate::core::log::LogQueue;
use crate::core::types::NodeId;
use crate::core::value::Value;
use crate::serializer::{MemorySerializer, SerializeError, BROWSE_NAME_ATTRIBUTE};
use crate::store::StoreAdapter;

use super::{AddressSpace, InstantiateError};

#[derive(Debug, Error)]
pub enum CloneError {
    #[error("node {0} is not bound")]
    NodeNotBound(NodeId),

    #[error(transparent)]
    Instantiate(#[from] InstantiateError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error("scratch record for {0} went missing")]
    MissingRecord(NodeId),
}

/// Where and under what name a clone is created.
#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    /// Parent of the clone; the `Objects` folder when unset.
    pub parent: Option<NodeId>,
    /// Browse name of the clone; the source's when unset.
    pub browse_name: Option<String>,
    /// Explicit id for the clone; generated when unset.
    pub node_id: Option<NodeId>,
}

impl CloneOptions {
    pub fn under(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn named(mut self, browse_name: impl Into<String>) -> Self {
        self.browse_name = Some(browse_name.into());
        self
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.node_id = Some(id);
        self
    }
}

impl<S: StoreAdapter> AddressSpace<S> {
    /// Clone `source` according to `options`, returning the new node.
    ///
    /// Cloning under the source's own parent needs a new browse name.
    pub fn clone_node(
        &mut self,
        source: &NodeId,
        options: CloneOptions,
        log: &mut LogQueue,
    ) -> Result<NodeId, CloneError> {
        let node = self
            .node(source)
            .ok_or_else(|| CloneError::NodeNotBound(source.clone()))?;
        let type_name = node.type_name().to_string();
        let source_name = node.browse_name().to_string();

        let parent = options.parent.unwrap_or_else(|| self.objects.clone());
        let browse_name = options.browse_name.unwrap_or_else(|| source_name.clone());
        let clone = self.create_instance(&type_name, &parent, &browse_name, options.node_id)?;

        let mut scratch = MemorySerializer::new();
        self.serialize_node(source, &mut scratch, log)?;
        if !scratch.rekey(source, clone.clone()) {
            return Err(CloneError::MissingRecord(source.clone()));
        }
        let record = scratch
            .get_mut(&clone)
            .ok_or_else(|| CloneError::MissingRecord(clone.clone()))?;
        record.attrs.insert(
            BROWSE_NAME_ATTRIBUTE.to_string(),
            Value::String(browse_name.clone()),
        );
        if record.attrs.get("displayName").and_then(Value::as_str) == Some(source_name.as_str()) {
            record
                .attrs
                .insert("displayName".to_string(), Value::String(browse_name.clone()));
        }
        let refs = record.forward_refs.clone();

        self.deserialize_node(&clone, &scratch, log)?;
        self.apply_forward_references(&clone, &refs, log);

        log::debug!("cloned {} into {} '{}'", source, clone, browse_name);
        Ok(clone)
    }
}
