//! serializer
//!
//! Pluggable persistence for node subtrees.
//!
//! # Architecture
//!
//! A [`TreeSerializer`] backend stores one [`SerializedNode`] record per
//! `NodeId`. Backends are deliberately lenient: a duplicate key on write or
//! a missing key on read is logged to the caller's [`LogQueue`] and the
//! operation carries on. The address space drives the walk (see
//! [`tree`]); backends never see wrappers.
//!
//! - [`MemorySerializer`] - records in a map, used for cloning and tests
//! - [`JsonFileSerializer`] - one JSON document on disk
//!
//! # Example
//!
//! ```
//! use nodebind::core::log::LogQueue;
//! use nodebind::serializer::{MemorySerializer, TreeSerializer};
//! use nodebind::space::AddressSpace;
//!
//! let mut space = AddressSpace::in_memory().unwrap();
//! let objects = space.objects_folder().clone();
//! let pump = space.create_instance("BaseObjectType", &objects, "Pump", None).unwrap();
//!
//! let mut backend = MemorySerializer::new();
//! let mut log = LogQueue::new();
//! space.serialize(&pump, &mut backend, &mut log).unwrap();
//! assert!(backend.read_instance(&pump, &mut log).is_some());
//! ```

pub mod json_file;
pub mod memory;
pub mod tree;

pub use json_file::JsonFileSerializer;
pub use memory::MemorySerializer;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::config::Config;
use crate::core::log::LogQueue;
use crate::core::types::{BrowseName, NodeId, ReferenceKind};
use crate::core::value::Value;
use crate::store::StoreError;

/// Attribute name under which a record stores the node's browse name.
pub const BROWSE_NAME_ATTRIBUTE: &str = "browseName";

/// Serialized attribute values by name.
pub type AttributeMap = BTreeMap<String, Value>;

/// One outgoing non-structural edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardReference {
    pub target: NodeId,
    /// Type name of the target when the edge was recorded.
    pub target_type: String,
    pub kind: ReferenceKind,
}

/// Everything a backend stores for one node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedNode {
    pub type_name: String,
    pub attrs: AttributeMap,
    #[serde(default)]
    pub forward_refs: Vec<ForwardReference>,
}

impl SerializedNode {
    /// The recorded browse name, if present and valid.
    pub fn browse_name(&self) -> Option<BrowseName> {
        self.attrs
            .get(BROWSE_NAME_ATTRIBUTE)
            .and_then(Value::as_str)
            .and_then(|s| BrowseName::new(s).ok())
    }
}

/// Errors from the serialization walk and file backends.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("record for {node} has browse name '{found}', expected '{expected}'")]
    BrowseNameMismatch {
        node: NodeId,
        expected: BrowseName,
        found: String,
    },

    #[error("record for {0} has no browse name")]
    MissingBrowseName(NodeId),

    #[error("node {0} is not bound")]
    NodeNotBound(NodeId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unknown serializer provider '{0}'")]
    UnknownProvider(String),

    #[error("serializer provider '{0}' needs a file path")]
    MissingPath(String),
}

/// Backend protocol.
pub trait TreeSerializer {
    /// Store one record. A duplicate key is logged and overwritten; the
    /// write still reports success.
    fn write_instance(
        &mut self,
        id: &NodeId,
        type_name: &str,
        attrs: &AttributeMap,
        forward_refs: &[ForwardReference],
        log: &mut LogQueue,
    ) -> bool;

    /// Fetch one record. A missing key is logged and yields `None`.
    fn read_instance(&self, id: &NodeId, log: &mut LogQueue) -> Option<SerializedNode>;

    fn clear(&mut self);

    /// Persist buffered records. In-memory backends have nothing to do.
    fn flush(&mut self) -> Result<(), SerializeError> {
        Ok(())
    }
}

/// Build a backend by provider name: `"memory"` or `"json"`.
pub fn create_serializer(
    provider: &str,
    path: Option<&Path>,
    config: &Config,
) -> Result<Box<dyn TreeSerializer>, SerializeError> {
    match provider {
        "memory" => Ok(Box::new(MemorySerializer::new())),
        "json" => {
            let path = path.ok_or_else(|| SerializeError::MissingPath(provider.to_string()))?;
            Ok(Box::new(JsonFileSerializer::from_config(path, config)?))
        }
        other => Err(SerializeError::UnknownProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_browse_name() {
        let mut record = SerializedNode::default();
        assert_eq!(record.browse_name(), None);
        record
            .attrs
            .insert(BROWSE_NAME_ATTRIBUTE.into(), Value::from("Sensor1"));
        assert_eq!(record.browse_name().map(|n| n.to_string()), Some("Sensor1".into()));
    }

    #[test]
    fn record_json_shape() {
        let record = SerializedNode {
            type_name: "TemperatureSensor".into(),
            attrs: AttributeMap::from([("value".to_string(), Value::Double(0.5))]),
            forward_refs: vec![ForwardReference {
                target: NodeId::numeric(1, 7),
                target_type: "BaseObjectType".into(),
                kind: ReferenceKind::new("Feeds", "FedBy").unwrap(),
            }],
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["typeName"], "TemperatureSensor");
        assert_eq!(json["attrs"]["value"]["type"], "double");
        assert_eq!(json["forwardRefs"][0]["target"], "ns=1;i=7");
        assert_eq!(json["forwardRefs"][0]["targetType"], "BaseObjectType");

        let back: SerializedNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn factory_providers() {
        let config = Config::default();
        assert!(create_serializer("memory", None, &config).is_ok());
        assert!(matches!(
            create_serializer("json", None, &config),
            Err(SerializeError::MissingPath(_))
        ));
        assert!(matches!(
            create_serializer("xml", None, &config),
            Err(SerializeError::UnknownProvider(_))
        ));
    }
}
