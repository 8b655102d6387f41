//! serializer::memory
//!
//! Map-backed [`TreeSerializer`].

use std::collections::BTreeMap;

use crate::core::log::{LogCategory, LogQueue};
use crate::core::types::NodeId;

use super::{AttributeMap, ForwardReference, SerializedNode, TreeSerializer};

/// Records held in memory, keyed by `NodeId`.
#[derive(Debug, Clone, Default)]
pub struct MemorySerializer {
    records: BTreeMap<NodeId, SerializedNode>,
}

impl MemorySerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_records(records: BTreeMap<NodeId, SerializedNode>) -> Self {
        Self { records }
    }

    pub(crate) fn records(&self) -> &BTreeMap<NodeId, SerializedNode> {
        &self.records
    }

    pub fn get(&self, id: &NodeId) -> Option<&SerializedNode> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut SerializedNode> {
        self.records.get_mut(id)
    }

    /// Move the record stored under `from` to `to`. Returns `false` if
    /// there was no record under `from`.
    pub fn rekey(&mut self, from: &NodeId, to: NodeId) -> bool {
        match self.records.remove(from) {
            Some(record) => {
                self.records.insert(to, record);
                true
            }
            None => false,
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl TreeSerializer for MemorySerializer {
    fn write_instance(
        &mut self,
        id: &NodeId,
        type_name: &str,
        attrs: &AttributeMap,
        forward_refs: &[ForwardReference],
        log: &mut LogQueue,
    ) -> bool {
        if self.records.contains_key(id) {
            log.warning(
                LogCategory::Serialization,
                format!("record for {} already exists; overwriting", id),
            );
        }
        self.records.insert(
            id.clone(),
            SerializedNode {
                type_name: type_name.to_string(),
                attrs: attrs.clone(),
                forward_refs: forward_refs.to_vec(),
            },
        );
        true
    }

    fn read_instance(&self, id: &NodeId, log: &mut LogQueue) -> Option<SerializedNode> {
        let record = self.records.get(id).cloned();
        if record.is_none() {
            log.warning(
                LogCategory::Serialization,
                format!("no record for {}", id),
            );
        }
        record
    }

    fn clear(&mut self) {
        self.records.clear();
    }
}
