//! serializer::tree
//!
//! Walk bound subtrees into and out of a [`TreeSerializer`].
//!
//! Serialization is pre-order over structural children. Each record holds
//! the node's browse name, every writable value member of a representable
//! type, and the node's outgoing edges of every registered reference kind.
//! Deserialization matches records by `NodeId`, insists that the recorded
//! browse name matches, and writes back what it can; anything else is
//! logged and skipped. Edges are not restored by deserialization; callers
//! re-apply [`SerializedNode::forward_refs`] through
//! [`AddressSpace::apply_forward_references`].

use crate::core::log::{LogCategory, LogQueue};
use crate::core::types::NodeId;
use crate::core::value::Value;
use crate::space::{AddressSpace, MemberError, ReferenceError};
use crate::store::StoreAdapter;

use super::{AttributeMap, SerializeError, TreeSerializer, BROWSE_NAME_ATTRIBUTE};

fn from_reference_error(id: &NodeId, err: ReferenceError) -> SerializeError {
    match err {
        ReferenceError::Store(e) => SerializeError::Store(e),
        _ => SerializeError::NodeNotBound(id.clone()),
    }
}

impl<S: StoreAdapter> AddressSpace<S> {
    /// Names of the members a record carries for `type_name`.
    fn serializable_members(&self, type_name: &str) -> Vec<String> {
        self.registry()
            .effective_members(type_name)
            .map(|members| {
                members
                    .into_iter()
                    .filter(|m| m.is_serializable())
                    .map(|m| m.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The attribute map of one bound node.
    pub fn attribute_map(&self, id: &NodeId) -> Result<AttributeMap, SerializeError> {
        let node = self
            .node(id)
            .ok_or_else(|| SerializeError::NodeNotBound(id.clone()))?;

        let mut attrs = AttributeMap::new();
        attrs.insert(
            BROWSE_NAME_ATTRIBUTE.to_string(),
            Value::String(node.browse_name().to_string()),
        );
        for member in self.serializable_members(node.type_name()) {
            let value = self.store().read_attribute(id, &member)?;
            attrs.insert(member, value);
        }
        Ok(attrs)
    }

    /// Write the record for `id` alone.
    pub fn serialize_node<B: TreeSerializer + ?Sized>(
        &mut self,
        id: &NodeId,
        backend: &mut B,
        log: &mut LogQueue,
    ) -> Result<(), SerializeError> {
        let type_name = self
            .type_definition(id)
            .ok_or_else(|| SerializeError::NodeNotBound(id.clone()))?
            .to_string();
        let attrs = self.attribute_map(id)?;
        let refs = self
            .forward_references(id)
            .map_err(|e| from_reference_error(id, e))?;
        backend.write_instance(id, &type_name, &attrs, &refs, log);
        Ok(())
    }

    /// Write records for `id` and every bound node below it, parents first.
    pub fn serialize<B: TreeSerializer + ?Sized>(
        &mut self,
        id: &NodeId,
        backend: &mut B,
        log: &mut LogQueue,
    ) -> Result<usize, SerializeError> {
        let mut written = 0;
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            self.serialize_node(&current, backend, log)?;
            written += 1;
            let children = self.children(&current)?;
            stack.extend(children.into_iter().rev());
        }
        log::debug!("serialized {} nodes from {}", written, id);
        Ok(written)
    }

    /// Restore the record for `id` alone. Returns `Ok(false)` when the
    /// backend has no record for it.
    pub fn deserialize_node<B: TreeSerializer + ?Sized>(
        &mut self,
        id: &NodeId,
        backend: &B,
        log: &mut LogQueue,
    ) -> Result<bool, SerializeError> {
        let node = self
            .node(id)
            .ok_or_else(|| SerializeError::NodeNotBound(id.clone()))?;
        let expected = node.browse_name().clone();
        let type_name = node.type_name().to_string();

        let Some(record) = backend.read_instance(id, log) else {
            return Ok(false);
        };

        let found = record
            .attrs
            .get(BROWSE_NAME_ATTRIBUTE)
            .ok_or_else(|| SerializeError::MissingBrowseName(id.clone()))?;
        if found.as_str() != Some(expected.as_str()) {
            return Err(SerializeError::BrowseNameMismatch {
                node: id.clone(),
                expected,
                found: found
                    .as_str()
                    .map_or_else(|| found.to_string(), str::to_string),
            });
        }

        let members = self.serializable_members(&type_name);
        for (name, value) in &record.attrs {
            if name == BROWSE_NAME_ATTRIBUTE {
                continue;
            }
            if !members.contains(name) {
                log.warning(
                    LogCategory::Serialization,
                    format!("{} ({}): unknown attribute '{}'", expected, id, name),
                );
                continue;
            }
            if value.is_null() {
                continue;
            }
            match self.write_member(id, name, value.clone()) {
                Ok(()) => {}
                Err(MemberError::Store(e)) => return Err(e.into()),
                Err(err) => log.warning(
                    LogCategory::Serialization,
                    format!("{} ({}): cannot restore '{}': {}", expected, id, name, err),
                ),
            }
        }
        for member in members.iter().filter(|m| !record.attrs.contains_key(*m)) {
            log.warning(
                LogCategory::Serialization,
                format!("{} ({}): record has no attribute '{}'", expected, id, member),
            );
        }
        Ok(true)
    }

    /// Restore `id` and every bound node below it, parents first. Nodes
    /// without a record are skipped and their children still visited.
    pub fn deserialize<B: TreeSerializer + ?Sized>(
        &mut self,
        id: &NodeId,
        backend: &B,
        log: &mut LogQueue,
    ) -> Result<usize, SerializeError> {
        let mut restored = 0;
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            if self.deserialize_node(&current, backend, log)? {
                restored += 1;
            }
            let children = self.children(&current)?;
            stack.extend(children.into_iter().rev());
        }
        log::debug!("deserialized {} nodes under {}", restored, id);
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log::LogLevel;
    use crate::core::types::BrowseName;
    use crate::core::value::ValueType;
    use crate::schema::TypeSchema;
    use crate::serializer::MemorySerializer;
    use crate::store::MemoryStore;

    fn space() -> (AddressSpace<MemoryStore>, NodeId) {
        let mut space = AddressSpace::in_memory().unwrap();
        space
            .register_type(
                TypeSchema::object_type("Tank")
                    .value_with_default("level", ValueType::Double, Value::Double(0.0))
                    .read_only("capacity", ValueType::Double)
                    .value("blob", ValueType::Opaque)
                    .child("Inlet", "BaseDataVariableType")
                    .build(),
            )
            .unwrap();
        let objects = space.objects_folder().clone();
        let tank = space.create_instance("Tank", &objects, "Tank1", None).unwrap();
        (space, tank)
    }

    #[test]
    fn attribute_map_contents() {
        let (space, tank) = space();
        let attrs = space.attribute_map(&tank).unwrap();
        let names: Vec<_> = attrs.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            ["browseName", "description", "displayName", "level", "writeMask"]
        );
        assert_eq!(attrs["browseName"], Value::from("Tank1"));
    }

    #[test]
    fn serialize_is_pre_order() {
        let (mut space, tank) = space();
        let mut backend = MemorySerializer::new();
        let mut log = LogQueue::new();
        assert_eq!(space.serialize(&tank, &mut backend, &mut log).unwrap(), 2);

        let inlet = space
            .browse_child(&tank, &BrowseName::new("Inlet").unwrap())
            .unwrap();
        assert_eq!(backend.get(&inlet).unwrap().type_name, "BaseDataVariableType");
        assert!(log.is_empty());
    }

    #[test]
    fn deserialize_restores_writable_members() {
        let (mut space, tank) = space();
        let mut backend = MemorySerializer::new();
        let mut log = LogQueue::new();
        space.serialize(&tank, &mut backend, &mut log).unwrap();

        space.write_member(&tank, "level", 7.5).unwrap();
        space.initialize_member(&tank, "capacity", 100.0).unwrap();
        assert_eq!(space.deserialize(&tank, &backend, &mut log).unwrap(), 2);

        assert_eq!(space.read_member(&tank, "level").unwrap(), Value::Double(0.0));
        assert_eq!(space.read_member(&tank, "capacity").unwrap(), Value::Double(100.0));
        assert!(log.is_empty());
    }

    #[test]
    fn browse_name_mismatch_is_fatal() {
        let (mut space, tank) = space();
        let mut backend = MemorySerializer::new();
        let mut log = LogQueue::new();
        space.serialize_node(&tank, &mut backend, &mut log).unwrap();
        backend
            .get_mut(&tank)
            .unwrap()
            .attrs
            .insert(BROWSE_NAME_ATTRIBUTE.into(), Value::from("Other"));

        assert!(matches!(
            space.deserialize_node(&tank, &backend, &mut log),
            Err(SerializeError::BrowseNameMismatch { .. })
        ));
    }

    #[test]
    fn drift_is_logged_not_fatal() {
        let (mut space, tank) = space();
        let mut backend = MemorySerializer::new();
        let mut log = LogQueue::new();
        space.serialize_node(&tank, &mut backend, &mut log).unwrap();
        let record = backend.get_mut(&tank).unwrap();
        record.attrs.insert("legacy".into(), Value::from(1_i64));
        record.attrs.remove("description");
        record.attrs.insert("level".into(), Value::from("full"));

        assert!(space.deserialize_node(&tank, &backend, &mut log).unwrap());
        assert_eq!(log.count_at_least(LogLevel::Warning), 3);
        assert_eq!(log.in_category(LogCategory::Serialization).count(), 3);
    }

    #[test]
    fn missing_record_continues_into_children() {
        let (mut space, tank) = space();
        let inlet = space
            .browse_child(&tank, &BrowseName::new("Inlet").unwrap())
            .unwrap();
        let mut backend = MemorySerializer::new();
        let mut log = LogQueue::new();
        space.serialize_node(&inlet, &mut backend, &mut log).unwrap();

        assert_eq!(space.deserialize(&tank, &backend, &mut log).unwrap(), 1);
        assert_eq!(log.len(), 1);
    }
}
