//! space::binder
//!
//! Attach wrappers to existing store entries.
//!
//! Binding resolves the entry's registered type (falling back to the
//! generic schema for its node class), binds the structural children the
//! schema names, then binds the entry itself. Children are bound before
//! their parent. If any step fails every wrapper created by the pass is
//! removed again, so a failed bind leaves no partial wrappers behind.

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::core::types::{BrowseName, NodeId, ReferenceKind};
use crate::core::value::Value;
use crate::schema::TypeRegistry;
use crate::store::{browse_all, BrowseTarget, StoreAdapter, StoreError};

use super::{AddressSpace, EdgeHook, Node, WrapperKind};

/// Errors from binding a wrapper to a store entry.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("{node} is missing mandatory child '{child}'")]
    MissingMandatoryChild { node: NodeId, child: String },

    #[error("{node} has more than one child named '{browse_name}'")]
    DuplicateBrowseName {
        node: NodeId,
        browse_name: BrowseName,
    },

    #[error("cannot resolve a wrapper type for {node}: {reason}")]
    UnresolvedChildType { node: NodeId, reason: String },

    #[error("{node} of type '{type_name}' has undeclared children: {}", names.join(", "))]
    UnexpectedChildren {
        node: NodeId,
        type_name: String,
        names: Vec<String>,
    },

    #[error("{node} is already bound as '{type_name}'")]
    AlreadyBound { node: NodeId, type_name: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Bookkeeping for one bind pass.
#[derive(Default)]
struct BindPass {
    fresh: Vec<NodeId>,
    visiting: HashSet<NodeId>,
}

impl<S: StoreAdapter> AddressSpace<S> {
    /// Bind a wrapper to an existing store entry using its registered type.
    ///
    /// Binding an already-bound entry returns the existing wrapper.
    pub fn bind(&mut self, id: &NodeId) -> Result<&Node, BindError> {
        self.bind_node(id, None)?;
        self.node(id).ok_or_else(|| BindError::NodeNotFound(id.clone()))
    }

    /// Bind `id` with the schema of `type_name` instead of the entry's
    /// own type. The entry's type must derive from `type_name` when it is
    /// registered.
    pub fn bind_as(&mut self, id: &NodeId, type_name: &str) -> Result<&Node, BindError> {
        self.bind_node(id, Some(type_name))?;
        self.node(id).ok_or_else(|| BindError::NodeNotFound(id.clone()))
    }

    pub(crate) fn bind_node(&mut self, id: &NodeId, forced: Option<&str>) -> Result<(), BindError> {
        if let Some(node) = self.node(id) {
            return match forced {
                Some(t) if t != node.type_name() => Err(BindError::AlreadyBound {
                    node: id.clone(),
                    type_name: node.type_name().to_string(),
                }),
                _ => Ok(()),
            };
        }

        let mut pass = BindPass::default();
        let result = self.bind_recursive(id, forced, &mut pass);
        if result.is_err() {
            for fresh in pass.fresh.iter().rev() {
                self.unbind_quietly(fresh);
            }
        }
        result
    }

    /// Remove a wrapper that was never announced to subscribers.
    fn unbind_quietly(&mut self, id: &NodeId) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        if self.store.exists(id) {
            let _ = self.store.set_context(id, None);
        }
        for hook in &node.edge_hooks {
            if let Some(peer) = self.nodes.get_mut(&hook.peer) {
                peer.edge_hooks.retain(|h| h.peer != *id);
            }
        }
        if let Some(parent) = node.parent.as_ref().and_then(|p| self.nodes.get_mut(p)) {
            parent.children.remove(&node.browse_name);
        }
    }

    fn resolve_wrapper(
        &self,
        id: &NodeId,
        forced: Option<&str>,
    ) -> Result<(String, WrapperKind), BindError> {
        let unresolved = |reason: String| BindError::UnresolvedChildType {
            node: id.clone(),
            reason,
        };

        let node_class = self.store.node_class(id)?;
        if !node_class.is_instance() {
            return Err(unresolved(format!("{} nodes are not wrapped", node_class)));
        }
        let store_type = self.store.type_definition(id)?;

        let (type_name, wrapper) = match forced {
            Some(forced) => {
                if !self.registry.contains(forced) {
                    return Err(unresolved(format!("type '{}' is not registered", forced)));
                }
                if let Some(own) = store_type.as_deref().filter(|t| self.registry.contains(t)) {
                    if !self.registry.is_subtype_of(own, forced) {
                        return Err(unresolved(format!(
                            "'{}' does not derive from '{}'",
                            own, forced
                        )));
                    }
                }
                (forced.to_string(), WrapperKind::Typed)
            }
            None => match store_type.filter(|t| self.registry.contains(t)) {
                Some(own) => (own, WrapperKind::Typed),
                None => {
                    let generic = TypeRegistry::generic_type_for(node_class).ok_or_else(|| {
                        unresolved(format!("no generic wrapper for {} nodes", node_class))
                    })?;
                    (generic.to_string(), WrapperKind::Generic)
                }
            },
        };

        let schema_class = self.registry.get(&type_name).map(|s| s.node_class());
        if schema_class != Some(node_class) {
            return Err(unresolved(format!(
                "'{}' does not describe {} nodes",
                type_name, node_class
            )));
        }
        Ok((type_name, wrapper))
    }

    fn bind_recursive(
        &mut self,
        id: &NodeId,
        forced: Option<&str>,
        pass: &mut BindPass,
    ) -> Result<(), BindError> {
        if self.is_bound(id) || !pass.visiting.insert(id.clone()) {
            return Ok(());
        }
        if !self.store.exists(id) {
            return Err(BindError::NodeNotFound(id.clone()));
        }
        // A wrapper whose context no longer matches belongs to a replaced
        // entry; its edge hooks must leave the peers before rebinding.
        if self.nodes.contains_key(id) {
            log::debug!("tearing down stale wrapper for {}", id);
            self.teardown(id);
        }

        let (type_name, wrapper) = self.resolve_wrapper(id, forced)?;
        let node_class = self.store.node_class(id)?;
        let browse_name = self.store.browse_name(id)?;

        let max_pages = self.max_pages();
        let mut by_name: BTreeMap<BrowseName, NodeId> = BTreeMap::new();
        for child in browse_all(&mut self.store, id, BrowseTarget::Children, max_pages)? {
            let name = self.store.browse_name(&child)?;
            if by_name.contains_key(&name) {
                return Err(BindError::DuplicateBrowseName {
                    node: id.clone(),
                    browse_name: name,
                });
            }
            by_name.insert(name, child);
        }

        match wrapper {
            WrapperKind::Typed => self.bind_declared_children(id, &type_name, &by_name, pass)?,
            WrapperKind::Generic => {
                for child in by_name.values() {
                    self.bind_recursive(child, None, pass)?;
                }
            }
        }

        let context = self.allocate_context();
        self.store.set_context(id, Some(context))?;
        let children: BTreeMap<BrowseName, NodeId> = by_name
            .into_iter()
            .filter(|(_, child)| self.nodes.contains_key(child))
            .collect();
        for child in children.values() {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent = Some(id.clone());
            }
        }
        self.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                type_name: type_name.clone(),
                wrapper,
                node_class,
                browse_name,
                parent: None,
                children,
                edge_hooks: Vec::new(),
                context,
            },
        );
        pass.fresh.push(id.clone());

        if let Some(parent) = self.store.parent(id)? {
            if self.is_bound(&parent) {
                self.attach_child(&parent, id);
            }
        }
        self.wire_edges(id)?;
        self.apply_defaults(id, &type_name)?;

        log::trace!("bound {} as '{}' ({:?})", id, type_name, wrapper);
        Ok(())
    }

    fn bind_declared_children(
        &mut self,
        id: &NodeId,
        type_name: &str,
        by_name: &BTreeMap<BrowseName, NodeId>,
        pass: &mut BindPass,
    ) -> Result<(), BindError> {
        let mut required: Vec<(String, String)> = Vec::new();
        let members = self.registry.effective_members(type_name).map_err(|e| {
            BindError::UnresolvedChildType {
                node: id.clone(),
                reason: e.to_string(),
            }
        })?;
        for member in members {
            if let Some(child_type) = member.child_type() {
                required.push((member.name.clone(), child_type.to_string()));
            }
        }
        if let Ok(declared) = self.registry.mandatory_children(type_name) {
            for decl in declared {
                required.push((decl.name.clone(), decl.type_name.clone()));
            }
        }

        let mut handled: HashSet<&BrowseName> = HashSet::new();
        for (name, child_type) in &required {
            let child = by_name
                .iter()
                .find(|(n, _)| n.as_str() == name)
                .map(|(n, c)| (n, c.clone()));
            let Some((child_name, child)) = child else {
                return Err(BindError::MissingMandatoryChild {
                    node: id.clone(),
                    child: name.clone(),
                });
            };
            handled.insert(child_name);

            self.bind_recursive(&child, None, pass)?;
            let bound_type = self.nodes.get(&child).map(|n| n.type_name.clone());
            match bound_type {
                Some(bound) if self.registry.is_subtype_of(&bound, child_type) => {}
                Some(bound) => {
                    return Err(BindError::UnresolvedChildType {
                        node: child,
                        reason: format!("'{}' does not derive from '{}'", bound, child_type),
                    })
                }
                None => return Err(BindError::NodeNotFound(child)),
            }
        }

        let extensible = self
            .registry
            .get(type_name)
            .map_or(false, |s| s.is_extensible());
        let mut unexpected = Vec::new();
        for (name, child) in by_name {
            if handled.contains(name) {
                continue;
            }
            if extensible || self.registry.declares_optional_child(type_name, name.as_str()) {
                self.bind_recursive(child, None, pass)?;
            } else {
                unexpected.push(name.to_string());
            }
        }
        if !unexpected.is_empty() {
            return Err(BindError::UnexpectedChildren {
                node: id.clone(),
                type_name: type_name.to_string(),
                names: unexpected,
            });
        }
        Ok(())
    }

    /// Record hooks for store edges between `id` and other bound nodes.
    fn wire_edges(&mut self, id: &NodeId) -> Result<(), StoreError> {
        let max_pages = self.max_pages();
        for kind in self.reference_kinds.clone() {
            for forward in [true, false] {
                let target = BrowseTarget::References {
                    kind: &kind,
                    forward,
                };
                for peer in browse_all(&mut self.store, id, target, max_pages)? {
                    if peer == *id || !self.is_bound(&peer) {
                        continue;
                    }
                    self.push_hook(id, &kind, &peer, forward);
                    self.push_hook(&peer, &kind, id, !forward);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn push_hook(
        &mut self,
        node: &NodeId,
        kind: &ReferenceKind,
        peer: &NodeId,
        forward: bool,
    ) {
        let hook = EdgeHook {
            kind: kind.clone(),
            peer: peer.clone(),
            forward,
        };
        if let Some(node) = self.nodes.get_mut(node) {
            if !node.edge_hooks.contains(&hook) {
                node.edge_hooks.push(hook);
            }
        }
    }

    /// Write schema defaults into attributes that are still unset.
    fn apply_defaults(&mut self, id: &NodeId, type_name: &str) -> Result<(), StoreError> {
        let defaults: Vec<(String, Value)> = self
            .registry
            .effective_members(type_name)
            .map(|members| {
                members
                    .into_iter()
                    .filter_map(|m| m.default_value().map(|v| (m.name.clone(), v.clone())))
                    .collect()
            })
            .unwrap_or_default();

        for (name, value) in defaults {
            if self.store.read_attribute(id, &name)?.is_null() {
                self.store.write_attribute(id, &name, value)?;
            }
        }
        if self.store.read_attribute(id, "displayName")?.is_null() {
            let name = self.store.browse_name(id)?;
            self.store
                .write_attribute(id, "displayName", Value::String(name.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ModellingRule, NodeClass};
    use crate::core::value::ValueType;
    use crate::schema::TypeSchema;
    use crate::store::{CreateNode, MemoryStore};

    fn name(s: &str) -> BrowseName {
        BrowseName::new(s).unwrap()
    }

    fn space() -> AddressSpace<MemoryStore> {
        let mut space = AddressSpace::in_memory().unwrap();
        space
            .register_type(
                TypeSchema::object_type("Pump")
                    .value("speed", ValueType::Double)
                    .child("Motor", "BaseObjectType")
                    .optional_child("Filter", "BaseObjectType")
                    .build(),
            )
            .unwrap();
        space
    }

    fn raw_object(space: &mut AddressSpace<MemoryStore>, parent: &NodeId, browse: &str, type_name: &str) -> NodeId {
        space
            .store_mut()
            .create_node(CreateNode::instance(NodeClass::Object, name(browse), parent.clone(), type_name))
            .unwrap()
    }

    #[test]
    fn binds_store_created_entry() {
        let mut space = space();
        let objects = space.objects_folder().clone();
        let pump = raw_object(&mut space, &objects, "P1", "Pump");

        let node = space.bind(&pump).unwrap();
        assert_eq!(node.type_name(), "Pump");
        assert_eq!(node.wrapper(), WrapperKind::Typed);
        assert_eq!(node.parent(), Some(&objects));

        let motor = node.cached_child(&name("Motor")).cloned().unwrap();
        assert!(space.is_bound(&motor));
        assert_eq!(
            space.store().read_attribute(&pump, "displayName").unwrap(),
            Value::from("P1")
        );
    }

    #[test]
    fn unregistered_type_binds_generic() {
        let mut space = space();
        let objects = space.objects_folder().clone();
        let id = raw_object(&mut space, &objects, "Mystery", "VendorWidget");

        let node = space.bind(&id).unwrap();
        assert!(node.is_generic());
        assert_eq!(node.type_name(), "BaseObjectType");
    }

    #[test]
    fn missing_mandatory_child_fails_cleanly() {
        let mut space = space();
        let objects = space.objects_folder().clone();
        let pump = raw_object(&mut space, &objects, "P1", "Pump");
        let motor = space
            .store_mut()
            .browse_children(&pump, None)
            .unwrap()
            .ids
            .remove(0);
        space.store_mut().delete_node(&motor, true).unwrap();

        let before = space.bound_count();
        let err = space.bind(&pump).unwrap_err();
        assert!(matches!(err, BindError::MissingMandatoryChild { ref child, .. } if child == "Motor"));
        assert_eq!(space.bound_count(), before);
        assert_eq!(space.store().context(&pump), None);
    }

    #[test]
    fn undeclared_child_rejected_unless_optional() {
        let mut space = space();
        let objects = space.objects_folder().clone();
        let pump = raw_object(&mut space, &objects, "P1", "Pump");
        raw_object(&mut space, &pump, "Filter", "BaseObjectType");
        assert!(space.bind(&pump).is_ok());

        let other = raw_object(&mut space, &objects, "P2", "Pump");
        raw_object(&mut space, &other, "Stray", "BaseObjectType");
        let err = space.bind(&other).unwrap_err();
        assert!(matches!(err, BindError::UnexpectedChildren { ref names, .. } if names.len() == 1 && names[0] == "Stray"));
    }

    #[test]
    fn bind_as_requires_ancestor() {
        let mut space = space();
        let objects = space.objects_folder().clone();
        let pump = raw_object(&mut space, &objects, "P1", "Pump");

        let err = space.bind_as(&pump, "FolderType").unwrap_err();
        assert!(matches!(err, BindError::UnresolvedChildType { .. }));

        let node = space.bind_as(&pump, "BaseObjectType").unwrap();
        assert_eq!(node.type_name(), "BaseObjectType");
        assert!(matches!(
            space.bind_as(&pump, "Pump"),
            Err(BindError::AlreadyBound { .. })
        ));
    }

    #[test]
    fn type_nodes_are_not_wrapped() {
        let mut space = space();
        let type_node = space.store().type_node("Pump").unwrap();
        assert!(matches!(
            space.bind(&type_node),
            Err(BindError::UnresolvedChildType { .. })
        ));
    }

    #[test]
    fn declarations_carry_modelling_rules() {
        let mut space = space();
        let type_node = space.store().type_node("Pump").unwrap();
        let decls = space.store_mut().browse_children(&type_node, None).unwrap().ids;
        let rules: Vec<_> = decls
            .iter()
            .map(|d| space.store().read_modelling_rule(d).unwrap())
            .collect();
        assert_eq!(rules, [ModellingRule::Mandatory, ModellingRule::Optional]);
    }
}
