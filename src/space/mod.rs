//! space
//!
//! The address space: typed wrappers kept in sync with store entries.
//!
//! # Architecture
//!
//! [`AddressSpace`] owns the store adapter, the type registry and the
//! binding registry (`NodeId` to [`Node`]). A wrapper exists for an entry
//! exactly while the entry's context slot holds the wrapper's handle; the
//! store lifecycle decides wrapper lifetime and [`AddressSpace::invalidate`]
//! is the explicit hook for entries removed behind the space's back.
//!
//! Submodules extend `AddressSpace` with one concern each:
//!
//! - [`binder`] - Bind wrappers to entries, wiring structural children
//! - [`references`] - Add, remove and find non-structural edges
//! - [`optional`] - Materialize optional children and methods
//! - [`clone`] - Duplicate one node's state under a new identity
//! - [`typed`] - Strongly-typed wrapper handles
//!
//! # Invariants
//!
//! - At most one live wrapper per `NodeId`
//! - A bound node's structural children named by its schema are bound
//! - Every non-structural edge between two bound nodes is recorded as a
//!   hook on both wrappers; tearing down either wrapper notifies the other
//! - All mutation goes through `&mut self`; nothing here is `Send`
//!
//! # Example
//!
//! ```
//! use nodebind::core::value::{Value, ValueType};
//! use nodebind::schema::TypeSchema;
//! use nodebind::space::AddressSpace;
//!
//! let mut space = AddressSpace::in_memory().unwrap();
//! space
//!     .register_type(
//!         TypeSchema::object_type("TemperatureSensor")
//!             .value_with_default("value", ValueType::Double, Value::Double(0.0))
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let objects = space.objects_folder().clone();
//! let sensor = space
//!     .create_instance("TemperatureSensor", &objects, "Sensor1", None)
//!     .unwrap();
//! space.write_member(&sensor, "value", 21.5).unwrap();
//! assert_eq!(space.read_member(&sensor, "value").unwrap(), Value::Double(21.5));
//! ```

pub mod binder;
pub mod clone;
pub mod optional;
pub mod references;
pub mod typed;

pub use binder::BindError;
pub use clone::{CloneError, CloneOptions};
pub use optional::MaterializeError;
pub use references::ReferenceError;
pub use typed::{BaseDataVariable, BaseObject, Folder, NodeType, Property, TypeDefinition};

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::core::config::Config;
use crate::core::events::{ChangeVerb, EventBus, ModelChange, NodeEvent, SubscriptionId};
use crate::core::types::{BrowseName, ModellingRule, NodeClass, NodeId, ReferenceKind, TypeError};
use crate::core::value::{Value, ValueError, ValueType};
use crate::schema::{SchemaError, TypeRegistry, TypeSchema};
use crate::store::{
    browse_all, BrowseTarget, ContextHandle, CreateNode, MemoryStore, StoreAdapter, StoreError,
};

/// Errors from type registration.
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    InvalidName(#[from] TypeError),
}

/// Errors from instance creation.
#[derive(Debug, Error)]
pub enum InstantiateError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("type '{0}' is abstract and cannot be instantiated")]
    AbstractType(String),

    #[error("parent {0} is not bound")]
    ParentNotBound(NodeId),

    #[error("'{browse_name}' already exists under {parent}")]
    DuplicateBrowseName {
        parent: NodeId,
        browse_name: BrowseName,
    },

    #[error(transparent)]
    InvalidName(#[from] TypeError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from member reads and writes.
#[derive(Debug, Error)]
pub enum MemberError {
    #[error("node {0} is not bound")]
    NodeNotBound(NodeId),

    #[error("{node} has no member '{member}'")]
    UnknownMember { node: NodeId, member: String },

    #[error("member '{member}' of {node} is a child node, not a value")]
    NotAValueMember { node: NodeId, member: String },

    #[error("member '{member}' of {node} is read-only")]
    ReadOnly { node: NodeId, member: String },

    #[error("member '{member}' of {node}: {source}")]
    TypeMismatch {
        node: NodeId,
        member: String,
        source: ValueError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a wrapper was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperKind {
    /// Bound with the schema of the entry's registered type.
    Typed,
    /// The entry's type is unknown to the registry; bound with the
    /// generic schema for its node class.
    Generic,
}

/// Destruction hook for one half of a non-structural edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EdgeHook {
    pub(crate) kind: ReferenceKind,
    pub(crate) peer: NodeId,
    pub(crate) forward: bool,
}

/// A wrapper bound to one store entry.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    type_name: String,
    wrapper: WrapperKind,
    node_class: NodeClass,
    browse_name: BrowseName,
    parent: Option<NodeId>,
    children: BTreeMap<BrowseName, NodeId>,
    pub(crate) edge_hooks: Vec<EdgeHook>,
    context: ContextHandle,
}

impl Node {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Name of the schema the wrapper was bound with.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn wrapper(&self) -> WrapperKind {
        self.wrapper
    }

    pub fn is_generic(&self) -> bool {
        self.wrapper == WrapperKind::Generic
    }

    pub fn node_class(&self) -> NodeClass {
        self.node_class
    }

    pub fn browse_name(&self) -> &BrowseName {
        &self.browse_name
    }

    /// Structural parent wrapper, if bound.
    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    /// Cached structural child by browse name.
    pub fn cached_child(&self, name: &BrowseName) -> Option<&NodeId> {
        self.children.get(name)
    }

    pub fn cached_children(&self) -> impl Iterator<Item = (&BrowseName, &NodeId)> {
        self.children.iter()
    }

    /// Number of non-structural edge halves this wrapper tracks.
    pub fn edge_count(&self) -> usize {
        self.edge_hooks.len()
    }
}

/// Typed view over a store.
///
/// Structural edits append to an internal model-change buffer that is
/// never trimmed on its own. Long-running callers must drain it with
/// [`AddressSpace::take_model_changes`] after each batch of edits.
pub struct AddressSpace<S: StoreAdapter> {
    store: S,
    registry: TypeRegistry,
    nodes: HashMap<NodeId, Node>,
    reference_kinds: Vec<ReferenceKind>,
    events: EventBus,
    model_changes: Vec<ModelChange>,
    config: Config,
    objects: NodeId,
    next_context: u64,
}

impl<S: StoreAdapter + std::fmt::Debug> std::fmt::Debug for AddressSpace<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressSpace")
            .field("store", &self.store)
            .field("bound", &self.nodes.len())
            .field("reference_kinds", &self.reference_kinds)
            .field("events", &self.events)
            .finish()
    }
}

impl AddressSpace<MemoryStore> {
    /// Address space over a fresh [`MemoryStore`] with default config.
    pub fn in_memory() -> Result<Self, RegisterError> {
        let config = Config::default();
        Self::with_config(MemoryStore::new(&config), config)
    }
}

impl<S: StoreAdapter> AddressSpace<S> {
    pub fn new(store: S) -> Result<Self, RegisterError> {
        Self::with_config(store, Config::default())
    }

    /// Wrap `store`, creating type nodes for the built-in types and
    /// binding the `Objects` folder.
    pub fn with_config(store: S, config: Config) -> Result<Self, RegisterError> {
        let mut space = Self {
            store,
            registry: TypeRegistry::with_builtins(),
            nodes: HashMap::new(),
            reference_kinds: Vec::new(),
            events: EventBus::new(),
            model_changes: Vec::new(),
            config,
            objects: NodeId::objects_folder(),
            next_context: 1,
        };

        let builtins: Vec<String> = space.registry.names().map(str::to_string).collect();
        for name in builtins {
            space.ensure_type_node(&name)?;
        }

        let objects = space.objects.clone();
        space.bind_node(&objects, None)?;
        Ok(space)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access. Changes made here bypass the wrappers; call
    /// [`invalidate`](Self::invalidate) or [`sweep`](Self::sweep) after
    /// removing entries.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn objects_folder(&self) -> &NodeId {
        &self.objects
    }

    pub(crate) fn max_pages(&self) -> usize {
        self.config.max_pages()
    }

    /// The live wrapper for `id`.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        let node = self.nodes.get(id)?;
        (self.store.context(id) == Some(node.context)).then_some(node)
    }

    pub fn is_bound(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn bound_count(&self) -> usize {
        self.nodes.len()
    }

    // =========================================================================
    // Type registration
    // =========================================================================

    /// Register a schema and create its type node and instance
    /// declarations in the store.
    pub fn register_type(&mut self, schema: TypeSchema) -> Result<(), RegisterError> {
        let name = schema.name().to_string();
        self.registry.register(schema)?;
        if let Err(err) = self.ensure_type_node(&name) {
            self.registry.remove(&name);
            return Err(err);
        }
        Ok(())
    }

    /// Register the schema supplied by a typed wrapper.
    pub fn register<T: TypeDefinition>(&mut self) -> Result<(), RegisterError> {
        self.register_type(T::schema())
    }

    fn ensure_type_node(&mut self, name: &str) -> Result<(), RegisterError> {
        if let Some(existing) = self.store.type_node(name) {
            self.registry.set_type_node(name, existing);
            return Ok(());
        }

        let schema = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))?;
        let request = CreateNode::type_node(
            schema.type_node_class(),
            BrowseName::new(name)?,
            schema.supertype().map(str::to_string),
        );
        let type_id = self.store.create_node(request)?;

        if let Err(err) = self.declare_members(&type_id, &schema) {
            let _ = self.store.delete_node(&type_id, true);
            return Err(err);
        }
        self.registry.set_type_node(name, type_id);
        Ok(())
    }

    fn declare_members(&mut self, type_id: &NodeId, schema: &TypeSchema) -> Result<(), RegisterError> {
        let mut children: Vec<(&str, &str, ModellingRule)> = Vec::new();
        for member in schema.members() {
            if let Some(child_type) = member.child_type() {
                children.push((member.name.as_str(), child_type, ModellingRule::Mandatory));
            }
        }
        for decl in schema.mandatory_children() {
            children.push((decl.name.as_str(), decl.type_name.as_str(), ModellingRule::Mandatory));
        }
        for decl in schema.optional_children() {
            children.push((decl.name.as_str(), decl.type_name.as_str(), ModellingRule::Optional));
        }

        for (name, child_type, rule) in children {
            let node_class = self
                .registry
                .get(child_type)
                .map(|s| s.node_class())
                .ok_or_else(|| SchemaError::UnknownType(child_type.to_string()))?;
            let request =
                CreateNode::instance(node_class, BrowseName::new(name)?, type_id.clone(), child_type)
                    .with_rule(rule);
            self.store.create_node(request)?;
        }

        for method in schema.methods() {
            let rule = if method.optional {
                ModellingRule::Optional
            } else {
                ModellingRule::Mandatory
            };
            let request =
                CreateNode::method(BrowseName::new(method.name.as_str())?, type_id.clone()).with_rule(rule);
            self.store.create_node(request)?;
        }
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create an instance of `type_name` under `parent` and bind it.
    ///
    /// The store creates the type's mandatory children; they are bound
    /// before the instance. On a binding failure the entry is removed
    /// again.
    pub fn create_instance(
        &mut self,
        type_name: &str,
        parent: &NodeId,
        browse_name: &str,
        node_id: Option<NodeId>,
    ) -> Result<NodeId, InstantiateError> {
        let browse_name = BrowseName::new(browse_name)?;
        let schema = self
            .registry
            .get(type_name)
            .ok_or_else(|| SchemaError::UnknownType(type_name.to_string()))?;
        if schema.is_abstract() {
            return Err(InstantiateError::AbstractType(type_name.to_string()));
        }
        let node_class = schema.node_class();

        if !self.is_bound(parent) {
            return Err(InstantiateError::ParentNotBound(parent.clone()));
        }
        if self.find_child(parent, &browse_name)?.is_some() {
            return Err(InstantiateError::DuplicateBrowseName {
                parent: parent.clone(),
                browse_name,
            });
        }

        let request = CreateNode::instance(node_class, browse_name, parent.clone(), type_name)
            .with_id(node_id);
        let id = self.store.create_node(request)?;
        if let Err(err) = self.bind_node(&id, None) {
            let _ = self.store.delete_node(&id, true);
            return Err(err.into());
        }

        self.record_change(&id, ChangeVerb::NodeAdded);
        self.events.publish(&NodeEvent::ChildAdded {
            parent: parent.clone(),
            child: id.clone(),
        });
        log::debug!("created {} '{}' of type '{}'", id, self.label(&id), type_name);
        Ok(id)
    }

    /// Delete `id` and its subtree from the store, tearing down every
    /// wrapper involved.
    ///
    /// Returns `Ok(false)` when the entry was already gone; any stale
    /// wrapper is still torn down.
    pub fn delete_node(&mut self, id: &NodeId) -> Result<bool, StoreError> {
        if *id == self.objects {
            return Err(StoreError::InvalidRequest(
                "the Objects folder cannot be deleted".into(),
            ));
        }
        if !self.store.exists(id) {
            self.invalidate(id);
            return Ok(false);
        }

        let parent = match self.nodes.get(id).and_then(|n| n.parent.clone()) {
            Some(parent) => Some(parent),
            None => self.store.parent(id)?,
        };
        if self.nodes.contains_key(id) {
            self.store.set_context(id, None)?;
        }

        let removed = self.store.delete_node(id, true)?;
        for removed_id in &removed {
            self.teardown(removed_id);
        }
        if let Some(parent) = parent {
            self.record_change(&parent, ChangeVerb::ReferenceDeleted);
        }
        log::debug!("deleted {} ({} entries)", id, removed.len());
        Ok(true)
    }

    /// Tear down the wrapper for `id` and every bound descendant without
    /// touching the store's entries. Returns the number of wrappers
    /// removed.
    pub fn invalidate(&mut self, id: &NodeId) -> usize {
        let mut doomed = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children.values().cloned());
                doomed.push(current);
            }
        }
        for node_id in &doomed {
            if self.store.exists(node_id) {
                let _ = self.store.set_context(node_id, None);
            }
            self.teardown(node_id);
        }
        doomed.len()
    }

    /// Invalidate every wrapper whose entry no longer exists.
    pub fn sweep(&mut self) -> usize {
        let stale: Vec<NodeId> = self
            .nodes
            .keys()
            .filter(|id| !self.store.exists(id))
            .cloned()
            .collect();
        stale.iter().map(|id| self.invalidate(id)).sum()
    }

    /// Drop one wrapper, notifying edge peers and subscribers.
    fn teardown(&mut self, id: &NodeId) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };

        for hook in &node.edge_hooks {
            let Some(peer) = self.nodes.get_mut(&hook.peer) else {
                continue;
            };
            peer.edge_hooks.retain(|h| {
                !(h.peer == *id && h.kind == hook.kind && h.forward != hook.forward)
            });
            self.events.publish(&NodeEvent::ReferenceRemoved {
                node: hook.peer.clone(),
                kind: hook.kind.clone(),
                target: id.clone(),
                forward: !hook.forward,
            });
        }

        if let Some(parent) = node.parent.as_ref().and_then(|p| self.nodes.get_mut(p)) {
            if parent.children.get(&node.browse_name) == Some(id) {
                parent.children.remove(&node.browse_name);
            }
        }

        self.events.publish(&NodeEvent::Destroyed { node: id.clone() });
    }

    pub(crate) fn allocate_context(&mut self) -> ContextHandle {
        let handle = ContextHandle::new(self.next_context);
        self.next_context += 1;
        handle
    }

    /// Link a bound child under its bound parent.
    pub(crate) fn attach_child(&mut self, parent: &NodeId, child: &NodeId) {
        let Some(name) = self.nodes.get(child).map(|n| n.browse_name.clone()) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent.clone());
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.insert(name, child.clone());
        }
    }

    pub(crate) fn record_change(&mut self, affected: &NodeId, verb: ChangeVerb) {
        let affected_type = self
            .store
            .type_definition(affected)
            .ok()
            .flatten()
            .and_then(|t| self.store.type_node(&t));
        self.model_changes.push(ModelChange {
            affected: affected.clone(),
            affected_type,
            verb,
        });
    }

    fn label(&self, id: &NodeId) -> String {
        self.nodes
            .get(id)
            .map(|n| n.browse_name.to_string())
            .unwrap_or_default()
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Subscribe to events about `filter`, or all events when `None`.
    pub fn subscribe<F>(&mut self, filter: Option<NodeId>, handler: F) -> SubscriptionId
    where
        F: FnMut(&NodeEvent) + 'static,
    {
        self.events.subscribe(filter, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub(crate) fn publish(&mut self, event: NodeEvent) {
        self.events.publish(&event);
    }

    /// Drain the model-change buffer.
    ///
    /// The buffer grows until this is called; callers that edit the
    /// space continuously should drain it periodically.
    pub fn take_model_changes(&mut self) -> Vec<ModelChange> {
        std::mem::take(&mut self.model_changes)
    }

    // =========================================================================
    // Members
    // =========================================================================

    fn value_member(&self, id: &NodeId, member: &str) -> Result<(bool, ValueType), MemberError> {
        let node = self
            .node(id)
            .ok_or_else(|| MemberError::NodeNotBound(id.clone()))?;
        let descriptor = self
            .registry
            .member(&node.type_name, member)
            .ok_or_else(|| MemberError::UnknownMember {
                node: id.clone(),
                member: member.to_string(),
            })?;
        let value_type = descriptor
            .value_type()
            .ok_or_else(|| MemberError::NotAValueMember {
                node: id.clone(),
                member: member.to_string(),
            })?;
        Ok((descriptor.is_writable(), value_type))
    }

    pub fn read_member(&self, id: &NodeId, member: &str) -> Result<Value, MemberError> {
        self.value_member(id, member)?;
        Ok(self.store.read_attribute(id, member)?)
    }

    /// Write a writable value member, checking the value's type.
    pub fn write_member(
        &mut self,
        id: &NodeId,
        member: &str,
        value: impl Into<Value>,
    ) -> Result<(), MemberError> {
        let (writable, _) = self.value_member(id, member)?;
        if !writable {
            return Err(MemberError::ReadOnly {
                node: id.clone(),
                member: member.to_string(),
            });
        }
        self.initialize_member(id, member, value)
    }

    /// Write any value member, including read-only ones. Used by the
    /// owning application to set values clients may not change.
    pub fn initialize_member(
        &mut self,
        id: &NodeId,
        member: &str,
        value: impl Into<Value>,
    ) -> Result<(), MemberError> {
        let value = value.into();
        let (_, value_type) = self.value_member(id, member)?;
        value_type
            .check(&value)
            .map_err(|source| MemberError::TypeMismatch {
                node: id.clone(),
                member: member.to_string(),
                source,
            })?;
        self.store.write_attribute(id, member, value)?;
        Ok(())
    }

    pub fn browse_name(&self, id: &NodeId) -> Option<&BrowseName> {
        self.node(id).map(|n| &n.browse_name)
    }

    pub fn node_class(&self, id: &NodeId) -> Option<NodeClass> {
        self.node(id).map(|n| n.node_class)
    }

    /// Type name of the wrapper bound to `id`.
    pub fn type_definition(&self, id: &NodeId) -> Option<&str> {
        self.node(id).map(|n| n.type_name.as_str())
    }

    /// Display name, falling back to the browse name when unset.
    pub fn display_name(&self, id: &NodeId) -> Result<String, MemberError> {
        match self.read_member(id, "displayName")? {
            Value::String(s) => Ok(s),
            _ => Ok(self.label(id)),
        }
    }

    pub fn set_display_name(&mut self, id: &NodeId, name: &str) -> Result<(), MemberError> {
        self.write_member(id, "displayName", name)
    }

    pub fn description(&self, id: &NodeId) -> Result<String, MemberError> {
        Ok(self
            .read_member(id, "description")?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    pub fn set_description(&mut self, id: &NodeId, text: &str) -> Result<(), MemberError> {
        self.write_member(id, "description", text)
    }

    // =========================================================================
    // Browsing
    // =========================================================================

    /// Store child of `parent` named `name`, bound or not.
    pub(crate) fn find_child(
        &mut self,
        parent: &NodeId,
        name: &BrowseName,
    ) -> Result<Option<NodeId>, StoreError> {
        let max_pages = self.max_pages();
        let children = browse_all(&mut self.store, parent, BrowseTarget::Children, max_pages)?;
        for child in children {
            if self.store.browse_name(&child)? == *name {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    /// Bound structural children of `id` in store order.
    pub fn children(&mut self, id: &NodeId) -> Result<Vec<NodeId>, StoreError> {
        let max_pages = self.max_pages();
        let children = browse_all(&mut self.store, id, BrowseTarget::Children, max_pages)?;
        Ok(children.into_iter().filter(|c| self.is_bound(c)).collect())
    }

    /// Bound child named `name`: the cache first, then the store.
    /// Never materializes; see
    /// [`browse_child_or_materialize`](Self::browse_child_or_materialize).
    pub fn browse_child(&mut self, id: &NodeId, name: &BrowseName) -> Option<NodeId> {
        let cached = self.node(id)?.children.get(name).cloned();
        if let Some(child) = cached.filter(|c| self.is_bound(c)) {
            return Some(child);
        }
        let child = self.find_child(id, name).ok().flatten()?;
        if !self.is_bound(&child) {
            return None;
        }
        self.attach_child(id, &child);
        Some(child)
    }

    pub fn has_child(&mut self, id: &NodeId, name: &BrowseName) -> bool {
        self.browse_child(id, name).is_some()
    }

    /// Follow `path` from `id` one browse name at a time.
    pub fn browse_path(&mut self, id: &NodeId, path: &[BrowseName]) -> Option<NodeId> {
        let mut current = id.clone();
        for name in path {
            current = self.browse_child(&current, name)?;
        }
        Some(current)
    }

    /// [`browse_path`](Self::browse_path) over a `/`-separated string.
    pub fn resolve_path(&mut self, id: &NodeId, path: &str) -> Option<NodeId> {
        let names: Vec<BrowseName> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(BrowseName::new)
            .collect::<Result<_, _>>()
            .ok()?;
        self.browse_path(id, &names)
    }

    /// Browse names from below the `Objects` folder down to `id`.
    pub fn node_browse_path(&self, id: &NodeId) -> Vec<BrowseName> {
        let mut path = Vec::new();
        let mut current = self.node(id);
        while let Some(node) = current {
            if node.id == self.objects {
                break;
            }
            path.push(node.browse_name.clone());
            current = node.parent.as_ref().and_then(|p| self.node(p));
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn space_with_sensor() -> AddressSpace<MemoryStore> {
        let mut space = AddressSpace::in_memory().unwrap();
        space
            .register_type(
                TypeSchema::object_type("TemperatureSensor")
                    .value_with_default("value", ValueType::Double, Value::Double(0.0))
                    .read_only("serialNumber", ValueType::String)
                    .child("Status", "BaseDataVariableType")
                    .build(),
            )
            .unwrap();
        space
    }

    #[test]
    fn objects_folder_bound_on_start() {
        let space = AddressSpace::in_memory().unwrap();
        let objects = space.objects_folder().clone();
        let node = space.node(&objects).unwrap();
        assert_eq!(node.type_name(), "FolderType");
        assert_eq!(node.browse_name().as_str(), "Objects");
    }

    #[test]
    fn builtin_type_nodes_created() {
        let space = AddressSpace::in_memory().unwrap();
        for name in space.registry().names() {
            assert!(space.store().type_node(name).is_some(), "{} has no type node", name);
        }
    }

    #[test]
    fn create_instance_binds_mandatory_children() {
        let mut space = space_with_sensor();
        let objects = space.objects_folder().clone();
        let sensor = space
            .create_instance("TemperatureSensor", &objects, "Sensor1", None)
            .unwrap();

        let status = BrowseName::new("Status").unwrap();
        let child = space.browse_child(&sensor, &status).unwrap();
        assert!(space.is_bound(&child));
        assert_eq!(space.node(&child).unwrap().parent(), Some(&sensor));
        assert_eq!(space.read_member(&sensor, "value").unwrap(), Value::Double(0.0));
    }

    #[test]
    fn abstract_and_unknown_types_rejected() {
        let mut space = AddressSpace::in_memory().unwrap();
        let objects = space.objects_folder().clone();
        assert!(matches!(
            space.create_instance("BaseVariableType", &objects, "V", None),
            Err(InstantiateError::AbstractType(_))
        ));
        assert!(matches!(
            space.create_instance("Missing", &objects, "M", None),
            Err(InstantiateError::Schema(SchemaError::UnknownType(_)))
        ));
    }

    #[test]
    fn sibling_names_unique() {
        let mut space = space_with_sensor();
        let objects = space.objects_folder().clone();
        space
            .create_instance("TemperatureSensor", &objects, "Sensor1", None)
            .unwrap();
        assert!(matches!(
            space.create_instance("TemperatureSensor", &objects, "Sensor1", None),
            Err(InstantiateError::DuplicateBrowseName { .. })
        ));
    }

    #[test]
    fn explicit_node_id_honoured() {
        let mut space = space_with_sensor();
        let objects = space.objects_folder().clone();
        let wanted = NodeId::string(1, "Sensor1");
        let id = space
            .create_instance("TemperatureSensor", &objects, "Sensor1", Some(wanted.clone()))
            .unwrap();
        assert_eq!(id, wanted);
    }

    #[test]
    fn slash_in_browse_name_rejected() {
        let mut space = space_with_sensor();
        let objects = space.objects_folder().clone();
        let before = space.bound_count();
        assert!(matches!(
            space.create_instance("TemperatureSensor", &objects, "Line/Sensor1", None),
            Err(InstantiateError::InvalidName(TypeError::InvalidBrowseName(_)))
        ));
        assert_eq!(space.bound_count(), before);
    }

    #[test]
    fn member_writes_checked() {
        let mut space = space_with_sensor();
        let objects = space.objects_folder().clone();
        let sensor = space
            .create_instance("TemperatureSensor", &objects, "Sensor1", None)
            .unwrap();

        assert!(matches!(
            space.write_member(&sensor, "value", "hot"),
            Err(MemberError::TypeMismatch { .. })
        ));
        assert!(matches!(
            space.write_member(&sensor, "serialNumber", "SN-1"),
            Err(MemberError::ReadOnly { .. })
        ));
        assert!(matches!(
            space.write_member(&sensor, "Status", 1.0),
            Err(MemberError::NotAValueMember { .. })
        ));
        assert!(matches!(
            space.read_member(&sensor, "nope"),
            Err(MemberError::UnknownMember { .. })
        ));

        space.initialize_member(&sensor, "serialNumber", "SN-1").unwrap();
        assert_eq!(
            space.read_member(&sensor, "serialNumber").unwrap(),
            Value::from("SN-1")
        );
    }

    #[test]
    fn display_name_defaults_to_browse_name() {
        let mut space = space_with_sensor();
        let objects = space.objects_folder().clone();
        let sensor = space
            .create_instance("TemperatureSensor", &objects, "Sensor1", None)
            .unwrap();
        assert_eq!(space.display_name(&sensor).unwrap(), "Sensor1");
        space.set_display_name(&sensor, "Boiler sensor").unwrap();
        assert_eq!(space.display_name(&sensor).unwrap(), "Boiler sensor");
        assert_eq!(space.description(&sensor).unwrap(), "");
    }

    #[test]
    fn delete_tears_down_subtree() {
        let mut space = space_with_sensor();
        let objects = space.objects_folder().clone();
        let sensor = space
            .create_instance("TemperatureSensor", &objects, "Sensor1", None)
            .unwrap();
        let status = space
            .browse_child(&sensor, &BrowseName::new("Status").unwrap())
            .unwrap();

        let destroyed = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&destroyed);
        space.subscribe(None, move |event| {
            if let NodeEvent::Destroyed { node } = event {
                seen.borrow_mut().push(node.clone());
            }
        });

        assert!(space.delete_node(&sensor).unwrap());
        assert!(!space.is_bound(&sensor));
        assert!(!space.is_bound(&status));
        assert_eq!(*destroyed.borrow(), vec![sensor.clone(), status]);
        assert!(space
            .browse_child(&objects, &BrowseName::new("Sensor1").unwrap())
            .is_none());

        assert!(!space.delete_node(&sensor).unwrap());
    }

    #[test]
    fn objects_folder_cannot_be_deleted() {
        let mut space = AddressSpace::in_memory().unwrap();
        let objects = space.objects_folder().clone();
        assert!(space.delete_node(&objects).is_err());
    }

    #[test]
    fn external_delete_then_sweep() {
        let mut space = space_with_sensor();
        let objects = space.objects_folder().clone();
        let sensor = space
            .create_instance("TemperatureSensor", &objects, "Sensor1", None)
            .unwrap();

        space.store_mut().delete_node(&sensor, true).unwrap();
        assert!(!space.is_bound(&sensor));
        assert_eq!(space.sweep(), 2);
        assert_eq!(space.bound_count(), 1);
    }

    #[test]
    fn model_changes_recorded() {
        let mut space = space_with_sensor();
        let objects = space.objects_folder().clone();
        let sensor = space
            .create_instance("TemperatureSensor", &objects, "Sensor1", None)
            .unwrap();
        space.delete_node(&sensor).unwrap();

        let changes = space.take_model_changes();
        let verbs: Vec<_> = changes.iter().map(|c| c.verb).collect();
        assert_eq!(verbs, [ChangeVerb::NodeAdded, ChangeVerb::ReferenceDeleted]);
        assert_eq!(changes[0].affected, sensor);
        assert!(changes[0].affected_type.is_some());
        assert_eq!(changes[1].affected, objects);
        assert!(space.take_model_changes().is_empty());
    }

    #[test]
    fn paths() {
        let mut space = space_with_sensor();
        let objects = space.objects_folder().clone();
        let folder = space
            .create_instance("FolderType", &objects, "Plant", None)
            .unwrap();
        let sensor = space
            .create_instance("TemperatureSensor", &folder, "Sensor1", None)
            .unwrap();

        let status = space.resolve_path(&objects, "Plant/Sensor1/Status").unwrap();
        let names: Vec<_> = space
            .node_browse_path(&status)
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, ["Plant", "Sensor1", "Status"]);
        assert_eq!(space.children(&folder).unwrap(), vec![sensor]);
        assert!(space.resolve_path(&objects, "Plant/Nope").is_none());
    }
}
