//! store
//!
//! The namespace engine seam.
//!
//! # Architecture
//!
//! [`StoreAdapter`] is the single doorway to the store that owns node
//! entries, attributes and edges. The address space never touches store
//! state any other way. [`MemoryStore`] is the bundled in-memory
//! implementation.
//!
//! Browse operations are paginated. A page that does not exhaust the
//! result carries a [`ContinuationPoint`], a store-owned resource that
//! must be released. [`browse_all`] follows pages inline through a
//! [`BrowseCursor`] whose `Drop` releases any outstanding continuation
//! point, so an early return (error or page limit) never leaks one.
//!
//! # Invariants
//!
//! - `browse_children` never reports modelling-rule marker nodes
//! - Structural edges are created and removed only by `create_node` and
//!   `delete_node`
//! - `delete_node` with `cascade` removes the whole subtree and every edge
//!   touching it

pub mod memory;

pub use memory::MemoryStore;

use thiserror::Error;

use crate::core::types::{BrowseName, ModellingRule, NodeClass, NodeId, ReferenceKind};
use crate::core::value::Value;

/// Errors from store operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("node id already in use: {0}")]
    DuplicateNodeId(NodeId),

    #[error("'{browse_name}' already exists under {parent}")]
    DuplicateBrowseName {
        parent: NodeId,
        browse_name: BrowseName,
    },

    #[error("unknown type definition '{0}'")]
    UnknownType(String),

    #[error("continuation point is invalid or already released")]
    InvalidContinuation,

    #[error("browse of {node} exceeded {pages} pages")]
    BrowseLimitExceeded { node: NodeId, pages: usize },

    #[error("reference {kind} from {source_id} to {target} already exists")]
    ReferenceExists {
        kind: ReferenceKind,
        source_id: NodeId,
        target: NodeId,
    },

    #[error("reference {kind} from {source_id} to {target} not found")]
    ReferenceNotFound {
        kind: ReferenceKind,
        source_id: NodeId,
        target: NodeId,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("store failure: {0}")]
    Failure(String),
}

/// Store-owned handle for the remainder of a paginated browse.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ContinuationPoint(u64);

impl ContinuationPoint {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// One page of browse results.
#[derive(Debug)]
pub struct BrowsePage {
    pub ids: Vec<NodeId>,
    pub continuation: Option<ContinuationPoint>,
}

/// Opaque per-node context slot, set by the address space when it binds
/// a wrapper to the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(u64);

impl ContextHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Request to create a node entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateNode {
    pub node_class: NodeClass,
    pub browse_name: BrowseName,
    pub parent: Option<NodeId>,
    /// Instance type name, or `None` for type nodes and methods.
    pub type_definition: Option<String>,
    pub explicit_id: Option<NodeId>,
    pub modelling_rule: ModellingRule,
    /// Supertype name for type nodes.
    pub supertype: Option<String>,
}

impl CreateNode {
    /// An object or variable instance of `type_name` under `parent`.
    pub fn instance(
        node_class: NodeClass,
        browse_name: BrowseName,
        parent: NodeId,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            node_class,
            browse_name,
            parent: Some(parent),
            type_definition: Some(type_name.into()),
            explicit_id: None,
            modelling_rule: ModellingRule::None,
            supertype: None,
        }
    }

    /// A type node. Type nodes are keyed in the store by browse name.
    pub fn type_node(
        node_class: NodeClass,
        browse_name: BrowseName,
        supertype: Option<String>,
    ) -> Self {
        Self {
            node_class,
            browse_name,
            parent: None,
            type_definition: None,
            explicit_id: None,
            modelling_rule: ModellingRule::None,
            supertype,
        }
    }

    /// A method declaration under `parent`.
    pub fn method(browse_name: BrowseName, parent: NodeId) -> Self {
        Self {
            node_class: NodeClass::Method,
            browse_name,
            parent: Some(parent),
            type_definition: None,
            explicit_id: None,
            modelling_rule: ModellingRule::None,
            supertype: None,
        }
    }

    pub fn with_id(mut self, id: Option<NodeId>) -> Self {
        self.explicit_id = id;
        self
    }

    pub fn with_rule(mut self, rule: ModellingRule) -> Self {
        self.modelling_rule = rule;
        self
    }
}

/// Primitives of the external namespace engine.
///
/// Browse methods take `&mut self` because continuation points are state
/// owned by the store.
pub trait StoreAdapter {
    /// Create an entry. Instances of a known type receive their type's
    /// mandatory instance declarations as children.
    fn create_node(&mut self, request: CreateNode) -> Result<NodeId, StoreError>;

    /// Delete an entry, returning every removed id (the entry first).
    fn delete_node(&mut self, id: &NodeId, cascade: bool) -> Result<Vec<NodeId>, StoreError>;

    fn exists(&self, id: &NodeId) -> bool;

    /// Structural children of class Object or Variable.
    fn browse_children(
        &mut self,
        id: &NodeId,
        continuation: Option<ContinuationPoint>,
    ) -> Result<BrowsePage, StoreError>;

    /// Targets of edges of exactly `kind` in direction `forward`.
    fn browse_references(
        &mut self,
        id: &NodeId,
        kind: &ReferenceKind,
        forward: bool,
        continuation: Option<ContinuationPoint>,
    ) -> Result<BrowsePage, StoreError>;

    /// Methods reachable over forward structural edges.
    fn browse_methods(
        &mut self,
        id: &NodeId,
        continuation: Option<ContinuationPoint>,
    ) -> Result<BrowsePage, StoreError>;

    fn release_continuation(&mut self, continuation: ContinuationPoint);

    fn context(&self, id: &NodeId) -> Option<ContextHandle>;

    fn set_context(&mut self, id: &NodeId, context: Option<ContextHandle>)
        -> Result<(), StoreError>;

    /// Read an attribute; unset attributes read as `Value::Null`.
    fn read_attribute(&self, id: &NodeId, name: &str) -> Result<Value, StoreError>;

    fn write_attribute(&mut self, id: &NodeId, name: &str, value: Value)
        -> Result<(), StoreError>;

    fn browse_name(&self, id: &NodeId) -> Result<BrowseName, StoreError>;

    fn node_class(&self, id: &NodeId) -> Result<NodeClass, StoreError>;

    /// Type name of an instance, `None` for type nodes and methods.
    fn type_definition(&self, id: &NodeId) -> Result<Option<String>, StoreError>;

    /// The type node registered under `type_name`.
    fn type_node(&self, type_name: &str) -> Option<NodeId>;

    /// Supertype name recorded on a type node.
    fn supertype(&self, type_name: &str) -> Option<String>;

    /// Structural parent of an entry.
    fn parent(&self, id: &NodeId) -> Result<Option<NodeId>, StoreError>;

    fn add_reference(
        &mut self,
        source: &NodeId,
        kind: &ReferenceKind,
        target: &NodeId,
        forward: bool,
    ) -> Result<(), StoreError>;

    fn delete_reference(
        &mut self,
        source: &NodeId,
        kind: &ReferenceKind,
        target: &NodeId,
        forward: bool,
    ) -> Result<(), StoreError>;

    fn read_modelling_rule(&self, id: &NodeId) -> Result<ModellingRule, StoreError>;
}

/// What a [`browse_all`] call enumerates.
#[derive(Debug, Clone, Copy)]
pub enum BrowseTarget<'a> {
    Children,
    Methods,
    References { kind: &'a ReferenceKind, forward: bool },
}

/// Scoped owner of an in-flight continuation point.
///
/// Dropping the cursor releases whatever continuation point it holds.
pub struct BrowseCursor<'s, S: StoreAdapter + ?Sized> {
    store: &'s mut S,
    pending: Option<ContinuationPoint>,
    pages: usize,
}

impl<'s, S: StoreAdapter + ?Sized> BrowseCursor<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self {
            store,
            pending: None,
            pages: 0,
        }
    }

    /// Fetch the next page. Returns `None` once the browse is exhausted.
    pub fn next_page(
        &mut self,
        id: &NodeId,
        target: BrowseTarget<'_>,
    ) -> Result<Option<Vec<NodeId>>, StoreError> {
        if self.pages > 0 && self.pending.is_none() {
            return Ok(None);
        }
        let continuation = self.pending.take();
        let page = match target {
            BrowseTarget::Children => self.store.browse_children(id, continuation),
            BrowseTarget::Methods => self.store.browse_methods(id, continuation),
            BrowseTarget::References { kind, forward } => {
                self.store.browse_references(id, kind, forward, continuation)
            }
        }?;
        self.pages += 1;
        self.pending = page.continuation;
        Ok(Some(page.ids))
    }

    pub fn pages(&self) -> usize {
        self.pages
    }
}

impl<S: StoreAdapter + ?Sized> Drop for BrowseCursor<'_, S> {
    fn drop(&mut self) {
        if let Some(continuation) = self.pending.take() {
            self.store.release_continuation(continuation);
        }
    }
}

/// Follow every page of a browse, bounded by `max_pages`.
pub fn browse_all<S: StoreAdapter + ?Sized>(
    store: &mut S,
    id: &NodeId,
    target: BrowseTarget<'_>,
    max_pages: usize,
) -> Result<Vec<NodeId>, StoreError> {
    let mut cursor = BrowseCursor::new(store);
    let mut ids = Vec::new();
    while let Some(page) = cursor.next_page(id, target)? {
        ids.extend(page);
        if cursor.pending.is_some() && cursor.pages() >= max_pages {
            log::debug!("browse of {} stopped after {} pages", id, cursor.pages());
            return Err(StoreError::BrowseLimitExceeded {
                node: id.clone(),
                pages: cursor.pages(),
            });
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{Config, FileConfig};
    use crate::store::memory::FailOn;

    fn store_with_children(page_size: usize, count: usize) -> (MemoryStore, NodeId) {
        let mut config = FileConfig::default();
        config.browse.page_size = page_size;
        let mut store = MemoryStore::new(&Config::from_file_config(config).unwrap());
        let parent = store
            .create_node(CreateNode::instance(
                NodeClass::Object,
                BrowseName::new("Parent").unwrap(),
                MemoryStore::objects_folder(),
                "FolderType",
            ))
            .unwrap();
        for i in 0..count {
            store
                .create_node(CreateNode::instance(
                    NodeClass::Object,
                    BrowseName::new(format!("Child{}", i)).unwrap(),
                    parent.clone(),
                    "BaseObjectType",
                ))
                .unwrap();
        }
        (store, parent)
    }

    #[test]
    fn browse_all_follows_every_page() {
        let (mut store, parent) = store_with_children(2, 5);
        let ids = browse_all(&mut store, &parent, BrowseTarget::Children, 10).unwrap();
        assert_eq!(ids.len(), 5);
        assert_eq!(store.open_continuations(), 0);
    }

    #[test]
    fn exact_page_multiple_needs_no_continuation() {
        let (mut store, parent) = store_with_children(2, 4);
        let ids = browse_all(&mut store, &parent, BrowseTarget::Children, 2).unwrap();
        assert_eq!(ids.len(), 4);
        assert_eq!(store.open_continuations(), 0);
    }

    #[test]
    fn page_limit_releases_continuation() {
        let (mut store, parent) = store_with_children(1, 3);
        let err = browse_all(&mut store, &parent, BrowseTarget::Children, 1).unwrap_err();
        assert!(matches!(err, StoreError::BrowseLimitExceeded { pages: 1, .. }));
        assert_eq!(store.open_continuations(), 0);
    }

    #[test]
    fn failed_page_releases_continuation() {
        let (mut store, parent) = store_with_children(1, 3);
        store.fail_on(FailOn::ContinuedBrowse);
        let err = browse_all(&mut store, &parent, BrowseTarget::Children, 10).unwrap_err();
        assert!(matches!(err, StoreError::Failure(_)));
        assert_eq!(store.open_continuations(), 0);
    }

    #[test]
    fn dropped_cursor_releases_continuation() {
        let (mut store, parent) = store_with_children(1, 3);
        {
            let mut cursor = BrowseCursor::new(&mut store);
            let first = cursor.next_page(&parent, BrowseTarget::Children).unwrap();
            assert_eq!(first.map(|p| p.len()), Some(1));
        }
        assert_eq!(store.open_continuations(), 0);
    }
}
