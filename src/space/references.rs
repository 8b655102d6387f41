//! space::references
//!
//! Non-structural edges between bound nodes.
//!
//! A reference kind is registered with the space the first time an edge
//! of that kind is added; only registered kinds are considered when
//! finding or serializing references. Structural (hierarchical) kinds and
//! the kinds the store uses internally cannot be added or removed here.

use thiserror::Error;

use crate::core::events::{ChangeVerb, NodeEvent};
use crate::core::log::{LogCategory, LogQueue};
use crate::core::types::{NodeId, ReferenceKind};
use crate::serializer::ForwardReference;
use crate::store::{browse_all, BrowseTarget, StoreAdapter, StoreError};

use super::AddressSpace;

/// Errors from reference management.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("reference kind {0} is structural or reserved")]
    InvalidReferenceKind(ReferenceKind),

    #[error("reference kind {0} is not registered")]
    UnregisteredReferenceKind(ReferenceKind),

    #[error("node {0} is not bound")]
    NodeNotBound(NodeId),

    #[error("no {kind} reference from {source_id} to {target} (forward: {forward})")]
    NotFound {
        kind: ReferenceKind,
        source_id: NodeId,
        target: NodeId,
        forward: bool,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl<S: StoreAdapter> AddressSpace<S> {
    /// Register `kind` so its edges are tracked. Returns `false` if it was
    /// already registered.
    pub fn register_reference_kind(&mut self, kind: ReferenceKind) -> Result<bool, ReferenceError> {
        if kind.is_hierarchical() || kind.is_reserved() {
            return Err(ReferenceError::InvalidReferenceKind(kind));
        }
        if self.reference_kinds.contains(&kind) {
            return Ok(false);
        }
        log::debug!("registered reference kind {}", kind);
        self.reference_kinds.push(kind);
        Ok(true)
    }

    /// Registered kinds in registration order.
    pub fn reference_kinds(&self) -> &[ReferenceKind] {
        &self.reference_kinds
    }

    pub fn is_reference_kind_registered(&self, kind: &ReferenceKind) -> bool {
        self.reference_kinds.contains(kind)
    }

    /// Add an edge of `kind` between two bound nodes. `forward` is the
    /// direction as seen from `source`.
    ///
    /// Returns `Ok(false)` when the edge already exists.
    pub fn add_reference(
        &mut self,
        kind: &ReferenceKind,
        source: &NodeId,
        target: &NodeId,
        forward: bool,
    ) -> Result<bool, ReferenceError> {
        if kind.is_hierarchical() || kind.is_reserved() {
            return Err(ReferenceError::InvalidReferenceKind(kind.clone()));
        }
        for id in [source, target] {
            if !self.is_bound(id) {
                return Err(ReferenceError::NodeNotBound(id.clone()));
            }
        }
        self.register_reference_kind(kind.clone())?;

        let max_pages = self.max_pages();
        let existing = browse_all(
            &mut self.store,
            source,
            BrowseTarget::References { kind, forward },
            max_pages,
        )?;
        if existing.contains(target) {
            log::trace!("reference {} from {} to {} already exists", kind, source, target);
            return Ok(false);
        }

        self.store.add_reference(source, kind, target, forward)?;
        self.push_hook(source, kind, target, forward);
        self.push_hook(target, kind, source, !forward);

        self.record_change(source, ChangeVerb::ReferenceAdded);
        self.publish(NodeEvent::ReferenceAdded {
            node: source.clone(),
            kind: kind.clone(),
            target: target.clone(),
            forward,
        });
        self.publish(NodeEvent::ReferenceAdded {
            node: target.clone(),
            kind: kind.clone(),
            target: source.clone(),
            forward: !forward,
        });
        Ok(true)
    }

    /// Remove an edge added with [`add_reference`](Self::add_reference).
    pub fn remove_reference(
        &mut self,
        kind: &ReferenceKind,
        source: &NodeId,
        target: &NodeId,
        forward: bool,
    ) -> Result<(), ReferenceError> {
        if !self.is_reference_kind_registered(kind) {
            log::debug!("remove of unregistered reference kind {}", kind);
            return Err(ReferenceError::UnregisteredReferenceKind(kind.clone()));
        }
        if !self.is_bound(source) {
            return Err(ReferenceError::NodeNotBound(source.clone()));
        }

        match self.store.delete_reference(source, kind, target, forward) {
            Ok(()) => {}
            Err(StoreError::ReferenceNotFound { .. }) => {
                return Err(ReferenceError::NotFound {
                    kind: kind.clone(),
                    source_id: source.clone(),
                    target: target.clone(),
                    forward,
                })
            }
            Err(err) => return Err(err.into()),
        }

        self.drop_hook(source, kind, target, forward);
        self.drop_hook(target, kind, source, !forward);

        self.record_change(source, ChangeVerb::ReferenceDeleted);
        self.publish(NodeEvent::ReferenceRemoved {
            node: source.clone(),
            kind: kind.clone(),
            target: target.clone(),
            forward,
        });
        if self.is_bound(target) {
            self.publish(NodeEvent::ReferenceRemoved {
                node: target.clone(),
                kind: kind.clone(),
                target: source.clone(),
                forward: !forward,
            });
        }
        Ok(())
    }

    fn drop_hook(&mut self, node: &NodeId, kind: &ReferenceKind, peer: &NodeId, forward: bool) {
        if let Some(node) = self.nodes.get_mut(node) {
            node.edge_hooks
                .retain(|h| !(h.peer == *peer && h.kind == *kind && h.forward == forward));
        }
    }

    /// Bound targets of `kind` edges from `id` in direction `forward`,
    /// in store order without duplicates. Unregistered kinds have no edges.
    pub fn find_references(
        &mut self,
        id: &NodeId,
        kind: &ReferenceKind,
        forward: bool,
    ) -> Result<Vec<NodeId>, ReferenceError> {
        if !self.is_reference_kind_registered(kind) {
            return Ok(Vec::new());
        }
        if !self.is_bound(id) {
            return Err(ReferenceError::NodeNotBound(id.clone()));
        }

        let max_pages = self.max_pages();
        let targets = browse_all(
            &mut self.store,
            id,
            BrowseTarget::References { kind, forward },
            max_pages,
        )?;
        let mut out: Vec<NodeId> = Vec::with_capacity(targets.len());
        for target in targets {
            if self.is_bound(&target) && !out.contains(&target) {
                out.push(target);
            }
        }
        Ok(out)
    }

    /// Forward edges of every registered kind from `id`.
    pub(crate) fn forward_references(
        &mut self,
        id: &NodeId,
    ) -> Result<Vec<ForwardReference>, ReferenceError> {
        let mut refs = Vec::new();
        for kind in self.reference_kinds.clone() {
            for target in self.find_references(id, &kind, true)? {
                let target_type = self.type_definition(&target).unwrap_or_default().to_string();
                refs.push(ForwardReference {
                    target,
                    target_type,
                    kind: kind.clone(),
                });
            }
        }
        Ok(refs)
    }

    /// Re-create serialized forward edges from `source`.
    ///
    /// Targets that are missing, unbound or of a different type than
    /// recorded are skipped with a warning. Returns the number of edges
    /// present afterwards.
    pub fn apply_forward_references(
        &mut self,
        source: &NodeId,
        refs: &[ForwardReference],
        log: &mut LogQueue,
    ) -> usize {
        let mut applied = 0;
        for reference in refs {
            let Some(actual) = self.type_definition(&reference.target).map(str::to_string) else {
                log.warning(
                    LogCategory::Serialization,
                    format!(
                        "{}: {} target {} does not exist",
                        source, reference.kind, reference.target
                    ),
                );
                continue;
            };
            if actual != reference.target_type {
                log.warning(
                    LogCategory::References,
                    format!(
                        "{}: {} target {} has type '{}', expected '{}'",
                        source, reference.kind, reference.target, actual, reference.target_type
                    ),
                );
                continue;
            }
            match self.add_reference(&reference.kind, source, &reference.target, true) {
                Ok(_) => applied += 1,
                Err(err) => log.warning(
                    LogCategory::References,
                    format!("{}: cannot restore {}: {}", source, reference.kind, err),
                ),
            }
        }
        applied
    }
}
