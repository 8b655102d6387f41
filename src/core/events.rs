//! core::events
//!
//! Synchronous publish/subscribe for node lifecycle and edge notifications.
//!
//! # Architecture
//!
//! The [`EventBus`] is owned by the address space and delivers each
//! [`NodeEvent`] to matching subscribers in subscription order before the
//! publishing operation returns. Handlers receive the event by reference
//! and cannot reach back into the address space, so publication can never
//! re-enter a mutation in progress.
//!
//! Model changes are not pushed through the bus. They accumulate in a
//! buffer on the address space and are drained by the caller; see
//! [`ModelChange`].
//!
//! # Invariants
//!
//! - Delivery order equals publication order
//! - A subscription filtered on a node is dropped after that node's
//!   `Destroyed` event has been delivered

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::{NodeId, ReferenceKind};

/// Notification published by the address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// `child` was instantiated or materialized under `parent`.
    ChildAdded { parent: NodeId, child: NodeId },
    /// An edge touching `node` was added. `forward` is the direction as
    /// seen from `node`.
    ReferenceAdded {
        node: NodeId,
        kind: ReferenceKind,
        target: NodeId,
        forward: bool,
    },
    /// An edge touching `node` was removed, explicitly or because the
    /// other endpoint was destroyed.
    ReferenceRemoved {
        node: NodeId,
        kind: ReferenceKind,
        target: NodeId,
        forward: bool,
    },
    /// The wrapper for `node` was torn down.
    Destroyed { node: NodeId },
}

impl NodeEvent {
    /// The node this event is delivered to.
    pub fn subject(&self) -> &NodeId {
        match self {
            NodeEvent::ChildAdded { parent, .. } => parent,
            NodeEvent::ReferenceAdded { node, .. } => node,
            NodeEvent::ReferenceRemoved { node, .. } => node,
            NodeEvent::Destroyed { node } => node,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&NodeEvent)>;

struct Subscriber {
    id: SubscriptionId,
    filter: Option<NodeId>,
    handler: Handler,
}

/// Ordered synchronous event dispatcher.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events whose subject is `filter`, or to every event
    /// when `filter` is `None`.
    pub fn subscribe<F>(&mut self, filter: Option<NodeId>, handler: F) -> SubscriptionId
    where
        F: FnMut(&NodeEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            filter,
            handler: Box::new(handler),
        });
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver `event` to every matching subscriber.
    pub fn publish(&mut self, event: &NodeEvent) {
        let subject = event.subject();
        for subscriber in &mut self.subscribers {
            let matches = subscriber.filter.as_ref().map_or(true, |f| f == subject);
            if matches {
                (subscriber.handler)(event);
            }
        }
        if let NodeEvent::Destroyed { node } = event {
            self.subscribers
                .retain(|s| s.filter.as_ref() != Some(node));
        }
    }
}

/// What happened to the node named by a [`ModelChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeVerb {
    NodeAdded,
    NodeDeleted,
    ReferenceAdded,
    ReferenceDeleted,
}

/// Entry in the address space's model-change buffer.
///
/// `affected` is the created node for `NodeAdded` and the node whose
/// edges changed otherwise. `affected_type` is its type node when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelChange {
    pub affected: NodeId,
    pub affected_type: Option<NodeId>,
    pub verb: ChangeVerb,
}
