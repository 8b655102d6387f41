//! nodebind - Typed node binding for OPC UA style address spaces
//!
//! nodebind keeps a strongly-typed in-process wrapper for every entry of an
//! external hierarchical namespace, manages typed edges between those
//! entries, materializes optional members on demand, and serializes whole
//! subtrees through pluggable backends (also used for cloning).
//!
//! # Architecture
//!
//! The codebase is layered, leaves first:
//!
//! - [`core`] - Identifiers, values, log queue, events and configuration
//! - [`schema`] - Runtime type schemas and the type registry
//! - [`store`] - The namespace engine seam and an in-memory engine
//! - [`space`] - The address space: binding, references, optional
//!   members, cloning and typed handles
//! - [`serializer`] - Backend protocol, backends and the tree walk
//!
//! # Correctness Invariants
//!
//! nodebind maintains the following invariants:
//!
//! 1. At most one live wrapper exists per `NodeId`
//! 2. A wrapper exists only if every mandatory child its schema names
//!    exists and is bound
//! 3. Edges are visible from both endpoints and disappear from the
//!    survivor when either endpoint is destroyed
//! 4. Browse names are unique among siblings and identify nodes across
//!    serialization and cloning
//!
//! # Example
//!
//! ```
//! use nodebind::core::log::LogQueue;
//! use nodebind::core::types::ReferenceKind;
//! use nodebind::space::{AddressSpace, CloneOptions, NodeType};
//!
//! let mut space = AddressSpace::in_memory().unwrap();
//! let objects = space.objects_folder().clone();
//! let alarm = space.add_base_object(&objects, "AlarmA").unwrap();
//! let event = space.add_base_object(&objects, "EventB").unwrap();
//!
//! let generates = ReferenceKind::new("Generates", "GeneratedBy").unwrap();
//! space.add_reference(&generates, alarm.id(), event.id(), true).unwrap();
//! space.add_reference(&generates, alarm.id(), event.id(), true).unwrap();
//!
//! let sources = space.find_references(event.id(), &generates, false).unwrap();
//! assert_eq!(sources, vec![alarm.id().clone()]);
//!
//! let mut log = LogQueue::new();
//! let copy = space
//!     .clone_node(alarm.id(), CloneOptions::default().named("AlarmC"), &mut log)
//!     .unwrap();
//! assert_eq!(space.find_references(event.id(), &generates, false).unwrap().len(), 2);
//! assert!(space.is_bound(&copy));
//! ```

pub mod core;
pub mod schema;
pub mod serializer;
pub mod space;
pub mod store;
