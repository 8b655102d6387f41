//! core
//!
//! Domain types shared by every layer of nodebind.
//!
//! # Modules
//!
//! - [`types`] - Strong types: NodeId, BrowseName, ReferenceKind, etc.
//! - [`value`] - Member values and declared value types
//! - [`log`] - Per-operation log queue
//! - [`events`] - Node event bus and model-change records
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid identifiers and names at construction
//! - Drift is recorded in a log queue, desync is a typed error

pub mod config;
pub mod events;
pub mod log;
pub mod types;
pub mod value;
