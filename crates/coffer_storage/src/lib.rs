//! Slab pools, entity registry, and views for coffer.
//!
//! This crate provides:
//! - [`Pool`] - Fixed-block slab allocator bound to one component type
//! - [`Registry`] - Entity id space and the set of pools, keyed by type id
//! - [`View`] - Per-entity query over a fixed set of component types
//! - [`RegistryConfig`] - Slab sizing defaults

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod pool;
pub mod registry;
pub mod view;

pub use config::{DEFAULT_BLOCK_SIZE, RegistryConfig};
pub use pool::{ChunkInfo, Handle, Pool};
pub use registry::Registry;
pub use view::{ComponentSet, View};
