//! Coffer - slab-backed entity/component storage
//!
//! This crate re-exports all layers of the coffer system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 1: coffer_storage    — Slab pools, entity registry, views
//! Layer 0: coffer_foundation — Core types (Entity, TypeDescriptor, Error)
//! ```
//!
//! # Example
//!
//! ```
//! use coffer::storage::Registry;
//!
//! struct Position(f32, f32);
//! struct Velocity(f32, f32);
//!
//! let mut registry = Registry::new();
//! let e = registry.create_entity();
//! registry.create_component(e, Position(0.0, 0.0)).unwrap();
//! registry.create_component(e, Velocity(1.0, 0.5)).unwrap();
//!
//! let view = registry.view::<(Position, Velocity)>();
//! for (entity, (pos, vel)) in view.matches() {
//!     assert_eq!(entity, e);
//!     assert_eq!(pos.0 + vel.0, 1.0);
//! }
//! ```

pub use coffer_foundation as foundation;
pub use coffer_storage as storage;
