//! Core types for coffer.
//!
//! This crate provides:
//! - [`Entity`] - Dense entity identifiers with a reserved sentinel
//! - [`TypeDescriptor`] - Name and hashed identifier for a component type
//! - [`ComponentDescriptor`] - Type-erased construct/destruct operations
//! - [`Error`] - Contract-violation errors with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod entity;
pub mod error;
pub mod types;

pub use entity::Entity;
pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use types::{ComponentDescriptor, ComponentId, ErasedFn, TypeDescriptor, fnv1a_64};
