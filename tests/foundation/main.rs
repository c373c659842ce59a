//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: Entity, TypeDescriptor, ComponentDescriptor, and Error.

mod descriptors;
mod entities;
mod errors;
