//! Integration tests for type descriptors
//!
//! Tests name/id derivation, stable names, and type-erased descriptors.

use std::alloc::Layout;
use std::ptr::NonNull;

use coffer_foundation::{ComponentDescriptor, ComponentId, TypeDescriptor, fnv1a_64};

struct Health(#[allow(dead_code)] u32);
struct Armor(#[allow(dead_code)] u32);

// =============================================================================
// Derived descriptors
// =============================================================================

#[test]
fn id_is_fnv1a_of_name() {
    let d = TypeDescriptor::of::<Health>();
    assert_eq!(d.id().get(), fnv1a_64(d.name().as_bytes()));
}

#[test]
fn equal_size_types_never_share_an_id() {
    let health = TypeDescriptor::of::<Health>();
    let armor = TypeDescriptor::of::<Armor>();
    assert_eq!(health.size(), armor.size());
    assert_ne!(health.id(), armor.id());
}

#[test]
fn descriptor_reports_layout() {
    let d = TypeDescriptor::of::<u64>();
    assert_eq!(d.layout(), Layout::new::<u64>());
    assert_eq!(d.size(), 8);
    assert_eq!(format!("{d}"), "u64");
}

// =============================================================================
// Stable identifiers
// =============================================================================

#[test]
fn stable_name_gives_build_independent_id() {
    let d = TypeDescriptor::with_stable_name::<Health>("rpg.health");
    assert_eq!(d.id(), ComponentId(fnv1a_64(b"rpg.health")));
    assert!(d.matches(&TypeDescriptor::with_stable_name::<Health>("rpg.health")));
}

#[test]
fn stable_descriptor_for_type() {
    let ty = TypeDescriptor::with_stable_name::<String>("text");
    let desc = ComponentDescriptor::for_type::<String>(ty);
    assert_eq!(desc.type_descriptor().name(), "text");
    assert!(desc.destruct().is_some());
    assert!(desc.default_construct().is_none());
}

// =============================================================================
// Type-erased descriptors
// =============================================================================

unsafe fn write_answer(ptr: NonNull<u8>) {
    unsafe { ptr.cast::<u32>().write(42) }
}

#[test]
fn raw_descriptor_carries_caller_operations() {
    let id = ComponentId(7);
    // SAFETY: `write_answer` initializes a u32 and nothing needs dropping.
    let desc = unsafe {
        ComponentDescriptor::from_raw("answer", id, Layout::new::<u32>(), Some(write_answer), None)
    };
    assert_eq!(desc.type_descriptor().id(), id);
    assert_eq!(desc.type_descriptor().name(), "answer");
    assert!(desc.type_descriptor().type_id().is_none());

    let mut slot = 0u32;
    let ptr = NonNull::from(&mut slot).cast::<u8>();
    unsafe { (desc.default_construct().unwrap())(ptr) };
    assert_eq!(slot, 42);
}
