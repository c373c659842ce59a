//! Integration tests for slab pools
//!
//! Allocation order, free-list reuse, handle validity, and type guards.

use std::cell::Cell;
use std::rc::Rc;

use coffer_foundation::{ComponentDescriptor, Entity, ErrorKind};
use coffer_storage::Pool;

use crate::common::{DropCounter, init_logging};

#[derive(Debug, PartialEq)]
struct Position {
    x: i64,
    y: i64,
}

#[derive(Debug, PartialEq)]
struct Mass(f64);

fn e(id: u64) -> Entity {
    Entity::new(id)
}

// =============================================================================
// Allocation
// =============================================================================

#[test]
fn fresh_chunks_are_handed_out_in_slab_order() {
    init_logging();
    let mut pool = Pool::new::<Position>(3).unwrap();
    let slots: Vec<_> = (0..7)
        .map(|i| pool.allocate(e(i), Position { x: 0, y: 0 }).unwrap().slot())
        .collect();
    assert_eq!(slots, vec![0, 1, 2, 3, 4, 5, 6]);
    assert_eq!(pool.slab_count(), 3);
}

#[test]
fn two_free_allocate_cycles_are_lifo() {
    init_logging();
    let mut pool = Pool::new::<Position>(4).unwrap();
    let handles: Vec<_> = (0..4)
        .map(|i| pool.allocate(e(i), Position { x: 0, y: 0 }).unwrap())
        .collect();

    // Freed 1 then 2: slot 2 comes back first.
    pool.free(handles[1]).unwrap();
    pool.free(handles[2]).unwrap();
    let a = pool.allocate(e(10), Position { x: 1, y: 1 }).unwrap();
    let b = pool.allocate(e(11), Position { x: 2, y: 2 }).unwrap();
    assert_eq!(a.slot(), handles[2].slot());
    assert_eq!(b.slot(), handles[1].slot());

    // Freed in the opposite order: slot 1 comes back first.
    pool.free(a).unwrap();
    pool.free(b).unwrap();
    let c = pool.allocate(e(20), Position { x: 3, y: 3 }).unwrap();
    let d = pool.allocate(e(21), Position { x: 4, y: 4 }).unwrap();
    assert_eq!(c.slot(), b.slot());
    assert_eq!(d.slot(), a.slot());

    assert_eq!(pool.owner_of(c.slot()), Some(e(20)));
    assert_eq!(pool.owner_of(d.slot()), Some(e(21)));
    assert_eq!(pool.slab_count(), 1);
}

#[test]
fn allocation_prefers_free_list_over_fresh_chunks() {
    let mut pool = Pool::new::<Mass>(8).unwrap();
    let a = pool.allocate(e(0), Mass(1.0)).unwrap();
    let _b = pool.allocate(e(1), Mass(2.0)).unwrap();
    pool.free(a).unwrap();

    let c = pool.allocate(e(2), Mass(3.0)).unwrap();
    assert_eq!(c.slot(), a.slot());
    let d = pool.allocate(e(3), Mass(4.0)).unwrap();
    assert_eq!(d.slot(), 2);
}

// =============================================================================
// Handles
// =============================================================================

#[test]
fn handle_survives_unrelated_frees_and_growth() {
    let mut pool = Pool::new::<Position>(2).unwrap();
    let keep = pool.allocate(e(0), Position { x: 5, y: 6 }).unwrap();
    let address = pool.get_raw(keep).unwrap();

    for i in 1..50 {
        let h = pool.allocate(e(i), Position { x: 0, y: 0 }).unwrap();
        if i % 3 == 0 {
            pool.free(h).unwrap();
        }
    }

    assert_eq!(pool.get_raw(keep).unwrap(), address);
    assert_eq!(pool.get::<Position>(keep).unwrap(), &Position { x: 5, y: 6 });
}

#[test]
fn freed_handle_is_rejected() {
    init_logging();
    let mut pool = Pool::new::<Mass>(4).unwrap();
    let h = pool.allocate(e(0), Mass(1.0)).unwrap();
    pool.free(h).unwrap();

    assert_eq!(
        pool.get::<Mass>(h).unwrap_err().kind,
        ErrorKind::StaleHandle { slot: h.slot() }
    );
    assert!(pool.get_raw(h).is_err());
    assert_eq!(
        pool.free(h).unwrap_err().kind,
        ErrorKind::DoubleFree { slot: h.slot() }
    );
}

// =============================================================================
// Type guard
// =============================================================================

#[test]
fn every_typed_operation_checks_the_type() {
    init_logging();
    let mut pool = Pool::new::<Position>(4).unwrap();
    let h = pool.allocate(e(0), Position { x: 0, y: 0 }).unwrap();

    assert!(pool.allocate(e(1), Mass(0.0)).unwrap_err().is_type_mismatch());
    assert!(pool.get::<Mass>(h).unwrap_err().is_type_mismatch());
    assert!(pool.get_mut::<Mass>(h).unwrap_err().is_type_mismatch());
    assert!(pool.get_by_entity::<Mass>(e(0)).unwrap_err().is_type_mismatch());
    assert!(pool.get_by_entity_mut::<Mass>(e(0)).unwrap_err().is_type_mismatch());
    assert_eq!(pool.live_count(), 1);
}

// =============================================================================
// Teardown
// =============================================================================

#[test]
fn teardown_destructs_live_chunks_in_every_slab() {
    init_logging();
    let drops = Rc::new(Cell::new(0));
    let mut pool = Pool::from_descriptor(ComponentDescriptor::without_default::<DropCounter>(), 3)
        .unwrap();
    for i in 0..10 {
        pool.allocate(e(i), DropCounter::new(i as i32, &drops)).unwrap();
    }
    pool.free_entity(e(0));
    pool.free_entity(e(9));
    assert_eq!(drops.get(), 2);
    assert_eq!(
        pool.get_by_entity::<DropCounter>(e(5)).unwrap().unwrap().value,
        5
    );

    drop(pool);
    assert_eq!(drops.get(), 10);
}
