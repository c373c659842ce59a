//! End-to-end lifecycle scenarios
//!
//! Entity destruction sweeping pools, LIFO reuse, and pool identity.

use std::cell::Cell;
use std::rc::Rc;

use coffer_foundation::Entity;
use coffer_storage::Registry;

use crate::common::{DropCounter, init_logging};

#[derive(Debug, PartialEq)]
struct Tag(u64);

#[derive(Debug, PartialEq)]
struct Left(u32);

#[derive(Debug, PartialEq)]
struct Right(u32);

// =============================================================================
// Destroying a component-holding entity
// =============================================================================

#[test]
fn destroy_seventh_of_ten() {
    init_logging();
    let mut registry = Registry::new();
    let entities: Vec<_> = (0..10).map(|_| registry.create_entity()).collect();
    let mut slots = Vec::new();
    for (i, e) in entities.iter().enumerate() {
        let handle = registry.create_component(*e, Tag(i as u64)).unwrap();
        slots.push(handle.slot());
    }

    registry.destroy_entity(entities[7]).unwrap();

    let table = registry.entities();
    assert_eq!(table[7], Entity::SENTINEL);
    for i in (0..10).filter(|i| *i != 7) {
        assert_eq!(table[i], Entity::new(i as u64));
        assert_eq!(
            registry.get_component::<Tag>(entities[i]).unwrap(),
            Some(&Tag(i as u64))
        );
    }

    let pool = registry.get_pool::<Tag>().unwrap();
    assert_eq!(pool.owner_of(slots[7]), Some(Entity::SENTINEL));
    assert!(registry.get_component::<Tag>(entities[7]).unwrap().is_none());
}

#[test]
fn destruction_runs_destructor_exactly_once() {
    init_logging();
    let drops = Rc::new(Cell::new(0));
    let mut registry = Registry::new();
    let e = registry.create_entity();
    let handle = registry.create_component(e, DropCounter::new(1, &drops)).unwrap();

    registry.destroy_entity(e).unwrap();
    assert_eq!(drops.get(), 1);

    let pool = registry.get_pool::<DropCounter>().unwrap();
    assert_eq!(pool.owner_of(handle.slot()), Some(Entity::SENTINEL));
    assert!(registry.get_component::<DropCounter>(e).unwrap().is_none());

    drop(registry);
    assert_eq!(drops.get(), 1);
}

// =============================================================================
// Id and chunk reuse
// =============================================================================

#[test]
fn destroyed_id_is_reused_before_new_ids() {
    init_logging();
    let mut registry = Registry::new();
    let entities: Vec<_> = (0..5).map(|_| registry.create_entity()).collect();

    registry.destroy_entity(entities[2]).unwrap();
    assert_eq!(registry.create_entity(), entities[2]);
    assert_eq!(registry.create_entity(), Entity::new(5));
}

#[test]
fn chunk_reuse_is_lifo_across_entities() {
    init_logging();
    let mut registry = Registry::new();
    let entities: Vec<_> = (0..4).map(|_| registry.create_entity()).collect();
    let handles: Vec<_> = entities
        .iter()
        .map(|e| registry.create_component(*e, Tag(e.id())).unwrap())
        .collect();

    registry.destroy_entity(entities[0]).unwrap();
    registry.destroy_entity(entities[3]).unwrap();

    let a = registry.create_entity();
    let ha = registry.create_component(a, Tag(100)).unwrap();
    assert_eq!(ha.slot(), handles[3].slot());

    let b = registry.create_entity();
    let hb = registry.create_component(b, Tag(200)).unwrap();
    assert_eq!(hb.slot(), handles[0].slot());

    let pool = registry.get_pool::<Tag>().unwrap();
    assert_eq!(pool.owner_of(ha.slot()), Some(a));
    assert_eq!(pool.owner_of(hb.slot()), Some(b));
    assert_eq!(pool.capacity(), 30);
}

// =============================================================================
// Pool identity
// =============================================================================

#[test]
fn equal_size_types_never_share_a_pool() {
    init_logging();
    let mut registry = Registry::new();
    let e = registry.create_entity();
    registry.create_component(e, Left(1)).unwrap();
    registry.create_component(e, Right(2)).unwrap();

    let left = registry.get_pool::<Left>().unwrap();
    let right = registry.get_pool::<Right>().unwrap();
    assert_eq!(left.type_size(), right.type_size());
    assert_ne!(left.id(), right.id());
    assert_eq!(left.live_count(), 1);
    assert_eq!(right.live_count(), 1);
    assert_eq!(registry.get_component::<Left>(e).unwrap(), Some(&Left(1)));
    assert_eq!(registry.get_component::<Right>(e).unwrap(), Some(&Right(2)));
}

#[test]
fn unrelated_pool_does_not_exist_until_used() {
    let mut registry = Registry::new();
    let e = registry.create_entity();
    registry.create_component(e, Left(1)).unwrap();

    assert!(registry.get_pool::<Left>().is_some());
    assert!(registry.get_pool::<Right>().is_none());
}
