//! Integration tests for entity identifiers

use std::collections::HashSet;

use coffer_foundation::Entity;

#[test]
fn sentinel_is_distinct_from_every_issued_id() {
    for id in [0, 1, 1_000, u64::from(u32::MAX), u64::MAX - 1] {
        assert_ne!(Entity::new(id), Entity::SENTINEL);
    }
}

#[test]
fn entities_hash_by_id() {
    let set: HashSet<_> = [Entity::new(1), Entity::new(2), Entity::new(1)]
        .into_iter()
        .collect();
    assert_eq!(set.len(), 2);
}

#[test]
fn entities_sort_by_id() {
    let mut entities = vec![Entity::new(3), Entity::new(0), Entity::new(2)];
    entities.sort();
    assert_eq!(entities, vec![Entity::new(0), Entity::new(2), Entity::new(3)]);
}
