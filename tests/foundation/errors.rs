//! Integration tests for error reporting

use coffer_foundation::{Entity, Error, ErrorContext, ErrorKind};

#[test]
fn errors_render_kind_and_context() {
    let err = Error::entity_not_alive(Entity::new(7)).with_context(
        ErrorContext::new().with_operation("destroy_entity"),
    );
    assert_eq!(
        format!("{err}"),
        "entity Entity(7) is not alive (in destroy_entity)"
    );
}

#[test]
fn error_kinds_are_comparable() {
    assert_eq!(Error::stale_handle(3).kind, ErrorKind::StaleHandle { slot: 3 });
    assert_ne!(Error::double_free(3).kind, Error::stale_handle(3).kind);
}

#[test]
fn errors_implement_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    let err = Error::sentinel_entity();
    assert_error(&err);
    let boxed: Box<dyn std::error::Error> = Box::new(err);
    assert!(boxed.to_string().contains("sentinel"));
}

#[test]
fn capacity_error_names_component() {
    let err = Error::new(ErrorKind::CapacityExceeded {
        component: "Health".to_string(),
        capacity: 30,
    });
    assert_eq!(
        format!("{err}"),
        "pool for Health cannot grow past 30 chunks"
    );
}
