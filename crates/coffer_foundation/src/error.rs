//! Error types for coffer.
//!
//! Every variant here is a contract violation: a programming error on the
//! caller's side that must fail loudly. Plain absence (no pool yet, no
//! component on an entity) is never an error and is reported as `Option`.

use std::fmt;

use thiserror::Error;

use crate::entity::Entity;

/// Result alias used throughout coffer.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for coffer operations.
#[derive(Debug, Error)]
#[error("{kind}{}", context_suffix(.context))]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        })
    }

    /// Creates an error for an operation given the sentinel entity.
    #[must_use]
    pub fn sentinel_entity() -> Self {
        Self::new(ErrorKind::SentinelEntity)
    }

    /// Creates an entity out of range error.
    #[must_use]
    pub fn entity_out_of_range(entity: Entity, count: usize) -> Self {
        Self::new(ErrorKind::EntityOutOfRange { entity, count })
    }

    /// Creates an error for an entity whose slot has been destroyed.
    #[must_use]
    pub fn entity_not_alive(entity: Entity) -> Self {
        Self::new(ErrorKind::EntityNotAlive(entity))
    }

    /// Creates a duplicate component error.
    #[must_use]
    pub fn duplicate_component(entity: Entity, component: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateComponent {
            entity,
            component: component.into(),
        })
    }

    /// Creates a double free error.
    #[must_use]
    pub fn double_free(slot: u32) -> Self {
        Self::new(ErrorKind::DoubleFree { slot })
    }

    /// Creates a stale handle error.
    #[must_use]
    pub fn stale_handle(slot: u32) -> Self {
        Self::new(ErrorKind::StaleHandle { slot })
    }

    /// Returns true if this error reports a type mismatch.
    #[must_use]
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self.kind, ErrorKind::TypeMismatch { .. })
    }
}

fn context_suffix(context: &Option<ErrorContext>) -> String {
    context
        .as_ref()
        .map(|c| format!(" ({c})"))
        .unwrap_or_default()
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A typed operation addressed a pool bound to another type.
    #[error("type mismatch: pool holds {expected}, caller used {actual}")]
    TypeMismatch {
        /// The type the pool is bound to.
        expected: String,
        /// The type the caller supplied.
        actual: String,
    },

    /// The sentinel entity was passed where a live entity is required.
    #[error("the sentinel entity cannot be used here")]
    SentinelEntity,

    /// Entity id is outside the issued range.
    #[error("entity {entity:?} out of range (entity count {count})")]
    EntityOutOfRange {
        /// The offending entity.
        entity: Entity,
        /// The current size of the entity table.
        count: usize,
    },

    /// Entity id is in range but its slot has been destroyed.
    #[error("entity {0:?} is not alive")]
    EntityNotAlive(Entity),

    /// The entity already owns a component of this type.
    #[error("entity {entity:?} already has component {component}")]
    DuplicateComponent {
        /// The entity.
        entity: Entity,
        /// The component name.
        component: String,
    },

    /// Attempted to free a chunk that is already free.
    #[error("chunk {slot} is already free")]
    DoubleFree {
        /// Global slot index of the chunk.
        slot: u32,
    },

    /// Handle no longer refers to the live chunk it was issued for.
    #[error("stale handle to chunk {slot}")]
    StaleHandle {
        /// Global slot index of the chunk.
        slot: u32,
    },

    /// Pools need at least one chunk per slab.
    #[error("invalid block size: {0} (must be at least 1)")]
    InvalidBlockSize(usize),

    /// The pool cannot address any more chunks.
    #[error("pool for {component} cannot grow past {capacity} chunks")]
    CapacityExceeded {
        /// The component name.
        component: String,
        /// The current chunk capacity.
        capacity: usize,
    },

    /// A component descriptor could not be used.
    #[error("invalid component descriptor: {0}")]
    InvalidDescriptor(String),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Name of the failing operation.
    pub operation: Option<&'static str>,
    /// Component type involved, if any.
    pub component: Option<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Sets the component name.
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.operation, &self.component) {
            (Some(op), Some(comp)) => write!(f, "in {op} for {comp}"),
            (Some(op), None) => write!(f, "in {op}"),
            (None, Some(comp)) => write!(f, "for {comp}"),
            (None, None) => Ok(()),
        }
    }
}
