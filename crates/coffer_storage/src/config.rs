//! Configuration for registries and their pools.

use coffer_foundation::{Error, ErrorKind, Result};

/// Number of chunks per slab for pools created on demand.
pub const DEFAULT_BLOCK_SIZE: usize = 30;

/// Configuration for a [`Registry`](crate::Registry).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Chunks per slab for pools the registry creates lazily.
    pub default_block_size: usize,

    /// Entity table slots reserved up front.
    pub initial_entity_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_block_size: DEFAULT_BLOCK_SIZE,
            initial_entity_capacity: 0,
        }
    }
}

impl RegistryConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for registries holding many entities.
    #[must_use]
    pub fn large() -> Self {
        Self {
            default_block_size: 1024,
            initial_entity_capacity: 4096,
        }
    }

    /// Builder method to set the default block size.
    #[must_use]
    pub fn with_default_block_size(mut self, block_size: usize) -> Self {
        self.default_block_size = block_size;
        self
    }

    /// Builder method to set the initial entity capacity.
    #[must_use]
    pub fn with_initial_entity_capacity(mut self, capacity: usize) -> Self {
        self.initial_entity_capacity = capacity;
        self
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBlockSize` if the default block size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.default_block_size == 0 {
            return Err(Error::new(ErrorKind::InvalidBlockSize(0)));
        }
        Ok(())
    }
}
