//! Entity lifecycle and per-type pool routing.
//!
//! The `Registry` owns a dense entity table (index = id, sentinel once
//! destroyed), a LIFO stack of destroyed ids, and at most one [`Pool`] per
//! component type id. Pools are created lazily on the first component of a
//! type and dropped, destructing every live payload, with the registry.
//!
//! Typed calls route `T` through a `TypeId` to component id binding, recorded
//! whenever a pool for a concrete Rust type is added. A type registered under
//! a stable name with [`Registry::register_pool_with`] therefore resolves to
//! the same pool from the typed, erased, and view paths.

use std::alloc::Layout;
use std::any::TypeId;
use std::collections::HashMap;
use std::ptr::NonNull;

use coffer_foundation::{
    ComponentDescriptor, ComponentId, Entity, Error, ErrorContext, ErrorKind, Result,
    TypeDescriptor,
};
use log::{debug, error};

use crate::config::RegistryConfig;
use crate::pool::{Handle, Pool};
use crate::view::{ComponentSet, View};

/// Owns entities and the pools holding their components.
#[derive(Debug)]
pub struct Registry {
    /// Dense entity table; destroyed slots hold the sentinel.
    entities: Vec<Entity>,
    /// Destroyed ids available for reuse, most recent last.
    free_ids: Vec<u64>,
    /// One pool per component type, in creation order.
    pools: Vec<Pool>,
    /// Component id of the pool holding each concrete Rust type.
    bindings: HashMap<TypeId, ComponentId>,
    config: RegistryConfig,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(RegistryConfig::default())
    }

    /// Creates an empty registry with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RegistryConfig) -> Self {
        Self {
            entities: Vec::with_capacity(config.initial_entity_capacity),
            free_ids: Vec::new(),
            pools: Vec::new(),
            bindings: HashMap::new(),
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // --- Entities ---

    /// Creates an entity.
    ///
    /// Reuses the most recently destroyed id if there is one, otherwise
    /// appends a new id equal to the current entity count.
    pub fn create_entity(&mut self) -> Entity {
        if let Some(id) = self.free_ids.pop() {
            let entity = Entity::new(id);
            self.entities[entity.index()] = entity;
            entity
        } else {
            let entity = Entity::new(self.entities.len() as u64);
            self.entities.push(entity);
            entity
        }
    }

    /// Destroys an entity and frees its component in every pool.
    ///
    /// # Errors
    ///
    /// Returns `SentinelEntity`, `EntityOutOfRange`, or `EntityNotAlive` if
    /// `entity` is not a live entity of this registry.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<()> {
        self.validate(entity, "destroy_entity")?;

        self.entities[entity.index()] = Entity::SENTINEL;
        self.free_ids.push(entity.id());

        let swept = self
            .pools
            .iter_mut()
            .map(|pool| pool.free_entity(entity))
            .filter(|freed| *freed)
            .count();
        debug!("destroyed {entity}, freed {swept} components");

        Ok(())
    }

    /// Checks if an entity is live.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        !entity.is_sentinel() && self.entities.get(entity.index()) == Some(&entity)
    }

    /// Validates that an entity is live.
    ///
    /// # Errors
    ///
    /// Returns `SentinelEntity` for the sentinel, `EntityOutOfRange` for an
    /// id never issued, and `EntityNotAlive` for a destroyed id.
    pub fn validate(&self, entity: Entity, operation: &'static str) -> Result<()> {
        let err = if entity.is_sentinel() {
            Error::sentinel_entity()
        } else if entity.index() >= self.entities.len() {
            Error::entity_out_of_range(entity, self.entities.len())
        } else if self.entities[entity.index()] != entity {
            Error::entity_not_alive(entity)
        } else {
            return Ok(());
        };
        error!("{operation}: {}", err.kind);
        Err(err.with_context(ErrorContext::new().with_operation(operation)))
    }

    /// Returns the dense entity table, destroyed slots included.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Returns the size of the entity table, destroyed slots included.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entities.len() - self.free_ids.len()
    }

    /// Returns the destroyed ids awaiting reuse; the next to be reused is last.
    #[must_use]
    pub fn free_ids(&self) -> &[u64] {
        &self.free_ids
    }

    // --- Components ---

    /// Attaches `value` to `entity`, creating the pool for `T` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if `entity` is not live, already has a `T`, or the
    /// pool under `T`'s id is bound to another type.
    pub fn create_component<T: 'static>(&mut self, entity: Entity, value: T) -> Result<Handle> {
        self.validate(entity, "create_component")?;
        let idx = self.pool_index_or_create::<T>(self.config.default_block_size)?;
        self.pools[idx].allocate(entity, value)
    }

    /// Attaches `T::default()` to `entity`.
    ///
    /// # Errors
    ///
    /// Same as [`create_component`](Self::create_component).
    pub fn create_default_component<T: Default + 'static>(
        &mut self,
        entity: Entity,
    ) -> Result<Handle> {
        self.create_component(entity, T::default())
    }

    /// Attaches a default-constructed component described only at runtime.
    ///
    /// The pool is created from `descriptor` if no pool with its id exists,
    /// using `block_size` or the configured default.
    ///
    /// # Errors
    ///
    /// Returns an error if `entity` is not live, the existing pool under the
    /// descriptor's id stores a different type, or the pool cannot
    /// default-construct values.
    pub fn create_component_erased(
        &mut self,
        entity: Entity,
        descriptor: &ComponentDescriptor,
        block_size: Option<usize>,
    ) -> Result<Handle> {
        self.validate(entity, "create_component_erased")?;
        let ty = descriptor.type_descriptor();

        let idx = match self.pool_index(ty.id()) {
            Some(idx) => {
                let pool = &self.pools[idx];
                if !pool.is_bound_to(ty) {
                    let err = Error::type_mismatch(pool.name(), ty.name());
                    return Err(Self::reject(err, "create_component_erased", pool.name()));
                }
                idx
            }
            None => {
                if descriptor.default_construct().is_none() {
                    let err = Error::new(ErrorKind::InvalidDescriptor(format!(
                        "{} has no default constructor",
                        ty.name()
                    )));
                    return Err(Self::reject(err, "create_component_erased", ty.name()));
                }
                self.check_unbound(ty, "create_component_erased")?;
                let block_size = block_size.unwrap_or(self.config.default_block_size);
                self.push_pool(Pool::from_descriptor(descriptor.clone(), block_size)?)
            }
        };

        self.pools[idx].allocate_default(entity)
    }

    /// Borrows the `T` of `entity`, if it has one.
    ///
    /// Destroyed entities and the sentinel simply have no components.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the pool under `T`'s id is bound to another type.
    pub fn get_component<T: 'static>(&self, entity: Entity) -> Result<Option<&T>> {
        match self.get_pool::<T>() {
            Some(pool) => pool.get_by_entity::<T>(entity),
            None => Ok(None),
        }
    }

    /// Mutably borrows the `T` of `entity`, if it has one.
    ///
    /// # Errors
    ///
    /// Same as [`get_component`](Self::get_component).
    pub fn get_component_mut<T: 'static>(&mut self, entity: Entity) -> Result<Option<&mut T>> {
        match self.get_pool_mut::<T>() {
            Some(pool) => pool.get_by_entity_mut::<T>(entity),
            None => Ok(None),
        }
    }

    /// Returns a raw pointer to the component with id `component` on `entity`.
    #[must_use]
    pub fn get_component_raw(&self, entity: Entity, component: ComponentId) -> Option<NonNull<u8>> {
        let pool = self.get_pool_by_id(component)?;
        let handle = pool.find_by_entity(entity)?;
        pool.get_raw(handle).ok()
    }

    /// Checks if `entity` has a `T`.
    #[must_use]
    pub fn has_component<T: 'static>(&self, entity: Entity) -> bool {
        self.get_pool::<T>()
            .is_some_and(|pool| pool.contains(entity))
    }

    /// Detaches and destroys the `T` of `entity`.
    ///
    /// Returns true if a component was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if `entity` is not live or the pool under `T`'s id
    /// is bound to another type.
    pub fn remove_component<T: 'static>(&mut self, entity: Entity) -> Result<bool> {
        self.validate(entity, "remove_component")?;
        let Some(pool) = self.get_pool_mut::<T>() else {
            return Ok(false);
        };
        let present = pool.get_by_entity::<T>(entity)?.is_some();
        Ok(present && pool.free_entity(entity))
    }

    // --- Pools ---

    /// Creates the pool for `T` with a specific block size.
    ///
    /// Does nothing if the pool already exists. Returns the pool's block size.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBlockSize` for a zero block size.
    pub fn register_pool<T: 'static>(&mut self, block_size: usize) -> Result<usize> {
        let idx = self.pool_index_or_create::<T>(block_size)?;
        Ok(self.pools[idx].block_size())
    }

    /// Binds `T` to the pool described by `ty`, creating the pool if needed.
    ///
    /// `ty` usually carries a stable name, so the pool keeps the same id
    /// across builds. An existing pool under that id, including one created
    /// through the erased path from a name-only descriptor, is adopted as the
    /// pool for `T`. From then on every typed call for `T` uses it. Returns
    /// the pool's block size.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if `ty` or the pool under its id describes
    /// another type or layout, `InvalidDescriptor` if `T` already has a pool
    /// under a different id, and `InvalidBlockSize` for a zero block size.
    pub fn register_pool_with<T: 'static>(
        &mut self,
        ty: TypeDescriptor,
        block_size: usize,
    ) -> Result<usize> {
        const OPERATION: &str = "register_pool_with";
        let foreign = ty.type_id().is_some_and(|id| id != TypeId::of::<T>());
        if foreign || ty.layout() != Layout::new::<T>() {
            let err = Error::type_mismatch(ty.name(), std::any::type_name::<T>());
            return Err(Self::reject(err, OPERATION, ty.name()));
        }
        let ty = ty.bound_to::<T>();
        self.check_unbound(&ty, OPERATION)?;

        let idx = match self.pool_index(ty.id()) {
            Some(idx) => {
                let pool = &mut self.pools[idx];
                if !pool.is_bound_to(&ty) {
                    let err = Error::type_mismatch(pool.name(), ty.name());
                    return Err(Self::reject(err, OPERATION, pool.name()));
                }
                pool.adopt::<T>();
                self.bindings.insert(TypeId::of::<T>(), ty.id());
                idx
            }
            None => {
                let descriptor = ComponentDescriptor::for_type::<T>(ty);
                self.push_pool(Pool::from_descriptor(descriptor, block_size)?)
            }
        };
        Ok(self.pools[idx].block_size())
    }

    /// Returns the pool for `T`, if any component of `T` was ever created.
    #[must_use]
    pub fn get_pool<T: 'static>(&self) -> Option<&Pool> {
        self.get_pool_by_id(self.component_id::<T>())
    }

    /// Returns the pool for `T` mutably.
    #[must_use]
    pub fn get_pool_mut<T: 'static>(&mut self) -> Option<&mut Pool> {
        let idx = self.pool_index(self.component_id::<T>())?;
        Some(&mut self.pools[idx])
    }

    /// Returns the component id typed calls use for `T`.
    ///
    /// This is the id of the pool bound to `T`, or the id derived from `T`'s
    /// type name if no pool for `T` exists yet.
    #[must_use]
    pub fn component_id<T: 'static>(&self) -> ComponentId {
        self.bindings
            .get(&TypeId::of::<T>())
            .copied()
            .unwrap_or_else(|| TypeDescriptor::of::<T>().id())
    }

    /// Returns the pool with the given type id.
    #[must_use]
    pub fn get_pool_by_id(&self, id: ComponentId) -> Option<&Pool> {
        self.pools.iter().find(|pool| pool.id() == id)
    }

    /// Returns all pools in creation order.
    #[must_use]
    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    /// Returns the number of pools.
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Creates a view over the component types in `Q`.
    #[must_use]
    pub fn view<Q: ComponentSet>(&self) -> View<'_, Q> {
        View::new(self)
    }

    /// Swaps a requested descriptor for the one of the pool bound to its type.
    pub(crate) fn bound_descriptor(&self, ty: TypeDescriptor) -> TypeDescriptor {
        ty.type_id()
            .and_then(|type_id| self.bindings.get(&type_id))
            .and_then(|id| self.get_pool_by_id(*id))
            .map_or(ty, |pool| pool.descriptor().type_descriptor().clone())
    }

    // --- Private helpers ---

    // Linear scan; there is one pool per component type in use.
    fn pool_index(&self, id: ComponentId) -> Option<usize> {
        self.pools.iter().position(|pool| pool.id() == id)
    }

    fn pool_index_or_create<T: 'static>(&mut self, block_size: usize) -> Result<usize> {
        match self.pool_index(self.component_id::<T>()) {
            Some(idx) => Ok(idx),
            None => Ok(self.push_pool(Pool::new::<T>(block_size)?)),
        }
    }

    fn push_pool(&mut self, pool: Pool) -> usize {
        if let Some(type_id) = pool.descriptor().type_descriptor().type_id() {
            self.bindings.insert(type_id, pool.id());
        }
        self.pools.push(pool);
        self.pools.len() - 1
    }

    /// Fails if the Rust type behind `ty` already has a pool under another id.
    fn check_unbound(&self, ty: &TypeDescriptor, operation: &'static str) -> Result<()> {
        let bound = ty.type_id().and_then(|type_id| self.bindings.get(&type_id));
        match bound {
            Some(&id) if id != ty.id() => {
                let err = Error::new(ErrorKind::InvalidDescriptor(format!(
                    "{} is already stored under {id:?}",
                    ty.name()
                )));
                Err(Self::reject(err, operation, ty.name()))
            }
            _ => Ok(()),
        }
    }

    fn reject(err: Error, operation: &'static str, component: &str) -> Error {
        error!("{operation}: {}", err.kind);
        err.with_context(
            ErrorContext::new()
                .with_operation(operation)
                .with_component(component),
        )
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        debug!(
            "dropping registry ({} entities, {} pools)",
            self.live_count(),
            self.pools.len()
        );
    }
}
