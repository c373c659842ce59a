//! Fixed-block slab allocator bound to one component type.
//!
//! A `Pool` owns a growing list of slabs. Each slab is one allocation holding
//! `block_size` equally sized chunks, and every chunk carries an owner tag:
//! [`Entity::SENTINEL`] when the chunk is free, the owning entity when live.
//!
//! Chunks are addressed by a global slot index (`slab * block_size + offset`)
//! wrapped in a [`Handle`]. Slabs are never moved or released before the pool
//! is dropped, so a live component keeps its address until it is freed.
//!
//! Freed chunks go on a LIFO stack and are reused before the allocation
//! cursor advances into untouched chunks. Entity lookup goes through a
//! sparse index (entity id to slot), so it is O(1) regardless of pool size.
//! Ids past `DENSE_INDEX_LIMIT` spill into a hash map instead of growing the
//! dense table.
//!
//! The pool is not generic: construction and destruction of payloads go
//! through the type-erased operations of its [`ComponentDescriptor`], so a
//! registry can hold pools of arbitrary component types side by side.

// Slot indices are bounded by `MAX_SLOTS`, so usize to u32 casts cannot truncate
#![allow(clippy::cast_possible_truncation)]

use std::alloc::{self, Layout};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::ptr::{self, NonNull};

use coffer_foundation::{
    ComponentDescriptor, ComponentId, Entity, Error, ErrorContext, ErrorKind, Result,
    TypeDescriptor,
};
use log::{debug, error, trace};

/// Marks an entity with no chunk in the sparse index.
const NO_SLOT: u32 = u32::MAX;

/// Upper bound on chunks per pool; `NO_SLOT` stays unused.
const MAX_SLOTS: usize = NO_SLOT as usize;

/// Entity ids below this are indexed by a flat table, the rest by hash.
const DENSE_INDEX_LIMIT: u64 = 1 << 20;

/// Reference to a live chunk in a [`Pool`].
///
/// A handle remembers the entity it was issued for. Once its chunk is freed
/// (and possibly reused by another entity) every access through it fails
/// with `StaleHandle` instead of reaching someone else's data.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    slot: u32,
    owner: Entity,
}

impl Handle {
    /// Returns the global slot index of the chunk.
    #[must_use]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    /// Returns the entity the chunk was allocated for.
    #[must_use]
    pub const fn owner(self) -> Entity {
        self.owner
    }
}

/// Header of one chunk, as seen through [`Pool::chunks`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Global slot index.
    pub slot: u32,
    /// Owner tag; [`Entity::SENTINEL`] for a free chunk.
    pub owner: Entity,
}

impl ChunkInfo {
    /// Returns true if the chunk holds no component.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.owner.is_sentinel()
    }
}

struct Slab {
    data: NonNull<u8>,
    tags: Box<[Entity]>,
}

/// Slab allocator for a single component type.
pub struct Pool {
    descriptor: ComponentDescriptor,
    block_size: usize,
    /// Byte distance between consecutive chunks.
    stride: usize,
    slab_layout: Layout,
    slabs: Vec<Slab>,
    /// Next chunk that has never been handed out.
    cursor: usize,
    /// Freed slots, most recently freed last.
    free: Vec<u32>,
    /// Entity index to slot, `NO_SLOT` when absent.
    index: Vec<u32>,
    /// Slots of entities with ids at or past `DENSE_INDEX_LIMIT`.
    spilled: HashMap<u64, u32>,
    live: usize,
}

impl Pool {
    /// Creates a pool for `T` with `block_size` chunks per slab.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBlockSize` if `block_size` is zero or a slab of that
    /// many chunks cannot be laid out.
    pub fn new<T: 'static>(block_size: usize) -> Result<Self> {
        Self::from_descriptor(ComponentDescriptor::without_default::<T>(), block_size)
    }

    /// Creates a pool from a type-erased descriptor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBlockSize` for an unusable block size and
    /// `InvalidDescriptor` for a descriptor without a name.
    pub fn from_descriptor(descriptor: ComponentDescriptor, block_size: usize) -> Result<Self> {
        let ty = descriptor.type_descriptor();
        if ty.name().is_empty() {
            return Err(Error::new(ErrorKind::InvalidDescriptor(
                "component name must not be empty".to_string(),
            )));
        }
        if block_size == 0 || block_size > MAX_SLOTS {
            return Err(Error::new(ErrorKind::InvalidBlockSize(block_size))
                .with_context(ErrorContext::new().with_component(ty.name())));
        }

        let layout = ty.layout();
        let stride = layout.pad_to_align().size();
        let slab_layout = stride
            .checked_mul(block_size)
            .and_then(|bytes| Layout::from_size_align(bytes, layout.align()).ok())
            .ok_or_else(|| {
                Error::new(ErrorKind::InvalidBlockSize(block_size))
                    .with_context(ErrorContext::new().with_component(ty.name()))
            })?;

        debug!(
            "created pool for {} ({:?}, {} bytes per chunk, {} chunks per slab)",
            ty.name(),
            ty.id(),
            stride,
            block_size
        );

        Ok(Self {
            descriptor,
            block_size,
            stride,
            slab_layout,
            slabs: Vec::new(),
            cursor: 0,
            free: Vec::new(),
            index: Vec::new(),
            spilled: HashMap::new(),
            live: 0,
        })
    }

    // --- Metadata ---

    /// Returns the component type name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor.type_descriptor().name()
    }

    /// Returns the component type id.
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.descriptor.type_descriptor().id()
    }

    /// Returns the byte size of one component.
    #[must_use]
    pub fn type_size(&self) -> usize {
        self.descriptor.type_descriptor().size()
    }

    /// Returns the descriptor this pool was created from.
    #[must_use]
    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    /// Returns true if this pool stores the type described by `ty`.
    #[must_use]
    pub fn is_bound_to(&self, ty: &TypeDescriptor) -> bool {
        self.descriptor.type_descriptor().matches(ty)
    }

    /// Records that this pool stores `T`, enabling typed access to a pool
    /// built from a name-only descriptor.
    ///
    /// The caller has checked that `T`'s layout matches the pool's.
    pub(crate) fn adopt<T: 'static>(&mut self) {
        self.descriptor = self.descriptor.clone().bound_to::<T>();
    }

    /// Returns the number of chunks per slab.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns the number of slabs allocated so far.
    #[must_use]
    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    /// Returns the total number of chunks across all slabs.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slabs.len() * self.block_size
    }

    /// Returns the number of live components.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Returns the free-chunk stack; the next chunk to be reused is last.
    #[must_use]
    pub fn free_slots(&self) -> &[u32] {
        &self.free
    }

    // --- Allocation ---

    /// Places `value` in a chunk owned by `entity`.
    ///
    /// Reuses the most recently freed chunk if there is one, otherwise takes
    /// the next untouched chunk, appending a slab when the last is full.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the pool is not bound to `T`,
    /// `SentinelEntity` for the sentinel, `DuplicateComponent` if `entity`
    /// already has a chunk here, and `CapacityExceeded` if no slab can be added.
    pub fn allocate<T: 'static>(&mut self, entity: Entity, value: T) -> Result<Handle> {
        self.check_type::<T>("allocate")?;
        let slot = self.claim(entity, "allocate")?;
        // SAFETY: the slot lies inside a live slab, is aligned for `T` (stride
        // and slab alignment follow the pool layout, which equals `T`'s after
        // `check_type`), and holds no initialized value.
        unsafe { self.chunk_ptr(slot).cast::<T>().write(value) };
        Ok(self.commit(slot, entity))
    }

    /// Places a default-constructed value in a chunk owned by `entity`.
    ///
    /// This is the type-erased path: the value is built by the descriptor's
    /// default-construct operation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDescriptor` if the pool has no default-construct
    /// operation, plus the errors of [`allocate`](Self::allocate).
    pub fn allocate_default(&mut self, entity: Entity) -> Result<Handle> {
        let Some(construct) = self.descriptor.default_construct() else {
            let err = Error::new(ErrorKind::InvalidDescriptor(format!(
                "{} has no default constructor",
                self.name()
            )));
            return Err(self.violation(err, "allocate_default"));
        };
        let slot = self.claim(entity, "allocate_default")?;
        let chunk = self.chunk_ptr(slot);
        let reclaim = Reclaim {
            free: &mut self.free,
            slot: slot as u32,
        };
        // SAFETY: the slot is aligned for the pool layout and uninitialized;
        // the descriptor contract makes `construct` valid for that layout.
        unsafe { construct(chunk) };
        std::mem::forget(reclaim);
        Ok(self.commit(slot, entity))
    }

    /// Destroys the component behind `handle` and returns its chunk to the free list.
    ///
    /// # Errors
    ///
    /// Returns `DoubleFree` if the chunk is already free and `StaleHandle`
    /// if it now belongs to another entity or was never handed out.
    pub fn free(&mut self, handle: Handle) -> Result<()> {
        let slot = handle.slot as usize;
        if slot >= self.cursor {
            return Err(self.violation(Error::stale_handle(handle.slot), "free"));
        }
        let owner = self.tag(slot);
        if owner.is_sentinel() {
            return Err(self.violation(Error::double_free(handle.slot), "free"));
        }
        if owner != handle.owner {
            return Err(self.violation(Error::stale_handle(handle.slot), "free"));
        }
        self.release(slot, owner);
        Ok(())
    }

    /// Frees the component owned by `entity`, if any.
    ///
    /// Returns true if a component was freed.
    pub fn free_entity(&mut self, entity: Entity) -> bool {
        match self.find_by_entity(entity) {
            Some(handle) => {
                self.release(handle.slot as usize, entity);
                true
            }
            None => false,
        }
    }

    // --- Lookup ---

    /// Finds the chunk owned by `entity`.
    #[must_use]
    pub fn find_by_entity(&self, entity: Entity) -> Option<Handle> {
        if entity.is_sentinel() {
            return None;
        }
        let slot = self.slot_of(entity)?;
        debug_assert_eq!(self.tag(slot as usize), entity, "sparse index out of sync");
        Some(Handle {
            slot,
            owner: entity,
        })
    }

    /// Returns true if `entity` has a component in this pool.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.find_by_entity(entity).is_some()
    }

    /// Borrows the component behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the pool is not bound to `T` and
    /// `StaleHandle` if the chunk was freed.
    pub fn get<T: 'static>(&self, handle: Handle) -> Result<&T> {
        self.check_type::<T>("get")?;
        let slot = self.resolve(handle, "get")?;
        // SAFETY: `resolve` confirmed a live, initialized chunk and
        // `check_type` confirmed it holds a `T`.
        Ok(unsafe { self.chunk_ptr(slot).cast::<T>().as_ref() })
    }

    /// Mutably borrows the component behind `handle`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn get_mut<T: 'static>(&mut self, handle: Handle) -> Result<&mut T> {
        self.check_type::<T>("get_mut")?;
        let slot = self.resolve(handle, "get_mut")?;
        // SAFETY: as in `get`; `&mut self` makes the borrow exclusive.
        Ok(unsafe { self.chunk_ptr(slot).cast::<T>().as_mut() })
    }

    /// Returns a raw pointer to the payload behind `handle`.
    ///
    /// The pointer stays valid until the chunk is freed or the pool dropped.
    ///
    /// # Errors
    ///
    /// Returns `StaleHandle` if the chunk was freed.
    pub fn get_raw(&self, handle: Handle) -> Result<NonNull<u8>> {
        let slot = self.resolve(handle, "get_raw")?;
        Ok(self.chunk_ptr(slot))
    }

    /// Borrows the component owned by `entity`, if any.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the pool is not bound to `T`.
    pub fn get_by_entity<T: 'static>(&self, entity: Entity) -> Result<Option<&T>> {
        self.check_type::<T>("get_by_entity")?;
        self.find_by_entity(entity)
            .map(|handle| self.get::<T>(handle))
            .transpose()
    }

    /// Mutably borrows the component owned by `entity`, if any.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the pool is not bound to `T`.
    pub fn get_by_entity_mut<T: 'static>(&mut self, entity: Entity) -> Result<Option<&mut T>> {
        self.check_type::<T>("get_by_entity_mut")?;
        match self.find_by_entity(entity) {
            Some(handle) => self.get_mut::<T>(handle).map(Some),
            None => Ok(None),
        }
    }

    // --- Inspection ---

    /// Returns the owner tag of a chunk, or `None` past the last slab.
    #[must_use]
    pub fn owner_of(&self, slot: u32) -> Option<Entity> {
        let slot = slot as usize;
        (slot < self.capacity()).then(|| self.tag(slot))
    }

    /// Iterates every chunk of every slab in slab order.
    pub fn chunks(&self) -> impl Iterator<Item = ChunkInfo> + '_ {
        let block_size = self.block_size;
        self.slabs.iter().enumerate().flat_map(move |(s, slab)| {
            slab.tags.iter().enumerate().map(move |(offset, &owner)| ChunkInfo {
                slot: (s * block_size + offset) as u32,
                owner,
            })
        })
    }

    /// Iterates the entities that own a component here, in slab order.
    pub fn owners(&self) -> impl Iterator<Item = Entity> + '_ {
        self.chunks()
            .filter(|chunk| !chunk.is_free())
            .map(|chunk| chunk.owner)
    }

    // --- Private helpers ---

    fn check_type<T: 'static>(&self, operation: &'static str) -> Result<()> {
        let ty = self.descriptor.type_descriptor();
        let bound = match ty.type_id() {
            Some(id) => id == TypeId::of::<T>(),
            None => ty.matches(&TypeDescriptor::of::<T>()),
        };
        if bound {
            Ok(())
        } else {
            let err = Error::type_mismatch(ty.name(), std::any::type_name::<T>());
            Err(self.violation(err, operation))
        }
    }

    fn violation(&self, err: Error, operation: &'static str) -> Error {
        error!("{operation} on pool {}: {}", self.name(), err.kind);
        err.with_context(
            ErrorContext::new()
                .with_operation(operation)
                .with_component(self.name()),
        )
    }

    /// Reserves a chunk for `entity` without initializing it.
    fn claim(&mut self, entity: Entity, operation: &'static str) -> Result<usize> {
        if entity.is_sentinel() {
            return Err(self.violation(Error::sentinel_entity(), operation));
        }
        if self.contains(entity) {
            let err = Error::duplicate_component(entity, self.name());
            return Err(self.violation(err, operation));
        }

        if let Some(slot) = self.free.pop() {
            debug_assert!(self.tag(slot as usize).is_sentinel(), "live chunk on free list");
            return Ok(slot as usize);
        }
        if self.cursor == self.capacity() {
            self.grow(operation)?;
        }
        let slot = self.cursor;
        self.cursor += 1;
        Ok(slot)
    }

    /// Tags an initialized chunk with its owner.
    fn commit(&mut self, slot: usize, entity: Entity) -> Handle {
        *self.tag_mut(slot) = entity;
        let slot = slot as u32;
        self.set_slot(entity, slot);
        self.live += 1;
        trace!("{}: chunk {slot} -> {entity}", self.name());
        Handle {
            slot,
            owner: entity,
        }
    }

    /// Destroys the payload of a live chunk and pushes it on the free list.
    fn release(&mut self, slot: usize, owner: Entity) {
        if let Some(destruct) = self.descriptor.destruct() {
            // SAFETY: the chunk is live, so it holds an initialized value of
            // the pool type, and it is tagged free right after.
            unsafe { destruct(self.chunk_ptr(slot)) };
        }
        *self.tag_mut(slot) = Entity::SENTINEL;
        self.set_slot(owner, NO_SLOT);
        self.free.push(slot as u32);
        self.live -= 1;
        trace!("{}: chunk {slot} freed from {owner}", self.name());
    }

    fn slot_of(&self, entity: Entity) -> Option<u32> {
        let slot = if entity.id() < DENSE_INDEX_LIMIT {
            *self.index.get(entity.index())?
        } else {
            *self.spilled.get(&entity.id())?
        };
        (slot != NO_SLOT).then_some(slot)
    }

    fn set_slot(&mut self, entity: Entity, slot: u32) {
        if entity.id() < DENSE_INDEX_LIMIT {
            let idx = entity.index();
            if idx >= self.index.len() {
                self.index.resize(idx + 1, NO_SLOT);
            }
            self.index[idx] = slot;
        } else if slot == NO_SLOT {
            self.spilled.remove(&entity.id());
        } else {
            self.spilled.insert(entity.id(), slot);
        }
    }

    fn resolve(&self, handle: Handle, operation: &'static str) -> Result<usize> {
        let slot = handle.slot as usize;
        if slot < self.cursor && self.tag(slot) == handle.owner {
            Ok(slot)
        } else {
            Err(self.violation(Error::stale_handle(handle.slot), operation))
        }
    }

    fn grow(&mut self, operation: &'static str) -> Result<()> {
        let capacity = self.capacity();
        if capacity + self.block_size > MAX_SLOTS {
            let err = Error::new(ErrorKind::CapacityExceeded {
                component: self.name().to_string(),
                capacity,
            });
            return Err(self.violation(err, operation));
        }

        let data = if self.slab_layout.size() == 0 {
            // SAFETY: alignment is never zero, so the address is non-null.
            unsafe {
                NonNull::new_unchecked(ptr::without_provenance_mut::<u8>(
                    self.slab_layout.align(),
                ))
            }
        } else {
            // SAFETY: the layout has non-zero size.
            let raw = unsafe { alloc::alloc(self.slab_layout) };
            NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(self.slab_layout))
        };

        self.slabs.push(Slab {
            data,
            tags: vec![Entity::SENTINEL; self.block_size].into_boxed_slice(),
        });
        debug!(
            "pool {} grew to {} slabs ({} chunks)",
            self.name(),
            self.slabs.len(),
            self.capacity()
        );
        Ok(())
    }

    fn chunk_ptr(&self, slot: usize) -> NonNull<u8> {
        let slab = &self.slabs[slot / self.block_size];
        let offset = (slot % self.block_size) * self.stride;
        // SAFETY: offset < block_size * stride, the size of the slab allocation
        // (or zero for zero-sized types).
        unsafe { slab.data.add(offset) }
    }

    fn tag(&self, slot: usize) -> Entity {
        self.slabs[slot / self.block_size].tags[slot % self.block_size]
    }

    fn tag_mut(&mut self, slot: usize) -> &mut Entity {
        &mut self.slabs[slot / self.block_size].tags[slot % self.block_size]
    }
}

/// Returns a claimed slot to the free list if construction unwinds.
struct Reclaim<'a> {
    free: &'a mut Vec<u32>,
    slot: u32,
}

impl Drop for Reclaim<'_> {
    fn drop(&mut self) {
        self.free.push(self.slot);
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        let destruct = self.descriptor.destruct();
        for slab in &self.slabs {
            if let Some(destruct) = destruct {
                for (offset, owner) in slab.tags.iter().enumerate() {
                    if !owner.is_sentinel() {
                        // SAFETY: a tagged chunk holds an initialized value that
                        // nothing else can reach once the pool is dropping.
                        unsafe { destruct(slab.data.add(offset * self.stride)) };
                    }
                }
            }
            if self.slab_layout.size() != 0 {
                // SAFETY: allocated in `grow` with this same layout.
                unsafe { alloc::dealloc(slab.data.as_ptr(), self.slab_layout) };
            }
        }
        debug!(
            "dropped pool {} ({} slabs, {} live components destructed)",
            self.name(),
            self.slabs.len(),
            self.live
        );
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name())
            .field("id", &self.id())
            .field("block_size", &self.block_size)
            .field("slabs", &self.slabs.len())
            .field("live", &self.live)
            .field("free", &self.free.len())
            .finish_non_exhaustive()
    }
}
