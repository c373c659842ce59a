//! Per-entity queries over a fixed set of component types.
//!
//! A [`View`] is bound to a registry and an ordered tuple of required types.
//! Walking it yields every slot of the entity table, destroyed ones included;
//! callers filter with [`View::has_required`], which records the matched
//! components for [`View::get`] and [`View::get_all`].

use std::any::TypeId;
use std::marker::PhantomData;

use coffer_foundation::{Entity, TypeDescriptor};
use log::error;

use crate::pool::{Handle, Pool};
use crate::registry::Registry;

/// A tuple of component types a [`View`] requires.
///
/// Implemented for tuples of one to six `'static` types.
pub trait ComponentSet {
    /// Shared references to one entity's components, in tuple order.
    type Refs<'a>;

    /// Returns the descriptors of the required types, in tuple order.
    fn descriptors() -> Vec<TypeDescriptor>;

    /// Borrows the components behind `matched`, one entry per required type.
    fn resolve<'a>(matched: &[(&'a Pool, Handle)]) -> Option<Self::Refs<'a>>;
}

macro_rules! impl_component_set {
    ($($ty:ident => $idx:tt),+) => {
        impl<$($ty: 'static),+> ComponentSet for ($($ty,)+) {
            type Refs<'a> = ($(&'a $ty,)+);

            fn descriptors() -> Vec<TypeDescriptor> {
                vec![$(TypeDescriptor::of::<$ty>()),+]
            }

            fn resolve<'a>(matched: &[(&'a Pool, Handle)]) -> Option<Self::Refs<'a>> {
                Some(($(
                    {
                        let &(pool, handle) = matched.get($idx)?;
                        pool.get::<$ty>(handle).ok()?
                    },
                )+))
            }
        }
    };
}

impl_component_set!(A => 0);
impl_component_set!(A => 0, B => 1);
impl_component_set!(A => 0, B => 1, C => 2);
impl_component_set!(A => 0, B => 1, C => 2, D => 3);
impl_component_set!(A => 0, B => 1, C => 2, D => 3, E => 4);
impl_component_set!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5);

/// Query over the entities of a registry holding every type in `Q`.
pub struct View<'r, Q: ComponentSet> {
    registry: &'r Registry,
    required: Vec<TypeDescriptor>,
    /// Components found by the last successful `has_required`.
    matched: Vec<(&'r Pool, Handle)>,
    matched_entity: Option<Entity>,
    _marker: PhantomData<fn() -> Q>,
}

impl<'r, Q: ComponentSet> View<'r, Q> {
    /// Binds a view to `registry`.
    ///
    /// Types registered under a stable name resolve to their bound pools.
    #[must_use]
    pub fn new(registry: &'r Registry) -> Self {
        let required: Vec<_> = Q::descriptors()
            .into_iter()
            .map(|ty| registry.bound_descriptor(ty))
            .collect();
        Self {
            registry,
            matched: Vec::with_capacity(required.len()),
            required,
            matched_entity: None,
            _marker: PhantomData,
        }
    }

    /// Returns the number of required component types.
    #[must_use]
    pub fn len_required(&self) -> usize {
        self.required.len()
    }

    /// Iterates the whole entity table in id order, destroyed slots included.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + 'r {
        self.registry.entities().iter().copied()
    }

    /// Checks whether `entity` has every required component.
    ///
    /// On success the components are recorded for [`get`](Self::get) and
    /// [`get_all`](Self::get_all); on failure any earlier record is dropped.
    pub fn has_required(&mut self, entity: Entity) -> bool {
        self.matched.clear();
        self.matched_entity = None;
        if entity.is_sentinel() {
            return false;
        }

        let found = if let [only] = self.required.as_slice() {
            match Self::lookup(self.registry, only, entity) {
                Some(hit) => {
                    self.matched.push(hit);
                    true
                }
                None => false,
            }
        } else {
            Self::lookup_all(self.registry, &self.required, entity, &mut self.matched)
        };

        if found {
            self.matched_entity = Some(entity);
        } else {
            self.matched.clear();
        }
        found
    }

    /// Returns the entity recorded by the last successful match.
    #[must_use]
    pub fn matched_entity(&self) -> Option<Entity> {
        self.matched_entity
    }

    /// Borrows the `T` recorded by the last successful match.
    ///
    /// Returns `None` before any match or if `T` is not a required type.
    #[must_use]
    pub fn get<T: 'static>(&self) -> Option<&'r T> {
        let type_id = TypeId::of::<T>();
        let pos = self
            .required
            .iter()
            .position(|ty| ty.type_id() == Some(type_id))?;
        let &(pool, handle) = self.matched.get(pos)?;
        pool.get::<T>(handle).ok()
    }

    /// Borrows every component recorded by the last successful match.
    #[must_use]
    pub fn get_all(&self) -> Option<Q::Refs<'r>> {
        if self.matched_entity.is_none() {
            return None;
        }
        Q::resolve(&self.matched)
    }

    /// Iterates live entities holding every required type, with their components.
    ///
    /// This does not touch the state recorded by [`has_required`](Self::has_required).
    pub fn matches(&self) -> impl Iterator<Item = (Entity, Q::Refs<'r>)> + '_ {
        let registry = self.registry;
        let mut scratch = Vec::with_capacity(self.required.len());
        registry
            .entities()
            .iter()
            .copied()
            .filter(|entity| !entity.is_sentinel())
            .filter_map(move |entity| {
                scratch.clear();
                if !Self::lookup_all(registry, &self.required, entity, &mut scratch) {
                    return None;
                }
                Q::resolve(&scratch).map(|refs| (entity, refs))
            })
    }

    fn lookup_all(
        registry: &'r Registry,
        required: &[TypeDescriptor],
        entity: Entity,
        out: &mut Vec<(&'r Pool, Handle)>,
    ) -> bool {
        for ty in required {
            match Self::lookup(registry, ty, entity) {
                Some(hit) => out.push(hit),
                None => return false,
            }
        }
        true
    }

    fn lookup(
        registry: &'r Registry,
        ty: &TypeDescriptor,
        entity: Entity,
    ) -> Option<(&'r Pool, Handle)> {
        let pool = registry.get_pool_by_id(ty.id())?;
        let bound = pool.is_bound_to(ty);
        debug_assert!(
            bound,
            "pool {} does not store {} (id collision)",
            pool.name(),
            ty.name()
        );
        if !bound {
            error!(
                "view lookup: pool {} does not store {} (id collision)",
                pool.name(),
                ty.name()
            );
            return None;
        }
        Some((pool, pool.find_by_entity(entity)?))
    }
}
