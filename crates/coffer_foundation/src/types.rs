//! Type descriptors for component storage.
//!
//! Every component type is identified by a name and a 64-bit id obtained by
//! hashing that name with FNV-1a. Nothing has to be registered by hand: the
//! name comes from [`std::any::type_name`].
//!
//! # Stability
//!
//! Ids derived by [`TypeDescriptor::of`] are identical for the same type
//! within one build, but `type_name` output is not guaranteed across
//! compiler versions, builds, or processes. Callers that persist an id must
//! supply a stable name through [`TypeDescriptor::with_stable_name`] or an
//! explicit id through [`ComponentDescriptor::from_raw`].
//!
//! Collisions between distinct names are possible in principle. When both
//! sides carry a [`TypeId`], [`TypeDescriptor::matches`] also compares those,
//! so a collision surfaces as a type mismatch instead of aliasing storage.

use std::alloc::Layout;
use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::mem::needs_drop;
use std::ptr::NonNull;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hashes bytes with 64-bit FNV-1a.
#[must_use]
pub const fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Numeric identifier of a component type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u64);

impl ComponentId {
    /// Derives the id for a component name.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        Self(fnv1a_64(name.as_bytes()))
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({:#018x})", self.0)
    }
}

/// Name, id, and memory layout of a component type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: Cow<'static, str>,
    id: ComponentId,
    type_id: Option<TypeId>,
    layout: Layout,
}

impl TypeDescriptor {
    /// Describes `T`, deriving its name from [`std::any::type_name`].
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self::with_stable_name::<T>(std::any::type_name::<T>())
    }

    /// Describes `T` under a caller-chosen name.
    ///
    /// Use this when the id must stay the same across builds.
    #[must_use]
    pub fn with_stable_name<T: 'static>(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            id: ComponentId::from_name(name),
            type_id: Some(TypeId::of::<T>()),
            layout: Layout::new::<T>(),
        }
    }

    /// Describes a type the caller only knows by name, id, and layout.
    #[must_use]
    pub fn erased(name: impl Into<Cow<'static, str>>, id: ComponentId, layout: Layout) -> Self {
        Self {
            name: name.into(),
            id,
            type_id: None,
            layout,
        }
    }

    /// Ties this descriptor to the concrete type `T`, keeping its name and id.
    ///
    /// Used to give a name-only descriptor typed access once the Rust type
    /// behind it is known. Callers check the layout first.
    #[must_use]
    pub fn bound_to<T: 'static>(mut self) -> Self {
        self.type_id = Some(TypeId::of::<T>());
        self
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the numeric id.
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Returns the Rust `TypeId`, if the descriptor was built from a concrete type.
    #[must_use]
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// Returns the memory layout of one value.
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Returns the byte size of one value.
    #[must_use]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Checks whether `other` describes the same type.
    ///
    /// Ids and layouts must agree; `TypeId`s must agree when both are known.
    #[must_use]
    pub fn matches(&self, other: &TypeDescriptor) -> bool {
        if self.id != other.id || self.layout != other.layout {
            return false;
        }
        match (self.type_id, other.type_id) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Type-erased operation on one slot of component memory.
pub type ErasedFn = unsafe fn(NonNull<u8>);

unsafe fn default_construct<T: Default>(ptr: NonNull<u8>) {
    // SAFETY: caller guarantees `ptr` is valid for writes of `T` and aligned.
    unsafe { ptr.cast::<T>().write(T::default()) }
}

unsafe fn destruct<T>(ptr: NonNull<u8>) {
    // SAFETY: caller guarantees `ptr` holds an initialized `T` that is not used again.
    unsafe { ptr.cast::<T>().drop_in_place() }
}

/// A component type together with its type-erased construct and destruct operations.
///
/// This is what lets a single non-generic pool build and destroy payloads
/// it has no static knowledge of.
#[derive(Clone, Debug)]
pub struct ComponentDescriptor {
    ty: TypeDescriptor,
    default_construct: Option<ErasedFn>,
    destruct: Option<ErasedFn>,
}

impl ComponentDescriptor {
    /// Describes `T` with both a default-construct and a destruct operation.
    #[must_use]
    pub fn of<T: Default + 'static>() -> Self {
        Self {
            ty: TypeDescriptor::of::<T>(),
            default_construct: Some(default_construct::<T> as ErasedFn),
            destruct: needs_drop::<T>().then_some(destruct::<T> as ErasedFn),
        }
    }

    /// Describes `T` without a default-construct operation.
    ///
    /// Values of such a type can only be placed through the typed path.
    #[must_use]
    pub fn without_default<T: 'static>() -> Self {
        Self::for_type::<T>(TypeDescriptor::of::<T>())
    }

    /// Describes `T` under an explicit type descriptor, e.g. one with a stable name.
    ///
    /// # Panics
    ///
    /// Panics if `ty` was built for a different concrete type.
    #[must_use]
    pub fn for_type<T: 'static>(ty: TypeDescriptor) -> Self {
        assert!(
            ty.type_id.is_none_or(|id| id == TypeId::of::<T>()),
            "descriptor {} does not describe {}",
            ty.name(),
            std::any::type_name::<T>()
        );
        Self {
            ty,
            default_construct: None,
            destruct: needs_drop::<T>().then_some(destruct::<T> as ErasedFn),
        }
    }

    /// Builds a descriptor for a type known only by name, id, and layout.
    ///
    /// # Safety
    ///
    /// `default_construct` must fully initialize a value of `layout` when
    /// given an aligned pointer to `layout.size()` writable bytes, and
    /// `destruct` must release any resources of a value it initialized.
    /// Neither may unwind.
    #[must_use]
    pub unsafe fn from_raw(
        name: impl Into<Cow<'static, str>>,
        id: ComponentId,
        layout: Layout,
        default_construct: Option<ErasedFn>,
        destruct: Option<ErasedFn>,
    ) -> Self {
        Self {
            ty: TypeDescriptor::erased(name, id, layout),
            default_construct,
            destruct,
        }
    }

    /// Ties the descriptor to the concrete type `T`; see [`TypeDescriptor::bound_to`].
    #[must_use]
    pub fn bound_to<T: 'static>(self) -> Self {
        Self {
            ty: self.ty.bound_to::<T>(),
            ..self
        }
    }

    /// Returns the type descriptor.
    #[must_use]
    pub fn type_descriptor(&self) -> &TypeDescriptor {
        &self.ty
    }

    /// Returns the default-construct operation, if any.
    #[must_use]
    pub fn default_construct(&self) -> Option<ErasedFn> {
        self.default_construct
    }

    /// Returns the destruct operation, or `None` if values need no cleanup.
    #[must_use]
    pub fn destruct(&self) -> Option<ErasedFn> {
        self.destruct
    }
}
