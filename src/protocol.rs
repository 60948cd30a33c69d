//! Element protocols: the per-instance strategy every container calls instead
//! of assuming anything about its element type.
//!
//! A container never keeps a caller's value directly. It stores the result of
//! [`ElementProtocol::copy`] and hands each stored copy back to
//! [`ElementProtocol::destroy`] exactly once, on overwrite, removal, clear or
//! drop. `compare` decides key identity and `hash` must agree with it: two
//! elements that compare `Equal` must hash equal.
//!
//! Protocols are values, not type-level choices, so the same element type can
//! be stored under different protocols in different container instances.

use core::cmp::Ordering;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;
use std::rc::Rc;

/// Construct, copy, compare, hash and release elements of type `T`.
pub trait ElementProtocol<T> {
    /// Produce the value stored by `add`/`reset`-style operations.
    fn create_default(&self) -> T;

    /// Produce a copy whose lifetime is independent of `elem`.
    fn copy(&self, elem: &T) -> T;

    fn compare(&self, a: &T, b: &T) -> Ordering;

    fn hash(&self, elem: &T) -> u64;

    /// Release a stored copy. Called exactly once per copy the container made.
    fn destroy(&self, elem: T) {
        drop(elem);
    }
}

/// Protocol for ordinary owned values: `Default`, `Clone`, `Ord` and `Hash`
/// supply the four operations, and `S` digests the bytes fed by `Hash`.
#[derive(Clone, Debug, Default)]
pub struct Natural<S = DefaultHashBuilder> {
    hasher: S,
}

impl Natural {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> Natural<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self { hasher }
    }
}

impl<T, S> ElementProtocol<T> for Natural<S>
where
    T: Default + Clone + Ord + Hash,
    S: BuildHasher,
{
    #[inline]
    fn create_default(&self) -> T {
        T::default()
    }

    #[inline]
    fn copy(&self, elem: &T) -> T {
        elem.clone()
    }

    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }

    #[inline]
    fn hash(&self, elem: &T) -> u64 {
        self.hasher.hash_one(elem)
    }
}

/// Protocol for `f32`/`f64` using the IEEE 754 total order. Hashing uses the
/// bit pattern, which is consistent with `total_cmp` (`-0.0` and `+0.0` are
/// distinct under both).
#[derive(Clone, Debug, Default)]
pub struct TotalOrder<S = DefaultHashBuilder> {
    hasher: S,
}

impl TotalOrder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> TotalOrder<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self { hasher }
    }
}

macro_rules! total_order_protocol {
    ($($t:ty),*) => {$(
        impl<S: BuildHasher> ElementProtocol<$t> for TotalOrder<S> {
            #[inline]
            fn create_default(&self) -> $t {
                0.0
            }

            #[inline]
            fn copy(&self, elem: &$t) -> $t {
                *elem
            }

            #[inline]
            fn compare(&self, a: &$t, b: &$t) -> Ordering {
                a.total_cmp(b)
            }

            #[inline]
            fn hash(&self, elem: &$t) -> u64 {
                self.hasher.hash_one(elem.to_bits())
            }
        }
    )*};
}

total_order_protocol!(f32, f64);

/// [`Natural`] with a caller-supplied comparator.
///
/// Hashing still goes through `T: Hash`. When the comparator treats distinct
/// values as equal (ordering by a priority field, say), only use this
/// protocol where hashing is not consulted, such as an [`OrderedSet`].
///
/// [`OrderedSet`]: crate::OrderedSet
#[derive(Clone)]
pub struct OrderBy<F, S = DefaultHashBuilder> {
    compare: F,
    hasher: S,
}

impl<F> OrderBy<F> {
    pub fn new(compare: F) -> Self {
        Self {
            compare,
            hasher: DefaultHashBuilder::default(),
        }
    }
}

impl<F, S> OrderBy<F, S> {
    pub fn with_hasher(compare: F, hasher: S) -> Self {
        Self { compare, hasher }
    }
}

impl<F, S> fmt::Debug for OrderBy<F, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderBy").finish_non_exhaustive()
    }
}

impl<T, F, S> ElementProtocol<T> for OrderBy<F, S>
where
    T: Default + Clone + Hash,
    F: Fn(&T, &T) -> Ordering,
    S: BuildHasher,
{
    fn create_default(&self) -> T {
        T::default()
    }

    fn copy(&self, elem: &T) -> T {
        elem.clone()
    }

    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.compare)(a, b)
    }

    fn hash(&self, elem: &T) -> u64 {
        self.hasher.hash_one(elem)
    }
}

/// Identity strategy for already-shared data.
///
/// Elements are `Option<Rc<U>>`. The default is `None`, `copy` shares the
/// allocation instead of duplicating it, and `compare`/`hash` use the
/// allocation address, so two separately allocated but equal payloads are
/// different elements. `destroy` releases the container's share.
#[derive(Clone, Debug, Default)]
pub struct Shallow<S = DefaultHashBuilder> {
    hasher: S,
}

impl Shallow {
    pub fn new() -> Self {
        Self::default()
    }
}

fn address<U: ?Sized>(elem: &Option<Rc<U>>) -> Option<usize> {
    elem.as_ref().map(|rc| Rc::as_ptr(rc).cast::<()>() as usize)
}

impl<U: ?Sized, S: BuildHasher> ElementProtocol<Option<Rc<U>>> for Shallow<S> {
    fn create_default(&self) -> Option<Rc<U>> {
        None
    }

    fn copy(&self, elem: &Option<Rc<U>>) -> Option<Rc<U>> {
        elem.clone()
    }

    fn compare(&self, a: &Option<Rc<U>>, b: &Option<Rc<U>>) -> Ordering {
        address(a).cmp(&address(b))
    }

    fn hash(&self, elem: &Option<Rc<U>>) -> u64 {
        self.hasher.hash_one(address(elem))
    }
}
