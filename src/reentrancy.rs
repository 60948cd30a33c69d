//! Debug-only detection of nested entry into a container.
//!
//! Protocol callbacks (`compare`, `hash`, `copy`) are user code. While a
//! table is probing or a tree is detached from its root, that code must not
//! call back into the same container. Debug builds panic when it does;
//! release builds compile the tracker down to nothing.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

/// Per-container entry tracker. Hold the guard returned by [`enter`] across
/// any region that runs user callbacks against transient state.
///
/// [`enter`]: DebugReentrancy::enter
#[derive(Debug)]
pub(crate) struct DebugReentrancy {
    #[cfg(debug_assertions)]
    active: Cell<bool>,
    // Containers are single-threaded; this keeps them !Send + !Sync.
    _single_thread: PhantomData<*mut ()>,
}

impl DebugReentrancy {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(false),
            _single_thread: PhantomData,
        }
    }

    /// Mark the container busy until the guard drops. Panics in debug builds
    /// if it is already busy.
    #[inline]
    pub(crate) fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.active.replace(true),
                "container re-entered from a protocol callback"
            );
            ReentrancyGuard { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            ReentrancyGuard {
                _owner: PhantomData,
            }
        }
    }
}

impl Default for DebugReentrancy {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _owner: PhantomData<&'a ()>,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.active.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::DebugReentrancy;

    #[test]
    fn sequential_entries_are_allowed() {
        let r = DebugReentrancy::new();
        drop(r.enter());
        drop(r.enter());
    }

    #[cfg(debug_assertions)]
    #[test]
    fn nested_entry_panics_in_debug() {
        let r = DebugReentrancy::new();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _outer = r.enter();
            let _inner = r.enter();
        }));
        assert!(res.is_err(), "expected nested entry to panic in debug builds");
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn nested_entry_is_noop_in_release() {
        let r = DebugReentrancy::new();
        let _outer = r.enter();
        let _inner = r.enter();
    }
}
