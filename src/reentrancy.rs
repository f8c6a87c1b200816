//! Debug-only guard against re-entering a map from its own key callbacks.
//!
//! `OrderedHashMap` runs user code (`K: Hash`, `K: Eq`) while it walks a
//! bucket chain. A key whose `Eq` reaches back into the same map would
//! observe a half-updated chain or order list, so every chain probe holds
//! a guard. Debug builds panic on nested entry; release
//! builds compile the guard away.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug)]
pub(crate) struct DebugReentrancy {
    #[cfg(debug_assertions)]
    active: Cell<bool>,
    // Single-threaded container: keep the owner !Send + !Sync.
    _nosend: PhantomData<*mut ()>,
}

impl DebugReentrancy {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(false),
            _nosend: PhantomData,
        }
    }

    /// Mark the owning map as busy until the returned guard drops.
    #[inline]
    pub(crate) fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.active.replace(true),
                "reentrancy detected: map accessed from inside a key callback"
            );
            ReentrancyGuard { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            ReentrancyGuard { _z: PhantomData }
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
    _z: PhantomData<&'a ()>,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.active.set(false);
    }
}

