//! Node reclamation for the stack.
//!
//! Without the `epoch` feature a popped node is freed as soon as its payload
//! has been moved out. With it, every pop runs inside a `crossbeam-epoch`
//! critical section and nodes are only freed once no pinned thread can still
//! be reading them.

use std::boxed::Box;

/// Critical section protecting node reads during one pop attempt.
pub(super) struct Guard {
    #[cfg(feature = "epoch")]
    inner: crossbeam_epoch::Guard,
}

#[inline]
pub(super) fn pin() -> Guard {
    Guard {
        #[cfg(feature = "epoch")]
        inner: crossbeam_epoch::pin(),
    }
}

impl Guard {
    /// Free a node that has been unlinked from the stack.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `Box::into_raw`, must no longer be reachable from
    /// the stack, and must be retired exactly once. Its drop glue must not
    /// touch anything but the allocation itself.
    #[inline]
    pub(super) unsafe fn retire<N>(&self, ptr: *mut N) {
        #[cfg(feature = "epoch")]
        self.inner.defer_unchecked(move || drop(Box::from_raw(ptr)));

        #[cfg(not(feature = "epoch"))]
        drop(Box::from_raw(ptr));
    }
}
