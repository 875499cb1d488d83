//! Atomic and backoff shims so the ring buffer can run under `loom`.
//!
//! Build with `RUSTFLAGS="--cfg loom"` to swap in the model-checked types.

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicUsize, Ordering};

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicUsize, Ordering};

#[cfg(not(loom))]
pub(crate) use crossbeam_utils::Backoff;

/// Stand-in for `crossbeam_utils::Backoff` that yields to the loom scheduler.
#[cfg(loom)]
#[derive(Debug, Default)]
pub(crate) struct Backoff;

#[cfg(loom)]
impl Backoff {
    pub(crate) fn new() -> Self {
        Backoff
    }

    pub(crate) fn snooze(&self) {
        loom::thread::yield_now();
    }
}
