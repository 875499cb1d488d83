//! # widecas
//!
//! Lock-free concurrent primitives built around a double-width (128-bit)
//! compare-and-swap.
//!
//! ## Features
//!
//! - **DoubleWidthAtomic**: 128-bit atomic value backed by `lock cmpxchg16b`
//!   on x86_64 and `caspal` or `ldaxp`/`stlxp` on aarch64
//! - **BoundedRingBuffer**: Single-producer, single-consumer fixed-capacity queue
//! - **ConcurrentStack**: Multi-producer, multi-consumer Treiber stack using
//!   counted pointers to detect stale compare-and-swap attempts
//!
//! ## Quick Start
//!
//! ```rust
//! use widecas::{BoundedRingBuffer, ConcurrentStack};
//!
//! let stack = ConcurrentStack::new();
//! stack.push(1);
//! stack.push(2);
//! assert_eq!(stack.pop(), 2);
//!
//! let (mut producer, mut consumer) = BoundedRingBuffer::<u32, 4>::new().split();
//! producer.push(7);
//! assert_eq!(consumer.pop(), 7);
//! ```
//!
//! ## Hardware Requirements
//!
//! The double-width atomic needs a native 128-bit compare-and-swap. The
//! capability is probed once per process. When it is missing a warning is
//! emitted through `tracing` and every double-width operation goes through a
//! striped spin lock instead: values still never tear, but the stack stops
//! being lock-free.
//!
//! ## Memory Reclamation
//!
//! [`ConcurrentStack`] frees popped nodes immediately. A popper that read the
//! top pointer before another thread popped and freed that node will read the
//! freed node's `next` field before its compare-and-swap fails. Enable the
//! `epoch` feature to defer deallocation with `crossbeam-epoch`.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod atomic;
pub mod metrics;
pub mod ring;
pub mod stack;

mod sync;

pub use crate::atomic::{DoubleWidthAtomic, DoubleWidthValue};
pub use crate::ring::{BoundedRingBuffer, Consumer, Producer};
pub use crate::stack::ConcurrentStack;

/// Common utilities and helper types
pub mod util {
    use core::ops::{Deref, DerefMut};

    /// Cache line size for alignment purposes
    pub const CACHE_LINE_SIZE: usize = 64;

    /// Pads and aligns a value to the length of a cache line
    ///
    /// Used to keep the producer and consumer indices of the ring buffer, and
    /// the stack top, from sharing a line with neighbouring fields.
    #[repr(align(64))]
    #[derive(Default)]
    pub struct CachePadded<T> {
        value: T,
    }

    impl<T> CachePadded<T> {
        /// Create a new cache-padded value
        #[inline]
        pub const fn new(value: T) -> Self {
            Self { value }
        }

        /// Get the inner value
        #[inline]
        pub fn into_inner(self) -> T {
            self.value
        }
    }

    impl<T> Deref for CachePadded<T> {
        type Target = T;

        #[inline]
        fn deref(&self) -> &T {
            &self.value
        }
    }

    impl<T> DerefMut for CachePadded<T> {
        #[inline]
        fn deref_mut(&mut self) -> &mut T {
            &mut self.value
        }
    }

    impl<T: core::fmt::Debug> core::fmt::Debug for CachePadded<T> {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            core::fmt::Debug::fmt(&self.value, f)
        }
    }
}

/// Error returned by a non-blocking push when no slot is free
///
/// The rejected value is handed back so the caller can retry or drop it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Recover the value that could not be pushed
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> core::fmt::Debug for Full<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Full(..)")
    }
}

impl<T> core::fmt::Display for Full<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Ring buffer is full")
    }
}

impl<T> std::error::Error for Full<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_cache_padded() {
        assert_eq!(core::mem::align_of::<util::CachePadded<u8>>(), util::CACHE_LINE_SIZE);

        let mut padded = util::CachePadded::new(42);
        assert_eq!(*padded, 42);

        *padded = 100;
        assert_eq!(padded.into_inner(), 100);
    }

    #[test]
    fn test_full_error() {
        let err = Full(String::from("payload"));
        assert_eq!(err.to_string(), "Ring buffer is full");
        assert_eq!(format!("{:?}", err), "Full(..)");
        assert_eq!(err.into_inner(), "payload");
    }
}
