//! Double-width atomics
//!
//! This module provides a 128-bit atomic value for building counted pointers
//! and other two-word structures that must change as a single unit.
//!
//! ## Backends
//!
//! | Backend | Used when | Progress |
//! |---------|-----------|----------|
//! | Native | x86_64 with `cmpxchg16b` | Lock-free |
//! | Native | aarch64: `caspal` with LSE, `ldaxp`/`stlxp` loop otherwise | Lock-free |
//! | Locked | any other target or CPU | Blocking (striped spin lock) |
//!
//! The backend is chosen once per process by [`capability::backend`]. Every
//! backend is at least acquire-release, so the `Ordering` arguments accepted
//! by [`DoubleWidthAtomic`] never weaken the guarantee.
//!
//! ## Examples
//!
//! ```rust
//! use std::sync::atomic::Ordering;
//! use widecas::atomic::{DoubleWidthAtomic, DoubleWidthValue};
//!
//! let atomic = DoubleWidthAtomic::new(DoubleWidthValue::new(1, 1));
//! let mut expected = DoubleWidthValue::new(1, 1);
//! assert!(atomic.compare_exchange_strong(
//!     &mut expected,
//!     DoubleWidthValue::new(2, 2),
//!     Ordering::AcqRel,
//!     Ordering::Acquire,
//! ));
//! assert_eq!(atomic.load(Ordering::Acquire), DoubleWidthValue::new(2, 2));
//! ```

pub mod capability;
pub mod double_width;

mod fallback;
#[cfg(target_arch = "x86_64")]
mod native;
#[cfg(target_arch = "aarch64")]
#[path = "native_aarch64.rs"]
mod native;

pub use double_width::{DoubleWidthAtomic, DoubleWidthValue};
