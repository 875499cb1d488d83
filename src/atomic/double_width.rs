//! 128-bit atomic value
//!
//! [`DoubleWidthAtomic`] stores two 64-bit lanes that are only ever read and
//! written together. It is the single synchronization primitive underneath
//! [`ConcurrentStack`](crate::stack::ConcurrentStack).
//!
//! ## Memory Ordering
//!
//! Every method accepts `Ordering` arguments for parity with the standard
//! atomics. They are not used: the native backends are a `lock`-prefixed
//! instruction on x86_64 and acquire-release pair operations on aarch64, and
//! the locked backend takes a sequentially consistent lock, so every
//! operation is at least acquire-release whatever is requested.

use core::cell::UnsafeCell;
use core::fmt;
use core::sync::atomic::Ordering;

use super::fallback;
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
use super::{
    capability::{self, Backend},
    native,
};

/// A 128-bit value made of two 64-bit lanes
///
/// Aligned to 16 bytes as required by `cmpxchg16b` and the aarch64 pair instructions.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DoubleWidthValue {
    /// Least significant lane
    pub low: u64,
    /// Most significant lane
    pub high: u64,
}

impl DoubleWidthValue {
    /// Both lanes zero
    pub const ZERO: Self = Self::new(0, 0);

    /// Create a value from its two lanes
    #[inline]
    pub const fn new(low: u64, high: u64) -> Self {
        Self { low, high }
    }
}

impl From<u128> for DoubleWidthValue {
    #[inline]
    fn from(value: u128) -> Self {
        Self::new(value as u64, (value >> 64) as u64)
    }
}

impl From<DoubleWidthValue> for u128 {
    #[inline]
    fn from(value: DoubleWidthValue) -> Self {
        (u128::from(value.high) << 64) | u128::from(value.low)
    }
}

/// A double-width atomic cell
///
/// Loads never tear: a reader can never observe the `low` lane of one write
/// paired with the `high` lane of another.
///
/// # Examples
///
/// ```rust
/// use std::sync::atomic::Ordering;
/// use widecas::atomic::{DoubleWidthAtomic, DoubleWidthValue};
///
/// let atomic = DoubleWidthAtomic::default();
/// atomic.store(DoubleWidthValue::new(42, 24), Ordering::Release);
///
/// let value = atomic.load(Ordering::Acquire);
/// assert_eq!((value.low, value.high), (42, 24));
/// ```
#[repr(C, align(16))]
pub struct DoubleWidthAtomic {
    value: UnsafeCell<DoubleWidthValue>,
}

// SAFETY: every shared access to `value` goes through one of the atomic
// backends.
unsafe impl Send for DoubleWidthAtomic {}
unsafe impl Sync for DoubleWidthAtomic {}

impl DoubleWidthAtomic {
    /// Create a new atomic holding `value`
    #[inline]
    pub const fn new(value: DoubleWidthValue) -> Self {
        Self {
            value: UnsafeCell::new(value),
        }
    }

    /// Consume the atomic and return the contained value
    #[inline]
    pub fn into_inner(self) -> DoubleWidthValue {
        self.value.into_inner()
    }

    /// Get a mutable reference to the contained value
    ///
    /// Exclusive access makes atomic instructions unnecessary.
    #[inline]
    pub fn get_mut(&mut self) -> &mut DoubleWidthValue {
        self.value.get_mut()
    }

    /// Load the current value as a single 128-bit unit
    #[inline]
    pub fn load(&self, _order: Ordering) -> DoubleWidthValue {
        #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
        if capability::backend() == Backend::Native {
            // SAFETY: the cell is 16-byte aligned and the CPU supports the
            // instruction; the backend choice is process wide.
            return unsafe { native::load(self.value.get()) };
        }
        // SAFETY: the locked backend is the only one in use.
        unsafe { fallback::load(self.value.get()) }
    }

    /// Store `value`, replacing the current contents as a single unit
    ///
    /// There is no native 128-bit store; this retries a compare-and-swap
    /// against the last observed value until it succeeds.
    #[inline]
    pub fn store(&self, value: DoubleWidthValue, order: Ordering) {
        self.swap(value, order);
    }

    /// Store `value` and return the value it replaced
    #[inline]
    pub fn swap(&self, value: DoubleWidthValue, _order: Ordering) -> DoubleWidthValue {
        let mut current = DoubleWidthValue::ZERO;
        loop {
            match self.compare_exchange_raw(current, value) {
                Ok(previous) => return previous,
                Err(actual) => current = actual,
            }
        }
    }

    /// Store `new` if the current value equals `current`
    ///
    /// Returns `Ok` with the previous value on success and `Err` with the
    /// value actually observed on failure. The comparison is strong: it
    /// never fails spuriously.
    #[inline]
    pub fn compare_exchange(
        &self,
        current: DoubleWidthValue,
        new: DoubleWidthValue,
        _success: Ordering,
        _failure: Ordering,
    ) -> Result<DoubleWidthValue, DoubleWidthValue> {
        self.compare_exchange_raw(current, new)
    }

    /// Store `desired` if the current value equals `*expected`
    ///
    /// Returns `true` on success. On failure the stored value is left
    /// unchanged, `*expected` is overwritten with the value observed, and
    /// `false` is returned, so a retry loop can reuse `expected` directly.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::atomic::Ordering;
    /// use widecas::atomic::{DoubleWidthAtomic, DoubleWidthValue};
    ///
    /// let atomic = DoubleWidthAtomic::new(DoubleWidthValue::new(1, 1));
    /// let mut expected = DoubleWidthValue::new(3, 3);
    ///
    /// let swapped = atomic.compare_exchange_strong(
    ///     &mut expected,
    ///     DoubleWidthValue::new(2, 2),
    ///     Ordering::SeqCst,
    ///     Ordering::SeqCst,
    /// );
    /// assert!(!swapped);
    /// assert_eq!(expected, DoubleWidthValue::new(1, 1));
    /// ```
    #[inline]
    pub fn compare_exchange_strong(
        &self,
        expected: &mut DoubleWidthValue,
        desired: DoubleWidthValue,
        success: Ordering,
        failure: Ordering,
    ) -> bool {
        match self.compare_exchange(*expected, desired, success, failure) {
            Ok(_) => true,
            Err(actual) => {
                *expected = actual;
                false
            }
        }
    }

    #[inline]
    fn compare_exchange_raw(
        &self,
        current: DoubleWidthValue,
        new: DoubleWidthValue,
    ) -> Result<DoubleWidthValue, DoubleWidthValue> {
        #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
        if capability::backend() == Backend::Native {
            // SAFETY: see `load`.
            return unsafe { native::compare_exchange(self.value.get(), current, new) };
        }
        // SAFETY: see `load`.
        unsafe { fallback::compare_exchange(self.value.get(), current, new) }
    }
}

impl Default for DoubleWidthAtomic {
    fn default() -> Self {
        Self::new(DoubleWidthValue::ZERO)
    }
}

impl From<DoubleWidthValue> for DoubleWidthAtomic {
    fn from(value: DoubleWidthValue) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for DoubleWidthAtomic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.load(Ordering::SeqCst), f)
    }
}
