//! Striped spin-lock backend for CPUs without a native double-width CAS.
//!
//! Each 16-byte granule hashes to one of [`STRIPES`] cache-padded lock words.
//! All accesses to a given value therefore serialise on the same lock, which
//! keeps loads and compare-and-swaps indivisible.

use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};

use crossbeam_utils::Backoff;

use super::DoubleWidthValue;
use crate::util::CachePadded;

const STRIPES: usize = 64;

#[allow(clippy::declare_interior_mutable_const)]
const UNLOCKED: CachePadded<AtomicBool> = CachePadded::new(AtomicBool::new(false));

static LOCKS: [CachePadded<AtomicBool>; STRIPES] = [UNLOCKED; STRIPES];

struct StripeGuard {
    lock: &'static AtomicBool,
}

impl Drop for StripeGuard {
    #[inline]
    fn drop(&mut self) {
        self.lock.store(false, Ordering::SeqCst);
    }
}

#[inline]
fn lock_for(addr: usize) -> StripeGuard {
    let lock: &'static AtomicBool = &LOCKS[(addr >> 4) % STRIPES];
    let backoff = Backoff::new();
    while lock
        .compare_exchange_weak(false, true, Ordering::SeqCst, Ordering::Relaxed)
        .is_err()
    {
        backoff.snooze();
    }
    StripeGuard { lock }
}

/// # Safety
///
/// `dst` must be valid for reads and writes, and every concurrent access to
/// `*dst` must go through this backend.
#[inline]
pub(super) unsafe fn compare_exchange(
    dst: *mut DoubleWidthValue,
    current: DoubleWidthValue,
    new: DoubleWidthValue,
) -> Result<DoubleWidthValue, DoubleWidthValue> {
    let _guard = lock_for(dst as usize);
    let actual = ptr::read(dst);
    if actual == current {
        ptr::write(dst, new);
        Ok(actual)
    } else {
        Err(actual)
    }
}

/// # Safety
///
/// Same contract as [`compare_exchange`].
#[inline]
pub(super) unsafe fn load(dst: *mut DoubleWidthValue) -> DoubleWidthValue {
    let _guard = lock_for(dst as usize);
    ptr::read(dst)
}
