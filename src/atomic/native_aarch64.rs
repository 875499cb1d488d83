//! `caspal` / `ldaxp`+`stlxp` backend (aarch64).
//!
//! CPUs with the Large System Extensions get a single `caspal`. Everything
//! else uses an exclusive-pair loop, which every ARMv8-A core provides.

use core::arch::asm;
use std::sync::OnceLock;

use super::DoubleWidthValue;

static HAS_LSE: OnceLock<bool> = OnceLock::new();

#[inline]
fn has_lse() -> bool {
    *HAS_LSE.get_or_init(|| std::arch::is_aarch64_feature_detected!("lse"))
}

/// Atomically compares `*dst` with `current` and writes `new` on a match.
///
/// Returns `Ok(current)` on success and `Err(actual)` with the value found in
/// memory on failure. Both paths have acquire and release semantics.
///
/// # Safety
///
/// - `dst` must be valid for reads and writes and 16-byte aligned.
/// - Every concurrent access to `*dst` must go through this backend.
#[inline]
pub(super) unsafe fn compare_exchange(
    dst: *mut DoubleWidthValue,
    current: DoubleWidthValue,
    new: DoubleWidthValue,
) -> Result<DoubleWidthValue, DoubleWidthValue> {
    debug_assert_eq!(dst as usize % 16, 0);

    let previous = if has_lse() {
        compare_exchange_casp(dst, current, new)
    } else {
        compare_exchange_exclusive(dst, current, new)
    };

    if previous == current {
        Ok(previous)
    } else {
        Err(previous)
    }
}

/// Reads `*dst` as a single unit.
///
/// A compare-and-swap of zero with zero, as on x86_64: memory is left
/// untouched either way.
///
/// # Safety
///
/// Same contract as [`compare_exchange`].
#[inline]
pub(super) unsafe fn load(dst: *mut DoubleWidthValue) -> DoubleWidthValue {
    match compare_exchange(dst, DoubleWidthValue::ZERO, DoubleWidthValue::ZERO) {
        Ok(value) | Err(value) => value,
    }
}

// Register pairs for `casp` must start on an even register; the first
// register of a pair maps to the lower address, i.e. `low`.
#[inline]
#[target_feature(enable = "lse")]
unsafe fn compare_exchange_casp(
    dst: *mut DoubleWidthValue,
    current: DoubleWidthValue,
    new: DoubleWidthValue,
) -> DoubleWidthValue {
    let prev_low: u64;
    let prev_high: u64;

    asm!(
        "caspal x4, x5, x6, x7, [{dst}]",
        dst = in(reg) dst,
        inout("x4") current.low => prev_low,
        inout("x5") current.high => prev_high,
        in("x6") new.low,
        in("x7") new.high,
        options(nostack),
    );

    DoubleWidthValue::new(prev_low, prev_high)
}

// A pair load from `ldaxp` is only single-copy atomic once the matching
// `stlxp` succeeds, so the failure path stores the observed value back.
#[inline]
unsafe fn compare_exchange_exclusive(
    dst: *mut DoubleWidthValue,
    current: DoubleWidthValue,
    new: DoubleWidthValue,
) -> DoubleWidthValue {
    let prev_low: u64;
    let prev_high: u64;

    asm!(
        "2:",
        "ldaxp {prev_low}, {prev_high}, [{dst}]",
        "cmp {prev_low}, {cur_low}",
        "ccmp {prev_high}, {cur_high}, #0, eq",
        "b.ne 3f",
        "stlxp {status:w}, {new_low}, {new_high}, [{dst}]",
        "cbnz {status:w}, 2b",
        "b 4f",
        "3:",
        "stlxp {status:w}, {prev_low}, {prev_high}, [{dst}]",
        "cbnz {status:w}, 2b",
        "4:",
        dst = in(reg) dst,
        cur_low = in(reg) current.low,
        cur_high = in(reg) current.high,
        new_low = in(reg) new.low,
        new_high = in(reg) new.high,
        prev_low = out(reg) prev_low,
        prev_high = out(reg) prev_high,
        status = out(reg) _,
        options(nostack),
    );

    DoubleWidthValue::new(prev_low, prev_high)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_pair_cas() {
        let mut cell = DoubleWidthValue::new(1, 2);
        let dst: *mut DoubleWidthValue = &mut cell;

        unsafe {
            let seen =
                compare_exchange_exclusive(dst, DoubleWidthValue::new(1, 3), DoubleWidthValue::ZERO);
            assert_eq!(seen, DoubleWidthValue::new(1, 2));

            let seen =
                compare_exchange_exclusive(dst, DoubleWidthValue::new(1, 2), DoubleWidthValue::new(5, 6));
            assert_eq!(seen, DoubleWidthValue::new(1, 2));
        }
        assert_eq!(cell, DoubleWidthValue::new(5, 6));
    }

    #[test]
    fn test_casp_when_available() {
        if !has_lse() {
            return;
        }

        let mut cell = DoubleWidthValue::new(7, 8);
        let dst: *mut DoubleWidthValue = &mut cell;

        unsafe {
            let seen = compare_exchange_casp(dst, DoubleWidthValue::new(0, 8), DoubleWidthValue::ZERO);
            assert_eq!(seen, DoubleWidthValue::new(7, 8));

            let seen = compare_exchange_casp(dst, DoubleWidthValue::new(7, 8), DoubleWidthValue::new(9, 10));
            assert_eq!(seen, DoubleWidthValue::new(7, 8));
        }
        assert_eq!(cell, DoubleWidthValue::new(9, 10));
    }
}
