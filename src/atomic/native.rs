//! `lock cmpxchg16b` backend (x86_64).

use core::arch::asm;

use super::DoubleWidthValue;

/// Atomically compares `*dst` with `current` and writes `new` on a match.
///
/// Returns `Ok(current)` on success and `Err(actual)` with the value found in
/// memory on failure. The locked instruction is a full barrier.
///
/// # Safety
///
/// - `dst` must be valid for reads and writes and 16-byte aligned.
/// - The CPU must support `cmpxchg16b`.
/// - Every concurrent access to `*dst` must go through this backend.
#[inline]
pub(super) unsafe fn compare_exchange(
    dst: *mut DoubleWidthValue,
    current: DoubleWidthValue,
    new: DoubleWidthValue,
) -> Result<DoubleWidthValue, DoubleWidthValue> {
    debug_assert_eq!(dst as usize % 16, 0);

    let prev_low: u64;
    let prev_high: u64;
    let ok: u8;

    // rbx is reserved by LLVM, so the low half of `new` is swapped in and the
    // original rbx restored afterwards.
    asm!(
        "xchg {rbx_tmp}, rbx",
        "lock cmpxchg16b xmmword ptr [{dst}]",
        "sete {ok}",
        "mov rbx, {rbx_tmp}",
        dst = in(reg) dst,
        rbx_tmp = inout(reg) new.low => _,
        ok = out(reg_byte) ok,
        in("rcx") new.high,
        inout("rax") current.low => prev_low,
        inout("rdx") current.high => prev_high,
        options(nostack),
    );

    let previous = DoubleWidthValue::new(prev_low, prev_high);
    if ok != 0 {
        Ok(previous)
    } else {
        Err(previous)
    }
}

/// Reads `*dst` as a single unit.
///
/// Implemented as a compare-and-swap of zero with zero: either the stored
/// value is zero and is rewritten unchanged, or the comparison fails and the
/// current value is returned. Both outcomes leave memory untouched.
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
