//! Hardware capability probe for double-width compare-and-swap.

use std::sync::OnceLock;

/// Implementation selected for every [`DoubleWidthAtomic`](super::DoubleWidthAtomic)
/// in the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Hardware double-width compare-and-swap (`cmpxchg16b` on x86_64,
    /// `caspal` or `ldaxp`/`stlxp` on aarch64)
    Native,
    /// Striped spin lock around plain 128-bit reads and writes
    Locked,
}

static BACKEND: OnceLock<Backend> = OnceLock::new();

/// Returns the backend used for double-width atomics
///
/// The CPU is probed on the first call only. If no native double-width
/// compare-and-swap is available a warning is logged once and the locked
/// backend is used from then on.
#[inline]
pub fn backend() -> Backend {
    *BACKEND.get_or_init(|| select(probe()))
}

/// Whether this CPU supports a native double-width compare-and-swap
#[inline]
pub fn has_native_cas() -> bool {
    backend() == Backend::Native
}

fn select(native: bool) -> Backend {
    if native {
        tracing::debug!(arch = std::env::consts::ARCH, "using native 128-bit compare-and-swap");
        Backend::Native
    } else {
        tracing::warn!(
            arch = std::env::consts::ARCH,
            "native 128-bit compare-and-swap not supported, double-width atomics fall back to a spin lock and may not be reliable for lock-free use"
        );
        Backend::Locked
    }
}

#[cfg(target_arch = "x86_64")]
fn probe() -> bool {
    std::is_x86_feature_detected!("cmpxchg16b")
}

// Exclusive pair loads and stores are part of the base ARMv8-A ISA.
#[cfg(target_arch = "aarch64")]
fn probe() -> bool {
    true
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn probe() -> bool {
    false
}
