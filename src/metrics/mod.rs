//! Contention Metrics Module
//!
//! Counters describing how often operations on a lock-free structure
//! completed and how often they lost a compare-and-swap race and had to retry.
//! All counters are relaxed and advisory.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Snapshot of the counters of one data structure
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceMetrics {
    /// Number of completed operations
    pub successful_operations: u64,
    /// Number of non-blocking operations that returned without effect
    pub failed_operations: u64,
    /// Number of compare-and-swap attempts that lost a race
    pub contended_operations: u64,
}

impl PerformanceMetrics {
    /// Completed plus failed operations
    pub fn total_operations(&self) -> u64 {
        self.successful_operations + self.failed_operations
    }

    /// Retries per completed operation, as a percentage
    pub fn contention_rate(&self) -> f64 {
        if self.successful_operations == 0 {
            0.0
        } else {
            (self.contended_operations as f64 / self.successful_operations as f64) * 100.0
        }
    }
}

/// Internal atomic counters
#[derive(Debug, Default)]
pub(crate) struct AtomicMetrics {
    disabled: AtomicBool,
    successful_operations: AtomicU64,
    failed_operations: AtomicU64,
    contended_operations: AtomicU64,
}

impl AtomicMetrics {
    #[inline]
    fn enabled(&self) -> bool {
        !self.disabled.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn record_success(&self) {
        if self.enabled() {
            self.successful_operations.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_failure(&self) {
        if self.enabled() {
            self.failed_operations.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_contention(&self) {
        if self.enabled() {
            self.contended_operations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> PerformanceMetrics {
        PerformanceMetrics {
            successful_operations: self.successful_operations.load(Ordering::Relaxed),
            failed_operations: self.failed_operations.load(Ordering::Relaxed),
            contended_operations: self.contended_operations.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        self.successful_operations.store(0, Ordering::Relaxed);
        self.failed_operations.store(0, Ordering::Relaxed);
        self.contended_operations.store(0, Ordering::Relaxed);
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.disabled.store(!enabled, Ordering::Relaxed);
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled()
    }
}

/// Trait for data structures that collect contention metrics
pub trait MetricsCollector {
    /// Get current metrics
    fn metrics(&self) -> PerformanceMetrics;

    /// Reset all counters to zero
    fn reset_metrics(&self);

    /// Enable or disable collection (enabled by default)
    fn set_metrics_enabled(&self, enabled: bool);

    /// Check if collection is enabled
    fn is_metrics_enabled(&self) -> bool;
}
