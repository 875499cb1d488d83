//! Stack Module
//!
//! Lock-free stack implementations built on the double-width atomic.

mod reclaim;
pub mod treiber;

pub use treiber::ConcurrentStack;
