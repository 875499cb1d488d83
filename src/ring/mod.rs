//! Ring buffer implementations
//!
//! This module provides a bounded single-producer, single-consumer ring buffer.
//!
//! ## Available Ring Buffers
//!
//! - [`BoundedRingBuffer`]: fixed-capacity SPSC queue sized by a const generic
//!
//! ## Design
//!
//! - **No CAS**: only `Acquire` loads and `Release` stores on two indices
//! - **One reserved slot**: `N` slots hold at most `N - 1` elements so that
//!   `head == tail` always means empty
//! - **Busy waiting**: blocking operations spin, they never park the thread
//! - **Cache optimization**: `head` and `tail` live on separate cache lines
//!
//! ## Memory Ordering Model
//!
//! ```text
//! Producer (push)                    Consumer (pop)
//! -----------                        ----------
//! Write slot      ---->              Read slot
//! Store tail      ---->              Load tail
//!   (Release)                           (Acquire)
//! Load head       <----              Store head
//!   (Acquire)                           (Release)
//! ```
//!
//! ## Examples
//!
//! ```rust
//! use widecas::ring::BoundedRingBuffer;
//! use std::thread;
//!
//! let (mut producer, mut consumer) = BoundedRingBuffer::<u64, 16>::new().split();
//!
//! let handle = thread::spawn(move || {
//!     for i in 0..100 {
//!         producer.push(i);
//!     }
//! });
//!
//! let sum: u64 = (0..100).map(|_| consumer.pop()).sum();
//! handle.join().unwrap();
//! assert_eq!(sum, 4950);
//! ```

pub mod spsc;

pub use spsc::{BoundedRingBuffer, Consumer, Producer};


#[cfg(all(test, not(loom)))]
mod proptests;
