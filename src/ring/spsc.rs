//! Single-Producer, Single-Consumer (SPSC) Ring Buffer
//!
//! A fixed-size ring of `N` slots shared between exactly one producer thread
//! and exactly one consumer thread, synchronised by two indices:
//!
//! - `head`: next slot the consumer will read, written only by the consumer
//! - `tail`: next slot the producer will write, written only by the producer
//!
//! ```text
//! Empty State:    head == tail
//! Full State:     (tail + 1) % N == head
//! ```
//!
//! One slot is always left unused so the two states can be told apart, which
//! gives a usable capacity of `N - 1`.
//!
//! ## Thread Safety
//!
//! The raw operations on [`BoundedRingBuffer`] are `unsafe`: calling `push`
//! from two threads, or `pop` from two threads, races on the slots. Use
//! [`BoundedRingBuffer::split`] to get a [`Producer`] and a [`Consumer`] that
//! enforce the one-writer/one-reader discipline through ownership.

use core::cell::UnsafeCell;
use core::fmt;
use core::mem;
use std::boxed::Box;
use std::sync::Arc;

use crate::sync::{AtomicUsize, Backoff, Ordering};
use crate::util::CachePadded;
use crate::Full;

/// A bounded single-producer, single-consumer ring buffer
///
/// `N` is the number of slots and must be at least 2; the buffer holds at most
/// `N - 1` elements. Slots are filled with `T::default()` at construction and
/// after each pop.
///
/// # Examples
///
/// ```rust
/// use widecas::ring::BoundedRingBuffer;
///
/// let (mut producer, mut consumer) = BoundedRingBuffer::<i32, 4>::new().split();
///
/// producer.push(1);
/// producer.push(2);
/// producer.push(3);
/// assert!(producer.is_full());
/// assert!(producer.try_push(4).is_err());
///
/// assert_eq!(consumer.pop(), 1);
/// assert_eq!(consumer.try_pop(), Some(2));
/// assert_eq!(consumer.len(), 1);
/// ```
pub struct BoundedRingBuffer<T, const N: usize> {
    slots: Box<[UnsafeCell<T>]>,

    // Next slot to pop. Stored only by the consumer.
    head: CachePadded<AtomicUsize>,

    // Next slot to push. Stored only by the producer.
    tail: CachePadded<AtomicUsize>,
}

// SAFETY: the producer only touches the slot at `tail` and the consumer only
// the slot at `head`; the index hand-off orders those accesses. Callers of the
// unsafe operations promise there is at most one of each.
unsafe impl<T: Send, const N: usize> Send for BoundedRingBuffer<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for BoundedRingBuffer<T, N> {}

impl<T, const N: usize> BoundedRingBuffer<T, N> {
    const VALID_SIZE: () = assert!(N > 1, "Buffer size must be greater than 1");

    #[inline]
    const fn next(index: usize) -> usize {
        let next = index + 1;
        if next == N {
            0
        } else {
            next
        }
    }

    /// Maximum number of elements the buffer can hold, `N - 1`
    #[inline]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Number of elements currently enqueued
    ///
    /// Computed from one relaxed read of each index. The result is advisory:
    /// it may be stale as soon as it is returned if the other side is active.
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);

        if tail < head {
            tail + N - head
        } else {
            tail - head
        }
    }

    /// Whether the buffer appears empty (advisory)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the buffer appears to hold `N - 1` elements (advisory)
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }
}

impl<T: Default, const N: usize> BoundedRingBuffer<T, N> {
    /// Create an empty ring buffer with `N` default-initialised slots
    ///
    /// # Examples
    ///
    /// ```rust
    /// use widecas::ring::BoundedRingBuffer;
    ///
    /// let ring: BoundedRingBuffer<u8, 8> = BoundedRingBuffer::new();
    /// assert_eq!(ring.capacity(), 7);
    /// assert!(ring.is_empty());
    /// ```
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_SIZE;

        Self {
            slots: (0..N).map(|_| UnsafeCell::new(T::default())).collect(),
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Move the buffer behind an `Arc` and hand out its two endpoints
    pub fn split(self) -> (Producer<T, N>, Consumer<T, N>) {
        let ring = Arc::new(self);
        (
            Producer {
                ring: Arc::clone(&ring),
            },
            Consumer { ring },
        )
    }

    /// Push `value`, backing off until a slot is free
    ///
    /// # Safety
    ///
    /// Only one thread may act as producer (call `push` or `try_push`) over
    /// the lifetime of the buffer.
    pub unsafe fn push(&self, value: T) {
        let tail = self.tail.load(Ordering::Relaxed);
        let next = Self::next(tail);

        let backoff = Backoff::new();
        while next == self.head.load(Ordering::Acquire) {
            backoff.snooze();
        }

        *self.slots[tail].get() = value;
        self.tail.store(next, Ordering::Release);
    }

    /// Push `value` if a slot is free, without waiting
    ///
    /// Returns the value inside [`Full`] when the buffer is full.
    ///
    /// # Safety
    ///
    /// Same contract as [`push`](Self::push).
    pub unsafe fn try_push(&self, value: T) -> Result<(), Full<T>> {
        let tail = self.tail.load(Ordering::Relaxed);
        let next = Self::next(tail);

        if next == self.head.load(Ordering::Acquire) {
            return Err(Full(value));
        }

        *self.slots[tail].get() = value;
        self.tail.store(next, Ordering::Release);
        Ok(())
    }

    /// Pop the oldest element, backing off until one is available
    ///
    /// # Safety
    ///
    /// Only one thread may act as consumer (call `pop` or `try_pop`) over the
    /// lifetime of the buffer.
    pub unsafe fn pop(&self) -> T {
        let head = self.head.load(Ordering::Relaxed);

        let backoff = Backoff::new();
        while head == self.tail.load(Ordering::Acquire) {
            backoff.snooze();
        }

        let value = mem::take(&mut *self.slots[head].get());
        self.head.store(Self::next(head), Ordering::Release);
        value
    }

    /// Pop the oldest element if there is one, without waiting
    ///
    /// # Safety
    ///
    /// Same contract as [`pop`](Self::pop).
    pub unsafe fn try_pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);

        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }

        let value = mem::take(&mut *self.slots[head].get());
        self.head.store(Self::next(head), Ordering::Release);
        Some(value)
    }
}

impl<T: Default, const N: usize> Default for BoundedRingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> fmt::Debug for BoundedRingBuffer<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedRingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

/// Write endpoint of a [`BoundedRingBuffer`]
///
/// There is exactly one producer per buffer. It can be moved to another
/// thread but not cloned.
pub struct Producer<T, const N: usize> {
    ring: Arc<BoundedRingBuffer<T, N>>,
}

impl<T: Default, const N: usize> Producer<T, N> {
    /// Push `value`, backing off until a slot is free
    #[inline]
    pub fn push(&mut self, value: T) {
        // SAFETY: this handle is the only producer.
        unsafe { self.ring.push(value) }
    }

    /// Push `value` if a slot is free, handing it back otherwise
    #[inline]
    pub fn try_push(&mut self, value: T) -> Result<(), Full<T>> {
        // SAFETY: this handle is the only producer.
        unsafe { self.ring.try_push(value) }
    }
}

/// Read endpoint of a [`BoundedRingBuffer`]
///
/// There is exactly one consumer per buffer. It can be moved to another
/// thread but not cloned.
pub struct Consumer<T, const N: usize> {
    ring: Arc<BoundedRingBuffer<T, N>>,
}

impl<T: Default, const N: usize> Consumer<T, N> {
    /// Pop the oldest element, backing off until one is available
    #[inline]
    pub fn pop(&mut self) -> T {
        // SAFETY: this handle is the only consumer.
        unsafe { self.ring.pop() }
    }

    /// Pop the oldest element if there is one
    #[inline]
    pub fn try_pop(&mut self) -> Option<T> {
        // SAFETY: this handle is the only consumer.
        unsafe { self.ring.try_pop() }
    }
}

macro_rules! endpoint_snapshots {
    ($endpoint:ident) => {
        impl<T, const N: usize> $endpoint<T, N> {
            /// Maximum number of elements the buffer can hold, `N - 1`
            #[inline]
            pub const fn capacity(&self) -> usize {
                N - 1
            }

            /// Advisory element count, see [`BoundedRingBuffer::len`]
            #[inline]
            pub fn len(&self) -> usize {
                self.ring.len()
            }

            /// Whether the buffer appears empty (advisory)
            #[inline]
            pub fn is_empty(&self) -> bool {
                self.ring.is_empty()
            }

            /// Whether the buffer appears full (advisory)
            #[inline]
            pub fn is_full(&self) -> bool {
                self.ring.is_full()
            }
        }

        impl<T, const N: usize> fmt::Debug for $endpoint<T, N> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($endpoint))
                    .field("ring", &self.ring)
                    .finish()
            }
        }
    };
}

endpoint_snapshots!(Producer);
endpoint_snapshots!(Consumer);
