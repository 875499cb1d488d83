//! Counted-Pointer Treiber Stack
//!
//! A lock-free multi-producer, multi-consumer stack based on Treiber's
//! algorithm. The top of the stack is a [`DoubleWidthAtomic`] holding a
//! counted pointer:
//!
//! ```text
//! low  = address of the top node (0 when empty)
//! high = generation of the push that linked it
//! ```
//!
//! Every push takes a fresh generation from a per-stack counter, so a
//! compare-and-swap against a stale top fails even when the allocator has
//! handed the same address to a newer node.
//!
//! ## Memory Reclamation
//!
//! With default features a popped node is freed immediately. A concurrent
//! popper that loaded the old top before the pop completed still reads the
//! freed node's `next` field; its compare-and-swap then fails and it retries,
//! but the read itself touches released memory. The generation check is
//! defeated only if the counter wraps (2^64 pushes) while such a stale
//! reference is held. Enable the `epoch` feature to defer frees until no
//! popper can still hold a reference.

use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ptr;
use core::sync::atomic::{AtomicIsize, AtomicU64, Ordering};
use std::boxed::Box;
use std::vec::Vec;

use crossbeam_utils::Backoff;

use super::reclaim;
use crate::atomic::{DoubleWidthAtomic, DoubleWidthValue};
use crate::metrics::{AtomicMetrics, MetricsCollector, PerformanceMetrics};
use crate::util::CachePadded;

/// A node in the stack
struct Node<T> {
    value: ManuallyDrop<T>,
    next: DoubleWidthValue,
}

#[inline]
fn counted<T>(node: *mut Node<T>, generation: u64) -> DoubleWidthValue {
    DoubleWidthValue::new(node as usize as u64, generation)
}

#[inline]
fn node_ptr<T>(counted: DoubleWidthValue) -> *mut Node<T> {
    counted.low as usize as *mut Node<T>
}

#[inline]
fn is_null(counted: DoubleWidthValue) -> bool {
    counted.low == 0
}

/// A lock-free stack using counted pointers
///
/// # Type Parameters
///
/// * `T` - The type of elements stored in the stack
///
/// # Examples
///
/// ```rust
/// use widecas::stack::ConcurrentStack;
///
/// let stack = ConcurrentStack::new();
///
/// stack.push(1);
/// stack.push(2);
/// stack.push(3);
///
/// assert_eq!(stack.pop(), 3);
/// assert_eq!(stack.pop(), 2);
/// assert_eq!(stack.try_pop(), Some(1));
/// assert_eq!(stack.try_pop(), None);
/// ```
pub struct ConcurrentStack<T> {
    /// Counted pointer to the top node
    top: CachePadded<DoubleWidthAtomic>,
    /// Last generation handed out by `push`
    generation: AtomicU64,
    /// Advisory element count; may dip below zero while a pop overtakes the
    /// increment of the push it unlinked
    len: AtomicIsize,
    metrics: AtomicMetrics,
    _marker: PhantomData<Box<Node<T>>>,
}

// SAFETY: values are moved between threads but never shared; the top pointer
// is the only shared mutable location.
unsafe impl<T: Send> Send for ConcurrentStack<T> {}
unsafe impl<T: Send> Sync for ConcurrentStack<T> {}

impl<T> ConcurrentStack<T> {
    /// Create a new empty stack
    ///
    /// The generation counter starts at zero.
    pub fn new() -> Self {
        Self {
            top: CachePadded::new(DoubleWidthAtomic::new(DoubleWidthValue::ZERO)),
            generation: AtomicU64::new(0),
            len: AtomicIsize::new(0),
            metrics: AtomicMetrics::default(),
            _marker: PhantomData,
        }
    }

    /// Push a value onto the stack
    ///
    /// Never fails. Retries its compare-and-swap for as long as other threads
    /// keep changing the top.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use widecas::stack::ConcurrentStack;
    ///
    /// let stack = ConcurrentStack::new();
    /// stack.push(42);
    /// assert!(!stack.is_empty());
    /// ```
    pub fn push(&self, value: T) {
        let mut top = self.top.load(Ordering::Acquire);
        let node = Box::into_raw(Box::new(Node {
            value: ManuallyDrop::new(value),
            next: top,
        }));

        let generation = self.generation.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let tagged = counted(node, generation);
        let backoff = Backoff::new();

        loop {
            // SAFETY: the node stays private to this thread until the
            // compare-and-swap below publishes it.
            unsafe { ptr::addr_of_mut!((*node).next).write(top) };

            if self
                .top
                .compare_exchange_strong(&mut top, tagged, Ordering::AcqRel, Ordering::Acquire)
            {
                break;
            }

            self.metrics.record_contention();
            backoff.spin();
        }

        self.len.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_success();
    }

    /// Pop the top value, spinning while the stack is empty
    ///
    /// Blocks forever if nothing is ever pushed. Use [`try_pop`](Self::try_pop)
    /// for a non-blocking variant.
    pub fn pop(&self) -> T {
        let backoff = Backoff::new();
        loop {
            if let Some(value) = self.unlink_top() {
                return value;
            }
            backoff.snooze();
        }
    }

    /// Pop the top value if the stack is not empty
    ///
    /// Follows the same compare-and-swap retry loop as [`pop`](Self::pop) but
    /// returns `None` as soon as it observes an empty stack.
    pub fn try_pop(&self) -> Option<T> {
        let value = self.unlink_top();
        if value.is_none() {
            self.metrics.record_failure();
        }
        value
    }

    /// Retries until it unlinks a node or observes an empty stack.
    fn unlink_top(&self) -> Option<T> {
        let backoff = Backoff::new();
        loop {
            let guard = reclaim::pin();
            let top = self.top.load(Ordering::Acquire);
            if is_null(top) {
                return None;
            }

            let node = node_ptr::<T>(top);
            // SAFETY: `node` was linked when `top` was read. Under default
            // features it may have been freed since (see module docs); with
            // `epoch` the guard keeps it allocated.
            let next = unsafe { ptr::addr_of!((*node).next).read() };

            if self
                .top
                .compare_exchange(top, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.len.fetch_sub(1, Ordering::Relaxed);
                self.metrics.record_success();

                // SAFETY: winning the compare-and-swap transfers ownership of
                // the node to this thread, and the payload is taken only once.
                unsafe {
                    let value = ManuallyDrop::take(&mut (*node).value);
                    guard.retire(node);
                    return Some(value);
                }
            }

            self.metrics.record_contention();
            backoff.spin();
        }
    }

    /// Check if the stack is empty
    ///
    /// A snapshot: other threads may push or pop immediately afterwards.
    pub fn is_empty(&self) -> bool {
        is_null(self.top.load(Ordering::Acquire))
    }

    /// Approximate number of elements in the stack
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed).max(0) as usize
    }

    /// Pop up to `max_count` elements without waiting
    ///
    /// Stops early when the stack is observed empty. Elements are returned in
    /// pop (LIFO) order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use widecas::stack::ConcurrentStack;
    ///
    /// let stack = ConcurrentStack::new();
    /// stack.push_batch(vec![1, 2, 3]);
    ///
    /// assert_eq!(stack.pop_batch(2), vec![3, 2]);
    /// assert_eq!(stack.pop_batch(5), vec![1]);
    /// ```
    pub fn pop_batch(&self, max_count: usize) -> Vec<T> {
        let mut result = Vec::with_capacity(max_count.min(self.len()));

        for _ in 0..max_count {
            match self.unlink_top() {
                Some(value) => result.push(value),
                None => break,
            }
        }

        result
    }

    /// Push every element of `values` in iteration order
    ///
    /// The last element ends up on top.
    pub fn push_batch<I>(&self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.push(value);
        }
    }
}

impl<T> Default for ConcurrentStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ConcurrentStack<T> {
    fn drop(&mut self) {
        // `&mut self` guarantees no other thread is pushing or popping, so the
        // unlinking compare-and-swaps below cannot fail.
        let mut top = self.top.load(Ordering::Acquire);

        while !is_null(top) {
            let node = node_ptr::<T>(top);
            // SAFETY: every node still linked is owned by the stack.
            let next = unsafe { (*node).next };

            let unlinked = self
                .top
                .compare_exchange(top, next, Ordering::AcqRel, Ordering::Acquire);
            debug_assert!(unlinked.is_ok(), "stack modified during drop");

            // SAFETY: the node is unlinked and was created by `Box::into_raw`.
            unsafe {
                let mut node = Box::from_raw(node);
                ManuallyDrop::drop(&mut node.value);
            }
            top = next;
        }
    }
}

impl<T> core::fmt::Debug for ConcurrentStack<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConcurrentStack")
            .field("len", &self.len())
            .field("top", &*self.top)
            .finish()
    }
}

impl<T> MetricsCollector for ConcurrentStack<T> {
    fn metrics(&self) -> PerformanceMetrics {
        self.metrics.snapshot()
    }

    fn reset_metrics(&self) {
        self.metrics.reset();
    }

    fn set_metrics_enabled(&self, enabled: bool) {
        self.metrics.set_enabled(enabled);
    }

    fn is_metrics_enabled(&self) -> bool {
        self.metrics.is_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64 as StdAtomicU64, AtomicUsize};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::vec;

    #[test]
    fn test_basic_operations() {
        let stack = ConcurrentStack::new();

        assert!(stack.is_empty());
        assert_eq!(stack.len(), 0);
        assert_eq!(stack.try_pop(), None);

        stack.push(1);
        assert!(!stack.is_empty());
        assert_eq!(stack.pop(), 1);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_lifo_order() {
        let stack = ConcurrentStack::new();
        let values = [1, 2, 3, 4, 5];

        for value in values {
            stack.push(value);
        }
        assert_eq!(stack.len(), 5);

        for expected in values.iter().rev() {
            assert_eq!(stack.pop(), *expected);
        }
        assert!(stack.is_empty());
        assert_eq!(stack.len(), 0);
    }

    #[test]
    fn test_batch_operations() {
        let stack = ConcurrentStack::new();

        stack.push_batch(vec![1, 2, 3, 4, 5]);
        assert_eq!(stack.len(), 5);

        let elements = stack.pop_batch(3);
        assert_eq!(elements, vec![5, 4, 3]);
        assert_eq!(stack.len(), 2);

        assert_eq!(stack.pop(), 2);
        assert_eq!(stack.pop(), 1);
        assert!(stack.pop_batch(4).is_empty());
    }

    #[test]
    fn test_pop_batch_unbounded_count() {
        let stack = ConcurrentStack::new();
        stack.push_batch([1, 2, 3]);

        assert_eq!(stack.pop_batch(usize::MAX), vec![3, 2, 1]);
        assert!(stack.pop_batch(usize::MAX).is_empty());

        stack.push(4);
        assert_eq!(stack.pop_batch(usize::MAX / 2), vec![4]);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_generation_per_push() {
        let stack = ConcurrentStack::new();

        stack.push('a');
        stack.push('b');
        stack.push('c');
        assert_eq!(stack.top.load(Ordering::SeqCst).high, 3);

        // Popping restores the counted pointer stored in the node below
        stack.pop();
        assert_eq!(stack.top.load(Ordering::SeqCst).high, 2);

        stack.push('d');
        assert_eq!(stack.top.load(Ordering::SeqCst).high, 4);
        assert_eq!(stack.generation.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_stale_counted_pointer_is_rejected() {
        let stack = ConcurrentStack::new();

        stack.push(1u64);
        let stale = stack.top.load(Ordering::SeqCst);
        assert_eq!(stack.pop(), 1);

        // The allocator is free to hand the same address to this node
        stack.push(2u64);
        let current = stack.top.load(Ordering::SeqCst);
        assert_ne!(stale, current);

        let res = stack.top.compare_exchange(
            stale,
            DoubleWidthValue::ZERO,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        assert_eq!(res, Err(current));
        assert_eq!(stack.pop(), 2);
    }

    #[test]
    fn test_concurrent_push_no_loss_no_duplicates() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 1000;

        let stack = Arc::new(ConcurrentStack::new());
        let mut handles = vec![];

        for i in 0..THREADS {
            let stack = Arc::clone(&stack);
            handles.push(thread::spawn(move || {
                for j in 0..PER_THREAD {
                    stack.push(i * PER_THREAD + j);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let mut found = HashSet::new();
        while let Some(value) = stack.try_pop() {
            assert!(value < THREADS * PER_THREAD);
            assert!(found.insert(value), "Duplicate value found: {}", value);
        }

        assert_eq!(found.len(), THREADS * PER_THREAD);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_sum_conservation_under_contention() {
        const THREADS: usize = 4;
        const PER_THREAD: u64 = 2000;

        let stack = Arc::new(ConcurrentStack::new());
        let pushed_sum = Arc::new(StdAtomicU64::new(0));
        let popped_sum = Arc::new(StdAtomicU64::new(0));
        let barrier = Arc::new(Barrier::new(THREADS * 2));
        let mut handles = vec![];

        for i in 0..THREADS as u64 {
            let stack = Arc::clone(&stack);
            let pushed_sum = Arc::clone(&pushed_sum);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                for j in 0..PER_THREAD {
                    let value = i * PER_THREAD + j + 1;
                    stack.push(value);
                    pushed_sum.fetch_add(value, Ordering::Relaxed);
                }
            }));
        }

        for _ in 0..THREADS {
            let stack = Arc::clone(&stack);
            let popped_sum = Arc::clone(&popped_sum);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                for _ in 0..PER_THREAD / 2 {
                    popped_sum.fetch_add(stack.pop(), Ordering::Relaxed);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        while let Some(value) = stack.try_pop() {
            popped_sum.fetch_add(value, Ordering::Relaxed);
        }

        assert_eq!(
            pushed_sum.load(Ordering::Relaxed),
            popped_sum.load(Ordering::Relaxed)
        );
        assert!(stack.is_empty());
        assert_eq!(stack.len(), 0);
    }

    #[test]
    fn test_blocking_pop_waits_for_push() {
        let stack = Arc::new(ConcurrentStack::new());

        let consumer = {
            let stack = Arc::clone(&stack);
            thread::spawn(move || stack.pop())
        };

        thread::sleep(std::time::Duration::from_millis(20));
        stack.push(String::from("late"));

        assert_eq!(consumer.join().unwrap(), "late");
    }

    #[test]
    fn test_drop_releases_remaining_values() {
        struct DropCounter(Arc<AtomicUsize>);

        impl Drop for DropCounter {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let stack = ConcurrentStack::new();

        for _ in 0..10 {
            stack.push(DropCounter(Arc::clone(&drops)));
        }
        for _ in 0..4 {
            drop(stack.pop());
        }
        assert_eq!(drops.load(Ordering::Relaxed), 4);

        drop(stack);
        assert_eq!(drops.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn test_metrics() {
        let stack = ConcurrentStack::new();

        stack.push(1);
        stack.push(2);
        stack.push(3);

        let _ = stack.pop();
        let _ = stack.pop();
        let _ = stack.pop();
        let _ = stack.try_pop(); // This will fail

        let metrics = stack.metrics();
        assert_eq!(metrics.total_operations(), 7);
        assert_eq!(metrics.successful_operations, 6);
        assert_eq!(metrics.failed_operations, 1);
        assert_eq!(metrics.contended_operations, 0);

        stack.set_metrics_enabled(false);
        assert!(!stack.is_metrics_enabled());
        stack.push(4);

        stack.reset_metrics();
        assert_eq!(stack.metrics(), PerformanceMetrics::default());
    }

    proptest! {
        #[test]
        fn test_lifo_matches_vec_model(values in prop::collection::vec(any::<i64>(), 0..200)) {
            let stack = ConcurrentStack::new();
            stack.push_batch(values.iter().copied());
            prop_assert_eq!(stack.len(), values.len());

            let mut expected = values;
            while let Some(value) = expected.pop() {
                prop_assert_eq!(stack.pop(), value);
            }
            prop_assert!(stack.is_empty());
        }
    }
}
