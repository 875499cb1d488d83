//! Property-based tests for the SPSC ring buffer using proptest
//!
//! A `VecDeque` bounded at `N - 1` elements is the reference model.

use super::BoundedRingBuffer;
use proptest::prelude::*;
use std::collections::VecDeque;
use std::thread;

const SLOTS: usize = 8;

#[derive(Debug, Clone)]
enum Op {
    Push(i32),
    Pop,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        7 => any::<i32>().prop_map(Op::Push),
        3 => Just(Op::Pop),
    ]
}

proptest! {
    #[test]
    fn test_fifo_ordering_single_thread(values in prop::collection::vec(any::<i32>(), 0..SLOTS)) {
        let (mut producer, mut consumer) = BoundedRingBuffer::<i32, SLOTS>::new().split();

        for &value in &values {
            producer.push(value);
        }
        prop_assert_eq!(consumer.len(), values.len());

        for &expected in &values {
            prop_assert_eq!(consumer.pop(), expected);
        }
        prop_assert!(consumer.is_empty());
    }

    #[test]
    fn test_matches_bounded_model(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let (mut producer, mut consumer) = BoundedRingBuffer::<i32, SLOTS>::new().split();
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                Op::Push(value) => {
                    let accepted = producer.try_push(value).is_ok();
                    prop_assert_eq!(accepted, model.len() < SLOTS - 1);
                    if accepted {
                        model.push_back(value);
                    }
                }
                Op::Pop => {
                    prop_assert_eq!(consumer.try_pop(), model.pop_front());
                }
            }

            prop_assert_eq!(producer.len(), model.len());
            prop_assert_eq!(producer.is_full(), model.len() == SLOTS - 1);
            prop_assert_eq!(consumer.is_empty(), model.is_empty());
        }
    }
}

proptest! {
    // Each case spawns a producer thread
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_fifo_ordering_concurrent(values in prop::collection::vec(any::<u32>(), 0..500)) {
        let (mut producer, mut consumer) = BoundedRingBuffer::<u32, 4>::new().split();

        let expected = values.clone();
        let handle = thread::spawn(move || {
            for value in values {
                producer.push(value);
            }
        });

        let received: Vec<u32> = (0..expected.len()).map(|_| consumer.pop()).collect();
        handle.join().unwrap();

        prop_assert_eq!(received, expected);
    }
}
