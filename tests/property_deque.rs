use std::collections::VecDeque;

use proptest::prelude::*;

use signing_telemetry::deque::{binary_search_in_ordered_deque, RandomAccessDeque};

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(64);
    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

#[derive(Clone, Debug)]
enum Op {
    PushFront(i64),
    PushBack(i64),
    PopFront,
    PopBack,
    Set(usize, i64),
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<i64>().prop_map(Op::PushFront),
        4 => any::<i64>().prop_map(Op::PushBack),
        3 => Just(Op::PopFront),
        3 => Just(Op::PopBack),
        2 => (any::<usize>(), any::<i64>()).prop_map(|(index, value)| Op::Set(index, value)),
        1 => Just(Op::Clear),
    ]
}

proptest! {
    #![proptest_config(proptest_config())]
    #[test]
    fn deque_matches_reference_model(
        initial_capacity in 0usize..64,
        ops in proptest::collection::vec(op_strategy(), 1..300),
    ) {
        let mut deque = RandomAccessDeque::new(initial_capacity);
        let mut model: VecDeque<i64> = VecDeque::new();

        for op in ops {
            match op {
                Op::PushFront(value) => {
                    deque.push_front(value);
                    model.push_front(value);
                }
                Op::PushBack(value) => {
                    deque.push_back(value);
                    model.push_back(value);
                }
                Op::PopFront => prop_assert_eq!(deque.pop_front(), model.pop_front()),
                Op::PopBack => prop_assert_eq!(deque.pop_back(), model.pop_back()),
                Op::Set(index, value) => {
                    if !model.is_empty() {
                        let index = index % model.len();
                        let previous = deque.set(index, value);
                        prop_assert_eq!(previous, model[index]);
                        model[index] = value;
                    }
                }
                Op::Clear => {
                    deque.clear();
                    model.clear();
                }
            }

            prop_assert_eq!(deque.len(), model.len());
            prop_assert_eq!(deque.front(), model.front());
            prop_assert_eq!(deque.back(), model.back());
        }

        let forward: Vec<i64> = deque.iter().copied().collect();
        prop_assert_eq!(&forward, &model.iter().copied().collect::<Vec<_>>());
        let backward: Vec<i64> = deque.iter_rev().copied().collect();
        prop_assert_eq!(&backward, &model.iter().rev().copied().collect::<Vec<_>>());

        if !model.is_empty() {
            let from = model.len() / 2;
            let suffix: Vec<i64> = deque.iter_from(from).copied().collect();
            prop_assert_eq!(&suffix, &model.iter().skip(from).copied().collect::<Vec<_>>());
            let prefix_rev: Vec<i64> = deque.iter_rev_from(from).copied().collect();
            prop_assert_eq!(
                &prefix_rev,
                &model.iter().take(from + 1).rev().copied().collect::<Vec<_>>()
            );
            for (index, expected) in model.iter().enumerate() {
                prop_assert_eq!(deque.get(index), Some(expected));
                prop_assert_eq!(deque.get_from_back(model.len() - 1 - index), Some(expected));
            }
        }
    }
}

proptest! {
    #![proptest_config(proptest_config())]
    #[test]
    fn binary_search_agrees_with_linear_scan(
        values in proptest::collection::btree_set(0u64..10_000, 1..120),
        probe in 0u64..10_000,
    ) {
        let mut deque = RandomAccessDeque::new(8);
        for value in &values {
            deque.push_back(*value);
        }

        let (index, exact) = binary_search_in_ordered_deque(&deque, &probe, |a, b| a.cmp(b));

        if exact {
            prop_assert_eq!(deque.get(index), Some(&probe));
        } else {
            prop_assert!(!values.contains(&probe));
            // Inserting at `index` would preserve order.
            if index > 0 {
                prop_assert!(*deque.get(index - 1).unwrap() < probe);
            }
            if index < deque.len() {
                prop_assert!(*deque.get(index).unwrap() > probe);
            } else {
                prop_assert_eq!(index, deque.len());
            }
        }
    }
}
