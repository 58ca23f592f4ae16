//! Compares [`UnrolledList`] against [`VecDeque`] on random operation
//! sequences.
use std::collections::VecDeque;

use proptest::prelude::*;

use crate::BoundedAllocator;
use crate::Error;
use crate::UnrolledList;

#[derive(Clone, Debug)]
enum Op {
    PushBack(u8),
    PushFront(u8),
    PopBack,
    PopFront,
    Insert(usize, u8),
    Erase(usize),
    EraseRange(usize, usize),
    InsertN(usize, usize, u8),
    Truncate(usize),
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<u8>().prop_map(Op::PushBack),
        2 => any::<u8>().prop_map(Op::PushFront),
        1 => Just(Op::PopBack),
        1 => Just(Op::PopFront),
        4 => (any::<usize>(), any::<u8>()).prop_map(|(at, value)| Op::Insert(at, value)),
        3 => any::<usize>().prop_map(Op::Erase),
        1 => (any::<usize>(), 0..6usize).prop_map(|(at, count)| Op::EraseRange(at, count)),
        1 => (any::<usize>(), 0..6usize, any::<u8>())
            .prop_map(|(at, count, value)| Op::InsertN(at, count, value)),
        1 => any::<usize>().prop_map(Op::Truncate),
        1 => Just(Op::Clear),
    ]
}

/// Applies `op` to both containers; indices wrap around the current length.
fn apply<const N: usize>(list: &mut UnrolledList<u8, N>, model: &mut VecDeque<u8>, op: &Op) {
    let wrap = |at: usize, len: usize| if len == 0 { 0 } else { at % (len + 1) };

    match *op {
        Op::PushBack(value) => {
            list.push_back(value);
            model.push_back(value);
        }
        Op::PushFront(value) => {
            list.push_front(value);
            model.push_front(value);
        }
        Op::PopBack => assert_eq!(list.pop_back(), model.pop_back()),
        Op::PopFront => assert_eq!(list.pop_front(), model.pop_front()),
        Op::Insert(at, value) => {
            let at = wrap(at, model.len());
            let pos = list.position(at).expect("index in range");
            let inserted = list.insert(pos, value).expect("valid position");
            model.insert(at, value);
            assert_eq!(list.get_at(inserted), Some(&value));
            assert_eq!(list.index_of(inserted), Ok(at));
        }
        Op::Erase(at) => {
            let at = wrap(at, model.len());
            let pos = list.position(at).expect("index in range");
            if at == model.len() {
                assert_eq!(list.erase(pos), Err(Error::InvalidPosition));
                return;
            }

            let (value, next) = list.erase(pos).expect("valid position");
            assert_eq!(Some(value), model.remove(at));
            assert_eq!(list.get_at(next), model.get(at));
        }
        Op::EraseRange(at, count) => {
            let at = wrap(at, model.len());
            let end = (at + count).min(model.len());
            let first = list.position(at).expect("index in range");
            let last = list.position(end).expect("index in range");
            let next = list.erase_range(first, last).expect("reachable range");
            model.drain(at..end);
            assert_eq!(list.get_at(next), model.get(at));
        }
        Op::InsertN(at, count, value) => {
            let at = wrap(at, model.len());
            let pos = list.position(at).expect("index in range");
            list.try_insert_n(pos, count, value).expect("global allocator");
            for _ in 0..count {
                model.insert(at, value);
            }
        }
        Op::Truncate(len) => {
            let len = wrap(len, model.len());
            list.truncate(len);
            model.truncate(len);
        }
        Op::Clear => {
            list.clear();
            model.clear();
        }
    }
}

fn check_matches<const N: usize>(list: &UnrolledList<u8, N>, model: &VecDeque<u8>) {
    assert_eq!(list.len(), model.len());
    assert!(itertools::equal(list.iter(), model.iter()));
    assert!(itertools::equal(list.iter().rev(), model.iter().rev()));
    assert_eq!(list.front(), model.front());
    assert_eq!(list.back(), model.back());

    let lens = list.node_lens();
    assert_eq!(lens.len(), list.node_count());
    assert!(lens.iter().all(|&len| (1..=N).contains(&len)));
}

fn run_model<const N: usize>(ops: &[Op]) {
    let mut list: UnrolledList<u8, N> = UnrolledList::new();
    let mut model = VecDeque::new();

    for op in ops {
        apply(&mut list, &mut model, op);
        check_matches(&list, &model);
    }

    let index = model.len() / 2;
    assert_eq!(list.get(index), model.get(index));
    assert_eq!(list.into_iter().collect::<VecDeque<_>>(), model);
}

proptest! {
    #[test]
    fn model_capacity_1(ops in prop::collection::vec(op_strategy(), 0..64)) {
        run_model::<1>(&ops);
    }

    #[test]
    fn model_capacity_2(ops in prop::collection::vec(op_strategy(), 0..128)) {
        run_model::<2>(&ops);
    }

    #[test]
    fn model_capacity_5(ops in prop::collection::vec(op_strategy(), 0..128)) {
        run_model::<5>(&ops);
    }

    #[test]
    fn model_default_capacity(ops in prop::collection::vec(op_strategy(), 0..256)) {
        run_model::<{ crate::DEFAULT_NODE_CAPACITY }>(&ops);
    }

    #[test]
    fn mixed_iteration_matches(
        items in prop::collection::vec(any::<u8>(), 0..64),
        fronts in prop::collection::vec(any::<bool>(), 0..64),
    ) {
        let list: UnrolledList<u8, 3> = items.iter().copied().collect();
        let mut model: VecDeque<u8> = items.iter().copied().collect();

        let mut iter = list.iter();
        for front in fronts {
            let expected = if front { model.pop_front() } else { model.pop_back() };
            let actual = if front { iter.next() } else { iter.next_back() };
            prop_assert_eq!(actual.copied(), expected);
            prop_assert_eq!(iter.len(), model.len());
        }
    }

    #[test]
    fn bounded_allocator_balances(
        items in prop::collection::vec(any::<u8>(), 0..64),
        limit in 0..12usize,
        erase_every in 1..4usize,
    ) {
        let alloc = BoundedAllocator::new(limit);
        let mut list: UnrolledList<u8, 4, BoundedAllocator> = UnrolledList::new_in(alloc.clone());
        let mut model = Vec::new();

        for item in items {
            let before = list.iter().copied().collect::<Vec<_>>();
            match list.try_push_front(item) {
                Ok(()) => model.insert(0, item),
                Err(err) => {
                    prop_assert_eq!(err, Error::AllocationFailed { capacity: 4 });
                    prop_assert_eq!(list.iter().copied().collect::<Vec<_>>(), before);
                }
            }

            if model.len() % erase_every == 0 {
                if let Ok(pos) = list.position(model.len() / 2) {
                    if list.erase(pos).is_ok() {
                        model.remove(model.len() / 2);
                    }
                }
            }

            prop_assert_eq!(alloc.live_nodes(), list.node_count());
            prop_assert!(alloc.live_nodes() <= limit);
        }

        prop_assert_eq!(list.iter().copied().collect::<Vec<_>>(), model);
        drop(list);
        prop_assert_eq!(alloc.live_nodes(), 0);
    }
}
