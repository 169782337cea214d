//! Quicksort tests: default ordering, comparators, sparse targets and
//! cooperative cancellation.

use std::cell::Cell;
use std::rc::Rc;

use varcell::{sort, BasicHost, Key, VarStore};

use super::{dense_ints, int_array, ints_of};

#[test]
fn test_sort_default_ascending() {
    let store = VarStore::new();
    let mut host = BasicHost::new();
    let arr = int_array(&store, &[5, 3, 1, 4, 2]);
    sort::sort(&store, &mut host, &arr, None).unwrap();
    assert_eq!(dense_ints(&store, &arr), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_sort_already_sorted_and_reversed() {
    let store = VarStore::new();
    let mut host = BasicHost::new();
    let sorted = int_array(&store, &[1, 2, 3, 4]);
    sort::sort(&store, &mut host, &sorted, None).unwrap();
    assert_eq!(dense_ints(&store, &sorted), vec![1, 2, 3, 4]);

    let reversed = int_array(&store, &[4, 3, 2, 1]);
    sort::sort(&store, &mut host, &reversed, None).unwrap();
    assert_eq!(dense_ints(&store, &reversed), vec![1, 2, 3, 4]);
}

#[test]
fn test_sort_with_duplicates() {
    let store = VarStore::new();
    let mut host = BasicHost::new();
    let arr = int_array(&store, &[2, 1, 2, 1, 2]);
    sort::sort(&store, &mut host, &arr, None).unwrap();
    assert_eq!(dense_ints(&store, &arr), vec![1, 1, 2, 2, 2]);
}

#[test]
fn test_sort_strings_default_order() {
    let store = VarStore::new();
    let mut host = BasicHost::new();
    let arr = store.alloc_array().unwrap();
    for s in ["pear", "apple", "mango"] {
        let v = store.alloc_str(s).unwrap();
        store.append(&arr, &v).unwrap();
    }
    sort::sort(&store, &mut host, &arr, None).unwrap();
    let words: Vec<String> = (0..3)
        .map(|i| {
            let v = store.get_child(&arr, &Key::Index(i)).unwrap().unwrap();
            store.str_value(&v).unwrap()
        })
        .collect();
    assert_eq!(words, vec!["apple", "mango", "pear"]);
}

#[test]
fn test_sort_with_comparator_descending() {
    let store = VarStore::new();
    let mut host = BasicHost::new();
    let cmp = host
        .register(&store, |store, _this, args| {
            let a = args.first().map(|v| store.int_of(v)).unwrap_or(0);
            let b = args.get(1).map(|v| store.int_of(v)).unwrap_or(0);
            store.alloc_int(b - a).map(Some)
        })
        .unwrap();
    let arr = int_array(&store, &[1, 4, 2, 3]);
    sort::sort(&store, &mut host, &arr, Some(&cmp)).unwrap();
    assert_eq!(dense_ints(&store, &arr), vec![4, 3, 2, 1]);
}

#[test]
fn test_sort_undefined_comparator_means_default() {
    let store = VarStore::new();
    let mut host = BasicHost::new();
    let arr = int_array(&store, &[2, 1]);
    let undef = store.alloc_undefined().unwrap();
    sort::sort(&store, &mut host, &arr, Some(&undef)).unwrap();
    assert_eq!(dense_ints(&store, &arr), vec![1, 2]);
}

#[test]
fn test_sort_rejects_non_callable_comparator() {
    let store = VarStore::new();
    let mut host = BasicHost::new();
    let arr = int_array(&store, &[2, 1]);
    let not_fn = store.alloc_str("nope").unwrap();
    assert!(sort::sort(&store, &mut host, &arr, Some(&not_fn)).is_err());
    // Rejected before anything moved.
    assert_eq!(dense_ints(&store, &arr), vec![2, 1]);
}

#[test]
fn test_sort_sparse_keeps_gaps_absent() {
    let store = VarStore::new();
    let mut host = BasicHost::new();
    let arr = store.alloc_array().unwrap();
    for (key, val) in [(0u32, 3i64), (2, 1), (5, 2)] {
        let v = store.alloc_int(val).unwrap();
        store.set_child(&arr, Key::Index(key), &v).unwrap();
    }
    sort::sort(&store, &mut host, &arr, None).unwrap();
    // Values sort across the existing bindings; the keys never move, so the
    // gaps stay gaps.
    assert_eq!(
        ints_of(&store, &arr),
        vec![Some(1), None, Some(2), None, None, Some(3)]
    );
}

#[test]
fn test_sort_object_values_in_chain_order() {
    let store = VarStore::new();
    let mut host = BasicHost::new();
    let obj = store.alloc_object().unwrap();
    for (name, val) in [("c", 3i64), ("a", 1), ("b", 2)] {
        let v = store.alloc_int(val).unwrap();
        store.set_child(&obj, Key::from(name), &v).unwrap();
    }
    sort::sort(&store, &mut host, &obj, None).unwrap();
    // Keys keep their chain positions; only the values are rearranged.
    let vals: Vec<i64> = (0..3)
        .map(|pos| {
            let v = store.value_at(&obj, pos).unwrap().unwrap();
            store.int_of(&v)
        })
        .collect();
    assert_eq!(vals, vec![1, 2, 3]);
    let names: Vec<Key> = (0..3)
        .map(|pos| store.key_at(&obj, pos).unwrap().unwrap())
        .collect();
    assert_eq!(names, vec![Key::from("c"), Key::from("a"), Key::from("b")]);
}

#[test]
fn test_sort_interrupt_aborts_without_damage() {
    let store = VarStore::with_capacity(64 * 1024);
    let mut host = BasicHost::new();

    // Deterministic shuffle of 0..1000.
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut values: Vec<i64> = Vec::with_capacity(1000);
    for _ in 0..1000 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        values.push((seed >> 33) as i64);
    }
    let arr = int_array(&store, &values);
    let baseline = store.stats();

    let flag = host.interrupt.clone();
    let calls = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&calls);
    let trip_wire = host
        .register(&store, move |store, _this, args| {
            counter.set(counter.get() + 1);
            if counter.get() == 100 {
                flag.set();
            }
            let a = args.first().map(|v| store.int_of(v)).unwrap_or(0);
            let b = args.get(1).map(|v| store.int_of(v)).unwrap_or(0);
            store.alloc_int(if a < b { -1 } else { 1 }).map(Some)
        })
        .unwrap();

    sort::sort(&store, &mut host, &arr, Some(&trip_wire)).unwrap();

    // The sort stopped early: far fewer comparisons than a full run needs.
    assert!(calls.get() >= 100);
    assert!(calls.get() < 1000);

    // The array is a permutation of the input and lock counts are intact.
    let mut after = dense_ints(&store, &arr);
    let mut expected = values.clone();
    after.sort_unstable();
    expected.sort_unstable();
    assert_eq!(after, expected);
    drop(trip_wire);
    assert_eq!(store.stats(), baseline);
}

#[test]
fn test_sort_lock_counts_balanced() {
    let store = VarStore::new();
    let mut host = BasicHost::new();
    let arr = int_array(&store, &[3, 1, 2]);
    let baseline = store.stats();
    sort::sort(&store, &mut host, &arr, None).unwrap();
    assert_eq!(store.stats(), baseline);
}
