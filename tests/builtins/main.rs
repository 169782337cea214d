//! Integration tests for the variable store and array builtins, organized by
//! feature. These tests exercise the crate through its public API only.

mod sort;

use varcell::{Key, VarRef, VarStore};

/// Build an array cell holding the given integers at keys 0..n.
fn int_array(store: &VarStore, items: &[i64]) -> VarRef {
    let arr = store.alloc_array().expect("alloc array");
    for &n in items {
        let v = store.alloc_int(n).expect("alloc int");
        store.append(&arr, &v).expect("append");
    }
    arr
}

/// Read an array back out by key, one slot per position up to the logical
/// length, `None` for gaps and non-integer cells.
fn ints_of(store: &VarStore, arr: &VarRef) -> Vec<Option<i64>> {
    let len = store.array_length(arr).expect("length");
    (0..len)
        .map(|i| {
            store
                .get_child(arr, &Key::Index(i))
                .expect("get")
                .and_then(|v| store.as_int(&v))
        })
        .collect()
}

/// Dense arrays only: the integer elements in key order.
fn dense_ints(store: &VarStore, arr: &VarRef) -> Vec<i64> {
    ints_of(store, arr)
        .into_iter()
        .map(|slot| slot.expect("dense array"))
        .collect()
}
