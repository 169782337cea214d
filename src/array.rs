//! Array construction and methods.
//!
//! Every operation here works through the iteration protocol and the store's
//! binding primitives; none of them assume contiguous storage. The embedding
//! dispatch layer resolves a method name to one of these functions and passes
//! already-evaluated argument handles.

use crate::error::{Error, Result};
use crate::host::Host;
use crate::iter::VarIter;
use crate::store::{CellKind, Key, VarRef, VarStore};

/// `new Array(...)`. A single non-negative integer argument N declares the
/// length without materializing N cells: the result holds one binding at key
/// N-1 bound to undefined. Any other argument shape makes every argument an
/// element, in order, starting at key 0.
pub fn construct(store: &VarStore, args: &[VarRef]) -> Result<VarRef> {
    if args.len() == 1 {
        if let Some(n) = args.first().and_then(|a| store.as_int(a)) {
            if n >= 0 {
                if n > i64::from(u32::MAX) {
                    return Err(Error::type_error("invalid array length"));
                }
                let arr = store.alloc_array()?;
                if n > 0 {
                    let undef = store.alloc_undefined()?;
                    store.set_child(&arr, Key::Index((n - 1) as u32), &undef)?;
                }
                return Ok(arr);
            }
        }
    }
    let arr = store.alloc_array()?;
    for a in args {
        store.append(&arr, a)?;
    }
    Ok(arr)
}

/// Key of the first element equal to `value` under ordinary equality, or -1.
pub fn index_of(
    store: &VarStore,
    host: &mut dyn Host,
    arr: &VarRef,
    value: &VarRef,
) -> Result<i64> {
    let mut it = VarIter::new(store, arr)?;
    while it.has_element(store) {
        let probed = it.value(store)?;
        if host.equals(store, &probed, value) {
            return Ok(it
                .key(store)
                .and_then(|k| k.index())
                .map(i64::from)
                .unwrap_or(-1));
        }
        it.advance(store);
    }
    Ok(-1)
}

/// Join element display forms over keys 0..length-1 in ascending order.
/// Missing and undefined elements render empty but still consume a separator
/// slot. The separator defaults to `","`.
pub fn join(
    store: &VarStore,
    host: &mut dyn Host,
    arr: &VarRef,
    separator: Option<&VarRef>,
) -> Result<VarRef> {
    let sep = match separator {
        Some(s) if !store.is_undefined(s) => host.display(store, s),
        _ => ",".to_string(),
    };
    let len = store.array_length(arr)?;
    let mut out = String::new();
    for i in 0..len {
        if i > 0 {
            out.push_str(&sep);
        }
        if let Some(el) = store.get_child(arr, &Key::Index(i))? {
            if !store.is_undefined(&el) {
                out.push_str(&host.display(store, &el));
            }
        }
    }
    store.alloc_str(out)
}

/// Append each item, in argument order, as new trailing bindings. Returns the
/// resulting logical length.
pub fn push(store: &VarStore, arr: &VarRef, items: &[VarRef]) -> Result<u32> {
    let mut len = store.array_length(arr)?;
    for item in items {
        len = store.append(arr, item)?;
    }
    Ok(len)
}

/// Remove and return the binding with the highest integer key, or undefined
/// when the array has none.
pub fn pop(store: &VarStore, arr: &VarRef) -> Result<VarRef> {
    match store.highest_index(arr)? {
        Some(i) => match store.remove_child(arr, &Key::Index(i))? {
            Some(v) => Ok(v),
            None => store.alloc_undefined(),
        },
        None => store.alloc_undefined(),
    }
}

/// Build a new array from the receiver's elements followed by each argument;
/// array arguments are flattened one level, everything else is appended as a
/// single element.
pub fn concat(store: &VarStore, arr: &VarRef, args: &[VarRef]) -> Result<VarRef> {
    let result = store.alloc_array()?;
    append_flattened(store, &result, arr)?;
    for arg in args {
        append_flattened(store, &result, arg)?;
    }
    Ok(result)
}

fn append_flattened(store: &VarStore, result: &VarRef, value: &VarRef) -> Result<()> {
    if store.is_array(value) {
        let mut it = VarIter::new(store, value)?;
        while it.has_element(store) {
            let el = it.value(store)?;
            store.append(result, &el)?;
            it.advance(store);
        }
    } else {
        store.append(result, value)?;
    }
    Ok(())
}

/// `map`: bind every defined callback result at the same key in a fresh
/// array.
pub fn map(
    store: &VarStore,
    host: &mut dyn Host,
    arr: &VarRef,
    callback: &VarRef,
    this_arg: Option<&VarRef>,
) -> Result<VarRef> {
    match map_or_for_each(store, host, arr, callback, this_arg, true)? {
        Some(result) => Ok(result),
        None => store.alloc_undefined(),
    }
}

/// `forEach`: invoke the callback per element, discarding results.
pub fn for_each(
    store: &VarStore,
    host: &mut dyn Host,
    arr: &VarRef,
    callback: &VarRef,
    this_arg: Option<&VarRef>,
) -> Result<()> {
    map_or_for_each(store, host, arr, callback, this_arg, false)?;
    Ok(())
}

/// Shared traversal engine for map/forEach. Visits only existing bindings,
/// in chain order. The callback receives (element value, element key, the
/// SAME live receiver handle), so it may observe or mutate sibling bindings;
/// nothing beyond "no use-after-free" is guaranteed under such mutation.
fn map_or_for_each(
    store: &VarStore,
    host: &mut dyn Host,
    arr: &VarRef,
    callback: &VarRef,
    this_arg: Option<&VarRef>,
    is_map: bool,
) -> Result<Option<VarRef>> {
    if !host.is_callable(store, callback) {
        return Err(Error::type_error("first argument must be a function"));
    }
    if let Some(t) = this_arg {
        if !matches!(store.kind(t), CellKind::Undefined | CellKind::Object) {
            return Err(Error::type_error(
                "second argument must be undefined or an object",
            ));
        }
    }

    let result = if is_map {
        Some(store.alloc_array()?)
    } else {
        None
    };

    let mut it = VarIter::new(store, arr)?;
    while it.has_element(store) {
        if host.interrupted() {
            break;
        }
        let Some(key) = it.key(store) else {
            break;
        };
        let element = it.value(store)?;
        let key_cell = match &key {
            Key::Index(i) => store.alloc_int(i64::from(*i))?,
            Key::Name(s) => store.alloc_str(s.as_ref())?,
        };
        let mapped = host.invoke(store, callback, this_arg, &[element, key_cell, arr.clone()])?;
        if let (Some(result), Some(mapped)) = (&result, mapped) {
            store.set_child(result, key, &mapped)?;
        }
        it.advance(store);
    }
    Ok(result)
}

/// Remove `how_many` elements starting at `index` (negative counts back from
/// the length; the count defaults to everything through the end) and insert
/// `items` in their place, renumbering the survivors so keys stay consistent
/// with the new length. Returns the removed elements as a new array, in
/// chain-encounter order.
pub fn splice(
    store: &VarStore,
    host: &mut dyn Host,
    arr: &VarRef,
    index: i64,
    how_many: Option<i64>,
    items: &[VarRef],
) -> Result<VarRef> {
    let len = i64::from(store.array_length(arr)?);
    let mut index = index;
    if index < 0 {
        index += len;
    }
    let index = index.clamp(0, len);
    let how_many = how_many.unwrap_or(len).clamp(0, len - index);
    let shift = items.len() as i64 - how_many;

    let result = store.alloc_array()?;

    // Walk the chain: skip bindings before the window, capture and unlink the
    // window itself, stop at the first binding past it.
    let mut pos = 0usize;
    loop {
        if host.interrupted() {
            // Best-effort cancellation: survivors keep their keys, nothing is
            // inserted. The container stays valid.
            return Ok(result);
        }
        let Some(key) = store.key_at(arr, pos)? else {
            break;
        };
        match key.index().map(i64::from) {
            Some(i) if i < index => pos += 1,
            Some(i) if i < index + how_many => {
                if let Some(el) = store.remove_at(arr, pos)? {
                    store.append(&result, &el)?;
                }
            }
            Some(_) => break,
            None => pos += 1,
        }
    }

    // Renumber the survivors first so the inserted run's keys cannot collide,
    // then place the new items contiguously before the first survivor.
    store.shift_keys_from(arr, pos, shift)?;
    for (j, item) in items.iter().enumerate() {
        store.insert_before(arr, pos, Key::Index((index + j as i64) as u32), item)?;
        pos += 1;
    }
    Ok(result)
}

/// Copy the elements whose key falls in [start, end) into a new array,
/// re-keyed from 0 in encounter order. Negative bounds count back from the
/// length; elements are shared, not deep-copied.
pub fn slice(
    store: &VarStore,
    arr: &VarRef,
    start: Option<i64>,
    end: Option<i64>,
) -> Result<VarRef> {
    let len = i64::from(store.array_length(arr)?);
    let start = start.unwrap_or(0);
    let end = end.unwrap_or(len);
    let first = if start < 0 {
        (len + start).max(0)
    } else {
        start.min(len)
    };
    let last = if end < 0 { (len + end).max(0) } else { end.min(len) };

    let result = store.alloc_array()?;
    let mut it = VarIter::new(store, arr)?;
    while it.has_element(store) {
        let Some(i) = it.key(store).and_then(|k| k.index()).map(i64::from) else {
            it.advance(store);
            continue;
        };
        if i >= last {
            break;
        }
        if i >= first {
            let el = it.value(store)?;
            store.append(&result, &el)?;
        }
        it.advance(store);
    }
    Ok(result)
}
