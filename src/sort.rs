//! In-place quicksort over the iteration protocol.
//!
//! The sort never swaps bindings, only the values they hold, so it works on
//! anything the iterators do: arrays (sparse or not), objects, flat strings.
//! It polls for cancellation between comparisons and unwinds quietly when
//! asked to stop, leaving the target partially ordered but intact.

use crate::error::{Error, Result};
use crate::host::Host;
use crate::iter::VarIter;
use crate::store::{VarRef, VarStore};

/// Sort the target's element values in place, ascending.
///
/// With a comparator, an element sorts before another when the comparator
/// returns a negative integer; without one, ordinary less-or-equal ordering
/// applies. A comparator that is neither undefined nor callable is a type
/// error. Sparse arrays keep their gaps: only existing bindings participate,
/// and the keys themselves never move.
pub fn sort(
    store: &VarStore,
    host: &mut dyn Host,
    target: &VarRef,
    comparator: Option<&VarRef>,
) -> Result<()> {
    let cmp = comparator.filter(|c| !store.is_undefined(c));
    if let Some(c) = cmp {
        if !host.is_callable(store, c) {
            return Err(Error::type_error("expecting a compare function"));
        }
    }

    // Sparse arrays make the length useless as an element count, so walk the
    // bindings once up front.
    let mut n = 0usize;
    let mut it = VarIter::new(store, target)?;
    while it.has_element(store) {
        n += 1;
        it.advance(store);
    }

    let head = VarIter::new(store, target)?;
    sort_range(store, host, &head, n, cmp)
}

fn leq(
    store: &VarStore,
    host: &mut dyn Host,
    a: &VarRef,
    b: &VarRef,
    cmp: Option<&VarRef>,
) -> Result<bool> {
    match cmp {
        Some(cmp) => {
            let verdict = host.invoke(store, cmp, None, &[a.clone(), b.clone()])?;
            Ok(match verdict {
                Some(v) => store.int_of(&v) < 0,
                None => false,
            })
        }
        None => Ok(host.le(store, a, b)),
    }
}

/// Quicksort `n` elements starting at `head`.
///
/// The first element is the pivot. A second cursor walks the remaining
/// elements; whenever one belongs below the pivot, the pivot's value steps
/// aside: the low value lands in the pivot's old slot, the pivot cursor moves
/// one slot forward, and the displaced value from that slot goes back where
/// the low value came from. The pivot value itself is rewritten into the new
/// slot, so it drifts right one position per low element and finishes exactly
/// between the partitions.
fn sort_range(
    store: &VarStore,
    host: &mut dyn Host,
    head: &VarIter,
    n: usize,
    cmp: Option<&VarRef>,
) -> Result<()> {
    if n < 2 {
        return Ok(());
    }

    let mut pivot = head.clone();
    let pivot_value = pivot.value(store)?;
    let mut it = head.clone();
    it.advance(store);

    let mut nlo = 0usize;
    let mut nhigh = 0usize;
    let mut remaining = n - 1;
    while remaining > 0 && !host.interrupted() {
        remaining -= 1;
        let it_value = it.value(store)?;
        if leq(store, host, &it_value, &pivot_value, cmp)? {
            nlo += 1;
            pivot.set_value(store, &it_value)?;
            pivot.advance(store);
            let displaced = pivot.value(store)?;
            it.set_value(store, &displaced)?;
            pivot.set_value(store, &pivot_value)?;
        } else {
            nhigh += 1;
        }
        it.advance(store);
    }

    if host.interrupted() {
        return Ok(());
    }

    sort_range(store, host, head, nlo, cmp)?;
    pivot.advance(store);
    sort_range(store, host, &pivot, nhigh, cmp)
}
