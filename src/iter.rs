//! The generic iteration protocol.
//!
//! A `VarIter` is a transient cursor over a container's binding chain or a
//! flat character sequence. All variants expose the same operations, and the
//! array algorithms are written once against this interface.
//!
//! Cursors track the key of their current binding. If that binding is
//! unlinked out from under the cursor, the cursor resumes at the chain
//! position the removed entry occupied; iteration never touches a freed
//! binding, but no stronger consistency is promised under concurrent
//! mutation.

use crate::error::{Error, Result};
use crate::store::{CellKind, Key, VarRef, VarStore};

// ============================================================================
// Chain cursor (arrays and objects)
// ============================================================================

/// Cursor over a container's binding chain, in chain order. Array cursors
/// visit integer-keyed bindings (skipping key gaps, which have no binding at
/// all); object cursors visit string-keyed bindings.
#[derive(Debug, Clone)]
pub struct ChainIter {
    target: VarRef,
    pos: usize,
    key: Option<Key>,
    wants_index: bool,
}

impl ChainIter {
    fn new(target: VarRef, wants_index: bool) -> Self {
        Self {
            target,
            pos: 0,
            key: None,
            wants_index,
        }
    }

    fn accepts(&self, key: &Key) -> bool {
        match key {
            Key::Index(_) => self.wants_index,
            Key::Name(_) => !self.wants_index,
        }
    }

    /// Re-locate the current binding. If it was removed, the entries behind
    /// it have shifted onto our position, so we settle on whatever lives
    /// there now.
    fn resync(&mut self, store: &VarStore) {
        if let Some(k) = self.key.clone() {
            if let Ok(Some(p)) = store.position_of(&self.target, &k) {
                self.pos = p;
                return;
            }
            self.key = None;
        }
        self.settle(store);
    }

    /// Latch onto the first acceptable binding at or after `pos`.
    fn settle(&mut self, store: &VarStore) {
        loop {
            match store.key_at(&self.target, self.pos) {
                Ok(Some(k)) if self.accepts(&k) => {
                    self.key = Some(k);
                    return;
                }
                Ok(Some(_)) => self.pos += 1,
                _ => {
                    self.key = None;
                    return;
                }
            }
        }
    }

    fn has_element(&mut self, store: &VarStore) -> bool {
        self.resync(store);
        self.key.is_some()
    }

    fn value(&mut self, store: &VarStore) -> Result<VarRef> {
        self.resync(store);
        if self.key.is_some() {
            if let Some(v) = store.value_at(&self.target, self.pos)? {
                return Ok(v);
            }
        }
        store.alloc_undefined()
    }

    fn key(&mut self, store: &VarStore) -> Option<Key> {
        self.resync(store);
        self.key.clone()
    }

    fn set_value(&mut self, store: &VarStore, value: &VarRef) -> Result<()> {
        self.resync(store);
        if self.key.is_some() {
            store.set_value_at(&self.target, self.pos, value)?;
        }
        Ok(())
    }

    fn advance(&mut self, store: &VarStore) {
        self.resync(store);
        if self.key.is_some() {
            self.pos += 1;
            self.key = None;
            self.settle(store);
        }
    }
}

// ============================================================================
// Flat cursor (string cells)
// ============================================================================

/// Cursor over a string cell, by character position.
#[derive(Debug, Clone)]
pub struct FlatIter {
    target: VarRef,
    pos: usize,
}

impl FlatIter {
    fn has_element(&self, store: &VarStore) -> bool {
        self.pos < store.str_char_count(&self.target)
    }

    fn value(&self, store: &VarStore) -> Result<VarRef> {
        match store.char_at(&self.target, self.pos) {
            Some(ch) => store.alloc_str(ch.to_string()),
            None => store.alloc_undefined(),
        }
    }

    fn key(&self, store: &VarStore) -> Option<Key> {
        if self.has_element(store) {
            Some(Key::Index(self.pos as u32))
        } else {
            None
        }
    }

    fn set_value(&self, store: &VarStore, value: &VarRef) -> Result<()> {
        if !self.has_element(store) {
            return Ok(());
        }
        let ch = store
            .str_value(value)
            .and_then(|s| s.chars().next())
            .ok_or_else(|| Error::type_error("flat iterator expects a one-character string"))?;
        store.set_char_at(&self.target, self.pos, ch)
    }

    fn advance(&mut self, store: &VarStore) {
        if self.has_element(store) {
            self.pos += 1;
        }
    }
}

// ============================================================================
// VarIter - the uniform cursor
// ============================================================================

/// A cursor polymorphic over the three backings. Identical call sequences
/// against any variant produce semantically consistent results.
///
/// Cloning yields an independent cursor at the same position; dropping
/// releases cursor-held locks without affecting the source container.
#[derive(Debug, Clone)]
pub enum VarIter {
    Array(ChainIter),
    Object(ChainIter),
    Flat(FlatIter),
}

impl VarIter {
    /// Acquire a cursor over `target`, choosing the variant by cell kind.
    pub fn new(store: &VarStore, target: &VarRef) -> Result<VarIter> {
        match store.kind(target) {
            CellKind::Array => Ok(VarIter::Array(ChainIter::new(target.clone(), true))),
            CellKind::Object => Ok(VarIter::Object(ChainIter::new(target.clone(), false))),
            CellKind::Str => Ok(VarIter::Flat(FlatIter {
                target: target.clone(),
                pos: 0,
            })),
            _ => Err(Error::type_error("value is not iterable")),
        }
    }

    pub fn has_element(&mut self, store: &VarStore) -> bool {
        match self {
            VarIter::Array(it) | VarIter::Object(it) => it.has_element(store),
            VarIter::Flat(it) => it.has_element(store),
        }
    }

    /// Acquire a new lock on the current element's value. Callers release it
    /// by dropping the handle.
    pub fn value(&mut self, store: &VarStore) -> Result<VarRef> {
        match self {
            VarIter::Array(it) | VarIter::Object(it) => it.value(store),
            VarIter::Flat(it) => it.value(store),
        }
    }

    /// The current binding's key, or `None` past the end.
    pub fn key(&mut self, store: &VarStore) -> Option<Key> {
        match self {
            VarIter::Array(it) | VarIter::Object(it) => it.key(store),
            VarIter::Flat(it) => it.key(store),
        }
    }

    /// Replace the current binding's value in place.
    pub fn set_value(&mut self, store: &VarStore, value: &VarRef) -> Result<()> {
        match self {
            VarIter::Array(it) | VarIter::Object(it) => it.set_value(store, value),
            VarIter::Flat(it) => it.set_value(store, value),
        }
    }

    /// Move to the next binding or position. Advancing past the end is
    /// idempotent.
    pub fn advance(&mut self, store: &VarStore) {
        match self {
            VarIter::Array(it) | VarIter::Object(it) => it.advance(store),
            VarIter::Flat(it) => it.advance(store),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
