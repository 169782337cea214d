//! The variable store: an arena of reference-counted cells.
//!
//! Cells hold either a primitive value or act as a container root. A
//! container's content is an insertion-ordered set of name bindings (key to
//! child cell), replacing the sibling-link chain of pointer-based designs
//! with an ordered map into the arena. Handles (`VarRef`) are RAII: cloning
//! locks the cell, dropping unlocks it, and a cell is freed exactly when its
//! count reaches zero. Releasing the last reference to a container
//! transitively releases every binding and the values they reference.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashSet};

use crate::error::{Error, Result};

// ============================================================================
// Keys and cell payloads
// ============================================================================

/// A binding key within a container. Arrays use integer keys, objects use
/// string keys. Keys are unique per container; binding order is insertion
/// order, not key order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(u32),
    Name(Box<str>),
}

impl Key {
    pub fn index(&self) -> Option<u32> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{}", i),
            Key::Name(s) => write!(f, "{}", s),
        }
    }
}

impl From<u32> for Key {
    fn from(i: u32) -> Self {
        Key::Index(i)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Name(s.into())
    }
}

/// Bindings of one container: key to child cell id, in chain (insertion)
/// order with O(1) key lookup.
type Bindings = IndexMap<Key, u32, FxBuildHasher>;

/// What a cell holds. `Native` is an opaque callable handle owned by the
/// embedder; the store never interprets it.
#[derive(Debug, Clone)]
enum CellData {
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Native(u32),
    Array(Bindings),
    Object(Bindings),
}

/// The externally visible type tag of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Undefined,
    Bool,
    Int,
    Float,
    Str,
    Native,
    Array,
    Object,
}

struct Cell {
    refs: u32,
    data: CellData,
}

// ============================================================================
// StoreInner - the arena
// ============================================================================

/// Default cell budget. Generous for an embedding scenario but still finite:
/// exhausting it reports `Error::OutOfCells` rather than aborting.
const DEFAULT_CAPACITY: usize = 16 * 1024;

struct StoreInner {
    cells: Vec<Option<Cell>>,
    free: Vec<u32>,
    capacity: usize,
    self_weak: Weak<RefCell<StoreInner>>,
}

impl StoreInner {
    fn new(capacity: usize) -> Self {
        Self {
            cells: Vec::new(),
            free: Vec::new(),
            capacity,
            self_weak: Weak::new(),
        }
    }

    fn alloc(&mut self, data: CellData) -> Result<u32> {
        if let Some(id) = self.free.pop() {
            if let Some(slot) = self.cells.get_mut(id as usize) {
                *slot = Some(Cell { refs: 1, data });
                return Ok(id);
            }
        }
        if self.cells.len() >= self.capacity {
            return Err(Error::OutOfCells {
                capacity: self.capacity,
            });
        }
        let id = self.cells.len() as u32;
        self.cells.push(Some(Cell { refs: 1, data }));
        Ok(id)
    }

    fn lock(&mut self, id: u32) {
        if let Some(Some(cell)) = self.cells.get_mut(id as usize) {
            cell.refs += 1;
        }
    }

    /// Decrement a cell's count, freeing it at zero. Children of a freed
    /// container are released through a worklist, never recursion, so chains
    /// of any depth cannot blow the stack.
    fn unlock(&mut self, id: u32) {
        let mut work = vec![id];
        while let Some(id) = work.pop() {
            let Some(slot) = self.cells.get_mut(id as usize) else {
                continue;
            };
            let Some(cell) = slot.as_mut() else {
                continue;
            };
            cell.refs = cell.refs.saturating_sub(1);
            if cell.refs == 0 {
                if let Some(cell) = slot.take() {
                    match cell.data {
                        CellData::Array(bindings) | CellData::Object(bindings) => {
                            work.extend(bindings.into_values());
                        }
                        _ => {}
                    }
                }
                self.free.push(id);
            }
        }
    }

    fn cell(&self, id: u32) -> Result<&Cell> {
        self.cells
            .get(id as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or_else(|| Error::type_error("dead cell handle"))
    }

    fn cell_mut(&mut self, id: u32) -> Result<&mut Cell> {
        self.cells
            .get_mut(id as usize)
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| Error::type_error("dead cell handle"))
    }

    fn bindings(&self, id: u32) -> Result<&Bindings> {
        match &self.cell(id)?.data {
            CellData::Array(b) | CellData::Object(b) => Ok(b),
            _ => Err(Error::type_error("not a container")),
        }
    }

    fn bindings_mut(&mut self, id: u32) -> Result<&mut Bindings> {
        match &mut self.cell_mut(id)?.data {
            CellData::Array(b) | CellData::Object(b) => Ok(b),
            _ => Err(Error::type_error("not a container")),
        }
    }

    fn highest_index(&self, id: u32) -> Result<Option<u32>> {
        Ok(self.bindings(id)?.keys().filter_map(Key::index).max())
    }
}

// ============================================================================
// VarRef - RAII handle to a cell
// ============================================================================

/// A locked reference to a cell. `Clone` acquires another lock, `Drop`
/// releases it; every lock is therefore matched by exactly one unlock on
/// every exit path, including error paths.
///
/// A handle that outlives its store becomes inert: drops and clones do
/// nothing once the arena is gone.
pub struct VarRef {
    id: u32,
    store: Weak<RefCell<StoreInner>>,
}

impl VarRef {
    /// Arena slot of the referenced cell. Stable for the handle's lifetime.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Check if two handles refer to the same cell.
    pub fn same_cell(a: &VarRef, b: &VarRef) -> bool {
        a.id == b.id && Weak::ptr_eq(&a.store, &b.store)
    }
}

impl Clone for VarRef {
    fn clone(&self) -> Self {
        if let Some(inner) = self.store.upgrade() {
            inner.borrow_mut().lock(self.id);
        }
        Self {
            id: self.id,
            store: self.store.clone(),
        }
    }
}

impl Drop for VarRef {
    fn drop(&mut self) {
        // Store may already be gone during embedder shutdown.
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        match inner.try_borrow_mut() {
            Ok(mut inner) => inner.unlock(self.id),
            Err(_) => {
                // No store method holds the arena borrow across code that
                // can drop a handle; a skipped unlock here is a leak.
                debug_assert!(false, "handle dropped while the store is borrowed");
            }
        }
    }
}

impl fmt::Debug for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VarRef").field("id", &self.id).finish()
    }
}

// ============================================================================
// VarStore - the public wrapper
// ============================================================================

/// Statistics about the store, for embedders and tests.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    /// Number of currently allocated cells.
    pub live_cells: usize,
    /// Sum of all reference counts over live cells.
    pub total_locks: usize,
    /// Cell budget.
    pub capacity: usize,
}

/// Owner of the cell arena. All access to cell contents goes through this
/// type; handles only carry identity.
pub struct VarStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl VarStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a store with an explicit cell budget.
    pub fn with_capacity(capacity: usize) -> Self {
        let inner = Rc::new(RefCell::new(StoreInner::new(capacity)));
        inner.borrow_mut().self_weak = Rc::downgrade(&inner);
        Self { inner }
    }

    pub fn capacity(&self) -> usize {
        self.inner.borrow().capacity
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.borrow();
        let mut live_cells = 0;
        let mut total_locks = 0;
        for cell in inner.cells.iter().flatten() {
            live_cells += 1;
            total_locks += cell.refs as usize;
        }
        StoreStats {
            live_cells,
            total_locks,
            capacity: inner.capacity,
        }
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    fn alloc(&self, data: CellData) -> Result<VarRef> {
        let mut inner = self.inner.borrow_mut();
        let id = inner.alloc(data)?;
        Ok(VarRef {
            id,
            store: inner.self_weak.clone(),
        })
    }

    pub fn alloc_undefined(&self) -> Result<VarRef> {
        self.alloc(CellData::Undefined)
    }

    pub fn alloc_bool(&self, v: bool) -> Result<VarRef> {
        self.alloc(CellData::Bool(v))
    }

    pub fn alloc_int(&self, v: i64) -> Result<VarRef> {
        self.alloc(CellData::Int(v))
    }

    pub fn alloc_float(&self, v: f64) -> Result<VarRef> {
        self.alloc(CellData::Float(v))
    }

    pub fn alloc_str(&self, v: impl Into<String>) -> Result<VarRef> {
        self.alloc(CellData::Str(v.into()))
    }

    /// Allocate an opaque callable handle. The id is meaningful only to the
    /// embedder's invocation service.
    pub fn alloc_native(&self, id: u32) -> Result<VarRef> {
        self.alloc(CellData::Native(id))
    }

    pub fn alloc_array(&self) -> Result<VarRef> {
        self.alloc(CellData::Array(Bindings::default()))
    }

    pub fn alloc_object(&self) -> Result<VarRef> {
        self.alloc(CellData::Object(Bindings::default()))
    }

    // ------------------------------------------------------------------
    // Cell inspection
    // ------------------------------------------------------------------

    pub fn kind(&self, v: &VarRef) -> CellKind {
        match self.inner.borrow().cell(v.id) {
            Ok(cell) => match cell.data {
                CellData::Undefined => CellKind::Undefined,
                CellData::Bool(_) => CellKind::Bool,
                CellData::Int(_) => CellKind::Int,
                CellData::Float(_) => CellKind::Float,
                CellData::Str(_) => CellKind::Str,
                CellData::Native(_) => CellKind::Native,
                CellData::Array(_) => CellKind::Array,
                CellData::Object(_) => CellKind::Object,
            },
            Err(_) => CellKind::Undefined,
        }
    }

    pub fn is_undefined(&self, v: &VarRef) -> bool {
        self.kind(v) == CellKind::Undefined
    }

    pub fn is_array(&self, v: &VarRef) -> bool {
        self.kind(v) == CellKind::Array
    }

    pub fn is_object(&self, v: &VarRef) -> bool {
        self.kind(v) == CellKind::Object
    }

    pub fn is_container(&self, v: &VarRef) -> bool {
        matches!(self.kind(v), CellKind::Array | CellKind::Object)
    }

    pub fn is_string(&self, v: &VarRef) -> bool {
        self.kind(v) == CellKind::Str
    }

    /// The exact integer payload, without coercion.
    pub fn as_int(&self, v: &VarRef) -> Option<i64> {
        match self.inner.borrow().cell(v.id) {
            Ok(Cell {
                data: CellData::Int(n),
                ..
            }) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self, v: &VarRef) -> Option<bool> {
        match self.inner.borrow().cell(v.id) {
            Ok(Cell {
                data: CellData::Bool(b),
                ..
            }) => Some(*b),
            _ => None,
        }
    }

    /// Numeric payload of any numeric cell, as f64.
    pub fn as_f64(&self, v: &VarRef) -> Option<f64> {
        match self.inner.borrow().cell(v.id) {
            Ok(cell) => match cell.data {
                CellData::Int(n) => Some(n as f64),
                CellData::Float(n) => Some(n),
                CellData::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
                _ => None,
            },
            Err(_) => None,
        }
    }

    /// Integer read of any cell: integers as-is, floats truncated, booleans
    /// as 0/1, everything else 0. Used where comparator results are consumed.
    pub fn int_of(&self, v: &VarRef) -> i64 {
        match self.inner.borrow().cell(v.id) {
            Ok(cell) => match cell.data {
                CellData::Int(n) => n,
                CellData::Float(n) => n as i64,
                CellData::Bool(b) => i64::from(b),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    pub fn str_value(&self, v: &VarRef) -> Option<String> {
        match self.inner.borrow().cell(v.id) {
            Ok(Cell {
                data: CellData::Str(s),
                ..
            }) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn native_id(&self, v: &VarRef) -> Option<u32> {
        match self.inner.borrow().cell(v.id) {
            Ok(Cell {
                data: CellData::Native(n),
                ..
            }) => Some(*n),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Bindings: keyed access
    // ------------------------------------------------------------------

    /// Bind `value` at `key`, locking it on behalf of the container. An
    /// existing binding at the same key has its value replaced (and the old
    /// value unlocked); a new key is appended at the end of the chain.
    pub fn set_child(&self, container: &VarRef, key: Key, value: &VarRef) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.lock(value.id);
        let bindings = match inner.bindings_mut(container.id) {
            Ok(b) => b,
            Err(e) => {
                inner.unlock(value.id);
                return Err(e);
            }
        };
        if let Some(old) = bindings.insert(key, value.id) {
            inner.unlock(old);
        }
        Ok(())
    }

    /// Look up a binding by key, acquiring a new lock on its value.
    pub fn get_child(&self, container: &VarRef, key: &Key) -> Result<Option<VarRef>> {
        let mut inner = self.inner.borrow_mut();
        let Some(&id) = inner.bindings(container.id)?.get(key) else {
            return Ok(None);
        };
        inner.lock(id);
        Ok(Some(VarRef {
            id,
            store: inner.self_weak.clone(),
        }))
    }

    /// Unlink a binding by key, preserving the order of the survivors. The
    /// container's lock on the value transfers to the returned handle.
    pub fn remove_child(&self, container: &VarRef, key: &Key) -> Result<Option<VarRef>> {
        let mut inner = self.inner.borrow_mut();
        let Some(id) = inner.bindings_mut(container.id)?.shift_remove(key) else {
            return Ok(None);
        };
        Ok(Some(VarRef {
            id,
            store: inner.self_weak.clone(),
        }))
    }

    pub fn child_count(&self, container: &VarRef) -> Result<usize> {
        Ok(self.inner.borrow().bindings(container.id)?.len())
    }

    pub fn highest_index(&self, container: &VarRef) -> Result<Option<u32>> {
        self.inner.borrow().highest_index(container.id)
    }

    /// Logical array length: highest integer key + 1. Sparse gaps count
    /// toward the length even though they have no binding.
    pub fn array_length(&self, container: &VarRef) -> Result<u32> {
        Ok(match self.inner.borrow().highest_index(container.id)? {
            Some(n) => n + 1,
            None => 0,
        })
    }

    /// Append `value` as a new trailing binding at key = current length.
    /// Returns the new logical length.
    pub fn append(&self, container: &VarRef, value: &VarRef) -> Result<u32> {
        let key = self.array_length(container)?;
        self.set_child(container, Key::Index(key), value)?;
        Ok(key + 1)
    }

    // ------------------------------------------------------------------
    // Bindings: positional access (chain order)
    // ------------------------------------------------------------------

    pub fn key_at(&self, container: &VarRef, pos: usize) -> Result<Option<Key>> {
        Ok(self
            .inner
            .borrow()
            .bindings(container.id)?
            .get_index(pos)
            .map(|(k, _)| k.clone()))
    }

    /// Lock and return the value of the binding at a chain position.
    pub fn value_at(&self, container: &VarRef, pos: usize) -> Result<Option<VarRef>> {
        let mut inner = self.inner.borrow_mut();
        let Some(&id) = inner.bindings(container.id)?.get_index(pos).map(|(_, v)| v) else {
            return Ok(None);
        };
        inner.lock(id);
        Ok(Some(VarRef {
            id,
            store: inner.self_weak.clone(),
        }))
    }

    /// Replace the value of the binding at a chain position in place.
    pub fn set_value_at(&self, container: &VarRef, pos: usize, value: &VarRef) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.lock(value.id);
        let old = match inner.bindings_mut(container.id) {
            Ok(b) => b
                .get_index_mut(pos)
                .map(|(_, slot)| std::mem::replace(slot, value.id)),
            Err(e) => {
                inner.unlock(value.id);
                return Err(e);
            }
        };
        match old {
            Some(old) => {
                inner.unlock(old);
                Ok(())
            }
            None => {
                inner.unlock(value.id);
                Err(Error::type_error("binding position out of range"))
            }
        }
    }

    /// Unlink the binding at a chain position; survivors keep their order.
    /// The container's lock transfers to the returned handle.
    pub fn remove_at(&self, container: &VarRef, pos: usize) -> Result<Option<VarRef>> {
        let mut inner = self.inner.borrow_mut();
        let Some((_, id)) = inner.bindings_mut(container.id)?.shift_remove_index(pos) else {
            return Ok(None);
        };
        Ok(Some(VarRef {
            id,
            store: inner.self_weak.clone(),
        }))
    }

    /// Insert a binding immediately before the given chain position (at the
    /// end when `pos` is past the last binding). Fails if the key already
    /// exists in the container.
    pub fn insert_before(
        &self,
        container: &VarRef,
        pos: usize,
        key: Key,
        value: &VarRef,
    ) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.lock(value.id);
        let bindings = match inner.bindings_mut(container.id) {
            Ok(b) => b,
            Err(e) => {
                inner.unlock(value.id);
                return Err(e);
            }
        };
        if bindings.contains_key(&key) {
            inner.unlock(value.id);
            return Err(Error::type_error("duplicate key in container"));
        }
        let pos = pos.min(bindings.len());
        bindings.shift_insert(pos, key, value.id);
        Ok(())
    }

    /// Shift the integer key of every binding at chain position >= `pos` by
    /// `delta`, keeping chain order untouched. String keys are left alone.
    ///
    /// Keys stay unique per container: a shift that would move a key out of
    /// the u32 range or onto another binding's key fails up front, leaving
    /// the container untouched.
    pub fn shift_keys_from(&self, container: &VarRef, pos: usize, delta: i64) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let mut inner = self.inner.borrow_mut();
        let bindings = inner.bindings_mut(container.id)?;

        let shifted_key = |i: usize, key: &Key| -> Result<Key> {
            match key {
                Key::Index(n) if i >= pos => {
                    let shifted = i64::from(*n) + delta;
                    if shifted < 0 || shifted > i64::from(u32::MAX) {
                        return Err(Error::type_error("key shift out of range"));
                    }
                    Ok(Key::Index(shifted as u32))
                }
                other => Ok(other.clone()),
            }
        };

        // Validate before mutating so a bad shift cannot drop a binding or
        // strand its lock.
        let mut seen = FxHashSet::default();
        for (i, key) in bindings.keys().enumerate() {
            if !seen.insert(shifted_key(i, key)?) {
                return Err(Error::type_error("key shift would collide"));
            }
        }

        let rebuilt: Bindings = bindings
            .drain(..)
            .enumerate()
            .map(|(i, (key, id))| {
                let key = match key {
                    Key::Index(n) if i >= pos => Key::Index((i64::from(n) + delta) as u32),
                    other => other,
                };
                (key, id)
            })
            .collect();
        *bindings = rebuilt;
        Ok(())
    }

    pub fn position_of(&self, container: &VarRef, key: &Key) -> Result<Option<usize>> {
        Ok(self.inner.borrow().bindings(container.id)?.get_index_of(key))
    }

    // ------------------------------------------------------------------
    // Flat sequences (string cells)
    // ------------------------------------------------------------------

    pub fn str_char_count(&self, v: &VarRef) -> usize {
        match self.inner.borrow().cell(v.id) {
            Ok(Cell {
                data: CellData::Str(s),
                ..
            }) => s.chars().count(),
            _ => 0,
        }
    }

    pub fn char_at(&self, v: &VarRef, pos: usize) -> Option<char> {
        match self.inner.borrow().cell(v.id) {
            Ok(Cell {
                data: CellData::Str(s),
                ..
            }) => s.chars().nth(pos),
            _ => None,
        }
    }

    /// Overwrite a single character of a string cell by character position.
    pub fn set_char_at(&self, v: &VarRef, pos: usize, ch: char) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        match &mut inner.cell_mut(v.id)?.data {
            CellData::Str(s) => {
                let mut chars: Vec<char> = s.chars().collect();
                let Some(slot) = chars.get_mut(pos) else {
                    return Err(Error::type_error("character position out of range"));
                };
                *slot = ch;
                *s = chars.into_iter().collect();
                Ok(())
            }
            _ => Err(Error::type_error("not a string cell")),
        }
    }
}

impl Default for VarStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
