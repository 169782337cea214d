//! Collaborator contracts between the store's algorithms and the embedding
//! interpreter.
//!
//! The core never implements value coercion or callable internals itself; it
//! only sequences calls against these interfaces. `BasicHost` is a small
//! self-contained implementation for embedding scenarios and tests: default
//! coercion over primitive cells, native closures as callables, and an
//! interrupt flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::store::{CellKind, Key, VarRef, VarStore};

// ============================================================================
// Interrupt - cooperative cancellation signal
// ============================================================================

/// A cooperative cancellation flag, settable asynchronously (e.g. from a
/// break-signal handler) and polled by long-running loops. Passed explicitly
/// through the host rather than read from a process global, so abort paths
/// are testable in isolation.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Host - the collaborator interface
// ============================================================================

/// Services the embedding interpreter provides to the array algorithms:
/// value coercion, callable invocation, and the interrupt query.
pub trait Host {
    /// Canonical display form of a value.
    fn display(&self, store: &VarStore, v: &VarRef) -> String;

    /// Truthiness of a value.
    fn truthy(&self, store: &VarStore, v: &VarRef) -> bool;

    /// Default total order: `a <= b`. Used by sort when no comparator is
    /// supplied.
    fn le(&self, store: &VarStore, a: &VarRef, b: &VarRef) -> bool;

    /// Ordinary (non-strict-identity) equality.
    fn equals(&self, store: &VarStore, a: &VarRef, b: &VarRef) -> bool;

    /// Whether a value can be invoked.
    fn is_callable(&self, store: &VarStore, v: &VarRef) -> bool;

    /// Invoke a callable with a call context and ordered arguments. `None`
    /// means the call produced no defined result.
    fn invoke(
        &mut self,
        store: &VarStore,
        callee: &VarRef,
        this: Option<&VarRef>,
        args: &[VarRef],
    ) -> Result<Option<VarRef>>;

    /// Poll the cooperative interrupt signal.
    fn interrupted(&self) -> bool;
}

// ============================================================================
// BasicHost
// ============================================================================

type NativeFn = Box<dyn FnMut(&VarStore, Option<&VarRef>, &[VarRef]) -> Result<Option<VarRef>>>;

/// A minimal host: callables are registered Rust closures addressed through
/// `Native` cells, coercion follows ordinary JavaScript-like rules for the
/// primitive cell kinds.
#[derive(Default)]
pub struct BasicHost {
    natives: Vec<NativeFn>,
    pub interrupt: Interrupt,
}

impl BasicHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native closure and allocate a callable cell for it.
    pub fn register<F>(&mut self, store: &VarStore, f: F) -> Result<VarRef>
    where
        F: FnMut(&VarStore, Option<&VarRef>, &[VarRef]) -> Result<Option<VarRef>> + 'static,
    {
        let id = self.natives.len() as u32;
        self.natives.push(Box::new(f));
        store.alloc_native(id)
    }

    fn number_of(&self, store: &VarStore, v: &VarRef) -> Option<f64> {
        match store.kind(v) {
            CellKind::Int | CellKind::Float | CellKind::Bool => store.as_f64(v),
            CellKind::Str => store.str_value(v).and_then(|s| s.trim().parse().ok()),
            _ => None,
        }
    }
}

impl Host for BasicHost {
    fn display(&self, store: &VarStore, v: &VarRef) -> String {
        match store.kind(v) {
            CellKind::Undefined => "undefined".to_string(),
            CellKind::Bool => match store.as_bool(v) {
                Some(true) => "true".to_string(),
                _ => "false".to_string(),
            },
            CellKind::Int => store.as_int(v).unwrap_or(0).to_string(),
            CellKind::Float => {
                let n = store.as_f64(v).unwrap_or(f64::NAN);
                if n.is_nan() {
                    "NaN".to_string()
                } else if n.is_infinite() {
                    if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
                } else {
                    n.to_string()
                }
            }
            CellKind::Str => store.str_value(v).unwrap_or_default(),
            CellKind::Native => "function".to_string(),
            CellKind::Array => {
                // Comma-joined element displays, gaps empty.
                let len = store.array_length(v).unwrap_or(0);
                let mut out = String::new();
                for i in 0..len {
                    if i > 0 {
                        out.push(',');
                    }
                    if let Ok(Some(el)) = store.get_child(v, &Key::Index(i)) {
                        if !store.is_undefined(&el) {
                            out.push_str(&self.display(store, &el));
                        }
                    }
                }
                out
            }
            CellKind::Object => "[object Object]".to_string(),
        }
    }

    fn truthy(&self, store: &VarStore, v: &VarRef) -> bool {
        match store.kind(v) {
            CellKind::Undefined => false,
            CellKind::Bool => store.as_bool(v).unwrap_or(false),
            CellKind::Int | CellKind::Float => {
                let n = store.as_f64(v).unwrap_or(0.0);
                n != 0.0 && !n.is_nan()
            }
            CellKind::Str => store.str_value(v).is_some_and(|s| !s.is_empty()),
            CellKind::Native | CellKind::Array | CellKind::Object => true,
        }
    }

    fn le(&self, store: &VarStore, a: &VarRef, b: &VarRef) -> bool {
        if let (Some(x), Some(y)) = (self.number_of(store, a), self.number_of(store, b)) {
            return x <= y;
        }
        self.display(store, a) <= self.display(store, b)
    }

    fn equals(&self, store: &VarStore, a: &VarRef, b: &VarRef) -> bool {
        match (store.kind(a), store.kind(b)) {
            (CellKind::Undefined, CellKind::Undefined) => true,
            (CellKind::Str, CellKind::Str) => store.str_value(a) == store.str_value(b),
            (CellKind::Array | CellKind::Object | CellKind::Native, _)
            | (_, CellKind::Array | CellKind::Object | CellKind::Native) => {
                VarRef::same_cell(a, b)
            }
            _ => match (self.number_of(store, a), self.number_of(store, b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    fn is_callable(&self, store: &VarStore, v: &VarRef) -> bool {
        store
            .native_id(v)
            .is_some_and(|id| (id as usize) < self.natives.len())
    }

    fn invoke(
        &mut self,
        store: &VarStore,
        callee: &VarRef,
        this: Option<&VarRef>,
        args: &[VarRef],
    ) -> Result<Option<VarRef>> {
        let Some(id) = store.native_id(callee) else {
            return Err(Error::type_error("value is not callable"));
        };
        let Some(f) = self.natives.get_mut(id as usize) else {
            return Err(Error::type_error("unknown native callable"));
        };
        f(store, this, args)
    }

    fn interrupted(&self) -> bool {
        self.interrupt.is_set()
    }
}
