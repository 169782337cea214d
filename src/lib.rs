//! Reference-counted variable store and array builtins for embedding a small
//! JavaScript-like runtime.
//!
//! The store is an arena of refcounted cells; `VarRef` handles lock a cell on
//! clone and unlock it on drop, so lifetimes are enforced by ownership rather
//! than discipline. Containers hold insertion-ordered bindings and may be
//! sparse, iteration works uniformly over arrays, objects and strings, and
//! the array methods (including an interruptible in-place quicksort) are
//! built entirely on those two layers.
//!
//! # Example
//!
//! ```
//! use varcell::{array, BasicHost, VarStore};
//!
//! let store = VarStore::new();
//! let mut host = BasicHost::new();
//!
//! let nums = store.alloc_array().unwrap();
//! for n in [3, 1, 2] {
//!     let v = store.alloc_int(n).unwrap();
//!     store.append(&nums, &v).unwrap();
//! }
//!
//! varcell::sort::sort(&store, &mut host, &nums, None).unwrap();
//! let joined = array::join(&store, &mut host, &nums, None).unwrap();
//! assert_eq!(store.str_value(&joined).as_deref(), Some("1,2,3"));
//! ```

pub mod array;
pub mod error;
pub mod host;
pub mod iter;
pub mod json;
pub mod sort;
pub mod store;

pub use error::Error;
pub use error::Result;
pub use host::BasicHost;
pub use host::Host;
pub use host::Interrupt;
pub use iter::VarIter;
pub use store::CellKind;
pub use store::Key;
pub use store::StoreStats;
pub use store::VarRef;
pub use store::VarStore;
