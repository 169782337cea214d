//! Error types for the variable store and its operations.

use thiserror::Error;

/// Failures an operation can report to the embedding interpreter.
///
/// Cooperative interruption is deliberately *not* represented here: an
/// interrupted traversal or sort returns `Ok` with whatever work it finished,
/// and the caller must not assume completion.
#[derive(Debug, Error)]
pub enum Error {
    /// The store's cell budget is exhausted. Never retried internally; the
    /// embedding layer converts this into a language-level error.
    #[error("out of cells: store budget of {capacity} cells exhausted")]
    OutOfCells { capacity: usize },

    /// An argument precondition was violated (e.g. a non-callable where a
    /// callable is required). Detected before any mutation takes place.
    #[error("TypeError: {message}")]
    Type { message: String },
}

impl Error {
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::Type {
            message: message.into(),
        }
    }

    /// True if this failure came from cell exhaustion rather than a bad
    /// argument.
    pub fn is_out_of_cells(&self) -> bool {
        matches!(self, Error::OutOfCells { .. })
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
