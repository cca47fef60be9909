//! Error types for command execution.
//!
//! Every failure a command can produce is represented by the [`Error`]
//! enum. Errors are structured (typed fields, no free-form strings where
//! a field will do) and serializable, so a bridge on the other side of
//! the dispatch boundary can report them losslessly. All failures are
//! synchronous results of the call that caused them.

use serde::{Deserialize, Serialize};

/// Result alias for command execution.
pub type Result<T> = std::result::Result<T, Error>;

/// Command execution errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    /// A required argument was absent from the call
    #[error("missing required argument: {name}")]
    MissingArgument {
        /// Name of the absent argument
        name: String,
    },

    /// The value passed to encode is not one of the supported types.
    ///
    /// This is a distinguishable error, not a silent encode failure.
    #[error("unsupported value for encode: {reason}")]
    UnsupportedValue {
        /// What made the value unsupported
        reason: String,
    },

    /// Opening the backing store failed
    #[error("failed to open store {id}: {reason}")]
    OpenFailed {
        /// Target store id
        id: String,
        /// Underlying open failure
        reason: String,
    },

    /// The target store has been closed
    #[error("store is closed")]
    StoreClosed,

    /// The backing region failed an integrity check
    #[error("corruption: {reason}")]
    Corruption {
        /// What failed validation
        reason: String,
    },

    /// Invalid key
    #[error("invalid key: {reason}")]
    InvalidKey {
        /// What made the key invalid
        reason: String,
    },

    /// The store is held by another process
    #[error("store locked: {reason}")]
    Locked {
        /// Lock contention detail
        reason: String,
    },

    /// I/O error
    #[error("io error: {message}")]
    Io {
        /// Underlying I/O failure
        message: String,
    },
}

impl Error {
    /// Shorthand for a missing-argument error.
    pub fn missing(name: &str) -> Self {
        Error::MissingArgument {
            name: name.to_string(),
        }
    }
}
