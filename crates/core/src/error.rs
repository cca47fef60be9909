//! Error types for MapKV
//!
//! This module defines all error types used by the storage layer.
//! We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.

use std::io;
use thiserror::Error;

/// Result type alias for MapKV storage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the MapKV storage layer
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations, mapping, locking)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Data corruption detected (bad magic, version, CRC, or codec mismatch).
    ///
    /// Opening a store with a corrupted or incompatible backing region
    /// surfaces this variant rather than crashing the caller.
    #[error("data corruption: {0}")]
    Corruption(String),

    /// Operation attempted on a closed store
    #[error("store is closed")]
    StoreClosed,

    /// The backing region is exclusively locked by another process
    #[error("store is locked: {0}")]
    Locked(String),

    /// Key rejected (too long for the record format)
    #[error("invalid key: {0}")]
    InvalidKey(String),
}
