//! Core types for MapKV
//!
//! This crate defines the foundational types used throughout the system:
//! - StoreId: Namespace identifier selecting a mapped region
//! - AccessMode: Single-process vs multi-process locking policy
//! - Value: Tagged union over the six supported value types
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use types::{AccessMode, StoreId};
pub use value::Value;
