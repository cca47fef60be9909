//! MapKV - memory-mapped typed key-value store with multi-instance
//! namespacing
//!
//! Each namespace id maps to one file-backed memory-mapped region
//! holding typed entries (string, int32, int64, double, bool, bytes).
//! Stores open lazily, persist across reopens, and support optional
//! at-rest encryption and explicit compaction.
//!
//! # Quick Start
//!
//! ```ignore
//! use mapkv::{Command, Executor, Output, Value};
//!
//! let executor = Executor::with_root("./mapkv_data")?;
//!
//! executor.execute(Command::Encode {
//!     id: None, // the "default" namespace
//!     key: "age".into(),
//!     value: Value::Int32(30),
//!     mode: None,
//!     crypt_key: None,
//! })?;
//! ```
//!
//! # Architecture
//!
//! All operations go through the [`Executor`], which owns the
//! process-wide [`StoreRegistry`]. A bridge-shaped entry point,
//! [`Executor::dispatch`], accepts a method name plus JSON arguments
//! for callers on the other side of a method-call channel.

// Re-export the public API
pub use mapkv_core::{AccessMode, StoreId, Value};
pub use mapkv_executor::{Command, DecodeKind, Error, Executor, Output, Result, DEFAULT_ROOT_DIR};
pub use mapkv_storage::{Store, StoreRegistry, PAGE_SIZE};
