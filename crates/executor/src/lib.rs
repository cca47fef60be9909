//! Command execution layer for MapKV
//!
//! This crate is the operation surface over the storage engine:
//!
//! - [`Command`]: the typed instruction set (one variant per operation)
//! - [`Output`]: the result of each command
//! - [`Error`]: structured, serializable execution errors
//! - [`Executor`]: the dispatcher, owning the process-wide registry
//!
//! The stringly [`Executor::dispatch`] entry point mirrors a
//! method-call bridge: a method name and a JSON argument map in, an
//! output or a structured error out. Unknown methods come back as
//! [`Output::NotImplemented`] rather than failures.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod convert;
pub mod error;
pub mod executor;
pub mod output;

pub use command::{Command, DecodeKind};
pub use error::{Error, Result};
pub use executor::{Executor, DEFAULT_ROOT_DIR};
pub use output::Output;
