//! Storage layer for MapKV
//!
//! This crate implements the memory-mapped storage engine:
//! - `MappedRegion`: file-backed mmap region with page-aligned growth
//! - Record format: append-only, last-write-wins, CRC-checked records
//! - `RegionCodec`: payload transformation seam (identity, keyed)
//! - `Store`: one typed key-value store per namespace
//! - `StoreRegistry`: singleton-per-id instance map
//!
//! # Concurrency
//!
//! Each `Store` serializes access to its mapped region with an internal
//! lock. Cross-process safety is an advisory file-lock discipline selected
//! by `AccessMode`. The registry guards its check-then-insert sequence
//! with a single mutex, so concurrent `resolve` calls for the same id
//! yield the same instance and exactly one underlying open.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod format;
pub mod region;
pub mod registry;
pub mod store;

pub use codec::{CodecError, IdentityCodec, KeyedCodec, RegionCodec};
pub use region::{MappedRegion, PAGE_SIZE};
pub use registry::StoreRegistry;
pub use store::Store;
