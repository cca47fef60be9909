//! Identifier and mode types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The distinguished default namespace id.
pub const DEFAULT_STORE_ID: &str = "default";

/// Namespace identifier selecting which mapped region a store operation
/// targets.
///
/// A `StoreId` resolves to the same in-process store instance for the
/// lifetime of the process, until the store is explicitly closed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreId(String);

impl StoreId {
    /// Create a store id. An empty id falls back to the default namespace.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.is_empty() {
            Self::default()
        } else {
            StoreId(id)
        }
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the default namespace
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_STORE_ID
    }
}

impl Default for StoreId {
    fn default() -> Self {
        StoreId(DEFAULT_STORE_ID.to_string())
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoreId {
    fn from(s: &str) -> Self {
        StoreId::new(s)
    }
}

impl From<String> for StoreId {
    fn from(s: String) -> Self {
        StoreId::new(s)
    }
}

/// Access policy distinguishing single-process-exclusive vs
/// multi-process-shared use of a store.
///
/// The policy affects the advisory file-lock discipline only:
/// - `SingleProcess` holds an exclusive lock for the store's open lifetime
/// - `MultiProcess` takes the lock around each mutating operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    /// Exclusive use by one process (the default)
    SingleProcess,
    /// Shared use across cooperating processes
    MultiProcess,
}

impl AccessMode {
    /// Map a numeric bridge mode value to an access mode.
    ///
    /// `1` means single-process, `2` means multi-process. Anything else
    /// (including absent) falls back to single-process, matching the
    /// source bridge's default constant.
    pub fn from_bridge(mode: Option<i64>) -> Self {
        match mode {
            Some(2) => AccessMode::MultiProcess,
            _ => AccessMode::SingleProcess,
        }
    }
}

impl Default for AccessMode {
    fn default() -> Self {
        AccessMode::SingleProcess
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_id_default() {
        assert_eq!(StoreId::default().as_str(), "default");
        assert!(StoreId::default().is_default());
    }

    #[test]
    fn test_store_id_empty_falls_back_to_default() {
        assert_eq!(StoreId::new(""), StoreId::default());
    }

    #[test]
    fn test_store_id_named() {
        let id = StoreId::new("session");
        assert_eq!(id.as_str(), "session");
        assert!(!id.is_default());
        assert_eq!(id.to_string(), "session");
    }

    #[test]
    fn test_access_mode_from_bridge() {
        assert_eq!(AccessMode::from_bridge(None), AccessMode::SingleProcess);
        assert_eq!(AccessMode::from_bridge(Some(1)), AccessMode::SingleProcess);
        assert_eq!(AccessMode::from_bridge(Some(2)), AccessMode::MultiProcess);
        assert_eq!(AccessMode::from_bridge(Some(99)), AccessMode::SingleProcess);
    }
}
