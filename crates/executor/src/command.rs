//! Command enum defining all MapKV operations.
//!
//! Commands are the instruction set of the store: every operation the
//! dispatch surface exposes is a variant here. Commands are
//! self-contained (all parameters in the variant), serializable, and
//! pure data.
//!
//! Store-targeting commands carry an optional `id`; `None` resolves to
//! the `"default"` namespace before dispatch. `mode` and `crypt_key`
//! ride along on the commands that can be the first touch of a store
//! (encode and decode) and only take effect on that first open.

use serde::{Deserialize, Serialize};

use mapkv_core::Value;

/// Which typed interpretation a decode requests.
///
/// Decoding is one parametrized operation over a type selector rather
/// than one command per type; the stringly dispatch surface still
/// exposes one method name per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeKind {
    /// UTF-8 string
    String,
    /// Integer (a stored 32-bit value widens to 64-bit)
    Int,
    /// 64-bit float
    Double,
    /// Boolean
    Bool,
    /// Raw bytes
    Bytes,
}

/// A self-contained, serializable store operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub enum Command {
    // ==================== Process lifecycle ====================
    /// Initialize the process-wide root directory.
    /// Returns: `Output::Path` (the effective root)
    Initialize {
        /// Root directory for region files; defaults when omitted
        root_dir: Option<String>,
    },

    /// Close every open store at process exit.
    /// Returns: `Output::Unit`
    OnExit,

    /// Report the effective root directory.
    /// Returns: `Output::Path`
    GetRootDir,

    /// Report the region growth granularity in bytes.
    /// Returns: `Output::Uint`
    PageSize,

    // ==================== Writes ====================
    /// Write a typed value, overwriting any existing value and type.
    /// Returns: `Output::Bool` (success)
    Encode {
        /// Target namespace; `None` means `"default"`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Entry key
        key: String,
        /// Value to store
        value: Value,
        /// Bridge mode number, applied on first open only
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<i64>,
        /// Encryption key, applied on first open only
        #[serde(default, skip_serializing_if = "Option::is_none")]
        crypt_key: Option<String>,
    },

    /// Delete one key; absent keys are a no-op.
    /// Returns: `Output::Unit`
    RemoveValueForKey {
        /// Target namespace
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Entry key
        key: String,
    },

    /// Delete several keys; absent keys are no-ops.
    /// Returns: `Output::Unit`
    RemoveValuesForKeys {
        /// Target namespace
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Entry keys
        keys: Vec<String>,
    },

    /// Remove all keys, keeping the store open.
    /// Returns: `Output::Unit`
    ClearAll {
        /// Target namespace
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Compact the backing region.
    /// Returns: `Output::Unit`
    Trim {
        /// Target namespace
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    // ==================== Reads ====================
    /// Read a value with a typed interpretation and caller default.
    /// Returns: `Output::Maybe`
    Decode {
        /// Target namespace
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Entry key
        key: String,
        /// Requested type
        kind: DecodeKind,
        /// Fallback when the key is absent or holds another type.
        /// Numeric/bool kinds fall back to zero/false when omitted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
        /// Bridge mode number, applied on first open only
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<i64>,
        /// Encryption key, applied on first open only
        #[serde(default, skip_serializing_if = "Option::is_none")]
        crypt_key: Option<String>,
    },

    /// Whether a key holds a value.
    /// Returns: `Output::Bool`
    ContainsKey {
        /// Target namespace
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Entry key
        key: String,
    },

    /// On-disk size of a stored value (length prefix included).
    /// Returns: `Output::Uint` (0 when absent)
    GetValueSize {
        /// Target namespace
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Entry key
        key: String,
    },

    /// Raw length of the decoded value bytes.
    /// Returns: `Output::Uint` (0 when absent)
    GetValueActualSize {
        /// Target namespace
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Entry key
        key: String,
    },

    /// All live keys, unordered.
    /// Returns: `Output::Keys`
    AllKeys {
        /// Target namespace
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Number of live keys.
    /// Returns: `Output::Uint`
    Count {
        /// Target namespace
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Bytes of the backing region in use.
    /// Returns: `Output::Uint`
    TotalSize {
        /// Target namespace
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    // ==================== Store lifecycle ====================
    /// Drop the in-process decoded-value cache.
    /// Returns: `Output::Unit`
    ClearMemoryCache {
        /// Target namespace
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Close the store and drop it from the registry.
    /// Returns: `Output::Unit`
    Close {
        /// Target namespace
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_roundtrip() {
        let cmd = Command::Encode {
            id: None,
            key: "age".into(),
            value: Value::Int32(30),
            mode: None,
            crypt_key: None,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, back);
    }

    #[test]
    fn test_optional_id_omitted_from_json() {
        let cmd = Command::Count { id: None };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(!json.contains("id"));
    }
}
