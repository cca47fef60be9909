//! Output enum for command execution results.
//!
//! Every command produces exactly one output variant; the mapping is
//! deterministic and documented on each [`Command`](crate::Command)
//! variant. Unknown method names on the stringly dispatch surface
//! produce [`Output::NotImplemented`] rather than an error, matching
//! the bridge contract.

use serde::{Deserialize, Serialize};

use mapkv_core::Value;

/// Successful command execution results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Output {
    /// No return value
    Unit,

    /// Boolean result
    Bool(bool),

    /// Unsigned integer result (counts, sizes)
    Uint(u64),

    /// Optional typed value (decode results; `None` when the key is
    /// absent and no default was supplied)
    Maybe(Option<Value>),

    /// List of keys
    Keys(Vec<String>),

    /// Filesystem path (root directory)
    Path(String),

    /// The named method is not part of the operation surface
    NotImplemented {
        /// The unknown method name as received
        method: String,
    },
}

impl Output {
    /// The boolean payload, if this is a `Bool` output.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Output::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload, if this is a `Uint` output.
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Output::Uint(n) => Some(*n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_json_roundtrip() {
        let out = Output::Maybe(Some(Value::Int64(30)));
        let json = serde_json::to_string(&out).unwrap();
        let back: Output = serde_json::from_str(&json).unwrap();
        assert_eq!(out, back);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Output::Bool(true).as_bool(), Some(true));
        assert_eq!(Output::Uint(7).as_uint(), Some(7));
        assert_eq!(Output::Unit.as_bool(), None);
    }
}
