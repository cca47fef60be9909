//! The Executor - single entry point to the store engine.
//!
//! Routes typed [`Command`]s to registry and store operations and
//! converts results to [`Output`]s. The stringly [`dispatch`] surface
//! mirrors a method-call bridge: method name plus a JSON argument map,
//! with unknown methods reported as `NotImplemented` rather than failed.
//!
//! [`dispatch`]: Executor::dispatch

use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use mapkv_core::{AccessMode, StoreId, Value};
use mapkv_storage::{Store, StoreRegistry, PAGE_SIZE};

use crate::{Command, DecodeKind, Error, Output, Result};

/// Root directory used when `initialize` is never called with one.
pub const DEFAULT_ROOT_DIR: &str = "./mapkv_data";

/// The command executor - single entry point to the store engine.
///
/// Owns the process-wide [`StoreRegistry`]. The registry is created on
/// `initialize`, or lazily with [`DEFAULT_ROOT_DIR`] by the first store
/// operation. `Executor` is `Send + Sync` and can be shared across
/// threads.
pub struct Executor {
    registry: Mutex<Option<Arc<StoreRegistry>>>,
}

impl Executor {
    /// Create an executor with no root directory configured yet.
    pub fn new() -> Self {
        Executor {
            registry: Mutex::new(None),
        }
    }

    /// Create an executor rooted at `root`, as if `initialize(root)` had
    /// already been called.
    pub fn with_root(root: impl Into<PathBuf>) -> Result<Self> {
        let executor = Executor::new();
        executor.init_root(root.into())?;
        Ok(executor)
    }

    /// Execute a single typed command.
    pub fn execute(&self, cmd: Command) -> Result<Output> {
        match cmd {
            // Process lifecycle
            Command::Initialize { root_dir } => {
                let root = root_dir.unwrap_or_else(|| DEFAULT_ROOT_DIR.to_string());
                let registry = self.init_root(PathBuf::from(root))?;
                Ok(Output::Path(registry.root().display().to_string()))
            }
            Command::OnExit => {
                if let Some(registry) = self.registry.lock().as_ref() {
                    registry.close_all()?;
                }
                Ok(Output::Unit)
            }
            Command::GetRootDir => {
                let registry = self.registry()?;
                Ok(Output::Path(registry.root().display().to_string()))
            }
            Command::PageSize => Ok(Output::Uint(PAGE_SIZE as u64)),

            // Writes
            Command::Encode {
                id,
                key,
                value,
                mode,
                crypt_key,
            } => {
                let store = self.store(id, mode, crypt_key.as_deref())?;
                store.encode(&key, &value)?;
                Ok(Output::Bool(true))
            }
            Command::RemoveValueForKey { id, key } => {
                let store = self.store(id, None, None)?;
                store.remove_value_for_key(&key)?;
                Ok(Output::Unit)
            }
            Command::RemoveValuesForKeys { id, keys } => {
                let store = self.store(id, None, None)?;
                store.remove_values_for_keys(&keys)?;
                Ok(Output::Unit)
            }
            Command::ClearAll { id } => {
                let store = self.store(id, None, None)?;
                store.clear_all()?;
                Ok(Output::Unit)
            }
            Command::Trim { id } => {
                let store = self.store(id, None, None)?;
                store.trim()?;
                Ok(Output::Unit)
            }

            // Reads
            Command::Decode {
                id,
                key,
                kind,
                default,
                mode,
                crypt_key,
            } => {
                let store = self.store(id, mode, crypt_key.as_deref())?;
                decode_with_default(&store, &key, kind, default)
            }
            Command::ContainsKey { id, key } => {
                let store = self.store(id, None, None)?;
                Ok(Output::Bool(store.contains_key(&key)?))
            }
            Command::GetValueSize { id, key } => {
                let store = self.store(id, None, None)?;
                Ok(Output::Uint(store.value_size(&key)?))
            }
            Command::GetValueActualSize { id, key } => {
                let store = self.store(id, None, None)?;
                Ok(Output::Uint(store.actual_value_size(&key)?))
            }
            Command::AllKeys { id } => {
                let store = self.store(id, None, None)?;
                Ok(Output::Keys(store.all_keys()?))
            }
            Command::Count { id } => {
                let store = self.store(id, None, None)?;
                Ok(Output::Uint(store.count()?))
            }
            Command::TotalSize { id } => {
                let store = self.store(id, None, None)?;
                Ok(Output::Uint(store.total_size()?))
            }

            // Store lifecycle
            Command::ClearMemoryCache { id } => {
                let store = self.store(id, None, None)?;
                store.clear_memory_cache()?;
                Ok(Output::Unit)
            }
            Command::Close { id } => {
                let registry = self.registry()?;
                registry.close(&store_id(id))?;
                Ok(Output::Unit)
            }
        }
    }

    /// Execute a method-call-bridge-shaped operation: a method name and
    /// a JSON argument map.
    ///
    /// Unknown method names yield [`Output::NotImplemented`]; a missing
    /// required argument is a [`Error::MissingArgument`] failure of the
    /// call.
    pub fn dispatch(&self, method: &str, args: &serde_json::Value) -> Result<Output> {
        debug!(method, "dispatch");
        let cmd = match method {
            "initialize" => Command::Initialize {
                root_dir: arg_str(args, "rootDir"),
            },
            "onExit" => Command::OnExit,
            "getRootDir" => Command::GetRootDir,
            "pageSize" => Command::PageSize,

            "encode" => Command::Encode {
                id: arg_str(args, "id"),
                key: require_str(args, "key")?,
                value: value_from_json(
                    args.get("value").ok_or_else(|| Error::missing("value"))?,
                )?,
                mode: arg_i64(args, "mode"),
                crypt_key: arg_str(args, "cryptKey"),
            },

            "decodeString" => decode_command(args, DecodeKind::String)?,
            "decodeInt" => decode_command(args, DecodeKind::Int)?,
            "decodeDouble" => decode_command(args, DecodeKind::Double)?,
            "decodeBool" => decode_command(args, DecodeKind::Bool)?,
            "decodeBytes" => decode_command(args, DecodeKind::Bytes)?,

            "containsKey" => Command::ContainsKey {
                id: arg_str(args, "id"),
                key: require_str(args, "key")?,
            },
            "getValueSize" => Command::GetValueSize {
                id: arg_str(args, "id"),
                key: require_str(args, "key")?,
            },
            "getValueActualSize" => Command::GetValueActualSize {
                id: arg_str(args, "id"),
                key: require_str(args, "key")?,
            },
            "removeValueForKey" => Command::RemoveValueForKey {
                id: arg_str(args, "id"),
                key: require_str(args, "key")?,
            },
            "removeValuesForKeys" => Command::RemoveValuesForKeys {
                id: arg_str(args, "id"),
                keys: require_str_list(args, "keys")?,
            },
            "allKeys" => Command::AllKeys {
                id: arg_str(args, "id"),
            },
            "count" => Command::Count {
                id: arg_str(args, "id"),
            },
            "totalSize" => Command::TotalSize {
                id: arg_str(args, "id"),
            },
            "clearAll" => Command::ClearAll {
                id: arg_str(args, "id"),
            },
            "trim" => Command::Trim {
                id: arg_str(args, "id"),
            },
            "clearMemoryCache" => Command::ClearMemoryCache {
                id: arg_str(args, "id"),
            },
            "close" => Command::Close {
                id: arg_str(args, "id"),
            },

            _ => {
                return Ok(Output::NotImplemented {
                    method: method.to_string(),
                })
            }
        };
        self.execute(cmd)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Set (or confirm) the registry root. A repeat call with the same
    /// root is a no-op; a different root closes all open stores first.
    fn init_root(&self, root: PathBuf) -> Result<Arc<StoreRegistry>> {
        let mut guard = self.registry.lock();
        if let Some(registry) = guard.as_ref() {
            if registry.root() == root.as_path() {
                return Ok(Arc::clone(registry));
            }
            info!(
                old = %registry.root().display(),
                new = %root.display(),
                "re-rooting store registry"
            );
            registry.close_all()?;
        }
        fs::create_dir_all(&root).map_err(|e| Error::Io {
            message: e.to_string(),
        })?;
        let registry = Arc::new(StoreRegistry::new(root));
        *guard = Some(Arc::clone(&registry));
        Ok(registry)
    }

    /// The registry, created lazily with the default root if
    /// `initialize` was never called.
    fn registry(&self) -> Result<Arc<StoreRegistry>> {
        {
            let guard = self.registry.lock();
            if let Some(registry) = guard.as_ref() {
                return Ok(Arc::clone(registry));
            }
        }
        self.init_root(PathBuf::from(DEFAULT_ROOT_DIR))
    }

    /// Resolve the store for a command's target id, opening on demand.
    fn store(
        &self,
        id: Option<String>,
        mode: Option<i64>,
        crypt_key: Option<&str>,
    ) -> Result<Arc<Store>> {
        let registry = self.registry()?;
        let id = store_id(id);
        registry
            .resolve(id.clone(), AccessMode::from_bridge(mode), crypt_key)
            .map_err(|e| Error::OpenFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Default for Executor {
    fn default() -> Self {
        Executor::new()
    }
}

fn store_id(id: Option<String>) -> StoreId {
    StoreId::new(id.unwrap_or_default())
}

fn decode_with_default(
    store: &Store,
    key: &str,
    kind: DecodeKind,
    default: Option<Value>,
) -> Result<Output> {
    let result = match kind {
        DecodeKind::String => {
            let default = match default {
                Some(Value::String(s)) => Some(s),
                _ => None,
            };
            store.decode_string(key, default)?.map(Value::String)
        }
        DecodeKind::Int => {
            let default = default.as_ref().and_then(Value::as_i64).unwrap_or(0);
            Some(Value::Int64(store.decode_i64(key, default)?))
        }
        DecodeKind::Double => {
            let default = default.as_ref().and_then(Value::as_f64).unwrap_or(0.0);
            Some(Value::Double(store.decode_f64(key, default)?))
        }
        DecodeKind::Bool => {
            let default = default.as_ref().and_then(Value::as_bool).unwrap_or(false);
            Some(Value::Bool(store.decode_bool(key, default)?))
        }
        DecodeKind::Bytes => {
            let default = match default {
                Some(Value::Bytes(b)) => Some(b),
                _ => None,
            };
            store.decode_bytes(key, default)?.map(Value::Bytes)
        }
    };
    Ok(Output::Maybe(result))
}

fn decode_command(args: &serde_json::Value, kind: DecodeKind) -> Result<Command> {
    Ok(Command::Decode {
        id: arg_str(args, "id"),
        key: require_str(args, "key")?,
        kind,
        default: args.get("defaultValue").and_then(|v| default_from_json(kind, v)),
        mode: arg_i64(args, "mode"),
        crypt_key: arg_str(args, "cryptKey"),
    })
}

/// Interpret a JSON default for a decode kind; a default of the wrong
/// JSON shape is treated as absent.
fn default_from_json(kind: DecodeKind, v: &serde_json::Value) -> Option<Value> {
    match kind {
        DecodeKind::String => v.as_str().map(|s| Value::String(s.to_string())),
        DecodeKind::Int => v.as_i64().map(Value::Int64),
        DecodeKind::Double => v.as_f64().map(Value::Double),
        DecodeKind::Bool => v.as_bool().map(Value::Bool),
        DecodeKind::Bytes => byte_list(v).map(Value::Bytes),
    }
}

/// Decide the typed variant for a bridge-supplied encode value.
///
/// Integers that fit in 32 bits store as `Int32`, wider ones as `Int64`,
/// other numbers as `Double`. A JSON array of byte-range integers is a
/// byte sequence. Anything else (null, nested structures) is an
/// `UnsupportedValue` error rather than a silent failure.
fn value_from_json(v: &serde_json::Value) -> Result<Value> {
    match v {
        serde_json::Value::String(s) => Ok(Value::String(s.clone())),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i >= i64::from(i32::MIN) && i <= i64::from(i32::MAX) {
                    Ok(Value::Int32(i as i32))
                } else {
                    Ok(Value::Int64(i))
                }
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Double(f))
            } else {
                Err(Error::UnsupportedValue {
                    reason: format!("number out of range: {}", n),
                })
            }
        }
        serde_json::Value::Array(_) => byte_list(v).map(Value::Bytes).ok_or_else(|| {
            Error::UnsupportedValue {
                reason: "array is not a byte sequence".to_string(),
            }
        }),
        serde_json::Value::Null => Err(Error::UnsupportedValue {
            reason: "null".to_string(),
        }),
        serde_json::Value::Object(_) => Err(Error::UnsupportedValue {
            reason: "object".to_string(),
        }),
    }
}

fn byte_list(v: &serde_json::Value) -> Option<Vec<u8>> {
    let items = v.as_array()?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let n = item.as_u64()?;
        if n > u8::MAX as u64 {
            return None;
        }
        out.push(n as u8);
    }
    Some(out)
}

fn arg_str(args: &serde_json::Value, name: &str) -> Option<String> {
    args.get(name).and_then(|v| v.as_str()).map(str::to_string)
}

fn arg_i64(args: &serde_json::Value, name: &str) -> Option<i64> {
    args.get(name).and_then(|v| v.as_i64())
}

fn require_str(args: &serde_json::Value, name: &str) -> Result<String> {
    arg_str(args, name).ok_or_else(|| Error::missing(name))
}

fn require_str_list(args: &serde_json::Value, name: &str) -> Result<Vec<String>> {
    let items = args
        .get(name)
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::missing(name))?;
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::missing(name))
        })
        .collect()
}
