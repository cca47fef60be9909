//! The typed key-value store.
//!
//! One `Store` per namespace id. Values live in an append-only,
//! last-write-wins record log inside a memory-mapped region; an
//! in-memory index maps each key to its newest record, and decoded
//! values are memoized in a cache that `clear_memory_cache` drops.
//!
//! ## Concurrency Model
//!
//! All access to a store's mapped region is serialized by an internal
//! lock; operations are synchronous and blocking. Cross-process safety
//! is an advisory file-lock discipline on a sidecar lock file:
//!
//! - `SingleProcess`: the exclusive lock is taken at open and held until
//!   close. A second process opening the same store gets `Locked`.
//! - `MultiProcess`: the lock is taken around each mutating operation
//!   and released after the region is flushed.
//!
//! ## Lifecycle
//!
//! `unopened → open → closed`. Only open stores accept operations;
//! `close()` flushes and releases the mapping, and the store stays
//! closed until the registry reopens it from persisted state.

use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use mapkv_core::{AccessMode, Error, Result, StoreId, Value};

use crate::codec::{IdentityCodec, KeyedCodec, RegionCodec};
use crate::format::{
    self, ParsedKind, TypeTag, VALUE_LEN_PREFIX,
};
use crate::region::MappedRegion;

/// Newest-record location for a key.
#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    tag: TypeTag,
    /// Absolute offset of the stored (codec-encoded) payload
    payload_offset: usize,
    /// Stored payload length
    payload_len: usize,
}

struct OpenStore {
    region: MappedRegion,
    lock_file: File,
    index: HashMap<String, IndexEntry>,
    cache: HashMap<String, Value>,
}

enum StoreState {
    Open(OpenStore),
    Closed,
}

/// A typed key-value store backed by one mapped region.
pub struct Store {
    id: StoreId,
    region_path: PathBuf,
    mode: AccessMode,
    codec: Arc<dyn RegionCodec>,
    inner: Mutex<StoreState>,
}

impl Store {
    /// Open (or create) the store for `id` under `root`.
    ///
    /// `mode` and `crypt_key` take effect here; the registry ignores them
    /// for an already-open id. Recovery scans the record log, dropping a
    /// CRC-corrupt tail instead of failing the open; header-level
    /// corruption (bad magic, wrong codec/key) does fail the open.
    pub fn open(
        id: StoreId,
        root: &Path,
        mode: AccessMode,
        crypt_key: Option<&str>,
    ) -> Result<Self> {
        fs::create_dir_all(root)?;

        let codec: Arc<dyn RegionCodec> = match crypt_key {
            Some(key) => Arc::new(KeyedCodec::new(key)),
            None => Arc::new(IdentityCodec),
        };

        let region_path = root.join(format!("{}.kv", id));
        let lock_path = root.join(format!("{}.kv.lock", id));
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&lock_path)?;

        match mode {
            AccessMode::SingleProcess => {
                lock_file.try_lock_exclusive().map_err(|e| {
                    Error::Locked(format!("store {:?} held by another process: {}", id, e))
                })?;
            }
            AccessMode::MultiProcess => {
                // Exclusive only for the duration of the recovery scan.
                lock_file.lock_exclusive()?;
            }
        }

        let open_result = (|| {
            let mut region = if region_path.exists() {
                MappedRegion::open(&region_path, codec.codec_id())?
            } else {
                MappedRegion::create(&region_path, codec.codec_id())?
            };
            let index = recover_index(&id, &mut region);
            Ok::<_, Error>((region, index))
        })();

        if mode == AccessMode::MultiProcess {
            let _ = FileExt::unlock(&lock_file);
        }
        let (region, index) = match open_result {
            Ok(parts) => parts,
            Err(e) => {
                if mode == AccessMode::SingleProcess {
                    let _ = FileExt::unlock(&lock_file);
                }
                return Err(e);
            }
        };

        debug!(id = %id, entries = index.len(), "opened store");

        Ok(Store {
            id,
            region_path,
            mode,
            codec,
            inner: Mutex::new(StoreState::Open(OpenStore {
                region,
                lock_file,
                index,
                cache: HashMap::new(),
            })),
        })
    }

    /// The store's namespace id.
    pub fn id(&self) -> &StoreId {
        &self.id
    }

    /// The access mode the store was opened with.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Path of the backing region file.
    pub fn path(&self) -> &Path {
        &self.region_path
    }

    /// Whether the store is currently open.
    pub fn is_open(&self) -> bool {
        matches!(&*self.inner.lock(), StoreState::Open(_))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Write `value` under `key`, replacing any existing value and type.
    pub fn encode(&self, key: &str, value: &Value) -> Result<()> {
        self.mutate(|open, codec| {
            let (tag, raw) = format::encode_payload(value);
            let stored = codec.encode(&raw);
            let record = format::encode_put(key, tag, &stored)?;

            let record_offset = open.region.append(&record)?;
            open.index.insert(
                key.to_string(),
                IndexEntry {
                    tag,
                    payload_offset: record_offset + format::put_payload_offset(key),
                    payload_len: stored.len(),
                },
            );
            open.cache.insert(key.to_string(), value.clone());
            Ok(())
        })
    }

    /// Delete `key`. Absent keys are a no-op (no tombstone is written).
    pub fn remove_value_for_key(&self, key: &str) -> Result<()> {
        self.mutate(|open, _| {
            if !open.index.contains_key(key) {
                return Ok(());
            }
            let record = format::encode_tombstone(key)?;
            open.region.append(&record)?;
            open.index.remove(key);
            open.cache.remove(key);
            Ok(())
        })
    }

    /// Delete several keys; absent keys are no-ops.
    pub fn remove_values_for_keys(&self, keys: &[String]) -> Result<()> {
        self.mutate(|open, _| {
            for key in keys {
                if !open.index.contains_key(key.as_str()) {
                    continue;
                }
                let record = format::encode_tombstone(key)?;
                open.region.append(&record)?;
                open.index.remove(key.as_str());
                open.cache.remove(key.as_str());
            }
            Ok(())
        })
    }

    /// Remove all keys, keeping the store open and mapped.
    pub fn clear_all(&self) -> Result<()> {
        self.mutate(|open, _| {
            open.region.reset()?;
            open.index.clear();
            open.cache.clear();
            Ok(())
        })
    }

    /// Compact the backing region, reclaiming space freed by deletions
    /// and overwrites. The store stays open.
    pub fn trim(&self) -> Result<()> {
        self.mutate(|open, codec| {
            let before = open.region.used();

            // Re-encode every live record into a fresh log. Payloads go
            // back through the codec so keyed stores get fresh nonces.
            let mut keys: Vec<&String> = open.index.keys().collect();
            keys.sort();
            let mut records = Vec::new();
            for key in keys {
                let entry = open.index[key.as_str()];
                let stored = open.region.slice(entry.payload_offset, entry.payload_len);
                let raw = codec
                    .decode(stored)
                    .map_err(|e| Error::Corruption(e.to_string()))?;
                let reencoded = codec.encode(&raw);
                records.extend(format::encode_put(key, entry.tag, &reencoded)?);
            }

            MappedRegion::write_compact(open.region.path(), codec.codec_id(), &records)?;
            let mut region = MappedRegion::open(&self.region_path, codec.codec_id())?;
            let index = recover_index(&self.id, &mut region);

            debug!(
                id = %self.id,
                before,
                after = region.used(),
                "trimmed store"
            );

            open.region = region;
            open.index = index;
            open.cache.clear();
            Ok(())
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read the value stored under `key`, whatever its type.
    ///
    /// Decodes lazily from the mapped region and memoizes the result
    /// until `clear_memory_cache`.
    pub fn decode(&self, key: &str) -> Result<Option<Value>> {
        self.with_open(|open, codec| {
            if let Some(value) = open.cache.get(key) {
                return Ok(Some(value.clone()));
            }
            let entry = match open.index.get(key) {
                Some(entry) => *entry,
                None => return Ok(None),
            };
            let stored = open.region.slice(entry.payload_offset, entry.payload_len);
            let raw = codec
                .decode(stored)
                .map_err(|e| Error::Corruption(e.to_string()))?;
            let value = format::decode_payload(entry.tag, &raw)?;
            open.cache.insert(key.to_string(), value.clone());
            Ok(Some(value))
        })
    }

    /// Decode as string, falling back to `default` when the key is
    /// absent or holds another type.
    pub fn decode_string(&self, key: &str, default: Option<String>) -> Result<Option<String>> {
        Ok(match self.decode(key)? {
            Some(Value::String(s)) => Some(s),
            _ => default,
        })
    }

    /// Decode as i32, falling back to `default`.
    pub fn decode_i32(&self, key: &str, default: i32) -> Result<i32> {
        Ok(self.decode(key)?.and_then(|v| v.as_i32()).unwrap_or(default))
    }

    /// Decode as i64, widening a stored Int32, falling back to `default`.
    pub fn decode_i64(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self.decode(key)?.and_then(|v| v.as_i64()).unwrap_or(default))
    }

    /// Decode as f64, falling back to `default`.
    pub fn decode_f64(&self, key: &str, default: f64) -> Result<f64> {
        Ok(self.decode(key)?.and_then(|v| v.as_f64()).unwrap_or(default))
    }

    /// Decode as bool, falling back to `default`.
    pub fn decode_bool(&self, key: &str, default: bool) -> Result<bool> {
        Ok(self.decode(key)?.and_then(|v| v.as_bool()).unwrap_or(default))
    }

    /// Decode as bytes, falling back to `default`.
    pub fn decode_bytes(&self, key: &str, default: Option<Vec<u8>>) -> Result<Option<Vec<u8>>> {
        Ok(match self.decode(key)? {
            Some(Value::Bytes(b)) => Some(b),
            _ => default,
        })
    }

    /// Whether `key` currently holds a value.
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        self.with_open(|open, _| Ok(open.index.contains_key(key)))
    }

    /// Size of the stored value's on-disk representation (length prefix
    /// plus stored payload), or 0 when absent.
    pub fn value_size(&self, key: &str) -> Result<u64> {
        self.with_open(|open, _| {
            Ok(open
                .index
                .get(key)
                .map(|e| (VALUE_LEN_PREFIX + e.payload_len) as u64)
                .unwrap_or(0))
        })
    }

    /// Raw length of the decoded value bytes, or 0 when absent.
    pub fn actual_value_size(&self, key: &str) -> Result<u64> {
        self.with_open(|open, codec| {
            let entry = match open.index.get(key) {
                Some(entry) => *entry,
                None => return Ok(0),
            };
            let stored = open.region.slice(entry.payload_offset, entry.payload_len);
            let raw = codec
                .decode(stored)
                .map_err(|e| Error::Corruption(e.to_string()))?;
            Ok(raw.len() as u64)
        })
    }

    /// All live keys, unordered.
    pub fn all_keys(&self) -> Result<Vec<String>> {
        self.with_open(|open, _| Ok(open.index.keys().cloned().collect()))
    }

    /// Number of live keys.
    pub fn count(&self) -> Result<u64> {
        self.with_open(|open, _| Ok(open.index.len() as u64))
    }

    /// Bytes of the backing region in use.
    pub fn total_size(&self) -> Result<u64> {
        self.with_open(|open, _| Ok(open.region.used() as u64))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Drop the in-process decoded-value cache. The next read of each
    /// key decodes from the mapped region again; persisted content is
    /// unaffected.
    pub fn clear_memory_cache(&self) -> Result<()> {
        self.with_open(|open, _| {
            open.cache.clear();
            Ok(())
        })
    }

    /// Flush and release the mapped region. The store refuses further
    /// operations until reopened through the registry. Closing a closed
    /// store is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        if let StoreState::Open(open) = &*guard {
            open.region.flush()?;
            // Dropping OpenStore unmaps the region and releases the
            // advisory lock held in SingleProcess mode.
            *guard = StoreState::Closed;
            debug!(id = %self.id, "closed store");
        }
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn with_open<R>(
        &self,
        f: impl FnOnce(&mut OpenStore, &dyn RegionCodec) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.inner.lock();
        match &mut *guard {
            StoreState::Open(open) => f(open, self.codec.as_ref()),
            StoreState::Closed => Err(Error::StoreClosed),
        }
    }

    /// Run a mutating operation under the cross-process discipline: in
    /// multi-process mode the advisory lock is held for the duration and
    /// the region is flushed before release.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut OpenStore, &dyn RegionCodec) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.inner.lock();
        let open = match &mut *guard {
            StoreState::Open(open) => open,
            StoreState::Closed => return Err(Error::StoreClosed),
        };

        let multi = self.mode == AccessMode::MultiProcess;
        if multi {
            open.lock_file.lock_exclusive()?;
        }

        let mut result = f(open, self.codec.as_ref());
        if multi {
            if result.is_ok() {
                if let Err(e) = open.region.flush() {
                    result = Err(e);
                }
            }
            let _ = FileExt::unlock(&open.lock_file);
        }
        result
    }
}

/// Rebuild the key index by scanning the record log.
///
/// A record that fails its CRC or runs past the used mark ends the scan;
/// the used mark is rewound so the corrupt tail is overwritten by the
/// next append instead of being re-read forever.
fn recover_index(id: &StoreId, region: &mut MappedRegion) -> HashMap<String, IndexEntry> {
    let base = region.header_len();
    let mut index = HashMap::new();
    let mut pos = 0;
    let valid_end;

    loop {
        let data = region.data();
        if pos >= data.len() {
            valid_end = pos;
            break;
        }
        match format::read_record(data, pos) {
            Ok((record, next)) => {
                match record.kind {
                    ParsedKind::Put {
                        tag,
                        payload_start,
                        payload_len,
                    } => {
                        index.insert(
                            record.key,
                            IndexEntry {
                                tag,
                                payload_offset: base + payload_start,
                                payload_len,
                            },
                        );
                    }
                    ParsedKind::Tombstone => {
                        index.remove(&record.key);
                    }
                }
                pos = next;
            }
            Err(e) => {
                warn!(id = %id, offset = pos, error = %e, "dropping corrupt record tail");
                valid_end = pos;
                break;
            }
        }
    }

    if base + valid_end < region.used() {
        region.set_used(base + valid_end);
    }
    index
}
