//! File-backed memory-mapped region.
//!
//! One region backs each store. The file starts with a fixed header and
//! grows in page-sized steps; the record log is appended after the
//! header.
//!
//! ## File Format (Version 1)
//!
//! ```text
//! [magic "MKV1" 4B]
//! [version u32 LE]
//! [used u64 LE]        — bytes in use, header included
//! [codec id len u8]
//! [codec id bytes]
//! [records...]
//! ```
//!
//! The used counter is written back into the mapped header on every
//! append, so a reopened region knows where its valid log ends. A tail
//! that fails CRC validation during the store's recovery scan is
//! truncated by rewinding this counter.

use memmap2::MmapMut;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use mapkv_core::{Error, Result};

/// Magic bytes identifying a MapKV region file
const MAGIC: &[u8; 4] = b"MKV1";
/// Current format version
const VERSION: u32 = 1;
/// Fixed header bytes before the codec id: magic(4) + version(4) + used(8) + codec id len(1)
const FIXED_HEADER_SIZE: usize = 17;
/// Byte offset of the used counter within the header
const USED_OFFSET: usize = 8;

/// Region growth granularity, also reported by the `pageSize` operation.
pub const PAGE_SIZE: usize = 4096;

/// A file-backed memory-mapped region.
pub struct MappedRegion {
    file: File,
    mmap: MmapMut,
    path: PathBuf,
    header_len: usize,
    used: usize,
}

impl MappedRegion {
    /// Create a fresh region file with an empty record log.
    pub fn create(path: &Path, codec_id: &str) -> Result<Self> {
        let header = header_bytes(codec_id, FIXED_HEADER_SIZE + codec_id.len())?;
        let header_len = header.len();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(&header)?;
        file.set_len(round_up_to_page(header_len.max(1)) as u64)?;

        // SAFETY: the file is owned by this process for the lifetime of
        // the mapping; length was just set.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(MappedRegion {
            file,
            mmap,
            path: path.to_path_buf(),
            header_len,
            used: header_len,
        })
    }

    /// Open an existing region file, validating the header against the
    /// expected codec.
    ///
    /// A bad magic, unsupported version, or codec mismatch (including a
    /// keyed codec with the wrong key) is a `Corruption` error, surfaced
    /// to the caller as a distinguishable open-failure.
    pub fn open(path: &Path, expected_codec_id: &str) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        // SAFETY: mapping a file we hold open read-write.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        if mmap.len() < FIXED_HEADER_SIZE {
            return Err(Error::Corruption("region file too small for header".into()));
        }
        if &mmap[0..4] != MAGIC {
            return Err(Error::Corruption("invalid region magic".into()));
        }
        let version = u32::from_le_bytes(mmap[4..8].try_into().expect("slice length checked"));
        if version != VERSION {
            return Err(Error::Corruption(format!(
                "unsupported region version: {}",
                version
            )));
        }

        let used = u64::from_le_bytes(
            mmap[USED_OFFSET..USED_OFFSET + 8]
                .try_into()
                .expect("slice length checked"),
        ) as usize;

        let codec_id_len = mmap[16] as usize;
        let header_len = FIXED_HEADER_SIZE + codec_id_len;
        if header_len > mmap.len() {
            return Err(Error::Corruption("region truncated in codec id".into()));
        }
        let codec_id = std::str::from_utf8(&mmap[FIXED_HEADER_SIZE..header_len])
            .map_err(|_| Error::Corruption("invalid codec id".into()))?;
        if codec_id != expected_codec_id {
            return Err(Error::Corruption(format!(
                "region codec mismatch: stored {:?}, expected {:?}",
                codec_id, expected_codec_id
            )));
        }

        if used < header_len || used > mmap.len() {
            return Err(Error::Corruption(format!(
                "used extent {} out of range ({}..={})",
                used,
                header_len,
                mmap.len()
            )));
        }

        Ok(MappedRegion {
            file,
            mmap,
            path: path.to_path_buf(),
            header_len,
            used,
        })
    }

    /// Append bytes to the record log, growing the mapping if needed.
    ///
    /// Returns the absolute offset the bytes were written at.
    pub fn append(&mut self, bytes: &[u8]) -> Result<usize> {
        let offset = self.used;
        let end = offset + bytes.len();
        if end > self.mmap.len() {
            self.grow(end)?;
        }
        self.mmap[offset..end].copy_from_slice(bytes);
        self.used = end;
        self.write_used();
        Ok(offset)
    }

    /// Grow the backing file to at least `required` bytes and remap.
    fn grow(&mut self, required: usize) -> Result<()> {
        let new_capacity = round_up_to_page(required);
        self.mmap.flush()?;
        self.file.set_len(new_capacity as u64)?;
        // SAFETY: remapping the same file after extending it.
        self.mmap = unsafe { MmapMut::map_mut(&self.file)? };
        Ok(())
    }

    fn write_used(&mut self) {
        self.mmap[USED_OFFSET..USED_OFFSET + 8]
            .copy_from_slice(&(self.used as u64).to_le_bytes());
    }

    /// The record log: everything between the header and the used mark.
    pub fn data(&self) -> &[u8] {
        &self.mmap[self.header_len..self.used]
    }

    /// Read a slice at an absolute offset.
    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.mmap[offset..offset + len]
    }

    /// Bytes of the region in use (header included).
    pub fn used(&self) -> usize {
        self.used
    }

    /// Mapped capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.mmap.len()
    }

    /// Header length; the record log starts here.
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewind the used mark, discarding log bytes at and after `used`.
    ///
    /// Used by the recovery scan to drop a corrupt tail.
    pub fn set_used(&mut self, used: usize) {
        debug_assert!(used >= self.header_len && used <= self.mmap.len());
        self.used = used;
        self.write_used();
    }

    /// Discard the entire record log, keeping the region mapped.
    pub fn reset(&mut self) -> Result<()> {
        self.used = self.header_len;
        self.write_used();
        self.mmap.flush()?;
        Ok(())
    }

    /// Flush the mapping to disk.
    pub fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }

    /// Write a compacted region file containing `records`, replacing
    /// `path` atomically (write to a temp file, then rename).
    pub fn write_compact(path: &Path, codec_id: &str, records: &[u8]) -> Result<()> {
        let header = header_bytes(codec_id, FIXED_HEADER_SIZE + codec_id.len() + records.len())?;

        let temp_path = path.with_extension("kv.tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(&header)?;
        file.write_all(records)?;
        let written = header.len() + records.len();
        file.set_len(round_up_to_page(written.max(1)) as u64)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

fn header_bytes(codec_id: &str, used: usize) -> Result<Vec<u8>> {
    let id_bytes = codec_id.as_bytes();
    if id_bytes.len() > u8::MAX as usize {
        return Err(Error::Corruption("codec id too long".into()));
    }
    let mut buf = Vec::with_capacity(FIXED_HEADER_SIZE + id_bytes.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(&(used as u64).to_le_bytes());
    buf.push(id_bytes.len() as u8);
    buf.extend_from_slice(id_bytes);
    Ok(buf)
}

fn round_up_to_page(len: usize) -> usize {
    (len + PAGE_SIZE - 1) / PAGE_SIZE * PAGE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.kv");

        let mut region = MappedRegion::create(&path, "identity").unwrap();
        assert_eq!(region.capacity(), PAGE_SIZE);
        assert!(region.data().is_empty());

        let off = region.append(b"hello").unwrap();
        assert_eq!(off, region.header_len());
        region.flush().unwrap();
        drop(region);

        let region = MappedRegion::open(&path, "identity").unwrap();
        assert_eq!(region.data(), b"hello");
    }

    #[test]
    fn test_append_grows_by_pages() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grow.kv");

        let mut region = MappedRegion::create(&path, "identity").unwrap();
        let big = vec![0xABu8; PAGE_SIZE * 2];
        region.append(&big).unwrap();

        assert!(region.capacity() >= region.used());
        assert_eq!(region.capacity() % PAGE_SIZE, 0);
        assert_eq!(&region.data()[..big.len()], big.as_slice());
    }

    #[test]
    fn test_codec_mismatch_on_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("codec.kv");

        MappedRegion::create(&path, "identity").unwrap();
        let result = MappedRegion::open(&path, "keyed-v1:deadbeef");
        assert!(matches!(result, Err(Error::Corruption(_))));
    }

    #[test]
    fn test_invalid_magic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.kv");
        fs::write(&path, b"BAAD000000000000000000000").unwrap();

        let result = MappedRegion::open(&path, "identity");
        assert!(matches!(result, Err(Error::Corruption(_))));
    }

    #[test]
    fn test_reset_discards_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reset.kv");

        let mut region = MappedRegion::create(&path, "identity").unwrap();
        region.append(b"payload").unwrap();
        region.reset().unwrap();
        assert!(region.data().is_empty());
        drop(region);

        let region = MappedRegion::open(&path, "identity").unwrap();
        assert!(region.data().is_empty());
    }

    #[test]
    fn test_write_compact_replaces_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("compact.kv");

        let mut region = MappedRegion::create(&path, "identity").unwrap();
        region.append(&vec![1u8; PAGE_SIZE * 3]).unwrap();
        drop(region);

        MappedRegion::write_compact(&path, "identity", b"live").unwrap();
        let region = MappedRegion::open(&path, "identity").unwrap();
        assert_eq!(region.data(), b"live");
        assert_eq!(region.capacity(), PAGE_SIZE);
    }

    #[test]
    fn test_used_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("used.kv");

        let mut region = MappedRegion::create(&path, "identity").unwrap();
        region.append(b"abc").unwrap();
        region.append(b"defg").unwrap();
        let used = region.used();
        region.flush().unwrap();
        drop(region);

        let region = MappedRegion::open(&path, "identity").unwrap();
        assert_eq!(region.used(), used);
        assert_eq!(region.data(), b"abcdefg");
    }
}
