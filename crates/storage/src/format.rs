//! Record format for mapped regions.
//!
//! Records are appended last-write-wins after the region header. Layout:
//!
//! ```text
//! [flags u8]              bit0: tombstone
//! [key len u16 LE][key bytes]
//! [type tag u8]           present unless tombstone
//! [payload len u32 LE][payload bytes (codec-encoded)]
//! [crc32 u32 LE]          over everything from flags through payload
//! ```
//!
//! Scalar payload encodings (before the codec): int32 = 4B LE,
//! int64 = 8B LE, double = 8B IEEE-754 LE, bool = 1B (0/1),
//! string = UTF-8 bytes, bytes = raw.

use mapkv_core::{Error, Result, Value};

/// Tombstone flag bit
const FLAG_TOMBSTONE: u8 = 0b0000_0001;

/// Bytes of record framing around a put payload: flags(1) + key len(2) +
/// tag(1) + payload len(4), before the key bytes and trailing crc(4).
const PUT_PREFIX_FIXED: usize = 8;

/// Length-prefix bytes counted into `value_size` alongside the stored
/// payload.
pub const VALUE_LEN_PREFIX: usize = 4;

/// On-disk type discriminant for a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeTag {
    /// UTF-8 string
    String = 0,
    /// 32-bit signed integer
    Int32 = 1,
    /// 64-bit signed integer
    Int64 = 2,
    /// 64-bit float
    Double = 3,
    /// Boolean
    Bool = 4,
    /// Raw bytes
    Bytes = 5,
}

impl TypeTag {
    /// Parse a tag byte.
    pub fn from_u8(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(TypeTag::String),
            1 => Ok(TypeTag::Int32),
            2 => Ok(TypeTag::Int64),
            3 => Ok(TypeTag::Double),
            4 => Ok(TypeTag::Bool),
            5 => Ok(TypeTag::Bytes),
            other => Err(Error::Corruption(format!("unknown type tag: {}", other))),
        }
    }
}

/// One record parsed out of the record log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    /// Entry key
    pub key: String,
    /// Put or tombstone
    pub kind: ParsedKind,
}

/// Parsed record body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedKind {
    /// A live value; payload bounds are relative to the scanned slice.
    Put {
        /// Stored value type
        tag: TypeTag,
        /// Payload start offset within the scanned slice
        payload_start: usize,
        /// Stored (codec-encoded) payload length
        payload_len: usize,
    },
    /// A deletion marker
    Tombstone,
}

/// Encode a value into its typed payload bytes.
pub fn encode_payload(value: &Value) -> (TypeTag, Vec<u8>) {
    match value {
        Value::String(s) => (TypeTag::String, s.as_bytes().to_vec()),
        Value::Int32(i) => (TypeTag::Int32, i.to_le_bytes().to_vec()),
        Value::Int64(i) => (TypeTag::Int64, i.to_le_bytes().to_vec()),
        Value::Double(f) => (TypeTag::Double, f.to_le_bytes().to_vec()),
        Value::Bool(b) => (TypeTag::Bool, vec![u8::from(*b)]),
        Value::Bytes(b) => (TypeTag::Bytes, b.clone()),
    }
}

/// Decode typed payload bytes back into a value.
pub fn decode_payload(tag: TypeTag, payload: &[u8]) -> Result<Value> {
    match tag {
        TypeTag::String => {
            let s = std::str::from_utf8(payload)
                .map_err(|e| Error::Corruption(format!("invalid UTF-8 in string payload: {}", e)))?;
            Ok(Value::String(s.to_string()))
        }
        TypeTag::Int32 => {
            let bytes = fixed_payload::<4>(tag, payload)?;
            Ok(Value::Int32(i32::from_le_bytes(bytes)))
        }
        TypeTag::Int64 => {
            let bytes = fixed_payload::<8>(tag, payload)?;
            Ok(Value::Int64(i64::from_le_bytes(bytes)))
        }
        TypeTag::Double => {
            let bytes = fixed_payload::<8>(tag, payload)?;
            Ok(Value::Double(f64::from_le_bytes(bytes)))
        }
        TypeTag::Bool => {
            let bytes = fixed_payload::<1>(tag, payload)?;
            Ok(Value::Bool(bytes[0] != 0))
        }
        TypeTag::Bytes => Ok(Value::Bytes(payload.to_vec())),
    }
}

fn fixed_payload<const N: usize>(tag: TypeTag, payload: &[u8]) -> Result<[u8; N]> {
    payload.try_into().map_err(|_| {
        Error::Corruption(format!(
            "bad payload length for {:?}: expected {}, got {}",
            tag,
            N,
            payload.len()
        ))
    })
}

/// Encode a put record. `payload` is already codec-encoded.
pub fn encode_put(key: &str, tag: TypeTag, payload: &[u8]) -> Result<Vec<u8>> {
    encode_record(key, Some((tag, payload)))
}

/// Encode a tombstone record.
pub fn encode_tombstone(key: &str) -> Result<Vec<u8>> {
    encode_record(key, None)
}

fn encode_record(key: &str, body: Option<(TypeTag, &[u8])>) -> Result<Vec<u8>> {
    let key_bytes = key.as_bytes();
    if key_bytes.len() > u16::MAX as usize {
        return Err(Error::InvalidKey(format!(
            "key length {} exceeds {}",
            key_bytes.len(),
            u16::MAX
        )));
    }

    let payload_len = body.map(|(_, p)| p.len()).unwrap_or(0);
    let mut buf = Vec::with_capacity(PUT_PREFIX_FIXED + key_bytes.len() + payload_len + 4);

    let flags = if body.is_some() { 0 } else { FLAG_TOMBSTONE };
    buf.push(flags);
    buf.extend_from_slice(&(key_bytes.len() as u16).to_le_bytes());
    buf.extend_from_slice(key_bytes);
    if let Some((tag, payload)) = body {
        if payload.len() > u32::MAX as usize {
            return Err(Error::Corruption("payload exceeds u32 length".to_string()));
        }
        buf.push(tag as u8);
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(payload);
    }
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

/// Byte offset of the payload within a put record for `key`.
pub fn put_payload_offset(key: &str) -> usize {
    // flags + key len + key bytes + tag + payload len
    PUT_PREFIX_FIXED + key.len()
}

/// Parse one record starting at `pos` within `data`.
///
/// Returns the parsed record and the position of the next record.
/// Truncation or a CRC mismatch is a `Corruption` error; the caller
/// treats it as the end of the valid log.
pub fn read_record(data: &[u8], pos: usize) -> Result<(ParsedRecord, usize)> {
    let need = |end: usize| -> Result<()> {
        if end > data.len() {
            Err(Error::Corruption("truncated record".to_string()))
        } else {
            Ok(())
        }
    };

    need(pos + 3)?;
    let flags = data[pos];
    let key_len = u16::from_le_bytes([data[pos + 1], data[pos + 2]]) as usize;
    let key_start = pos + 3;
    need(key_start + key_len)?;
    let key = std::str::from_utf8(&data[key_start..key_start + key_len])
        .map_err(|e| Error::Corruption(format!("invalid UTF-8 in key: {}", e)))?
        .to_string();

    let mut cursor = key_start + key_len;
    let kind = if flags & FLAG_TOMBSTONE != 0 {
        ParsedKind::Tombstone
    } else {
        need(cursor + 5)?;
        let tag = TypeTag::from_u8(data[cursor])?;
        let payload_len = u32::from_le_bytes(
            data[cursor + 1..cursor + 5]
                .try_into()
                .expect("slice length checked"),
        ) as usize;
        cursor += 5;
        need(cursor + payload_len)?;
        let payload_start = cursor;
        cursor += payload_len;
        ParsedKind::Put {
            tag,
            payload_start,
            payload_len,
        }
    };

    need(cursor + 4)?;
    let stored_crc = u32::from_le_bytes(
        data[cursor..cursor + 4]
            .try_into()
            .expect("slice length checked"),
    );
    let computed = crc32fast::hash(&data[pos..cursor]);
    if stored_crc != computed {
        return Err(Error::Corruption(format!(
            "record CRC mismatch for key {:?}",
            key
        )));
    }

    Ok((ParsedRecord { key, kind }, cursor + 4))
}
