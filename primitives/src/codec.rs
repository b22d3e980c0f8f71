//! Structured value codec for the host/core boundary.
//!
//! Converts a [`Value`] tree into a flat, self-describing byte stream and
//! back. The codec is pure data transformation: it is used unchanged on both
//! sides of the sandbox boundary.
//!
//! Encoding format (all integers little-endian):
//! - `0x00` null, `0x01` false, `0x02` true
//! - `0x03` signed integer (`i64`, 8 bytes)
//! - `0x04` unsigned integer above `i64::MAX` (`u64`, 8 bytes)
//! - `0x05` float (`f64`, 8 bytes, finite)
//! - `0x06` string: `u32` byte length, then UTF-8 bytes
//! - `0x07` sequence: `u32` item count, then the items
//! - `0x08` mapping: `u32` entry count, then `(u32 key length, key bytes, value)`
//!
//! Integers and floats keep their representation class across a round-trip.

use serde_json::{Map, Number, Value};

use crate::error::CodecError;

const TAG_NULL: u8 = 0x00;
const TAG_FALSE: u8 = 0x01;
const TAG_TRUE: u8 = 0x02;
const TAG_INT: u8 = 0x03;
const TAG_UINT: u8 = 0x04;
const TAG_FLOAT: u8 = 0x05;
const TAG_STRING: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x07;
const TAG_MAPPING: u8 = 0x08;

/// Maximum nesting depth accepted by [`encode`] and [`decode`].
pub const MAX_DEPTH: usize = 128;

/// A cursor for reading bytes during decoding.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if n > self.remaining() {
            return Err(CodecError::Truncated { offset: self.pos });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, CodecError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_array8(&mut self) -> Result<[u8; 8], CodecError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_bytes(8)?);
        Ok(buf)
    }

    fn read_string(&mut self) -> Result<String, CodecError> {
        let offset = self.pos;
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8 { offset })
    }

    /// Reads a container count, rejecting counts that cannot possibly fit in
    /// the remaining input (every item takes at least one byte).
    fn read_count(&mut self) -> Result<usize, CodecError> {
        let offset = self.pos;
        let count = self.read_u32()? as usize;
        if count > self.remaining() {
            return Err(CodecError::Truncated { offset });
        }
        Ok(count)
    }
}

// ── Encoding helpers ──

fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn write_number(buf: &mut Vec<u8>, n: &Number) {
    if let Some(i) = n.as_i64() {
        buf.push(TAG_INT);
        buf.extend_from_slice(&i.to_le_bytes());
    } else if let Some(u) = n.as_u64() {
        buf.push(TAG_UINT);
        buf.extend_from_slice(&u.to_le_bytes());
    } else {
        // serde_json numbers are always one of the three, and never NaN/inf.
        let f = n.as_f64().unwrap_or_default();
        buf.push(TAG_FLOAT);
        buf.extend_from_slice(&f.to_le_bytes());
    }
}

fn write_value(buf: &mut Vec<u8>, value: &Value, depth: usize) -> Result<(), CodecError> {
    if depth > MAX_DEPTH {
        return Err(CodecError::TooDeep);
    }
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Bool(false) => buf.push(TAG_FALSE),
        Value::Bool(true) => buf.push(TAG_TRUE),
        Value::Number(n) => write_number(buf, n),
        Value::String(s) => {
            buf.push(TAG_STRING);
            write_string(buf, s);
        }
        Value::Array(items) => {
            buf.push(TAG_SEQUENCE);
            write_u32(buf, items.len() as u32);
            for item in items {
                write_value(buf, item, depth + 1)?;
            }
        }
        Value::Object(map) => {
            buf.push(TAG_MAPPING);
            write_u32(buf, map.len() as u32);
            for (key, item) in map {
                write_string(buf, key);
                write_value(buf, item, depth + 1)?;
            }
        }
    }
    Ok(())
}

/// Encode a structured value.
///
/// Fails with [`CodecError::TooDeep`] for values nested deeper than
/// [`MAX_DEPTH`], the same limit [`decode`] enforces, so every encoding
/// produced here decodes.
pub fn encode(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(64);
    write_value(&mut buf, value, 0)?;
    Ok(buf)
}

/// Decode a structured value, requiring the input to hold exactly one value.
pub fn decode(data: &[u8]) -> Result<Value, CodecError> {
    let mut r = Reader::new(data);
    let value = read_value(&mut r, 0)?;
    if r.remaining() != 0 {
        return Err(CodecError::TrailingBytes {
            count: r.remaining(),
        });
    }
    Ok(value)
}

fn read_value(r: &mut Reader<'_>, depth: usize) -> Result<Value, CodecError> {
    if depth > MAX_DEPTH {
        return Err(CodecError::TooDeep);
    }

    let offset = r.pos;
    let tag = r.read_u8()?;
    let value = match tag {
        TAG_NULL => Value::Null,
        TAG_FALSE => Value::Bool(false),
        TAG_TRUE => Value::Bool(true),
        TAG_INT => Value::from(i64::from_le_bytes(r.read_array8()?)),
        TAG_UINT => {
            let u = u64::from_le_bytes(r.read_array8()?);
            if i64::try_from(u).is_ok() {
                return Err(CodecError::NonCanonicalInteger { offset });
            }
            Value::from(u)
        }
        TAG_FLOAT => {
            let f = f64::from_le_bytes(r.read_array8()?);
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or(CodecError::NonFiniteFloat { offset })?
        }
        TAG_STRING => Value::String(r.read_string()?),
        TAG_SEQUENCE => {
            let count = r.read_count()?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_value(r, depth + 1)?);
            }
            Value::Array(items)
        }
        TAG_MAPPING => {
            let count = r.read_count()?;
            let mut map = Map::new();
            for _ in 0..count {
                let key_offset = r.pos;
                let key = r.read_string()?;
                if map.contains_key(&key) {
                    return Err(CodecError::DuplicateKey {
                        key,
                        offset: key_offset,
                    });
                }
                let item = read_value(r, depth + 1)?;
                map.insert(key, item);
            }
            Value::Object(map)
        }
        other => return Err(CodecError::InvalidTag { tag: other, offset }),
    };
    Ok(value)
}
