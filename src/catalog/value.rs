//! The typed row value and its length-prefixed binary encoding (§3).
//!
//! A row is a `Vec<Value>`; column order is carried by the catalog, not by
//! the row itself. `encode_row`/`decode_row` are also used to store catalog
//! metadata fields (table/column/index/stats rows), so this module has no
//! dependency on anything above it.

use crate::common::{Error, Result};

/// A single cell. Replaces the reference implementation's dynamically typed
/// Python values with a closed, three-way tagged union (§9 redesign flag).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

const TAG_INT: u8 = 0;
const TAG_FLOAT: u8 = 1;
const TAG_TEXT: u8 = 2;

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "INT",
            Value::Float(_) => "FLOAT",
            Value::Text(_) => "TEXT",
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Value::Int(v) => {
                out.push(TAG_INT);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Value::Float(v) => {
                out.push(TAG_FLOAT);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Value::Text(s) => {
                out.push(TAG_TEXT);
                let bytes = s.as_bytes();
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                out.extend_from_slice(bytes);
            }
        }
    }

    fn decode_at(data: &[u8], offset: &mut usize) -> Result<Self> {
        let tag = *data
            .get(*offset)
            .ok_or_else(|| Error::StorageFailure("truncated value: missing tag".to_string()))?;
        *offset += 1;

        match tag {
            TAG_INT => {
                let bytes = take(data, offset, 8)?;
                Ok(Value::Int(i64::from_le_bytes(bytes.try_into().unwrap())))
            }
            TAG_FLOAT => {
                let bytes = take(data, offset, 8)?;
                Ok(Value::Float(f64::from_le_bytes(bytes.try_into().unwrap())))
            }
            TAG_TEXT => {
                let len_bytes = take(data, offset, 4)?;
                let len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
                let bytes = take(data, offset, len)?;
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|e| Error::StorageFailure(format!("text value is not utf-8: {e}")))?;
                Ok(Value::Text(text))
            }
            other => Err(Error::StorageFailure(format!("unknown value tag {other}"))),
        }
    }
}

fn take<'a>(data: &'a [u8], offset: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = *offset + len;
    let slice = data
        .get(*offset..end)
        .ok_or_else(|| Error::StorageFailure("truncated value".to_string()))?;
    *offset = end;
    Ok(slice)
}

/// Encode a row (or any ordered list of values) as a count prefix followed
/// by each value's self-delimiting encoding.
pub fn encode_row(values: &[Value]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + values.len() * 9);
    out.extend_from_slice(&(values.len() as u16).to_le_bytes());
    for value in values {
        value.encode_into(&mut out);
    }
    out
}

pub fn decode_row(data: &[u8]) -> Result<Vec<Value>> {
    let count_bytes = take(data, &mut 0, 2)?;
    let count = u16::from_le_bytes(count_bytes.try_into().unwrap()) as usize;

    let mut offset = 2;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(Value::decode_at(data, &mut offset)?);
    }
    Ok(values)
}

/// Append a length-prefixed UTF-8 string. Used by catalog metadata encoding
/// alongside `encode_row` for fields that aren't full `Value`s.
pub fn encode_string(out: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

pub fn decode_string(data: &[u8], offset: &mut usize) -> Result<String> {
    let len_bytes = take(data, offset, 4)?;
    let len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
    let bytes = take(data, offset, len)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::StorageFailure(format!("string is not utf-8: {e}")))
}
