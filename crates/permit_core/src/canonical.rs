//! Canonical CBOR encoding (RFC 8949 core deterministic encoding) for
//! content-addressed policy identity: `policy_hash =
//! sha256(canonical_cbor(payload))`. Two payloads that differ only in JSON
//! key order or formatting hash identically.

use std::cmp::Ordering;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::PolicyError;

pub fn encode_canonical_value(value: &Value) -> Result<Vec<u8>, PolicyError> {
    let mut buf = Vec::new();
    write_value(value, &mut buf)?;
    Ok(buf)
}

/// Lower-hex SHA-256 of the canonical encoding of any serializable value.
pub fn canonical_hash<T: serde::Serialize>(value: &T) -> Result<String, PolicyError> {
    let json = serde_json::to_value(value)
        .map_err(|err| PolicyError::Canonical(format!("serialize: {}", err)))?;
    let bytes = encode_canonical_value(&json)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn write_value(value: &Value, buf: &mut Vec<u8>) -> Result<(), PolicyError> {
    match value {
        Value::Null => buf.push(0xf6),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Number(num) => write_integer(num, buf)?,
        Value::String(s) => {
            write_header(3, s.len() as u64, buf);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(items) => {
            write_header(4, items.len() as u64, buf);
            for item in items {
                write_value(item, buf)?;
            }
        }
        Value::Object(map) => {
            // Canonical key order: shorter keys first, then bytewise.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| match a.len().cmp(&b.len()) {
                Ordering::Equal => a.as_bytes().cmp(b.as_bytes()),
                other => other,
            });
            write_header(5, entries.len() as u64, buf);
            for (key, entry) in entries {
                write_header(3, key.len() as u64, buf);
                buf.extend_from_slice(key.as_bytes());
                write_value(entry, buf)?;
            }
        }
    }
    Ok(())
}

fn write_integer(num: &serde_json::Number, buf: &mut Vec<u8>) -> Result<(), PolicyError> {
    if let Some(u) = num.as_u64() {
        write_header(0, u, buf);
        return Ok(());
    }
    if let Some(i) = num.as_i64() {
        write_header(1, (-1 - i) as u64, buf);
        return Ok(());
    }
    // Whole-valued floats are admitted as integers; anything fractional
    // has no canonical form here.
    if let Some(f) = num.as_f64() {
        if f.is_finite() && f.fract() == 0.0 {
            if f >= 0.0 {
                write_header(0, f as u64, buf);
            } else {
                write_header(1, (-1 - (f as i64)) as u64, buf);
            }
            return Ok(());
        }
    }
    Err(PolicyError::Canonical(format!(
        "number {} has no canonical integer encoding",
        num
    )))
}

fn write_header(major: u8, argument: u64, buf: &mut Vec<u8>) {
    match argument {
        0..=23 => buf.push((major << 5) | argument as u8),
        24..=0xff => {
            buf.push((major << 5) | 24);
            buf.push(argument as u8);
        }
        0x100..=0xffff => {
            buf.push((major << 5) | 25);
            buf.extend_from_slice(&(argument as u16).to_be_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push((major << 5) | 26);
            buf.extend_from_slice(&(argument as u32).to_be_bytes());
        }
        _ => {
            buf.push((major << 5) | 27);
            buf.extend_from_slice(&argument.to_be_bytes());
        }
    }
}
