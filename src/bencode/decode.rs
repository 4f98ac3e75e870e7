use std::collections::BTreeMap;

use bytes::Bytes;

use super::error::BencodeError;
use super::value::Value;

const MAX_DEPTH: usize = 64;

/// Decodes a bencode value from a byte slice.
///
/// The input must contain exactly one complete value with no trailing data.
///
/// # Errors
///
/// Returns [`BencodeError::UnexpectedEnd`] on truncation,
/// [`BencodeError::BadInteger`] on integer grammar violations (leading
/// zeros, `-0`, values outside `i64`), [`BencodeError::TrailingData`] when
/// bytes remain after the value, and [`BencodeError::Malformed`] for every
/// other grammar violation.
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let (value, consumed) = decode_prefix(data)?;
    if consumed != data.len() {
        return Err(BencodeError::TrailingData);
    }
    Ok(value)
}

/// Decodes the next bencode value from the front of a byte source.
///
/// Returns the value and the number of bytes consumed, leaving the caller
/// positioned just past the value's terminator. This is the primitive the
/// metainfo loader uses to walk a dictionary while tracking the raw byte
/// span of each entry.
pub fn decode_prefix(data: &[u8]) -> Result<(Value, usize), BencodeError> {
    let mut pos = 0;
    let value = decode_value(data, &mut pos, 0)?;
    Ok((value, pos))
}

fn decode_value(data: &[u8], pos: &mut usize, depth: usize) -> Result<Value, BencodeError> {
    if depth > MAX_DEPTH {
        return Err(BencodeError::NestingTooDeep);
    }

    match data.get(*pos).copied() {
        None => Err(BencodeError::UnexpectedEnd),
        Some(b'i') => decode_integer(data, pos),
        Some(b'l') => decode_list(data, pos, depth),
        Some(b'd') => decode_dict(data, pos, depth),
        Some(b'0'..=b'9') => decode_bytes(data, pos),
        Some(_) => Err(BencodeError::Malformed("unexpected value prefix")),
    }
}

fn decode_integer(data: &[u8], pos: &mut usize) -> Result<Value, BencodeError> {
    *pos += 1;

    let start = *pos;
    while *pos < data.len() && data[*pos] != b'e' {
        *pos += 1;
    }
    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEnd);
    }

    let digits = &data[start..*pos];
    let text = std::str::from_utf8(digits)
        .map_err(|_| BencodeError::BadInteger("not ascii".into()))?;

    if text.is_empty() || text == "-" {
        return Err(BencodeError::BadInteger("empty".into()));
    }
    // "0" is the only integer allowed to start with a zero digit.
    if text.starts_with("-0") || (text.starts_with('0') && text.len() > 1) {
        return Err(BencodeError::BadInteger(format!("leading zeros in {text:?}")));
    }

    let value: i64 = text
        .parse()
        .map_err(|_| BencodeError::BadInteger(text.into()))?;

    *pos += 1;
    Ok(Value::Integer(value))
}

fn decode_bytes(data: &[u8], pos: &mut usize) -> Result<Value, BencodeError> {
    let start = *pos;
    while *pos < data.len() && data[*pos] != b':' {
        *pos += 1;
    }
    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEnd);
    }

    let len: usize = std::str::from_utf8(&data[start..*pos])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(BencodeError::Malformed("bad string length"))?;

    *pos += 1;

    let end = pos
        .checked_add(len)
        .ok_or(BencodeError::Malformed("bad string length"))?;
    if end > data.len() {
        return Err(BencodeError::UnexpectedEnd);
    }

    let bytes = Bytes::copy_from_slice(&data[*pos..end]);
    *pos = end;

    Ok(Value::Bytes(bytes))
}

fn decode_list(data: &[u8], pos: &mut usize, depth: usize) -> Result<Value, BencodeError> {
    *pos += 1;
    let mut list = Vec::new();

    while *pos < data.len() && data[*pos] != b'e' {
        list.push(decode_value(data, pos, depth + 1)?);
    }
    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEnd);
    }

    *pos += 1;
    Ok(Value::List(list))
}

fn decode_dict(data: &[u8], pos: &mut usize, depth: usize) -> Result<Value, BencodeError> {
    *pos += 1;
    let mut dict = BTreeMap::new();

    while *pos < data.len() && data[*pos] != b'e' {
        let key = match decode_value(data, pos, depth + 1)? {
            Value::Bytes(b) => b,
            _ => return Err(BencodeError::Malformed("dictionary key must be a byte string")),
        };
        let value = decode_value(data, pos, depth + 1)?;
        dict.insert(key, value);
    }
    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEnd);
    }

    *pos += 1;
    Ok(Value::Dict(dict))
}
