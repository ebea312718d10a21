//! Variable-length data: a length prefix followed by raw payload bytes.
//!
//! Every decode variant computes the data length the same way and advances
//! the owning message's limit by header + data length; only the tail differs
//! (skip, copy out, decode text, or borrow a zero-copy view). Fields
//! introduced after the acting version yield empty results without touching
//! the buffer or the limit.

use crate::buffer;
use crate::error::CodecError;
use crate::flyweight::decode_text;
use crate::ir::{CharacterEncoding, PrimitiveValue};
use crate::layout::VarDataLayout;

fn absent(v: &VarDataLayout, acting_version: Option<u16>) -> bool {
    acting_version.is_some_and(|acting| v.since_version > acting)
}

/// Read the length prefix without consuming the field.
pub(crate) fn peek_length(
    buf: &[u8],
    limit: usize,
    v: &VarDataLayout,
    acting_version: Option<u16>,
) -> Result<usize, CodecError> {
    if absent(v, acting_version) {
        return Ok(0);
    }
    let raw = buffer::get_value(
        buf,
        limit,
        v.length_encoding.primitive_type,
        v.length_encoding.endianness,
    )?;
    Ok(raw.as_u64().unwrap_or(0) as usize)
}

fn consume(
    buf: &[u8],
    limit: &mut usize,
    v: &VarDataLayout,
    acting_version: Option<u16>,
) -> Result<Option<(usize, usize)>, CodecError> {
    if absent(v, acting_version) {
        return Ok(None);
    }
    let data_length = peek_length(buf, *limit, v, acting_version)?;
    let data_offset = *limit + v.header_length;
    let end = data_offset
        .checked_add(data_length)
        .filter(|&e| e <= buf.len())
        .ok_or(CodecError::ShortBuffer {
            offset: data_offset,
            length: data_length,
            capacity: buf.len(),
        })?;
    *limit = end;
    Ok(Some((data_offset, data_length)))
}

/// Advance past the field; returns the payload length skipped.
pub(crate) fn skip(
    buf: &[u8],
    limit: &mut usize,
    v: &VarDataLayout,
    acting_version: Option<u16>,
) -> Result<usize, CodecError> {
    Ok(consume(buf, limit, v, acting_version)?.map_or(0, |(_, n)| n))
}

/// Copy out up to `dst.len()` payload bytes; returns bytes copied. The
/// whole field is consumed either way.
pub(crate) fn copy_out(
    buf: &[u8],
    limit: &mut usize,
    v: &VarDataLayout,
    acting_version: Option<u16>,
    dst: &mut [u8],
) -> Result<usize, CodecError> {
    match consume(buf, limit, v, acting_version)? {
        None => Ok(0),
        Some((offset, length)) => {
            let copied = dst.len().min(length);
            buffer::get_bytes(buf, offset, &mut dst[..copied])?;
            Ok(copied)
        }
    }
}

/// Decode the payload as text in the field's declared encoding.
pub(crate) fn as_string(
    buf: &[u8],
    limit: &mut usize,
    v: &VarDataLayout,
    acting_version: Option<u16>,
) -> Result<String, CodecError> {
    match consume(buf, limit, v, acting_version)? {
        None => Ok(String::new()),
        Some((offset, length)) => {
            let bytes = buffer::get_slice(buf, offset, length)?;
            decode_text(bytes, v.character_encoding, &v.name)
        }
    }
}

/// Borrow the payload region without copying.
pub(crate) fn as_slice<'a>(
    buf: &'a [u8],
    limit: &mut usize,
    v: &VarDataLayout,
    acting_version: Option<u16>,
) -> Result<&'a [u8], CodecError> {
    match consume(buf, limit, v, acting_version)? {
        None => Ok(&[]),
        Some((offset, length)) => buffer::get_slice(buf, offset, length),
    }
}

/// Write length then payload, advancing the limit. Nothing is written when
/// the payload exceeds the field's declared maximum.
pub(crate) fn put_bytes(
    buf: &mut [u8],
    limit: &mut usize,
    v: &VarDataLayout,
    src: &[u8],
) -> Result<(), CodecError> {
    if src.len() > v.max_length {
        return Err(CodecError::LengthExceedsMax {
            field: v.name.clone(),
            length: src.len(),
            max: v.max_length,
        });
    }
    let length = PrimitiveValue::U64(src.len() as u64)
        .coerce_to(v.length_encoding.primitive_type)
        .ok_or_else(|| CodecError::ValueType {
            field: v.name.clone(),
            expected: v.length_encoding.primitive_type,
        })?;
    let data_offset = *limit + v.header_length;
    // Check the full extent before the length prefix lands, so a short
    // buffer leaves the field unwritten.
    if data_offset
        .checked_add(src.len())
        .map_or(true, |end| end > buf.len())
    {
        return Err(CodecError::ShortBuffer {
            offset: data_offset,
            length: src.len(),
            capacity: buf.len(),
        });
    }
    buffer::put_value(buf, *limit, &length, v.length_encoding.endianness)?;
    buffer::put_bytes(buf, data_offset, src)?;
    *limit = data_offset + src.len();
    Ok(())
}

/// Encode text per the field's character encoding, then write it.
pub(crate) fn put_str(
    buf: &mut [u8],
    limit: &mut usize,
    v: &VarDataLayout,
    s: &str,
) -> Result<(), CodecError> {
    if matches!(v.character_encoding, Some(CharacterEncoding::Ascii) | None) && !s.is_ascii() {
        return Err(CodecError::TextEncoding {
            field: v.name.clone(),
        });
    }
    put_bytes(buf, limit, v, s.as_bytes())
}
