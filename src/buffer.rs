//! Primitive get/put against a byte buffer at arbitrary offsets.
//!
//! Every access is bounds-checked against the slice and takes an explicit
//! byte order; single-byte types ignore it. Unsigned reads come back in the
//! unsigned Rust type of the same width, so a u32 holding 0xFFFFFFFF is
//! 4294967295, never a negative number.

use crate::error::CodecError;
use crate::ir::{Endianness, PrimitiveType, PrimitiveValue};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

fn check(buf: &[u8], offset: usize, length: usize) -> Result<(), CodecError> {
    if offset.checked_add(length).map_or(true, |end| end > buf.len()) {
        return Err(CodecError::ShortBuffer {
            offset,
            length,
            capacity: buf.len(),
        });
    }
    Ok(())
}

pub fn get_u8(buf: &[u8], offset: usize) -> Result<u8, CodecError> {
    check(buf, offset, 1)?;
    Ok(buf[offset])
}

pub fn get_i8(buf: &[u8], offset: usize) -> Result<i8, CodecError> {
    Ok(get_u8(buf, offset)? as i8)
}

pub fn get_u16(buf: &[u8], offset: usize, endianness: Endianness) -> Result<u16, CodecError> {
    check(buf, offset, 2)?;
    Ok(match endianness {
        Endianness::Big => BigEndian::read_u16(&buf[offset..]),
        Endianness::Little => LittleEndian::read_u16(&buf[offset..]),
    })
}

pub fn get_i16(buf: &[u8], offset: usize, endianness: Endianness) -> Result<i16, CodecError> {
    Ok(get_u16(buf, offset, endianness)? as i16)
}

pub fn get_u32(buf: &[u8], offset: usize, endianness: Endianness) -> Result<u32, CodecError> {
    check(buf, offset, 4)?;
    Ok(match endianness {
        Endianness::Big => BigEndian::read_u32(&buf[offset..]),
        Endianness::Little => LittleEndian::read_u32(&buf[offset..]),
    })
}

pub fn get_i32(buf: &[u8], offset: usize, endianness: Endianness) -> Result<i32, CodecError> {
    Ok(get_u32(buf, offset, endianness)? as i32)
}

pub fn get_u64(buf: &[u8], offset: usize, endianness: Endianness) -> Result<u64, CodecError> {
    check(buf, offset, 8)?;
    Ok(match endianness {
        Endianness::Big => BigEndian::read_u64(&buf[offset..]),
        Endianness::Little => LittleEndian::read_u64(&buf[offset..]),
    })
}

pub fn get_i64(buf: &[u8], offset: usize, endianness: Endianness) -> Result<i64, CodecError> {
    Ok(get_u64(buf, offset, endianness)? as i64)
}

pub fn get_f32(buf: &[u8], offset: usize, endianness: Endianness) -> Result<f32, CodecError> {
    Ok(f32::from_bits(get_u32(buf, offset, endianness)?))
}

pub fn get_f64(buf: &[u8], offset: usize, endianness: Endianness) -> Result<f64, CodecError> {
    Ok(f64::from_bits(get_u64(buf, offset, endianness)?))
}

pub fn put_u8(buf: &mut [u8], offset: usize, v: u8) -> Result<(), CodecError> {
    check(buf, offset, 1)?;
    buf[offset] = v;
    Ok(())
}

pub fn put_i8(buf: &mut [u8], offset: usize, v: i8) -> Result<(), CodecError> {
    put_u8(buf, offset, v as u8)
}

pub fn put_u16(buf: &mut [u8], offset: usize, v: u16, endianness: Endianness) -> Result<(), CodecError> {
    check(buf, offset, 2)?;
    match endianness {
        Endianness::Big => BigEndian::write_u16(&mut buf[offset..], v),
        Endianness::Little => LittleEndian::write_u16(&mut buf[offset..], v),
    }
    Ok(())
}

pub fn put_i16(buf: &mut [u8], offset: usize, v: i16, endianness: Endianness) -> Result<(), CodecError> {
    put_u16(buf, offset, v as u16, endianness)
}

pub fn put_u32(buf: &mut [u8], offset: usize, v: u32, endianness: Endianness) -> Result<(), CodecError> {
    check(buf, offset, 4)?;
    match endianness {
        Endianness::Big => BigEndian::write_u32(&mut buf[offset..], v),
        Endianness::Little => LittleEndian::write_u32(&mut buf[offset..], v),
    }
    Ok(())
}

pub fn put_i32(buf: &mut [u8], offset: usize, v: i32, endianness: Endianness) -> Result<(), CodecError> {
    put_u32(buf, offset, v as u32, endianness)
}

pub fn put_u64(buf: &mut [u8], offset: usize, v: u64, endianness: Endianness) -> Result<(), CodecError> {
    check(buf, offset, 8)?;
    match endianness {
        Endianness::Big => BigEndian::write_u64(&mut buf[offset..], v),
        Endianness::Little => LittleEndian::write_u64(&mut buf[offset..], v),
    }
    Ok(())
}

pub fn put_i64(buf: &mut [u8], offset: usize, v: i64, endianness: Endianness) -> Result<(), CodecError> {
    put_u64(buf, offset, v as u64, endianness)
}

pub fn put_f32(buf: &mut [u8], offset: usize, v: f32, endianness: Endianness) -> Result<(), CodecError> {
    put_u32(buf, offset, v.to_bits(), endianness)
}

pub fn put_f64(buf: &mut [u8], offset: usize, v: f64, endianness: Endianness) -> Result<(), CodecError> {
    put_u64(buf, offset, v.to_bits(), endianness)
}

/// Copy `dst.len()` bytes out of the buffer.
pub fn get_bytes(buf: &[u8], offset: usize, dst: &mut [u8]) -> Result<(), CodecError> {
    check(buf, offset, dst.len())?;
    dst.copy_from_slice(&buf[offset..offset + dst.len()]);
    Ok(())
}

/// Borrow `length` bytes of the buffer without copying.
pub fn get_slice(buf: &[u8], offset: usize, length: usize) -> Result<&[u8], CodecError> {
    check(buf, offset, length)?;
    Ok(&buf[offset..offset + length])
}

pub fn put_bytes(buf: &mut [u8], offset: usize, src: &[u8]) -> Result<(), CodecError> {
    check(buf, offset, src.len())?;
    buf[offset..offset + src.len()].copy_from_slice(src);
    Ok(())
}

pub fn put_zeros(buf: &mut [u8], offset: usize, length: usize) -> Result<(), CodecError> {
    check(buf, offset, length)?;
    buf[offset..offset + length].fill(0);
    Ok(())
}

/// Typed read of one scalar slot.
pub fn get_value(
    buf: &[u8],
    offset: usize,
    ty: PrimitiveType,
    endianness: Endianness,
) -> Result<PrimitiveValue, CodecError> {
    Ok(match ty {
        PrimitiveType::Char => PrimitiveValue::Char(get_u8(buf, offset)?),
        PrimitiveType::I8 => PrimitiveValue::I8(get_i8(buf, offset)?),
        PrimitiveType::I16 => PrimitiveValue::I16(get_i16(buf, offset, endianness)?),
        PrimitiveType::I32 => PrimitiveValue::I32(get_i32(buf, offset, endianness)?),
        PrimitiveType::I64 => PrimitiveValue::I64(get_i64(buf, offset, endianness)?),
        PrimitiveType::U8 => PrimitiveValue::U8(get_u8(buf, offset)?),
        PrimitiveType::U16 => PrimitiveValue::U16(get_u16(buf, offset, endianness)?),
        PrimitiveType::U32 => PrimitiveValue::U32(get_u32(buf, offset, endianness)?),
        PrimitiveType::U64 => PrimitiveValue::U64(get_u64(buf, offset, endianness)?),
        PrimitiveType::F32 => PrimitiveValue::F32(get_f32(buf, offset, endianness)?),
        PrimitiveType::F64 => PrimitiveValue::F64(get_f64(buf, offset, endianness)?),
    })
}

/// Typed write of one scalar slot. The value's variant must already match
/// the target type (see [`PrimitiveValue::coerce_to`]).
pub fn put_value(
    buf: &mut [u8],
    offset: usize,
    v: &PrimitiveValue,
    endianness: Endianness,
) -> Result<(), CodecError> {
    match v {
        PrimitiveValue::Char(x) => put_u8(buf, offset, *x),
        PrimitiveValue::I8(x) => put_i8(buf, offset, *x),
        PrimitiveValue::I16(x) => put_i16(buf, offset, *x, endianness),
        PrimitiveValue::I32(x) => put_i32(buf, offset, *x, endianness),
        PrimitiveValue::I64(x) => put_i64(buf, offset, *x, endianness),
        PrimitiveValue::U8(x) => put_u8(buf, offset, *x),
        PrimitiveValue::U16(x) => put_u16(buf, offset, *x, endianness),
        PrimitiveValue::U32(x) => put_u32(buf, offset, *x, endianness),
        PrimitiveValue::U64(x) => put_u64(buf, offset, *x, endianness),
        PrimitiveValue::F32(x) => put_f32(buf, offset, *x, endianness),
        PrimitiveValue::F64(x) => put_f64(buf, offset, *x, endianness),
    }
}
