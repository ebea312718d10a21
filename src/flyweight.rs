//! Fixed-size flyweights and the field-access core shared by every codec.
//!
//! Composites, enums and bit-sets wrap `(buffer, offset)` and have a
//! compile-time-known encoded length. The free functions here implement the
//! presence rules every getter applies: constants come from the schema with
//! zero buffer access, and a field introduced after the acting version
//! yields its null sentinel before any buffer read.

use crate::buffer;
use crate::error::CodecError;
use crate::ir::{CharacterEncoding, Presence, PrimitiveValue};
use crate::layout::{CompositeLayout, EnumLayout, FieldLayout, SetLayout, ValidValue};

/// What to do with an on-the-wire enum value that is no declared
/// valid-value and not the type's null. Selected once per resolved schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownEnumPolicy {
    /// Fail the decode. The documented default.
    #[default]
    Error,
    /// Map to [`EnumValue::Unknown`], keeping the raw value readable.
    Sentinel,
}

/// Decoded enum field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnumValue<'s> {
    Known(&'s ValidValue),
    /// Unrecognised wire value under [`UnknownEnumPolicy::Sentinel`].
    Unknown(PrimitiveValue),
    /// The null sentinel, or the field is absent at the acting version.
    Null,
}

impl<'s> EnumValue<'s> {
    pub fn name(&self) -> Option<&'s str> {
        match self {
            EnumValue::Known(v) => Some(v.name.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, EnumValue::Null)
    }
}

fn values_equal(a: &PrimitiveValue, b: &PrimitiveValue) -> bool {
    if a == b {
        return true;
    }
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Map a raw wire value onto an enum's valid-value table.
pub(crate) fn decode_enum<'s>(
    layout: &'s EnumLayout,
    raw: PrimitiveValue,
    policy: UnknownEnumPolicy,
) -> Result<EnumValue<'s>, CodecError> {
    if raw.is_null_of(&layout.encoding) {
        return Ok(EnumValue::Null);
    }
    for v in &layout.values {
        if values_equal(&v.value, &raw) {
            return Ok(EnumValue::Known(v));
        }
    }
    match policy {
        UnknownEnumPolicy::Error => Err(CodecError::UnknownEnumValue {
            name: layout.name.clone(),
            value: raw.as_i64().unwrap_or(0),
        }),
        UnknownEnumPolicy::Sentinel => Ok(EnumValue::Unknown(raw)),
    }
}

fn primitive_encoding<'f>(f: &'f FieldLayout) -> Result<&'f crate::ir::Encoding, CodecError> {
    f.encoding().ok_or_else(|| CodecError::UnknownField(f.name.clone()))
}

/// Scalar read honouring presence and, when `acting_version` is given, the
/// since-version rule. Composite members pass None: they carry no version
/// tolerance of their own.
pub(crate) fn read_scalar(
    buf: &[u8],
    base: usize,
    f: &FieldLayout,
    acting_version: Option<u16>,
) -> Result<PrimitiveValue, CodecError> {
    let encoding = primitive_encoding(f)?;
    if encoding.presence == Presence::Constant {
        return encoding
            .const_value
            .ok_or_else(|| CodecError::UnknownField(f.name.clone()));
    }
    if let Some(acting) = acting_version {
        if f.since_version > acting {
            return Ok(encoding.applicable_null());
        }
    }
    buffer::get_value(buf, base + f.offset, encoding.primitive_type, encoding.endianness)
}

/// Scalar write. Constants are a no-op: they occupy zero wire bytes.
pub(crate) fn write_scalar(
    buf: &mut [u8],
    base: usize,
    f: &FieldLayout,
    value: &PrimitiveValue,
) -> Result<(), CodecError> {
    let encoding = primitive_encoding(f)?;
    if encoding.presence == Presence::Constant {
        return Ok(());
    }
    let coerced = value
        .coerce_to(encoding.primitive_type)
        .ok_or_else(|| CodecError::ValueType {
            field: f.name.clone(),
            expected: encoding.primitive_type,
        })?;
    buffer::put_value(buf, base + f.offset, &coerced, encoding.endianness)
}

/// One element of a fixed array.
pub(crate) fn read_array_element(
    buf: &[u8],
    base: usize,
    f: &FieldLayout,
    acting_version: Option<u16>,
    index: usize,
) -> Result<PrimitiveValue, CodecError> {
    let encoding = primitive_encoding(f)?;
    if index >= f.array_length {
        return Err(CodecError::IndexOutOfRange {
            field: f.name.clone(),
            index,
            length: f.array_length,
        });
    }
    if let Some(acting) = acting_version {
        if f.since_version > acting {
            return Ok(encoding.applicable_null());
        }
    }
    let size = encoding.primitive_type.size();
    buffer::get_value(
        buf,
        base + f.offset + index * size,
        encoding.primitive_type,
        encoding.endianness,
    )
}

/// Bulk copy-out of a fixed array; returns bytes copied (the lesser of the
/// destination and the array extent; 0 when the field is absent).
pub(crate) fn read_array_bytes(
    buf: &[u8],
    base: usize,
    f: &FieldLayout,
    acting_version: Option<u16>,
    dst: &mut [u8],
) -> Result<usize, CodecError> {
    if let Some(acting) = acting_version {
        if f.since_version > acting {
            return Ok(0);
        }
    }
    let n = dst.len().min(f.encoded_length);
    buffer::get_bytes(buf, base + f.offset, &mut dst[..n])?;
    Ok(n)
}

/// Whole char-array as text: stops at the first NUL or the declared length.
pub(crate) fn read_array_string(
    buf: &[u8],
    base: usize,
    f: &FieldLayout,
    acting_version: Option<u16>,
) -> Result<String, CodecError> {
    if let Some(acting) = acting_version {
        if f.since_version > acting {
            return Ok(String::new());
        }
    }
    let raw = buffer::get_slice(buf, base + f.offset, f.encoded_length)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    decode_text(&raw[..end], f.character_encoding(), &f.name)
}

pub(crate) fn decode_text(
    bytes: &[u8],
    encoding: Option<CharacterEncoding>,
    field: &str,
) -> Result<String, CodecError> {
    match encoding.unwrap_or(CharacterEncoding::Ascii) {
        CharacterEncoding::Ascii => {
            if !bytes.is_ascii() {
                return Err(CodecError::TextEncoding {
                    field: field.to_string(),
                });
            }
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
        CharacterEncoding::Utf8 => std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::TextEncoding {
                field: field.to_string(),
            }),
    }
}

/// Write up to the declared array extent, zero-padding the remainder.
pub(crate) fn write_array_bytes(
    buf: &mut [u8],
    base: usize,
    f: &FieldLayout,
    src: &[u8],
) -> Result<(), CodecError> {
    if src.len() > f.encoded_length {
        return Err(CodecError::LengthExceedsMax {
            field: f.name.clone(),
            length: src.len(),
            max: f.encoded_length,
        });
    }
    buffer::put_bytes(buf, base + f.offset, src)?;
    buffer::put_zeros(buf, base + f.offset + src.len(), f.encoded_length - src.len())
}

pub(crate) fn write_array_str(
    buf: &mut [u8],
    base: usize,
    f: &FieldLayout,
    s: &str,
) -> Result<(), CodecError> {
    if matches!(f.character_encoding(), Some(CharacterEncoding::Ascii) | None) && !s.is_ascii() {
        return Err(CodecError::TextEncoding {
            field: f.name.clone(),
        });
    }
    write_array_bytes(buf, base, f, s.as_bytes())
}

/// Test one named choice bit of a bit-set field. Absent fields read as
/// all-clear.
pub(crate) fn read_choice(
    buf: &[u8],
    base: usize,
    f: &FieldLayout,
    set: &SetLayout,
    acting_version: Option<u16>,
    choice: &str,
) -> Result<bool, CodecError> {
    let bit = set
        .choice(choice)
        .ok_or_else(|| CodecError::UnknownChoice {
            name: set.name.clone(),
            choice: choice.to_string(),
        })?
        .bit;
    if let Some(acting) = acting_version {
        if f.since_version > acting {
            return Ok(false);
        }
    }
    let raw = buffer::get_value(
        buf,
        base + f.offset,
        set.encoding.primitive_type,
        set.encoding.endianness,
    )?;
    Ok(raw.as_u64().unwrap_or(0) & (1u64 << bit) != 0)
}

/// Read-modify-write one named choice bit.
pub(crate) fn write_choice(
    buf: &mut [u8],
    base: usize,
    f: &FieldLayout,
    set: &SetLayout,
    choice: &str,
    on: bool,
) -> Result<(), CodecError> {
    let bit = set
        .choice(choice)
        .ok_or_else(|| CodecError::UnknownChoice {
            name: set.name.clone(),
            choice: choice.to_string(),
        })?
        .bit;
    let raw = buffer::get_value(
        buf,
        base + f.offset,
        set.encoding.primitive_type,
        set.encoding.endianness,
    )?;
    let mut bits = raw.as_u64().unwrap_or(0);
    if on {
        bits |= 1u64 << bit;
    } else {
        bits &= !(1u64 << bit);
    }
    let coerced = PrimitiveValue::U64(bits)
        .coerce_to(set.encoding.primitive_type)
        .ok_or_else(|| CodecError::ValueType {
            field: f.name.clone(),
            expected: set.encoding.primitive_type,
        })?;
    buffer::put_value(buf, base + f.offset, &coerced, set.encoding.endianness)
}

/// Read-only view over a fixed composite. Members carry no version
/// tolerance: access never consults an acting version.
#[derive(Debug)]
pub struct CompositeDecoder<'a> {
    layout: &'a CompositeLayout,
    buf: &'a [u8],
    offset: usize,
}

impl<'a> CompositeDecoder<'a> {
    pub fn wrap(layout: &'a CompositeLayout, buf: &'a [u8], offset: usize) -> Self {
        CompositeDecoder { layout, buf, offset }
    }

    pub fn layout(&self) -> &'a CompositeLayout {
        self.layout
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn encoded_length(&self) -> usize {
        self.layout.encoded_length
    }

    fn member(&self, name: &str) -> Result<&'a FieldLayout, CodecError> {
        self.layout
            .member(name)
            .ok_or_else(|| CodecError::UnknownField(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Result<PrimitiveValue, CodecError> {
        read_scalar(self.buf, self.offset, self.member(name)?, None)
    }

    pub fn get_string(&self, name: &str) -> Result<String, CodecError> {
        read_array_string(self.buf, self.offset, self.member(name)?, None)
    }

    pub fn enum_value(&self, name: &str, policy: UnknownEnumPolicy) -> Result<EnumValue<'a>, CodecError> {
        let member = self.member(name)?;
        match &member.kind {
            crate::layout::FieldKind::Enum(e) => {
                let raw = read_scalar(self.buf, self.offset, member, None)?;
                decode_enum(e, raw, policy)
            }
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }

    /// Wrap a nested composite member.
    pub fn composite(&self, name: &str) -> Result<CompositeDecoder<'a>, CodecError> {
        let member = self.member(name)?;
        match &member.kind {
            crate::layout::FieldKind::Composite(c) => {
                Ok(CompositeDecoder::wrap(c, self.buf, self.offset + member.offset))
            }
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }
}

/// Write view over a fixed composite.
#[derive(Debug)]
pub struct CompositeEncoder<'a> {
    layout: &'a CompositeLayout,
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> CompositeEncoder<'a> {
    pub fn wrap(layout: &'a CompositeLayout, buf: &'a mut [u8], offset: usize) -> Self {
        CompositeEncoder { layout, buf, offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn encoded_length(&self) -> usize {
        self.layout.encoded_length
    }

    fn member(&self, name: &str) -> Result<&'a FieldLayout, CodecError> {
        self.layout
            .member(name)
            .ok_or_else(|| CodecError::UnknownField(name.to_string()))
    }

    pub fn put(&mut self, name: &str, value: PrimitiveValue) -> Result<(), CodecError> {
        let member = self.member(name)?;
        write_scalar(self.buf, self.offset, member, &value)
    }

    pub fn put_str(&mut self, name: &str, s: &str) -> Result<(), CodecError> {
        let member = self.member(name)?;
        write_array_str(self.buf, self.offset, member, s)
    }

    /// Re-wrap a nested composite member for writing.
    pub fn composite(&mut self, name: &str) -> Result<CompositeEncoder<'_>, CodecError> {
        let member = self.member(name)?;
        match &member.kind {
            crate::layout::FieldKind::Composite(c) => {
                Ok(CompositeEncoder::wrap(c, self.buf, self.offset + member.offset))
            }
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }
}
