//! Message header codec: the fixed composite preceding every message body.
//!
//! Four fields in schema-declared order and widths: blockLength, templateId,
//! schemaId, version. Decoding reads the acting block length and version
//! from the wire; those, not the decoder's compiled-in constants, drive the
//! body decode.

use crate::buffer;
use crate::error::{CodecError, SchemaError};
use crate::ir::{Encoding, Endianness, PrimitiveType, Token};
use crate::layout::parse_composite_tokens;

#[derive(Debug, Clone)]
pub struct HeaderField {
    pub offset: usize,
    pub encoding: Encoding,
}

/// Offsets and encodings of the four header fields, plus the total size.
#[derive(Debug, Clone)]
pub struct HeaderLayout {
    pub block_length: HeaderField,
    pub template_id: HeaderField,
    pub schema_id: HeaderField,
    pub version: HeaderField,
    pub encoded_length: usize,
}

impl HeaderLayout {
    /// The SBE 1.0 standard header: four u16 fields, 8 bytes.
    pub fn standard(endianness: Endianness) -> Self {
        let u16_at = |offset| HeaderField {
            offset,
            encoding: Encoding::new(PrimitiveType::U16, endianness),
        };
        HeaderLayout {
            block_length: u16_at(0),
            template_id: u16_at(2),
            schema_id: u16_at(4),
            version: u16_at(6),
            encoded_length: 8,
        }
    }

    /// Build from the schema's header composite tokens.
    pub fn from_tokens(tokens: &[Token]) -> Result<Self, SchemaError> {
        let composite = parse_composite_tokens(tokens)?;
        let field = |name: &'static str| -> Result<HeaderField, SchemaError> {
            let member = composite
                .member(name)
                .ok_or_else(|| SchemaError::BadHeader(format!("missing {} field", name)))?;
            let encoding = member
                .encoding()
                .cloned()
                .ok_or_else(|| SchemaError::BadHeader(format!("{} has no encoding", name)))?;
            Ok(HeaderField {
                offset: member.offset,
                encoding,
            })
        };
        Ok(HeaderLayout {
            block_length: field("blockLength")?,
            template_id: field("templateId")?,
            schema_id: field("schemaId")?,
            version: field("version")?,
            encoded_length: composite.encoded_length,
        })
    }
}

/// Read-only view over an encoded header.
#[derive(Debug)]
pub struct HeaderDecoder<'a> {
    layout: &'a HeaderLayout,
    buf: &'a [u8],
    offset: usize,
}

impl<'a> HeaderDecoder<'a> {
    pub fn wrap(layout: &'a HeaderLayout, buf: &'a [u8], offset: usize) -> Self {
        HeaderDecoder { layout, buf, offset }
    }

    pub fn encoded_length(&self) -> usize {
        self.layout.encoded_length
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    fn read(&self, field: &HeaderField) -> Result<u64, CodecError> {
        let v = buffer::get_value(
            self.buf,
            self.offset + field.offset,
            field.encoding.primitive_type,
            field.encoding.endianness,
        )?;
        Ok(v.as_u64().unwrap_or(0))
    }

    pub fn block_length(&self) -> Result<usize, CodecError> {
        Ok(self.read(&self.layout.block_length)? as usize)
    }

    pub fn template_id(&self) -> Result<u16, CodecError> {
        Ok(self.read(&self.layout.template_id)? as u16)
    }

    pub fn schema_id(&self) -> Result<u16, CodecError> {
        Ok(self.read(&self.layout.schema_id)? as u16)
    }

    pub fn version(&self) -> Result<u16, CodecError> {
        Ok(self.read(&self.layout.version)? as u16)
    }
}

/// Write view over a header region.
#[derive(Debug)]
pub struct HeaderEncoder<'a> {
    layout: &'a HeaderLayout,
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> HeaderEncoder<'a> {
    pub fn wrap(layout: &'a HeaderLayout, buf: &'a mut [u8], offset: usize) -> Self {
        HeaderEncoder { layout, buf, offset }
    }

    pub fn encoded_length(&self) -> usize {
        self.layout.encoded_length
    }

    fn write(&mut self, field: &HeaderField, value: u64) -> Result<(), CodecError> {
        let coerced = crate::ir::PrimitiveValue::U64(value)
            .coerce_to(field.encoding.primitive_type)
            .ok_or_else(|| CodecError::ValueType {
                field: "messageHeader".to_string(),
                expected: field.encoding.primitive_type,
            })?;
        buffer::put_value(
            self.buf,
            self.offset + field.offset,
            &coerced,
            field.encoding.endianness,
        )
    }

    pub fn block_length(&mut self, value: usize) -> Result<(), CodecError> {
        let layout = self.layout;
        self.write(&layout.block_length, value as u64)
    }

    pub fn template_id(&mut self, value: u16) -> Result<(), CodecError> {
        let layout = self.layout;
        self.write(&layout.template_id, value as u64)
    }

    pub fn schema_id(&mut self, value: u16) -> Result<(), CodecError> {
        let layout = self.layout;
        self.write(&layout.schema_id, value as u64)
    }

    pub fn version(&mut self, value: u16) -> Result<(), CodecError> {
        let layout = self.layout;
        self.write(&layout.version, value as u64)
    }
}
