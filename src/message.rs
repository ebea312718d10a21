//! Message flyweights: the top-level encode/decode views over a buffer.
//!
//! A message flyweight owns the single **limit** cursor for the whole
//! traversal: the byte position just past the last element written or
//! read. Fields are random-access within the fixed block; groups and
//! var-data slide the limit forward in schema order. Group handles borrow
//! the message mutably, so an outer group cannot be advanced while an
//! inner handle is still alive.
//!
//! Flyweights are built once per layout and re-bound with `wrap` — cursor
//! reset, no allocation.

use crate::buffer;
use crate::error::CodecError;
use crate::flyweight::{self, CompositeDecoder, CompositeEncoder, EnumValue};
use crate::group::{GroupDecoder, GroupEncoder};
use crate::header::{HeaderDecoder, HeaderEncoder};
use crate::ir::PrimitiveValue;
use crate::layout::{
    FieldKind, FieldLayout, GroupLayout, MessageLayout, ResolvedSchema, VarDataLayout,
};
use crate::vardata;

impl ResolvedSchema {
    /// A decoder flyweight for the named message, unwrapped.
    pub fn decoder<'a>(&'a self, message: &str) -> Result<MessageDecoder<'a>, CodecError> {
        let layout = self
            .message(message)
            .ok_or_else(|| CodecError::UnknownMessage(message.to_string()))?;
        Ok(MessageDecoder::new(self, layout))
    }

    /// An encoder flyweight for the named message, unwrapped.
    pub fn encoder<'a>(&'a self, message: &str) -> Result<MessageEncoder<'a>, CodecError> {
        let layout = self
            .message(message)
            .ok_or_else(|| CodecError::UnknownMessage(message.to_string()))?;
        Ok(MessageEncoder::new(self, layout))
    }
}

/// Walk groups (recursively) and var-data from `limit`, moving it past
/// everything that is on the wire at `acting_version`.
pub(crate) fn skip_members(
    buf: &[u8],
    acting_version: u16,
    limit: &mut usize,
    groups: &[GroupLayout],
    var_data: &[VarDataLayout],
) -> Result<(), CodecError> {
    for g in groups {
        if g.since_version > acting_version {
            continue;
        }
        let (block_length, count) = read_dimension(buf, *limit, g)?;
        advance(limit, g.dimension.header_length, buf)?;
        for _ in 0..count {
            advance(limit, block_length, buf)?;
            skip_members(buf, acting_version, limit, &g.groups, &g.var_data)?;
        }
    }
    for v in var_data {
        vardata::skip(buf, limit, v, Some(acting_version))?;
    }
    Ok(())
}

/// Read a group's dimension header at `limit` and apply the defensive
/// minimum-block-length check.
pub(crate) fn read_dimension(
    buf: &[u8],
    limit: usize,
    g: &GroupLayout,
) -> Result<(usize, usize), CodecError> {
    let dim = &g.dimension;
    let block_length = buffer::get_value(
        buf,
        limit + dim.block_length_offset,
        dim.block_length_encoding.primitive_type,
        dim.block_length_encoding.endianness,
    )?
    .as_u64()
    .unwrap_or(0) as usize;
    let count = buffer::get_value(
        buf,
        limit + dim.num_in_group_offset,
        dim.num_in_group_encoding.primitive_type,
        dim.num_in_group_encoding.endianness,
    )?
    .as_u64()
    .unwrap_or(0) as usize;
    if count > 0 && block_length < g.min_block_length {
        return Err(CodecError::GroupBlockLengthTooSmall {
            group: g.name.clone(),
            actual: block_length,
            min: g.min_block_length,
        });
    }
    Ok((block_length, count))
}

pub(crate) fn advance(limit: &mut usize, n: usize, buf: &[u8]) -> Result<(), CodecError> {
    let next = limit
        .checked_add(n)
        .filter(|&end| end <= buf.len())
        .ok_or(CodecError::ShortBuffer {
            offset: *limit,
            length: n,
            capacity: buf.len(),
        })?;
    *limit = next;
    Ok(())
}

/// Read-side message flyweight.
#[derive(Debug)]
pub struct MessageDecoder<'a> {
    schema: &'a ResolvedSchema,
    layout: &'a MessageLayout,
    buf: &'a [u8],
    initial_offset: usize,
    offset: usize,
    limit: usize,
    acting_block_length: usize,
    acting_version: u16,
}

impl<'a> MessageDecoder<'a> {
    pub fn new(schema: &'a ResolvedSchema, layout: &'a MessageLayout) -> Self {
        MessageDecoder {
            schema,
            layout,
            buf: &[],
            initial_offset: 0,
            offset: 0,
            limit: 0,
            acting_block_length: 0,
            acting_version: 0,
        }
    }

    /// Re-bind to a buffer using wire-supplied block length and version.
    pub fn wrap(
        &mut self,
        buf: &'a [u8],
        offset: usize,
        acting_block_length: usize,
        acting_version: u16,
    ) -> &mut Self {
        self.buf = buf;
        self.initial_offset = offset;
        self.offset = offset;
        self.acting_block_length = acting_block_length;
        self.acting_version = acting_version;
        self.limit = offset + acting_block_length;
        self
    }

    /// Decode the header at `offset`, check the template id, and wrap the
    /// body with the header's block length and version.
    pub fn wrap_and_apply_header(
        &mut self,
        buf: &'a [u8],
        offset: usize,
    ) -> Result<&mut Self, CodecError> {
        let header = HeaderDecoder::wrap(&self.schema.header, buf, offset);
        let template_id = header.template_id()?;
        if template_id != self.layout.template_id {
            return Err(CodecError::TemplateMismatch {
                expected: self.layout.template_id,
                actual: template_id,
            });
        }
        let acting_block_length = header.block_length()?;
        let acting_version = header.version()?;
        let body_offset = offset + self.schema.header.encoded_length;
        Ok(self.wrap(buf, body_offset, acting_block_length, acting_version))
    }

    pub fn schema(&self) -> &'a ResolvedSchema {
        self.schema
    }

    pub fn layout(&self) -> &'a MessageLayout {
        self.layout
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    pub fn initial_offset(&self) -> usize {
        self.initial_offset
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Bytes consumed from the message start through the current limit.
    pub fn encoded_length(&self) -> usize {
        self.limit - self.offset
    }

    pub fn acting_block_length(&self) -> usize {
        self.acting_block_length
    }

    pub fn acting_version(&self) -> u16 {
        self.acting_version
    }

    /// Reset the limit to just past the fixed block, ready to re-traverse.
    pub fn sbe_rewind(&mut self) -> &mut Self {
        let (buf, offset) = (self.buf, self.initial_offset);
        let (abl, av) = (self.acting_block_length, self.acting_version);
        self.wrap(buf, offset, abl, av)
    }

    /// Rewind, then move the limit past every group and var-data field.
    pub fn sbe_skip(&mut self) -> Result<&mut Self, CodecError> {
        self.sbe_rewind();
        let layout = self.layout;
        let mut limit = self.limit;
        skip_members(
            self.buf,
            self.acting_version,
            &mut limit,
            &layout.groups,
            &layout.var_data,
        )?;
        self.limit = limit;
        Ok(self)
    }

    /// Total wire length of the message body without disturbing the
    /// in-progress traversal.
    pub fn sbe_decoded_length(&mut self) -> Result<usize, CodecError> {
        let saved = self.limit;
        self.sbe_skip()?;
        let decoded = self.encoded_length();
        self.set_limit(saved);
        Ok(decoded)
    }

    fn field(&self, name: &str) -> Result<&'a FieldLayout, CodecError> {
        self.layout
            .field(name)
            .ok_or_else(|| CodecError::UnknownField(name.to_string()))
    }

    /// Scalar getter. Constants come back with no buffer access; a field
    /// past the acting version comes back as its null sentinel.
    pub fn get(&self, name: &str) -> Result<PrimitiveValue, CodecError> {
        flyweight::read_scalar(self.buf, self.offset, self.field(name)?, Some(self.acting_version))
    }

    /// Indexed element of a fixed array field.
    pub fn get_at(&self, name: &str, index: usize) -> Result<PrimitiveValue, CodecError> {
        flyweight::read_array_element(
            self.buf,
            self.offset,
            self.field(name)?,
            Some(self.acting_version),
            index,
        )
    }

    /// Bulk copy-out of a fixed array field; returns bytes copied.
    pub fn get_bytes(&self, name: &str, dst: &mut [u8]) -> Result<usize, CodecError> {
        flyweight::read_array_bytes(
            self.buf,
            self.offset,
            self.field(name)?,
            Some(self.acting_version),
            dst,
        )
    }

    /// Char array as text, up to the first NUL or the declared length.
    pub fn get_string(&self, name: &str) -> Result<String, CodecError> {
        flyweight::read_array_string(
            self.buf,
            self.offset,
            self.field(name)?,
            Some(self.acting_version),
        )
    }

    /// Enum field under the schema's unknown-value policy.
    pub fn enum_value(&self, name: &str) -> Result<EnumValue<'a>, CodecError> {
        let f = self.field(name)?;
        match &f.kind {
            FieldKind::Enum(e) => {
                let raw =
                    flyweight::read_scalar(self.buf, self.offset, f, Some(self.acting_version))?;
                flyweight::decode_enum(e, raw, self.schema.unknown_enum_policy)
            }
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }

    /// One named choice bit of a bit-set field.
    pub fn choice(&self, name: &str, choice: &str) -> Result<bool, CodecError> {
        let f = self.field(name)?;
        match &f.kind {
            FieldKind::Set(s) => flyweight::read_choice(
                self.buf,
                self.offset,
                f,
                s,
                Some(self.acting_version),
                choice,
            ),
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }

    /// Wrap a composite field. None when the field is absent at the acting
    /// version; members themselves are exempt from version checks.
    pub fn composite(&self, name: &str) -> Result<Option<CompositeDecoder<'a>>, CodecError> {
        let f = self.field(name)?;
        match &f.kind {
            FieldKind::Composite(c) => {
                if f.since_version > self.acting_version {
                    return Ok(None);
                }
                Ok(Some(CompositeDecoder::wrap(c, self.buf, self.offset + f.offset)))
            }
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }

    fn var(&self, name: &str) -> Result<&'a VarDataLayout, CodecError> {
        self.layout
            .var_data(name)
            .ok_or_else(|| CodecError::UnknownVarData(name.to_string()))
    }

    /// Peek the payload length without consuming the field.
    pub fn var_data_length(&self, name: &str) -> Result<usize, CodecError> {
        vardata::peek_length(self.buf, self.limit, self.var(name)?, Some(self.acting_version))
    }

    /// Skip the field; returns the payload length skipped.
    pub fn skip_var_data(&mut self, name: &str) -> Result<usize, CodecError> {
        let v = self.var(name)?;
        let mut limit = self.limit;
        let n = vardata::skip(self.buf, &mut limit, v, Some(self.acting_version))?;
        self.limit = limit;
        Ok(n)
    }

    /// Copy the payload into `dst`; returns bytes copied.
    pub fn get_var_data(&mut self, name: &str, dst: &mut [u8]) -> Result<usize, CodecError> {
        let v = self.var(name)?;
        let mut limit = self.limit;
        let n = vardata::copy_out(self.buf, &mut limit, v, Some(self.acting_version), dst)?;
        self.limit = limit;
        Ok(n)
    }

    /// Decode the payload as text in the declared encoding.
    pub fn get_var_str(&mut self, name: &str) -> Result<String, CodecError> {
        let v = self.var(name)?;
        let mut limit = self.limit;
        let s = vardata::as_string(self.buf, &mut limit, v, Some(self.acting_version))?;
        self.limit = limit;
        Ok(s)
    }

    /// Borrow the payload region without copying.
    pub fn var_data_slice(&mut self, name: &str) -> Result<&'a [u8], CodecError> {
        let v = self.var(name)?;
        let mut limit = self.limit;
        let s = vardata::as_slice(self.buf, &mut limit, v, Some(self.acting_version))?;
        self.limit = limit;
        Ok(s)
    }

    /// Wrap the named group at the current limit. The dimension header on
    /// the wire is authoritative for block length and count.
    pub fn group(&mut self, name: &str) -> Result<GroupDecoder<'_, 'a>, CodecError> {
        let layout = self
            .layout
            .group(name)
            .ok_or_else(|| CodecError::UnknownGroup(name.to_string()))?;
        GroupDecoder::wrap(self, layout)
    }
}

/// Write-side message flyweight. Always encodes at the schema's own
/// version: no version branching on this side.
#[derive(Debug)]
pub struct MessageEncoder<'a> {
    schema: &'a ResolvedSchema,
    layout: &'a MessageLayout,
    buf: &'a mut [u8],
    initial_offset: usize,
    offset: usize,
    limit: usize,
}

impl<'a> MessageEncoder<'a> {
    pub fn new(schema: &'a ResolvedSchema, layout: &'a MessageLayout) -> Self {
        MessageEncoder {
            schema,
            layout,
            buf: &mut [],
            initial_offset: 0,
            offset: 0,
            limit: 0,
        }
    }

    /// Re-bind to a buffer; the limit starts just past the fixed block.
    pub fn wrap(&mut self, buf: &'a mut [u8], offset: usize) -> &mut Self {
        self.buf = buf;
        self.initial_offset = offset;
        self.offset = offset;
        self.limit = offset + self.layout.block_length;
        self
    }

    /// Write the full header from schema constants, then wrap the body
    /// directly after it.
    pub fn wrap_and_apply_header(
        &mut self,
        buf: &'a mut [u8],
        offset: usize,
    ) -> Result<&mut Self, CodecError> {
        {
            let mut header = HeaderEncoder::wrap(&self.schema.header, &mut *buf, offset);
            header.block_length(self.layout.block_length)?;
            header.template_id(self.layout.template_id)?;
            header.schema_id(self.schema.id)?;
            header.version(self.schema.version)?;
        }
        let body_offset = offset + self.schema.header.encoded_length;
        Ok(self.wrap(buf, body_offset))
    }

    pub fn schema(&self) -> &'a ResolvedSchema {
        self.schema
    }

    pub fn layout(&self) -> &'a MessageLayout {
        self.layout
    }

    pub fn initial_offset(&self) -> usize {
        self.initial_offset
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    pub fn encoded_length(&self) -> usize {
        self.limit - self.offset
    }

    pub(crate) fn buf_mut(&mut self) -> &mut [u8] {
        self.buf
    }

    pub(crate) fn buf_ref(&self) -> &[u8] {
        self.buf
    }

    fn field(&self, name: &str) -> Result<&'a FieldLayout, CodecError> {
        self.layout
            .field(name)
            .ok_or_else(|| CodecError::UnknownField(name.to_string()))
    }

    /// Scalar setter. Writing a constant field is a no-op: it has no wire
    /// bytes.
    pub fn put(&mut self, name: &str, value: PrimitiveValue) -> Result<(), CodecError> {
        let f = self.field(name)?;
        flyweight::write_scalar(self.buf, self.offset, f, &value)
    }

    /// Write a fixed array field from bytes, zero-padding the remainder.
    pub fn put_bytes(&mut self, name: &str, src: &[u8]) -> Result<(), CodecError> {
        let f = self.field(name)?;
        flyweight::write_array_bytes(self.buf, self.offset, f, src)
    }

    /// Write a char array from text, zero-padding the remainder.
    pub fn put_str(&mut self, name: &str, s: &str) -> Result<(), CodecError> {
        let f = self.field(name)?;
        flyweight::write_array_str(self.buf, self.offset, f, s)
    }

    /// Write an enum field by variant name.
    pub fn put_enum(&mut self, name: &str, variant: &str) -> Result<(), CodecError> {
        let f = self.field(name)?;
        match &f.kind {
            FieldKind::Enum(e) => {
                let value = e
                    .value(variant)
                    .ok_or_else(|| CodecError::UnknownEnumVariant {
                        name: e.name.clone(),
                        variant: variant.to_string(),
                    })?
                    .value;
                flyweight::write_scalar(self.buf, self.offset, f, &value)
            }
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }

    /// Set or clear one named choice bit of a bit-set field.
    pub fn set_choice(&mut self, name: &str, choice: &str, on: bool) -> Result<(), CodecError> {
        let f = self.field(name)?;
        match &f.kind {
            FieldKind::Set(s) => flyweight::write_choice(self.buf, self.offset, f, s, choice, on),
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }

    /// Zero a bit-set field.
    pub fn clear_set(&mut self, name: &str) -> Result<(), CodecError> {
        let f = self.field(name)?;
        match &f.kind {
            FieldKind::Set(_) => flyweight::write_scalar(
                self.buf,
                self.offset,
                f,
                &PrimitiveValue::U64(0),
            ),
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }

    /// Wrap a composite field for writing.
    pub fn composite(&mut self, name: &str) -> Result<CompositeEncoder<'_>, CodecError> {
        let f = self.field(name)?;
        let base = self.offset + f.offset;
        match &f.kind {
            FieldKind::Composite(c) => Ok(CompositeEncoder::wrap(c, self.buf, base)),
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }

    fn var(&self, name: &str) -> Result<&'a VarDataLayout, CodecError> {
        self.layout
            .var_data(name)
            .ok_or_else(|| CodecError::UnknownVarData(name.to_string()))
    }

    /// Write a var-data payload: length prefix then bytes.
    pub fn put_var_data(&mut self, name: &str, src: &[u8]) -> Result<(), CodecError> {
        let v = self.var(name)?;
        let mut limit = self.limit;
        vardata::put_bytes(self.buf, &mut limit, v, src)?;
        self.limit = limit;
        Ok(())
    }

    /// Write a var-data payload from text in the declared encoding.
    pub fn put_var_str(&mut self, name: &str, s: &str) -> Result<(), CodecError> {
        let v = self.var(name)?;
        let mut limit = self.limit;
        vardata::put_str(self.buf, &mut limit, v, s)?;
        self.limit = limit;
        Ok(())
    }

    /// Open the named group for writing `count` elements at the current
    /// limit.
    pub fn group(&mut self, name: &str, count: usize) -> Result<GroupEncoder<'_, 'a>, CodecError> {
        let layout = self
            .layout
            .group(name)
            .ok_or_else(|| CodecError::UnknownGroup(name.to_string()))?;
        GroupEncoder::wrap(self, layout, count)
    }
}
