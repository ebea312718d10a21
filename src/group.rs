//! Repeating groups: cursor-based iteration over fixed-size instances.
//!
//! A group handle does not own a cursor; it shares the parent message's
//! limit through a mutable back-reference. `next()` moves the instance
//! window to the current limit and slides the limit past one block. On the
//! decode side the dimension header on the wire is authoritative, and an
//! instance block larger than this schema knows is skipped silently —
//! trailing bytes belong to fields a newer producer appended.

use crate::buffer;
use crate::error::CodecError;
use crate::flyweight::{self, CompositeDecoder, CompositeEncoder, EnumValue};
use crate::ir::PrimitiveValue;
use crate::layout::{FieldKind, FieldLayout, GroupLayout, VarDataLayout};
use crate::message::{advance, read_dimension, skip_members, MessageDecoder, MessageEncoder};
use crate::vardata;

/// Decode-side iteration over one group's instances.
#[derive(Debug)]
pub struct GroupDecoder<'m, 'a> {
    msg: &'m mut MessageDecoder<'a>,
    layout: &'a GroupLayout,
    block_length: usize,
    count: usize,
    index: usize,
    offset: usize,
}

impl<'m, 'a> GroupDecoder<'m, 'a> {
    /// Read the dimension header at the parent's limit and advance past
    /// it. A group past the acting version wraps empty without touching
    /// the buffer.
    pub(crate) fn wrap(
        msg: &'m mut MessageDecoder<'a>,
        layout: &'a GroupLayout,
    ) -> Result<Self, CodecError> {
        if layout.since_version > msg.acting_version() {
            let offset = msg.limit();
            return Ok(GroupDecoder {
                msg,
                layout,
                block_length: 0,
                count: 0,
                index: 0,
                offset,
            });
        }
        let limit = msg.limit();
        let (block_length, count) = read_dimension(msg.buffer(), limit, layout)?;
        let mut next_limit = limit;
        advance(&mut next_limit, layout.dimension.header_length, msg.buffer())?;
        msg.set_limit(next_limit);
        Ok(GroupDecoder {
            msg,
            layout,
            block_length,
            count,
            index: 0,
            offset: next_limit,
        })
    }

    pub fn layout(&self) -> &'a GroupLayout {
        self.layout
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn has_next(&self) -> bool {
        self.index < self.count
    }

    /// Block length read from the wire; may exceed this schema's compiled
    /// value.
    pub fn acting_block_length(&self) -> usize {
        self.block_length
    }

    pub fn header_size(&self) -> usize {
        self.layout.dimension.header_length
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Advance to the next instance: window moves to the limit, limit moves
    /// past one acting block.
    pub fn next(&mut self) -> Result<&mut Self, CodecError> {
        if self.index >= self.count {
            return Err(CodecError::NoSuchElement {
                group: self.layout.name.clone(),
                count: self.count,
            });
        }
        self.offset = self.msg.limit();
        let mut limit = self.offset;
        advance(&mut limit, self.block_length, self.msg.buffer())?;
        self.msg.set_limit(limit);
        self.index += 1;
        Ok(self)
    }

    /// Move the limit past the current instance's nested groups and
    /// var-data.
    pub fn sbe_skip(&mut self) -> Result<&mut Self, CodecError> {
        let layout = self.layout;
        let mut limit = self.msg.limit();
        skip_members(
            self.msg.buffer(),
            self.msg.acting_version(),
            &mut limit,
            &layout.groups,
            &layout.var_data,
        )?;
        self.msg.set_limit(limit);
        Ok(self)
    }

    fn field(&self, name: &str) -> Result<&'a FieldLayout, CodecError> {
        self.layout
            .field(name)
            .ok_or_else(|| CodecError::UnknownField(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Result<PrimitiveValue, CodecError> {
        flyweight::read_scalar(
            self.msg.buffer(),
            self.offset,
            self.field(name)?,
            Some(self.msg.acting_version()),
        )
    }

    pub fn get_at(&self, name: &str, index: usize) -> Result<PrimitiveValue, CodecError> {
        flyweight::read_array_element(
            self.msg.buffer(),
            self.offset,
            self.field(name)?,
            Some(self.msg.acting_version()),
            index,
        )
    }

    pub fn get_bytes(&self, name: &str, dst: &mut [u8]) -> Result<usize, CodecError> {
        flyweight::read_array_bytes(
            self.msg.buffer(),
            self.offset,
            self.field(name)?,
            Some(self.msg.acting_version()),
            dst,
        )
    }

    pub fn get_string(&self, name: &str) -> Result<String, CodecError> {
        flyweight::read_array_string(
            self.msg.buffer(),
            self.offset,
            self.field(name)?,
            Some(self.msg.acting_version()),
        )
    }

    pub fn enum_value(&self, name: &str) -> Result<EnumValue<'a>, CodecError> {
        let f = self.field(name)?;
        match &f.kind {
            FieldKind::Enum(e) => {
                let raw = flyweight::read_scalar(
                    self.msg.buffer(),
                    self.offset,
                    f,
                    Some(self.msg.acting_version()),
                )?;
                flyweight::decode_enum(e, raw, self.msg.schema().unknown_enum_policy)
            }
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }

    pub fn choice(&self, name: &str, choice: &str) -> Result<bool, CodecError> {
        let f = self.field(name)?;
        match &f.kind {
            FieldKind::Set(s) => flyweight::read_choice(
                self.msg.buffer(),
                self.offset,
                f,
                s,
                Some(self.msg.acting_version()),
                choice,
            ),
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }

    pub fn composite(&self, name: &str) -> Result<Option<CompositeDecoder<'a>>, CodecError> {
        let f = self.field(name)?;
        match &f.kind {
            FieldKind::Composite(c) => {
                if f.since_version > self.msg.acting_version() {
                    return Ok(None);
                }
                Ok(Some(CompositeDecoder::wrap(
                    c,
                    self.msg.buffer(),
                    self.offset + f.offset,
                )))
            }
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }

    fn var(&self, name: &str) -> Result<&'a VarDataLayout, CodecError> {
        self.layout
            .var_data(name)
            .ok_or_else(|| CodecError::UnknownVarData(name.to_string()))
    }

    pub fn var_data_length(&self, name: &str) -> Result<usize, CodecError> {
        vardata::peek_length(
            self.msg.buffer(),
            self.msg.limit(),
            self.var(name)?,
            Some(self.msg.acting_version()),
        )
    }

    pub fn skip_var_data(&mut self, name: &str) -> Result<usize, CodecError> {
        let v = self.var(name)?;
        let acting = self.msg.acting_version();
        let mut limit = self.msg.limit();
        let n = vardata::skip(self.msg.buffer(), &mut limit, v, Some(acting))?;
        self.msg.set_limit(limit);
        Ok(n)
    }

    pub fn get_var_data(&mut self, name: &str, dst: &mut [u8]) -> Result<usize, CodecError> {
        let v = self.var(name)?;
        let acting = self.msg.acting_version();
        let mut limit = self.msg.limit();
        let n = vardata::copy_out(self.msg.buffer(), &mut limit, v, Some(acting), dst)?;
        self.msg.set_limit(limit);
        Ok(n)
    }

    pub fn get_var_str(&mut self, name: &str) -> Result<String, CodecError> {
        let v = self.var(name)?;
        let acting = self.msg.acting_version();
        let mut limit = self.msg.limit();
        let s = vardata::as_string(self.msg.buffer(), &mut limit, v, Some(acting))?;
        self.msg.set_limit(limit);
        Ok(s)
    }

    pub fn var_data_slice(&mut self, name: &str) -> Result<&'a [u8], CodecError> {
        let v = self.var(name)?;
        let acting = self.msg.acting_version();
        let buf = self.msg.buffer();
        let mut limit = self.msg.limit();
        let s = vardata::as_slice(buf, &mut limit, v, Some(acting))?;
        self.msg.set_limit(limit);
        Ok(s)
    }

    /// Wrap a nested group at the current limit. The outer group cannot be
    /// advanced while the returned handle is alive.
    pub fn group(&mut self, name: &str) -> Result<GroupDecoder<'_, 'a>, CodecError> {
        let layout = self
            .layout
            .group(name)
            .ok_or_else(|| CodecError::UnknownGroup(name.to_string()))?;
        GroupDecoder::wrap(&mut *self.msg, layout)
    }
}

/// Encode-side iteration over one group's instances.
#[derive(Debug)]
pub struct GroupEncoder<'m, 'a> {
    msg: &'m mut MessageEncoder<'a>,
    layout: &'a GroupLayout,
    initial_limit: usize,
    count: usize,
    index: usize,
    offset: usize,
}

impl<'m, 'a> GroupEncoder<'m, 'a> {
    /// Validate `count` against the dimension encoding, write the dimension
    /// header at the parent's limit, and advance past it.
    pub(crate) fn wrap(
        msg: &'m mut MessageEncoder<'a>,
        layout: &'a GroupLayout,
        count: usize,
    ) -> Result<Self, CodecError> {
        let dim = &layout.dimension;
        if count < dim.count_min || count > dim.count_max {
            return Err(CodecError::CountOutOfRange {
                group: layout.name.clone(),
                count,
                min: dim.count_min,
                max: dim.count_max,
            });
        }
        let initial_limit = msg.limit();
        write_dimension_field(
            msg,
            initial_limit + dim.block_length_offset,
            &dim.block_length_encoding,
            layout.block_length as u64,
            &layout.name,
        )?;
        write_dimension_field(
            msg,
            initial_limit + dim.num_in_group_offset,
            &dim.num_in_group_encoding,
            count as u64,
            &layout.name,
        )?;
        let mut limit = initial_limit;
        advance(&mut limit, dim.header_length, msg.buf_ref())?;
        msg.set_limit(limit);
        Ok(GroupEncoder {
            msg,
            layout,
            initial_limit,
            count,
            index: 0,
            offset: limit,
        })
    }

    pub fn layout(&self) -> &'a GroupLayout {
        self.layout
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn has_next(&self) -> bool {
        self.index < self.count
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Open the next instance for writing.
    pub fn next(&mut self) -> Result<&mut Self, CodecError> {
        if self.index >= self.count {
            return Err(CodecError::NoSuchElement {
                group: self.layout.name.clone(),
                count: self.count,
            });
        }
        self.offset = self.msg.limit();
        let mut limit = self.offset;
        advance(&mut limit, self.layout.block_length, self.msg.buf_ref())?;
        self.msg.set_limit(limit);
        self.index += 1;
        Ok(self)
    }

    /// Rewrite the dimension count to the elements actually written, for
    /// when the final count is only known after iterating. Returns the new
    /// count.
    pub fn reset_count_to_index(&mut self) -> Result<usize, CodecError> {
        self.count = self.index;
        let dim = &self.layout.dimension;
        write_dimension_field(
            self.msg,
            self.initial_limit + dim.num_in_group_offset,
            &dim.num_in_group_encoding,
            self.count as u64,
            &self.layout.name,
        )?;
        Ok(self.count)
    }

    fn field(&self, name: &str) -> Result<&'a FieldLayout, CodecError> {
        self.layout
            .field(name)
            .ok_or_else(|| CodecError::UnknownField(name.to_string()))
    }

    pub fn put(&mut self, name: &str, value: PrimitiveValue) -> Result<(), CodecError> {
        let f = self.field(name)?;
        let base = self.offset;
        flyweight::write_scalar(self.msg.buf_mut(), base, f, &value)
    }

    pub fn put_bytes(&mut self, name: &str, src: &[u8]) -> Result<(), CodecError> {
        let f = self.field(name)?;
        let base = self.offset;
        flyweight::write_array_bytes(self.msg.buf_mut(), base, f, src)
    }

    pub fn put_str(&mut self, name: &str, s: &str) -> Result<(), CodecError> {
        let f = self.field(name)?;
        let base = self.offset;
        flyweight::write_array_str(self.msg.buf_mut(), base, f, s)
    }

    pub fn put_enum(&mut self, name: &str, variant: &str) -> Result<(), CodecError> {
        let f = self.field(name)?;
        let base = self.offset;
        match &f.kind {
            FieldKind::Enum(e) => {
                let value = e
                    .value(variant)
                    .ok_or_else(|| CodecError::UnknownEnumVariant {
                        name: e.name.clone(),
                        variant: variant.to_string(),
                    })?
                    .value;
                flyweight::write_scalar(self.msg.buf_mut(), base, f, &value)
            }
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }

    pub fn set_choice(&mut self, name: &str, choice: &str, on: bool) -> Result<(), CodecError> {
        let f = self.field(name)?;
        let base = self.offset;
        match &f.kind {
            FieldKind::Set(s) => {
                flyweight::write_choice(self.msg.buf_mut(), base, f, s, choice, on)
            }
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }

    pub fn composite(&mut self, name: &str) -> Result<CompositeEncoder<'_>, CodecError> {
        let f = self.field(name)?;
        let base = self.offset + f.offset;
        match &f.kind {
            FieldKind::Composite(c) => Ok(CompositeEncoder::wrap(c, self.msg.buf_mut(), base)),
            _ => Err(CodecError::UnknownField(name.to_string())),
        }
    }

    fn var(&self, name: &str) -> Result<&'a VarDataLayout, CodecError> {
        self.layout
            .var_data(name)
            .ok_or_else(|| CodecError::UnknownVarData(name.to_string()))
    }

    pub fn put_var_data(&mut self, name: &str, src: &[u8]) -> Result<(), CodecError> {
        let v = self.var(name)?;
        let mut limit = self.msg.limit();
        vardata::put_bytes(self.msg.buf_mut(), &mut limit, v, src)?;
        self.msg.set_limit(limit);
        Ok(())
    }

    pub fn put_var_str(&mut self, name: &str, s: &str) -> Result<(), CodecError> {
        let v = self.var(name)?;
        let mut limit = self.msg.limit();
        vardata::put_str(self.msg.buf_mut(), &mut limit, v, s)?;
        self.msg.set_limit(limit);
        Ok(())
    }

    /// Open a nested group for writing within the current instance.
    pub fn group(&mut self, name: &str, count: usize) -> Result<GroupEncoder<'_, 'a>, CodecError> {
        let layout = self
            .layout
            .group(name)
            .ok_or_else(|| CodecError::UnknownGroup(name.to_string()))?;
        GroupEncoder::wrap(&mut *self.msg, layout, count)
    }
}

fn write_dimension_field(
    msg: &mut MessageEncoder<'_>,
    offset: usize,
    encoding: &crate::ir::Encoding,
    value: u64,
    group: &str,
) -> Result<(), CodecError> {
    let coerced = PrimitiveValue::U64(value)
        .coerce_to(encoding.primitive_type)
        .ok_or_else(|| CodecError::ValueType {
            field: group.to_string(),
            expected: encoding.primitive_type,
        })?;
    buffer::put_value(msg.buf_mut(), offset, &coerced, encoding.endianness)
}
