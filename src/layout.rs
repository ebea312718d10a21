//! Resolve schema IR token streams into offset-resolved message layouts.
//!
//! This is the one pass over tokens; the flyweights never look at tokens
//! again. Resolution checks the structural invariants the codec relies on:
//! matched BEGIN/END pairs, unique names per scope, fields before groups
//! before var-data, and a two-field dimension header on every group.

use crate::error::SchemaError;
use crate::flyweight::UnknownEnumPolicy;
use crate::header::HeaderLayout;
use crate::ir::{
    CharacterEncoding, Encoding, Endianness, Presence, PrimitiveValue, SchemaIr, Signal, Token,
};
use std::collections::HashMap;

/// What a field decodes through.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Primitive(Encoding),
    Enum(EnumLayout),
    Set(SetLayout),
    Composite(CompositeLayout),
}

/// One fixed field (or composite member): name, identity, block offset, and
/// the resolved type behind it.
#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub name: String,
    pub id: u16,
    pub since_version: u16,
    /// Byte offset within the enclosing block or composite.
    pub offset: usize,
    /// Repeated elements for fixed arrays; 1 for scalars.
    pub array_length: usize,
    /// Wire bytes this field occupies (0 for constants).
    pub encoded_length: usize,
    pub kind: FieldKind,
}

impl FieldLayout {
    /// The backing primitive encoding; None for composites.
    pub fn encoding(&self) -> Option<&Encoding> {
        match &self.kind {
            FieldKind::Primitive(e) => Some(e),
            FieldKind::Enum(e) => Some(&e.encoding),
            FieldKind::Set(s) => Some(&s.encoding),
            FieldKind::Composite(_) => None,
        }
    }

    pub fn presence(&self) -> Presence {
        self.encoding().map_or(Presence::Required, |e| e.presence)
    }

    pub fn character_encoding(&self) -> Option<CharacterEncoding> {
        self.encoding().and_then(|e| e.character_encoding)
    }
}

/// One named value of a closed enum type.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidValue {
    pub name: String,
    pub value: PrimitiveValue,
    pub since_version: u16,
}

#[derive(Debug, Clone)]
pub struct EnumLayout {
    pub name: String,
    pub encoding: Encoding,
    pub values: Vec<ValidValue>,
}

impl EnumLayout {
    pub fn value(&self, name: &str) -> Option<&ValidValue> {
        self.values.iter().find(|v| v.name == name)
    }
}

/// One named bit of a bit-set type.
#[derive(Debug, Clone)]
pub struct Choice {
    pub name: String,
    pub bit: u8,
    pub since_version: u16,
}

#[derive(Debug, Clone)]
pub struct SetLayout {
    pub name: String,
    pub encoding: Encoding,
    pub choices: Vec<Choice>,
}

impl SetLayout {
    pub fn choice(&self, name: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.name == name)
    }
}

/// A fixed composite: contiguous members at fixed offsets, no versioning of
/// its own.
#[derive(Debug, Clone)]
pub struct CompositeLayout {
    pub name: String,
    pub encoded_length: usize,
    pub members: Vec<FieldLayout>,
    members_by_name: HashMap<String, usize>,
}

impl CompositeLayout {
    pub fn member(&self, name: &str) -> Option<&FieldLayout> {
        self.members_by_name.get(name).map(|&i| &self.members[i])
    }
}

/// The (blockLength, numInGroup) pair preceding a group's instances.
#[derive(Debug, Clone)]
pub struct DimensionLayout {
    pub header_length: usize,
    pub block_length_offset: usize,
    pub block_length_encoding: Encoding,
    pub num_in_group_offset: usize,
    pub num_in_group_encoding: Encoding,
    pub count_min: usize,
    pub count_max: usize,
}

#[derive(Debug, Clone)]
pub struct GroupLayout {
    pub name: String,
    pub id: u16,
    pub since_version: u16,
    /// Fixed portion of one instance at this schema version.
    pub block_length: usize,
    /// Extent of the version-0 fields: the least block length any producer
    /// version can legally write. Used to reject corrupt dimensions.
    pub min_block_length: usize,
    pub dimension: DimensionLayout,
    pub fields: Vec<FieldLayout>,
    pub groups: Vec<GroupLayout>,
    pub var_data: Vec<VarDataLayout>,
    fields_by_name: HashMap<String, usize>,
    groups_by_name: HashMap<String, usize>,
    var_data_by_name: HashMap<String, usize>,
}

impl GroupLayout {
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields_by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn group(&self, name: &str) -> Option<&GroupLayout> {
        self.groups_by_name.get(name).map(|&i| &self.groups[i])
    }

    pub fn var_data(&self, name: &str) -> Option<&VarDataLayout> {
        self.var_data_by_name.get(name).map(|&i| &self.var_data[i])
    }
}

/// A length-prefixed variable-length field.
#[derive(Debug, Clone)]
pub struct VarDataLayout {
    pub name: String,
    pub id: u16,
    pub since_version: u16,
    /// Width of the length prefix.
    pub header_length: usize,
    pub length_encoding: Encoding,
    /// Largest payload the length field's applicable max allows.
    pub max_length: usize,
    pub character_encoding: Option<CharacterEncoding>,
}

#[derive(Debug, Clone)]
pub struct MessageLayout {
    pub name: String,
    pub template_id: u16,
    /// Fixed portion of the message body at this schema version.
    pub block_length: usize,
    pub fields: Vec<FieldLayout>,
    pub groups: Vec<GroupLayout>,
    pub var_data: Vec<VarDataLayout>,
    fields_by_name: HashMap<String, usize>,
    groups_by_name: HashMap<String, usize>,
    var_data_by_name: HashMap<String, usize>,
}

impl MessageLayout {
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields_by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn group(&self, name: &str) -> Option<&GroupLayout> {
        self.groups_by_name.get(name).map(|&i| &self.groups[i])
    }

    pub fn var_data(&self, name: &str) -> Option<&VarDataLayout> {
        self.var_data_by_name.get(name).map(|&i| &self.var_data[i])
    }
}

/// A fully resolved schema: header layout, messages by name and template
/// id, schema identity, and the enum decode policy.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub id: u16,
    pub version: u16,
    pub endianness: Endianness,
    pub header: HeaderLayout,
    pub messages: Vec<MessageLayout>,
    pub unknown_enum_policy: UnknownEnumPolicy,
    messages_by_name: HashMap<String, usize>,
    messages_by_template_id: HashMap<u16, usize>,
}

impl ResolvedSchema {
    pub fn resolve(ir: SchemaIr, unknown_enum_policy: UnknownEnumPolicy) -> Result<Self, SchemaError> {
        let header = if ir.header.is_empty() {
            HeaderLayout::standard(ir.endianness)
        } else {
            HeaderLayout::from_tokens(&ir.header)?
        };

        let mut messages = Vec::with_capacity(ir.messages.len());
        let mut messages_by_name = HashMap::new();
        let mut messages_by_template_id = HashMap::new();
        for tokens in &ir.messages {
            let message = resolve_message(tokens)?;
            if messages_by_name
                .insert(message.name.clone(), messages.len())
                .is_some()
            {
                return Err(SchemaError::DuplicateName {
                    scope: "schema".to_string(),
                    name: message.name,
                });
            }
            if messages_by_template_id
                .insert(message.template_id, messages.len())
                .is_some()
            {
                return Err(SchemaError::DuplicateTemplateId(message.template_id));
            }
            messages.push(message);
        }

        Ok(ResolvedSchema {
            id: ir.id,
            version: ir.version,
            endianness: ir.endianness,
            header,
            messages,
            unknown_enum_policy,
            messages_by_name,
            messages_by_template_id,
        })
    }

    pub fn message(&self, name: &str) -> Option<&MessageLayout> {
        self.messages_by_name.get(name).map(|&i| &self.messages[i])
    }

    pub fn message_for_template(&self, template_id: u16) -> Option<&MessageLayout> {
        self.messages_by_template_id
            .get(&template_id)
            .map(|&i| &self.messages[i])
    }
}

struct TokenReader<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> TokenReader<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        TokenReader { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<&'t Token, SchemaError> {
        let t = self.tokens.get(self.pos).ok_or(SchemaError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(t)
    }

    fn expect(&mut self, signal: Signal, expected: &'static str) -> Result<&'t Token, SchemaError> {
        let t = self.next()?;
        if t.signal != signal {
            return Err(SchemaError::UnexpectedToken {
                expected,
                found: format!("{:?}({})", t.signal, t.name),
            });
        }
        Ok(t)
    }
}

fn required_encoding(token: &Token) -> Result<Encoding, SchemaError> {
    token
        .encoding
        .clone()
        .ok_or_else(|| SchemaError::MissingEncoding(token.name.clone()))
}

fn index_by_name<T>(
    items: &[T],
    name_of: impl Fn(&T) -> String,
    scope: &str,
) -> Result<HashMap<String, usize>, SchemaError> {
    let mut map = HashMap::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let name = name_of(item);
        if map.insert(name.clone(), i).is_some() {
            return Err(SchemaError::DuplicateName {
                scope: scope.to_string(),
                name,
            });
        }
    }
    Ok(map)
}

/// Parse one resolved type starting at the reader: a bare encoding, an
/// enum, a set, or a composite. Returns (kind, encoded_length, array_length).
fn parse_type(reader: &mut TokenReader<'_>) -> Result<(FieldKind, usize, usize), SchemaError> {
    let t = reader.peek().ok_or(SchemaError::UnexpectedEnd)?;
    match t.signal {
        Signal::Encoding => {
            let t = reader.next()?;
            let encoding = required_encoding(t)?;
            Ok((FieldKind::Primitive(encoding), t.encoded_length, t.array_length))
        }
        Signal::BeginEnum => {
            let layout = parse_enum(reader)?;
            let len = layout.encoding.primitive_type.size();
            Ok((FieldKind::Enum(layout), len, 1))
        }
        Signal::BeginSet => {
            let layout = parse_set(reader)?;
            let len = layout.encoding.primitive_type.size();
            Ok((FieldKind::Set(layout), len, 1))
        }
        Signal::BeginComposite => {
            let layout = parse_composite(reader)?;
            let len = layout.encoded_length;
            Ok((FieldKind::Composite(layout), len, 1))
        }
        _ => Err(SchemaError::UnexpectedToken {
            expected: "ENCODING, BEGIN_ENUM, BEGIN_SET or BEGIN_COMPOSITE",
            found: format!("{:?}({})", t.signal, t.name),
        }),
    }
}

fn parse_enum(reader: &mut TokenReader<'_>) -> Result<EnumLayout, SchemaError> {
    let begin = reader.expect(Signal::BeginEnum, "BEGIN_ENUM")?;
    let encoding = required_encoding(begin)?;
    let mut values = Vec::new();
    loop {
        let t = reader.next()?;
        match t.signal {
            Signal::ValidValue => {
                let value = required_encoding(t)?
                    .const_value
                    .ok_or_else(|| SchemaError::MissingEncoding(t.name.clone()))?;
                values.push(ValidValue {
                    name: t.name.clone(),
                    value,
                    since_version: t.version,
                });
            }
            Signal::EndEnum => break,
            _ => {
                return Err(SchemaError::UnexpectedToken {
                    expected: "VALID_VALUE or END_ENUM",
                    found: format!("{:?}({})", t.signal, t.name),
                })
            }
        }
    }
    index_by_name(&values, |v| v.name.clone(), &begin.name)?;
    Ok(EnumLayout {
        name: begin.name.clone(),
        encoding,
        values,
    })
}

fn parse_set(reader: &mut TokenReader<'_>) -> Result<SetLayout, SchemaError> {
    let begin = reader.expect(Signal::BeginSet, "BEGIN_SET")?;
    let encoding = required_encoding(begin)?;
    let mut choices = Vec::new();
    loop {
        let t = reader.next()?;
        match t.signal {
            Signal::Choice => {
                let bit = required_encoding(t)?
                    .const_value
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| SchemaError::MissingEncoding(t.name.clone()))?;
                choices.push(Choice {
                    name: t.name.clone(),
                    bit: bit as u8,
                    since_version: t.version,
                });
            }
            Signal::EndSet => break,
            _ => {
                return Err(SchemaError::UnexpectedToken {
                    expected: "CHOICE or END_SET",
                    found: format!("{:?}({})", t.signal, t.name),
                })
            }
        }
    }
    index_by_name(&choices, |c| c.name.clone(), &begin.name)?;
    Ok(SetLayout {
        name: begin.name.clone(),
        encoding,
        choices,
    })
}

fn parse_composite(reader: &mut TokenReader<'_>) -> Result<CompositeLayout, SchemaError> {
    let begin = reader.expect(Signal::BeginComposite, "BEGIN_COMPOSITE")?;
    let mut members = Vec::new();
    while let Some(t) = reader.peek() {
        if t.signal == Signal::EndComposite {
            reader.next()?;
            let members_by_name = index_by_name(&members, |m: &FieldLayout| m.name.clone(), &begin.name)?;
            return Ok(CompositeLayout {
                name: begin.name.clone(),
                encoded_length: begin.encoded_length,
                members,
                members_by_name,
            });
        }
        let name = t.name.clone();
        let id = t.id;
        let offset = t.offset;
        let (kind, encoded_length, array_length) = parse_type(reader)?;
        members.push(FieldLayout {
            name,
            id,
            since_version: 0,
            offset,
            array_length,
            encoded_length,
            kind,
        });
    }
    Err(SchemaError::UnexpectedEnd)
}

fn parse_field(reader: &mut TokenReader<'_>) -> Result<FieldLayout, SchemaError> {
    let begin = reader.expect(Signal::BeginField, "BEGIN_FIELD")?;
    let (kind, encoded_length, array_length) = parse_type(reader)?;
    reader.expect(Signal::EndField, "END_FIELD")?;
    Ok(FieldLayout {
        name: begin.name.clone(),
        id: begin.id,
        since_version: begin.version,
        offset: begin.offset,
        array_length,
        encoded_length,
        kind,
    })
}

fn parse_var_data(reader: &mut TokenReader<'_>) -> Result<VarDataLayout, SchemaError> {
    let begin = reader.expect(Signal::BeginVarData, "BEGIN_VAR_DATA")?;
    let composite = parse_composite(reader)?;
    reader.expect(Signal::EndVarData, "END_VAR_DATA")?;

    let length = composite
        .member("length")
        .and_then(FieldLayout::encoding)
        .cloned()
        .ok_or_else(|| SchemaError::MissingDimensionField {
            group: begin.name.clone(),
            name: "length",
        })?;
    let data = composite
        .member("varData")
        .and_then(FieldLayout::encoding)
        .cloned()
        .ok_or_else(|| SchemaError::MissingDimensionField {
            group: begin.name.clone(),
            name: "varData",
        })?;

    let max_length = length
        .applicable_max()
        .as_u64()
        .map_or(usize::MAX, |v| usize::try_from(v).unwrap_or(usize::MAX));
    Ok(VarDataLayout {
        name: begin.name.clone(),
        id: begin.id,
        since_version: begin.version,
        header_length: length.primitive_type.size(),
        length_encoding: length,
        max_length,
        character_encoding: data.character_encoding,
    })
}

fn parse_dimension(reader: &mut TokenReader<'_>, group_name: &str) -> Result<DimensionLayout, SchemaError> {
    let composite = parse_composite(reader)?;
    let block_length = composite
        .member("blockLength")
        .ok_or_else(|| SchemaError::MissingDimensionField {
            group: group_name.to_string(),
            name: "blockLength",
        })?;
    let num_in_group = composite
        .member("numInGroup")
        .ok_or_else(|| SchemaError::MissingDimensionField {
            group: group_name.to_string(),
            name: "numInGroup",
        })?;
    let block_length_encoding = block_length
        .encoding()
        .cloned()
        .ok_or_else(|| SchemaError::MissingEncoding("blockLength".to_string()))?;
    let num_in_group_encoding = num_in_group
        .encoding()
        .cloned()
        .ok_or_else(|| SchemaError::MissingEncoding("numInGroup".to_string()))?;

    let count_min = num_in_group_encoding
        .applicable_min()
        .as_u64()
        .map_or(0, |v| usize::try_from(v).unwrap_or(0));
    let count_max = num_in_group_encoding
        .applicable_max()
        .as_u64()
        .map_or(usize::MAX, |v| usize::try_from(v).unwrap_or(usize::MAX));
    Ok(DimensionLayout {
        header_length: composite.encoded_length,
        block_length_offset: block_length.offset,
        block_length_encoding,
        num_in_group_offset: num_in_group.offset,
        num_in_group_encoding,
        count_min,
        count_max,
    })
}

fn parse_group(reader: &mut TokenReader<'_>) -> Result<GroupLayout, SchemaError> {
    let begin = reader.expect(Signal::BeginGroup, "BEGIN_GROUP")?;
    let dimension = parse_dimension(reader, &begin.name)?;
    let (fields, groups, var_data) = parse_members(reader, &begin.name, Signal::EndGroup)?;

    let min_block_length = version_zero_extent(&fields);
    let fields_by_name = index_by_name(&fields, |f| f.name.clone(), &begin.name)?;
    let groups_by_name = index_by_name(&groups, |g| g.name.clone(), &begin.name)?;
    let var_data_by_name = index_by_name(&var_data, |v| v.name.clone(), &begin.name)?;
    Ok(GroupLayout {
        name: begin.name.clone(),
        id: begin.id,
        since_version: begin.version,
        block_length: begin.encoded_length,
        min_block_length,
        dimension,
        fields,
        groups,
        var_data,
        fields_by_name,
        groups_by_name,
        var_data_by_name,
    })
}

/// Fields, then groups, then var-data, until `end` is consumed.
fn parse_members(
    reader: &mut TokenReader<'_>,
    scope: &str,
    end: Signal,
) -> Result<(Vec<FieldLayout>, Vec<GroupLayout>, Vec<VarDataLayout>), SchemaError> {
    let mut fields = Vec::new();
    let mut groups: Vec<GroupLayout> = Vec::new();
    let mut var_data: Vec<VarDataLayout> = Vec::new();
    loop {
        let t = reader.peek().ok_or(SchemaError::UnexpectedEnd)?;
        if t.signal == end {
            reader.next()?;
            return Ok((fields, groups, var_data));
        }
        match t.signal {
            Signal::BeginField => {
                if !groups.is_empty() || !var_data.is_empty() {
                    return Err(SchemaError::FieldOutOfOrder {
                        scope: scope.to_string(),
                        name: t.name.clone(),
                    });
                }
                fields.push(parse_field(reader)?);
            }
            Signal::BeginGroup => {
                if !var_data.is_empty() {
                    return Err(SchemaError::GroupOutOfOrder {
                        scope: scope.to_string(),
                        name: t.name.clone(),
                    });
                }
                groups.push(parse_group(reader)?);
            }
            Signal::BeginVarData => var_data.push(parse_var_data(reader)?),
            _ => {
                return Err(SchemaError::UnexpectedToken {
                    expected: "BEGIN_FIELD, BEGIN_GROUP, BEGIN_VAR_DATA or end of scope",
                    found: format!("{:?}({})", t.signal, t.name),
                })
            }
        }
    }
}

/// Byte extent of the version-0 fields: what every producer version wrote.
fn version_zero_extent(fields: &[FieldLayout]) -> usize {
    fields
        .iter()
        .filter(|f| f.since_version == 0)
        .map(|f| f.offset + f.encoded_length)
        .max()
        .unwrap_or(0)
}

/// Parse a standalone composite token list (used for the message header).
pub(crate) fn parse_composite_tokens(tokens: &[Token]) -> Result<CompositeLayout, SchemaError> {
    let mut reader = TokenReader::new(tokens);
    parse_composite(&mut reader)
}

fn resolve_message(tokens: &[Token]) -> Result<MessageLayout, SchemaError> {
    let mut reader = TokenReader::new(tokens);
    let begin = reader.expect(Signal::BeginMessage, "BEGIN_MESSAGE")?;
    let (fields, groups, var_data) = parse_members(&mut reader, &begin.name, Signal::EndMessage)?;

    let fields_by_name = index_by_name(&fields, |f| f.name.clone(), &begin.name)?;
    let groups_by_name = index_by_name(&groups, |g| g.name.clone(), &begin.name)?;
    let var_data_by_name = index_by_name(&var_data, |v| v.name.clone(), &begin.name)?;
    Ok(MessageLayout {
        name: begin.name.clone(),
        template_id: begin.id,
        block_length: begin.encoded_length,
        fields,
        groups,
        var_data,
        fields_by_name,
        groups_by_name,
        var_data_by_name,
    })
}
