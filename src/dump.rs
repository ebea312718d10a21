//! Format a wrapped decoder as display text: fields, expanded group
//! instances, var-data. The decoder's limit is restored afterwards, so a
//! dump can be taken mid-decode without losing the caller's place.

use crate::error::CodecError;
use crate::flyweight::{self, EnumValue, UnknownEnumPolicy};
use crate::ir::{PrimitiveType, PrimitiveValue};
use crate::layout::{FieldKind, FieldLayout, GroupLayout, VarDataLayout};
use crate::message::{read_dimension, MessageDecoder};
use crate::vardata;

fn hex_string(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

fn format_scalar(v: &PrimitiveValue) -> String {
    match v {
        PrimitiveValue::Char(x) => format!("'{}'", *x as char),
        other => format!("{}", other),
    }
}

fn dump_field(
    out: &mut String,
    buf: &[u8],
    base: usize,
    acting: u16,
    f: &FieldLayout,
    policy: UnknownEnumPolicy,
    indent: usize,
) -> Result<(), CodecError> {
    let pad = "  ".repeat(indent);
    match &f.kind {
        FieldKind::Primitive(encoding) => {
            if f.array_length > 1 {
                if encoding.primitive_type == PrimitiveType::Char {
                    let s = flyweight::read_array_string(buf, base, f, Some(acting))?;
                    out.push_str(&format!("{}{}: \"{}\"\n", pad, f.name, s));
                } else {
                    let mut parts = Vec::with_capacity(f.array_length);
                    for i in 0..f.array_length {
                        let v = flyweight::read_array_element(buf, base, f, Some(acting), i)?;
                        parts.push(format_scalar(&v));
                    }
                    out.push_str(&format!("{}{}: [{}]\n", pad, f.name, parts.join(", ")));
                }
            } else {
                let v = flyweight::read_scalar(buf, base, f, Some(acting))?;
                out.push_str(&format!("{}{}: {}\n", pad, f.name, format_scalar(&v)));
            }
        }
        FieldKind::Enum(e) => {
            let raw = flyweight::read_scalar(buf, base, f, Some(acting))?;
            let rendered = match flyweight::decode_enum(e, raw, policy)? {
                EnumValue::Known(v) => v.name.clone(),
                EnumValue::Unknown(v) => format!("<unknown:{}>", v),
                EnumValue::Null => "<null>".to_string(),
            };
            out.push_str(&format!("{}{}: {}\n", pad, f.name, rendered));
        }
        FieldKind::Set(s) => {
            let mut on = Vec::new();
            for c in &s.choices {
                if flyweight::read_choice(buf, base, f, s, Some(acting), &c.name)? {
                    on.push(c.name.as_str());
                }
            }
            out.push_str(&format!("{}{}: {{{}}}\n", pad, f.name, on.join("|")));
        }
        FieldKind::Composite(c) => {
            out.push_str(&format!("{}{}: {{\n", pad, f.name));
            for member in &c.members {
                dump_field(out, buf, base + f.offset, acting, member, policy, indent + 1)?;
            }
            out.push_str(&format!("{}}}\n", pad));
        }
    }
    Ok(())
}

fn dump_var_data(
    out: &mut String,
    buf: &[u8],
    acting: u16,
    limit: &mut usize,
    v: &VarDataLayout,
    indent: usize,
) -> Result<(), CodecError> {
    let pad = "  ".repeat(indent);
    let bytes = vardata::as_slice(buf, limit, v, Some(acting))?;
    if v.character_encoding.is_some() {
        match flyweight::decode_text(bytes, v.character_encoding, &v.name) {
            Ok(s) => out.push_str(&format!("{}{}: \"{}\"\n", pad, v.name, s)),
            Err(_) => out.push_str(&format!("{}{}: hex({})\n", pad, v.name, hex_string(bytes))),
        }
    } else {
        out.push_str(&format!("{}{}: hex({})\n", pad, v.name, hex_string(bytes)));
    }
    Ok(())
}

fn dump_members(
    out: &mut String,
    buf: &[u8],
    acting: u16,
    limit: &mut usize,
    groups: &[GroupLayout],
    var_data: &[VarDataLayout],
    policy: UnknownEnumPolicy,
    indent: usize,
) -> Result<(), CodecError> {
    let pad = "  ".repeat(indent);
    for g in groups {
        if g.since_version > acting {
            continue;
        }
        let (block_length, count) = read_dimension(buf, *limit, g)?;
        *limit += g.dimension.header_length;
        out.push_str(&format!("{}{}[{}] {{\n", pad, g.name, count));
        for i in 0..count {
            let base = *limit;
            *limit += block_length;
            out.push_str(&format!("{}  [{}]\n", pad, i));
            for f in &g.fields {
                dump_field(out, buf, base, acting, f, policy, indent + 2)?;
            }
            dump_members(out, buf, acting, limit, &g.groups, &g.var_data, policy, indent + 2)?;
        }
        out.push_str(&format!("{}}}\n", pad));
    }
    for v in var_data {
        dump_var_data(out, buf, acting, limit, v, indent)?;
    }
    Ok(())
}

/// Render everything the decoder can see. Restores the limit before
/// returning.
pub fn message_to_dump(dec: &mut MessageDecoder<'_>) -> Result<String, CodecError> {
    let saved_limit = dec.limit();
    dec.sbe_rewind();

    let layout = dec.layout();
    let policy = dec.schema().unknown_enum_policy;
    let mut out = format!(
        "{} (template={}, actingVersion={}, actingBlockLength={})\n",
        layout.name,
        layout.template_id,
        dec.acting_version(),
        dec.acting_block_length(),
    );

    let buf = dec.buffer();
    let acting = dec.acting_version();
    for f in &layout.fields {
        dump_field(&mut out, buf, dec.offset(), acting, f, policy, 1)?;
    }
    let mut limit = dec.limit();
    dump_members(
        &mut out,
        buf,
        acting,
        &mut limit,
        &layout.groups,
        &layout.var_data,
        policy,
        1,
    )?;

    dec.set_limit(saved_limit);
    Ok(out)
}
