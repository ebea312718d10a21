//! # sbecodec — SBE Flyweight Codec Runtime
//!
//! A runtime for Simple Binary Encoding (SBE): given a resolved schema IR
//! (an ordered token stream per message), encode and decode messages as
//! flyweights directly over caller-supplied byte buffers — zero allocation
//! on the hot path, zero copies except when a value is explicitly
//! extracted.
//!
//! ## Model
//!
//! - **Message** = header ++ fixed fields ++ repeating groups ++ var-data,
//!   in that order. The header carries (blockLength, templateId, schemaId,
//!   version); decode uses the wire's block length and version, which is
//!   what makes old and new encodings interoperate.
//! - **Flyweight**: an encoder/decoder borrows the buffer and is re-bound
//!   with `wrap(...)` between messages; construction happens once per
//!   layout.
//! - **Limit**: the single forward cursor a message traversal shares.
//!   Groups and var-data slide it; `sbe_rewind`/`sbe_skip`/
//!   `sbe_decoded_length` manage it wholesale. Group handles borrow the
//!   message mutably, so unfinished inner iteration cannot leak past an
//!   outer `next()`.
//! - **Version tolerance**: every decoder getter compares the field's
//!   since-version against the acting version before touching the buffer;
//!   absent fields yield null sentinels, empty strings, or count-0 groups.
//!
//! ## Usage
//!
//! ```ignore
//! use sbecodec::{build, Encoding, Endianness, PrimitiveType, PrimitiveValue,
//!                ResolvedSchema, SchemaIr, UnknownEnumPolicy};
//!
//! let ir = SchemaIr {
//!     id: 1,
//!     version: 0,
//!     endianness: Endianness::Little,
//!     header: vec![],
//!     messages: vec![build::message(
//!         "Quote",
//!         1,
//!         8,
//!         build::field("price", 1, 0, 0, Encoding::new(PrimitiveType::F64, Endianness::Little)),
//!     )],
//! };
//! let schema = ResolvedSchema::resolve(ir, UnknownEnumPolicy::Error)?;
//!
//! let mut buf = [0u8; 64];
//! let mut enc = schema.encoder("Quote")?;
//! enc.wrap_and_apply_header(&mut buf, 0)?;
//! enc.put("price", PrimitiveValue::F64(101.25))?;
//!
//! let mut dec = schema.decoder("Quote")?;
//! dec.wrap_and_apply_header(&buf, 0)?;
//! assert_eq!(dec.get("price")?.as_f64(), Some(101.25));
//! ```
//!
//! Schema XML parsing, code generation, and buffer growth are out of
//! scope: the IR arrives resolved, and buffers belong to the caller.

pub mod buffer;
pub mod dump;
pub mod error;
pub mod flyweight;
pub mod frame;
pub mod group;
pub mod header;
pub mod ir;
pub mod layout;
pub mod message;
mod vardata;

pub use dump::message_to_dump;
pub use error::{CodecError, SchemaError};
pub use flyweight::{CompositeDecoder, CompositeEncoder, EnumValue, UnknownEnumPolicy};
pub use frame::{scan_frame, FrameMessage, FrameScanResult};
pub use group::{GroupDecoder, GroupEncoder};
pub use header::{HeaderDecoder, HeaderEncoder, HeaderLayout};
pub use ir::{
    build, CharacterEncoding, Encoding, Endianness, Presence, PrimitiveType, PrimitiveValue,
    SchemaIr, Signal, Token,
};
pub use layout::{
    EnumLayout, FieldKind, FieldLayout, GroupLayout, MessageLayout, ResolvedSchema, SetLayout,
    VarDataLayout,
};
pub use message::{MessageDecoder, MessageEncoder};
