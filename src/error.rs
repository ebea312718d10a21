//! Error types for schema resolution and encode/decode.

use crate::ir::PrimitiveType;

/// Runtime encode/decode failure. All variants are fatal to the current
/// traversal: cursor state is not valid for further use until a fresh wrap.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("buffer too short: {length} bytes at offset {offset}, capacity {capacity}")]
    ShortBuffer {
        offset: usize,
        length: usize,
        capacity: usize,
    },
    #[error("template id mismatch: expected {expected}, decoded {actual}")]
    TemplateMismatch { expected: u16, actual: u16 },
    #[error("schema id mismatch: expected {expected}, decoded {actual}")]
    SchemaIdMismatch { expected: u16, actual: u16 },
    #[error("no such element: group {group} exhausted after {count} elements")]
    NoSuchElement { group: String, count: usize },
    #[error("group {group}: count {count} outside allowed range [{min}, {max}]")]
    CountOutOfRange {
        group: String,
        count: usize,
        min: usize,
        max: usize,
    },
    #[error("group {group}: acting block length {actual} below minimum {min}")]
    GroupBlockLengthTooSmall {
        group: String,
        actual: usize,
        min: usize,
    },
    #[error("{field}: length {length} exceeds schema maximum {max}")]
    LengthExceedsMax {
        field: String,
        length: usize,
        max: usize,
    },
    #[error("enum {name}: unknown wire value {value}")]
    UnknownEnumValue { name: String, value: i64 },
    #[error("enum {name}: no variant named {variant}")]
    UnknownEnumVariant { name: String, variant: String },
    #[error("set {name}: no choice named {choice}")]
    UnknownChoice { name: String, choice: String },
    #[error("{field}: index {index} out of range for array length {length}")]
    IndexOutOfRange {
        field: String,
        index: usize,
        length: usize,
    },
    #[error("{field}: value not convertible to {expected:?}")]
    ValueType {
        field: String,
        expected: PrimitiveType,
    },
    #[error("{field}: text does not match declared character encoding")]
    TextEncoding { field: String },
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("unknown group: {0}")]
    UnknownGroup(String),
    #[error("unknown var-data field: {0}")]
    UnknownVarData(String),
    #[error("unknown message: {0}")]
    UnknownMessage(String),
    #[error("no message with template id {0}")]
    UnknownTemplateId(u16),
}

/// Failure while resolving a schema IR token stream into layouts.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("unexpected token: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },
    #[error("token stream ended inside an open scope")]
    UnexpectedEnd,
    #[error("token {0} carries no encoding")]
    MissingEncoding(String),
    #[error("duplicate name in {scope}: {name}")]
    DuplicateName { scope: String, name: String },
    #[error("duplicate template id: {0}")]
    DuplicateTemplateId(u16),
    #[error("group {group}: dimension header missing {name} field")]
    MissingDimensionField {
        group: String,
        name: &'static str,
    },
    #[error("{scope}: {name} declared after groups or var-data")]
    FieldOutOfOrder { scope: String, name: String },
    #[error("{scope}: group {name} declared after var-data")]
    GroupOutOfOrder { scope: String, name: String },
    #[error("bad message header definition: {0}")]
    BadHeader(String),
}
