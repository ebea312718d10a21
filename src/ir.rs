//! Schema IR: the token stream a codec is driven by.
//!
//! A schema arrives here already parsed and offset-resolved (schema XML
//! handling is someone else's job). Each message or reusable type is an
//! ordered token list bracketed by BEGIN_*/END_* signals; encodings carry
//! primitive type, byte order, presence, and the min/max/null/constant
//! values that the codec consults at run time.

use std::fmt;

/// Byte order for multi-byte fields. Single-byte fields ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

/// Token kind. BEGIN/END pairs bracket a subtree; ENCODING, VALID_VALUE and
/// CHOICE are leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    BeginMessage,
    EndMessage,
    BeginField,
    EndField,
    BeginComposite,
    EndComposite,
    BeginEnum,
    ValidValue,
    EndEnum,
    BeginSet,
    Choice,
    EndSet,
    BeginGroup,
    EndGroup,
    BeginVarData,
    EndVarData,
    Encoding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl PrimitiveType {
    pub fn size(&self) -> usize {
        match self {
            PrimitiveType::Char | PrimitiveType::I8 | PrimitiveType::U8 => 1,
            PrimitiveType::I16 | PrimitiveType::U16 => 2,
            PrimitiveType::I32 | PrimitiveType::U32 | PrimitiveType::F32 => 4,
            PrimitiveType::I64 | PrimitiveType::U64 | PrimitiveType::F64 => 8,
        }
    }
}

/// A typed constant: null/min/max sentinels, constant field values, enum
/// valid-values, set choice bits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveValue {
    Char(u8),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl PrimitiveValue {
    pub fn ty(&self) -> PrimitiveType {
        match self {
            PrimitiveValue::Char(_) => PrimitiveType::Char,
            PrimitiveValue::I8(_) => PrimitiveType::I8,
            PrimitiveValue::I16(_) => PrimitiveType::I16,
            PrimitiveValue::I32(_) => PrimitiveType::I32,
            PrimitiveValue::I64(_) => PrimitiveType::I64,
            PrimitiveValue::U8(_) => PrimitiveType::U8,
            PrimitiveValue::U16(_) => PrimitiveType::U16,
            PrimitiveValue::U32(_) => PrimitiveType::U32,
            PrimitiveValue::U64(_) => PrimitiveType::U64,
            PrimitiveValue::F32(_) => PrimitiveType::F32,
            PrimitiveValue::F64(_) => PrimitiveType::F64,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PrimitiveValue::Char(x) => Some(*x as u64),
            PrimitiveValue::U8(x) => Some(*x as u64),
            PrimitiveValue::U16(x) => Some(*x as u64),
            PrimitiveValue::U32(x) => Some(*x as u64),
            PrimitiveValue::U64(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PrimitiveValue::Char(x) => Some(*x as i64),
            PrimitiveValue::I8(x) => Some(*x as i64),
            PrimitiveValue::I16(x) => Some(*x as i64),
            PrimitiveValue::I32(x) => Some(*x as i64),
            PrimitiveValue::I64(x) => Some(*x),
            PrimitiveValue::U8(x) => Some(*x as i64),
            PrimitiveValue::U16(x) => Some(*x as i64),
            PrimitiveValue::U32(x) => Some(*x as i64),
            PrimitiveValue::U64(x) => Some(*x as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PrimitiveValue::F32(x) => Some(*x as f64),
            PrimitiveValue::F64(x) => Some(*x),
            _ => None,
        }
    }

    /// Convert to the representation of `ty`, widening or truncating
    /// integers as needed. None when the value class does not convert
    /// (e.g. a float into an integer slot).
    pub fn coerce_to(&self, ty: PrimitiveType) -> Option<PrimitiveValue> {
        match ty {
            PrimitiveType::Char => self.as_u64().map(|v| PrimitiveValue::Char(v as u8)),
            PrimitiveType::I8 => self.as_i64().map(|v| PrimitiveValue::I8(v as i8)),
            PrimitiveType::I16 => self.as_i64().map(|v| PrimitiveValue::I16(v as i16)),
            PrimitiveType::I32 => self.as_i64().map(|v| PrimitiveValue::I32(v as i32)),
            PrimitiveType::I64 => self.as_i64().map(PrimitiveValue::I64),
            PrimitiveType::U8 => self.as_u64().map(|v| PrimitiveValue::U8(v as u8)),
            PrimitiveType::U16 => self.as_u64().map(|v| PrimitiveValue::U16(v as u16)),
            PrimitiveType::U32 => self.as_u64().map(|v| PrimitiveValue::U32(v as u32)),
            PrimitiveType::U64 => self.as_u64().map(PrimitiveValue::U64),
            PrimitiveType::F32 => self.as_f64().map(|v| PrimitiveValue::F32(v as f32)),
            PrimitiveType::F64 => self.as_f64().map(PrimitiveValue::F64),
        }
    }

    /// True for the type's null sentinel (NaN for floats).
    pub fn is_null_of(&self, encoding: &Encoding) -> bool {
        match self {
            PrimitiveValue::F32(x) => x.is_nan(),
            PrimitiveValue::F64(x) => x.is_nan(),
            _ => *self == encoding.applicable_null(),
        }
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveValue::Char(x) => write!(f, "{}", *x as char),
            PrimitiveValue::I8(x) => write!(f, "{}", x),
            PrimitiveValue::I16(x) => write!(f, "{}", x),
            PrimitiveValue::I32(x) => write!(f, "{}", x),
            PrimitiveValue::I64(x) => write!(f, "{}", x),
            PrimitiveValue::U8(x) => write!(f, "{}", x),
            PrimitiveValue::U16(x) => write!(f, "{}", x),
            PrimitiveValue::U32(x) => write!(f, "{}", x),
            PrimitiveValue::U64(x) => write!(f, "{}", x),
            PrimitiveValue::F32(x) => write!(f, "{}", x),
            PrimitiveValue::F64(x) => write!(f, "{}", x),
        }
    }
}

/// Field presence. Constant fields occupy zero wire bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    Constant,
}

/// Payload text encoding for char arrays and var-data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterEncoding {
    Ascii,
    Utf8,
}

/// Wire encoding of one primitive slot: type, byte order, presence, and the
/// optional min/max/null/constant overrides from the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoding {
    pub primitive_type: PrimitiveType,
    pub endianness: Endianness,
    pub presence: Presence,
    pub min_value: Option<PrimitiveValue>,
    pub max_value: Option<PrimitiveValue>,
    pub null_value: Option<PrimitiveValue>,
    pub const_value: Option<PrimitiveValue>,
    pub character_encoding: Option<CharacterEncoding>,
}

impl Encoding {
    pub fn new(primitive_type: PrimitiveType, endianness: Endianness) -> Self {
        Encoding {
            primitive_type,
            endianness,
            presence: Presence::Required,
            min_value: None,
            max_value: None,
            null_value: None,
            const_value: None,
            character_encoding: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.presence = Presence::Optional;
        self
    }

    pub fn constant(mut self, value: PrimitiveValue) -> Self {
        self.presence = Presence::Constant;
        self.const_value = Some(value);
        self
    }

    pub fn with_null_value(mut self, value: PrimitiveValue) -> Self {
        self.null_value = Some(value);
        self
    }

    pub fn with_min_value(mut self, value: PrimitiveValue) -> Self {
        self.min_value = Some(value);
        self
    }

    pub fn with_max_value(mut self, value: PrimitiveValue) -> Self {
        self.max_value = Some(value);
        self
    }

    pub fn with_character_encoding(mut self, ce: CharacterEncoding) -> Self {
        self.character_encoding = Some(ce);
        self
    }

    /// Null sentinel: schema override or the SBE default for the type.
    pub fn applicable_null(&self) -> PrimitiveValue {
        if let Some(v) = self.null_value {
            return v;
        }
        match self.primitive_type {
            PrimitiveType::Char => PrimitiveValue::Char(0),
            PrimitiveType::I8 => PrimitiveValue::I8(i8::MIN),
            PrimitiveType::I16 => PrimitiveValue::I16(i16::MIN),
            PrimitiveType::I32 => PrimitiveValue::I32(i32::MIN),
            PrimitiveType::I64 => PrimitiveValue::I64(i64::MIN),
            PrimitiveType::U8 => PrimitiveValue::U8(u8::MAX),
            PrimitiveType::U16 => PrimitiveValue::U16(u16::MAX),
            PrimitiveType::U32 => PrimitiveValue::U32(u32::MAX),
            PrimitiveType::U64 => PrimitiveValue::U64(u64::MAX),
            PrimitiveType::F32 => PrimitiveValue::F32(f32::NAN),
            PrimitiveType::F64 => PrimitiveValue::F64(f64::NAN),
        }
    }

    pub fn applicable_min(&self) -> PrimitiveValue {
        if let Some(v) = self.min_value {
            return v;
        }
        match self.primitive_type {
            PrimitiveType::Char => PrimitiveValue::Char(0x20),
            PrimitiveType::I8 => PrimitiveValue::I8(i8::MIN + 1),
            PrimitiveType::I16 => PrimitiveValue::I16(i16::MIN + 1),
            PrimitiveType::I32 => PrimitiveValue::I32(i32::MIN + 1),
            PrimitiveType::I64 => PrimitiveValue::I64(i64::MIN + 1),
            PrimitiveType::U8 => PrimitiveValue::U8(0),
            PrimitiveType::U16 => PrimitiveValue::U16(0),
            PrimitiveType::U32 => PrimitiveValue::U32(0),
            PrimitiveType::U64 => PrimitiveValue::U64(0),
            PrimitiveType::F32 => PrimitiveValue::F32(f32::MIN),
            PrimitiveType::F64 => PrimitiveValue::F64(f64::MIN),
        }
    }

    pub fn applicable_max(&self) -> PrimitiveValue {
        if let Some(v) = self.max_value {
            return v;
        }
        match self.primitive_type {
            PrimitiveType::Char => PrimitiveValue::Char(0x7e),
            PrimitiveType::I8 => PrimitiveValue::I8(i8::MAX),
            PrimitiveType::I16 => PrimitiveValue::I16(i16::MAX),
            PrimitiveType::I32 => PrimitiveValue::I32(i32::MAX),
            PrimitiveType::I64 => PrimitiveValue::I64(i64::MAX),
            PrimitiveType::U8 => PrimitiveValue::U8(u8::MAX - 1),
            PrimitiveType::U16 => PrimitiveValue::U16(u16::MAX - 1),
            PrimitiveType::U32 => PrimitiveValue::U32(u32::MAX - 1),
            PrimitiveType::U64 => PrimitiveValue::U64(u64::MAX - 1),
            PrimitiveType::F32 => PrimitiveValue::F32(f32::MAX),
            PrimitiveType::F64 => PrimitiveValue::F64(f64::MAX),
        }
    }
}

/// One IR token. Immutable once built; the codec only reads these.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub signal: Signal,
    pub name: String,
    pub id: u16,
    /// Schema version this element was introduced in.
    pub version: u16,
    /// Byte offset within the enclosing block (fields, dimension members).
    pub offset: usize,
    /// Total encoded length: block length for BEGIN_MESSAGE/BEGIN_GROUP,
    /// composite size for BEGIN_COMPOSITE, element size × array length for
    /// ENCODING.
    pub encoded_length: usize,
    /// Number of repeated elements for fixed arrays; 1 for scalars.
    pub array_length: usize,
    /// Tokens spanned by this token's subtree, itself included.
    pub component_token_count: usize,
    pub encoding: Option<Encoding>,
}

impl Token {
    pub fn new(signal: Signal, name: &str) -> Self {
        Token {
            signal,
            name: name.to_string(),
            id: 0,
            version: 0,
            offset: 0,
            encoded_length: 0,
            array_length: 1,
            component_token_count: 1,
            encoding: None,
        }
    }
}

/// A complete schema IR: identity, defaults, header definition, and one
/// token list per message.
#[derive(Debug, Clone)]
pub struct SchemaIr {
    pub id: u16,
    pub version: u16,
    pub endianness: Endianness,
    /// Header composite tokens. Empty means the standard SBE header
    /// (blockLength/templateId/schemaId/version, all u16).
    pub header: Vec<Token>,
    pub messages: Vec<Vec<Token>>,
}

/// Token-list constructors for IR producers and tests. Each returns the
/// fragment for one schema element with BEGIN/END bracketing and
/// `component_token_count` filled in.
pub mod build {
    use super::*;

    fn close(mut tokens: Vec<Token>, end: Token) -> Vec<Token> {
        tokens.push(end);
        tokens[0].component_token_count = tokens.len();
        tokens
    }

    /// `BEGIN_MESSAGE body... END_MESSAGE`. `block_length` covers the fixed
    /// fields only.
    pub fn message(name: &str, template_id: u16, block_length: usize, body: Vec<Token>) -> Vec<Token> {
        let mut begin = Token::new(Signal::BeginMessage, name);
        begin.id = template_id;
        begin.encoded_length = block_length;
        let mut tokens = vec![begin];
        tokens.extend(body);
        close(tokens, Token::new(Signal::EndMessage, name))
    }

    /// A scalar field: `BEGIN_FIELD ENCODING END_FIELD`.
    pub fn field(name: &str, id: u16, version: u16, offset: usize, encoding: Encoding) -> Vec<Token> {
        array_field(name, id, version, offset, encoding, 1)
    }

    /// A fixed-array field (e.g. `char[6]`).
    pub fn array_field(
        name: &str,
        id: u16,
        version: u16,
        offset: usize,
        encoding: Encoding,
        array_length: usize,
    ) -> Vec<Token> {
        let mut begin = Token::new(Signal::BeginField, name);
        begin.id = id;
        begin.version = version;
        begin.offset = offset;
        let mut enc = Token::new(Signal::Encoding, name);
        enc.offset = offset;
        enc.array_length = array_length;
        enc.encoded_length = encoding.primitive_type.size() * array_length;
        enc.encoding = Some(encoding);
        close(vec![begin, enc], Token::new(Signal::EndField, name))
    }

    /// A constant field: zero wire bytes, value baked into the encoding.
    pub fn const_field(name: &str, id: u16, version: u16, encoding: Encoding) -> Vec<Token> {
        let mut begin = Token::new(Signal::BeginField, name);
        begin.id = id;
        begin.version = version;
        let mut enc = Token::new(Signal::Encoding, name);
        enc.encoding = Some(encoding);
        close(vec![begin, enc], Token::new(Signal::EndField, name))
    }

    /// A field backed by an enum/set/composite type fragment.
    pub fn typed_field(name: &str, id: u16, version: u16, offset: usize, ty: Vec<Token>) -> Vec<Token> {
        let mut begin = Token::new(Signal::BeginField, name);
        begin.id = id;
        begin.version = version;
        begin.offset = offset;
        let mut tokens = vec![begin];
        tokens.extend(ty);
        close(tokens, Token::new(Signal::EndField, name))
    }

    /// `BEGIN_ENUM VALID_VALUE... END_ENUM` over a backing encoding.
    pub fn enum_type(name: &str, encoding: Encoding, values: &[(&str, PrimitiveValue)]) -> Vec<Token> {
        let size = encoding.primitive_type.size();
        let mut begin = Token::new(Signal::BeginEnum, name);
        begin.encoded_length = size;
        begin.encoding = Some(encoding.clone());
        let mut tokens = vec![begin];
        for (value_name, value) in values {
            let mut t = Token::new(Signal::ValidValue, value_name);
            t.encoding = Some(encoding.clone().constant(*value));
            tokens.push(t);
        }
        close(tokens, Token::new(Signal::EndEnum, name))
    }

    /// `BEGIN_SET CHOICE... END_SET`; each choice is (name, bit index).
    pub fn set_type(name: &str, encoding: Encoding, choices: &[(&str, u8)]) -> Vec<Token> {
        let size = encoding.primitive_type.size();
        let mut begin = Token::new(Signal::BeginSet, name);
        begin.encoded_length = size;
        begin.encoding = Some(encoding.clone());
        let mut tokens = vec![begin];
        for (choice_name, bit) in choices {
            let mut t = Token::new(Signal::Choice, choice_name);
            t.encoding = Some(encoding.clone().constant(PrimitiveValue::U8(*bit)));
            tokens.push(t);
        }
        close(tokens, Token::new(Signal::EndSet, name))
    }

    /// `BEGIN_COMPOSITE members... END_COMPOSITE`. Members are field or
    /// type fragments with offsets relative to the composite start.
    pub fn composite_type(name: &str, encoded_length: usize, members: Vec<Token>) -> Vec<Token> {
        let mut begin = Token::new(Signal::BeginComposite, name);
        begin.encoded_length = encoded_length;
        let mut tokens = vec![begin];
        tokens.extend(members);
        close(tokens, Token::new(Signal::EndComposite, name))
    }

    /// A bare ENCODING leaf, used for composite members and dimensions.
    pub fn encoding_member(name: &str, offset: usize, encoding: Encoding) -> Token {
        let mut t = Token::new(Signal::Encoding, name);
        t.offset = offset;
        t.encoded_length = encoding.primitive_type.size();
        t.encoding = Some(encoding);
        t
    }

    /// The standard `groupSizeEncoding` dimension: blockLength u16,
    /// numInGroup u16.
    pub fn dimension(endianness: Endianness) -> Vec<Token> {
        composite_type(
            "groupSizeEncoding",
            4,
            vec![
                encoding_member("blockLength", 0, Encoding::new(PrimitiveType::U16, endianness)),
                encoding_member("numInGroup", 2, Encoding::new(PrimitiveType::U16, endianness)),
            ],
        )
    }

    /// `BEGIN_GROUP dimension body... END_GROUP`.
    pub fn group(
        name: &str,
        id: u16,
        version: u16,
        block_length: usize,
        dimension: Vec<Token>,
        body: Vec<Token>,
    ) -> Vec<Token> {
        let mut begin = Token::new(Signal::BeginGroup, name);
        begin.id = id;
        begin.version = version;
        begin.encoded_length = block_length;
        let mut tokens = vec![begin];
        tokens.extend(dimension);
        tokens.extend(body);
        close(tokens, Token::new(Signal::EndGroup, name))
    }

    /// `BEGIN_VAR_DATA composite(length, varData) END_VAR_DATA`.
    pub fn var_data(
        name: &str,
        id: u16,
        version: u16,
        length_encoding: Encoding,
        data_encoding: Encoding,
    ) -> Vec<Token> {
        let mut begin = Token::new(Signal::BeginVarData, name);
        begin.id = id;
        begin.version = version;
        let header_len = length_encoding.primitive_type.size();
        let mut data = Token::new(Signal::Encoding, "varData");
        data.offset = header_len;
        data.encoding = Some(data_encoding);
        let composite = composite_type(
            "varDataEncoding",
            header_len,
            vec![encoding_member("length", 0, length_encoding), data],
        );
        let mut tokens = vec![begin];
        tokens.extend(composite);
        close(tokens, Token::new(Signal::EndVarData, name))
    }

    /// The standard SBE message header: four u16 fields.
    pub fn standard_header(endianness: Endianness) -> Vec<Token> {
        composite_type(
            "messageHeader",
            8,
            vec![
                encoding_member("blockLength", 0, Encoding::new(PrimitiveType::U16, endianness)),
                encoding_member("templateId", 2, Encoding::new(PrimitiveType::U16, endianness)),
                encoding_member("schemaId", 4, Encoding::new(PrimitiveType::U16, endianness)),
                encoding_member("version", 6, Encoding::new(PrimitiveType::U16, endianness)),
            ],
        )
    }
}
