//! Frame handling: walk a buffer holding one or more back-to-back messages.
//!
//! Each message is located by decoding its header, matching the template id
//! against the schema, and measuring the body with `sbe_decoded_length` so
//! the scan can hop to the next header without decoding field values.

use crate::error::CodecError;
use crate::header::HeaderDecoder;
use crate::layout::ResolvedSchema;
use crate::message::MessageDecoder;

/// One located message within a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMessage {
    pub name: String,
    pub template_id: u16,
    /// Acting version from the wire header.
    pub version: u16,
    /// Header start to body end, as byte offsets into the frame.
    pub byte_range: (usize, usize),
}

/// Result of scanning a frame: every message found, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameScanResult {
    pub messages: Vec<FrameMessage>,
}

/// Scan `bytes` as a sequence of header-prefixed messages. Fails on a
/// schema-id mismatch, an unknown template id, or a truncated message;
/// trailing bytes shorter than a header also fail as a short buffer.
pub fn scan_frame(schema: &ResolvedSchema, bytes: &[u8]) -> Result<FrameScanResult, CodecError> {
    let mut messages = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let header = HeaderDecoder::wrap(&schema.header, bytes, offset);
        let schema_id = header.schema_id()?;
        if schema_id != schema.id {
            return Err(CodecError::SchemaIdMismatch {
                expected: schema.id,
                actual: schema_id,
            });
        }
        let template_id = header.template_id()?;
        let layout = schema
            .message_for_template(template_id)
            .ok_or(CodecError::UnknownTemplateId(template_id))?;

        let mut decoder = MessageDecoder::new(schema, layout);
        decoder.wrap(
            bytes,
            offset + schema.header.encoded_length,
            header.block_length()?,
            header.version()?,
        );
        let body_length = decoder.sbe_decoded_length()?;

        let end = offset + schema.header.encoded_length + body_length;
        if end > bytes.len() {
            return Err(CodecError::ShortBuffer {
                offset,
                length: end - offset,
                capacity: bytes.len(),
            });
        }
        messages.push(FrameMessage {
            name: layout.name.clone(),
            template_id,
            version: header.version()?,
            byte_range: (offset, end),
        });
        offset = end;
    }
    Ok(FrameScanResult { messages })
}
