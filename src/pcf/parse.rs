//! Decoding of PCF messages and their parameter structures.
//!
//! Every structure carries its own length, so decoding is a cursor walk:
//! read one parameter, advance by its structure length, repeat. A structure
//! whose declared length is inconsistent with the buffer ends the walk, since
//! every later offset would be wrong.

use thiserror::Error;

use super::{
    Header, Message, Parameter, ParameterValue, HEADER_SIZE, MQCFT_INTEGER, MQCFT_INTEGER64,
    MQCFT_INTEGER64_LIST, MQCFT_INTEGER_LIST, MQCFT_STRING, MQCFT_STRING_LIST,
};

/// Smallest possible parameter structure: type + length.
const MIN_PARAMETER_SIZE: usize = 8;

/// Errors that can occur while decoding PCF data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("message too short for header: {size} bytes")]
    TruncatedHeader { size: usize },

    #[error("parameter at offset {offset} truncated: {available} bytes available")]
    TruncatedParameter { offset: usize, available: usize },

    #[error("parameter at offset {offset} declares invalid length {length}")]
    InvalidLength { offset: usize, length: i32 },

    #[error("reading parameter {code} at offset {offset}: {reason}")]
    Malformed {
        code: i32,
        offset: usize,
        reason: &'static str,
    },
}

/// Split a raw message into its header and parameter bytes.
pub fn read_message(data: &[u8]) -> Result<Message, ParseError> {
    if data.len() < HEADER_SIZE {
        return Err(ParseError::TruncatedHeader { size: data.len() });
    }

    let field = |i: usize| read_i32_le(data, i * 4).unwrap_or_default();
    let header = Header {
        kind: field(0),
        version: field(2),
        command: field(3),
        msg_seq_number: field(4),
        control: field(5),
        comp_code: field(6),
        reason: field(7),
        parameter_count: field(8),
    };

    Ok(Message {
        header,
        body: data.get(HEADER_SIZE..).unwrap_or_default().to_vec(),
    })
}

/// Read the parameter starting at `offset`, returning it together with the
/// number of bytes it occupies.
pub fn read_parameter(buf: &[u8], offset: usize) -> Result<(Parameter, usize), ParseError> {
    let data = buf.get(offset..).unwrap_or_default();
    if data.len() < MIN_PARAMETER_SIZE {
        return Err(ParseError::TruncatedParameter {
            offset,
            available: data.len(),
        });
    }

    let type_tag = read_i32_le(data, 0).unwrap_or_default();
    let length = read_i32_le(data, 4).unwrap_or_default();
    let size = usize::try_from(length).unwrap_or(0);
    if size < MIN_PARAMETER_SIZE || size % 4 != 0 {
        return Err(ParseError::InvalidLength { offset, length });
    }
    let Some(data) = data.get(..size) else {
        return Err(ParseError::TruncatedParameter {
            offset,
            available: data.len(),
        });
    };

    let code = read_i32_le(data, 8).unwrap_or_default();
    let malformed = |reason| ParseError::Malformed {
        code,
        offset,
        reason,
    };

    let value = match type_tag {
        MQCFT_INTEGER => {
            let v = read_i32_le(data, 12).ok_or_else(|| malformed("short integer"))?;
            ParameterValue::Integer(i64::from(v))
        }
        MQCFT_INTEGER64 => {
            let v = read_i64_le(data, 16).ok_or_else(|| malformed("short integer64"))?;
            ParameterValue::Integer(v)
        }
        MQCFT_INTEGER_LIST => {
            let count = read_count(data, 12).ok_or_else(|| malformed("bad list count"))?;
            let values = (0..count)
                .map(|i| read_i32_le(data, 16 + i * 4).map(i64::from))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| malformed("list exceeds structure"))?;
            ParameterValue::IntegerList(values)
        }
        MQCFT_INTEGER64_LIST => {
            let count = read_count(data, 12).ok_or_else(|| malformed("bad list count"))?;
            let values = (0..count)
                .map(|i| read_i64_le(data, 16 + i * 8))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| malformed("list exceeds structure"))?;
            ParameterValue::IntegerList(values)
        }
        MQCFT_STRING => {
            let len = read_count(data, 16).ok_or_else(|| malformed("bad string length"))?;
            let raw = data
                .get(20..20 + len)
                .ok_or_else(|| malformed("string exceeds structure"))?;
            ParameterValue::String(decode_string(raw))
        }
        MQCFT_STRING_LIST => {
            let count = read_count(data, 16).ok_or_else(|| malformed("bad list count"))?;
            let width = read_count(data, 20).ok_or_else(|| malformed("bad string length"))?;
            // Zero-width elements take no space, so bound the count by the
            // structure size instead.
            if width == 0 && count > data.len() {
                return Err(malformed("list exceeds structure"));
            }
            let raw = count
                .checked_mul(width)
                .and_then(|total| data.get(24..24 + total))
                .ok_or_else(|| malformed("list exceeds structure"))?;
            let values = if width == 0 {
                vec![String::new(); count]
            } else {
                raw.chunks_exact(width).map(decode_string).collect()
            };
            ParameterValue::StringList(values)
        }
        other => ParameterValue::Unsupported { type_tag: other },
    };

    Ok((Parameter { code, value }, size))
}

/// Decode every parameter of a message body in order.
///
/// Decoding stops at the first malformed structure; the parameters read
/// before it are returned together with the error.
pub fn decode_parameters(body: &[u8]) -> (Vec<Parameter>, Option<ParseError>) {
    let mut params = Vec::with_capacity(16);
    let mut offset = 0;

    while offset < body.len() {
        match read_parameter(body, offset) {
            Ok((param, consumed)) => {
                params.push(param);
                offset += consumed;
            }
            Err(e) => return (params, Some(e)),
        }
    }

    (params, None)
}

/// Strings arrive blank padded and sometimes NUL terminated.
fn decode_string(raw: &[u8]) -> String {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(raw.get(..end).unwrap_or_default()).into_owned()
}

// ---------------------------------------------------------------------------
// Safe byte-reading helpers (no indexing, no panics)
// ---------------------------------------------------------------------------

fn read_i32_le(data: &[u8], offset: usize) -> Option<i32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(i32::from_le_bytes(bytes.try_into().ok()?))
}

fn read_i64_le(data: &[u8], offset: usize) -> Option<i64> {
    let bytes = data.get(offset..offset + 8)?;
    Some(i64::from_le_bytes(bytes.try_into().ok()?))
}

/// Read a non-negative count or length field.
fn read_count(data: &[u8], offset: usize) -> Option<usize> {
    usize::try_from(read_i32_le(data, offset)?).ok()
}
