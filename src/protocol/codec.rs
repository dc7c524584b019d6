//! Protocol codec
//!
//! Encoding of requests and decoding of completed frames.
//!
//! ## Wire Format
//!
//! ### Request
//! ```text
//! NAME()\r\n
//! NAME(p1)\r\n
//! NAME(p1, p2)\r\n
//! ```
//!
//! ### Reply payloads by family
//! - bool:    any non-empty text, or an exact/prefix phrase match
//! - number:  a decimal value
//! - list:    names separated by `\r\n`
//! - fields:  `value hex timestamp` split on single spaces
//! - array:   `<rows> Points by <cols> channels\r\n` then tab-separated
//!            integers, or `rows * cols` big-endian i32 values

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::Config;
use crate::error::{DacError, Result};
use super::frame::parse_header;
use super::{Array2, Command, CommandName, ResponseData, ResponseFamily};

/// Line ending of a request and separator of list replies
pub const LINE_END: &str = "\r\n";

/// Separator between request parameters
const PARAM_SEPARATOR: &str = ", ";

// =============================================================================
// Command Encoding
// =============================================================================

/// Encode a command to its wire text
///
/// Format: `NAME(p1, p2)\r\n`
pub fn encode_command(command: &Command) -> Bytes {
    let name = command.name().as_str();
    let mut message = BytesMut::with_capacity(name.len() + 16);

    message.put_slice(name.as_bytes());
    message.put_u8(b'(');
    for (i, param) in command.params().iter().enumerate() {
        if i > 0 {
            message.put_slice(PARAM_SEPARATOR.as_bytes());
        }
        message.put_slice(param.to_string().as_bytes());
    }
    message.put_u8(b')');
    message.put_slice(LINE_END.as_bytes());

    message.freeze()
}

// =============================================================================
// Decoders
// =============================================================================

/// Decoding strategy selected per command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoder {
    Truthy,
    ExactPhrase(String),
    PrefixPhrase(String),
    Number,
    Numbers,
    List,
    Fields(usize),
    TextArray,
    BinaryArray,
    Text,
    Raw,
}

impl Decoder {
    /// Decode a terminator-stripped payload
    ///
    /// Failures become `MalformedResponse` carrying the raw payload.
    pub fn decode(&self, command: CommandName, payload: &[u8]) -> Result<ResponseData> {
        let decoded = match self {
            Decoder::Truthy => Ok(ResponseData::Bool(decode_truthy(payload))),
            Decoder::ExactPhrase(phrase) => decode_exact_phrase(payload, phrase).map(ResponseData::Bool),
            Decoder::PrefixPhrase(prefix) => {
                decode_prefix_phrase(payload, prefix).map(ResponseData::Bool)
            }
            Decoder::Number => decode_number(payload).map(ResponseData::Number),
            Decoder::Numbers => decode_numbers(payload).map(ResponseData::Numbers),
            Decoder::List => decode_list(payload).map(ResponseData::List),
            Decoder::Fields(n) => {
                decode_fields(payload, *n).map(|(value, rest)| ResponseData::Fields { value, rest })
            }
            Decoder::TextArray => decode_text_array(payload).map(ResponseData::Array),
            Decoder::BinaryArray => decode_binary_array(payload).map(ResponseData::Array),
            Decoder::Text => decode_text(payload).map(ResponseData::Text),
            Decoder::Raw => Ok(ResponseData::Raw(Bytes::copy_from_slice(payload))),
        };

        decoded.map_err(|reason| DacError::malformed(command, reason, payload))
    }
}

/// Maps command names to decoders
///
/// Built once from configuration; the phrase-matching decoders take their
/// phrases from here so they stay adjustable across server versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderTable {
    stop_ok_phrase: String,
    motor_done_prefix: String,
}

impl Default for DecoderTable {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl DecoderTable {
    pub fn new(stop_ok_phrase: impl Into<String>, motor_done_prefix: impl Into<String>) -> Self {
        Self {
            stop_ok_phrase: stop_ok_phrase.into(),
            motor_done_prefix: motor_done_prefix.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.stop_ok_phrase, &config.motor_done_prefix)
    }

    /// Decoder for the reply to `name`
    pub fn decoder_for(&self, name: CommandName) -> Decoder {
        match name.family() {
            ResponseFamily::Truthy => Decoder::Truthy,
            ResponseFamily::StopPhrase => Decoder::ExactPhrase(self.stop_ok_phrase.clone()),
            ResponseFamily::DonePrefix => Decoder::PrefixPhrase(self.motor_done_prefix.clone()),
            ResponseFamily::Number => Decoder::Number,
            ResponseFamily::Numbers => Decoder::Numbers,
            ResponseFamily::List => Decoder::List,
            ResponseFamily::Fields(n) => Decoder::Fields(n),
            ResponseFamily::TextArray => Decoder::TextArray,
            ResponseFamily::BinaryArray => Decoder::BinaryArray,
            ResponseFamily::Text => Decoder::Text,
            ResponseFamily::Raw => Decoder::Raw,
        }
    }
}

type DecodeResult<T> = std::result::Result<T, String>;

fn trimmed_text(payload: &[u8]) -> DecodeResult<&str> {
    std::str::from_utf8(payload.trim_ascii())
        .map_err(|e| format!("payload is not valid text: {}", e))
}

/// True for any payload with non-whitespace content
pub fn decode_truthy(payload: &[u8]) -> bool {
    !payload.trim_ascii().is_empty()
}

/// True only when the payload equals `phrase` (surrounding whitespace ignored)
pub fn decode_exact_phrase(payload: &[u8], phrase: &str) -> DecodeResult<bool> {
    Ok(trimmed_text(payload)? == phrase.trim())
}

/// True only when the payload starts with `prefix`
pub fn decode_prefix_phrase(payload: &[u8], prefix: &str) -> DecodeResult<bool> {
    Ok(trimmed_text(payload)?.starts_with(prefix))
}

/// Parse a single decimal number
pub fn decode_number(payload: &[u8]) -> DecodeResult<f64> {
    let text = trimmed_text(payload)?;
    text.parse::<f64>()
        .map_err(|e| format!("expected a number, got {:?}: {}", text, e))
}

/// Parse whitespace-separated decimal numbers (at least one)
pub fn decode_numbers(payload: &[u8]) -> DecodeResult<Vec<f64>> {
    let text = trimmed_text(payload)?;
    if text.is_empty() {
        return Err("expected numbers, got an empty payload".to_string());
    }
    text.split_whitespace()
        .map(|field| {
            field
                .parse::<f64>()
                .map_err(|e| format!("expected a number, got {:?}: {}", field, e))
        })
        .collect()
}

/// Split on `\r\n`; an empty payload is an empty list
pub fn decode_list(payload: &[u8]) -> DecodeResult<Vec<String>> {
    let text = trimmed_text(payload)?;
    if text.is_empty() {
        return Ok(Vec::new());
    }
    Ok(text.split(LINE_END).map(str::to_string).collect())
}

/// Split on single spaces into exactly `n` fields; the first is numeric
pub fn decode_fields(payload: &[u8], n: usize) -> DecodeResult<(f64, Vec<String>)> {
    let text = trimmed_text(payload)?;
    let fields: Vec<&str> = text.splitn(n.max(1), ' ').collect();
    if fields.len() != n {
        return Err(format!("expected {} fields, got {}", n, fields.len()));
    }
    let value = fields[0]
        .parse::<f64>()
        .map_err(|e| format!("expected a number in first field, got {:?}: {}", fields[0], e))?;
    Ok((value, fields[1..].iter().map(|s| s.to_string()).collect()))
}

/// Header line followed by tab-separated decimal integers
///
/// Line breaks inside the body are treated as separators too.
pub fn decode_text_array(payload: &[u8]) -> DecodeResult<Array2> {
    let header = parse_header(payload).ok_or("missing array header")?;
    let count = header.count().ok_or("array header overflows")?;
    let body = std::str::from_utf8(header.body(payload))
        .map_err(|e| format!("array body is not valid text: {}", e))?;

    let values = body
        .split(|c: char| matches!(c, '\t' | '\r' | '\n'))
        .filter(|field| !field.trim().is_empty())
        .map(|field| {
            field
                .trim()
                .parse::<i64>()
                .map_err(|e| format!("expected an integer, got {:?}: {}", field, e))
        })
        .collect::<DecodeResult<Vec<i64>>>()?;

    if values.len() != count {
        return Err(format!(
            "header declares {}x{} = {} values, body has {}",
            header.rows,
            header.cols,
            count,
            values.len()
        ));
    }
    Array2::new(header.rows, header.cols, values).ok_or_else(|| "array shape mismatch".to_string())
}

/// Header line followed by `rows * cols` big-endian i32 values
pub fn decode_binary_array(payload: &[u8]) -> DecodeResult<Array2> {
    let header = parse_header(payload).ok_or("missing array header")?;
    let count = header.count().ok_or("array header overflows")?;
    let body = header.body(payload);

    let expected = count.checked_mul(4).ok_or("array header overflows")?;
    if body.len() != expected {
        return Err(format!(
            "header declares {}x{} = {} values ({} bytes), body has {} bytes",
            header.rows,
            header.cols,
            count,
            expected,
            body.len()
        ));
    }

    let values = body
        .chunks_exact(4)
        .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]) as i64)
        .collect();
    Array2::new(header.rows, header.cols, values).ok_or_else(|| "array shape mismatch".to_string())
}

/// Trimmed text, no interpretation
pub fn decode_text(payload: &[u8]) -> DecodeResult<String> {
    trimmed_text(payload).map(str::to_string)
}
