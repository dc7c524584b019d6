//! Protocol Module
//!
//! Defines the text protocol spoken by the LabVIEW command server.
//!
//! ## Exchange
//! ```text
//! client ──▶  GetMotorPos(Motor1)\r\n
//! client ◀──  12.5\r\n\r\n
//! ```
//!
//! Exactly one request is outstanding at a time. Replies carry no length
//! prefix; they end with `\r\n\r\n`. Array replies start with a
//! `<rows> Points by <cols> channels` header line.
//!
//! ## Layers
//! - `frame`:  when has a reply fully arrived
//! - `codec`:  request text and per-family reply decoding
//! - `state`:  sans-I/O request/response alternation

mod command;
mod response;
mod frame;
mod codec;
mod state;

pub use command::{Command, CommandName, Param, ResponseFamily};
pub use response::{Array2, Response, ResponseData};
pub use frame::{assemble, parse_header, ArrayHeader, Frame, FrameAssembler, FrameState, TERMINATOR};
pub use codec::{
    decode_binary_array, decode_exact_phrase, decode_fields, decode_list, decode_number,
    decode_numbers, decode_prefix_phrase, decode_text, decode_text_array, decode_truthy,
    encode_command, Decoder, DecoderTable,
};
pub use state::{Lvs, ProtocolState};
