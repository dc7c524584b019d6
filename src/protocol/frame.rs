//! Frame assembly
//!
//! Decides when a response has fully arrived. The server sends no byte
//! count, so completion is purely structural: a frame is complete once the
//! accumulated bytes end with `\r\n\r\n`.
//!
//! Array replies open with a header line describing the array shape:
//!
//! ```text
//! <rows> Points by <cols> channels\r\n
//! <body ...>\r\n\r\n
//! ```
//!
//! The header is parsed on the way through so the decoder can reshape the
//! body, but it never shortens or extends the read loop.

use bytes::{Bytes, BytesMut};

use crate::error::{DacError, Result};

/// End-of-frame marker
pub const TERMINATOR: &[u8] = b"\r\n\r\n";

const POINTS_BY: &[u8] = b" Points by ";
const CHANNELS: &[u8] = b" channels";
const LINE_END: &[u8] = b"\r\n";

/// Declared array shape from a `<rows> Points by <cols> channels` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayHeader {
    pub rows: usize,
    pub cols: usize,

    /// Bytes matched by the header pattern itself
    matched_len: usize,
}

impl ArrayHeader {
    /// Number of values the body should hold
    pub fn count(&self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }

    /// The body following the header line
    ///
    /// Anything after `channels` up to the first `\r\n` belongs to the header
    /// line and is skipped. Returns an empty slice when the line never ends.
    pub fn body<'a>(&self, payload: &'a [u8]) -> &'a [u8] {
        let rest = &payload[self.matched_len.min(payload.len())..];
        match find(rest, LINE_END) {
            Some(pos) => &rest[pos + LINE_END.len()..],
            None => &[],
        }
    }
}

/// Match the array header at the very start of `buf`
pub fn parse_header(buf: &[u8]) -> Option<ArrayHeader> {
    let (rows, mut pos) = parse_digits(buf)?;
    pos += strip_prefix(&buf[pos..], POINTS_BY)?;
    let (cols, digits) = parse_digits(&buf[pos..])?;
    pos += digits;
    pos += strip_prefix(&buf[pos..], CHANNELS)?;

    Some(ArrayHeader {
        rows,
        cols,
        matched_len: pos,
    })
}

fn parse_digits(buf: &[u8]) -> Option<(usize, usize)> {
    let len = buf.iter().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }
    let mut value: usize = 0;
    for &b in &buf[..len] {
        value = value.checked_mul(10)?.checked_add((b - b'0') as usize)?;
    }
    Some((value, len))
}

fn strip_prefix(buf: &[u8], prefix: &[u8]) -> Option<usize> {
    buf.starts_with(prefix).then_some(prefix.len())
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

// =============================================================================
// Frame
// =============================================================================

/// One complete response as read off the wire, terminator included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
    header: Option<ArrayHeader>,
}

impl Frame {
    /// Build a frame from bytes already known to be complete
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let header = parse_header(&bytes);
        Self { bytes, header }
    }

    /// Everything received, terminator included
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The frame with its trailing terminator removed
    pub fn payload(&self) -> Bytes {
        match self.bytes.strip_suffix(TERMINATOR) {
            Some(stripped) => self.bytes.slice(..stripped.len()),
            None => self.bytes.clone(),
        }
    }

    /// Array header, when the frame opened with one
    pub fn header(&self) -> Option<ArrayHeader> {
        self.header
    }
}

// =============================================================================
// Assembler
// =============================================================================

/// Per-read-cycle state, discarded once the frame is produced
#[derive(Debug, Default)]
pub struct FrameState {
    /// Bytes received so far
    pub buffer: BytesMut,

    /// Declared array shape, once the first line has arrived
    pub header: Option<ArrayHeader>,

    /// Whether the first line has been inspected for a header
    header_checked: bool,

    /// Whether the buffer ends with the terminator
    pub complete: bool,
}

/// Accumulates chunks until a frame is complete
///
/// ## Rules
/// - A zero-byte chunk means the peer closed the connection.
/// - Completion is checked only at the end of the accumulated buffer.
/// - Only one frame is ever outstanding, so no attempt is made to split
///   concatenated frames.
#[derive(Debug)]
pub struct FrameAssembler {
    state: FrameState,
    max_size: usize,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl FrameAssembler {
    /// Create an assembler that gives up beyond `max_size` bytes
    pub fn new(max_size: usize) -> Self {
        Self {
            state: FrameState::default(),
            max_size,
        }
    }

    /// Append one chunk; returns whether the frame is now complete
    pub fn push(&mut self, chunk: &[u8]) -> Result<bool> {
        if self.state.complete {
            return Err(DacError::ProtocolViolation(
                "chunk pushed after frame completed".to_string(),
            ));
        }
        if chunk.is_empty() {
            return Err(DacError::ConnectionClosed);
        }
        if self.state.buffer.len() + chunk.len() > self.max_size {
            return Err(DacError::FrameTooLarge {
                limit: self.max_size,
            });
        }

        // A line end may straddle the previous chunk boundary
        let scan_from = self.state.buffer.len().saturating_sub(LINE_END.len() - 1);
        self.state.buffer.extend_from_slice(chunk);

        if !self.state.header_checked
            && find(&self.state.buffer[scan_from..], LINE_END).is_some()
        {
            self.state.header = parse_header(&self.state.buffer);
            self.state.header_checked = true;
        }

        self.state.complete = self.state.buffer.ends_with(TERMINATOR);
        Ok(self.state.complete)
    }

    /// Current state, for inspection
    pub fn state(&self) -> &FrameState {
        &self.state
    }

    /// Take the finished frame
    pub fn finish(self) -> Result<Frame> {
        if !self.state.complete {
            return Err(DacError::ProtocolViolation(format!(
                "frame incomplete after {} bytes",
                self.state.buffer.len()
            )));
        }
        let bytes = self.state.buffer.freeze();
        let header = self.state.header.or_else(|| parse_header(&bytes));
        Ok(Frame { bytes, header })
    }

    /// Drive the assembler to completion
    ///
    /// `more` is called only while the frame is still incomplete, so no
    /// chunk beyond the one carrying the terminator is ever consumed.
    pub fn assemble<F>(mut self, initial: &[u8], mut more: F) -> Result<Frame>
    where
        F: FnMut() -> Result<Bytes>,
    {
        let mut complete = self.push(initial)?;
        while !complete {
            let chunk = more()?;
            complete = self.push(&chunk)?;
        }
        self.finish()
    }
}

/// Assemble a frame with no size limit
pub fn assemble<F>(initial: &[u8], more: F) -> Result<Frame>
where
    F: FnMut() -> Result<Bytes>,
{
    FrameAssembler::default().assemble(initial, more)
}
