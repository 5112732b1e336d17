//! Protocol codec
//!
//! Encoding and decoding functions for the RESP wire protocol.
//!
//! ## Wire Format
//!
//! ### Command Format (multi-bulk)
//! ```text
//! *<argc>\r\n
//! $<len>\r\n<arg bytes>\r\n      (repeated argc times)
//! ```
//!
//! ### Reply Format
//! ```text
//! +<line>\r\n                    status
//! -<line>\r\n                    error status
//! :<integer>\r\n                 integer
//! $<len>\r\n<bytes>\r\n          bulk string ($-1\r\n is nil)
//! *<count>\r\n<elements...>      array       (*-1\r\n is nil)
//! ```

use bytes::{Bytes, BytesMut};

use crate::config::Config;
use crate::error::{RespError, Result};
use super::command::Command;
use super::reply::{Node, Reply, ReplyArena, Span};

const CRLF: &[u8; 2] = b"\r\n";

/// Default bulk string limit (512 MB)
pub const DEFAULT_MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Default element count limit for a single array
pub const DEFAULT_MAX_ARRAY_LEN: usize = u32::MAX as usize;

/// Default array nesting limit
pub const DEFAULT_MAX_DEPTH: usize = 32;

// =============================================================================
// Command Encoding
// =============================================================================

/// Encode a command to bytes
pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(encoded_len(command));
    encode_command_into(command, &mut buf);
    buf.to_vec()
}

/// Append the encoded command to an output buffer
pub fn encode_command_into(command: &Command, buf: &mut BytesMut) {
    let args = command.args();
    buf.reserve(encoded_len(command));

    buf.extend_from_slice(b"*");
    buf.extend_from_slice(args.len().to_string().as_bytes());
    buf.extend_from_slice(CRLF);

    for arg in args {
        buf.extend_from_slice(b"$");
        buf.extend_from_slice(arg.len().to_string().as_bytes());
        buf.extend_from_slice(CRLF);
        buf.extend_from_slice(arg);
        buf.extend_from_slice(CRLF);
    }
}

/// Exact size of the encoded command
pub fn encoded_len(command: &Command) -> usize {
    let args = command.args();
    let header = 1 + decimal_len(args.len()) + CRLF.len();
    args.iter().fold(header, |total, arg| {
        total + 1 + decimal_len(arg.len()) + CRLF.len() + arg.len() + CRLF.len()
    })
}

fn decimal_len(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

// =============================================================================
// Command Decoding (reference multi-bulk reader)
// =============================================================================

/// Decode one multi-bulk command from bytes
///
/// Returns the arguments and the number of bytes consumed, or `None` when
/// the input is truncated.
pub fn decode_command(bytes: &[u8]) -> Result<Option<(Vec<Bytes>, usize)>> {
    let mut pos = 0;

    let Some(header) = read_line(bytes, &mut pos)? else {
        return Ok(None);
    };
    if header.first() != Some(&b'*') {
        return Err(RespError::Protocol(format!(
            "Expected multi-bulk header, got {:?}",
            String::from_utf8_lossy(header)
        )));
    }
    let argc = parse_len(&header[1..])?;
    if argc < 1 {
        return Err(RespError::Protocol(format!(
            "Invalid multi-bulk length: {}",
            argc
        )));
    }

    // Every argument takes at least 6 bytes (`$0\r\n\r\n`), so the buffer
    // bounds how many can really follow
    let mut args = Vec::with_capacity((argc as usize).min(bytes.len() / 6));
    for _ in 0..argc {
        let Some(line) = read_line(bytes, &mut pos)? else {
            return Ok(None);
        };
        if line.first() != Some(&b'$') {
            return Err(RespError::Protocol(format!(
                "Expected bulk argument, got {:?}",
                String::from_utf8_lossy(line)
            )));
        }
        let len = parse_len(&line[1..])?;
        if len < 0 {
            return Err(RespError::Protocol(
                "Null bulk argument in command".to_string(),
            ));
        }
        let Some(span) = read_payload(bytes, &mut pos, len as usize)? else {
            return Ok(None);
        };
        args.push(Bytes::copy_from_slice(&bytes[span.start..span.end]));
    }

    Ok(Some((args, pos)))
}

// =============================================================================
// Reply Decoding
// =============================================================================

/// Limits applied while decoding replies
#[derive(Debug, Clone, Copy)]
pub struct DecodeLimits {
    pub max_bulk_len: usize,
    pub max_array_len: usize,
    pub max_depth: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_array_len: DEFAULT_MAX_ARRAY_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl From<&Config> for DecodeLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_bulk_len: config.max_bulk_len,
            max_array_len: config.max_array_len,
            max_depth: config.max_depth,
        }
    }
}

/// Decode a single reply from bytes
///
/// Returns the reply and number of bytes consumed, or `None` when the input
/// does not yet hold a complete reply.
pub fn decode_reply(bytes: &[u8]) -> Result<Option<(Reply, usize)>> {
    let mut parser = ReplyParser::default();

    if !parser.advance(bytes, &DecodeLimits::default())? {
        return Ok(None);
    }

    let consumed = parser.pos;
    let buf = Bytes::copy_from_slice(&bytes[..consumed]);
    Ok(Some((parser.arena.finish(buf), consumed)))
}

/// Incremental reply decoder
///
/// Bytes are fed in as they arrive; `decode` yields one reply at a time and
/// leaves partial input buffered until the rest shows up. Parsing resumes
/// where the previous call stopped, so a reply is scanned once however it is
/// chunked. Each decoded reply takes ownership of its own slice of the buffer
/// without copying.
#[derive(Debug, Default)]
pub struct ReplyDecoder {
    buffer: BytesMut,
    limits: DecodeLimits,
    parser: ReplyParser,
}

impl ReplyDecoder {
    pub fn new(limits: DecodeLimits) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            limits,
            parser: ReplyParser::default(),
        }
    }

    /// Append received bytes
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Direct access to the receive buffer, for reading straight into it
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Number of buffered bytes not yet consumed by a reply
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes of the pending reply already parsed; they are not looked at again
    pub fn parsed(&self) -> usize {
        self.parser.pos
    }

    /// Decode the next complete reply, if there is one
    pub fn decode(&mut self) -> Result<Option<Reply>> {
        if self.buffer.is_empty() || self.buffer.len() < self.parser.need {
            return Ok(None);
        }

        match self.parser.advance(&self.buffer, &self.limits) {
            Ok(false) => Ok(None),
            Ok(true) => {
                let ReplyParser { pos, arena, .. } = std::mem::take(&mut self.parser);
                let unit = self.buffer.split_to(pos).freeze();
                Ok(Some(arena.finish(unit)))
            }
            Err(e) => {
                self.parser = ReplyParser::default();
                Err(e)
            }
        }
    }

    /// Drop anything buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.parser = ReplyParser::default();
    }
}

/// An array whose elements are still arriving
#[derive(Debug)]
struct OpenArray {
    node: usize,
    len: usize,
    elements: Vec<usize>,
}

/// Outcome of parsing one line (plus bulk payload) at the cursor
enum Step {
    Incomplete,
    /// An array header was consumed; its elements follow
    Opened,
    /// A node is finished, holding its arena index
    Complete(usize),
}

/// Parse state of one reply unit, kept between calls
///
/// `pos` only moves past fully parsed nodes and array headers, and the stack
/// of open arrays remembers how far each level has got, so feeding more
/// bytes continues from `pos` instead of starting over.
#[derive(Debug, Default)]
struct ReplyParser {
    pos: usize,
    /// Input length below which parsing cannot make progress
    need: usize,
    arena: ReplyArena,
    open: Vec<OpenArray>,
}

impl ReplyParser {
    /// Parse as far as `src` allows; `true` once the whole unit is decoded
    ///
    /// `src` must start at the first byte of the unit and may only grow
    /// between calls.
    fn advance(&mut self, src: &[u8], limits: &DecodeLimits) -> Result<bool> {
        loop {
            let mut index = match self.step(src, limits)? {
                Step::Incomplete => return Ok(false),
                Step::Opened => continue,
                Step::Complete(index) => index,
            };

            // Hand the node to its parent, closing every array it completes
            loop {
                match self.open.last_mut() {
                    None => return Ok(true),
                    Some(parent) => {
                        parent.elements.push(index);
                        if parent.elements.len() < parent.len {
                            break;
                        }
                    }
                }
                if let Some(done) = self.open.pop() {
                    index = self.arena.close_array(done.node, &done.elements);
                }
            }
        }
    }

    fn step(&mut self, src: &[u8], limits: &DecodeLimits) -> Result<Step> {
        let line_start = self.pos;
        let mut pos = self.pos;
        let Some(line) = read_line(src, &mut pos)? else {
            self.need = src.len() + 1;
            return Ok(Step::Incomplete);
        };
        let Some((&tag, body)) = line.split_first() else {
            return Err(RespError::Protocol("Empty reply line".to_string()));
        };
        // Span of the line body, relative to the start of the unit
        let body_span = Span {
            start: line_start + 1,
            end: line_start + line.len(),
        };

        let node = match tag {
            b'+' => Node::Status(body_span),
            b'-' => Node::Error(body_span),
            b':' => Node::Integer(parse_integer(body)?),
            b'$' => {
                let len = parse_len(body)?;
                if len < 0 {
                    Node::Bulk(None)
                } else {
                    let len = within_limit(len, limits.max_bulk_len).ok_or_else(|| {
                        RespError::Protocol(format!(
                            "Bulk string too large: {} bytes (max {})",
                            len, limits.max_bulk_len
                        ))
                    })?;
                    match read_payload(src, &mut pos, len)? {
                        Some(span) => Node::Bulk(Some(span)),
                        None => {
                            self.need = pos.saturating_add(len).saturating_add(CRLF.len());
                            return Ok(Step::Incomplete);
                        }
                    }
                }
            }
            b'*' => {
                let count = parse_len(body)?;
                if count < 0 {
                    Node::Array(None)
                } else {
                    return self.open_array(count, pos, limits);
                }
            }
            other => {
                return Err(RespError::Protocol(format!(
                    "Unknown reply type byte: 0x{:02x}",
                    other
                )))
            }
        };

        self.pos = pos;
        Ok(Step::Complete(self.arena.push(node)))
    }

    /// Consume an array header ending at `pos`
    fn open_array(&mut self, count: i64, pos: usize, limits: &DecodeLimits) -> Result<Step> {
        if self.open.len() >= limits.max_depth {
            return Err(RespError::Protocol(format!(
                "Array nesting exceeds {} levels",
                limits.max_depth
            )));
        }
        let len = within_limit(count, limits.max_array_len).ok_or_else(|| {
            RespError::Protocol(format!(
                "Array too large: {} elements (max {})",
                count, limits.max_array_len
            ))
        })?;

        self.pos = pos;
        let node = self.arena.push(Node::Array(None));
        if len == 0 {
            return Ok(Step::Complete(self.arena.close_array(node, &[])));
        }

        // Elements are only counted once they arrive, so a huge header
        // allocates nothing up front
        self.open.push(OpenArray {
            node,
            len,
            elements: Vec::new(),
        });
        Ok(Step::Opened)
    }
}

/// A non-negative wire length as `usize`, if it is within `max`
fn within_limit(len: i64, max: usize) -> Option<usize> {
    usize::try_from(len).ok().filter(|&n| n <= max)
}

/// Read up to the next CRLF, advancing `pos` past it
fn read_line<'a>(src: &'a [u8], pos: &mut usize) -> Result<Option<&'a [u8]>> {
    let start = *pos;
    let rest = src.get(start..).unwrap_or_default();
    match rest.windows(2).position(|w| w == CRLF) {
        Some(offset) => {
            *pos = start + offset + CRLF.len();
            Ok(Some(&src[start..start + offset]))
        }
        None => Ok(None),
    }
}

/// Read a `len`-byte payload followed by CRLF
fn read_payload(src: &[u8], pos: &mut usize, len: usize) -> Result<Option<Span>> {
    let start = *pos;
    let end = start + len;
    if src.len() < end + CRLF.len() {
        return Ok(None);
    }
    if &src[end..end + CRLF.len()] != CRLF {
        return Err(RespError::Protocol(
            "Bulk payload not terminated by CRLF".to_string(),
        ));
    }
    *pos = end + CRLF.len();
    Ok(Some(Span { start, end }))
}

fn parse_integer(body: &[u8]) -> Result<i64> {
    std::str::from_utf8(body)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            RespError::Protocol(format!(
                "Invalid integer: {:?}",
                String::from_utf8_lossy(body)
            ))
        })
}

/// Length prefixes: -1 means null, anything else below zero is invalid
fn parse_len(body: &[u8]) -> Result<i64> {
    let len = parse_integer(body)?;
    if len < -1 {
        return Err(RespError::Protocol(format!("Invalid length: {}", len)));
    }
    Ok(len)
}
