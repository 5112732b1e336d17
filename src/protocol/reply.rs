//! Reply definitions
//!
//! A decoded reply owns exactly one frozen buffer holding the bytes of the
//! whole wire unit, plus a flat arena of nodes describing its structure.
//! Nested array elements are indices into that arena, so handing out an
//! element never copies payload bytes and never creates a second owner.
//!
//! ```text
//! Reply ─┬─ buf:      *2\r\n$3\r\nfoo\r\n:7\r\n
//!        ├─ nodes:    [Array(0..2), Bulk(11..14), Integer(7)]
//!        └─ children: [1, 2]
//! ```
//!
//! `ReplyRef<'a>` borrows the owning `Reply`; the borrow checker refuses any
//! element that would outlive its top-level reply.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

use crate::error::{RespError, Result};

/// The tag of a reply, used when reporting projection mismatches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    Status,
    Error,
    Integer,
    BulkString,
    Array,
    /// Null bulk string or null array
    Nil,
}

impl fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplyKind::Status => "status",
            ReplyKind::Error => "error",
            ReplyKind::Integer => "integer",
            ReplyKind::BulkString => "bulk string",
            ReplyKind::Array => "array",
            ReplyKind::Nil => "nil",
        };
        f.write_str(name)
    }
}

/// Byte range inside the reply buffer (or the children table, for arrays)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Node {
    Status(Span),
    Error(Span),
    Integer(i64),
    Bulk(Option<Span>),
    Array(Option<Span>),
}

/// Arena under construction. Nodes are pushed in pre-order; an array's
/// element list is written once its last element has been decoded.
#[derive(Debug, Default)]
pub(crate) struct ReplyArena {
    nodes: Vec<Node>,
    children: Vec<usize>,
}

impl ReplyArena {
    pub(crate) fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Store the element indices of a finished array and point its node at them
    pub(crate) fn close_array(&mut self, node: usize, elements: &[usize]) -> usize {
        let start = self.children.len();
        self.children.extend_from_slice(elements);
        self.nodes[node] = Node::Array(Some(Span {
            start,
            end: self.children.len(),
        }));
        node
    }

    pub(crate) fn finish(self, buf: Bytes) -> Reply {
        Reply {
            buf,
            nodes: self.nodes,
            children: self.children,
        }
    }
}

// =============================================================================
// Reply (owner)
// =============================================================================

/// One fully decoded wire reply. Immutable.
#[derive(Clone)]
pub struct Reply {
    buf: Bytes,
    nodes: Vec<Node>,
    children: Vec<usize>,
}

impl Reply {
    /// Handle to the top-level value
    pub fn root(&self) -> ReplyRef<'_> {
        ReplyRef {
            reply: self,
            index: 0,
        }
    }

    /// The raw wire bytes this reply was decoded from
    pub fn wire_bytes(&self) -> &Bytes {
        &self.buf
    }

    pub fn kind(&self) -> ReplyKind {
        self.root().kind()
    }

    pub fn value(&self) -> RawReply<'_> {
        self.root().value()
    }

    pub fn is_nil(&self) -> bool {
        self.root().is_nil()
    }

    pub fn as_error(&self) -> Option<String> {
        self.root().as_error()
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        self.root().as_bytes()
    }

    pub fn as_string(&self) -> Result<String> {
        self.root().as_string()
    }

    pub fn as_integer(&self) -> Result<i64> {
        self.root().as_integer()
    }

    pub fn as_status(&self) -> Result<&str> {
        self.root().as_status()
    }

    pub fn as_array(&self) -> Result<Elements<'_>> {
        self.root().as_array()
    }

    pub fn as_string_array(&self) -> Result<Vec<String>> {
        self.root().as_string_array()
    }

    /// Convert into any type implementing [`FromReply`]
    pub fn typed<T: FromReply>(&self) -> Result<T> {
        T::from_reply(self.root())
    }

    /// Fail with `Remote` if the top-level value is an error status
    pub fn into_result(self) -> Result<Reply> {
        match self.as_error() {
            Some(message) => Err(RespError::Remote(message)),
            None => Ok(self),
        }
    }
}

impl PartialEq for Reply {
    fn eq(&self, other: &Self) -> bool {
        self.root() == other.root()
    }
}

impl Eq for Reply {}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.value(), f)
    }
}

// =============================================================================
// ReplyRef (borrowed handle)
// =============================================================================

/// A non-owning handle to one node of a [`Reply`]
#[derive(Clone, Copy)]
pub struct ReplyRef<'a> {
    reply: &'a Reply,
    index: usize,
}

impl<'a> ReplyRef<'a> {
    fn node(&self) -> Node {
        self.reply.nodes[self.index]
    }

    fn bytes(&self, span: Span) -> &'a [u8] {
        &self.reply.buf[span.start..span.end]
    }

    pub fn kind(&self) -> ReplyKind {
        match self.node() {
            Node::Status(_) => ReplyKind::Status,
            Node::Error(_) => ReplyKind::Error,
            Node::Integer(_) => ReplyKind::Integer,
            Node::Bulk(Some(_)) => ReplyKind::BulkString,
            Node::Array(Some(_)) => ReplyKind::Array,
            Node::Bulk(None) | Node::Array(None) => ReplyKind::Nil,
        }
    }

    /// The tagged value behind this handle
    pub fn value(&self) -> RawReply<'a> {
        match self.node() {
            Node::Status(span) => RawReply::Status(self.bytes(span)),
            Node::Error(span) => RawReply::Error(self.bytes(span)),
            Node::Integer(n) => RawReply::Integer(n),
            Node::Bulk(span) => RawReply::BulkString(span.map(|s| self.bytes(s))),
            Node::Array(span) => RawReply::Array(span.map(|s| Elements {
                reply: self.reply,
                ids: &self.reply.children[s.start..s.end],
            })),
        }
    }

    /// True only for a null bulk string or a null array. Never fails.
    pub fn is_nil(&self) -> bool {
        matches!(self.node(), Node::Bulk(None) | Node::Array(None))
    }

    /// The error message, if this is an error status
    pub fn as_error(&self) -> Option<String> {
        match self.node() {
            Node::Error(span) => Some(String::from_utf8_lossy(self.bytes(span)).into_owned()),
            _ => None,
        }
    }

    fn mismatch(&self, expected: ReplyKind) -> RespError {
        match self.as_error() {
            Some(message) => RespError::Remote(message),
            None => RespError::TypeMismatch {
                expected,
                actual: self.kind(),
            },
        }
    }

    /// Payload of a non-nil bulk string, without copying
    pub fn as_bytes(&self) -> Result<&'a [u8]> {
        match self.node() {
            Node::Bulk(Some(span)) => Ok(self.bytes(span)),
            _ => Err(self.mismatch(ReplyKind::BulkString)),
        }
    }

    pub fn as_string(&self) -> Result<String> {
        let bytes = self.as_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| RespError::Protocol("bulk string is not valid UTF-8".to_string()))
    }

    pub fn as_integer(&self) -> Result<i64> {
        match self.node() {
            Node::Integer(n) => Ok(n),
            _ => Err(self.mismatch(ReplyKind::Integer)),
        }
    }

    /// Text of a status reply; an error status surfaces as `Remote`
    pub fn as_status(&self) -> Result<&'a str> {
        match self.node() {
            Node::Status(span) => std::str::from_utf8(self.bytes(span))
                .map_err(|_| RespError::Protocol("status line is not valid UTF-8".to_string())),
            _ => Err(self.mismatch(ReplyKind::Status)),
        }
    }

    pub fn as_array(&self) -> Result<Elements<'a>> {
        match self.value() {
            RawReply::Array(Some(elements)) => Ok(elements),
            _ => Err(self.mismatch(ReplyKind::Array)),
        }
    }

    /// Array of bulk strings; fails on the first element that is not one
    pub fn as_string_array(&self) -> Result<Vec<String>> {
        self.as_array()?.iter().map(|e| e.as_string()).collect()
    }
}

impl PartialEq for ReplyRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}

impl fmt::Debug for ReplyRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.value(), f)
    }
}

// =============================================================================
// RawReply (tagged view)
// =============================================================================

/// The closed set of reply variants
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawReply<'a> {
    /// `+<line>`
    Status(&'a [u8]),
    /// `-<line>`, a status tagged as an error
    Error(&'a [u8]),
    /// `:<integer>`
    Integer(i64),
    /// `$<len>` payload, `None` for `$-1`
    BulkString(Option<&'a [u8]>),
    /// `*<count>` elements, `None` for `*-1`
    Array(Option<Elements<'a>>),
}

/// Elements of an array reply, borrowed from the top-level reply
#[derive(Clone, Copy)]
pub struct Elements<'a> {
    reply: &'a Reply,
    ids: &'a [usize],
}

impl<'a> Elements<'a> {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<ReplyRef<'a>> {
        let reply = self.reply;
        self.ids.get(i).map(|&index| ReplyRef { reply, index })
    }

    pub fn iter(&self) -> ElementsIter<'a> {
        ElementsIter {
            reply: self.reply,
            ids: self.ids.iter(),
        }
    }
}

impl<'a> IntoIterator for Elements<'a> {
    type Item = ReplyRef<'a>;
    type IntoIter = ElementsIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the elements of an array reply
pub struct ElementsIter<'a> {
    reply: &'a Reply,
    ids: std::slice::Iter<'a, usize>,
}

impl<'a> Iterator for ElementsIter<'a> {
    type Item = ReplyRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let reply = self.reply;
        self.ids.next().map(|&index| ReplyRef { reply, index })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl ExactSizeIterator for ElementsIter<'_> {}

impl PartialEq for Elements<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Debug for Elements<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// =============================================================================
// Typed conversion
// =============================================================================

/// Text of a successful status reply (`+OK`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status(pub String);

/// Conversion from a reply handle into a concrete Rust type
pub trait FromReply: Sized {
    fn from_reply(reply: ReplyRef<'_>) -> Result<Self>;
}

impl FromReply for i64 {
    fn from_reply(reply: ReplyRef<'_>) -> Result<Self> {
        reply.as_integer()
    }
}

impl FromReply for bool {
    fn from_reply(reply: ReplyRef<'_>) -> Result<Self> {
        Ok(reply.as_integer()? != 0)
    }
}

impl FromReply for String {
    fn from_reply(reply: ReplyRef<'_>) -> Result<Self> {
        reply.as_string()
    }
}

impl FromReply for Vec<u8> {
    fn from_reply(reply: ReplyRef<'_>) -> Result<Self> {
        reply.as_bytes().map(<[u8]>::to_vec)
    }
}

impl FromReply for Vec<String> {
    fn from_reply(reply: ReplyRef<'_>) -> Result<Self> {
        reply.as_string_array()
    }
}

impl FromReply for Status {
    fn from_reply(reply: ReplyRef<'_>) -> Result<Self> {
        reply.as_status().map(|s| Status(s.to_string()))
    }
}

/// Flat `[field, value, field, value, ...]` arrays, as returned by HGETALL
impl FromReply for HashMap<String, String> {
    fn from_reply(reply: ReplyRef<'_>) -> Result<Self> {
        let flat = reply.as_string_array()?;
        if flat.len() % 2 != 0 {
            return Err(RespError::Protocol(format!(
                "expected an even number of elements, got {}",
                flat.len()
            )));
        }
        let mut map = HashMap::with_capacity(flat.len() / 2);
        let mut it = flat.into_iter();
        while let (Some(k), Some(v)) = (it.next(), it.next()) {
            map.insert(k, v);
        }
        Ok(map)
    }
}

impl<T: FromReply> FromReply for Option<T> {
    fn from_reply(reply: ReplyRef<'_>) -> Result<Self> {
        if reply.is_nil() {
            Ok(None)
        } else {
            T::from_reply(reply).map(Some)
        }
    }
}
