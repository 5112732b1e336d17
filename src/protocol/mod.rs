//! Protocol Module
//!
//! Defines the RESP wire protocol: commands going out, replies coming back.
//!
//! ## Commands
//! Every command is a multi-bulk array of bulk strings:
//! ```text
//! *3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n
//! ```
//!
//! ## Replies
//! - `+` status
//! - `-` error status
//! - `:` integer
//! - `$` bulk string (`$-1` is nil)
//! - `*` array (`*-1` is nil)
//!
//! Nested array elements are views into the buffer of their top-level reply.
//! An error status nested inside an array does not abort decoding of the
//! array; it surfaces as a remote error only when that element is projected.

mod codec;
mod command;
mod reply;

pub use codec::{
    decode_command, decode_reply, encode_command, encode_command_into, encoded_len,
    DecodeLimits, ReplyDecoder, DEFAULT_MAX_ARRAY_LEN, DEFAULT_MAX_BULK_LEN, DEFAULT_MAX_DEPTH,
};
pub use command::{Arg, Command, TimeUnit};
pub use reply::{
    Elements, ElementsIter, FromReply, RawReply, Reply, ReplyKind, ReplyRef, Status,
};
