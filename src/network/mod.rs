//! Network Module
//!
//! Client sessions over a byte-stream transport.
//!
//! ## Architecture
//! - `Connection`: blocking, one round-trip per `send`
//! - `Pipeline`: many commands per round-trip on a borrowed `Connection`
//! - `AsyncConnection`: non-blocking, driven by an external `Reactor`
//!
//! Replies on one connection always arrive in the order their commands were
//! sent; nothing here correlates replies by id.

mod async_connection;
mod connection;
mod pipeline;
mod reactor;

pub use async_connection::{AsyncConnection, AsyncSender, AsyncState, AsyncTransport};
pub use connection::{Connection, SessionState};
pub use pipeline::Pipeline;
pub use reactor::{Interest, Reactor, Token};
