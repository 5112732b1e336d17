//! Pipeline
//!
//! Batches commands on one connection and resolves their replies in order.
//!
//! ## Flow
//! ```text
//! enqueue(C1) enqueue(C2) ... enqueue(Cn)   →  n commands on the wire
//! drain()                                   ←  [R1, R2, ..., Rn]
//! ```
//!
//! RESP answers commands on a connection strictly in the order they were
//! sent, so the i-th reply drained belongs to the i-th command enqueued.

use std::io::{Read, Write};
use std::net::TcpStream;

use crate::error::{RespError, Result};
use crate::network::Connection;
use crate::protocol::{Command, Reply};

/// A batch of commands in flight on a borrowed connection
///
/// Dropping a pipeline with replies still outstanding drains them first so
/// the connection's read side stays in step with what was sent. Errors from
/// that implicit drain have nowhere to go and are discarded.
pub struct Pipeline<'c, T: Read + Write = TcpStream> {
    conn: &'c mut Connection<T>,

    /// Commands sent whose replies have not been read
    outstanding: usize,
}

impl<'c, T: Read + Write> Pipeline<'c, T> {
    pub fn new(conn: &'c mut Connection<T>) -> Self {
        Self {
            conn,
            outstanding: 0,
        }
    }

    /// Transmit a command without waiting for its reply
    pub fn enqueue(&mut self, command: &Command) -> Result<()> {
        self.conn.append(command)?;
        self.outstanding += 1;
        Ok(())
    }

    /// Number of replies still owed by the server
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Read every outstanding reply, in submission order
    ///
    /// Slots are filled until the transport fails; the failing slot carries
    /// the error and every later slot reports `ConnectionLost`.
    pub fn drain(&mut self) -> Vec<Result<Reply>> {
        let count = std::mem::take(&mut self.outstanding);
        let mut replies = Vec::with_capacity(count);

        while replies.len() < count {
            match self.conn.drain_one() {
                Ok(reply) => replies.push(Ok(reply)),
                Err(err) => {
                    let reason = err.to_string();
                    replies.push(Err(err));
                    replies.resize_with(count, || Err(RespError::ConnectionLost(reason.clone())));
                }
            }
        }

        replies
    }

    /// Drain and fail on the first error, transport or remote
    pub fn execute(&mut self) -> Result<Vec<Reply>> {
        self.drain()
            .into_iter()
            .map(|r| r.and_then(Reply::into_result))
            .collect()
    }

    /// Drain anything outstanding, discarding errors
    pub fn close(mut self) {
        self.flush_outstanding();
    }

    fn flush_outstanding(&mut self) {
        if self.outstanding == 0 {
            return;
        }
        let pending = self.outstanding;
        for result in self.drain() {
            if let Err(e) = result {
                tracing::debug!("Discarding pipeline error on teardown ({} pending): {}", pending, e);
                break;
            }
        }
    }
}

impl<T: Read + Write> Drop for Pipeline<'_, T> {
    fn drop(&mut self) {
        self.flush_outstanding();
    }
}
