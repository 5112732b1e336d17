//! Connection commands

use std::io::{Read, Write};

use crate::error::Result;
use crate::network::Connection;
use crate::protocol::{Arg, Command, Status};

pub fn ping<T: Read + Write>(conn: &mut Connection<T>) -> Result<Status> {
    conn.query(&Command::new("PING"))
}

pub fn echo<T: Read + Write>(conn: &mut Connection<T>, message: impl Into<Arg>) -> Result<String> {
    conn.query(&Command::new("ECHO").arg(message))
}

/// Switch the logical database
pub fn select<T: Read + Write>(conn: &mut Connection<T>, db: u32) -> Result<Status> {
    conn.query(&Command::new("SELECT").arg(db))
}
