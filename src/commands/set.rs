//! Set commands

use std::io::{Read, Write};

use crate::error::Result;
use crate::network::Connection;
use crate::protocol::{Arg, Command};

/// Add members, returning how many were new
pub fn add<T, I>(conn: &mut Connection<T>, key: impl Into<Arg>, members: I) -> Result<i64>
where
    T: Read + Write,
    I: IntoIterator,
    I::Item: Into<Arg>,
{
    let cmd = members.into_iter().fold(Command::new("SADD").arg(key), |cmd, m| cmd.arg(m));
    conn.query(&cmd)
}

pub fn card<T: Read + Write>(conn: &mut Connection<T>, key: impl Into<Arg>) -> Result<i64> {
    conn.query(&Command::new("SCARD").arg(key))
}

pub fn rem<T, I>(conn: &mut Connection<T>, key: impl Into<Arg>, members: I) -> Result<i64>
where
    T: Read + Write,
    I: IntoIterator,
    I::Item: Into<Arg>,
{
    let cmd = members.into_iter().fold(Command::new("SREM").arg(key), |cmd, m| cmd.arg(m));
    conn.query(&cmd)
}

pub fn is_member<T: Read + Write>(
    conn: &mut Connection<T>,
    key: impl Into<Arg>,
    member: impl Into<Arg>,
) -> Result<bool> {
    conn.query(&Command::new("SISMEMBER").arg(key).arg(member))
}
