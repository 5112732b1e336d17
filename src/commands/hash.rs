//! Hash commands

use std::collections::HashMap;
use std::io::{Read, Write};

use crate::error::Result;
use crate::network::Connection;
use crate::protocol::{Arg, Command};

/// Set fields, returning how many were added
pub fn set<T, I, F, V>(conn: &mut Connection<T>, key: impl Into<Arg>, fields: I) -> Result<i64>
where
    T: Read + Write,
    I: IntoIterator<Item = (F, V)>,
    F: Into<Arg>,
    V: Into<Arg>,
{
    let cmd = fields
        .into_iter()
        .fold(Command::new("HSET").arg(key), |cmd, (f, v)| cmd.arg(f).arg(v));
    conn.query(&cmd)
}

pub fn get<T: Read + Write>(
    conn: &mut Connection<T>,
    key: impl Into<Arg>,
    field: impl Into<Arg>,
) -> Result<Option<String>> {
    conn.query(&Command::new("HGET").arg(key).arg(field))
}

pub fn get_all<T: Read + Write>(
    conn: &mut Connection<T>,
    key: impl Into<Arg>,
) -> Result<HashMap<String, String>> {
    conn.query(&Command::new("HGETALL").arg(key))
}
