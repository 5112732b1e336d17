//! String commands

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;
use crate::network::Connection;
use crate::protocol::{Arg, Command, Status, TimeUnit};

/// Value of a key, `None` when it does not exist
pub fn get<T: Read + Write>(conn: &mut Connection<T>, key: impl Into<Arg>) -> Result<Option<String>> {
    conn.query(&Command::new("GET").arg(key))
}

pub fn set<T: Read + Write>(
    conn: &mut Connection<T>,
    key: impl Into<Arg>,
    value: impl Into<Arg>,
) -> Result<Status> {
    conn.query(&Command::new("SET").arg(key).arg(value))
}

/// SET with an expiry in seconds (`EX`)
pub fn set_ex<T: Read + Write>(
    conn: &mut Connection<T>,
    key: impl Into<Arg>,
    value: impl Into<Arg>,
    ttl: Duration,
) -> Result<Status> {
    let cmd = Command::new("SET")
        .arg(key)
        .arg(value)
        .arg("EX")
        .duration(ttl, TimeUnit::Seconds);
    conn.query(&cmd)
}

/// SET with an expiry in milliseconds (`PX`)
pub fn set_px<T: Read + Write>(
    conn: &mut Connection<T>,
    key: impl Into<Arg>,
    value: impl Into<Arg>,
    ttl: Duration,
) -> Result<Status> {
    let cmd = Command::new("SET")
        .arg(key)
        .arg(value)
        .arg("PX")
        .duration(ttl, TimeUnit::Milliseconds);
    conn.query(&cmd)
}

pub fn incr_by<T: Read + Write>(
    conn: &mut Connection<T>,
    key: impl Into<Arg>,
    delta: i64,
) -> Result<i64> {
    conn.query(&Command::new("INCRBY").arg(key).arg(delta))
}
