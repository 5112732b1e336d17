//! Keyspace commands

use std::io::{Read, Write};
use std::time::{Duration, SystemTime};

use crate::error::Result;
use crate::network::Connection;
use crate::protocol::{Arg, Command, TimeUnit};

/// Delete keys, returning how many existed
pub fn del<T, I>(conn: &mut Connection<T>, keys: I) -> Result<i64>
where
    T: Read + Write,
    I: IntoIterator,
    I::Item: Into<Arg>,
{
    conn.query(&Command::of("DEL", keys))
}

pub fn exists<T: Read + Write>(conn: &mut Connection<T>, key: impl Into<Arg>) -> Result<bool> {
    conn.query(&Command::new("EXISTS").arg(key))
}

/// Set a time to live with second precision
pub fn expire<T: Read + Write>(
    conn: &mut Connection<T>,
    key: impl Into<Arg>,
    ttl: Duration,
) -> Result<bool> {
    conn.query(&Command::new("EXPIRE").arg(key).duration(ttl, TimeUnit::Seconds))
}

/// Set a time to live with millisecond precision
pub fn pexpire<T: Read + Write>(
    conn: &mut Connection<T>,
    key: impl Into<Arg>,
    ttl: Duration,
) -> Result<bool> {
    conn.query(&Command::new("PEXPIRE").arg(key).duration(ttl, TimeUnit::Milliseconds))
}

pub fn expire_at<T: Read + Write>(
    conn: &mut Connection<T>,
    key: impl Into<Arg>,
    at: SystemTime,
) -> Result<bool> {
    conn.query(&Command::new("EXPIREAT").arg(key).timestamp(at, TimeUnit::Seconds))
}

pub fn pexpire_at<T: Read + Write>(
    conn: &mut Connection<T>,
    key: impl Into<Arg>,
    at: SystemTime,
) -> Result<bool> {
    conn.query(&Command::new("PEXPIREAT").arg(key).timestamp(at, TimeUnit::Milliseconds))
}

/// Remove the time to live of a key
pub fn persist<T: Read + Write>(conn: &mut Connection<T>, key: impl Into<Arg>) -> Result<bool> {
    conn.query(&Command::new("PERSIST").arg(key))
}

/// Remaining time to live, `None` when the key is missing or has no expiry
pub fn ttl<T: Read + Write>(conn: &mut Connection<T>, key: impl Into<Arg>) -> Result<Option<Duration>> {
    let secs: i64 = conn.query(&Command::new("TTL").arg(key))?;
    Ok((secs >= 0).then(|| Duration::from_secs(secs as u64)))
}

pub fn pttl<T: Read + Write>(conn: &mut Connection<T>, key: impl Into<Arg>) -> Result<Option<Duration>> {
    let ms: i64 = conn.query(&Command::new("PTTL").arg(key))?;
    Ok((ms >= 0).then(|| Duration::from_millis(ms as u64)))
}

/// Keys matching a glob-style pattern
pub fn keys<T: Read + Write>(conn: &mut Connection<T>, pattern: impl Into<Arg>) -> Result<Vec<String>> {
    conn.query(&Command::new("KEYS").arg(pattern))
}
