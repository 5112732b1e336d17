//! Command definitions
//!
//! A command is an ordered list of binary-safe arguments, argument zero being
//! the command name. Typed inputs are rendered to their canonical wire text
//! when the command is built, so a finished `Command` is just bytes.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// Unit a duration or timestamp is expressed in on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Milliseconds,
}

/// One typed command argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Binary-safe bytes, sent as-is
    Bytes(Bytes),

    /// Signed integer, sent as decimal text
    Int(i64),

    /// Unsigned integer, sent as decimal text
    UInt(u64),

    /// Float, sent in shortest round-trip form (`+inf` / `-inf` for infinities)
    ///
    /// NaN is sent as `nan`. Servers refuse it as a float argument, so the
    /// command comes back as an error reply (`RespError::Remote` once
    /// projected) and the connection stays usable.
    Float(f64),

    /// Duration, sent as the whole count of the requested unit
    Duration(Duration, TimeUnit),

    /// Point in time, sent as decimal seconds or milliseconds since the Unix epoch
    Timestamp(SystemTime, TimeUnit),
}

impl Arg {
    /// Render the argument to its wire bytes
    pub fn encode(&self) -> Bytes {
        match self {
            Arg::Bytes(b) => b.clone(),
            Arg::Int(n) => Bytes::from(n.to_string()),
            Arg::UInt(n) => Bytes::from(n.to_string()),
            Arg::Float(f) if f.is_nan() => Bytes::from_static(b"nan"),
            Arg::Float(f) if f.is_infinite() => {
                Bytes::from_static(if *f > 0.0 { b"+inf" } else { b"-inf" })
            }
            Arg::Float(f) => Bytes::from(f.to_string()),
            Arg::Duration(d, unit) => Bytes::from(unit_count(*d, *unit).to_string()),
            Arg::Timestamp(t, unit) => {
                // Times before the epoch clamp to zero
                let since = t.duration_since(UNIX_EPOCH).unwrap_or_default();
                Bytes::from(unit_count(since, *unit).to_string())
            }
        }
    }
}

fn unit_count(d: Duration, unit: TimeUnit) -> u128 {
    match unit {
        TimeUnit::Seconds => d.as_secs() as u128,
        TimeUnit::Milliseconds => d.as_millis(),
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Bytes(Bytes::from(s))
    }
}

impl From<&String> for Arg {
    fn from(s: &String) -> Self {
        Arg::from(s.as_str())
    }
}

impl From<&[u8]> for Arg {
    fn from(b: &[u8]) -> Self {
        Arg::Bytes(Bytes::copy_from_slice(b))
    }
}

impl<const N: usize> From<&[u8; N]> for Arg {
    fn from(b: &[u8; N]) -> Self {
        Arg::Bytes(Bytes::copy_from_slice(b))
    }
}

impl From<Vec<u8>> for Arg {
    fn from(b: Vec<u8>) -> Self {
        Arg::Bytes(Bytes::from(b))
    }
}

impl From<Bytes> for Arg {
    fn from(b: Bytes) -> Self {
        Arg::Bytes(b)
    }
}

impl From<i64> for Arg {
    fn from(n: i64) -> Self {
        Arg::Int(n)
    }
}

impl From<i32> for Arg {
    fn from(n: i32) -> Self {
        Arg::Int(n as i64)
    }
}

impl From<u64> for Arg {
    fn from(n: u64) -> Self {
        Arg::UInt(n)
    }
}

impl From<u32> for Arg {
    fn from(n: u32) -> Self {
        Arg::UInt(n as u64)
    }
}

impl From<usize> for Arg {
    fn from(n: usize) -> Self {
        Arg::UInt(n as u64)
    }
}

impl From<f64> for Arg {
    fn from(f: f64) -> Self {
        Arg::Float(f)
    }
}

/// An encoded command ready for the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Bytes>,
}

impl Command {
    /// Start a command with the given name
    pub fn new(name: impl Into<Arg>) -> Self {
        Self {
            args: vec![name.into().encode()],
        }
    }

    /// Build a command from a name and a list of typed arguments
    ///
    /// ```
    /// use resplink::protocol::{Arg, Command};
    ///
    /// let cmd = Command::of("SET", [Arg::from("counter"), Arg::from(10)]);
    /// assert_eq!(cmd.args().len(), 3);
    /// ```
    pub fn of<I>(name: impl Into<Arg>, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        let mut cmd = Self::new(name);
        for arg in args {
            cmd = cmd.arg(arg);
        }
        cmd
    }

    /// Build a command from pre-split arguments; `None` if there are none
    pub fn from_args<I>(args: I) -> Option<Self>
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        let args: Vec<Bytes> = args.into_iter().map(|a| a.into().encode()).collect();
        (!args.is_empty()).then_some(Self { args })
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into().encode());
        self
    }

    /// Append a duration in the given unit
    pub fn duration(self, d: Duration, unit: TimeUnit) -> Self {
        self.arg(Arg::Duration(d, unit))
    }

    /// Append a Unix timestamp in the given unit
    pub fn timestamp(self, t: SystemTime, unit: TimeUnit) -> Self {
        self.arg(Arg::Timestamp(t, unit))
    }

    /// Command name (argument zero)
    pub fn name(&self) -> &[u8] {
        &self.args[0]
    }

    /// All arguments, name included
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", String::from_utf8_lossy(arg))?;
        }
        Ok(())
    }
}
