//! Command Wrappers
//!
//! Typed one-line wrappers over [`Connection::query`](crate::network::Connection::query),
//! grouped the way the server documentation groups them. Each one only names
//! the command, renders its arguments and picks the reply projection.
//!
//! ```no_run
//! use resplink::commands::{key, string};
//! use resplink::network::Connection;
//! use std::time::Duration;
//!
//! let mut conn = Connection::connect("127.0.0.1:6379")?;
//! string::set(&mut conn, "greeting", "hello")?;
//! key::expire(&mut conn, "greeting", Duration::from_secs(60))?;
//! assert_eq!(string::get(&mut conn, "greeting")?, Some("hello".to_string()));
//! # Ok::<(), resplink::RespError>(())
//! ```

pub mod connection;
pub mod hash;
pub mod key;
pub mod set;
pub mod string;
