//! # resplink
//!
//! A typed client layer for the RESP wire protocol with:
//! - Arena-backed replies whose nested elements borrow their parent's buffer
//! - Blocking connections that poison themselves on transport failure
//! - Pipelines that never leave replies unread
//! - A non-blocking connection driven by an external reactor
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Application / commands::*                    │
//! └──────────┬──────────────────┬──────────────────┬────────────┘
//!            │                  │                  │
//!            ▼                  ▼                  ▼
//!   ┌──────────────┐   ┌──────────────┐   ┌─────────────────┐
//!   │  Connection  │◀──│   Pipeline   │   │ AsyncConnection │◀── Reactor
//!   │  (blocking)  │   │  (borrows)   │   │  (callbacks)    │    callbacks
//!   └──────┬───────┘   └──────────────┘   └────────┬────────┘
//!          │                                       │
//!          └──────────────────┬────────────────────┘
//!                             ▼
//!                  ┌─────────────────────┐
//!                  │      Protocol       │
//!                  │ Command · Codec ·   │
//!                  │ Reply               │
//!                  └─────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod commands;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{RespError, Result};
pub use config::Config;
pub use network::{AsyncConnection, Connection, Pipeline};
pub use protocol::{Command, Reply};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of resplink
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
