//! Command Handler Module
//!
//! This module implements the command processing layer. It receives parsed
//! requests, executes them against the storage engine, and returns the
//! JSON encoded result.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Frame Parser   │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Lookup       │
//! │  - Validate     │
//! │  - Execute      │
//! │  - Record       │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! ### String Commands
//! - `SET key value [ttl]`, `GET key`
//!
//! ### List Commands
//! - `LPUSH`, `RPUSH`, `LPOP`, `RPOP`
//! - `LLEN`, `LINDEX`, `LRANGE`, `LSET`
//!
//! ### Hash Commands
//! - `HSET`, `HGET`, `HDEL`, `HEXISTS`, `HLEN`
//! - `HGETALL`, `HKEYS`, `HVALS`
//!
//! ### Key and Server Commands
//! - `DEL`, `EXISTS`, `EXPIRE`, `KEYS`
//! - `INFO [summary]`, `PING`

pub mod handler;

mod hash;
mod keys;
mod list;
mod string;

pub use handler::{lookup, Command, CommandError, CommandHandler, CommandResult, COMMANDS};
