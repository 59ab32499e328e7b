//! # linekv - An In-Memory Key-Value Store
//!
//! linekv keeps strings, lists and hashes in memory and serves them over a
//! small length-prefixed TCP protocol. Keys can carry a deadline, and write
//! commands can be recorded to an append-only log that is replayed on
//! startup.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              linekv                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │──> CommandLogger │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │    (write task)  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │   Frame     │    │              StorageEngine                   │    │
//! │  │   Parser    │    │   RwLock { entries, expiry min-heap }        │    │
//! │  └─────────────┘    └──────────────────────────────────────────────┘    │
//! │                                               ▲                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │           ExpiryReaper                          │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use linekv::commands::CommandHandler;
//! use linekv::connection::{handle_connection, ConnectionStats};
//! use linekv::storage::{ExpiryConfig, ExpiryReaper, StorageEngine};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = Arc::new(StorageEngine::new());
//!     let _reaper = ExpiryReaper::start(Arc::clone(&storage), ExpiryConfig::default());
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:9000").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let handler = CommandHandler::new(Arc::clone(&storage));
//!         tokio::spawn(handle_connection(stream, addr, handler, Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: request/response framing and the incremental parser
//! - [`storage`]: the key space, its expiry queue and the expiry reaper
//! - [`commands`]: the command table and per-type handlers
//! - [`cmdlog`]: the append-only command log
//! - [`connection`]: client connection management
//! - [`config`]: command-line configuration
//!
//! ## Lazy + Active Expiry
//!
//! Keys with a deadline are expired in two ways:
//! 1. **Lazy**: when a key is accessed, its deadline is checked first
//! 2. **Active**: a background task periodically drains due deadlines
//!
//! Both go through the same eviction check inside the engine.

pub mod cmdlog;
pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use cmdlog::{CmdlogError, CommandLog, CommandLogger};
pub use commands::{CommandError, CommandHandler};
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ParseError, Request, Response};
pub use storage::{ExpiryConfig, ExpiryReaper, StorageEngine, Value};

/// The default listen address: all interfaces, port 9000
pub const DEFAULT_ADDR: &str = "0.0.0.0:9000";

/// Version of linekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
