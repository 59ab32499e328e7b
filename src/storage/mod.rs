//! Storage Engine Module
//!
//! This module provides the core storage functionality: a thread-safe key
//! space of typed values with per-key deadlines, and a background reaper
//! that evicts expired keys.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │   RwLock ─► entries: HashMap<String, Entry>                 │
//! │             expiries: ExpiryQueue (min-heap by deadline)    │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ remove_expired(now)
//!              ┌─────────────┴─────────────┐
//!              │       ExpiryReaper        │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use linekv::storage::{unix_now, StorageEngine, Value};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(StorageEngine::new());
//!
//! engine.set("name", Some(Value::from("Ariz")));
//! assert_eq!(engine.get("name"), Some(Value::from("Ariz")));
//!
//! engine.set_expire("name", unix_now() + 3600);
//! assert_eq!(engine.size(), (1, 1));
//! ```

pub mod engine;
pub mod expiry;
pub mod queue;

pub use engine::{unix_now, Entry, StorageEngine, Value};
pub use expiry::{ExpiryConfig, ExpiryReaper, DEFAULT_EXPIRE_INTERVAL};
pub use queue::{ExpiryId, ExpiryQueue};
