//! Thread-Safe Storage Engine with Expiry Support
//!
//! This module implements the core storage engine. It holds typed values
//! (strings, lists and hashes) under string keys, with an optional deadline
//! per key.
//!
//! ## Design Decisions
//!
//! 1. **One Lock**: The key space and the expiry queue sit behind a single
//!    `RwLock`, so a key and its deadline always change together.
//! 2. **Lazy Expiry**: Every access re-checks the deadline of the key it
//!    touches and evicts it if it has passed.
//! 3. **Active Expiry**: The reaper calls [`StorageEngine::remove_expired`],
//!    which pops due deadlines off the queue. Both paths go through the same
//!    `evict_if_expired` check.
//! 4. **No Empty Collections**: A list or hash that becomes empty is removed
//!    together with its deadline.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │                RwLock<Keyspace>                             │
//! │   ┌──────────────────────────┐   ┌──────────────────────┐   │
//! │   │ entries                  │   │ expiries             │   │
//! │   │ HashMap<String, Entry>   │──►│ ExpiryQueue          │   │
//! │   │  Entry.expiry: ExpiryId  │   │ (min-heap, by time)  │   │
//! │   └──────────────────────────┘   └──────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads take the lock shared and only upgrade to exclusive when the key
//! they touch turns out to be expired.

use crate::storage::queue::{ExpiryId, ExpiryQueue};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in whole unix seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// A stored value.
///
/// Serializes to the matching JSON shape: a string, an array or an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    List(VecDeque<String>),
    Hash(HashMap<String, String>),
}

impl Value {
    /// True for a list or hash with no elements. Strings are never empty
    /// collections, even when they are the empty string.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Value::Str(_) => false,
            Value::List(list) => list.is_empty(),
            Value::Hash(hash) => hash.is_empty(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// One stored value plus its optional deadline.
#[derive(Debug)]
pub struct Entry {
    pub value: Value,
    /// Handle of this key's node in the expiry queue
    expiry: Option<ExpiryId>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expiry: None,
        }
    }
}

/// The key space and its expiry queue, always mutated together.
#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
    expiries: ExpiryQueue,
}

impl Keyspace {
    fn deadline(&self, key: &str) -> Option<i64> {
        let id = self.entries.get(key)?.expiry?;
        self.expiries.deadline(id)
    }

    /// Inclusive: an entry whose deadline equals `now` is already gone.
    fn is_expired(&self, key: &str, now: i64) -> bool {
        self.deadline(key).is_some_and(|deadline| deadline <= now)
    }

    /// The single eviction primitive, shared by lazy and active expiry.
    fn evict_if_expired(&mut self, key: &str, now: i64) -> bool {
        if self.is_expired(key, now) {
            self.remove(key);
            true
        } else {
            false
        }
    }

    /// Removes an entry and its expiry node.
    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        if let Some(id) = entry.expiry {
            self.expiries.remove(id);
        }
        Some(entry)
    }

    /// Attaches or moves the deadline of an existing key.
    fn set_deadline(&mut self, key: &str, deadline: i64) -> bool {
        let current = match self.entries.get(key) {
            Some(entry) => entry.expiry,
            None => return false,
        };

        match current {
            Some(id) => {
                self.expiries.update(id, deadline);
            }
            None => {
                let id = self.expiries.insert(key, deadline);
                if let Some(entry) = self.entries.get_mut(key) {
                    entry.expiry = Some(id);
                }
            }
        }
        true
    }
}

/// The main storage engine.
///
/// Wrap it in an `Arc` and share it across connection tasks, the expiry
/// reaper and the command log replay. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use linekv::storage::{unix_now, StorageEngine, Value};
///
/// let engine = StorageEngine::new();
///
/// engine.set("name", Some(Value::from("Ariz")));
/// assert_eq!(engine.get("name"), Some(Value::from("Ariz")));
///
/// // A deadline in the past evicts the key right away
/// engine.set_expire("name", unix_now() - 1);
/// assert!(!engine.exists("name"));
/// ```
#[derive(Debug, Default)]
pub struct StorageEngine {
    inner: RwLock<Keyspace>,
}

impl StorageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning is ignored. The worst a panicking `update` closure leaves
    // behind is an expiry node with no entry, which `remove_expired` drops.
    fn read_guard(&self) -> RwLockReadGuard<'_, Keyspace> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Keyspace> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a value with no deadline, replacing the previous entry and
    /// dropping any deadline it had.
    ///
    /// Passing `None` deletes the key instead and returns `false`, so the
    /// caller does not treat it as a write.
    pub fn set(&self, key: impl Into<String>, value: Option<Value>) -> bool {
        let key = key.into();
        let Some(value) = value else {
            self.del(&key);
            return false;
        };

        let mut inner = self.write_guard();
        inner.remove(&key);
        inner.entries.insert(key, Entry::new(value));
        true
    }

    /// Stores a value and its deadline under one lock.
    pub fn set_with_deadline(&self, key: impl Into<String>, value: Value, deadline: i64) {
        let key = key.into();
        let now = unix_now();

        let mut inner = self.write_guard();
        inner.remove(&key);
        inner.entries.insert(key.clone(), Entry::new(value));
        inner.set_deadline(&key, deadline);
        inner.evict_if_expired(&key, now);
    }

    /// Returns a copy of the value, or `None` if the key is absent or expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read(key, |value| value.cloned())
    }

    /// Runs `f` against the current value of `key` under the shared lock.
    ///
    /// If the key is expired, the lock is upgraded to evict it first and `f`
    /// sees `None`.
    pub fn read<R>(&self, key: &str, f: impl FnOnce(Option<&Value>) -> R) -> R {
        let now = unix_now();

        {
            let inner = self.read_guard();
            if !inner.is_expired(key, now) {
                return f(inner.entries.get(key).map(|entry| &entry.value));
            }
        }

        // Expired - need the write lock to remove it
        let mut inner = self.write_guard();
        inner.evict_if_expired(key, now);
        f(inner.entries.get(key).map(|entry| &entry.value))
    }

    /// Runs `f` against the value slot of `key` under the exclusive lock.
    ///
    /// `f` may fill, modify or clear the slot. The key keeps its deadline
    /// if it had one. A slot left as `None`, or holding an empty list or
    /// hash, removes the key and its deadline.
    pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut Option<Value>) -> R) -> R {
        let now = unix_now();
        let mut inner = self.write_guard();
        inner.evict_if_expired(key, now);

        let (owned_key, mut slot, expiry) = match inner.entries.remove_entry(key) {
            Some((k, entry)) => (k, Some(entry.value), entry.expiry),
            None => (key.to_string(), None, None),
        };

        let result = f(&mut slot);

        match slot {
            Some(value) if !value.is_empty_collection() => {
                inner.entries.insert(owned_key, Entry { value, expiry });
            }
            _ => {
                if let Some(id) = expiry {
                    inner.expiries.remove(id);
                }
            }
        }

        result
    }

    /// Deletes a key and its deadline.
    ///
    /// Returns `true` if the key existed. Deleting an absent key is a no-op.
    pub fn del(&self, key: &str) -> bool {
        self.write_guard().remove(key).is_some()
    }

    /// Checks whether a live value is stored under `key`.
    pub fn exists(&self, key: &str) -> bool {
        self.read(key, |value| value.is_some())
    }

    /// Attaches or moves the deadline (absolute unix seconds) of an
    /// existing key.
    ///
    /// Returns `false` and does nothing if the key does not exist. The key
    /// is re-checked right after, so a deadline in the past removes it.
    pub fn set_expire(&self, key: &str, deadline: i64) -> bool {
        let now = unix_now();
        let mut inner = self.write_guard();

        inner.evict_if_expired(key, now);
        if !inner.set_deadline(key, deadline) {
            return false;
        }
        inner.evict_if_expired(key, now);
        true
    }

    /// Deadline of a key, if it has one. Does not evict.
    pub fn deadline(&self, key: &str) -> Option<i64> {
        self.read_guard().deadline(key)
    }

    /// Removes every entry whose deadline is at or before `now`.
    ///
    /// Called by the expiry reaper. Returns the number of evicted keys.
    pub fn remove_expired(&self, now: i64) -> usize {
        let mut inner = self.write_guard();
        let mut removed = 0;

        while let Some((_, key, deadline)) = inner.expiries.peek() {
            if deadline > now {
                break;
            }

            let key = key.to_string();
            if inner.evict_if_expired(&key, now) {
                removed += 1;
            } else {
                // No entry owns this node any more
                inner.expiries.pop();
            }
        }

        removed
    }

    /// `(entries, deadlines)` snapshot.
    pub fn size(&self) -> (usize, usize) {
        let inner = self.read_guard();
        (inner.entries.len(), inner.expiries.len())
    }

    pub fn len(&self) -> usize {
        self.read_guard().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every key currently held.
    ///
    /// Keys that have expired but were not yet evicted are still listed.
    pub fn keys(&self) -> Vec<String> {
        self.read_guard().entries.keys().cloned().collect()
    }

    /// Full snapshot of the store as JSON: every value and every deadline.
    pub fn dump(&self) -> serde_json::Value {
        let inner = self.read_guard();

        let entries: serde_json::Map<String, serde_json::Value> = inner
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), serde_json::json!(entry.value)))
            .collect();

        let expiries: serde_json::Map<String, serde_json::Value> = inner
            .expiries
            .iter()
            .map(|(key, deadline)| (key.to_string(), deadline.into()))
            .collect();

        serde_json::json!({
            "entries": entries,
            "expiries": expiries,
        })
    }
}
