//! Background Expiry Reaper
//!
//! This module implements a background task that periodically removes keys
//! whose deadline has passed. This is "active expiry", as opposed to the
//! "lazy expiry" every engine access performs on the key it touches.
//!
//! Lazy expiry alone never frees a key that is not read again. The reaper
//! wakes up on a fixed interval and drains every due deadline from the
//! expiry queue, so the cost of a sweep is proportional to the number of
//! keys it actually evicts.

use crate::storage::engine::unix_now;
use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Default interval between sweeps
pub const DEFAULT_EXPIRE_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for the expiry reaper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval between sweeps (default: 5s)
    pub interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_EXPIRE_INTERVAL,
        }
    }
}

/// A handle to the running expiry reaper.
///
/// When this handle is dropped, the reaper task is stopped.
#[derive(Debug)]
pub struct ExpiryReaper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpiryReaper {
    /// Starts the reaper as a background task on the current runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use linekv::storage::{ExpiryConfig, ExpiryReaper, StorageEngine};
    /// use std::sync::Arc;
    ///
    /// let engine = Arc::new(StorageEngine::new());
    /// let reaper = ExpiryReaper::start(engine, ExpiryConfig::default());
    ///
    /// // Dropping the handle stops the task
    /// drop(reaper);
    /// ```
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(reaper_loop(engine, config.interval, shutdown_rx));

        info!(interval_ms = config.interval.as_millis() as u64, "Expiry reaper started");

        Self { shutdown_tx }
    }

    /// Stops the reaper. Called automatically on drop.
    pub fn stop(&self) {
        // Already stopped if the task has exited
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ExpiryReaper {
    fn drop(&mut self) {
        self.stop();
        info!("Expiry reaper stopped");
    }
}

async fn reaper_loop(
    engine: Arc<StorageEngine>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry reaper received shutdown signal");
                    return;
                }
            }
        }

        let expired = engine.remove_expired(unix_now());
        if expired > 0 {
            let (keys, expiries) = engine.size();
            debug!(
                expired = expired,
                keys_remaining = keys,
                expiries_remaining = expiries,
                "Expired keys removed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Value;

    fn fast() -> ExpiryConfig {
        ExpiryConfig {
            interval: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_reaper_removes_expired_keys() {
        let engine = Arc::new(StorageEngine::new());
        let deadline = unix_now() + 2;

        for i in 0..10 {
            let key = format!("key{}", i);
            engine.set(key.clone(), Some(Value::from("value")));
            engine.set_expire(&key, deadline);
        }
        engine.set("persistent", Some(Value::from("value")));
        assert_eq!(engine.size(), (11, 10));

        let _reaper = ExpiryReaper::start(Arc::clone(&engine), fast());

        // Deadlines have one second granularity
        tokio::time::sleep(Duration::from_millis(3200)).await;

        // Removed without any access to the keys
        assert_eq!(engine.size(), (1, 0));
        assert_eq!(engine.keys(), vec!["persistent".to_string()]);
    }

    #[tokio::test]
    async fn test_reaper_stops_on_drop() {
        let engine = Arc::new(StorageEngine::new());

        {
            let _reaper = ExpiryReaper::start(Arc::clone(&engine), fast());
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        engine.set("key", Some(Value::from("value")));
        engine.set_expire("key", unix_now() + 2);

        tokio::time::sleep(Duration::from_millis(3200)).await;

        // Nothing swept it, the entry is still held
        assert_eq!(engine.size(), (1, 1));

        // But a read evicts it lazily
        assert!(engine.get("key").is_none());
        assert_eq!(engine.size(), (0, 0));
    }

    #[test]
    fn test_default_interval() {
        assert_eq!(ExpiryConfig::default().interval, Duration::from_secs(5));
    }
}
