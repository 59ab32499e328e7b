//! Key and server commands: `DEL`, `EXISTS`, `EXPIRE`, `KEYS`, `INFO`, `PING`.

use crate::commands::handler::{expect_args, parse_int, CommandResult};
use crate::storage::{unix_now, StorageEngine};
use serde_json::json;

/// DEL key
pub(crate) fn cmd_del(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("DEL", args, 1..=1)?;
    Ok(json!(storage.del(&args[0]) as i64))
}

/// EXISTS key
pub(crate) fn cmd_exists(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("EXISTS", args, 1..=1)?;
    Ok(json!(storage.exists(&args[0])))
}

/// EXPIRE key seconds
///
/// A non-positive number of seconds removes the key right away.
pub(crate) fn cmd_expire(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("EXPIRE", args, 2..=2)?;
    let seconds = parse_int(&args[1])?;

    let deadline = unix_now().saturating_add(seconds);
    Ok(json!(storage.set_expire(&args[0], deadline) as i64))
}

/// KEYS
///
/// Lists every key held, including expired keys the reaper has not
/// removed yet.
pub(crate) fn cmd_keys(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("KEYS", args, 0..=0)?;
    Ok(json!(storage.keys()))
}

/// INFO [summary]
pub(crate) fn cmd_info(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("INFO", args, 0..=1)?;

    match args.first() {
        Some(section) if section.eq_ignore_ascii_case("summary") => {
            let (keys, expiries) = storage.size();
            Ok(json!(format!(
                "Number of Keys: {}\nNumber of Expiries: {}",
                keys, expiries
            )))
        }
        _ => Ok(storage.dump()),
    }
}

/// PING
pub(crate) fn cmd_ping(_storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("PING", args, 0..=0)?;
    Ok(json!("PONG"))
}
