//! Command Dispatcher
//!
//! This module maps command names to their handlers and runs them against
//! the storage engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │   lookup()  │───>│  dispatch() │───>│  execute()  │      │
//! │  └─────────────┘    └──────┬──────┘    └─────────────┘      │
//! │                            │                                │
//! │              ┌─────────────┴─────────────┐                  │
//! │              ▼                           ▼                  │
//! │        StorageEngine              CommandLogger             │
//! │                               (write commands, on success)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every handler validates its arguments before touching storage, so a
//! failed command never leaves a partial write behind, and is never logged.

use crate::cmdlog::CommandLogger;
use crate::commands::{hash, keys, list, string};
use crate::protocol::{Request, Response};
use crate::storage::StorageEngine;
use std::ops::RangeBounds;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, trace};

/// Errors a command can fail with.
///
/// The `Display` text is sent back as the single value of the ERR response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    /// An argument that must be an integer is not one
    #[error("ERR value '{0}' is not an integer or out of range")]
    BadArgument(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR index out of range")]
    OutOfRange,

    #[error("ERR no such key or list is empty")]
    ListEmpty,

    #[error("ERR no such key or hash is empty")]
    HashEmpty,
}

/// Result of running a command: its JSON encoded result on success.
pub type CommandResult = Result<serde_json::Value, CommandError>;

/// Signature shared by every command handler.
pub type CommandFn = fn(&StorageEngine, &[String]) -> CommandResult;

/// One entry of the command table.
#[derive(Clone, Copy)]
pub struct Command {
    /// Upper-case command name
    pub name: &'static str,
    pub run: CommandFn,
    /// Mutates storage, and is recorded in the command log on success
    pub write: bool,
}

const fn read(name: &'static str, run: CommandFn) -> Command {
    Command {
        name,
        run,
        write: false,
    }
}

const fn write(name: &'static str, run: CommandFn) -> Command {
    Command {
        name,
        run,
        write: true,
    }
}

/// Every supported command.
pub static COMMANDS: &[Command] = &[
    // String commands
    write("SET", string::cmd_set),
    read("GET", string::cmd_get),
    // Key commands
    write("DEL", keys::cmd_del),
    read("EXISTS", keys::cmd_exists),
    write("EXPIRE", keys::cmd_expire),
    read("KEYS", keys::cmd_keys),
    // List commands
    write("LPUSH", list::cmd_lpush),
    write("RPUSH", list::cmd_rpush),
    read("LLEN", list::cmd_llen),
    read("LINDEX", list::cmd_lindex),
    read("LRANGE", list::cmd_lrange),
    write("LSET", list::cmd_lset),
    write("LPOP", list::cmd_lpop),
    write("RPOP", list::cmd_rpop),
    // Hash commands
    write("HSET", hash::cmd_hset),
    read("HGET", hash::cmd_hget),
    read("HGETALL", hash::cmd_hgetall),
    read("HEXISTS", hash::cmd_hexists),
    read("HVALS", hash::cmd_hvals),
    write("HDEL", hash::cmd_hdel),
    read("HKEYS", hash::cmd_hkeys),
    read("HLEN", hash::cmd_hlen),
    // Server commands
    read("INFO", keys::cmd_info),
    read("PING", keys::cmd_ping),
];

/// Finds a command by name, ignoring case.
pub fn lookup(name: &str) -> Option<&'static Command> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

/// Runs requests against the storage engine.
///
/// Cheap to clone: one handler is created per connection.
#[derive(Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
    /// Where successful write commands are recorded, if logging is enabled
    logger: Option<CommandLogger>,
}

impl CommandHandler {
    /// Creates a handler that records nothing.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self {
            storage,
            logger: None,
        }
    }

    /// Creates a handler that records successful write commands to `logger`.
    pub fn with_logger(storage: Arc<StorageEngine>, logger: Option<CommandLogger>) -> Self {
        Self { storage, logger }
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Runs a request and returns its JSON result.
    ///
    /// A write command that succeeds is forwarded to the command log exactly
    /// once, after the storage lock has been released.
    pub fn dispatch(&self, request: &Request) -> CommandResult {
        let command = lookup(&request.command)
            .ok_or_else(|| CommandError::UnknownCommand(request.command.clone()))?;

        let result = (command.run)(&self.storage, &request.args)?;
        trace!(command = command.name, "Command executed");

        if command.write {
            if let Some(logger) = &self.logger {
                if let Err(e) = logger.record(request) {
                    error!(command = command.name, error = %e, "Failed to record command");
                }
            }
        }

        Ok(result)
    }

    /// Runs a request and wraps the outcome in a response.
    ///
    /// Success carries the JSON encoded result, failure the error message.
    pub fn execute(&self, request: &Request) -> Response {
        match self.dispatch(request) {
            Ok(value) => Response::ok(value.to_string()),
            Err(e) => Response::error(e.to_string()),
        }
    }
}

/// Checks the argument count of `command`.
pub(crate) fn expect_args(
    command: &str,
    args: &[String],
    count: impl RangeBounds<usize>,
) -> Result<(), CommandError> {
    if count.contains(&args.len()) {
        Ok(())
    } else {
        Err(CommandError::WrongArity(command.to_string()))
    }
}

/// Parses an integer argument.
pub(crate) fn parse_int(arg: &str) -> Result<i64, CommandError> {
    arg.trim()
        .parse()
        .map_err(|_| CommandError::BadArgument(arg.to_string()))
}

/// Builds an owned argument list.
#[cfg(test)]
pub(crate) fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
