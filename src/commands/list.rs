//! List commands.
//!
//! Lists are created by the first push and removed as soon as their last
//! element is popped. Index arguments may be negative, counting from the
//! tail.

use crate::commands::handler::{expect_args, parse_int, CommandError, CommandResult};
use crate::storage::{StorageEngine, Value};
use serde_json::json;
use std::collections::VecDeque;

/// Borrows the list held in `value`, if any.
fn as_list(value: Option<&Value>) -> Result<Option<&VecDeque<String>>, CommandError> {
    match value {
        None => Ok(None),
        Some(Value::List(list)) => Ok(Some(list)),
        Some(_) => Err(CommandError::WrongType),
    }
}

fn as_list_mut(slot: &mut Option<Value>) -> Result<Option<&mut VecDeque<String>>, CommandError> {
    match slot {
        None => Ok(None),
        Some(Value::List(list)) => Ok(Some(list)),
        Some(_) => Err(CommandError::WrongType),
    }
}

/// Resolves a possibly negative index against `len`.
fn normalize(index: i64, len: usize) -> i64 {
    if index < 0 {
        index + len as i64
    } else {
        index
    }
}

#[derive(Clone, Copy)]
enum End {
    Head,
    Tail,
}

fn push(storage: &StorageEngine, args: &[String], command: &str, end: End) -> CommandResult {
    expect_args(command, args, 2..)?;

    storage.update(&args[0], |slot| {
        let Value::List(list) = slot.get_or_insert_with(|| Value::List(VecDeque::new())) else {
            return Err(CommandError::WrongType);
        };

        match end {
            // Keep the pushed block in argument order
            End::Head => {
                for value in args[1..].iter().rev() {
                    list.push_front(value.clone());
                }
            }
            End::Tail => list.extend(args[1..].iter().cloned()),
        }

        Ok(json!(list.len()))
    })
}

fn pop(storage: &StorageEngine, args: &[String], command: &str, end: End) -> CommandResult {
    expect_args(command, args, 1..=1)?;

    storage.update(&args[0], |slot| {
        let popped = as_list_mut(slot)?.and_then(|list| match end {
            End::Head => list.pop_front(),
            End::Tail => list.pop_back(),
        });
        Ok(json!(popped))
    })
}

/// LPUSH key value [value ...]
pub(crate) fn cmd_lpush(storage: &StorageEngine, args: &[String]) -> CommandResult {
    push(storage, args, "LPUSH", End::Head)
}

/// RPUSH key value [value ...]
pub(crate) fn cmd_rpush(storage: &StorageEngine, args: &[String]) -> CommandResult {
    push(storage, args, "RPUSH", End::Tail)
}

/// LPOP key
pub(crate) fn cmd_lpop(storage: &StorageEngine, args: &[String]) -> CommandResult {
    pop(storage, args, "LPOP", End::Head)
}

/// RPOP key
pub(crate) fn cmd_rpop(storage: &StorageEngine, args: &[String]) -> CommandResult {
    pop(storage, args, "RPOP", End::Tail)
}

/// LLEN key
pub(crate) fn cmd_llen(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("LLEN", args, 1..=1)?;

    storage.read(&args[0], |value| {
        Ok(json!(as_list(value)?.map_or(0, VecDeque::len)))
    })
}

/// LINDEX key index
pub(crate) fn cmd_lindex(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("LINDEX", args, 2..=2)?;
    let index = parse_int(&args[1])?;

    storage.read(&args[0], |value| {
        let item = as_list(value)?.and_then(|list| {
            let index = normalize(index, list.len());
            usize::try_from(index).ok().and_then(|i| list.get(i))
        });
        Ok(json!(item))
    })
}

/// LRANGE key start stop
///
/// `stop` is exclusive. Negative bounds count from the tail and clamp at the
/// head; `stop` clamps at the length.
pub(crate) fn cmd_lrange(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("LRANGE", args, 3..=3)?;
    let start = parse_int(&args[1])?;
    let stop = parse_int(&args[2])?;

    storage.read(&args[0], |value| {
        let list = match as_list(value)? {
            Some(list) if !list.is_empty() => list,
            _ => return Err(CommandError::ListEmpty),
        };

        let len = list.len() as i64;
        let start = normalize(start, list.len()).max(0);
        let stop = normalize(stop, list.len()).max(0).min(len);

        if start >= len || start > stop {
            return Err(CommandError::OutOfRange);
        }

        let range: Vec<&String> = list.range(start as usize..stop as usize).collect();
        Ok(json!(range))
    })
}

/// LSET key index value
pub(crate) fn cmd_lset(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("LSET", args, 3..=3)?;
    let index = parse_int(&args[1])?;

    storage.update(&args[0], |slot| {
        let list = as_list_mut(slot)?.ok_or(CommandError::OutOfRange)?;
        let item = usize::try_from(index)
            .ok()
            .and_then(|i| list.get_mut(i))
            .ok_or(CommandError::OutOfRange)?;

        *item = args[2].clone();
        Ok(json!(1))
    })
}
