//! String commands: `SET`, `GET`.

use crate::commands::handler::{expect_args, parse_int, CommandError, CommandResult};
use crate::storage::{unix_now, StorageEngine, Value};
use serde_json::json;

/// SET key value [ttl_seconds]
///
/// The optional ttl is validated before anything is stored, and the value
/// and its deadline are installed together.
pub(crate) fn cmd_set(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("SET", args, 2..=3)?;

    let key = args[0].as_str();
    let value = Value::Str(args[1].clone());

    match args.get(2) {
        Some(ttl) => {
            let ttl = parse_int(ttl)?;
            storage.set_with_deadline(key, value, unix_now().saturating_add(ttl));
        }
        None => {
            storage.set(key, Some(value));
        }
    }

    Ok(json!(1))
}

/// GET key
pub(crate) fn cmd_get(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("GET", args, 1..=1)?;

    storage.read(&args[0], |value| match value {
        None => Ok(json!(null)),
        Some(Value::Str(s)) => Ok(json!(s)),
        Some(_) => Err(CommandError::WrongType),
    })
}
