//! Hash commands.

use crate::commands::handler::{expect_args, CommandError, CommandResult};
use crate::storage::{StorageEngine, Value};
use serde_json::json;
use std::collections::HashMap;

type Hash = HashMap<String, String>;

fn as_hash(value: Option<&Value>) -> Result<Option<&Hash>, CommandError> {
    match value {
        None => Ok(None),
        Some(Value::Hash(hash)) => Ok(Some(hash)),
        Some(_) => Err(CommandError::WrongType),
    }
}

/// Like [`as_hash`], but a missing or empty hash is an error.
fn non_empty_hash(value: Option<&Value>) -> Result<&Hash, CommandError> {
    match as_hash(value)? {
        Some(hash) if !hash.is_empty() => Ok(hash),
        _ => Err(CommandError::HashEmpty),
    }
}

/// HSET key field value
pub(crate) fn cmd_hset(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("HSET", args, 3..=3)?;

    storage.update(&args[0], |slot| {
        let Value::Hash(hash) = slot.get_or_insert_with(|| Value::Hash(HashMap::new())) else {
            return Err(CommandError::WrongType);
        };

        hash.insert(args[1].clone(), args[2].clone());
        Ok(json!(1))
    })
}

/// HGET key field
pub(crate) fn cmd_hget(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("HGET", args, 2..=2)?;

    storage.read(&args[0], |value| {
        Ok(json!(as_hash(value)?.and_then(|hash| hash.get(&args[1]))))
    })
}

/// HGETALL key
pub(crate) fn cmd_hgetall(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("HGETALL", args, 1..=1)?;
    storage.read(&args[0], |value| Ok(json!(non_empty_hash(value)?)))
}

/// HKEYS key
pub(crate) fn cmd_hkeys(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("HKEYS", args, 1..=1)?;

    storage.read(&args[0], |value| {
        let keys: Vec<&String> = non_empty_hash(value)?.keys().collect();
        Ok(json!(keys))
    })
}

/// HVALS key
pub(crate) fn cmd_hvals(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("HVALS", args, 1..=1)?;

    storage.read(&args[0], |value| {
        let values: Vec<&String> = non_empty_hash(value)?.values().collect();
        Ok(json!(values))
    })
}

/// HEXISTS key field
pub(crate) fn cmd_hexists(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("HEXISTS", args, 2..=2)?;

    storage.read(&args[0], |value| {
        let found = as_hash(value)?.is_some_and(|hash| hash.contains_key(&args[1]));
        Ok(json!(found as i64))
    })
}

/// HLEN key
pub(crate) fn cmd_hlen(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("HLEN", args, 1..=1)?;
    storage.read(&args[0], |value| Ok(json!(as_hash(value)?.map_or(0, Hash::len))))
}

/// HDEL key field [field ...]
///
/// Removing the last field removes the key.
pub(crate) fn cmd_hdel(storage: &StorageEngine, args: &[String]) -> CommandResult {
    expect_args("HDEL", args, 2..)?;

    storage.update(&args[0], |slot| {
        let removed = match slot {
            None => 0,
            Some(Value::Hash(hash)) => args[1..]
                .iter()
                .filter(|field| hash.remove(field.as_str()).is_some())
                .count(),
            Some(_) => return Err(CommandError::WrongType),
        };
        Ok(json!(removed))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::handler::args;

    fn setup_hash(storage: &StorageEngine) {
        cmd_hset(storage, &args(&["user", "name", "Ariz"])).unwrap();
        cmd_hset(storage, &args(&["user", "lang", "rust"])).unwrap();
    }

    #[test]
    fn test_hset_hget() {
        let storage = StorageEngine::new();
        setup_hash(&storage);

        assert_eq!(cmd_hget(&storage, &args(&["user", "name"])), Ok(json!("Ariz")));
        assert_eq!(cmd_hget(&storage, &args(&["user", "age"])), Ok(json!(null)));
        assert_eq!(cmd_hget(&storage, &args(&["nobody", "name"])), Ok(json!(null)));

        // Overwrite
        assert_eq!(cmd_hset(&storage, &args(&["user", "name", "A"])), Ok(json!(1)));
        assert_eq!(cmd_hlen(&storage, &args(&["user"])), Ok(json!(2)));
    }

    #[test]
    fn test_hgetall_keys_vals() {
        let storage = StorageEngine::new();
        setup_hash(&storage);

        assert_eq!(
            cmd_hgetall(&storage, &args(&["user"])),
            Ok(json!({"name": "Ariz", "lang": "rust"}))
        );

        let mut keys: Vec<String> =
            serde_json::from_value(cmd_hkeys(&storage, &args(&["user"])).unwrap()).unwrap();
        keys.sort();
        assert_eq!(keys, vec!["lang", "name"]);

        let mut vals: Vec<String> =
            serde_json::from_value(cmd_hvals(&storage, &args(&["user"])).unwrap()).unwrap();
        vals.sort();
        assert_eq!(vals, vec!["Ariz", "rust"]);
    }

    #[test]
    fn test_hexists() {
        let storage = StorageEngine::new();
        setup_hash(&storage);

        assert_eq!(cmd_hexists(&storage, &args(&["user", "lang"])), Ok(json!(1)));
        assert_eq!(cmd_hexists(&storage, &args(&["user", "age"])), Ok(json!(0)));
        assert_eq!(cmd_hexists(&storage, &args(&["nobody", "x"])), Ok(json!(0)));
    }

    #[test]
    fn test_hdel_last_field_removes_key() {
        let storage = StorageEngine::new();
        setup_hash(&storage);

        assert_eq!(
            cmd_hdel(&storage, &args(&["user", "name", "missing"])),
            Ok(json!(1))
        );
        assert_eq!(cmd_hdel(&storage, &args(&["user", "lang"])), Ok(json!(1)));

        assert!(!storage.exists("user"));
        assert_eq!(cmd_hgetall(&storage, &args(&["user"])), Err(CommandError::HashEmpty));
        assert_eq!(cmd_hkeys(&storage, &args(&["user"])), Err(CommandError::HashEmpty));
        assert_eq!(cmd_hvals(&storage, &args(&["user"])), Err(CommandError::HashEmpty));
        assert_eq!(cmd_hlen(&storage, &args(&["user"])), Ok(json!(0)));
        assert_eq!(cmd_hdel(&storage, &args(&["user", "lang"])), Ok(json!(0)));
    }

    #[test]
    fn test_wrong_type() {
        let storage = StorageEngine::new();
        storage.set("str", Some(Value::from("v")));

        assert_eq!(
            cmd_hset(&storage, &args(&["str", "f", "v"])),
            Err(CommandError::WrongType)
        );
        assert_eq!(cmd_hget(&storage, &args(&["str", "f"])), Err(CommandError::WrongType));
        assert_eq!(cmd_hdel(&storage, &args(&["str", "f"])), Err(CommandError::WrongType));
        assert_eq!(storage.get("str"), Some(Value::from("v")));
    }

    #[test]
    fn test_arity() {
        let storage = StorageEngine::new();
        assert_eq!(
            cmd_hset(&storage, &args(&["h", "f"])),
            Err(CommandError::WrongArity("HSET".to_string()))
        );
        assert_eq!(
            cmd_hdel(&storage, &args(&["h"])),
            Err(CommandError::WrongArity("HDEL".to_string()))
        );
    }
}
