//! Configuration loading and environment parsing.

use std::fs;
use std::path::Path;

use serde_json::Value;

use super::Config;

const ENV_PREFIX: &str = "POKER_TABLE";

/// Load configuration with the following precedence (highest first):
/// 1) File pointed to by `POKER_TABLE_CONFIG_PATH`
/// 2) `config.json` in the current working directory
/// 3) Defaults compiled into the binary
///
/// Individual fields can additionally be overridden by environment
/// variables prefixed with `POKER_TABLE` using `__` as a nested separator,
/// e.g. `POKER_TABLE__PORT=8080` or `POKER_TABLE__SERVER__WSPATH=/socket`.
/// Read/parse errors are reported to stderr and the remaining sources apply.
#[must_use]
pub fn load() -> Config {
    let defaults = Config::default();
    let mut merged =
        serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

    if let Ok(path) = std::env::var(format!("{ENV_PREFIX}_CONFIG_PATH")) {
        merge_file_source(&mut merged, Path::new(&path));
    }
    merge_file_source(&mut merged, Path::new("config.json"));

    apply_env_overrides(&mut merged);

    match serde_json::from_value::<Config>(merged) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to deserialize config; using defaults: {err}");
            defaults
        }
    }
}

fn merge_file_source(target: &mut Value, path: &Path) {
    if path.as_os_str().is_empty() || !path.exists() {
        return;
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(value) => merge_values(target, value),
            Err(err) => eprintln!("Failed to parse config from {}: {err}", path.display()),
        },
        Err(err) => eprintln!("Failed to read config from {}: {err}", path.display()),
    }
}

/// Deep-merges `source` into `target`; objects merge key-wise, everything
/// else replaces.
fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target_slot, source_value) => *target_slot = source_value,
    }
}

/// Applies `POKER_TABLE__A__B=value` overrides. Keys are matched against the
/// JSON tree case-insensitively; values parse as JSON when possible and fall
/// back to plain strings.
fn apply_env_overrides(target: &mut Value) {
    let prefix = format!("{ENV_PREFIX}__");
    for (key, raw) in std::env::vars() {
        let Some(path) = key.strip_prefix(&prefix) else {
            continue;
        };
        let segments: Vec<&str> = path.split("__").filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            continue;
        }
        let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
        set_path(target, &segments, value);
    }
}

fn set_path(target: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Value::Object(map) = target else {
        return;
    };

    // Env var names are uppercase; match existing keys case-insensitively.
    let key = map
        .keys()
        .find(|k| k.eq_ignore_ascii_case(head))
        .cloned()
        .unwrap_or_else(|| head.to_lowercase());

    if rest.is_empty() {
        map.insert(key, value);
    } else {
        let child = map.entry(key).or_insert(Value::Object(serde_json::Map::new()));
        set_path(child, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_prefers_source_scalars_and_merges_objects() {
        let mut target = json!({"port": 1, "server": {"wsPath": "/ws", "numSeats": 9}});
        merge_values(
            &mut target,
            json!({"port": 2, "server": {"wsPath": "/socket"}}),
        );

        assert_eq!(target["port"], 2);
        assert_eq!(target["server"]["wsPath"], "/socket");
        assert_eq!(target["server"]["numSeats"], 9);
    }

    #[test]
    fn set_path_matches_keys_case_insensitively() {
        let mut target = json!({"server": {"wsPath": "/ws"}});
        set_path(&mut target, &["SERVER", "WSPATH"], json!("/socket"));
        assert_eq!(target["server"]["wsPath"], "/socket");
    }

    #[test]
    fn set_path_creates_missing_branches() {
        let mut target = json!({});
        set_path(&mut target, &["LOGGING", "LEVEL"], json!("debug"));
        assert_eq!(target["logging"]["level"], "debug");
    }
}
