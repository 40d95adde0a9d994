//! JSON pointer edits for dockyard.json.
//!
//! `dockyard config set /settings/docker_command_template '"..."'` goes through
//! these helpers: the typed config is serialized, edited at the pointer, then
//! deserialized again so invalid edits never reach disk.

use crate::defaults::DockyardConfig;
use crate::error::{Error, Result};
use serde_json::{Map, Value};

// ============================================================================
// Typed config edits
// ============================================================================

/// Set `value` at `pointer` inside the config, creating intermediate objects.
pub fn set_config_value(config: &DockyardConfig, pointer: &str, value: Value) -> Result<DockyardConfig> {
    let mut json = to_value(config)?;
    set_json_pointer(&mut json, pointer, value)?;
    from_value(json, "set config value")
}

/// Remove the value at `pointer`. Returns the edited config and whether anything was removed.
pub fn remove_config_value(config: &DockyardConfig, pointer: &str) -> Result<(DockyardConfig, bool)> {
    let mut json = to_value(config)?;
    let removed = remove_json_pointer(&mut json, pointer)?;
    Ok((from_value(json, "remove config value")?, removed))
}

fn to_value(config: &DockyardConfig) -> Result<Value> {
    serde_json::to_value(config)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize config".to_string())))
}

fn from_value(json: Value, context: &str) -> Result<DockyardConfig> {
    serde_json::from_value(json)
        .map_err(|e| Error::validation_invalid_json(e, context))
}

// ============================================================================
// JSON Pointer Operations
// ============================================================================

pub fn set_json_pointer(root: &mut Value, pointer: &str, new_value: Value) -> Result<()> {
    let pointer = normalize_pointer(pointer)?;
    let Some((parent_ptr, token)) = split_parent_pointer(&pointer) else {
        *root = new_value;
        return Ok(());
    };

    let parent = ensure_pointer_container(root, &parent_ptr)?;
    set_child(parent, &token, new_value)
}

pub fn remove_json_pointer(root: &mut Value, pointer: &str) -> Result<bool> {
    let pointer = normalize_pointer(pointer)?;
    let Some((parent_ptr, token)) = split_parent_pointer(&pointer) else {
        return Err(Error::validation_invalid_argument(
            "pointer",
            "Cannot remove the document root",
        ));
    };

    let parent = if parent_ptr.is_empty() {
        Some(root)
    } else {
        root.pointer_mut(&parent_ptr)
    };

    match parent {
        Some(Value::Object(map)) => Ok(map.remove(&token).is_some()),
        Some(Value::Array(arr)) => {
            let index = parse_array_index(&token)?;
            if index < arr.len() {
                arr.remove(index);
                Ok(true)
            } else {
                Ok(false)
            }
        }
        _ => Ok(false),
    }
}

fn normalize_pointer(pointer: &str) -> Result<String> {
    if pointer.is_empty() {
        return Ok(String::new());
    }

    if pointer == "/" {
        return Err(Error::validation_invalid_argument(
            "pointer",
            "Invalid JSON pointer '/'",
        ));
    }

    if !pointer.starts_with('/') {
        return Err(Error::validation_invalid_argument(
            "pointer",
            format!("JSON pointer must start with '/': {}", pointer),
        ));
    }

    Ok(pointer.to_string())
}

fn split_parent_pointer(pointer: &str) -> Option<(String, String)> {
    if pointer.is_empty() {
        return None;
    }

    let mut parts = pointer.rsplitn(2, '/');
    let token = parts.next()?.to_string();
    let parent = parts.next().unwrap_or("").to_string();

    Some((parent, unescape_token(&token)))
}

fn ensure_pointer_container<'a>(root: &'a mut Value, pointer: &str) -> Result<&'a mut Value> {
    if pointer.is_empty() {
        return Ok(root);
    }

    let tokens: Vec<String> = pointer.split('/').skip(1).map(unescape_token).collect();

    let mut current = root;

    for token in tokens {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }

        current = match current {
            Value::Object(map) => map
                .entry(token)
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(arr) => {
                let index = parse_array_index(&token)?;
                if index >= arr.len() {
                    return Err(Error::config_invalid_value(
                        pointer,
                        None,
                        "Array index out of bounds while creating path",
                    ));
                }
                &mut arr[index]
            }
            other => {
                return Err(Error::config_invalid_value(
                    pointer,
                    Some(value_type_name(other).to_string()),
                    "Expected object/array at pointer",
                ))
            }
        };
    }

    Ok(current)
}

fn set_child(parent: &mut Value, token: &str, value: Value) -> Result<()> {
    match parent {
        Value::Object(map) => {
            map.insert(token.to_string(), value);
            Ok(())
        }
        Value::Array(arr) => {
            let index = parse_array_index(token)?;
            if index >= arr.len() {
                return Err(Error::config_invalid_value(
                    "arrayIndex",
                    Some(index.to_string()),
                    "Array index out of bounds",
                ));
            }
            arr[index] = value;
            Ok(())
        }
        _ => Err(Error::config_invalid_value(
            "jsonPointer",
            Some(value_type_name(parent).to_string()),
            "Cannot set child on non-container",
        )),
    }
}

fn parse_array_index(token: &str) -> Result<usize> {
    token.parse::<usize>().map_err(|_| {
        Error::validation_invalid_argument(
            "pointer",
            format!("Invalid array index token '{}'", token),
        )
    })
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
