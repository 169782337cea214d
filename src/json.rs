//! JSON bridge for embedders.
//!
//! Cells map onto `serde_json::Value` the obvious way. Undefined and native
//! cells have no JSON form and become null; sparse array gaps also become
//! null so positions are preserved. Parsing builds fresh cells, so a decoded
//! document shares nothing with the store's existing values.

use crate::error::{Error, Result};
use crate::store::{CellKind, Key, VarRef, VarStore};

/// Build cells for a parsed JSON document.
pub fn from_json(store: &VarStore, json: &serde_json::Value) -> Result<VarRef> {
    match json {
        serde_json::Value::Null => store.alloc_undefined(),
        serde_json::Value::Bool(b) => store.alloc_bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                store.alloc_int(i)
            } else {
                store.alloc_float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => store.alloc_str(s.as_str()),
        serde_json::Value::Array(items) => {
            let arr = store.alloc_array()?;
            for item in items {
                let el = from_json(store, item)?;
                store.append(&arr, &el)?;
            }
            Ok(arr)
        }
        serde_json::Value::Object(map) => {
            let obj = store.alloc_object()?;
            for (name, item) in map {
                let el = from_json(store, item)?;
                store.set_child(&obj, Key::Name(name.as_str().into()), &el)?;
            }
            Ok(obj)
        }
    }
}

/// Convert a value to its JSON form.
pub fn to_json(store: &VarStore, value: &VarRef) -> Result<serde_json::Value> {
    Ok(match store.kind(value) {
        CellKind::Undefined | CellKind::Native => serde_json::Value::Null,
        CellKind::Bool => serde_json::Value::Bool(store.as_bool(value).unwrap_or(false)),
        CellKind::Int => {
            serde_json::Value::Number(serde_json::Number::from(store.as_int(value).unwrap_or(0)))
        }
        CellKind::Float => serde_json::Value::Number(
            serde_json::Number::from_f64(store.as_f64(value).unwrap_or(0.0))
                .unwrap_or(serde_json::Number::from(0)),
        ),
        CellKind::Str => serde_json::Value::String(store.str_value(value).unwrap_or_default()),
        CellKind::Array => {
            let len = store.array_length(value)?;
            let mut items = Vec::with_capacity(len as usize);
            for i in 0..len {
                match store.get_child(value, &Key::Index(i))? {
                    Some(el) => items.push(to_json(store, &el)?),
                    None => items.push(serde_json::Value::Null),
                }
            }
            serde_json::Value::Array(items)
        }
        CellKind::Object => {
            let mut map = serde_json::Map::new();
            for pos in 0.. {
                let Some(key) = store.key_at(value, pos)? else {
                    break;
                };
                if let Some(el) = store.value_at(value, pos)? {
                    map.insert(key.to_string(), to_json(store, &el)?);
                }
            }
            serde_json::Value::Object(map)
        }
    })
}

/// Parse a JSON string into cells.
pub fn parse(store: &VarStore, text: &str) -> Result<VarRef> {
    let json: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| Error::type_error(format!("invalid JSON: {e}")))?;
    from_json(store, &json)
}

/// Serialize a value as a JSON string.
pub fn stringify(store: &VarStore, value: &VarRef) -> Result<String> {
    let json = to_json(store, value)?;
    serde_json::to_string(&json).map_err(|e| Error::type_error(format!("cannot serialize: {e}")))
}
