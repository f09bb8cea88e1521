//! Conversion between `ams_core::BridgeValue` and `mlua::Value`. This is
//! the single choke point where host values cross into script code and
//! back; every `ams.*` API function routes its return value through
//! `to_lua` and every argument through `from_lua`.

use ams_core::value::{BridgeKey, BridgeTable, BridgeValue};
use mlua::{Lua, Table, Value};

pub fn to_lua(lua: &Lua, v: &BridgeValue) -> mlua::Result<Value> {
    Ok(match v {
        BridgeValue::Nil => Value::Nil,
        BridgeValue::Bool(b) => Value::Boolean(*b),
        BridgeValue::Int(i) => Value::Integer(*i),
        BridgeValue::Float(f) => Value::Number(*f),
        BridgeValue::Str(s) => Value::String(lua.create_string(s)?),
        BridgeValue::Table(BridgeTable::List(items)) => {
            let t = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                t.set(i + 1, to_lua(lua, item)?)?;
            }
            Value::Table(t)
        }
        BridgeValue::Table(BridgeTable::Map(pairs)) => {
            let t = lua.create_table()?;
            for (k, val) in pairs {
                match k {
                    BridgeKey::Str(s) => t.set(s.as_str(), to_lua(lua, val)?)?,
                    BridgeKey::Int(i) => t.set(*i, to_lua(lua, val)?)?,
                }
            }
            Value::Table(t)
        }
    })
}

/// Converts a script value back into a `BridgeValue`. Returns an error if
/// `v` holds an mlua type with no bridgeable representation (function,
/// userdata, thread, light userdata) — this is the host-side enforcement
/// of "scripts can only ever exchange bridgeable values".
pub fn from_lua(v: &Value) -> Result<BridgeValue, String> {
    Ok(match v {
        Value::Nil => BridgeValue::Nil,
        Value::Boolean(b) => BridgeValue::Bool(*b),
        Value::Integer(i) => BridgeValue::Int(*i),
        Value::Number(f) => BridgeValue::Float(*f),
        Value::String(s) => BridgeValue::Str(s.to_str().map_err(|e| e.to_string())?.to_string()),
        Value::Table(t) => from_lua_table(t)?,
        other => return Err(format!("non-bridgeable script value of type {}", other.type_name())),
    })
}

fn from_lua_table(t: &Table) -> Result<BridgeValue, String> {
    let len = t.raw_len();
    let is_list = len > 0 && t.clone().pairs::<Value, Value>().count() == len;
    if is_list {
        let mut items = Vec::with_capacity(len);
        for i in 1..=len {
            let v: Value = t.get(i).map_err(|e| e.to_string())?;
            items.push(from_lua(&v)?);
        }
        return Ok(BridgeValue::Table(BridgeTable::List(items)));
    }
    let mut pairs = Vec::new();
    for pair in t.clone().pairs::<Value, Value>() {
        let (k, v) = pair.map_err(|e| e.to_string())?;
        let key = match k {
            Value::String(s) => BridgeKey::Str(s.to_str().map_err(|e| e.to_string())?.to_string()),
            Value::Integer(i) => BridgeKey::Int(i),
            other => return Err(format!("non-bridgeable table key of type {}", other.type_name())),
        };
        pairs.push((key, from_lua(&v)?));
    }
    Ok(BridgeValue::Table(BridgeTable::Map(pairs)))
}
