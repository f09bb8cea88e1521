//! Conversion from a parsed YAML value tree into `BridgeValue`, used
//! wherever a document's free-form value (behaviour config, modifiers,
//! spawn-spec properties) needs to reach script code through the bridge.

use ams_core::value::{BridgeKey, BridgeTable, BridgeValue, OrderedMap};

pub fn yaml_to_bridge(v: &serde_yaml::Value) -> BridgeValue {
    match v {
        serde_yaml::Value::Null => BridgeValue::Nil,
        serde_yaml::Value::Bool(b) => BridgeValue::Bool(*b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                BridgeValue::Int(i)
            } else {
                BridgeValue::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_yaml::Value::String(s) => BridgeValue::Str(s.clone()),
        serde_yaml::Value::Sequence(seq) => {
            BridgeValue::Table(BridgeTable::List(seq.iter().map(yaml_to_bridge).collect()))
        }
        serde_yaml::Value::Mapping(map) => {
            let pairs = map
                .iter()
                .map(|(k, val)| (yaml_key_to_bridge_key(k), yaml_to_bridge(val)))
                .collect();
            BridgeValue::Table(BridgeTable::Map(pairs))
        }
        serde_yaml::Value::Tagged(t) => yaml_to_bridge(&t.value),
    }
}

fn yaml_key_to_bridge_key(v: &serde_yaml::Value) -> BridgeKey {
    match v {
        serde_yaml::Value::String(s) => BridgeKey::Str(s.clone()),
        serde_yaml::Value::Number(n) => BridgeKey::Int(n.as_i64().unwrap_or(0)),
        other => BridgeKey::Str(serde_yaml::to_string(other).unwrap_or_default()),
    }
}

/// Reads a YAML mapping directly into an `OrderedMap<BridgeValue>`,
/// preserving key order exactly as written (insertion order matters for
/// determinism, §3 invariants).
pub fn yaml_mapping_to_ordered(v: &serde_yaml::Value) -> OrderedMap<BridgeValue> {
    let mut out = OrderedMap::new();
    if let serde_yaml::Value::Mapping(map) = v {
        for (k, val) in map {
            if let Some(key) = k.as_str() {
                out.insert(key.to_string(), yaml_to_bridge(val));
            }
        }
    }
    out
}
