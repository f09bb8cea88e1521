//! The bridgeable value type. Every value that crosses the host/script
//! boundary — in either direction — is one of these. There is no way to
//! construct a `BridgeValue` that wraps an opaque host object; that
//! invariant is what keeps the `ams.*` bridge from ever leaking a raw
//! reference into script code (see `ScriptRuntime`/`register_checked`).

use linked_hash_map::LinkedHashMap;
use std::fmt;

/// An insertion-order-preserving map, used everywhere a script-visible
/// mapping needs deterministic iteration (property bags, behaviour config,
/// bridge tables). Backed by `linked_hash_map`, matching the ordered-map
/// crate already used for asset registries elsewhere in this codebase.
pub type OrderedMap<V> = LinkedHashMap<String, V>;

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeKey {
    Str(String),
    Int(i64),
}

impl fmt::Display for BridgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeKey::Str(s) => write!(f, "{s}"),
            BridgeKey::Int(i) => write!(f, "{i}"),
        }
    }
}

/// A table value, distinguishing the common "1-indexed list" shape from a
/// general string/int-keyed map. Both round-trip through Lua tables; this
/// split exists purely so host code can build the common case (a `Vec<T>`)
/// without going through `BridgeKey`.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeTable {
    List(Vec<BridgeValue>),
    Map(Vec<(BridgeKey, BridgeValue)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Table(BridgeTable),
}

impl BridgeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            BridgeValue::Int(i) => Some(*i as f64),
            BridgeValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            BridgeValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BridgeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, BridgeValue::Nil)
    }

    pub fn truthy(&self) -> bool {
        !matches!(self, BridgeValue::Nil | BridgeValue::Bool(false))
    }
}

impl Default for BridgeValue {
    fn default() -> Self {
        BridgeValue::Nil
    }
}

/// Converts a host-side Rust value into a `BridgeValue`. Anything that
/// cannot be represented (bytes, sets, any opaque object) simply has no
/// implementation of this trait — that is the enforcement mechanism: if it
/// doesn't compile, it can't leak.
pub trait IntoBridge {
    fn into_bridge(self) -> BridgeValue;
}

impl IntoBridge for BridgeValue {
    fn into_bridge(self) -> BridgeValue {
        self
    }
}

impl IntoBridge for () {
    fn into_bridge(self) -> BridgeValue {
        BridgeValue::Nil
    }
}

impl IntoBridge for bool {
    fn into_bridge(self) -> BridgeValue {
        BridgeValue::Bool(self)
    }
}

macro_rules! impl_into_bridge_int {
    ($($t:ty),*) => {
        $(impl IntoBridge for $t {
            fn into_bridge(self) -> BridgeValue {
                BridgeValue::Int(self as i64)
            }
        })*
    };
}
impl_into_bridge_int!(i8, i16, i32, i64, u8, u16, u32, usize);

macro_rules! impl_into_bridge_float {
    ($($t:ty),*) => {
        $(impl IntoBridge for $t {
            fn into_bridge(self) -> BridgeValue {
                BridgeValue::Float(self as f64)
            }
        })*
    };
}
impl_into_bridge_float!(f32, f64);

impl IntoBridge for String {
    fn into_bridge(self) -> BridgeValue {
        BridgeValue::Str(self)
    }
}

impl IntoBridge for &str {
    fn into_bridge(self) -> BridgeValue {
        BridgeValue::Str(self.to_string())
    }
}

impl<T: IntoBridge> IntoBridge for Option<T> {
    fn into_bridge(self) -> BridgeValue {
        match self {
            Some(v) => v.into_bridge(),
            None => BridgeValue::Nil,
        }
    }
}

impl<T: IntoBridge> IntoBridge for Vec<T> {
    fn into_bridge(self) -> BridgeValue {
        BridgeValue::Table(BridgeTable::List(
            self.into_iter().map(IntoBridge::into_bridge).collect(),
        ))
    }
}

impl<T: IntoBridge> IntoBridge for OrderedMap<T> {
    fn into_bridge(self) -> BridgeValue {
        BridgeValue::Table(BridgeTable::Map(
            self.into_iter()
                .map(|(k, v)| (BridgeKey::Str(k), v.into_bridge()))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_matches_lua_semantics() {
        assert!(!BridgeValue::Nil.truthy());
        assert!(!BridgeValue::Bool(false).truthy());
        assert!(BridgeValue::Bool(true).truthy());
        assert!(BridgeValue::Int(0).truthy());
        assert!(BridgeValue::Str(String::new()).truthy());
    }

    #[test]
    fn option_round_trips_through_into_bridge() {
        let some: Option<i32> = Some(5);
        let none: Option<i32> = None;
        assert_eq!(some.into_bridge(), BridgeValue::Int(5));
        assert_eq!(none.into_bridge(), BridgeValue::Nil);
    }

    #[test]
    fn vec_becomes_ordered_list_table() {
        let v = vec![1i32, 2, 3];
        match v.into_bridge() {
            BridgeValue::Table(BridgeTable::List(items)) => {
                assert_eq!(items, vec![BridgeValue::Int(1), BridgeValue::Int(2), BridgeValue::Int(3)]);
            }
            other => panic!("expected list table, got {other:?}"),
        }
    }
}
