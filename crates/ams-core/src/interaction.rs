use crate::value::{BridgeValue, OrderedMap};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    Enter,
    Continuous,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemEntity {
    Pointer,
    Screen,
    Time,
    Game,
    Level,
}

impl SystemEntity {
    pub fn id(&self) -> &'static str {
        match self {
            SystemEntity::Pointer => "pointer",
            SystemEntity::Screen => "screen",
            SystemEntity::Time => "time",
            SystemEntity::Game => "game",
            SystemEntity::Level => "level",
        }
    }
}

/// The key an interaction's target resolves by: a concrete entity type, a
/// base type (matches every type whose `extends` chain terminates there),
/// or one of the fixed system entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetKey {
    Type(String),
    BaseType(String),
    System(SystemEntity),
}

impl TargetKey {
    pub fn parse(raw: &str) -> TargetKey {
        match raw {
            "pointer" => TargetKey::System(SystemEntity::Pointer),
            "screen" => TargetKey::System(SystemEntity::Screen),
            "time" => TargetKey::System(SystemEntity::Time),
            "game" => TargetKey::System(SystemEntity::Game),
            "level" => TargetKey::System(SystemEntity::Level),
            other => {
                if let Some(base) = other.strip_prefix("base:") {
                    TargetKey::BaseType(base.to_string())
                } else {
                    TargetKey::Type(other.to_string())
                }
            }
        }
    }
}

/// A declarative interaction clause attached to an entity type for a given
/// target. `filter` is an expression string evaluated by the script
/// runtime (§4.3); `action` names a `collision_action`/`interaction_action`
/// script; `modifier` is an opaque bag passed through to that action.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub trigger: TriggerMode,
    pub filter: Option<String>,
    pub action: String,
    pub modifier: OrderedMap<BridgeValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_key_parses_system_entities() {
        assert_eq!(TargetKey::parse("pointer"), TargetKey::System(SystemEntity::Pointer));
        assert_eq!(TargetKey::parse("screen"), TargetKey::System(SystemEntity::Screen));
    }

    #[test]
    fn target_key_parses_base_type_prefix() {
        assert_eq!(TargetKey::parse("base:enemy"), TargetKey::BaseType("enemy".to_string()));
        assert_eq!(TargetKey::parse("goblin"), TargetKey::Type("goblin".to_string()));
    }
}
