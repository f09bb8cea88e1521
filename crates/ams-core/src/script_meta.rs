use crate::value::{BridgeValue, OrderedMap};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptType {
    Behavior,
    CollisionAction,
    Generator,
    InputAction,
    InteractionAction,
}

impl ScriptType {
    pub fn parse(raw: &str) -> Option<ScriptType> {
        match raw {
            "behavior" | "behaviour" => Some(ScriptType::Behavior),
            "collision_action" => Some(ScriptType::CollisionAction),
            "generator" => Some(ScriptType::Generator),
            "input_action" => Some(ScriptType::InputAction),
            "interaction_action" => Some(ScriptType::InteractionAction),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptType::Behavior => "behavior",
            ScriptType::CollisionAction => "collision_action",
            ScriptType::Generator => "generator",
            ScriptType::InputAction => "input_action",
            ScriptType::InteractionAction => "interaction_action",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptProvides {
    pub hooks: Vec<String>,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptRequires {
    pub behaviors: Vec<String>,
    pub properties: Vec<String>,
    pub api_methods: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum ScriptOrigin {
    File(PathBuf),
    Inline,
}

#[derive(Debug, Clone)]
pub struct ScriptMetadata {
    pub name: String,
    pub script_type: ScriptType,
    pub source: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub config_schema: Option<OrderedMap<BridgeValue>>,
    pub args_schema: Option<OrderedMap<BridgeValue>>,
    pub provides: ScriptProvides,
    pub requires: ScriptRequires,
    pub origin: ScriptOrigin,
}
