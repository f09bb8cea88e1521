use crate::interaction::{Interaction, TargetKey};
use crate::value::BridgeValue;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ConfigParam {
    pub default: BridgeValue,
}

/// A reusable bundle of interactions parameterised by `$config.<name>`
/// references. Expansion (see `ams_engine::behavior_loader`) substitutes
/// each reference with the value from the owning entity type's
/// `behavior_config` entry (or the bundle's own default) before the
/// interactions are merged into that type's definition.
#[derive(Debug, Clone)]
pub struct BehaviorBundle {
    pub name: String,
    pub description: Option<String>,
    pub config: HashMap<String, ConfigParam>,
    pub interactions: HashMap<TargetKey, Vec<Interaction>>,
}

impl BehaviorBundle {
    pub fn new(name: impl Into<String>) -> Self {
        BehaviorBundle {
            name: name.into(),
            description: None,
            config: HashMap::new(),
            interactions: HashMap::new(),
        }
    }
}
