use crate::interaction::{Interaction, TargetKey};
use crate::value::{BridgeValue, OrderedMap};
use std::collections::HashMap;

/// A sentinel meaning "not set by this type, inherit from parent" for
/// fields whose own type has no natural `Option`. Mirrors the
/// child-wins-else-inherit merge used for scene-entity inheritance, but
/// generalised to full multi-hop `extends` chains (see
/// `ams_engine::definition_loader::resolve_inheritance`).
#[derive(Debug, Clone)]
pub struct EntityTypeDefinition {
    pub type_tag: String,
    pub extends: Option<String>,
    pub base_type: String,

    pub default_width: f64,
    pub default_height: f64,
    pub default_color: String,
    pub default_sprite: Option<String>,
    pub default_health: i32,
    pub point_value: i32,

    pub tags: Vec<String>,
    pub behaviors: Vec<String>,
    pub behavior_config: OrderedMap<OrderedMap<BridgeValue>>,
    pub render_commands: Vec<RenderCommand>,

    pub on_destroy: Option<Transform>,
    pub on_parent_destroy: Option<Transform>,
    pub on_update: Vec<ConditionalTransform>,

    pub interactions: HashMap<TargetKey, Vec<Interaction>>,
}

impl EntityTypeDefinition {
    pub fn new(type_tag: impl Into<String>) -> Self {
        let type_tag = type_tag.into();
        EntityTypeDefinition {
            base_type: type_tag.clone(),
            type_tag,
            extends: None,
            default_width: 32.0,
            default_height: 32.0,
            default_color: "white".to_string(),
            default_sprite: None,
            default_health: 1,
            point_value: 0,
            tags: Vec::new(),
            behaviors: Vec::new(),
            behavior_config: OrderedMap::new(),
            render_commands: Vec::new(),
            on_destroy: None,
            on_parent_destroy: None,
            on_update: Vec::new(),
            interactions: HashMap::new(),
        }
    }
}

/// A render-command entry — opaque as far as the core engine is concerned
/// (rendering itself is an external collaborator); carried through so a
/// host-provided renderer can consume a resolved display list.
#[derive(Debug, Clone)]
pub struct RenderCommand {
    pub kind: String,
    pub params: OrderedMap<BridgeValue>,
}

#[derive(Debug, Clone)]
pub enum TransformTarget {
    Destroy,
    ChangeType(String),
}

#[derive(Debug, Clone)]
pub struct Transform {
    pub target: TransformTarget,
    pub spawns: Vec<ChildSpawnSpec>,
}

#[derive(Debug, Clone)]
pub struct ChildSpawnSpec {
    pub entity_type: String,
    pub offset: (f64, f64),
    pub count: u32,
    pub inherit_velocity_fraction: f64,
    pub lifetime: Option<f64>,
    pub properties: OrderedMap<PropertyValueSpec>,
}

impl Default for ChildSpawnSpec {
    fn default() -> Self {
        ChildSpawnSpec {
            entity_type: String::new(),
            offset: (0.0, 0.0),
            count: 1,
            inherit_velocity_fraction: 0.0,
            lifetime: None,
            properties: OrderedMap::new(),
        }
    }
}

/// Values inside a spawn-spec property map may be literal, a reference to
/// the parent's own property bag, a call into a `generator` script, or an
/// inline expression evaluated by the script runtime (§4.3).
#[derive(Debug, Clone)]
pub enum PropertyValueSpec {
    Literal(BridgeValue),
    PropertyRef(String),
    GeneratorCall {
        name: String,
        args: OrderedMap<BridgeValue>,
    },
    LuaExpr(String),
}

#[derive(Debug, Clone)]
pub struct ConditionalTransform {
    pub condition: UpdateCondition,
    pub transform: Transform,
}

#[derive(Debug, Clone)]
pub enum UpdateCondition {
    Age { min: Option<f64>, max: Option<f64> },
    PropertyEquals { property: String, value: BridgeValue },
    Interval { every: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_definition_has_sentinel_defaults() {
        let d = EntityTypeDefinition::new("goblin");
        assert_eq!(d.default_width, 32.0);
        assert_eq!(d.default_color, "white");
        assert!(d.extends.is_none());
    }
}
