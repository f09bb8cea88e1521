//! Entity-type definition loading and `extends` resolution (§4.4).
//! Generalises the single-hop parent merge used for scene-entity
//! inheritance elsewhere in this codebase to a full multi-hop chain with
//! general cycle detection, since entity types may extend an arbitrary
//! number of ancestors before terminating at a self-referential
//! `base_type`.

use ams_core::value::{BridgeKey, BridgeTable, BridgeValue, OrderedMap};
use ams_core::{
    ChildSpawnSpec, ConditionalTransform, DefinitionError, EntityTypeDefinition, PropertyValueSpec,
    Transform, TransformTarget, UpdateCondition,
};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct EntityTypeDoc {
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sprite: Option<String>,
    #[serde(default)]
    pub health: Option<i32>,
    #[serde(default)]
    pub point_value: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub behaviors: Vec<String>,
    #[serde(default)]
    pub behavior_config: serde_yaml::Mapping,
    #[serde(default)]
    pub on_destroy: Option<TransformDoc>,
    #[serde(default)]
    pub on_parent_destroy: Option<TransformDoc>,
    #[serde(default)]
    pub on_update: Vec<ConditionalTransformDoc>,
    #[serde(default)]
    pub interactions: serde_yaml::Mapping,
}

#[derive(Debug, Deserialize)]
pub struct TransformDoc {
    #[serde(rename = "type")]
    pub target: String,
    #[serde(default)]
    pub spawns: Vec<ChildSpawnSpecDoc>,
}

#[derive(Debug, Deserialize)]
pub struct ChildSpawnSpecDoc {
    pub entity_type: String,
    #[serde(default)]
    pub offset: (f64, f64),
    #[serde(default = "default_spawn_count")]
    pub count: u32,
    #[serde(default)]
    pub inherit_velocity_fraction: f64,
    #[serde(default)]
    pub lifetime: Option<f64>,
    #[serde(default)]
    pub properties: serde_yaml::Mapping,
}

fn default_spawn_count() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct ConditionalTransformDoc {
    pub condition: UpdateConditionDoc,
    pub transform: TransformDoc,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConditionDoc {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub value: Option<serde_yaml::Value>,
    #[serde(default)]
    pub every: Option<f64>,
}

/// Parses one spawn-spec property value: a literal scalar, `{property:
/// name}` (reference to the parent's own properties), `{call: generator,
/// args: {...}}`, or `{lua: expression}` (§4.4).
fn parse_property_value_spec(v: &serde_yaml::Value) -> PropertyValueSpec {
    if let serde_yaml::Value::Mapping(m) = v {
        if let Some(serde_yaml::Value::String(name)) = m.get("property") {
            return PropertyValueSpec::PropertyRef(name.clone());
        }
        if let Some(serde_yaml::Value::String(expr)) = m.get("lua") {
            return PropertyValueSpec::LuaExpr(expr.clone());
        }
        if let Some(serde_yaml::Value::String(name)) = m.get("call") {
            let mut args = OrderedMap::new();
            if let Some(serde_yaml::Value::Mapping(args_map)) = m.get("args") {
                for (k, v) in args_map {
                    if let Some(k) = k.as_str() {
                        args.insert(k.to_string(), crate::yaml_bridge::yaml_to_bridge(v));
                    }
                }
            }
            return PropertyValueSpec::GeneratorCall { name: name.clone(), args };
        }
    }
    PropertyValueSpec::Literal(crate::yaml_bridge::yaml_to_bridge(v))
}

fn child_spawn_spec_from_doc(doc: &ChildSpawnSpecDoc) -> ChildSpawnSpec {
    let mut properties = OrderedMap::new();
    for (k, v) in &doc.properties {
        if let Some(k) = k.as_str() {
            properties.insert(k.to_string(), parse_property_value_spec(v));
        }
    }
    ChildSpawnSpec {
        entity_type: doc.entity_type.clone(),
        offset: doc.offset,
        count: doc.count,
        inherit_velocity_fraction: doc.inherit_velocity_fraction,
        lifetime: doc.lifetime,
        properties,
    }
}

pub fn transform_from_doc(doc: &TransformDoc) -> Result<Transform, DefinitionError> {
    let target = if doc.target == "destroy" {
        TransformTarget::Destroy
    } else {
        TransformTarget::ChangeType(doc.target.clone())
    };
    Ok(Transform { target, spawns: doc.spawns.iter().map(child_spawn_spec_from_doc).collect() })
}

fn update_condition_from_doc(doc: &UpdateConditionDoc) -> Result<UpdateCondition, DefinitionError> {
    match doc.kind.as_str() {
        "age" => Ok(UpdateCondition::Age { min: doc.min, max: doc.max }),
        "property_equals" => {
            let property = doc
                .property
                .clone()
                .ok_or_else(|| DefinitionError::SchemaError("property_equals condition requires 'property'".into()))?;
            let value = doc
                .value
                .as_ref()
                .map(crate::yaml_bridge::yaml_to_bridge)
                .unwrap_or(BridgeValue::Nil);
            Ok(UpdateCondition::PropertyEquals { property, value })
        }
        "interval" => {
            let every = doc
                .every
                .ok_or_else(|| DefinitionError::SchemaError("interval condition requires 'every'".into()))?;
            Ok(UpdateCondition::Interval { every })
        }
        other => Err(DefinitionError::SchemaError(format!("unknown update condition '{other}'"))),
    }
}

fn conditional_transform_from_doc(doc: &ConditionalTransformDoc) -> Result<ConditionalTransform, DefinitionError> {
    Ok(ConditionalTransform {
        condition: update_condition_from_doc(&doc.condition)?,
        transform: transform_from_doc(&doc.transform)?,
    })
}

/// Parses the raw `entity_types` mapping from a game definition into
/// per-type docs, without yet resolving `extends` or behaviour expansion.
pub fn parse_entity_type_docs(
    raw: &serde_yaml::Mapping,
) -> Result<HashMap<String, EntityTypeDoc>, DefinitionError> {
    let mut out = HashMap::new();
    for (key, value) in raw {
        let Some(tag) = key.as_str() else { continue };
        let doc: EntityTypeDoc = serde_yaml::from_value(value.clone())
            .map_err(|e| DefinitionError::SchemaError(format!("entity type '{tag}': {e}")))?;
        out.insert(tag.to_string(), doc);
    }
    Ok(out)
}

const SENTINEL_WIDTH: f64 = -1.0;
const SENTINEL_HEALTH: i32 = -1;

fn doc_to_definition(tag: &str, doc: &EntityTypeDoc) -> Result<EntityTypeDefinition, DefinitionError> {
    let mut def = EntityTypeDefinition::new(tag);
    def.extends = doc.extends.clone();
    def.default_width = doc.width.unwrap_or(SENTINEL_WIDTH);
    def.default_height = doc.height.unwrap_or(SENTINEL_WIDTH);
    def.default_color = doc.color.clone().unwrap_or_default();
    def.default_sprite = doc.sprite.clone();
    def.default_health = doc.health.unwrap_or(SENTINEL_HEALTH);
    def.point_value = doc.point_value.unwrap_or(0);
    def.tags = doc.tags.clone();
    def.behaviors = doc.behaviors.clone();
    for (name, cfg) in &doc.behavior_config {
        let Some(name) = name.as_str() else { continue };
        let mut entry = ams_core::value::OrderedMap::new();
        if let serde_yaml::Value::Mapping(m) = cfg {
            for (k, v) in m {
                if let Some(k) = k.as_str() {
                    entry.insert(k.to_string(), crate::yaml_bridge::yaml_to_bridge(v));
                }
            }
        }
        def.behavior_config.insert(name.to_string(), entry);
    }
    if let Some(t) = &doc.on_destroy {
        def.on_destroy = Some(transform_from_doc(t)?);
    }
    if let Some(t) = &doc.on_parent_destroy {
        def.on_parent_destroy = Some(transform_from_doc(t)?);
    }
    for c in &doc.on_update {
        def.on_update.push(conditional_transform_from_doc(c)?);
    }
    def.interactions = crate::behavior_loader::parse_interactions_mapping(&doc.interactions)?;
    Ok(def)
}

/// Walks one type's `extends` chain to its terminal ancestor, detecting
/// cycles via a visited set, and merges ancestor-to-descendant (child
/// fields always win; sentinel-valued fields are treated as unset).
fn resolve_one(
    tag: &str,
    docs: &HashMap<String, EntityTypeDoc>,
    resolved: &mut HashMap<String, EntityTypeDefinition>,
    in_progress: &mut Vec<String>,
) -> Result<EntityTypeDefinition, DefinitionError> {
    if let Some(def) = resolved.get(tag) {
        return Ok(def.clone());
    }
    if in_progress.contains(&tag.to_string()) {
        let mut chain = in_progress.clone();
        chain.push(tag.to_string());
        return Err(DefinitionError::InheritanceCycle { type_tag: tag.to_string(), chain });
    }
    let doc = docs
        .get(tag)
        .ok_or_else(|| DefinitionError::MissingParent { type_tag: tag.to_string(), parent: tag.to_string() })?;
    let mut def = doc_to_definition(tag, doc)?;

    if let Some(parent_tag) = doc.extends.clone() {
        in_progress.push(tag.to_string());
        let parent_docs_has = docs.contains_key(&parent_tag);
        if !parent_docs_has {
            return Err(DefinitionError::MissingParent { type_tag: tag.to_string(), parent: parent_tag });
        }
        let parent = resolve_one(&parent_tag, docs, resolved, in_progress)?;
        in_progress.pop();

        merge_from_parent(&mut def, &parent);
        def.base_type = parent.base_type.clone();
    }

    resolved.insert(tag.to_string(), def.clone());
    Ok(def)
}

fn merge_from_parent(child: &mut EntityTypeDefinition, parent: &EntityTypeDefinition) {
    if child.default_width == SENTINEL_WIDTH {
        child.default_width = parent.default_width;
    }
    if child.default_height == SENTINEL_WIDTH {
        child.default_height = parent.default_height;
    }
    if child.default_color.is_empty() {
        child.default_color = parent.default_color.clone();
    }
    if child.default_sprite.is_none() {
        child.default_sprite = parent.default_sprite.clone();
    }
    if child.default_health == SENTINEL_HEALTH {
        child.default_health = parent.default_health;
    }
    if child.point_value == 0 {
        child.point_value = parent.point_value;
    }
    if child.tags.is_empty() {
        child.tags = parent.tags.clone();
    }
    // Behaviours: concatenate, child's own list first, parent's appended
    // without duplicates — the child keeps authorship order, the parent
    // contributes anything not already named.
    for b in &parent.behaviors {
        if !child.behaviors.contains(b) {
            child.behaviors.push(b.clone());
        }
    }
    for (name, cfg) in parent.behavior_config.iter() {
        child.behavior_config.entry(name.clone()).or_insert_with(|| cfg.clone());
    }
    if child.on_destroy.is_none() {
        child.on_destroy = parent.on_destroy.clone();
    }
    if child.on_parent_destroy.is_none() {
        child.on_parent_destroy = parent.on_parent_destroy.clone();
    }
    if child.on_update.is_empty() {
        child.on_update = parent.on_update.clone();
    }
    // Source (child) interactions dominate a behaviour-inherited clause
    // for the same target; here both sides are "source" declarations, so
    // concatenate per target with the child's own clauses first.
    for (target, clauses) in &parent.interactions {
        child.interactions.entry(target.clone()).or_insert_with(Vec::new).extend(clauses.clone());
    }
}

/// Resolves every entity type's `extends` chain, fixing sentinel values
/// back to the engine's own defaults where the terminal ancestor also
/// left them unset.
pub fn resolve_inheritance(
    docs: &HashMap<String, EntityTypeDoc>,
) -> Result<HashMap<String, EntityTypeDefinition>, DefinitionError> {
    let mut resolved = HashMap::new();
    for tag in docs.keys() {
        let mut in_progress = Vec::new();
        let def = resolve_one(tag, docs, &mut resolved, &mut in_progress)?;
        resolved.insert(tag.clone(), def);
    }
    for def in resolved.values_mut() {
        if def.default_width == SENTINEL_WIDTH {
            def.default_width = 32.0;
        }
        if def.default_height == SENTINEL_WIDTH {
            def.default_height = 32.0;
        }
        if def.default_color.is_empty() {
            def.default_color = "white".to_string();
        }
        if def.default_health == SENTINEL_HEALTH {
            def.default_health = 1;
        }
    }
    Ok(resolved)
}

#[allow(dead_code)]
fn bridge_to_yaml(v: &BridgeValue) -> serde_yaml::Value {
    match v {
        BridgeValue::Nil => serde_yaml::Value::Null,
        BridgeValue::Bool(b) => serde_yaml::Value::Bool(*b),
        BridgeValue::Int(i) => serde_yaml::Value::Number((*i).into()),
        BridgeValue::Float(f) => serde_yaml::Value::Number(serde_yaml::Number::from(*f)),
        BridgeValue::Str(s) => serde_yaml::Value::String(s.clone()),
        BridgeValue::Table(BridgeTable::List(items)) => {
            serde_yaml::Value::Sequence(items.iter().map(bridge_to_yaml).collect())
        }
        BridgeValue::Table(BridgeTable::Map(pairs)) => {
            let mut map = serde_yaml::Mapping::new();
            for (k, v) in pairs {
                let key = match k {
                    BridgeKey::Str(s) => serde_yaml::Value::String(s.clone()),
                    BridgeKey::Int(i) => serde_yaml::Value::Number((*i).into()),
                };
                map.insert(key, bridge_to_yaml(v));
            }
            serde_yaml::Value::Mapping(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs_from_yaml(yaml: &str) -> HashMap<String, EntityTypeDoc> {
        let raw: serde_yaml::Mapping = serde_yaml::from_str(yaml).unwrap();
        parse_entity_type_docs(&raw).unwrap()
    }

    #[test]
    fn single_hop_inheritance_merges_parent_fields() {
        let docs = docs_from_yaml(
            r#"
enemy_base:
  width: 20
  height: 20
  health: 3
goblin:
  extends: enemy_base
  color: green
"#,
        );
        let resolved = resolve_inheritance(&docs).unwrap();
        let goblin = &resolved["goblin"];
        assert_eq!(goblin.default_width, 20.0);
        assert_eq!(goblin.default_health, 3);
        assert_eq!(goblin.default_color, "green");
        assert_eq!(goblin.base_type, "enemy_base");
    }

    #[test]
    fn multi_hop_chain_resolves_to_terminal_base_type() {
        let docs = docs_from_yaml(
            r#"
base:
  width: 10
mid:
  extends: base
leaf:
  extends: mid
"#,
        );
        let resolved = resolve_inheritance(&docs).unwrap();
        assert_eq!(resolved["leaf"].base_type, "base");
        assert_eq!(resolved["leaf"].default_width, 10.0);
    }

    #[test]
    fn cycle_is_rejected() {
        let docs = docs_from_yaml(
            r#"
a:
  extends: b
b:
  extends: a
"#,
        );
        let err = resolve_inheritance(&docs).unwrap_err();
        assert!(matches!(err, DefinitionError::InheritanceCycle { .. }));
    }

    #[test]
    fn on_destroy_transform_and_interactions_parse_from_yaml() {
        let docs = docs_from_yaml(
            r#"
shard:
  width: 4
asteroid:
  on_destroy:
    type: destroy
    spawns:
      - entity_type: shard
        count: 3
        inherit_velocity_fraction: 0.5
        properties:
          speed: 40
          angle: {lua: "math.pi * 2"}
  interactions:
    bullet:
      - trigger: enter
        action: explode
        modifier:
          damage: 1
"#,
        );
        let resolved = resolve_inheritance(&docs).unwrap();
        let asteroid = &resolved["asteroid"];
        let on_destroy = asteroid.on_destroy.as_ref().unwrap();
        assert!(matches!(on_destroy.target, TransformTarget::Destroy));
        assert_eq!(on_destroy.spawns[0].entity_type, "shard");
        assert_eq!(on_destroy.spawns[0].count, 3);
        let clauses = &asteroid.interactions[&ams_core::TargetKey::parse("bullet")];
        assert_eq!(clauses[0].action, "explode");
    }

    #[test]
    fn missing_parent_is_rejected() {
        let docs = docs_from_yaml(
            r#"
a:
  extends: ghost
"#,
        );
        let err = resolve_inheritance(&docs).unwrap_err();
        assert!(matches!(err, DefinitionError::MissingParent { .. }));
    }
}
