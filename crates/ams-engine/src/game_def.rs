//! Top-level game definition document (§6): the root YAML a loaded game
//! is built from. Ties together entity-type resolution
//! (`definition_loader`), behaviour bundle expansion (`behavior_loader`),
//! win/lose conditions (`win_lose`), and asset registration
//! (`asset_registry`).

use crate::asset_registry::{self, AssetDefinition};
use crate::behavior_loader;
use crate::definition_loader::{self, EntityTypeDoc};
use crate::script_loader::ScriptLoader;
use crate::win_lose::{LoseClause, LoseEvent, LoseSideEffects, ScreenEdge, WinCondition};
use ams_core::value::OrderedMap;
use ams_core::{
    BehaviorBundle, DefinitionError, EngineError, EntityTypeDefinition, Interaction, ScriptMetadata,
    TargetKey, TriggerMode,
};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct PlayerSpec {
    pub entity_type: String,
    pub spawn_x: f64,
    pub spawn_y: f64,
}

#[derive(Debug, Clone)]
pub struct GameDefinition {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub screen_width: f64,
    pub screen_height: f64,
    pub background_color: (u8, u8, u8),

    pub entity_types: HashMap<String, EntityTypeDefinition>,
    /// Legacy AABB collision pairs (§4.4: "fallback for definitions
    /// without interactions") — types that should collide even without a
    /// declared interaction clause between them.
    pub legacy_collision_pairs: Vec<(String, String)>,

    pub input_mapping: HashMap<String, String>,
    pub global_on_input: Vec<String>,

    pub lose_conditions: Vec<LoseClause>,
    pub player: Option<PlayerSpec>,
    pub win_condition: Option<WinCondition>,
    pub lose_on_player_death: bool,

    pub default_layout: Option<String>,
    pub assets: HashMap<String, AssetDefinition>,

    /// Scripts declared inline in the game document itself (`inline_*`
    /// maps) rather than as separate files under `behaviors/`,
    /// `collision_actions/`, `generators/`, or `input_actions/`.
    pub inline_scripts: Vec<ScriptMetadata>,
}

#[derive(Debug, Deserialize)]
struct ColorDoc(u8, u8, u8);

#[derive(Debug, Deserialize)]
struct PlayerDoc {
    #[serde(rename = "type")]
    entity_type: String,
    #[serde(default)]
    spawn_x: f64,
    #[serde(default)]
    spawn_y: f64,
}

#[derive(Debug, Deserialize)]
struct LoseEffectsDoc {
    #[serde(default)]
    lose_life: bool,
    #[serde(default)]
    destroy_type: Option<String>,
    #[serde(default)]
    transform: Option<definition_loader::TransformDoc>,
    #[serde(default)]
    clear_property: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoseClauseDoc {
    event: String,
    #[serde(default)]
    entity_type: Option<String>,
    #[serde(default)]
    edge: Option<String>,
    #[serde(default)]
    property: Option<String>,
    #[serde(default)]
    effects: LoseEffectsDoc,
}

#[derive(Debug, Deserialize)]
struct GameDefDoc {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default = "default_screen_width")]
    screen_width: f64,
    #[serde(default = "default_screen_height")]
    screen_height: f64,
    #[serde(default)]
    background_color: Option<ColorDoc>,
    #[serde(default)]
    defaults: serde_yaml::Mapping,
    #[serde(default)]
    entity_types: serde_yaml::Mapping,
    #[serde(default)]
    collisions: Vec<(String, String)>,
    #[serde(default)]
    collision_behaviors: HashMap<String, HashMap<String, String>>,
    #[serde(default)]
    input_mapping: HashMap<String, String>,
    #[serde(default)]
    global_on_input: Vec<String>,
    #[serde(default)]
    lose_conditions: Vec<LoseClauseDoc>,
    #[serde(default)]
    player: Option<PlayerDoc>,
    #[serde(default)]
    win_condition: Option<String>,
    #[serde(default)]
    win_target: Option<serde_yaml::Value>,
    #[serde(default)]
    win_target_type: Option<String>,
    #[serde(default)]
    lose_on_player_death: bool,
    #[serde(default)]
    default_layout: Option<String>,
    #[serde(default)]
    assets: serde_yaml::Mapping,
    #[serde(default)]
    inline_behaviors: serde_yaml::Mapping,
    #[serde(default)]
    inline_collision_actions: serde_yaml::Mapping,
    #[serde(default)]
    inline_generators: serde_yaml::Mapping,
    #[serde(default)]
    inline_input_actions: serde_yaml::Mapping,
}

fn default_screen_width() -> f64 {
    800.0
}

fn default_screen_height() -> f64 {
    600.0
}

fn parse_screen_edge(raw: &str) -> Result<ScreenEdge, DefinitionError> {
    match raw {
        "left" => Ok(ScreenEdge::Left),
        "right" => Ok(ScreenEdge::Right),
        "top" => Ok(ScreenEdge::Top),
        "bottom" => Ok(ScreenEdge::Bottom),
        "any" => Ok(ScreenEdge::Any),
        other => Err(DefinitionError::SchemaError(format!("unknown screen edge '{other}'"))),
    }
}

fn lose_clause_from_doc(doc: &LoseClauseDoc) -> Result<LoseClause, DefinitionError> {
    let event = match doc.event.as_str() {
        "screen_exit" => {
            let entity_type = doc
                .entity_type
                .clone()
                .ok_or_else(|| DefinitionError::SchemaError("screen_exit lose event requires 'entity_type'".into()))?;
            let edge = doc
                .edge
                .as_deref()
                .map(parse_screen_edge)
                .transpose()?
                .unwrap_or(ScreenEdge::Any);
            LoseEvent::ScreenExit { entity_type, edge }
        }
        "property_truthy" => {
            let entity_type = doc.entity_type.clone().ok_or_else(|| {
                DefinitionError::SchemaError("property_truthy lose event requires 'entity_type'".into())
            })?;
            let property = doc
                .property
                .clone()
                .ok_or_else(|| DefinitionError::SchemaError("property_truthy lose event requires 'property'".into()))?;
            LoseEvent::PropertyTruthy { entity_type, property }
        }
        other => return Err(DefinitionError::SchemaError(format!("unknown lose event '{other}'"))),
    };

    let transform = match &doc.effects.transform {
        Some(t) => {
            let type_tag = doc
                .effects
                .destroy_type
                .clone()
                .or_else(|| doc.entity_type.clone())
                .ok_or_else(|| DefinitionError::SchemaError("lose clause transform requires a target entity_type".into()))?;
            Some((type_tag, definition_loader::transform_from_doc(t)?))
        }
        None => None,
    };

    Ok(LoseClause {
        event,
        effects: LoseSideEffects {
            lose_life: doc.effects.lose_life,
            destroy_type: doc.effects.destroy_type.clone(),
            transform,
            clear_property: doc
                .effects
                .clear_property
                .clone()
                .and_then(|p| doc.entity_type.clone().map(|t| (t, p))),
        },
    })
}

fn win_condition_from_doc(
    kind: &str,
    target: &Option<serde_yaml::Value>,
) -> Result<WinCondition, DefinitionError> {
    let missing = || DefinitionError::SchemaError(format!("win_condition '{kind}' requires 'win_target'"));
    match kind {
        "destroy_all" => {
            let base_type = target
                .as_ref()
                .and_then(|v| v.as_str())
                .ok_or_else(missing)?
                .to_string();
            Ok(WinCondition::DestroyAll { base_type })
        }
        "reach_score" => {
            let target = target.as_ref().and_then(|v| v.as_i64()).ok_or_else(missing)?;
            Ok(WinCondition::ReachScore { target })
        }
        "survive_time" => {
            let seconds = target.as_ref().and_then(|v| v.as_f64()).ok_or_else(missing)?;
            Ok(WinCondition::SurviveTime { seconds })
        }
        "survival" => {
            let max_misses = target.as_ref().and_then(|v| v.as_i64()).ok_or_else(missing)? as i32;
            Ok(WinCondition::Survival { max_misses })
        }
        other => Err(DefinitionError::SchemaError(format!("unknown win_condition '{other}'"))),
    }
}

/// Appends a legacy `collision_behaviors` entry (`source -> target ->
/// action`) as a plain `enter`-triggered interaction on the source type,
/// after any interactions already declared or inherited on that type —
/// this mapping is additive, never overriding (§6: "legacy").
fn apply_collision_behaviors(
    definitions: &mut HashMap<String, EntityTypeDefinition>,
    collision_behaviors: &HashMap<String, HashMap<String, String>>,
) {
    for (source, targets) in collision_behaviors {
        let Some(def) = definitions.get_mut(source) else {
            tracing::warn!(source, "collision_behaviors references unknown source type");
            continue;
        };
        for (target, action) in targets {
            def.interactions.entry(TargetKey::parse(target)).or_insert_with(Vec::new).push(Interaction {
                trigger: TriggerMode::Enter,
                filter: None,
                action: action.clone(),
                modifier: OrderedMap::new(),
            });
        }
    }
}

/// Applies the game-level `defaults:` mapping as a lowest-priority
/// fallback for every entity type's own sentinel-unset fields, before
/// `extends` resolution runs (so an explicit `extends` chain still wins
/// over these defaults).
fn apply_game_defaults(
    entity_docs: &mut HashMap<String, EntityTypeDoc>,
    defaults_raw: &serde_yaml::Mapping,
) -> Result<(), EngineError> {
    let template: EntityTypeDoc = serde_yaml::from_value(serde_yaml::Value::Mapping(defaults_raw.clone()))
        .map_err(|e| DefinitionError::SchemaError(format!("defaults: {e}")))?;
    for doc in entity_docs.values_mut() {
        if doc.width.is_none() {
            doc.width = template.width;
        }
        if doc.height.is_none() {
            doc.height = template.height;
        }
        if doc.color.is_none() {
            doc.color = template.color.clone();
        }
        if doc.sprite.is_none() {
            doc.sprite = template.sprite.clone();
        }
        if doc.health.is_none() {
            doc.health = template.health;
        }
        if doc.point_value.is_none() {
            doc.point_value = template.point_value;
        }
    }
    Ok(())
}

/// Loads one `inline_*` mapping (name -> script body, the body missing
/// the `type:` field a standalone script document requires since it's
/// implied by which `inline_*` map the entry came from) through
/// `ScriptLoader::load_inline`, injecting that field before parsing.
fn load_inline_scripts(
    loader: &ScriptLoader,
    raw: &serde_yaml::Mapping,
    script_type: &str,
) -> Result<Vec<ScriptMetadata>, EngineError> {
    let mut out = Vec::with_capacity(raw.len());
    for (key, value) in raw {
        let Some(name) = key.as_str() else { continue };
        let mut doc = value
            .as_mapping()
            .cloned()
            .ok_or_else(|| EngineError::Config(format!("inline script '{name}' must be a mapping")))?;
        doc.insert("type".into(), script_type.into());
        let meta = loader
            .load_inline(serde_yaml::Value::Mapping(doc), name)
            .map_err(|e| EngineError::Config(format!("inline {script_type} '{name}': {e}")))?;
        out.push(meta);
    }
    Ok(out)
}

/// Parses and fully resolves a game definition document: entity type
/// `extends` chains, behaviour bundle expansion against each type's own
/// `behavior_config`, legacy collision behaviours, win/lose conditions,
/// asset registration, and inline script bodies. `bundles` are
/// pre-loaded behaviour bundles (by name) available to expand against
/// `behaviors:` lists; `script_loader` parses the `inline_*` maps.
pub fn parse_game_definition(
    raw: &str,
    bundles: &HashMap<String, BehaviorBundle>,
    script_loader: &ScriptLoader,
) -> Result<GameDefinition, EngineError> {
    let doc: GameDefDoc = serde_yaml::from_str(raw)?;

    let mut entity_docs: HashMap<String, EntityTypeDoc> =
        definition_loader::parse_entity_type_docs(&doc.entity_types)?;
    if !doc.defaults.is_empty() {
        apply_game_defaults(&mut entity_docs, &doc.defaults)?;
    }
    let mut entity_types = definition_loader::resolve_inheritance(&entity_docs)?;

    for def in entity_types.values_mut() {
        for behavior_name in def.behaviors.clone() {
            if let Some(bundle) = bundles.get(&behavior_name) {
                behavior_loader::expand_into(def, bundle);
            } else {
                tracing::warn!(behavior = %behavior_name, type_tag = %def.type_tag, "referenced behaviour bundle not loaded");
            }
        }
    }

    apply_collision_behaviors(&mut entity_types, &doc.collision_behaviors);

    let lose_conditions = doc
        .lose_conditions
        .iter()
        .map(lose_clause_from_doc)
        .collect::<Result<Vec<_>, _>>()?;

    let win_condition = match &doc.win_condition {
        Some(kind) => Some(win_condition_from_doc(kind, &doc.win_target)?),
        None => None,
    };

    let assets = asset_registry::parse_assets_mapping(&doc.assets)?;

    let mut inline_scripts = Vec::new();
    inline_scripts.extend(load_inline_scripts(script_loader, &doc.inline_behaviors, "behavior")?);
    inline_scripts.extend(load_inline_scripts(
        script_loader,
        &doc.inline_collision_actions,
        "collision_action",
    )?);
    inline_scripts.extend(load_inline_scripts(script_loader, &doc.inline_generators, "generator")?);
    inline_scripts.extend(load_inline_scripts(
        script_loader,
        &doc.inline_input_actions,
        "input_action",
    )?);

    Ok(GameDefinition {
        name: doc.name,
        description: doc.description,
        version: doc.version,
        author: doc.author,
        screen_width: doc.screen_width,
        screen_height: doc.screen_height,
        background_color: doc.background_color.map(|c| (c.0, c.1, c.2)).unwrap_or((0, 0, 0)),
        entity_types,
        legacy_collision_pairs: doc.collisions,
        input_mapping: doc.input_mapping,
        global_on_input: doc.global_on_input,
        lose_conditions,
        player: doc.player.map(|p| PlayerSpec { entity_type: p.entity_type, spawn_x: p.spawn_x, spawn_y: p.spawn_y }),
        win_condition,
        lose_on_player_death: doc.lose_on_player_death,
        default_layout: doc.default_layout,
        assets,
        inline_scripts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_fs::ContentFs;

    fn loader(fs: &ContentFs) -> ScriptLoader<'_> {
        ScriptLoader::new(fs, true)
    }

    #[test]
    fn minimal_definition_parses_with_defaults() {
        let yaml = r#"
name: Breakout Clone
entity_types:
  ball:
    width: 10
"#;
        let fs = ContentFs::new();
        let def = parse_game_definition(yaml, &HashMap::new(), &loader(&fs)).unwrap();
        assert_eq!(def.name, "Breakout Clone");
        assert_eq!(def.screen_width, 800.0);
        assert_eq!(def.entity_types["ball"].default_width, 10.0);
    }

    #[test]
    fn win_condition_and_target_are_parsed() {
        let yaml = r#"
name: Arena
win_condition: reach_score
win_target: 1000
entity_types: {}
"#;
        let fs = ContentFs::new();
        let def = parse_game_definition(yaml, &HashMap::new(), &loader(&fs)).unwrap();
        assert!(matches!(def.win_condition, Some(WinCondition::ReachScore { target: 1000 })));
    }

    #[test]
    fn collision_behaviors_append_interaction_on_source_type() {
        let yaml = r#"
name: Arena
entity_types:
  player: {}
  coin: {}
collision_behaviors:
  player:
    coin: pickup
"#;
        let fs = ContentFs::new();
        let def = parse_game_definition(yaml, &HashMap::new(), &loader(&fs)).unwrap();
        let clauses = &def.entity_types["player"].interactions[&TargetKey::parse("coin")];
        assert_eq!(clauses[0].action, "pickup");
    }

    #[test]
    fn behavior_bundles_expand_against_type_config() {
        let mut bundles = HashMap::new();
        let bundle_yaml = r#"
config:
  range:
    default: 50
interactions:
  pointer:
    - trigger: continuous
      filter: "distance < $config.range"
      action: attract
"#;
        bundles.insert(
            "gravity".to_string(),
            behavior_loader::parse_behavior_bundle("gravity", bundle_yaml).unwrap(),
        );
        let yaml = r#"
name: Particles
entity_types:
  particle:
    behaviors: [gravity]
"#;
        let fs = ContentFs::new();
        let def = parse_game_definition(yaml, &bundles, &loader(&fs)).unwrap();
        let clause = &def.entity_types["particle"].interactions[&TargetKey::parse("pointer")][0];
        assert_eq!(clause.filter.as_deref(), Some("distance < 50"));
    }

    #[test]
    fn game_level_defaults_fill_unset_entity_fields() {
        let yaml = r#"
name: Breakout
defaults:
  width: 24
  color: gray
entity_types:
  ball:
    color: red
  brick: {}
"#;
        let fs = ContentFs::new();
        let def = parse_game_definition(yaml, &HashMap::new(), &loader(&fs)).unwrap();
        assert_eq!(def.entity_types["ball"].default_width, 24.0);
        assert_eq!(def.entity_types["ball"].default_color, "red");
        assert_eq!(def.entity_types["brick"].default_color, "gray");
    }

    #[test]
    fn lose_clause_with_screen_exit_parses() {
        let yaml = r#"
name: Breakout
entity_types:
  ball: {}
lose_conditions:
  - event: screen_exit
    entity_type: ball
    edge: bottom
    effects:
      lose_life: true
"#;
        let fs = ContentFs::new();
        let def = parse_game_definition(yaml, &HashMap::new(), &loader(&fs)).unwrap();
        assert_eq!(def.lose_conditions.len(), 1);
        assert!(def.lose_conditions[0].effects.lose_life);
    }

    #[test]
    fn inline_behavior_script_is_loaded_with_injected_type() {
        let yaml = r#"
name: Breakout
entity_types: {}
inline_behaviors:
  spin:
    lua: |
      return { on_update = function(id, dt) end }
"#;
        let fs = ContentFs::new();
        let def = parse_game_definition(yaml, &HashMap::new(), &loader(&fs)).unwrap();
        assert_eq!(def.inline_scripts.len(), 1);
        assert_eq!(def.inline_scripts[0].name, "spin");
        assert_eq!(def.inline_scripts[0].script_type, ams_core::ScriptType::Behavior);
    }
}
