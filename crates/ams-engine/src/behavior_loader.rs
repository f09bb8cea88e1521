//! Behaviour bundle loading and expansion (§4.4, §4.5). A bundle is a
//! reusable set of interaction clauses parameterised by `$config.<name>`
//! references; expanding one against an owning entity type substitutes
//! those references and merges the result into the type's own
//! interaction map, with the entity's own declared interactions (already
//! resolved onto the type during inheritance) taking priority on a
//! target-key conflict.

use ams_core::value::{BridgeValue, OrderedMap};
use ams_core::{
    BehaviorBundle, ConfigParam, DefinitionError, EntityTypeDefinition, Interaction, TargetKey,
    TriggerMode,
};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub(crate) struct InteractionDoc {
    #[serde(default = "default_trigger")]
    trigger: String,
    #[serde(default)]
    filter: Option<String>,
    action: String,
    #[serde(default)]
    modifier: serde_yaml::Mapping,
}

fn default_trigger() -> String {
    "continuous".to_string()
}

fn interaction_from_doc(doc: &InteractionDoc) -> Result<Interaction, DefinitionError> {
    Ok(Interaction {
        trigger: parse_trigger(&doc.trigger)?,
        filter: doc.filter.clone(),
        action: doc.action.clone(),
        modifier: modifier_to_ordered(&doc.modifier),
    })
}

/// Parses an entity type's own `interactions:` mapping (target key ->
/// list of clauses), the same document shape a behaviour bundle uses,
/// but declared directly on the owning type rather than via `$config`
/// substitution.
pub(crate) fn parse_interactions_mapping(
    raw: &serde_yaml::Mapping,
) -> Result<HashMap<TargetKey, Vec<Interaction>>, DefinitionError> {
    let mut out = HashMap::new();
    for (target_key, value) in raw {
        let Some(target_raw) = target_key.as_str() else { continue };
        let docs: Vec<InteractionDoc> = serde_yaml::from_value(value.clone())
            .map_err(|e| DefinitionError::SchemaError(format!("interactions '{target_raw}': {e}")))?;
        let mut clauses = Vec::with_capacity(docs.len());
        for doc in &docs {
            clauses.push(interaction_from_doc(doc)?);
        }
        out.insert(TargetKey::parse(target_raw), clauses);
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct ConfigParamDoc {
    #[serde(default)]
    default: serde_yaml::Value,
}

#[derive(Debug, Deserialize)]
struct BehaviorBundleDoc {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    config: HashMap<String, ConfigParamDoc>,
    #[serde(default)]
    interactions: HashMap<String, Vec<InteractionDoc>>,
}

fn parse_trigger(raw: &str) -> Result<TriggerMode, DefinitionError> {
    match raw {
        "enter" => Ok(TriggerMode::Enter),
        "continuous" => Ok(TriggerMode::Continuous),
        "exit" => Ok(TriggerMode::Exit),
        other => Err(DefinitionError::SchemaError(format!("unknown trigger mode '{other}'"))),
    }
}

fn modifier_to_ordered(map: &serde_yaml::Mapping) -> OrderedMap<BridgeValue> {
    let mut out = OrderedMap::new();
    for (k, v) in map {
        if let Some(k) = k.as_str() {
            out.insert(k.to_string(), crate::yaml_bridge::yaml_to_bridge(v));
        }
    }
    out
}

/// Parses one `behaviors/<name>.yaml` document into a `BehaviorBundle`,
/// leaving `$config.*` references untouched inside `modifier`/`filter`
/// strings — those are substituted at expansion time, not load time.
pub fn parse_behavior_bundle(name: &str, raw: &str) -> Result<BehaviorBundle, DefinitionError> {
    let doc: BehaviorBundleDoc = serde_yaml::from_str(raw)
        .map_err(|e| DefinitionError::SchemaError(format!("behaviour '{name}': {e}")))?;
    let mut bundle = BehaviorBundle::new(name);
    bundle.description = doc.description;
    for (k, v) in doc.config {
        bundle
            .config
            .insert(k, ConfigParam { default: crate::yaml_bridge::yaml_to_bridge(&v.default) });
    }
    for (target_raw, clauses) in &doc.interactions {
        let key = TargetKey::parse(target_raw);
        let mut out_clauses = Vec::with_capacity(clauses.len());
        for c in clauses {
            out_clauses.push(interaction_from_doc(c)?);
        }
        bundle.interactions.insert(key, out_clauses);
    }
    Ok(bundle)
}

/// Replaces every `$config.<name>` token found in a string with the
/// stringified resolved config value. Filters and modifier string values
/// both go through this; non-string modifier values are substituted
/// whole (the entire value becomes the resolved config value) rather
/// than token-replaced.
fn substitute_string(template: &str, resolved: &HashMap<String, BridgeValue>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find("$config.") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + "$config.".len()..];
        let end = after
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..end];
        match resolved.get(name) {
            Some(v) => out.push_str(&bridge_display(v)),
            None => out.push_str(&format!("$config.{name}")),
        }
        rest = &after[end..];
    }
    out.push_str(rest);
    out
}

fn bridge_display(v: &BridgeValue) -> String {
    match v {
        BridgeValue::Nil => "nil".to_string(),
        BridgeValue::Bool(b) => b.to_string(),
        BridgeValue::Int(i) => i.to_string(),
        BridgeValue::Float(f) => f.to_string(),
        BridgeValue::Str(s) => s.clone(),
        BridgeValue::Table(_) => String::new(),
    }
}

fn substitute_value(value: &BridgeValue, resolved: &HashMap<String, BridgeValue>) -> BridgeValue {
    match value {
        BridgeValue::Str(s) => {
            if let Some(name) = s.strip_prefix("$config.") {
                if let Some(v) = resolved.get(name) {
                    return v.clone();
                }
            }
            BridgeValue::Str(substitute_string(s, resolved))
        }
        other => other.clone(),
    }
}

/// Expands `bundle` against `owner`'s `behavior_config` entry for the
/// same name (falling back to the bundle's own parameter defaults), and
/// merges the resulting interactions into `owner.interactions`. Clauses
/// already present on `owner` for a given target key win; the bundle's
/// clauses for new targets are appended.
pub fn expand_into(owner: &mut EntityTypeDefinition, bundle: &BehaviorBundle) {
    let mut resolved: HashMap<String, BridgeValue> = HashMap::new();
    for (name, param) in &bundle.config {
        let value = owner
            .behavior_config
            .get(&bundle.name)
            .and_then(|cfg| cfg.get(name))
            .cloned()
            .unwrap_or_else(|| param.default.clone());
        resolved.insert(name.clone(), value);
    }

    for (target, clauses) in &bundle.interactions {
        let expanded: Vec<Interaction> = clauses
            .iter()
            .map(|c| Interaction {
                trigger: c.trigger,
                filter: c.filter.as_ref().map(|f| substitute_string(f, &resolved)),
                action: c.action.clone(),
                modifier: c
                    .modifier
                    .iter()
                    .map(|(k, v)| (k.clone(), substitute_value(v, &resolved)))
                    .collect(),
            })
            .collect();
        owner.interactions.entry(target.clone()).or_insert_with(Vec::new).extend(expanded);
    }
}
