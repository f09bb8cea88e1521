//! Asset definition documents (§6): sprites and sounds registered either
//! standalone or as a named map of regions inside a sheet, referenced by
//! file path, inline data URI, or `@named-shared-file`.

use ams_core::DefinitionError;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Sprite,
    Sound,
}

#[derive(Debug, Clone)]
pub enum AssetRef {
    File(String),
    DataUri(String),
    SharedFile(String),
}

#[derive(Debug, Clone, Copy)]
pub struct SheetRegion {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone)]
pub struct AssetDefinition {
    pub name: String,
    pub kind: AssetKind,
    pub reference: AssetRef,
    pub regions: HashMap<String, SheetRegion>,
}

#[derive(Debug, Deserialize)]
struct AssetDoc {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    data_uri: Option<String>,
    #[serde(rename = "ref", default)]
    shared_ref: Option<String>,
    #[serde(default)]
    regions: HashMap<String, RegionDoc>,
}

#[derive(Debug, Deserialize)]
struct RegionDoc {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

fn parse_kind(raw: &str) -> Result<AssetKind, DefinitionError> {
    match raw {
        "sprite" => Ok(AssetKind::Sprite),
        "sound" => Ok(AssetKind::Sound),
        other => Err(DefinitionError::SchemaError(format!("unknown asset type '{other}'"))),
    }
}

fn parse_reference(name: &str, doc: &AssetDoc) -> Result<AssetRef, DefinitionError> {
    if let Some(shared) = &doc.shared_ref {
        let stripped = shared.strip_prefix('@').unwrap_or(shared);
        return Ok(AssetRef::SharedFile(stripped.to_string()));
    }
    if let Some(data_uri) = &doc.data_uri {
        return Ok(AssetRef::DataUri(data_uri.clone()));
    }
    if let Some(file) = &doc.file {
        return Ok(AssetRef::File(file.clone()));
    }
    Err(DefinitionError::SchemaError(format!(
        "asset '{name}' has no 'file', 'data_uri', or 'ref'"
    )))
}

/// Parses the top-level `assets` mapping (name -> asset doc) of a game
/// definition.
pub fn parse_assets_mapping(
    raw: &serde_yaml::Mapping,
) -> Result<HashMap<String, AssetDefinition>, DefinitionError> {
    let mut out = HashMap::new();
    for (key, value) in raw {
        let Some(name) = key.as_str() else { continue };
        let doc: AssetDoc = serde_yaml::from_value(value.clone())
            .map_err(|e| DefinitionError::SchemaError(format!("asset '{name}': {e}")))?;
        let kind = parse_kind(&doc.kind)?;
        let reference = parse_reference(name, &doc)?;
        let regions = doc
            .regions
            .iter()
            .map(|(k, r)| (k.clone(), SheetRegion { x: r.x, y: r.y, w: r.w, h: r.h }))
            .collect();
        out.insert(name.to_string(), AssetDefinition { name: name.to_string(), kind, reference, regions });
    }
    Ok(out)
}
