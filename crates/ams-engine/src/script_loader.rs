//! Script bundle loading and metadata validation (§4.2). Parses and
//! validates only; execution belongs to `runtime::ScriptRuntime`.

use crate::content_fs::ContentFs;
use ams_core::value::{BridgeValue, OrderedMap};
use ams_core::{ScriptMetadata, ScriptOrigin, ScriptProvides, ScriptRequires, ScriptType};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ScriptLoadError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    UnknownType(String),
    MissingSource(String),
}

impl fmt::Display for ScriptLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Parse(e) => write!(f, "script document parse error: {e}"),
            Self::UnknownType(t) => write!(f, "unknown script type '{t}'"),
            Self::MissingSource(name) => write!(f, "script '{name}' has no 'lua' source field"),
        }
    }
}

impl std::error::Error for ScriptLoadError {}

#[derive(Debug, Deserialize)]
struct ScriptDocument {
    #[serde(rename = "type")]
    script_type: String,
    name: Option<String>,
    lua: String,
    description: Option<String>,
    version: Option<String>,
    author: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    config: Option<serde_yaml::Value>,
    args: Option<serde_yaml::Value>,
    #[serde(default)]
    requires: RequiresDoc,
    #[serde(default)]
    provides: ProvidesDoc,
}

#[derive(Debug, Default, Deserialize)]
struct RequiresDoc {
    #[serde(default)]
    behaviors: Vec<String>,
    #[serde(default)]
    properties: Vec<String>,
    #[serde(default)]
    api_methods: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProvidesDoc {
    #[serde(default)]
    hooks: Vec<String>,
    #[serde(default)]
    properties: Vec<String>,
}

pub struct ScriptLoader<'a> {
    pub strict: bool,
    pub content_fs: &'a ContentFs,
}

impl<'a> ScriptLoader<'a> {
    pub fn new(content_fs: &'a ContentFs, strict: bool) -> Self {
        ScriptLoader { strict, content_fs }
    }

    pub fn load_file(&self, path: &str) -> Result<ScriptMetadata, ScriptLoadError> {
        let text = self.content_fs.read_text(path).map_err(|e| {
            ScriptLoadError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()))
        })?;
        let stem = PathBuf::from(path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        self.parse(&text, stem, ScriptOrigin::File(PathBuf::from(path)))
    }

    pub fn load_inline(&self, doc: serde_yaml::Value, default_name: &str) -> Result<ScriptMetadata, ScriptLoadError> {
        let text = serde_yaml::to_string(&doc).map_err(ScriptLoadError::Parse)?;
        self.parse(&text, default_name.to_string(), ScriptOrigin::Inline)
    }

    pub fn load_dir(&self, dir: &str, script_type: ScriptType) -> Vec<ScriptMetadata> {
        let mut out = Vec::new();
        for rel in self.content_fs.walk_files(dir, &["*.yaml", "*.yml"]) {
            match self.load_file(&rel) {
                Ok(meta) if meta.script_type == script_type => out.push(meta),
                Ok(_) => {}
                Err(e) => {
                    if self.strict {
                        tracing::error!(path = %rel, error = %e, "script load failed");
                    } else {
                        tracing::warn!(path = %rel, error = %e, "script load failed, skipping");
                    }
                }
            }
        }
        out
    }

    fn parse(&self, text: &str, stem: String, origin: ScriptOrigin) -> Result<ScriptMetadata, ScriptLoadError> {
        let doc: ScriptDocument = serde_yaml::from_str(text).map_err(ScriptLoadError::Parse)?;
        let script_type = ScriptType::parse(&doc.script_type)
            .ok_or_else(|| ScriptLoadError::UnknownType(doc.script_type.clone()))?;
        if doc.lua.trim().is_empty() {
            return Err(ScriptLoadError::MissingSource(stem));
        }
        Ok(ScriptMetadata {
            name: doc.name.unwrap_or(stem),
            script_type,
            source: doc.lua,
            description: doc.description,
            version: doc.version,
            author: doc.author,
            tags: doc.tags,
            config_schema: doc.config.map(value_to_ordered_map),
            args_schema: doc.args.map(value_to_ordered_map),
            provides: ScriptProvides {
                hooks: doc.provides.hooks,
                properties: doc.provides.properties,
            },
            requires: ScriptRequires {
                behaviors: doc.requires.behaviors,
                properties: doc.requires.properties,
                api_methods: doc.requires.api_methods,
            },
            origin,
        })
    }
}

fn value_to_ordered_map(v: serde_yaml::Value) -> OrderedMap<BridgeValue> {
    let mut map = OrderedMap::new();
    if let serde_yaml::Value::Mapping(m) = v {
        for (k, val) in m {
            if let Some(key) = k.as_str() {
                map.insert(key.to_string(), crate::yaml_bridge::yaml_to_bridge(&val));
            }
        }
    }
    map
}
