use std::fmt;

/// Errors raised while loading and resolving entity-type definitions
/// (extends chains, behaviour expansion, schema shape).
#[derive(Debug)]
pub enum DefinitionError {
    MissingParent { type_tag: String, parent: String },
    InheritanceCycle { type_tag: String, chain: Vec<String> },
    UnknownBehavior { type_tag: String, behavior: String },
    SchemaError(String),
}

impl fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParent { type_tag, parent } => {
                write!(f, "entity type '{type_tag}' extends missing parent '{parent}'")
            }
            Self::InheritanceCycle { type_tag, chain } => {
                write!(f, "inheritance cycle detected at '{type_tag}': {}", chain.join(" -> "))
            }
            Self::UnknownBehavior { type_tag, behavior } => {
                write!(f, "entity type '{type_tag}' references unknown behaviour '{behavior}'")
            }
            Self::SchemaError(msg) => write!(f, "schema error: {msg}"),
        }
    }
}

impl std::error::Error for DefinitionError {}

/// Errors raised while loading or compiling a script. These are recovered
/// at the load boundary: the affected script is simply not registered.
#[derive(Debug)]
pub enum ScriptError {
    Syntax { script: String, message: String },
    Runtime { script: String, method: String, message: String },
    MissingMethod { script: String, method: String },
    ConversionFailure { script: String, detail: String },
    SandboxViolation(String),
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { script, message } => write!(f, "script '{script}' failed to load: {message}"),
            Self::Runtime { script, method, message } => {
                write!(f, "script '{script}'.{method} raised an error: {message}")
            }
            Self::MissingMethod { script, method } => {
                write!(f, "script '{script}' has no method '{method}'")
            }
            Self::ConversionFailure { script, detail } => {
                write!(f, "script '{script}' returned a non-bridgeable value: {detail}")
            }
            Self::SandboxViolation(detail) => write!(f, "sandbox validation failed: {detail}"),
        }
    }
}

impl std::error::Error for ScriptError {}

/// Top-level engine error: I/O, parsing, and content-filesystem failures
/// that propagate all the way to the CLI.
#[derive(Debug)]
pub enum EngineError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Json(serde_json::Error),
    ResourceNotFound(String),
    NoSystemPath(String),
    Definition(DefinitionError),
    Script(ScriptError),
    Config(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Yaml(e) => write!(f, "YAML parse error: {e}"),
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::ResourceNotFound(path) => write!(f, "resource not found: {path}"),
            Self::NoSystemPath(path) => write!(f, "'{path}' has no backing system path"),
            Self::Definition(e) => write!(f, "{e}"),
            Self::Script(e) => write!(f, "{e}"),
            Self::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml(e)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<DefinitionError> for EngineError {
    fn from(e: DefinitionError) -> Self {
        Self::Definition(e)
    }
}

impl From<ScriptError> for EngineError {
    fn from(e: ScriptError) -> Self {
        Self::Script(e)
    }
}
