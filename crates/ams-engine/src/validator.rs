//! Sandbox escape probes (§4.3). Run once at runtime startup as
//! defence-in-depth: if any probe succeeds, initialisation is refused
//! rather than silently running an insecure sandbox.

use crate::sandbox::build_sandbox_env;
use ams_core::ScriptError;
use mlua::{Lua, Value};

const PROBES: &[&str] = &[
    "io", "os", "debug", "load", "loadstring", "dofile", "loadfile", "require",
    "getmetatable", "setmetatable", "rawget", "rawset", "rawequal", "rawlen",
    "collectgarbage", "coroutine", "_G", "package",
];

pub fn validate_sandbox(lua: &Lua) -> Result<(), ScriptError> {
    let env = build_sandbox_env(lua).map_err(|e| ScriptError::SandboxViolation(e.to_string()))?;
    for name in PROBES {
        let v: Value = env
            .get(*name)
            .map_err(|e| ScriptError::SandboxViolation(e.to_string()))?;
        if !v.is_nil() {
            return Err(ScriptError::SandboxViolation(format!(
                "global '{name}' is reachable from the sandboxed environment"
            )));
        }
    }

    let chunk = lua
        .load("return string.dump")
        .set_environment(env.clone())
        .eval::<Value>()
        .map_err(|e| ScriptError::SandboxViolation(e.to_string()))?;
    if !chunk.is_nil() {
        return Err(ScriptError::SandboxViolation(
            "string.dump is reachable from the sandboxed environment".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sandbox_passes_validation() {
        let lua = Lua::new();
        assert!(validate_sandbox(&lua).is_ok());
    }
}
