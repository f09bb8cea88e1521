//! The sandboxed script runtime (§4.3). Each registered script is loaded
//! once into its own allow-list environment and expected to `return` a
//! table of named methods — the subroutine registry then holds a
//! `LuaRegistryKey` per (type, name) rather than, as in a simpler
//! per-entity-environment design, one environment per entity. Entities
//! address scripts by name; the runtime never hands out host references.

use crate::bridge_value::{from_lua, to_lua};
use crate::sandbox::build_sandbox_env;
use crate::validator::validate_sandbox;
use ams_core::value::BridgeValue;
use ams_core::{ScriptError, ScriptMetadata, ScriptType};
use mlua::{Lua, RegistryKey, Table, Value, Variadic};
use std::collections::HashMap;

pub struct ScriptRuntime {
    lua: Lua,
    registry: HashMap<(ScriptType, String), RegistryKey>,
    metadata: HashMap<(ScriptType, String), ScriptMetadata>,
    pub log_calls: bool,
}

impl ScriptRuntime {
    pub fn new() -> Result<Self, ScriptError> {
        let lua = Lua::new();
        validate_sandbox(&lua)?;
        Ok(ScriptRuntime {
            lua,
            registry: HashMap::new(),
            metadata: HashMap::new(),
            log_calls: false,
        })
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Installs the `ams` host namespace into every future script
    /// environment by stashing it in the registry under a fixed key;
    /// `sandbox_env_with_api` below reads it back out when building a
    /// fresh per-script environment.
    pub fn install_api(&mut self, ams_table: Table) -> Result<(), ScriptError> {
        self.lua
            .set_named_registry_value("__ams_api", ams_table)
            .map_err(|e| ScriptError::SandboxViolation(e.to_string()))
    }

    fn fresh_env(&self) -> mlua::Result<Table> {
        let env = build_sandbox_env(&self.lua)?;
        let api: Value = self.lua.named_registry_value("__ams_api")?;
        env.set("ams", api)?;
        Ok(env)
    }

    /// Loads and executes `meta.source`, expecting it to evaluate to a
    /// table. Stores that table in the subroutine registry under
    /// `(meta.script_type, meta.name)`.
    pub fn register_script(&mut self, meta: ScriptMetadata) -> Result<(), ScriptError> {
        let env = self.fresh_env().map_err(|e| ScriptError::Syntax {
            script: meta.name.clone(),
            message: e.to_string(),
        })?;
        let chunk = self
            .lua
            .load(&meta.source)
            .set_name(&meta.name)
            .set_environment(env);
        let value: Value = chunk.eval().map_err(|e| ScriptError::Syntax {
            script: meta.name.clone(),
            message: e.to_string(),
        })?;
        let table = match value {
            Value::Table(t) => t,
            other => {
                return Err(ScriptError::ConversionFailure {
                    script: meta.name.clone(),
                    detail: format!("script must return a table, got {}", other.type_name()),
                })
            }
        };
        let key = self
            .lua
            .create_registry_value(table)
            .map_err(|e| ScriptError::Syntax { script: meta.name.clone(), message: e.to_string() })?;
        let map_key = (meta.script_type, meta.name.clone());
        self.registry.insert(map_key.clone(), key);
        self.metadata.insert(map_key, meta);
        Ok(())
    }

    pub fn has_method(&self, script_type: ScriptType, name: &str, method: &str) -> bool {
        self.try_get_method(script_type, name, method).is_ok_and(|m| m.is_some())
    }

    fn try_get_method(&self, script_type: ScriptType, name: &str, method: &str) -> mlua::Result<Option<mlua::Function>> {
        let Some(key) = self.registry.get(&(script_type, name.to_string())) else {
            return Ok(None);
        };
        let table: Table = self.lua.registry_value(key)?;
        let f: Value = table.get(method)?;
        Ok(match f {
            Value::Function(f) => Some(f),
            _ => None,
        })
    }

    /// Calls `method` on the named script of `script_type` if it exists.
    /// Missing methods are a no-op (not every behaviour implements every
    /// hook); errors raised by the script are caught and reported, never
    /// propagated — a script can never crash the engine (§4.3, §4.6).
    pub fn call_method(
        &self,
        script_type: ScriptType,
        name: &str,
        method: &str,
        args: &[BridgeValue],
    ) -> Result<Option<BridgeValue>, ScriptError> {
        if self.log_calls {
            tracing::trace!(script = name, method, "dispatching script call");
        }
        let f = match self.try_get_method(script_type, name, method) {
            Ok(Some(f)) => f,
            Ok(None) => return Ok(None),
            Err(e) => {
                return Err(ScriptError::Runtime { script: name.to_string(), method: method.to_string(), message: e.to_string() })
            }
        };
        let lua_args: Variadic<Value> = args
            .iter()
            .map(|v| to_lua(&self.lua, v))
            .collect::<mlua::Result<Vec<_>>>()
            .map_err(|e| ScriptError::Runtime { script: name.to_string(), method: method.to_string(), message: e.to_string() })?
            .into();
        let result: Value = f.call(lua_args).map_err(|e| ScriptError::Runtime {
            script: name.to_string(),
            method: method.to_string(),
            message: e.to_string(),
        })?;
        if result.is_nil() {
            return Ok(None);
        }
        from_lua(&result)
            .map(Some)
            .map_err(|detail| ScriptError::ConversionFailure { script: name.to_string(), detail })
    }

    pub fn eval_expression(&self, env_extra: &Table, src: &str) -> mlua::Result<Value> {
        let env = self.fresh_env()?;
        for pair in env_extra.clone().pairs::<Value, Value>() {
            let (k, v) = pair?;
            env.set(k, v)?;
        }
        crate::expression::eval_expression(&self.lua, env, src)
    }

    pub fn metadata(&self, script_type: ScriptType, name: &str) -> Option<&ScriptMetadata> {
        self.metadata.get(&(script_type, name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(script_type: ScriptType, name: &str, source: &str) -> ScriptMetadata {
        ScriptMetadata {
            name: name.to_string(),
            script_type,
            source: source.to_string(),
            description: None,
            version: None,
            author: None,
            tags: Vec::new(),
            config_schema: None,
            args_schema: None,
            provides: Default::default(),
            requires: Default::default(),
            origin: ams_core::ScriptOrigin::Inline,
        }
    }

    #[test]
    fn registers_and_calls_a_behavior_method() {
        let mut rt = ScriptRuntime::new().unwrap();
        rt.install_api(rt.lua().create_table().unwrap()).unwrap();
        rt.register_script(meta(
            ScriptType::Behavior,
            "fall",
            "return { on_update = function(id, dt) return id end }",
        ))
        .unwrap();
        let result = rt
            .call_method(ScriptType::Behavior, "fall", "on_update", &[BridgeValue::Str("e1".into()), BridgeValue::Float(0.016)])
            .unwrap();
        assert_eq!(result, Some(BridgeValue::Str("e1".into())));
    }

    #[test]
    fn missing_method_is_not_an_error() {
        let mut rt = ScriptRuntime::new().unwrap();
        rt.install_api(rt.lua().create_table().unwrap()).unwrap();
        rt.register_script(meta(ScriptType::Behavior, "empty", "return {}")).unwrap();
        let result = rt.call_method(ScriptType::Behavior, "empty", "on_spawn", &[]).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn script_runtime_error_is_caught_not_propagated_as_panic() {
        let mut rt = ScriptRuntime::new().unwrap();
        rt.install_api(rt.lua().create_table().unwrap()).unwrap();
        rt.register_script(meta(
            ScriptType::Behavior,
            "broken",
            "return { on_update = function(id) error('boom') end }",
        ))
        .unwrap();
        let result = rt.call_method(ScriptType::Behavior, "broken", "on_update", &[BridgeValue::Str("e".into())]);
        assert!(matches!(result, Err(ScriptError::Runtime { .. })));
    }

    #[test]
    fn sandboxed_script_cannot_reach_io() {
        let mut rt = ScriptRuntime::new().unwrap();
        rt.install_api(rt.lua().create_table().unwrap()).unwrap();
        let err = rt.register_script(meta(ScriptType::Behavior, "evil", "return { f = function() return io.open end }"));
        assert!(err.is_ok()); // registering succeeds; `io` just resolves to nil inside the call
        let result = rt.call_method(ScriptType::Behavior, "evil", "f", &[]).unwrap();
        assert_eq!(result, None);
    }
}
