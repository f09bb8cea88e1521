//! Allow-list sandbox construction (§4.3). The chunk environment is built
//! from scratch — entries are copied in one at a time — rather than by
//! deleting unwanted entries from the interpreter's default globals. A new
//! global added by a future `mlua` upgrade is therefore invisible to
//! scripts by default instead of leaking until someone notices.

use mlua::{Lua, Table, Value};

/// Builds a fresh, empty table populated with exactly the globals scripts
/// are allowed to see, plus the host-provided `ams` namespace (installed
/// separately by `runtime::ScriptRuntime::new`).
pub fn build_sandbox_env(lua: &Lua) -> mlua::Result<Table> {
    let env = lua.create_table()?;
    let globals = lua.globals();

    for name in ["pairs", "ipairs", "next", "type", "tostring", "tonumber", "select", "pcall", "xpcall", "error", "assert", "unpack"] {
        if let Ok(v) = globals.get::<Value>(name) {
            if !v.is_nil() {
                env.set(name, v)?;
            }
        }
    }

    if let Ok(math) = globals.get::<Table>("math") {
        env.set("math", math)?;
    }

    if let Ok(string_lib) = globals.get::<Table>("string") {
        // `dump` allows bytecode serialisation (a sandbox-escape vector);
        // `rep` allows trivial memory-amplification DoS. Both removed.
        string_lib.set("dump", Value::Nil)?;
        string_lib.set("rep", Value::Nil)?;
        env.set("string", string_lib)?;
    }

    if let Ok(table_lib) = globals.get::<Table>("table") {
        env.set("table", table_lib)?;
    }

    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_env_exposes_only_whitelisted_globals() {
        let lua = Lua::new();
        let env = build_sandbox_env(&lua).unwrap();
        assert!(env.get::<Value>("pairs").unwrap().is_function());
        assert!(env.get::<Value>("io").unwrap().is_nil());
        assert!(env.get::<Value>("os").unwrap().is_nil());
        assert!(env.get::<Value>("debug").unwrap().is_nil());
        assert!(env.get::<Value>("load").unwrap().is_nil());
        assert!(env.get::<Value>("require").unwrap().is_nil());
    }

    #[test]
    fn string_dump_and_rep_are_removed() {
        let lua = Lua::new();
        let env = build_sandbox_env(&lua).unwrap();
        let string_lib: Table = env.get("string").unwrap();
        assert!(string_lib.get::<Value>("dump").unwrap().is_nil());
        assert!(string_lib.get::<Value>("rep").unwrap().is_nil());
        assert!(!string_lib.get::<Value>("format").unwrap().is_nil());
    }
}
