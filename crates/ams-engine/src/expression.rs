//! Short expression evaluation (§4.3), used for data-driven computed
//! values inside YAML (e.g. a spawn velocity computed from an index).

use mlua::{Table, Value};

/// Wraps `src` so it can be evaluated as a single return value regardless
/// of whether it is a bare expression or a small block with locals.
pub fn wrap_for_eval(src: &str) -> String {
    let needs_wrapping = src.contains('\n') || src.trim_start().starts_with("local ");
    if needs_wrapping {
        format!("return (function()\n{src}\nend)()")
    } else {
        format!("return ({src})")
    }
}

pub fn eval_expression(lua: &mlua::Lua, env: Table, src: &str) -> mlua::Result<Value> {
    lua.load(wrap_for_eval(src)).set_environment(env).eval::<Value>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_expression_is_not_wrapped_in_function() {
        assert_eq!(wrap_for_eval("1 + 2"), "return (1 + 2)");
    }

    #[test]
    fn multiline_block_is_wrapped() {
        let wrapped = wrap_for_eval("local x = 1\nreturn x + 1");
        assert!(wrapped.starts_with("return (function()"));
    }

    #[test]
    fn eval_expression_evaluates_bare_arithmetic() {
        let lua = mlua::Lua::new();
        let env = crate::sandbox::build_sandbox_env(&lua).unwrap();
        let v = eval_expression(&lua, env, "2 + 3").unwrap();
        assert_eq!(v.as_i64(), Some(5));
    }
}
