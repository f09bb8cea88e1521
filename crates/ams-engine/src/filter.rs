//! Interaction filter evaluation (§4.5). A filter is an expression string
//! evaluated the same way any other data-driven expression is (§4.3),
//! with `source`/`target`/`distance`/`angle` injected as globals.

use crate::runtime::ScriptRuntime;
use ams_core::Entity;
use mlua::{Table, Value};

fn entity_table(lua: &mlua::Lua, e: &Entity) -> mlua::Result<Table> {
    let t = lua.create_table()?;
    t.set("id", e.id.as_str())?;
    t.set("type", e.type_tag.as_str())?;
    t.set("base_type", e.base_type.as_str())?;
    t.set("x", e.x)?;
    t.set("y", e.y)?;
    t.set("vx", e.vx)?;
    t.set("vy", e.vy)?;
    t.set("w", e.w)?;
    t.set("h", e.h)?;
    t.set("health", e.health)?;
    t.set("point_value", e.point_value)?;
    t.set("color", e.color.as_str())?;
    t.set("visible", e.visible)?;
    let tags = lua.create_table()?;
    for (i, tag) in e.tags.iter().enumerate() {
        tags.set(i + 1, tag.as_str())?;
    }
    t.set("tags", tags)?;
    let props = lua.create_table()?;
    for (k, v) in e.properties.iter() {
        props.set(k.as_str(), crate::bridge_value::to_lua(lua, v)?)?;
    }
    t.set("properties", props)?;
    Ok(t)
}

/// Returns `false` (filter does not match) on evaluation error, logging
/// the failure — a malformed filter should never stop the tick (§7).
pub fn evaluate_filter(
    runtime: &ScriptRuntime,
    expr: &str,
    source: &Entity,
    target: Option<&Entity>,
    distance: Option<f64>,
    angle: Option<f64>,
) -> bool {
    let lua = runtime.lua();
    let ctx = match lua.create_table() {
        Ok(t) => t,
        Err(_) => return false,
    };
    if let Ok(t) = entity_table(lua, source) {
        let _ = ctx.set("source", t);
    }
    if let Some(target) = target {
        if let Ok(t) = entity_table(lua, target) {
            let _ = ctx.set("target", t);
        }
    } else {
        let _ = ctx.set("target", Value::Nil);
    }
    let _ = ctx.set("distance", distance);
    let _ = ctx.set("angle", angle);

    match runtime.eval_expression(&ctx, expr) {
        Ok(Value::Nil) => false,
        Ok(Value::Boolean(b)) => b,
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(expr, error = %e, "interaction filter failed to evaluate");
            false
        }
    }
}
