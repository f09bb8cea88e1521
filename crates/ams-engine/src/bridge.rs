//! Builds the `ams` host API table (§4.3). Every function here captures a
//! raw pointer to the owning `EntityEngine`/`InteractionEngine` rather
//! than a borrowed reference — the same pattern the scripting layer this
//! engine descends from uses throughout, since a `'static` Lua-registered
//! closure cannot hold a borrow tied to a stack frame. The pointers are
//! valid for as long as the `ScriptRuntime` that owns this table is alive
//! and only ever dereferenced while the owning engine is on the call
//! stack (scripts run synchronously within a single tick, §5).

use crate::bridge_value::to_lua;
use crate::entity_engine::EntityEngine;
use ams_core::value::{BridgeValue, OrderedMap};
use ams_core::ScheduledCallback;
use mlua::{Lua, Table, Value};

/// # Safety
/// `entity_engine` must outlive every call made through the returned
/// table, and must not be accessed mutably from anywhere else while a
/// script call is in flight (upheld by the single-threaded, synchronous
/// tick model, §5).
pub unsafe fn build_ams_table(lua: &Lua, entity_engine: *mut EntityEngine) -> mlua::Result<Table> {
    let t = lua.create_table()?;

    macro_rules! entity_ref {
        () => {
            unsafe { &mut *entity_engine }
        };
    }

    // --- property access ---
    {
        let f = lua.create_function(move |lua, (id, key): (String, String)| {
            let engine = entity_ref!();
            let v = engine
                .get_cloned(&id)
                .and_then(|e| e.properties.get(&key).cloned())
                .unwrap_or(BridgeValue::Nil);
            to_lua(lua, &v)
        })?;
        t.set("get_prop", f)?;
    }
    {
        let f = lua.create_function(move |_, (id, key, value): (String, String, Value)| {
            let engine = entity_ref!();
            let bridged = match crate::bridge_value::from_lua(&value) {
                Ok(v) => v,
                Err(detail) => {
                    tracing::warn!(detail, "ams.set_prop received a non-bridgeable value, storing nil");
                    BridgeValue::Nil
                }
            };
            engine.with_entity_mut(&id, |e| {
                e.properties.insert(key, bridged);
            });
            Ok(())
        })?;
        t.set("set_prop", f)?;
    }
    {
        let f = lua.create_function(move |lua, (id, behavior, key): (String, String, String)| {
            let engine = entity_ref!();
            let v = engine
                .get_cloned(&id)
                .and_then(|e| e.behavior_config.get(&behavior).and_then(|c| c.get(&key).cloned()))
                .unwrap_or(BridgeValue::Nil);
            to_lua(lua, &v)
        })?;
        t.set("get_config", f)?;
    }

    // --- transform ---
    macro_rules! scalar_getter {
        ($name:literal, $field:ident) => {{
            let f = lua.create_function(move |_, id: String| {
                let engine = entity_ref!();
                Ok(engine.get_cloned(&id).map(|e| e.$field).unwrap_or(0.0))
            })?;
            t.set($name, f)?;
        }};
    }
    macro_rules! scalar_setter {
        ($name:literal, $field:ident) => {{
            let f = lua.create_function(move |_, (id, value): (String, f64)| {
                let engine = entity_ref!();
                engine.with_entity_mut(&id, |e| e.$field = value);
                Ok(())
            })?;
            t.set($name, f)?;
        }};
    }
    scalar_getter!("get_x", x);
    scalar_setter!("set_x", x);
    scalar_getter!("get_y", y);
    scalar_setter!("set_y", y);
    scalar_getter!("get_vx", vx);
    scalar_setter!("set_vx", vx);
    scalar_getter!("get_vy", vy);
    scalar_setter!("set_vy", vy);
    scalar_getter!("get_width", w);
    scalar_getter!("get_height", h);

    // --- visual ---
    {
        let f = lua.create_function(move |_, id: String| {
            let engine = entity_ref!();
            Ok(engine.get_cloned(&id).and_then(|e| e.sprite))
        })?;
        t.set("get_sprite", f)?;
    }
    {
        let f = lua.create_function(move |_, (id, sprite): (String, Option<String>)| {
            let engine = entity_ref!();
            engine.with_entity_mut(&id, |e| e.sprite = sprite);
            Ok(())
        })?;
        t.set("set_sprite", f)?;
    }
    {
        let f = lua.create_function(move |_, id: String| {
            let engine = entity_ref!();
            Ok(engine.get_cloned(&id).map(|e| e.color).unwrap_or_default())
        })?;
        t.set("get_color", f)?;
    }
    {
        let f = lua.create_function(move |_, (id, color): (String, String)| {
            let engine = entity_ref!();
            engine.with_entity_mut(&id, |e| e.color = color);
            Ok(())
        })?;
        t.set("set_color", f)?;
    }
    {
        let f = lua.create_function(move |_, (id, visible): (String, bool)| {
            let engine = entity_ref!();
            engine.with_entity_mut(&id, |e| e.visible = visible);
            Ok(())
        })?;
        t.set("set_visible", f)?;
    }

    // --- lifecycle ---
    {
        let f = lua.create_function(move |_, id: String| {
            let engine = entity_ref!();
            Ok(engine.get_cloned(&id).map(|e| e.health).unwrap_or(0))
        })?;
        t.set("get_health", f)?;
    }
    {
        let f = lua.create_function(move |_, (id, health): (String, i32)| {
            let engine = entity_ref!();
            engine.with_entity_mut(&id, |e| e.health = health);
            Ok(())
        })?;
        t.set("set_health", f)?;
    }
    {
        let f = lua.create_function(move |_, id: String| {
            let engine = entity_ref!();
            Ok(engine.is_alive(&id))
        })?;
        t.set("is_alive", f)?;
    }
    {
        let f = lua.create_function(move |_, id: String| {
            let engine = entity_ref!();
            engine.mark_destroyed(&id);
            Ok(())
        })?;
        t.set("destroy", f)?;
    }

    // --- spawning ---
    {
        #[allow(clippy::type_complexity)]
        let f = lua.create_function(
            move |_,
                  (type_tag, x, y, vx, vy, w, h, color, sprite): (
                String,
                f64,
                f64,
                Option<f64>,
                Option<f64>,
                Option<f64>,
                Option<f64>,
                Option<String>,
                Option<String>,
            )| {
                let engine = entity_ref!();
                let Some(id) = engine.spawn(&type_tag, x, y, OrderedMap::new()) else {
                    return Ok(None);
                };
                engine.with_entity_mut(&id, |e| {
                    if let Some(vx) = vx {
                        e.vx = vx;
                    }
                    if let Some(vy) = vy {
                        e.vy = vy;
                    }
                    if let Some(w) = w {
                        e.w = w;
                    }
                    if let Some(h) = h {
                        e.h = h;
                    }
                    if let Some(color) = color {
                        e.color = color;
                    }
                    if sprite.is_some() {
                        e.sprite = sprite;
                    }
                });
                Ok(Some(id))
            },
        )?;
        t.set("spawn", f)?;
    }

    // --- queries ---
    {
        let f = lua.create_function(move |_, type_tag: String| {
            let engine = entity_ref!();
            Ok(engine.entities_of_type(&type_tag))
        })?;
        t.set("get_entities_of_type", f)?;
    }
    {
        let f = lua.create_function(move |_, tag: String| {
            let engine = entity_ref!();
            Ok(engine.entities_by_tag(&tag))
        })?;
        t.set("get_entities_by_tag", f)?;
    }
    {
        let f = lua.create_function(move |_, tag: String| {
            let engine = entity_ref!();
            Ok(engine.entities_by_tag(&tag).len())
        })?;
        t.set("count_entities_by_tag", f)?;
    }
    {
        let f = lua.create_function(move |_, ()| {
            let engine = entity_ref!();
            Ok(engine.ids_in_order().cloned().collect::<Vec<_>>())
        })?;
        t.set("get_all_entity_ids", f)?;
    }

    // --- world state ---
    {
        let f = lua.create_function(move |_, ()| {
            let engine = entity_ref!();
            Ok(engine.screen_width)
        })?;
        t.set("get_screen_width", f)?;
    }
    {
        let f = lua.create_function(move |_, ()| {
            let engine = entity_ref!();
            Ok(engine.screen_height)
        })?;
        t.set("get_screen_height", f)?;
    }
    {
        let f = lua.create_function(move |_, ()| {
            let engine = entity_ref!();
            Ok(engine.score)
        })?;
        t.set("get_score", f)?;
    }
    {
        let f = lua.create_function(move |_, delta: i64| {
            let engine = entity_ref!();
            engine.score += delta;
            Ok(())
        })?;
        t.set("add_score", f)?;
    }
    {
        let f = lua.create_function(move |_, ()| {
            let engine = entity_ref!();
            Ok(engine.elapsed_time)
        })?;
        t.set("get_time", f)?;
    }

    // --- deferred events ---
    {
        let f = lua.create_function(move |_, (name, id): (String, Option<String>)| {
            let engine = entity_ref!();
            engine.pending_sounds.push(crate::sound::SoundEvent { name, entity_id: id });
            Ok(())
        })?;
        t.set("play_sound", f)?;
    }
    {
        let f = lua.create_function(move |_, (delay, callback, id): (f64, String, String)| {
            let engine = entity_ref!();
            engine.scheduled_callbacks.push(ScheduledCallback {
                time_remaining: delay,
                callback,
                entity_id: id,
            });
            Ok(())
        })?;
        t.set("schedule", f)?;
    }

    // --- hierarchy ---
    {
        let f = lua.create_function(move |_, id: String| {
            let engine = entity_ref!();
            Ok(engine.get_cloned(&id).and_then(|e| e.parent))
        })?;
        t.set("get_parent_id", f)?;
    }
    {
        let f = lua.create_function(move |_, (child, parent): (String, Option<String>)| {
            let engine = entity_ref!();
            engine.set_parent(&child, parent.as_deref());
            Ok(())
        })?;
        t.set("set_parent", f)?;
    }
    {
        let f = lua.create_function(move |_, id: String| {
            let engine = entity_ref!();
            engine.set_parent(&id, None);
            Ok(())
        })?;
        t.set("detach_from_parent", f)?;
    }
    {
        let f = lua.create_function(move |_, id: String| {
            let engine = entity_ref!();
            Ok(engine.get_cloned(&id).map(|e| e.children).unwrap_or_default())
        })?;
        t.set("get_children", f)?;
    }
    {
        let f = lua.create_function(move |_, id: String| {
            let engine = entity_ref!();
            Ok(engine.get_cloned(&id).map(|e| e.parent.is_some()).unwrap_or(false))
        })?;
        t.set("has_parent", f)?;
    }

    // --- math helpers ---
    t.set("sin", lua.create_function(|_, x: f64| Ok(x.sin()))?)?;
    t.set("cos", lua.create_function(|_, x: f64| Ok(x.cos()))?)?;
    t.set("sqrt", lua.create_function(|_, x: f64| Ok(x.sqrt()))?)?;
    t.set("atan2", lua.create_function(|_, (y, x): (f64, f64)| Ok(y.atan2(x)))?)?;
    t.set(
        "clamp",
        lua.create_function(|_, (v, lo, hi): (f64, f64, f64)| Ok(v.clamp(lo, hi)))?,
    )?;
    {
        let f = lua.create_function(move |_, ()| {
            let engine = entity_ref!();
            Ok(engine.next_random())
        })?;
        t.set("random", f)?;
    }
    {
        let f = lua.create_function(move |_, (lo, hi): (f64, f64)| {
            let engine = entity_ref!();
            Ok(engine.random_range(lo, hi))
        })?;
        t.set("random_range", f)?;
    }

    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_engine::EntityEngine;
    use ams_core::EntityTypeDefinition;

    #[test]
    fn get_set_prop_round_trips_through_lua() {
        let lua = Lua::new();
        let mut engine = EntityEngine::new(800.0, 600.0);
        engine.definitions.insert("a".into(), EntityTypeDefinition::new("a"));
        let id = engine.spawn("a", 0.0, 0.0, OrderedMap::new()).unwrap();

        let ptr: *mut EntityEngine = &mut engine;
        let ams = unsafe { build_ams_table(&lua, ptr) }.unwrap();
        lua.globals().set("ams", ams).unwrap();

        lua.load(format!("ams.set_prop('{id}', 'score', 5)")).exec().unwrap();
        let v: i64 = lua.load(format!("return ams.get_prop('{id}', 'score')")).eval().unwrap();
        assert_eq!(v, 5);
    }

    #[test]
    fn spawn_from_lua_creates_entity_visible_to_queries() {
        let lua = Lua::new();
        let mut engine = EntityEngine::new(800.0, 600.0);
        engine.definitions.insert("enemy".into(), EntityTypeDefinition::new("enemy"));
        let ptr: *mut EntityEngine = &mut engine;
        let ams = unsafe { build_ams_table(&lua, ptr) }.unwrap();
        lua.globals().set("ams", ams).unwrap();

        lua.load("ams.spawn('enemy', 1.0, 2.0)").exec().unwrap();
        let ids = engine.entities_of_type("enemy");
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn spawn_from_lua_sets_velocity_size_color_and_sprite() {
        let lua = Lua::new();
        let mut engine = EntityEngine::new(800.0, 600.0);
        engine.definitions.insert("bullet".into(), EntityTypeDefinition::new("bullet"));
        let ptr: *mut EntityEngine = &mut engine;
        let ams = unsafe { build_ams_table(&lua, ptr) }.unwrap();
        lua.globals().set("ams", ams).unwrap();

        let id: String = lua
            .load("return ams.spawn('bullet', 1.0, 2.0, 3.0, -4.0, 8.0, 16.0, 'red', 'bullet.png')")
            .eval()
            .unwrap();

        let e = engine.get_cloned(&id).unwrap();
        assert_eq!((e.vx, e.vy), (3.0, -4.0));
        assert_eq!((e.w, e.h), (8.0, 16.0));
        assert_eq!(e.color, "red");
        assert_eq!(e.sprite.as_deref(), Some("bullet.png"));
    }
}
