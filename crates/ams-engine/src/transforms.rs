//! The transform primitive (§4.4): spawning children, destroying, and
//! rewriting an entity's type, shared by `on_destroy`, `on_parent_destroy`,
//! and `on_update` transforms alike.

use crate::entity_engine::EntityEngine;
use crate::runtime::ScriptRuntime;
use ams_core::value::BridgeValue;
use ams_core::{ChildSpawnSpec, Entity, EntityId, PropertyValueSpec, ScriptType, Transform, TransformTarget};

/// Applies `transform` against `source_id`, already known to exist.
/// Returns the new entity id if the target rewrote in place to a new
/// type rather than being destroyed (the id itself never changes on a
/// rewrite, only its type-derived fields do).
pub fn apply_transform(
    engine: &mut EntityEngine,
    runtime: &ScriptRuntime,
    source_id: &str,
    transform: &Transform,
) {
    let Some(source) = engine.get_cloned(source_id) else { return };

    for spec in &transform.spawns {
        spawn_children(engine, runtime, &source, spec);
    }

    match &transform.target {
        TransformTarget::Destroy => {
            engine.mark_destroyed(source_id);
        }
        TransformTarget::ChangeType(new_type) => {
            rewrite_type(engine, runtime, source_id, new_type);
        }
    }
}

fn resolve_property(
    engine: &EntityEngine,
    runtime: &ScriptRuntime,
    parent: &Entity,
    spec: &PropertyValueSpec,
) -> Option<BridgeValue> {
    match spec {
        PropertyValueSpec::Literal(_) | PropertyValueSpec::PropertyRef(_) => {
            engine.resolve_property_spec(parent, spec)
        }
        PropertyValueSpec::GeneratorCall { name, args } => {
            let call_args: Vec<BridgeValue> = args.values().cloned().collect();
            runtime
                .call_method(ScriptType::Generator, name, "generate", &call_args)
                .ok()
                .flatten()
        }
        PropertyValueSpec::LuaExpr(expr) => {
            let lua = runtime.lua();
            let ctx = lua.create_table().ok()?;
            for (k, v) in parent.properties.iter() {
                if let Ok(lv) = crate::bridge_value::to_lua(lua, v) {
                    let _ = ctx.set(k.as_str(), lv);
                }
            }
            let _ = ctx.set("parent_x", parent.x);
            let _ = ctx.set("parent_y", parent.y);
            runtime.eval_expression(&ctx, expr).ok().and_then(|v| crate::bridge_value::from_lua(&v).ok())
        }
    }
}

fn spawn_children(
    engine: &mut EntityEngine,
    runtime: &ScriptRuntime,
    parent: &Entity,
    spec: &ChildSpawnSpec,
) {
    for _ in 0..spec.count {
        let (x, y) = engine.resolve_child_spec_position(parent, spec);
        let mut overrides = ams_core::value::OrderedMap::new();
        let mut speed: Option<f64> = None;
        let mut angle: Option<f64> = None;
        for (key, value_spec) in spec.properties.iter() {
            let Some(resolved) = resolve_property(engine, runtime, parent, value_spec) else { continue };
            match key.as_str() {
                "speed" => speed = resolved.as_f64(),
                "angle" => angle = resolved.as_f64(),
                _ => {
                    overrides.insert(key.clone(), resolved);
                }
            }
        }

        let Some(child_id) = engine.spawn(&spec.entity_type, x, y, overrides) else { continue };

        if let (Some(speed), Some(angle)) = (speed, angle) {
            engine.with_entity_mut(&child_id, |e| {
                e.vx = speed * angle.cos();
                e.vy = speed * angle.sin();
            });
        }
        if spec.inherit_velocity_fraction != 0.0 {
            let frac = spec.inherit_velocity_fraction;
            engine.with_entity_mut(&child_id, |e| {
                e.vx += parent.vx * frac;
                e.vy += parent.vy * frac;
            });
        }
        engine.set_parent(&child_id, Some(&parent.id));
        crate::lifecycle::dispatch_on_spawn(engine, runtime, &child_id);
    }
}

fn rewrite_type(engine: &mut EntityEngine, runtime: &ScriptRuntime, id: &str, new_type: &str) {
    let Some(def) = engine.definitions.get(new_type).cloned() else {
        tracing::warn!(new_type, "transform target type is undefined, leaving entity unchanged");
        return;
    };
    engine.with_entity_mut(id, |e| {
        e.type_tag = new_type.to_string();
        e.base_type = def.base_type.clone();
        e.w = def.default_width;
        e.h = def.default_height;
        e.color = def.default_color.clone();
        e.sprite = def.default_sprite.clone();
        e.health = def.default_health;
        e.point_value = def.point_value;
        e.tags = def.tags.clone();
        e.behaviors = def.behaviors.clone();
        e.behavior_config = def.behavior_config.clone();
    });
    crate::lifecycle::dispatch_on_spawn(engine, runtime, id);
}

/// Breadth-first orphan handling (§4.4): collects every descendant of
/// `root_id` before any mutation (so destroying a parent mid-walk can't
/// skip its own children), clears parent links, then applies each
/// descendant's `on_parent_destroy` transform if its type declares one.
pub fn handle_orphans(engine: &mut EntityEngine, runtime: &ScriptRuntime, root_id: &str) {
    let mut descendants: Vec<EntityId> = Vec::new();
    let mut queue: Vec<EntityId> = engine.get_cloned(root_id).map(|e| e.children).unwrap_or_default();
    while let Some(id) = queue.pop() {
        if let Some(e) = engine.get_cloned(&id) {
            queue.extend(e.children.iter().cloned());
        }
        descendants.push(id);
    }

    for id in &descendants {
        engine.set_parent(id, None);
    }
    for id in &descendants {
        let Some(entity) = engine.get_cloned(id) else { continue };
        let Some(def) = engine.definitions.get(&entity.type_tag) else { continue };
        if let Some(transform) = def.on_parent_destroy.clone() {
            apply_transform(engine, runtime, id, &transform);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ams_core::EntityTypeDefinition;

    fn runtime() -> ScriptRuntime {
        let mut rt = ScriptRuntime::new().unwrap();
        rt.install_api(rt.lua().create_table().unwrap()).unwrap();
        rt
    }

    #[test]
    fn destroy_transform_marks_entity_dead_after_spawning_children() {
        let mut engine = EntityEngine::new(800.0, 600.0);
        engine.definitions.insert("asteroid".into(), EntityTypeDefinition::new("asteroid"));
        engine.definitions.insert("shard".into(), EntityTypeDefinition::new("shard"));
        let id = engine.spawn("asteroid", 10.0, 10.0, ams_core::value::OrderedMap::new()).unwrap();

        let transform = Transform {
            target: TransformTarget::Destroy,
            spawns: vec![ChildSpawnSpec { entity_type: "shard".into(), count: 3, ..Default::default() }],
        };
        let rt = runtime();
        apply_transform(&mut engine, &rt, &id, &transform);

        assert!(!engine.is_alive(&id));
        assert_eq!(engine.entities_of_type("shard").len(), 3);
    }

    #[test]
    fn change_type_transform_rewrites_fields_in_place() {
        let mut engine = EntityEngine::new(800.0, 600.0);
        engine.definitions.insert("egg".into(), EntityTypeDefinition::new("egg"));
        let mut hatched = EntityTypeDefinition::new("chick");
        hatched.default_color = "yellow".to_string();
        engine.definitions.insert("chick".into(), hatched);
        let id = engine.spawn("egg", 0.0, 0.0, ams_core::value::OrderedMap::new()).unwrap();

        let transform = Transform { target: TransformTarget::ChangeType("chick".into()), spawns: vec![] };
        let rt = runtime();
        apply_transform(&mut engine, &rt, &id, &transform);

        let e = engine.get_cloned(&id).unwrap();
        assert_eq!(e.id, id);
        assert_eq!(e.type_tag, "chick");
        assert_eq!(e.color, "yellow");
    }

    #[test]
    fn orphans_lose_parent_link_and_run_on_parent_destroy() {
        let mut engine = EntityEngine::new(800.0, 600.0);
        let mut child_def = EntityTypeDefinition::new("debris");
        child_def.on_parent_destroy = Some(Transform { target: TransformTarget::Destroy, spawns: vec![] });
        engine.definitions.insert("ship".into(), EntityTypeDefinition::new("ship"));
        engine.definitions.insert("debris".into(), child_def);

        let parent_id = engine.spawn("ship", 0.0, 0.0, ams_core::value::OrderedMap::new()).unwrap();
        let child_id = engine.spawn("debris", 0.0, 0.0, ams_core::value::OrderedMap::new()).unwrap();
        engine.set_parent(&child_id, Some(&parent_id));

        let rt = runtime();
        handle_orphans(&mut engine, &rt, &parent_id);

        assert!(engine.get_cloned(&child_id).unwrap().parent.is_none());
        assert!(!engine.is_alive(&child_id));
    }
}
