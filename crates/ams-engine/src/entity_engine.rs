//! The entity engine (§4.4): owns the authoritative entity map, drives the
//! per-tick physics/transform pipeline, and is the target of every
//! `ams.*` API call that touches entity state. Entities live in a
//! `hecs::World` (kept for generational-index safety and because it is
//! the teacher's own storage choice) behind a string-id registry; script
//! code never sees a `hecs::Entity`, only the stable string id.

use crate::sound::SoundEvent;
use ams_core::value::{BridgeValue, OrderedMap};
use ams_core::{ChildSpawnSpec, Entity, EntityId, EntityTypeDefinition, PropertyValueSpec, ScheduledCallback};
use linked_hash_map::LinkedHashMap;
use std::collections::HashMap;

pub struct EntityEngine {
    world: hecs::World,
    registry: HashMap<EntityId, hecs::Entity>,
    insertion_order: Vec<EntityId>,

    pub definitions: HashMap<String, EntityTypeDefinition>,

    pub score: i64,
    pub lives: i32,
    pub misses: i32,
    pub elapsed_time: f64,
    pub state_tag: String,
    pub screen_width: f64,
    pub screen_height: f64,

    pub scheduled_callbacks: Vec<ScheduledCallback>,
    pub pending_sounds: Vec<SoundEvent>,

    rng_state: u64,
    next_entity_seq: HashMap<String, u64>,
}

impl EntityEngine {
    pub fn new(screen_width: f64, screen_height: f64) -> Self {
        EntityEngine {
            world: hecs::World::new(),
            registry: HashMap::new(),
            insertion_order: Vec::new(),
            definitions: HashMap::new(),
            score: 0,
            lives: 3,
            misses: 0,
            elapsed_time: 0.0,
            state_tag: "playing".to_string(),
            screen_width,
            screen_height,
            scheduled_callbacks: Vec::new(),
            pending_sounds: Vec::new(),
            rng_state: 0x9E3779B97F4A7C15,
            next_entity_seq: HashMap::new(),
        }
    }

    /// xorshift64*; deterministic and cheap, and its entire state is a
    /// single u64 that rides along in every `Snapshot` so resimulation
    /// draws the same sequence as the original run (§3, §4.7).
    pub fn next_random(&mut self) -> f64 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        ((x >> 11) as f64) * (1.0 / (1u64 << 53) as f64)
    }

    pub fn random_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_random() * (hi - lo)
    }

    fn next_id(&mut self, type_tag: &str) -> EntityId {
        let counter = self.next_entity_seq.entry(type_tag.to_string()).or_insert(0);
        let id = format!("{type_tag}_{:08x}", *counter);
        *counter += 1;
        id
    }

    /// Returns a cloned snapshot of one entity's current state. Cloning
    /// (rather than returning a borrow tied to `hecs`' query guard
    /// lifetime) keeps the bridge call sites simple; entity state is small.
    pub fn get_cloned(&self, id: &str) -> Option<Entity> {
        let handle = self.registry.get(id)?;
        self.world.get::<&Entity>(*handle).ok().map(|e| e.clone())
    }

    pub fn with_entity_mut<R>(&mut self, id: &str, f: impl FnOnce(&mut Entity) -> R) -> Option<R> {
        let handle = *self.registry.get(id)?;
        self.world.get::<&mut Entity>(handle).ok().map(|mut e| f(&mut e))
    }

    pub fn is_alive(&self, id: &str) -> bool {
        self.get_cloned(id).map(|e| e.alive).unwrap_or(false)
    }

    pub fn ids_in_order(&self) -> impl Iterator<Item = &EntityId> {
        self.insertion_order.iter()
    }

    pub fn entities_of_type<'a>(&'a self, type_tag: &'a str) -> Vec<EntityId> {
        self.insertion_order
            .iter()
            .filter(|id| self.get_cloned(id).map(|e| e.type_tag == type_tag).unwrap_or(false))
            .cloned()
            .collect()
    }

    pub fn entities_by_tag<'a>(&'a self, tag: &'a str) -> Vec<EntityId> {
        self.insertion_order
            .iter()
            .filter(|id| self.get_cloned(id).map(|e| e.has_tag(tag)).unwrap_or(false))
            .cloned()
            .collect()
    }

    /// Spawns an entity of `type_tag` at `(x, y)`. `overrides` are applied
    /// after the recipe's defaults and before `on_spawn` fires, so
    /// `on_spawn` observes caller-provided initial properties.
    pub fn spawn(
        &mut self,
        type_tag: &str,
        x: f64,
        y: f64,
        overrides: OrderedMap<BridgeValue>,
    ) -> Option<EntityId> {
        let def = self.definitions.get(type_tag)?.clone();
        let id = self.next_id(type_tag);

        let mut entity = Entity::new(id.clone(), type_tag);
        entity.base_type = def.base_type.clone();
        entity.x = x;
        entity.y = y;
        entity.w = def.default_width;
        entity.h = def.default_height;
        entity.color = def.default_color.clone();
        entity.sprite = def.default_sprite.clone();
        entity.health = def.default_health;
        entity.point_value = def.point_value;
        entity.tags = def.tags.clone();
        entity.behaviors = def.behaviors.clone();
        entity.behavior_config = def.behavior_config.clone();
        entity.spawn_time = self.elapsed_time;
        for (k, v) in overrides {
            entity.properties.insert(k, v);
        }

        let handle = self.world.spawn((entity,));
        self.registry.insert(id.clone(), handle);
        self.insertion_order.push(id.clone());
        Some(id)
    }

    /// Marks an entity destroyed. Actual removal from storage happens in
    /// `reap` at the end of the tick, after lifecycle dispatch has had a
    /// chance to run `on_destroy` and orphan handling.
    pub fn mark_destroyed(&mut self, id: &str) {
        self.with_entity_mut(id, |e| e.alive = false);
    }

    /// Increments the miss counter consulted by the `survival` win
    /// condition (§4.4) — e.g. a ball that left the screen unreturned.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Removes every entity currently marked `!alive` from storage.
    /// Invariant 2 (§8): after `update` returns, no entity has `alive ==
    /// false`.
    pub fn reap(&mut self) -> Vec<EntityId> {
        let dead: Vec<EntityId> = self
            .insertion_order
            .iter()
            .filter(|id| !self.is_alive(id))
            .cloned()
            .collect();
        for id in &dead {
            if let Some(handle) = self.registry.remove(id) {
                let _ = self.world.despawn(handle);
            }
        }
        self.insertion_order.retain(|id| !dead.contains(id));
        dead
    }

    pub fn destroy_immediate(&mut self, id: &str) {
        if let Some(handle) = self.registry.remove(id) {
            let _ = self.world.despawn(handle);
        }
        self.insertion_order.retain(|existing| existing != id);
    }

    pub fn set_parent(&mut self, child: &str, parent: Option<&str>) {
        let old_parent = self.with_entity_mut(child, |e| e.parent.clone()).flatten();
        if let Some(old) = old_parent {
            self.with_entity_mut(&old, |e| e.remove_child(child));
        }
        if let Some(p) = parent {
            self.with_entity_mut(p, |e| e.add_child(child.to_string()));
        }
        self.with_entity_mut(child, |e| e.parent = parent.map(|p| p.to_string()));
    }

    /// Physics integration: `x += vx*dt; y += vy*dt` for every entity with
    /// non-zero velocity (§4.4).
    pub fn step_physics(&mut self, dt: f64) {
        for (_, entity) in self.world.query_mut::<&mut Entity>() {
            if entity.vx != 0.0 || entity.vy != 0.0 {
                entity.x += entity.vx * dt;
                entity.y += entity.vy * dt;
            }
        }
    }

    pub fn tick_time(&mut self, dt: f64) {
        self.elapsed_time += dt;
    }

    pub fn resolve_child_spec_position(&self, parent: &Entity, spec: &ChildSpawnSpec) -> (f64, f64) {
        (parent.x + spec.offset.0, parent.y + spec.offset.1)
    }

    pub fn resolve_property_spec(
        &self,
        parent: &Entity,
        spec: &PropertyValueSpec,
    ) -> Option<BridgeValue> {
        match spec {
            PropertyValueSpec::Literal(v) => Some(v.clone()),
            PropertyValueSpec::PropertyRef(name) => parent.properties.get(name).cloned(),
            // Generator calls and Lua expressions require the script
            // runtime; resolved by `transforms::apply_transform`, which
            // has access to both engines.
            PropertyValueSpec::GeneratorCall { .. } | PropertyValueSpec::LuaExpr(_) => None,
        }
    }

    pub fn snapshot_entities(&self) -> LinkedHashMap<EntityId, Entity> {
        let mut map = LinkedHashMap::new();
        for id in &self.insertion_order {
            if let Some(e) = self.get_cloned(id) {
                map.insert(id.clone(), e);
            }
        }
        map
    }

    pub fn rng_state(&self) -> u64 {
        self.rng_state
    }

    pub fn set_rng_state(&mut self, state: u64) {
        self.rng_state = state;
    }

    pub fn entity_seq_snapshot(&self) -> HashMap<String, u64> {
        self.next_entity_seq.clone()
    }

    pub fn set_entity_seq(&mut self, seq: HashMap<String, u64>) {
        self.next_entity_seq = seq;
    }

    /// Restores entity storage to exactly the contents of `entities`
    /// (§4.7 restore semantics): existing entities not in the snapshot are
    /// removed, entities present in both are overwritten, entities only in
    /// the snapshot are re-created with their original identifier.
    pub fn restore_entities(&mut self, entities: &LinkedHashMap<EntityId, Entity>) {
        let current_ids: Vec<EntityId> = self.insertion_order.clone();
        for id in &current_ids {
            if !entities.contains_key(id) {
                self.destroy_immediate(id);
            }
        }
        self.insertion_order.clear();
        for (id, entity) in entities.iter() {
            if let Some(&handle) = self.registry.get(id) {
                if let Ok(mut slot) = self.world.get::<&mut Entity>(handle) {
                    *slot = entity.clone();
                }
            } else {
                let handle = self.world.spawn((entity.clone(),));
                self.registry.insert(id.clone(), handle);
            }
            self.insertion_order.push(id.clone());
        }
    }
}
