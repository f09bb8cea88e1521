use crate::entity::Entity;
use crate::scheduled::ScheduledCallback;
use crate::EntityId;
use linked_hash_map::LinkedHashMap;
use std::collections::HashMap;

/// A full, deep copy of everything rollback needs to restore: entity
/// state (insertion-ordered so restore doesn't disturb iteration order),
/// scheduled callbacks, score/lives/time, and the two deterministic
/// sequence sources (id counters, RNG state) that must themselves be
/// snapshotted for resimulation to be bit-identical (§3, §4.7).
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub frame: u64,
    pub elapsed_time: f64,
    pub wall_timestamp: f64,
    pub score: i64,
    pub lives: i32,
    pub misses: i32,
    pub state_tag: String,
    pub entities: LinkedHashMap<EntityId, Entity>,
    pub scheduled_callbacks: Vec<ScheduledCallback>,
    pub rng_state: u64,
    pub next_entity_seq: HashMap<String, u64>,
}
