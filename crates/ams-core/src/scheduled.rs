use crate::EntityId;

/// A one-shot callback scheduled via `ams.schedule(delay, callback, id)`.
/// Scanned linearly each tick; entity counts are small enough that this is
/// cheaper than a priority queue and, more importantly, keeps dispatch
/// order insertion-stable (§5 ordering guarantees).
#[derive(Debug, Clone)]
pub struct ScheduledCallback {
    pub time_remaining: f64,
    pub callback: String,
    pub entity_id: EntityId,
}
