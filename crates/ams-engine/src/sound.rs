//! Deferred sound events. Audio playback itself is an external
//! collaborator (see SPEC_FULL §1 non-goals); the engine only queues what
//! should play and drains the queue once per tick.

#[derive(Debug, Clone)]
pub struct SoundEvent {
    pub name: String,
    pub entity_id: Option<String>,
}
