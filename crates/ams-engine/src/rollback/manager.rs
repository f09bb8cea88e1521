//! Snapshot ring buffer and late-input resimulation (§4.7).

use crate::entity_engine::EntityEngine;
use crate::runtime::ScriptRuntime;
use ams_core::Snapshot;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy)]
pub struct RollbackConfig {
    pub history_duration: f64,
    pub fps: f64,
    pub capture_interval: u32,
    pub late_input_threshold: f64,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        RollbackConfig { history_duration: 2.0, fps: 60.0, capture_interval: 1, late_input_threshold: 0.05 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LateInputOutcome {
    /// Input timestamp was recent enough to apply directly to live state.
    AppliedLive,
    /// Input was older than anything retained in the buffer; applied at
    /// live state as a fallback (§7: "recovered, logged").
    BufferExhausted,
    /// Restored to a prior snapshot, applied the input there, and
    /// resimulated `frames_resimulated` fixed-dt frames back to now.
    Resimulated { restored_frame: u64, frames_resimulated: u64 },
}

/// Bounded ring buffer of snapshots, sized `history_duration · fps /
/// capture_interval` (§4.7), with a capture stride so not every frame is
/// retained.
pub struct RollbackManager {
    config: RollbackConfig,
    capacity: usize,
    buffer: VecDeque<Snapshot>,
    frame_counter: u64,
}

impl RollbackManager {
    pub fn new(config: RollbackConfig) -> Self {
        let capacity = ((config.history_duration * config.fps) / config.capture_interval.max(1) as f64)
            .ceil()
            .max(1.0) as usize;
        RollbackManager { config, capacity, buffer: VecDeque::with_capacity(capacity), frame_counter: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    fn build_snapshot(engine: &EntityEngine, frame: u64, wall_timestamp: f64) -> Snapshot {
        Snapshot {
            frame,
            elapsed_time: engine.elapsed_time,
            wall_timestamp,
            score: engine.score,
            lives: engine.lives,
            misses: engine.misses,
            state_tag: engine.state_tag.clone(),
            entities: engine.snapshot_entities(),
            scheduled_callbacks: engine.scheduled_callbacks.clone(),
            rng_state: engine.rng_state(),
            next_entity_seq: engine.entity_seq_snapshot(),
        }
    }

    /// Captures a snapshot if this frame lands on the configured stride.
    /// Should be called once per tick, after the tick's own update has run.
    pub fn capture(&mut self, engine: &EntityEngine, wall_timestamp: f64) {
        let frame = self.frame_counter;
        self.frame_counter += 1;
        if frame % self.config.capture_interval as u64 != 0 {
            return;
        }
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(Self::build_snapshot(engine, frame, wall_timestamp));
    }

    fn newest_at_or_before(&self, target_wall_timestamp: f64) -> Option<&Snapshot> {
        self.buffer.iter().rev().find(|s| s.wall_timestamp <= target_wall_timestamp)
    }

    fn restore(engine: &mut EntityEngine, snapshot: &Snapshot) {
        engine.elapsed_time = snapshot.elapsed_time;
        engine.score = snapshot.score;
        engine.lives = snapshot.lives;
        engine.misses = snapshot.misses;
        engine.state_tag = snapshot.state_tag.clone();
        engine.scheduled_callbacks = snapshot.scheduled_callbacks.clone();
        engine.set_rng_state(snapshot.rng_state);
        engine.set_entity_seq(snapshot.next_entity_seq.clone());
        engine.restore_entities(&snapshot.entities);
    }

    /// Implements the §4.7 late-input algorithm. `apply_input` runs once,
    /// either against live state or the restored-to state. `tick_fn` is the
    /// live per-tick update routine (minus snapshot capture), reused so
    /// resimulation is bit-identical to the original forward pass.
    pub fn process_late_input(
        &mut self,
        engine: &mut EntityEngine,
        runtime: &ScriptRuntime,
        input_timestamp: f64,
        now: f64,
        apply_input: impl FnOnce(&mut EntityEngine),
        mut tick_fn: impl FnMut(&mut EntityEngine, &ScriptRuntime, f64),
    ) -> LateInputOutcome {
        if now - input_timestamp <= self.config.late_input_threshold {
            apply_input(engine);
            return LateInputOutcome::AppliedLive;
        }

        let Some(snapshot) = self.newest_at_or_before(input_timestamp).cloned() else {
            tracing::warn!(input_timestamp, now, "late input older than rollback buffer, applying at live state");
            apply_input(engine);
            return LateInputOutcome::BufferExhausted;
        };

        let restored_frame = snapshot.frame;
        Self::restore(engine, &snapshot);
        apply_input(engine);

        let dt = 1.0 / self.config.fps;
        let target_elapsed = snapshot.elapsed_time + (now - snapshot.wall_timestamp);
        let mut frames = 0u64;
        while engine.elapsed_time < target_elapsed {
            tick_fn(engine, runtime, dt);
            frames += 1;
        }

        LateInputOutcome::Resimulated { restored_frame, frames_resimulated: frames }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ams_core::EntityTypeDefinition;

    fn tick(engine: &mut EntityEngine, _runtime: &ScriptRuntime, dt: f64) {
        engine.step_physics(dt);
        engine.tick_time(dt);
    }

    #[test]
    fn capacity_matches_history_duration_times_fps_over_interval() {
        let mgr = RollbackManager::new(RollbackConfig { history_duration: 2.0, fps: 60.0, capture_interval: 1, late_input_threshold: 0.05 });
        assert_eq!(mgr.capacity(), 120);
    }

    #[test]
    fn buffer_evicts_oldest_snapshot_once_at_capacity() {
        let mut mgr = RollbackManager::new(RollbackConfig { history_duration: 0.05, fps: 60.0, capture_interval: 1, late_input_threshold: 0.0 });
        let engine = EntityEngine::new(800.0, 600.0);
        for i in 0..10 {
            mgr.capture(&engine, i as f64);
        }
        assert!(mgr.len() <= mgr.capacity());
    }

    #[test]
    fn recent_input_applies_live_without_resimulation() {
        let mut engine = EntityEngine::new(800.0, 600.0);
        let mut mgr = RollbackManager::new(RollbackConfig::default());
        let rt = ScriptRuntime::new().unwrap();
        let outcome = mgr.process_late_input(&mut engine, &rt, 0.99, 1.0, |e| e.score += 1, tick);
        assert_eq!(outcome, LateInputOutcome::AppliedLive);
        assert_eq!(engine.score, 1);
    }

    #[test]
    fn old_input_restores_and_resimulates_forward() {
        let mut engine = EntityEngine::new(800.0, 600.0);
        engine.definitions.insert("ball".into(), EntityTypeDefinition::new("ball"));
        let mut mgr = RollbackManager::new(RollbackConfig { history_duration: 5.0, fps: 60.0, capture_interval: 1, late_input_threshold: 0.01 });
        let rt = ScriptRuntime::new().unwrap();

        mgr.capture(&engine, 0.0);
        tick(&mut engine, &rt, 1.0 / 60.0);
        mgr.capture(&engine, 1.0 / 60.0);
        tick(&mut engine, &rt, 1.0 / 60.0);
        mgr.capture(&engine, 2.0 / 60.0);

        let outcome = mgr.process_late_input(&mut engine, &rt, 0.0, 2.0 / 60.0, |e| e.score += 5, tick);
        match outcome {
            LateInputOutcome::Resimulated { restored_frame, .. } => assert_eq!(restored_frame, 0),
            other => panic!("expected resimulation, got {other:?}"),
        }
        assert_eq!(engine.score, 5);
    }

    #[test]
    fn input_older_than_buffer_falls_back_to_live() {
        let mut engine = EntityEngine::new(800.0, 600.0);
        let mut mgr = RollbackManager::new(RollbackConfig { history_duration: 0.01, fps: 60.0, capture_interval: 1, late_input_threshold: 0.0 });
        let rt = ScriptRuntime::new().unwrap();
        mgr.capture(&engine, 10.0);
        let outcome = mgr.process_late_input(&mut engine, &rt, 0.0, 20.0, |e| e.score += 1, tick);
        assert_eq!(outcome, LateInputOutcome::BufferExhausted);
    }
}
