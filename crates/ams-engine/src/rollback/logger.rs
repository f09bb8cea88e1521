//! Rollback event logging (§4.7, §6): newline-delimited JSON, append-only,
//! one record per line — the same ring-buffer-plus-file-sink shape used
//! for profiling (`crate::profiling`).

use ams_core::Snapshot;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RollbackLogEntry {
    Header { engine_version: String, started_at_wall: f64 },
    Snapshot {
        frame: u64,
        elapsed_time: f64,
        score: i64,
        lives: i32,
        state_tag: String,
        entity_count: usize,
        scheduled_callback_count: usize,
    },
    Rollback {
        target_wall_timestamp: f64,
        restored_frame: u64,
        frames_resimulated: u64,
        hit_wall_timestamp: f64,
    },
    Footer { total_frames: u64 },
}

impl RollbackLogEntry {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        RollbackLogEntry::Snapshot {
            frame: snapshot.frame,
            elapsed_time: snapshot.elapsed_time,
            score: snapshot.score,
            lives: snapshot.lives,
            state_tag: snapshot.state_tag.clone(),
            entity_count: snapshot.entities.len(),
            scheduled_callback_count: snapshot.scheduled_callbacks.len(),
        }
    }
}

/// Appends newline-delimited JSON rollback records to a file, sampling
/// snapshot records every Nth one so a long session doesn't write a
/// record per captured frame.
pub struct RollbackLogger {
    file: File,
    sample_interval: u32,
    snapshot_count: u64,
}

impl RollbackLogger {
    pub fn open(path: &Path, sample_interval: u32) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let header = RollbackLogEntry::Header { engine_version: env!("CARGO_PKG_VERSION").to_string(), started_at_wall: 0.0 };
        writeln!(file, "{}", serde_json::to_string(&header)?)?;
        Ok(RollbackLogger { file, sample_interval: sample_interval.max(1), snapshot_count: 0 })
    }

    pub fn log_snapshot(&mut self, snapshot: &Snapshot) -> std::io::Result<()> {
        self.snapshot_count += 1;
        if self.snapshot_count % self.sample_interval as u64 != 0 {
            return Ok(());
        }
        let entry = RollbackLogEntry::from_snapshot(snapshot);
        writeln!(self.file, "{}", serde_json::to_string(&entry)?)
    }

    pub fn log_rollback(
        &mut self,
        target_wall_timestamp: f64,
        restored_frame: u64,
        frames_resimulated: u64,
        hit_wall_timestamp: f64,
    ) -> std::io::Result<()> {
        let entry = RollbackLogEntry::Rollback { target_wall_timestamp, restored_frame, frames_resimulated, hit_wall_timestamp };
        writeln!(self.file, "{}", serde_json::to_string(&entry)?)
    }

    pub fn close(mut self, total_frames: u64) -> std::io::Result<()> {
        let footer = RollbackLogEntry::Footer { total_frames };
        writeln!(self.file, "{}", serde_json::to_string(&footer)?)
    }
}
