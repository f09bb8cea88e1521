//! Per-frame profiling (§4.8): a thread-local call stack, a scoped RAII
//! guard timing the region it wraps, and a bounded ring buffer of
//! completed frames emitted through a pluggable sink.

use std::cell::RefCell;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct CallNode {
    pub id: u64,
    pub parent_id: Option<u64>,
    pub name: String,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FrameProfile {
    pub frame: u64,
    pub total_secs: f64,
    pub nodes: Vec<CallNode>,
    pub rollback_event: Option<String>,
}

struct FrameState {
    frame: u64,
    start: Instant,
    nodes: Vec<CallNode>,
    stack: Vec<u64>,
    next_id: u64,
    rollback_event: Option<String>,
}

thread_local! {
    static CURRENT: RefCell<Option<FrameState>> = RefCell::new(None);
}

pub fn begin_frame(frame: u64) {
    CURRENT.with(|c| {
        *c.borrow_mut() = Some(FrameState { frame, start: Instant::now(), nodes: Vec::new(), stack: Vec::new(), next_id: 0, rollback_event: None });
    });
}

/// Closes the current frame and returns its profile, or `None` if
/// `begin_frame` was never called on this thread.
pub fn end_frame() -> Option<FrameProfile> {
    CURRENT.with(|c| {
        c.borrow_mut().take().map(|state| FrameProfile {
            frame: state.frame,
            total_secs: state.start.elapsed().as_secs_f64(),
            nodes: state.nodes,
            rollback_event: state.rollback_event,
        })
    })
}

/// Attaches a note to the in-progress frame recording that a rollback
/// occurred during it (§4.8: "rollback events are attached to the frame
/// in which they occurred").
pub fn note_rollback(description: impl Into<String>) {
    CURRENT.with(|c| {
        if let Some(state) = c.borrow_mut().as_mut() {
            state.rollback_event = Some(description.into());
        }
    });
}

/// RAII scope: pushes a `CallNode` on construction, records its duration
/// and pops on drop. The idiomatic-Rust analogue of a decorator/context
/// manager pair.
pub struct CallScope {
    id: u64,
    name: String,
    start: Instant,
}

impl CallScope {
    pub fn enter(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        CURRENT.with(|c| {
            let mut borrow = c.borrow_mut();
            let state = borrow.as_mut()?;
            let id = state.next_id;
            state.next_id += 1;
            state.stack.push(id);
            Some(CallScope { id, name, start: Instant::now() })
        })
    }
}

impl Drop for CallScope {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        CURRENT.with(|c| {
            let mut borrow = c.borrow_mut();
            if let Some(state) = borrow.as_mut() {
                state.stack.pop();
                let parent_id = state.stack.last().copied();
                state.nodes.push(CallNode { id: self.id, parent_id, name: self.name.clone(), duration_secs: duration });
            }
        });
    }
}

/// Emits completed frames somewhere — a file, a socket, a test spy.
/// The browser/WebSocket sink named in the base specification is an
/// external collaborator; only this trait boundary is owned here.
pub trait ProfileSink {
    fn emit(&mut self, frame: &FrameProfile);
}

pub struct FileProfileSink {
    file: std::fs::File,
}

impl FileProfileSink {
    pub fn open(path: &std::path::Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(FileProfileSink { file })
    }
}

impl ProfileSink for FileProfileSink {
    fn emit(&mut self, frame: &FrameProfile) {
        use std::io::Write;
        let payload = serde_json::json!({
            "frame": frame.frame,
            "total_secs": frame.total_secs,
            "node_count": frame.nodes.len(),
            "rollback_event": frame.rollback_event,
        });
        if let Ok(line) = serde_json::to_string(&payload) {
            let _ = writeln!(self.file, "{line}");
        }
    }
}

/// A 60-entry ring buffer of recently completed frames, the window a
/// profiling HUD or test harness inspects.
pub struct ProfileRing {
    frames: std::collections::VecDeque<FrameProfile>,
    capacity: usize,
}

impl ProfileRing {
    pub fn new() -> Self {
        ProfileRing { frames: std::collections::VecDeque::with_capacity(60), capacity: 60 }
    }

    pub fn push(&mut self, frame: FrameProfile) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn latest(&self) -> Option<&FrameProfile> {
        self.frames.back()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_scope_records_duration_and_parent_chain() {
        begin_frame(0);
        {
            let _outer = CallScope::enter("tick");
            {
                let _inner = CallScope::enter("physics");
            }
        }
        let profile = end_frame().unwrap();
        assert_eq!(profile.nodes.len(), 2);
        let inner = profile.nodes.iter().find(|n| n.name == "physics").unwrap();
        let outer = profile.nodes.iter().find(|n| n.name == "tick").unwrap();
        assert_eq!(inner.parent_id, Some(outer.id));
        assert_eq!(outer.parent_id, None);
    }

    #[test]
    fn ring_buffer_caps_at_sixty_frames() {
        let mut ring = ProfileRing::new();
        for i in 0..100 {
            ring.push(FrameProfile { frame: i, ..Default::default() });
        }
        assert_eq!(ring.len(), 60);
        assert_eq!(ring.latest().unwrap().frame, 99);
    }

    #[test]
    fn scope_outside_a_frame_is_a_harmless_no_op() {
        let scope = CallScope::enter("orphaned");
        assert!(scope.is_none());
    }
}
