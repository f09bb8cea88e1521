//! Input events (§4.7, §6): timestamped 2D pointer positions, queued by
//! the host and drained once per tick. Each event carries the wall-clock
//! timestamp the rollback manager needs to decide whether it arrived late.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Down,
    Move,
    Up,
}

#[derive(Debug, Clone, Copy)]
pub struct InputEvent {
    pub timestamp: f64,
    pub x: f64,
    pub y: f64,
    pub kind: InputKind,
}

/// A FIFO of input events the host pushes as they arrive and the engine
/// drains once per tick, in order. Kept separate from the pointer
/// projection in `InteractionEngine` so a queued event can be replayed
/// against a restored snapshot during resimulation.
pub struct InputQueue {
    pending: VecDeque<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        InputQueue { pending: VecDeque::new() }
    }

    pub fn push(&mut self, event: InputEvent) {
        self.pending.push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Removes and returns every queued event with `timestamp <= now`, in
    /// arrival order.
    pub fn drain_up_to(&mut self, now: f64) -> Vec<InputEvent> {
        let mut out = Vec::new();
        while let Some(front) = self.pending.front() {
            if front.timestamp > now {
                break;
            }
            out.push(self.pending.pop_front().unwrap());
        }
        out
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves an input mapping (physical trigger name -> action name) to
/// the action that should fire for a given input binding key, falling
/// back to `None` when unmapped — unmapped input is simply ignored,
/// never an error (§7).
pub fn resolve_action<'a>(
    input_mapping: &'a std::collections::HashMap<String, String>,
    binding: &str,
) -> Option<&'a str> {
    input_mapping.get(binding).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_up_to_returns_only_events_at_or_before_now_in_order() {
        let mut q = InputQueue::new();
        q.push(InputEvent { timestamp: 1.0, x: 0.0, y: 0.0, kind: InputKind::Down });
        q.push(InputEvent { timestamp: 2.0, x: 1.0, y: 1.0, kind: InputKind::Move });
        q.push(InputEvent { timestamp: 3.0, x: 2.0, y: 2.0, kind: InputKind::Up });

        let drained = q.drain_up_to(2.0);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].timestamp, 1.0);
        assert_eq!(drained[1].timestamp, 2.0);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn unmapped_binding_resolves_to_none() {
        let mapping = std::collections::HashMap::new();
        assert!(resolve_action(&mapping, "key_z").is_none());
    }
}
