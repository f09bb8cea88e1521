//! Interaction engine (§4.5): maintains a per-tick projection of entity
//! attributes plus a handful of system entities (pointer, screen, time,
//! game, level), and evaluates every entity-type interaction against its
//! resolved target(s) each tick.

use crate::entity_engine::EntityEngine;
use crate::filter::evaluate_filter;
use ams_core::value::{BridgeValue, OrderedMap};
use ams_core::{Entity, EntityId, Interaction, SystemEntity, TargetKey, TriggerMode};
use linked_hash_map::LinkedHashMap;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct PointerState {
    pub x: f64,
    pub y: f64,
    pub active: bool,
}

/// One resolved dispatch: fire `action` on behalf of `source` against
/// `target` (an entity id, or a system entity's well-known id) with the
/// interaction's modifier and computed geometry.
pub struct Dispatch {
    pub source: EntityId,
    pub target: String,
    pub is_system_target: bool,
    pub trigger: TriggerMode,
    pub action: String,
    pub modifier: OrderedMap<BridgeValue>,
    pub distance: Option<f64>,
    pub angle: Option<f64>,
}

pub struct InteractionEngine {
    projection: LinkedHashMap<EntityId, Entity>,
    pub pointer: PointerState,
    pub screen_width: f64,
    pub screen_height: f64,
    pub elapsed_time: f64,
    trigger_state: HashMap<(EntityId, String, usize), bool>,
}

impl InteractionEngine {
    pub fn new(screen_width: f64, screen_height: f64) -> Self {
        InteractionEngine {
            projection: LinkedHashMap::new(),
            pointer: PointerState::default(),
            screen_width,
            screen_height,
            elapsed_time: 0.0,
            trigger_state: HashMap::new(),
        }
    }

    pub fn sync_from(&mut self, engine: &EntityEngine) {
        self.projection = engine.snapshot_entities();
        self.elapsed_time = engine.elapsed_time;
    }

    /// Clears all trigger state for an entity — called when an entity
    /// changes type via a transform, so freshly applicable interactions
    /// fire their `enter` edge rather than being treated as already-active.
    pub fn clear_trigger_state_for(&mut self, id: &str) {
        self.trigger_state.retain(|(source, _, _), _| source != id);
    }

    fn targets_for<'a>(&'a self, key: &TargetKey, source_id: &str) -> Vec<String> {
        match key {
            TargetKey::Type(t) => self
                .projection
                .iter()
                .filter(|(id, e)| id.as_str() != source_id && &e.type_tag == t)
                .map(|(id, _)| id.clone())
                .collect(),
            TargetKey::BaseType(t) => self
                .projection
                .iter()
                .filter(|(id, e)| id.as_str() != source_id && &e.base_type == t)
                .map(|(id, _)| id.clone())
                .collect(),
            TargetKey::System(sys) => vec![sys.id().to_string()],
        }
    }

    fn compute_geometry(&self, source: &Entity, target_id: &str, is_system: bool) -> (Option<f64>, Option<f64>) {
        let target_center = if is_system {
            match target_id {
                "pointer" => Some(glam::DVec2::new(self.pointer.x, self.pointer.y)),
                "screen" => Some(glam::DVec2::new(self.screen_width / 2.0, self.screen_height / 2.0)),
                _ => None,
            }
        } else {
            self.projection.get(target_id).map(|e| e.center())
        };
        match target_center {
            Some(tc) => {
                let sc = source.center();
                let delta = tc - sc;
                (Some(delta.length()), Some(delta.y.atan2(delta.x)))
            }
            None => (None, None),
        }
    }

    /// Evaluates every source entity's interactions against their
    /// resolved targets, returning dispatches in (source order, target
    /// order) to satisfy the §5 ordering guarantee.
    pub fn evaluate(
        &mut self,
        runtime: &crate::runtime::ScriptRuntime,
        interactions_by_type: &HashMap<String, HashMap<TargetKey, Vec<Interaction>>>,
    ) -> Vec<Dispatch> {
        let mut dispatches = Vec::new();
        let source_ids: Vec<EntityId> = self.projection.keys().cloned().collect();

        for source_id in &source_ids {
            let source = match self.projection.get(source_id) {
                Some(e) if e.alive => e.clone(),
                _ => continue,
            };
            let Some(by_target) = interactions_by_type.get(&source.type_tag) else {
                continue;
            };
            for (target_key, clauses) in by_target {
                let is_system = matches!(target_key, TargetKey::System(_));
                let target_ids = self.targets_for(target_key, source_id);
                for target_id in &target_ids {
                    let (distance, angle) = self.compute_geometry(&source, target_id, is_system);
                    let target_entity = if is_system { None } else { self.projection.get(target_id) };
                    for (idx, clause) in clauses.iter().enumerate() {
                        let matched = match &clause.filter {
                            Some(expr) => evaluate_filter(runtime, expr, &source, target_entity, distance, angle),
                            None => true,
                        };
                        let state_key = (source_id.clone(), target_id.clone(), idx);
                        let was_active = *self.trigger_state.get(&state_key).unwrap_or(&false);
                        self.trigger_state.insert(state_key, matched);

                        let fires = match clause.trigger {
                            TriggerMode::Enter => matched && !was_active,
                            TriggerMode::Exit => !matched && was_active,
                            TriggerMode::Continuous => matched,
                        };
                        if fires {
                            dispatches.push(Dispatch {
                                source: source_id.clone(),
                                target: target_id.clone(),
                                is_system_target: is_system,
                                trigger: clause.trigger,
                                action: clause.action.clone(),
                                modifier: clause.modifier.clone(),
                                distance,
                                angle,
                            });
                        }
                    }
                }
            }
        }
        dispatches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ams_core::TriggerMode;

    fn entity(id: &str, type_tag: &str, x: f64, y: f64) -> Entity {
        let mut e = Entity::new(id.to_string(), type_tag);
        e.x = x;
        e.y = y;
        e.w = 10.0;
        e.h = 10.0;
        e
    }

    #[test]
    fn continuous_trigger_fires_every_tick_while_matched() {
        let mut ie = InteractionEngine::new(800.0, 600.0);
        ie.projection.insert("player".into(), entity("player", "player", 0.0, 0.0));
        ie.projection.insert("coin".into(), entity("coin", "coin", 0.0, 0.0));

        let mut by_target = HashMap::new();
        by_target.insert(
            TargetKey::Type("coin".to_string()),
            vec![Interaction {
                trigger: TriggerMode::Continuous,
                filter: None,
                action: "collect".to_string(),
                modifier: OrderedMap::new(),
            }],
        );
        let mut interactions = HashMap::new();
        interactions.insert("player".to_string(), by_target);

        let rt = crate::runtime::ScriptRuntime::new().unwrap();
        let d1 = ie.evaluate(&rt, &interactions);
        let d2 = ie.evaluate(&rt, &interactions);
        assert_eq!(d1.len(), 1);
        assert_eq!(d2.len(), 1);
    }

    #[test]
    fn enter_trigger_fires_once_on_transition() {
        let mut ie = InteractionEngine::new(800.0, 600.0);
        ie.projection.insert("player".into(), entity("player", "player", 0.0, 0.0));
        ie.projection.insert("coin".into(), entity("coin", "coin", 0.0, 0.0));

        let mut by_target = HashMap::new();
        by_target.insert(
            TargetKey::Type("coin".to_string()),
            vec![Interaction {
                trigger: TriggerMode::Enter,
                filter: None,
                action: "collect".to_string(),
                modifier: OrderedMap::new(),
            }],
        );
        let mut interactions = HashMap::new();
        interactions.insert("player".to_string(), by_target);

        let rt = crate::runtime::ScriptRuntime::new().unwrap();
        let d1 = ie.evaluate(&rt, &interactions);
        let d2 = ie.evaluate(&rt, &interactions);
        assert_eq!(d1.len(), 1);
        assert_eq!(d2.len(), 0);
    }
}
