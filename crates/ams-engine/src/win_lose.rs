//! Win/lose evaluation (§4.4). Entirely data-driven: a `GameDefinition`
//! carries one `WinCondition` and a list of `LoseClause`s, evaluated
//! once per tick against the live `EntityEngine`. A condition that fails
//! to evaluate (e.g. references an undefined type) is treated as
//! not-met and logged, never as a fatal error (§7).

use crate::entity_engine::EntityEngine;
use crate::runtime::ScriptRuntime;
use crate::transforms;
use ams_core::value::BridgeValue;
use ams_core::Transform;

#[derive(Debug, Clone)]
pub enum WinCondition {
    DestroyAll { base_type: String },
    ReachScore { target: i64 },
    SurviveTime { seconds: f64 },
    Survival { max_misses: i32 },
}

#[derive(Debug, Clone)]
pub enum LoseEvent {
    ScreenExit { entity_type: String, edge: ScreenEdge },
    PropertyTruthy { entity_type: String, property: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenEdge {
    Left,
    Right,
    Top,
    Bottom,
    Any,
}

#[derive(Debug, Clone)]
pub struct LoseSideEffects {
    pub lose_life: bool,
    pub destroy_type: Option<String>,
    pub transform: Option<(String, Transform)>,
    pub clear_property: Option<(String, String)>,
}

impl Default for LoseSideEffects {
    fn default() -> Self {
        LoseSideEffects { lose_life: false, destroy_type: None, transform: None, clear_property: None }
    }
}

#[derive(Debug, Clone)]
pub struct LoseClause {
    pub event: LoseEvent,
    pub effects: LoseSideEffects,
}

pub fn evaluate_win(engine: &EntityEngine, condition: &WinCondition) -> bool {
    match condition {
        WinCondition::DestroyAll { base_type } => !engine
            .ids_in_order()
            .filter_map(|id| engine.get_cloned(id))
            .any(|e| e.alive && &e.base_type == base_type),
        WinCondition::ReachScore { target } => engine.score >= *target,
        WinCondition::SurviveTime { seconds } => engine.elapsed_time >= *seconds,
        WinCondition::Survival { max_misses } => engine.misses < *max_misses,
    }
}

fn edge_crossed(x: f64, y: f64, w: f64, h: f64, screen_w: f64, screen_h: f64, edge: ScreenEdge) -> bool {
    match edge {
        ScreenEdge::Left => x + w < 0.0,
        ScreenEdge::Right => x > screen_w,
        ScreenEdge::Top => y + h < 0.0,
        ScreenEdge::Bottom => y > screen_h,
        ScreenEdge::Any => x + w < 0.0 || x > screen_w || y + h < 0.0 || y > screen_h,
    }
}

/// Evaluates every lose clause against current state, applying the side
/// effects of the first clause that matches (§4.4: `lose_life`, then
/// destroy named type, then transform another, then clear a property —
/// applied in that fixed order for the matching clause).
pub fn evaluate_lose(
    engine: &mut EntityEngine,
    runtime: &ScriptRuntime,
    clauses: &[LoseClause],
) -> bool {
    let mut any_matched = false;
    for clause in clauses {
        let matched = match &clause.event {
            LoseEvent::ScreenExit { entity_type, edge } => engine
                .entities_of_type(entity_type)
                .iter()
                .filter_map(|id| engine.get_cloned(id))
                .any(|e| edge_crossed(e.x, e.y, e.w, e.h, engine.screen_width, engine.screen_height, *edge)),
            LoseEvent::PropertyTruthy { entity_type, property } => engine
                .entities_of_type(entity_type)
                .iter()
                .filter_map(|id| engine.get_cloned(id))
                .any(|e| e.properties.get(property).map(BridgeValue::truthy).unwrap_or(false)),
        };
        if !matched {
            continue;
        }
        any_matched = true;

        if clause.effects.lose_life {
            engine.lives -= 1;
        }
        if let Some(type_tag) = &clause.effects.destroy_type {
            for id in engine.entities_of_type(type_tag) {
                engine.mark_destroyed(&id);
            }
        }
        if let Some((type_tag, transform)) = &clause.effects.transform {
            for id in engine.entities_of_type(type_tag) {
                transforms::apply_transform(engine, runtime, &id, transform);
            }
        }
        if let Some((type_tag, property)) = &clause.effects.clear_property {
            for id in engine.entities_of_type(type_tag) {
                engine.with_entity_mut(&id, |e| {
                    e.properties.remove(property);
                });
            }
        }
    }
    any_matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use ams_core::EntityTypeDefinition;

    #[test]
    fn destroy_all_is_won_once_last_entity_of_base_type_is_dead() {
        let mut engine = EntityEngine::new(800.0, 600.0);
        engine.definitions.insert("enemy".into(), EntityTypeDefinition::new("enemy"));
        let id = engine.spawn("enemy", 0.0, 0.0, ams_core::value::OrderedMap::new()).unwrap();
        let cond = WinCondition::DestroyAll { base_type: "enemy".to_string() };
        assert!(!evaluate_win(&engine, &cond));
        engine.mark_destroyed(&id);
        engine.reap();
        assert!(evaluate_win(&engine, &cond));
    }

    #[test]
    fn reach_score_compares_against_current_score() {
        let mut engine = EntityEngine::new(800.0, 600.0);
        engine.score = 100;
        assert!(evaluate_win(&engine, &WinCondition::ReachScore { target: 100 }));
        assert!(!evaluate_win(&engine, &WinCondition::ReachScore { target: 101 }));
    }

    #[test]
    fn screen_exit_lose_clause_decrements_lives() {
        let mut engine = EntityEngine::new(800.0, 600.0);
        engine.definitions.insert("ball".into(), EntityTypeDefinition::new("ball"));
        let id = engine.spawn("ball", -100.0, 0.0, ams_core::value::OrderedMap::new()).unwrap();
        let mut rt = ScriptRuntime::new().unwrap();
        rt.install_api(rt.lua().create_table().unwrap()).unwrap();
        let clauses = vec![LoseClause {
            event: LoseEvent::ScreenExit { entity_type: "ball".to_string(), edge: ScreenEdge::Left },
            effects: LoseSideEffects { lose_life: true, ..Default::default() },
        }];
        let lost = evaluate_lose(&mut engine, &rt, &clauses);
        assert!(lost);
        assert_eq!(engine.lives, 2);
        let _ = id;
    }
}
