//! Headless test runner (§1 ambient stack): owns an `EntityEngine` +
//! `ScriptRuntime` + `InteractionEngine` with no rendering, audio, or
//! windowing, loads `test_*.lua` scripts from a project's `tests/`
//! directory, and reports pass/fail for each discovered `test_*` function.

use std::path::{Path, PathBuf};

use mlua::prelude::*;

use crate::bridge;
use crate::content_fs::{ContentFs, PRIORITY_CORE};
use crate::entity_engine::EntityEngine;
use crate::game_def::{self, GameDefinition};
use crate::interaction_engine::InteractionEngine;
use crate::lifecycle;
use crate::runtime::ScriptRuntime;
use crate::script_loader::ScriptLoader;
use crate::sound::SoundEvent;
use crate::transforms;
use crate::win_lose;
use ams_core::value::OrderedMap;
use ams_core::{Entity, EngineError, ScriptType};
use std::collections::HashMap;

fn aabb_overlap(a: &Entity, b: &Entity) -> bool {
    a.x < b.x + b.w && a.x + a.w > b.x && a.y < b.y + b.h && a.y + a.h > b.y
}

/// Owns the full headless simulation: the authoritative entity state, the
/// sandboxed script VM, and the per-tick interaction projection. Neither
/// renders nor touches audio/input hardware — driven entirely by
/// `step_frame`/`step_seconds`.
pub struct GameRuntime {
    pub entity_engine: EntityEngine,
    pub script_runtime: ScriptRuntime,
    pub interaction_engine: InteractionEngine,
    pub definition: GameDefinition,
    interactions_by_type: HashMap<String, HashMap<ams_core::TargetKey, Vec<ams_core::Interaction>>>,
    pub delta_time: f64,
    /// Sounds drained from `entity_engine.pending_sounds` each tick (§4.4:
    /// "drain pending sounds → external audio queue"); a headless runtime
    /// has no audio backend, so this is the external queue.
    pub dispatched_sounds: Vec<SoundEvent>,
}

impl GameRuntime {
    /// Loads `game.yaml` plus behaviour bundles and `inline_*`/file-backed
    /// scripts from `project_root`, laid over the engine's own built-in
    /// content at `PRIORITY_CORE`.
    pub fn load(project_root: &Path) -> Result<Self, EngineError> {
        let mut content_fs = ContentFs::new();
        content_fs.add_disk_layer("core", PRIORITY_CORE, project_root);
        content_fs.set_game_layer(project_root);

        let game_yaml = content_fs
            .read_text("game.yaml")
            .map_err(|e| EngineError::Config(format!("game.yaml: {e}")))?;

        let loader = ScriptLoader::new(&content_fs, true);

        let mut bundles = HashMap::new();
        for rel in content_fs.walk_files("behaviors", &["*.yaml", "*.yml"]) {
            let name = PathBuf::from(&rel)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or(rel.clone());
            let text = content_fs.read_text(&rel).map_err(|e| EngineError::Config(e.to_string()))?;
            let bundle = crate::behavior_loader::parse_behavior_bundle(&name, &text)?;
            bundles.insert(name, bundle);
        }

        let definition = game_def::parse_game_definition(&game_yaml, &bundles, &loader)?;

        let mut entity_engine = EntityEngine::new(definition.screen_width, definition.screen_height);
        entity_engine.definitions = definition.entity_types.clone();

        let mut script_runtime = ScriptRuntime::new()?;
        let ams_table = unsafe { bridge::build_ams_table(script_runtime.lua(), &mut entity_engine as *mut EntityEngine) }
            .map_err(|e| EngineError::Config(format!("failed to build host API: {e}")))?;
        script_runtime.install_api(ams_table)?;

        for script_type in [
            ScriptType::Behavior,
            ScriptType::CollisionAction,
            ScriptType::Generator,
            ScriptType::InputAction,
            ScriptType::InteractionAction,
        ] {
            let dir = match script_type {
                ScriptType::Behavior => "behaviors",
                ScriptType::CollisionAction => "collision_actions",
                ScriptType::Generator => "generators",
                ScriptType::InputAction => "input_actions",
                ScriptType::InteractionAction => "interaction_actions",
            };
            for meta in loader.load_dir(dir, script_type) {
                script_runtime.register_script(meta)?;
            }
        }
        for meta in definition.inline_scripts.clone() {
            script_runtime.register_script(meta)?;
        }

        let interaction_engine = InteractionEngine::new(definition.screen_width, definition.screen_height);
        let mut interactions_by_type = HashMap::new();
        for (type_tag, def) in &definition.entity_types {
            interactions_by_type.insert(type_tag.clone(), def.interactions.clone());
        }

        Ok(GameRuntime {
            entity_engine,
            script_runtime,
            interaction_engine,
            definition,
            interactions_by_type,
            delta_time: 1.0 / 60.0,
            dispatched_sounds: Vec::new(),
        })
    }

    pub fn spawn_player(&mut self) -> Option<String> {
        let player = self.definition.player.clone()?;
        self.entity_engine.spawn(&player.entity_type, player.spawn_x, player.spawn_y, OrderedMap::new())
    }

    /// Advances the simulation by one fixed timestep (§4.4 pipeline, in
    /// order): scheduled-callback expiry, physics integration, behaviour
    /// `on_update` dispatch, interaction evaluation/dispatch, the legacy
    /// AABB collision fallback, win/lose evaluation, destruction (on_destroy
    /// hooks, transforms, orphan handling) ahead of reaping, and finally
    /// draining pending sounds into the external audio queue.
    pub fn step_frame(&mut self) {
        let dt = self.delta_time;

        self.process_scheduled_callbacks(dt);

        self.entity_engine.step_physics(dt);
        lifecycle::dispatch_update_tick(&mut self.entity_engine, &self.script_runtime, dt);

        self.interaction_engine.sync_from(&self.entity_engine);
        let dispatches = self.interaction_engine.evaluate(&self.script_runtime, &self.interactions_by_type);
        for d in &dispatches {
            lifecycle::dispatch_interaction(
                &self.script_runtime,
                &d.action,
                &d.source,
                &d.target,
                &d.modifier,
                d.distance,
                d.angle,
            );
        }

        self.process_legacy_collisions();
        self.process_win_lose();

        self.process_destruction();
        for id in self.entity_engine.reap() {
            self.interaction_engine.clear_trigger_state_for(&id);
        }

        self.dispatched_sounds.extend(self.entity_engine.pending_sounds.drain(..));

        self.entity_engine.tick_time(dt);
    }

    /// Decrements every scheduled callback's `time_remaining` by `dt` and
    /// fires those that have expired (§8: `schedule(d, cb, id)` fires `cb`
    /// after `⌈d/dt⌉` ticks), run at the start of the tick per §5 ordering.
    fn process_scheduled_callbacks(&mut self, dt: f64) {
        let due = std::mem::take(&mut self.entity_engine.scheduled_callbacks);
        let mut remaining = Vec::with_capacity(due.len());
        for mut callback in due {
            callback.time_remaining -= dt;
            if callback.time_remaining <= 0.0 {
                lifecycle::dispatch_scheduled(
                    &self.entity_engine,
                    &self.script_runtime,
                    &callback.entity_id,
                    &callback.callback,
                );
            } else {
                remaining.push(callback);
            }
        }
        self.entity_engine.scheduled_callbacks = remaining;
    }

    /// Fallback AABB collision pass (§4.4: "for definitions without
    /// interactions") over `GameDefinition.legacy_collision_pairs`. Fires
    /// `on_hit` on both sides of every overlapping pair of live entities
    /// whose types are named together in the legacy `collisions:` list.
    fn process_legacy_collisions(&mut self) {
        for (type_a, type_b) in self.definition.legacy_collision_pairs.clone() {
            let a_ids = self.entity_engine.entities_of_type(&type_a);
            let b_ids = self.entity_engine.entities_of_type(&type_b);
            for a_id in &a_ids {
                let Some(a) = self.entity_engine.get_cloned(a_id) else { continue };
                if !a.alive {
                    continue;
                }
                for b_id in &b_ids {
                    if a_id == b_id {
                        continue;
                    }
                    let Some(b) = self.entity_engine.get_cloned(b_id) else { continue };
                    if !b.alive || !aabb_overlap(&a, &b) {
                        continue;
                    }
                    lifecycle::dispatch_on_hit(&self.entity_engine, &self.script_runtime, a_id, b_id);
                    lifecycle::dispatch_on_hit(&self.entity_engine, &self.script_runtime, b_id, a_id);
                }
            }
        }
    }

    /// Evaluates lose clauses then the win condition against current state
    /// (§4.4 "win/lose evaluation"), updating `entity_engine.state_tag`.
    /// Both are skipped once the game has already left the `playing` state.
    fn process_win_lose(&mut self) {
        if self.entity_engine.state_tag != "playing" {
            return;
        }

        if !self.definition.lose_conditions.is_empty() {
            win_lose::evaluate_lose(&mut self.entity_engine, &self.script_runtime, &self.definition.lose_conditions);
            if self.entity_engine.lives <= 0 {
                self.entity_engine.state_tag = "lost".to_string();
                return;
            }
        }

        if let Some(condition) = self.definition.win_condition.clone() {
            if win_lose::evaluate_win(&self.entity_engine, &condition) {
                self.entity_engine.state_tag = "won".to_string();
            }
        }
    }

    /// Runs `on_destroy` dispatch, each dying entity's `on_destroy`
    /// transform, and orphan handling for every entity marked dead but not
    /// yet reaped (§8.1: ids stay stable "until on_destroy completes", so
    /// this must run before `reap` removes them from storage).
    fn process_destruction(&mut self) {
        let dying: Vec<String> =
            self.entity_engine.ids_in_order().filter(|id| !self.entity_engine.is_alive(id)).cloned().collect();

        for id in &dying {
            lifecycle::dispatch_on_destroy(&self.entity_engine, &self.script_runtime, id);

            let on_destroy = self
                .entity_engine
                .get_cloned(id)
                .and_then(|e| self.entity_engine.definitions.get(&e.type_tag).cloned())
                .and_then(|def| def.on_destroy);
            if let Some(transform) = on_destroy {
                transforms::apply_transform(&mut self.entity_engine, &self.script_runtime, id, &transform);
            }

            transforms::handle_orphans(&mut self.entity_engine, &self.script_runtime, id);
        }
    }

    pub fn step_frames(&mut self, count: u64) {
        for _ in 0..count {
            self.step_frame();
        }
    }

    pub fn step_seconds(&mut self, seconds: f64) {
        let frames = (seconds / self.delta_time).ceil() as u64;
        self.step_frames(frames);
    }
}

/// Result of a single `test_*` Lua function execution.
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub error: Option<String>,
    pub game_time: f64,
}

/// Runs every `test_*` function found in `test_file` against a fresh
/// `GameRuntime` built from `project_root`, one runtime per test so tests
/// never see each other's state.
pub fn run_test_file(project_root: &Path, test_file: &Path) -> Vec<TestResult> {
    let test_source = match std::fs::read_to_string(test_file) {
        Ok(s) => s,
        Err(e) => {
            return vec![TestResult {
                name: test_file.display().to_string(),
                passed: false,
                error: Some(format!("failed to read test file: {e}")),
                game_time: 0.0,
            }]
        }
    };

    let discovery = Lua::new();
    if let Err(e) = discovery.load(&test_source).exec() {
        return vec![TestResult {
            name: test_file.display().to_string(),
            passed: false,
            error: Some(format!("Lua parse error: {e}")),
            game_time: 0.0,
        }];
    }
    let mut test_names = Vec::new();
    if let Ok(pairs) = discovery.globals().pairs::<String, LuaValue>().collect::<Result<Vec<_>, _>>() {
        for (key, value) in pairs {
            if key.starts_with("test_") && matches!(value, LuaValue::Function(_)) {
                test_names.push(key);
            }
        }
    }
    test_names.sort();

    if test_names.is_empty() {
        return vec![TestResult {
            name: test_file.display().to_string(),
            passed: false,
            error: Some("no test_* functions found".to_string()),
            game_time: 0.0,
        }];
    }

    test_names.iter().map(|name| run_single_test(project_root, &test_source, name)).collect()
}

fn run_single_test(project_root: &Path, test_source: &str, test_name: &str) -> TestResult {
    let mut runtime = match GameRuntime::load(project_root) {
        Ok(r) => r,
        Err(e) => {
            return TestResult {
                name: test_name.to_string(),
                passed: false,
                error: Some(format!("failed to load game runtime: {e}")),
                game_time: 0.0,
            }
        }
    };
    runtime.spawn_player();

    let test_lua = Lua::new();
    if let Err(e) = register_test_api(&test_lua, &mut runtime) {
        return TestResult { name: test_name.to_string(), passed: false, error: Some(e), game_time: 0.0 };
    }
    if let Err(e) = test_lua.load(test_source).exec() {
        return TestResult {
            name: test_name.to_string(),
            passed: false,
            error: Some(format!("Lua load error: {e}")),
            game_time: 0.0,
        };
    }

    let result = match test_lua.globals().get::<LuaFunction>(test_name) {
        Ok(func) => func.call::<()>(()),
        Err(e) => Err(e),
    };
    let game_time = runtime.entity_engine.elapsed_time;

    match result {
        Ok(()) => TestResult { name: test_name.to_string(), passed: true, error: None, game_time },
        Err(e) => TestResult { name: test_name.to_string(), passed: false, error: Some(e.to_string()), game_time },
    }
}

/// Registers the `test_*` scripting API into an isolated Lua VM, mirroring
/// the host API shape but scoped to assertions and time-advancing
/// primitives rather than gameplay logic.
fn register_test_api(lua: &Lua, runtime: &mut GameRuntime) -> Result<(), String> {
    let globals = lua.globals();
    let runtime_ptr = runtime as *mut GameRuntime;

    macro_rules! register {
        ($name:literal, $f:expr) => {
            globals.set($name, lua.create_function($f).map_err(|e| e.to_string())?).map_err(|e| e.to_string())?;
        };
    }

    register!("log_info", |_, msg: String| {
        println!("    [test] {msg}");
        Ok(())
    });

    register!("wait_frames", move |_, n: u64| {
        let runtime = unsafe { &mut *runtime_ptr };
        runtime.step_frames(n);
        Ok(())
    });

    register!("wait_seconds", move |_, n: f64| {
        let runtime = unsafe { &mut *runtime_ptr };
        runtime.step_seconds(n);
        Ok(())
    });

    register!("spawn", move |_, (type_tag, x, y): (String, f64, f64)| {
        let runtime = unsafe { &mut *runtime_ptr };
        Ok(runtime.entity_engine.spawn(&type_tag, x, y, OrderedMap::new()))
    });

    register!("is_alive", move |_, id: String| {
        let runtime = unsafe { &*runtime_ptr };
        Ok(runtime.entity_engine.is_alive(&id))
    });

    register!("get_property", move |lua, (id, key): (String, String)| {
        let runtime = unsafe { &*runtime_ptr };
        let v = runtime
            .entity_engine
            .get_cloned(&id)
            .and_then(|e| e.properties.get(&key).cloned())
            .unwrap_or(ams_core::value::BridgeValue::Nil);
        crate::bridge_value::to_lua(lua, &v)
    });

    register!("score", move |_, ()| {
        let runtime = unsafe { &*runtime_ptr };
        Ok(runtime.entity_engine.score)
    });

    register!("lives", move |_, ()| {
        let runtime = unsafe { &*runtime_ptr };
        Ok(runtime.entity_engine.lives)
    });

    register!("entity_count", move |_, type_tag: String| {
        let runtime = unsafe { &*runtime_ptr };
        Ok(runtime.entity_engine.entities_of_type(&type_tag).len())
    });

    Ok(())
}

/// Discovers `test_*.lua` files under `project_root/tests` (or the
/// explicit list supplied by `game.yaml`'s test config, once
/// `project_config` resolves one), sorted for deterministic run order.
pub fn discover_test_files(project_root: &Path) -> Vec<PathBuf> {
    let test_dir = project_root.join("tests");
    if !test_dir.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(&test_dir)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension().map_or(false, |ext| ext == "lua")
                && p.file_name().and_then(|n| n.to_str()).map_or(false, |n| n.starts_with("test_"))
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, rel: &str, content: &str) {
        let full = dir.join(rel);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(full).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    struct TempDir(PathBuf);
    impl TempDir {
        fn path(&self) -> &Path {
            &self.0
        }
    }
    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }
    fn tempdir() -> TempDir {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("ams-test-runner-test-{}-{n}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        TempDir(dir)
    }

    fn minimal_project() -> TempDir {
        let dir = tempdir();
        write_file(
            dir.path(),
            "game.yaml",
            r#"
name: Test Arena
entity_types:
  pebble:
    width: 4
player:
  type: pebble
  spawn_x: 10
  spawn_y: 10
"#,
        );
        dir
    }

    #[test]
    fn game_runtime_loads_and_spawns_player() {
        let dir = minimal_project();
        let mut runtime = GameRuntime::load(dir.path()).unwrap();
        let id = runtime.spawn_player().unwrap();
        assert!(runtime.entity_engine.is_alive(&id));
    }

    #[test]
    fn step_frames_advances_elapsed_time() {
        let dir = minimal_project();
        let mut runtime = GameRuntime::load(dir.path()).unwrap();
        runtime.step_frames(60);
        assert!(runtime.entity_engine.elapsed_time > 0.9);
    }

    #[test]
    fn scheduled_callback_fires_only_once_time_remaining_expires() {
        let dir = tempdir();
        write_file(
            dir.path(),
            "game.yaml",
            r#"
name: Timers
entity_types:
  bomb: {}
"#,
        );
        write_file(
            dir.path(),
            "behaviors/fuse.yaml",
            r#"
type: behavior
lua: |
  return {
    detonate = function(id) ams.set_prop(id, 'exploded', true) end,
  }
"#,
        );
        let mut runtime = GameRuntime::load(dir.path()).unwrap();
        let id = runtime.entity_engine.spawn("bomb", 0.0, 0.0, OrderedMap::new()).unwrap();
        runtime.entity_engine.with_entity_mut(&id, |e| e.behaviors.push("fuse".to_string()));
        runtime.entity_engine.scheduled_callbacks.push(ams_core::ScheduledCallback {
            time_remaining: runtime.delta_time * 3.0,
            callback: "detonate".to_string(),
            entity_id: id.clone(),
        });

        runtime.step_frames(2);
        assert!(runtime.entity_engine.get_cloned(&id).unwrap().properties.get("exploded").is_none());
        assert_eq!(runtime.entity_engine.scheduled_callbacks.len(), 1);

        runtime.step_frame();
        assert!(matches!(
            runtime.entity_engine.get_cloned(&id).unwrap().properties.get("exploded"),
            Some(ams_core::value::BridgeValue::Bool(true))
        ));
        assert!(runtime.entity_engine.scheduled_callbacks.is_empty());
    }

    #[test]
    fn legacy_collision_pass_fires_on_hit_for_overlapping_types() {
        let dir = tempdir();
        write_file(
            dir.path(),
            "game.yaml",
            r#"
name: Collider
entity_types:
  paddle:
    width: 10
    height: 10
  ball:
    width: 10
    height: 10
collisions:
  - [paddle, ball]
"#,
        );
        write_file(
            dir.path(),
            "behaviors/hit_logger.yaml",
            r#"
type: behavior
lua: |
  return {
    on_hit = function(id, other) ams.set_prop(id, 'hit_by', other) end,
  }
"#,
        );
        let mut runtime = GameRuntime::load(dir.path()).unwrap();
        let paddle = runtime.entity_engine.spawn("paddle", 0.0, 0.0, OrderedMap::new()).unwrap();
        runtime.entity_engine.with_entity_mut(&paddle, |e| e.behaviors.push("hit_logger".to_string()));
        let ball = runtime.entity_engine.spawn("ball", 2.0, 2.0, OrderedMap::new()).unwrap();

        runtime.step_frame();

        let hit_by = runtime.entity_engine.get_cloned(&paddle).unwrap().properties.get("hit_by").cloned();
        assert!(matches!(hit_by, Some(ams_core::value::BridgeValue::Str(s)) if s == ball));
    }

    #[test]
    fn destruction_runs_on_destroy_transform_and_orphans_before_reap() {
        let dir = tempdir();
        write_file(
            dir.path(),
            "game.yaml",
            r#"
name: Asteroids
entity_types:
  shard:
    width: 2
  debris:
    width: 2
  asteroid:
    width: 10
    on_destroy:
      type: destroy
      spawns:
        - entity_type: shard
          count: 2
"#,
        );
        let mut runtime = GameRuntime::load(dir.path()).unwrap();
        let asteroid = runtime.entity_engine.spawn("asteroid", 5.0, 5.0, OrderedMap::new()).unwrap();
        let debris = runtime.entity_engine.spawn("debris", 0.0, 0.0, OrderedMap::new()).unwrap();
        runtime.entity_engine.set_parent(&debris, Some(&asteroid));
        runtime.entity_engine.mark_destroyed(&asteroid);

        runtime.step_frame();

        assert!(!runtime.entity_engine.is_alive(&asteroid));
        assert_eq!(runtime.entity_engine.entities_of_type("shard").len(), 2);
        assert!(runtime.entity_engine.get_cloned(&debris).unwrap().parent.is_none());
    }

    #[test]
    fn win_condition_is_evaluated_each_tick_and_sets_state_tag() {
        let dir = tempdir();
        write_file(
            dir.path(),
            "game.yaml",
            r#"
name: ScoreAttack
entity_types:
  coin:
    width: 2
win_condition: reach_score
win_target: 100
"#,
        );
        let mut runtime = GameRuntime::load(dir.path()).unwrap();
        assert_eq!(runtime.entity_engine.state_tag, "playing");
        runtime.entity_engine.score = 100;

        runtime.step_frame();

        assert_eq!(runtime.entity_engine.state_tag, "won");
    }

    #[test]
    fn pending_sounds_are_drained_into_dispatched_sounds_each_tick() {
        let dir = minimal_project();
        let mut runtime = GameRuntime::load(dir.path()).unwrap();
        runtime.entity_engine.pending_sounds.push(SoundEvent { name: "boom".to_string(), entity_id: None });

        runtime.step_frame();

        assert_eq!(runtime.dispatched_sounds.len(), 1);
        assert_eq!(runtime.dispatched_sounds[0].name, "boom");
        assert!(runtime.entity_engine.pending_sounds.is_empty());
    }

    #[test]
    fn run_test_file_reports_pass_and_fail() {
        let dir = minimal_project();
        write_file(
            dir.path(),
            "tests/test_basic.lua",
            r#"
function test_spawn_is_alive()
  local id = spawn("pebble", 0, 0)
  assert(is_alive(id))
end

function test_intentional_failure()
  assert(false, "this test always fails")
end
"#,
        );
        let results = run_test_file(dir.path(), &dir.path().join("tests/test_basic.lua"));
        assert_eq!(results.len(), 2);
        let passed: HashMap<&str, bool> = results.iter().map(|r| (r.name.as_str(), r.passed)).collect();
        assert_eq!(passed["test_spawn_is_alive"], true);
        assert_eq!(passed["test_intentional_failure"], false);
    }

    #[test]
    fn discover_test_files_finds_sorted_test_prefixed_lua_files() {
        let dir = minimal_project();
        write_file(dir.path(), "tests/test_b.lua", "function test_b() end");
        write_file(dir.path(), "tests/test_a.lua", "function test_a() end");
        write_file(dir.path(), "tests/helper.lua", "-- not a test file");
        let files = discover_test_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].to_string_lossy().ends_with("test_a.lua"));
    }
}
