//! `ams-runtime init` — scaffold a new project directory.

use std::fs;
use std::path::Path;

pub fn create_project(name: &str) -> Result<(), String> {
    let root = Path::new(name);

    if root.exists() {
        return Err(format!("directory '{name}' already exists"));
    }

    println!("creating project: {name}");

    let dirs = [
        "",
        "entity_types",
        "behaviors",
        "collision_actions",
        "generators",
        "input_actions",
        "levels",
        "assets",
        "tests",
    ];
    for dir in &dirs {
        let path = root.join(dir);
        fs::create_dir_all(&path).map_err(|e| format!("failed to create {}: {e}", path.display()))?;
    }

    write_file(
        &root.join("game.yaml"),
        &format!(
            r#"name: "{name}"
version: "0.1.0"
screen_width: 800
screen_height: 600
background_color: [0, 0, 0]

entity_types: {{}}

player:
  type: player
  spawn_x: 400
  spawn_y: 300

test:
  directory: "tests"
"#
        ),
    )?;

    write_file(
        &root.join("entity_types/player.yaml"),
        r#"type: player
width: 32
height: 32
color: white
tags: [player]
"#,
    )?;

    write_file(
        &root.join("tests/test_smoke.lua"),
        r#"function test_player_is_alive_after_spawn()
  local id = spawn("player", 400, 300)
  assert(is_alive(id))
end
"#,
    )?;

    println!("project scaffolded at {}", root.display());
    println!("run `ams-runtime test --project {name}` to verify it");
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<(), String> {
    fs::write(path, contents).map_err(|e| format!("failed to write {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TempDir(std::path::PathBuf);
    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn create_project_scaffolds_expected_tree() {
        let cwd = std::env::current_dir().unwrap();
        let sandbox = std::env::temp_dir().join(format!("ams-init-test-{}", std::process::id()));
        fs::create_dir_all(&sandbox).unwrap();
        std::env::set_current_dir(&sandbox).unwrap();
        let _guard = TempDir(sandbox.clone());

        create_project("demo_game").unwrap();
        assert!(Path::new("demo_game/game.yaml").is_file());
        assert!(Path::new("demo_game/tests/test_smoke.lua").is_file());
        assert!(Path::new("demo_game/entity_types").is_dir());

        std::env::set_current_dir(cwd).unwrap();
    }

    #[test]
    fn create_project_refuses_existing_directory() {
        let cwd = std::env::current_dir().unwrap();
        let sandbox = std::env::temp_dir().join(format!("ams-init-test-exists-{}", std::process::id()));
        fs::create_dir_all(&sandbox).unwrap();
        std::env::set_current_dir(&sandbox).unwrap();
        let _guard = TempDir(sandbox.clone());

        fs::create_dir("taken").unwrap();
        assert!(create_project("taken").is_err());

        std::env::set_current_dir(cwd).unwrap();
    }
}
