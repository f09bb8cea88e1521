//! `game.yaml` project configuration (§1 ambient stack): project-level
//! metadata and test discovery settings, resolved the same way the
//! engine's content layers are — walk up from the current directory
//! until a `game.yaml` is found, then apply any `AMS_*` environment
//! overrides on top of what the file says.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub test: TestConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestConfig {
    pub files: Option<Vec<String>>,
    pub directory: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    NotFound,
    Io(std::io::Error),
    Parse(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound => write!(f, "game.yaml not found in this directory or any parent"),
            ConfigError::Io(e) => write!(f, "IO error reading game.yaml: {e}"),
            ConfigError::Parse(e) => write!(f, "failed to parse game.yaml: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Walks up from `start_dir` looking for `game.yaml`, returning its
/// parent directory (the project root) and its path.
pub fn find_project_root(start_dir: &Path) -> Option<PathBuf> {
    let mut dir = start_dir.to_path_buf();
    loop {
        if dir.join("game.yaml").exists() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Loads `<project_root>/game.yaml`, then applies environment overrides:
/// `AMS_TEST_DIRECTORY` overrides `test.directory` so CI can redirect test
/// discovery without editing the checked-in manifest.
pub fn load_config(project_root: &Path) -> Result<ProjectConfig, ConfigError> {
    let path = project_root.join("game.yaml");
    let contents = std::fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound
        } else {
            ConfigError::Io(e)
        }
    })?;
    let mut config: ProjectConfig = serde_yaml::from_str(&contents).map_err(ConfigError::Parse)?;
    if let Ok(dir) = std::env::var("AMS_TEST_DIRECTORY") {
        config.test.directory = Some(dir);
    }
    Ok(config)
}

/// Discovers test files from config (explicit file list wins) or by
/// scanning the configured/default `tests/` directory, sorted for a
/// deterministic run order.
pub fn discover_test_files(config: &ProjectConfig, project_root: &Path) -> Vec<PathBuf> {
    if let Some(files) = &config.test.files {
        return files.iter().map(|f| project_root.join(f)).filter(|p| p.exists()).collect();
    }

    let test_dir = project_root.join(config.test.directory.as_deref().unwrap_or("tests"));
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
        let dir = std::env::temp_dir().join(format!("ams-project-config-test-{}-{n}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        TempDir(dir)
    }

    fn write_file(dir: &Path, rel: &str, content: &str) {
        let full = dir.join(rel);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(full).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn find_project_root_walks_up_from_a_nested_directory() {
        let dir = tempdir();
        write_file(dir.path(), "game.yaml", "name: Arena\n");
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_root(&nested), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn missing_game_yaml_is_not_found() {
        let dir = tempdir();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound));
    }

    #[test]
    fn discover_test_files_prefers_explicit_file_list() {
        let dir = tempdir();
        write_file(dir.path(), "tests/test_a.lua", "function test_a() end");
        write_file(dir.path(), "tests/test_b.lua", "function test_b() end");
        let config = ProjectConfig {
            name: "Arena".to_string(),
            version: None,
            test: TestConfig { files: Some(vec!["tests/test_b.lua".to_string()]), directory: None },
        };
        let files = discover_test_files(&config, dir.path());
        assert_eq!(files, vec![dir.path().join("tests/test_b.lua")]);
    }
}
