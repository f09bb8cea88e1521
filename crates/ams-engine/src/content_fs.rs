//! Layered content filesystem (§4.1): a priority-ordered stack of roots
//! presented as a single virtual namespace. Higher priority wins on any
//! lookup; directory listings merge across all roots with de-duplication.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ContentFsError {
    Io(std::io::Error),
    NotFound(String),
    NoSystemPath(String),
}

impl fmt::Display for ContentFsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::NotFound(p) => write!(f, "resource not found: {p}"),
            Self::NoSystemPath(p) => write!(f, "'{p}' has no backing system path"),
        }
    }
}

impl std::error::Error for ContentFsError {}

impl From<std::io::Error> for ContentFsError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[derive(Debug, Clone)]
enum ContentRoot {
    Disk(PathBuf),
    Memory(HashMap<String, Vec<u8>>),
}

struct Layer {
    name: String,
    priority: i32,
    root: ContentRoot,
}

/// Standard priority bands. Overlays occupy the open range between engine
/// and game; each overlay entry gets `OVERLAY_BASE + index`.
pub const PRIORITY_CORE: i32 = 0;
pub const PRIORITY_ENGINE: i32 = 100;
pub const PRIORITY_OVERLAY_BASE: i32 = 200;
pub const PRIORITY_GAME: i32 = 1000;
pub const PRIORITY_USER: i32 = 2000;

pub struct ContentFs {
    layers: Vec<Layer>,
}

impl ContentFs {
    pub fn new() -> Self {
        ContentFs { layers: Vec::new() }
    }

    pub fn add_disk_layer(&mut self, name: impl Into<String>, priority: i32, path: impl Into<PathBuf>) {
        let name = name.into();
        self.layers.retain(|l| l.name != name);
        self.layers.push(Layer {
            name,
            priority,
            root: ContentRoot::Disk(path.into()),
        });
        self.layers.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    pub fn add_memory_layer(&mut self, name: impl Into<String>, priority: i32, files: HashMap<String, Vec<u8>>) {
        let name = name.into();
        self.layers.retain(|l| l.name != name);
        self.layers.push(Layer {
            name,
            priority,
            root: ContentRoot::Memory(files),
        });
        self.layers.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Replaces any existing game layer (by logical name "game") with a
    /// fresh one, matching the rule that loading a new game tears down the
    /// previous game layer first.
    pub fn set_game_layer(&mut self, path: impl Into<PathBuf>) {
        self.add_disk_layer("game", PRIORITY_GAME, path);
    }

    fn normalize(path: &str) -> String {
        path.trim_start_matches('/').replace('\\', "/")
    }

    fn find_layer_for(&self, path: &str) -> Option<&Layer> {
        let norm = Self::normalize(path);
        self.layers.iter().find(|l| match &l.root {
            ContentRoot::Disk(root) => root.join(&norm).exists(),
            ContentRoot::Memory(files) => files.contains_key(&norm),
        })
    }

    pub fn exists(&self, path: &str) -> bool {
        self.find_layer_for(path).is_some()
    }

    pub fn is_file(&self, path: &str) -> bool {
        let norm = Self::normalize(path);
        match self.find_layer_for(path) {
            Some(Layer { root: ContentRoot::Disk(root), .. }) => root.join(&norm).is_file(),
            Some(Layer { root: ContentRoot::Memory(_), .. }) => true,
            None => false,
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        let norm = Self::normalize(path);
        match self.find_layer_for(path) {
            Some(Layer { root: ContentRoot::Disk(root), .. }) => root.join(&norm).is_dir(),
            _ => false,
        }
    }

    pub fn read_text(&self, path: &str) -> Result<String, ContentFsError> {
        Ok(String::from_utf8_lossy(&self.read_bytes(path)?).into_owned())
    }

    pub fn read_bytes(&self, path: &str) -> Result<Vec<u8>, ContentFsError> {
        let norm = Self::normalize(path);
        match self.find_layer_for(path) {
            Some(Layer { root: ContentRoot::Disk(root), .. }) => {
                Ok(std::fs::read(root.join(&norm))?)
            }
            Some(Layer { root: ContentRoot::Memory(files), .. }) => {
                Ok(files.get(&norm).cloned().unwrap_or_default())
            }
            None => Err(ContentFsError::NotFound(path.to_string())),
        }
    }

    /// Merges directory listings across every layer, highest priority
    /// metadata wins on name collisions, de-duplicated by file name.
    pub fn list_dir(&self, path: &str) -> Vec<String> {
        let norm = Self::normalize(path);
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for layer in &self.layers {
            let entries: Vec<String> = match &layer.root {
                ContentRoot::Disk(root) => {
                    let dir = root.join(&norm);
                    match std::fs::read_dir(&dir) {
                        Ok(rd) => rd
                            .filter_map(|e| e.ok())
                            .filter_map(|e| e.file_name().into_string().ok())
                            .collect(),
                        Err(_) => Vec::new(),
                    }
                }
                ContentRoot::Memory(files) => files
                    .keys()
                    .filter_map(|k| {
                        let prefix = format!("{norm}/");
                        k.strip_prefix(&prefix).map(|rest| rest.split('/').next().unwrap().to_string())
                    })
                    .collect(),
            };
            for name in entries {
                if seen.insert(name.clone()) {
                    out.push(name);
                }
            }
        }
        out
    }

    pub fn resolve_to_system_path(&self, path: &str) -> Result<PathBuf, ContentFsError> {
        let norm = Self::normalize(path);
        match self.find_layer_for(path) {
            Some(Layer { root: ContentRoot::Disk(root), .. }) => Ok(root.join(&norm)),
            Some(Layer { root: ContentRoot::Memory(_), .. }) => {
                Err(ContentFsError::NoSystemPath(path.to_string()))
            }
            None => Err(ContentFsError::NotFound(path.to_string())),
        }
    }

    pub fn layer_of(&self, path: &str) -> Option<&str> {
        self.find_layer_for(path).map(|l| l.name.as_str())
    }

    /// Walks a root directory (relative to the virtual namespace) across
    /// every disk layer that has it, returning paths matching any of the
    /// given glob-like patterns. Supports `*` as "any run of characters
    /// within a path segment" and a leading `**/` as "any depth". This
    /// narrow pattern language avoids pulling in a full glob crate for a
    /// filesystem that only ever filters by extension or path prefix.
    pub fn walk_files(&self, root: &str, globs: &[&str]) -> Vec<String> {
        let norm = Self::normalize(root);
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for layer in &self.layers {
            if let ContentRoot::Disk(disk_root) = &layer.root {
                let dir = disk_root.join(&norm);
                if !dir.is_dir() {
                    continue;
                }
                for entry in walkdir::WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let rel = entry
                        .path()
                        .strip_prefix(disk_root)
                        .unwrap()
                        .to_string_lossy()
                        .replace('\\', "/");
                    if globs.is_empty() || globs.iter().any(|g| glob_match(g, &rel)) {
                        if seen.insert(rel.clone()) {
                            out.push(rel);
                        }
                    }
                }
            }
        }
        out.sort();
        out
    }
}

impl Default for ContentFs {
    fn default() -> Self {
        Self::new()
    }
}

fn glob_match(pattern: &str, path: &str) -> bool {
    let pattern = pattern.strip_prefix("**/").unwrap_or(pattern);
    if let Some(ext) = pattern.strip_prefix("*.") {
        return path.ends_with(&format!(".{ext}"));
    }
    if pattern.contains('*') {
        let parts: Vec<&str> = pattern.split('*').collect();
        let mut rest = path;
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            match rest.find(part) {
                Some(idx) if i == 0 && idx != 0 => return false,
                Some(idx) => rest = &rest[idx + part.len()..],
                None => return false,
            }
        }
        true
    } else {
        path.ends_with(pattern)
    }
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

    #[test]
    fn higher_priority_layer_shadows_lower() {
        let core = tempdir();
        let game = tempdir();
        write_file(core.path(), "scripts/move.lua", "core version");
        write_file(game.path(), "scripts/move.lua", "game version");

        let mut fs = ContentFs::new();
        fs.add_disk_layer("core", PRIORITY_CORE, core.path());
        fs.add_disk_layer("game", PRIORITY_GAME, game.path());

        assert_eq!(fs.read_text("scripts/move.lua").unwrap(), "game version");
        assert_eq!(fs.layer_of("scripts/move.lua"), Some("game"));
    }

    #[test]
    fn empty_overlay_list_matches_no_overlay_view() {
        let core = tempdir();
        write_file(core.path(), "a.yaml", "x");
        let mut fs = ContentFs::new();
        fs.add_disk_layer("core", PRIORITY_CORE, core.path());
        assert!(fs.exists("a.yaml"));
        assert!(!fs.exists("b.yaml"));
    }

    #[test]
    fn missing_path_is_not_found() {
        let fs = ContentFs::new();
        assert!(matches!(fs.read_bytes("nope"), Err(ContentFsError::NotFound(_))));
    }

    #[test]
    fn walk_files_filters_by_extension_glob() {
        let root = tempdir();
        write_file(root.path(), "scripts/a.lua.yaml", "x");
        write_file(root.path(), "scripts/readme.md", "x");
        let mut fs = ContentFs::new();
        fs.add_disk_layer("core", PRIORITY_CORE, root.path());
        let found = fs.walk_files("scripts", &["*.yaml"]);
        assert_eq!(found, vec!["scripts/a.lua.yaml".to_string()]);
    }

    // Minimal temp-dir helper: avoids pulling in `tempfile` purely for tests.
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
        let dir = std::env::temp_dir().join(format!("ams-content-fs-test-{}-{n}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        TempDir(dir)
    }
}
