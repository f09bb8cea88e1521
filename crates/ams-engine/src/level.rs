//! Level documents (§6): a list of placed entities, or an ASCII layout
//! plus a character-to-type key and cell geometry.

use ams_core::DefinitionError;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct PlacedEntity {
    pub type_tag: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Grid {
    pub cell_width: f64,
    pub cell_height: f64,
}

#[derive(Debug, Clone)]
pub struct Level {
    pub name: String,
    pub lives: i32,
    pub player_spawn: Option<(f64, f64)>,
    pub entities: Vec<PlacedEntity>,
}

#[derive(Debug, Deserialize)]
struct EntityPlacementDoc {
    #[serde(rename = "type")]
    type_tag: String,
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct PlayerSpawnDoc {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct GridDoc {
    cell_width: f64,
    cell_height: f64,
}

#[derive(Debug, Default, Deserialize)]
struct LevelDoc {
    name: Option<String>,
    #[serde(default = "default_lives")]
    lives: i32,
    player_spawn: Option<PlayerSpawnDoc>,
    #[serde(default)]
    entities: Option<Vec<EntityPlacementDoc>>,
    #[serde(default)]
    layout: Option<String>,
    #[serde(default)]
    layout_key: HashMap<char, String>,
    #[serde(default)]
    grid: Option<GridDoc>,
}

impl Default for PlayerSpawnDoc {
    fn default() -> Self {
        PlayerSpawnDoc { x: 0.0, y: 0.0 }
    }
}

fn default_lives() -> i32 {
    3
}

/// Expands a multi-line ASCII `layout` into placed entities using
/// `layout_key` (character -> entity type) and `grid` cell geometry.
/// Blank key characters (space, by convention) place nothing.
fn expand_layout(layout: &str, key: &HashMap<char, String>, grid: &Grid) -> Vec<PlacedEntity> {
    let mut out = Vec::new();
    for (row, line) in layout.lines().enumerate() {
        for (col, ch) in line.chars().enumerate() {
            if let Some(type_tag) = key.get(&ch) {
                out.push(PlacedEntity {
                    type_tag: type_tag.clone(),
                    x: col as f64 * grid.cell_width,
                    y: row as f64 * grid.cell_height,
                });
            }
        }
    }
    out
}

pub fn parse_level(raw: &str) -> Result<Level, DefinitionError> {
    let doc: LevelDoc =
        serde_yaml::from_str(raw).map_err(|e| DefinitionError::SchemaError(format!("level document: {e}")))?;

    let entities = if let Some(list) = doc.entities {
        list.into_iter().map(|e| PlacedEntity { type_tag: e.type_tag, x: e.x, y: e.y }).collect()
    } else if let Some(layout) = &doc.layout {
        let grid_doc = doc
            .grid
            .as_ref()
            .ok_or_else(|| DefinitionError::SchemaError("layout requires a 'grid'".to_string()))?;
        let grid = Grid { cell_width: grid_doc.cell_width, cell_height: grid_doc.cell_height };
        expand_layout(layout, &doc.layout_key, &grid)
    } else {
        return Err(DefinitionError::SchemaError(
            "level must declare either 'entities' or 'layout' + 'layout_key' + 'grid'".to_string(),
        ));
    };

    Ok(Level {
        name: doc.name.unwrap_or_default(),
        lives: doc.lives,
        player_spawn: doc.player_spawn.map(|s| (s.x, s.y)),
        entities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_list_level_parses_directly() {
        let level = parse_level(
            r#"
name: stage1
lives: 5
entities:
  - {type: goblin, x: 10, y: 20}
  - {type: coin, x: 30, y: 40}
"#,
        )
        .unwrap();
        assert_eq!(level.lives, 5);
        assert_eq!(level.entities.len(), 2);
        assert_eq!(level.entities[1].type_tag, "coin");
    }

    #[test]
    fn ascii_layout_expands_via_grid_and_key() {
        let level = parse_level(
            r#"
name: cave
layout: |
  #.#
  .G.
layout_key:
  "#": wall
  "G": goblin
grid:
  cell_width: 16
  cell_height: 16
"#,
        )
        .unwrap();
        assert_eq!(level.entities.len(), 3);
        let goblin = level.entities.iter().find(|e| e.type_tag == "goblin").unwrap();
        assert_eq!((goblin.x, goblin.y), (16.0, 16.0));
    }

    #[test]
    fn level_without_entities_or_layout_is_rejected() {
        let err = parse_level("name: empty\n").unwrap_err();
        assert!(matches!(err, DefinitionError::SchemaError(_)));
    }
}
