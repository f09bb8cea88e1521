use crate::value::{BridgeValue, OrderedMap};
use crate::EntityId;

/// A live (or recently-live) game entity. Every field here is reachable
/// from scripts only through `ams.*` accessors, never by holding this
/// struct directly — scripts address entities by `EntityId`.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub type_tag: String,
    pub base_type: String,
    pub alive: bool,

    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub w: f64,
    pub h: f64,

    pub sprite: Option<String>,
    pub color: String,
    pub visible: bool,

    pub health: i32,
    pub point_value: i32,
    pub spawn_time: f64,

    pub tags: Vec<String>,
    pub behaviors: Vec<String>,
    pub behavior_config: OrderedMap<OrderedMap<BridgeValue>>,
    pub properties: OrderedMap<BridgeValue>,

    pub parent: Option<EntityId>,
    pub parent_offset: (f64, f64),
    pub children: Vec<EntityId>,
}

impl Entity {
    pub fn new(id: EntityId, type_tag: impl Into<String>) -> Self {
        let type_tag = type_tag.into();
        Entity {
            id,
            base_type: type_tag.clone(),
            type_tag,
            alive: true,
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            w: 32.0,
            h: 32.0,
            sprite: None,
            color: "white".to_string(),
            visible: true,
            health: 1,
            point_value: 0,
            spawn_time: 0.0,
            tags: Vec::new(),
            behaviors: Vec::new(),
            behavior_config: OrderedMap::new(),
            properties: OrderedMap::new(),
            parent: None,
            parent_offset: (0.0, 0.0),
            children: Vec::new(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.has_tag(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn center(&self) -> glam::DVec2 {
        glam::DVec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Axis-aligned bounding box overlap test, used by the legacy collision
    /// pass for entity types that declare no explicit interactions.
    pub fn overlaps(&self, other: &Entity) -> bool {
        self.x < other.x + other.w
            && self.x + self.w > other.x
            && self.y < other.y + other.h
            && self.y + self.h > other.y
    }

    pub fn add_child(&mut self, child_id: EntityId) {
        if !self.children.contains(&child_id) {
            self.children.push(child_id);
        }
    }

    pub fn remove_child(&mut self, child_id: &str) {
        self.children.retain(|c| c != child_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entity_has_sane_defaults() {
        let e = Entity::new("enemy_00000001".to_string(), "enemy");
        assert!(e.alive);
        assert_eq!(e.x, 0.0);
        assert_eq!(e.w, 32.0);
        assert!(e.tags.is_empty());
    }

    #[test]
    fn overlap_detects_aabb_intersection() {
        let mut a = Entity::new("a".into(), "a");
        a.x = 0.0;
        a.y = 0.0;
        a.w = 10.0;
        a.h = 10.0;
        let mut b = Entity::new("b".into(), "b");
        b.x = 5.0;
        b.y = 5.0;
        b.w = 10.0;
        b.h = 10.0;
        assert!(a.overlaps(&b));
        b.x = 20.0;
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn add_tag_is_idempotent() {
        let mut e = Entity::new("e".into(), "e");
        e.add_tag("enemy");
        e.add_tag("enemy");
        assert_eq!(e.tags, vec!["enemy".to_string()]);
    }
}
