//! World objects and pickup interaction.
//!
//! Objects are room-scoped, created with the room, and never respawn.
//! A pickup deactivates permanently on the first qualifying collision and is
//! reported exactly once through the room's object-removal list.

use serde::{Deserialize, Serialize};

/// World object id, stable for the room's lifetime.
pub type ObjectId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Pickup,
    Npc,
    Portal,
}

#[derive(Debug, Clone)]
pub struct WorldObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub x: f64,
    pub y: f64,
    pub active: bool,
}

impl WorldObject {
    pub fn new(id: impl Into<ObjectId>, kind: ObjectKind, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            kind,
            x,
            y,
            active: true,
        }
    }
}

/// The object list of one room.
#[derive(Debug, Default)]
pub struct ObjectSet {
    objects: Vec<WorldObject>,
}

impl ObjectSet {
    pub fn new(objects: Vec<WorldObject>) -> Self {
        Self { objects }
    }

    /// Default layout every fresh room starts with.
    pub fn default_layout() -> Self {
        Self::new(vec![
            WorldObject::new("gen_pickup_001", ObjectKind::Pickup, 150.0, 150.0),
            WorldObject::new("gen_pickup_002", ObjectKind::Pickup, 250.0, 250.0),
            WorldObject::new("gen_pickup_003", ObjectKind::Pickup, 350.0, 150.0),
            WorldObject::new("gen_pickup_004", ObjectKind::Pickup, 150.0, 350.0),
            WorldObject::new("gen_pickup_005", ObjectKind::Pickup, 450.0, 450.0),
            WorldObject::new("npc_001", ObjectKind::Npc, 300.0, 260.0),
            WorldObject::new("portal_001", ObjectKind::Portal, 480.0, 120.0),
        ])
    }

    /// Objects still visible to clients. Consumed pickups are omitted.
    pub fn active(&self) -> impl Iterator<Item = &WorldObject> {
        self.objects.iter().filter(|o| o.active)
    }

    pub fn get(&self, id: &str) -> Option<&WorldObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    /// Collide the moved player against every active pickup. Pickups within
    /// `radius` flip inactive and their ids are returned for the removal
    /// broadcast. Only the mover is checked, so the per-tick cost is
    /// O(accepted moves x objects).
    pub fn collect_pickups(&mut self, x: f64, y: f64, radius: f64) -> Vec<ObjectId> {
        let mut collected = Vec::new();
        for object in &mut self.objects {
            if object.kind != ObjectKind::Pickup || !object.active {
                continue;
            }
            let dist = ((x - object.x).powi(2) + (y - object.y).powi(2)).sqrt();
            if dist < radius {
                object.active = false;
                collected.push(object.id.clone());
            }
        }
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::world::constants::interaction::PICKUP_RADIUS;

    #[test]
    fn test_default_layout() {
        let objects = ObjectSet::default_layout();
        let pickups = objects
            .active()
            .filter(|o| o.kind == ObjectKind::Pickup)
            .count();
        assert_eq!(pickups, 5);
        assert!(objects.get("npc_001").is_some());
        assert!(objects.get("portal_001").is_some());
    }

    #[test]
    fn test_pickup_collected_within_radius() {
        let mut objects = ObjectSet::default_layout();

        // 10 units away from gen_pickup_001, well under the radius.
        let collected = objects.collect_pickups(160.0, 150.0, PICKUP_RADIUS);
        assert_eq!(collected, vec!["gen_pickup_001".to_string()]);
        assert!(!objects.get("gen_pickup_001").unwrap().active);
    }

    #[test]
    fn test_pickup_reported_only_once() {
        let mut objects = ObjectSet::default_layout();

        let first = objects.collect_pickups(150.0, 150.0, PICKUP_RADIUS);
        assert_eq!(first.len(), 1);

        let second = objects.collect_pickups(150.0, 150.0, PICKUP_RADIUS);
        assert!(second.is_empty());
    }

    #[test]
    fn test_deactivation_is_permanent() {
        let mut objects = ObjectSet::default_layout();
        objects.collect_pickups(150.0, 150.0, PICKUP_RADIUS);

        assert!(!objects.get("gen_pickup_001").unwrap().active);
        assert!(objects.active().all(|o| o.id != "gen_pickup_001"));
    }

    #[test]
    fn test_out_of_range_pickup_untouched() {
        let mut objects = ObjectSet::default_layout();

        let collected = objects.collect_pickups(150.0 + PICKUP_RADIUS + 10.0, 150.0, PICKUP_RADIUS);
        assert!(collected.is_empty());
        assert!(objects.get("gen_pickup_001").unwrap().active);
    }

    #[test]
    fn test_npcs_and_portals_not_collectible() {
        let mut objects = ObjectSet::new(vec![
            WorldObject::new("npc", ObjectKind::Npc, 100.0, 100.0),
            WorldObject::new("portal", ObjectKind::Portal, 100.0, 100.0),
        ]);

        let collected = objects.collect_pickups(100.0, 100.0, PICKUP_RADIUS);
        assert!(collected.is_empty());
        assert!(objects.get("npc").unwrap().active);
        assert!(objects.get("portal").unwrap().active);
    }

    #[test]
    fn test_single_move_collects_multiple_pickups() {
        let mut objects = ObjectSet::new(vec![
            WorldObject::new("a", ObjectKind::Pickup, 100.0, 100.0),
            WorldObject::new("b", ObjectKind::Pickup, 120.0, 100.0),
        ]);

        let collected = objects.collect_pickups(110.0, 100.0, PICKUP_RADIUS);
        assert_eq!(collected.len(), 2);
    }
}
