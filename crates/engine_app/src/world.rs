//! The demo world: door entities, each with one [`Door`] component.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use engine_component::{Component, ComponentConfig, ComponentError};
use engine_instance::{EntityAllocator, EntityHandle, EntityId, Instance, Variant};
use engine_instance::{decode_attributes, encode_attributes};
use tracing::{debug, info, warn};

use crate::door::{AUTO_CLOSE, Door, OPEN};

struct DoorEntity {
    instance: Instance,
    component: Component<Door>,
}

/// Owns every entity and its component.
pub struct World {
    allocator: EntityAllocator,
    doors: BTreeMap<EntityId, DoorEntity>,
}

impl World {
    #[must_use]
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            doors: BTreeMap::new(),
        }
    }

    /// Spawn a door entity and attach a [`Door`] to it.
    ///
    /// # Errors
    ///
    /// Whatever [`Door`] construction reports.
    pub fn spawn_door(&mut self, auto_close: f64) -> Result<EntityId, ComponentError> {
        let id = self.allocator.allocate();
        let instance = Instance::new(id, "Door").with_property("Name", format!("Door{}", id.raw()));
        instance.set_attribute(AUTO_CLOSE, Some(Variant::Number(auto_close)));

        let component = Component::<Door>::new(ComponentConfig::new("Door"), instance.clone())?;
        let behavior = component.behavior();
        behavior.opened().connect(|entity| debug!(%entity, "door opened"));
        behavior.closed().connect(|entity| debug!(%entity, "door closed"));
        self.doors.insert(id, DoorEntity { instance, component });
        debug!(entity = %id, "door spawned");
        Ok(id)
    }

    /// Stop and remove the door on `id`. Returns `false` if there is none.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        let uses = self.use_count(id);
        let Some(mut door) = self.doors.remove(&id) else {
            return false;
        };
        debug!(entity = %id, ?uses, "despawning door");
        let report = door.component.stop();
        if !report.is_clean() {
            warn!(entity = %id, failures = report.failures.len(), "door teardown was not clean");
        }
        true
    }

    /// Advance one tick: every door whose slot comes up this tick toggles.
    pub fn tick(&mut self, tick_id: u64) -> usize {
        let mut toggled = 0;
        for (slot, (id, door)) in self.doors.iter().enumerate() {
            let period = slot as u64 + 2;
            if tick_id % period != 0 {
                continue;
            }
            match door.component.behavior().toggle(door.component.base()) {
                Ok(_) => toggled += 1,
                Err(err) => warn!(entity = %id, error = %err, "door toggle failed"),
            }
        }
        toggled
    }

    /// MessagePack snapshot of the attributes on `id`.
    ///
    /// # Errors
    ///
    /// Unknown entity or encoding failure.
    pub fn snapshot(&self, id: EntityId) -> Result<Vec<u8>> {
        let door = self.doors.get(&id).with_context(|| format!("no entity {id}"))?;
        Ok(encode_attributes(&door.instance.attributes())?)
    }

    /// Apply a snapshot from [`World::snapshot`] to `id`.
    ///
    /// # Errors
    ///
    /// Unknown entity or malformed bytes.
    pub fn restore(&self, id: EntityId, bytes: &[u8]) -> Result<()> {
        let door = self.doors.get(&id).with_context(|| format!("no entity {id}"))?;
        door.instance.load_attributes(decode_attributes(bytes)?);
        Ok(())
    }

    /// Times the door on `id` has been opened.
    #[must_use]
    pub fn use_count(&self, id: EntityId) -> Option<f64> {
        self.doors.get(&id).map(|door| door.component.behavior().use_count())
    }

    /// Current `Open` attribute of the door on `id`.
    #[must_use]
    pub fn is_open(&self, id: EntityId) -> Option<bool> {
        let door = self.doors.get(&id)?;
        door.instance.attribute(OPEN).as_ref().and_then(Variant::as_bool)
    }

    /// Number of doors currently open.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.doors
            .keys()
            .filter(|id| self.is_open(**id) == Some(true))
            .count()
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.doors.len()
    }

    /// Stop every component, in spawn order.
    pub fn shutdown(&mut self) {
        let ids: Vec<EntityId> = self.doors.keys().copied().collect();
        for id in ids {
            self.despawn(id);
        }
        info!(allocated = self.allocator.allocated(), "world shut down");
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_and_despawn() {
        let mut world = World::new();
        let a = world.spawn_door(0.0).unwrap();
        let b = world.spawn_door(0.0).unwrap();
        assert_ne!(a, b);
        assert_eq!(world.entity_count(), 2);
        assert_eq!(world.is_open(a), Some(false));

        assert!(world.despawn(a));
        assert!(!world.despawn(a));
        assert_eq!(world.entity_count(), 1);
        assert_eq!(world.is_open(a), None);
    }

    #[test]
    fn test_tick_toggles_on_schedule() {
        let mut world = World::new();
        let first = world.spawn_door(0.0).unwrap();
        let second = world.spawn_door(0.0).unwrap();

        assert_eq!(world.tick(1), 0);
        assert_eq!(world.tick(2), 1);
        assert_eq!(world.is_open(first), Some(true));
        assert_eq!(world.tick(3), 1);
        assert_eq!(world.is_open(second), Some(true));
        assert_eq!(world.tick(6), 2);
        assert_eq!(world.use_count(first), Some(1.0));
        assert_eq!(world.use_count(second), Some(1.0));
    }

    #[test]
    fn test_snapshot_restore() {
        let mut world = World::new();
        let id = world.spawn_door(0.0).unwrap();
        world.tick(2);
        let saved = world.snapshot(id).unwrap();

        world.tick(4);
        world.tick(6);
        assert_eq!(world.use_count(id), Some(2.0));

        world.restore(id, &saved).unwrap();
        assert_eq!(world.is_open(id), Some(true));
        assert_eq!(world.use_count(id), Some(1.0));
    }

    #[test]
    fn test_snapshot_unknown_entity() {
        let world = World::new();
        assert!(world.snapshot(EntityId::from_raw(9)).is_err());
        assert!(world.restore(EntityId::from_raw(9), &[]).is_err());
    }

    #[test]
    fn test_shutdown_stops_everything() {
        let mut world = World::new();
        for _ in 0..3 {
            world.spawn_door(0.0).unwrap();
        }
        world.shutdown();
        assert_eq!(world.entity_count(), 0);
    }
}
