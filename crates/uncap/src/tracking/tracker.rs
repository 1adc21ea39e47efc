use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::trace;

use crate::config::DEFAULT_SETTLE_TICKS;
use crate::world::{Entity, LifecycleEvent, NodeHandle, ObjectGraph, Rotation3, Vec3};

/// Transform fields buffered at a tick boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransformSnapshot {
    pub rotation: Rotation3,
    pub position: Vec3,
    pub scale: Vec3,
    pub collision_center: Option<Vec3>,
}

impl TransformSnapshot {
    pub fn capture(entity: &Entity) -> Self {
        Self {
            rotation: entity.rotation,
            position: entity.position,
            scale: entity.scale,
            collision_center: entity.collision_center(),
        }
    }

    pub fn apply_to(&self, entity: &mut Entity) {
        entity.rotation = self.rotation;
        entity.position = self.position;
        entity.scale = self.scale;
        if let Some(center) = self.collision_center {
            entity.set_collision_center(center);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Active,
    Stale,
}

#[derive(Debug, Clone)]
pub struct TrackedEntry {
    settle_counter: i32,
    snapshots: [TransformSnapshot; 2],
    primed: bool,
    presence: Presence,
}

impl TrackedEntry {
    fn new(settle_ticks: i32) -> Self {
        Self {
            settle_counter: settle_ticks,
            snapshots: [TransformSnapshot::default(); 2],
            primed: false,
            presence: Presence::Active,
        }
    }

    pub fn settle_counter(&self) -> i32 {
        self.settle_counter
    }

    /// True until the entry has counted down and holds captured snapshots
    /// in both slots.
    pub fn is_settling(&self) -> bool {
        self.settle_counter > 0 || !self.primed
    }

    pub fn tick_start(&self) -> &TransformSnapshot {
        &self.snapshots[0]
    }

    pub fn tick_end(&self) -> &TransformSnapshot {
        &self.snapshots[1]
    }

    fn advance(&mut self, current: TransformSnapshot) {
        self.settle_counter = self.settle_counter.saturating_sub(1).max(0);
        if self.settle_counter > 0 || !self.primed {
            self.snapshots = [current, current];
            self.primed = true;
        } else {
            self.snapshots[0] = self.snapshots[1];
            self.snapshots[1] = current;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub tracked: usize,
    pub untracked: usize,
}

/// Registry of nodes carrying transform state, rebuilt against the live
/// graph on every pass. Keys are generational handles, so a recycled slot is
/// always a new entry.
#[derive(Debug)]
pub struct EntityTracker {
    entries: HashMap<NodeHandle, TrackedEntry>,
    settle_ticks: i32,
}

impl Default for EntityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_TICKS)
    }
}

impl EntityTracker {
    pub fn new(settle_ticks: i32) -> Self {
        Self {
            entries: HashMap::new(),
            settle_ticks,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn entry(&self, handle: NodeHandle) -> Option<&TrackedEntry> {
        self.entries.get(&handle)
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&NodeHandle, &TrackedEntry)> {
        self.entries.iter()
    }

    pub fn notify_created(&mut self, handle: NodeHandle) {
        let settle_ticks = self.settle_ticks;
        self.entries
            .entry(handle)
            .or_insert_with(|| TrackedEntry::new(settle_ticks));
    }

    pub fn notify_destroyed(&mut self, handle: NodeHandle) {
        self.entries.remove(&handle);
    }

    pub fn absorb(&mut self, events: impl IntoIterator<Item = LifecycleEvent>) {
        for event in events {
            match event {
                LifecycleEvent::Created(handle) => self.notify_created(handle),
                LifecycleEvent::Destroyed(handle) => self.notify_destroyed(handle),
            }
        }
    }

    /// Makes the registry key set equal to the reachable nodes that carry a
    /// primary block. Safe to call any number of times per tick.
    pub fn reconcile(&mut self, graph: &ObjectGraph) -> ReconcileReport {
        for entry in self.entries.values_mut() {
            entry.presence = Presence::Stale;
        }

        let settle_ticks = self.settle_ticks;
        let entries = &mut self.entries;
        let mut tracked = 0;
        graph.for_each_reachable(|handle, node| {
            if node.attachments().primary.is_none() {
                return;
            }
            match entries.entry(handle) {
                Entry::Occupied(mut occupied) => {
                    debug_assert_eq!(
                        occupied.get().presence,
                        Presence::Stale,
                        "node {handle} reached twice during reconcile"
                    );
                    occupied.get_mut().presence = Presence::Active;
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(TrackedEntry::new(settle_ticks));
                    trace!(node = %handle, "entity_tracked");
                    tracked += 1;
                }
            }
        });

        let before = self.entries.len();
        self.entries.retain(|handle, entry| {
            let keep = entry.presence == Presence::Active;
            if !keep {
                trace!(node = %handle, "entity_untracked");
            }
            keep
        });

        ReconcileReport {
            tracked,
            untracked: before - self.entries.len(),
        }
    }

    pub fn tick_advance(&mut self, graph: &ObjectGraph) -> ReconcileReport {
        let report = self.reconcile(graph);
        for (handle, entry) in self.entries.iter_mut() {
            if let Some(entity) = graph.entity(*handle) {
                entry.advance(TransformSnapshot::capture(entity));
            }
        }
        report
    }

    /// Writes each settled entry's tick-end snapshot back into its entity,
    /// undoing whatever the display pass wrote.
    pub fn restore(&mut self, graph: &mut ObjectGraph) -> usize {
        self.reconcile(graph);
        let mut restored = 0;
        for (handle, entry) in &self.entries {
            if entry.is_settling() {
                continue;
            }
            if let Some(entity) = graph.entity_mut(*handle) {
                entry.tick_end().apply_to(entity);
                restored += 1;
            }
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{AllocFlags, Collision};

    fn spawn_tracked(graph: &mut ObjectGraph, list: usize) -> NodeHandle {
        let handle = graph
            .allocate(AllocFlags::PRIMARY, 0, |_| {})
            .expect("allocate");
        assert!(graph.attach_root(list, handle));
        handle
    }

    fn place(graph: &mut ObjectGraph, handle: NodeHandle, x: f32) {
        let entity = graph.entity_mut(handle).expect("entity");
        entity.position = Vec3::new(x, 0.0, 0.0);
        entity.rotation = Rotation3::new(x as i32, 0, 0);
    }

    #[test]
    fn reconcile_tracks_reachable_primary_nodes_only() {
        let mut graph = ObjectGraph::new();
        let mut tracker = EntityTracker::default();
        let tracked = spawn_tracked(&mut graph, 0);
        let plain = graph
            .allocate(AllocFlags::SECONDARY, 0, |_| {})
            .expect("allocate");
        assert!(graph.attach_root(0, plain));
        let child = graph
            .allocate(AllocFlags::PRIMARY, 0, |_| {})
            .expect("allocate");
        assert!(graph.attach_child(plain, child));
        let _unlinked = graph
            .allocate(AllocFlags::PRIMARY, 0, |_| {})
            .expect("allocate");

        let report = tracker.reconcile(&graph);

        assert_eq!(report.tracked, 2);
        assert!(tracker.contains(tracked));
        assert!(tracker.contains(child));
        assert!(!tracker.contains(plain));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut graph = ObjectGraph::new();
        let mut tracker = EntityTracker::default();
        spawn_tracked(&mut graph, 0);
        spawn_tracked(&mut graph, 5);

        tracker.reconcile(&graph);
        let second = tracker.reconcile(&graph);

        assert_eq!(second, ReconcileReport::default());
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn removed_entity_is_dropped_in_the_same_pass() {
        let mut graph = ObjectGraph::new();
        let mut tracker = EntityTracker::default();
        let handle = spawn_tracked(&mut graph, 0);
        tracker.reconcile(&graph);

        assert!(graph.release(handle));
        let report = tracker.reconcile(&graph);

        assert_eq!(report.untracked, 1);
        assert!(!tracker.contains(handle));
    }

    #[test]
    fn notifications_are_only_a_fast_path() {
        let mut graph = ObjectGraph::new();
        let mut tracker = EntityTracker::default();
        let linked = spawn_tracked(&mut graph, 0);
        let unlinked = graph
            .allocate(AllocFlags::PRIMARY, 0, |_| {})
            .expect("allocate");
        tracker.absorb(graph.drain_events());
        assert!(tracker.contains(linked));
        assert!(tracker.contains(unlinked));

        tracker.reconcile(&graph);
        assert!(tracker.contains(linked));
        assert!(!tracker.contains(unlinked));
    }

    #[test]
    fn new_entry_settles_for_two_ticks() {
        let mut graph = ObjectGraph::new();
        let mut tracker = EntityTracker::default();
        let handle = spawn_tracked(&mut graph, 0);

        place(&mut graph, handle, 1.0);
        tracker.tick_advance(&graph);
        let entry = tracker.entry(handle).expect("entry");
        assert!(entry.is_settling());
        assert_eq!(entry.tick_start().position.x, 1.0);
        assert_eq!(entry.tick_end().position.x, 1.0);

        place(&mut graph, handle, 2.0);
        tracker.tick_advance(&graph);
        let entry = tracker.entry(handle).expect("entry");
        assert!(!entry.is_settling());
        assert_eq!(entry.tick_start().position.x, 1.0);
        assert_eq!(entry.tick_end().position.x, 2.0);
    }

    #[test]
    fn settled_entry_buffers_previous_and_current_tick() {
        let mut graph = ObjectGraph::new();
        let mut tracker = EntityTracker::default();
        let handle = spawn_tracked(&mut graph, 0);

        for tick in 1..=6 {
            place(&mut graph, handle, tick as f32 * 10.0);
            tracker.tick_advance(&graph);
            if tick >= 3 {
                let entry = tracker.entry(handle).expect("entry");
                assert_eq!(entry.tick_start().position.x, (tick - 1) as f32 * 10.0);
                assert_eq!(entry.tick_end().position.x, tick as f32 * 10.0);
                assert_eq!(entry.tick_end().rotation.x, tick * 10);
            }
        }
    }

    #[test]
    fn readding_an_entity_restarts_settling() {
        let mut graph = ObjectGraph::new();
        let mut tracker = EntityTracker::default();
        let first = spawn_tracked(&mut graph, 0);
        for _ in 0..3 {
            tracker.tick_advance(&graph);
        }
        assert!(!tracker.entry(first).expect("entry").is_settling());

        assert!(graph.release(first));
        let second = spawn_tracked(&mut graph, 0);
        assert_eq!(second.index(), first.index());
        tracker.reconcile(&graph);

        assert!(!tracker.contains(first));
        let entry = tracker.entry(second).expect("entry");
        assert_eq!(entry.settle_counter(), DEFAULT_SETTLE_TICKS);
    }

    #[test]
    fn restore_skips_settling_entries() {
        let mut graph = ObjectGraph::new();
        let mut tracker = EntityTracker::default();
        let handle = spawn_tracked(&mut graph, 0);
        place(&mut graph, handle, 3.0);
        tracker.tick_advance(&graph);

        place(&mut graph, handle, 99.0);
        assert_eq!(tracker.restore(&mut graph), 0);
        assert_eq!(graph.entity(handle).expect("entity").position.x, 99.0);
    }

    #[test]
    fn restore_writes_tick_end_including_collision_center() {
        let mut graph = ObjectGraph::new();
        let mut tracker = EntityTracker::default();
        let handle = spawn_tracked(&mut graph, 0);
        graph.entity_mut(handle).expect("entity").collision = Some(Collision {
            center: Vec3::new(0.0, 1.0, 0.0),
            radius: 2.0,
        });
        tracker.tick_advance(&graph);
        tracker.tick_advance(&graph);

        let entity = graph.entity_mut(handle).expect("entity");
        entity.position = Vec3::new(7.0, 7.0, 7.0);
        entity.set_collision_center(Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(tracker.restore(&mut graph), 1);

        let entity = graph.entity(handle).expect("entity");
        assert_eq!(entity.position, Vec3::ZERO);
        assert_eq!(entity.collision_center(), Some(Vec3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn first_capture_fills_both_slots_for_any_settle_count() {
        for settle_ticks in [0, 1] {
            let mut graph = ObjectGraph::new();
            let mut tracker = EntityTracker::new(settle_ticks);
            let handle = spawn_tracked(&mut graph, 0);
            tracker.reconcile(&graph);
            assert!(tracker.entry(handle).expect("entry").is_settling());

            place(&mut graph, handle, 100.0);
            assert_eq!(tracker.restore(&mut graph), 0);
            tracker.tick_advance(&graph);

            let entry = tracker.entry(handle).expect("entry");
            assert!(!entry.is_settling());
            assert_eq!(entry.tick_start().position.x, 100.0);
            assert_eq!(entry.tick_end().position.x, 100.0);
        }
    }
}
