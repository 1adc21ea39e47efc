use crate::world::{ObjectGraph, Rotation3, Vec3};

use super::tracker::EntityTracker;

pub fn lerp(a: f32, b: f32, t: f64) -> f32 {
    (f64::from(a) * (1.0 - t) + f64::from(b) * t) as f32
}

pub fn lerp_vec3(a: Vec3, b: Vec3, t: f64) -> Vec3 {
    Vec3::new(lerp(a.x, b.x, t), lerp(a.y, b.y, t), lerp(a.z, b.z, t))
}

/// Blends two binary angles along the shorter arc. Only the low 16 bits of
/// either input are significant.
pub fn lerp_angle(a: i32, b: i32, t: f64) -> i32 {
    let delta = i32::from(b.wrapping_sub(a) as i16);
    a.wrapping_add((f64::from(delta) * t).round() as i32)
}

pub fn lerp_rotation(a: Rotation3, b: Rotation3, t: f64) -> Rotation3 {
    Rotation3::new(
        lerp_angle(a.x, b.x, t),
        lerp_angle(a.y, b.y, t),
        lerp_angle(a.z, b.z, t),
    )
}

/// Overwrites each settled entity's transform with the blend of its two
/// buffered snapshots at `progress` (clamped to `[0, 1]`). Returns how many
/// entities were written.
pub fn interpolate(
    tracker: &mut EntityTracker,
    graph: &mut ObjectGraph,
    progress: f64,
) -> usize {
    tracker.reconcile(graph);
    let t = progress.clamp(0.0, 1.0);
    let mut written = 0;
    for (handle, entry) in tracker.entries() {
        if entry.is_settling() {
            continue;
        }
        let Some(entity) = graph.entity_mut(*handle) else {
            continue;
        };
        let (start, end) = (entry.tick_start(), entry.tick_end());
        entity.rotation = lerp_rotation(start.rotation, end.rotation, t);
        entity.position = lerp_vec3(start.position, end.position, t);
        entity.scale = lerp_vec3(start.scale, end.scale, t);
        if let (Some(a), Some(b)) = (start.collision_center, end.collision_center) {
            entity.set_collision_center(lerp_vec3(a, b, t));
        }
        written += 1;
    }
    written
}
