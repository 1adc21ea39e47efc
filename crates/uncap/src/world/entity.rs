use serde::{Deserialize, Serialize};

/// Binary angle units in one full turn.
pub const ANGLE_UNITS_PER_TURN: i32 = 0x10000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Per-axis rotation in binary angle units. Values are stored wide, but only
/// the low 16 bits carry direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rotation3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Rotation3 {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn wrapped(self) -> Self {
        Self {
            x: wrap_angle(self.x),
            y: wrap_angle(self.y),
            z: wrap_angle(self.z),
        }
    }
}

pub fn wrap_angle(angle: i32) -> i32 {
    angle.rem_euclid(ANGLE_UNITS_PER_TURN)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Collision {
    pub center: Vec3,
    pub radius: f32,
}

/// Transform state a node exposes through its primary attachment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    pub rotation: Rotation3,
    pub position: Vec3,
    pub scale: Vec3,
    pub collision: Option<Collision>,
}

impl Entity {
    pub fn collision_center(&self) -> Option<Vec3> {
        self.collision.map(|collision| collision.center)
    }

    pub fn set_collision_center(&mut self, center: Vec3) -> bool {
        match self.collision.as_mut() {
            Some(collision) => {
                collision.center = center;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_angle_folds_negative_and_overflowing_values() {
        assert_eq!(wrap_angle(-1), 0xFFFF);
        assert_eq!(wrap_angle(0x10000), 0);
        assert_eq!(wrap_angle(0x18000), 0x8000);
    }

    #[test]
    fn collision_center_is_only_written_when_collision_exists() {
        let mut entity = Entity::default();
        assert!(!entity.set_collision_center(Vec3::ONE));
        assert_eq!(entity.collision_center(), None);

        entity.collision = Some(Collision::default());
        assert!(entity.set_collision_center(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(entity.collision_center(), Some(Vec3::new(1.0, 2.0, 3.0)));
    }
}
