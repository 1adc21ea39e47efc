mod interpolate;
mod tracker;

pub use interpolate::{interpolate, lerp, lerp_angle, lerp_rotation, lerp_vec3};
pub use tracker::{EntityTracker, ReconcileReport, TrackedEntry, TransformSnapshot};
