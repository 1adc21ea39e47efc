use crate::config::RateDivisor;
use crate::world::{NodeHandle, ObjectGraph};

use super::input::ButtonMasks;

/// Services the host application provides around each render callback.
/// Optional hooks default to doing nothing.
pub trait Host {
    fn pressed_buttons(&self) -> ButtonMasks;

    /// Overwrites the per-controller input state the next logic step reads.
    fn write_pressed_buttons(&mut self, masks: ButtonMasks);

    fn run_logic_step(&mut self, graph: &mut ObjectGraph);

    fn render_all(&mut self, graph: &mut ObjectGraph);

    /// While set, the host runs logic without drawing.
    fn set_logic_only(&mut self, _logic_only: bool) {}

    fn camera(&self) -> Option<NodeHandle> {
        None
    }

    fn display_camera(&mut self, _graph: &ObjectGraph, _camera: NodeHandle) {}

    fn draw_overlay(&mut self) {}

    fn frame_increment(&self) -> u32 {
        1
    }

    fn set_frame_rate_mode(&mut self, _mode: u32, _increment: u32) {}

    /// A rate divisor the host's own code asked for during the last logic
    /// step, if any.
    fn take_rate_request(&mut self) -> Option<i64> {
        None
    }

    fn apply_rate_divisor(&mut self, _divisor: RateDivisor) {}
}

/// Forwards to `original` only for a present argument.
pub fn guard_non_null<T, R: Default>(arg: Option<T>, original: impl FnOnce(T) -> R) -> R {
    match arg {
        Some(value) => original(value),
        None => R::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_skips_original_for_missing_argument() {
        let mut calls = 0;
        let bound: u32 = guard_non_null(None::<u32>, |texture| {
            calls += 1;
            texture
        });
        assert_eq!(bound, 0);
        assert_eq!(calls, 0);

        let bound = guard_non_null(Some(7u32), |texture| {
            calls += 1;
            texture * 2
        });
        assert_eq!(bound, 14);
        assert_eq!(calls, 1);
    }
}
