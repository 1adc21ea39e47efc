use tracing::{debug, info};
use uncap::{ButtonMasks, Host, NodeHandle, ObjectGraph, RateDivisor, TextureId, CONTROLLER_SLOTS};

use super::bootstrap::DemoSettings;

pub(crate) const START_BUTTON: u32 = 1 << 3;

/// Stand-in for the host application: a scripted controller, a logic step
/// that runs node callbacks, and a renderer that only counts what it sees
/// and queues its texture binds for the bind entry point.
#[derive(Debug)]
pub(crate) struct SimHost {
    settings: DemoSettings,
    frame: u64,
    input_state: ButtonMasks,
    logic_only: bool,
    frame_increment: u32,
    frame_multiplier: u32,
    pending_rate_request: Option<i64>,
    camera: Option<NodeHandle>,
    texture: Option<TextureId>,
    texture_binds: Vec<Option<TextureId>>,
    pub(crate) stats: HostStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct HostStats {
    pub(crate) logic_steps: u64,
    pub(crate) starts_seen: u64,
    pub(crate) frames_drawn: u64,
    pub(crate) entities_drawn: u64,
    pub(crate) camera_draws: u64,
    pub(crate) textures_bound: u64,
    pub(crate) null_texture_binds: u64,
    pub(crate) limiter_waits: u64,
    pub(crate) draws_while_logic_only: u64,
}

impl SimHost {
    pub(crate) fn new(settings: DemoSettings) -> Self {
        Self {
            settings,
            frame: 0,
            input_state: [0; CONTROLLER_SLOTS],
            logic_only: false,
            frame_increment: 1,
            frame_multiplier: 1,
            pending_rate_request: None,
            camera: None,
            texture: None,
            texture_binds: Vec::new(),
            stats: HostStats::default(),
        }
    }

    pub(crate) fn set_camera(&mut self, camera: Option<NodeHandle>) {
        self.camera = camera;
    }

    pub(crate) fn begin_frame(&mut self, frame: u64) {
        self.frame = frame;
        self.texture = (frame % 2 == 0).then_some(7);
    }

    pub(crate) fn frame_multiplier(&self) -> u32 {
        self.frame_multiplier
    }

    pub(crate) fn take_texture_binds(&mut self) -> Vec<Option<TextureId>> {
        std::mem::take(&mut self.texture_binds)
    }

    /// The host's own bind routine. It has no null check of its own.
    pub(crate) fn bind_texture(&mut self, texture: Option<TextureId>) -> bool {
        match texture {
            Some(_) => self.stats.textures_bound += 1,
            None => self.stats.null_texture_binds += 1,
        }
        true
    }

    pub(crate) fn wait_for_frame_limit(&mut self) {
        self.stats.limiter_waits += 1;
    }
}

impl Host for SimHost {
    fn pressed_buttons(&self) -> ButtonMasks {
        let every = self.settings.press_every_frames.max(1);
        let mut masks = [0; CONTROLLER_SLOTS];
        if self.frame % every == 0 {
            masks[0] = START_BUTTON;
        }
        masks
    }

    fn write_pressed_buttons(&mut self, masks: ButtonMasks) {
        self.input_state = masks;
    }

    fn run_logic_step(&mut self, graph: &mut ObjectGraph) {
        self.stats.logic_steps += 1;
        if self.input_state[0] & START_BUTTON != 0 {
            self.stats.starts_seen += 1;
        }
        graph.run_logic();

        let step = self.stats.logic_steps;
        if let Some((at_tick, divisor)) = self.settings.rate_request_at_tick {
            if step == at_tick {
                self.pending_rate_request = Some(divisor);
            }
        }
        if self.settings.slow_event_at_tick == Some(step) {
            info!(tick = step, "slow_event_started");
            self.frame_increment = 2;
        }
    }

    fn render_all(&mut self, graph: &mut ObjectGraph) {
        if self.logic_only {
            self.stats.draws_while_logic_only += 1;
        }
        self.stats.frames_drawn += 1;
        let drawn = graph
            .walk()
            .into_iter()
            .filter(|handle| graph.entity(*handle).is_some())
            .count();
        self.stats.entities_drawn += drawn as u64;
        self.texture_binds.push(self.texture);
    }

    fn set_logic_only(&mut self, logic_only: bool) {
        self.logic_only = logic_only;
    }

    fn camera(&self) -> Option<NodeHandle> {
        self.camera
    }

    fn display_camera(&mut self, graph: &ObjectGraph, camera: NodeHandle) {
        if graph.entity(camera).is_some() {
            self.stats.camera_draws += 1;
        }
    }

    fn frame_increment(&self) -> u32 {
        self.frame_increment
    }

    fn set_frame_rate_mode(&mut self, mode: u32, increment: u32) {
        debug!(mode, increment, "frame_rate_mode_set");
        self.frame_increment = increment;
    }

    fn take_rate_request(&mut self) -> Option<i64> {
        self.pending_rate_request.take()
    }

    fn apply_rate_divisor(&mut self, divisor: RateDivisor) {
        self.frame_multiplier = divisor.get();
    }
}

#[cfg(test)]
mod tests {
    use uncap::AllocFlags;

    use super::*;

    fn settings() -> DemoSettings {
        DemoSettings {
            rate_request_at_tick: Some((2, 3)),
            slow_event_at_tick: Some(3),
            press_every_frames: 2,
            ..DemoSettings::default()
        }
    }

    #[test]
    fn controller_script_presses_start_on_schedule() {
        let mut host = SimHost::new(settings());
        host.begin_frame(4);
        assert_eq!(host.pressed_buttons()[0], START_BUTTON);
        host.begin_frame(5);
        assert_eq!(host.pressed_buttons(), [0; CONTROLLER_SLOTS]);
    }

    #[test]
    fn scripted_rate_request_and_slow_event_fire_once() {
        let mut host = SimHost::new(settings());
        let mut graph = ObjectGraph::new();

        host.run_logic_step(&mut graph);
        assert_eq!(host.take_rate_request(), None);
        host.run_logic_step(&mut graph);
        assert_eq!(host.take_rate_request(), Some(3));
        assert_eq!(host.take_rate_request(), None);
        assert_eq!(host.frame_increment(), 1);
        host.run_logic_step(&mut graph);
        assert_eq!(host.frame_increment(), 2);

        host.set_frame_rate_mode(1, 1);
        assert_eq!(host.frame_increment(), 1);
    }

    #[test]
    fn renderer_queues_one_bind_per_frame() {
        let mut graph = ObjectGraph::new();
        let entity = graph
            .allocate(AllocFlags::PRIMARY, 0, |_| {})
            .expect("allocate");
        assert!(graph.attach_root(0, entity));

        let mut host = SimHost::new(settings());
        for frame in 0..4 {
            host.begin_frame(frame);
            host.render_all(&mut graph);
        }

        assert_eq!(host.take_texture_binds(), vec![Some(7), None, Some(7), None]);
        assert!(host.take_texture_binds().is_empty());
        assert_eq!(host.stats.entities_drawn, 4);
    }

    #[test]
    fn unguarded_bind_counts_null_textures() {
        let mut host = SimHost::new(settings());
        host.bind_texture(Some(7));
        host.bind_texture(None);

        assert_eq!(host.stats.textures_bound, 1);
        assert_eq!(host.stats.null_texture_binds, 1);
    }
}
