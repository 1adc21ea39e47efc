use std::time::Instant;

use uncap::{
    AllocError, AllocRequest, ConfigError, EntryPoint, EntryPoints, FrameReport, Handler, Hook,
    Host, NodeHandle, RateDivisor, RateRequest, RedirectError, Redirector, Runtime,
    RuntimeProcess, TextureId,
};

use super::sim_host::SimHost;

/// Everything living in the host process: the runtime and the host it was
/// installed into.
#[derive(Debug)]
pub(crate) struct DemoProcess {
    pub(crate) runtime: Runtime,
    pub(crate) host: SimHost,
}

impl RuntimeProcess for DemoProcess {
    fn parts(&mut self) -> (&mut Runtime, &mut dyn Host) {
        (&mut self.runtime, &mut self.host)
    }
}

/// Redirection table for a host in the same process. Every entry point
/// starts out answered by the host's own routine below.
pub(crate) struct InProcessRedirector {
    entry_points: EntryPoints<DemoProcess>,
    unavailable: Vec<EntryPoint>,
}

impl Default for InProcessRedirector {
    fn default() -> Self {
        Self {
            entry_points: host_entry_points(),
            unavailable: Vec::new(),
        }
    }
}

impl InProcessRedirector {
    #[cfg(test)]
    pub(crate) fn without(points: &[EntryPoint]) -> Self {
        Self {
            unavailable: points.to_vec(),
            ..Self::default()
        }
    }

    pub(crate) fn entry_points(&self) -> EntryPoints<DemoProcess> {
        self.entry_points
    }

    pub(crate) fn len(&self) -> usize {
        self.entry_points.redirected_count()
    }
}

impl Redirector<DemoProcess> for InProcessRedirector {
    fn redirect(&mut self, handler: Handler<DemoProcess>) -> Result<(), RedirectError> {
        let point = handler.point();
        if self.unavailable.contains(&point) {
            return Err(RedirectError::EntryPointUnavailable { point });
        }
        self.entry_points.redirect(handler)
    }
}

fn host_entry_points() -> EntryPoints<DemoProcess> {
    EntryPoints {
        render_frame: Hook::new(EntryPoint::RenderFrame, host_render_frame),
        set_rate_divisor: Hook::new(EntryPoint::SetRateDivisor, host_set_rate_divisor),
        allocate_object: Hook::new(EntryPoint::AllocateObject, host_allocate_object),
        release_object: Hook::new(EntryPoint::ReleaseObject, host_release_object),
        frame_limit: Hook::new(EntryPoint::FrameLimit, host_frame_limit),
        bind_texture: Hook::new(EntryPoint::BindTexture, host_bind_texture),
    }
}

// One logic step per rendered frame, locked to the display.
fn host_render_frame(process: &mut DemoProcess, _now: Instant) -> FrameReport {
    let DemoProcess { runtime, host } = process;
    let pressed = host.pressed_buttons();
    host.write_pressed_buttons(pressed);
    host.run_logic_step(runtime.graph_mut());
    host.render_all(runtime.graph_mut());
    host.draw_overlay();
    runtime.graph_mut().drain_events();
    FrameReport {
        ticks_run: 1,
        ..FrameReport::default()
    }
}

fn host_set_rate_divisor(
    process: &mut DemoProcess,
    request: RateRequest,
) -> Result<RateDivisor, ConfigError> {
    let divisor = RateDivisor::new(request.value)?;
    process.host.apply_rate_divisor(divisor);
    Ok(divisor)
}

fn host_allocate_object(
    process: &mut DemoProcess,
    request: AllocRequest,
) -> Result<NodeHandle, AllocError> {
    process
        .runtime
        .graph_mut()
        .allocate(request.flags, request.index_hint, request.init)
}

fn host_release_object(process: &mut DemoProcess, handle: NodeHandle) -> bool {
    process.runtime.graph_mut().release(handle)
}

fn host_frame_limit(process: &mut DemoProcess, _: ()) {
    process.host.wait_for_frame_limit();
}

fn host_bind_texture(process: &mut DemoProcess, texture: Option<TextureId>) -> bool {
    process.host.bind_texture(texture)
}
