use std::process::ExitCode;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};
use uncap::{ObjectGraph, RateRequest, Runtime, UncapConfig, UncapError};

use super::bootstrap::{AppWiring, DemoSettings};
use super::redirect::{DemoProcess, InProcessRedirector};
use super::scene;
use super::sim_host::SimHost;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DemoSummary {
    pub(crate) frames: u64,
    pub(crate) ticks: u64,
    pub(crate) runaway_resets: u64,
    pub(crate) native_rate_restores: u64,
    pub(crate) final_rate_divisor: u32,
    pub(crate) host_frame_multiplier: u32,
    pub(crate) starts_seen: u64,
    pub(crate) entities_drawn: u64,
    pub(crate) camera_draws: u64,
    pub(crate) textures_bound: u64,
    pub(crate) null_texture_binds: u64,
    pub(crate) limiter_waits: u64,
    pub(crate) draws_while_logic_only: u64,
    pub(crate) tracked_entities: usize,
    pub(crate) live_nodes: usize,
    pub(crate) spinners_alive: usize,
    pub(crate) last_fps: f32,
    pub(crate) last_tps: f32,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_session(app.config, app.settings, Instant::now()) {
        Ok(summary) => {
            match serde_json::to_string(&summary) {
                Ok(json) => info!(summary = %json, "demo_finished"),
                Err(err) => warn!(error = %err, "demo_summary_serialize_failed"),
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}

/// Plays the scripted session against a virtual clock starting at `start`.
/// Every host entry point is reached through the installed table.
pub(crate) fn run_session(
    config: UncapConfig,
    settings: DemoSettings,
    start: Instant,
) -> Result<DemoSummary, UncapError> {
    let mut process = DemoProcess {
        runtime: Runtime::with_graph(config, ObjectGraph::new(), start)?,
        host: SimHost::new(settings),
    };
    let mut redirector = InProcessRedirector::default();
    process.runtime.install(&mut redirector)?;
    let entry_points = redirector.entry_points();
    info!(entry_points = redirector.len(), "redirections_ready");

    let boot_rate = RateRequest {
        value: i64::from(process.runtime.config().rate_divisor.get()),
        at: start,
    };
    entry_points.set_rate_divisor.invoke(&mut process, boot_rate)?;
    let demo_scene = scene::populate(&mut process, &entry_points)?;
    process.host.set_camera(Some(demo_scene.camera));

    let frame_dt = Duration::from_secs_f64(1.0 / f64::from(settings.render_hz.max(1)));
    let mut now = start;
    let mut ticks = 0u64;
    let mut runaway_resets = 0u64;
    let mut native_rate_restores = 0u64;
    for frame in 0..settings.frames {
        now += frame_dt;
        if settings.stall_at_frame == Some(frame) {
            info!(frame, stall_ms = settings.stall.as_millis() as u64, "simulated_stall");
            now += settings.stall;
        }
        process.host.begin_frame(frame);
        let report = entry_points.render_frame.invoke(&mut process, now);
        for texture in process.host.take_texture_binds() {
            entry_points.bind_texture.invoke(&mut process, texture);
        }
        entry_points.frame_limit.invoke(&mut process, ());

        ticks += u64::from(report.ticks_run);
        runaway_resets += u64::from(report.runaway_reset);
        native_rate_restores += u64::from(report.native_rate_restored);
    }

    let DemoProcess { runtime, host } = process;
    let metrics = runtime.metrics_handle().snapshot();
    Ok(DemoSummary {
        frames: settings.frames,
        ticks,
        runaway_resets,
        native_rate_restores,
        final_rate_divisor: runtime.scheduler().divisor().get(),
        host_frame_multiplier: host.frame_multiplier(),
        starts_seen: host.stats.starts_seen,
        entities_drawn: host.stats.entities_drawn,
        camera_draws: host.stats.camera_draws,
        textures_bound: host.stats.textures_bound,
        null_texture_binds: host.stats.null_texture_binds,
        limiter_waits: host.stats.limiter_waits,
        draws_while_logic_only: host.stats.draws_while_logic_only,
        tracked_entities: runtime.tracker().len(),
        live_nodes: runtime.graph().live_count(),
        spinners_alive: runtime.graph().children(demo_scene.spawner).len(),
        last_fps: metrics.fps,
        last_tps: metrics.tps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::scene::MAX_SPINNERS;

    fn quiet_settings(frames: u64) -> DemoSettings {
        DemoSettings {
            frames,
            render_hz: 120,
            stall_at_frame: None,
            rate_request_at_tick: None,
            slow_event_at_tick: None,
            ..DemoSettings::default()
        }
    }

    #[test]
    fn logic_runs_at_sixty_hz_regardless_of_render_rate() {
        let summary = run_session(UncapConfig::default(), quiet_settings(240), Instant::now())
            .expect("session");

        assert!((118..=120).contains(&summary.ticks), "ticks {}", summary.ticks);
        assert_eq!(summary.runaway_resets, 0);
        assert_eq!(summary.draws_while_logic_only, 0);
        assert_eq!(summary.camera_draws, 240);
    }

    #[test]
    fn redirected_limiter_and_texture_guard_are_in_effect() {
        let summary = run_session(UncapConfig::default(), quiet_settings(20), Instant::now())
            .expect("session");

        assert_eq!(summary.limiter_waits, 0);
        assert_eq!(summary.null_texture_binds, 0);
        assert_eq!(summary.textures_bound, 10);
    }

    #[test]
    fn spinners_and_camera_are_tracked() {
        let summary = run_session(UncapConfig::default(), quiet_settings(480), Instant::now())
            .expect("session");

        assert_eq!(summary.tracked_entities, MAX_SPINNERS + 1);
        assert_eq!(summary.live_nodes, MAX_SPINNERS + 2);
        assert_eq!(summary.spinners_alive, MAX_SPINNERS);
    }

    #[test]
    fn stall_is_discarded_and_scripted_events_restore_native_rate() {
        let settings = DemoSettings {
            frames: 600,
            render_hz: 120,
            stall_at_frame: Some(60),
            stall: Duration::from_secs(3),
            rate_request_at_tick: Some((30, 2)),
            slow_event_at_tick: Some(60),
            press_every_frames: 10,
        };
        let summary =
            run_session(UncapConfig::default(), settings, Instant::now()).expect("session");

        assert_eq!(summary.runaway_resets, 1);
        assert_eq!(summary.native_rate_restores, 1);
        assert_eq!(summary.final_rate_divisor, 1);
        assert_eq!(summary.host_frame_multiplier, 1);
        assert!(summary.starts_seen > 0);
        assert!(summary.ticks < 300, "ticks {}", summary.ticks);
    }

    #[test]
    fn summary_serializes_to_json() {
        let summary = run_session(UncapConfig::default(), quiet_settings(10), Instant::now())
            .expect("session");
        let json = serde_json::to_value(&summary).expect("json");

        assert_eq!(json["frames"], 10);
        assert!(json.get("tracked_entities").is_some());
    }
}
