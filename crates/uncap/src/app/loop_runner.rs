use std::time::Instant;

use tracing::{info, warn};

use crate::config::{ConfigError, RateDivisor, UncapConfig};
use crate::tracking::{interpolate, EntityTracker};
use crate::world::{AllocError, AllocFlags, NodeHandle, ObjectGraph, ObjectNode};
use crate::UncapError;

use super::host::Host;
use super::input::ButtonQueue;
use super::metrics::{MetricsAccumulator, MetricsHandle};
use super::redirect::{install_redirections, Redirector, RuntimeProcess};
use super::scheduler::TickScheduler;

/// What one render callback did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    pub ticks_run: u32,
    pub progress: f64,
    pub runaway_reset: bool,
    pub interpolated: usize,
    pub restored: usize,
    pub native_rate_restored: bool,
}

/// Owns every piece of uncapper state and drives it once per render
/// callback.
#[derive(Debug)]
pub struct Runtime {
    config: UncapConfig,
    scheduler: TickScheduler,
    buttons: ButtonQueue,
    tracker: EntityTracker,
    graph: ObjectGraph,
    metrics: MetricsAccumulator,
    metrics_handle: MetricsHandle,
}

impl Runtime {
    pub fn new(config: UncapConfig) -> Result<Self, UncapError> {
        Self::with_graph(config, ObjectGraph::new(), Instant::now())
    }

    pub fn with_graph(
        config: UncapConfig,
        graph: ObjectGraph,
        now: Instant,
    ) -> Result<Self, UncapError> {
        config.validate()?;
        Ok(Self {
            scheduler: TickScheduler::new(&config, now),
            buttons: ButtonQueue::default(),
            tracker: EntityTracker::new(config.settle_ticks),
            graph,
            metrics: MetricsAccumulator::new(config.metrics_log_interval(), now),
            metrics_handle: MetricsHandle::default(),
            config,
        })
    }

    /// Points every host entry point at the runtime's routines.
    pub fn install<P, R>(&self, redirector: &mut R) -> Result<(), UncapError>
    where
        P: RuntimeProcess + ?Sized,
        R: Redirector<P> + ?Sized,
    {
        let redirected = install_redirections::<P, R>(redirector)?;
        info!(
            redirected,
            logic_hz = self.config.logic_hz,
            rate_divisor = self.scheduler.divisor().get(),
            runaway_ceiling_ticks = self.config.runaway_ceiling_ticks,
            settle_ticks = self.config.settle_ticks,
            "runtime_installed"
        );
        Ok(())
    }

    pub fn config(&self) -> &UncapConfig {
        &self.config
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ObjectGraph {
        &mut self.graph
    }

    pub fn tracker(&self) -> &EntityTracker {
        &self.tracker
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn pending_buttons(&self) -> &ButtonQueue {
        &self.buttons
    }

    pub fn metrics_handle(&self) -> MetricsHandle {
        self.metrics_handle.clone()
    }

    /// Allocation entry point; newly created entities are tracked at once.
    pub fn allocate(
        &mut self,
        flags: AllocFlags,
        index_hint: usize,
        init: impl FnOnce(&mut ObjectNode),
    ) -> Result<NodeHandle, AllocError> {
        let result = self.graph.allocate(flags, index_hint, init);
        self.tracker.absorb(self.graph.drain_events());
        result
    }

    pub fn release(&mut self, handle: NodeHandle) -> bool {
        let released = self.graph.release(handle);
        self.tracker.absorb(self.graph.drain_events());
        released
    }

    pub fn set_rate_divisor(
        &mut self,
        host: &mut (impl Host + ?Sized),
        value: i64,
    ) -> Result<RateDivisor, ConfigError> {
        self.set_rate_divisor_at(host, value, Instant::now())
    }

    /// Rate configuration entry point. A rejected value leaves the current
    /// rate and accumulator untouched.
    pub fn set_rate_divisor_at(
        &mut self,
        host: &mut (impl Host + ?Sized),
        value: i64,
        now: Instant,
    ) -> Result<RateDivisor, ConfigError> {
        let divisor = RateDivisor::new(value).map_err(|error| {
            warn!(
                value,
                current = self.scheduler.divisor().get(),
                "rate_divisor_rejected"
            );
            error
        })?;
        self.apply_rate_divisor(host, divisor, now);
        Ok(divisor)
    }

    fn apply_rate_divisor(
        &mut self,
        host: &mut (impl Host + ?Sized),
        divisor: RateDivisor,
        now: Instant,
    ) {
        let previous = self.scheduler.divisor();
        self.scheduler.set_rate_divisor(divisor, now);
        host.apply_rate_divisor(divisor);
        info!(
            previous = previous.get(),
            divisor = divisor.get(),
            ticks_per_second = self.scheduler.ticks_per_second(),
            "rate_divisor_changed"
        );
    }

    pub fn render_frame(&mut self, host: &mut (impl Host + ?Sized)) -> FrameReport {
        self.render_frame_at(host, Instant::now())
    }

    /// Render callback: runs every logic tick owed since the previous call,
    /// then draws an interpolated frame and puts the tick-end state back.
    pub fn render_frame_at(
        &mut self,
        host: &mut (impl Host + ?Sized),
        now: Instant,
    ) -> FrameReport {
        let mut report = FrameReport::default();
        self.buttons.push(&host.pressed_buttons());

        let sample = self.scheduler.sample(now);
        if sample.runaway_reset {
            report.runaway_reset = true;
            self.metrics.record_runaway_reset();
            warn!(
                elapsed_ms = sample.elapsed.as_secs_f64() * 1000.0,
                dropped_ticks = sample.dropped_ticks,
                "sim_clamp_triggered"
            );
        }

        if self.scheduler.tick_due() {
            host.set_logic_only(true);
            while self.scheduler.take_due_tick() {
                host.write_pressed_buttons(self.buttons.consume());
                host.run_logic_step(&mut self.graph);
                self.tracker.absorb(self.graph.drain_events());
                self.tracker.tick_advance(&self.graph);
                report.ticks_run += 1;
                self.metrics.record_tick();

                if let Some(request) = host.take_rate_request() {
                    match RateDivisor::new(request) {
                        Ok(divisor) => self.apply_rate_divisor(host, divisor, now),
                        Err(error) => warn!(value = request, %error, "rate_request_rejected"),
                    }
                }
            }
        }

        report.progress = self.scheduler.progress();
        report.interpolated = interpolate(&mut self.tracker, &mut self.graph, report.progress);
        host.set_logic_only(false);
        if let Some(camera) = host.camera() {
            host.display_camera(&self.graph, camera);
        }
        host.render_all(&mut self.graph);
        host.draw_overlay();
        self.tracker.absorb(self.graph.drain_events());
        report.restored = self.tracker.restore(&mut self.graph);

        if self.config.restore_native_rate_after_events && host.frame_increment() == 2 {
            host.set_frame_rate_mode(1, 1);
            self.apply_rate_divisor(host, RateDivisor::NATIVE, now);
            report.native_rate_restored = true;
            info!("native_rate_restored");
        }

        self.metrics.record_frame(sample.elapsed);
        if let Some(snapshot) = self.metrics.maybe_snapshot(now, self.tracker.len()) {
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                tracked_entities = snapshot.tracked_entities,
                runaway_resets = snapshot.runaway_resets,
                "loop_metrics"
            );
            self.metrics_handle.publish(snapshot);
        }

        report
    }
}
