use std::env;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uncap::{ConfigError, UncapConfig};

const FRAMES_ENV_VAR: &str = "UNCAP_DEMO_FRAMES";

/// Shape of the simulated session the demo host plays back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DemoSettings {
    pub(crate) frames: u64,
    pub(crate) render_hz: u32,
    pub(crate) stall_at_frame: Option<u64>,
    pub(crate) stall: Duration,
    pub(crate) rate_request_at_tick: Option<(u64, i64)>,
    pub(crate) slow_event_at_tick: Option<u64>,
    pub(crate) press_every_frames: u64,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            frames: 1440,
            render_hz: 144,
            stall_at_frame: Some(300),
            stall: Duration::from_secs(2),
            rate_request_at_tick: Some((240, 2)),
            slow_event_at_tick: Some(300),
            press_every_frames: 37,
        }
    }
}

pub(crate) struct AppWiring {
    pub(crate) config: UncapConfig,
    pub(crate) settings: DemoSettings,
}

pub(crate) fn build_app() -> Result<AppWiring, ConfigError> {
    init_tracing();
    info!("=== Uncap Demo Startup ===");

    let config = UncapConfig::from_env()?;
    let settings = DemoSettings {
        frames: resolve_frames(DemoSettings::default().frames),
        ..DemoSettings::default()
    };

    Ok(AppWiring { config, settings })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn resolve_frames(default_frames: u64) -> u64 {
    frames_from_env_value(env::var(FRAMES_ENV_VAR), default_frames)
}

fn frames_from_env_value(value: Result<String, env::VarError>, default_frames: u64) -> u64 {
    match value {
        Ok(value) => match value.trim().parse::<u64>() {
            Ok(frames) if frames > 0 => frames,
            _ => {
                warn!(
                    env_var = FRAMES_ENV_VAR,
                    value = value.as_str(),
                    "invalid demo frame count; falling back to default"
                );
                default_frames
            }
        },
        Err(env::VarError::NotPresent) => default_frames,
        Err(err) => {
            warn!(
                env_var = FRAMES_ENV_VAR,
                error = %err,
                "unable to read demo frame count; falling back to default"
            );
            default_frames
        }
    }
}
