use thiserror::Error;

pub mod app;
pub mod config;
pub mod tracking;
pub mod world;

pub use app::{
    guard_non_null, install_redirections, AllocRequest, ButtonMasks, ButtonQueue, EntryPoint,
    EntryPoints, FrameReport, Handler, Hook, Host, LoopMetricsSnapshot, MetricsHandle, Original,
    RateRequest, RedirectError, Redirection, Redirector, Runtime, RuntimeProcess, TextureId,
    TickScheduler, CONTROLLER_SLOTS,
};
pub use config::{
    ConfigError, RateDivisor, UncapConfig, CONFIG_PATH_ENV_VAR, RATE_DIVISOR_ENV_VAR,
};
pub use tracking::{interpolate, EntityTracker, TrackedEntry, TransformSnapshot};
pub use world::{
    AllocError, AllocFlags, AttachmentKind, BlockAllocator, Collision, Entity, LifecycleEvent,
    NodeHandle, ObjectGraph, ObjectNode, Rotation3, Vec3, ROOT_LIST_COUNT,
};

#[derive(Debug, Error)]
pub enum UncapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Alloc(#[from] AllocError),
    #[error(transparent)]
    Redirect(#[from] RedirectError),
}
