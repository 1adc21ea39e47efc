mod host;
mod input;
mod loop_runner;
mod metrics;
mod redirect;
mod scheduler;

pub use host::{guard_non_null, Host};
pub use input::{ButtonMasks, ButtonQueue, CONTROLLER_SLOTS};
pub use loop_runner::{FrameReport, Runtime};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use redirect::{
    install_redirections, runtime_handlers, AllocRequest, EntryPoint, EntryPoints, Handler, Hook,
    Original, RateRequest, RedirectError, Redirection, Redirector, Replacement, RuntimeProcess,
    TextureId,
};
pub use scheduler::{SampleOutcome, TickScheduler};
