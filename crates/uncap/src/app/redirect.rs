use std::fmt;
use std::time::Instant;

use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, RateDivisor};
use crate::world::{AllocError, AllocFlags, NodeHandle, ObjectNode};

use super::host::{guard_non_null, Host};
use super::loop_runner::{FrameReport, Runtime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    RenderFrame,
    SetRateDivisor,
    AllocateObject,
    ReleaseObject,
    FrameLimit,
    BindTexture,
}

impl EntryPoint {
    pub const ALL: [EntryPoint; 6] = [
        EntryPoint::RenderFrame,
        EntryPoint::SetRateDivisor,
        EntryPoint::AllocateObject,
        EntryPoint::ReleaseObject,
        EntryPoint::FrameLimit,
        EntryPoint::BindTexture,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            EntryPoint::RenderFrame => "render_frame",
            EntryPoint::SetRateDivisor => "set_rate_divisor",
            EntryPoint::AllocateObject => "allocate_object",
            EntryPoint::ReleaseObject => "release_object",
            EntryPoint::FrameLimit => "frame_limit",
            EntryPoint::BindTexture => "bind_texture",
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Redirection {
    /// The runtime's routine answers instead of the host's.
    Replace,
    /// The entry point does nothing.
    Suppress,
    /// The host's routine runs only when the guard condition holds.
    Guard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RedirectError {
    #[error("entry point {point} is not available on this host")]
    EntryPointUnavailable { point: EntryPoint },
    #[error("entry point {point} is already redirected")]
    AlreadyRedirected { point: EntryPoint },
}

/// Arguments of the object-allocation entry point.
#[derive(Clone, Copy)]
pub struct AllocRequest {
    pub flags: AllocFlags,
    pub index_hint: usize,
    pub init: fn(&mut ObjectNode),
}

/// A rate divisor asked for at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRequest {
    pub value: i64,
    pub at: Instant,
}

pub type TextureId = u32;

/// The routine that answered an entry point before it was redirected.
/// Handed to every replacement so it can fall through to the host.
pub struct Original<P: ?Sized, A, R> {
    routine: fn(&mut P, A) -> R,
}

impl<P: ?Sized, A, R> Clone for Original<P, A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: ?Sized, A, R> Copy for Original<P, A, R> {}

impl<P: ?Sized, A, R> Original<P, A, R> {
    pub fn call(self, process: &mut P, arg: A) -> R {
        (self.routine)(process, arg)
    }
}

pub type Replacement<P, A, R> = fn(&mut P, A, Original<P, A, R>) -> R;

/// One host entry point: the host's own routine plus, once redirected, the
/// routine that answers in its place.
pub struct Hook<P: ?Sized, A, R> {
    point: EntryPoint,
    original: fn(&mut P, A) -> R,
    replacement: Option<Replacement<P, A, R>>,
}

impl<P: ?Sized, A, R> Clone for Hook<P, A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: ?Sized, A, R> Copy for Hook<P, A, R> {}

impl<P: ?Sized, A, R> Hook<P, A, R> {
    pub fn new(point: EntryPoint, original: fn(&mut P, A) -> R) -> Self {
        Self {
            point,
            original,
            replacement: None,
        }
    }

    pub fn point(&self) -> EntryPoint {
        self.point
    }

    pub fn is_redirected(&self) -> bool {
        self.replacement.is_some()
    }

    pub fn redirect(&mut self, replacement: Replacement<P, A, R>) -> Result<(), RedirectError> {
        if self.replacement.is_some() {
            return Err(RedirectError::AlreadyRedirected { point: self.point });
        }
        self.replacement = Some(replacement);
        Ok(())
    }

    /// Calls whichever routine currently answers the entry point.
    pub fn invoke(self, process: &mut P, arg: A) -> R {
        match self.replacement {
            Some(replacement) => replacement(process, arg, Original { routine: self.original }),
            None => (self.original)(process, arg),
        }
    }
}

/// A replacement routine, tagged with the entry point it answers for.
pub enum Handler<P: ?Sized> {
    RenderFrame(Replacement<P, Instant, FrameReport>),
    SetRateDivisor(Replacement<P, RateRequest, Result<RateDivisor, ConfigError>>),
    AllocateObject(Replacement<P, AllocRequest, Result<NodeHandle, AllocError>>),
    ReleaseObject(Replacement<P, NodeHandle, bool>),
    FrameLimit(Replacement<P, (), ()>),
    BindTexture(Replacement<P, Option<TextureId>, bool>),
}

impl<P: ?Sized> Handler<P> {
    pub fn point(&self) -> EntryPoint {
        match self {
            Handler::RenderFrame(_) => EntryPoint::RenderFrame,
            Handler::SetRateDivisor(_) => EntryPoint::SetRateDivisor,
            Handler::AllocateObject(_) => EntryPoint::AllocateObject,
            Handler::ReleaseObject(_) => EntryPoint::ReleaseObject,
            Handler::FrameLimit(_) => EntryPoint::FrameLimit,
            Handler::BindTexture(_) => EntryPoint::BindTexture,
        }
    }

    pub fn redirection(&self) -> Redirection {
        match self {
            Handler::FrameLimit(_) => Redirection::Suppress,
            Handler::BindTexture(_) => Redirection::Guard,
            _ => Redirection::Replace,
        }
    }
}

/// Capability to send execution at a host entry point to new logic.
pub trait Redirector<P: ?Sized> {
    fn redirect(&mut self, handler: Handler<P>) -> Result<(), RedirectError>;
}

/// The host process a runtime answers entry points for.
pub trait RuntimeProcess {
    fn parts(&mut self) -> (&mut Runtime, &mut dyn Host);
}

/// Every entry point of a host, each starting out answered by the host.
pub struct EntryPoints<P: ?Sized> {
    pub render_frame: Hook<P, Instant, FrameReport>,
    pub set_rate_divisor: Hook<P, RateRequest, Result<RateDivisor, ConfigError>>,
    pub allocate_object: Hook<P, AllocRequest, Result<NodeHandle, AllocError>>,
    pub release_object: Hook<P, NodeHandle, bool>,
    pub frame_limit: Hook<P, (), ()>,
    pub bind_texture: Hook<P, Option<TextureId>, bool>,
}

impl<P: ?Sized> Clone for EntryPoints<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: ?Sized> Copy for EntryPoints<P> {}

impl<P: ?Sized> EntryPoints<P> {
    pub fn is_redirected(&self, point: EntryPoint) -> bool {
        match point {
            EntryPoint::RenderFrame => self.render_frame.is_redirected(),
            EntryPoint::SetRateDivisor => self.set_rate_divisor.is_redirected(),
            EntryPoint::AllocateObject => self.allocate_object.is_redirected(),
            EntryPoint::ReleaseObject => self.release_object.is_redirected(),
            EntryPoint::FrameLimit => self.frame_limit.is_redirected(),
            EntryPoint::BindTexture => self.bind_texture.is_redirected(),
        }
    }

    pub fn redirected_count(&self) -> usize {
        EntryPoint::ALL
            .into_iter()
            .filter(|point| self.is_redirected(*point))
            .count()
    }
}

impl<P: ?Sized> Redirector<P> for EntryPoints<P> {
    fn redirect(&mut self, handler: Handler<P>) -> Result<(), RedirectError> {
        match handler {
            Handler::RenderFrame(routine) => self.render_frame.redirect(routine),
            Handler::SetRateDivisor(routine) => self.set_rate_divisor.redirect(routine),
            Handler::AllocateObject(routine) => self.allocate_object.redirect(routine),
            Handler::ReleaseObject(routine) => self.release_object.redirect(routine),
            Handler::FrameLimit(routine) => self.frame_limit.redirect(routine),
            Handler::BindTexture(routine) => self.bind_texture.redirect(routine),
        }
    }
}

fn render_frame<P: RuntimeProcess + ?Sized>(
    process: &mut P,
    now: Instant,
    _original: Original<P, Instant, FrameReport>,
) -> FrameReport {
    let (runtime, host) = process.parts();
    runtime.render_frame_at(host, now)
}

fn set_rate_divisor<P: RuntimeProcess + ?Sized>(
    process: &mut P,
    request: RateRequest,
    _original: Original<P, RateRequest, Result<RateDivisor, ConfigError>>,
) -> Result<RateDivisor, ConfigError> {
    let (runtime, host) = process.parts();
    runtime.set_rate_divisor_at(host, request.value, request.at)
}

fn allocate_object<P: RuntimeProcess + ?Sized>(
    process: &mut P,
    request: AllocRequest,
    _original: Original<P, AllocRequest, Result<NodeHandle, AllocError>>,
) -> Result<NodeHandle, AllocError> {
    let (runtime, _) = process.parts();
    runtime.allocate(request.flags, request.index_hint, request.init)
}

fn release_object<P: RuntimeProcess + ?Sized>(
    process: &mut P,
    handle: NodeHandle,
    _original: Original<P, NodeHandle, bool>,
) -> bool {
    let (runtime, _) = process.parts();
    runtime.release(handle)
}

fn suppress_frame_limit<P: ?Sized>(_process: &mut P, _: (), _original: Original<P, (), ()>) {}

fn guard_bind_texture<P: ?Sized>(
    process: &mut P,
    texture: Option<TextureId>,
    original: Original<P, Option<TextureId>, bool>,
) -> bool {
    guard_non_null(texture, |texture| original.call(process, Some(texture)))
}

/// The routines the runtime installs, one per entry point.
pub fn runtime_handlers<P: RuntimeProcess + ?Sized>() -> [Handler<P>; 6] {
    [
        Handler::RenderFrame(render_frame::<P>),
        Handler::SetRateDivisor(set_rate_divisor::<P>),
        Handler::AllocateObject(allocate_object::<P>),
        Handler::ReleaseObject(release_object::<P>),
        Handler::FrameLimit(suppress_frame_limit::<P>),
        Handler::BindTexture(guard_bind_texture::<P>),
    ]
}

pub fn install_redirections<P, R>(redirector: &mut R) -> Result<usize, RedirectError>
where
    P: RuntimeProcess + ?Sized,
    R: Redirector<P> + ?Sized,
{
    let handlers = runtime_handlers::<P>();
    let count = handlers.len();
    for handler in handlers {
        let point = handler.point();
        let redirection = handler.redirection();
        redirector.redirect(handler)?;
        info!(entry_point = %point, redirection = ?redirection, "entry_point_redirected");
    }
    Ok(count)
}
