//! The renderer: frames in, drawable kept in sync, observers notified.
//!
//! A [`SurfaceTextureRenderer`] sits between a frame-producing pipeline and a host-owned
//! [`RenderTarget`]. Control calls (init, attach, detach, pause) must come from the thread that
//! created the renderer; frames arrive on the frame-delivery thread through
//! [`on_frame`](SurfaceTextureRenderer::on_frame).
//!
//! ```
//! use std::sync::Arc;
//! use surface_renderer::frame::{FrameBuffer, Rotation, VideoFrame};
//! use surface_renderer::render::backends::null::{NullEngine, NullTarget};
//! use surface_renderer::{RendererConfig, SurfaceTextureRenderer};
//!
//! let renderer = SurfaceTextureRenderer::new("preview", Box::new(NullEngine::new("preview")));
//! renderer.init(&RendererConfig::default(), None).unwrap();
//!
//! let target = Arc::new(NullTarget::new());
//! renderer.attach_target(&target);
//! renderer.on_frame(&VideoFrame::new(FrameBuffer::blank(640, 480), Rotation::Deg0, 0)).unwrap();
//! assert!(renderer.has_drawable());
//!
//! renderer.detach_target();
//! renderer.release();
//! ```

use crate::config::RendererConfig;
use crate::errors::RendererError;
use crate::events::{EventBus, RendererEvents};
use crate::frame::VideoFrame;
use crate::layout::{FrameDimensionTracker, FrameObservation, LayoutState};
use crate::render::backend::{RenderEngine, RenderTarget, SurfaceSize, TargetCallback};
use crate::surface::{Detach, SurfaceController};
use crate::thread::ThreadChecker;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use uuid::Uuid;

/// A unique identifier for a renderer, represented as a UUID.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RendererId(Uuid);

impl RendererId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RendererId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RendererId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for RendererId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Inner {
    id: RendererId,
    name: String,
    control_thread: ThreadChecker,
    engine: Box<dyn RenderEngine>,
    events: RwLock<Option<Arc<dyn RendererEvents>>>,
    tracker: FrameDimensionTracker,
    surface: SurfaceController,
}

impl Inner {
    fn events(&self) -> RwLockReadGuard<'_, Option<Arc<dyn RendererEvents>>> {
        self.events.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn events_mut(&self) -> RwLockWriteGuard<'_, Option<Arc<dyn RendererEvents>>> {
        self.events.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn detach(&self) -> Detach {
        let detach = self.surface.detach(self.engine.as_ref());
        match detach {
            Detach::Released => debug!("{}: drawable released, target detached", self.name),
            Detach::Forgotten => debug!("{}: target detached before any frame", self.name),
            Detach::NotAttached => debug!("{}: detach without target, nothing to do", self.name),
        }
        detach
    }

    fn on_target_destroyed(&self, target: &Weak<dyn RenderTarget>) {
        self.control_thread.check("on_surface_destroyed");
        match self.surface.detach_if_current(target, self.engine.as_ref()) {
            Some(_) => debug!("{}: render target destroyed by host", self.name),
            None => debug!("{}: ignoring destruction of a target that is no longer attached", self.name),
        }
    }

    fn report(&self, observation: &FrameObservation) {
        if observation.is_unchanged() {
            return;
        }

        if let Some(change) = observation.resolution {
            debug!(
                "{}: frame resolution {}x{} rotation {} (displayed {}x{})",
                self.name,
                change.buffer_width,
                change.buffer_height,
                change.rotation,
                change.rotated.width,
                change.rotated.height
            );
        }

        let Some(events) = self.events().clone() else {
            return;
        };

        if observation.first_frame {
            events.on_first_frame_rendered();
        }
        if let Some(change) = observation.resolution {
            events.on_frame_resolution_changed(change.buffer_width, change.buffer_height, change.rotation);
        }
    }
}

/// Destruction callback registered on an attached target.
struct TargetLifecycle {
    renderer: Weak<Inner>,
    target: Weak<dyn RenderTarget>,
}

impl TargetCallback for TargetLifecycle {
    fn on_surface_available(&self) {
        if let Some(inner) = self.renderer.upgrade() {
            debug!("{}: surface available", inner.name);
        }
    }

    fn on_surface_destroyed(&self) {
        if let Some(inner) = self.renderer.upgrade() {
            inner.on_target_destroyed(&self.target);
        }
    }
}

/// Renders a live frame sequence onto a host render target. Cheap to clone; clones share the
/// same renderer.
#[derive(Clone)]
pub struct SurfaceTextureRenderer {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SurfaceTextureRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceTextureRenderer")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("engine", &self.inner.engine.name())
            .finish()
    }
}

impl SurfaceTextureRenderer {
    /// Creates a renderer on top of `engine`. The calling thread becomes the control thread.
    pub fn new(name: impl Into<String>, engine: Box<dyn RenderEngine>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: RendererId::new(),
                name: name.into(),
                control_thread: ThreadChecker::current(),
                engine,
                events: RwLock::new(None),
                tracker: FrameDimensionTracker::new(),
                surface: SurfaceController::new(),
            }),
        }
    }

    pub fn id(&self) -> RendererId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Creates an [`EventBus`] for this renderer, sized from `config`. Pass it to
    /// [`init`](Self::init) to receive notifications as a broadcast stream.
    pub fn event_bus(&self, config: &RendererConfig) -> EventBus {
        EventBus::new(self.inner.id, config.event_capacity)
    }

    /// Initialises the engine and starts a new first-frame cycle.
    pub fn init(
        &self,
        config: &RendererConfig,
        events: Option<Arc<dyn RendererEvents>>,
    ) -> Result<(), RendererError> {
        self.inner.control_thread.check("init");

        *self.inner.events_mut() = events;
        self.inner.tracker.reset();

        info!("{}: initializing on engine {}", self.inner.name, self.inner.engine.name());
        self.inner.engine.init(config).map_err(RendererError::Engine)
    }

    /// Restarts the engine with `config`, keeping the observer and the attached target. The
    /// next frame creates a fresh drawable and counts as a first frame again.
    pub fn reinit(&self, config: &RendererConfig) -> Result<(), RendererError> {
        self.inner.control_thread.check("reinit");

        self.inner.surface.release_drawable(self.inner.engine.as_ref());
        self.inner.engine.release();

        let events = self.inner.events().clone();
        self.init(config, events)
    }

    /// Detaches the target, shuts the engine down and drops the observer.
    pub fn release(&self) {
        self.inner.control_thread.check("release");

        self.inner.detach();
        self.inner.engine.release();
        *self.inner.events_mut() = None;
        info!("{}: released", self.inner.name);
    }

    /// Binds `target`. The drawable is created on the first frame, once its size is known.
    pub fn attach_target<T: RenderTarget + 'static>(&self, target: &Arc<T>) {
        self.inner.control_thread.check("attach_target");

        let target: Arc<dyn RenderTarget> = target.clone();
        let weak = Arc::downgrade(&target);

        if self.inner.surface.attach(weak.clone(), self.inner.engine.as_ref()) != Detach::NotAttached {
            warn!("{}: attaching a target while another one is attached, previous one detached", self.inner.name);
        }

        target.set_callback(Some(Box::new(TargetLifecycle {
            renderer: Arc::downgrade(&self.inner),
            target: weak,
        })));
        debug!("{}: target attached", self.inner.name);
    }

    /// Releases the drawable and forgets the target. Blocks until the engine confirms the
    /// drawable is no longer used; afterwards the host may destroy the target.
    ///
    /// Must not be called from inside an async runtime.
    pub fn detach_target(&self) {
        self.inner.control_thread.check("detach_target");
        self.inner.detach();
    }

    /// Delivers a frame: creates the drawable if needed, updates the layout bookkeeping, resizes
    /// the target on resolution changes, notifies the observer and hands the frame to the
    /// engine. No renderer lock is held while the target, the observer or the engine run.
    ///
    /// Frames must come from one thread at a time. The engine's own render thread qualifies,
    /// even while a detach waits on it.
    pub fn on_frame(&self, frame: &VideoFrame) -> Result<(), RendererError> {
        self.inner.surface.ensure_drawable(frame, self.inner.engine.as_ref())?;

        let observation = self.inner.tracker.observe(frame);
        if let Some(change) = observation.resolution {
            self.inner.surface.resize(change.rotated);
        }
        self.inner.report(&observation);

        self.inner.engine.on_frame(frame.clone());
        Ok(())
    }

    /// Reduces the engine frame rate. Zero counts as a pause.
    pub fn set_fps_reduction(&self, fps: f32) {
        self.inner.control_thread.check("set_fps_reduction");
        self.inner.tracker.set_rendering_paused(fps == 0.0);
        self.inner.engine.set_fps_reduction(fps);
    }

    /// Lifts any frame rate reduction, which also ends a pause.
    pub fn disable_fps_reduction(&self) {
        self.inner.control_thread.check("disable_fps_reduction");
        self.inner.tracker.set_rendering_paused(false);
        self.inner.engine.disable_fps_reduction();
    }

    /// Pauses rendering. Frames keep flowing to the engine; layout bookkeeping and
    /// notifications are frozen until the pause ends.
    pub fn pause_video(&self) {
        self.inner.control_thread.check("pause_video");
        self.inner.tracker.set_rendering_paused(true);
        self.inner.engine.pause_video();
    }

    /// Snapshot of the layout bookkeeping.
    pub fn layout(&self) -> LayoutState {
        self.inner.tracker.snapshot()
    }

    pub fn is_rendering_paused(&self) -> bool {
        self.inner.tracker.is_rendering_paused()
    }

    pub fn has_target(&self) -> bool {
        self.inner.surface.has_target()
    }

    pub fn has_drawable(&self) -> bool {
        self.inner.surface.has_drawable()
    }

    /// Last size applied to the attached target.
    pub fn target_size(&self) -> Option<SurfaceSize> {
        self.inner.surface.applied_size()
    }
}
