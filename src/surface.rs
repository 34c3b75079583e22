//! Binding between a host render target and the engine's drawable.
//!
//! The drawable is created lazily from the first frame's rotated size and lives until the
//! target is detached. Detaching blocks until the engine confirms the drawable is no longer in
//! use, so the host may destroy the target right after.
//!
//! The slot lock is only held to read or swap fields. Calls into the target, the engine and the
//! release wait all happen with the lock released: a target may report its own destruction from
//! inside `set_size`, and an engine may deliver frames on the thread that completes a release.

use crate::errors::RendererError;
use crate::frame::VideoFrame;
use crate::latch::completion;
use crate::render::backend::{DrawableHandle, RenderEngine, RenderTarget, SurfaceSize};
use log::{debug, trace, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Outcome of a detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Detach {
    /// Nothing was attached
    NotAttached,
    /// The target was forgotten, no drawable existed yet
    Forgotten,
    /// The drawable was released by the engine
    Released,
}

#[derive(Default)]
struct SurfaceSlot {
    target: Option<Weak<dyn RenderTarget>>,
    drawable: Option<DrawableHandle>,
    applied_size: Option<SurfaceSize>,
    // bumped on every detach or release; drawable creation started under an older value is void
    generation: u64,
}

impl SurfaceSlot {
    fn target(&self) -> Option<Arc<dyn RenderTarget>> {
        self.target.as_ref().and_then(Weak::upgrade)
    }
}

/// Owns the target binding. Attach and detach come from the control thread, drawable creation
/// and resizing from the frame-delivery thread.
#[derive(Default)]
pub(crate) struct SurfaceController {
    slot: Mutex<SurfaceSlot>,
}

impl SurfaceController {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_generation(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Creates the drawable for `frame` unless one exists. Returns true when one was created.
    pub fn ensure_drawable(&self, frame: &VideoFrame, engine: &dyn RenderEngine) -> Result<bool, RendererError> {
        let (target, generation) = {
            let slot = self.lock();
            if slot.drawable.is_some() {
                return Ok(false);
            }
            match slot.target() {
                Some(target) => (target, slot.generation),
                None => {
                    trace!("No render target, frame {} goes out without a drawable", frame.timestamp_ns());
                    return Ok(false);
                }
            }
        };

        let size = frame.rotated_size();
        target.set_size(size.width, size.height);
        if !self.is_generation(generation) {
            debug!("Render target went away while being sized, no drawable created");
            return Ok(false);
        }

        let handle = target.drawable_handle().map_err(RendererError::Target)?;
        engine
            .create_drawable(handle.clone())
            .map_err(RendererError::Engine)?;

        let mut slot = self.lock();
        if slot.generation != generation {
            drop(slot);
            // not awaited, this may be the thread that completes the release
            debug!("Render target detached while creating drawable {:?}, handing it back", handle);
            let (signal, _latch) = completion();
            engine.release_drawable(signal);
            return Ok(false);
        }

        debug!("Created drawable {:?} at {}x{}", handle, size.width, size.height);
        slot.drawable = Some(handle);
        slot.applied_size = Some(size);
        Ok(true)
    }

    /// Resizes the attached target, if any.
    pub fn resize(&self, size: SurfaceSize) {
        let (target, generation) = {
            let slot = self.lock();
            match slot.target() {
                Some(target) => (target, slot.generation),
                None => return,
            }
        };

        target.set_size(size.width, size.height);

        let mut slot = self.lock();
        if slot.generation == generation {
            slot.applied_size = Some(size);
        }
    }

    /// Stores `target`. A previously attached target is detached first.
    pub fn attach(&self, target: Weak<dyn RenderTarget>, engine: &dyn RenderEngine) -> Detach {
        let previous = self.detach(engine);
        self.lock().target = Some(target);
        previous
    }

    /// Forgets the target and releases the drawable, blocking until the engine is done with it.
    pub fn detach(&self, engine: &dyn RenderEngine) -> Detach {
        let (had_target, drawable) = {
            let mut slot = self.lock();
            slot.generation += 1;
            (slot.target.take().is_some(), slot.drawable.clone())
        };

        match drawable {
            Some(drawable) => {
                self.wait_for_release(&drawable, engine);
                Detach::Released
            }
            None if had_target => Detach::Forgotten,
            None => Detach::NotAttached,
        }
    }

    /// Detaches only when `target` is the attached one. `None` means `target` is stale.
    pub fn detach_if_current(&self, target: &Weak<dyn RenderTarget>, engine: &dyn RenderEngine) -> Option<Detach> {
        let current = matches!(self.lock().target.as_ref(), Some(attached) if Weak::ptr_eq(attached, target));
        current.then(|| self.detach(engine))
    }

    /// Releases the drawable but keeps the target, so the next frame creates a fresh drawable.
    pub fn release_drawable(&self, engine: &dyn RenderEngine) -> bool {
        let drawable = {
            let mut slot = self.lock();
            slot.generation += 1;
            slot.drawable.clone()
        };

        match drawable {
            Some(drawable) => {
                self.wait_for_release(&drawable, engine);
                true
            }
            None => false,
        }
    }

    /// Asks the engine to let go of `drawable` and blocks until it did. The slot keeps the
    /// drawable during the wait, so frames arriving meanwhile do not create a new one.
    fn wait_for_release(&self, drawable: &DrawableHandle, engine: &dyn RenderEngine) {
        debug!("Releasing drawable {:?} on engine {}", drawable, engine.name());
        let (signal, latch) = completion();
        engine.release_drawable(signal);
        if !latch.await_uninterruptibly() {
            warn!("Engine {} dropped the release signal of {:?} without firing it", engine.name(), drawable);
        }

        let mut slot = self.lock();
        slot.drawable = None;
        slot.applied_size = None;
    }

    pub fn has_target(&self) -> bool {
        self.lock().target.is_some()
    }

    pub fn has_drawable(&self) -> bool {
        self.lock().drawable.is_some()
    }

    pub fn applied_size(&self) -> Option<SurfaceSize> {
        self.lock().applied_size
    }
}
