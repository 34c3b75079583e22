//! Frame dimension tracking.
//!
//! The [`FrameDimensionTracker`] compares every incoming frame against the last observed
//! rotated width, rotated height and rotation, and tells the caller whether the render target
//! must be resized and which notifications to send. All bookkeeping lives in one
//! [`LayoutState`] behind a single mutex and only changes through whole-state transitions.
//!
//! While rendering is paused the tracker freezes: frames still flow to the engine, but no
//! bookkeeping happens and no notification is produced.

use crate::frame::{Rotation, VideoFrame};
use crate::render::backend::SurfaceSize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Layout bookkeeping of a renderer.
///
/// `frame_rotation` is `None` until a frame updated the dimensions, which is also exactly
/// when `first_frame_rendered` is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutState {
    rendering_paused: bool,
    first_frame_rendered: bool,
    rotated_frame_width: u32,
    rotated_frame_height: u32,
    frame_rotation: Option<Rotation>,
}

impl LayoutState {
    pub fn is_rendering_paused(&self) -> bool {
        self.rendering_paused
    }

    pub fn is_first_frame_rendered(&self) -> bool {
        self.first_frame_rendered
    }

    pub fn rotated_frame_width(&self) -> u32 {
        self.rotated_frame_width
    }

    pub fn rotated_frame_height(&self) -> u32 {
        self.rotated_frame_height
    }

    pub fn frame_rotation(&self) -> Option<Rotation> {
        self.frame_rotation
    }

    /// Starts a new first-frame cycle. The pause flag is left alone: it mirrors the engine's
    /// frame rate reduction, which survives re-initialisation.
    fn reset_frame_layout(&mut self) {
        self.first_frame_rendered = false;
        self.rotated_frame_width = 0;
        self.rotated_frame_height = 0;
        self.frame_rotation = None;
    }

    fn observe(&mut self, frame: &VideoFrame) -> FrameObservation {
        if self.rendering_paused {
            return FrameObservation::default();
        }

        let mut observation = FrameObservation::default();

        if !self.first_frame_rendered {
            self.first_frame_rendered = true;
            observation.first_frame = true;
        }

        let rotated_width = frame.rotated_width();
        let rotated_height = frame.rotated_height();
        let rotation = frame.rotation();

        if self.rotated_frame_width != rotated_width
            || self.rotated_frame_height != rotated_height
            || self.frame_rotation != Some(rotation)
        {
            self.rotated_frame_width = rotated_width;
            self.rotated_frame_height = rotated_height;
            self.frame_rotation = Some(rotation);

            observation.resolution = Some(ResolutionChange {
                buffer_width: frame.buffer().width(),
                buffer_height: frame.buffer().height(),
                rotation,
                rotated: SurfaceSize::new(rotated_width, rotated_height),
            });
        }

        observation
    }
}

/// A detected change of frame resolution or rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionChange {
    /// Buffer width before rotation, as reported to observers
    pub buffer_width: u32,
    /// Buffer height before rotation, as reported to observers
    pub buffer_height: u32,
    /// New rotation
    pub rotation: Rotation,
    /// Displayed size, applied to the render target
    pub rotated: SurfaceSize,
}

/// Outcome of observing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameObservation {
    /// This was the first frame of the current init cycle
    pub first_frame: bool,
    /// The resolution or rotation changed; resize the target and notify
    pub resolution: Option<ResolutionChange>,
}

impl FrameObservation {
    /// Nothing to do: the steady-state path.
    pub fn is_unchanged(&self) -> bool {
        !self.first_frame && self.resolution.is_none()
    }
}

/// Mutex-guarded [`LayoutState`] with the transitions the renderer needs.
#[derive(Debug, Default)]
pub struct FrameDimensionTracker {
    state: Mutex<LayoutState>,
}

impl FrameDimensionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LayoutState> {
        // every transition leaves the state consistent, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> LayoutState {
        *self.lock()
    }

    pub fn reset(&self) {
        self.lock().reset_frame_layout();
    }

    pub fn set_rendering_paused(&self, paused: bool) {
        self.lock().rendering_paused = paused;
    }

    pub fn is_rendering_paused(&self) -> bool {
        self.lock().rendering_paused
    }

    /// Observes `frame` atomically and reports what changed.
    pub fn observe(&self, frame: &VideoFrame) -> FrameObservation {
        self.lock().observe(frame)
    }
}
