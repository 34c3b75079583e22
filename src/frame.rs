//! Decoded video frames as delivered by the upstream pipeline.
//!
//! A [`VideoFrame`] is an immutable value: a shared [`FrameBuffer`] holding the pixel planes in
//! their pre-rotation orientation, plus the [`Rotation`] that has to be applied on display.
//! Cloning a frame is cheap, the pixel data is reference counted.
//!
//! ```
//! use surface_renderer::frame::{FrameBuffer, Rotation, VideoFrame};
//!
//! let frame = VideoFrame::new(FrameBuffer::blank(800, 600), Rotation::Deg90, 0);
//! assert_eq!(frame.rotated_width(), 600);
//! assert_eq!(frame.rotated_height(), 800);
//! ```

use crate::errors::RendererError;
use crate::render::backend::SurfaceSize;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;

/// Clockwise rotation that must be applied to a frame buffer before it is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Rotation in degrees (0, 90, 180 or 270).
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// True when width and height swap places after rotating.
    pub fn is_transposed(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl TryFrom<i32> for Rotation {
    type Error = RendererError;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(RendererError::InvalidRotation(other)),
        }
    }
}

impl From<Rotation> for i32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees() as i32
    }
}

impl Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

/// Pixel layout of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, three planes
    I420,
    /// Semi-planar YUV 4:2:0, luma plane plus interleaved chroma plane
    Nv12,
    /// Packed RGBA, single plane
    Rgba,
}

impl PixelFormat {
    /// Number of planes a buffer of this format carries.
    pub fn plane_count(self) -> usize {
        match self {
            PixelFormat::I420 => 3,
            PixelFormat::Nv12 => 2,
            PixelFormat::Rgba => 1,
        }
    }
}

/// A single plane of pixel data.
#[derive(Debug, Clone)]
pub struct Plane {
    /// Raw pixel data for this plane.
    pub data: Arc<[u8]>,
    /// Number of bytes between rows (may include padding).
    pub stride: usize,
}

/// Pixel buffer of a decoded frame, in its pre-rotation orientation.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    planes: Vec<Plane>,
}

impl FrameBuffer {
    /// Creates a buffer from its planes. Fails when the plane count does not match `format`.
    pub fn new(width: u32, height: u32, format: PixelFormat, planes: Vec<Plane>) -> Result<Self, RendererError> {
        if planes.len() != format.plane_count() {
            return Err(RendererError::InvalidBuffer {
                format,
                planes: planes.len(),
            });
        }

        Ok(Self {
            width,
            height,
            format,
            planes,
        })
    }

    /// Creates a black I420 buffer of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));

        let luma = Plane {
            data: vec![0u8; w * h].into(),
            stride: w,
        };
        let chroma = Plane {
            data: vec![128u8; cw * ch].into(),
            stride: cw,
        };

        Self {
            width,
            height,
            format: PixelFormat::I420,
            planes: vec![luma, chroma.clone(), chroma],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }
}

/// A decoded frame: shared pixel buffer, rotation and presentation timestamp.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    buffer: Arc<FrameBuffer>,
    rotation: Rotation,
    timestamp_ns: i64,
}

impl VideoFrame {
    pub fn new(buffer: impl Into<Arc<FrameBuffer>>, rotation: Rotation, timestamp_ns: i64) -> Self {
        Self {
            buffer: buffer.into(),
            rotation,
            timestamp_ns,
        }
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    /// Width of the frame as displayed, after rotation.
    pub fn rotated_width(&self) -> u32 {
        if self.rotation.is_transposed() {
            self.buffer.height
        } else {
            self.buffer.width
        }
    }

    /// Height of the frame as displayed, after rotation.
    pub fn rotated_height(&self) -> u32 {
        if self.rotation.is_transposed() {
            self.buffer.width
        } else {
            self.buffer.height
        }
    }

    pub fn rotated_size(&self) -> SurfaceSize {
        SurfaceSize {
            width: self.rotated_width(),
            height: self.rotated_height(),
        }
    }
}
