pub mod config;
pub mod errors;
pub mod events;
pub mod frame;
pub mod latch;
pub mod layout;
pub mod render;
pub mod renderer;

mod surface;
mod thread;

pub use config::{DrawerKind, RendererConfig, SurfaceAttributes};
pub use errors::RendererError;
pub use events::{EventBus, RendererEvent, RendererEvents};
pub use frame::{FrameBuffer, PixelFormat, Plane, Rotation, VideoFrame};
pub use layout::{FrameDimensionTracker, LayoutState};
pub use render::backend::{DrawableHandle, RenderEngine, RenderTarget, SurfaceSize, TargetCallback};
pub use renderer::{RendererId, SurfaceTextureRenderer};
