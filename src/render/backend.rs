use crate::config::RendererConfig;
use crate::frame::VideoFrame;
use crate::latch::CompletionSignal;

/// Size of a surface in pixels. It's a simple struct to hold width and height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Drawable a render target vends to the engine. Ownership stays with the target; the engine
/// may only use it between `create_drawable` and the completion of `release_drawable`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawableHandle {
    /// GL / GLES texture. `target` is usually GL_TEXTURE_2D or GL_TEXTURE_EXTERNAL_OES.
    GlTexture { tex: u32, target: u32 },

    /// Platform window or surface object, resolved by the host from `id`.
    NativeWindow { id: u64 },

    /// Drawable without backing storage (headless hosts and tests).
    Null { id: u64 },
}

/// Notifications a render target sends about its drawable.
pub trait TargetCallback: Send + Sync {
    /// A drawable became available. Informational only.
    fn on_surface_available(&self) {}

    /// The host tore the target down. Must not return before the engine let go of the drawable.
    fn on_surface_destroyed(&self);
}

/// Resizable, destroyable surface owned by the host (e.g. a texture of a UI framework).
pub trait RenderTarget: Send + Sync {
    /// Sets the pixel dimensions of the backing surface.
    fn set_size(&self, width: u32, height: u32);

    /// Returns a drawable for the current backing surface.
    fn drawable_handle(&self) -> anyhow::Result<DrawableHandle>;

    /// Registers (or with `None` clears) the callback for lifecycle notifications.
    fn set_callback(&self, callback: Option<Box<dyn TargetCallback>>);
}

/// Render engine that draws submitted frames into a drawable. Implementations are expected to
/// be internally synchronised: frame submission and control calls arrive on different threads.
pub trait RenderEngine: Send + Sync {
    /// Name of the engine, used in logs.
    fn name(&self) -> &str;

    /// Brings the engine up. Fails when it is already initialised.
    fn init(&self, config: &RendererConfig) -> anyhow::Result<()>;

    /// Tears the engine down. Safe to call when not initialised.
    fn release(&self);

    /// Makes `handle` the drawable subsequent frames are drawn into.
    fn create_drawable(&self, handle: DrawableHandle) -> anyhow::Result<()>;

    /// Stops using the current drawable and fires `on_complete` once no draw call can touch it
    /// anymore. May complete asynchronously on the engine's own thread.
    fn release_drawable(&self, on_complete: CompletionSignal);

    /// Submits a frame for drawing.
    fn on_frame(&self, frame: VideoFrame);

    /// Limits rendering to `fps` frames per second. Zero or less stops rendering.
    fn set_fps_reduction(&self, fps: f32);

    /// Removes any frame rate limit.
    fn disable_fps_reduction(&self);

    /// Stops rendering until the frame rate limit is lifted.
    fn pause_video(&self);
}
