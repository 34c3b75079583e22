use crate::config::RendererConfig;
use crate::frame::VideoFrame;
use crate::latch::CompletionSignal;
use crate::render::backend::{DrawableHandle, RenderEngine, RenderTarget, SurfaceSize, TargetCallback};
use anyhow::{anyhow, bail, Result};
use log::{debug, trace, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counters kept by the [`NullEngine`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NullStats {
    /// Frames submitted through `on_frame`
    pub frames_received: u64,
    /// Frames drawn into a drawable
    pub frames_rendered: u64,
    /// Frames dropped (no drawable, paused, or engine not running)
    pub frames_dropped: u64,
    /// Drawables registered through `create_drawable`
    pub drawables_created: u64,
    /// Drawables released through `release_drawable`
    pub drawables_released: u64,
    /// Drawable currently in use by the render thread
    pub drawable: Option<DrawableHandle>,
    /// Size of the last rendered frame, after rotation
    pub last_frame_size: Option<SurfaceSize>,
}

enum RenderCommand {
    CreateDrawable(DrawableHandle),
    Frame(VideoFrame),
    ReleaseDrawable(CompletionSignal),
    Quit,
}

#[derive(Default)]
struct Shared {
    stats: Mutex<NullStats>,
    paused: AtomicBool,
}

struct Worker {
    cmd_tx: mpsc::UnboundedSender<RenderCommand>,
    join_handle: JoinHandle<()>,
}

struct NullEngineInner {
    name: String,
    release_delay: Duration,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl Drop for NullEngineInner {
    fn drop(&mut self) {
        if let Some(worker) = lock(&self.worker).take() {
            let _ = worker.cmd_tx.send(RenderCommand::Quit);
            let _ = worker.join_handle.join();
        }
    }
}

/// Headless render engine. It owns a render thread that "draws" frames by counting them, so
/// hosts without a GPU and tests get the same threading behaviour as a real engine.
#[derive(Clone)]
pub struct NullEngine {
    inner: Arc<NullEngineInner>,
}

impl std::fmt::Debug for NullEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NullEngine")
            .field("name", &self.inner.name)
            .field("release_delay", &self.inner.release_delay)
            .field("running", &self.is_running())
            .finish()
    }
}

impl NullEngine {
    /// Creates a new, uninitialised null engine.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_release_delay(name, Duration::ZERO)
    }

    /// Like [`new`](Self::new), but every drawable release takes `delay` on the render thread.
    pub fn with_release_delay(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(NullEngineInner {
                name: name.into(),
                release_delay: delay,
                shared: Arc::new(Shared::default()),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn stats(&self) -> NullStats {
        lock(&self.inner.shared.stats).clone()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.worker).is_some()
    }

    /// True when rendering is currently reduced to zero fps.
    pub fn is_paused(&self) -> bool {
        self.inner.shared.paused.load(Ordering::SeqCst)
    }

    fn send(&self, cmd: RenderCommand) -> std::result::Result<(), RenderCommand> {
        match lock(&self.inner.worker).as_ref() {
            Some(worker) => worker.cmd_tx.send(cmd).map_err(|e| e.0),
            None => Err(cmd),
        }
    }
}

fn run_render_loop(shared: Arc<Shared>, mut cmd_rx: mpsc::UnboundedReceiver<RenderCommand>, release_delay: Duration) {
    while let Some(cmd) = cmd_rx.blocking_recv() {
        match cmd {
            RenderCommand::CreateDrawable(handle) => {
                let mut stats = lock(&shared.stats);
                stats.drawables_created += 1;
                stats.drawable = Some(handle);
            }
            RenderCommand::Frame(frame) => {
                let render = !shared.paused.load(Ordering::SeqCst);
                let mut stats = lock(&shared.stats);
                if stats.drawable.is_none() {
                    trace!("Dropping frame {}: no drawable", frame.timestamp_ns());
                    stats.frames_dropped += 1;
                } else if !render {
                    stats.frames_dropped += 1;
                } else {
                    stats.frames_rendered += 1;
                    stats.last_frame_size = Some(frame.rotated_size());
                }
            }
            RenderCommand::ReleaseDrawable(on_complete) => {
                if !release_delay.is_zero() {
                    thread::sleep(release_delay);
                }
                {
                    let mut stats = lock(&shared.stats);
                    if stats.drawable.take().is_some() {
                        stats.drawables_released += 1;
                    }
                }
                on_complete.count_down();
            }
            RenderCommand::Quit => break,
        }
    }

    lock(&shared.stats).drawable = None;
}

impl RenderEngine for NullEngine {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn init(&self, _config: &RendererConfig) -> Result<()> {
        let mut worker = lock(&self.inner.worker);
        if worker.is_some() {
            bail!("{} is already initialised", self.inner.name);
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let shared = self.inner.shared.clone();
        let release_delay = self.inner.release_delay;
        let join_handle = thread::Builder::new()
            .name(format!("{}-render", self.inner.name))
            .spawn(move || run_render_loop(shared, cmd_rx, release_delay))?;

        debug!("{}: render thread started", self.inner.name);
        *worker = Some(Worker { cmd_tx, join_handle });
        Ok(())
    }

    fn release(&self) {
        let Some(worker) = lock(&self.inner.worker).take() else {
            return;
        };

        let _ = worker.cmd_tx.send(RenderCommand::Quit);
        if worker.join_handle.join().is_err() {
            warn!("{}: render thread panicked", self.inner.name);
        }
        debug!("{}: released", self.inner.name);
    }

    fn create_drawable(&self, handle: DrawableHandle) -> Result<()> {
        self.send(RenderCommand::CreateDrawable(handle))
            .map_err(|_| anyhow!("{} is not initialised", self.inner.name))
    }

    fn release_drawable(&self, on_complete: CompletionSignal) {
        // Without a render thread nothing can be drawing, so complete right away.
        if let Err(RenderCommand::ReleaseDrawable(on_complete)) = self.send(RenderCommand::ReleaseDrawable(on_complete)) {
            on_complete.count_down();
        }
    }

    fn on_frame(&self, frame: VideoFrame) {
        lock(&self.inner.shared.stats).frames_received += 1;
        if self.send(RenderCommand::Frame(frame)).is_err() {
            lock(&self.inner.shared.stats).frames_dropped += 1;
        }
    }

    // Headless drawing costs nothing, so any positive rate renders every frame.
    fn set_fps_reduction(&self, fps: f32) {
        self.inner.shared.paused.store(fps.is_nan() || fps <= 0.0, Ordering::SeqCst);
    }

    fn disable_fps_reduction(&self) {
        self.inner.shared.paused.store(false, Ordering::SeqCst);
    }

    fn pause_video(&self) {
        self.inner.shared.paused.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct NullTargetState {
    sizes: Vec<SurfaceSize>,
    callback: Option<Arc<dyn TargetCallback>>,
    destroyed: bool,
}

/// Render target without backing storage. Records every size applied to it and vends
/// [`DrawableHandle::Null`] handles.
#[derive(Default)]
pub struct NullTarget {
    state: Mutex<NullTargetState>,
    next_id: AtomicU64,
}

impl NullTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every size applied so far, oldest first.
    pub fn sizes(&self) -> Vec<SurfaceSize> {
        lock(&self.state).sizes.clone()
    }

    /// Current size, if one was ever applied.
    pub fn size(&self) -> Option<SurfaceSize> {
        lock(&self.state).sizes.last().copied()
    }

    pub fn handles_vended(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    pub fn has_callback(&self) -> bool {
        lock(&self.state).callback.is_some()
    }

    /// Tells the registered callback a drawable is available.
    pub fn notify_available(&self) {
        let callback = lock(&self.state).callback.clone();
        if let Some(callback) = callback {
            callback.on_surface_available();
        }
    }

    /// Simulates the host tearing the target down. The callback runs outside the target lock.
    pub fn destroy(&self) {
        let callback = {
            let mut state = lock(&self.state);
            state.destroyed = true;
            state.callback.clone()
        };

        if let Some(callback) = callback {
            callback.on_surface_destroyed();
        }
    }
}

impl RenderTarget for NullTarget {
    fn set_size(&self, width: u32, height: u32) {
        lock(&self.state).sizes.push(SurfaceSize::new(width, height));
    }

    fn drawable_handle(&self) -> Result<DrawableHandle> {
        if lock(&self.state).destroyed {
            bail!("render target has been destroyed");
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(DrawableHandle::Null { id })
    }

    fn set_callback(&self, callback: Option<Box<dyn TargetCallback>>) {
        lock(&self.state).callback = callback.map(Arc::from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameBuffer, Rotation};
    use crate::latch::completion;
    use std::time::Instant;

    fn frame(ts: i64) -> VideoFrame {
        VideoFrame::new(FrameBuffer::blank(64, 48), Rotation::Deg0, ts)
    }

    /// Waits for everything queued so far on the render thread.
    fn sync(engine: &NullEngine) {
        let (signal, latch) = completion();
        engine.release_drawable(signal);
        assert!(latch.await_uninterruptibly());
    }

    #[test]
    fn double_init_fails() {
        let engine = NullEngine::new("double");
        engine.init(&RendererConfig::default()).unwrap();
        let err = engine.init(&RendererConfig::default()).unwrap_err();
        assert!(err.to_string().contains("already initialised"));

        engine.release();
        assert!(!engine.is_running());
        engine.init(&RendererConfig::default()).unwrap();
        assert!(engine.is_running());
    }

    #[test]
    fn frames_without_drawable_are_dropped() {
        let engine = NullEngine::new("nodrawable");
        engine.init(&RendererConfig::default()).unwrap();
        engine.on_frame(frame(1));
        engine.on_frame(frame(2));
        sync(&engine);

        let stats = engine.stats();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.frames_dropped, 2);
        assert_eq!(stats.frames_rendered, 0);
    }

    #[test]
    fn frames_render_into_drawable_until_released() {
        let engine = NullEngine::new("render");
        engine.init(&RendererConfig::default()).unwrap();
        engine.create_drawable(DrawableHandle::Null { id: 7 }).unwrap();
        engine.on_frame(frame(1));
        engine.on_frame(frame(2));
        sync(&engine);

        let stats = engine.stats();
        assert_eq!(stats.frames_rendered, 2);
        assert_eq!(stats.drawables_created, 1);
        assert_eq!(stats.drawables_released, 1);
        assert_eq!(stats.drawable, None);
        assert_eq!(stats.last_frame_size, Some(SurfaceSize::new(64, 48)));
    }

    #[test]
    fn paused_engine_drops_frames() {
        let engine = NullEngine::new("paused");
        engine.init(&RendererConfig::default()).unwrap();
        engine.create_drawable(DrawableHandle::Null { id: 1 }).unwrap();
        engine.pause_video();
        assert!(engine.is_paused());
        engine.on_frame(frame(1));
        sync(&engine);

        let stats = engine.stats();
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(stats.frames_rendered, 0);

        engine.disable_fps_reduction();
        assert!(!engine.is_paused());
        engine.create_drawable(DrawableHandle::Null { id: 2 }).unwrap();
        engine.on_frame(frame(2));
        sync(&engine);

        let stats = engine.stats();
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(stats.frames_rendered, 1);
    }

    #[test]
    fn fps_reduction_only_pauses_at_zero() {
        let engine = NullEngine::new("fps");
        engine.set_fps_reduction(15.0);
        assert!(!engine.is_paused());
        engine.set_fps_reduction(0.0);
        assert!(engine.is_paused());
        engine.set_fps_reduction(f32::NAN);
        assert!(engine.is_paused());
        engine.disable_fps_reduction();
        assert!(!engine.is_paused());
    }

    #[test]
    fn release_without_render_thread_completes_immediately() {
        let engine = NullEngine::new("idle");
        let (signal, latch) = completion();
        engine.release_drawable(signal);
        assert!(latch.await_uninterruptibly());
        assert!(engine.create_drawable(DrawableHandle::Null { id: 1 }).is_err());

        engine.on_frame(frame(1));
        assert_eq!(engine.stats().frames_dropped, 1);
    }

    #[test]
    fn release_delay_holds_completion_back() {
        let engine = NullEngine::with_release_delay("slow", Duration::from_millis(40));
        engine.init(&RendererConfig::default()).unwrap();

        let started = Instant::now();
        sync(&engine);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn null_target_records_sizes_and_vends_handles() {
        let target = NullTarget::new();
        assert_eq!(target.size(), None);
        target.set_size(800, 600);
        target.set_size(600, 800);
        assert_eq!(target.sizes(), vec![SurfaceSize::new(800, 600), SurfaceSize::new(600, 800)]);
        assert_eq!(target.size(), Some(SurfaceSize::new(600, 800)));

        assert_eq!(target.drawable_handle().unwrap(), DrawableHandle::Null { id: 1 });
        assert_eq!(target.drawable_handle().unwrap(), DrawableHandle::Null { id: 2 });
        assert_eq!(target.handles_vended(), 2);

        target.destroy();
        assert!(target.drawable_handle().is_err());
    }

    #[test]
    fn null_target_invokes_callback_on_destroy() {
        struct Flag(Arc<AtomicU64>);
        impl TargetCallback for Flag {
            fn on_surface_destroyed(&self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let count = Arc::new(AtomicU64::new(0));
        let target = NullTarget::new();
        target.set_callback(Some(Box::new(Flag(count.clone()))));
        assert!(target.has_callback());

        target.notify_available();
        target.destroy();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        target.set_callback(None);
        target.destroy();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
