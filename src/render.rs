pub mod backend;

/// Render engine and render target implementations.
pub mod backends {
    /// Headless backend with its own render thread
    pub mod null;
}
