use crate::frame::PixelFormat;

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("Invalid rotation: {0} degrees")]
    InvalidRotation(i32),

    #[error("Invalid frame buffer: {format:?} needs {} planes, got {planes}", .format.plane_count())]
    InvalidBuffer { format: PixelFormat, planes: usize },

    #[error("Invalid renderer configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    #[error("Render engine error: {0}")]
    Engine(#[source] anyhow::Error),

    #[error("Render target error: {0}")]
    Target(#[source] anyhow::Error),
}
