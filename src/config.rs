use crate::errors::RendererError;
use serde::{Deserialize, Serialize};

/// Default capacity of the broadcast channel behind an [`EventBus`](crate::events::EventBus).
pub const DEFAULT_EVENT_CAPACITY: usize = 32;

/// Attributes requested for the drawable surface the engine creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceAttributes {
    /// RGB without alpha, no special requirements
    #[default]
    Plain,
    /// RGBA with an alpha channel
    Rgba,
    /// Off-screen pixel buffer
    PixelBuffer,
    /// Surface that can be fed to an encoder
    Recordable,
}

/// Drawer the engine uses to put a frame onto the drawable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawerKind {
    /// Textured rectangle, the common case
    #[default]
    Rect,
    /// Planar YUV conversion in the fragment stage
    Yuv,
}

/// Renderer configuration handed to the render engine on (re)initialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Surface attributes for the drawable
    pub surface: SurfaceAttributes,
    /// Drawer used by the engine
    pub drawer: DrawerKind,
    /// Capacity of the event channel when events are published on an [`EventBus`](crate::events::EventBus)
    pub event_capacity: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface: SurfaceAttributes::Plain,
            drawer: DrawerKind::Rect,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl RendererConfig {
    /// Parses a configuration from JSON. Missing fields fall back to their defaults.
    pub fn from_json(json: &str) -> Result<Self, RendererError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_plain_rect() {
        let cfg = RendererConfig::default();
        assert_eq!(cfg.surface, SurfaceAttributes::Plain);
        assert_eq!(cfg.drawer, DrawerKind::Rect);
        assert_eq!(cfg.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn from_json_fills_missing_fields() {
        let cfg = RendererConfig::from_json(r#"{ "surface": "rgba" }"#).unwrap();
        assert_eq!(cfg.surface, SurfaceAttributes::Rgba);
        assert_eq!(cfg.drawer, DrawerKind::Rect);
        assert_eq!(cfg.event_capacity, DEFAULT_EVENT_CAPACITY);

        let cfg = RendererConfig::from_json(r#"{ "drawer": "yuv", "event_capacity": 4 }"#).unwrap();
        assert_eq!(cfg.drawer, DrawerKind::Yuv);
        assert_eq!(cfg.event_capacity, 4);
    }

    #[test]
    fn from_json_rejects_unknown_variants() {
        let err = RendererConfig::from_json(r#"{ "surface": "hdr" }"#).unwrap_err();
        assert!(matches!(err, RendererError::InvalidConfig(_)));
        assert!(err.to_string().starts_with("Invalid renderer configuration"));
    }
}
