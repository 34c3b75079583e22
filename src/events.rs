//! Renderer notifications.
//!
//! A renderer reports two things to its observer: the first frame rendered after
//! (re)initialisation, and every change of the displayed resolution or rotation. Hosts either
//! implement [`RendererEvents`] directly, or use an [`EventBus`] and subscribe to a broadcast
//! stream of [`RendererEvent`]s.

use crate::frame::Rotation;
use crate::renderer::RendererId;
use log::trace;
use serde::Serialize;
use tokio::sync::broadcast;

/// Observer of renderer notifications. Called on the frame-delivery thread.
pub trait RendererEvents: Send + Sync {
    /// The first frame after (re)initialisation has been handed to the engine.
    fn on_first_frame_rendered(&self);

    /// The frame resolution or rotation changed. `width` and `height` are the dimensions of the
    /// frame buffer before rotation; consumers apply `rotation` themselves.
    fn on_frame_resolution_changed(&self, width: u32, height: u32, rotation: Rotation);
}

/// Renderer notification as published on an [`EventBus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RendererEvent {
    /// First frame rendered
    FirstFrameRendered { renderer_id: RendererId },
    /// Frame resolution or rotation changed
    FrameResolutionChanged {
        renderer_id: RendererId,
        width: u32,
        height: u32,
        rotation: Rotation,
    },
}

impl RendererEvent {
    pub fn renderer_id(&self) -> RendererId {
        match self {
            RendererEvent::FirstFrameRendered { renderer_id } => *renderer_id,
            RendererEvent::FrameResolutionChanged { renderer_id, .. } => *renderer_id,
        }
    }
}

/// [`RendererEvents`] implementation that publishes onto a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    renderer_id: RendererId,
    event_tx: broadcast::Sender<RendererEvent>,
}

impl EventBus {
    pub fn new(renderer_id: RendererId, capacity: usize) -> Self {
        let (event_tx, _first_rx) = broadcast::channel(capacity.max(1));
        Self { renderer_id, event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RendererEvent> {
        self.event_tx.subscribe()
    }

    fn publish(&self, event: RendererEvent) {
        // Nobody listening is fine, the event is simply dropped.
        if self.event_tx.send(event).is_err() {
            trace!("Renderer[{}]: event dropped, no subscribers", self.renderer_id);
        }
    }
}

impl RendererEvents for EventBus {
    fn on_first_frame_rendered(&self) {
        self.publish(RendererEvent::FirstFrameRendered {
            renderer_id: self.renderer_id,
        });
    }

    fn on_frame_resolution_changed(&self, width: u32, height: u32, rotation: Rotation) {
        self.publish(RendererEvent::FrameResolutionChanged {
            renderer_id: self.renderer_id,
            width,
            height,
            rotation,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new(RendererId::new(), 4);
        bus.on_first_frame_rendered();
        bus.on_frame_resolution_changed(640, 480, Rotation::Deg0);
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let id = RendererId::new();
        let bus = EventBus::new(id, 4);
        let mut rx = bus.subscribe();

        bus.on_first_frame_rendered();
        bus.on_frame_resolution_changed(800, 600, Rotation::Deg90);

        assert_eq!(rx.recv().await.unwrap(), RendererEvent::FirstFrameRendered { renderer_id: id });
        let changed = rx.recv().await.unwrap();
        assert_eq!(
            changed,
            RendererEvent::FrameResolutionChanged {
                renderer_id: id,
                width: 800,
                height: 600,
                rotation: Rotation::Deg90,
            }
        );
        assert_eq!(changed.renderer_id(), id);
    }

    #[test]
    fn events_serialize_tagged() {
        let id = RendererId::new();
        let json = serde_json::to_value(RendererEvent::FrameResolutionChanged {
            renderer_id: id,
            width: 1280,
            height: 720,
            rotation: Rotation::Deg270,
        })
        .unwrap();

        assert_eq!(json["event"], "frameResolutionChanged");
        assert_eq!(json["width"], 1280);
        assert_eq!(json["height"], 720);
        assert_eq!(json["rotation"], 270);
        assert_eq!(json["rendererId"], serde_json::to_value(id).unwrap());

        let json = serde_json::to_value(RendererEvent::FirstFrameRendered { renderer_id: id }).unwrap();
        assert_eq!(json["event"], "firstFrameRendered");
    }
}
