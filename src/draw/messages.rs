use crate::stream::media::MediaStream;

/// Notifications a `DrawingSurface` sends to its host.
#[derive(Debug, Clone)]
pub enum SurfaceEvent {
    StreamReady(MediaStream),
    DrawingStarted,
    DrawingEnded,
    Cleared,
    UndoPerformed,
    UndoAvailabilityChanged(bool),
}

impl SurfaceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceEvent::StreamReady(_) => "stream_ready",
            SurfaceEvent::DrawingStarted => "drawing_started",
            SurfaceEvent::DrawingEnded => "drawing_ended",
            SurfaceEvent::Cleared => "cleared",
            SurfaceEvent::UndoPerformed => "undo_performed",
            SurfaceEvent::UndoAvailabilityChanged(_) => "undo_availability_changed",
        }
    }
}
