pub mod audio;
pub mod bootstrap;
pub mod liveness;
pub mod media;

pub use audio::{SharedSilentAudio, SilentAudioProvider};
pub use liveness::{Visibility, WallClock};
pub use media::{CaptureBackend, MediaStream, SurfaceCapture};
