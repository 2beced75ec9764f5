use crate::draw::surface::Surface;
use crate::stream::audio::SharedSilentAudio;
use crate::stream::media::{CaptureBackend, MediaStream};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    Idle,
    WaitStable { since: Instant },
    Capture,
    Validate,
    AttachAudio,
    Ready,
    Failed,
}

impl BootstrapPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, BootstrapPhase::Ready | BootstrapPhase::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    pub active: bool,
    pub video_live: bool,
    pub audio_live: bool,
    pub audio_required: bool,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.active && self.video_live && (self.audio_live || !self.audio_required)
    }

    pub fn problems(&self) -> Vec<&'static str> {
        let mut problems = Vec::new();
        if !self.active {
            problems.push("stream inactive");
        }
        if !self.video_live {
            problems.push("no live video track");
        }
        if self.audio_required && !self.audio_live {
            problems.push("no live audio track");
        }
        problems
    }
}

/// Checks a stream's readiness. Never fails; callers log what it reports.
pub fn validate_stream(stream: &MediaStream, require_audio: bool) -> ValidationReport {
    ValidationReport {
        active: stream.active(),
        video_live: stream.video_track().is_live(),
        audio_live: stream.audio_tracks().iter().any(|track| track.is_live()),
        audio_required: require_audio,
    }
}

/// One-shot sequence that turns a mounted surface into a published stream.
#[derive(Debug, Clone)]
pub struct StreamBootstrap {
    phase: BootstrapPhase,
    frame_rate: u32,
    stabilize_min: Duration,
    published: bool,
}

impl StreamBootstrap {
    pub fn new(frame_rate: u32, stabilize_min: Duration) -> Self {
        Self {
            phase: BootstrapPhase::Idle,
            frame_rate: frame_rate.max(1),
            stabilize_min,
            published: false,
        }
    }

    pub fn phase(&self) -> BootstrapPhase {
        self.phase
    }

    pub fn is_pending(&self) -> bool {
        self.phase != BootstrapPhase::Idle && !self.phase.is_terminal()
    }

    /// Two frame intervals, but never less than the configured minimum.
    pub fn stabilization_delay(&self) -> Duration {
        let frame_interval = Duration::from_micros(1_000_000 / u64::from(self.frame_rate));
        (frame_interval * 2).max(self.stabilize_min)
    }

    /// Starts the sequence. Later calls are no-ops.
    pub fn begin(&mut self, now: Instant) -> bool {
        if self.phase != BootstrapPhase::Idle {
            tracing::debug!(phase = ?self.phase, "stream bootstrap already started");
            return false;
        }
        self.set_phase(BootstrapPhase::WaitStable { since: now });
        true
    }

    /// Advances as far as possible. Returns the stream exactly once, when
    /// the sequence reaches `Ready`.
    pub fn poll(
        &mut self,
        now: Instant,
        surface: &Surface,
        backend: &mut dyn CaptureBackend,
        audio: &SharedSilentAudio,
    ) -> Option<MediaStream> {
        let BootstrapPhase::WaitStable { since } = self.phase else {
            return None;
        };
        if now.saturating_duration_since(since) < self.stabilization_delay() {
            return None;
        }
        match surface.probe(0, 0) {
            Some(pixel) if pixel.to_rgba_array().iter().any(|channel| *channel != 0) => {}
            other => tracing::warn!(?other, "surface probe found no content before capture"),
        }

        self.set_phase(BootstrapPhase::Capture);
        let stream = match backend.capture(surface.size(), self.frame_rate, now) {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(error = %err, "stream capture failed");
                self.set_phase(BootstrapPhase::Failed);
                return None;
            }
        };

        self.set_phase(BootstrapPhase::Validate);
        log_validation(&validate_stream(&stream, false));

        self.set_phase(BootstrapPhase::AttachAudio);
        let track = match audio.lock() {
            Ok(mut provider) => Some(provider.silent_track()),
            Err(err) => {
                tracing::error!(error = %err, "silent audio provider poisoned");
                None
            }
        };
        if let Some(track) = track {
            stream.add_audio_track(track);
        }
        log_validation(&validate_stream(&stream, true));

        self.set_phase(BootstrapPhase::Ready);
        if self.published {
            return None;
        }
        self.published = true;
        tracing::info!(stream = %stream.id(), "stream ready");
        Some(stream)
    }

    /// Forgets progress so a new lifetime can bootstrap again.
    pub fn reset(&mut self) {
        self.phase = BootstrapPhase::Idle;
        self.published = false;
    }

    fn set_phase(&mut self, next: BootstrapPhase) {
        tracing::debug!(from = ?self.phase, to = ?next, "stream bootstrap phase");
        self.phase = next;
    }
}

fn log_validation(report: &ValidationReport) {
    if report.is_ok() {
        tracing::debug!(?report, "stream validated");
    } else {
        tracing::warn!(problems = ?report.problems(), "stream validation");
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_stream, BootstrapPhase, StreamBootstrap};
    use crate::draw::model::Color;
    use crate::draw::surface::Surface;
    use crate::stream::audio::SilentAudioProvider;
    use crate::stream::media::{
        AudioTrack, CaptureBackend, MediaStream, SurfaceCapture, VideoTrack,
    };
    use anyhow::{bail, Result};
    use std::time::{Duration, Instant};

    struct BrokenCapture;

    impl CaptureBackend for BrokenCapture {
        fn capture(&mut self, _: (u32, u32), _: u32, _: Instant) -> Result<MediaStream> {
            bail!("capture unsupported")
        }

        fn sample(&mut self, _: &Surface, _: Instant) -> bool {
            false
        }

        fn release(&mut self) {}
    }

    #[test]
    fn stabilization_delay_has_a_floor() {
        let fast = StreamBootstrap::new(60, Duration::from_millis(100));
        assert_eq!(fast.stabilization_delay(), Duration::from_millis(100));
        let slow = StreamBootstrap::new(5, Duration::from_millis(100));
        assert_eq!(slow.stabilization_delay(), Duration::from_millis(400));
    }

    #[test]
    fn waits_then_publishes_once_with_audio() {
        let surface = Surface::new(16, 16, Color::WHITE);
        let mut capture = SurfaceCapture::default();
        let audio = SilentAudioProvider::default().shared();
        let mut bootstrap = StreamBootstrap::new(30, Duration::from_millis(100));
        let start = Instant::now();

        assert!(bootstrap.begin(start));
        assert!(!bootstrap.begin(start));
        assert!(bootstrap
            .poll(start + Duration::from_millis(50), &surface, &mut capture, &audio)
            .is_none());
        assert!(bootstrap.is_pending());

        let stream = bootstrap
            .poll(start + Duration::from_millis(100), &surface, &mut capture, &audio)
            .expect("stream ready");
        assert_eq!(bootstrap.phase(), BootstrapPhase::Ready);
        assert!(!bootstrap.is_pending());
        assert_eq!(stream.audio_tracks().len(), 1);
        assert!(validate_stream(&stream, true).is_ok());

        assert!(bootstrap
            .poll(start + Duration::from_secs(1), &surface, &mut capture, &audio)
            .is_none());
        assert!(!bootstrap.begin(start));
    }

    #[test]
    fn capture_failure_is_terminal_and_unpublished() {
        let surface = Surface::new(4, 4, Color::WHITE);
        let audio = SilentAudioProvider::default().shared();
        let mut bootstrap = StreamBootstrap::new(30, Duration::ZERO);
        let start = Instant::now();
        bootstrap.begin(start);

        let published = bootstrap.poll(
            start + Duration::from_secs(1),
            &surface,
            &mut BrokenCapture,
            &audio,
        );
        assert!(published.is_none());
        assert_eq!(bootstrap.phase(), BootstrapPhase::Failed);
        assert!(bootstrap.phase().is_terminal());
        assert!(!bootstrap.is_pending());
        assert!(!audio.lock().unwrap().is_initialized());
    }

    #[test]
    fn validation_reports_missing_tracks() {
        let stream = MediaStream::new("s", VideoTrack::new("v", 30, true));
        let report = validate_stream(&stream, true);
        assert!(!report.is_ok());
        assert_eq!(report.problems(), vec!["no live audio track"]);
        assert!(validate_stream(&stream, false).is_ok());

        stream.add_audio_track(AudioTrack::placeholder("a"));
        stream.stop();
        let report = validate_stream(&stream, true);
        assert_eq!(
            report.problems(),
            vec!["stream inactive", "no live video track", "no live audio track"]
        );
    }

    #[test]
    fn reset_allows_a_new_lifetime() {
        let surface = Surface::new(4, 4, Color::WHITE);
        let mut capture = SurfaceCapture::default();
        let audio = SilentAudioProvider::default().shared();
        let mut bootstrap = StreamBootstrap::new(30, Duration::ZERO);
        let start = Instant::now();

        bootstrap.begin(start);
        let later = start + Duration::from_secs(1);
        assert!(bootstrap.poll(later, &surface, &mut capture, &audio).is_some());

        bootstrap.reset();
        assert!(bootstrap.begin(later));
        assert!(bootstrap
            .poll(later + Duration::from_secs(1), &surface, &mut capture, &audio)
            .is_some());
    }
}
