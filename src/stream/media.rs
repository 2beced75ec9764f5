use crate::draw::surface::Surface;
use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Live,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub sequence: u64,
    pub timestamp: Duration,
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

#[derive(Debug)]
struct VideoTrackInner {
    id: String,
    frame_rate: u32,
    ended: AtomicBool,
    frames_delivered: AtomicU64,
    frame_request_supported: bool,
    frame_requested: AtomicBool,
    sink: Mutex<Option<Sender<VideoFrame>>>,
}

/// Video track fed by a capture backend. Clones share the same track.
#[derive(Debug, Clone)]
pub struct VideoTrack {
    inner: Arc<VideoTrackInner>,
}

impl VideoTrack {
    pub fn new(id: impl Into<String>, frame_rate: u32, frame_request_supported: bool) -> Self {
        Self {
            inner: Arc::new(VideoTrackInner {
                id: id.into(),
                frame_rate,
                ended: AtomicBool::new(false),
                frames_delivered: AtomicU64::new(0),
                frame_request_supported,
                frame_requested: AtomicBool::new(false),
                sink: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn frame_rate(&self) -> u32 {
        self.inner.frame_rate
    }

    pub fn state(&self) -> TrackState {
        if self.inner.ended.load(Ordering::SeqCst) {
            TrackState::Ended
        } else {
            TrackState::Live
        }
    }

    pub fn is_live(&self) -> bool {
        self.state() == TrackState::Live
    }

    pub fn stop(&self) {
        if !self.inner.ended.swap(true, Ordering::SeqCst) {
            tracing::debug!(track = %self.inner.id, "video track stopped");
        }
        if let Ok(mut sink) = self.inner.sink.lock() {
            *sink = None;
        }
    }

    pub fn frames_delivered(&self) -> u64 {
        self.inner.frames_delivered.load(Ordering::SeqCst)
    }

    /// The "capture a frame now" capability, when the backend offers one.
    pub fn frame_requester(&self) -> Option<FrameRequester> {
        self.inner
            .frame_request_supported
            .then(|| FrameRequester {
                track: Arc::clone(&self.inner),
            })
    }

    /// Routes every delivered frame to `sink` until the receiver hangs up.
    pub fn attach_sink(&self, sink: Sender<VideoFrame>) {
        if let Ok(mut guard) = self.inner.sink.lock() {
            *guard = Some(sink);
        }
    }

    pub(crate) fn take_frame_request(&self) -> bool {
        self.inner.frame_requested.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn has_sink(&self) -> bool {
        self.inner
            .sink
            .lock()
            .map(|sink| sink.is_some())
            .unwrap_or(false)
    }

    pub(crate) fn deliver(&self, frame: Option<VideoFrame>) {
        self.inner.frames_delivered.fetch_add(1, Ordering::SeqCst);
        let Some(frame) = frame else {
            return;
        };
        if let Ok(mut sink) = self.inner.sink.lock() {
            let disconnected = sink.as_ref().is_some_and(|tx| tx.send(frame).is_err());
            if disconnected {
                tracing::debug!(track = %self.inner.id, "video frame sink disconnected");
                *sink = None;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameRequester {
    track: Arc<VideoTrackInner>,
}

impl FrameRequester {
    pub fn request(&self) {
        if !self.track.ended.load(Ordering::SeqCst) {
            self.track.frame_requested.store(true, Ordering::SeqCst);
        }
    }
}

#[derive(Debug)]
enum AudioSource {
    Sine(Arc<[f32]>),
    Placeholder,
}

#[derive(Debug)]
struct AudioTrackInner {
    id: String,
    source: AudioSource,
    ended: AtomicBool,
    position: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct AudioTrack {
    inner: Arc<AudioTrackInner>,
}

impl AudioTrack {
    pub(crate) fn from_table(id: impl Into<String>, table: Arc<[f32]>) -> Self {
        Self::with_source(id, AudioSource::Sine(table))
    }

    /// Silent stand-in used when no audio graph could be built.
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self::with_source(id, AudioSource::Placeholder)
    }

    fn with_source(id: impl Into<String>, source: AudioSource) -> Self {
        Self {
            inner: Arc::new(AudioTrackInner {
                id: id.into(),
                source,
                ended: AtomicBool::new(false),
                position: AtomicUsize::new(0),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.inner.source, AudioSource::Placeholder)
    }

    pub fn state(&self) -> TrackState {
        if self.inner.ended.load(Ordering::SeqCst) {
            TrackState::Ended
        } else {
            TrackState::Live
        }
    }

    pub fn is_live(&self) -> bool {
        self.state() == TrackState::Live
    }

    pub fn stop(&self) {
        if !self.inner.ended.swap(true, Ordering::SeqCst) {
            tracing::debug!(track = %self.inner.id, "audio track stopped");
        }
    }

    /// Fills `out` with the next samples. Ended and placeholder tracks are silent.
    pub fn read(&self, out: &mut [f32]) {
        let table = match &self.inner.source {
            AudioSource::Sine(table) if self.is_live() && !table.is_empty() => table,
            _ => {
                out.fill(0.0);
                return;
            }
        };
        let start = self.inner.position.fetch_add(out.len(), Ordering::SeqCst);
        for (offset, sample) in out.iter_mut().enumerate() {
            *sample = table[(start + offset) % table.len()];
        }
    }
}

#[derive(Debug)]
struct MediaStreamInner {
    id: String,
    video: VideoTrack,
    audio: Mutex<Vec<AudioTrack>>,
}

/// Capture handle bound to a surface: one video track plus attached audio.
#[derive(Debug, Clone)]
pub struct MediaStream {
    inner: Arc<MediaStreamInner>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, video: VideoTrack) -> Self {
        Self {
            inner: Arc::new(MediaStreamInner {
                id: id.into(),
                video,
                audio: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn video_track(&self) -> &VideoTrack {
        &self.inner.video
    }

    pub fn audio_tracks(&self) -> Vec<AudioTrack> {
        self.inner
            .audio
            .lock()
            .map(|tracks| tracks.clone())
            .unwrap_or_default()
    }

    pub fn add_audio_track(&self, track: AudioTrack) {
        if let Ok(mut tracks) = self.inner.audio.lock() {
            tracks.push(track);
        }
    }

    /// True while any track is still live.
    pub fn active(&self) -> bool {
        self.inner.video.is_live() || self.audio_tracks().iter().any(AudioTrack::is_live)
    }

    pub fn stop(&self) {
        self.inner.video.stop();
        for track in self.audio_tracks() {
            track.stop();
        }
    }

    pub fn same_stream(&self, other: &MediaStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Platform seam for turning the surface into a live video stream.
pub trait CaptureBackend {
    /// Creates a stream bound to a surface of `size` sampled at `frame_rate`.
    fn capture(&mut self, size: (u32, u32), frame_rate: u32, now: Instant) -> Result<MediaStream>;

    /// Lets the pipeline observe the surface; returns true when a frame was emitted.
    fn sample(&mut self, surface: &Surface, now: Instant) -> bool;

    /// Stops the stream and forgets it.
    fn release(&mut self);
}

/// In-process capture: emits a frame whenever the surface revision moved
/// since the last frame (no faster than the frame rate) or a frame was
/// explicitly requested through the track.
#[derive(Debug)]
pub struct SurfaceCapture {
    frame_request_supported: bool,
    stream: Option<MediaStream>,
    started_at: Option<Instant>,
    last_frame_at: Option<Instant>,
    last_revision: Option<u64>,
    sequence: u64,
    streams_created: u64,
}

impl Default for SurfaceCapture {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SurfaceCapture {
    pub fn new(frame_request_supported: bool) -> Self {
        Self {
            frame_request_supported,
            stream: None,
            started_at: None,
            last_frame_at: None,
            last_revision: None,
            sequence: 0,
            streams_created: 0,
        }
    }

    pub fn stream(&self) -> Option<&MediaStream> {
        self.stream.as_ref()
    }

    fn frame_interval(frame_rate: u32) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(frame_rate.max(1)))
    }
}

impl CaptureBackend for SurfaceCapture {
    fn capture(&mut self, size: (u32, u32), frame_rate: u32, now: Instant) -> Result<MediaStream> {
        if size.0 == 0 || size.1 == 0 {
            bail!("cannot capture an empty {}x{} surface", size.0, size.1);
        }
        if frame_rate == 0 {
            bail!("capture frame rate must be positive");
        }
        if let Some(existing) = self.stream.take() {
            existing.stop();
        }

        self.streams_created += 1;
        let id = format!("surface-capture-{}", self.streams_created);
        let video = VideoTrack::new(format!("{id}-video"), frame_rate, self.frame_request_supported);
        let stream = MediaStream::new(id, video);
        self.started_at = Some(now);
        self.last_frame_at = None;
        self.last_revision = None;
        self.sequence = 0;
        self.stream = Some(stream.clone());
        tracing::debug!(stream = %stream.id(), ?size, frame_rate, "surface capture started");
        Ok(stream)
    }

    fn sample(&mut self, surface: &Surface, now: Instant) -> bool {
        let Some(stream) = self.stream.as_ref() else {
            return false;
        };
        let video = stream.video_track();
        if !video.is_live() {
            return false;
        }

        let requested = video.take_frame_request();
        let changed = self.last_revision != Some(surface.revision());
        if !requested && !changed {
            return false;
        }
        if !requested {
            let interval = Self::frame_interval(video.frame_rate());
            let too_soon = self
                .last_frame_at
                .is_some_and(|last| now.saturating_duration_since(last) < interval);
            if too_soon {
                return false;
            }
        }

        self.sequence += 1;
        let frame = video.has_sink().then(|| VideoFrame {
            sequence: self.sequence,
            timestamp: self
                .started_at
                .map(|start| now.saturating_duration_since(start))
                .unwrap_or_default(),
            width: surface.width(),
            height: surface.height(),
            pixels: surface.buffer().pixels.as_slice().into(),
        });
        video.deliver(frame);
        self.last_frame_at = Some(now);
        self.last_revision = Some(surface.revision());
        true
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop();
            tracing::debug!(stream = %stream.id(), "surface capture released");
        }
        self.started_at = None;
        self.last_frame_at = None;
        self.last_revision = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{AudioTrack, CaptureBackend, MediaStream, SurfaceCapture, VideoTrack};
    use crate::draw::model::Color;
    use crate::draw::surface::Surface;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn idle_surface_stalls_without_changes() {
        let mut capture = SurfaceCapture::default();
        let mut surface = Surface::new(8, 8, Color::WHITE);
        let start = Instant::now();
        let stream = capture.capture(surface.size(), 30, start).unwrap();

        assert!(capture.sample(&surface, start));
        assert!(!capture.sample(&surface, start + Duration::from_millis(100)));
        assert_eq!(stream.video_track().frames_delivered(), 1);

        surface.fill(Color::BLACK);
        assert!(capture.sample(&surface, start + Duration::from_millis(200)));
        assert_eq!(stream.video_track().frames_delivered(), 2);
    }

    #[test]
    fn changes_are_throttled_to_frame_rate() {
        let mut capture = SurfaceCapture::default();
        let mut surface = Surface::new(4, 4, Color::WHITE);
        let start = Instant::now();
        capture.capture(surface.size(), 10, start).unwrap();

        assert!(capture.sample(&surface, start));
        surface.fill(Color::BLACK);
        assert!(!capture.sample(&surface, start + Duration::from_millis(50)));
        assert!(capture.sample(&surface, start + Duration::from_millis(100)));
    }

    #[test]
    fn explicit_request_bypasses_throttle_and_change_check() {
        let mut capture = SurfaceCapture::default();
        let surface = Surface::new(4, 4, Color::WHITE);
        let start = Instant::now();
        let stream = capture.capture(surface.size(), 10, start).unwrap();
        assert!(capture.sample(&surface, start));

        let requester = stream.video_track().frame_requester().expect("supported");
        requester.request();
        assert!(capture.sample(&surface, start + Duration::from_millis(1)));
        assert!(!capture.sample(&surface, start + Duration::from_millis(2)));
    }

    #[test]
    fn frame_request_capability_is_optional() {
        let track = VideoTrack::new("v", 30, false);
        assert!(track.frame_requester().is_none());
    }

    #[test]
    fn frames_reach_attached_sink() {
        let mut capture = SurfaceCapture::default();
        let surface = Surface::new(2, 2, Color::WHITE);
        let start = Instant::now();
        let stream = capture.capture(surface.size(), 30, start).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        stream.video_track().attach_sink(tx);

        capture.sample(&surface, start);
        let frame = rx.try_recv().expect("frame delivered");
        assert_eq!(frame.sequence, 1);
        assert_eq!((frame.width, frame.height), (2, 2));
        assert_eq!(&frame.pixels[..4], &[255, 255, 255, 255]);
    }

    #[test]
    fn release_ends_stream() {
        let mut capture = SurfaceCapture::default();
        let surface = Surface::new(2, 2, Color::WHITE);
        let stream = capture.capture(surface.size(), 30, Instant::now()).unwrap();
        capture.release();
        assert!(!stream.active());
        assert!(!capture.sample(&surface, Instant::now()));
    }

    #[test]
    fn capture_rejects_invalid_configuration() {
        let mut capture = SurfaceCapture::default();
        assert!(capture.capture((0, 4), 30, Instant::now()).is_err());
        assert!(capture.capture((4, 4), 0, Instant::now()).is_err());
    }

    #[test]
    fn audio_tracks_loop_their_table_and_fall_silent_when_stopped() {
        let track = AudioTrack::from_table("a", Arc::from(vec![0.1f32, 0.2, 0.3]));
        let mut out = [0.0f32; 4];
        track.read(&mut out);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.1]);

        track.stop();
        track.read(&mut out);
        assert_eq!(out, [0.0; 4]);

        let placeholder = AudioTrack::placeholder("p");
        placeholder.read(&mut out);
        assert_eq!(out, [0.0; 4]);
        assert!(placeholder.is_placeholder());
    }

    #[test]
    fn stream_is_active_while_any_track_is_live() {
        let stream = MediaStream::new("s", VideoTrack::new("v", 30, true));
        let audio = AudioTrack::placeholder("a");
        stream.add_audio_track(audio.clone());
        stream.video_track().stop();
        assert!(stream.active());
        audio.stop();
        assert!(!stream.active());
    }
}
