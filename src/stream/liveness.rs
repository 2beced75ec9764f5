//! Keeps the captured stream producing frames while nothing is being drawn.
//!
//! Capture pipelines that only emit on change stall on an idle surface, and
//! hosts throttle animation frames for hidden surfaces. Both drivers write a
//! near-transparent marker into the corner pixel so the bitmap keeps changing.

use crate::draw::model::Color;
use crate::draw::surface::Surface;
use crate::schedule::{Scheduler, TaskHandle};
use crate::stream::media::VideoTrack;
use std::f64::consts::TAU;
use std::fmt::Debug;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const MARKER_PIXEL: (u32, u32) = (0, 0);
pub const MARKER_ALPHA: u8 = 2;
const PACING_OSCILLATION_HZ: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

fn blend_marker(surface: &mut Surface, color: Color) {
    let (x, y) = MARKER_PIXEL;
    if x >= surface.width() || y >= surface.height() {
        return;
    }
    surface.edit(|buffer| buffer.blend_pixel(x, y, color.with_alpha(MARKER_ALPHA)));
}

/// Black on even milliseconds, white on odd.
pub fn keep_alive_color(wall_clock_ms: u128) -> Color {
    if wall_clock_ms % 2 == 0 {
        Color::BLACK
    } else {
        Color::WHITE
    }
}

/// Maps host `Instant`s onto wall-clock milliseconds from a single anchor
/// reading, so every tick sees the same clock the host drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    anchor: Instant,
    anchor_ms: u128,
}

impl WallClock {
    pub fn anchored(anchor: Instant, anchor_ms: u128) -> Self {
        Self { anchor, anchor_ms }
    }

    /// Anchors `anchor` to the current system time.
    pub fn system(anchor: Instant) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        Self::anchored(anchor, millis)
    }

    /// Instants before the anchor read as the anchor itself.
    pub fn millis_at(&self, now: Instant) -> u128 {
        self.anchor_ms + now.saturating_duration_since(self.anchor).as_millis()
    }
}

/// Foreground keep-alive, ticked once per animation frame.
#[derive(Debug, Clone)]
pub struct KeepAlive {
    enabled: bool,
    writes: u64,
}

impl KeepAlive {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, writes: 0 }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn tick(&mut self, surface: &mut Surface, wall_clock_ms: u128) -> bool {
        if !self.enabled {
            return false;
        }
        blend_marker(surface, keep_alive_color(wall_clock_ms));
        self.writes += 1;
        true
    }
}

pub fn pacing_interval(frame_rate: u32) -> Option<Duration> {
    (frame_rate > 0).then(|| Duration::from_micros(1_000_000 / u64::from(frame_rate)))
}

/// Grey level oscillating smoothly over time.
pub fn pacing_intensity(elapsed: Duration) -> u8 {
    let phase = (TAU * PACING_OSCILLATION_HZ * elapsed.as_secs_f64()).sin();
    (((phase + 1.0) / 2.0) * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Background pacing: a wall-clock interval task that keeps frames flowing
/// while the host has stopped delivering animation frames.
#[derive(Debug, Clone, Default)]
pub struct BackgroundPacer {
    handle: Option<TaskHandle>,
    started_at: Option<Instant>,
    writes: u64,
    last_write_at: Option<Instant>,
}

impl BackgroundPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts pacing when a stream and a frame rate are both available.
    /// Returns false when already running or preconditions are missing.
    pub fn start<K: Copy + Debug>(
        &mut self,
        scheduler: &mut Scheduler<K>,
        kind: K,
        frame_rate: Option<u32>,
        has_stream: bool,
        now: Instant,
    ) -> bool {
        if self.is_running(scheduler) {
            return false;
        }
        let Some(interval) = frame_rate.and_then(pacing_interval) else {
            tracing::debug!("background pacing skipped: no frame rate");
            return false;
        };
        if !has_stream {
            tracing::debug!("background pacing skipped: no stream");
            return false;
        }
        self.handle = Some(scheduler.schedule_interval(kind, interval, now));
        self.started_at = Some(now);
        tracing::debug!(interval_us = interval.as_micros() as u64, "background pacing started");
        true
    }

    pub fn stop<K: Copy + Debug>(&mut self, scheduler: &mut Scheduler<K>) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        self.started_at = None;
        let canceled = scheduler.cancel(handle);
        if canceled {
            tracing::debug!(writes = self.writes, "background pacing stopped");
        }
        canceled
    }

    pub fn is_running<K: Copy + Debug>(&self, scheduler: &Scheduler<K>) -> bool {
        self.handle
            .is_some_and(|handle| scheduler.is_scheduled(handle))
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn last_write_at(&self) -> Option<Instant> {
        self.last_write_at
    }

    /// Writes the grey marker, then asks the track for a frame when it can.
    pub fn tick(&mut self, surface: &mut Surface, video: Option<&VideoTrack>, now: Instant) {
        let elapsed = self
            .started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();
        let grey = pacing_intensity(elapsed);
        blend_marker(surface, Color::rgb(grey, grey, grey));
        self.writes += 1;
        self.last_write_at = Some(now);

        if let Some(requester) = video.and_then(VideoTrack::frame_requester) {
            requester.request();
        }
    }
}
