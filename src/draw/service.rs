use crate::draw::composite::{composite_overlay, RgbaBuffer};
use crate::draw::fade::FadeDecay;
use crate::draw::history::{HistoryLog, Snapshot};
use crate::draw::messages::SurfaceEvent;
use crate::draw::model::{Color, Point, StrokeStyle, Tool};
use crate::draw::settings::{SurfaceSettings, MAX_BRUSH_WIDTH};
use crate::draw::state::{Gesture, SessionPhase, SessionState};
use crate::draw::surface::Surface;
use crate::draw::tools::ToolEngine;
use crate::schedule::Scheduler;
use crate::stream::audio::{SharedSilentAudio, SilentAudioProvider};
use crate::stream::bootstrap::{BootstrapPhase, StreamBootstrap};
use crate::stream::liveness::{BackgroundPacer, KeepAlive, Visibility, WallClock};
use crate::stream::media::{CaptureBackend, MediaStream, SurfaceCapture};
use anyhow::Result;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Instant;

pub const BACKGROUND: Color = Color::WHITE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SurfaceTask {
    FadeDecay,
    BackgroundPacing,
}

/// A queued undo: the target snapshot and how many history steps it spans.
#[derive(Debug)]
struct PendingRestore {
    snapshot: Snapshot,
    steps: usize,
}

/// The surface plus its preview overlay. Absent while unmounted.
#[derive(Debug)]
struct RenderContext {
    surface: Surface,
    overlay: RgbaBuffer,
}

impl RenderContext {
    fn new(width: u32, height: u32) -> Self {
        let surface = Surface::new(width, height, BACKGROUND);
        let (width, height) = surface.size();
        Self {
            surface,
            overlay: RgbaBuffer::transparent(width, height),
        }
    }
}

/// Interactive drawing surface whose contents double as a live stream.
///
/// Single-threaded: the host feeds pointer input, animation-frame ticks,
/// wall-clock timer ticks and visibility changes through `&mut self`.
/// Notifications go out over the channel returned by the constructor.
pub struct DrawingSurface {
    settings: SurfaceSettings,
    context: Option<RenderContext>,
    tool: Tool,
    style: StrokeStyle,
    fading: bool,
    session: SessionState,
    engine: ToolEngine,
    history: HistoryLog,
    pending_restore: Option<PendingRestore>,
    undo_available: bool,
    scheduler: Scheduler<SurfaceTask>,
    fade: FadeDecay,
    keep_alive: KeepAlive,
    wall_clock: WallClock,
    pacer: BackgroundPacer,
    visibility: Visibility,
    bootstrap: StreamBootstrap,
    capture: Box<dyn CaptureBackend>,
    audio: SharedSilentAudio,
    stream: Option<MediaStream>,
    events: Sender<SurfaceEvent>,
}

impl DrawingSurface {
    pub fn new(
        settings: SurfaceSettings,
        capture: Box<dyn CaptureBackend>,
        audio: SharedSilentAudio,
    ) -> (Self, Receiver<SurfaceEvent>) {
        let settings = settings.sanitized();
        let (events, rx) = channel();
        let surface = Self {
            tool: Tool::default(),
            style: settings.stroke_style(),
            fading: settings.fading_enabled,
            session: SessionState::Idle,
            engine: ToolEngine::default(),
            history: HistoryLog::new(settings.max_history),
            pending_restore: None,
            undo_available: false,
            scheduler: Scheduler::new(),
            fade: FadeDecay::new(settings.fade_wash_alpha),
            keep_alive: KeepAlive::new(settings.keep_alive_enabled),
            wall_clock: WallClock::system(Instant::now()),
            pacer: BackgroundPacer::new(),
            visibility: Visibility::Visible,
            bootstrap: StreamBootstrap::new(settings.frame_rate, settings.stabilize_min()),
            context: None,
            capture,
            audio,
            stream: None,
            events,
            settings,
        };
        (surface, rx)
    }

    /// In-process capture and a private silent-audio provider.
    pub fn with_settings(settings: SurfaceSettings) -> (Self, Receiver<SurfaceEvent>) {
        let audio = SilentAudioProvider::new(settings.audio).shared();
        Self::new(settings, Box::new(SurfaceCapture::default()), audio)
    }

    pub fn mount(&mut self) {
        if self.context.is_some() {
            tracing::debug!("surface already mounted");
            return;
        }
        self.context = Some(RenderContext::new(self.settings.width, self.settings.height));
        self.history.clear();
        self.snapshot();
        tracing::info!(
            width = self.settings.width,
            height = self.settings.height,
            "surface mounted"
        );
    }

    /// Cancels every timing source, stops the stream and releases audio.
    pub fn unmount(&mut self) {
        self.fade.stop(&mut self.scheduler);
        self.pacer.stop(&mut self.scheduler);
        self.scheduler.clear();
        self.capture.release();
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        match self.audio.lock() {
            Ok(mut provider) => {
                provider.teardown();
            }
            Err(err) => tracing::error!(error = %err, "silent audio provider poisoned"),
        }
        self.bootstrap.reset();
        self.pending_restore = None;
        self.session = SessionState::Idle;
        self.history.clear();
        self.refresh_undo_availability();
        if let Some(mut ctx) = self.context.take() {
            self.engine.clear_preview(&mut ctx.overlay);
            tracing::info!("surface unmounted");
        }
    }

    /// Resizes the surface. Content and history start over.
    pub fn reconfigure(&mut self, width: u32, height: u32) {
        self.settings.width = width;
        self.settings.height = height;
        self.settings.sanitize();
        if self.context.is_none() {
            return;
        }
        self.fade.stop(&mut self.scheduler);
        self.pending_restore = None;
        self.session = SessionState::Idle;
        if let Some(ctx) = self.context.as_mut() {
            self.engine.clear_preview(&mut ctx.overlay);
        }
        self.context = Some(RenderContext::new(self.settings.width, self.settings.height));
        self.history.clear();
        self.snapshot();
        tracing::info!(
            width = self.settings.width,
            height = self.settings.height,
            "surface reconfigured"
        );
    }

    pub fn set_tool(&mut self, tool: Tool) {
        if self.tool != tool {
            tracing::debug!(from = ?self.tool, to = ?tool, "tool selected");
        }
        self.tool = tool;
    }

    /// Accepts `#RRGGBB`; anything else leaves the color unchanged.
    pub fn set_color(&mut self, hex: &str) -> Result<()> {
        let color = Color::from_hex(hex)?;
        self.style.color = color;
        self.settings.stroke_color = color.to_hex();
        Ok(())
    }

    pub fn set_brush_width(&mut self, width: u32) {
        self.style.width = width.clamp(1, MAX_BRUSH_WIDTH);
        self.settings.brush_width = self.style.width;
    }

    pub fn set_fading(&mut self, enabled: bool) {
        self.fading = enabled;
        self.settings.fading_enabled = enabled;
        if !enabled {
            self.fade.stop(&mut self.scheduler);
        } else if self.brush_gesture_active() {
            self.fade.start(&mut self.scheduler, SurfaceTask::FadeDecay);
        }
    }

    pub fn pointer_down(&mut self, pos: Point) {
        let Some(ctx) = self.context.as_mut() else {
            tracing::trace!("pointer down ignored: surface unavailable");
            return;
        };
        if self.session.phase() != SessionPhase::Idle {
            tracing::debug!(phase = ?self.session.phase(), "pointer down ignored");
            return;
        }

        if self.tool == Tool::Fill {
            let outcome = self.engine.apply_fill(&mut ctx.surface, pos, self.style.color);
            tracing::debug!(?pos, pixels = outcome.changed_pixels(), "fill applied");
            self.tool = Tool::Brush;
            self.snapshot();
            return;
        }

        let gesture = self.engine.apply_tool_start(self.tool, pos);
        if self.session.transition(SessionState::Drawing(gesture)).is_none() {
            return;
        }
        if self.tool == Tool::Brush && self.fading {
            self.fade.start(&mut self.scheduler, SurfaceTask::FadeDecay);
        }
        self.emit(SurfaceEvent::DrawingStarted);
    }

    pub fn pointer_move(&mut self, pos: Point) {
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        let Some(gesture) = self.session.gesture_mut() else {
            return;
        };
        self.engine.apply_tool_move(
            &mut ctx.surface,
            &mut ctx.overlay,
            gesture,
            pos,
            self.style,
            self.fading,
        );
    }

    pub fn pointer_up(&mut self, pos: Point) {
        self.end_gesture(Some(pos));
    }

    /// Ends any gesture at the last known pointer position.
    pub fn pointer_leave(&mut self) {
        self.end_gesture(None);
    }

    fn end_gesture(&mut self, pos: Option<Point>) {
        if !self.session.is_drawing() {
            return;
        }
        let Some(SessionState::Drawing(gesture)) = self.session.transition(SessionState::Idle)
        else {
            return;
        };
        self.fade.stop(&mut self.scheduler);
        let end = pos.unwrap_or(gesture.last);
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        let tool = gesture.tool;
        let painted =
            self.engine
                .apply_tool_end(&mut ctx.surface, &mut ctx.overlay, gesture, end, self.style);
        tracing::debug!(?tool, ?end, painted, "gesture ended");
        self.emit(SurfaceEvent::DrawingEnded);
        self.snapshot();
    }

    /// Paints the whole surface white and records one history entry.
    pub fn clear(&mut self) {
        if self.context.is_none() {
            tracing::trace!("clear ignored: surface unavailable");
            return;
        }
        if self.session.is_restoring() {
            tracing::debug!("clear ignored while restoring");
            return;
        }
        if self.session.is_drawing() {
            self.session = SessionState::Idle;
            self.fade.stop(&mut self.scheduler);
            tracing::debug!("clear cancelled the active gesture");
            self.emit(SurfaceEvent::DrawingEnded);
        }
        if let Some(ctx) = self.context.as_mut() {
            self.engine.clear_preview(&mut ctx.overlay);
            ctx.overlay.fill(Color::TRANSPARENT);
            ctx.surface.fill(BACKGROUND);
        }
        self.snapshot();
        self.emit(SurfaceEvent::Cleared);
    }

    /// Steps back one history entry. The restore is applied on the next pump;
    /// further undo calls before then step back again and retarget it.
    pub fn undo(&mut self) {
        if self.context.is_none() {
            return;
        }
        if self.session.is_drawing() {
            tracing::debug!("undo ignored while drawing");
            return;
        }
        let Some(snapshot) = self.history.step_back() else {
            tracing::debug!("nothing to undo");
            return;
        };
        let steps = self.pending_restore.as_ref().map_or(0, |pending| pending.steps) + 1;
        if steps == 1 {
            self.session.transition(SessionState::Restoring);
        }
        self.pending_restore = Some(PendingRestore { snapshot, steps });
        self.refresh_undo_availability();
    }

    /// Replaces the clock that maps frame instants to wall-clock time.
    pub fn set_wall_clock(&mut self, clock: WallClock) {
        self.wall_clock = clock;
    }

    pub fn set_visibility(&mut self, visibility: Visibility, now: Instant) {
        if self.visibility == visibility {
            return;
        }
        self.visibility = visibility;
        tracing::debug!(?visibility, "visibility changed");
        match visibility {
            Visibility::Hidden => {
                self.pacer.start(
                    &mut self.scheduler,
                    SurfaceTask::BackgroundPacing,
                    Some(self.settings.frame_rate),
                    self.stream.is_some(),
                    now,
                );
            }
            Visibility::Visible => {
                self.pacer.stop(&mut self.scheduler);
            }
        }
    }

    /// Starts the one-time stream bootstrap. Repeated calls are no-ops.
    pub fn bootstrap_stream(&mut self, now: Instant) {
        if self.context.is_none() {
            tracing::trace!("bootstrap ignored: surface unavailable");
            return;
        }
        if self.bootstrap.begin(now) {
            self.run_pending(now);
        }
    }

    /// Completes suspended work: a queued undo restore and a waiting bootstrap.
    pub fn run_pending(&mut self, now: Instant) {
        self.finish_restore();
        self.advance_bootstrap(now);
    }

    pub fn on_animation_frame(&mut self, now: Instant) {
        self.run_pending(now);

        for (_, kind) in self.scheduler.animation_frame_tasks() {
            if kind != SurfaceTask::FadeDecay {
                continue;
            }
            let gesture_active = self.brush_gesture_active();
            match self.context.as_mut() {
                Some(ctx) => {
                    let washed = self.fade.tick(
                        &mut self.scheduler,
                        &mut ctx.surface,
                        self.fading,
                        gesture_active,
                    );
                    if let Some(gesture) = self.session.gesture_mut().filter(|_| washed) {
                        gesture.washed = true;
                    }
                }
                None => self.fade.stop(&mut self.scheduler),
            }
        }

        if self.stream.is_some() {
            if let Some(ctx) = self.context.as_mut() {
                let millis = self.wall_clock.millis_at(now);
                self.keep_alive.tick(&mut ctx.surface, millis);
            }
        }
        self.sample_capture(now);
    }

    pub fn on_timer(&mut self, now: Instant) {
        self.run_pending(now);

        for (_, kind) in self.scheduler.due_intervals(now) {
            if kind != SurfaceTask::BackgroundPacing {
                continue;
            }
            let Some(ctx) = self.context.as_mut() else {
                continue;
            };
            let video = self.stream.as_ref().map(MediaStream::video_track);
            self.pacer.tick(&mut ctx.surface, video, now);
        }
        self.sample_capture(now);
    }

    pub fn is_mounted(&self) -> bool {
        self.context.is_some()
    }

    pub fn settings(&self) -> &SurfaceSettings {
        &self.settings
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn stroke_style(&self) -> StrokeStyle {
        self.style
    }

    pub fn fading(&self) -> bool {
        self.fading
    }

    pub fn session_phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn gesture(&self) -> Option<&Gesture> {
        self.session.gesture()
    }

    pub fn buffer(&self) -> Option<&RgbaBuffer> {
        self.context.as_ref().map(|ctx| ctx.surface.buffer())
    }

    pub fn overlay(&self) -> Option<&RgbaBuffer> {
        self.context.as_ref().map(|ctx| &ctx.overlay)
    }

    pub fn surface_revision(&self) -> Option<u64> {
        self.context.as_ref().map(|ctx| ctx.surface.revision())
    }

    /// Surface with the preview overlay on top, as a viewer would see it.
    pub fn composed_frame(&self) -> Option<RgbaBuffer> {
        self.context
            .as_ref()
            .map(|ctx| composite_overlay(ctx.surface.buffer(), &ctx.overlay))
    }

    pub fn undo_available(&self) -> bool {
        self.undo_available
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn stream(&self) -> Option<&MediaStream> {
        self.stream.as_ref()
    }

    pub fn bootstrap_phase(&self) -> BootstrapPhase {
        self.bootstrap.phase()
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_running(&self.scheduler)
    }

    pub fn is_pacing(&self) -> bool {
        self.pacer.is_running(&self.scheduler)
    }

    pub fn pacer(&self) -> &BackgroundPacer {
        &self.pacer
    }

    pub fn keep_alive_writes(&self) -> u64 {
        self.keep_alive.writes()
    }

    fn brush_gesture_active(&self) -> bool {
        self.session
            .gesture()
            .is_some_and(|gesture| gesture.tool == Tool::Brush)
    }

    fn snapshot(&mut self) {
        let Some(ctx) = self.context.as_ref() else {
            return;
        };
        if self.session.is_restoring() {
            tracing::trace!("snapshot suppressed while restoring");
            return;
        }
        let snapshot = match Snapshot::encode(ctx.surface.buffer()) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(error = %err, "history snapshot failed");
                return;
            }
        };
        let bytes = snapshot.encoded_len();
        let evicted = self.history.push(snapshot);
        tracing::debug!(
            entries = self.history.len(),
            cursor = self.history.cursor(),
            bytes,
            total_bytes = self.history.encoded_bytes(),
            evicted,
            "history snapshot"
        );
        self.refresh_undo_availability();
    }

    fn finish_restore(&mut self) {
        let Some(PendingRestore { snapshot, steps }) = self.pending_restore.take() else {
            return;
        };
        let restored = match (snapshot.decode(), self.context.as_mut()) {
            (Ok(content), Some(ctx)) => ctx.surface.replace(content),
            (Err(err), _) => {
                tracing::warn!(error = %err, "undo restore failed");
                false
            }
            (Ok(_), None) => false,
        };
        if !restored {
            for _ in 0..steps {
                self.history.revert_step();
            }
        }
        self.session.transition(SessionState::Idle);
        self.refresh_undo_availability();
        if restored {
            tracing::debug!(cursor = self.history.cursor(), "undo restored");
            self.emit(SurfaceEvent::UndoPerformed);
        }
    }

    fn advance_bootstrap(&mut self, now: Instant) {
        if !self.bootstrap.is_pending() {
            return;
        }
        let Some(ctx) = self.context.as_ref() else {
            return;
        };
        let Some(stream) =
            self.bootstrap
                .poll(now, &ctx.surface, self.capture.as_mut(), &self.audio)
        else {
            return;
        };
        self.stream = Some(stream.clone());
        self.emit(SurfaceEvent::StreamReady(stream));
        if self.visibility == Visibility::Hidden {
            tracing::debug!("stream ready while hidden; pacing starts on the next hide");
        }
    }

    fn sample_capture(&mut self, now: Instant) {
        if self.stream.is_none() {
            return;
        }
        if let Some(ctx) = self.context.as_ref() {
            self.capture.sample(&ctx.surface, now);
        }
    }

    fn refresh_undo_availability(&mut self) {
        let available = self.history.can_undo();
        if available != self.undo_available {
            self.undo_available = available;
            self.emit(SurfaceEvent::UndoAvailabilityChanged(available));
        }
    }

    fn emit(&self, event: SurfaceEvent) {
        let name = event.name();
        if self.events.send(event).is_err() {
            tracing::trace!(event = name, "surface event dropped: no receiver");
        }
    }
}

impl Drop for DrawingSurface {
    fn drop(&mut self) {
        if self.context.is_some() || self.stream.is_some() {
            self.unmount();
        }
    }
}
