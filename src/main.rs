use live_canvas::draw::input::{map_client_point, DisplayRect};
use live_canvas::draw::{save, settings_store, DrawingSurface, SurfaceEvent, Tool};
use live_canvas::logging;
use live_canvas::stream::Visibility;
use std::sync::mpsc::{channel, Receiver};
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_millis(16);

/// Host clock for the headless session: time only moves when we say so.
struct Clock {
    now: Instant,
}

impl Clock {
    fn advance(&mut self, by: Duration) -> Instant {
        self.now += by;
        self.now
    }
}

fn pump_frames(surface: &mut DrawingSurface, clock: &mut Clock, frames: u32) {
    for _ in 0..frames {
        let now = clock.advance(FRAME);
        surface.on_animation_frame(now);
        surface.on_timer(now);
    }
}

fn pump_timer(surface: &mut DrawingSurface, clock: &mut Clock, total: Duration) {
    let step = Duration::from_millis(1);
    let mut elapsed = Duration::ZERO;
    while elapsed < total {
        surface.on_timer(clock.advance(step));
        elapsed += step;
    }
}

fn drag(
    surface: &mut DrawingSurface,
    clock: &mut Clock,
    display: DisplayRect,
    backing: (u32, u32),
    points: &[(f32, f32)],
) {
    let Some((first, rest)) = points.split_first() else {
        return;
    };
    surface.pointer_down(map_client_point(*first, display, backing));
    for point in rest {
        surface.pointer_move(map_client_point(*point, display, backing));
        pump_frames(surface, clock, 1);
    }
    let last = rest.last().unwrap_or(first);
    surface.pointer_up(map_client_point(*last, display, backing));
}

fn log_events(events: &Receiver<SurfaceEvent>) {
    for event in events.try_iter() {
        match event {
            SurfaceEvent::StreamReady(stream) => {
                tracing::info!(stream = %stream.id(), "stream published")
            }
            other => tracing::debug!(event = other.name(), "surface event"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let debug = std::env::args().any(|arg| arg == "--debug");
    logging::init(debug, None);

    let settings = match settings_store::load() {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(error = %err, "failed to load settings, using defaults");
            Default::default()
        }
    };
    let backing = (settings.width, settings.height);
    let display = DisplayRect::new(0.0, 0.0, backing.0 as f32 / 2.0, backing.1 as f32 / 2.0);

    let (mut surface, events) = DrawingSurface::with_settings(settings);
    let mut clock = Clock {
        now: Instant::now(),
    };

    surface.mount();
    surface.bootstrap_stream(clock.now);
    pump_frames(&mut surface, &mut clock, 10);

    let (frames_tx, frames_rx) = channel();
    match surface.stream() {
        Some(stream) => stream.video_track().attach_sink(frames_tx),
        None => tracing::warn!("no stream after bootstrap; continuing without capture"),
    }
    log_events(&events);

    surface.set_color("#1E90FF")?;
    surface.set_brush_width(8);
    drag(
        &mut surface,
        &mut clock,
        display,
        backing,
        &[(20.0, 20.0), (60.0, 40.0), (100.0, 30.0), (140.0, 80.0)],
    );

    surface.set_tool(Tool::Line);
    surface.set_color("#000000")?;
    surface.set_brush_width(3);
    drag(
        &mut surface,
        &mut clock,
        display,
        backing,
        &[(30.0, 200.0), (120.0, 170.0), (220.0, 200.0)],
    );

    surface.set_tool(Tool::Circle);
    surface.set_color("#D62828")?;
    drag(
        &mut surface,
        &mut clock,
        display,
        backing,
        &[(180.0, 120.0), (200.0, 120.0), (215.0, 140.0)],
    );

    surface.set_tool(Tool::Fill);
    surface.set_color("#FCBF49")?;
    surface.pointer_down(map_client_point((180.0, 120.0), display, backing));

    surface.set_tool(Tool::Line);
    drag(
        &mut surface,
        &mut clock,
        display,
        backing,
        &[(10.0, 240.0), (240.0, 10.0)],
    );
    surface.undo();
    pump_frames(&mut surface, &mut clock, 1);

    let idle_start = frames_rx.try_iter().count();
    pump_frames(&mut surface, &mut clock, 60);
    let idle_frames = frames_rx.try_iter().count();

    surface.set_visibility(Visibility::Hidden, clock.now);
    pump_timer(&mut surface, &mut clock, Duration::from_secs(1));
    let hidden_frames = frames_rx.try_iter().count();
    surface.set_visibility(Visibility::Visible, clock.now);
    log_events(&events);

    tracing::info!(
        drawing_frames = idle_start,
        idle_frames,
        hidden_frames,
        pacing_writes = surface.pacer().writes(),
        history = surface.history_len(),
        "session finished"
    );

    if let Some(buffer) = surface.buffer() {
        let output = save::ensure_output_folder()?;
        let path = save::export_png(buffer, &output, chrono::Local::now())?;
        println!("canvas written to {}", path.display());
    }

    surface.unmount();
    Ok(())
}
