use live_canvas::draw::composite::RgbaBuffer;
use live_canvas::draw::{Color, DrawingSurface, SurfaceEvent, SurfaceSettings};
use std::sync::mpsc::Receiver;
use std::time::Instant;

fn mounted(max_history: usize) -> (DrawingSurface, Receiver<SurfaceEvent>) {
    let settings = SurfaceSettings {
        width: 48,
        height: 48,
        max_history,
        ..SurfaceSettings::default()
    };
    let (mut surface, events) = DrawingSurface::with_settings(settings);
    surface.mount();
    (surface, events)
}

fn stroke(surface: &mut DrawingSurface, from: (i32, i32), to: (i32, i32)) {
    surface.pointer_down(from);
    surface.pointer_move(to);
    surface.pointer_up(to);
}

fn buffer(surface: &DrawingSurface) -> RgbaBuffer {
    surface.buffer().expect("mounted").clone()
}

fn undo_and_pump(surface: &mut DrawingSurface) {
    surface.undo();
    surface.on_animation_frame(Instant::now());
}

#[test]
fn undo_restores_each_prior_state_pixel_for_pixel() {
    let (mut surface, _events) = mounted(20);
    let mut states = vec![buffer(&surface)];

    surface.set_color("#FF0000").unwrap();
    stroke(&mut surface, (2, 2), (40, 6));
    states.push(buffer(&surface));
    surface.set_color("#00FF00").unwrap();
    stroke(&mut surface, (5, 40), (30, 10));
    states.push(buffer(&surface));
    surface.set_brush_width(14);
    stroke(&mut surface, (24, 24), (24, 45));

    for expected in states.iter().rev() {
        undo_and_pump(&mut surface);
        assert_eq!(&buffer(&surface), expected);
    }
    assert!(buffer(&surface).is_uniform(Color::WHITE));
}

#[test]
fn undo_at_cursor_zero_is_a_no_op() {
    let (mut surface, events) = mounted(20);
    stroke(&mut surface, (2, 2), (20, 20));
    undo_and_pump(&mut surface);
    let _ = events.try_iter().count();

    let before = buffer(&surface);
    for _ in 0..3 {
        undo_and_pump(&mut surface);
        assert!(!surface.undo_available());
        assert_eq!(surface.history().cursor(), 0);
        assert_eq!(buffer(&surface), before);
    }
    assert_eq!(events.try_iter().count(), 0);
}

#[test]
fn undo_availability_tracks_cursor() {
    let (mut surface, events) = mounted(20);
    assert!(!surface.undo_available());

    stroke(&mut surface, (1, 1), (9, 9));
    stroke(&mut surface, (1, 9), (9, 1));
    assert!(surface.undo_available());

    undo_and_pump(&mut surface);
    assert!(surface.undo_available());
    undo_and_pump(&mut surface);
    assert!(!surface.undo_available());

    let changes: Vec<bool> = events
        .try_iter()
        .filter_map(|event| match event {
            SurfaceEvent::UndoAvailabilityChanged(available) => Some(available),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![true, false]);
}

#[test]
fn history_is_bounded_with_fifo_eviction() {
    let (mut surface, _events) = mounted(3);
    let mut states = Vec::new();
    for i in 0..8 {
        stroke(&mut surface, (2, 2 + i * 5), (40, 2 + i * 5));
        states.push(buffer(&surface));
        assert!(surface.history_len() <= 3);
    }
    assert_eq!(surface.history_len(), 3);

    undo_and_pump(&mut surface);
    assert_eq!(buffer(&surface), states[6]);
    undo_and_pump(&mut surface);
    assert_eq!(buffer(&surface), states[5]);

    // The oldest surviving entry is the floor.
    undo_and_pump(&mut surface);
    assert_eq!(buffer(&surface), states[5]);
    assert!(!surface.undo_available());
}

#[test]
fn new_edit_after_undo_discards_the_undone_future() {
    let (mut surface, _events) = mounted(20);
    stroke(&mut surface, (2, 2), (30, 2));
    stroke(&mut surface, (2, 10), (30, 10));
    stroke(&mut surface, (2, 20), (30, 20));
    undo_and_pump(&mut surface);
    undo_and_pump(&mut surface);
    assert_eq!(surface.history_len(), 4);

    stroke(&mut surface, (2, 30), (30, 30));
    assert_eq!(surface.history_len(), 3);
    assert_eq!(surface.history().cursor(), 2);
}

#[test]
fn restore_keeps_the_surface_opaque() {
    let (mut surface, _events) = mounted(20);
    surface.set_fading(true);
    stroke(&mut surface, (3, 3), (44, 44));
    undo_and_pump(&mut surface);
    assert!(surface.buffer().unwrap().is_opaque());
}

#[test]
fn consecutive_undos_before_a_pump_each_step_back() {
    let (mut surface, events) = mounted(20);
    let baseline = buffer(&surface);
    stroke(&mut surface, (2, 2), (40, 2));
    let first = buffer(&surface);
    stroke(&mut surface, (2, 12), (40, 12));
    stroke(&mut surface, (2, 22), (40, 22));
    assert_eq!(surface.history().cursor(), 3);
    let _ = events.try_iter().count();

    surface.undo();
    surface.undo();
    surface.on_animation_frame(Instant::now());
    assert_eq!(surface.history().cursor(), 1);
    assert_eq!(buffer(&surface), first);

    let performed = events
        .try_iter()
        .filter(|event| matches!(event, SurfaceEvent::UndoPerformed))
        .count();
    assert_eq!(performed, 1);

    surface.undo();
    surface.undo();
    surface.on_animation_frame(Instant::now());
    assert_eq!(surface.history().cursor(), 0);
    assert_eq!(buffer(&surface), baseline);
    assert!(!surface.undo_available());
}
