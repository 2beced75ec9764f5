use crate::draw::composite::RgbaBuffer;
use crate::draw::fill::{flood_fill, FillOutcome};
use crate::draw::input::should_append_point;
use crate::draw::model::{Color, Point, StrokeStyle, Tool};
use crate::draw::render::{clear_rect, DirtyRect, Rasterizer};
use crate::draw::state::Gesture;
use crate::draw::surface::Surface;

/// Applies tool gestures to the surface and the preview overlay.
///
/// Brush strokes land on the surface as the pointer moves. Line and circle
/// candidates live on the overlay until the gesture ends, then are drawn
/// once onto the surface.
#[derive(Debug, Default)]
pub struct ToolEngine {
    rasterizer: Rasterizer,
    preview: Option<DirtyRect>,
}

impl ToolEngine {
    /// Begins a gesture. Nothing is painted until the pointer moves.
    pub fn apply_tool_start(&mut self, tool: Tool, pos: Point) -> Gesture {
        Gesture::begin(tool, pos)
    }

    /// Extends the gesture to `pos`. With `restroke_path`, a brush path that a
    /// fade wash has covered is painted again in full so the wash does not eat
    /// the live stroke; otherwise only the new segment is drawn.
    pub fn apply_tool_move(
        &mut self,
        surface: &mut Surface,
        overlay: &mut RgbaBuffer,
        gesture: &mut Gesture,
        pos: Point,
        style: StrokeStyle,
        restroke_path: bool,
    ) {
        match gesture.tool {
            Tool::Brush => {
                let append = should_append_point(gesture.path.last().copied(), pos);
                let previous = gesture.last;
                gesture.last = pos;
                if append {
                    gesture.path.push(pos);
                }
                if restroke_path && gesture.washed {
                    gesture.washed = false;
                    self.restroke(surface, &gesture.path, style);
                } else if append {
                    let rasterizer = &mut self.rasterizer;
                    surface.edit(|buffer| rasterizer.stroke_segment(buffer, previous, pos, style));
                }
            }
            Tool::Line | Tool::Circle => {
                gesture.last = pos;
                self.clear_preview(overlay);
                self.preview = self.draw_shape(overlay, gesture.tool, gesture.anchor, pos, style);
            }
            Tool::Fill => {
                gesture.last = pos;
            }
        }
    }

    /// Finishes the gesture at `pos` (the last known pointer position).
    /// Returns whether the surface was modified by the gesture's end.
    pub fn apply_tool_end(
        &mut self,
        surface: &mut Surface,
        overlay: &mut RgbaBuffer,
        mut gesture: Gesture,
        pos: Point,
        style: StrokeStyle,
    ) -> bool {
        match gesture.tool {
            Tool::Brush => {
                if gesture.last != pos {
                    self.apply_tool_move(surface, overlay, &mut gesture, pos, style, false);
                }
                gesture.path.len() > 1
            }
            Tool::Line | Tool::Circle => {
                self.clear_preview(overlay);
                let rasterizer = &mut self.rasterizer;
                surface
                    .edit(|buffer| {
                        draw_shape_with(rasterizer, buffer, gesture.tool, gesture.anchor, pos, style)
                    })
                    .is_some()
            }
            Tool::Fill => false,
        }
    }

    pub fn apply_fill(&mut self, surface: &mut Surface, pos: Point, color: Color) -> FillOutcome {
        // No-op fills must not bump the revision.
        match surface.buffer().get(pos.0, pos.1) {
            None => return FillOutcome::OutOfBounds,
            Some(target) if target.same_rgb(color) => return FillOutcome::AlreadyFilled,
            Some(_) => {}
        }
        let outcome = surface.edit(|buffer| flood_fill(buffer, pos, color));
        tracing::debug!(?pos, color = %color.to_hex(), ?outcome, "flood fill");
        outcome
    }

    /// Drops any shape preview.
    pub fn clear_preview(&mut self, overlay: &mut RgbaBuffer) {
        if let Some(rect) = self.preview.take() {
            clear_rect(overlay, rect, Color::TRANSPARENT);
        }
    }

    pub fn has_preview(&self) -> bool {
        self.preview.is_some()
    }

    fn restroke(&mut self, surface: &mut Surface, path: &[Point], style: StrokeStyle) {
        if path.len() < 2 {
            return;
        }
        let rasterizer = &mut self.rasterizer;
        surface.edit(|buffer| rasterizer.stroke_polyline(buffer, path, style));
    }

    fn draw_shape(
        &mut self,
        target: &mut RgbaBuffer,
        tool: Tool,
        anchor: Point,
        pos: Point,
        style: StrokeStyle,
    ) -> Option<DirtyRect> {
        draw_shape_with(&mut self.rasterizer, target, tool, anchor, pos, style)
    }
}

fn draw_shape_with(
    rasterizer: &mut Rasterizer,
    target: &mut RgbaBuffer,
    tool: Tool,
    anchor: Point,
    pos: Point,
    style: StrokeStyle,
) -> Option<DirtyRect> {
    match tool {
        Tool::Line => rasterizer.stroke_segment(target, anchor, pos, style),
        Tool::Circle => {
            let radius = circle_radius(anchor, pos);
            rasterizer.stroke_circle(target, anchor, radius, style)
        }
        Tool::Brush | Tool::Fill => None,
    }
}

pub fn circle_radius(anchor: Point, pos: Point) -> f32 {
    let dx = (pos.0 - anchor.0) as f32;
    let dy = (pos.1 - anchor.1) as f32;
    (dx * dx + dy * dy).sqrt()
}
