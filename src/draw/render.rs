use crate::draw::composite::RgbaBuffer;
use crate::draw::model::{Color, Point, StrokeStyle};
use std::collections::HashMap;

pub const DEFAULT_WIDE_STROKE_THRESHOLD: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl DirtyRect {
    pub fn from_points(a: Point, b: Point, pad: i32) -> Self {
        let min_x = a.0.min(b.0) - pad;
        let max_x = a.0.max(b.0) + pad;
        let min_y = a.1.min(b.1) - pad;
        let max_y = a.1.max(b.1) + pad;
        Self {
            x: min_x,
            y: min_y,
            width: (max_x - min_x + 1).max(1),
            height: (max_y - min_y + 1).max(1),
        }
    }

    pub fn union(self, other: DirtyRect) -> DirtyRect {
        let min_x = self.x.min(other.x);
        let min_y = self.y.min(other.y);
        let max_x = (self.x + self.width).max(other.x + other.width);
        let max_y = (self.y + self.height).max(other.y + other.height);
        DirtyRect {
            x: min_x,
            y: min_y,
            width: (max_x - min_x).max(1),
            height: (max_y - min_y).max(1),
        }
    }

    pub fn clamp(self, width: u32, height: u32) -> Option<DirtyRect> {
        let max_w = width as i32;
        let max_h = height as i32;
        let x0 = self.x.clamp(0, max_w);
        let y0 = self.y.clamp(0, max_h);
        let x1 = (self.x + self.width).clamp(0, max_w);
        let y1 = (self.y + self.height).clamp(0, max_h);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(DirtyRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

pub fn segment_dirty_bounds(start: Point, end: Point, stroke_width: u32) -> DirtyRect {
    let pad = (stroke_width.max(1) as i32 + 1) / 2 + 1;
    DirtyRect::from_points(start, end, pad)
}

pub fn circle_dirty_bounds(center: Point, radius: f32, stroke_width: u32) -> DirtyRect {
    let reach = (radius + stroke_width.max(1) as f32 / 2.0).ceil() as i32 + 1;
    DirtyRect::from_points(center, center, reach)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SegmentRenderPath {
    DenseStamp,
    Capsule,
}

fn select_segment_render_path(
    start: Point,
    end: Point,
    stroke_width: u32,
    wide_stroke_threshold: u32,
) -> SegmentRenderPath {
    if stroke_width < wide_stroke_threshold || start == end {
        SegmentRenderPath::DenseStamp
    } else {
        SegmentRenderPath::Capsule
    }
}

#[derive(Debug, Clone)]
struct BrushMask {
    rows: Vec<BrushMaskRow>,
}

#[derive(Debug, Clone, Copy)]
struct BrushMaskRow {
    dy: i32,
    max_dx: i32,
}

impl BrushMask {
    /// Disc of diameter `stroke_width`: offsets with `4 * (dx² + dy²) <= width²`.
    fn for_width(stroke_width: u32) -> Self {
        let width_sq = (stroke_width.max(1) as i64).pow(2);
        let reach = (stroke_width.max(1) as i32) / 2;
        let mut rows = Vec::with_capacity((reach * 2 + 1) as usize);
        for dy in -reach..=reach {
            let mut max_dx = reach;
            while max_dx >= 0 && 4 * ((max_dx as i64).pow(2) + (dy as i64).pow(2)) > width_sq {
                max_dx -= 1;
            }
            if max_dx >= 0 {
                rows.push(BrushMaskRow { dy, max_dx });
            }
        }
        Self { rows }
    }
}

/// Rasterizes round-capped strokes and circle outlines into RGBA buffers.
///
/// Owns the per-width brush mask cache so repeated stamps of the same width
/// reuse their row spans.
#[derive(Debug)]
pub struct Rasterizer {
    masks: HashMap<u32, BrushMask>,
    wide_stroke_threshold: u32,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_WIDE_STROKE_THRESHOLD)
    }
}

impl Rasterizer {
    pub fn new(wide_stroke_threshold: u32) -> Self {
        Self {
            masks: HashMap::new(),
            wide_stroke_threshold: wide_stroke_threshold.max(1),
        }
    }

    pub fn stroke_segment(
        &mut self,
        buffer: &mut RgbaBuffer,
        start: Point,
        end: Point,
        style: StrokeStyle,
    ) -> Option<DirtyRect> {
        let width = style.width.max(1);
        let dirty = segment_dirty_bounds(start, end, width).clamp(buffer.width, buffer.height)?;
        match select_segment_render_path(start, end, width, self.wide_stroke_threshold) {
            SegmentRenderPath::DenseStamp => {
                self.draw_segment_dense_stamped(buffer, start, end, style.color, width)
            }
            SegmentRenderPath::Capsule => {
                draw_segment_capsule(buffer, start, end, style.color, width, dirty)
            }
        }
        Some(dirty)
    }

    pub fn stroke_polyline(
        &mut self,
        buffer: &mut RgbaBuffer,
        points: &[Point],
        style: StrokeStyle,
    ) -> Option<DirtyRect> {
        match points {
            [] => None,
            [only] => self.stroke_segment(buffer, *only, *only, style),
            _ => points
                .windows(2)
                .filter_map(|pair| self.stroke_segment(buffer, pair[0], pair[1], style))
                .reduce(DirtyRect::union),
        }
    }

    /// Outline of the circle centered at `center`, pixels within half the
    /// stroke width of the radius.
    pub fn stroke_circle(
        &mut self,
        buffer: &mut RgbaBuffer,
        center: Point,
        radius: f32,
        style: StrokeStyle,
    ) -> Option<DirtyRect> {
        let half = style.width.max(1) as f32 / 2.0;
        let dirty = circle_dirty_bounds(center, radius, style.width)
            .clamp(buffer.width, buffer.height)?;
        for y in dirty.y..(dirty.y + dirty.height) {
            for x in dirty.x..(dirty.x + dirty.width) {
                let dx = (x - center.0) as f32;
                let dy = (y - center.1) as f32;
                let distance = (dx * dx + dy * dy).sqrt();
                if (distance - radius).abs() <= half {
                    buffer.set_pixel(x as u32, y as u32, style.color);
                }
            }
        }
        Some(dirty)
    }

    fn mask(&mut self, stroke_width: u32) -> &BrushMask {
        self.masks
            .entry(stroke_width)
            .or_insert_with(|| BrushMask::for_width(stroke_width))
    }

    fn draw_segment_dense_stamped(
        &mut self,
        buffer: &mut RgbaBuffer,
        start: Point,
        end: Point,
        color: Color,
        stroke_width: u32,
    ) {
        let mask = self.mask(stroke_width);
        let (mut x0, mut y0) = start;
        let (x1, y1) = end;

        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            stamp(buffer, mask, (x0, y0), color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    #[cfg(test)]
    fn cached_mask_count(&self) -> usize {
        self.masks.len()
    }
}

fn stamp(buffer: &mut RgbaBuffer, mask: &BrushMask, center: Point, color: Color) {
    let max_x = buffer.width as i32 - 1;
    let max_y = buffer.height as i32 - 1;
    for row in &mask.rows {
        let y = center.1 + row.dy;
        if y < 0 || y > max_y {
            continue;
        }
        let x0 = (center.0 - row.max_dx).max(0);
        let x1 = (center.0 + row.max_dx).min(max_x);
        for x in x0..=x1 {
            buffer.set_pixel(x as u32, y as u32, color);
        }
    }
}

fn draw_segment_capsule(
    buffer: &mut RgbaBuffer,
    start: Point,
    end: Point,
    color: Color,
    stroke_width: u32,
    clip: DirtyRect,
) {
    let radius = stroke_width as f32 / 2.0;
    let radius_sq = radius * radius;
    for y in clip.y..(clip.y + clip.height) {
        for x in clip.x..(clip.x + clip.width) {
            if point_segment_distance_sq((x, y), start, end) <= radius_sq {
                buffer.set_pixel(x as u32, y as u32, color);
            }
        }
    }
}

fn point_segment_distance_sq(point: Point, start: Point, end: Point) -> f32 {
    let px = point.0 as f32;
    let py = point.1 as f32;
    let x0 = start.0 as f32;
    let y0 = start.1 as f32;
    let vx = end.0 as f32 - x0;
    let vy = end.1 as f32 - y0;
    let wx = px - x0;
    let wy = py - y0;
    let len_sq = vx * vx + vy * vy;
    if len_sq <= f32::EPSILON {
        return wx * wx + wy * wy;
    }
    let t = ((wx * vx + wy * vy) / len_sq).clamp(0.0, 1.0);
    let dx = px - (x0 + vx * t);
    let dy = py - (y0 + vy * t);
    dx * dx + dy * dy
}

pub fn clear_rect(buffer: &mut RgbaBuffer, rect: DirtyRect, color: Color) {
    let Some(rect) = rect.clamp(buffer.width, buffer.height) else {
        return;
    };
    for y in rect.y..(rect.y + rect.height) {
        for x in rect.x..(rect.x + rect.width) {
            buffer.set_pixel(x as u32, y as u32, color);
        }
    }
}
