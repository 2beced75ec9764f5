use crate::draw::model::Point;

/// Where the surface is displayed, in the host's pointer coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Maps a pointer position into buffer coordinates, scaling by
/// backing size over displayed size. Degenerate rects map 1:1.
pub fn map_client_point(client: (f32, f32), rect: DisplayRect, backing: (u32, u32)) -> Point {
    let scale = |backing: u32, displayed: f32| {
        if displayed > 0.0 && displayed.is_finite() {
            backing as f32 / displayed
        } else {
            1.0
        }
    };
    let x = (client.0 - rect.left) * scale(backing.0, rect.width);
    let y = (client.1 - rect.top) * scale(backing.1, rect.height);
    (x.floor() as i32, y.floor() as i32)
}

/// Repeated samples at the same position add nothing to a path.
pub fn should_append_point(last: Option<Point>, next: Point) -> bool {
    last != Some(next)
}
