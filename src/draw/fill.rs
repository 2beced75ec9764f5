use crate::draw::composite::RgbaBuffer;
use crate::draw::model::{Color, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    Filled { pixels: usize },
    OutOfBounds,
    AlreadyFilled,
}

impl FillOutcome {
    pub fn changed_pixels(self) -> usize {
        match self {
            FillOutcome::Filled { pixels } => pixels,
            FillOutcome::OutOfBounds | FillOutcome::AlreadyFilled => 0,
        }
    }
}

/// 4-connected flood fill with an explicit stack.
///
/// A pixel joins the region iff its RGB equals the start pixel's original RGB
/// exactly; alpha is ignored when matching and forced to 255 when filling.
/// Pixels are recolored as they are pushed, so each one enters the stack once.
pub fn flood_fill(buffer: &mut RgbaBuffer, start: Point, color: Color) -> FillOutcome {
    let Some(target) = buffer.get(start.0, start.1) else {
        return FillOutcome::OutOfBounds;
    };
    let replacement = color.with_alpha(255);
    if target.same_rgb(replacement) {
        return FillOutcome::AlreadyFilled;
    }

    let mut stack = vec![start];
    buffer.set_pixel(start.0 as u32, start.1 as u32, replacement);
    let mut filled = 1usize;

    while let Some((x, y)) = stack.pop() {
        for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
            let matches = buffer
                .get(nx, ny)
                .is_some_and(|candidate| candidate.same_rgb(target));
            if matches {
                buffer.set_pixel(nx as u32, ny as u32, replacement);
                stack.push((nx, ny));
                filled += 1;
            }
        }
    }

    FillOutcome::Filled { pixels: filled }
}
