use crate::draw::model::Color;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaBuffer {
    pub fn new(width: u32, height: u32, fill: Color) -> Self {
        let mut pixels = vec![0u8; (width as usize) * (height as usize) * 4];
        for chunk in pixels.chunks_exact_mut(4) {
            chunk.copy_from_slice(&fill.to_rgba_array());
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn transparent(width: u32, height: u32) -> Self {
        Self::new(width, height, Color::TRANSPARENT)
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        assert_eq!(pixels.len(), (width as usize) * (height as usize) * 4);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + x as usize) * 4
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let idx = self.index(x, y);
        Color::rgba(
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        )
    }

    pub fn get(&self, x: i32, y: i32) -> Option<Color> {
        self.contains(x, y).then(|| self.pixel(x as u32, y as u32))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        let idx = self.index(x, y);
        self.pixels[idx..idx + 4].copy_from_slice(&color.to_rgba_array());
    }

    pub fn fill(&mut self, color: Color) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&color.to_rgba_array());
        }
    }

    /// Source-over blend of `color` into a single pixel.
    pub fn blend_pixel(&mut self, x: u32, y: u32, color: Color) {
        let blended = blend_pixel(self.pixel(x, y), color);
        self.set_pixel(x, y, blended);
    }

    /// Source-over blend of `color` over every pixel.
    pub fn wash(&mut self, color: Color) {
        for px in self.pixels.chunks_exact_mut(4) {
            let blended = blend_pixel(Color::from_rgba_array([px[0], px[1], px[2], px[3]]), color);
            px.copy_from_slice(&blended.to_rgba_array());
        }
    }

    pub fn is_opaque(&self) -> bool {
        self.pixels.chunks_exact(4).all(|px| px[3] == 255)
    }

    pub fn is_uniform(&self, color: Color) -> bool {
        let expected = color.to_rgba_array();
        self.pixels.chunks_exact(4).all(|px| px == expected)
    }
}

/// Stacks `overlay` on top of `base`; used to present an in-flight shape preview.
pub fn composite_overlay(base: &RgbaBuffer, overlay: &RgbaBuffer) -> RgbaBuffer {
    let mut output = base.clone();
    if base.size() != overlay.size() {
        tracing::warn!(base = ?base.size(), overlay = ?overlay.size(), "overlay size mismatch");
        return output;
    }
    blend_in_place(&mut output, overlay);
    output
}

fn blend_in_place(base: &mut RgbaBuffer, top: &RgbaBuffer) {
    for (dst, src) in base
        .pixels
        .chunks_exact_mut(4)
        .zip(top.pixels.chunks_exact(4))
    {
        if src[3] == 0 {
            continue;
        }
        let blended = blend_pixel(
            Color::from_rgba_array([dst[0], dst[1], dst[2], dst[3]]),
            Color::from_rgba_array([src[0], src[1], src[2], src[3]]),
        );
        dst.copy_from_slice(&blended.to_rgba_array());
    }
}

pub fn blend_pixel(bottom: Color, top: Color) -> Color {
    let sa = top.a as f32 / 255.0;
    let da = bottom.a as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);

    if out_a <= f32::EPSILON {
        return Color::TRANSPARENT;
    }

    let blend = |s: u8, d: u8| -> u8 {
        (((s as f32 * sa) + (d as f32 * da * (1.0 - sa))) / out_a)
            .round()
            .clamp(0.0, 255.0) as u8
    };

    Color::rgba(
        blend(top.r, bottom.r),
        blend(top.g, bottom.g),
        blend(top.b, bottom.b),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    )
}
