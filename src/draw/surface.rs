use crate::draw::composite::RgbaBuffer;
use crate::draw::model::Color;

/// The authoritative raster being edited.
///
/// Every mutation goes through this type so the revision counter advances;
/// the capture pipeline compares revisions to decide whether the bitmap
/// changed since its last sample.
#[derive(Debug, Clone)]
pub struct Surface {
    buffer: RgbaBuffer,
    revision: u64,
}

impl Surface {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        Self {
            buffer: RgbaBuffer::new(width.max(1), height.max(1), background),
            revision: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width
    }

    pub fn height(&self) -> u32 {
        self.buffer.height
    }

    pub fn size(&self) -> (u32, u32) {
        self.buffer.size()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn buffer(&self) -> &RgbaBuffer {
        &self.buffer
    }

    pub fn edit<R>(&mut self, f: impl FnOnce(&mut RgbaBuffer) -> R) -> R {
        self.revision = self.revision.wrapping_add(1);
        f(&mut self.buffer)
    }

    pub fn fill(&mut self, color: Color) {
        self.edit(|buffer| buffer.fill(color));
    }

    /// Replaces the whole content (clear-then-draw). Mismatched sizes are ignored.
    pub fn replace(&mut self, content: RgbaBuffer) -> bool {
        if content.size() != self.buffer.size() {
            tracing::warn!(
                expected = ?self.buffer.size(),
                actual = ?content.size(),
                "surface replace skipped: size mismatch"
            );
            return false;
        }
        self.edit(|buffer| *buffer = content);
        true
    }

    /// Reads the 1×1 region at `(x, y)`.
    pub fn probe(&self, x: u32, y: u32) -> Option<Color> {
        self.buffer.get(x as i32, y as i32)
    }
}
