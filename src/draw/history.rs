use crate::draw::composite::RgbaBuffer;
use anyhow::{bail, Context, Result};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, ImageFormat};
use std::collections::VecDeque;
use std::sync::Arc;

pub const DEFAULT_MAX_HISTORY: usize = 20;

/// Immutable PNG-encoded copy of the whole surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    width: u32,
    height: u32,
    png: Arc<[u8]>,
}

impl Snapshot {
    pub fn encode(buffer: &RgbaBuffer) -> Result<Self> {
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(&buffer.pixels, buffer.width, buffer.height, ColorType::Rgba8)
            .with_context(|| format!("encode {}x{} snapshot", buffer.width, buffer.height))?;
        Ok(Self {
            width: buffer.width,
            height: buffer.height,
            png: png.into(),
        })
    }

    pub fn decode(&self) -> Result<RgbaBuffer> {
        let image = image::load_from_memory_with_format(&self.png, ImageFormat::Png)
            .context("decode snapshot png")?
            .to_rgba8();
        if image.dimensions() != (self.width, self.height) {
            bail!(
                "snapshot decoded to {:?}, expected {:?}",
                image.dimensions(),
                (self.width, self.height)
            );
        }
        Ok(RgbaBuffer::from_pixels(
            self.width,
            self.height,
            image.into_raw(),
        ))
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn encoded_len(&self) -> usize {
        self.png.len()
    }
}

/// Bounded undo log of surface snapshots with a cursor at the entry that
/// matches the last committed surface state.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: VecDeque<Snapshot>,
    cursor: usize,
    max_size: usize,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryLog {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            entries: VecDeque::with_capacity(max_size),
            cursor: 0,
            max_size,
        }
    }

    /// Drops entries after the cursor, appends, and evicts from the front
    /// when over capacity. Returns the number of evicted entries.
    pub fn push(&mut self, snapshot: Snapshot) -> usize {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push_back(snapshot);

        let mut evicted = 0;
        while self.entries.len() > self.max_size {
            self.entries.pop_front();
            evicted += 1;
        }
        self.cursor = self.entries.len() - 1;
        evicted
    }

    /// Moves the cursor one entry back and returns the entry now current.
    pub fn step_back(&mut self) -> Option<Snapshot> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    /// Undoes a `step_back` whose snapshot could not be applied.
    pub fn revert_step(&mut self) {
        if self.cursor + 1 < self.entries.len() {
            self.cursor += 1;
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.entries.get(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn encoded_bytes(&self) -> usize {
        self.entries.iter().map(Snapshot::encoded_len).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}
