use crate::draw::composite::RgbaBuffer;
use anyhow::{anyhow, Context, Result};
use chrono::Local;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use std::fs;
use std::path::{Path, PathBuf};

pub const EXPORT_SUBDIR: &str = "canvas_exports";
pub const EXPORT_SUFFIX: &str = "canvas";

pub fn exe_relative_output_folder_from_path(exe_path: &Path) -> Result<PathBuf> {
    let parent = exe_path
        .parent()
        .ok_or_else(|| anyhow!("executable path has no parent: {}", exe_path.display()))?;
    Ok(parent.join(EXPORT_SUBDIR))
}

pub fn ensure_output_folder() -> Result<PathBuf> {
    let exe_path = std::env::current_exe().context("resolve current executable")?;
    let output = exe_relative_output_folder_from_path(&exe_path)?;
    fs::create_dir_all(&output)
        .with_context(|| format!("create export folder {}", output.display()))?;
    Ok(output)
}

pub fn timestamped_stem(now: chrono::DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

pub fn build_filename(stem: &str, suffix: &str) -> String {
    format!("{}_{}.png", stem, suffix)
}

/// Writes `buffer` as `<timestamp>_canvas.png` into `output_dir`.
pub fn export_png(
    buffer: &RgbaBuffer,
    output_dir: &Path,
    now: chrono::DateTime<Local>,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("create export folder {}", output_dir.display()))?;
    let path = output_dir.join(build_filename(&timestamped_stem(now), EXPORT_SUFFIX));

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(&buffer.pixels, buffer.width, buffer.height, ColorType::Rgba8)
        .context("encode canvas png")?;
    fs::write(&path, png).with_context(|| format!("write canvas png {}", path.display()))?;

    tracing::info!(path = %path.display(), width = buffer.width, height = buffer.height, "canvas exported");
    Ok(path)
}
