use crate::draw::fade::DEFAULT_FADE_WASH_ALPHA;
use crate::draw::history::DEFAULT_MAX_HISTORY;
use crate::draw::model::{Color, StrokeStyle};
use crate::stream::audio::SilentAudioSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MAX_DIMENSION: u32 = 8192;
pub const MAX_FRAME_RATE: u32 = 240;
pub const MAX_BRUSH_WIDTH: u32 = 256;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurfaceSettings {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// `#RRGGBB`.
    #[serde(default = "default_stroke_color")]
    pub stroke_color: String,
    #[serde(default = "default_brush_width")]
    pub brush_width: u32,
    #[serde(default)]
    pub fading_enabled: bool,
    #[serde(default = "default_fade_wash_alpha")]
    pub fade_wash_alpha: u8,
    #[serde(default = "default_keep_alive_enabled")]
    pub keep_alive_enabled: bool,
    #[serde(default = "default_stabilize_min_ms")]
    pub stabilize_min_ms: u64,
    #[serde(default)]
    pub audio: SilentAudioSettings,
}

fn default_width() -> u32 {
    512
}

fn default_height() -> u32 {
    512
}

fn default_frame_rate() -> u32 {
    30
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

fn default_stroke_color() -> String {
    Color::BLACK.to_hex()
}

fn default_brush_width() -> u32 {
    5
}

fn default_fade_wash_alpha() -> u8 {
    DEFAULT_FADE_WASH_ALPHA
}

fn default_keep_alive_enabled() -> bool {
    true
}

fn default_stabilize_min_ms() -> u64 {
    100
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            frame_rate: default_frame_rate(),
            max_history: default_max_history(),
            stroke_color: default_stroke_color(),
            brush_width: default_brush_width(),
            fading_enabled: false,
            fade_wash_alpha: default_fade_wash_alpha(),
            keep_alive_enabled: default_keep_alive_enabled(),
            stabilize_min_ms: default_stabilize_min_ms(),
            audio: SilentAudioSettings::default(),
        }
    }
}

impl SurfaceSettings {
    /// Clamps every field into a usable range; unparseable colors fall back to black.
    pub fn sanitize(&mut self) {
        self.width = self.width.clamp(1, MAX_DIMENSION);
        self.height = self.height.clamp(1, MAX_DIMENSION);
        self.frame_rate = self.frame_rate.clamp(1, MAX_FRAME_RATE);
        self.max_history = self.max_history.max(1);
        self.brush_width = self.brush_width.clamp(1, MAX_BRUSH_WIDTH);
        match Color::from_hex(&self.stroke_color) {
            Ok(color) => self.stroke_color = color.to_hex(),
            Err(err) => {
                tracing::warn!(error = %err, "invalid stroke color in settings, using black");
                self.stroke_color = default_stroke_color();
            }
        }
        self.audio.sanitize();
    }

    pub fn sanitized(mut self) -> Self {
        self.sanitize();
        self
    }

    pub fn stroke_style(&self) -> StrokeStyle {
        StrokeStyle {
            width: self.brush_width.max(1),
            color: Color::from_hex(&self.stroke_color).unwrap_or(Color::BLACK),
        }
    }

    pub fn stabilize_min(&self) -> Duration {
        Duration::from_millis(self.stabilize_min_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::SurfaceSettings;
    use crate::draw::model::Color;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: SurfaceSettings =
            serde_json::from_str(r#"{ "width": 640, "fading_enabled": true }"#).unwrap();
        assert_eq!(settings.width, 640);
        assert_eq!(settings.height, 512);
        assert_eq!(settings.frame_rate, 30);
        assert_eq!(settings.max_history, 20);
        assert!(settings.fading_enabled);
        assert!(settings.keep_alive_enabled);
        assert_eq!(settings.audio.sample_rate, 48_000);
    }

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let mut settings = SurfaceSettings {
            width: 0,
            frame_rate: 0,
            max_history: 0,
            brush_width: 0,
            stroke_color: "not a color".into(),
            ..SurfaceSettings::default()
        };
        settings.sanitize();

        assert_eq!(settings.width, 1);
        assert_eq!(settings.frame_rate, 1);
        assert_eq!(settings.max_history, 1);
        assert_eq!(settings.brush_width, 1);
        assert_eq!(settings.stroke_color, "#000000");
    }

    #[test]
    fn stroke_style_parses_configured_color() {
        let settings = SurfaceSettings {
            stroke_color: "#ff8000".into(),
            brush_width: 9,
            ..SurfaceSettings::default()
        }
        .sanitized();
        assert_eq!(settings.stroke_color, "#FF8000");
        let style = settings.stroke_style();
        assert_eq!(style.width, 9);
        assert_eq!(style.color, Color::rgb(255, 128, 0));
    }
}
