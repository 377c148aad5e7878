//! Shared contract types between the bezelrec engine and its external
//! collaborators (capture acquisition glue, artifact delivery glue, UI).
//!
//! Everything here is plain data: the engine never initiates capture
//! acquisition itself, it receives a [`CaptureConfig`] alongside a ready
//! source handle and hands finished artifacts back as binary blobs with a
//! suggested filename.

use serde::{Deserialize, Serialize};

/// Output container/codec family for one encoder instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// MP4 container, broadcast-compatible H.264 video
    #[default]
    Mp4,
    /// WebM container, alpha-capable VP9 (VP8 fallback) video
    WebmAlpha,
}

impl OutputFormat {
    /// Get the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::WebmAlpha => "webm",
        }
    }

    /// Get display name for this format.
    pub fn display_name(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "MP4",
            OutputFormat::WebmAlpha => "WebM (alpha)",
        }
    }

    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mp4" => Some(OutputFormat::Mp4),
            "webm" | "webm_alpha" | "webm-alpha" => Some(OutputFormat::WebmAlpha),
            _ => None,
        }
    }
}

/// One RGB color triple, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// How the area outside the device frame is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "style", content = "color")]
pub enum BackgroundStyle {
    /// Zero-alpha background (normal clear)
    #[default]
    Transparent,
    /// Zero-alpha background via a destructive clear; kept on the wire for
    /// callers that needed it against renderers with residual alpha
    TransparentForce,
    /// Opaque solid color fill
    Solid(Rgb),
}

impl BackgroundStyle {
    /// Whether this style resolves to a fully transparent canvas.
    pub fn is_transparent(&self) -> bool {
        !matches!(self, BackgroundStyle::Solid(_))
    }
}

/// Capture session mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Continuous 30 fps composition into one or more encoders
    #[default]
    Recording,
    /// Exactly one composited frame, saved as PNG
    Screenshot,
}

/// Immutable per-session capture parameters.
///
/// Dimensions are logical (CSS) pixels; all drawing and encoding happens in
/// physical pixels (logical x `device_pixel_ratio`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Logical content width in pixels
    pub logical_width: u32,
    /// Logical content height in pixels
    pub logical_height: u32,
    /// Scale factor between logical and physical pixels (>= 1)
    pub device_pixel_ratio: f32,
    /// Draw the dynamic-island style notch
    #[serde(default)]
    pub show_notch: bool,
    /// Draw the metal chassis / bezel around the screen
    #[serde(default)]
    pub show_frame: bool,
    /// Background treatment outside the device frame
    #[serde(default)]
    pub background: BackgroundStyle,
    /// Requested output formats; may be empty
    #[serde(default)]
    pub outputs: Vec<OutputFormat>,
    /// Recording or single-shot screenshot
    #[serde(default)]
    pub mode: CaptureMode,
}

impl CaptureConfig {
    /// Device pixel ratio clamped to the supported minimum of 1.0.
    pub fn dpr(&self) -> f32 {
        if self.device_pixel_ratio >= 1.0 {
            self.device_pixel_ratio
        } else {
            1.0
        }
    }
}

/// Coarse lifecycle phase of the one active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session active, ready to start
    #[default]
    Idle,
    /// Acquiring the source and spinning up encoders
    Starting,
    /// Draw cadence running, encoders being fed
    Active,
    /// Stop requested, waiting for encoders to finalize
    Stopping,
}

/// A finalized binary output of one encoder (or the screenshot path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Format this artifact was encoded with; `None` for PNG screenshots
    pub format: Option<OutputFormat>,
    /// Suggested download filename
    pub filename: String,
    /// Finished container bytes
    pub data: Vec<u8>,
}

/// Lifecycle event emitted by the engine for the surrounding UI / command
/// layer. Status strings may be displayed verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SessionEvent {
    /// Human-readable status line ("Recording...", "Idle", ...)
    Status { message: String },
    /// Phase transition
    Phase { phase: SessionPhase },
    /// One encoder (or the screenshot path) finished an artifact
    ArtifactReady { filename: String, bytes: usize },
    /// Unrecoverable failure; the command layer should reset its own
    /// presentation state (badge, timer)
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_extensions() {
        assert_eq!(OutputFormat::Mp4.extension(), "mp4");
        assert_eq!(OutputFormat::WebmAlpha.extension(), "webm");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("MP4"), Some(OutputFormat::Mp4));
        assert_eq!(OutputFormat::parse("webm"), Some(OutputFormat::WebmAlpha));
        assert_eq!(OutputFormat::parse("mov"), None);
    }

    #[test]
    fn test_background_style_transparency() {
        assert!(BackgroundStyle::Transparent.is_transparent());
        assert!(BackgroundStyle::TransparentForce.is_transparent());
        assert!(!BackgroundStyle::Solid(Rgb::new(10, 20, 30)).is_transparent());
    }

    #[test]
    fn test_capture_config_dpr_clamp() {
        let mut config = CaptureConfig {
            logical_width: 390,
            logical_height: 844,
            device_pixel_ratio: 0.5,
            show_notch: true,
            show_frame: true,
            background: BackgroundStyle::default(),
            outputs: vec![OutputFormat::Mp4],
            mode: CaptureMode::Recording,
        };
        assert_eq!(config.dpr(), 1.0);
        config.device_pixel_ratio = 3.0;
        assert_eq!(config.dpr(), 3.0);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = CaptureConfig {
            logical_width: 1080,
            logical_height: 2340,
            device_pixel_ratio: 3.0,
            show_notch: true,
            show_frame: true,
            background: BackgroundStyle::Solid(Rgb::new(255, 0, 128)),
            outputs: vec![OutputFormat::Mp4, OutputFormat::WebmAlpha],
            mode: CaptureMode::Recording,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: CaptureConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.logical_width, 1080);
        assert_eq!(back.outputs, config.outputs);
        assert_eq!(back.background, config.background);
    }

    #[test]
    fn test_session_event_tagging() {
        let event = SessionEvent::Status {
            message: "Recording...".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"status""#));
        assert!(json.contains("Recording..."));
    }
}
