//! Sequence capture configuration
//!
//! ## Responsibilities
//!
//! - Pixel format / frame size selectors (numeric code or symbolic name)
//! - The optional camera-control overlay
//! - Query-string parsing and validation for both trigger endpoints
//!
//! Selector parsing never fails: an absent or unrecognized value falls back
//! to the documented baseline (JPEG / UXGA). Overlay entries are applied only
//! when present, strictly after pixformat and framesize.

use crate::camera::Camera;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Longest accepted sequence name
pub const MAX_SEQUENCE_NAME_LEN: usize = 63;

/// Default wait between peer preparation and quiescence, milliseconds
pub const DEFAULT_SLAVE_PREPARE_DELAY_MS: u64 = 200;

/// Sensor pixel format. Codes follow the sensor driver's control catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PixelFormat {
    Rgb565 = 0,
    Yuv422 = 1,
    Grayscale = 3,
    Jpeg = 4,
    Rgb888 = 5,
    Raw = 6,
}

impl Default for PixelFormat {
    fn default() -> Self {
        PixelFormat::Jpeg
    }
}

impl PixelFormat {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => PixelFormat::Rgb565,
            1 => PixelFormat::Yuv422,
            3 => PixelFormat::Grayscale,
            4 => PixelFormat::Jpeg,
            5 => PixelFormat::Rgb888,
            6 => PixelFormat::Raw,
            _ => PixelFormat::default(),
        }
    }

    /// Parse a numeric code or case-insensitive symbolic name.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return PixelFormat::default();
        }
        if s.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return s
                .parse::<i32>()
                .map(PixelFormat::from_code)
                .unwrap_or_default();
        }
        match s.to_ascii_lowercase().as_str() {
            "jpeg" => PixelFormat::Jpeg,
            "rgb565" => PixelFormat::Rgb565,
            "yuv422" => PixelFormat::Yuv422,
            "grayscale" => PixelFormat::Grayscale,
            "rgb888" => PixelFormat::Rgb888,
            "raw" => PixelFormat::Raw,
            _ => PixelFormat::default(),
        }
    }
}

/// Sensor frame size ladder. The label doubles as the filename suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum FrameSize {
    Qqvga = 1,
    Qcif = 2,
    Hqvga = 3,
    Sq240x240 = 4,
    Qvga = 5,
    Cif = 6,
    Hvga = 7,
    Vga = 8,
    Svga = 9,
    Xga = 10,
    Hd = 11,
    Sxga = 12,
    Uxga = 13,
    Fhd = 14,
    PHd = 15,
    P3mp = 16,
    Qxga = 17,
    Qhd = 18,
    Wqxga = 19,
    PFhd = 20,
    Qsxga = 21,
}

impl Default for FrameSize {
    fn default() -> Self {
        FrameSize::Uxga
    }
}

impl FrameSize {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// Lowercase label used in persisted frame filenames.
    pub fn label(&self) -> &'static str {
        match self {
            FrameSize::Qqvga => "qqvga",
            FrameSize::Qcif => "qcif",
            FrameSize::Hqvga => "hqvga",
            FrameSize::Sq240x240 => "240x240",
            FrameSize::Qvga => "qvga",
            FrameSize::Cif => "cif",
            FrameSize::Hvga => "hvga",
            FrameSize::Vga => "vga",
            FrameSize::Svga => "svga",
            FrameSize::Xga => "xga",
            FrameSize::Hd => "hd",
            FrameSize::Sxga => "sxga",
            FrameSize::Uxga => "uxga",
            FrameSize::Fhd => "fhd",
            FrameSize::PHd => "p_hd",
            FrameSize::P3mp => "p_3mp",
            FrameSize::Qxga => "qxga",
            FrameSize::Qhd => "qhd",
            FrameSize::Wqxga => "wqxga",
            FrameSize::PFhd => "p_fhd",
            FrameSize::Qsxga => "qsxga",
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => FrameSize::Qqvga,
            2 => FrameSize::Qcif,
            3 => FrameSize::Hqvga,
            4 => FrameSize::Sq240x240,
            5 => FrameSize::Qvga,
            6 => FrameSize::Cif,
            7 => FrameSize::Hvga,
            8 => FrameSize::Vga,
            9 => FrameSize::Svga,
            10 => FrameSize::Xga,
            11 => FrameSize::Hd,
            12 => FrameSize::Sxga,
            13 => FrameSize::Uxga,
            14 => FrameSize::Fhd,
            15 => FrameSize::PHd,
            16 => FrameSize::P3mp,
            17 => FrameSize::Qxga,
            18 => FrameSize::Qhd,
            19 => FrameSize::Wqxga,
            20 => FrameSize::PFhd,
            21 => FrameSize::Qsxga,
            _ => FrameSize::default(),
        }
    }

    /// Parse a numeric code or case-insensitive symbolic name.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return FrameSize::default();
        }
        if s.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            // "240x240" starts with a digit but is a label, not a code
            if let Ok(code) = s.parse::<i32>() {
                return FrameSize::from_code(code);
            }
        }
        match s.to_ascii_lowercase().as_str() {
            "qqvga" => FrameSize::Qqvga,
            "qcif" => FrameSize::Qcif,
            "hqvga" => FrameSize::Hqvga,
            "240x240" => FrameSize::Sq240x240,
            "qvga" => FrameSize::Qvga,
            "cif" => FrameSize::Cif,
            "hvga" => FrameSize::Hvga,
            "vga" => FrameSize::Vga,
            "svga" => FrameSize::Svga,
            "xga" => FrameSize::Xga,
            "hd" => FrameSize::Hd,
            "sxga" => FrameSize::Sxga,
            "uxga" => FrameSize::Uxga,
            "fhd" => FrameSize::Fhd,
            "p_hd" => FrameSize::PHd,
            "p_3mp" => FrameSize::P3mp,
            "qxga" => FrameSize::Qxga,
            "qhd" => FrameSize::Qhd,
            "wqxga" => FrameSize::Wqxga,
            "p_fhd" => FrameSize::PFhd,
            "qsxga" => FrameSize::Qsxga,
            _ => FrameSize::default(),
        }
    }
}

/// Names of the optional overlay controls, in application order.
const OVERLAY_KEYS: [&str; 24] = [
    "quality",
    "brightness",
    "contrast",
    "saturation",
    "sharpness",
    "special_effect",
    "wb_mode",
    "aec",
    "aec2",
    "aec_value",
    "ae_level",
    "agc",
    "agc_gain",
    "gainceiling",
    "awb",
    "awb_gain",
    "dcw",
    "bpc",
    "wpc",
    "hmirror",
    "vflip",
    "lenc",
    "raw_gma",
    "colorbar",
];

/// Optional camera controls; only present entries are ever applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlOverlay {
    values: Vec<(&'static str, i32)>,
}

impl ControlOverlay {
    /// Collect present overlay keys from a parsed query string. Malformed
    /// values are treated as absent.
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let mut values = Vec::new();
        for key in OVERLAY_KEYS {
            if let Some(v) = params.get(key).and_then(|v| v.parse::<i32>().ok()) {
                values.push((key, v));
            }
        }
        Self { values }
    }

    /// Present `(name, value)` pairs in application order.
    pub fn entries(&self) -> &[(&'static str, i32)] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[cfg(test)]
    pub fn with(mut self, name: &'static str, value: i32) -> Self {
        self.values.push((name, value));
        self
    }
}

/// Immutable per-session capture configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceCaptureConfig {
    pub pixel_format: PixelFormat,
    pub frame_size: FrameSize,
    pub sequence_name: String,
    pub frame_count: u32,
    pub slave_prepare_delay_ms: u64,
    pub inter_frame_delay_ms: u64,
    pub overlay: ControlOverlay,
}

impl SequenceCaptureConfig {
    /// Apply this configuration to the camera.
    ///
    /// pixformat and framesize are set unconditionally and must succeed;
    /// overlay entries follow, and individual overlay failures are logged
    /// but do not abort.
    pub async fn apply_to(&self, camera: &dyn Camera) -> Result<()> {
        camera.ctrl_set("pixformat", self.pixel_format.code()).await?;
        camera.ctrl_set("framesize", self.frame_size.code()).await?;

        for (name, value) in self.overlay.entries() {
            if let Err(e) = camera.ctrl_set(name, *value).await {
                tracing::warn!(control = name, value, error = %e, "overlay control rejected");
            }
        }

        Ok(())
    }
}

fn require_sequence_name(params: &HashMap<String, String>) -> Result<String> {
    let name = params
        .get("cap_seq_name")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Validation("Missing cap_seq_name".to_string()))?;

    if name.len() > MAX_SEQUENCE_NAME_LEN {
        return Err(Error::Validation(format!(
            "cap_seq_name longer than {} characters",
            MAX_SEQUENCE_NAME_LEN
        )));
    }
    // Must stay a single path segment under captures/
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(Error::Validation(
            "cap_seq_name must not contain path separators".to_string(),
        ));
    }
    Ok(name)
}

fn require_frame_count(params: &HashMap<String, String>) -> Result<u32> {
    params
        .get("cap_amount")
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| Error::Validation("Missing cap_amount".to_string()))
}

fn optional_delay(params: &HashMap<String, String>, key: &str, default: u64) -> u64 {
    params
        .get(key)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

/// Parse the master trigger query (`/seq_cap`).
///
/// Returns the config plus the explicit `slave_host` override, if any.
pub fn parse_master_query(
    params: &HashMap<String, String>,
) -> Result<(SequenceCaptureConfig, Option<String>)> {
    let sequence_name = require_sequence_name(params)?;
    let frame_count = require_frame_count(params)?;

    let pixel_format = params
        .get("pixformat")
        .map(|s| PixelFormat::parse(s))
        .unwrap_or_default();
    // Size may arrive as 'size' or 'framesize'; 'size' wins.
    let frame_size = params
        .get("size")
        .or_else(|| params.get("framesize"))
        .map(|s| FrameSize::parse(s))
        .unwrap_or_default();

    let cfg = SequenceCaptureConfig {
        pixel_format,
        frame_size,
        sequence_name,
        frame_count,
        slave_prepare_delay_ms: optional_delay(
            params,
            "slave_prepare_delay_ms",
            DEFAULT_SLAVE_PREPARE_DELAY_MS,
        ),
        inter_frame_delay_ms: optional_delay(params, "inter_frame_delay_ms", 0),
        overlay: ControlOverlay::from_query(params),
    };

    let slave_host = params
        .get("slave_host")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok((cfg, slave_host))
}

/// Parse the slave arm query (`/cap_seq_init`).
///
/// Selectors are numeric-only on this path; the overlay is never forwarded
/// by the master, so the slave runs with driver defaults.
pub fn parse_slave_query(params: &HashMap<String, String>) -> Result<SequenceCaptureConfig> {
    let sequence_name = require_sequence_name(params)?;
    let frame_count = require_frame_count(params)?;

    let pixel_format = params
        .get("pixformat")
        .and_then(|v| v.parse::<i32>().ok())
        .map(PixelFormat::from_code)
        .unwrap_or_default();
    let frame_size = params
        .get("framesize")
        .and_then(|v| v.parse::<i32>().ok())
        .map(FrameSize::from_code)
        .unwrap_or_default();

    Ok(SequenceCaptureConfig {
        pixel_format,
        frame_size,
        sequence_name,
        frame_count,
        slave_prepare_delay_ms: DEFAULT_SLAVE_PREPARE_DELAY_MS,
        inter_frame_delay_ms: 0,
        overlay: ControlOverlay::default(),
    })
}
