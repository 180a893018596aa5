//! Transfer function presets and their JSON file format.
//!
//! ```json
//! {
//!   "name": "default",
//!   "lut_points": [{ "pos": 0.0, "color": "#000000" }, { "pos": 1.0, "color": "#ffffff" }],
//!   "alpha_points": [{ "pos": 0.0, "alpha": 1.0 }, { "pos": 1.0, "alpha": 0.0 }],
//!   "background": "#000000"
//! }
//! ```
//!
//! Points may be listed in any order. `background` is optional.

use std::path::Path;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VolrayError};
use crate::transfer_function::Curve;

/// A named bundle of curves and a background color.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub color: Curve<Vec3>,
    pub opacity: Curve<f32>,
    pub background: Vec4,
}

impl Default for Preset {
    /// Grayscale ramp, opaque up to intensity 0.4 and transparent above it.
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            color: Curve::new(Vec3::ZERO, Vec3::ONE),
            opacity: Curve::from_points([(0.0, 1.0), (0.4, 1.0), (0.401, 0.0), (1.0, 0.0)])
                .unwrap_or_else(|_| Curve::new(1.0, 0.0)),
            background: Vec4::new(0.0, 0.0, 0.0, 1.0),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PresetFile {
    name: String,
    lut_points: Vec<ColorPointFile>,
    alpha_points: Vec<AlphaPointFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    background: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ColorPointFile {
    pos: f32,
    color: String,
}

#[derive(Serialize, Deserialize)]
struct AlphaPointFile {
    pos: f32,
    alpha: f32,
}

impl Preset {
    /// Parses a preset from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: PresetFile = serde_json::from_str(json)?;

        let color_points = file
            .lut_points
            .iter()
            .map(|p| Ok((p.pos, parse_hex_color(&p.color)?.truncate())))
            .collect::<Result<Vec<_>>>()?;
        let opacity_points = file
            .alpha_points
            .iter()
            .map(|p| (p.pos, p.alpha.clamp(0.0, 1.0)));

        let background = match &file.background {
            Some(hex) => parse_hex_color(hex)?,
            None => Vec4::new(0.0, 0.0, 0.0, 1.0),
        };

        Ok(Self {
            name: file.name,
            color: Curve::from_points(color_points)?,
            opacity: Curve::from_points(opacity_points)?,
            background,
        })
    }

    /// Serializes the preset as pretty-printed JSON, points in curve order.
    pub fn to_json(&self) -> Result<String> {
        let file = PresetFile {
            name: self.name.clone(),
            lut_points: self
                .color
                .points()
                .iter()
                .map(|p| ColorPointFile {
                    pos: p.x,
                    color: format_hex_color(p.value.extend(1.0)),
                })
                .collect(),
            alpha_points: self
                .opacity
                .points()
                .iter()
                .map(|p| AlphaPointFile {
                    pos: p.x,
                    alpha: p.value,
                })
                .collect(),
            background: Some(format_hex_color(self.background)),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Loads a preset file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| VolrayError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let preset = Self::from_json(&json)?;
        log::info!("loaded preset '{}' from {}", preset.name, path.display());
        Ok(preset)
    }

    /// Loads a preset file, falling back to [`Preset::default`] on any error.
    #[must_use]
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|e| {
            log::warn!(
                "could not load preset {}: {e}; using default preset",
                path.display()
            );
            Self::default()
        })
    }

    /// Writes the preset to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }
}

/// Parses `#rrggbb` or `#rrggbbaa` into a color with components in [0, 1].
pub fn parse_hex_color(s: &str) -> Result<Vec4> {
    let malformed = || VolrayError::MalformedPreset(format!("invalid color '{s}'"));
    let hex = s.strip_prefix('#').ok_or_else(malformed)?;
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return Err(malformed());
    }

    let mut channels = [0.0, 0.0, 0.0, 1.0];
    for (slot, i) in channels.iter_mut().zip((0..hex.len()).step_by(2)) {
        let byte = u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| malformed())?;
        *slot = f32::from(byte) / 255.0;
    }
    Ok(Vec4::from_array(channels))
}

/// Formats a color as `#rrggbb`, or `#rrggbbaa` when it is not opaque.
#[must_use]
pub fn format_hex_color(color: Vec4) -> String {
    // Clamped to [0, 255] before the cast
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let [r, g, b, a] = color
        .to_array()
        .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
    if a == u8::MAX {
        format!("#{r:02x}{g:02x}{b:02x}")
    } else {
        format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}
