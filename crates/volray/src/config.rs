//! Viewer configuration file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use volray_core::{RenderSettings, Result, VolrayError, VolumeConfig};

/// Everything needed to open the viewer, read from JSON.
///
/// Missing fields take their defaults, so `{}` is a valid configuration.
///
/// ```
/// use volray::ViewerConfig;
///
/// let config = ViewerConfig::from_json(r#"{
///     "volume": { "path": "head.raw", "width": 64, "height": 64, "depth": 32, "bit_depth": 8 },
///     "window_width": 640
/// }"#).unwrap();
/// assert_eq!(config.volume.depth, 32);
/// assert_eq!(config.window_height, 720);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub volume: VolumeConfig,
    /// Transfer function preset. The default preset is used when absent or unreadable.
    pub preset: Option<PathBuf>,
    /// Initial render settings.
    pub settings: RenderSettings,
    pub window_width: u32,
    pub window_height: u32,
    pub title: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            volume: VolumeConfig::default(),
            preset: None,
            settings: RenderSettings::default(),
            window_width: 1280,
            window_height: 720,
            title: "volray".to_string(),
        }
    }
}

impl ViewerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| VolrayError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&json)?;
        log::info!("loaded viewer configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks window size and volume description.
    pub fn validate(&self) -> Result<()> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(VolrayError::InvalidConfig(format!(
                "window size must be non-zero, got {}x{}",
                self.window_width, self.window_height
            )));
        }
        self.volume.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volray_core::{CompositingMode, ErrorKind};

    #[test]
    fn test_empty_object_is_default() {
        let config = ViewerConfig::from_json("{}").unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn test_settings_section() {
        let config = ViewerConfig::from_json(
            r#"{ "settings": { "compositing": "MaximumIntensity", "background": [0.1, 0.2, 0.3, 1.0] } }"#,
        )
        .unwrap();
        assert_eq!(config.settings.compositing, CompositingMode::MaximumIntensity);
        assert_eq!(config.settings.background.y, 0.2);
        assert!(!config.settings.fast);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ViewerConfig::from_json(r#"{ "window_width": 0 }"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = ViewerConfig::from_json(r#"{ "volume": { "bit_depth": 7 } }"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        let err = ViewerConfig::from_json("{ not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ViewerConfig {
            preset: Some(PathBuf::from("presets/bone.json")),
            ..ViewerConfig::default()
        };
        assert_eq!(ViewerConfig::from_json(&config.to_json().unwrap()).unwrap(), config);
    }
}
