//! Engine configuration.
//!
//! Configuration is read from an `ember.toml` next to the binary. A missing
//! file is not an error; every field has a default so the engine can run
//! without any configuration at all.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Window settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Initial window width in physical pixels.
    pub width: u32,
    /// Initial window height in physical pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Ember".to_string(),
        }
    }
}

/// Presentation pacing preference.
///
/// `LowLatency` asks for a mailbox-style present mode when the surface offers
/// one; `Vsync` sticks with the always-available FIFO mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentPreference {
    #[default]
    LowLatency,
    Vsync,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    /// Present mode preference, subject to what the surface supports.
    pub present: PresentPreference,
    /// How many frames the CPU may record ahead of the GPU.
    pub frames_in_flight: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            present: PresentPreference::default(),
            frames_in_flight: 2,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            let config: EngineConfig = toml::from_str(&text)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
            info!("Loaded configuration from {}", path.display());
            config
        } else {
            debug!("No config file at {}, using defaults", path.display());
            EngineConfig::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that the rest of the engine relies on.
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::Config(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        // More slots than this just burns sync objects without hiding latency.
        if self.frames_in_flight > 8 {
            return Err(Error::Config(format!(
                "frames_in_flight of {} is unreasonable (max 8)",
                self.frames_in_flight
            )));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config("window size must be nonzero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frames_in_flight, 2);
    }

    #[test]
    fn parses_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            frames_in_flight = 3

            [window]
            title = "demo"
            "#,
        )
        .unwrap();
        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.window.title, "demo");
        // Unspecified fields keep their defaults.
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.present, PresentPreference::LowLatency);
    }

    #[test]
    fn parses_present_preference() {
        let config: EngineConfig = toml::from_str(r#"present = "vsync""#).unwrap();
        assert_eq!(config.present, PresentPreference::Vsync);
    }

    #[test]
    fn rejects_zero_frames_in_flight() {
        let config: EngineConfig = toml::from_str("frames_in_flight = 0").unwrap();
        assert!(config.validate().is_err());
    }
}
