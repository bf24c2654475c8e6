//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! screen_width = 320
//! screen_height = 216
//! frameskip = 1
//! pattern_evict_age = 4
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{EngineError, MAX_SPRITES};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Visible width in pixels. Also the row pitch of frame memory.
    pub screen_width: u16,
    /// Visible height in lines.
    pub screen_height: u16,
    /// Lines per frame including vertical blank.
    pub total_lines: u16,
    /// Off-screen lines below the visible area holding tile and sprite
    /// patterns.
    pub atlas_rows: u16,
    /// Frames to skip between composition cycles.
    pub frameskip: u32,
    /// Initial split line between the two render passes. Half the screen
    /// height when absent.
    pub sync_line: Option<u16>,
    /// Narrowest block move the hardware performs reliably.
    pub min_blit_width: u16,
    /// Number of decoded pattern slots.
    pub pattern_slots: usize,
    /// Frames an unreferenced pattern stays cached before its slot may be
    /// reused.
    pub pattern_evict_age: u32,
    /// Apply the luminance low-pass filter on block moves.
    pub lowpass: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            screen_width: 320,
            screen_height: 216,
            total_lines: 262,
            atlas_rows: 224,
            frameskip: 0,
            sync_line: None,
            min_blit_width: 5,
            pattern_slots: MAX_SPRITES,
            pattern_evict_age: 2,
            lowpass: false,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Checks that the fields are consistent with each other.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.screen_width == 0 || self.screen_height == 0 {
            return Err(EngineError::Config("screen size must be non-zero".into()));
        }
        if self.total_lines <= self.screen_height {
            return Err(EngineError::Config(format!(
                "total_lines ({}) must exceed screen_height ({})",
                self.total_lines, self.screen_height
            )));
        }
        if self.min_blit_width == 0 {
            return Err(EngineError::Config("min_blit_width must be non-zero".into()));
        }
        if self.pattern_slots == 0 {
            return Err(EngineError::Config("pattern_slots must be non-zero".into()));
        }
        if let Some(line) = self.sync_line {
            let (lo, hi) = self.sync_bounds();
            if !(lo..=hi).contains(&line) {
                return Err(EngineError::Config(format!(
                    "sync_line {line} outside [{lo}, {hi}]"
                )));
            }
        }
        Ok(())
    }

    /// Lowest and highest split line the scheduler may use.
    #[must_use]
    pub const fn sync_bounds(&self) -> (u16, u16) {
        (self.screen_height / 3, self.screen_height * 2 / 3)
    }

    #[must_use]
    pub fn initial_sync_line(&self) -> u16 {
        let (lo, hi) = self.sync_bounds();
        self.sync_line
            .unwrap_or(self.screen_height / 2)
            .clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_document() {
        let config = EngineConfig::from_toml_str(
            "screen_width = 256\nscreen_height = 192\nframeskip = 2\nlowpass = true\n",
        )
        .unwrap();
        assert_eq!(config.screen_width, 256);
        assert_eq!(config.screen_height, 192);
        assert_eq!(config.frameskip, 2);
        assert!(config.lowpass);
        assert_eq!(config.min_blit_width, 5);
        assert_eq!(config.initial_sync_line(), 96);
    }

    #[test]
    fn rejects_inconsistent_values() {
        assert!(EngineConfig::from_toml_str("screen_height = 300").is_err());
        assert!(EngineConfig::from_toml_str("sync_line = 10").is_err());
        assert!(EngineConfig::from_toml_str("pattern_slots = 0").is_err());
        assert!(EngineConfig::from_toml_str("screen_width = \"wide\"").is_err());
    }

    #[test]
    fn survives_serialization() {
        let config = EngineConfig {
            frameskip: 3,
            sync_line: Some(100),
            ..EngineConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }
}
