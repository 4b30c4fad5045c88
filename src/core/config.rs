/// Engine configuration, loadable from RON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::reveal::RevealMarkup;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("reveal rate must be a positive number of characters per second, got {0}")]
    InvalidRevealRate(f32),
    #[error("auto-advance delay must be a non-negative number of seconds, got {0}")]
    InvalidAutoAdvance(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
    /// Reveal speed in characters per second.
    pub chars_per_second: f32,
    /// Seconds a fully shown plain line waits before advancing on its own.
    /// `None` waits for a confirm.
    pub auto_advance: Option<f32>,
    pub markup: RevealMarkup,
}

impl DialogConfig {
    pub const DEFAULT_CHARS_PER_SECOND: f32 = 30.0;

    pub fn load_from_ron(path: &Path) -> Result<DialogConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<DialogConfig, ConfigError> {
        let config: DialogConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.chars_per_second.is_finite() || self.chars_per_second <= 0.0 {
            return Err(ConfigError::InvalidRevealRate(self.chars_per_second));
        }
        if let Some(delay) = self.auto_advance {
            if !delay.is_finite() || delay < 0.0 {
                return Err(ConfigError::InvalidAutoAdvance(delay));
            }
        }
        Ok(())
    }

    pub fn auto_advance_delay(&self) -> Option<Duration> {
        self.auto_advance
            .and_then(|secs| Duration::try_from_secs_f32(secs).ok())
    }
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            chars_per_second: Self::DEFAULT_CHARS_PER_SECOND,
            auto_advance: None,
            markup: RevealMarkup::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DialogConfig::default();
        assert_eq!(config.chars_per_second, 30.0);
        assert_eq!(config.auto_advance_delay(), None);
        assert_eq!(config.markup.hidden_open, "<color=#ffffff00>");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let config = DialogConfig::parse_ron(
            r#"#![enable(implicit_some)]
            (chars_per_second: 45.0, auto_advance: 1.5)"#,
        )
        .unwrap();
        assert_eq!(config.chars_per_second, 45.0);
        assert_eq!(config.auto_advance_delay(), Some(Duration::from_millis(1500)));
        assert_eq!(config.markup, RevealMarkup::default());
    }

    #[test]
    fn rejects_bad_rate() {
        let err = DialogConfig::parse_ron("(chars_per_second: 0.0)").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRevealRate(r) if r == 0.0));

        let config = DialogConfig {
            chars_per_second: f32::NAN,
            ..DialogConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_auto_advance() {
        let config = DialogConfig {
            auto_advance: Some(-1.0),
            ..DialogConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAutoAdvance(_))
        ));
    }
}
