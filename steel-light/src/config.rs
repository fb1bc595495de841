//! Light engine configuration, loaded from JSON5 like the rest of Steel's config.

use serde::Deserialize;
use std::{fs, num::NonZeroUsize, path::Path};
use thiserror::Error;

const DEFAULT_CONFIG: &str = include_str!("../../package-content/light_config.json5");

const MAX_TASK_BATCH_SIZE: usize = 1_000_000;
const MIN_UPDATE_BUDGET: usize = 64;

/// Errors raised while loading a [`LightEngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read light config: {0}")]
    Io(#[from] std::io::Error),
    /// The document is not valid JSON5 or does not match the expected shape.
    #[error("failed to parse light config: {0}")]
    Parse(#[from] serde_json5::Error),
    /// The values parsed but are out of range.
    #[error("invalid light config: {0}")]
    Invalid(&'static str),
}

/// Settings for a level's light engines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LightEngineConfig {
    /// Whether the level has a block light engine.
    pub block_light: bool,
    /// Whether the level has a sky light engine.
    pub sky_light: bool,
    /// Queued tasks that make the threaded engine run an update eagerly.
    pub task_batch_size: NonZeroUsize,
    /// Light updates processed per threaded run, `None` for no limit.
    pub update_budget: Option<NonZeroUsize>,
}

impl LightEngineConfig {
    /// Parses and validates a JSON5 document.
    pub fn from_json5(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json5::from_str(source)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Reads the config at `path`, writing the default document there first if it is missing.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, DEFAULT_CONFIG)?;
        }
        Self::from_json5(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.task_batch_size.get() > MAX_TASK_BATCH_SIZE {
            return Err("Task batch size must be at most 1000000");
        }
        if let Some(budget) = self.update_budget
            && budget.get() < MIN_UPDATE_BUDGET
        {
            return Err("Update budget must be at least 64");
        }
        Ok(())
    }
}

impl Default for LightEngineConfig {
    fn default() -> Self {
        Self {
            block_light: true,
            sky_light: true,
            task_batch_size: NonZeroUsize::new(1000).unwrap_or(NonZeroUsize::MIN),
            update_budget: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_document_matches_default() {
        let parsed = LightEngineConfig::from_json5(DEFAULT_CONFIG).unwrap();
        assert_eq!(parsed, LightEngineConfig::default());
    }

    #[test]
    fn test_budget_is_parsed() {
        let config = LightEngineConfig::from_json5(
            "{ block_light: true, sky_light: false, task_batch_size: 10, update_budget: 500 }",
        )
        .unwrap();
        assert!(!config.sky_light);
        assert_eq!(config.update_budget.map(NonZeroUsize::get), Some(500));
    }

    #[test]
    fn test_small_budget_is_rejected() {
        let err = LightEngineConfig::from_json5(
            "{ block_light: true, sky_light: true, task_batch_size: 10, update_budget: 3 }",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_batch_size_fails_to_parse() {
        let err = LightEngineConfig::from_json5(
            "{ block_light: true, sky_light: true, task_batch_size: 0, update_budget: null }",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_writes_default() {
        let dir = std::env::temp_dir().join(format!("steel-light-config-{}", std::process::id()));
        let path = dir.join("light_config.json5");
        let _ = fs::remove_file(&path);

        let config = LightEngineConfig::load(&path).unwrap();
        assert_eq!(config, LightEngineConfig::default());
        assert!(path.exists());

        let _ = fs::remove_dir_all(&dir);
    }
}
