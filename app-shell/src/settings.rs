use std::fs;
use std::path::Path;

use ai_assist::Locale;
use chart_frontend::{BenchmarkIndex, ChartFeatures};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// User-tunable screener settings. Every field has a default, so partial files load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerSettings {
    pub locale: Locale,
    pub features: ChartFeatures,
    pub benchmarks: Vec<BenchmarkIndex>,
}

impl Default for ScreenerSettings {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            features: ChartFeatures::default(),
            benchmarks: BenchmarkIndex::defaults(),
        }
    }
}

impl ScreenerSettings {
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}
