// Configuration file loaders

use crate::{ConfigError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }
}

/// Configuration file loader
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Auto-detect format from file extension
    pub fn auto(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::LoadError("No file extension found".to_string()))?;

        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| ConfigError::LoadError(format!("Unsupported format: {}", ext)))?;

        Ok(Self::new(format))
    }

    /// Load a file into a JSON tree
    pub fn load_file(&self, path: &Path) -> Result<Value> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::LoadError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        self.parse(&content)
    }

    /// Parse configuration text into a JSON tree
    pub fn parse(&self, content: &str) -> Result<Value> {
        match self.format {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {}", e))),
            FileFormat::Toml => {
                let toml_value: toml::Value = toml::from_str(content)
                    .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

                serde_json::to_value(toml_value).map_err(|e| {
                    ConfigError::ParseError(format!("TOML to JSON conversion error: {}", e))
                })
            }
        }
    }
}
