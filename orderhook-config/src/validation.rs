// Configuration validation

use crate::{ConfigError, Result};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Reusable validation rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a number is at least `min`
    pub fn at_least<T: PartialOrd + std::fmt::Display>(value: T, min: T, field: &str) -> Result<()> {
        if value < min {
            return Err(ConfigError::ValidationError(format!(
                "{} must be at least {}",
                field, min
            )));
        }
        Ok(())
    }

    /// Validate an absolute http(s) URL
    pub fn is_url(value: &str, field: &str) -> Result<()> {
        let parsed = url::Url::parse(value).map_err(|e| {
            ConfigError::ValidationError(format!("{} must be a valid URL: {}", field, e))
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "{} must use http or https",
                field
            )));
        }
        Ok(())
    }

    /// Validate port number
    pub fn is_port(value: u16, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a valid port number",
                field
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty_validation() {
        assert!(ConfigValidator::not_empty("value", "field").is_ok());
        assert!(ConfigValidator::not_empty("", "field").is_err());
        assert!(ConfigValidator::not_empty("   ", "field").is_err());
    }

    #[test]
    fn test_at_least_validation() {
        assert!(ConfigValidator::at_least(5u32, 1, "field").is_ok());
        assert!(ConfigValidator::at_least(0u32, 1, "field").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert!(ConfigValidator::is_url("https://example.com/keys", "field").is_ok());
        assert!(ConfigValidator::is_url("http://localhost:9000", "field").is_ok());
        assert!(ConfigValidator::is_url("example.com", "field").is_err());
        assert!(ConfigValidator::is_url("ftp://example.com", "field").is_err());
    }

    #[test]
    fn test_port_validation() {
        assert!(ConfigValidator::is_port(8080, "field").is_ok());
        assert!(ConfigValidator::is_port(0, "field").is_err());
    }
}
