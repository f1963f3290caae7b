//! Compilation options (datajs.toml)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading options
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid namespace '{0}': use lowercase letters, digits, '_', '-' and '.'")]
    InvalidNamespace(String),
}

/// Options of a compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Namespace every unit and storage lives in
    pub namespace: String,

    /// Compile the built-in globals before the program
    pub prelude: bool,

    /// Directory the rendered files are written to
    pub output: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            namespace: "datajs".to_string(),
            prelude: true,
            output: PathBuf::from("out"),
        }
    }
}

impl Options {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let options: Options = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if is_valid_namespace(&self.namespace) {
            Ok(())
        } else {
            Err(ConfigError::InvalidNamespace(self.namespace.clone()))
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn without_prelude(mut self) -> Self {
        self.prelude = false;
        self
    }
}

fn is_valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty()
        && namespace
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let options = Options::from_toml("namespace = \"game\"").ok();
        assert_eq!(
            options,
            Some(Options {
                namespace: "game".to_string(),
                prelude: true,
                output: PathBuf::from("out"),
            })
        );
    }

    #[test]
    fn test_namespace_validation() {
        assert!(matches!(
            Options::from_toml("namespace = \"Game\""),
            Err(ConfigError::InvalidNamespace(_))
        ));
        assert!(matches!(
            Options::from_toml("prelude = \"yes\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(Options::default().with_namespace("my_pack.v2").validate().is_ok());
    }
}
