//! Settings supplied by the host.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default directory holding schema files.
pub const DEFAULT_SCHEMA_ROOT: &str = "schemas";

/// Host settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Directory that `$schema` values are resolved against. Only files
    /// under it are loaded into the schema store.
    pub schema_root: PathBuf,
    /// Revalidate documents automatically when they change.
    pub autolint: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_root: PathBuf::from(DEFAULT_SCHEMA_ROOT),
            autolint: true,
        }
    }
}

impl Settings {
    /// Read settings from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ConfigError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Set the schema root (builder style).
    pub fn schema_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.schema_root = root.into();
        self
    }

    /// Set automatic revalidation (builder style).
    pub fn autolint(mut self, autolint: bool) -> Self {
        self.autolint = autolint;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.schema_root, PathBuf::from("schemas"));
        assert!(settings.autolint);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings = Settings::from_json(r#"{"schemaRoot": "meta/schemas"}"#).unwrap();
        assert_eq!(settings.schema_root, PathBuf::from("meta/schemas"));
        assert!(settings.autolint);
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"schemaRoot": "s", "autolint": false}}"#).unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings, Settings::default().schema_root("s").autolint(false));
    }

    #[test]
    fn load_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "schemaRoot = s").unwrap();

        let result = Settings::load(file.path());
        assert!(matches!(result, Err(ConfigError::InvalidJson { .. })));
    }

    #[test]
    fn load_missing_file() {
        let result = Settings::load(Path::new("/nonexistent/settings.json"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }
}
