//! Error types for document parsing, schema loading and validation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading a schema file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} is outside the schema root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            _ => 2,
        }
    }
}

/// Why a document's header did not yield metadata.
///
/// The parser recovers from these by leaving the metadata absent.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("invalid YAML header: {source}")]
    Yaml {
        #[source]
        source: serde_yaml::Error,
    },

    #[error("header must be a mapping, got {actual}")]
    NotAMapping { actual: &'static str },
}

/// Errors during validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// The schema itself could not be compiled. This is a configuration
    /// problem and must never be reported as "document is valid".
    #[error("invalid schema {}: {message}", path.as_ref().map(|p| p.display().to_string()).unwrap_or_default())]
    InvalidSchema {
        path: Option<PathBuf>,
        message: String,
    },

    #[error("cannot read document {path}: {source}")]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::InvalidSchema { .. } => 2,
            ValidateError::DocumentRead { .. } => 3,
        }
    }

    /// Attach the schema path to a compile failure.
    pub(crate) fn with_schema_path(self, schema_path: &std::path::Path) -> Self {
        match self {
            ValidateError::InvalidSchema { message, .. } => ValidateError::InvalidSchema {
                path: Some(schema_path.to_path_buf()),
                message,
            },
            other => other,
        }
    }
}

/// Errors while writing a synthesized schema skeleton.
#[derive(Debug, Error)]
pub enum SkeletonError {
    #[error("document declares no $schema in its header")]
    NoSchemaRef,

    #[error("refusing to overwrite existing schema {path}")]
    AlreadyExists { path: PathBuf },

    #[error("cannot write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize schema: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}

impl SkeletonError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SkeletonError::WriteError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors while reading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read settings {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::ReadError { .. } => 3,
            ConfigError::InvalidJson { .. } => 2,
        }
    }
}
