//! Schema loading through the host's file interface.

use std::io;
use std::path::Path;

use serde_json::Value;

use crate::error::LoadError;

/// Text file access supplied by the host.
pub trait FileSource: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    fn exists(&self, path: &Path) -> bool;
}

/// [`FileSource`] backed by the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskSource;

impl FileSource for DiskSource {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Load a schema from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_schema(source: &dyn FileSource, path: &Path) -> Result<Value, LoadError> {
    if !source.exists(path) {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = source
        .read_to_string(path)
        .map_err(|source| LoadError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

    serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Split a JSON Pointer (e.g. "/children/0/type") into unescaped segments.
///
/// The empty pointer addresses the root and yields no segments.
pub fn pointer_segments(pointer: &str) -> Vec<String> {
    let path = pointer.trim_start_matches('#');
    if path.is_empty() {
        return Vec::new();
    }
    path.strip_prefix('/')
        .unwrap_or(path)
        .split('/')
        // Unescape JSON Pointer encoding (~1 = /, ~0 = ~)
        .map(|part| part.replace("~1", "/").replace("~0", "~"))
        .collect()
}
