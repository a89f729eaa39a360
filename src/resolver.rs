//! Schema reference resolution - finds the schema a document declares.

use std::path::{Component, Path, PathBuf};

use crate::types::{Metadata, SCHEMA_KEY};

/// Resolve the `$schema` header value against the schema root.
///
/// Returns `None` when there is no header, no `$schema` key, or the value
/// is not a string. Leading slashes in the value are ignored so the result
/// stays under `schema_root`; a value that climbs out of the root with `..`
/// (or names a drive) is rejected. Whether the file exists is the store's
/// concern.
pub fn resolve_schema_ref(metadata: Option<&Metadata>, schema_root: &Path) -> Option<PathBuf> {
    let value = metadata?.get(SCHEMA_KEY)?.as_str()?;
    let relative = Path::new(value.trim_start_matches('/'));
    if relative.as_os_str().is_empty() {
        return None;
    }
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        tracing::debug!(value, "$schema escapes the schema root, ignoring");
        return None;
    }
    Some(schema_root.join(relative))
}
