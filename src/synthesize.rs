//! Schema skeletons derived from an example document.
//!
//! The output pins every scalar to its current value and every child list
//! to its current length. It is a starting point to be loosened by hand,
//! not an inferred schema.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use crate::error::SkeletonError;
use crate::resolver::resolve_schema_ref;
use crate::types::{json_type_name, Document, Metadata, Node, CHILDREN_FIELD, KIND_FIELD, METADATA_KIND};

/// Draft used by synthesized schemas (positional `items` arrays).
pub const SKELETON_DRAFT: &str = "http://json-schema.org/draft-07/schema#";

/// Synthesize a schema describing `node` and its subtree.
pub fn synthesize(node: &Node) -> Value {
    with_draft(node_schema(node))
}

/// Synthesize a schema describing a header map.
pub fn synthesize_metadata(metadata: &Metadata) -> Value {
    with_draft(metadata_schema(metadata))
}

/// Where the skeleton for `document` goes: its declared `$schema` path.
pub fn skeleton_path(document: &Document, schema_root: &Path) -> Option<PathBuf> {
    resolve_schema_ref(document.metadata.as_ref(), schema_root)
}

/// Write the skeleton for `document` to its `$schema` path.
///
/// Parent directories are created as needed. An existing file is never
/// overwritten.
pub fn write_skeleton(document: &Document, schema_root: &Path) -> Result<PathBuf, SkeletonError> {
    let path = skeleton_path(document, schema_root).ok_or(SkeletonError::NoSchemaRef)?;
    let text = serde_json::to_string_pretty(&synthesize(&document.root))
        .map_err(|source| SkeletonError::Serialize { source })?;

    let write_error = |source: io::Error| SkeletonError::WriteError {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(SkeletonError::AlreadyExists { path: path.clone() });
        }
        Err(e) => return Err(write_error(e)),
    };
    file.write_all(text.as_bytes()).map_err(write_error)?;

    tracing::info!(path = %path.display(), "wrote schema skeleton");
    Ok(path)
}

fn with_draft(schema: Value) -> Value {
    let mut map = Map::new();
    map.insert("$schema".into(), Value::String(SKELETON_DRAFT.into()));
    if let Value::Object(body) = schema {
        map.extend(body);
    }
    Value::Object(map)
}

fn node_schema(node: &Node) -> Value {
    let mut properties = Map::new();
    properties.insert(KIND_FIELD.into(), const_schema(&Value::String(node.kind.clone())));

    if node.kind == METADATA_KIND {
        // The raw header text is described through its parsed form only.
        if let Some(metadata) = node.metadata() {
            properties.insert("data".into(), metadata_schema(metadata));
        }
    } else {
        for (key, value) in &node.fields {
            properties.insert(key.clone(), const_schema(value));
        }
    }

    if !node.children.is_empty() {
        let items: Vec<Value> = node.children.iter().map(node_schema).collect();
        properties.insert(
            CHILDREN_FIELD.into(),
            json!({
                "type": "array",
                "maxItems": node.children.len(),
                "items": items,
            }),
        );
    }

    json!({
        "type": "object",
        "title": format!("{} node", node.kind),
        "properties": properties,
    })
}

fn metadata_schema(metadata: &Metadata) -> Value {
    let properties: Map<String, Value> = metadata
        .iter()
        .map(|(key, value)| (key.clone(), const_schema(value)))
        .collect();

    json!({
        "type": "object",
        "title": "frontmatter schema",
        "properties": properties,
    })
}

fn const_schema(value: &Value) -> Value {
    json!({
        "const": value,
        "type": json_type_name(value),
    })
}
