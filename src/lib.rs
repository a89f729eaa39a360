//! Markdown Schema Validation
//!
//! Validates markdown documents against JSON Schemas and maps every error
//! back to the source range that caused it.
//!
//! A document is parsed into a positioned tree. Its YAML header names the
//! schema through a `$schema` key, resolved against a schema root directory.
//! The tree is validated as a JSON instance, and each error's instance path
//! is walked back through the tree to recover line/column spans.
//!
//! # Example
//!
//! ```
//! use md_schema::{parse, validate, LocatedError};
//! use serde_json::json;
//! use std::path::Path;
//!
//! let doc = parse("---\n$schema: note.json\n---\n\nJust text\n");
//! let schema = json!({
//!     "$schema": "http://json-schema.org/draft-07/schema#",
//!     "properties": {
//!         "children": {
//!             "items": [{}, { "properties": { "type": { "const": "heading" } } }]
//!         }
//!     }
//! });
//!
//! let errors = validate(&doc.root, &schema).unwrap();
//! assert_eq!(errors[0].pointer, "/children/1/type");
//!
//! // The paragraph on line 5 is the offending node
//! let located = LocatedError::new(Path::new("note.md"), &doc.root, errors[0].clone());
//! assert_eq!(located.jump_target().unwrap().start.line, 5);
//! ```
//!
//! # Instance Form
//!
//! | Tree | Instance |
//! |------|----------|
//! | node kind | `type` property |
//! | node fields | one property each |
//! | children | `children` array (omitted when empty) |
//! | header data | `data` property of the leading `yaml` node |
//! | spans | not part of the instance |

mod config;
mod error;
mod loader;
mod locate;
mod parser;
mod report;
mod resolver;
mod store;
mod synthesize;
mod types;
mod validator;
mod workspace;

pub use config::{Settings, DEFAULT_SCHEMA_ROOT};
pub use error::{ConfigError, LoadError, MetadataError, SkeletonError, ValidateError};
pub use loader::{load_schema, pointer_segments, DiskSource, FileSource};
pub use locate::{resolve, LocatedError, PathPart};
pub use parser::{parse, parse_metadata, MAX_DEPTH};
pub use report::{check, collect_documents, CheckResult, ErrorReport, FileReport, FileStatus};
pub use resolver::resolve_schema_ref;
pub use store::{FileEvent, SchemaStore, StoreUpdate};
pub use synthesize::{
    skeleton_path, synthesize, synthesize_metadata, write_skeleton, SKELETON_DRAFT,
};
pub use types::{
    json_type_name, Document, FieldRef, Metadata, Node, Position, Span, Walk, CHILDREN_FIELD,
    KIND_FIELD, METADATA_KIND, SCHEMA_KEY,
};
pub use validator::{validate, validate_instance, AbstractError};
pub use workspace::{
    is_document, EventOutcome, OutcomeBoard, ValidationOutcome, Workspace, DOCUMENT_EXTENSIONS,
};
