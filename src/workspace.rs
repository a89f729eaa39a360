//! The validation pipeline and per-document results.
//!
//! A [`Workspace`] ties the pieces together: text is parsed, its `$schema`
//! header is resolved against the schema root, the schema is fetched from
//! the [`SchemaStore`], the tree is validated, and every error is located.
//! Results are kept on an outcome board keyed by document path.
//!
//! Each run takes a fresh run id from a monotonically increasing counter.
//! The board only accepts a result whose run id is newer than the one it
//! holds, so when two runs for one document finish out of order the older
//! result is dropped instead of overwriting the newer one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::config::Settings;
use crate::error::ValidateError;
use crate::loader::{DiskSource, FileSource};
use crate::locate::LocatedError;
use crate::parser::parse;
use crate::resolver::resolve_schema_ref;
use crate::store::{FileEvent, SchemaStore, StoreUpdate};
use crate::validator::validate;

/// File extensions treated as documents.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Result of validating one document against its schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub document: PathBuf,
    pub run_id: u64,
    /// The schema the document was validated against.
    pub schema: PathBuf,
    /// Errors in evaluator order. Empty means the document is valid.
    pub errors: Vec<LocatedError>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// What handling a file event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    pub store: StoreUpdate,
    /// Documents revalidated because of the event.
    pub revalidated: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
enum SlotState {
    Cleared,
    Validated(ValidationOutcome),
    Failed(String),
}

#[derive(Debug, Clone)]
struct Slot {
    run_id: u64,
    state: SlotState,
}

/// Latest result per document.
#[derive(Debug, Default)]
pub struct OutcomeBoard {
    slots: RwLock<HashMap<PathBuf, Slot>>,
}

impl OutcomeBoard {
    /// Record a run's result unless a newer run already reported.
    ///
    /// Returns false when the result was stale and dropped.
    fn apply(&self, document: &Path, run_id: u64, state: SlotState) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        match slots.get(document) {
            Some(slot) if slot.run_id > run_id => {
                tracing::debug!(
                    document = %document.display(),
                    run_id,
                    newer = slot.run_id,
                    "dropping stale validation result"
                );
                false
            }
            _ => {
                slots.insert(document.to_path_buf(), Slot { run_id, state });
                true
            }
        }
    }

    /// The current outcome for a document, if it was validated.
    pub fn outcome(&self, document: &Path) -> Option<ValidationOutcome> {
        match &self.slots.read().unwrap_or_else(PoisonError::into_inner).get(document)?.state {
            SlotState::Validated(outcome) => Some(outcome.clone()),
            _ => None,
        }
    }

    /// The schema failure message for a document, if its last run failed.
    pub fn failure(&self, document: &Path) -> Option<String> {
        match &self.slots.read().unwrap_or_else(PoisonError::into_inner).get(document)?.state {
            SlotState::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    /// All current outcomes, sorted by document path.
    pub fn outcomes(&self) -> Vec<ValidationOutcome> {
        let mut outcomes: Vec<ValidationOutcome> = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter_map(|slot| match &slot.state {
                SlotState::Validated(outcome) => Some(outcome.clone()),
                _ => None,
            })
            .collect();
        outcomes.sort_by(|a, b| a.document.cmp(&b.document));
        outcomes
    }

    /// Total located errors across all documents.
    pub fn error_count(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|slot| match &slot.state {
                SlotState::Validated(outcome) => outcome.errors.len(),
                _ => 0,
            })
            .sum()
    }

    /// Documents whose current outcome was validated against `schema`.
    fn dependents(&self, schema: &Path) -> Vec<PathBuf> {
        let mut documents: Vec<PathBuf> = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, slot)| matches!(&slot.state, SlotState::Validated(o) if o.schema == schema))
            .map(|(document, _)| document.clone())
            .collect();
        documents.sort();
        documents
    }
}

/// Validation state for a set of documents sharing one schema root.
pub struct Workspace {
    settings: Settings,
    source: Arc<dyn FileSource>,
    store: SchemaStore,
    board: OutcomeBoard,
    next_run: AtomicU64,
}

impl Workspace {
    pub fn new(settings: Settings, source: Arc<dyn FileSource>) -> Self {
        let store = SchemaStore::new(settings.schema_root.clone(), Arc::clone(&source));
        Self {
            settings,
            source,
            store,
            board: OutcomeBoard::default(),
            next_run: AtomicU64::new(0),
        }
    }

    /// A workspace reading from the local file system.
    pub fn on_disk(settings: Settings) -> Self {
        Self::new(settings, Arc::new(DiskSource))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &SchemaStore {
        &self.store
    }

    pub fn board(&self) -> &OutcomeBoard {
        &self.board
    }

    fn next_run_id(&self) -> u64 {
        self.next_run.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Validate document text without recording the result.
    ///
    /// Returns `Ok(None)` when the document declares no schema or the schema
    /// cannot be loaded; such documents are not validated.
    pub fn validate_text(
        &self,
        document: &Path,
        text: &str,
    ) -> Result<Option<ValidationOutcome>, ValidateError> {
        self.run(document, text, self.next_run_id())
    }

    /// Read and validate a document, recording the result on the board.
    pub fn revalidate(&self, document: &Path) -> Result<Option<ValidationOutcome>, ValidateError> {
        let run_id = self.next_run_id();
        let result = self
            .source
            .read_to_string(document)
            .map_err(|source| ValidateError::DocumentRead {
                path: document.to_path_buf(),
                source,
            })
            .and_then(|text| self.run(document, &text, run_id));

        let state = match &result {
            Ok(Some(outcome)) => SlotState::Validated(outcome.clone()),
            Ok(None) => SlotState::Cleared,
            Err(err) => {
                tracing::warn!(document = %document.display(), error = %err, "validation failed");
                SlotState::Failed(err.to_string())
            }
        };
        self.board.apply(document, run_id, state);
        result
    }

    /// Drop a document's result, e.g. after it was deleted. Runs already
    /// in flight for it are treated as stale.
    pub fn forget(&self, document: &Path) {
        let run_id = self.next_run_id();
        self.board.apply(document, run_id, SlotState::Cleared);
    }

    /// Validate every document in `documents`, recording results.
    pub fn sweep(
        &self,
        documents: &[PathBuf],
    ) -> Vec<(PathBuf, Result<Option<ValidationOutcome>, ValidateError>)> {
        documents
            .iter()
            .map(|document| (document.clone(), self.revalidate(document)))
            .collect()
    }

    /// Route a file event to the schema store and the affected documents.
    ///
    /// Schema changes revalidate the documents last validated against that
    /// schema. Document changes revalidate the document itself. Both only
    /// happen when `autolint` is on; deletions always clear results.
    pub fn handle_event(&self, event: &FileEvent) -> EventOutcome {
        let store = self.store.on_file_event(event);
        let mut revalidated = Vec::new();

        let schema_changed = matches!(store, StoreUpdate::Reloaded | StoreUpdate::Evicted);
        if schema_changed && self.settings.autolint {
            let mut schemas = vec![event.path().to_path_buf()];
            if let FileEvent::Renamed { from, .. } = event {
                schemas.push(from.clone());
            }
            for schema in schemas {
                for document in self.board.dependents(&schema) {
                    // Failures are recorded on the board and logged.
                    self.revalidate(&document).ok();
                    revalidated.push(document);
                }
            }
        }

        if let FileEvent::Renamed { from, .. } = event {
            if is_document(from) {
                self.forget(from);
            }
        }

        let path = event.path();
        if is_document(path) {
            match event {
                FileEvent::Deleted(_) => self.forget(path),
                _ if self.settings.autolint => {
                    self.revalidate(path).ok();
                    revalidated.push(path.to_path_buf());
                }
                _ => {}
            }
        }

        EventOutcome { store, revalidated }
    }

    fn run(
        &self,
        document: &Path,
        text: &str,
        run_id: u64,
    ) -> Result<Option<ValidationOutcome>, ValidateError> {
        let parsed = parse(text);

        let Some(schema_path) = resolve_schema_ref(parsed.metadata.as_ref(), &self.store.root()) else {
            tracing::debug!(document = %document.display(), "no $schema declared");
            return Ok(None);
        };
        let Some(schema) = self.store.get(&schema_path) else {
            tracing::debug!(
                document = %document.display(),
                schema = %schema_path.display(),
                "schema unavailable, skipping validation"
            );
            return Ok(None);
        };

        let errors = validate(&parsed.root, &schema).map_err(|e| e.with_schema_path(&schema_path))?;
        let errors: Vec<LocatedError> = errors
            .into_iter()
            .map(|error| LocatedError::new(document, &parsed.root, error))
            .collect();

        tracing::info!(
            document = %document.display(),
            schema = %schema_path.display(),
            run_id,
            errors = errors.len(),
            "validated document"
        );

        Ok(Some(ValidationOutcome {
            document: document.to_path_buf(),
            run_id,
            schema: schema_path,
            errors,
        }))
    }
}

/// Returns true if `path` has a document extension.
pub fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| DOCUMENT_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}
