//! Path-keyed cache of parsed schemas, kept current by file events.
//!
//! The store owns every cached schema and hands out shared read-only
//! handles. All cache mutation goes through the write lock, so event
//! handlers and lazy loads from concurrent validation runs never interleave.
//! A reload that fails keeps the previous entry: a stale schema is preferred
//! over evicting on a transient read or parse failure.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::error::LoadError;
use crate::loader::{load_schema, DiskSource, FileSource};

/// A change to a file, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
    Deleted(PathBuf),
}

impl FileEvent {
    /// The path the file lives at after the event.
    pub fn path(&self) -> &Path {
        match self {
            FileEvent::Created(path) | FileEvent::Modified(path) | FileEvent::Deleted(path) => path,
            FileEvent::Renamed { to, .. } => to,
        }
    }
}

/// What a file event did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreUpdate {
    /// The path is outside the schema root, or there was nothing to remove.
    Ignored,
    Reloaded,
    /// The file could not be read or parsed; any previous entry is kept.
    ReloadFailed,
    Evicted,
}

/// Cache of schemas under one root directory.
pub struct SchemaStore {
    source: Arc<dyn FileSource>,
    root: RwLock<PathBuf>,
    cache: RwLock<HashMap<PathBuf, Arc<Value>>>,
}

impl SchemaStore {
    pub fn new(root: impl Into<PathBuf>, source: Arc<dyn FileSource>) -> Self {
        Self {
            source,
            root: RwLock::new(root.into()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// A store reading schemas from the local file system.
    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Arc::new(DiskSource))
    }

    pub fn root(&self) -> PathBuf {
        self.root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change the schema root. Cached entries belong to the old root and are dropped.
    pub fn set_root(&self, root: impl Into<PathBuf>) {
        *self.root.write().unwrap_or_else(PoisonError::into_inner) = root.into();
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Returns true if `path` lies under the schema root.
    ///
    /// Paths containing `..` are never schema files, even when their prefix
    /// matches the root.
    pub fn is_schema_file(&self, path: &Path) -> bool {
        !path.components().any(|c| c == Component::ParentDir)
            && path.starts_with(&*self.root.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Look up a schema, loading and caching it on first use.
    ///
    /// Returns `None` if the file is missing, unreadable, not JSON, or
    /// outside the schema root.
    pub fn get(&self, path: &Path) -> Option<Arc<Value>> {
        if let Some(schema) = self.cached(path) {
            return Some(schema);
        }

        match self.load(path) {
            Ok(schema) => {
                let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
                let entry = cache
                    .entry(path.to_path_buf())
                    .or_insert_with(|| Arc::new(schema));
                Some(Arc::clone(entry))
            }
            Err(LoadError::FileNotFound { .. }) => {
                tracing::debug!(path = %path.display(), "schema file not found");
                None
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to load schema");
                None
            }
        }
    }

    /// Apply a file event to the cache.
    pub fn on_file_event(&self, event: &FileEvent) -> StoreUpdate {
        match event {
            FileEvent::Created(path) | FileEvent::Modified(path) => self.reload(path),
            FileEvent::Renamed { from, to } => {
                let evicted = self.evict(from);
                match self.reload(to) {
                    StoreUpdate::Ignored => evicted,
                    update => update,
                }
            }
            FileEvent::Deleted(path) => self.evict(path),
        }
    }

    /// Paths of all cached schemas, sorted.
    pub fn cached_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cached(&self, path: &Path) -> Option<Arc<Value>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    fn load(&self, path: &Path) -> Result<Value, LoadError> {
        if !self.is_schema_file(path) {
            return Err(LoadError::OutsideRoot {
                path: path.to_path_buf(),
                root: self.root(),
            });
        }
        load_schema(self.source.as_ref(), path)
    }

    fn reload(&self, path: &Path) -> StoreUpdate {
        if !self.is_schema_file(path) {
            return StoreUpdate::Ignored;
        }

        match load_schema(self.source.as_ref(), path) {
            Ok(schema) => {
                tracing::debug!(path = %path.display(), "reloaded schema");
                self.cache
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(path.to_path_buf(), Arc::new(schema));
                StoreUpdate::Reloaded
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "schema reload failed, keeping cached entry");
                StoreUpdate::ReloadFailed
            }
        }
    }

    fn evict(&self, path: &Path) -> StoreUpdate {
        if !self.is_schema_file(path) {
            return StoreUpdate::Ignored;
        }

        let removed = self
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
        match removed {
            Some(_) => {
                tracing::debug!(path = %path.display(), "evicted schema");
                StoreUpdate::Evicted
            }
            None => StoreUpdate::Ignored,
        }
    }
}

impl std::fmt::Debug for SchemaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaStore")
            .field("root", &self.root())
            .field("cached", &self.cached_paths())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::testing::MemorySource;

    fn store(source: MemorySource) -> (SchemaStore, Arc<MemorySource>) {
        let source = Arc::new(source);
        let store = SchemaStore::new("schemas", source.clone());
        (store, source)
    }

    fn path(p: &str) -> PathBuf {
        PathBuf::from(p)
    }

    #[test]
    fn get_caches_and_returns_same_handle() {
        let (store, _) = store(MemorySource::default().with_file("schemas/a.json", r#"{"type":"object"}"#));

        let first = store.get(Path::new("schemas/a.json")).unwrap();
        let second = store.get(Path::new("schemas/a.json")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first["type"], "object");
    }

    #[test]
    fn get_without_event_ignores_disk_changes() {
        let (store, source) = store(MemorySource::default().with_file("schemas/a.json", r#"{"title":"v1"}"#));

        assert_eq!(store.get(Path::new("schemas/a.json")).unwrap()["title"], "v1");
        source.write("schemas/a.json", r#"{"title":"v2"}"#);
        assert_eq!(store.get(Path::new("schemas/a.json")).unwrap()["title"], "v1");
    }

    #[test]
    fn get_missing_or_invalid_is_absent() {
        let (store, _) = store(MemorySource::default().with_file("schemas/bad.json", "{ nope"));

        assert!(store.get(Path::new("schemas/missing.json")).is_none());
        assert!(store.get(Path::new("schemas/bad.json")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn get_outside_root_is_absent() {
        let (store, _) = store(MemorySource::default().with_file("notes/a.json", "{}"));
        assert!(store.get(Path::new("notes/a.json")).is_none());
    }

    #[test]
    fn modify_outside_root_is_ignored() {
        let (store, _) = store(
            MemorySource::default()
                .with_file("schemas/a.json", "{}")
                .with_file("other/b.json", "{}"),
        );
        store.get(Path::new("schemas/a.json")).unwrap();

        let update = store.on_file_event(&FileEvent::Modified(path("other/b.json")));
        assert_eq!(update, StoreUpdate::Ignored);
        assert_eq!(store.cached_paths(), [path("schemas/a.json")]);
    }

    #[test]
    fn modify_reloads_entry() {
        let (store, source) = store(MemorySource::default().with_file("schemas/a.json", r#"{"title":"v1"}"#));
        store.get(Path::new("schemas/a.json")).unwrap();

        source.write("schemas/a.json", r#"{"title":"v2"}"#);
        let update = store.on_file_event(&FileEvent::Modified(path("schemas/a.json")));
        assert_eq!(update, StoreUpdate::Reloaded);
        assert_eq!(store.get(Path::new("schemas/a.json")).unwrap()["title"], "v2");
    }

    #[test]
    fn create_loads_eagerly() {
        let (store, _) = store(MemorySource::default().with_file("schemas/new.json", "{}"));

        let update = store.on_file_event(&FileEvent::Created(path("schemas/new.json")));
        assert_eq!(update, StoreUpdate::Reloaded);
        assert_eq!(store.cached_paths(), [path("schemas/new.json")]);
    }

    #[test]
    fn failed_reload_keeps_previous_entry() {
        let (store, source) = store(MemorySource::default().with_file("schemas/a.json", r#"{"title":"v1"}"#));
        let before = store.get(Path::new("schemas/a.json")).unwrap();

        source.write("schemas/a.json", "{ half written");
        let update = store.on_file_event(&FileEvent::Modified(path("schemas/a.json")));
        assert_eq!(update, StoreUpdate::ReloadFailed);

        let after = store.get(Path::new("schemas/a.json")).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn delete_evicts_entry() {
        let (store, source) = store(MemorySource::default().with_file("schemas/a.json", "{}"));
        store.get(Path::new("schemas/a.json")).unwrap();

        source.remove("schemas/a.json");
        let update = store.on_file_event(&FileEvent::Deleted(path("schemas/a.json")));
        assert_eq!(update, StoreUpdate::Evicted);
        assert!(store.get(Path::new("schemas/a.json")).is_none());
    }

    #[test]
    fn delete_unknown_or_outside_is_ignored() {
        let (store, _) = store(MemorySource::default());
        assert_eq!(
            store.on_file_event(&FileEvent::Deleted(path("schemas/none.json"))),
            StoreUpdate::Ignored
        );
        assert_eq!(
            store.on_file_event(&FileEvent::Deleted(path("elsewhere/x.json"))),
            StoreUpdate::Ignored
        );
    }

    #[test]
    fn rename_moves_entry() {
        let (store, source) = store(MemorySource::default().with_file("schemas/old.json", r#"{"title":"t"}"#));
        store.get(Path::new("schemas/old.json")).unwrap();

        source.remove("schemas/old.json");
        source.write("schemas/new.json", r#"{"title":"t"}"#);
        let update = store.on_file_event(&FileEvent::Renamed {
            from: path("schemas/old.json"),
            to: path("schemas/new.json"),
        });
        assert_eq!(update, StoreUpdate::Reloaded);
        assert_eq!(store.cached_paths(), [path("schemas/new.json")]);
    }

    #[test]
    fn rename_out_of_root_evicts() {
        let (store, source) = store(MemorySource::default().with_file("schemas/a.json", "{}"));
        store.get(Path::new("schemas/a.json")).unwrap();

        source.remove("schemas/a.json");
        source.write("archive/a.json", "{}");
        let update = store.on_file_event(&FileEvent::Renamed {
            from: path("schemas/a.json"),
            to: path("archive/a.json"),
        });
        assert_eq!(update, StoreUpdate::Evicted);
        assert!(store.is_empty());
    }

    #[test]
    fn root_check_is_component_wise() {
        let (store, _) = store(MemorySource::default());
        assert!(store.is_schema_file(Path::new("schemas/nested/a.json")));
        assert!(!store.is_schema_file(Path::new("schemas-old/a.json")));
    }

    #[test]
    fn parent_dir_escapes_are_not_schema_files() {
        let (store, _) = store(MemorySource::default().with_file("schemas/../secret.json", "{}"));
        assert!(!store.is_schema_file(Path::new("schemas/../secret.json")));
        assert!(!store.is_schema_file(Path::new("schemas/nested/../../secret.json")));

        assert!(store.get(Path::new("schemas/../secret.json")).is_none());
        let update = store.on_file_event(&FileEvent::Created(path("schemas/../secret.json")));
        assert_eq!(update, StoreUpdate::Ignored);
        assert!(store.is_empty());
    }

    #[test]
    fn set_root_clears_cache() {
        let (store, _) = store(MemorySource::default().with_file("schemas/a.json", "{}"));
        store.get(Path::new("schemas/a.json")).unwrap();

        store.set_root("templates");
        assert!(store.is_empty());
        assert_eq!(store.root(), path("templates"));
        assert!(store.get(Path::new("schemas/a.json")).is_none());
    }
}
