//! Session persistence - save and restore the viewer selection.
//!
//! The selection is stored as one JSON blob under [`SESSION_KEY`] in a
//! [`KeyValueStore`]. Loading never fails from the caller's point of view:
//! a missing, malformed or schema-violating blob falls back to an empty
//! selection and logs a warning.

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::logs::{log_info, log_warning};
use crate::error::{SessionError, SessionResult};
use crate::models::SelectionState;
use crate::selection::ExperimentSession;

/// Fixed key of the session blob.
pub const SESSION_KEY: &str = "ml-experiment-viewer-session";

/// Directory used by [`FileStore::new`] (relative to current dir)
pub const DEFAULT_SESSION_DIR: &str = ".expview/session";

/// Opaque string blob store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> SessionResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> SessionResult<()>;
    fn remove(&mut self, key: &str) -> SessionResult<()>;
}

// =============================================================================
// Stores
// =============================================================================

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_SESSION_DIR)
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> SessionResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(SessionError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn set(&mut self, key: &str, value: &str) -> SessionResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(&path, value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> SessionResult<()> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// In-process store, lost on exit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> SessionResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> SessionResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// Save / load
// =============================================================================

/// Validate a blob against the embedded session schema.
pub fn validate_blob(blob: &Value) -> SessionResult<()> {
    let schema: Value = serde_json::from_str(include_str!("../../schemas/session-state.json"))?;
    let validator = jsonschema::draft7::new(&schema)
        .map_err(|e| SessionError::Schema(vec![format!("invalid schema: {}", e)]))?;

    let errors: Vec<String> = validator.iter_errors(blob).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(SessionError::Schema(errors))
    }
}

/// Persist the current selection.
pub fn save_session(
    session: &ExperimentSession,
    store: &mut dyn KeyValueStore,
) -> SessionResult<()> {
    let blob = serde_json::to_string(session.selection())?;
    store.set(SESSION_KEY, &blob)?;
    log_info("Session state saved");
    Ok(())
}

/// Read the stored selection, if any. Errors are returned to the caller.
pub fn try_load(store: &dyn KeyValueStore) -> SessionResult<Option<SelectionState>> {
    let Some(raw) = store.get(SESSION_KEY)? else {
        return Ok(None);
    };
    let blob: Value = serde_json::from_str(&raw)?;
    validate_blob(&blob)?;
    Ok(Some(serde_json::from_value(blob)?))
}

/// Restore the stored selection into `session`.
///
/// Returns whether a stored selection was applied. Any problem leaves the
/// session with an empty selection and is only logged.
pub fn load_session(session: &mut ExperimentSession, store: &dyn KeyValueStore) -> bool {
    match try_load(store) {
        Ok(Some(selection)) => {
            session.restore_selection(selection);
            log_info("Session state restored");
            true
        }
        Ok(None) => {
            session.clear_selections();
            false
        }
        Err(e) => {
            log_warning(format!("Failed to load session state: {}", e));
            session.clear_selections();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest_bytes;
    use tempfile::tempdir;

    fn session() -> ExperimentSession {
        let csv = "experiment_id,metric_name,step,value\ne1,acc,0,1\ne2,loss,0,2\n";
        let mut session = ExperimentSession::new();
        session.apply_ingest(ingest_bytes(csv.as_bytes()));
        session
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let mut store = MemoryStore::new();
        let mut original = session();
        original.toggle_experiment("e2");
        original.toggle_metric("loss");
        original.set_metric_filter("lo");
        save_session(&original, &mut store).unwrap();

        let mut restored = session();
        assert!(load_session(&mut restored, &store));
        assert_eq!(restored.selection(), original.selection());
    }

    #[test]
    fn test_blob_shape() {
        let mut store = MemoryStore::new();
        let mut s = session();
        s.toggle_experiment("e1");
        save_session(&s, &mut store).unwrap();

        let raw = store.get(SESSION_KEY).unwrap().unwrap();
        let blob: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(blob["selectedExperimentIds"], serde_json::json!(["e1"]));
        assert_eq!(blob["selectedMetrics"], serde_json::json!([]));
        assert_eq!(blob["metricFilter"], "");
    }

    #[test]
    fn test_absent_blob_falls_back_to_empty() {
        let store = MemoryStore::new();
        let mut s = session();
        s.toggle_experiment("e1");

        assert!(!load_session(&mut s, &store));
        assert_eq!(s.selection(), &SelectionState::default());
    }

    #[test]
    fn test_malformed_blob_falls_back_to_empty() {
        for raw in ["{not json", "[1, 2]", r#"{"selectedMetrics": "acc"}"#, r#"{"metricFilter": null}"#] {
            let mut store = MemoryStore::new();
            store.set(SESSION_KEY, raw).unwrap();

            let mut s = session();
            s.toggle_experiment("e1");
            assert!(!load_session(&mut s, &store), "blob {raw}");
            assert_eq!(s.selection(), &SelectionState::default());
            assert!(try_load(&store).is_err());
        }
    }

    #[test]
    fn test_partial_blob_defaults() {
        let mut store = MemoryStore::new();
        store
            .set(SESSION_KEY, r#"{"selectedExperimentIds": ["e1", "missing"]}"#)
            .unwrap();

        let mut s = session();
        assert!(load_session(&mut s, &store));
        assert_eq!(s.selection().selected_experiment_ids.len(), 1);
        assert!(s.selection().selected_metrics.is_empty());
    }

    #[test]
    fn test_file_store() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::with_dir(dir.path().join("nested"));

        assert_eq!(store.get(SESSION_KEY).unwrap(), None);
        store.set(SESSION_KEY, "{}").unwrap();
        assert!(dir.path().join("nested").join(format!("{SESSION_KEY}.json")).exists());
        assert_eq!(store.get(SESSION_KEY).unwrap().as_deref(), Some("{}"));

        store.remove(SESSION_KEY).unwrap();
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::with_dir(dir.path());
        assert!(matches!(
            store.set("../escape", "{}"),
            Err(SessionError::InvalidKey(_))
        ));
        assert!(store.get("").is_err());
    }
}
