//! Persisted session state
//!
//! The store is injected into the flows rather than reached through a global.
//! Values are JSON documents under fixed keys (see
//! [`salesdesk_core::types::keys`]); every write replaces the whole value.

use crate::error::{StoreError, StoreResult};
use salesdesk_core::types::keys;
use salesdesk_core::{BrandTheme, Scope, Session};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Key/value persistence for session state
pub trait SessionStore: Send + Sync {
    /// Raw JSON stored under `key`
    fn get_raw(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replace the value under `key`
    fn set_raw(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove `key`; missing keys are not an error
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Remove every key
    fn clear(&self) -> StoreResult<()>;
}

/// Typed accessors over any [`SessionStore`]
pub trait SessionStoreExt: SessionStore {
    /// Decode the value under `key`
    fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        self.get_raw(key)?
            .map(|raw| serde_json::from_str(&raw).map_err(|e| StoreError::json(key, e)))
            .transpose()
    }

    /// Encode and store `value` under `key`
    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let raw = serde_json::to_string(value).map_err(|e| StoreError::json(key, e))?;
        self.set_raw(key, &raw)
    }

    /// Current session, if logged in
    fn session(&self) -> StoreResult<Option<Session>> {
        self.get(keys::SESSION)
    }

    /// Cached scope from the last successful fetch
    fn scope(&self) -> StoreResult<Option<Scope>> {
        self.get(keys::SCOPE)
    }

    /// Brand settings, defaults when never stored
    fn brand_theme(&self) -> StoreResult<BrandTheme> {
        Ok(self.get(keys::BRAND_THEME)?.unwrap_or_default())
    }

    /// Project the activities view is bound to
    ///
    /// Accepts both numeric and string ids; empty strings read as unset.
    fn active_project(&self) -> StoreResult<Option<String>> {
        let value: Option<serde_json::Value> = self.get(keys::ACTIVE_PROJECT_ID)?;
        Ok(match value {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Bind the activities view to a project
    fn set_active_project(&self, project_id: &str) -> StoreResult<()> {
        self.set(keys::ACTIVE_PROJECT_ID, project_id)
    }

    /// Drop the session, scope and active project; branding survives
    fn clear_session(&self) -> StoreResult<()> {
        self.remove(keys::SESSION)?;
        self.remove(keys::SCOPE)?;
        self.remove(keys::ACTIVE_PROJECT_ID)
    }
}

impl<S: SessionStore + ?Sized> SessionStoreExt for S {}

/// In-process store, lost when dropped
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemoryStore {
    fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> StoreResult<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// Directory-backed store: one `<KEY>.json` file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SessionStore for FileStore {
    fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_raw(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;

        // Readers never observe a partially written value.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)?;
        fs::rename(&staging, &path)?;
        debug!(key, path = %path.display(), "Stored session value");
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> StoreResult<()> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use salesdesk_core::{Project, Role, User};

    fn session() -> Session {
        Session {
            user: User {
                id: Some(1),
                username: Some("asha".to_string()),
                email: None,
                role: Role::Manager,
                extra: serde_json::Map::new(),
            },
            token: "tok".to_string(),
            refresh: None,
            brand: None,
        }
    }

    fn scope() -> Scope {
        Scope {
            projects: vec![Project {
                id: 4,
                name: "Skyline".to_string(),
                extra: serde_json::Map::new(),
            }],
            extra: serde_json::Map::new(),
        }
    }

    fn exercise(store: &dyn SessionStore) {
        assert_eq!(store.session().unwrap(), None);
        assert_eq!(store.brand_theme().unwrap(), BrandTheme::default());

        store.set(keys::SESSION, &session()).unwrap();
        store.set(keys::SCOPE, &scope()).unwrap();
        store.set(keys::BRAND_THEME, &BrandTheme {
            company_name: Some("Acme".to_string()),
            ..BrandTheme::default()
        })
        .unwrap();
        store.set_active_project("4").unwrap();

        assert_eq!(store.session().unwrap(), Some(session()));
        assert_eq!(store.scope().unwrap(), Some(scope()));
        assert_eq!(store.active_project().unwrap().as_deref(), Some("4"));

        store.clear_session().unwrap();
        assert_eq!(store.session().unwrap(), None);
        assert_eq!(store.scope().unwrap(), None);
        assert_eq!(store.active_project().unwrap(), None);
        assert_eq!(store.brand_theme().unwrap().display_name(), "Acme");

        store.clear().unwrap();
        assert_eq!(store.brand_theme().unwrap().display_name(), "Your Company");
    }

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemoryStore::new();
        exercise(&store);
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state"));
        exercise(&store);
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        FileStore::new(dir.path()).set(keys::SCOPE, &scope()).unwrap();

        let reopened = FileStore::new(dir.path());
        assert_eq!(reopened.scope().unwrap(), Some(scope()));
        assert!(dir.path().join("MY_SCOPE.json").exists());
    }

    #[test]
    fn test_overwrite_replaces_whole_value() {
        let store = MemoryStore::new();
        store.set(keys::SCOPE, &scope()).unwrap();
        store.set(keys::SCOPE, &Scope::default()).unwrap();
        assert_eq!(store.scope().unwrap(), Some(Scope::default()));
    }

    #[test]
    fn test_active_project_accepts_numbers() {
        let store = MemoryStore::new();
        store.set(keys::ACTIVE_PROJECT_ID, &12).unwrap();
        assert_eq!(store.active_project().unwrap().as_deref(), Some("12"));

        store.set(keys::ACTIVE_PROJECT_ID, "").unwrap();
        assert_eq!(store.active_project().unwrap(), None);
    }

    #[test]
    fn test_corrupt_value_reports_key() {
        let store = MemoryStore::new();
        store.set_raw(keys::SESSION, "{not json").unwrap();
        let err = store.session().unwrap_err();
        assert!(err.to_string().contains("SESSION"));
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.set_raw("../escape", "1"),
            Err(StoreError::InvalidKey { .. })
        ));
    }
}
