use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Key of the session token.
pub const AUTH_TOKEN: &str = "postgraphile-demo-token";

/// Key of the OAuth `state` nonce awaiting the provider's callback.
pub const OAUTH_STATE: &str = "postgraphile-demo-gitlab-state";

/// String key-value storage in the style of the browser's `localStorage`: writes never fail from
/// the caller's point of view.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str);

    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
    }
}

/// Store persisted as a JSON object in a file, for hosts without a browser.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`. A missing or unreadable file starts out empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = fs::read_to_string(&path)
            .ok()
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "Ignoring corrupt store file.");
                    None
                }
            })
            .unwrap_or_default();

        FileStore {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn persist(&self, entries: &HashMap<String, String>) {
        let written = serde_json::to_string_pretty(entries)
            .map_err(std::io::Error::from)
            .and_then(|raw| fs::write(&self.path, raw));
        if let Err(e) = written {
            tracing::error!(error = %e, path = %self.path.display(), "Failed to persist store.");
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        self.persist(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(key).is_some() {
            self.persist(&entries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::default();
        assert_eq!(store.get(AUTH_TOKEN), None);

        store.set(AUTH_TOKEN, "abc");
        assert_eq!(store.get(AUTH_TOKEN).as_deref(), Some("abc"));

        store.remove(AUTH_TOKEN);
        assert_eq!(store.get(AUTH_TOKEN), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileStore::open(&path);
        store.set(AUTH_TOKEN, "abc");
        store.set(OAUTH_STATE, "nonce");
        store.remove(OAUTH_STATE);

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get(AUTH_TOKEN).as_deref(), Some("abc"));
        assert_eq!(reopened.get(OAUTH_STATE), None);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(FileStore::open(&path).get(AUTH_TOKEN), None);
    }
}
