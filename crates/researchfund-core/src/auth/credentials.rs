use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CredentialBackend;

const SERVICE_NAME: &str = "researchfund";

/// Storage file name in the data directory
const STORAGE_FILE: &str = "storage.json";

/// Key holding the bearer token
pub const TOKEN_KEY: &str = "token";

/// Key holding the JSON `{"username": ...}` login prefill record
pub const REMEMBERED_USER_KEY: &str = "rememberedUser";

/// A string key-value persistence surface.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// JSON object on disk. Every read goes back to the file so that changes
/// made by another process are seen.
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(STORAGE_FILE),
            write_lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read storage file")?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).context("Failed to parse storage file")
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, contents).context("Failed to write storage file")?;
        Ok(())
    }

    fn update<F: FnOnce(&mut BTreeMap<String, String>)>(&self, f: F) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("Storage file lock poisoned"))?;
        let mut entries = self.read_all()?;
        f(&mut entries);
        self.write_all(&entries)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

/// One OS keychain entry per key.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve value from keychain"),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store value in keychain")
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete value from keychain"),
        }
    }
}

/// Process-lifetime store. Used as the session-scoped surface and in tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| anyhow!("Memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("Memory store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("Memory store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RememberedUser {
    username: String,
}

/// Token and remembered-username persistence.
///
/// The token lives in the persistent surface; an optional session-scoped
/// surface is consulted on read and always cleared alongside it.
pub struct CredentialStore {
    persistent: Box<dyn KeyValueStore>,
    session: Option<Box<dyn KeyValueStore>>,
}

impl CredentialStore {
    pub fn new(persistent: Box<dyn KeyValueStore>) -> Self {
        Self {
            persistent,
            session: None,
        }
    }

    /// Open the configured backend, with an in-memory session surface.
    pub fn open(backend: CredentialBackend, data_dir: &Path) -> Self {
        let persistent: Box<dyn KeyValueStore> = match backend {
            CredentialBackend::File => Box::new(FileStore::new(data_dir)),
            CredentialBackend::Keyring => Box::new(KeyringStore::new()),
        };
        debug!(?backend, "Credential store opened");
        Self::new(persistent).with_session_surface(Box::new(MemoryStore::new()))
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    pub fn with_session_surface(mut self, session: Box<dyn KeyValueStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// Current token. Unreadable storage counts as no token.
    pub fn token(&self) -> Option<String> {
        let surfaces = std::iter::once(&self.persistent).chain(self.session.as_ref());
        for surface in surfaces {
            match surface.get(TOKEN_KEY) {
                Ok(Some(token)) if !token.is_empty() => return Some(token),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Failed to read token"),
            }
        }
        None
    }

    pub fn has_token(&self) -> bool {
        self.token().is_some()
    }

    pub fn set_token(&self, token: &str) -> Result<()> {
        self.persistent.set(TOKEN_KEY, token)
    }

    /// Remove the token from every surface. Both are attempted even if the
    /// first fails; the first error is returned.
    pub fn clear_token(&self) -> Result<()> {
        let persistent = self.persistent.remove(TOKEN_KEY);
        let session = match self.session {
            Some(ref session) => session.remove(TOKEN_KEY),
            None => Ok(()),
        };
        persistent.and(session)
    }

    pub fn remembered_username(&self) -> Option<String> {
        let raw = match self.persistent.get(REMEMBERED_USER_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read remembered user");
                return None;
            }
        };
        match serde_json::from_str::<RememberedUser>(&raw) {
            Ok(record) => Some(record.username),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed remembered user record");
                None
            }
        }
    }

    pub fn remember_username(&self, username: &str) -> Result<()> {
        let record = serde_json::to_string(&RememberedUser {
            username: username.to_string(),
        })?;
        self.persistent.set(REMEMBERED_USER_KEY, &record)
    }

    pub fn forget_username(&self) -> Result<()> {
        self.persistent.remove(REMEMBERED_USER_KEY)
    }
}
