#![forbid(unsafe_code)]

//! Persistent component state across renderer sessions.
//!
//! A [`StateStore`] is an optional renderer collaborator: key to
//! serialized bytes, restored once before the first parameters-set and
//! persisted on explicit snapshot requests. Components reach it through
//! their `LifecycleCtx`: `on_init` takes restored entries, and registers
//! persist callbacks that run when the host asks for a snapshot.
//!
//! Snapshot requests carry a [`PersistScenario`] tag; a callback can
//! opt in or out per scenario, so state that only makes sense on a
//! reconnect is not written on a fresh first load.
//!
//! # Design Invariants
//!
//! 1. **Graceful degradation**: storage failures never panic; every
//!    operation returns `Result`.
//! 2. **Atomic writes**: file storage writes to a temp file and renames
//!    over the target, so a crash never leaves a half-written store.
//! 3. **Type safety at the boundary**: the store is byte-oriented
//!    internally; JSON helpers are feature-gated conveniences.
//!
//! # Feature Gates
//!
//! - `state-persistence`: enables [`FileStorage`] and the JSON helpers.
//!   Without it, only [`MemoryStorage`] is available.

use std::collections::HashMap;
use std::fmt;

#[cfg(feature = "state-persistence")]
use base64::Engine as _;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during state storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations.
    Io(std::io::Error),
    /// Serialization or deserialization error.
    #[cfg(feature = "state-persistence")]
    Serialization(String),
    /// Storage file is corrupted or has an invalid format.
    Corruption(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "state-persistence")]
            StorageError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StorageError::Corruption(msg) => write!(f, "storage corruption: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ─────────────────────────────────────────────────────────────────────────────
// Storage Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Pluggable persistence backend: a whole-store load and a whole-store
/// save. Partial updates are the store's concern, not the backend's.
pub trait StorageBackend {
    fn load(&mut self) -> StorageResult<HashMap<String, Vec<u8>>>;
    fn save(&mut self, entries: &HashMap<String, Vec<u8>>) -> StorageResult<()>;
}

/// In-memory backend for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed entries, standing in for a previous session's snapshot.
    pub fn with_entries(entries: HashMap<String, Vec<u8>>) -> Self {
        MemoryStorage { entries }
    }

    pub fn entries(&self) -> &HashMap<String, Vec<u8>> {
        &self.entries
    }
}

impl StorageBackend for MemoryStorage {
    fn load(&mut self) -> StorageResult<HashMap<String, Vec<u8>>> {
        Ok(self.entries.clone())
    }

    fn save(&mut self, entries: &HashMap<String, Vec<u8>>) -> StorageResult<()> {
        self.entries = entries.clone();
        Ok(())
    }
}

/// JSON file backend. The on-disk format is a single JSON object of
/// key to base64-encoded bytes.
#[cfg(feature = "state-persistence")]
pub struct FileStorage {
    path: std::path::PathBuf,
}

#[cfg(feature = "state-persistence")]
impl FileStorage {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        FileStorage { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[cfg(feature = "state-persistence")]
impl StorageBackend for FileStorage {
    fn load(&mut self) -> StorageResult<HashMap<String, Vec<u8>>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        let encoded: HashMap<String, String> = serde_json::from_str(&raw)
            .map_err(|e| StorageError::Corruption(format!("invalid store file: {e}")))?;
        let mut entries = HashMap::with_capacity(encoded.len());
        for (key, value) in encoded {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(&value)
                .map_err(|e| {
                    StorageError::Corruption(format!("entry {key:?} is not valid base64: {e}"))
                })?;
            entries.insert(key, bytes);
        }
        Ok(entries)
    }

    fn save(&mut self, entries: &HashMap<String, Vec<u8>>) -> StorageResult<()> {
        let encoded: HashMap<&str, String> = entries
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str(),
                    base64::engine::general_purpose::STANDARD.encode(v),
                )
            })
            .collect();
        let json = serde_json::to_string(&encoded)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        // Write-rename so a crash mid-write never corrupts the store.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State Store
// ─────────────────────────────────────────────────────────────────────────────

/// Why a snapshot is being taken. Persist callbacks can opt in or out
/// per scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistScenario {
    /// First load of the application.
    FirstLoad,
    /// Reconnecting to an existing session.
    Reconnect,
}

/// Collects entries during one snapshot.
#[derive(Debug, Default)]
pub struct StateWriter {
    entries: HashMap<String, Vec<u8>>,
}

impl StateWriter {
    pub fn persist_bytes(&mut self, key: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(key.into(), bytes);
    }

    #[cfg(feature = "state-persistence")]
    pub fn persist_json<T: serde::Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> StorageResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.persist_bytes(key, bytes);
        Ok(())
    }
}

type PersistFn = Box<dyn Fn(&mut StateWriter)>;
type ScenarioFilter = Box<dyn Fn(PersistScenario) -> bool>;

struct Persister {
    callback: PersistFn,
    /// `None` means all scenarios.
    filter: Option<ScenarioFilter>,
}

/// Renderer-side persistent state collaborator.
pub struct StateStore {
    backend: Box<dyn StorageBackend>,
    restored: HashMap<String, Vec<u8>>,
    persisters: Vec<Persister>,
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("restored", &self.restored.len())
            .field("persisters", &self.persisters.len())
            .finish()
    }
}

impl StateStore {
    /// Create a store and load the previous snapshot from the backend.
    pub fn load(mut backend: Box<dyn StorageBackend>) -> StorageResult<Self> {
        let restored = backend.load()?;
        Ok(StateStore {
            backend,
            restored,
            persisters: Vec::new(),
        })
    }

    /// Take a restored entry. Each entry can be consumed once; missing
    /// keys are `None`, which callers treat as "start fresh".
    pub fn take_bytes(&mut self, key: &str) -> Option<Vec<u8>> {
        self.restored.remove(key)
    }

    #[cfg(feature = "state-persistence")]
    pub fn take_json<T: serde::de::DeserializeOwned>(
        &mut self,
        key: &str,
    ) -> StorageResult<Option<T>> {
        match self.take_bytes(key) {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::Serialization(format!("entry {key:?}: {e}"))),
        }
    }

    /// Register a persist callback that runs on every snapshot.
    pub fn register_persister(&mut self, callback: impl Fn(&mut StateWriter) + 'static) {
        self.persisters.push(Persister {
            callback: Box::new(callback),
            filter: None,
        });
    }

    /// Register a persist callback limited to scenarios the filter
    /// accepts.
    pub fn register_persister_for(
        &mut self,
        filter: impl Fn(PersistScenario) -> bool + 'static,
        callback: impl Fn(&mut StateWriter) + 'static,
    ) {
        self.persisters.push(Persister {
            callback: Box::new(callback),
            filter: Some(Box::new(filter)),
        });
    }

    /// Run all persisters that accept `scenario` and save the combined
    /// entries to the backend.
    pub fn snapshot(&mut self, scenario: PersistScenario) -> StorageResult<()> {
        let mut writer = StateWriter::default();
        for persister in &self.persisters {
            let wanted = persister
                .filter
                .as_ref()
                .is_none_or(|filter| filter(scenario));
            if wanted {
                (persister.callback)(&mut writer);
            }
        }
        self.backend.save(&writer.entries)
    }
}
