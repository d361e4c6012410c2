//! Persistent log entry storage
//!
//! The store is treated as an opaque object store: entries go in and out
//! as whole records, serialized as JSON. Field-level encryption happens
//! above this layer, but the sled store refuses to persist an entry whose
//! content is still plaintext.

use sled::Db;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use uuid::Uuid;

use crate::errors::{EatLockError, EatLockResult};
use crate::log_entry::LogEntry;

/// Storage abstraction for log entries.
pub trait LogStore: Send + Sync {
    fn put(&self, entry: &LogEntry) -> EatLockResult<()>;
    fn get(&self, id: &Uuid) -> EatLockResult<Option<LogEntry>>;
    fn remove(&self, id: &Uuid) -> EatLockResult<()>;
    fn list(&self) -> EatLockResult<Vec<LogEntry>>;
}

/// Sled-backed store, the production implementation.
pub struct SledLogStore {
    db: Db,
}

impl SledLogStore {
    pub fn open<P: AsRef<Path>>(path: P) -> EatLockResult<Self> {
        let db = sled::open(path)
            .map_err(|e| EatLockError::database("opening sled database", e))?;
        Ok(Self { db })
    }
}

impl LogStore for SledLogStore {
    fn put(&self, entry: &LogEntry) -> EatLockResult<()> {
        if !entry.content.is_encrypted() {
            return Err(EatLockError::validation(
                "content",
                "refusing to persist plaintext content",
            ));
        }

        let serialized = serde_json::to_vec(entry)
            .map_err(|e| EatLockError::serialization("log entry", e))?;
        self.db
            .insert(entry.id.as_bytes(), serialized)
            .map_err(|e| EatLockError::database("writing log entry", e))?;
        self.db
            .flush()
            .map_err(|e| EatLockError::database("flushing log entry", e))?;
        Ok(())
    }

    fn get(&self, id: &Uuid) -> EatLockResult<Option<LogEntry>> {
        let value = self
            .db
            .get(id.as_bytes())
            .map_err(|e| EatLockError::database("reading log entry", e))?;
        match value {
            Some(ivec) => {
                let entry = serde_json::from_slice(&ivec)
                    .map_err(|e| EatLockError::serialization("log entry", e))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    fn remove(&self, id: &Uuid) -> EatLockResult<()> {
        self.db
            .remove(id.as_bytes())
            .map_err(|e| EatLockError::database("removing log entry", e))?;
        self.db
            .flush()
            .map_err(|e| EatLockError::database("flushing removal", e))?;
        Ok(())
    }

    fn list(&self) -> EatLockResult<Vec<LogEntry>> {
        let mut entries = Vec::new();
        for item in self.db.iter() {
            let (_, value) = item.map_err(|e| EatLockError::database("iterating entries", e))?;
            let entry: LogEntry = serde_json::from_slice(&value)
                .map_err(|e| EatLockError::serialization("log entry", e))?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// In-memory store for tests and fakes.
#[derive(Default)]
pub struct MemoryLogStore {
    entries: RwLock<HashMap<Uuid, LogEntry>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogStore for MemoryLogStore {
    fn put(&self, entry: &LogEntry) -> EatLockResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| EatLockError::internal("memory store lock poisoned"))?;
        entries.insert(entry.id, entry.clone());
        Ok(())
    }

    fn get(&self, id: &Uuid) -> EatLockResult<Option<LogEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| EatLockError::internal("memory store lock poisoned"))?;
        Ok(entries.get(id).cloned())
    }

    fn remove(&self, id: &Uuid) -> EatLockResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| EatLockError::internal("memory store lock poisoned"))?;
        entries.remove(id);
        Ok(())
    }

    fn list(&self) -> EatLockResult<Vec<LogEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| EatLockError::internal("memory store lock poisoned"))?;
        Ok(entries.values().cloned().collect())
    }
}
