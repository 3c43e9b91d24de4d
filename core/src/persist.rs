use crate::error::{PersistError, Result, StoreError};
use crate::features::{DIMENSION, MAX_KEYWORDS};
use crate::index::DocumentIndex;
use crate::DocumentIndexEntry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, create_dir_all};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Durable string store the corpus is mirrored into.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn flush(&self) -> Result<(), StoreError> { Ok(()) }
}

/// Process-local store. Clones share the same map, which lets a second
/// engine observe what the first one wrote.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// One file per key under `root`, named `{key}.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    pub root: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn path(&self, key: &str) -> PathBuf { self.root.join(format!("{key}.json")) }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        create_dir_all(&self.root)?;
        fs::write(self.path(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Embedded sled database.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self { db: sled::open(path)? })
    }

    /// Database deleted when the last handle drops.
    pub fn temporary() -> Result<Self, StoreError> {
        Ok(Self { db: sled::Config::new().temporary(true).open()? })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.db.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(String::from_utf8(bytes.to_vec())?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.db.insert(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.db.remove(key.as_bytes())?;
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct SnapshotOut<'a> {
    version: u32,
    saved_at: String,
    documents: &'a [DocumentIndexEntry],
}

#[derive(Deserialize)]
struct SnapshotIn {
    version: u32,
    documents: Vec<DocumentIndexEntry>,
}

pub fn encode_corpus(index: &DocumentIndex) -> Result<String> {
    let snapshot = SnapshotOut {
        version: SNAPSHOT_VERSION,
        saved_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        documents: index.entries(),
    };
    serde_json::to_string(&snapshot).map_err(PersistError::Encode)
}

pub fn decode_corpus(payload: &str) -> Result<DocumentIndex> {
    let snapshot: SnapshotIn = serde_json::from_str(payload).map_err(PersistError::Corrupt)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(PersistError::UnsupportedVersion(snapshot.version));
    }
    for entry in &snapshot.documents {
        validate(entry)?;
    }
    Ok(DocumentIndex::from_entries(snapshot.documents))
}

fn validate(entry: &DocumentIndexEntry) -> Result<()> {
    let invalid = |reason: String| PersistError::Invalid { document_id: entry.id.clone(), reason };
    if entry.pages.is_empty() {
        return Err(invalid("no pages".into()));
    }
    let mut previous = 0u32;
    for page in &entry.pages {
        if page.page_number <= previous {
            return Err(invalid(format!("page {} out of order", page.page_number)));
        }
        previous = page.page_number;
        if page.embedding.len() != DIMENSION {
            return Err(invalid(format!("page {} has {} coordinates", page.page_number, page.embedding.len())));
        }
        if page.keywords.len() > MAX_KEYWORDS {
            return Err(invalid(format!("page {} has {} keywords", page.page_number, page.keywords.len())));
        }
    }
    Ok(())
}

/// Corpus persistence over a `KeyValueStore`: one key, full rewrite per save.
pub struct CorpusStore<S> {
    store: S,
    key: String,
    max_payload_bytes: Option<usize>,
}

impl<S: KeyValueStore> CorpusStore<S> {
    pub fn new(store: S, key: impl Into<String>, max_payload_bytes: Option<usize>) -> Self {
        Self { store, key: key.into(), max_payload_bytes }
    }

    pub fn store(&self) -> &S { &self.store }

    /// `Ok(None)` when nothing has been persisted yet.
    pub fn load(&self) -> Result<Option<DocumentIndex>> {
        match self.store.get(&self.key)? {
            Some(payload) => decode_corpus(&payload).map(Some),
            None => Ok(None),
        }
    }

    pub fn save(&self, index: &DocumentIndex) -> Result<()> {
        let payload = encode_corpus(index)?;
        if let Some(limit) = self.max_payload_bytes {
            if payload.len() > limit {
                return Err(PersistError::CapacityExceeded { size: payload.len(), limit });
            }
        }
        self.store.set(&self.key, &payload)?;
        Ok(())
    }

    pub fn erase(&self) -> Result<()> {
        self.store.remove(&self.key)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.store.flush()?;
        Ok(())
    }
}
