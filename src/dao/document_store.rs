//! Single-document persistence. Each store owns exactly one JSON document and
//! offers last-write-wins load/save, nothing more.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::dao::storage::{StorageError, StorageResult};

/// Load/save contract for one logical JSON document.
pub trait DocumentStore: Send + Sync {
    /// Current document. An empty object when nothing was ever saved.
    fn root(&self) -> StorageResult<Value>;

    /// Replace the stored document.
    fn save(&self, document: &Value) -> StorageResult<()>;
}

/// Document store writing pretty-printed JSON to a local file.
///
/// Every write goes to its own temp file next to the document and is renamed
/// into place, so a crash mid-write leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store the document at `path`; parent directories are created on save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentStore for JsonFileStore {
    fn root(&self) -> StorageResult<Value> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Value::Object(Map::new()));
            }
            Err(err) => {
                return Err(StorageError::unavailable(
                    format!("reading `{}`", self.path.display()),
                    err,
                ));
            }
        };

        if contents.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        serde_json::from_str(&contents).map_err(|source| {
            StorageError::corrupt(format!("parsing `{}`", self.path.display()), source)
        })
    }

    fn save(&self, document: &Value) -> StorageResult<()> {
        let text = serde_json::to_string_pretty(document).map_err(|source| {
            StorageError::corrupt(format!("encoding `{}`", self.path.display()), source)
        })?;
        write_text_atomic(&self.path, &text).map_err(|err| {
            StorageError::unavailable(format!("writing `{}`", self.path.display()), err)
        })
    }
}

fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(text.as_bytes())?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// In-memory document store, used for tests and for running without a data
/// directory.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    document: Mutex<Option<Value>>,
    saves: AtomicUsize,
}

impl MemoryDocumentStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `document`, as if it had been saved earlier.
    pub fn with_document(document: Value) -> Self {
        Self {
            document: Mutex::new(Some(document)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn root(&self) -> StorageResult<Value> {
        let guard = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.clone().unwrap_or_else(|| Value::Object(Map::new())))
    }

    fn save(&self, document: &Value) -> StorageResult<()> {
        let mut guard = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(document.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
