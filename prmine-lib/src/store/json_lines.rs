//! A store backed by one JSON-lines file per collection.
//!
//! Inserts append to the collection file. Upserts rewrite the file through a temporary
//! sibling that is renamed into place, so a crash mid-write leaves the previous contents
//! intact. Writers take an in-process mutex and then an advisory lock on `store.lock`
//! in the store directory, so several processes sharing a data directory do not
//! interleave appends or lose each other's upserts.

use super::{Collection, Document, DocumentIter, Filter, RecordStore, UpsertOutcome, apply_fields, upsert_seed};
use crate::StoreError;
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

const LOG_TARGET: &str = "     store";

const LOCK_FILE_NAME: &str = "store.lock";

/// Guard that releases the store's advisory lock when dropped
#[derive(Debug)]
struct StoreLockGuard(File);

impl Drop for StoreLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.unlock() {
            log::warn!(target: LOG_TARGET, "Could not unlock store: {e:#}");
        }
    }
}

#[derive(Debug)]
pub struct JsonLinesStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(format!("creating store directory '{}'", dir.display()), e))?;

        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Block until this process holds the exclusive lock on the store directory.
    fn lock(&self) -> Result<StoreLockGuard, StoreError> {
        let lock_path = self.dir.join(LOCK_FILE_NAME);

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StoreError::io(format!("opening store lock file at '{}'", lock_path.display()), e))?;

        file.lock_exclusive()
            .map_err(|e| StoreError::io(format!("acquiring exclusive lock on '{}'", lock_path.display()), e))?;
        log::trace!(target: LOG_TARGET, "Acquired store lock at '{}'", lock_path.display());

        Ok(StoreLockGuard(file))
    }

    fn path(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.jsonl", collection.name()))
    }

    fn read_all(path: &Path) -> Result<Vec<Document>, StoreError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(format!("opening '{}'", path.display()), e)),
        };

        read_lines(BufReader::new(file), path.to_path_buf()).collect()
    }

    fn write_all(path: &Path, docs: &[Document]) -> Result<(), StoreError> {
        let tmp = path.with_extension("jsonl.tmp");

        {
            let file = File::create(&tmp).map_err(|e| StoreError::io(format!("creating '{}'", tmp.display()), e))?;
            let mut writer = BufWriter::new(file);
            for doc in docs {
                write_line(&mut writer, doc, &tmp)?;
            }
            writer.flush().map_err(|e| StoreError::io(format!("flushing '{}'", tmp.display()), e))?;
        }

        fs::rename(&tmp, path).map_err(|e| StoreError::io(format!("replacing '{}'", path.display()), e))
    }
}

fn write_line(writer: &mut impl Write, doc: &Document, path: &Path) -> Result<(), StoreError> {
    serde_json::to_writer(&mut *writer, doc).map_err(|e| StoreError::serde(format!("writing '{}'", path.display()), e))?;
    writer
        .write_all(b"\n")
        .map_err(|e| StoreError::io(format!("writing '{}'", path.display()), e))
}

fn read_lines(reader: impl BufRead + Send, path: PathBuf) -> impl Iterator<Item = Result<Document, StoreError>> + Send {
    reader.lines().enumerate().filter_map(move |(index, line)| {
        let line = match line {
            Ok(line) => line,
            Err(e) => return Some(Err(StoreError::io(format!("reading '{}'", path.display()), e))),
        };

        if line.trim().is_empty() {
            return None;
        }

        Some(
            serde_json::from_str::<Document>(&line)
                .map_err(|e| StoreError::serde(format!("parsing line {} of '{}'", index + 1, path.display()), e)),
        )
    })
}

impl RecordStore for JsonLinesStore {
    fn insert_many(&self, collection: Collection, documents: Vec<Document>) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _file_lock = self.lock()?;
        let path = self.path(collection);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(format!("opening '{}'", path.display()), e))?;
        let mut writer = BufWriter::new(file);

        for doc in &documents {
            write_line(&mut writer, doc, &path)?;
        }
        writer.flush().map_err(|e| StoreError::io(format!("flushing '{}'", path.display()), e))?;

        log::debug!(target: LOG_TARGET, "Appended {} document(s) to '{}'", documents.len(), path.display());
        Ok(documents.len())
    }

    fn find_all(&self, collection: Collection, filter: &Filter) -> Result<DocumentIter<'_>, StoreError> {
        let path = self.path(collection);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Box::new(core::iter::empty())),
            Err(e) => return Err(StoreError::io(format!("opening '{}'", path.display()), e)),
        };

        let filter = filter.clone();
        Ok(Box::new(
            read_lines(BufReader::new(file), path).filter(move |doc| doc.as_ref().map_or(true, |d| filter.is_match(d))),
        ))
    }

    fn upsert_fields(&self, collection: Collection, filter: &Filter, fields: &Document) -> Result<UpsertOutcome, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _file_lock = self.lock()?;
        let path = self.path(collection);
        let mut docs = Self::read_all(&path)?;

        let mut outcome = UpsertOutcome::default();
        for doc in docs.iter_mut().filter(|doc| filter.is_match(doc)) {
            apply_fields(doc, fields);
            outcome.matched += 1;
        }

        if outcome.matched == 0 {
            docs.push(upsert_seed(filter, fields));
            outcome.inserted = true;
        }

        Self::write_all(&path, &docs)?;

        log::debug!(
            target: LOG_TARGET,
            "Upserted into '{}': {} matched, inserted: {}",
            path.display(),
            outcome.matched,
            outcome.inserted
        );
        Ok(outcome)
    }
}
