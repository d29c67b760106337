//! Durable record of files already submitted to the gateway.
//!
//! The backing file is a newline-delimited list of names. It is read once on
//! open and only ever appended to afterwards; every append is synced to disk
//! before the in-memory set is updated.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from the on-disk ingested set
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to read ingested set {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to append to ingested set {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("File name cannot be stored in a line-delimited record: {0:?}")]
    UnrepresentableName(String),
}

/// Set of file names that have been successfully submitted
#[derive(Debug)]
pub struct IngestedStore {
    path: PathBuf,
    entries: HashSet<String>,
    /// Last line on disk has no terminator (interrupted append)
    needs_newline: bool,
}

impl IngestedStore {
    /// Open the store, loading every previously recorded name
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(source) => return Err(PersistenceError::Read { path, source }),
        };

        let entries: HashSet<String> = contents
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        let needs_newline = !contents.is_empty() && !contents.ends_with('\n');

        info!(
            path = %path.display(),
            entries = entries.len(),
            "Loaded ingested file set"
        );

        Ok(Self {
            path,
            entries,
            needs_newline,
        })
    }

    /// Whether the file has already been submitted
    pub fn contains(&self, file_name: &str) -> bool {
        self.entries.contains(file_name)
    }

    /// Whether a name can be stored as a single line
    pub fn is_recordable(file_name: &str) -> bool {
        !file_name.is_empty() && !file_name.contains(['\n', '\r'])
    }

    /// Durably record a submitted file. Recording a known name is a no-op.
    pub fn record(&mut self, file_name: &str) -> Result<(), PersistenceError> {
        if self.contains(file_name) {
            return Ok(());
        }
        if !Self::is_recordable(file_name) {
            return Err(PersistenceError::UnrepresentableName(file_name.to_string()));
        }

        self.append_line(file_name)
            .map_err(|source| PersistenceError::Write {
                path: self.path.clone(),
                source,
            })?;

        self.needs_newline = false;
        self.entries.insert(file_name.to_string());

        debug!(file_name = %file_name, "Recorded ingested file");
        Ok(())
    }

    fn append_line(&self, file_name: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut line = String::with_capacity(file_name.len() + 2);
        if self.needs_newline {
            line.push('\n');
        }
        line.push_str(file_name);
        line.push('\n');

        file.write_all(line.as_bytes())?;
        file.sync_data()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_path(dir: &TempDir) -> PathBuf {
        dir.path().join("IngestedFiles.txt")
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let store = IngestedStore::open(store_path(&dir)).unwrap();
        assert!(store.is_empty());
        assert!(!store.contains("scan1.tif"));
    }

    #[test]
    fn test_record_then_contains() {
        let dir = TempDir::new().unwrap();
        let mut store = IngestedStore::open(store_path(&dir)).unwrap();
        assert_eq!(store.path(), store_path(&dir).as_path());

        store.record("scan1.tif").unwrap();

        assert!(store.contains("scan1.tif"));
        assert!(!store.contains("scan1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_record_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let mut store = IngestedStore::open(&path).unwrap();

        store.record("scan1.tif").unwrap();
        store.record("scan1.tif").unwrap();

        assert!(store.contains("scan1.tif"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "scan1.tif\n");
    }

    #[test]
    fn test_reload_after_restart() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        {
            let mut store = IngestedStore::open(&path).unwrap();
            store.record("scan1.tif").unwrap();
            store.record("cloud1.laz").unwrap();
        }

        let reopened = IngestedStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.contains("scan1.tif"));
        assert!(reopened.contains("cloud1.laz"));
        assert!(!reopened.contains("readme.txt"));
    }

    #[test]
    fn test_membership_is_exact_not_substring() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        fs::write(&path, "data/scan10.tif\n").unwrap();

        let store = IngestedStore::open(&path).unwrap();
        assert!(!store.contains("scan1.tif"));
        assert!(!store.contains("scan10.tif"));
        assert!(store.contains("data/scan10.tif"));
    }

    #[test]
    fn test_blank_and_crlf_lines() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        fs::write(&path, "a.tif\r\n\nb.laz\n").unwrap();

        let store = IngestedStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains("a.tif"));
        assert!(store.contains("b.laz"));
    }

    #[test]
    fn test_unterminated_last_line_is_repaired() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        fs::write(&path, "a.tif").unwrap();

        let mut store = IngestedStore::open(&path).unwrap();
        store.record("b.laz").unwrap();
        store.record("c.zip").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "a.tif\nb.laz\nc.zip\n");
        let reopened = IngestedStore::open(&path).unwrap();
        assert!(reopened.contains("a.tif"));
        assert!(reopened.contains("b.laz"));
    }

    #[test]
    fn test_unrepresentable_name_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let mut store = IngestedStore::open(&path).unwrap();

        let result = store.record("evil\nname.tif");
        assert!(matches!(result, Err(PersistenceError::UnrepresentableName(_))));
        assert!(store.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_unreadable_store_fails() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be read as a file
        let result = IngestedStore::open(dir.path());
        assert!(matches!(result, Err(PersistenceError::Read { .. })));
    }

    #[test]
    fn test_unwritable_store_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("IngestedFiles.txt");
        let mut store = IngestedStore::open(&path).unwrap();

        let result = store.record("scan1.tif");
        assert!(matches!(result, Err(PersistenceError::Write { .. })));
        assert!(!store.contains("scan1.tif"));
    }
}
