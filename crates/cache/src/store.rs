//! Filesystem persistence for cached payloads
//!
//! One file per cache key, stored directly under the cache directory. Keys
//! that are not safe filenames are mapped to `~` followed by the hex SHA-256
//! of the key. `~` never appears in a safe key, so the two kinds of name
//! cannot collide.

use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Prefix of file names derived from hashing an unsafe key
pub const HASHED_PREFIX: char = '~';

/// Counter used to give concurrent temp files distinct names
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A payload file found in the store directory
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// File name, which is the cache key for safe keys
    pub name: String,
    /// Full path to the payload
    pub path: PathBuf,
    /// Last modification time
    pub modified: SystemTime,
}

/// Directory-backed payload store
#[derive(Debug, Clone)]
pub struct DurableStore {
    dir: PathBuf,
}

impl DurableStore {
    /// Open a store rooted at `dir`, creating it (and its parents) if needed.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created or is not writable.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if dir.as_os_str().is_empty() {
            return Err(Error::configuration("cache directory must not be empty"));
        }
        fs::create_dir_all(&dir).map_err(|e| Error::io(e, &dir, "create_dir_all"))?;

        // The directory may exist but be read-only (mounted volumes, CI caches)
        let probe = dir.join(".write_probe");
        fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&probe)
            .map_err(|e| Error::io(e, &probe, "write_probe"))?;
        let _ = fs::remove_file(&probe);

        tracing::debug!(dir = %dir.display(), "Opened durable store");
        Ok(Self { dir })
    }

    /// Root directory of the store
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Storage location for a key
    #[must_use]
    pub fn location(&self, key: &str) -> PathBuf {
        if is_safe_key(key) {
            self.dir.join(key)
        } else {
            let digest = hex::encode(Sha256::digest(key.as_bytes()));
            self.dir.join(format!("{HASHED_PREFIX}{digest}"))
        }
    }

    /// Write a payload, replacing any previous content.
    ///
    /// The bytes land in a hidden temp file first and are renamed into place,
    /// so a concurrent reader sees either the old or the new payload.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the temp file cannot be written or renamed.
    pub fn write(&self, location: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = temp_path(location);
        fs::write(&tmp, bytes).map_err(|e| Error::io(e, &tmp, "write"))?;
        if let Err(e) = fs::rename(&tmp, location) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::io(e, location, "rename"));
        }
        Ok(())
    }

    /// Read a payload.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file is missing or unreadable.
    pub fn read(&self, location: &Path) -> Result<Vec<u8>> {
        fs::read(location).map_err(|e| Error::io(e, location, "read"))
    }

    /// Delete a payload. A file that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns an I/O error for any failure other than the file not existing.
    pub fn delete(&self, location: &Path) -> Result<()> {
        match fs::remove_file(location) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(e, location, "remove_file")),
        }
    }

    /// List payload files, skipping hidden files, temp files and directories.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be listed.
    pub fn entries(&self) -> Result<Vec<StoredFile>> {
        let mut files = Vec::new();
        let read_dir = fs::read_dir(&self.dir).map_err(|e| Error::io(e, &self.dir, "read_dir"))?;

        for entry in read_dir {
            let entry = entry.map_err(|e| Error::io(e, &self.dir, "read_dir_entry"))?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            files.push(StoredFile {
                path: entry.path(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                name,
            });
        }

        Ok(files)
    }
}

/// Whether a key can be used verbatim as a file name
#[must_use]
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key.len() <= 200
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
}

fn temp_path(location: &Path) -> PathBuf {
    let name = location
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(".{name}.tmp-{}-{seq}", std::process::id());
    location.with_file_name(tmp_name)
}
