//! Content fingerprints for change detection.
//!
//! A fingerprint is the lowercase hex SHA-256 of a file's bytes, recorded
//! together with the byte length so cheap size checks can run first.

use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::fs::FileSystem;

/// Error computing a fingerprint.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HashError {
    /// The computer was shut down
    #[error("hash computer has been disposed")]
    Disposed,
    /// The file could not be read
    #[error("failed to hash '{path}': {source}")]
    Io { path: String, source: std::io::Error },
}

/// Length and checksum of a file at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileFingerprint {
    /// Size in bytes
    pub length: u64,
    /// Hex SHA-256 of the contents
    pub checksum: String,
}

/// Computes fingerprints. Shared by all build workers.
#[derive(Debug, Default)]
pub struct HashComputer {
    disposed: AtomicBool,
}

impl HashComputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint a byte slice.
    pub fn hash_bytes(&self, data: &[u8]) -> Result<String, HashError> {
        self.ensure_live()?;
        Ok(hex::encode(Sha256::digest(data)))
    }

    /// Fingerprint a file's current contents.
    pub fn hash_file(&self, fs: &dyn FileSystem, path: &Path) -> Result<FileFingerprint, HashError> {
        self.ensure_live()?;
        let io_err = |source| HashError::Io { path: path.display().to_string(), source };

        let mut reader = fs.open_read(path).map_err(io_err)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        let mut length = 0u64;
        loop {
            let n = reader.read(&mut buf).map_err(io_err)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            length += n as u64;
        }

        Ok(FileFingerprint { length, checksum: hex::encode(hasher.finalize()) })
    }

    /// Only the current length of a file.
    pub fn file_len(&self, fs: &dyn FileSystem, path: &Path) -> Result<u64, HashError> {
        self.ensure_live()?;
        fs.file_len(path).map_err(|source| HashError::Io { path: path.display().to_string(), source })
    }

    /// Shut the computer down. Later calls fail with [`HashError::Disposed`].
    pub fn shutdown(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<(), HashError> {
        if self.is_disposed() {
            Err(HashError::Disposed)
        } else {
            Ok(())
        }
    }
}
