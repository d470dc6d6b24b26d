//! Local storage errors
//!
//! Every variant names the file or key involved. Variants the user can act
//! on carry a [`StorageError::recovery_suggestion`] shown by the CLI.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Permission denied for '{path}'")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No space left while writing '{path}'")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The value under `key` was unreadable and has been set aside
    #[error("Stored '{key}' is unreadable ({details}); saved a copy to '{backup_path}'")]
    CorruptValue {
        key: String,
        backup_path: PathBuf,
        details: String,
    },

    /// JSON encoding or decoding of a stored value failed
    #[error("Invalid JSON for '{key}': {source}")]
    InvalidFormat {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{path}' does not exist")]
    NotFound { path: PathBuf },

    /// The temp file was written but could not replace the target
    #[error("Cannot move '{from}' into place at '{to}': {source}")]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Classify an I/O failure on `path` by its kind
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                path,
                source: error,
            },
            io::ErrorKind::NotFound => StorageError::NotFound { path },
            _ if out_of_space(&error) => StorageError::DiskFull {
                path,
                source: error,
            },
            _ => StorageError::WriteError {
                path,
                source: error,
            },
        }
    }

    /// What the user can do about this error, if anything
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::DiskFull { .. } => Some("Free up disk space and try again."),
            StorageError::PermissionDenied { .. } | StorageError::CreateDirectory { .. } => {
                Some("Check that the data directory is writable, or set data_dir in the config.")
            }
            StorageError::CorruptValue { .. } => {
                Some("If sync is enabled, run `horizons sync` to restore tasks from the cloud.")
            }
            _ => None,
        }
    }
}

fn out_of_space(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    ["no space left", "disk full", "quota exceeded", "not enough space"]
        .iter()
        .any(|needle| msg.contains(needle))
}

pub type StorageResult<T> = Result<T, StorageError>;
