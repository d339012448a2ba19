//! Record store.
//!
//! Two flat-file collections (items and users) loaded fully into memory at
//! startup. The store is the only component that mutates records.

mod collection;
mod repository;
mod seed;

pub use collection::*;
pub use repository::*;
pub use seed::*;

use std::path::{Path, PathBuf};

/// Record store failure.
#[derive(Debug)]
pub enum StoreError {
    /// Backing file could not be read or written
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A line of the backing file is not a valid document
    Corrupt {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
    /// A document could not be serialized
    Encode(serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io { path, source } => {
                write!(f, "Storage error on {}: {}", path.display(), source)
            }
            StoreError::Corrupt { path, line, source } => {
                write!(
                    f,
                    "Corrupt document at {}:{}: {}",
                    path.display(),
                    line,
                    source
                )
            }
            StoreError::Encode(source) => write!(f, "Could not encode document: {}", source),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::Corrupt { source, .. } => Some(source),
            StoreError::Encode(source) => Some(source),
        }
    }
}

/// Open both collections. Any failure here is fatal for startup.
pub async fn init_stores(
    item_path: &Path,
    user_path: &Path,
) -> Result<(AlimentRepository, UserRepository), StoreError> {
    let aliments = AlimentRepository::open(item_path).await?;
    let users = UserRepository::open(user_path).await?;
    Ok((aliments, users))
}
