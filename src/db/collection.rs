//! Flat-file document collection.
//!
//! Each collection is a file holding one JSON document per line. The whole
//! file is loaded into memory on open; inserts append a line, every other
//! mutation rewrites the file through a temporary sibling and a rename.
//! All operations on one collection are serialized by a single async lock,
//! so a check followed by a write inside one call cannot interleave with
//! another writer.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::StoreError;

/// A record that can live in a [`Collection`].
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

/// An in-memory collection mirrored to a JSON-lines file.
pub struct Collection<T> {
    path: PathBuf,
    docs: Mutex<Vec<T>>,
}

impl<T: Document> Collection<T> {
    /// Open the collection, creating the file if it does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let docs = match fs::read_to_string(&path).await {
            Ok(content) => parse_lines(&path, &content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        tracing::debug!("Loaded {} documents from {:?}", docs.len(), path);

        Ok(Self {
            path,
            docs: Mutex::new(docs),
        })
    }

    /// All documents matching `filter`, in insertion order.
    pub async fn find(&self, filter: impl Fn(&T) -> bool) -> Vec<T> {
        let docs = self.docs.lock().await;
        docs.iter().filter(|d| filter(d)).cloned().collect()
    }

    /// The first document matching `filter`.
    pub async fn find_one(&self, filter: impl Fn(&T) -> bool) -> Option<T> {
        let docs = self.docs.lock().await;
        docs.iter().find(|d| filter(d)).cloned()
    }

    pub async fn count(&self) -> usize {
        self.docs.lock().await.len()
    }

    /// Store a document under a freshly generated id and return it.
    pub async fn insert(&self, doc: T) -> Result<T, StoreError> {
        let mut docs = self.docs.lock().await;
        self.insert_locked(&mut docs, doc).await
    }

    /// Store a document unless one matching `conflict` already exists.
    ///
    /// Returns `None` without writing when a conflicting document is present.
    pub async fn insert_unique(
        &self,
        doc: T,
        conflict: impl Fn(&T) -> bool,
    ) -> Result<Option<T>, StoreError> {
        let mut docs = self.docs.lock().await;
        if docs.iter().any(|d| conflict(d)) {
            return Ok(None);
        }
        self.insert_locked(&mut docs, doc).await.map(Some)
    }

    async fn insert_locked(&self, docs: &mut Vec<T>, mut doc: T) -> Result<T, StoreError> {
        doc.set_id(new_id());

        let mut line = serde_json::to_string(&doc).map_err(StoreError::Encode)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;

        tracing::trace!(id = doc.id(), "Inserted document into {:?}", self.path);
        docs.push(doc.clone());
        Ok(doc)
    }

    /// Apply `change` to every document matching `filter`; returns the match count.
    ///
    /// Matching and writing happen under one lock acquisition. Nothing is
    /// written when no document matches.
    pub async fn update(
        &self,
        filter: impl Fn(&T) -> bool,
        mut change: impl FnMut(&mut T),
    ) -> Result<usize, StoreError> {
        let mut docs = self.docs.lock().await;
        let mut next = docs.clone();
        let mut matched = 0;
        for doc in next.iter_mut().filter(|d| filter(d)) {
            change(doc);
            matched += 1;
        }
        if matched > 0 {
            self.rewrite(&next).await?;
            *docs = next;
        }
        Ok(matched)
    }

    /// Remove every document matching `filter` and return what was removed.
    pub async fn remove(&self, filter: impl Fn(&T) -> bool) -> Result<Vec<T>, StoreError> {
        let mut docs = self.docs.lock().await;
        let (removed, kept): (Vec<T>, Vec<T>) = docs.iter().cloned().partition(|d| filter(d));
        if !removed.is_empty() {
            self.rewrite(&kept).await?;
            *docs = kept;
        }
        Ok(removed)
    }

    /// Remove every document; returns how many there were.
    pub async fn clear(&self) -> Result<usize, StoreError> {
        let mut docs = self.docs.lock().await;
        let count = docs.len();
        self.rewrite(&[]).await?;
        docs.clear();
        Ok(count)
    }

    async fn rewrite(&self, docs: &[T]) -> Result<(), StoreError> {
        let mut content = String::new();
        for doc in docs {
            content.push_str(&serde_json::to_string(doc).map_err(StoreError::Encode)?);
            content.push('\n');
        }

        let tmp = temp_path(&self.path);
        fs::write(&tmp, content)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        Ok(())
    }
}

fn parse_lines<T: Document>(path: &Path, content: &str) -> Result<Vec<T>, StoreError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                line: index + 1,
                source,
            })
        })
        .collect()
}

/// Sibling path a rewrite goes through: the full file name plus `.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
