//! Single-file collection snapshots.
//!
//! A collection is stored as a JSON array of `{id, embedding, metadata}` with
//! a sibling descriptor `<stem>.meta.json`. Both files are written to temp
//! files in the target directory and renamed into place, so readers see either
//! the previous snapshot or the complete new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info, warn};

use semdex_core::types::{Collection, VectorRecord};
use semdex_core::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDescriptor {
    pub indexed_at: DateTime<Utc>,
    pub total_vectors: usize,
    pub embedding_model: String,
    pub dimensions: usize,
}

/// `dir/messages.json` -> `dir/messages.meta.json`
pub fn descriptor_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    path.with_file_name(format!("{stem}.meta.json"))
}

/// Write `collection` and its descriptor to `path`.
///
/// Blocking; nothing becomes visible at `path` unless both files were fully
/// written. If the descriptor cannot be moved into place the previous
/// snapshot is restored.
pub fn save(collection: &Collection, path: &Path, embedding_model: &str) -> Result<SnapshotDescriptor> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| Error::persistence(format!("create {}: {e}", dir.display())))?;

    let descriptor = SnapshotDescriptor {
        indexed_at: Utc::now(),
        total_vectors: collection.len(),
        embedding_model: embedding_model.to_string(),
        dimensions: collection.dimension(),
    };
    let records = serde_json::to_vec(collection.records()).map_err(Error::persistence)?;
    let meta = serde_json::to_vec_pretty(&descriptor).map_err(Error::persistence)?;

    let snapshot_tmp = write_temp(&dir, &records)?;
    let descriptor_tmp = write_temp(&dir, &meta)?;
    let backup = Backup::take(&dir, path)?;
    snapshot_tmp
        .persist(path)
        .map_err(|e| Error::persistence(format!("rename into {}: {}", path.display(), e.error)))?;
    let meta_path = descriptor_path(path);
    if let Err(e) = descriptor_tmp.persist(&meta_path) {
        backup.restore(path);
        return Err(Error::persistence(format!("rename into {}: {}", meta_path.display(), e.error)));
    }

    info!(path = %path.display(), vectors = descriptor.total_vectors, dim = descriptor.dimensions, "saved snapshot");
    Ok(descriptor)
}

/// The snapshot that was live before a save, kept until the new descriptor is in place.
struct Backup {
    dir: TempDir,
    saved: Option<PathBuf>,
}

impl Backup {
    fn take(dir: &Path, path: &Path) -> Result<Self> {
        let holder = tempfile::Builder::new()
            .prefix(".snapshot-backup")
            .tempdir_in(dir)
            .map_err(|e| Error::persistence(format!("backup dir in {}: {e}", dir.display())))?;
        if !path.is_file() {
            return Ok(Self { dir: holder, saved: None });
        }
        let saved = holder.path().join("previous.json");
        std::fs::hard_link(path, &saved)
            .or_else(|_| std::fs::copy(path, &saved).map(|_| ()))
            .map_err(|e| Error::persistence(format!("back up {}: {e}", path.display())))?;
        Ok(Self { dir: holder, saved: Some(saved) })
    }

    /// Put the previous snapshot back at `path`, or remove `path` if there was none.
    fn restore(self, path: &Path) {
        let outcome = match &self.saved {
            Some(saved) => std::fs::rename(saved, path),
            None => std::fs::remove_file(path),
        };
        if let Err(e) = outcome {
            warn!(path = %path.display(), error = %e, "could not roll back snapshot");
        }
        debug!(backup = %self.dir.path().display(), "rolled back snapshot");
    }
}

fn write_temp(dir: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::persistence(format!("temp file in {}: {e}", dir.display())))?;
    tmp.write_all(bytes).map_err(Error::persistence)?;
    tmp.as_file().sync_all().map_err(Error::persistence)?;
    Ok(tmp)
}

/// Read the snapshot at `path`; the collection is named after the file stem.
///
/// Records written under the legacy `vector` field name load unchanged.
pub async fn load(path: &Path) -> Result<Collection> {
    let bytes = read(path).await?;
    let records: Vec<VectorRecord> = serde_json::from_slice(&bytes)
        .map_err(|e| Error::persistence(format!("malformed snapshot {}: {e}", path.display())))?;
    let collection = Collection::new(stem(path), records)?;
    info!(path = %path.display(), vectors = collection.len(), dim = collection.dimension(), "loaded snapshot");
    Ok(collection)
}

pub async fn load_descriptor(path: &Path) -> Result<SnapshotDescriptor> {
    let meta_path = descriptor_path(path);
    let bytes = read(&meta_path).await?;
    debug!(path = %meta_path.display(), "read descriptor");
    serde_json::from_slice(&bytes).map_err(|e| Error::persistence(format!("malformed descriptor {}: {e}", meta_path.display())))
}

async fn read(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound {
            what: format!("collection snapshot {}", path.display()),
            hint: format!("run indexing first (`semdex-indexer --source {}`)", source_name(path)),
        },
        _ => Error::persistence(format!("read {}: {e}", path.display())),
    })
}

fn stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
}

/// Source name for hints; strips the `.meta` of descriptor stems.
fn source_name(path: &Path) -> String {
    let s = stem(path);
    s.strip_suffix(".meta").map(str::to_string).unwrap_or(s)
}
