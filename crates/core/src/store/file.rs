//! Filesystem-backed context store.
//!
//! Layout under the store root:
//!
//! ```text
//! contexts/
//! └── <run_id>/
//!     └── context.json
//! ```

use super::{ContextStore, StoreError, StoreResult};
use async_trait::async_trait;
use qap_protocol::run_models::RunContext;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const CONTEXT_FILE: &str = "context.json";

/// Stores each run context as a pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct FileContextStore {
    root: PathBuf,
}

impl FileContextStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding everything stored for one run.
    pub fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.root.join("contexts").join(run_id.to_string())
    }

    /// Path of the context document for one run.
    pub fn context_path(&self, run_id: Uuid) -> PathBuf {
        self.run_dir(run_id).join(CONTEXT_FILE)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `content` and flush it to disk before returning.
async fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(content).await?;
    file.sync_all().await
}

/// Persist the directory entry created by a rename.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl ContextStore for FileContextStore {
    async fn save(&self, ctx: &RunContext) -> StoreResult<()> {
        let dir = self.run_dir(ctx.run_id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| io_error(&dir, source))?;

        let content =
            serde_json::to_vec_pretty(ctx).map_err(|source| StoreError::Serialization {
                run_id: ctx.run_id,
                source,
            })?;

        // Write to a uniquely named sibling, then rename over the target so a
        // reader sees either the old or the new document.
        let path = dir.join(CONTEXT_FILE);
        let temp_path = dir.join(format!("{CONTEXT_FILE}.{}.tmp", Uuid::new_v4()));
        if let Err(source) = write_synced(&temp_path, &content).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(io_error(&temp_path, source));
        }
        if let Err(source) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(io_error(&path, source));
        }
        sync_dir(&dir).await.map_err(|source| io_error(&dir, source))?;

        tracing::debug!(run_id = %ctx.run_id, path = %path.display(), "context saved");
        Ok(())
    }

    async fn load(&self, run_id: Uuid) -> StoreResult<RunContext> {
        let path = self.context_path(run_id);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(run_id)),
            Err(source) => return Err(io_error(&path, source)),
        };

        serde_json::from_slice(&content)
            .map_err(|source| StoreError::Serialization { run_id, source })
    }

    async fn delete(&self, run_id: Uuid) -> StoreResult<()> {
        let dir = self.run_dir(run_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::debug!(run_id = %run_id, "context deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_error(&dir, source)),
        }
    }
}
