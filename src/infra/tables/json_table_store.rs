use crate::core::moderation::{DataFile, ModerationError, TableStore};
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File-per-table store. Each `DataFile` lives at `<dir>/<name>.json`.
pub struct JsonTableStore {
    dir: PathBuf,
}

fn storage_error(path: &Path, e: std::io::Error) -> ModerationError {
    ModerationError::StorageError(format!("{}: {}", path.display(), e))
}

impl JsonTableStore {
    /// Create the store, making sure the directory exists.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, ModerationError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_error(&dir, e))?;
        Ok(Self { dir })
    }

    fn path(&self, file: DataFile) -> PathBuf {
        self.dir.join(format!("{}.json", file.name()))
    }
}

#[async_trait]
impl TableStore for JsonTableStore {
    async fn save(&self, file: DataFile, value: &Value) -> Result<(), ModerationError> {
        let path = self.path(file);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(value)?;

        // Write next to the target, then swap it in.
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| storage_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| storage_error(&path, e))
    }

    async fn load(&self, file: DataFile) -> Result<Option<Value>, ModerationError> {
        let path = self.path(file);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error(&path, e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
