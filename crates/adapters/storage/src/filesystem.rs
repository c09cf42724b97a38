//! 基于本地目录的 `ObjectStorage`

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use mailroom_errors::{AppError, AppResult};
use mailroom_ports::ObjectStorage;
use tokio::fs;
use tracing::debug;

/// 文件系统存储
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    base_path: PathBuf,
}

impl FileSystemStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// 创建根目录
    pub async fn initialize(&self) -> AppResult<()> {
        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            AppError::internal(format!(
                "Failed to create storage directory {}: {}",
                self.base_path.display(),
                e
            ))
        })
    }

    /// key 只允许普通路径段，不能逃出根目录
    fn object_path(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(AppError::validation(format!("Invalid storage key: {}", key)));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for FileSystemStorage {
    async fn save(&self, key: &str, bytes: &[u8]) -> AppResult<String> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::internal(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::internal(format!("Failed to write {}: {}", key, e)))?;

        debug!(key = %key, size = bytes.len(), "Object saved");
        Ok(format!("file://{}", path.display()))
    }

    async fn open(&self, key: &str) -> AppResult<Vec<u8>> {
        let path = self.object_path(key)?;
        fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => AppError::not_found(format!("Object {} not found", key)),
            _ => AppError::internal(format!("Failed to read {}: {}", key, e)),
        })
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let path = self.object_path(key)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| AppError::internal(format!("Failed to stat {}: {}", key, e)))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::internal(format!("Failed to delete {}: {}", key, e))),
        }
    }
}
