// Local filesystem storage backend

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::error::{CoreError, CoreResult};

use super::Storage;

pub struct LocalStorage {
    id: String,
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(id: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            base_path: base_path.into(),
        }
    }

    pub async fn initialize(&self) -> CoreResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    /// Reject path components that would escape the base directory.
    fn resolve(&self, rel_path: &str) -> CoreResult<PathBuf> {
        let rel = Path::new(rel_path);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(CoreError::Invariant(format!(
                "storage path escapes the base directory: {}",
                rel_path
            )));
        }
        Ok(self.base_path.join(rel))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn upload(&self, data: &[u8], rel_path: &str) -> CoreResult<String> {
        let path = self.resolve(rel_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        Ok(rel_path.to_string())
    }

    async fn download(&self, rel_path: &str) -> CoreResult<Vec<u8>> {
        let path = self.resolve(rel_path)?;
        let data = fs::read(&path).await?;
        Ok(data)
    }

    async fn delete(&self, rel_path: &str) -> CoreResult<()> {
        let path = self.resolve(rel_path)?;
        fs::remove_file(&path).await?;
        Ok(())
    }

    async fn move_base(&self, old_base: &str, new_base: &str) -> CoreResult<()> {
        let old_path = self.resolve(old_base)?;
        let new_path = self.resolve(new_base)?;
        if let Some(parent) = new_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&old_path, &new_path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_then_download_round_trip() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new("local", temp.path());
        storage.initialize().await.unwrap();

        let data = b"jpeg bytes";
        storage.upload(data, "2024/05/photo.jpg").await.unwrap();
        let read = storage.download("2024/05/photo.jpg").await.unwrap();
        assert_eq!(read, data);
    }

    #[tokio::test]
    async fn test_delete_removes_the_blob() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new("local", temp.path());
        storage.initialize().await.unwrap();

        storage.upload(b"x", "a/b.jpg").await.unwrap();
        storage.delete("a/b.jpg").await.unwrap();
        assert!(storage.download("a/b.jpg").await.is_err());
    }

    #[tokio::test]
    async fn test_move_base_relocates_subtree() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new("local", temp.path());
        storage.initialize().await.unwrap();

        storage.upload(b"x", "old/one.jpg").await.unwrap();
        storage.move_base("old", "new").await.unwrap();
        assert_eq!(storage.download("new/one.jpg").await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_parent_traversal_is_rejected() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new("local", temp.path());
        storage.initialize().await.unwrap();

        let err = storage.download("../outside.jpg").await.unwrap_err();
        assert!(matches!(err, CoreError::Invariant(_)));
    }
}
