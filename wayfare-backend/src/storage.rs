use crate::error::{AppError, Result};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Image storage rooted at the upload directory.
///
/// Places and users store image paths relative to this root; uploads
/// themselves are written by whatever fronts the API.
#[derive(Clone)]
pub struct ImageStorage {
    storage_root: PathBuf,
}

impl ImageStorage {
    /// Create a new image storage instance
    pub fn new(storage_root: impl AsRef<Path>) -> Self {
        Self {
            storage_root: storage_root.as_ref().to_path_buf(),
        }
    }

    /// Initialize the storage directory
    pub async fn init(&self) -> Result<()> {
        if !self.storage_root.exists() {
            fs::create_dir_all(&self.storage_root).await.map_err(|e| {
                AppError::Server(format!("Failed to create upload directory: {}", e))
            })?;
            tracing::info!(
                "📁 Created upload directory: {}",
                self.storage_root.display()
            );
        }
        Ok(())
    }

    /// Map a stored relative path onto the storage root.
    ///
    /// Absolute paths and `..` components are rejected so a stored path can
    /// never point outside the root.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf> {
        let path = Path::new(relative_path);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if relative_path.is_empty() || escapes {
            return Err(AppError::Server(format!(
                "Image path outside upload directory: {}",
                relative_path
            )));
        }

        Ok(self.storage_root.join(path))
    }

    /// Delete an image from disk; an already missing file counts as deleted
    pub async fn delete_image(&self, relative_path: &str) -> Result<()> {
        let file_path = self.resolve(relative_path)?;

        match fs::remove_file(&file_path).await {
            Ok(_) => {
                tracing::debug!("🗑️  Deleted image: {}", relative_path);

                // Try to clean up empty parent directories
                Box::pin(self.cleanup_empty_dirs(&file_path)).await;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Server(format!("Failed to delete image: {}", e))),
        }
    }

    /// Clean up empty parent directories after image deletion
    fn cleanup_empty_dirs<'a>(
        &'a self,
        file_path: &'a Path,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if let Some(parent) = file_path.parent() {
                // Only clean up directories within our storage root
                if parent.starts_with(&self.storage_root) && parent != self.storage_root {
                    if let Ok(mut entries) = fs::read_dir(parent).await {
                        if entries.next_entry().await.unwrap_or(None).is_none()
                            && fs::remove_dir(parent).await.is_ok()
                        {
                            tracing::debug!("🧹 Cleaned up empty directory: {}", parent.display());
                            Box::pin(self.cleanup_empty_dirs(parent)).await;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_delete_image() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ImageStorage::new(temp_dir.path());
        storage.init().await.unwrap();

        let path = storage.resolve("images/ab/place.jpg").unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"jpeg").unwrap();

        storage.delete_image("images/ab/place.jpg").await.unwrap();

        assert!(!path.exists());
        // Emptied directories are pruned up to the root
        assert!(!temp_dir.path().join("images").exists());
        assert!(temp_dir.path().exists());
    }

    #[tokio::test]
    async fn test_delete_missing_image_is_ok() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ImageStorage::new(temp_dir.path());

        assert!(storage.delete_image("images/nope.png").await.is_ok());
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ImageStorage::new(temp_dir.path());

        assert!(storage.resolve("../etc/passwd").is_err());
        assert!(storage.resolve("/etc/passwd").is_err());
        assert!(storage.resolve("").is_err());
        assert!(storage
            .resolve("images/a.png")
            .unwrap()
            .starts_with(temp_dir.path()));
    }
}
