//! Book cover storage on the local filesystem

use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Stored covers are WebP: `RIFF` <size> `WEBP`
pub fn is_webp(content: &[u8]) -> bool {
    content.len() >= 12 && &content[0..4] == b"RIFF" && &content[8..12] == b"WEBP"
}

/// Images live in `{static_dir}/images/{uuid}.webp`
#[derive(Clone)]
pub struct MediaStore {
    images_dir: PathBuf,
}

impl MediaStore {
    pub fn new(static_dir: impl AsRef<Path>) -> Self {
        Self {
            images_dir: static_dir.as_ref().join("images"),
        }
    }

    /// File names come from `save`; anything else is refused
    fn path_for(&self, name: &str) -> AppResult<PathBuf> {
        let valid = name
            .strip_suffix(".webp")
            .map(|stem| uuid::Uuid::parse_str(stem).is_ok())
            .unwrap_or(false);
        if !valid {
            return Err(AppError::BadRequest(format!("Invalid image name: {}", name)));
        }
        Ok(self.images_dir.join(name))
    }

    /// Store a new image, returning its file name
    pub async fn save(&self, content: &[u8]) -> AppResult<String> {
        if !is_webp(content) {
            return Err(AppError::BadRequest("Image must be in WebP format".to_string()));
        }

        tokio::fs::create_dir_all(&self.images_dir)
            .await
            .map_err(|e| AppError::Internal(format!("Cannot create images directory: {}", e)))?;

        let name = format!("{}.webp", uuid::Uuid::new_v4());
        tokio::fs::write(self.images_dir.join(&name), content)
            .await
            .map_err(|e| AppError::Internal(format!("Cannot write image {}: {}", name, e)))?;

        tracing::debug!(image = %name, bytes = content.len(), "Image stored");
        Ok(name)
    }

    pub async fn read(&self, name: &str) -> AppResult<Vec<u8>> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound("Image not found".to_string()))
            }
            Err(e) => Err(AppError::Internal(format!("Cannot read image {}: {}", name, e))),
        }
    }

    /// Remove an image. Failures are logged only: the database no longer
    /// references the file.
    pub async fn remove(&self, name: &str) {
        let path = match self.path_for(name) {
            Ok(path) => path,
            Err(_) => return,
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(image = %name, "Image removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(image = %name, error = %e, "Cannot remove image"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBP: &[u8] = b"RIFF\x24\x00\x00\x00WEBPVP8 \x18\x00\x00\x00";

    #[test]
    fn test_webp_detection() {
        assert!(is_webp(WEBP));
        assert!(!is_webp(b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0d"));
        assert!(!is_webp(b"RIFF"));
    }

    #[tokio::test]
    async fn test_save_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());

        let name = store.save(WEBP).await.unwrap();
        assert!(name.ends_with(".webp"));
        assert!(dir.path().join("images").join(&name).exists());
        assert_eq!(store.read(&name).await.unwrap(), WEBP);

        store.remove(&name).await;
        assert!(matches!(store.read(&name).await, Err(AppError::NotFound(_))));

        // Second removal is silent
        store.remove(&name).await;
    }

    #[tokio::test]
    async fn test_rejects_non_webp_and_foreign_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());

        assert!(matches!(store.save(b"GIF89a....").await, Err(AppError::BadRequest(_))));
        assert!(matches!(
            store.read("../../etc/passwd").await,
            Err(AppError::BadRequest(_))
        ));
    }
}
