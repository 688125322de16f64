//! Filesystem-backed image storage and public URL mapping.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

/// Errors that can occur while interacting with the upload storage backend.
#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file size exceeds supported range")]
    SizeOverflow,
}

/// Result of storing an upload payload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub stored_path: String,
    pub checksum: String,
    pub size_bytes: i64,
}

/// Filesystem-backed upload storage.
///
/// Stored paths are always relative to the storage root; resolution rejects
/// absolute paths and parent-directory components.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
    public_base_url: String,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if
    /// necessary.
    pub fn new(root: PathBuf, public_base_url: String) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Store the provided payload and return metadata describing the stored
    /// asset.
    pub async fn store(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }

        let stored_path = self.build_stored_path(original_name);
        let absolute = self.resolve(&stored_path)?;

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        let checksum = hex::encode(Sha256::digest(&data));
        let size_bytes = i64::try_from(data.len()).map_err(|_| UploadStorageError::SizeOverflow)?;

        Ok(StoredUpload {
            stored_path,
            checksum,
            size_bytes,
        })
    }

    /// Whether a stored payload exists at the given relative path.
    pub async fn exists(&self, stored_path: &str) -> Result<bool, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::metadata(&absolute).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    /// Remove the stored payload. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    /// Map a stored path to its public URL.
    pub fn public_url(&self, stored_path: &str) -> String {
        format!("{}/{}", self.public_base_url, stored_path)
    }

    /// Resolve the absolute filesystem path for a stored upload.
    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if relative.as_os_str().is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }

    fn build_stored_path(&self, original_name: &str) -> String {
        let (year, month, day) = time::OffsetDateTime::now_utc().to_calendar_date();
        let directory = format!("{year}/{:02}/{:02}", month as u8, day);
        let identifier = Uuid::new_v4();
        let filename = sanitize_filename(original_name);
        format!("{directory}/{identifier}-{filename}")
    }
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("upload");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "upload".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty());

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> (tempfile::TempDir, UploadStorage) {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = UploadStorage::new(dir.path().to_path_buf(), "/storage".to_string())
            .expect("storage init");
        (dir, storage)
    }

    #[tokio::test]
    async fn store_and_delete_roundtrip() {
        let (_dir, storage) = storage();

        let stored = storage
            .store("Cover Photo.JPG", Bytes::from_static(b"fake image bytes"))
            .await
            .expect("stored upload");

        assert!(stored.stored_path.ends_with("-cover-photo.jpg"));
        assert_eq!(stored.size_bytes, 16);
        assert!(storage.exists(&stored.stored_path).await.expect("exists"));

        storage.delete(&stored.stored_path).await.expect("deleted");
        assert!(!storage.exists(&stored.stored_path).await.expect("exists"));
    }

    #[tokio::test]
    async fn delete_of_missing_file_succeeds() {
        let (_dir, storage) = storage();
        storage
            .delete("2026/01/01/nothing-here.png")
            .await
            .expect("missing file tolerated");
    }

    #[tokio::test]
    async fn traversal_paths_are_rejected() {
        let (_dir, storage) = storage();

        assert!(matches!(
            storage.exists("../outside.png").await,
            Err(UploadStorageError::InvalidPath)
        ));
        assert!(matches!(
            storage.delete("/etc/passwd").await,
            Err(UploadStorageError::InvalidPath)
        ));
    }

    #[tokio::test]
    async fn empty_payload_is_rejected() {
        let (_dir, storage) = storage();
        assert!(matches!(
            storage.store("empty.png", Bytes::new()).await,
            Err(UploadStorageError::EmptyPayload)
        ));
    }

    #[test]
    fn public_url_joins_base_and_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = UploadStorage::new(dir.path().to_path_buf(), "/storage/".to_string())
            .expect("storage init");
        assert_eq!(
            storage.public_url("2026/08/06/abc-photo.jpg"),
            "/storage/2026/08/06/abc-photo.jpg"
        );
    }

    #[test]
    fn filenames_are_slugified() {
        assert_eq!(sanitize_filename("Héllo Wörld.PNG"), "hello-world.png");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename("noext"), "noext");
    }
}
