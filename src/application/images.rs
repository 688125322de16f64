//! Image uploads and the optimizer collaborator boundary.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::validation::{FieldErrors, is_allowed_image_name};
use crate::infra::storage::{UploadStorage, UploadStorageError};

/// An uploaded image as it arrives from the HTTP surface.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Named image variants mapped to their stored paths, e.g.
/// `{"original": "2026/08/06/….jpg", "thumbnail": "…"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageVariants(BTreeMap<String, String>);

impl ImageVariants {
    pub fn single(name: &str, stored_path: String) -> Self {
        let mut map = BTreeMap::new();
        map.insert(name.to_string(), stored_path);
        Self(map)
    }

    pub fn original(&self) -> Option<&str> {
        self.0.get("original").map(String::as_str)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn public_urls(&self, storage: &UploadStorage) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(name, path)| (name.clone(), storage.public_url(path)))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum ImageOptimizerError {
    #[error(transparent)]
    Storage(#[from] UploadStorageError),
}

/// The image-optimization collaborator: accepts an upload, returns named
/// variants mapped to stored paths. The resizing pipeline itself lives
/// behind this trait.
#[async_trait]
pub trait ImageOptimizer: Send + Sync {
    async fn optimize(&self, upload: &ImageUpload) -> Result<ImageVariants, ImageOptimizerError>;
}

/// Optimizer that persists the original asset and reports it as the only
/// variant.
pub struct StorageBackedOptimizer {
    storage: Arc<UploadStorage>,
}

impl StorageBackedOptimizer {
    pub fn new(storage: Arc<UploadStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ImageOptimizer for StorageBackedOptimizer {
    async fn optimize(&self, upload: &ImageUpload) -> Result<ImageVariants, ImageOptimizerError> {
        let stored = self
            .storage
            .store(&upload.filename, upload.data.clone())
            .await?;
        Ok(ImageVariants::single("original", stored.stored_path))
    }
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image validation failed")]
    Validation(FieldErrors),
    #[error("image not found")]
    NotFound,
    #[error("image storage failed: {0}")]
    Storage(UploadStorageError),
}

/// Result of a standalone image upload.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub path: String,
    pub url: String,
    pub size_bytes: i64,
}

/// Standalone image upload/delete operations.
pub struct ImageService {
    storage: Arc<UploadStorage>,
}

impl ImageService {
    pub fn new(storage: Arc<UploadStorage>) -> Self {
        Self { storage }
    }

    pub async fn upload(&self, upload: ImageUpload) -> Result<StoredImage, ImageError> {
        let mut errors = FieldErrors::default();
        if !is_allowed_image_name(&upload.filename) {
            errors.push(
                "image",
                "The image must be a file of type: jpeg, png, jpg, gif, webp.",
            );
        }
        if !errors.is_empty() {
            return Err(ImageError::Validation(errors));
        }

        let stored = self
            .storage
            .store(&upload.filename, upload.data)
            .await
            .map_err(ImageError::Storage)?;

        Ok(StoredImage {
            url: self.storage.public_url(&stored.stored_path),
            path: stored.stored_path,
            size_bytes: stored.size_bytes,
        })
    }

    /// Deletes a stored image by its relative path. Traversal attempts and
    /// unknown paths both come back as `NotFound`.
    pub async fn delete(&self, stored_path: &str) -> Result<(), ImageError> {
        let exists = match self.storage.exists(stored_path).await {
            Ok(exists) => exists,
            Err(UploadStorageError::InvalidPath) => false,
            Err(err) => return Err(ImageError::Storage(err)),
        };
        if !exists {
            return Err(ImageError::NotFound);
        }

        self.storage
            .delete(stored_path)
            .await
            .map_err(ImageError::Storage)
    }
}
