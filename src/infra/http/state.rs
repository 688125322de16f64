use std::sync::Arc;

use crate::application::articles::ArticleService;
use crate::application::images::ImageService;

/// Shared handler state, assembled once at composition time.
#[derive(Clone)]
pub struct ApiState {
    pub articles: Arc<ArticleService>,
    pub images: Arc<ImageService>,
    /// Ceiling for a single uploaded image; larger payloads answer 413
    /// before validation runs.
    pub max_image_bytes: usize,
}
