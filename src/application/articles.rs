//! Article operations: the cached listing projection and the mutations that
//! invalidate it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::images::{ImageOptimizer, ImageUpload};
use crate::application::pagination::ListingPage;
use crate::application::repos::{
    ArticleListingRow, ArticlesRepo, CreateArticleParams, RepoError, UpdateArticleParams,
};
use crate::application::validation::{FieldErrors, is_allowed_image_name};
use crate::cache::{ListingCache, ListingInvalidator, ListingKey};
use crate::domain::entities::ArticleRecord;
use crate::infra::storage::UploadStorage;

/// Characters of article content carried into a listing entry.
const LISTING_CONTENT_LIMIT: usize = 200;
const TITLE_LIMIT: usize = 255;

/// One article as the public listing renders it. Immutable once cached;
/// built whole from a repository row or not at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleListingEntry {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub comments_count: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub image_url: Option<String>,
}

/// A single article with author and comments, as `GET /articles/{id}`
/// renders it.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleDetail {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub author_id: Uuid,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: Uuid,
    pub content: String,
    pub user: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArticleSearchHit {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct CreateArticleCommand {
    pub title: Option<String>,
    pub content: Option<String>,
    pub author_id: Option<Uuid>,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone)]
pub struct UpdateArticleCommand {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// A created article together with its resolved image URLs.
#[derive(Debug, Clone)]
pub struct CreatedArticle {
    pub article: ArticleRecord,
    pub image_url: Option<String>,
    pub images: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Error)]
pub enum ArticleError {
    #[error("article not found")]
    NotFound,
    #[error("article validation failed")]
    Validation(FieldErrors),
    #[error("image optimization failed: {0}")]
    Optimizer(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for ArticleError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::NotFound,
            other => Self::Repo(other),
        }
    }
}

/// Article read and write operations behind the HTTP surface.
///
/// All collaborators are injected at composition time; nothing here reaches
/// for process-global state.
pub struct ArticleService {
    repo: Arc<dyn ArticlesRepo>,
    storage: Arc<UploadStorage>,
    optimizer: Arc<dyn ImageOptimizer>,
    cache: ListingCache,
    invalidator: ListingInvalidator,
}

impl ArticleService {
    pub fn new(
        repo: Arc<dyn ArticlesRepo>,
        storage: Arc<UploadStorage>,
        optimizer: Arc<dyn ImageOptimizer>,
        cache: ListingCache,
        invalidator: ListingInvalidator,
    ) -> Self {
        Self {
            repo,
            storage,
            optimizer,
            cache,
            invalidator,
        }
    }

    /// The read-through listing: served from cache when fresh, projected
    /// from the repository otherwise.
    pub async fn cached_listing(
        &self,
        page: &ListingPage,
    ) -> Result<Vec<ArticleListingEntry>, ArticleError> {
        let key = ListingKey::build(page);
        self.cache
            .get_or_compute(&key, || self.project_listing(page))
            .await
    }

    /// Runs the listing query and shapes each row into a cache-safe entry.
    /// Read-only.
    pub async fn project_listing(
        &self,
        page: &ListingPage,
    ) -> Result<Vec<ArticleListingEntry>, ArticleError> {
        let rows = self
            .repo
            .list_listing_rows(page.offset(), page.limit())
            .await?;
        Ok(rows.into_iter().map(|row| self.project_row(row)).collect())
    }

    fn project_row(&self, row: ArticleListingRow) -> ArticleListingEntry {
        ArticleListingEntry {
            id: row.id,
            title: row.title,
            content: truncate_listing_content(&row.content),
            author: row.author_name,
            comments_count: row.comments_count,
            published_at: row.published_at,
            created_at: row.created_at,
            image_url: row
                .image_path
                .as_deref()
                .map(|path| self.storage.public_url(path)),
        }
    }

    pub async fn show(&self, id: Uuid) -> Result<ArticleDetail, ArticleError> {
        let found = self
            .repo
            .find_with_author(id)
            .await?
            .ok_or(ArticleError::NotFound)?;
        let comments = self.repo.list_comments(id).await?;

        let article = found.article;
        Ok(ArticleDetail {
            id: article.id,
            title: article.title,
            content: article.content,
            author: found.author_name,
            author_id: article.author_id,
            image_url: article
                .image_path
                .as_deref()
                .map(|path| self.storage.public_url(path)),
            image_path: article.image_path,
            published_at: article.published_at,
            created_at: article.created_at,
            comments: comments
                .into_iter()
                .map(|comment| CommentView {
                    id: comment.id,
                    content: comment.content,
                    user: comment.user_name,
                    created_at: comment.created_at,
                })
                .collect(),
        })
    }

    /// Substring search over title and content. A missing or empty query
    /// returns an empty result without touching the repository.
    pub async fn search(&self, raw_query: Option<&str>) -> Result<Vec<ArticleSearchHit>, ArticleError> {
        let needle = match raw_query {
            Some(needle) if !needle.is_empty() => needle,
            _ => return Ok(Vec::new()),
        };

        let articles = self.repo.search_articles(needle).await?;
        Ok(articles
            .into_iter()
            .map(|article| ArticleSearchHit {
                id: article.id,
                title: article.title,
                content: article.content.chars().take(LISTING_CONTENT_LIMIT).collect(),
                published_at: article.published_at,
            })
            .collect())
    }

    pub async fn create(&self, command: CreateArticleCommand) -> Result<CreatedArticle, ArticleError> {
        let mut errors = validate_create(&command);
        if let Some(author_id) = command.author_id {
            if !self.repo.user_exists(author_id).await? {
                errors.push("author_id", "The selected author_id is invalid.");
            }
        }
        if !errors.is_empty() {
            return Err(ArticleError::Validation(errors));
        }

        let (image_path, image_versions) = match &command.image {
            Some(image) => {
                let variants = self
                    .optimizer
                    .optimize(image)
                    .await
                    .map_err(|err| ArticleError::Optimizer(err.to_string()))?;
                (variants.original().map(str::to_string), Some(variants))
            }
            None => (None, None),
        };

        let article = self
            .repo
            .insert_article(CreateArticleParams {
                title: command.title.unwrap_or_default(),
                content: command.content.unwrap_or_default(),
                author_id: command.author_id.expect("author_id validated present"),
                image_path,
                image_versions: image_versions.as_ref().map(|variants| variants.to_json()),
                published_at: OffsetDateTime::now_utc(),
            })
            .await?;

        self.invalidator.on_article_mutated();

        Ok(CreatedArticle {
            image_url: article
                .image_path
                .as_deref()
                .map(|path| self.storage.public_url(path)),
            images: image_versions.map(|variants| variants.public_urls(&self.storage)),
            article,
        })
    }

    pub async fn update(
        &self,
        id: Uuid,
        command: UpdateArticleCommand,
    ) -> Result<ArticleRecord, ArticleError> {
        let errors = validate_update(&command);
        if !errors.is_empty() {
            return Err(ArticleError::Validation(errors));
        }

        let article = self
            .repo
            .update_article(UpdateArticleParams {
                id,
                title: command.title,
                content: command.content,
            })
            .await?;

        self.invalidator.on_article_mutated();
        Ok(article)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ArticleError> {
        let article = self.repo.delete_article(id).await?;

        if let Some(path) = article.image_path.as_deref() {
            if let Err(err) = self.storage.delete(path).await {
                warn!(article_id = %id, path, error = %err, "failed to delete article image");
            }
        }

        self.invalidator.on_article_mutated();
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), RepoError> {
        self.repo.ping().await
    }
}

/// Content is carried whole up to the limit; anything longer is cut at the
/// limit (character-based, never splitting a code point) with `"..."`
/// appended.
fn truncate_listing_content(content: &str) -> String {
    if content.chars().count() <= LISTING_CONTENT_LIMIT {
        return content.to_string();
    }
    let mut truncated: String = content.chars().take(LISTING_CONTENT_LIMIT).collect();
    truncated.push_str("...");
    truncated
}

fn validate_create(command: &CreateArticleCommand) -> FieldErrors {
    let mut errors = FieldErrors::default();

    match command.title.as_deref() {
        None | Some("") => errors.push("title", "The title field is required."),
        Some(title) if title.chars().count() > TITLE_LIMIT => {
            errors.push("title", "The title may not be greater than 255 characters.");
        }
        Some(_) => {}
    }

    if command.content.as_deref().is_none_or(str::is_empty) {
        errors.push("content", "The content field is required.");
    }

    if command.author_id.is_none() {
        errors.push("author_id", "The author_id field is required.");
    }

    if let Some(image) = &command.image
        && !is_allowed_image_name(&image.filename)
    {
        errors.push(
            "image",
            "The image must be a file of type: jpeg, png, jpg, gif, webp.",
        );
    }

    errors
}

fn validate_update(command: &UpdateArticleCommand) -> FieldErrors {
    let mut errors = FieldErrors::default();

    match command.title.as_deref() {
        Some("") => errors.push("title", "The title field is required."),
        Some(title) if title.chars().count() > TITLE_LIMIT => {
            errors.push("title", "The title may not be greater than 255 characters.");
        }
        _ => {}
    }

    if command.content.as_deref() == Some("") {
        errors.push("content", "The content field is required.");
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_at_limit_renders_unmodified() {
        let content = "a".repeat(199);
        assert_eq!(truncate_listing_content(&content), content);

        let content = "a".repeat(200);
        assert_eq!(truncate_listing_content(&content), content);
    }

    #[test]
    fn content_over_limit_is_cut_with_suffix() {
        let content = "a".repeat(201);
        let truncated = truncate_listing_content(&content);
        assert_eq!(truncated.chars().count(), 203);
        assert!(truncated.ends_with("..."));
        assert_eq!(&truncated[..200], &content[..200]);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let content = "é".repeat(201);
        let truncated = truncate_listing_content(&content);
        assert_eq!(truncated.chars().count(), 203);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn create_requires_title_content_author() {
        let errors = validate_create(&CreateArticleCommand {
            title: None,
            content: None,
            author_id: None,
            image: None,
        });
        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            ["author_id", "content", "title"]
        );
    }

    #[test]
    fn create_rejects_overlong_title() {
        let errors = validate_create(&CreateArticleCommand {
            title: Some("t".repeat(256)),
            content: Some("body".to_string()),
            author_id: Some(Uuid::new_v4()),
            image: None,
        });
        assert_eq!(errors.fields().collect::<Vec<_>>(), ["title"]);
    }

    #[test]
    fn create_rejects_disallowed_image_extension() {
        let errors = validate_create(&CreateArticleCommand {
            title: Some("title".to_string()),
            content: Some("body".to_string()),
            author_id: Some(Uuid::new_v4()),
            image: Some(ImageUpload {
                filename: "payload.svg".to_string(),
                content_type: Some("image/svg+xml".to_string()),
                data: bytes::Bytes::from_static(b"<svg/>"),
            }),
        });
        assert_eq!(errors.fields().collect::<Vec<_>>(), ["image"]);
    }

    #[test]
    fn update_fields_are_optional_but_not_blank() {
        let errors = validate_update(&UpdateArticleCommand {
            title: None,
            content: None,
        });
        assert!(errors.is_empty());

        let errors = validate_update(&UpdateArticleCommand {
            title: Some(String::new()),
            content: Some(String::new()),
        });
        assert_eq!(errors.fields().collect::<Vec<_>>(), ["content", "title"]);
    }
}
