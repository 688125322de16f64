//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{ArticleRecord, CommentRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// One row of the listing query: article columns joined with the author's
/// name and the article's comment count.
#[derive(Debug, Clone)]
pub struct ArticleListingRow {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_name: Option<String>,
    pub comments_count: i64,
    pub image_path: Option<String>,
    pub published_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// An article joined with its author's display name.
#[derive(Debug, Clone)]
pub struct ArticleWithAuthor {
    pub article: ArticleRecord,
    pub author_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateArticleParams {
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    pub image_path: Option<String>,
    pub image_versions: Option<serde_json::Value>,
    pub published_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct UpdateArticleParams {
    pub id: Uuid,
    pub title: Option<String>,
    pub content: Option<String>,
}

#[async_trait]
pub trait ArticlesRepo: Send + Sync {
    /// Listing rows ordered by `published_at DESC NULLS LAST, created_at
    /// DESC, id DESC` — a total order, stable across identical calls.
    async fn list_listing_rows(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ArticleListingRow>, RepoError>;

    async fn find_with_author(&self, id: Uuid) -> Result<Option<ArticleWithAuthor>, RepoError>;

    async fn list_comments(&self, article_id: Uuid) -> Result<Vec<CommentRecord>, RepoError>;

    /// Case- and accent-sensitive substring search over title and content,
    /// bound as a parameter (never interpolated).
    async fn search_articles(&self, needle: &str) -> Result<Vec<ArticleRecord>, RepoError>;

    async fn insert_article(&self, params: CreateArticleParams)
    -> Result<ArticleRecord, RepoError>;

    /// Applies the present fields and returns the updated row;
    /// `RepoError::NotFound` when the id does not exist.
    async fn update_article(&self, params: UpdateArticleParams)
    -> Result<ArticleRecord, RepoError>;

    /// Deletes and returns the removed row; `RepoError::NotFound` when the
    /// id does not exist.
    async fn delete_article(&self, id: Uuid) -> Result<ArticleRecord, RepoError>;

    async fn user_exists(&self, id: Uuid) -> Result<bool, RepoError>;

    /// Connectivity probe for the health endpoint.
    async fn ping(&self) -> Result<(), RepoError>;
}
