use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    ArticleListingRow, ArticleWithAuthor, ArticlesRepo, CreateArticleParams, RepoError,
    UpdateArticleParams,
};
use crate::domain::entities::{ArticleRecord, CommentRecord};

use super::{PostgresRepositories, map_sqlx_error};

const ARTICLE_COLUMNS: &str = "a.id, a.title, a.content, a.author_id, a.image_path, \
     a.image_versions, a.published_at, a.created_at, a.updated_at";

/// Listing order: published first by recency, unpublished drafts after,
/// with `id` as the final tiebreak so the order is total.
const LISTING_ORDER: &str = "a.published_at DESC NULLS LAST, a.created_at DESC, a.id DESC";

#[derive(Debug, FromRow)]
struct ArticleRow {
    id: Uuid,
    title: String,
    content: String,
    author_id: Uuid,
    image_path: Option<String>,
    image_versions: Option<serde_json::Value>,
    published_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ArticleRow> for ArticleRecord {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            author_id: row.author_id,
            image_path: row.image_path,
            image_versions: row.image_versions,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ListingRow {
    id: Uuid,
    title: String,
    content: String,
    author_name: Option<String>,
    comments_count: i64,
    image_path: Option<String>,
    published_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
}

impl From<ListingRow> for ArticleListingRow {
    fn from(row: ListingRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            author_name: row.author_name,
            comments_count: row.comments_count,
            image_path: row.image_path,
            published_at: row.published_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ArticleWithAuthorRow {
    id: Uuid,
    title: String,
    content: String,
    author_id: Uuid,
    image_path: Option<String>,
    image_versions: Option<serde_json::Value>,
    published_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    author_name: Option<String>,
}

impl From<ArticleWithAuthorRow> for ArticleWithAuthor {
    fn from(row: ArticleWithAuthorRow) -> Self {
        Self {
            article: ArticleRecord {
                id: row.id,
                title: row.title,
                content: row.content,
                author_id: row.author_id,
                image_path: row.image_path,
                image_versions: row.image_versions,
                published_at: row.published_at,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            author_name: row.author_name,
        }
    }
}

#[derive(Debug, FromRow)]
struct CommentRow {
    id: Uuid,
    article_id: Uuid,
    content: String,
    user_name: Option<String>,
    created_at: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            article_id: row.article_id,
            content: row.content,
            user_name: row.user_name,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ArticlesRepo for PostgresRepositories {
    async fn list_listing_rows(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ArticleListingRow>, RepoError> {
        let sql = format!(
            "SELECT a.id, a.title, a.content, a.image_path, a.published_at, a.created_at, \
             u.name AS author_name, \
             (SELECT COUNT(*) FROM comments c WHERE c.article_id = a.id) AS comments_count \
             FROM articles a \
             LEFT JOIN users u ON u.id = a.author_id \
             ORDER BY {LISTING_ORDER} \
             LIMIT $1 OFFSET $2"
        );

        let rows = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ArticleListingRow::from).collect())
    }

    async fn find_with_author(&self, id: Uuid) -> Result<Option<ArticleWithAuthor>, RepoError> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS}, u.name AS author_name \
             FROM articles a \
             LEFT JOIN users u ON u.id = a.author_id \
             WHERE a.id = $1"
        );

        let row = sqlx::query_as::<_, ArticleWithAuthorRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(ArticleWithAuthor::from))
    }

    async fn list_comments(&self, article_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT c.id, c.article_id, c.content, c.created_at, u.name AS user_name \
             FROM comments c \
             LEFT JOIN users u ON u.id = c.user_id \
             WHERE c.article_id = $1 \
             ORDER BY c.created_at ASC, c.id ASC",
        )
        .bind(article_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    async fn search_articles(&self, needle: &str) -> Result<Vec<ArticleRecord>, RepoError> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles a \
             WHERE a.title LIKE $1 OR a.content LIKE $1 \
             ORDER BY {LISTING_ORDER}"
        );

        let rows = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(format!("%{needle}%"))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ArticleRecord::from).collect())
    }

    async fn insert_article(
        &self,
        params: CreateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let sql = format!(
            "INSERT INTO articles AS a \
             (id, title, content, author_id, image_path, image_versions, published_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) \
             RETURNING {ARTICLE_COLUMNS}"
        );

        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .bind(params.title)
            .bind(params.content)
            .bind(params.author_id)
            .bind(params.image_path)
            .bind(params.image_versions)
            .bind(params.published_at)
            .bind(now)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(ArticleRecord::from(row))
    }

    async fn update_article(
        &self,
        params: UpdateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let sql = format!(
            "UPDATE articles AS a SET \
             title = COALESCE($2, title), \
             content = COALESCE($3, content), \
             updated_at = $4 \
             WHERE a.id = $1 \
             RETURNING {ARTICLE_COLUMNS}"
        );

        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(params.id)
            .bind(params.title)
            .bind(params.content)
            .bind(now)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Ok(ArticleRecord::from(row))
    }

    async fn delete_article(&self, id: Uuid) -> Result<ArticleRecord, RepoError> {
        let sql =
            format!("DELETE FROM articles AS a WHERE a.id = $1 RETURNING {ARTICLE_COLUMNS}");

        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Ok(ArticleRecord::from(row))
    }

    async fn user_exists(&self, id: Uuid) -> Result<bool, RepoError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(id)
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Ok(exists)
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}
