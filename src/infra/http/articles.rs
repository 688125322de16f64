use std::time::Instant;

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::application::articles::{
    ArticleDetail, ArticleSearchHit, CreateArticleCommand, UpdateArticleCommand,
};
use crate::application::images::ImageUpload;
use crate::application::pagination::ListingPage;

use super::conditional;
use super::error::ApiError;
use super::state::ApiState;

#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub performance_test: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// `GET /articles` — the cached, conditional listing.
pub async fn list_articles(
    State(state): State<ApiState>,
    Query(query): Query<ListingQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let started = Instant::now();

    let page = ListingPage::normalize(query.page.as_deref(), query.per_page.as_deref());
    let entries = state.articles.cached_listing(&page).await?;

    let mut response = conditional::conditional_json(&entries, headers.get(header::IF_NONE_MATCH))?;

    if is_truthy(query.performance_test.as_deref()) && response.status() != StatusCode::NOT_MODIFIED
    {
        let elapsed_ms = started.elapsed().as_millis();
        if let Ok(value) = HeaderValue::from_str(&elapsed_ms.to_string()) {
            response
                .headers_mut()
                .insert(HeaderName::from_static("x-debug-response-time"), value);
        }
    }

    Ok(response)
}

pub async fn show_article(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ArticleDetail>, ApiError> {
    let detail = state.articles.show(id).await?;
    Ok(Json(detail))
}

pub async fn search_articles(
    State(state): State<ApiState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ArticleSearchHit>>, ApiError> {
    let hits = state.articles.search(query.q.as_deref()).await?;
    Ok(Json(hits))
}

/// `POST /articles` — multipart form with `title`, `content`, `author_id`
/// and an optional `image` file. An oversized image short-circuits to 413
/// before any validation or persistence work.
pub async fn create_article(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let command = read_create_form(multipart, state.max_image_bytes).await?;
    let created = state.articles.create(command).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": created.article,
            "image_url": created.image_url,
            "images": created.images,
        })),
    ))
}

pub async fn update_article(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let article = state
        .articles
        .update(
            id,
            UpdateArticleCommand {
                title: payload.title,
                content: payload.content,
            },
        )
        .await?;

    Ok(Json(article))
}

pub async fn delete_article(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.articles.delete(id).await?;
    Ok(Json(json!({ "message": "Article deleted successfully" })))
}

async fn read_create_form(
    mut multipart: Multipart,
    max_image_bytes: usize,
) -> Result<CreateArticleCommand, ApiError> {
    let mut command = CreateArticleCommand {
        title: None,
        content: None,
        author_id: None,
        image: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("title") => command.title = Some(field.text().await.map_err(multipart_error)?),
            Some("content") => {
                command.content = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("author_id") => {
                let raw = field.text().await.map_err(multipart_error)?;
                command.author_id = raw.trim().parse::<Uuid>().ok();
            }
            Some("image") => {
                let filename = field
                    .file_name()
                    .unwrap_or("upload")
                    .to_string();
                let content_type = field.content_type().map(ToString::to_string);
                let data = field.bytes().await.map_err(multipart_error)?;

                if data.len() > max_image_bytes {
                    return Err(ApiError::PayloadTooLarge {
                        size_bytes: data.len(),
                        limit_bytes: max_image_bytes,
                    });
                }

                command.image = Some(ImageUpload {
                    filename,
                    content_type,
                    data,
                });
            }
            _ => {}
        }
    }

    Ok(command)
}

pub(super) fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest {
        public: "Invalid multipart payload",
        detail: err.to_string(),
    }
}

fn is_truthy(raw: Option<&str>) -> bool {
    matches!(
        raw.map(str::to_ascii_lowercase).as_deref(),
        Some("1") | Some("true") | Some("on") | Some("yes")
    )
}
