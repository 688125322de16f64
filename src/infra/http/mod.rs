mod articles;
mod conditional;
mod error;
mod images;
mod middleware;
mod state;

pub use error::ApiError;
pub use state::ApiState;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Router, middleware as axum_middleware};

use crate::application::error::ErrorReport;

pub fn build_router(state: ApiState, max_request_bytes: usize) -> Router {
    Router::new()
        .route(
            "/articles",
            get(articles::list_articles).post(articles::create_article),
        )
        .route("/articles/search", get(articles::search_articles))
        .route(
            "/articles/{id}",
            get(articles::show_article)
                .put(articles::update_article)
                .delete(articles::delete_article),
        )
        .route(
            "/images",
            post(images::upload_image).delete(images::delete_image),
        )
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::security_headers))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> Response {
    match state.articles.ping().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error("infra::http::health", StatusCode::SERVICE_UNAVAILABLE, &err)
                .attach(&mut response);
            response
        }
    }
}
