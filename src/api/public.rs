use axum::{
    Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    routing::get,
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::AppState;
use crate::{
    response::{ApiResult, ok},
    store::DocStore,
    video::{self, VideoEntry},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VideoQuery {
    /// only videos of this category (case-insensitive)
    pub category: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/public/health",
    tag = "public",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> ApiResult<&'static str> {
    ok("ok")
}

#[utoipa::path(
    get,
    path = "/api/public/videos",
    tag = "public",
    params(VideoQuery),
    responses(
        (status = 200, description = "Videos ordered by title", body = Vec<VideoEntry>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_videos(
    State(store): State<DocStore>,
    query: Result<Query<VideoQuery>, QueryRejection>,
) -> ApiResult<Vec<VideoEntry>> {
    let Query(query) = query?;
    ok(video::list_videos(&store, query.category.as_deref()).await?)
}

#[utoipa::path(
    get,
    path = "/api/public/videos/{id}",
    tag = "public",
    params(("id" = String, Path, description = "Video id")),
    responses(
        (status = 200, description = "The video", body = VideoEntry),
        (status = 404, description = "No such video")
    )
)]
pub async fn get_video(State(store): State<DocStore>, Path(id): Path<String>) -> ApiResult<VideoEntry> {
    ok(video::get_video(&store, &id).await?)
}

pub fn get_public_scope() -> Router<AppState> {
    Router::new().nest(
        "/public",
        Router::new()
            .route("/health", get(health))
            .route("/videos", get(list_videos))
            .route("/videos/{id}", get(get_video)),
    )
}
