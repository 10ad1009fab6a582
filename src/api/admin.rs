use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post, put},
};
use tracing::info;

use super::{AppState, Deleted, parse_chapter, parse_path};
use crate::{
    auth::AdminUser,
    progress::{self, ProgressSummary},
    response::{ApiResult, ok},
    syllabus::chapter::{Chapter, ChapterEntry},
    video::{self, Video, VideoEntry},
};

#[utoipa::path(
    get,
    path = "/api/admin/syllabus",
    tag = "admin",
    responses(
        (status = 200, description = "Names of all learning paths", body = Vec<String>),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = []))
)]
pub async fn list_paths(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Vec<String>> {
    ok(state.curriculum.list_paths().await?)
}

#[utoipa::path(
    get,
    path = "/api/admin/syllabus/{path}",
    tag = "admin",
    params(("path" = String, Path, description = "Learning path")),
    responses(
        (status = 200, description = "Chapters in order, answers included", body = Vec<ChapterEntry>),
        (status = 404, description = "Unknown learning path")
    ),
    security(("bearer" = []))
)]
pub async fn get_syllabus(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(path): Path<String>,
) -> ApiResult<Vec<ChapterEntry>> {
    let path = parse_path(&path)?;
    let syllabus = state.curriculum.syllabus(&path).await?;
    ok(syllabus
        .iter()
        .map(|(id, chapter)| ChapterEntry::new(id.clone(), chapter.clone()))
        .collect())
}

#[utoipa::path(
    delete,
    path = "/api/admin/syllabus/{path}",
    tag = "admin",
    params(("path" = String, Path, description = "Learning path")),
    responses(
        (status = 200, description = "Learning path deleted", body = Deleted),
        (status = 404, description = "Unknown learning path")
    ),
    security(("bearer" = []))
)]
pub async fn delete_path(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(path): Path<String>,
) -> ApiResult<Deleted> {
    let path = parse_path(&path)?;
    state.curriculum.delete_path(&path).await?;
    info!("admin {} deleted learning path {}", admin.uid, path);
    ok(Deleted::new(path.to_string()))
}

#[utoipa::path(
    get,
    path = "/api/admin/syllabus/{path}/{chapter}",
    tag = "admin",
    params(
        ("path" = String, Path, description = "Learning path"),
        ("chapter" = String, Path, description = "Chapter id")
    ),
    responses(
        (status = 200, description = "The chapter, answers included", body = ChapterEntry),
        (status = 404, description = "Unknown chapter")
    ),
    security(("bearer" = []))
)]
pub async fn get_chapter(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((path, chapter)): Path<(String, String)>,
) -> ApiResult<ChapterEntry> {
    let (path, id) = parse_chapter(&path, &chapter)?;
    let chapter = state.curriculum.chapter(&path, &id).await?;
    ok(ChapterEntry::new(id, chapter))
}

#[utoipa::path(
    put,
    path = "/api/admin/syllabus/{path}/{chapter}",
    tag = "admin",
    params(
        ("path" = String, Path, description = "Learning path"),
        ("chapter" = String, Path, description = "Chapter id")
    ),
    request_body = Chapter,
    responses(
        (status = 200, description = "Chapter created or replaced", body = ChapterEntry),
        (status = 400, description = "Invalid chapter"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = []))
)]
pub async fn upsert_chapter(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path((path, chapter)): Path<(String, String)>,
    body: Result<Json<Chapter>, JsonRejection>,
) -> ApiResult<ChapterEntry> {
    let (path, id) = parse_chapter(&path, &chapter)?;
    let Json(chapter) = body?;
    let chapter = state.curriculum.upsert_chapter(&path, &id, chapter).await?;
    info!("admin {} saved chapter {}/{}", admin.uid, path, id);
    ok(ChapterEntry::new(id, chapter))
}

#[utoipa::path(
    delete,
    path = "/api/admin/syllabus/{path}/{chapter}",
    tag = "admin",
    params(
        ("path" = String, Path, description = "Learning path"),
        ("chapter" = String, Path, description = "Chapter id")
    ),
    responses(
        (status = 200, description = "Chapter deleted", body = Deleted),
        (status = 404, description = "Unknown chapter")
    ),
    security(("bearer" = []))
)]
pub async fn delete_chapter(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path((path, chapter)): Path<(String, String)>,
) -> ApiResult<Deleted> {
    let (path, id) = parse_chapter(&path, &chapter)?;
    state.curriculum.delete_chapter(&path, &id).await?;
    info!("admin {} deleted chapter {}/{}", admin.uid, path, id);
    ok(Deleted::new(format!("{path}/{id}")))
}

#[utoipa::path(
    post,
    path = "/api/admin/videos",
    tag = "admin",
    request_body = Video,
    responses(
        (status = 200, description = "Video created", body = VideoEntry),
        (status = 400, description = "Invalid video")
    ),
    security(("bearer" = []))
)]
pub async fn create_video(
    State(state): State<AppState>,
    _admin: AdminUser,
    body: Result<Json<Video>, JsonRejection>,
) -> ApiResult<VideoEntry> {
    let Json(video) = body?;
    ok(video::create_video(&state.store, video).await?)
}

#[utoipa::path(
    put,
    path = "/api/admin/videos/{id}",
    tag = "admin",
    params(("id" = String, Path, description = "Video id")),
    request_body = Video,
    responses(
        (status = 200, description = "Video updated", body = VideoEntry),
        (status = 404, description = "No such video")
    ),
    security(("bearer" = []))
)]
pub async fn update_video(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    body: Result<Json<Video>, JsonRejection>,
) -> ApiResult<VideoEntry> {
    let Json(video) = body?;
    ok(video::update_video(&state.store, &id, video).await?)
}

#[utoipa::path(
    delete,
    path = "/api/admin/videos/{id}",
    tag = "admin",
    params(("id" = String, Path, description = "Video id")),
    responses(
        (status = 200, description = "Video deleted", body = Deleted),
        (status = 404, description = "No such video")
    ),
    security(("bearer" = []))
)]
pub async fn delete_video(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    video::delete_video(&state.store, &id).await?;
    ok(Deleted::new(id))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "admin",
    responses(
        (status = 200, description = "Progress of every user, highest points first", body = Vec<ProgressSummary>),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = []))
)]
pub async fn list_users(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Vec<ProgressSummary>> {
    ok(progress::list_progress(&state.store).await?)
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{uid}/progress",
    tag = "admin",
    params(("uid" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "The user's progress", body = ProgressSummary),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = []))
)]
pub async fn user_progress(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(uid): Path<String>,
) -> ApiResult<ProgressSummary> {
    ok(progress::get_progress(&state.store, &uid).await?)
}

pub fn get_admin_scope() -> Router<AppState> {
    Router::new().nest(
        "/admin",
        Router::new()
            .route("/syllabus", get(list_paths))
            .route("/syllabus/{path}", get(get_syllabus).delete(delete_path))
            .route(
                "/syllabus/{path}/{chapter}",
                get(get_chapter).put(upsert_chapter).delete(delete_chapter),
            )
            .route("/videos", post(create_video))
            .route("/videos/{id}", put(update_video).delete(delete_video))
            .route("/users", get(list_users))
            .route("/users/{uid}/progress", get(user_progress)),
    )
}
