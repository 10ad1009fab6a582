use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    routing::{get, post},
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::{AppState, parse_chapter, parse_path};
use crate::{
    auth::AuthUser,
    progress::{self, Completion, LeaderboardEntry, PathOverview, ProgressSummary, QuizOutcome, StreakUpdate},
    response::{ApiResult, ok},
    syllabus::{chapter::ChapterView, quiz::QuizSubmission},
    utils::now_utc,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// number of entries, 1 to 100, default 10
    pub limit: Option<usize>,
}

#[utoipa::path(
    post,
    path = "/api/user/login",
    tag = "user",
    responses(
        (status = 200, description = "Updated daily streak", body = StreakUpdate),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn daily_login(State(state): State<AppState>, user: AuthUser) -> ApiResult<StreakUpdate> {
    ok(progress::record_login(&state.store, &state.gamification, &user.uid, now_utc()).await?)
}

#[utoipa::path(
    get,
    path = "/api/user/progress",
    tag = "user",
    responses(
        (status = 200, description = "The caller's progress", body = ProgressSummary),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn get_progress(State(state): State<AppState>, user: AuthUser) -> ApiResult<ProgressSummary> {
    ok(progress::get_progress(&state.store, &user.uid).await?)
}

#[utoipa::path(
    get,
    path = "/api/user/progress/{path}",
    tag = "user",
    params(("path" = String, Path, description = "Learning path")),
    responses(
        (status = 200, description = "Chapters of the path with their status", body = PathOverview),
        (status = 404, description = "Unknown learning path")
    ),
    security(("bearer" = []))
)]
pub async fn path_overview(
    State(state): State<AppState>,
    user: AuthUser,
    Path(path): Path<String>,
) -> ApiResult<PathOverview> {
    let path = parse_path(&path)?;
    ok(progress::path_overview(&state.store, &state.curriculum, &user.uid, &path).await?)
}

#[utoipa::path(
    post,
    path = "/api/user/progress/{path}/{chapter}/complete",
    tag = "user",
    params(
        ("path" = String, Path, description = "Learning path"),
        ("chapter" = String, Path, description = "Chapter id")
    ),
    responses(
        (status = 200, description = "Completion outcome", body = Completion),
        (status = 404, description = "Unknown chapter")
    ),
    security(("bearer" = []))
)]
pub async fn complete_chapter(
    State(state): State<AppState>,
    user: AuthUser,
    Path((path, chapter)): Path<(String, String)>,
) -> ApiResult<Completion> {
    let (path, chapter) = parse_chapter(&path, &chapter)?;
    ok(progress::complete_chapter(&state.store, &state.gamification, &user.uid, &path, &chapter).await?)
}

#[utoipa::path(
    post,
    path = "/api/user/progress/{path}/{chapter}/quiz",
    tag = "user",
    params(
        ("path" = String, Path, description = "Learning path"),
        ("chapter" = String, Path, description = "Chapter id")
    ),
    request_body = QuizSubmission,
    responses(
        (status = 200, description = "Score, and the completion when the quiz passed", body = QuizOutcome),
        (status = 400, description = "Malformed answers"),
        (status = 404, description = "Unknown chapter")
    ),
    security(("bearer" = []))
)]
pub async fn submit_quiz(
    State(state): State<AppState>,
    user: AuthUser,
    Path((path, chapter)): Path<(String, String)>,
    submission: Result<Json<QuizSubmission>, JsonRejection>,
) -> ApiResult<QuizOutcome> {
    let (path, chapter) = parse_chapter(&path, &chapter)?;
    let Json(submission) = submission?;
    ok(progress::submit_quiz(
        &state.store,
        &state.curriculum,
        &state.gamification,
        &user.uid,
        &path,
        &chapter,
        &submission.answers,
    )
    .await?)
}

#[utoipa::path(
    get,
    path = "/api/user/syllabus/{path}",
    tag = "user",
    params(("path" = String, Path, description = "Learning path")),
    responses(
        (status = 200, description = "Chapters in order, quiz answers hidden", body = Vec<ChapterView>),
        (status = 404, description = "Unknown learning path")
    ),
    security(("bearer" = []))
)]
pub async fn get_syllabus(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(path): Path<String>,
) -> ApiResult<Vec<ChapterView>> {
    let path = parse_path(&path)?;
    let syllabus = state.curriculum.syllabus(&path).await?;
    ok(syllabus
        .iter()
        .map(|(id, chapter)| ChapterView::new(id.clone(), chapter))
        .collect())
}

#[utoipa::path(
    get,
    path = "/api/user/syllabus/{path}/{chapter}",
    tag = "user",
    params(
        ("path" = String, Path, description = "Learning path"),
        ("chapter" = String, Path, description = "Chapter id")
    ),
    responses(
        (status = 200, description = "The chapter, quiz answers hidden", body = ChapterView),
        (status = 404, description = "Unknown chapter")
    ),
    security(("bearer" = []))
)]
pub async fn get_chapter(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((path, chapter)): Path<(String, String)>,
) -> ApiResult<ChapterView> {
    let (path, id) = parse_chapter(&path, &chapter)?;
    let chapter = state.curriculum.chapter(&path, &id).await?;
    ok(ChapterView::new(id, &chapter))
}

#[utoipa::path(
    get,
    path = "/api/user/leaderboard",
    tag = "user",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Users ranked by points", body = Vec<LeaderboardEntry>),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn leaderboard(
    State(state): State<AppState>,
    _user: AuthUser,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> ApiResult<Vec<LeaderboardEntry>> {
    let Query(query) = query?;
    ok(progress::leaderboard(&state.store, query.limit.unwrap_or(10)).await?)
}

pub fn get_user_scope() -> Router<AppState> {
    Router::new().nest(
        "/user",
        Router::new()
            .route("/login", post(daily_login))
            .route("/progress", get(get_progress))
            .route("/progress/{path}", get(path_overview))
            .route("/progress/{path}/{chapter}/complete", post(complete_chapter))
            .route("/progress/{path}/{chapter}/quiz", post(submit_quiz))
            .route("/syllabus/{path}", get(get_syllabus))
            .route("/syllabus/{path}/{chapter}", get(get_chapter))
            .route("/leaderboard", get(leaderboard)),
    )
}
