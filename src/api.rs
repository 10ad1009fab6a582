pub mod admin;
pub mod public;
pub mod user;

use std::sync::Arc;

use axum::{Router, extract::FromRef};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    Modify, OpenApi, ToSchema,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::TokenVerifier,
    config::Gamification,
    error::Error,
    store::DocStore,
    syllabus::{Curriculum, PathName, chapter::ChapterId},
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: DocStore,
    pub curriculum: Curriculum,
    pub verifier: Arc<TokenVerifier>,
    pub gamification: Gamification,
}

impl AppState {
    pub fn new(
        store: DocStore,
        verifier: TokenVerifier,
        gamification: Gamification,
        syllabus_cache_capacity: u64,
    ) -> Self {
        Self {
            curriculum: Curriculum::new(store.clone(), syllabus_cache_capacity),
            store,
            verifier: Arc::new(verifier),
            gamification,
        }
    }
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        public::health,
        public::list_videos,
        public::get_video,
        user::daily_login,
        user::get_progress,
        user::path_overview,
        user::complete_chapter,
        user::submit_quiz,
        user::get_syllabus,
        user::get_chapter,
        user::leaderboard,
        admin::list_paths,
        admin::get_syllabus,
        admin::delete_path,
        admin::get_chapter,
        admin::upsert_chapter,
        admin::delete_chapter,
        admin::create_video,
        admin::update_video,
        admin::delete_video,
        admin::list_users,
        admin::user_progress,
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "public", description = "Open endpoints"),
        (name = "user", description = "Learner endpoints, bearer token required"),
        (name = "admin", description = "Dashboard endpoints, admin claim required"),
    )
)]
pub struct ApiDoc;

pub fn openapi_json() -> anyhow::Result<String> {
    Ok(ApiDoc::openapi().to_pretty_json()?)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest(
            "/api",
            Router::new()
                .merge(public::get_public_scope())
                .merge(user::get_user_scope())
                .merge(admin::get_admin_scope()),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Answer of a delete: the id of what was removed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Deleted {
    pub id: String,
}

impl Deleted {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

fn parse_path(path: &str) -> Result<PathName, Error> {
    path.parse()
}

fn parse_chapter(path: &str, chapter: &str) -> Result<(PathName, ChapterId), Error> {
    Ok((path.parse()?, chapter.parse()?))
}
