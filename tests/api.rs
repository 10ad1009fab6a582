use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use englearn::{
    api::{AppState, router},
    auth::TokenVerifier,
    config::Gamification,
    store::DocStore,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &[u8] = b"integration-secret";

fn token(uid: &str, admin: bool) -> String {
    let claims = json!({
        "sub": uid,
        "exp": time::OffsetDateTime::now_utc().unix_timestamp() + 3600,
        "admin": admin,
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

async fn app() -> Router {
    let store = DocStore::in_memory().await.unwrap();
    let verifier = TokenVerifier::from_secret(SECRET, None);
    router(AppState::new(store, verifier, Gamification::default(), 16))
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn chapter(title: &str) -> Value {
    json!({
        "title": title,
        "description": "basics",
        "content": "Hello!",
        "quiz": [
            {"question": "Pick the greeting", "options": ["Hello", "Table"], "correctAnswer": 0}
        ]
    })
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/api/public/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "data": "ok"}));
}

#[tokio::test]
async fn user_routes_need_a_valid_token() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/api/user/progress", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
    assert!(body.get("data").is_none());

    let (status, _) = call(&app, Method::GET, "/api/user/progress", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_need_the_admin_claim() {
    let app = app().await;
    let learner = token("learner", false);
    let (status, body) = call(
        &app,
        Method::PUT,
        "/api/admin/syllabus/beginner/ch1",
        Some(&learner),
        Some(chapter("Greetings")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn learning_flow() {
    let app = app().await;
    let admin = token("admin", true);
    let learner = token("learner", false);

    for (id, title) in [("ch1", "Greetings"), ("ch2", "Numbers"), ("ch10", "Review")] {
        let uri = format!("/api/admin/syllabus/beginner/{id}");
        let (status, body) = call(&app, Method::PUT, &uri, Some(&admin), Some(chapter(title))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["title"], title);
    }

    let (status, body) = call(&app, Method::GET, "/api/user/syllabus/beginner", Some(&learner), None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["ch1", "ch2", "ch10"]);
    assert!(body["data"][0]["quiz"][0].get("correctAnswer").is_none());

    let (_, body) = call(&app, Method::GET, "/api/admin/syllabus/beginner/ch1", Some(&admin), None).await;
    assert_eq!(body["data"]["quiz"][0]["correctAnswer"], 0);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/user/progress/beginner/ch1/complete",
        Some(&learner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["points"], 10);
    assert_eq!(body["data"]["unlockedChapter"], "ch2");

    let (_, body) = call(
        &app,
        Method::POST,
        "/api/user/progress/beginner/ch1/complete",
        Some(&learner),
        None,
    )
    .await;
    assert_eq!(body["data"]["alreadyCompleted"], true);
    assert_eq!(body["data"]["points"], 10);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/user/progress/beginner/ch2/quiz",
        Some(&learner),
        Some(json!({"answers": [0]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["score"]["passed"], true);
    assert_eq!(body["data"]["completion"]["points"], 20);

    let (_, body) = call(&app, Method::GET, "/api/user/progress/beginner", Some(&learner), None).await;
    assert_eq!(body["data"]["completed"], 2);
    assert_eq!(body["data"]["chapters"][2]["status"], "in_progress");

    let (_, body) = call(&app, Method::GET, "/api/user/leaderboard?limit=5", Some(&learner), None).await;
    assert_eq!(body["data"][0]["userId"], "learner");
    assert_eq!(body["data"][0]["rank"], 1);

    let (_, body) = call(&app, Method::GET, "/api/admin/users/learner/progress", Some(&admin), None).await;
    assert_eq!(body["data"]["paths"]["beginner"]["ch1"], "completed");
}

#[tokio::test]
async fn unknown_chapter_and_bad_input() {
    let app = app().await;
    let learner = token("learner", false);
    let admin = token("admin", true);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/user/progress/beginner/ch1/complete",
        Some(&learner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = call(&app, Method::GET, "/api/user/syllabus/points", Some(&learner), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::PUT,
        "/api/admin/syllabus/beginner/ch1",
        Some(&admin),
        Some(json!({"title": "No quiz options", "quiz": [{"question": "?", "options": ["a"], "correctAnswer": 0}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn video_library() {
    let app = app().await;
    let admin = token("admin", true);
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/admin/videos",
        Some(&admin),
        Some(json!({
            "title": "Phrasal verbs",
            "youtubeId": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "category": "Grammar"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["youtubeId"], "dQw4w9WgXcQ");

    let (_, body) = call(&app, Method::GET, "/api/public/videos?category=grammar", None, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let uri = format!("/api/admin/videos/{id}");
    let (status, body) = call(&app, Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "data": {"id": id}}));
    let (status, _) = call(&app, Method::GET, &format!("/api/public/videos/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deletes_answer_with_the_removed_id() {
    let app = app().await;
    let admin = token("admin", true);
    call(&app, Method::PUT, "/api/admin/syllabus/beginner/ch1", Some(&admin), Some(chapter("Greetings"))).await;
    call(&app, Method::PUT, "/api/admin/syllabus/beginner/ch2", Some(&admin), Some(chapter("Numbers"))).await;

    let (status, body) = call(&app, Method::DELETE, "/api/admin/syllabus/beginner/ch1", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "data": {"id": "beginner/ch1"}}));

    let (status, body) = call(&app, Method::DELETE, "/api/admin/syllabus/beginner", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "data": {"id": "beginner"}}));
}
