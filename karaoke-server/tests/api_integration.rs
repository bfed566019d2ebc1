//! Integration tests for the karaoke-server HTTP API
//!
//! Drives the router in-process with `oneshot`; every test gets its own
//! in-memory database and media root.

use axum::body::Body;
use axum::http::StatusCode;
use http::{Method, Request};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use karaoke_common::db::init_memory_database;
use karaoke_server::{build_router, AppState};

struct TestServer {
    app: axum::Router,
    state: AppState,
    root: TempDir,
}

async fn setup_test_server() -> TestServer {
    let root = TempDir::new().unwrap();
    let pool = init_memory_database().await.unwrap();
    let state = AppState::new(pool, root.path());
    state.settings.seed_defaults().await.unwrap();
    let app = build_router(state.clone());
    TestServer { app, state, root }
}

/// Send one request and decode the JSON body (if any)
async fn make_request(
    app: &axum::Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Option<Value>) {
    let mut request = Request::builder().method(method).uri(path);

    let request = match body {
        Some(json_body) => {
            request = request.header("content-type", "application/json");
            request.body(Body::from(json_body.to_string())).unwrap()
        }
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json_body = if bytes.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&bytes).unwrap())
    };

    (status, json_body)
}

async fn add(app: &axum::Router, requester: &str, song: &str) -> (StatusCode, Option<Value>) {
    make_request(
        app,
        Method::POST,
        "/api/queue/add",
        Some(json!({ "requester": requester, "song_name": song })),
    )
    .await
}

#[tokio::test]
async fn test_health() {
    let server = setup_test_server().await;

    let (status, body) = make_request(&server.app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "karaoke-server");
}

#[tokio::test]
async fn test_queue_listing_is_fifo_with_positions() {
    let server = setup_test_server().await;

    assert_eq!(add(&server.app, "ana", "a.mp4").await.0, StatusCode::CREATED);
    assert_eq!(add(&server.app, "bia", "b.mp4").await.0, StatusCode::CREATED);

    let (status, body) = make_request(&server.app, Method::GET, "/api/queue", None).await;
    assert_eq!(status, StatusCode::OK);

    let listing = body.unwrap();
    let listing = listing.as_array().unwrap();
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0]["requester"], "ana");
    assert_eq!(listing[0]["position"], 1);
    assert_eq!(listing[1]["requester"], "bia");
    assert_eq!(listing[1]["position"], 2);
}

#[tokio::test]
async fn test_duplicate_submission_conflicts() {
    let server = setup_test_server().await;

    add(&server.app, "ana", "a.mp4").await;
    let (status, body) = add(&server.app, "ana", "b.mp4").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.unwrap()["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_duplicate_submission_allowed_when_disabled() {
    let server = setup_test_server().await;
    let (status, body) = make_request(
        &server.app,
        Method::POST,
        "/api/settings",
        Some(json!({ "prevent_duplicates": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["prevent_duplicates"], false);

    add(&server.app, "ana", "a.mp4").await;
    let (status, _) = add(&server.app, "ana", "b.mp4").await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) =
        make_request(&server.app, Method::GET, "/api/queue/requester/ana", None).await;
    assert_eq!(body.unwrap().as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_empty_requester_is_bad_request() {
    let server = setup_test_server().await;
    let (status, _) = add(&server.app, "", "a.mp4").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_swaps_existing_entry() {
    let server = setup_test_server().await;
    add(&server.app, "ana", "a.mp4").await;

    let (status, body) = make_request(
        &server.app,
        Method::POST,
        "/api/queue/set",
        Some(json!({ "requester": "ana", "song_name": "c.mp4" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["outcome"], "swapped");
    assert_eq!(body["entry"]["song_name"], "c.mp4");
    assert_eq!(server.state.queue.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_change_song_requires_owner() {
    let server = setup_test_server().await;
    let (_, body) = add(&server.app, "ana", "a.mp4").await;
    let id = body.unwrap()["id"].as_str().unwrap().to_string();

    let (status, _) = make_request(
        &server.app,
        Method::PUT,
        &format!("/api/queue/{}", id),
        Some(json!({ "requester": "bia", "song_name": "x.mp4" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = make_request(
        &server.app,
        Method::PUT,
        &format!("/api/queue/{}", id),
        Some(json!({ "requester": "ana", "song_name": "b.mp4" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["song_name"], "b.mp4");
}

#[tokio::test]
async fn test_change_missing_entry_is_not_found() {
    let server = setup_test_server().await;
    let (status, _) = make_request(
        &server.app,
        Method::PUT,
        &format!("/api/queue/{}", uuid::Uuid::new_v4()),
        Some(json!({ "requester": "ana", "song_name": "b.mp4" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_entry() {
    let server = setup_test_server().await;
    let (_, body) = add(&server.app, "ana", "a.mp4").await;
    let path = format!("/api/queue/{}", body.unwrap()["id"].as_str().unwrap());

    let (status, _) = make_request(&server.app, Method::DELETE, &path, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = make_request(&server.app, Method::DELETE, &path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_player_flow() {
    let server = setup_test_server().await;

    // Nothing queued: silent
    let (status, body) =
        make_request(&server.app, Method::GET, "/api/player/peek-next", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap(), json!({}));

    add(&server.app, "ana", "a.mp4").await;
    add(&server.app, "bia", "b.mp4").await;

    let (_, body) = make_request(&server.app, Method::GET, "/api/player/peek-next", None).await;
    let preview = body.unwrap();
    assert_eq!(preview["song_name"], "a.mp4");
    assert_eq!(preview["requester"], "ana");
    assert_eq!(preview["timeout_seconds"], 20);

    let (status, body) =
        make_request(&server.app, Method::POST, "/api/player/play-next", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["song_name"], "a.mp4");

    // Busy slot: peek is silent, commit conflicts
    let (_, body) = make_request(&server.app, Method::GET, "/api/player/peek-next", None).await;
    assert_eq!(body.unwrap(), json!({}));
    let (status, _) =
        make_request(&server.app, Method::POST, "/api/player/play-next", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = make_request(&server.app, Method::GET, "/api/player/status", None).await;
    assert_eq!(body.unwrap()["state"], "playing");

    let (status, body) =
        make_request(&server.app, Method::POST, "/api/player/finished", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["finished"]["song_name"], "a.mp4");

    let (status, _) =
        make_request(&server.app, Method::POST, "/api/player/finished", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = make_request(&server.app, Method::GET, "/api/player/peek-next", None).await;
    assert_eq!(body.unwrap()["song_name"], "b.mp4");
}

#[tokio::test]
async fn test_play_next_on_empty_queue_is_not_found() {
    let server = setup_test_server().await;
    let (status, _) =
        make_request(&server.app, Method::POST, "/api/player/play-next", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_skip_discards_peeked_song() {
    let server = setup_test_server().await;
    add(&server.app, "ana", "a.mp4").await;
    add(&server.app, "bia", "b.mp4").await;

    make_request(&server.app, Method::GET, "/api/player/peek-next", None).await;
    let (status, body) = make_request(&server.app, Method::POST, "/api/player/skip", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["skipped"]["song_name"], "a.mp4");

    let (status, _) = make_request(&server.app, Method::POST, "/api/player/skip", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = make_request(&server.app, Method::GET, "/api/queue", None).await;
    let listing = body.unwrap();
    assert_eq!(listing.as_array().unwrap().len(), 1);
    assert_eq!(listing[0]["song_name"], "b.mp4");
}

#[tokio::test]
async fn test_videos_exclude_queued_and_recent() {
    let server = setup_test_server().await;
    let converted = server.root.path().join("videos").join("converted");
    std::fs::create_dir_all(&converted).unwrap();
    for name in ["A.mp4", "B.mp4", "C.webm", "notes.txt"] {
        std::fs::write(converted.join(name), b"x").unwrap();
    }

    let (status, body) = make_request(&server.app, Method::GET, "/api/videos", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap(), json!(["A.mp4", "B.mp4", "C.webm"]));

    add(&server.app, "ana", "B.mp4").await;
    make_request(
        &server.app,
        Method::POST,
        "/api/settings",
        Some(json!({ "cooldown_hours": 2 })),
    )
    .await;
    let (status, _) = make_request(
        &server.app,
        Method::POST,
        "/api/log/played",
        Some(json!({ "song_name": "A.mp4" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = make_request(&server.app, Method::GET, "/api/videos", None).await;
    assert_eq!(body.unwrap(), json!(["C.webm"]));
}

#[tokio::test]
async fn test_videos_without_folder_is_empty() {
    let server = setup_test_server().await;
    let (status, body) = make_request(&server.app, Method::GET, "/api/videos", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap(), json!([]));
}

#[tokio::test]
async fn test_settings_round_trip_and_validation() {
    let server = setup_test_server().await;

    let (status, body) = make_request(&server.app, Method::GET, "/api/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["prevent_duplicates"], true);
    assert_eq!(body["cooldown_hours"], 0);
    assert_eq!(body["confirmation_timeout_seconds"], 20);
    assert_eq!(body["transcoder_path"], "ffmpeg");

    let (status, _) = make_request(
        &server.app,
        Method::POST,
        "/api/settings",
        Some(json!({ "cooldown_hours": 3, "confirmation_timeout_seconds": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing from the rejected update was written
    let (_, body) = make_request(&server.app, Method::GET, "/api/settings", None).await;
    assert_eq!(body.unwrap()["cooldown_hours"], 0);
}

#[tokio::test]
async fn test_conversion_status_and_cancel_when_idle() {
    let server = setup_test_server().await;

    let (status, body) =
        make_request(&server.app, Method::GET, "/api/conversion/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["phase"], "idle");

    let (status, _) =
        make_request(&server.app, Method::POST, "/api/conversion/cancel", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_conversion_start_reports_missing_folder() {
    let server = setup_test_server().await;

    let (status, _) =
        make_request(&server.app, Method::POST, "/api/conversion/start", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let mut last = Value::Null;
    for _ in 0..100 {
        let (_, body) =
            make_request(&server.app, Method::GET, "/api/conversion/status", None).await;
        last = body.unwrap();
        if last["phase"] != "running" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    assert_eq!(last["phase"], "failed");
    assert!(last["message"].as_str().unwrap().starts_with("Error"));
}
