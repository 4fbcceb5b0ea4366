//! End-to-end tests of the HTTP surface, driven through the router with
//! in-memory stores.
//!
//! Run: `cargo test --test http_api`

mod common;

use axum::http::StatusCode;
use bytes::Bytes;
use chrono::Utc;
use common::*;
use std::time::Duration;
use watcher::storage::frame_store::FRAME_NAME_FORMAT;
use watcher::{FrameStore, UrlSigner};

const BOB: [u8; 3] = [10, 20, 30];
const BOB_AGAIN: [u8; 3] = [12, 21, 30];
const STRANGER: [u8; 3] = [200, 150, 90];

/// alice / pw123 with cam-7 enrolled, face Bob saved and alerts to chat 42.
async fn alice_with_bob(h: &Harness) -> String {
    let token = h.register("alice", "pw123").await;
    let auth = Some(("alice", token.as_str()));

    h.frames.ensure_namespace("cam-7").await.unwrap();
    let reply = h
        .send(json("POST", "/cameras", auth, serde_json::json!({"camera_id": "cam-7", "name": "Porch"})))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());

    let reply = h.send(multipart("/faces", auth, &[("name", "Bob")], Some(&png(BOB)))).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());

    let reply = h.send(json("PUT", "/notifications", auth, serde_json::json!({"chat_id": "42"}))).await;
    assert_eq!(reply.status, StatusCode::OK);
    token
}

#[tokio::test]
async fn recognized_visitor_is_not_uploaded() {
    let h = Harness::new();
    alice_with_bob(&h).await;
    let mut live = h.live.subscribe();

    let reply = h.send(multipart("/upload", None, &[("camera_id", "cam-7")], Some(&png(BOB_AGAIN)))).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
    assert_eq!(
        reply.json(),
        serde_json::json!({"message": "Bob recognized, no upload", "recognized": "Bob"})
    );

    assert_eq!(h.frames.frame_count("cam-7"), 0);
    let pushes = h.settle().await;
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].destination, "42");
    assert!(pushes[0].text.contains("Bob"));
    assert!(pushes[0].image.is_none());
    assert!(live.try_recv().is_err());
}

#[tokio::test]
async fn unknown_visitor_is_stored_with_a_timestamp_name() {
    let h = Harness::new();
    alice_with_bob(&h).await;
    let mut live = h.live.subscribe();
    let frame = png(STRANGER);

    let before = Utc::now().format(FRAME_NAME_FORMAT).to_string();
    let reply = h.send(multipart("/upload", None, &[("camera_id", "cam-7")], Some(&frame))).await;
    let after = Utc::now().format(FRAME_NAME_FORMAT).to_string();

    assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
    let body = reply.json();
    assert_eq!(body["message"], "Image uploaded successfully");

    let names = h.frames.names("cam-7").await.unwrap();
    assert_eq!(names.len(), 1);
    assert_eq!(body["filename"], names[0].as_str());
    assert!(names[0].starts_with(&before) || names[0].starts_with(&after), "{} not in [{}, {}]", names[0], before, after);
    assert_eq!(h.frames.get("cam-7", &names[0]).await.unwrap(), frame);

    let pushes = h.settle().await;
    assert_eq!(pushes.len(), 1);
    assert!(pushes[0].text.starts_with("Unknown visitor"));
    assert_eq!(pushes[0].image.as_ref(), Some(&frame));

    let event = live.try_recv().unwrap();
    assert_eq!((event.event.as_str(), event.username.as_str()), ("new_frame", "alice"));
    assert!(live.try_recv().is_err());
}

#[tokio::test]
async fn camera_without_faces_stores_every_frame() {
    let h = Harness::new();
    let token = h.register("alice", "pw123").await;
    let auth = Some(("alice", token.as_str()));
    h.frames.ensure_namespace("cam-7").await.unwrap();
    h.send(json("POST", "/cameras", auth, serde_json::json!({"camera_id": "cam-7"}))).await;
    h.send(json("PUT", "/notifications", auth, serde_json::json!({"chat_id": "42"}))).await;
    let mut live = h.live.subscribe();

    // Black frames yield no face at all.
    let reply = h.send(multipart("/upload", None, &[("camera_id", "cam-7")], Some(&png([0, 0, 0])))).await;
    assert_eq!(reply.status, StatusCode::OK);

    assert_eq!(h.frames.frame_count("cam-7"), 1);
    assert_eq!(h.settle().await.len(), 1);
    assert!(live.try_recv().is_ok());
    assert!(live.try_recv().is_err());
}

#[tokio::test]
async fn unclaimed_camera_is_rejected() {
    let h = Harness::new();
    h.register("alice", "pw123").await;
    h.frames.ensure_namespace("cam-9").await.unwrap();

    for camera in ["cam-9", "never-created"] {
        let reply = h.send(multipart("/upload", None, &[("camera_id", camera)], Some(&png(STRANGER)))).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND, "{}", reply.text());
        assert!(reply.json()["error"].as_str().unwrap().contains(camera));
    }
    assert_eq!(h.frames.frame_count("cam-9"), 0);
    assert!(h.settle().await.is_empty());
}

#[tokio::test]
async fn malformed_uploads_are_refused() {
    let h = Harness::new();
    alice_with_bob(&h).await;

    let reply = h
        .send(multipart("/upload", None, &[("camera_id", "cam-7")], Some(&Bytes::from_static(b"not a jpeg"))))
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);

    let reply = h.send(multipart("/upload", None, &[("camera_id", "cam-7")], None)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = h.send(multipart("/upload", None, &[], Some(&png(STRANGER)))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    assert_eq!(h.frames.frame_count("cam-7"), 0);
}

#[tokio::test]
async fn registration_conflicts_and_login_issues_fresh_tokens() {
    let h = Harness::new();
    let first = h.register("alice", "pw123").await;

    let reply = h
        .send(json("POST", "/register", None, serde_json::json!({"username": "alice", "password": "other"})))
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let login = |password: &'static str| json("POST", "/login", None, serde_json::json!({"username": "alice", "password": password}));
    let reply = h.send(login("pw123")).await;
    assert_eq!(reply.status, StatusCode::OK);
    let second = reply.json()["session_token"].as_str().unwrap().to_string();
    assert_eq!(second.len(), 32);
    assert_ne!(first, second);

    assert_eq!(h.send(login("wrong")).await.status, StatusCode::UNAUTHORIZED);
    let reply = h.send(json("POST", "/login", None, serde_json::json!({"username": "alice"}))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logout_invalidates_the_token_everywhere() {
    let h = Harness::new();
    let token = h.register("alice", "pw123").await;
    let auth = Some(("alice", token.as_str()));

    assert_eq!(h.send(empty("GET", "/cameras", auth)).await.status, StatusCode::OK);
    assert_eq!(h.send(empty("POST", "/logout", auth)).await.status, StatusCode::OK);

    for (method, uri) in [("GET", "/cameras"), ("GET", "/frames"), ("GET", "/faces"), ("POST", "/logout")] {
        let reply = h.send(empty(method, uri, auth)).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
    }
    assert!(!h.accounts.has_session("alice", &token));
}

#[tokio::test]
async fn missing_credentials_are_unauthenticated() {
    let h = Harness::new();
    let token = h.register("alice", "pw123").await;

    assert_eq!(h.send(empty("GET", "/frames", None)).await.status, StatusCode::UNAUTHORIZED);

    let uri = format!("/cameras?username=alice&session_token={}", token);
    assert_eq!(h.send(empty("GET", &uri, None)).await.status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_face_is_a_conflict_and_adds_nothing() {
    let h = Harness::new();
    let token = alice_with_bob(&h).await;
    let auth = Some(("alice", token.as_str()));

    let reply = h.send(multipart("/faces", auth, &[("name", "Robert")], Some(&png(BOB_AGAIN)))).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.headers["location"], "/faces");
    assert!(reply.text().contains("Bob"));

    let faces = h.send(empty("GET", "/faces", auth)).await.json();
    assert_eq!(faces, serde_json::json!(["Bob"]));
    assert_eq!(h.accounts.get("alice").unwrap().faces.len(), 1);
}

#[tokio::test]
async fn a_camera_has_one_owner() {
    let h = Harness::new();
    let alice = h.register("alice", "pw123").await;
    let bob = h.register("bob", "hunter2").await;
    h.frames.ensure_namespace("cam-7").await.unwrap();

    let enroll = |user: &'static str, token: &str| {
        json("POST", "/cameras", Some((user, token)), serde_json::json!({"camera_id": "cam-7"}))
    };
    assert_eq!(h.send(enroll("alice", &alice)).await.status, StatusCode::CREATED);
    assert_eq!(h.send(enroll("bob", &bob)).await.status, StatusCode::CONFLICT);

    let reply = h.send(empty("DELETE", "/cameras/cam-7", Some(("alice", &alice)))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(h.send(enroll("bob", &bob)).await.status, StatusCode::CREATED);

    let reply = h
        .send(json("POST", "/cameras", Some(("bob", &bob)), serde_json::json!({"camera_id": "cam-404"})))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expired_links_fail_without_breaking_listing() {
    let h = Harness::new();
    let token = alice_with_bob(&h).await;
    let auth = Some(("alice", token.as_str()));
    h.send(multipart("/upload", None, &[("camera_id", "cam-7")], Some(&png(STRANGER)))).await;

    let listing = h.send(empty("GET", "/frames", auth)).await.json();
    let entry = &listing[0];
    assert_eq!(entry["camera"], "cam-7");
    assert_eq!(entry["camera_name"], "Porch");
    let name = entry["name"].as_str().unwrap().to_string();

    // Same key, issued two hours ago: the signature holds but the bound has passed.
    let stale = UrlSigner::new(SIGNING_KEY.to_vec(), PUBLIC_URL, Duration::from_secs(3600))
        .sign("cam-7", &name, chrono::Utc::now().timestamp() - 7200)
        .unwrap();
    let reply = h.send(empty("GET", local_path(&stale.url), None)).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let tampered = entry["url"].as_str().unwrap().replace("cam-7", "cam-8");
    assert_eq!(h.send(empty("GET", local_path(&tampered), None)).await.status, StatusCode::FORBIDDEN);

    let listing = h.send(empty("GET", "/frames", auth)).await;
    assert_eq!(listing.status, StatusCode::OK);
    let url = listing.json()[0]["url"].as_str().unwrap().to_string();
    let reply = h.send(empty("GET", local_path(&url), None)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers["content-type"], "image/png");
    assert_eq!(reply.body, png(STRANGER));
}

#[tokio::test]
async fn owner_can_delete_frames() {
    let h = Harness::new();
    let token = alice_with_bob(&h).await;
    let auth = Some(("alice", token.as_str()));
    let reply = h.send(multipart("/upload", None, &[("camera_id", "cam-7")], Some(&png(STRANGER)))).await;
    let name = reply.json()["filename"].as_str().unwrap().to_string();

    let other = h.register("mallory", "pw").await;
    let uri = format!("/frames/cam-7/{}", name);
    let reply = h.send(empty("DELETE", &uri, Some(("mallory", &other)))).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(h.frames.frame_count("cam-7"), 1);

    assert_eq!(h.send(empty("DELETE", &uri, auth)).await.status, StatusCode::OK);
    assert_eq!(h.frames.frame_count("cam-7"), 0);
    assert!(h.send(empty("GET", "/frames", auth)).await.json().as_array().unwrap().is_empty());
}
