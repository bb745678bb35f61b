//! Integration tests for the HTTP routes, driven through the router with
//! `oneshot` against an in-memory database.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use futures::StreamExt;
use serde_json::{Value, json};
use tower::util::ServiceExt; // for `oneshot` method

use setlist::api::{AppState, create_router};
use setlist::config::AppConfig;
use setlist::db::{DbConfig, NewUser, UserRepository, run_migrations};

struct TestApp {
    router: Router,
    admin: String,
    alice: String,
    bob: String,
}

fn setup() -> TestApp {
    setup_with(AppConfig::default())
}

fn setup_with(config: AppConfig) -> TestApp {
    let pool = DbConfig::in_memory().build_pool().expect("pool");
    run_migrations(&mut pool.get().expect("connection")).expect("migrations");

    let users = UserRepository::new(pool.clone());
    let mut key_for = |new_user: NewUser| {
        let user = users.create(&new_user).expect("create user");
        users.generate_api_key(user.id).expect("api key")
    };
    let admin = key_for(NewUser::admin("lead@band.com"));
    let alice = key_for(NewUser::regular("alice@band.com"));
    let bob = key_for(NewUser::regular("bob@band.com"));

    TestApp {
        router: create_router(AppState::new(pool, config)),
        admin,
        alice,
        bob,
    }
}

impl TestApp {
    async fn send(&self, method: &str, uri: &str, key: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn propose(&self, key: &str, title: &str) -> i64 {
        let (status, body) = self
            .send("POST", "/proposals", Some(key), Some(json!({"title": title, "artist": "The Band"})))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_health_no_auth_required() {
    let app = setup();
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_or_unknown_key_is_unauthorized() {
    let app = setup();
    let payload = json!({"title": "Song", "artist": "Band"});

    let (status, body) = app.send("POST", "/proposals", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = app.send("POST", "/proposals", Some("nope"), Some(payload)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_two_member_promotion_scenario() {
    let app = setup();
    let id = app.propose(&app.alice, "Song X").await;

    let (_, pending) = app.send("GET", "/proposals/pending", Some(&app.alice), None).await;
    assert_eq!(pending[0]["votes"], 0);
    assert_eq!(pending[0]["threshold"], 2);
    assert_eq!(pending[0]["mine"], false);

    let vote_uri = format!("/proposals/{id}/vote");
    let (status, _) = app.send("POST", &vote_uri, Some(&app.alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, pending) = app.send("GET", "/proposals/pending", Some(&app.alice), None).await;
    assert_eq!(pending[0]["votes"], 1);
    assert_eq!(pending[0]["mine"], true);

    let (status, _) = app.send("POST", &vote_uri, Some(&app.bob), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, approved) = app.send("GET", "/proposals/approved", None, None).await;
    assert_eq!(approved[0]["id"], id);
    assert_eq!(approved[0]["status"], "APPROVED");
    assert_eq!(approved[0]["setlistOrder"], 1);

    let (_, pending) = app.send("GET", "/proposals/pending", None, None).await;
    assert_eq!(pending, json!([]));
    let (_, count) = app.send("GET", "/proposals/pending/count", None, None).await;
    assert_eq!(count["count"], 0);

    let (status, body) = app.send("POST", &vote_uri, Some(&app.alice), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, _) = app.send("DELETE", &vote_uri, Some(&app.bob), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send("DELETE", &vote_uri, Some(&app.bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, approved) = app.send("GET", "/proposals/approved", None, None).await;
    assert_eq!(approved[0]["status"], "APPROVED");

    let (status, audit) = app.send("GET", "/admin/audit?limit=2", Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit[0]["action"], "UNVOTE");
    assert_eq!(audit[1]["action"], "VOTE");
    assert_eq!(audit.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_vote_on_unknown_proposal() {
    let app = setup();
    let (status, _) = app.send("POST", "/proposals/4242/vote", Some(&app.alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_bodies_are_bad_requests() {
    let app = setup();

    let (status, body) = app
        .send(
            "POST",
            "/proposals",
            Some(&app.alice),
            Some(json!({"title": "Song", "artist": "Band", "chartUrl": "example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let request = Request::builder()
        .method("POST")
        .uri("/proposals")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.alice))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let app = setup();
    let id = app.propose(&app.alice, "Song").await;

    let (status, body) = app
        .send("PATCH", &format!("/proposals/{id}"), Some(&app.alice), Some(json!({"title": "Mine now"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = app.send("GET", "/admin/users", Some(&app.bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, users) = app.send("GET", "/admin/users", Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_admin_edit_and_detail() {
    let app = setup();
    let (status, created) = app
        .send(
            "POST",
            "/admin/proposals",
            Some(&app.admin),
            Some(json!({
                "title": "Opener",
                "artist": "The Band",
                "youtubeUrl": "https://www.youtube.com/watch?v=abc"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_i64().unwrap();

    let uri = format!("/proposals/{id}");
    let (_, detail) = app.send("GET", &uri, Some(&app.admin), None).await;
    assert_eq!(detail["status"], "APPROVED");
    assert_eq!(detail["setlistOrder"], 1);
    assert_eq!(detail["votes"], 0);

    let (status, _) = app
        .send("PATCH", &uri, Some(&app.admin), Some(json!({"youtubeUrl": null, "status": "ARCHIVED"})))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, detail) = app.send("GET", &uri, Some(&app.admin), None).await;
    assert_eq!(detail["youtubeUrl"], Value::Null);
    assert_eq!(detail["status"], "ARCHIVED");
    assert_eq!(detail["setlistOrder"], Value::Null);

    let (status, _) = app
        .send("PATCH", &uri, Some(&app.admin), Some(json!({"status": "FINISHED"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send("DELETE", &uri, Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send("GET", &uri, Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reorder_setlist() {
    let app = setup();
    let mut ids = Vec::new();
    for title in ["One", "Two", "Three"] {
        let (_, created) = app
            .send("POST", "/admin/proposals", Some(&app.admin), Some(json!({"title": title, "artist": "Band"})))
            .await;
        ids.push(created["id"].as_i64().unwrap());
    }
    let pending = app.propose(&app.alice, "Not yet").await;

    let (status, body) = app
        .send("PATCH", "/setlist/reorder", Some(&app.admin), Some(json!({"ids": [ids[1], pending]})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], format!("id_not_reorderable:{pending}"));

    let (status, body) = app
        .send("PATCH", "/setlist/reorder", Some(&app.admin), Some(json!({"ids": [ids[2], ids[0], ids[1]]})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (_, approved) = app.send("GET", "/proposals/approved", None, None).await;
    let order: Vec<i64> = approved
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(order, vec![ids[2], ids[0], ids[1]]);
}

#[tokio::test]
async fn test_settings_round_trip() {
    let app = setup();

    let (_, settings) = app.send("GET", "/settings", None, None).await;
    assert_eq!(settings["voteThreshold"], 2);

    let (status, body) = app
        .send("PATCH", "/settings", Some(&app.admin), Some(json!({"voteThreshold": 0})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad threshold");

    let (status, _) = app
        .send(
            "PATCH",
            "/settings",
            Some(&app.admin),
            Some(json!({"voteThreshold": "1", "adminAllowlist": ["lead@band.com"]})),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, settings) = app.send("GET", "/settings", None, None).await;
    assert_eq!(settings["voteThreshold"], 1);
    assert_eq!(settings["adminAllowlist"], json!(["lead@band.com"]));

    // A single vote now promotes.
    let id = app.propose(&app.bob, "Quick one").await;
    app.send("POST", &format!("/proposals/{id}/vote"), Some(&app.bob), None).await;
    let (_, approved) = app.send("GET", "/proposals/approved", None, None).await;
    assert_eq!(approved[0]["id"], id);
}

#[tokio::test]
async fn test_user_management() {
    let app = setup();

    let (status, user) = app
        .send("POST", "/admin/users", Some(&app.admin), Some(json!({"email": " Keys@Band.com ", "name": "Keys"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["email"], "keys@band.com");
    assert!(user.get("apiKey").is_none());
    let id = user["id"].as_i64().unwrap();

    let (status, _) = app
        .send("POST", "/admin/users", Some(&app.admin), Some(json!({"email": "bad-email"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/admin/users/{id}");
    let (status, _) = app.send("PATCH", &uri, Some(&app.admin), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, user) = app.send("PATCH", &uri, Some(&app.admin), Some(json!({"isAdmin": true}))).await;
    assert_eq!(user["isAdmin"], true);

    let (status, issued) = app.send("POST", &format!("{uri}/api-key"), Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let key = issued["apiKey"].as_str().unwrap().to_string();
    let (status, _) = app.send("GET", "/proposals/all", Some(&key), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("DELETE", &uri, Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send("DELETE", &uri, Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stream_starts_with_hello() {
    let app = setup();

    let (status, _) = app.send("GET", "/stream", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/stream")
        .header("x-api-key", app.alice.as_str())
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let mut frames = response.into_body().into_data_stream();
    let first = frames.next().await.unwrap().unwrap();
    let text = String::from_utf8_lossy(&first);
    assert!(text.starts_with("data: "), "{text}");
    assert!(text.contains(r#""type":"hello""#), "{text}");
}

#[tokio::test]
async fn test_settings_never_expose_configured_admins() {
    let app = setup_with(AppConfig {
        admin_allowlist: vec!["secret-admin@band.com".to_string()],
        ..AppConfig::default()
    });

    let (status, settings) = app.send("GET", "/settings", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["voteThreshold"], 2);
    assert_eq!(settings["adminAllowlist"], json!([]));

    app.send("PATCH", "/settings", Some(&app.admin), Some(json!({"voteThreshold": 3, "adminAllowlist": []})))
        .await;
    let (_, settings) = app.send("GET", "/settings", None, None).await;
    assert_eq!(settings["adminAllowlist"], json!([]));
}

#[tokio::test]
async fn test_proposal_rate_limit() {
    let app = setup();
    for n in 0..10 {
        app.propose(&app.alice, &format!("Song {n}")).await;
    }

    let (status, body) = app
        .send("POST", "/proposals", Some(&app.alice), Some(json!({"title": "One more", "artist": "Band"})))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");

    // The limit is per member.
    app.propose(&app.bob, "Still fine").await;
}

#[tokio::test]
async fn test_malformed_path_and_query_are_json_errors() {
    let app = setup();

    let (status, body) = app.send("POST", "/proposals/abc/vote", Some(&app.alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(body["error"].as_str().unwrap().contains("abc"));

    let (status, body) = app.send("GET", "/admin/audit?limit=lots", Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}
