use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

use feedback_review::{
    app,
    catalog::ArchiveSource,
    client::{ClientError, NoticeLevel, ReviewClient, SessionController},
    config::ClientConfig,
    db::DBLayer,
    export::{ExportFormat, ExportService},
    model::{Rating, Role},
    state::AppState,
    stats::Period,
};

fn archive() -> Value {
    json!({
        "alice": {
            "s1": {
                "chat_history": [
                    {"role": "user", "content": "hi", "id": "abc", "timestamp": "2024-03-01T10:00:00Z"},
                    {"role": "assistant", "content": "hello", "timestamp": "2024-03-01T10:00:05Z"}
                ],
                "projects": [{"name": "launch"}],
                "tasks": [],
                "email_thread_chain": [],
                "email_thread_id": null
            },
            "s2": [
                {"id": "ex", "messages": [
                    {"role": "human", "content": "q"},
                    {"role": "ai", "content": "a"}
                ]}
            ]
        },
        "bob": {
            "s9": [
                {"role": "user", "content": "ping", "timestamp": "2024-04-02T09:00:00Z"},
                {"role": "assistant", "content": "pong"}
            ]
        }
    })
}

struct TestServer {
    base_url: String,
    _dir: TempDir,
}

async fn spawn_server() -> TestServer {
    let dir = TempDir::new().unwrap();
    let archive_path = dir.path().join("archive.json");
    std::fs::write(&archive_path, archive().to_string()).unwrap();

    let db_path = dir.path().join("feedbackdb");
    let state = AppState {
        db: Arc::new(DBLayer::new(db_path.to_str().unwrap()).unwrap()),
        source: ArchiveSource::File(archive_path),
        exports: ExportService::new(dir.path().join("exports")).await.unwrap(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(state).into_make_service())
            .await
            .unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}"),
        _dir: dir,
    }
}

fn quiet_config(base_url: &str) -> ClientConfig {
    ClientConfig {
        api_url: base_url.to_string(),
        auto_refresh: false,
        // keep the delayed refresh out of the assertions
        refresh_delay: Duration::from_secs(60),
        ..ClientConfig::default()
    }
}

#[tokio::test]
async fn browses_users_sessions_and_messages() {
    let server = spawn_server().await;
    let client = ReviewClient::new(&server.base_url);

    let users: Vec<_> = client.users().await.unwrap().into_iter().map(|u| u.id).collect();
    assert_eq!(users, vec!["alice", "bob"]);

    let sessions = client.sessions("alice").await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].id, "s1");
    assert_eq!(sessions[0].message_count, Some(2));
    assert_eq!(sessions[0].created_at.as_deref(), Some("2024-03-01T10:00:00Z"));
    assert_eq!(sessions[1].last_activity.as_deref(), Some("Unknown"));
    assert!(client.sessions("nobody").await.unwrap().is_empty());

    let chat = client.session_chat("alice", "s1").await.unwrap();
    let ids: Vec<_> = chat.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["abc", "alice_s1_1"]);
    assert_eq!(chat.messages[1].role, Role::Assistant);
    assert_eq!(chat.projects, vec![json!({"name": "launch"})]);
    assert!(chat.messages.iter().all(|m| m.comments.is_empty() && m.feedback.is_none()));

    let exchange = client.session_chat("alice", "s2").await.unwrap();
    let sequences: Vec<_> = exchange.messages.iter().map(|m| m.sequence).collect();
    assert_eq!(sequences, vec![0, 1]);

    let missing = client.session_chat("alice", "nope").await.unwrap();
    assert!(missing.messages.is_empty());

    // default records exist after the session was opened
    let opened = client.message("alice_s1_1").await.unwrap();
    assert_eq!(opened.content, json!("hello"));
    assert!(opened.comments.is_empty());

    let err = client.message("ghost").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn validates_comment_bodies() {
    let server = spawn_server().await;
    let http = reqwest::Client::new();
    let url = format!("{}/api/comments", server.base_url);

    for body in [
        json!({"comment": "no id"}),
        json!({"message_id": "m", "rating": "excellent"}),
        json!({"message_id": "m", "comment": 42}),
    ] {
        let response = http.post(&url).json(&body).send().await.unwrap();
        assert_eq!(response.status(), 400, "accepted {body}");
        let payload: Value = response.json().await.unwrap();
        assert!(payload["error"].is_string());
    }

    let ok = http
        .post(&url)
        .json(&json!({"interactionId": "bob_s9_0", "comment": "legacy field", "rating": "neutral"}))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), 200);
    assert_eq!(ok.json::<Value>().await.unwrap(), json!({"success": true}));

    let client = ReviewClient::new(&server.base_url);
    let stored = client.message("bob_s9_0").await.unwrap();
    assert_eq!(stored.comments, vec!["legacy field".to_string()]);
    assert_eq!(stored.feedback, None);
}

#[tokio::test]
async fn comment_on_plain_id_uses_composite_id() {
    let server = spawn_server().await;
    let client = ReviewClient::new(&server.base_url);
    let controller =
        SessionController::new(client.clone(), quiet_config(&server.base_url), "alice", "s1");
    controller.load().await.unwrap();

    controller.add_comment(0, "  needs work ").await.unwrap();

    let stored = client.message("alice_s1_0").await.unwrap();
    assert_eq!(stored.id, "abc");
    assert_eq!(stored.comments, vec!["needs work".to_string()]);
    let by_own_id = client.message("abc").await.unwrap();
    assert_eq!(by_own_id.comments, vec!["needs work".to_string()]);

    let view = controller.snapshot().await;
    assert_eq!(view.messages[0].comments, vec!["needs work".to_string()]);
    let notices = controller.take_notices().await;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Success);
}

#[tokio::test]
async fn feedback_on_plain_id_survives_reload() {
    let server = spawn_server().await;
    let client = ReviewClient::new(&server.base_url);
    let controller =
        SessionController::new(client.clone(), quiet_config(&server.base_url), "alice", "s1");
    controller.load().await.unwrap();

    controller.add_comment(0, "keep me").await.unwrap();
    controller.set_feedback(0, Rating::Bad).await.unwrap();
    controller.load().await.unwrap();

    let view = controller.snapshot().await;
    assert_eq!(view.messages[0].id, "abc");
    assert_eq!(view.messages[0].comments, vec!["keep me".to_string()]);
    assert_eq!(view.messages[0].feedback, Some(Rating::Bad));
    assert!(view.messages[1].comments.is_empty());

    // the session payload agrees for any other reviewer too
    let chat = client.session_chat("alice", "s1").await.unwrap();
    assert_eq!(chat.messages[0].comments, vec!["keep me".to_string()]);
}

#[tokio::test]
async fn delayed_refresh_keeps_written_feedback() {
    let server = spawn_server().await;
    let client = ReviewClient::new(&server.base_url);
    let config = ClientConfig {
        refresh_delay: Duration::from_millis(50),
        ..quiet_config(&server.base_url)
    };
    let controller = SessionController::new(client, config, "alice", "s1");
    controller.load().await.unwrap();

    controller.set_feedback(1, Rating::Good).await.unwrap();
    controller.add_comment(0, "first").await.unwrap();
    controller.add_comment(1, "second").await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let view = controller.snapshot().await;
    assert!(view.error.is_none());
    assert_eq!(view.messages[0].comments, vec!["first".to_string()]);
    assert_eq!(view.messages[1].comments, vec!["second".to_string()]);
    assert_eq!(view.messages[1].feedback, Some(Rating::Good));
}

#[tokio::test]
async fn rating_toggles_and_reconciles() {
    let server = spawn_server().await;
    let client = ReviewClient::new(&server.base_url);
    let controller =
        SessionController::new(client.clone(), quiet_config(&server.base_url), "alice", "s1");
    controller.load().await.unwrap();

    controller.set_feedback(1, Rating::Good).await.unwrap();
    assert_eq!(controller.snapshot().await.messages[1].feedback, Some(Rating::Good));
    assert_eq!(
        client.message("alice_s1_1").await.unwrap().feedback,
        Some(Rating::Good)
    );

    controller.set_feedback(1, Rating::Good).await.unwrap();
    assert_eq!(controller.snapshot().await.messages[1].feedback, None);
    assert_eq!(client.message("alice_s1_1").await.unwrap().feedback, None);

    controller.set_feedback(1, Rating::Bad).await.unwrap();
    controller.load().await.unwrap();
    assert_eq!(controller.snapshot().await.messages[1].feedback, Some(Rating::Bad));
}

#[tokio::test]
async fn failed_writes_leave_state_untouched() {
    let server = spawn_server().await;
    let controller = SessionController::new(
        ReviewClient::new(&server.base_url),
        quiet_config(&server.base_url),
        "alice",
        "s1",
    );
    controller.load().await.unwrap();
    let before = controller.snapshot().await.messages;

    // same messages, but every request goes to a closed port
    let offline = SessionController::new(
        ReviewClient::new("http://127.0.0.1:9"),
        quiet_config("http://127.0.0.1:9"),
        "alice",
        "s1",
    );
    offline.set_messages(before.clone()).await;

    assert!(matches!(
        offline.add_comment(1, "lost").await,
        Err(ClientError::Http(_))
    ));
    assert!(offline.set_feedback(1, Rating::Bad).await.is_err());
    assert_eq!(offline.snapshot().await.messages, before);

    let notices = offline.take_notices().await;
    assert_eq!(notices.len(), 2);
    assert!(notices.iter().all(|n| n.level == NoticeLevel::Error));

    assert!(offline.load().await.is_err());
    assert!(offline.snapshot().await.error.is_some());
}

#[tokio::test]
async fn interactions_and_dashboard() {
    let server = spawn_server().await;
    let client = ReviewClient::new(&server.base_url);

    client.set_rating("alice_s1_0", Some(Rating::Good)).await.unwrap();
    client.add_comment("alice_s1_0", "great answer").await.unwrap();
    client.set_rating("bob_s9_0", Some(Rating::Bad)).await.unwrap();

    let interactions = client.interactions().await.unwrap();
    let ids: Vec<_> = interactions.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["alice_s1_0", "alice_s2_0", "bob_s9_0"]);
    assert_eq!(interactions[0].rating, Some(Rating::Good));
    assert_eq!(interactions[0].comments, vec!["great answer".to_string()]);
    assert_eq!(interactions[1].timestamp, "Unknown time");

    let stats = client.stats().await.unwrap();
    assert_eq!(stats.total_interactions, 3);
    assert_eq!(stats.active_users, 2);
    assert_eq!(stats.total_sessions, 3);
    assert_eq!(stats.total_messages, 6);

    let ratings = client.ratings().await.unwrap();
    assert_eq!((ratings.good, ratings.bad, ratings.neutral), (1, 1, 1));

    let monthly = client.interactions_over_time(Period::Month).await.unwrap();
    let labels: Vec<_> = monthly.iter().map(|b| b.date.as_str()).collect();
    assert_eq!(labels, vec!["2024-03", "2024-04"]);

    let activity = client.comment_activity(Period::Day).await.unwrap();
    assert_eq!(activity.iter().map(|b| b.value).sum::<usize>(), 1);

    let ratios = client.user_ratios().await.unwrap();
    assert_eq!(ratios[0].user_id, "alice");
    assert_eq!(ratios[0].good_ratio, 1.0);
    assert_eq!(ratios[1].good_ratio, 0.0);

    let bad_period = reqwest::get(format!(
        "{}/api/interactions-over-time?period=decade",
        server.base_url
    ))
    .await
    .unwrap();
    assert_eq!(bad_period.status(), 400);
}

#[tokio::test]
async fn exports_and_raw_archive() {
    let server = spawn_server().await;
    let client = ReviewClient::new(&server.base_url);

    assert_eq!(client.chat_histories().await.unwrap(), archive());

    let exported = client.export(ExportFormat::Flat).await.unwrap();
    assert_eq!(exported.records, 6);
    let rows: Vec<Value> =
        serde_json::from_slice(&std::fs::read(&exported.path).unwrap()).unwrap();
    assert_eq!(rows.len(), 6);

    let nested = client.export(ExportFormat::Nested).await.unwrap();
    assert_eq!(nested.records, 3);
}
