//! HTTP read API flows.

mod common;

use common::TestServer;
use serde_json::{Value, json};

/// History, presence, and notification routes serve what the WebSocket
/// pipeline stored; mark-read flips rows exactly once.
#[tokio::test]
async fn read_api_reflects_pipeline_state() -> anyhow::Result<()> {
    let server = TestServer::spawn(8201).await?;

    let mut alice = server.connect().await?;
    alice.register("alice").await?;
    alice.join_group("lobby").await?;

    let mut bob = server.connect().await?;
    bob.register("bob").await?;
    bob.join_group("lobby").await?;

    bob.send_event(json!({
        "event": "send_message",
        "room_name": "lobby",
        "content": "@alice hello",
    }))
    .await?;
    alice.expect_event("notification_update").await?;

    // message history, oldest first, with mentions
    let messages: Vec<Value> = reqwest::get(
        server.api_url("/api/messages?room_type=group&room_name=lobby"),
    )
    .await?
    .json()
    .await?;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["sender"], "bob");
    assert_eq!(messages[0]["content"], "@alice hello");
    assert_eq!(messages[0]["mentions"], json!(["alice"]));

    // live presence from the registry
    let users: Value = reqwest::get(server.api_url("/api/room_users?room_name=lobby"))
        .await?
        .json()
        .await?;
    assert_eq!(users["users"], json!(["alice", "bob"]));

    // alice's notifications, newest first
    let notifications: Vec<Value> =
        reqwest::get(server.api_url("/api/notifications?user=alice"))
            .await?
            .json()
            .await?;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["type"], "mention");
    assert_eq!(notifications[0]["sender"], "bob");
    assert_eq!(notifications[0]["is_read"], false);
    assert_eq!(
        notifications[0]["title"],
        "You were mentioned by bob in group: lobby"
    );

    // mark all read, then nothing is left to flip
    let client = reqwest::Client::new();
    let updated: Value = client
        .post(server.api_url("/api/notifications/read"))
        .json(&json!({"user": "alice"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(updated["updated"], 1);

    let updated: Value = client
        .post(server.api_url("/api/notifications/read"))
        .json(&json!({"user": "alice"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(updated["updated"], 0);

    Ok(())
}

/// Invalid room requests and missing parameters are 400s with error bodies.
#[tokio::test]
async fn bad_requests_get_400() -> anyhow::Result<()> {
    let server = TestServer::spawn(8211).await?;

    let response =
        reqwest::get(server.api_url("/api/messages?room_type=dm&user=alice")).await?;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "user and target required for direct messages");

    let response = reqwest::get(server.api_url("/api/room_users?room_type=carrier")).await?;
    assert_eq!(response.status(), 400);

    let response = reqwest::get(server.api_url("/api/notifications")).await?;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "user parameter required");

    Ok(())
}

/// The metrics endpoint exposes event counters.
#[tokio::test]
async fn metrics_are_exposed() -> anyhow::Result<()> {
    let server = TestServer::spawn(8221).await?;

    let mut client = server.connect().await?;
    client.register("alice").await?;

    let body = reqwest::get(server.api_url("/metrics")).await?.text().await?;
    assert!(body.contains("chat_event_total"));
    assert!(body.contains("chat_connected_clients"));

    Ok(())
}
