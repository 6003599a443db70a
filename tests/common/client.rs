//! Test WebSocket client.
//!
//! Sends JSON events and asserts on received server events.

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// A test chat client.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Connect to a test server and consume the greeting event.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (ws, _) = connect_async(url).await?;
        let mut client = Self { ws };

        let greeting = client.recv_event().await?;
        anyhow::ensure!(
            greeting["event"] == "connected",
            "expected connected greeting, got {greeting}"
        );

        Ok(client)
    }

    /// Send a JSON event frame.
    pub async fn send_event(&mut self, event: Value) -> anyhow::Result<()> {
        self.ws.send(Message::Text(event.to_string())).await?;
        Ok(())
    }

    /// Receive a single event from the server.
    pub async fn recv_event(&mut self) -> anyhow::Result<Value> {
        self.recv_event_timeout(Duration::from_secs(5)).await
    }

    /// Receive an event with a timeout, skipping control frames.
    pub async fn recv_event_timeout(&mut self, dur: Duration) -> anyhow::Result<Value> {
        let deadline = tokio::time::Instant::now() + dur;
        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .unwrap_or_default();
            let frame = timeout(remaining, self.ws.next())
                .await?
                .ok_or_else(|| anyhow::anyhow!("connection closed"))?;

            match frame? {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(_) => anyhow::bail!("connection closed"),
                _ => continue,
            }
        }
    }

    /// Receive events until the predicate matches, returning everything seen.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<Value>>
    where
        F: FnMut(&Value) -> bool,
    {
        let mut events = Vec::new();
        loop {
            let event = self.recv_event().await?;
            let done = predicate(&event);
            events.push(event);
            if done {
                break;
            }
        }
        Ok(events)
    }

    /// Receive events until one with the given `event` tag arrives.
    pub async fn expect_event(&mut self, name: &str) -> anyhow::Result<Value> {
        let mut events = self.recv_until(|e| e["event"] == name).await?;
        Ok(events.pop().expect("recv_until returns at least one event"))
    }

    /// Register a username and wait for the acknowledgement.
    pub async fn register(&mut self, username: &str) -> anyhow::Result<()> {
        self.send_event(json!({"event": "register", "username": username}))
            .await?;
        let ack = self.expect_event("registered").await?;
        anyhow::ensure!(ack["username"] == username, "registration failed: {ack}");
        Ok(())
    }

    /// Join a group room and wait for the acknowledgement.
    #[allow(dead_code)]
    pub async fn join_group(&mut self, name: &str) -> anyhow::Result<String> {
        self.send_event(json!({
            "event": "join_room",
            "room_type": "group",
            "room_name": name,
        }))
        .await?;
        let ack = self.expect_event("room_joined").await?;
        Ok(ack["room"].as_str().unwrap_or_default().to_string())
    }

    /// Close the connection.
    #[allow(dead_code)]
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }

    /// Join a direct room with `target` and wait for the acknowledgement.
    #[allow(dead_code)]
    pub async fn join_dm(&mut self, target: &str) -> anyhow::Result<String> {
        self.send_event(json!({
            "event": "join_room",
            "room_type": "dm",
            "target": target,
        }))
        .await?;
        let ack = self.expect_event("room_joined").await?;
        Ok(ack["room"].as_str().unwrap_or_default().to_string())
    }
}
