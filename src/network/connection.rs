//! Connection - handles an individual client WebSocket session.
//!
//! Each connection runs in its own tokio task: after the WebSocket
//! handshake, a `tokio::select!` loop multiplexes inbound frames (parsed and
//! dispatched to handlers) with the outbound mpsc queue that the registry
//! routes pushes into. Handler errors are reported back on the same
//! connection as `error` events and never tear down other connections.

use crate::db::Database;
use crate::events::ServerEvent;
use crate::handlers::{self, Context};
use crate::network::limit::RateLimiter;
use crate::state::{ConnId, SessionRegistry};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, warn};

// Rate limiter configuration constants
const RATE_LIMIT_RATE: f32 = 10.0; // Events per second
const RATE_LIMIT_BURST: f32 = 20.0; // Burst capacity

/// Outbound queue depth per connection; a full queue drops pushes.
const OUTGOING_QUEUE: usize = 64;

/// A client connection handler.
pub struct Connection<S> {
    conn_id: ConnId,
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    db: Database,
    stream: S,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new connection handler.
    pub fn new(
        conn_id: ConnId,
        stream: S,
        addr: SocketAddr,
        registry: Arc<SessionRegistry>,
        db: Database,
    ) -> Self {
        Self {
            conn_id,
            addr,
            registry,
            db,
            stream,
        }
    }

    /// Run the connection loop until the peer goes away.
    #[instrument(skip(self), fields(conn = %self.conn_id, addr = %self.addr), name = "connection")]
    pub async fn run(self) -> anyhow::Result<()> {
        let ws = accept_async(self.stream).await?;
        let (mut ws_tx, mut ws_rx) = ws.split();

        // Outbound queue: handlers and the registry route events here.
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<ServerEvent>(OUTGOING_QUEUE);
        self.registry.attach_sender(self.conn_id, outgoing_tx);
        crate::metrics::client_connected();

        info!("Client connected");
        self.registry.send_to_conn(
            self.conn_id,
            ServerEvent::Connected {
                message: "connected".to_string(),
            },
        );

        let mut rate_limiter = RateLimiter::new(RATE_LIMIT_RATE, RATE_LIMIT_BURST);

        let ctx = Context {
            conn_id: self.conn_id,
            registry: &self.registry,
            db: &self.db,
        };

        loop {
            tokio::select! {
                // BRANCH A: inbound frames
                frame = ws_rx.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if !rate_limiter.check() {
                                warn!("Rate limit exceeded");
                                let _ = Self::write_event(
                                    &mut ws_tx,
                                    &ServerEvent::Error { message: "excess flood".to_string() },
                                ).await;
                                break;
                            }

                            debug!(raw = %text, "Received event");
                            if let Err(e) = handlers::dispatch_raw(&ctx, &text).await {
                                self.registry.send_to_conn(
                                    self.conn_id,
                                    ServerEvent::Error { message: e.to_string() },
                                );
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            if ws_tx.send(Message::Pong(payload)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!("Client disconnected");
                            break;
                        }
                        Some(Ok(_)) => {
                            // binary/pong frames carry nothing for us
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "Read error");
                            break;
                        }
                    }
                }

                // BRANCH B: outbound events queued by handlers and broadcasts
                Some(event) = outgoing_rx.recv() => {
                    if Self::write_event(&mut ws_tx, &event).await.is_err() {
                        warn!("Write error");
                        break;
                    }
                }
            }
        }

        // Cleanup: drop identity and memberships, push presence to each
        // vacated room, unregister the outbound queue.
        handlers::disconnected(&ctx);
        crate::metrics::client_disconnected();

        Ok(())
    }

    async fn write_event<W>(ws_tx: &mut W, event: &ServerEvent) -> anyhow::Result<()>
    where
        W: SinkExt<Message> + Unpin,
    {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode event");
                return Ok(());
            }
        };
        ws_tx
            .send(Message::Text(text))
            .await
            .map_err(|_| anyhow::anyhow!("websocket write failed"))
    }
}
