//! Test server management.
//!
//! Spawns and manages roomcastd instances for integration testing.

use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// A test server instance.
pub struct TestServer {
    child: Child,
    port: u16,
    http_port: u16,
    // Held for the lifetime of the server; the directory is removed on drop.
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a new test server listening on `port` (WebSocket) and
    /// `port + 1` (HTTP API).
    pub async fn spawn(port: u16) -> anyhow::Result<Self> {
        let http_port = port + 1;
        let data_dir = TempDir::with_prefix(format!("roomcast-test-{port}-"))?;

        let config_path = data_dir.path().join("config.toml");
        let config_content = format!(
            r#"
[server]
name = "test.chat"

[listen]
address = "127.0.0.1:{port}"

[http]
address = "127.0.0.1:{http_port}"

[database]
path = "{db_path}"
"#,
            db_path = data_dir.path().join("test.db").display(),
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_roomcastd"))
            .arg(&config_path)
            .spawn()?;

        let server = Self {
            child,
            port,
            http_port,
            _data_dir: data_dir,
        };

        server.wait_until_ready().await?;

        Ok(server)
    }

    /// Wait until the server is accepting connections on both listeners.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for port in [self.port, self.http_port] {
            let mut up = false;
            for _ in 0..50 {
                if tokio::net::TcpStream::connect(("127.0.0.1", port))
                    .await
                    .is_ok()
                {
                    up = true;
                    break;
                }
                sleep(Duration::from_millis(100)).await;
            }
            if !up {
                anyhow::bail!("Server failed to open port {port} within 5 seconds");
            }
        }
        Ok(())
    }

    /// WebSocket URL for this server.
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// HTTP API URL for a path, e.g. `api_url("/api/messages")`.
    #[allow(dead_code)]
    pub fn api_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.http_port)
    }

    /// Create a new test client connected to this server.
    pub async fn connect(&self) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(&self.ws_url()).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
