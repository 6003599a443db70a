//! Gateway - TCP/TLS listeners that accept incoming WebSocket connections.
//!
//! The Gateway binds to sockets and spawns a Connection task for each
//! incoming client. Supports both plaintext and TLS connections.

use crate::config::TlsConfig;
use crate::db::Database;
use crate::network::Connection;
use crate::state::SessionRegistry;
use rustls_pemfile::{certs, pkcs8_private_keys};
use std::io::{BufReader, Cursor};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// The Gateway accepts incoming TCP/TLS connections and spawns handlers.
pub struct Gateway {
    plaintext_listener: TcpListener,
    tls_listener: Option<(TcpListener, TlsAcceptor)>,
    registry: Arc<SessionRegistry>,
    db: Database,
}

impl Gateway {
    /// Bind the gateway to the specified addresses.
    pub async fn bind(
        addr: SocketAddr,
        tls_config: Option<TlsConfig>,
        registry: Arc<SessionRegistry>,
        db: Database,
    ) -> anyhow::Result<Self> {
        let plaintext_listener = TcpListener::bind(addr).await?;
        info!(%addr, "WebSocket listener bound");

        let tls_listener = if let Some(tls_cfg) = tls_config {
            let tls_acceptor = Self::load_tls(&tls_cfg)?;
            let listener = TcpListener::bind(tls_cfg.address).await?;
            info!(address = %tls_cfg.address, "TLS listener bound");
            Some((listener, tls_acceptor))
        } else {
            None
        };

        Ok(Self {
            plaintext_listener,
            tls_listener,
            registry,
            db,
        })
    }

    /// Load TLS certificates and create TlsAcceptor.
    fn load_tls(config: &TlsConfig) -> anyhow::Result<TlsAcceptor> {
        let cert_file = std::fs::read(&config.cert_path)?;
        let cert_reader = &mut BufReader::new(Cursor::new(cert_file));
        let certs: Vec<CertificateDer> = certs(cert_reader).collect::<Result<Vec<_>, _>>()?;

        if certs.is_empty() {
            anyhow::bail!("No certificates found in {}", config.cert_path);
        }

        let key_file = std::fs::read(&config.key_path)?;
        let key_reader = &mut BufReader::new(Cursor::new(key_file));
        let mut keys: Vec<PrivateKeyDer> = pkcs8_private_keys(key_reader)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(PrivateKeyDer::from)
            .collect();

        if keys.is_empty() {
            anyhow::bail!("No private keys found in {}", config.key_path);
        }

        let key = keys.remove(0);

        let tls_config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;

        Ok(TlsAcceptor::from(Arc::new(tls_config)))
    }

    /// Run the gateway, accepting connections forever.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        let registry = Arc::clone(&self.registry);
        let db = self.db.clone();

        // If TLS is configured, spawn a separate task for the TLS listener
        if let Some((tls_listener, tls_acceptor)) = self.tls_listener {
            let registry_tls = Arc::clone(&registry);
            let db_tls = db.clone();

            tokio::spawn(async move {
                loop {
                    match tls_listener.accept().await {
                        Ok((stream, addr)) => {
                            info!(%addr, "TLS connection accepted");

                            let registry = Arc::clone(&registry_tls);
                            let db = db_tls.clone();
                            let conn_id = Uuid::new_v4();
                            let acceptor = tls_acceptor.clone();

                            tokio::spawn(async move {
                                match acceptor.accept(stream).await {
                                    Ok(tls_stream) => {
                                        let connection = Connection::new(
                                            conn_id, tls_stream, addr, registry, db,
                                        );
                                        if let Err(e) = connection.run().await {
                                            warn!(%conn_id, %addr, error = %e, "TLS connection error");
                                        }
                                    }
                                    Err(e) => {
                                        warn!(%addr, error = %e, "TLS handshake failed");
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "TLS accept error");
                        }
                    }
                }
            });
        }

        loop {
            match self.plaintext_listener.accept().await {
                Ok((stream, addr)) => {
                    info!(%addr, "Connection accepted");

                    let registry = Arc::clone(&registry);
                    let db = db.clone();
                    let conn_id = Uuid::new_v4();

                    tokio::spawn(async move {
                        let connection = Connection::new(conn_id, stream, addr, registry, db);
                        if let Err(e) = connection.run().await {
                            warn!(%conn_id, %addr, error = %e, "Connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Accept error");
                }
            }
        }
    }
}
