// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! QUIC server helpers for the passage endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use quinn::crypto::rustls::QuicServerConfig;
use quinn::{Endpoint, Incoming, RecvStream, SendStream, ServerConfig};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use crate::frame::{Frame, FrameError, read_frame, write_frame};
use crate::transport::{TLS_VERSIONS, crypto_provider, transport_config};

/// Errors that can occur in the QUIC server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bind error: {0}")]
    Bind(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(#[from] quinn::ConnectionError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("stream closed: {0}")]
    ClosedStream(#[from] quinn::ClosedStream),

    #[error("TLS error: {0}")]
    Tls(String),
}

/// Configuration for the QUIC server
#[derive(Debug, Clone)]
pub struct PassageServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    /// TLS certificate chain (PEM format)
    pub cert_pem: Vec<u8>,
    /// TLS private key (PEM format)
    pub key_pem: Vec<u8>,
    /// Maximum concurrent bidirectional streams per connection
    pub max_bi_streams: u32,
    /// Idle timeout in milliseconds
    pub idle_timeout_ms: u64,
    /// Keep-alive interval in milliseconds (0 to disable)
    pub keep_alive_interval_ms: u64,
    /// UDP receive buffer size in bytes (0 for OS default)
    pub udp_receive_buffer_size: usize,
    /// Maximum concurrent connection handlers (0 for unlimited)
    pub max_concurrent_handlers: u32,
}

impl Default for PassageServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8101)),
            cert_pem: Vec::new(),
            key_pem: Vec::new(),
            max_bi_streams: 1_000,
            idle_timeout_ms: 120_000,
            keep_alive_interval_ms: 15_000,
            udp_receive_buffer_size: 2 * 1024 * 1024,
            max_concurrent_handlers: 0,
        }
    }
}

impl PassageServerConfig {
    /// Defaults overridden by environment variables:
    /// - `FORMPASS_QUIC_MAX_BI_STREAMS` (default: 1000)
    /// - `FORMPASS_QUIC_IDLE_TIMEOUT_MS` (default: 120000)
    /// - `FORMPASS_QUIC_KEEP_ALIVE_MS`, 0 to disable (default: 15000)
    /// - `FORMPASS_QUIC_UDP_RECV_BUFFER` (default: 2097152)
    /// - `FORMPASS_QUIC_MAX_HANDLERS`, 0 for unlimited (default: 0)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        fn var_or<T: std::str::FromStr>(key: &str, default: T) -> T {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        let default = Self::default();
        Self {
            max_bi_streams: var_or("FORMPASS_QUIC_MAX_BI_STREAMS", default.max_bi_streams),
            idle_timeout_ms: var_or("FORMPASS_QUIC_IDLE_TIMEOUT_MS", default.idle_timeout_ms),
            keep_alive_interval_ms: var_or(
                "FORMPASS_QUIC_KEEP_ALIVE_MS",
                default.keep_alive_interval_ms,
            ),
            udp_receive_buffer_size: var_or(
                "FORMPASS_QUIC_UDP_RECV_BUFFER",
                default.udp_receive_buffer_size,
            ),
            max_concurrent_handlers: var_or(
                "FORMPASS_QUIC_MAX_HANDLERS",
                default.max_concurrent_handlers,
            ),
            ..default
        }
    }
}

/// QUIC server accepting passage RPC connections
pub struct PassageServer {
    endpoint: Endpoint,
    config: PassageServerConfig,
}

impl PassageServer {
    /// Create a server bound to `config.bind_addr`
    pub fn new(config: PassageServerConfig) -> Result<Self, ServerError> {
        let quic_config = quic_server_config(&config)?;
        let socket = bind_udp(&config)?;

        let runtime = quinn::default_runtime()
            .ok_or_else(|| ServerError::Bind(std::io::Error::other("no async runtime found")))?;
        let endpoint = Endpoint::new_with_abstract_socket(
            quinn::EndpointConfig::default(),
            Some(quic_config),
            runtime.wrap_udp_socket(socket)?,
            runtime,
        )?;

        info!(
            addr = %config.bind_addr,
            max_bi_streams = config.max_bi_streams,
            max_handlers = config.max_concurrent_handlers,
            "Passage endpoint bound"
        );

        Ok(Self { endpoint, config })
    }

    /// Create a server with a self-signed `localhost` certificate
    pub fn localhost(bind_addr: SocketAddr) -> Result<Self, ServerError> {
        Self::localhost_with_config(bind_addr, PassageServerConfig::from_env())
    }

    /// Like [`PassageServer::localhost`] with explicit limits
    pub fn localhost_with_config(
        bind_addr: SocketAddr,
        config: PassageServerConfig,
    ) -> Result<Self, ServerError> {
        let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .map_err(|e| ServerError::Tls(e.to_string()))?;

        Self::new(PassageServerConfig {
            bind_addr,
            cert_pem: generated.cert.pem().into_bytes(),
            key_pem: generated.key_pair.serialize_pem().into_bytes(),
            ..config
        })
    }

    /// Next incoming connection; `None` once the endpoint is closed
    pub async fn accept(&self) -> Option<Incoming> {
        self.endpoint.accept().await
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.endpoint.local_addr()?)
    }

    /// Stop accepting and close open connections
    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"passage endpoint closing");
    }

    /// Accept connections until the endpoint closes, one task per connection
    #[instrument(skip(self, handler), fields(addr = %self.config.bind_addr))]
    pub async fn run<H, Fut>(&self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(ConnectionHandler) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let limit = match self.config.max_concurrent_handlers {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n as usize))),
        };
        info!("Accepting passage connections");

        while let Some(incoming) = self.accept().await {
            tokio::spawn(serve_incoming(incoming, limit.clone(), handler.clone()));
        }

        info!("Passage endpoint closed");
        Ok(())
    }
}

/// Complete the handshake, holding a handler slot while the connection lives
async fn serve_incoming<H, Fut>(incoming: Incoming, limit: Option<Arc<Semaphore>>, handler: H)
where
    H: Fn(ConnectionHandler) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let _slot = match limit {
        Some(limit) => match limit.acquire_owned().await {
            Ok(slot) => Some(slot),
            Err(_) => return,
        },
        None => None,
    };

    match incoming.await {
        Ok(connection) => {
            debug!(remote_addr = %connection.remote_address(), "Connection established");
            handler(ConnectionHandler::new(connection)).await;
        }
        Err(e) => warn!(error = %e, "Handshake failed"),
    }
}

fn bind_udp(config: &PassageServerConfig) -> Result<std::net::UdpSocket, ServerError> {
    use socket2::{Domain, Protocol, Socket, Type};

    let socket = Socket::new(
        Domain::for_address(config.bind_addr),
        Type::DGRAM,
        Some(Protocol::UDP),
    )?;

    if config.udp_receive_buffer_size > 0
        && let Err(e) = socket.set_recv_buffer_size(config.udp_receive_buffer_size)
    {
        warn!(
            size = config.udp_receive_buffer_size,
            error = %e,
            "Could not raise UDP receive buffer"
        );
    }

    socket.bind(&config.bind_addr.into())?;
    Ok(socket.into())
}

fn tls_error(e: impl std::fmt::Display) -> ServerError {
    ServerError::Tls(e.to_string())
}

fn quic_server_config(config: &PassageServerConfig) -> Result<ServerConfig, ServerError> {
    let chain = rustls_pemfile::certs(&mut config.cert_pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_error(format!("unreadable certificate PEM: {e}")))?;
    let key = rustls_pemfile::private_key(&mut config.key_pem.as_slice())
        .map_err(|e| tls_error(format!("unreadable key PEM: {e}")))?
        .ok_or_else(|| tls_error("key PEM holds no private key"))?;

    let crypto = rustls::ServerConfig::builder_with_provider(crypto_provider())
        .with_protocol_versions(TLS_VERSIONS)
        .map_err(tls_error)?
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .map_err(tls_error)?;
    let crypto = QuicServerConfig::try_from(crypto).map_err(tls_error)?;

    let mut transport = transport_config(config.idle_timeout_ms, config.keep_alive_interval_ms)
        .map_err(tls_error)?;
    transport.max_concurrent_bidi_streams(config.max_bi_streams.into());
    // Calls never open unidirectional streams.
    transport.max_concurrent_uni_streams(0u32.into());

    let mut server_config = ServerConfig::with_crypto(Arc::new(crypto));
    server_config.transport_config(Arc::new(transport));
    Ok(server_config)
}

/// One accepted connection from the gateway
pub struct ConnectionHandler {
    connection: quinn::Connection,
}

impl ConnectionHandler {
    /// Wrap an established connection
    pub fn new(connection: quinn::Connection) -> Self {
        Self { connection }
    }

    /// Peer address
    pub fn remote_address(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Serve bidirectional streams until the peer goes away, one task per stream
    #[instrument(skip(self, handler), fields(remote = %self.remote_address()))]
    pub async fn run<H, Fut>(&self, handler: H)
    where
        H: Fn(StreamHandler) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let reason = loop {
            match self.connection.accept_bi().await {
                Ok((send, recv)) => {
                    tokio::spawn(handler.clone()(StreamHandler::new(send, recv)));
                }
                Err(e) => break e,
            }
        };

        match reason {
            quinn::ConnectionError::ApplicationClosed(_)
            | quinn::ConnectionError::LocallyClosed
            | quinn::ConnectionError::TimedOut => debug!(reason = %reason, "Connection ended"),
            other => error!(error = %other, "Connection failed"),
        }
    }
}

/// One bidirectional stream carrying a single request/response pair
pub struct StreamHandler {
    send: SendStream,
    recv: RecvStream,
}

impl StreamHandler {
    /// Pair the two halves of a stream
    pub fn new(send: SendStream, recv: RecvStream) -> Self {
        Self { send, recv }
    }

    /// Read the request frame
    pub async fn read_frame(&mut self) -> Result<Frame, ServerError> {
        Ok(read_frame(&mut self.recv).await?)
    }

    /// Write the response frame
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), ServerError> {
        Ok(write_frame(&mut self.send, frame).await?)
    }

    /// Finish the send side (no more frames)
    pub fn finish(&mut self) -> Result<(), ServerError> {
        Ok(self.send.finish()?)
    }
}
