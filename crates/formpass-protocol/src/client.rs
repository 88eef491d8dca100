// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! QUIC client for calling the passage endpoint of formpass-core.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quinn::crypto::rustls::QuicClientConfig;
use quinn::{ClientConfig, Connection, Endpoint};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::frame::{Frame, FrameError, MAX_FRAME_SIZE, MessageType, read_frame, write_frame};
use crate::transport::{TLS_VERSIONS, crypto_provider, transport_config};

/// Errors that can occur in the QUIC client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Connection(#[from] quinn::ConnectionError),

    #[error("connect error: {0}")]
    Connect(#[from] quinn::ConnectError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("request too large: {0} bytes (max: {MAX_FRAME_SIZE})")]
    RequestTooLarge(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stream closed: {0}")]
    ClosedStream(#[from] quinn::ClosedStream),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("server returned an error frame")]
    ErrorFrame,

    #[error("connection timed out after {0}ms")]
    Timeout(u64),
}

/// Configuration for the QUIC client
#[derive(Debug, Clone)]
pub struct PassageClientConfig {
    /// Server address to connect to
    pub server_addr: SocketAddr,
    /// Server name for TLS verification
    pub server_name: String,
    /// Skip certificate verification (self-signed development servers only)
    pub dangerous_skip_cert_verification: bool,
    /// Keep-alive interval in milliseconds (0 to disable)
    pub keep_alive_interval_ms: u64,
    /// Idle timeout in milliseconds
    pub idle_timeout_ms: u64,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for PassageClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 8101)),
            server_name: "localhost".to_string(),
            dangerous_skip_cert_verification: false,
            keep_alive_interval_ms: 10_000,
            idle_timeout_ms: 120_000,
            connect_timeout_ms: 5_000,
        }
    }
}

/// QUIC client holding one lazily (re)established connection.
///
/// Safe to share between request handlers; each call opens its own stream.
pub struct PassageClient {
    endpoint: Endpoint,
    connection: Mutex<Option<Connection>>,
    config: PassageClientConfig,
}

impl PassageClient {
    /// Create a client; no connection is made until the first request.
    pub fn new(config: PassageClientConfig) -> Result<Self, ClientError> {
        let mut endpoint = Endpoint::client(SocketAddr::from(([0, 0, 0, 0], 0)))?;
        endpoint.set_default_client_config(Self::build_client_config(&config)?);

        Ok(Self {
            endpoint,
            connection: Mutex::new(None),
            config,
        })
    }

    /// Client for a self-signed server on the default local address
    pub fn localhost() -> Result<Self, ClientError> {
        Self::new(PassageClientConfig {
            dangerous_skip_cert_verification: true,
            ..Default::default()
        })
    }

    fn build_client_config(config: &PassageClientConfig) -> Result<ClientConfig, ClientError> {
        let provider = crypto_provider();
        let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(TLS_VERSIONS)
            .map_err(|e| ClientError::Tls(e.to_string()))?;

        let crypto = if config.dangerous_skip_cert_verification {
            warn!("Server certificate verification is disabled");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipServerVerification(provider)))
                .with_no_client_auth()
        } else {
            let roots = rustls::RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            builder.with_root_certificates(roots).with_no_client_auth()
        };

        let transport = transport_config(config.idle_timeout_ms, config.keep_alive_interval_ms)
            .map_err(ClientError::Tls)?;
        let crypto =
            QuicClientConfig::try_from(crypto).map_err(|e| ClientError::Tls(e.to_string()))?;

        let mut client_config = ClientConfig::new(Arc::new(crypto));
        client_config.transport_config(Arc::new(transport));
        Ok(client_config)
    }

    /// Return the open connection, connecting first if there is none
    async fn connection(&self) -> Result<Connection, ClientError> {
        let mut slot = self.connection.lock().await;

        if let Some(live) = slot.as_ref().filter(|c| c.close_reason().is_none()) {
            return Ok(live.clone());
        }

        debug!(addr = %self.config.server_addr, "Connecting to formpass-core");
        let connecting = self
            .endpoint
            .connect(self.config.server_addr, &self.config.server_name)?;
        let connection = tokio::time::timeout(
            Duration::from_millis(self.config.connect_timeout_ms),
            connecting,
        )
        .await
        .map_err(|_| ClientError::Timeout(self.config.connect_timeout_ms))??;

        info!(addr = %self.config.server_addr, "Connected to formpass-core");
        *slot = Some(connection.clone());
        Ok(connection)
    }

    /// Send one request on a fresh stream and wait for its response.
    ///
    /// Oversized requests fail with [`ClientError::RequestTooLarge`] before
    /// any connection is opened.
    #[instrument(skip(self, request), fields(addr = %self.config.server_addr))]
    pub async fn request<Req: prost::Message, Resp: prost::Message + Default>(
        &self,
        request: &Req,
    ) -> Result<Resp, ClientError> {
        let frame = Frame::request(request).map_err(|e| match e {
            FrameError::FrameTooLarge(size) => ClientError::RequestTooLarge(size),
            e => ClientError::Frame(e),
        })?;
        let (mut send, mut recv) = self.connection().await?.open_bi().await?;

        write_frame(&mut send, &frame).await?;
        send.finish()?;

        let reply = read_frame(&mut recv).await?;
        if reply.message_type != MessageType::Response {
            return Err(ClientError::ErrorFrame);
        }
        Ok(reply.decode()?)
    }

    /// Close the current connection; the next request reconnects.
    pub async fn close(&self) {
        if let Some(conn) = self.connection.lock().await.take() {
            conn.close(0u32.into(), b"client closing");
        }
    }

    /// Whether a live connection is held
    pub async fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .await
            .as_ref()
            .is_some_and(|conn| conn.close_reason().is_none())
    }
}

impl Drop for PassageClient {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.get_mut().take() {
            conn.close(0u32.into(), b"client dropped");
        }
    }
}

/// Accepts any server certificate but still checks handshake signatures
/// (development only)
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
