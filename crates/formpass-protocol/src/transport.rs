// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Settings shared by both QUIC endpoints.

use std::sync::Arc;
use std::time::Duration;

use quinn::{IdleTimeout, TransportConfig};
use rustls::crypto::CryptoProvider;

/// TLS versions offered by either side. QUIC requires 1.3.
pub(crate) static TLS_VERSIONS: &[&rustls::SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// The ring provider, chosen explicitly so no process-wide default is needed.
pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Idle timeout and keep-alive. A zero keep-alive disables pings.
pub(crate) fn transport_config(
    idle_timeout_ms: u64,
    keep_alive_interval_ms: u64,
) -> Result<TransportConfig, String> {
    let idle: IdleTimeout = Duration::from_millis(idle_timeout_ms)
        .try_into()
        .map_err(|_| format!("idle timeout of {idle_timeout_ms}ms is out of range"))?;

    let mut transport = TransportConfig::default();
    transport.max_idle_timeout(Some(idle));
    transport.keep_alive_interval(
        (keep_alive_interval_ms > 0).then(|| Duration::from_millis(keep_alive_interval_ms)),
    );
    Ok(transport)
}
