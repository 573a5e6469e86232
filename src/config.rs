//! Client configuration.

use std::time::Duration;

use url::Url;

use crate::client::backoff::ReconnectPolicy;
use crate::error::{VoiceError, VoiceResult};

/// Configuration for a [`VoiceStreamClient`](crate::client::VoiceStreamClient).
///
/// Timeout semantics: `handshake_timeout` bounds `connecting → connected`
/// and produces an error state on expiry. `turn_timeout` is the soft
/// ceiling on a single backend generation; expiry aborts the turn but
/// keeps the connection. `liveness_timeout` is the hard ceiling on
/// inbound silence; expiry is a transport failure and triggers the
/// reconnect policy.
#[derive(Debug, Clone)]
pub struct VoiceClientConfig {
    /// WebSocket endpoint of the voice backend (ws:// or wss://)
    pub endpoint: String,
    /// Bound on the capabilities handshake
    pub handshake_timeout: Duration,
    /// Soft bound on one backend turn (long generations are legitimate)
    pub turn_timeout: Duration,
    /// Hard bound on inbound silence before the transport is presumed dead
    pub liveness_timeout: Duration,
    /// Keepalive ping interval
    pub ping_interval: Duration,
    /// Reconnection backoff policy
    pub reconnect: ReconnectPolicy,
    /// Capacity of the capture-to-session frame queue, in frames
    pub frame_queue_capacity: usize,
    /// Spectrum bucket count for the analyzer
    pub analyzer_bands: usize,
}

impl VoiceClientConfig {
    /// Configuration with defaults for everything but the endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            handshake_timeout: Duration::from_secs(10),
            turn_timeout: Duration::from_secs(120),
            liveness_timeout: Duration::from_secs(30),
            ping_interval: Duration::from_secs(15),
            reconnect: ReconnectPolicy::default(),
            frame_queue_capacity: 16,
            analyzer_bands: crate::audio::DEFAULT_BANDS,
        }
    }

    /// Parse and validate the endpoint URL.
    pub fn endpoint_url(&self) -> VoiceResult<Url> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| VoiceError::Configuration(format!("invalid endpoint URL: {e}")))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(VoiceError::Configuration(format!(
                "endpoint scheme must be ws or wss, got {other}"
            ))),
        }
    }
}
