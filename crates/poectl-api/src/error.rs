use thiserror::Error;

/// Top-level error type for the `poectl-api` crate.
///
/// Covers every failure mode at the wire layer: authentication, transport,
/// TLS, and response decoding. `poectl-core` maps these into its own
/// domain-level variants before consumers see them.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, account locked, session expired).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// The controller rejected the request (non-2xx status or an error
    /// envelope on an otherwise successful response).
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// No device record came back for the requested MAC address.
    #[error("Device not found: {mac}")]
    DeviceNotFound { mac: String },

    /// The device record is missing a field this client requires
    /// (e.g. `device_id` or `port_overrides`).
    #[error("Malformed device record: {message}")]
    Malformed { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the session is not (or no longer)
    /// authenticated and a fresh login might resolve it.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if the underlying request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }

    /// Returns `true` if the connection itself failed (refused, DNS, TLS
    /// handshake).
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connect())
    }
}
