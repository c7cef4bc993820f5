// ── Core error types ──
//
// Domain-level errors mapped onto the phases of a reconciliation bracket.
// Consumers never match on raw HTTP failures — the wire error rides along
// as the source.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Could not build the HTTP client (TLS configuration, bad CA file).
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] poectl_api::Error),

    /// Login rejected. Fatal for a one-shot bracket: nothing else is
    /// attempted.
    #[error("authentication failed: {0}")]
    Auth(#[source] poectl_api::Error),

    /// Device state unreadable or malformed.
    #[error("failed to read device state: {0}")]
    Fetch(#[source] poectl_api::Error),

    /// The controller rejected the port-override update.
    #[error("failed to update port overrides: {0}")]
    Update(#[source] poectl_api::Error),

    /// Session cleanup failed. Logged by callers, never escalated.
    #[error("logout failed: {0}")]
    Logout(#[source] poectl_api::Error),
}
