//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help
//! text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use poectl_core::{ApiError, CoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to the controller")]
    #[diagnostic(
        code(poectl::connection_failed),
        help(
            "Check that the controller is running and reachable.\n\
             For a self-signed certificate pass --insecure (-k) or --ca-cert."
        )
    )]
    ConnectionFailed {
        #[source]
        source: ApiError,
    },

    #[error("TLS setup failed: {message}")]
    #[diagnostic(
        code(poectl::tls_error),
        help("Check the --ca-cert file, or use --insecure (-k) for self-signed controllers.")
    )]
    Tls { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(poectl::auth_failed),
        help("Verify the username and password; the account needs admin rights on the controller.")
    )]
    AuthFailed {
        #[source]
        source: ApiError,
    },

    // ── Device ───────────────────────────────────────────────────────
    #[error("Device '{mac}' not found")]
    #[diagnostic(
        code(poectl::device_not_found),
        help("Check the MAC address and the --site value; the switch must be adopted.")
    )]
    DeviceNotFound { mac: String },

    #[error("Failed to read device state")]
    #[diagnostic(code(poectl::fetch_failed))]
    FetchFailed {
        #[source]
        source: ApiError,
    },

    #[error("Failed to update port overrides")]
    #[diagnostic(code(poectl::update_failed))]
    UpdateFailed {
        #[source]
        source: ApiError,
    },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out")]
    #[diagnostic(
        code(poectl::timeout),
        help("Increase --timeout or check controller responsiveness.")
    )]
    Timeout,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(poectl::validation))]
    Validation { field: String, reason: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Tls { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            // A login that never reached the controller is a connection
            // problem, not a credential problem.
            CoreError::Auth(source) => {
                if source.is_timeout() {
                    Self::Timeout
                } else if source.is_connect() {
                    Self::ConnectionFailed { source }
                } else {
                    Self::AuthFailed { source }
                }
            }

            CoreError::Client(source) => Self::Tls {
                message: source.to_string(),
            },

            CoreError::Fetch(source) => match source {
                ApiError::DeviceNotFound { mac } => Self::DeviceNotFound { mac },
                source if source.is_timeout() => Self::Timeout,
                source if source.is_connect() => Self::ConnectionFailed { source },
                source => Self::FetchFailed { source },
            },

            CoreError::Update(source) => {
                if source.is_timeout() {
                    Self::Timeout
                } else {
                    Self::UpdateFailed { source }
                }
            }

            // Logout failures are logged where they happen and never abort
            // a bracket; if one does bubble up, it is a general failure.
            CoreError::Logout(source) => Self::UpdateFailed { source },
        }
    }
}
