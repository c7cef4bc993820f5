// poectl-core: domain logic between poectl-api and the CLI.

pub mod config;
pub mod error;
pub mod monitor;
pub mod reconcile;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ControllerConfig, Credentials, MonitorConfig, TlsVerification};
pub use error::CoreError;
pub use monitor::{MonitorHandle, ProbeFailure, RemediationReport, RemediationStep, StepOutcome};
pub use reconcile::{apply_desired_state, DesiredState, PortPlan, ReconcileOutcome};

// Wire-layer types consumers need are re-exported here, so they never
// depend on poectl-api directly.
pub use poectl_api::{CsrfTokenHeader, Error as ApiError};
