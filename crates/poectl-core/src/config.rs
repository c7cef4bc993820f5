// ── Runtime connection configuration ──
//
// These types describe *how* to reach the controller and what the monitor
// loop watches. They carry credential data and connection tuning, but
// never touch disk — the CLI constructs them and hands them in.

use std::collections::BTreeSet;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use poectl_api::{CsrfTokenHeader, Error, SessionClient, TlsMode, TransportConfig};

/// Username/password pair for the controller's session login.
///
/// The password lives in a `SecretString` so it never shows up in debug
/// output or logs.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// TLS verification strategy (core-side mirror of the api crate's `TlsMode`).
#[derive(Debug, Clone, Default)]
pub enum TlsVerification {
    /// System CA store (strict). The default.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification. Opt-in for self-signed controller certificates.
    DangerAcceptInvalid,
}

impl TlsVerification {
    fn tls_mode(&self) -> TlsMode {
        match self {
            Self::SystemDefaults => TlsMode::System,
            Self::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            Self::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Configuration for connecting to a single controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Controller URL (e.g., `https://192.168.1.1`).
    pub url: Url,
    /// Session credentials.
    pub credentials: Credentials,
    /// Site to operate on (defaults to "default").
    pub site: String,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Which login-response header carries the CSRF token.
    pub csrf_header: CsrfTokenHeader,
}

impl ControllerConfig {
    /// Transport settings derived from this config.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.tls_mode(),
            timeout: self.timeout,
            cookie_jar: None,
        }
    }

    /// Build a fresh, unauthenticated session client.
    ///
    /// Each login/…/logout bracket gets its own client (and cookie jar);
    /// session state never leaks across brackets.
    pub fn session_client(&self) -> Result<SessionClient, Error> {
        SessionClient::new(
            self.url.clone(),
            self.site.clone(),
            self.csrf_header,
            &self.transport(),
        )
    }
}

/// Default seconds between probes of the monitor URL.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(60);
/// Default bound on a single probe request.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default pause between power-off and power-on during recovery.
pub const DEFAULT_RECOVERY_DELAY: Duration = Duration::from_secs(5);

/// Configuration for the monitor loop.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Health-check URL to probe. Unrelated to the controller.
    pub probe_url: Url,
    /// Time between probes, measured from the end of one cycle to the
    /// start of the next (probe and remediation latency are additive).
    pub interval: Duration,
    /// Bound on a single probe request, independent of `interval`, so a
    /// hung probe cannot stall the loop.
    pub probe_timeout: Duration,
    /// Pause between the power-off and power-on reconciliations.
    pub recovery_delay: Duration,
    /// MAC address of the switch whose ports get power-cycled.
    pub device_mac: String,
    /// Ports to power-cycle on probe failure.
    pub ports: BTreeSet<u16>,
}

impl MonitorConfig {
    /// Monitor config with default timings.
    pub fn new(probe_url: Url, device_mac: String, ports: BTreeSet<u16>) -> Self {
        Self {
            probe_url,
            interval: DEFAULT_MONITOR_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            recovery_delay: DEFAULT_RECOVERY_DELAY,
            device_mac,
            ports,
        }
    }
}
