// ── Monitor loop ──
//
// Watches a health-check URL and power-cycles the configured ports when
// it fails. The loop runs as a supervised background task: callers hold a
// handle with a cancellation token, so it can be stopped and awaited
// deterministically (including in tests).
//
// The loop is strictly sequential: one probe-then-maybe-remediate cycle
// completes before the next begins, and the full interval is slept after
// every cycle. Probe and remediation latency are additive to the
// interval — there is deliberately no drift correction.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{ControllerConfig, MonitorConfig};
use crate::error::CoreError;
use crate::reconcile::{reconcile, DesiredState};

/// PoE mode that cuts power to a port.
const POE_MODE_OFF: &str = "off";
/// PoE mode that restores normal negotiation.
const POE_MODE_AUTO: &str = "auto";

// ── Probe ───────────────────────────────────────────────────────────

/// Why a probe of the monitor URL counted as a failure.
///
/// A probe failure is a remediation trigger, not a program error: the
/// loop logs it and keeps running.
#[derive(Debug, thiserror::Error)]
pub enum ProbeFailure {
    #[error("probe returned HTTP {0}")]
    Status(u16),
    #[error("probe request failed: {0}")]
    Transport(String),
}

/// Probe the monitor URL once. Anything other than HTTP 200 — including
/// transport errors and timeouts — is a failure.
async fn probe(http: &reqwest::Client, url: &Url) -> Result<(), ProbeFailure> {
    match http.get(url.clone()).send().await {
        Ok(resp) if resp.status() == reqwest::StatusCode::OK => Ok(()),
        Ok(resp) => Err(ProbeFailure::Status(resp.status().as_u16())),
        Err(e) => Err(ProbeFailure::Transport(e.to_string())),
    }
}

// ── Remediation ─────────────────────────────────────────────────────

/// One step of the remediation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationStep {
    Login,
    PowerOff,
    PowerOn,
    Logout,
}

impl RemediationStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::PowerOff => "power-off",
            Self::PowerOn => "power-on",
            Self::Logout => "logout",
        }
    }
}

/// What happened to one remediation step.
#[derive(Debug)]
pub enum StepOutcome {
    Succeeded,
    Failed(CoreError),
    /// The step could not be attempted (no session after a failed login).
    Skipped,
}

/// Collected outcomes of one remediation pass.
///
/// The sequence is best-effort by policy: a failed step is recorded and
/// the steps that can still run are still attempted. The report makes
/// that explicit instead of burying it in swallowed errors.
#[derive(Debug, Default)]
pub struct RemediationReport {
    pub steps: Vec<(RemediationStep, StepOutcome)>,
}

impl RemediationReport {
    fn record(&mut self, step: RemediationStep, outcome: Result<(), CoreError>) {
        match outcome {
            Ok(()) => self.steps.push((step, StepOutcome::Succeeded)),
            Err(e) => {
                warn!(step = step.as_str(), error = %e, "remediation step failed");
                self.steps.push((step, StepOutcome::Failed(e)));
            }
        }
    }

    fn skip(&mut self, step: RemediationStep) {
        debug!(step = step.as_str(), "remediation step skipped");
        self.steps.push((step, StepOutcome::Skipped));
    }

    /// `true` when every step ran and succeeded.
    pub fn fully_succeeded(&self) -> bool {
        self.steps
            .iter()
            .all(|(_, outcome)| matches!(outcome, StepOutcome::Succeeded))
    }

    fn summary(&self) -> String {
        self.steps
            .iter()
            .map(|(step, outcome)| {
                let state = match outcome {
                    StepOutcome::Succeeded => "ok",
                    StepOutcome::Failed(_) => "failed",
                    StepOutcome::Skipped => "skipped",
                };
                format!("{}={state}", step.as_str())
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Run one remediation pass: fresh session, power the targeted ports off,
/// wait, power them back to auto, log out.
///
/// Always-try-to-restore-power policy: reconciliation failures never
/// short-circuit the later steps. Only a failed login skips the rest —
/// there is no session to drive them with.
pub async fn remediate(
    controller: &ControllerConfig,
    monitor: &MonitorConfig,
) -> RemediationReport {
    let mut report = RemediationReport::default();

    let client = match controller.session_client() {
        Ok(client) => client,
        Err(e) => {
            report.record(RemediationStep::Login, Err(CoreError::Client(e)));
            report.skip(RemediationStep::PowerOff);
            report.skip(RemediationStep::PowerOn);
            report.skip(RemediationStep::Logout);
            return report;
        }
    };

    match client
        .login(
            &controller.credentials.username,
            &controller.credentials.password,
        )
        .await
    {
        Ok(()) => report.record(RemediationStep::Login, Ok(())),
        Err(e) => {
            report.record(RemediationStep::Login, Err(CoreError::Auth(e)));
            report.skip(RemediationStep::PowerOff);
            report.skip(RemediationStep::PowerOn);
            report.skip(RemediationStep::Logout);
            return report;
        }
    }

    let off = DesiredState {
        ports: monitor.ports.clone(),
        poe_mode: POE_MODE_OFF.into(),
    };
    let outcome = reconcile(&client, &monitor.device_mac, &off).await;
    report.record(RemediationStep::PowerOff, outcome.map(|_| ()));

    tokio::time::sleep(monitor.recovery_delay).await;

    let auto = DesiredState {
        ports: monitor.ports.clone(),
        poe_mode: POE_MODE_AUTO.into(),
    };
    let outcome = reconcile(&client, &monitor.device_mac, &auto).await;
    report.record(RemediationStep::PowerOn, outcome.map(|_| ()));

    let outcome = client.logout().await.map_err(CoreError::Logout);
    report.record(RemediationStep::Logout, outcome);

    report
}

// ── Supervised loop ─────────────────────────────────────────────────

/// Handle to a running monitor loop.
///
/// Dropping the handle does NOT stop the loop; call
/// [`shutdown`](Self::shutdown) for a deterministic stop.
pub struct MonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signal the loop to stop and wait for it to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }

    /// `true` once the loop task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn the monitor loop as a background task.
///
/// The probe client shares the controller's TLS settings but uses the
/// (shorter) probe timeout.
pub fn spawn(
    controller: ControllerConfig,
    monitor: MonitorConfig,
) -> Result<MonitorHandle, CoreError> {
    let mut transport = controller.transport();
    transport.timeout = monitor.probe_timeout;
    let http = transport.build_client().map_err(CoreError::Client)?;

    let cancel = CancellationToken::new();
    let task = tokio::spawn(monitor_task(controller, monitor, http, cancel.clone()));

    Ok(MonitorHandle { cancel, task })
}

async fn monitor_task(
    controller: ControllerConfig,
    monitor: MonitorConfig,
    http: reqwest::Client,
    cancel: CancellationToken,
) {
    info!(
        url = %monitor.probe_url,
        interval_secs = monitor.interval.as_secs(),
        "starting monitor loop"
    );

    loop {
        match probe(&http, &monitor.probe_url).await {
            Ok(()) => debug!(url = %monitor.probe_url, "probe succeeded"),
            Err(failure) => {
                warn!(url = %monitor.probe_url, %failure, "probe failed, power-cycling ports");
                let report = remediate(&controller, &monitor).await;
                if report.fully_succeeded() {
                    info!("remediation complete");
                } else {
                    warn!(steps = %report.summary(), "remediation finished with failures");
                }
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(monitor.interval) => {}
        }
    }

    debug!("monitor loop stopped");
}
