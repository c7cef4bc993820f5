mod cli;
mod error;

use std::time::Duration;

use clap::Parser;
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

use poectl_core::{
    apply_desired_state, monitor, ControllerConfig, Credentials, DesiredState, MonitorConfig,
    TlsVerification,
};

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let controller = build_controller_config(&cli)?;

    match cli.monitor_url.clone() {
        Some(probe_url) => run_monitor(controller, probe_url, &cli).await,
        None => run_once(controller, &cli).await,
    }
}

/// One-shot path: one login/reconcile/logout bracket, then exit.
async fn run_once(controller: ControllerConfig, cli: &Cli) -> Result<(), CliError> {
    let desired = DesiredState {
        ports: cli.ports.clone(),
        poe_mode: cli.state.clone(),
    };

    let outcome = apply_desired_state(&controller, &cli.mac, &desired).await?;

    tracing::info!(
        device_id = %outcome.device_id,
        changed = ?outcome.plan.changed,
        unchanged = ?outcome.plan.unchanged,
        "port overrides applied"
    );
    Ok(())
}

/// Monitor path: spawn the watch loop, then block until Ctrl-C and shut
/// it down deterministically.
async fn run_monitor(
    controller: ControllerConfig,
    probe_url: url::Url,
    cli: &Cli,
) -> Result<(), CliError> {
    let mut monitor_cfg = MonitorConfig::new(probe_url, cli.mac.clone(), cli.ports.clone());
    monitor_cfg.interval = Duration::from_secs(cli.monitor_interval);
    monitor_cfg.recovery_delay = Duration::from_secs(cli.recovery_delay);
    monitor_cfg.probe_timeout = Duration::from_secs(cli.timeout);

    tracing::info!(
        url = %monitor_cfg.probe_url,
        interval_secs = cli.monitor_interval,
        "monitoring; press Ctrl-C to stop"
    );

    let handle = monitor::spawn(controller, monitor_cfg)?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down monitor");
    handle.shutdown().await;
    Ok(())
}

/// Build a `ControllerConfig` from the parsed CLI arguments.
fn build_controller_config(cli: &Cli) -> Result<ControllerConfig, CliError> {
    let url = controller_url(&cli.controller)?;

    let tls = if let Some(path) = &cli.ca_cert {
        TlsVerification::CustomCa(path.clone())
    } else if cli.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };

    Ok(ControllerConfig {
        url,
        credentials: Credentials {
            username: cli.username.clone(),
            password: SecretString::from(cli.password.clone()),
        },
        site: cli.site.clone(),
        tls,
        timeout: Duration::from_secs(cli.timeout),
        csrf_header: cli.csrf_header.into(),
    })
}

/// Accept either a bare host/IP or a full URL for the controller.
fn controller_url(raw: &str) -> Result<url::Url, CliError> {
    let candidate = if raw.contains("://") {
        raw.to_owned()
    } else {
        format!("https://{raw}")
    };

    candidate.parse().map_err(|_| CliError::Validation {
        field: "controller".into(),
        reason: format!("'{raw}' is not a valid controller address"),
    })
}
