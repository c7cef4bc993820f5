//! Clap derive structures for the `poectl` CLI.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use url::Url;

use poectl_core::CsrfTokenHeader;

/// Top-level argument tree for the `poectl` binary.
#[derive(Debug, Parser)]
#[command(
    name = "poectl",
    version,
    about = "Change the PoE mode of switch ports managed by a network controller",
    long_about = "Authenticates against the controller's REST API, patches the PoE mode\n\
        of the named ports, and writes the configuration back.\n\n\
        With --monitor-url set, watches a health-check URL instead and power-cycles\n\
        the ports (off, wait, auto) whenever the check fails."
)]
pub struct Cli {
    /// Hostname or IP address of the controller
    pub controller: String,

    /// Username with admin rights on the controller
    pub username: String,

    /// Password for the admin user
    pub password: String,

    /// MAC address of the switch (colons optional)
    pub mac: String,

    /// Port numbers to change, comma separated (e.g. "5,6,7")
    #[arg(value_parser = parse_ports)]
    pub ports: BTreeSet<u16>,

    /// Desired PoE mode, e.g. "auto" or "off"
    pub state: String,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Site name on the controller
    #[arg(long, short = 's', env = "POECTL_SITE", default_value = "default")]
    pub site: String,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "POECTL_INSECURE")]
    pub insecure: bool,

    /// Custom CA certificate (PEM) for the controller
    #[arg(long, value_name = "FILE", conflicts_with = "insecure")]
    pub ca_cert: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, env = "POECTL_TIMEOUT", default_value_t = 5, value_name = "SECONDS")]
    pub timeout: u64,

    /// Login-response header the CSRF token is read from
    #[arg(long, value_enum, default_value = "csrf-token")]
    pub csrf_header: CsrfHeaderArg,

    /// URL to watch; failures trigger a PoE power-cycle of the ports
    #[arg(long, alias = "monitor_url", value_name = "URL")]
    pub monitor_url: Option<Url>,

    /// Seconds between probes of the monitor URL
    #[arg(long, alias = "monitor_interval", default_value_t = 60, value_name = "SECONDS")]
    pub monitor_interval: u64,

    /// Seconds between power-off and power-on during recovery
    #[arg(long, default_value_t = 5, value_name = "SECONDS")]
    pub recovery_delay: u64,
}

/// CSRF-token extraction strategy. The controller moved the token between
/// response headers across firmware versions, so the choice is explicit.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CsrfHeaderArg {
    /// `x-csrf-token` (firmware before 3.2.7)
    CsrfToken,
    /// `x-updated-csrf-token` (firmware 3.2.7 and later)
    UpdatedCsrfToken,
}

impl From<CsrfHeaderArg> for CsrfTokenHeader {
    fn from(arg: CsrfHeaderArg) -> Self {
        match arg {
            CsrfHeaderArg::CsrfToken => Self::CsrfToken,
            CsrfHeaderArg::UpdatedCsrfToken => Self::UpdatedCsrfToken,
        }
    }
}

/// Parse a comma-separated port list into a sorted set.
fn parse_ports(raw: &str) -> Result<BTreeSet<u16>, String> {
    let mut ports = BTreeSet::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err("port list contains an empty entry".into());
        }
        let idx: u16 = part
            .parse()
            .map_err(|_| format!("'{part}' is not a valid port number"))?;
        ports.insert(idx);
    }
    Ok(ports)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn parses_port_list() {
        assert_eq!(
            parse_ports("5,6,7").unwrap(),
            [5, 6, 7].into_iter().collect::<BTreeSet<u16>>()
        );
    }

    #[test]
    fn trims_whitespace_and_dedups() {
        assert_eq!(
            parse_ports(" 5 ,5, 9").unwrap(),
            [5, 9].into_iter().collect::<BTreeSet<u16>>()
        );
    }

    #[test]
    fn rejects_garbage_and_empty_entries() {
        assert!(parse_ports("5,x").is_err());
        assert!(parse_ports("").is_err());
        assert!(parse_ports("5,,6").is_err());
        assert!(parse_ports("70000").is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
