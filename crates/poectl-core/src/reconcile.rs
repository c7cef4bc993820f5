// ── Port-override reconciliation ──
//
// Read-modify-write against the device's port-override set. Only entries
// for targeted ports change; every other entry is carried through
// untouched, because the set is a complete replacement payload. The write
// is last-writer-wins: no optimistic concurrency check between the GET
// and the PUT.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::{debug, info, warn};

use poectl_api::SessionClient;

use crate::config::ControllerConfig;
use crate::error::CoreError;

/// The unit of work for one reconciliation call: which ports, and what
/// PoE mode they should end up in.
#[derive(Debug, Clone)]
pub struct DesiredState {
    pub ports: BTreeSet<u16>,
    pub poe_mode: String,
}

/// Per-port classification produced by the patch step.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PortPlan {
    /// Ports whose `poe_mode` was overwritten.
    pub changed: Vec<u16>,
    /// Ports already in the desired mode.
    pub unchanged: Vec<u16>,
    /// Targeted ports whose entry has no `poe_mode` field (not PoE-capable).
    pub not_poe_capable: Vec<u16>,
    /// Targeted ports with no matching override entry at all.
    pub missing: Vec<u16>,
}

/// Result of one reconciliation: the device id the update was addressed
/// to, plus what happened to each targeted port.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub device_id: String,
    pub plan: PortPlan,
}

/// Patch the override set in place for the desired state.
///
/// Pure function over the set: entries whose `port_idx` is targeted and
/// which carry a differing `poe_mode` are overwritten; everything else is
/// left exactly as received. Applying the same desired state twice is a
/// no-op the second time.
pub fn plan_ports(overrides: &mut [Value], desired: &DesiredState) -> PortPlan {
    let mut plan = PortPlan::default();
    let mut seen: BTreeSet<u16> = BTreeSet::new();

    for entry in &mut *overrides {
        let Some(idx) = entry.get("port_idx").and_then(Value::as_u64) else {
            continue;
        };
        let Ok(idx) = u16::try_from(idx) else {
            continue;
        };
        if !desired.ports.contains(&idx) {
            continue;
        }
        seen.insert(idx);

        match entry.get_mut("poe_mode") {
            Some(mode) if mode.as_str() == Some(desired.poe_mode.as_str()) => {
                info!(port_idx = idx, poe_mode = %desired.poe_mode, "port already in desired mode");
                plan.unchanged.push(idx);
            }
            Some(mode) => {
                info!(
                    port_idx = idx,
                    from = %mode,
                    to = %desired.poe_mode,
                    "updating poe mode"
                );
                *mode = Value::String(desired.poe_mode.clone());
                plan.changed.push(idx);
            }
            None => {
                debug!(port_idx = idx, "port has no poe_mode field, skipping");
                plan.not_poe_capable.push(idx);
            }
        }
    }

    plan.missing = desired.ports.difference(&seen).copied().collect();
    plan
}

/// Reconcile the targeted ports of one device to the desired PoE mode.
///
/// Fetches the device's current override set, patches the targeted
/// entries, and PUTs the **entire** set back, addressed by the device id
/// discovered during the fetch. Idempotent: a second identical call
/// produces an identical update body.
pub async fn reconcile(
    client: &SessionClient,
    mac: &str,
    desired: &DesiredState,
) -> Result<ReconcileOutcome, CoreError> {
    let mut state = client.device_state(mac).await.map_err(CoreError::Fetch)?;

    let plan = plan_ports(&mut state.port_overrides, desired);

    for idx in &plan.missing {
        warn!(port_idx = *idx, mac, "targeted port has no override entry on this device");
    }

    client
        .set_port_overrides(&state.device_id, &state.port_overrides)
        .await
        .map_err(CoreError::Update)?;

    info!(
        device_id = %state.device_id,
        changed = plan.changed.len(),
        unchanged = plan.unchanged.len(),
        "port overrides updated"
    );

    Ok(ReconcileOutcome {
        device_id: state.device_id,
        plan,
    })
}

/// Run one full login/reconcile/logout bracket.
///
/// A login failure is fatal: the device is never contacted. Once logged
/// in, logout is always attempted before returning — even when the
/// reconciliation failed — and a logout failure is logged, not escalated.
pub async fn apply_desired_state(
    config: &ControllerConfig,
    mac: &str,
    desired: &DesiredState,
) -> Result<ReconcileOutcome, CoreError> {
    let client = config.session_client().map_err(CoreError::Client)?;

    client
        .login(&config.credentials.username, &config.credentials.password)
        .await
        .map_err(CoreError::Auth)?;

    let result = reconcile(&client, mac, desired).await;

    // Cleanup invariant: the session is closed no matter how the
    // reconciliation went.
    if let Err(e) = client.logout().await {
        warn!(error = %e, "logout failed");
    }

    result
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use serde_json::json;

    use super::*;

    fn desired(ports: &[u16], mode: &str) -> DesiredState {
        DesiredState {
            ports: ports.iter().copied().collect(),
            poe_mode: mode.into(),
        }
    }

    #[test]
    fn patches_only_targeted_ports_with_poe_mode() {
        let mut overrides = vec![
            json!({ "port_idx": 1, "poe_mode": "auto" }),
            json!({ "port_idx": 5, "poe_mode": "off" }),
            json!({ "port_idx": 7 }),
        ];

        let plan = plan_ports(&mut overrides, &desired(&[5, 7], "auto"));

        assert_eq!(plan.changed, vec![5]);
        assert_eq!(plan.not_poe_capable, vec![7]);
        assert!(plan.missing.is_empty());
        assert_eq!(overrides[0], json!({ "port_idx": 1, "poe_mode": "auto" }));
        assert_eq!(overrides[1], json!({ "port_idx": 5, "poe_mode": "auto" }));
        assert_eq!(overrides[2], json!({ "port_idx": 7 }));
    }

    #[test]
    fn planning_twice_is_idempotent() {
        let mut overrides = vec![
            json!({ "port_idx": 2, "poe_mode": "auto" }),
            json!({ "port_idx": 3, "poe_mode": "auto" }),
        ];

        let first = plan_ports(&mut overrides, &desired(&[2, 3], "off"));
        assert_eq!(first.changed, vec![2, 3]);

        let after_first = overrides.clone();
        let second = plan_ports(&mut overrides, &desired(&[2, 3], "off"));

        assert!(second.changed.is_empty());
        assert_eq!(second.unchanged, vec![2, 3]);
        assert_eq!(overrides, after_first);
    }

    #[test]
    fn untargeted_entries_keep_unknown_fields_and_key_order() {
        let raw = r#"{"name":"cam-door","port_idx":4,"portconf_id":"5a2b","poe_mode":"auto","autoneg":true}"#;
        let mut overrides = vec![serde_json::from_str(raw).unwrap()];

        plan_ports(&mut overrides, &desired(&[9], "off"));

        // Byte-for-byte round trip for entries the plan did not touch.
        assert_eq!(serde_json::to_string(&overrides[0]).unwrap(), raw);
    }

    #[test]
    fn missing_target_ports_are_reported() {
        let mut overrides = vec![json!({ "port_idx": 1, "poe_mode": "auto" })];

        let plan = plan_ports(&mut overrides, &desired(&[1, 42], "off"));

        assert_eq!(plan.changed, vec![1]);
        assert_eq!(plan.missing, vec![42]);
    }

    #[test]
    fn entries_without_port_idx_are_ignored() {
        let mut overrides = vec![json!({ "poe_mode": "auto" }), json!("not-an-object")];

        let plan = plan_ports(&mut overrides, &desired(&[1], "off"));

        assert!(plan.changed.is_empty());
        assert_eq!(plan.missing, vec![1]);
        assert_eq!(overrides[0], json!({ "poe_mode": "auto" }));
    }
}
