// Controller API response types
//
// All device endpoints wrap their payload in the `ApiResponse<T>` envelope.
// Fields use `#[serde(default)]` liberally because the controller proxy is
// inconsistent about field presence across firmware versions.

use serde::Deserialize;

// ── Response Envelope ────────────────────────────────────────────────

/// Standard controller API response envelope.
///
/// ```json
/// { "meta": { "rc": "ok", "msg": "optional" }, "data": [...] }
/// ```
///
/// Some proxied endpoints omit `meta` entirely and just return `data`,
/// so both fields are optional at the decoding layer.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub meta: Option<Meta>,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Metadata from the envelope. `rc` == `"ok"` means success.
#[derive(Debug, Deserialize)]
pub struct Meta {
    pub rc: String,
    #[serde(default)]
    pub msg: Option<String>,
}

// ── Device ───────────────────────────────────────────────────────────

/// Raw device record from `stat/device/{mac}`.
///
/// The controller returns 100+ fields per device; this client only needs
/// the internal id and the port-override list. Both are decoded as
/// optional so a missing field surfaces as a typed error instead of a
/// deserialization failure; everything else lands in `extra`.
#[derive(Debug, Deserialize)]
pub struct DeviceRecord {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub port_overrides: Option<Vec<serde_json::Value>>,
    /// Catch-all for the fields this client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Validated device state: the controller-internal device id (distinct
/// from the MAC used to look it up) plus the complete port-override set.
///
/// Overrides stay raw `serde_json::Value`s on purpose: the set is a
/// complete replacement payload, and entries this tool does not touch
/// must round-trip with their original fields and key order intact.
#[derive(Debug, Clone)]
pub struct DeviceState {
    pub device_id: String,
    pub port_overrides: Vec<serde_json::Value>,
}
