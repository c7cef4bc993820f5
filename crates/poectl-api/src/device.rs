// Device endpoints
//
// Read via stat/device/{mac}, write via rest/device/{device_id}. The
// update endpoint is addressed by the controller-internal device id
// discovered during the read, never by the MAC.

use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::models::{DeviceRecord, DeviceState};
use crate::session::SessionClient;

impl SessionClient {
    /// Fetch the current state of a device by MAC address.
    ///
    /// `GET /api/s/{site}/stat/device/{mac}`
    ///
    /// The MAC is lowercased before use; colons are accepted but not
    /// required. The first (and only) returned record must carry both
    /// `device_id` and `port_overrides`.
    pub async fn device_state(&self, mac: &str) -> Result<DeviceState, Error> {
        let mac = mac.to_lowercase();
        let url = self.site_url(&format!("stat/device/{mac}"))?;
        debug!(mac, "reading device state");

        let records: Vec<DeviceRecord> = self.get(url).await?;
        let record = records
            .into_iter()
            .next()
            .ok_or(Error::DeviceNotFound { mac })?;

        let device_id = record.device_id.ok_or_else(|| Error::Malformed {
            message: "device record has no device_id".into(),
        })?;
        let port_overrides = record.port_overrides.ok_or_else(|| Error::Malformed {
            message: "device record has no port_overrides".into(),
        })?;

        Ok(DeviceState {
            device_id,
            port_overrides,
        })
    }

    /// Replace a device's complete port-override set.
    ///
    /// `PUT /api/s/{site}/rest/device/{device_id}` with
    /// `{"port_overrides": [...]}` and the CSRF header. The set is a full
    /// replacement payload, not a diff — callers must send every entry,
    /// including the ones they did not touch.
    pub async fn set_port_overrides(
        &self,
        device_id: &str,
        overrides: &[serde_json::Value],
    ) -> Result<(), Error> {
        let url = self.site_url(&format!("rest/device/{device_id}"))?;
        debug!(device_id, entries = overrides.len(), "updating port overrides");

        let body = json!({ "port_overrides": overrides });
        let _: Vec<serde_json::Value> = self.put(url, &body).await?;
        Ok(())
    }
}
