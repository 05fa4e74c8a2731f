// ── Resolved device output model ──
//
// A reconciled view combining a homegraph entry's identity and secret
// with an optional matching network endpoint's address and port.
// Constructed fresh per reconciliation call; never mutated afterwards.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::token::is_local_auth_token;

/// Network address of a resolved device. Both fields are `null` in the
/// serialized form when no network match exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleDeviceAddress {
    pub ip: Option<IpAddr>,
    pub port: Option<u16>,
}

/// A device from the remote graph, optionally paired with its
/// local-network endpoint.
///
/// Serializes to the output surface consumed by orchestrating layers:
/// `device_id`, `device_name`, `hardware`, `local_auth_token`, and the
/// nested `google_device` address object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub device_name: String,
    pub hardware: Option<String>,
    pub local_auth_token: String,
    pub google_device: GoogleDeviceAddress,
}

impl Device {
    /// Construct a resolved device, enforcing the output invariants.
    ///
    /// Returns `None` when the display name or local auth token is
    /// empty. An unpaired ip/port (one without the other) drops the
    /// address rather than the device; a token that does not match the
    /// expected shape is kept but flagged in the log.
    pub fn new(
        device_id: String,
        device_name: String,
        local_auth_token: String,
        hardware: Option<String>,
        ip: Option<IpAddr>,
        port: Option<u16>,
    ) -> Option<Self> {
        if device_name.is_empty() {
            error!("device_name not set");
            return None;
        }
        if local_auth_token.is_empty() {
            error!("local_auth_token not set for {device_name}");
            return None;
        }
        if !is_local_auth_token(&local_auth_token) {
            warn!("local_auth_token for {device_name} doesn't follow the expected format");
        }

        let google_device = match (ip, port) {
            (Some(ip), Some(port)) => GoogleDeviceAddress {
                ip: Some(ip),
                port: Some(port),
            },
            (None, None) => GoogleDeviceAddress::default(),
            _ => {
                warn!("both ip and port must be set for {device_name}, dropping address");
                GoogleDeviceAddress::default()
            }
        };

        Some(Self {
            device_id,
            device_name,
            hardware,
            local_auth_token,
            google_device,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::token::LOCAL_AUTH_TOKEN_LENGTH;

    fn token() -> String {
        "t".repeat(LOCAL_AUTH_TOKEN_LENGTH)
    }

    #[test]
    fn full_device_constructs() {
        let device = Device::new(
            "dev-1".into(),
            "Kitchen speaker".into(),
            token(),
            Some("Google Home Mini".into()),
            Some("192.168.1.42".parse().unwrap()),
            Some(8009),
        )
        .unwrap();

        assert_eq!(device.google_device.port, Some(8009));
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(Device::new("d".into(), String::new(), token(), None, None, None).is_none());
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(Device::new("d".into(), "Speaker".into(), String::new(), None, None, None).is_none());
    }

    #[test]
    fn wrong_length_token_is_kept() {
        // Flagged in the log, but the device is still usable.
        let device = Device::new("d".into(), "Speaker".into(), "short-token".into(), None, None, None);
        assert!(device.is_some());
    }

    #[test]
    fn unpaired_address_is_dropped() {
        let device = Device::new(
            "d".into(),
            "Speaker".into(),
            token(),
            None,
            Some("192.168.1.42".parse().unwrap()),
            None,
        )
        .unwrap();

        assert_eq!(device.google_device, GoogleDeviceAddress::default());
    }

    #[test]
    fn serializes_with_nullable_address() {
        let device = Device::new("dev-1".into(), "Speaker".into(), token(), None, None, None).unwrap();
        let json = serde_json::to_value(&device).unwrap();

        assert_eq!(json["device_id"], "dev-1");
        assert_eq!(json["device_name"], "Speaker");
        assert!(json["hardware"].is_null());
        assert!(json["google_device"]["ip"].is_null());
        assert!(json["google_device"]["port"].is_null());
    }
}
