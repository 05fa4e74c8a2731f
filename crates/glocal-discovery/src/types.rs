use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// mDNS service type announced by Google Cast devices.
pub const CAST_SERVICE_TYPE: &str = "_googlecast._tcp.local.";

/// Model string used by virtual multi-device groups. Groups are valid
/// table entries during collection but are never addressable endpoints,
/// so they are excluded from the final result set.
pub const CAST_GROUP_MODEL: &str = "Google Cast Group";

/// Default bounded wait for a discovery pass.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Port recorded for devices located through static address hints,
/// where no real port is known.
pub const DEFAULT_DISCOVERY_PORT: u16 = 0;

// TXT record keys carried in cast announcements.
pub(crate) const TXT_FRIENDLY_NAME: &str = "fn";
pub(crate) const TXT_MODEL: &str = "md";
pub(crate) const TXT_UNIQUE_ID: &str = "cd";

/// A cast endpoint discovered on the local network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDevice {
    /// Display name (`fn` TXT field).
    pub name: String,
    pub ip_addr: IpAddr,
    pub port: u16,
    /// Hardware model (`md` TXT field).
    pub model: String,
    /// Identifier correlating this endpoint with the remote graph
    /// (`cd` TXT field).
    pub unique_id: String,
}

/// A raw announcement before validation. Every field is optional; the
/// conversion to [`NetworkDevice`] enforces the invariants and drops
/// malformed records.
#[derive(Debug, Clone, Default)]
pub struct CastRecord {
    pub name: Option<String>,
    pub address: Option<String>,
    pub port: Option<u32>,
    pub model: Option<String>,
    pub unique_id: Option<String>,
}

impl CastRecord {
    /// Validate and convert into a [`NetworkDevice`].
    ///
    /// Returns `None` (debug-logged, never surfaced) when any field is
    /// missing, the address is not a syntactically valid IP, or the
    /// port falls outside [0, 65535]. Discovery is best-effort and
    /// partial records are expected.
    pub fn into_device(self) -> Option<NetworkDevice> {
        let (Some(name), Some(address), Some(port), Some(model), Some(unique_id)) =
            (self.name, self.address, self.port, self.model, self.unique_id)
        else {
            debug!("discovered record has incomplete service info, skipping");
            return None;
        };

        if name.is_empty() || model.is_empty() || unique_id.is_empty() {
            debug!("discovered record has empty service fields, skipping");
            return None;
        }

        let Ok(ip_addr) = address.parse::<IpAddr>() else {
            debug!("discovered record has invalid IP address: {address}");
            return None;
        };

        let Ok(port) = u16::try_from(port) else {
            debug!("discovered record port out of range [0, 65535]: {port}");
            return None;
        };

        Some(NetworkDevice {
            name,
            ip_addr,
            port,
            model,
            unique_id,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn full_record() -> CastRecord {
        CastRecord {
            name: Some("Kitchen speaker".into()),
            address: Some("192.168.1.42".into()),
            port: Some(8009),
            model: Some("Google Home Mini".into()),
            unique_id: Some("abcdef123456".into()),
        }
    }

    #[test]
    fn valid_record_converts() {
        let device = full_record().into_device().unwrap();
        assert_eq!(device.name, "Kitchen speaker");
        assert_eq!(device.ip_addr, "192.168.1.42".parse::<IpAddr>().unwrap());
        assert_eq!(device.port, 8009);
    }

    #[test]
    fn ipv6_address_is_valid() {
        let mut record = full_record();
        record.address = Some("fe80::1".into());
        assert!(record.into_device().is_some());
    }

    #[test]
    fn missing_unique_id_is_dropped() {
        let mut record = full_record();
        record.unique_id = None;
        assert!(record.into_device().is_none());
    }

    #[test]
    fn missing_model_is_dropped() {
        let mut record = full_record();
        record.model = None;
        assert!(record.into_device().is_none());
    }

    #[test]
    fn empty_friendly_name_is_dropped() {
        let mut record = full_record();
        record.name = Some(String::new());
        assert!(record.into_device().is_none());
    }

    #[test]
    fn invalid_ip_is_dropped() {
        let mut record = full_record();
        record.address = Some("999.999.999.999".into());
        assert!(record.into_device().is_none());
    }

    #[test]
    fn out_of_range_port_is_dropped() {
        let mut record = full_record();
        record.port = Some(70000);
        assert!(record.into_device().is_none());
    }
}
