// Cast service collection
//
// Passive listener over mDNS broadcast announcements. Inbound resolve
// events are validated and upserted into an ordered table keyed by the
// announcement name (last write per key wins); remove events delete the
// corresponding entry. Collection ends when the bounded timeout elapses
// or an optional maximum-device threshold is reached, whichever comes
// first.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tracing::debug;

use crate::DiscoveryError;
use crate::types::{
    CAST_GROUP_MODEL, CAST_SERVICE_TYPE, CastRecord, DEFAULT_DISCOVERY_TIMEOUT, NetworkDevice,
    TXT_FRIENDLY_NAME, TXT_MODEL, TXT_UNIQUE_ID,
};

/// Sub-service announcements carry no usable endpoint data.
const CAST_SUB_SERVICE_SUFFIX: &str = "_sub._googlecast._tcp.local.";

/// How long a single blocking receive waits before the deadline is
/// re-checked.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Tuning for a discovery pass.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Allow-list of hardware models (exact match). Empty = accept all.
    pub models: Vec<String>,
    /// Stop early once this many devices are in the table. Checked on
    /// add events only.
    pub max_devices: Option<usize>,
    /// Bounded wait before discovery is considered done.
    pub timeout: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            max_devices: None,
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

/// Ordered collection of cast announcements, keyed by announcement name.
#[derive(Debug, Default)]
pub struct CastListener {
    devices: IndexMap<String, NetworkDevice>,
}

impl CastListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently in the table.
    pub fn count(&self) -> usize {
        self.devices.len()
    }

    /// Validate and upsert a record under its announcement name.
    ///
    /// Returns `true` if the record was stored. Malformed records are
    /// dropped, not stored.
    pub fn add_or_update(&mut self, announcement: &str, record: CastRecord) -> bool {
        if announcement.ends_with(CAST_SUB_SERVICE_SUFFIX) {
            debug!("ignoring sub-service announcement {announcement}");
            return false;
        }
        let Some(device) = record.into_device() else {
            return false;
        };
        debug!("upserting discovered device {announcement}: {device:?}");
        self.devices.insert(announcement.to_owned(), device);
        true
    }

    /// Remove the entry for a lost announcement, if present.
    pub fn remove(&mut self, announcement: &str) {
        if self.devices.shift_remove(announcement).is_some() {
            debug!("removed lost device {announcement}");
        }
    }

    /// Apply one inbound service event. Returns `true` for a stored
    /// add/update.
    fn handle_event(&mut self, event: &ServiceEvent) -> bool {
        match event {
            ServiceEvent::ServiceResolved(info) => {
                self.add_or_update(info.get_fullname(), record_from_info(info))
            }
            ServiceEvent::ServiceRemoved(_, fullname) => {
                self.remove(fullname);
                false
            }
            _ => false,
        }
    }

    /// Drain the table into the final result set, preserving insertion
    /// order. Group entries and allow-list misses are filtered here:
    /// they are valid table entries during collection.
    pub fn into_devices(self, allowed_models: &[String]) -> Vec<NetworkDevice> {
        self.devices
            .into_values()
            .filter(|device| {
                if device.model == CAST_GROUP_MODEL {
                    debug!("skipping cast group: {}", device.name);
                    return false;
                }
                if !allowed_models.is_empty() && !allowed_models.contains(&device.model) {
                    debug!(
                        "skipping device {}: model {:?} not in allow-list",
                        device.name, device.model
                    );
                    return false;
                }
                true
            })
            .collect()
    }
}

/// Extract a raw record from a resolved announcement.
fn record_from_info(info: &ServiceInfo) -> CastRecord {
    // Prefer an IPv4 address when the announcement carries both.
    let addresses = info.get_addresses();
    let address = addresses
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addresses.iter().next())
        .map(ToString::to_string);

    CastRecord {
        name: info.get_property_val_str(TXT_FRIENDLY_NAME).map(ToOwned::to_owned),
        address,
        port: Some(u32::from(info.get_port())),
        model: info.get_property_val_str(TXT_MODEL).map(ToOwned::to_owned),
        unique_id: info.get_property_val_str(TXT_UNIQUE_ID).map(ToOwned::to_owned),
    }
}

/// Collect cast devices from the local network for up to
/// `opts.timeout`, or until `opts.max_devices` entries are present.
///
/// A caller-supplied daemon is shared: browsing on it is stopped at the
/// end of the pass but the daemon is left running. A daemon created
/// here is shut down before returning.
pub async fn discover_devices(
    opts: &DiscoveryOptions,
    daemon: Option<&ServiceDaemon>,
) -> Result<Vec<NetworkDevice>, DiscoveryError> {
    let owned;
    let (daemon, owns_daemon) = match daemon {
        Some(shared) => (shared, false),
        None => {
            owned = ServiceDaemon::new()
                .map_err(|e| DiscoveryError::Daemon(format!("failed to create mDNS daemon: {e}")))?;
            (&owned, true)
        }
    };

    let receiver = daemon
        .browse(CAST_SERVICE_TYPE)
        .map_err(|e| DiscoveryError::Browse(format!("failed to browse {CAST_SERVICE_TYPE}: {e}")))?;

    debug!("discovering cast devices for {:?}", opts.timeout);

    let deadline = Instant::now() + opts.timeout;
    let mut listener = CastListener::new();

    'collect: while Instant::now() < deadline {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let recv = tokio::task::spawn_blocking({
            let receiver = receiver.clone();
            move || receiver.recv_timeout(RECV_POLL_INTERVAL)
        });

        match tokio::time::timeout(remaining, recv).await {
            Ok(Ok(Ok(event))) => {
                if listener.handle_event(&event)
                    && opts.max_devices.is_some_and(|max| listener.count() >= max)
                {
                    debug!("discovery reached max device count");
                    break 'collect;
                }
            }
            // Receive poll expired or the blocking task failed; the
            // loop condition re-checks the deadline.
            Ok(_) => {}
            // Overall deadline elapsed mid-receive.
            Err(_) => break 'collect,
        }
    }

    let _ = daemon.stop_browse(CAST_SERVICE_TYPE);
    if owns_daemon {
        let _ = daemon.shutdown();
    }

    debug!("discovery collected {} entries", listener.count());
    Ok(listener.into_devices(&opts.models))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(name: &str, model: &str, unique_id: &str) -> CastRecord {
        CastRecord {
            name: Some(name.into()),
            address: Some("192.168.1.10".into()),
            port: Some(8009),
            model: Some(model.into()),
            unique_id: Some(unique_id.into()),
        }
    }

    #[test]
    fn add_then_remove() {
        let mut listener = CastListener::new();
        assert!(listener.add_or_update("speaker._googlecast._tcp.local.", record("Speaker", "Google Home", "id1")));
        assert_eq!(listener.count(), 1);

        listener.remove("speaker._googlecast._tcp.local.");
        assert_eq!(listener.count(), 0);
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut listener = CastListener::new();
        listener.remove("never-seen._googlecast._tcp.local.");
        assert_eq!(listener.count(), 0);
    }

    #[test]
    fn last_write_per_key_wins() {
        let mut listener = CastListener::new();
        listener.add_or_update("a._googlecast._tcp.local.", record("Old name", "Google Home", "id1"));

        let mut updated = record("New name", "Google Home", "id1");
        updated.address = Some("192.168.1.99".into());
        listener.add_or_update("a._googlecast._tcp.local.", updated);

        assert_eq!(listener.count(), 1);
        let devices = listener.into_devices(&[]);
        assert_eq!(devices[0].name, "New name");
        assert_eq!(devices[0].ip_addr.to_string(), "192.168.1.99");
    }

    #[test]
    fn malformed_record_is_not_stored() {
        let mut listener = CastListener::new();
        let mut bad = record("Speaker", "Google Home", "id1");
        bad.unique_id = None;
        assert!(!listener.add_or_update("a._googlecast._tcp.local.", bad));
        assert_eq!(listener.count(), 0);
    }

    #[test]
    fn sub_service_is_ignored() {
        let mut listener = CastListener::new();
        assert!(!listener.add_or_update(
            "info._sub._googlecast._tcp.local.",
            record("Speaker", "Google Home", "id1"),
        ));
        assert_eq!(listener.count(), 0);
    }

    #[test]
    fn groups_are_excluded_from_results() {
        let mut listener = CastListener::new();
        listener.add_or_update("a._googlecast._tcp.local.", record("Speaker", "Google Home", "id1"));
        listener.add_or_update("b._googlecast._tcp.local.", record("Everywhere", CAST_GROUP_MODEL, "id2"));

        // The group is a valid table entry during collection...
        assert_eq!(listener.count(), 2);

        // ...but never part of the final result set.
        let devices = listener.into_devices(&[]);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Speaker");
    }

    #[test]
    fn model_allow_list_filters_results() {
        let mut listener = CastListener::new();
        listener.add_or_update("a._googlecast._tcp.local.", record("A", "Google Home", "id1"));
        listener.add_or_update("b._googlecast._tcp.local.", record("B", "Google Nest Mini", "id2"));

        let devices = listener.into_devices(&["Google Nest Mini".to_owned()]);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "B");
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut listener = CastListener::new();
        for (key, name) in [("c", "First"), ("a", "Second"), ("b", "Third")] {
            listener.add_or_update(
                &format!("{key}._googlecast._tcp.local."),
                record(name, "Google Home", key),
            );
        }

        let names: Vec<_> = listener.into_devices(&[]).into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["First", "Second", "Third"]);
    }
}
