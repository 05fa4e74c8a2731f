// glocal-discovery: passive mDNS discovery of Google Cast devices.

pub mod scanner;
pub mod types;

// Re-export primary types.
pub use mdns_sd::ServiceDaemon;
pub use scanner::{CastListener, DiscoveryOptions, discover_devices};
pub use types::{
    CAST_GROUP_MODEL, CAST_SERVICE_TYPE, CastRecord, DEFAULT_DISCOVERY_PORT,
    DEFAULT_DISCOVERY_TIMEOUT, NetworkDevice,
};

/// Errors for discovery operations.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("mDNS daemon error: {0}")]
    Daemon(String),

    #[error("mDNS browse error: {0}")]
    Browse(String),
}
