//! Client for Google Home local-auth tokens.
//!
//! Authenticates a Google account (or reuses a caller-supplied master
//! token), derives hourly access tokens, fetches the household's device
//! graph from the Home Foyer service, and reconciles the graph entries
//! with cast devices discovered on the local network — producing each
//! device's local authentication token alongside its address, ready
//! for direct local API access.
//!
//! - **[`Client`]** — owns the token-lifecycle state machine: master
//!   token → access token → homegraph, each tier with its own expiry
//!   and invalidation, plus a bounded reauthentication loop around the
//!   graph fetch.
//! - **[`Device`]** — the reconciled output: graph identity and secret
//!   paired with an optional network address, serializable to JSON.
//! - **[`token`]** — expiry policy and token format helpers.
//!
//! Expected failures (bad credentials, revoked tokens, unreachable
//! services, malformed discovery records) are logged and surface as
//! absent/empty results, never as panics.

pub mod client;
pub mod device;
pub mod token;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{Client, ClientBuilder, ClientError, DEFAULT_AUTH_ATTEMPTS, DeviceQuery};
pub use device::{Device, GoogleDeviceAddress};

// Boundary types callers commonly touch.
pub use glocal_api::{HomeGraph, HomeGraphDevice};
pub use glocal_discovery::{DiscoveryOptions, NetworkDevice, ServiceDaemon, discover_devices};
