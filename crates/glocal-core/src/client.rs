// ── Token-lifecycle client ──
//
// Owns the three credential tiers (master token, access token,
// homegraph snapshot) and their acquisition timestamps. Each tier has
// an independent expiry and invalidation; the homegraph fetch carries a
// bounded reauthentication loop because access tokens can be revoked
// server-side between our local expiry check and actual use.
//
// Expected failures never propagate as errors from this type: they are
// logged and reported as absent results so the orchestrating layer can
// retry or degrade. Caches are private, single-owner state; the `&mut
// self` receivers encode the no-concurrent-callers contract.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use glocal_api::{
    AuthClient, FoyerClient, GraphService, HomeGraph, TokenExchange,
};
use glocal_discovery::{
    DEFAULT_DISCOVERY_PORT, DEFAULT_DISCOVERY_TIMEOUT, DiscoveryOptions, NetworkDevice,
    ServiceDaemon, discover_devices,
};

use crate::device::Device;
use crate::token::{
    ACCESS_TOKEN_DURATION, ANDROID_ID_LENGTH, HOMEGRAPH_DURATION, censor, escape_username,
    has_expired, is_aas_et,
};

/// Default bound on reauthentication retries during a homegraph fetch.
pub const DEFAULT_AUTH_ATTEMPTS: u32 = 3;

// Expected response fields of the two exchanges.
const MASTER_TOKEN_FIELD: &str = "Token";
const ACCESS_TOKEN_FIELD: &str = "Auth";

/// Construction-time configuration errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Neither username/password nor a master token was provided.
    #[error("either username/password or a master token must be provided")]
    MissingCredentials,

    /// A production service client could not be built.
    #[error("API client error: {0}")]
    Api(#[from] glocal_api::Error),
}

/// Per-call options for device reconciliation.
#[derive(Debug, Clone, Default)]
pub struct DeviceQuery {
    /// Allow-list of hardware models (exact match). Empty = accept all.
    pub models: Vec<String>,
    /// Skip the broadcast listener entirely; devices are returned
    /// without a network address unless `addresses` is given.
    pub disable_discovery: bool,
    /// Static hints: device display name -> IPv4 address string.
    /// Takes precedence over live discovery.
    pub addresses: Option<HashMap<String, String>>,
    /// Bypass the homegraph cache for this call.
    pub force_reload: bool,
    /// Early-completion threshold for live discovery.
    pub max_devices: Option<usize>,
}

/// Builder for [`Client`]. Carries the recognized configuration
/// surface: account credentials or a master-token override, an
/// android-id override, the discovery wait duration, and an optional
/// shared mDNS daemon.
#[derive(Default)]
pub struct ClientBuilder {
    username: Option<String>,
    password: Option<SecretString>,
    master_token: Option<String>,
    android_id: Option<String>,
    discovery_timeout: Option<Duration>,
    mdns_daemon: Option<ServiceDaemon>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Google account username (full email).
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Google account password (app passwords work).
    pub fn password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    /// Previously obtained master token; skips the login exchange.
    pub fn master_token(mut self, master_token: impl Into<String>) -> Self {
        self.master_token = Some(master_token.into());
        self
    }

    /// Device identifier override; skips generation, used verbatim.
    pub fn android_id(mut self, android_id: impl Into<String>) -> Self {
        self.android_id = Some(android_id.into());
        self
    }

    /// Override the default discovery wait duration.
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = Some(timeout);
        self
    }

    /// Share an existing mDNS daemon across reconciliation calls. A
    /// shared daemon is never shut down by this client.
    pub fn mdns_daemon(mut self, daemon: ServiceDaemon) -> Self {
        self.mdns_daemon = Some(daemon);
        self
    }

    /// Build a client against the production exchange and graph
    /// endpoints.
    pub fn build(self) -> Result<Client, ClientError> {
        let exchange = AuthClient::new()?;
        let graph = FoyerClient::new()?;
        self.build_with_services(exchange, graph)
    }

    /// Build a client with caller-supplied service implementations.
    pub fn build_with_services<E, G>(self, exchange: E, graph: G) -> Result<Client<E, G>, ClientError>
    where
        E: TokenExchange,
        G: GraphService,
    {
        let has_account = self.username.is_some() && self.password.is_some();
        if !has_account && self.master_token.is_none() {
            error!("either username/password or a master token must be provided");
            return Err(ClientError::MissingCredentials);
        }

        // Retain-with-flag: a malformed override is stored and logged
        // once here, then treated as absent at first use.
        let master_token_valid = match self.master_token.as_deref() {
            Some(token) if is_aas_et(token) => true,
            Some(_) => {
                error!("master token doesn't follow the AAS_ET format");
                false
            }
            None => false,
        };

        Ok(Client {
            username: self.username,
            password: self.password,
            master_token: self.master_token,
            master_token_valid,
            android_id: self.android_id,
            access_token: None,
            access_token_date: None,
            homegraph: None,
            homegraph_date: None,
            discovery_timeout: self.discovery_timeout.unwrap_or(DEFAULT_DISCOVERY_TIMEOUT),
            mdns_daemon: self.mdns_daemon,
            exchange,
            graph,
        })
    }
}

/// Credential-acquisition and device-enumeration client.
///
/// Generic over the exchange and graph seams; the defaults are the
/// production HTTP clients.
pub struct Client<E = AuthClient, G = FoyerClient> {
    username: Option<String>,
    password: Option<SecretString>,

    master_token: Option<String>,
    master_token_valid: bool,
    android_id: Option<String>,

    access_token: Option<String>,
    access_token_date: Option<DateTime<Utc>>,

    homegraph: Option<Arc<HomeGraph>>,
    homegraph_date: Option<DateTime<Utc>>,

    discovery_timeout: Duration,
    mdns_daemon: Option<ServiceDaemon>,

    exchange: E,
    graph: G,
}

impl<E, G> Client<E, G>
where
    E: TokenExchange,
    G: GraphService,
{
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Whether the held master token matches the expected shape.
    ///
    /// A malformed override is retained but flagged; it never reaches
    /// the credential exchange.
    pub fn has_valid_master_token(&self) -> bool {
        self.master_token_valid
    }

    /// The device identifier binding all token exchanges for this
    /// instance. Generated once on first call if no override was
    /// supplied; stable for the instance's lifetime.
    pub fn get_android_id(&mut self) -> &str {
        if self.android_id.is_none() {
            let android_id = generate_android_id();
            debug!("generated android id: {android_id}");
            self.android_id = Some(android_id);
        }
        self.android_id.as_deref().unwrap_or_default()
    }

    // ── Master token ────────────────────────────────────────────────

    /// Obtain the long-lived master token, performing the login
    /// exchange on first use. Failures are logged and reported as
    /// `None`; a success is cached for the life of the instance.
    pub async fn get_master_token(&mut self) -> Option<String> {
        if self.master_token_valid {
            if let Some(token) = &self.master_token {
                debug!("master token: {}", censor(token));
                return Some(token.clone());
            }
        }

        let (Some(username), Some(password)) = (self.username.clone(), self.password.clone())
        else {
            error!("could not get master token: username and password are required");
            return None;
        };

        let android_id = self.get_android_id().to_owned();
        let escaped = escape_username(&username);

        let response = match self
            .exchange
            .perform_master_login(&escaped, &password, &android_id)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("could not get master token: {e}");
                return None;
            }
        };

        let Some(token) = response.get(MASTER_TOKEN_FIELD) else {
            error!("could not get master token: response lacks the {MASTER_TOKEN_FIELD} field");
            return None;
        };

        debug!("master token: {}", censor(token));
        self.master_token = Some(token.clone());
        self.master_token_valid = true;
        Some(token.clone())
    }

    /// Clear the cached master token. Idempotent.
    pub fn invalidate_master_token(&mut self) {
        self.master_token = None;
        self.master_token_valid = false;
    }

    // ── Access token ────────────────────────────────────────────────

    /// Obtain a valid access token, reusing the cached one while it is
    /// inside its one-hour validity window.
    pub async fn get_access_token(&mut self) -> Option<String> {
        if let (Some(token), Some(date)) = (&self.access_token, self.access_token_date) {
            if has_expired(date, ACCESS_TOKEN_DURATION, Utc::now()) {
                debug!("cached access token has expired");
            } else {
                debug!("access token: {}", censor(token));
                return Some(token.clone());
            }
        }

        let Some(master_token) = self.get_master_token().await else {
            error!("could not get access token: master token unavailable");
            return None;
        };

        let escaped = escape_username(self.username.as_deref().unwrap_or_default());
        let android_id = self.get_android_id().to_owned();

        let response = match self
            .exchange
            .perform_oauth(&escaped, &master_token, &android_id)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("could not get access token: {e}");
                return None;
            }
        };

        let Some(token) = response.get(ACCESS_TOKEN_FIELD) else {
            error!("could not get access token: response lacks the {ACCESS_TOKEN_FIELD} field");
            return None;
        };

        debug!("access token: {}", censor(token));
        self.access_token = Some(token.clone());
        self.access_token_date = Some(Utc::now());
        Some(token.clone())
    }

    /// Clear the cached access token and its timestamp. Idempotent.
    pub fn invalidate_access_token(&mut self) {
        self.access_token = None;
        self.access_token_date = None;
    }

    // ── Homegraph ───────────────────────────────────────────────────

    /// Fetch the homegraph with the default reauthentication bound.
    pub async fn get_homegraph(&mut self) -> Option<Arc<HomeGraph>> {
        self.get_homegraph_with_attempts(DEFAULT_AUTH_ATTEMPTS).await
    }

    /// Fetch the homegraph, reusing the cached snapshot while it is
    /// inside its 24-hour validity window.
    ///
    /// An "unauthenticated" channel fault invalidates the access token
    /// and retries; the loop issues at most `auth_attempts` fetches.
    /// Every other fault is terminal for this call.
    pub async fn get_homegraph_with_attempts(
        &mut self,
        auth_attempts: u32,
    ) -> Option<Arc<HomeGraph>> {
        let mut attempts = auth_attempts;
        loop {
            if let (Some(graph), Some(date)) = (&self.homegraph, self.homegraph_date) {
                if has_expired(date, HOMEGRAPH_DURATION, Utc::now()) {
                    debug!("cached homegraph has expired");
                } else {
                    return Some(Arc::clone(graph));
                }
            }

            if attempts == 0 {
                error!("could not fetch homegraph: reauthentication attempts exhausted");
                return None;
            }

            let Some(access_token) = self.get_access_token().await else {
                error!("could not fetch homegraph: access token unavailable");
                return None;
            };

            match self.graph.get_home_graph(&access_token).await {
                Ok(graph) => {
                    let graph = Arc::new(graph);
                    self.homegraph = Some(Arc::clone(&graph));
                    self.homegraph_date = Some(Utc::now());
                    return Some(graph);
                }
                Err(e) if e.is_unauthenticated() => {
                    warn!("homegraph fetch rejected the access token, reauthenticating: {e}");
                    self.invalidate_access_token();
                    attempts -= 1;
                }
                Err(e) => {
                    error!("could not fetch homegraph: {e}");
                    return None;
                }
            }
        }
    }

    /// Drop the cached homegraph snapshot. Idempotent.
    pub fn invalidate_homegraph(&mut self) {
        self.homegraph = None;
        self.homegraph_date = None;
    }

    // ── Device reconciliation ───────────────────────────────────────

    /// Resolve the household's devices: homegraph identity and secret,
    /// paired with a local network address where one can be found.
    ///
    /// Partial failure degrades to an empty list, never an error.
    /// Static address hints and live discovery are mutually exclusive
    /// per call; hints take precedence. Result order follows the
    /// graph's device enumeration order.
    pub async fn get_google_devices(&mut self, query: &DeviceQuery) -> Vec<Device> {
        if query.force_reload {
            self.invalidate_homegraph();
        }

        let Some(graph) = self.get_homegraph().await else {
            return Vec::new();
        };

        let hints = match &query.addresses {
            Some(addresses) => match validate_address_hints(addresses) {
                Some(hints) => Some(hints),
                None => return Vec::new(),
            },
            None => None,
        };

        let network_devices = if hints.is_none() && !query.disable_discovery {
            let opts = DiscoveryOptions {
                models: query.models.clone(),
                max_devices: query.max_devices,
                timeout: self.discovery_timeout,
            };
            match discover_devices(&opts, self.mdns_daemon.as_ref()).await {
                Ok(devices) => devices,
                Err(e) => {
                    // Discovery is best-effort; devices resolve without
                    // an address.
                    warn!("device discovery failed: {e}");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let mut devices = Vec::new();
        for item in &graph.home.devices {
            if item.local_auth_token.is_empty() {
                debug!("skipping {}: no local auth token", item.device_name);
                continue;
            }
            if !query.models.is_empty()
                && !item.model().is_some_and(|model| query.models.iter().any(|m| m == model))
            {
                debug!("skipping {}: model not in allow-list", item.device_name);
                continue;
            }

            // Hints match by display name; discovered endpoints match
            // by the shared unique identifier.
            let (ip, port) = match &hints {
                Some(hints) => match hints.get(&item.device_name) {
                    Some(ip) => (Some(IpAddr::V4(*ip)), Some(DEFAULT_DISCOVERY_PORT)),
                    None => (None, None),
                },
                None => match find_network_device(&network_devices, &item.device_id) {
                    Some(found) => (Some(found.ip_addr), Some(found.port)),
                    None => (None, None),
                },
            };

            if let Some(device) = Device::new(
                item.device_id.clone(),
                item.device_name.clone(),
                item.local_auth_token.clone(),
                item.model().map(ToOwned::to_owned),
                ip,
                port,
            ) {
                devices.push(device);
            }
        }

        debug!("resolved {} devices", devices.len());
        devices
    }

    /// JSON rendering of [`get_google_devices`](Self::get_google_devices):
    /// an array of objects with nullable network addresses.
    pub async fn get_google_devices_json(&mut self, query: &DeviceQuery) -> String {
        let devices = self.get_google_devices(query).await;
        match serde_json::to_string_pretty(&devices) {
            Ok(json) => json,
            Err(e) => {
                error!("could not serialize devices: {e}");
                "[]".to_owned()
            }
        }
    }
}

/// Generate a random android device identifier of the canonical length.
fn generate_android_id() -> String {
    let mut android_id = Uuid::new_v4().simple().to_string();
    android_id.truncate(ANDROID_ID_LENGTH);
    android_id
}

/// Validate the static hint mapping (display name -> IPv4 address).
/// A single malformed address aborts the whole mapping.
fn validate_address_hints(addresses: &HashMap<String, String>) -> Option<HashMap<String, Ipv4Addr>> {
    let mut hints = HashMap::with_capacity(addresses.len());
    for (name, address) in addresses {
        let Ok(ip) = address.parse::<Ipv4Addr>() else {
            error!("invalid address hint for {name}: {address} is not a valid IPv4 address");
            return None;
        };
        hints.insert(name.clone(), ip);
    }
    Some(hints)
}

fn find_network_device<'a>(
    network_devices: &'a [NetworkDevice],
    device_id: &str,
) -> Option<&'a NetworkDevice> {
    network_devices.iter().find(|device| device.unique_id == device_id)
}
