// Home Foyer graph service boundary
//
// Fetches the household device graph over an authenticated, encrypted
// channel. The wire payload is treated as an opaque request/response
// contract; only the "unauthenticated" fault classification is
// semantically significant to callers.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;

/// Production endpoint of the Home Foyer service.
pub const FOYER_BASE_URL: &str = "https://googlehomefoyer-pa.googleapis.com";

/// Method path for the full-graph fetch.
const GET_HOME_GRAPH_PATH: &str = "/google.internal.home.foyer.v1.StructuresService/GetHomeGraph";

/// The full household graph snapshot.
///
/// Plain data; the same type serves as the test fixture for client
/// state-machine tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomeGraph {
    #[serde(default)]
    pub home: Home,
}

/// The home structure within the graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Home {
    #[serde(default)]
    pub devices: Vec<HomeGraphDevice>,
}

/// One registered device in the remote graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomeGraphDevice {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub device_name: String,
    /// Device-scoped secret for local access. Empty means the device is
    /// not usable and must be excluded from results.
    #[serde(default)]
    pub local_auth_token: String,
    #[serde(default)]
    pub hardware: Option<Hardware>,
}

impl HomeGraphDevice {
    /// The hardware model, if the graph reported one.
    pub fn model(&self) -> Option<&str> {
        self.hardware.as_ref().map(|h| h.model.as_str())
    }
}

/// Hardware description of a graph device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hardware {
    #[serde(default)]
    pub model: String,
}

/// Graph fetch seam.
///
/// The production implementation is [`FoyerClient`]; tests substitute
/// implementations that count fetches or fault on demand.
pub trait GraphService {
    /// Fetch the full home graph using `access_token` as a bearer
    /// credential.
    fn get_home_graph(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<HomeGraph, Error>>;
}

/// HTTP client for the Home Foyer graph service.
pub struct FoyerClient {
    http: reqwest::Client,
    base_url: Url,
}

impl FoyerClient {
    /// Create a client against the production endpoint.
    pub fn new() -> Result<Self, Error> {
        Self::with_base_url(Url::parse(FOYER_BASE_URL)?)
    }

    /// Create a client against an alternate endpoint (tests).
    pub fn with_base_url(base_url: Url) -> Result<Self, Error> {
        let http = reqwest::Client::builder().build().map_err(Error::Transport)?;
        Ok(Self { http, base_url })
    }
}

impl GraphService for FoyerClient {
    async fn get_home_graph(&self, access_token: &str) -> Result<HomeGraph, Error> {
        let url = self.base_url.join(GET_HOME_GRAPH_PATH)?;
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthenticated { message: body });
        }
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}
