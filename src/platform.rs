//! REST client for the remote IoT platform
//!
//! Thin request/response wrappers around the two platform calls the bridge
//! needs: device authentication and the adapter-configuration collection
//! query. No state machine lives here; retry and fallback decisions belong
//! to the callers.

use rand::Rng;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::{Result, error::BridgeError};

/// Credentials identifying this device to the platform
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Key identifying the platform tenant
    pub system_key: String,
    /// Secret paired with the system key
    pub system_secret: String,
    /// Display name of this device
    pub device_name: String,
    /// Key authorizing this device to authenticate
    pub active_key: String,
}

/// An authenticated relationship with the platform
///
/// Produced by a successful [`PlatformClient::authenticate`] call and
/// required for every subsequent platform operation.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque bearer token returned by device authentication
    pub token: String,
    /// Randomized client identifier for the message-bus connection
    pub client_id: String,
}

/// Client for the platform's REST API
#[derive(Debug)]
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    creds: Credentials,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    device_token: String,
}

/// Result envelope the platform wraps collection query results in
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(rename = "DATA")]
    data: Vec<Value>,
}

impl PlatformClient {
    /// Creates a client for the platform at `base_url`
    pub fn new(base_url: impl Into<String>, creds: Credentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            creds,
        }
    }

    /// Performs a single device authentication attempt
    ///
    /// Returns a [`Session`] carrying the bearer token and a freshly
    /// randomized message-bus client id. Callers decide whether and how to
    /// retry; this method never loops.
    pub async fn authenticate(&self) -> Result<Session> {
        let url = format!(
            "{}/api/devices/{}/auth",
            self.base_url, self.creds.device_name
        );
        debug!("authenticating device {:?}", self.creds.device_name);

        let response = self
            .http
            .post(&url)
            .header("X-System-Key", &self.creds.system_key)
            .header("X-System-Secret", &self.creds.system_secret)
            .json(&json!({ "active_key": self.creds.active_key }))
            .send()
            .await
            .map_err(BridgeError::Http)?;

        if !response.status().is_success() {
            return Err(BridgeError::Auth(format!(
                "platform rejected device auth with status {}",
                response.status()
            )));
        }

        let auth: AuthResponse = response.json().await.map_err(BridgeError::Http)?;
        Ok(Session {
            token: auth.device_token,
            client_id: random_client_id(&self.creds.device_name),
        })
    }

    /// Fetches the configuration records registered for `adapter_name`
    ///
    /// Queries `collection_id` with an equality filter on the record's
    /// `adapter_name` column and returns the raw matching records.
    pub async fn adapter_config_records(
        &self,
        session: &Session,
        collection_id: &str,
        adapter_name: &str,
    ) -> Result<Vec<Value>> {
        let url = format!("{}/api/collections/{}/query", self.base_url, collection_id);
        debug!("querying collection {collection_id} for adapter {adapter_name:?}");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&session.token)
            .json(&json!({ "filter": { "adapter_name": adapter_name } }))
            .send()
            .await
            .map_err(BridgeError::Http)?;

        if !response.status().is_success() {
            return Err(BridgeError::Platform(format!(
                "collection query failed with status {}",
                response.status()
            )));
        }

        let results: QueryResponse = response.json().await.map_err(BridgeError::Http)?;
        Ok(results.data)
    }
}

/// Builds a `<device-name>-<n>` client id with a random suffix below 10000
///
/// The suffix keeps reconnecting bridge instances from colliding on the
/// broker's client-id namespace.
fn random_client_id(device_name: &str) -> String {
    format!("{}-{}", device_name, rand::thread_rng().gen_range(0..10_000))
}
