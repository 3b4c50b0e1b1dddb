//! UCS registry client
//!
//! [`UcsClientApi`] is the seam the pipelines depend on; [`HttpUcsClient`] talks
//! to the OpenSRP-style REST API.

use super::models::{ChangePage, UcsFeedRecord};
use crate::config::{basic_auth_header, UcsConfig};
use crate::domain::{BridgeError, Result, ServerVersion, UcsClient, UcsError};
use crate::adapters::{endpoint, parse_base_url};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use url::Url;

/// Operations the bridge needs from the legacy registry
#[async_trait]
pub trait UcsClientApi: Send + Sync {
    /// Creates a client record and returns the stored record
    async fn create_client(&self, client: &UcsClient) -> std::result::Result<UcsClient, UcsError>;

    /// Replaces the client record with the given opensrpId
    async fn update_client(
        &self,
        opensrp_id: &str,
        client: &UcsClient,
    ) -> std::result::Result<UcsClient, UcsError>;

    /// Fetches a client record; `UcsError::NotFound` when absent
    async fn get_client(&self, opensrp_id: &str) -> std::result::Result<UcsClient, UcsError>;

    /// Fetches up to `limit` feed records with `serverVersion >= from`
    async fn fetch_changes(
        &self,
        from: ServerVersion,
        limit: usize,
    ) -> std::result::Result<Vec<UcsFeedRecord>, UcsError>;
}

/// REST client for the UCS registry
///
/// # Example
///
/// ```no_run
/// use smart_bridge::adapters::ucs::{HttpUcsClient, UcsClientApi};
/// use smart_bridge::config::UcsConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpUcsClient::new(&UcsConfig::default())?;
/// let record = client.get_client("OPENSRP-1").await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpUcsClient {
    base_url: Url,
    client: Client,
    config: UcsConfig,
}

impl HttpUcsClient {
    /// Creates a new client from configuration
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: &UcsConfig) -> Result<Self> {
        let mut client_builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            tracing::warn!("TLS certificate verification disabled for UCS");
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder.build().map_err(|e| {
            BridgeError::Configuration(format!("Failed to build UCS HTTP client: {e}"))
        })?;

        Ok(Self {
            base_url: parse_base_url("ucs", &config.base_url)?,
            client,
            config: config.clone(),
        })
    }

    fn auth_header_value(&self) -> Option<String> {
        match (&self.config.username, &self.config.password) {
            (Some(username), Some(password)) => Some(basic_auth_header(username, password)),
            _ => None,
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth_header_value() {
            Some(auth) => request.header("Authorization", auth),
            None => request,
        }
    }

    /// Sends a write and decodes the stored record, falling back to `sent`
    /// when the registry answers with an empty body
    async fn send_write(
        &self,
        request: RequestBuilder,
        sent: &UcsClient,
        target: &str,
    ) -> std::result::Result<UcsClient, UcsError> {
        let resp = self
            .authorized(request)
            .json(sent)
            .send()
            .await
            .map_err(map_send_error)?;
        let resp = check_status(resp, target).await?;

        let body = resp
            .text()
            .await
            .map_err(|e| UcsError::InvalidResponse(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(sent.clone());
        }
        serde_json::from_str(&body).map_err(|e| UcsError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl UcsClientApi for HttpUcsClient {
    async fn create_client(&self, client: &UcsClient) -> std::result::Result<UcsClient, UcsError> {
        let url = endpoint(&self.base_url, &["clients"]);
        let target = client.opensrp_id().unwrap_or("<new client>").to_string();

        tracing::debug!(opensrp_id = %target, "Creating UCS client");
        self.send_write(self.client.post(url), client, &target).await
    }

    async fn update_client(
        &self,
        opensrp_id: &str,
        client: &UcsClient,
    ) -> std::result::Result<UcsClient, UcsError> {
        let url = endpoint(&self.base_url, &["clients", opensrp_id]);

        tracing::debug!(opensrp_id = %opensrp_id, "Updating UCS client");
        self.send_write(self.client.put(url), client, opensrp_id)
            .await
    }

    async fn get_client(&self, opensrp_id: &str) -> std::result::Result<UcsClient, UcsError> {
        let url = endpoint(&self.base_url, &["clients", opensrp_id]);

        let resp = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(map_send_error)?;
        let resp = check_status(resp, opensrp_id).await?;

        resp.json::<UcsClient>()
            .await
            .map_err(|e| UcsError::InvalidResponse(e.to_string()))
    }

    async fn fetch_changes(
        &self,
        from: ServerVersion,
        limit: usize,
    ) -> std::result::Result<Vec<UcsFeedRecord>, UcsError> {
        let url = endpoint(&self.base_url, &["clients", "sync"]);

        tracing::debug!(server_version = %from, limit = limit, "Fetching UCS change page");

        let resp = self
            .authorized(self.client.get(url))
            .query(&[
                ("serverVersion", from.value().to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(map_send_error)?;
        let resp = check_status(resp, "clients/sync").await?;

        let page = resp
            .json::<ChangePage>()
            .await
            .map_err(|e| UcsError::InvalidResponse(e.to_string()))?;
        Ok(page.clients)
    }
}

fn map_send_error(e: reqwest::Error) -> UcsError {
    if e.is_timeout() {
        UcsError::Timeout(e.to_string())
    } else {
        UcsError::ConnectionFailed(e.to_string())
    }
}

async fn check_status(resp: Response, target: &str) -> std::result::Result<Response, UcsError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => UcsError::NotFound(target.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            UcsError::AuthenticationFailed(format!("status {status}: {body}"))
        }
        s if s.is_server_error() => UcsError::ServerError {
            status: s.as_u16(),
            message: body,
        },
        s => UcsError::ClientError {
            status: s.as_u16(),
            message: body,
        },
    })
}
