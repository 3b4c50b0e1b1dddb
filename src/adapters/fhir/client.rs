//! FHIR R4 server client

use super::bundle::Bundle;
use crate::config::{basic_auth_header, bearer_auth_header, FhirConfig};
use crate::domain::{
    BridgeError, FhirError, FhirPatient, FhirResource, ResourceKind, Result,
};
use crate::adapters::{endpoint, parse_base_url};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use url::Url;

const FHIR_JSON: &str = "application/fhir+json";

/// Upper bound on search pages followed in one call
const MAX_SEARCH_PAGES: usize = 50;

/// Operations the bridge needs from the FHIR server
#[async_trait]
pub trait FhirClientApi: Send + Sync {
    /// Creates a Patient; the server assigns the id
    async fn create_patient(
        &self,
        patient: &FhirPatient,
    ) -> std::result::Result<FhirPatient, FhirError>;

    /// Replaces the Patient with the given id
    async fn update_patient(
        &self,
        id: &str,
        patient: &FhirPatient,
    ) -> std::result::Result<FhirPatient, FhirError>;

    /// Reads a Patient; `FhirError::NotFound` when absent
    async fn get_patient(&self, id: &str) -> std::result::Result<FhirPatient, FhirError>;

    /// First Patient carrying the identifier `system|value`
    async fn find_patient_by_identifier(
        &self,
        system: &str,
        value: &str,
    ) -> std::result::Result<Option<FhirPatient>, FhirError>;

    /// Resources of `kind` with `_lastUpdated` after `since`
    async fn search_updated_since(
        &self,
        kind: ResourceKind,
        since: DateTime<Utc>,
    ) -> std::result::Result<Vec<FhirResource>, FhirError>;
}

/// REST client for a FHIR R4 server
pub struct HttpFhirClient {
    base_url: Url,
    client: Client,
    config: FhirConfig,
}

impl HttpFhirClient {
    /// Creates a new client from configuration
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: &FhirConfig) -> Result<Self> {
        let mut client_builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            tracing::warn!("TLS certificate verification disabled for FHIR server");
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder.build().map_err(|e| {
            BridgeError::Configuration(format!("Failed to build FHIR HTTP client: {e}"))
        })?;

        Ok(Self {
            base_url: parse_base_url("fhir", &config.base_url)?,
            client,
            config: config.clone(),
        })
    }

    fn auth_header_value(&self) -> Option<String> {
        match self.config.auth_type.as_str() {
            "bearer" => self.config.token.as_ref().map(bearer_auth_header),
            "basic" => match (&self.config.username, &self.config.password) {
                (Some(username), Some(password)) => Some(basic_auth_header(username, password)),
                _ => None,
            },
            _ => None,
        }
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header("Accept", FHIR_JSON);
        match self.auth_header_value() {
            Some(auth) => builder.header("Authorization", auth),
            None => builder,
        }
    }

    async fn send_patient(
        &self,
        builder: RequestBuilder,
        patient: &FhirPatient,
        target: &str,
    ) -> std::result::Result<FhirPatient, FhirError> {
        let body =
            serde_json::to_vec(patient).map_err(|e| FhirError::InvalidResponse(e.to_string()))?;
        let resp = self
            .request(builder)
            .header("Content-Type", FHIR_JSON)
            .body(body)
            .send()
            .await
            .map_err(map_send_error)?;
        let resp = check_status(resp, target).await?;

        resp.json::<FhirPatient>()
            .await
            .map_err(|e| FhirError::InvalidResponse(e.to_string()))
    }

    async fn fetch_bundle(&self, builder: RequestBuilder) -> std::result::Result<Bundle, FhirError> {
        let resp = self.request(builder).send().await.map_err(map_send_error)?;
        let resp = check_status(resp, "search").await?;
        resp.json::<Bundle>()
            .await
            .map_err(|e| FhirError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl FhirClientApi for HttpFhirClient {
    async fn create_patient(
        &self,
        patient: &FhirPatient,
    ) -> std::result::Result<FhirPatient, FhirError> {
        let url = endpoint(&self.base_url, &["Patient"]);
        tracing::debug!(opensrp_id = ?patient.opensrp_id(), "Creating FHIR Patient");
        self.send_patient(self.client.post(url), patient, "Patient")
            .await
    }

    async fn update_patient(
        &self,
        id: &str,
        patient: &FhirPatient,
    ) -> std::result::Result<FhirPatient, FhirError> {
        let url = endpoint(&self.base_url, &["Patient", id]);
        tracing::debug!(patient_id = %id, "Updating FHIR Patient");
        self.send_patient(self.client.put(url), patient, id).await
    }

    async fn get_patient(&self, id: &str) -> std::result::Result<FhirPatient, FhirError> {
        let url = endpoint(&self.base_url, &["Patient", id]);
        let resp = self
            .request(self.client.get(url))
            .send()
            .await
            .map_err(map_send_error)?;
        let resp = check_status(resp, id).await?;
        resp.json::<FhirPatient>()
            .await
            .map_err(|e| FhirError::InvalidResponse(e.to_string()))
    }

    async fn find_patient_by_identifier(
        &self,
        system: &str,
        value: &str,
    ) -> std::result::Result<Option<FhirPatient>, FhirError> {
        let url = endpoint(&self.base_url, &["Patient"]);
        let bundle = self
            .fetch_bundle(
                self.client
                    .get(url)
                    .query(&[("identifier", format!("{system}|{value}"))]),
            )
            .await?;

        Ok(bundle
            .into_resources()
            .into_iter()
            .find_map(|r| match r {
                FhirResource::Patient(p) => Some(p),
                FhirResource::Other(_) => None,
            }))
    }

    async fn search_updated_since(
        &self,
        kind: ResourceKind,
        since: DateTime<Utc>,
    ) -> std::result::Result<Vec<FhirResource>, FhirError> {
        let url = endpoint(&self.base_url, &[kind.as_str()]);
        let since = since.to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut bundle = self
            .fetch_bundle(
                self.client
                    .get(url)
                    .query(&[("_lastUpdated", format!("gt{since}"))]),
            )
            .await?;

        let mut resources = Vec::new();
        for _ in 0..MAX_SEARCH_PAGES {
            let next = bundle.next_url().map(str::to_string);
            resources.extend(bundle.into_resources());
            match next {
                Some(next_url) => bundle = self.fetch_bundle(self.client.get(&next_url)).await?,
                None => return Ok(resources),
            }
        }

        tracing::warn!(
            resource_type = %kind,
            pages = MAX_SEARCH_PAGES,
            "Search truncated after page limit"
        );
        Ok(resources)
    }
}

fn map_send_error(e: reqwest::Error) -> FhirError {
    if e.is_timeout() {
        FhirError::Timeout(e.to_string())
    } else {
        FhirError::ConnectionFailed(e.to_string())
    }
}

async fn check_status(resp: Response, target: &str) -> std::result::Result<Response, FhirError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => FhirError::NotFound(target.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            FhirError::AuthenticationFailed(format!("status {status}: {body}"))
        }
        s if s.is_server_error() => FhirError::ServerError {
            status: s.as_u16(),
            message: body,
        },
        s => FhirError::ClientError {
            status: s.as_u16(),
            message: body,
        },
    })
}
