//! Resilient client decorators
//!
//! Every outbound call goes through retry, and every attempt goes through the
//! circuit breaker. A rejected call surfaces as the client's own
//! `CircuitOpen` variant, so callers match on one error type whichever layer
//! failed.

use super::{CircuitBreaker, RetryPolicy};
use crate::adapters::fhir::FhirClientApi;
use crate::adapters::ucs::{UcsClientApi, UcsFeedRecord};
use crate::domain::{
    FhirError, FhirPatient, FhirResource, ResourceKind, ServerVersion, UcsClient, UcsError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// [`UcsClientApi`] guarded by a circuit breaker and retry policy
pub struct ResilientUcsClient {
    inner: Arc<dyn UcsClientApi>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl ResilientUcsClient {
    pub fn new(inner: Arc<dyn UcsClientApi>, breaker: CircuitBreaker, retry: RetryPolicy) -> Self {
        Self {
            inner,
            breaker,
            retry,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

#[async_trait]
impl UcsClientApi for ResilientUcsClient {
    async fn create_client(&self, client: &UcsClient) -> Result<UcsClient, UcsError> {
        self.retry
            .execute("ucs.create_client", || {
                self.breaker.call(self.inner.create_client(client))
            })
            .await
    }

    async fn update_client(
        &self,
        opensrp_id: &str,
        client: &UcsClient,
    ) -> Result<UcsClient, UcsError> {
        self.retry
            .execute("ucs.update_client", || {
                self.breaker
                    .call(self.inner.update_client(opensrp_id, client))
            })
            .await
    }

    async fn get_client(&self, opensrp_id: &str) -> Result<UcsClient, UcsError> {
        self.retry
            .execute("ucs.get_client", || {
                self.breaker.call(self.inner.get_client(opensrp_id))
            })
            .await
    }

    async fn fetch_changes(
        &self,
        from: ServerVersion,
        limit: usize,
    ) -> Result<Vec<UcsFeedRecord>, UcsError> {
        self.retry
            .execute("ucs.fetch_changes", || {
                self.breaker.call(self.inner.fetch_changes(from, limit))
            })
            .await
    }
}

/// [`FhirClientApi`] guarded by a circuit breaker and retry policy
pub struct ResilientFhirClient {
    inner: Arc<dyn FhirClientApi>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl ResilientFhirClient {
    pub fn new(
        inner: Arc<dyn FhirClientApi>,
        breaker: CircuitBreaker,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner,
            breaker,
            retry,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

#[async_trait]
impl FhirClientApi for ResilientFhirClient {
    async fn create_patient(&self, patient: &FhirPatient) -> Result<FhirPatient, FhirError> {
        self.retry
            .execute("fhir.create_patient", || {
                self.breaker.call(self.inner.create_patient(patient))
            })
            .await
    }

    async fn update_patient(
        &self,
        id: &str,
        patient: &FhirPatient,
    ) -> Result<FhirPatient, FhirError> {
        self.retry
            .execute("fhir.update_patient", || {
                self.breaker.call(self.inner.update_patient(id, patient))
            })
            .await
    }

    async fn get_patient(&self, id: &str) -> Result<FhirPatient, FhirError> {
        self.retry
            .execute("fhir.get_patient", || {
                self.breaker.call(self.inner.get_patient(id))
            })
            .await
    }

    async fn find_patient_by_identifier(
        &self,
        system: &str,
        value: &str,
    ) -> Result<Option<FhirPatient>, FhirError> {
        self.retry
            .execute("fhir.find_patient_by_identifier", || {
                self.breaker
                    .call(self.inner.find_patient_by_identifier(system, value))
            })
            .await
    }

    async fn search_updated_since(
        &self,
        kind: ResourceKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<FhirResource>, FhirError> {
        self.retry
            .execute("fhir.search_updated_since", || {
                self.breaker.call(self.inner.search_updated_since(kind, since))
            })
            .await
    }
}
