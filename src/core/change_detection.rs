//! Routing of FHIR resource changes to per-type handlers

use crate::adapters::fhir::FhirClientApi;
use crate::domain::{FhirError, FhirResource, ResourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

/// Callback for a changed resource
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn on_change(&self, resource: FhirResource);
}

/// Dispatches changed resources to the handler registered for their kind
pub struct ChangeDetectionService {
    fhir: Arc<dyn FhirClientApi>,
    handlers: HashMap<ResourceKind, Arc<dyn ChangeHandler>>,
}

impl ChangeDetectionService {
    pub fn new(fhir: Arc<dyn FhirClientApi>) -> Self {
        Self {
            fhir,
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `kind`, replacing any previous one
    pub fn register(&mut self, kind: ResourceKind, handler: Arc<dyn ChangeHandler>) {
        if self.handlers.insert(kind, handler).is_some() {
            tracing::debug!(kind = %kind, "Replaced change handler");
        }
    }

    pub fn registered_kinds(&self) -> Vec<ResourceKind> {
        self.handlers.keys().copied().collect()
    }

    /// Routes one resource; returns false when no handler takes it
    pub async fn dispatch(&self, resource: FhirResource) -> bool {
        let handler = resource.kind().and_then(|kind| self.handlers.get(&kind));
        match handler {
            Some(handler) => {
                handler.on_change(resource).await;
                true
            }
            None => {
                tracing::debug!(
                    resource_type = %resource.resource_type(),
                    "No change handler registered, ignoring"
                );
                false
            }
        }
    }

    /// Searches every registered kind for changes after `since` and dispatches them
    ///
    /// Changes of one kind are handled concurrently. Returns the number of
    /// resources dispatched.
    ///
    /// # Errors
    ///
    /// Returns the first search failure; kinds searched before it have already
    /// been dispatched.
    pub async fn poll_once(&self, since: DateTime<Utc>) -> Result<usize, FhirError> {
        let mut dispatched = 0;
        for (kind, handler) in &self.handlers {
            let changed = self.fhir.search_updated_since(*kind, since).await?;
            tracing::info!(
                kind = %kind,
                since = %since,
                count = changed.len(),
                "Polled FHIR changes"
            );
            dispatched += changed.len();
            join_all(changed.into_iter().map(|resource| handler.on_change(resource))).await;
        }
        Ok(dispatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FhirPatient;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChangeHandler for Recorder {
        async fn on_change(&self, resource: FhirResource) {
            self.seen
                .lock()
                .unwrap()
                .push(resource.id().unwrap_or_default().to_string());
        }
    }

    struct StubFhir {
        changed: Vec<FhirResource>,
    }

    #[async_trait]
    impl FhirClientApi for StubFhir {
        async fn create_patient(&self, p: &FhirPatient) -> Result<FhirPatient, FhirError> {
            Ok(p.clone())
        }

        async fn update_patient(&self, _: &str, p: &FhirPatient) -> Result<FhirPatient, FhirError> {
            Ok(p.clone())
        }

        async fn get_patient(&self, id: &str) -> Result<FhirPatient, FhirError> {
            Err(FhirError::NotFound(id.to_string()))
        }

        async fn find_patient_by_identifier(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Option<FhirPatient>, FhirError> {
            Ok(None)
        }

        async fn search_updated_since(
            &self,
            kind: ResourceKind,
            _: DateTime<Utc>,
        ) -> Result<Vec<FhirResource>, FhirError> {
            Ok(self
                .changed
                .iter()
                .filter(|r| r.kind() == Some(kind))
                .cloned()
                .collect())
        }
    }

    /// Tracks how many changes are being handled at once
    #[derive(Default)]
    struct SlowHandler {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ChangeHandler for SlowHandler {
        async fn on_change(&self, _resource: FhirResource) {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn resource(resource_type: &str, id: &str) -> FhirResource {
        FhirResource::from_value(json!({"resourceType": resource_type, "id": id})).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_kind() {
        let recorder = Arc::new(Recorder::default());
        let mut service = ChangeDetectionService::new(Arc::new(StubFhir { changed: vec![] }));
        service.register(ResourceKind::Patient, recorder.clone());

        assert!(service.dispatch(resource("Patient", "p-1")).await);
        assert!(!service.dispatch(resource("Observation", "o-1")).await);
        assert!(!service.dispatch(resource("Basic", "b-1")).await);
        assert_eq!(recorder.seen.lock().unwrap().as_slice(), ["p-1"]);
    }

    #[tokio::test]
    async fn test_poll_once_dispatches_changes() {
        let recorder = Arc::new(Recorder::default());
        let fhir = StubFhir {
            changed: vec![
                resource("Patient", "p-1"),
                resource("Patient", "p-2"),
                resource("Observation", "o-1"),
            ],
        };
        let mut service = ChangeDetectionService::new(Arc::new(fhir));
        service.register(ResourceKind::Patient, recorder.clone());

        let dispatched = service.poll_once(Utc::now()).await.unwrap();
        assert_eq!(dispatched, 2);
        assert_eq!(recorder.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_poll_once_handles_changes_concurrently() {
        let handler = Arc::new(SlowHandler::default());
        let fhir = StubFhir {
            changed: (0..4).map(|n| resource("Patient", &format!("p-{n}"))).collect(),
        };
        let mut service = ChangeDetectionService::new(Arc::new(fhir));
        service.register(ResourceKind::Patient, handler.clone());

        assert_eq!(service.poll_once(Utc::now()).await.unwrap(), 4);
        assert_eq!(handler.peak.load(Ordering::SeqCst), 4);
    }
}
