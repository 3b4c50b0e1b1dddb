//! Reverse sync flow: FHIR resource changes into the UCS registry
//!
//! Each resource walks `START -> CONFLICT_CHECK -> [CONFLICT_RESOLVE -> SKIP]
//! -> TRANSFORM -> STORE -> CONSISTENCY_CHECK -> DONE`; any step may end in
//! `FAILED`. Failures are audited and returned on the result, never raised.
//!
//! Concurrent submissions of the same resource id join the flow already in
//! flight instead of racing it through transform and store.

use super::conflict::{ConflictDetector, ConflictResolver, Resolution};
use super::result::{FlowError, FlowErrorCode, FlowState, ReverseSyncResult, SyncStatus};
use super::version_store::{ResourceVersion, VersionStore};
use crate::adapters::ucs::UcsClientApi;
use crate::core::audit::AuditLogger;
use crate::core::change_detection::ChangeHandler;
use crate::core::executor::WorkerPool;
use crate::core::transform::ReverseTransformer;
use crate::domain::{
    FhirResource, OperationKind, ResourceId, TransformError, UcsClient, UcsError,
};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const COMPONENT: &str = "ReverseSyncOrchestrator";

type InFlightFlow = Shared<BoxFuture<'static, ReverseSyncResult>>;

/// Flows by resource id, tagged with a token so a finished or abandoned flow
/// only ever removes its own entry
#[derive(Default)]
struct InFlight {
    flows: Mutex<HashMap<ResourceId, (u64, InFlightFlow)>>,
    next_token: AtomicU64,
}

impl InFlight {
    // Never held across an await
    fn lock(&self) -> MutexGuard<'_, HashMap<ResourceId, (u64, InFlightFlow)>> {
        self.flows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self, id: &ResourceId, token: u64) {
        let mut flows = self.lock();
        if flows.get(id).map(|(t, _)| *t) == Some(token) {
            flows.remove(id);
        }
    }
}

/// Releases the owner's entry if the owner is dropped before its flow ends
struct OwnerGuard {
    in_flight: Arc<InFlight>,
    id: ResourceId,
    token: u64,
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        self.in_flight.release(&self.id, self.token);
    }
}

/// Outcome counts over every submission since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReverseSyncStats {
    pub synced: u64,
    pub skipped: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    synced: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl StatCounters {
    fn record(&self, result: &ReverseSyncResult) {
        let counter = match result.status {
            SyncStatus::Synced => &self.synced,
            SyncStatus::Skipped => &self.skipped,
            SyncStatus::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Drives FHIR resources through the reverse sync state machine
pub struct ReverseSyncOrchestrator {
    flow: Arc<FlowSteps>,
    pool: Arc<WorkerPool>,
    in_flight: Arc<InFlight>,
    stats: StatCounters,
}

impl ReverseSyncOrchestrator {
    /// Creates an orchestrator running its flows on `pool`
    pub fn new(
        ucs: Arc<dyn UcsClientApi>,
        versions: Arc<dyn VersionStore>,
        audit: Arc<dyn AuditLogger>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            flow: Arc::new(FlowSteps {
                ucs,
                detector: ConflictDetector::new(Arc::clone(&versions)),
                versions,
                audit,
                resolver: ConflictResolver,
                transformer: ReverseTransformer::new(),
                source: None,
            }),
            pool,
            in_flight: Arc::new(InFlight::default()),
            stats: StatCounters::default(),
        }
    }

    /// Sets the `source` tag written on produced records (default `FHIR`)
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        if let Some(flow) = Arc::get_mut(&mut self.flow) {
            flow.source = Some(source.into());
        }
        self
    }

    /// Number of flows currently running
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn stats(&self) -> ReverseSyncStats {
        ReverseSyncStats {
            synced: self.stats.synced.load(Ordering::Relaxed),
            skipped: self.stats.skipped.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }

    /// Syncs one resource, joining an in-flight flow for the same id
    pub async fn sync(&self, resource: FhirResource) -> ReverseSyncResult {
        let result = self.submit(resource).await;
        self.stats.record(&result);
        result
    }

    async fn submit(&self, resource: FhirResource) -> ReverseSyncResult {
        let resource_id = match resource.id().map(ResourceId::new) {
            Some(Ok(id)) => id,
            _ => return self.flow.reject_without_id(&resource),
        };

        let (flow, guard) = {
            let mut flows = self.in_flight.lock();
            match flows.get(&resource_id) {
                Some((_, existing)) => {
                    tracing::debug!(
                        resource_id = %resource_id,
                        "Joining in-flight reverse sync"
                    );
                    (existing.clone(), None)
                }
                None => {
                    let token = self.in_flight.next_token.fetch_add(1, Ordering::Relaxed);
                    let steps = Arc::clone(&self.flow);
                    let in_flight = Arc::clone(&self.in_flight);
                    let id = resource_id.clone();
                    // Whoever polls the flow to completion releases the entry
                    let flow = async move {
                        let result = steps.run(id.clone(), resource).await;
                        in_flight.release(&id, token);
                        result
                    }
                    .boxed()
                    .shared();
                    flows.insert(resource_id.clone(), (token, flow.clone()));
                    let guard = OwnerGuard {
                        in_flight: Arc::clone(&self.in_flight),
                        id: resource_id.clone(),
                        token,
                    };
                    (flow, Some(guard))
                }
            }
        };

        let Some(_guard) = guard else {
            return flow.await;
        };

        match self.pool.spawn(flow).await {
            Ok(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => self.flow.fail(
                    &resource_id,
                    vec![FlowState::Start, FlowState::Failed],
                    FlowError::new(FlowErrorCode::TaskFailed, e.to_string()),
                ),
            },
            Err(e) => self.flow.fail(
                &resource_id,
                vec![FlowState::Start, FlowState::Failed],
                FlowError::new(FlowErrorCode::PoolRejected, e.to_string()),
            ),
        }
    }

    /// Syncs every resource concurrently; results are index-aligned with the input
    pub async fn sync_batch(&self, resources: Vec<FhirResource>) -> Vec<ReverseSyncResult> {
        let results =
            futures::future::join_all(resources.into_iter().map(|r| self.sync(r))).await;

        let failed = results.iter().filter(|r| !r.is_success()).count();
        let skipped = results.iter().filter(|r| r.is_skipped()).count();
        tracing::info!(
            total = results.len(),
            synced = results.len() - failed - skipped,
            skipped = skipped,
            failed = failed,
            "Reverse sync batch finished"
        );
        results
    }
}

#[async_trait]
impl ChangeHandler for ReverseSyncOrchestrator {
    async fn on_change(&self, resource: FhirResource) {
        let result = self.sync(resource).await;
        if let Some(error) = &result.error {
            tracing::warn!(
                resource_id = ?result.resource_id,
                error = %error,
                "Change notification failed to sync"
            );
        }
    }
}

/// The sequential steps of one flow
struct FlowSteps {
    ucs: Arc<dyn UcsClientApi>,
    versions: Arc<dyn VersionStore>,
    audit: Arc<dyn AuditLogger>,
    detector: ConflictDetector,
    resolver: ConflictResolver,
    transformer: ReverseTransformer,
    source: Option<String>,
}

impl FlowSteps {
    async fn run(&self, resource_id: ResourceId, resource: FhirResource) -> ReverseSyncResult {
        let mut states = vec![FlowState::Start, FlowState::ConflictCheck];

        if let Some(conflict) = self.detector.detect(&resource_id, &resource).await {
            states.push(FlowState::ConflictResolve);
            match self.resolver.resolve(conflict) {
                Resolution::Skip => {
                    states.push(FlowState::Skip);
                    tracing::info!(
                        resource_id = %resource_id,
                        conflict = %conflict,
                        "Skipping resource"
                    );
                    return ReverseSyncResult::skipped(resource_id.into_inner(), conflict, states);
                }
            }
        }

        states.push(FlowState::Transform);
        let client = match self.transform(&resource) {
            Ok(client) => client,
            Err(error) => return self.fail(&resource_id, states, error),
        };
        let opensrp_id = client.opensrp_id().unwrap_or_default().to_string();

        states.push(FlowState::Store);
        let (stored, operation) = match self.store(&opensrp_id, &client).await {
            Ok(stored) => stored,
            Err(e) => {
                let error = FlowError::new(
                    FlowErrorCode::UcsStorageFailed,
                    format!("Failed to store client {opensrp_id}: {e}"),
                );
                return self.fail(&resource_id, states, error);
            }
        };

        states.push(FlowState::ConsistencyCheck);
        let inconsistencies = check_consistency(&resource, &stored);
        for inconsistency in &inconsistencies {
            tracing::warn!(
                resource_id = %resource_id,
                inconsistency = %inconsistency,
                "Stored client differs from resource"
            );
        }

        self.versions
            .put(ResourceVersion {
                resource_id: resource_id.clone(),
                last_updated: resource.last_updated().unwrap_or_else(Utc::now),
            })
            .await;

        self.audit.log_transformation(
            "FHIR",
            "UCS",
            operation.as_str(),
            resource_id.as_str(),
            Some(&opensrp_id),
            true,
            &format!("{} synced to UCS", resource.resource_type()),
        );

        states.push(FlowState::Done);
        tracing::info!(
            resource_id = %resource_id,
            opensrp_id = %opensrp_id,
            operation = %operation,
            "Reverse sync complete"
        );
        ReverseSyncResult::synced(
            resource_id.into_inner(),
            operation,
            opensrp_id,
            inconsistencies,
            states,
        )
    }

    fn transform(&self, resource: &FhirResource) -> Result<UcsClient, FlowError> {
        if resource.as_patient().is_none() {
            return Err(FlowError::new(
                FlowErrorCode::UnsupportedResourceType,
                format!("Reverse sync only accepts Patient, got {}", resource.resource_type()),
            ));
        }
        self.transformer
            .transform(resource, self.source.as_deref())
            .map_err(transformation_failed)
    }

    /// Read-before-write: update when the client exists, create otherwise
    async fn store(
        &self,
        opensrp_id: &str,
        client: &UcsClient,
    ) -> Result<(UcsClient, OperationKind), UcsError> {
        match self.ucs.get_client(opensrp_id).await {
            Ok(_) => {
                let stored = self.ucs.update_client(opensrp_id, client).await?;
                Ok((stored, OperationKind::Update))
            }
            Err(e) => {
                if !matches!(e, UcsError::NotFound(_)) {
                    tracing::warn!(
                        opensrp_id = %opensrp_id,
                        error = %e,
                        "Client lookup failed, creating"
                    );
                }
                let stored = self.ucs.create_client(client).await?;
                Ok((stored, OperationKind::Create))
            }
        }
    }

    fn fail(
        &self,
        resource_id: &ResourceId,
        mut states: Vec<FlowState>,
        error: FlowError,
    ) -> ReverseSyncResult {
        let failed_step = states.last().copied().unwrap_or(FlowState::Start);
        states.push(FlowState::Failed);

        self.audit.log_error(
            COMPONENT,
            failed_step.as_str(),
            error.code.as_str(),
            &error.message,
            resource_id.as_str(),
        );
        tracing::error!(
            resource_id = %resource_id,
            step = %failed_step,
            error = %error,
            "Reverse sync failed"
        );
        ReverseSyncResult::failed(Some(resource_id.to_string()), error, states)
    }

    fn reject_without_id(&self, resource: &FhirResource) -> ReverseSyncResult {
        let error = FlowError::new(
            FlowErrorCode::MissingResourceId,
            format!("{} has no id", resource.resource_type()),
        );
        self.audit.log_error(
            COMPONENT,
            FlowState::Start.as_str(),
            error.code.as_str(),
            &error.message,
            "",
        );
        tracing::error!(resource_type = %resource.resource_type(), "Resource without id rejected");
        ReverseSyncResult::failed(None, error, vec![FlowState::Start, FlowState::Failed])
    }
}

fn transformation_failed(error: TransformError) -> FlowError {
    FlowError {
        code: FlowErrorCode::TransformationFailed,
        message: error.message,
        transform_code: Some(error.code),
    }
}

/// Compares the resource's opensrpId and first given name with the stored client
fn check_consistency(resource: &FhirResource, stored: &UcsClient) -> Vec<String> {
    let Some(patient) = resource.as_patient() else {
        return Vec::new();
    };

    let mut inconsistencies = Vec::new();
    if patient.opensrp_id() != stored.opensrp_id() {
        inconsistencies.push(format!(
            "opensrpId mismatch: resource {:?}, stored {:?}",
            patient.opensrp_id(),
            stored.opensrp_id()
        ));
    }
    if patient.first_given_name() != stored.first_name() {
        inconsistencies.push(format!(
            "first name mismatch: resource {:?}, stored {:?}",
            patient.first_given_name(),
            stored.first_name()
        ));
    }
    inconsistencies
}
