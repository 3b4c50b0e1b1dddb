//! Forward ingestion: transformed Patients into the FHIR server

use crate::adapters::fhir::FhirClientApi;
use crate::core::audit::AuditLogger;
use crate::domain::{
    FhirError, FhirPatient, OperationKind, TransformedResource, OPENSRP_ID_SYSTEM,
    PROVENANCE_INGESTION,
};
use std::sync::Arc;

const COMPONENT: &str = "ForwardIngestion";

/// Result of ingesting one Patient
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub operation: OperationKind,

    /// The Patient as stored; in dry-run mode, as it would have been sent
    pub patient: FhirPatient,
}

/// Upserts forward-transformed Patients keyed by their opensrpId identifier
///
/// Every written Patient carries the `smart-bridge-ingestion` provenance tag
/// so the reverse pipeline recognizes the echo of our own write.
pub struct ForwardIngestion {
    fhir: Arc<dyn FhirClientApi>,
    audit: Arc<dyn AuditLogger>,
    dry_run: bool,
}

impl ForwardIngestion {
    pub fn new(fhir: Arc<dyn FhirClientApi>, audit: Arc<dyn AuditLogger>, dry_run: bool) -> Self {
        Self {
            fhir,
            audit,
            dry_run,
        }
    }

    /// Creates or updates the Patient on the FHIR server
    ///
    /// # Errors
    ///
    /// Returns the FHIR client error of the lookup or the write. The failure is
    /// audited before it is returned.
    pub async fn ingest(
        &self,
        transformed: TransformedResource<FhirPatient>,
    ) -> Result<IngestOutcome, FhirError> {
        let TransformedResource {
            resource: mut patient,
            source_system,
            original_id,
            ..
        } = transformed;
        patient.add_provenance_tag(PROVENANCE_INGESTION);

        let existing = match self
            .fhir
            .find_patient_by_identifier(OPENSRP_ID_SYSTEM, &original_id)
            .await
        {
            Ok(existing) => existing.and_then(|p| p.id),
            Err(e) => {
                self.audit_failure("LOOKUP", &original_id, &e);
                return Err(e);
            }
        };

        let operation = match existing {
            Some(ref id) => {
                patient.id = Some(id.clone());
                OperationKind::Update
            }
            None => OperationKind::Create,
        };

        if self.dry_run {
            tracing::info!(
                opensrp_id = %original_id,
                operation = %operation,
                "Dry run, skipping FHIR write"
            );
            return Ok(IngestOutcome { operation, patient });
        }

        let written = match &existing {
            Some(id) => self.fhir.update_patient(id, &patient).await,
            None => self.fhir.create_patient(&patient).await,
        };
        let stored = match written {
            Ok(stored) => stored,
            Err(e) => {
                self.audit_failure(operation.as_str(), &original_id, &e);
                return Err(e);
            }
        };

        self.audit.log_transformation(
            &source_system,
            "FHIR",
            operation.as_str(),
            &original_id,
            stored.id.as_deref(),
            true,
            "Patient stored",
        );
        tracing::debug!(
            opensrp_id = %original_id,
            fhir_id = ?stored.id,
            operation = %operation,
            "Patient ingested"
        );
        Ok(IngestOutcome {
            operation,
            patient: stored,
        })
    }

    fn audit_failure(&self, operation: &str, opensrp_id: &str, error: &FhirError) {
        self.audit.log_error(
            COMPONENT,
            operation,
            "FHIR_STORAGE_FAILED",
            &error.to_string(),
            opensrp_id,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audit::TracingAuditLogger;
    use crate::domain::{FhirResource, Identifier, ResourceKind, PROVENANCE_TAG_SYSTEM};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryFhir {
        patients: Mutex<Vec<FhirPatient>>,
    }

    #[async_trait]
    impl FhirClientApi for MemoryFhir {
        async fn create_patient(&self, p: &FhirPatient) -> Result<FhirPatient, FhirError> {
            let mut patients = self.patients.lock().unwrap();
            let mut stored = p.clone();
            stored.id = Some(format!("fhir-{}", patients.len() + 1));
            patients.push(stored.clone());
            Ok(stored)
        }

        async fn update_patient(&self, id: &str, p: &FhirPatient) -> Result<FhirPatient, FhirError> {
            let mut patients = self.patients.lock().unwrap();
            let slot = patients
                .iter_mut()
                .find(|x| x.id.as_deref() == Some(id))
                .ok_or_else(|| FhirError::NotFound(id.to_string()))?;
            *slot = p.clone();
            Ok(p.clone())
        }

        async fn get_patient(&self, id: &str) -> Result<FhirPatient, FhirError> {
            Err(FhirError::NotFound(id.to_string()))
        }

        async fn find_patient_by_identifier(
            &self,
            system: &str,
            value: &str,
        ) -> Result<Option<FhirPatient>, FhirError> {
            Ok(self
                .patients
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.identifier_value(system) == Some(value))
                .cloned())
        }

        async fn search_updated_since(
            &self,
            _: ResourceKind,
            _: DateTime<Utc>,
        ) -> Result<Vec<FhirResource>, FhirError> {
            Ok(Vec::new())
        }
    }

    fn transformed(opensrp_id: &str) -> TransformedResource<FhirPatient> {
        TransformedResource {
            resource: FhirPatient {
                identifier: vec![Identifier {
                    system: Some(OPENSRP_ID_SYSTEM.to_string()),
                    value: Some(opensrp_id.to_string()),
                }],
                ..Default::default()
            },
            source_system: "UCS".to_string(),
            original_id: opensrp_id.to_string(),
            transformed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_then_update() {
        let fhir = Arc::new(MemoryFhir::default());
        let ingestion = ForwardIngestion::new(fhir.clone(), Arc::new(TracingAuditLogger), false);

        let first = ingestion.ingest(transformed("OPENSRP-1")).await.unwrap();
        assert_eq!(first.operation, OperationKind::Create);
        assert_eq!(first.patient.id.as_deref(), Some("fhir-1"));

        let second = ingestion.ingest(transformed("OPENSRP-1")).await.unwrap();
        assert_eq!(second.operation, OperationKind::Update);
        assert_eq!(second.patient.id.as_deref(), Some("fhir-1"));
        assert_eq!(fhir.patients.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_written_patient_carries_ingestion_tag() {
        let fhir = Arc::new(MemoryFhir::default());
        let ingestion = ForwardIngestion::new(fhir.clone(), Arc::new(TracingAuditLogger), false);

        ingestion.ingest(transformed("OPENSRP-2")).await.unwrap();

        let stored = fhir.patients.lock().unwrap()[0].clone();
        let tag = &stored.meta.unwrap().tag[0];
        assert_eq!(tag.system.as_deref(), Some(PROVENANCE_TAG_SYSTEM));
        assert_eq!(tag.code.as_deref(), Some(PROVENANCE_INGESTION));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_write() {
        let fhir = Arc::new(MemoryFhir::default());
        let ingestion = ForwardIngestion::new(fhir.clone(), Arc::new(TracingAuditLogger), true);

        let outcome = ingestion.ingest(transformed("OPENSRP-3")).await.unwrap();
        assert_eq!(outcome.operation, OperationKind::Create);
        assert!(fhir.patients.lock().unwrap().is_empty());
    }
}
