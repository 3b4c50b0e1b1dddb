//! Conflict detection and resolution for incoming FHIR changes

use super::result::ConflictKind;
use super::version_store::{ResourceVersion, VersionStore};
use crate::domain::{FhirResource, ResourceId, PROVENANCE_INGESTION, PROVENANCE_UCS};
use std::sync::Arc;

/// Provenance codes marking data written by the forward pipeline
const FORWARD_PROVENANCE: [&str; 2] = [PROVENANCE_UCS, PROVENANCE_INGESTION];

/// Compares incoming resources against the version tracking store
#[derive(Clone)]
pub struct ConflictDetector {
    versions: Arc<dyn VersionStore>,
}

impl ConflictDetector {
    pub fn new(versions: Arc<dyn VersionStore>) -> Self {
        Self { versions }
    }

    /// Returns the conflict for `resource`, or `None` to proceed
    pub async fn detect(
        &self,
        resource_id: &ResourceId,
        resource: &FhirResource,
    ) -> Option<ConflictKind> {
        let recorded = self.versions.get(resource_id).await;
        classify(recorded.as_ref(), resource)
    }
}

/// Conflict rules over a recorded version
///
/// Nothing recorded or no `lastUpdated` on the resource means there is
/// nothing to compare. A resource that is not newer was already processed.
/// A newer resource carrying a forward provenance tag is an echo of our own
/// write.
pub fn classify(recorded: Option<&ResourceVersion>, resource: &FhirResource) -> Option<ConflictKind> {
    let recorded = recorded?;
    let incoming = resource.last_updated()?;

    if incoming <= recorded.last_updated {
        return Some(ConflictKind::AlreadyProcessed);
    }

    let from_forward_pipeline = resource
        .meta()
        .is_some_and(|meta| meta.has_tag_code(&FORWARD_PROVENANCE));
    if from_forward_pipeline {
        return Some(ConflictKind::CircularUpdate);
    }
    None
}

/// What to do about a detected conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Skip,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    /// Every known conflict is resolved by skipping the resource
    pub fn resolve(&self, conflict: ConflictKind) -> Resolution {
        match conflict {
            ConflictKind::AlreadyProcessed | ConflictKind::CircularUpdate => Resolution::Skip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reverse_sync::InMemoryVersionStore;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn recorded(hour: u32) -> ResourceVersion {
        ResourceVersion {
            resource_id: ResourceId::new("p-1").unwrap(),
            last_updated: at(hour),
        }
    }

    fn patient(last_updated: Option<&str>, tag: Option<&str>) -> FhirResource {
        let mut meta = serde_json::Map::new();
        if let Some(ts) = last_updated {
            meta.insert("lastUpdated".into(), json!(ts));
        }
        if let Some(code) = tag {
            meta.insert("tag".into(), json!([{"code": code}]));
        }
        FhirResource::from_value(json!({"resourceType": "Patient", "id": "p-1", "meta": meta}))
            .unwrap()
    }

    #[test]
    fn test_nothing_recorded_is_no_conflict() {
        assert_eq!(classify(None, &patient(Some("2024-03-01T10:00:00Z"), None)), None);
    }

    #[test]
    fn test_missing_last_updated_is_no_conflict() {
        assert_eq!(classify(Some(&recorded(10)), &patient(None, None)), None);
    }

    #[test]
    fn test_not_newer_is_already_processed() {
        let same = patient(Some("2024-03-01T10:00:00Z"), None);
        let older = patient(Some("2024-03-01T09:00:00Z"), None);
        assert_eq!(
            classify(Some(&recorded(10)), &same),
            Some(ConflictKind::AlreadyProcessed)
        );
        assert_eq!(
            classify(Some(&recorded(10)), &older),
            Some(ConflictKind::AlreadyProcessed)
        );
    }

    #[test]
    fn test_newer_with_forward_tag_is_circular() {
        for code in FORWARD_PROVENANCE {
            let resource = patient(Some("2024-03-01T11:00:00Z"), Some(code));
            assert_eq!(
                classify(Some(&recorded(10)), &resource),
                Some(ConflictKind::CircularUpdate)
            );
        }
    }

    #[test]
    fn test_newer_external_edit_proceeds() {
        let resource = patient(Some("2024-03-01T11:00:00Z"), Some("EMR"));
        assert_eq!(classify(Some(&recorded(10)), &resource), None);
    }

    #[tokio::test]
    async fn test_detector_reads_store() {
        let store = Arc::new(InMemoryVersionStore::new());
        store.put(recorded(10)).await;
        let detector = ConflictDetector::new(store);

        let conflict = detector
            .detect(
                &ResourceId::new("p-1").unwrap(),
                &patient(Some("2024-03-01T10:00:00Z"), None),
            )
            .await;
        assert_eq!(conflict, Some(ConflictKind::AlreadyProcessed));
        assert_eq!(
            ConflictResolver.resolve(ConflictKind::CircularUpdate),
            Resolution::Skip
        );
    }
}
