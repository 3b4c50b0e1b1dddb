//! Generic FHIR resources and the wrapped form produced by transformations

use super::patient::{FhirPatient, Meta};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// FHIR resource types the bridge knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Patient,
    Observation,
    Encounter,
    Condition,
    MedicationRequest,
}

impl ResourceKind {
    /// FHIR `resourceType` string
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Patient => "Patient",
            ResourceKind::Observation => "Observation",
            ResourceKind::Encounter => "Encounter",
            ResourceKind::Condition => "Condition",
            ResourceKind::MedicationRequest => "MedicationRequest",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Patient" => Ok(ResourceKind::Patient),
            "Observation" => Ok(ResourceKind::Observation),
            "Encounter" => Ok(ResourceKind::Encounter),
            "Condition" => Ok(ResourceKind::Condition),
            "MedicationRequest" => Ok(ResourceKind::MedicationRequest),
            other => Err(format!("Unknown FHIR resource type '{other}'")),
        }
    }
}

/// Write operation performed against a backing system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Create,
    Update,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "CREATE",
            OperationKind::Update => "UPDATE",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource of a type other than Patient, kept as raw JSON
#[derive(Debug, Clone, PartialEq)]
pub struct OtherResource {
    pub resource_type: String,
    pub id: Option<String>,
    pub meta: Option<Meta>,
    pub body: Value,
}

/// Any FHIR resource delivered to the bridge
#[derive(Debug, Clone, PartialEq)]
pub enum FhirResource {
    Patient(FhirPatient),
    Other(OtherResource),
}

impl FhirResource {
    /// Parses a resource from FHIR JSON, dispatching on `resourceType`
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let resource_type = value
            .get("resourceType")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| serde::de::Error::missing_field("resourceType"))?;

        if resource_type == ResourceKind::Patient.as_str() {
            return serde_json::from_value(value).map(FhirResource::Patient);
        }

        let id = value.get("id").and_then(Value::as_str).map(str::to_string);
        let meta = match value.get("meta") {
            Some(meta) => Some(serde_json::from_value(meta.clone())?),
            None => None,
        };
        Ok(FhirResource::Other(OtherResource {
            resource_type,
            id,
            meta,
            body: value,
        }))
    }

    /// Serializes back to FHIR JSON
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            FhirResource::Patient(patient) => serde_json::to_value(patient),
            FhirResource::Other(other) => Ok(other.body.clone()),
        }
    }

    /// The `resourceType` string
    pub fn resource_type(&self) -> &str {
        match self {
            FhirResource::Patient(p) => &p.resource_type,
            FhirResource::Other(o) => &o.resource_type,
        }
    }

    /// The known kind, or `None` for types the bridge does not model
    pub fn kind(&self) -> Option<ResourceKind> {
        self.resource_type().parse().ok()
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            FhirResource::Patient(p) => p.id.as_deref(),
            FhirResource::Other(o) => o.id.as_deref(),
        }
    }

    pub fn meta(&self) -> Option<&Meta> {
        match self {
            FhirResource::Patient(p) => p.meta.as_ref(),
            FhirResource::Other(o) => o.meta.as_ref(),
        }
    }

    /// `meta.lastUpdated`, if set
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.meta().and_then(|m| m.last_updated)
    }

    pub fn as_patient(&self) -> Option<&FhirPatient> {
        match self {
            FhirResource::Patient(p) => Some(p),
            FhirResource::Other(_) => None,
        }
    }
}

impl From<FhirPatient> for FhirResource {
    fn from(patient: FhirPatient) -> Self {
        FhirResource::Patient(patient)
    }
}

impl Serialize for FhirResource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FhirResource::Patient(patient) => patient.serialize(serializer),
            FhirResource::Other(other) => other.body.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FhirResource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        FhirResource::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// A transformation output wrapped with provenance metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformedResource<T> {
    pub resource: T,
    pub source_system: String,
    pub original_id: String,
    pub transformed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_patient() {
        let resource = FhirResource::from_value(json!({
            "resourceType": "Patient",
            "id": "p-9",
            "gender": "female"
        }))
        .unwrap();
        assert_eq!(resource.kind(), Some(ResourceKind::Patient));
        assert_eq!(resource.id(), Some("p-9"));
        assert!(resource.as_patient().is_some());
    }

    #[test]
    fn test_from_value_other_keeps_meta() {
        let resource = FhirResource::from_value(json!({
            "resourceType": "Observation",
            "id": "obs-1",
            "meta": {"lastUpdated": "2024-01-01T00:00:00Z"},
            "status": "final"
        }))
        .unwrap();
        assert_eq!(resource.kind(), Some(ResourceKind::Observation));
        assert!(resource.last_updated().is_some());
        assert_eq!(resource.to_value().unwrap()["status"], "final");
    }

    #[test]
    fn test_from_value_unknown_type() {
        let resource =
            FhirResource::from_value(json!({"resourceType": "Basic", "id": "b-1"})).unwrap();
        assert_eq!(resource.kind(), None);
        assert_eq!(resource.resource_type(), "Basic");
    }

    #[test]
    fn test_from_value_requires_resource_type() {
        assert!(FhirResource::from_value(json!({"id": "x"})).is_err());
    }

    #[test]
    fn test_operation_kind_display() {
        assert_eq!(OperationKind::Create.to_string(), "CREATE");
        assert_eq!(
            serde_json::to_value(OperationKind::Update).unwrap(),
            json!("UPDATE")
        );
    }
}
