//! FHIR R4 Patient wire model
//!
//! Only the fields the bridge reads or writes are modelled. Field names follow the
//! FHIR JSON representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier system of the UCS primary key
pub const OPENSRP_ID_SYSTEM: &str = "http://smartbridge.org/fhir/identifier/opensrp-id";

/// Identifier system of the national id
pub const NATIONAL_ID_SYSTEM: &str = "http://smartbridge.org/fhir/identifier/national-id";

/// Code system of provenance tags written into `meta.tag`
pub const PROVENANCE_TAG_SYSTEM: &str = "http://smartbridge.org/fhir/tags/source";

/// Provenance tag code marking data that originated in UCS
pub const PROVENANCE_UCS: &str = "UCS";

/// Provenance tag code marking resources written by the forward ingestion pipeline
pub const PROVENANCE_INGESTION: &str = "smart-bridge-ingestion";

/// [AdministrativeGender](<https://hl7.org/fhir/valueset-administrative-gender.html>)
///
/// `Null` stands for a set but unusable value; unrecognized codes deserialize to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdministrativeGender {
    Male,
    Female,
    Other,
    Unknown,
    #[serde(other)]
    Null,
}

/// [Coding](<https://hl7.org/fhir/datatypes.html#Coding>)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// [Meta](<https://hl7.org/fhir/resource.html#Meta>)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<Coding>,
}

impl Meta {
    /// True if any tag carries one of the given codes
    pub fn has_tag_code(&self, codes: &[&str]) -> bool {
        self.tag
            .iter()
            .filter_map(|t| t.code.as_deref())
            .any(|code| codes.contains(&code))
    }
}

/// [Identifier](<https://hl7.org/fhir/datatypes.html#Identifier>)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// [HumanName](<https://hl7.org/fhir/datatypes.html#HumanName>)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HumanName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub given: Vec<String>,
}

/// [Address](<https://hl7.org/fhir/datatypes.html#Address>)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
}

/// [Patient](<https://hl7.org/fhir/patient.html>)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirPatient {
    #[serde(default = "patient_resource_type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<HumanName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<AdministrativeGender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub address: Vec<Address>,
}

fn patient_resource_type() -> String {
    "Patient".to_string()
}

impl Default for FhirPatient {
    fn default() -> Self {
        Self {
            resource_type: patient_resource_type(),
            id: None,
            meta: None,
            identifier: Vec::new(),
            name: Vec::new(),
            gender: None,
            birth_date: None,
            address: Vec::new(),
        }
    }
}

impl FhirPatient {
    /// Value of the last identifier with the given system
    pub fn identifier_value(&self, system: &str) -> Option<&str> {
        self.identifier
            .iter()
            .filter(|i| i.system.as_deref() == Some(system))
            .last()
            .and_then(|i| i.value.as_deref())
    }

    /// The opensrpId identifier value
    pub fn opensrp_id(&self) -> Option<&str> {
        self.identifier_value(OPENSRP_ID_SYSTEM)
    }

    /// First given name of the first name entry
    pub fn first_given_name(&self) -> Option<&str> {
        self.name
            .first()
            .and_then(|n| n.given.first())
            .map(String::as_str)
    }

    /// `meta.lastUpdated`, if set
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.meta.as_ref().and_then(|m| m.last_updated)
    }

    /// Adds a provenance tag unless an identical code is already present
    pub fn add_provenance_tag(&mut self, code: &str) {
        let meta = self.meta.get_or_insert_with(Meta::default);
        if !meta.has_tag_code(&[code]) {
            meta.tag.push(Coding {
                system: Some(PROVENANCE_TAG_SYSTEM.to_string()),
                code: Some(code.to_string()),
                display: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patient_deserializes_fhir_json() {
        let patient: FhirPatient = serde_json::from_value(json!({
            "resourceType": "Patient",
            "id": "p-1",
            "meta": {"lastUpdated": "2024-03-01T10:00:00Z", "tag": [{"code": "UCS"}]},
            "identifier": [{"system": OPENSRP_ID_SYSTEM, "value": "OPENSRP-1"}],
            "name": [{"family": "Doe", "given": ["John", "Q"]}],
            "gender": "male",
            "birthDate": "1990-05-01"
        }))
        .unwrap();

        assert_eq!(patient.id.as_deref(), Some("p-1"));
        assert_eq!(patient.opensrp_id(), Some("OPENSRP-1"));
        assert_eq!(patient.first_given_name(), Some("John"));
        assert_eq!(patient.gender, Some(AdministrativeGender::Male));
        assert!(patient.meta.as_ref().unwrap().has_tag_code(&[PROVENANCE_UCS]));
        assert!(patient.last_updated().is_some());
    }

    #[test]
    fn test_unrecognized_gender_is_null() {
        let patient: FhirPatient =
            serde_json::from_value(json!({"resourceType": "Patient", "gender": "robot"})).unwrap();
        assert_eq!(patient.gender, Some(AdministrativeGender::Null));

        let unset: FhirPatient = serde_json::from_value(json!({"resourceType": "Patient"})).unwrap();
        assert_eq!(unset.gender, None);
    }

    #[test]
    fn test_add_provenance_tag_is_idempotent() {
        let mut patient = FhirPatient::default();
        patient.add_provenance_tag(PROVENANCE_INGESTION);
        patient.add_provenance_tag(PROVENANCE_INGESTION);
        assert_eq!(patient.meta.unwrap().tag.len(), 1);
    }

    #[test]
    fn test_serialization_omits_empty_fields() {
        let json = serde_json::to_value(FhirPatient::default()).unwrap();
        assert_eq!(json, json!({"resourceType": "Patient"}));
    }
}
