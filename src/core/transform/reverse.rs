//! FHIR Patient to UCS client record

use super::validation::{RecordValidator, UcsClientValidator};
use super::{fhir_to_legacy_gender, parse_birth_date};
use crate::domain::client::DEFAULT_FHIR_SOURCE;
use crate::domain::{
    ClientMetadata, Demographics, FhirPatient, FhirResource, Identifiers, TransformError,
    TransformErrorCode, UcsAddress, UcsClient, NATIONAL_ID_SYSTEM, OPENSRP_ID_SYSTEM,
};
use chrono::Utc;

/// Maps FHIR Patients back to legacy records
///
/// Only Patient resources are accepted. When a system appears on several
/// identifiers the last one wins; only the first name entry, its first given
/// name and the first address are read.
#[derive(Debug, Clone, Default)]
pub struct ReverseTransformer {
    validator: UcsClientValidator,
}

impl ReverseTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transforms `resource`, tagging the record with `source` (default `FHIR`)
    pub fn transform(
        &self,
        resource: &FhirResource,
        source: Option<&str>,
    ) -> Result<UcsClient, TransformError> {
        let patient = match resource {
            FhirResource::Patient(patient) => patient,
            FhirResource::Other(other) => {
                return Err(TransformError::new(
                    TransformErrorCode::UnsupportedResourceType,
                    format!("Cannot transform {} to a UCS client", other.resource_type),
                ))
            }
        };

        let client = self.map_patient(patient, source)?;

        let outcome = self.validator.validate(&client);
        if !outcome.valid {
            return Err(TransformError::new(
                TransformErrorCode::ValidationFailed,
                outcome
                    .error_message
                    .unwrap_or_else(|| "Client failed validation".to_string()),
            ));
        }
        Ok(client)
    }

    fn map_patient(
        &self,
        patient: &FhirPatient,
        source: Option<&str>,
    ) -> Result<UcsClient, TransformError> {
        if patient.identifier.is_empty() {
            return Err(TransformError::new(
                TransformErrorCode::MissingIdentifier,
                "Patient has no identifiers",
            ));
        }
        let opensrp_id = patient
            .identifier_value(OPENSRP_ID_SYSTEM)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                TransformError::new(
                    TransformErrorCode::MissingOpensrpId,
                    format!("Patient has no identifier with system {OPENSRP_ID_SYSTEM}"),
                )
            })?;
        let national_id = patient
            .identifier_value(NATIONAL_ID_SYSTEM)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let name = patient.name.first().ok_or_else(|| {
            TransformError::new(TransformErrorCode::MissingName, "Patient has no name")
        })?;
        let first_name = name
            .given
            .first()
            .filter(|g| !g.is_empty())
            .ok_or_else(|| {
                TransformError::new(
                    TransformErrorCode::MissingGivenName,
                    format!("Patient {opensrp_id} has no given name"),
                )
            })?;
        let last_name = name
            .family
            .as_deref()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| {
                TransformError::new(
                    TransformErrorCode::MissingFamilyName,
                    format!("Patient {opensrp_id} has no family name"),
                )
            })?;

        // Unset is an error; an explicit unknown/null becomes an absent gender
        let gender = patient.gender.ok_or_else(|| {
            TransformError::new(
                TransformErrorCode::MissingGender,
                format!("Patient {opensrp_id} has no gender"),
            )
        })?;

        let birth_date = match patient.birth_date.as_deref() {
            Some(raw) => Some(parse_birth_date(raw).ok_or_else(|| {
                TransformError::wrap(
                    format!("Patient {opensrp_id} has an unparseable birthDate"),
                    raw,
                )
            })?),
            None => None,
        };

        let address = patient
            .address
            .first()
            .map(|a| UcsAddress {
                district: a.district.clone().filter(|v| !v.is_empty()),
                ward: a.city.clone().filter(|v| !v.is_empty()),
                village: a.text.clone().filter(|v| !v.is_empty()),
            })
            .filter(|a| !a.is_empty());

        let now = Utc::now();
        let source = source
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_FHIR_SOURCE);

        Ok(UcsClient {
            identifiers: Some(Identifiers {
                opensrp_id: opensrp_id.to_string(),
                national_id,
            }),
            demographics: Some(Demographics {
                first_name: first_name.clone(),
                last_name: last_name.to_string(),
                gender: fhir_to_legacy_gender(gender).map(|g| g.code().to_string()),
                birth_date,
                address,
            }),
            clinical_data: Default::default(),
            metadata: Some(ClientMetadata {
                created_at: now,
                updated_at: patient.last_updated().unwrap_or(now),
                source: source.to_string(),
                fhir_id: patient.id.clone(),
            }),
        })
    }
}
