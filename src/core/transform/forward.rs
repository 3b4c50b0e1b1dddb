//! UCS client record to FHIR Patient

use super::legacy_to_fhir_gender;
use super::validation::{PatientValidator, RecordValidator};
use crate::domain::client::DEFAULT_UCS_SOURCE;
use crate::domain::{
    Address, FhirPatient, HumanName, Identifier, TransformError, TransformErrorCode,
    TransformedResource, UcsClient, NATIONAL_ID_SYSTEM, OPENSRP_ID_SYSTEM,
};
use chrono::Utc;

/// Maps legacy records to FHIR Patients
///
/// Required fields are checked before any mapping, in this order:
/// identifiers, opensrpId, demographics, first name, last name, gender. The
/// mapped Patient is then validated; either failure rejects the whole record.
#[derive(Debug, Clone, Default)]
pub struct ForwardTransformer {
    validator: PatientValidator,
}

impl ForwardTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transform(
        &self,
        client: &UcsClient,
    ) -> Result<TransformedResource<FhirPatient>, TransformError> {
        let identifiers = client.identifiers.as_ref().ok_or_else(|| {
            TransformError::new(
                TransformErrorCode::MissingIdentifier,
                "Client record has no identifiers",
            )
        })?;
        let opensrp_id = identifiers.opensrp_id.trim();
        if opensrp_id.is_empty() {
            return Err(TransformError::new(
                TransformErrorCode::MissingOpensrpId,
                "Client record has an empty opensrpId",
            ));
        }

        let demographics = client.demographics.as_ref().ok_or_else(|| {
            TransformError::new(
                TransformErrorCode::MissingDemographics,
                format!("Client {opensrp_id} has no demographics"),
            )
        })?;
        if demographics.first_name.trim().is_empty() {
            return Err(TransformError::new(
                TransformErrorCode::MissingGivenName,
                format!("Client {opensrp_id} has no first name"),
            ));
        }
        if demographics.last_name.trim().is_empty() {
            return Err(TransformError::new(
                TransformErrorCode::MissingFamilyName,
                format!("Client {opensrp_id} has no last name"),
            ));
        }
        let gender = demographics
            .gender
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .ok_or_else(|| {
                TransformError::new(
                    TransformErrorCode::MissingGender,
                    format!("Client {opensrp_id} has no gender"),
                )
            })?;

        let mut identifier = vec![Identifier {
            system: Some(OPENSRP_ID_SYSTEM.to_string()),
            value: Some(opensrp_id.to_string()),
        }];
        if let Some(national_id) = identifiers
            .national_id
            .as_deref()
            .filter(|n| !n.trim().is_empty())
        {
            identifier.push(Identifier {
                system: Some(NATIONAL_ID_SYSTEM.to_string()),
                value: Some(national_id.to_string()),
            });
        }

        let address = demographics
            .address
            .as_ref()
            .map(|a| Address {
                district: non_empty(&a.district),
                city: non_empty(&a.ward),
                text: non_empty(&a.village),
            })
            .into_iter()
            .collect();

        let patient = FhirPatient {
            identifier,
            name: vec![HumanName {
                family: Some(demographics.last_name.clone()),
                given: vec![demographics.first_name.clone()],
            }],
            gender: Some(legacy_to_fhir_gender(gender)),
            birth_date: demographics
                .birth_date
                .map(|d| d.format("%Y-%m-%d").to_string()),
            address,
            ..Default::default()
        };

        let outcome = self.validator.validate(&patient);
        if !outcome.valid {
            return Err(TransformError::new(
                TransformErrorCode::ValidationFailed,
                outcome
                    .error_message
                    .unwrap_or_else(|| "Patient failed validation".to_string()),
            ));
        }

        let source_system = client
            .metadata
            .as_ref()
            .map(|m| m.source.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_UCS_SOURCE)
            .to_string();

        tracing::trace!(opensrp_id = %opensrp_id, "Forward transformation complete");

        Ok(TransformedResource {
            resource: patient,
            source_system,
            original_id: opensrp_id.to_string(),
            transformed_at: Utc::now(),
        })
    }
}

fn non_empty(field: &Option<String>) -> Option<String> {
    field.as_ref().filter(|v| !v.is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AdministrativeGender, Demographics, Identifiers, UcsAddress};
    use chrono::NaiveDate;

    fn client() -> UcsClient {
        UcsClient {
            identifiers: Some(Identifiers {
                opensrp_id: "OPENSRP-1".into(),
                national_id: Some("NID-42".into()),
            }),
            demographics: Some(Demographics {
                first_name: "John".into(),
                last_name: "Doe".into(),
                gender: Some("M".into()),
                birth_date: NaiveDate::from_ymd_opt(1985, 7, 14),
                address: Some(UcsAddress {
                    district: Some("Dar es Salaam".into()),
                    ward: Some("Kinondoni".into()),
                    village: Some("Mwenge".into()),
                }),
            }),
            ..Default::default()
        }
    }

    fn code_of(client: &UcsClient) -> TransformErrorCode {
        ForwardTransformer::new().transform(client).unwrap_err().code
    }

    #[test]
    fn test_maps_identifiers_name_gender_and_address() {
        let out = ForwardTransformer::new().transform(&client()).unwrap();
        let patient = out.resource;

        assert_eq!(out.original_id, "OPENSRP-1");
        assert_eq!(out.source_system, "UCS");
        assert_eq!(patient.opensrp_id(), Some("OPENSRP-1"));
        assert_eq!(patient.identifier_value(NATIONAL_ID_SYSTEM), Some("NID-42"));
        assert_eq!(patient.name[0].family.as_deref(), Some("Doe"));
        assert_eq!(patient.first_given_name(), Some("John"));
        assert_eq!(patient.gender, Some(AdministrativeGender::Male));
        assert_eq!(patient.birth_date.as_deref(), Some("1985-07-14"));
        assert_eq!(
            patient.address,
            vec![Address {
                district: Some("Dar es Salaam".into()),
                city: Some("Kinondoni".into()),
                text: Some("Mwenge".into()),
            }]
        );
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let mut c = client();
        c.identifiers.as_mut().unwrap().national_id = None;
        let demo = c.demographics.as_mut().unwrap();
        demo.address = None;
        demo.birth_date = None;

        let patient = ForwardTransformer::new().transform(&c).unwrap().resource;
        assert_eq!(patient.identifier.len(), 1);
        assert!(patient.address.is_empty());
        assert!(patient.birth_date.is_none());
    }

    #[test]
    fn test_unrecognized_gender_maps_to_unknown() {
        let mut c = client();
        c.demographics.as_mut().unwrap().gender = Some("x".into());
        let patient = ForwardTransformer::new().transform(&c).unwrap().resource;
        assert_eq!(patient.gender, Some(AdministrativeGender::Unknown));
    }

    #[test]
    fn test_required_fields_fail_with_named_codes() {
        let mut c = client();
        c.identifiers = None;
        assert_eq!(code_of(&c), TransformErrorCode::MissingIdentifier);

        let mut c = client();
        c.identifiers.as_mut().unwrap().opensrp_id = " ".into();
        assert_eq!(code_of(&c), TransformErrorCode::MissingOpensrpId);

        let mut c = client();
        c.demographics = None;
        assert_eq!(code_of(&c), TransformErrorCode::MissingDemographics);

        let mut c = client();
        c.demographics.as_mut().unwrap().first_name.clear();
        assert_eq!(code_of(&c), TransformErrorCode::MissingGivenName);

        let mut c = client();
        c.demographics.as_mut().unwrap().last_name.clear();
        assert_eq!(code_of(&c), TransformErrorCode::MissingFamilyName);

        let mut c = client();
        c.demographics.as_mut().unwrap().gender = None;
        assert_eq!(code_of(&c), TransformErrorCode::MissingGender);
    }

    #[test]
    fn test_future_birth_date_fails_validation() {
        let mut c = client();
        c.demographics.as_mut().unwrap().birth_date = NaiveDate::from_ymd_opt(2999, 1, 1);
        let err = ForwardTransformer::new().transform(&c).unwrap_err();
        assert_eq!(err.code, TransformErrorCode::ValidationFailed);
        assert!(err.message.contains("future"));
    }
}
