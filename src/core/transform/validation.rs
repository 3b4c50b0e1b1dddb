//! Structural validators for both record shapes
//!
//! Validators are pure: they inspect a record and report every problem found
//! in a single message.

use super::parse_birth_date;
use crate::domain::{FhirPatient, LegacyGender, UcsClient, OPENSRP_ID_SYSTEM};
use chrono::{NaiveDate, Utc};

/// Result of validating one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub error_message: Option<String>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error_message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error_message: Some(message.into()),
        }
    }

    fn from_errors(errors: Vec<String>) -> Self {
        if errors.is_empty() {
            Self::valid()
        } else {
            Self::invalid(errors.join("; "))
        }
    }
}

/// Validates a record of type `T`
pub trait RecordValidator<T>: Send + Sync {
    fn validate(&self, record: &T) -> ValidationOutcome;
}

/// Legacy-side structural rules
#[derive(Debug, Clone, Copy, Default)]
pub struct UcsClientValidator;

impl RecordValidator<UcsClient> for UcsClientValidator {
    fn validate(&self, record: &UcsClient) -> ValidationOutcome {
        let mut errors = Vec::new();

        match &record.identifiers {
            None => errors.push("identifiers are required".to_string()),
            Some(ids) if ids.opensrp_id.trim().is_empty() => {
                errors.push("opensrpId must not be empty".to_string())
            }
            Some(_) => {}
        }

        match &record.demographics {
            None => errors.push("demographics are required".to_string()),
            Some(demo) => {
                if demo.first_name.trim().is_empty() {
                    errors.push("firstName must not be empty".to_string());
                }
                if demo.last_name.trim().is_empty() {
                    errors.push("lastName must not be empty".to_string());
                }
                if let Some(gender) = &demo.gender {
                    if gender.parse::<LegacyGender>().is_err() {
                        errors.push(format!("gender '{gender}' must be one of M, F, O"));
                    }
                }
            }
        }

        match &record.metadata {
            None => errors.push("metadata is required".to_string()),
            Some(meta) if meta.source.trim().is_empty() => {
                errors.push("metadata.source must not be empty".to_string())
            }
            Some(_) => {}
        }

        ValidationOutcome::from_errors(errors)
    }
}

/// FHIR-side rules for the fields the bridge writes
#[derive(Debug, Clone, Copy, Default)]
pub struct PatientValidator;

impl RecordValidator<FhirPatient> for PatientValidator {
    fn validate(&self, patient: &FhirPatient) -> ValidationOutcome {
        let mut errors = Vec::new();

        if let Some(id) = &patient.id {
            if !is_valid_fhir_id(id) {
                errors.push(format!("id '{id}' is not a valid FHIR id"));
            }
        }

        if patient
            .opensrp_id()
            .map_or(true, |v| v.trim().is_empty())
        {
            errors.push(format!("identifier with system {OPENSRP_ID_SYSTEM} is required"));
        }
        for (index, identifier) in patient.identifier.iter().enumerate() {
            let has_system = identifier.system.as_deref().is_some_and(|s| !s.is_empty());
            let has_value = identifier.value.as_deref().is_some_and(|v| !v.is_empty());
            if !has_system || !has_value {
                errors.push(format!("identifier[{index}] needs both system and value"));
            }
        }

        let named = patient.name.iter().any(|n| {
            n.family.as_deref().is_some_and(|f| !f.trim().is_empty())
                && n.given.iter().any(|g| !g.trim().is_empty())
        });
        if !named {
            errors.push("a name with family and given parts is required".to_string());
        }

        if patient.gender.is_none() {
            errors.push("gender is required".to_string());
        }

        if let Some(birth_date) = &patient.birth_date {
            match parse_fhir_date(birth_date) {
                None => errors.push(format!("birthDate '{birth_date}' is not a valid date")),
                Some(date) if date > Utc::now().date_naive() => {
                    errors.push(format!("birthDate {birth_date} is in the future"))
                }
                Some(_) => {}
            }
        }

        ValidationOutcome::from_errors(errors)
    }
}

/// `[A-Za-z0-9\-\.]{1,64}`
fn is_valid_fhir_id(id: &str) -> bool {
    (1..=64).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// FHIR dates may be partial (`YYYY`, `YYYY-MM`)
fn parse_fhir_date(raw: &str) -> Option<NaiveDate> {
    match raw.len() {
        4 => NaiveDate::parse_from_str(&format!("{raw}-01-01"), "%Y-%m-%d").ok(),
        7 => NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d").ok(),
        _ => parse_birth_date(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AdministrativeGender, ClientMetadata, Demographics, HumanName, Identifier, Identifiers,
    };

    fn valid_client() -> UcsClient {
        UcsClient {
            identifiers: Some(Identifiers {
                opensrp_id: "OPENSRP-1".into(),
                national_id: None,
            }),
            demographics: Some(Demographics {
                first_name: "Amina".into(),
                last_name: "Mushi".into(),
                gender: Some("F".into()),
                ..Default::default()
            }),
            clinical_data: Default::default(),
            metadata: Some(ClientMetadata {
                created_at: Utc::now(),
                updated_at: Utc::now(),
                source: "FHIR".into(),
                fhir_id: None,
            }),
        }
    }

    fn valid_patient() -> FhirPatient {
        FhirPatient {
            id: Some("p-1".into()),
            identifier: vec![Identifier {
                system: Some(OPENSRP_ID_SYSTEM.into()),
                value: Some("OPENSRP-1".into()),
            }],
            name: vec![HumanName {
                family: Some("Mushi".into()),
                given: vec!["Amina".into()],
            }],
            gender: Some(AdministrativeGender::Female),
            birth_date: Some("1992-02-29".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_client_passes() {
        assert!(UcsClientValidator.validate(&valid_client()).valid);
    }

    #[test]
    fn test_client_gender_is_optional_but_closed() {
        let mut client = valid_client();
        client.demographics.as_mut().unwrap().gender = None;
        assert!(UcsClientValidator.validate(&client).valid);

        client.demographics.as_mut().unwrap().gender = Some("Z".into());
        let outcome = UcsClientValidator.validate(&client);
        assert!(!outcome.valid);
        assert!(outcome.error_message.unwrap().contains("gender"));
    }

    #[test]
    fn test_client_reports_all_problems() {
        let outcome = UcsClientValidator.validate(&UcsClient::default());
        let message = outcome.error_message.unwrap();
        assert!(message.contains("identifiers"));
        assert!(message.contains("demographics"));
        assert!(message.contains("metadata"));
    }

    #[test]
    fn test_valid_patient_passes() {
        assert_eq!(
            PatientValidator.validate(&valid_patient()),
            ValidationOutcome::valid()
        );
    }

    #[test]
    fn test_patient_future_birth_date_fails() {
        let mut patient = valid_patient();
        patient.birth_date = Some("2999-01-01".into());
        assert!(!PatientValidator.validate(&patient).valid);
    }

    #[test]
    fn test_patient_partial_birth_date_passes() {
        let mut patient = valid_patient();
        patient.birth_date = Some("1992".into());
        assert!(PatientValidator.validate(&patient).valid);
    }

    #[test]
    fn test_patient_identifier_without_system_fails() {
        let mut patient = valid_patient();
        patient.identifier.push(Identifier {
            system: None,
            value: Some("loose".into()),
        });
        let outcome = PatientValidator.validate(&patient);
        assert!(outcome.error_message.unwrap().contains("identifier[1]"));
    }

    #[test]
    fn test_fhir_id_grammar() {
        assert!(is_valid_fhir_id("abc-123.x"));
        assert!(!is_valid_fhir_id("has space"));
        assert!(!is_valid_fhir_id(""));
        assert!(!is_valid_fhir_id(&"a".repeat(65)));
    }
}
