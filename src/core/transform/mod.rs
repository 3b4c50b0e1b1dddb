//! Record transformation between the UCS and FHIR models
//!
//! - [`ForwardTransformer`] - UCS client record to FHIR Patient
//! - [`ReverseTransformer`] - FHIR Patient to UCS client record
//! - [`validation`] - structural validators for both shapes
//!
//! Both directions fail with a [`TransformError`](crate::domain::TransformError)
//! carrying a named code. The join key between the models is the opensrpId,
//! carried as an identifier with system [`OPENSRP_ID_SYSTEM`](crate::domain::OPENSRP_ID_SYSTEM).
//!
//! ```
//! use smart_bridge::core::transform::{ForwardTransformer, ReverseTransformer};
//! use smart_bridge::domain::{Demographics, FhirResource, Identifiers, UcsClient};
//!
//! let client = UcsClient {
//!     identifiers: Some(Identifiers { opensrp_id: "OPENSRP-1".into(), national_id: None }),
//!     demographics: Some(Demographics {
//!         first_name: "John".into(),
//!         last_name: "Doe".into(),
//!         gender: Some("M".into()),
//!         ..Default::default()
//!     }),
//!     ..Default::default()
//! };
//!
//! let forward = ForwardTransformer::new().transform(&client).unwrap();
//! let back = ReverseTransformer::new()
//!     .transform(&FhirResource::from(forward.resource), None)
//!     .unwrap();
//! assert_eq!(back.opensrp_id(), Some("OPENSRP-1"));
//! ```

pub mod forward;
pub mod reverse;
pub mod validation;

pub use forward::ForwardTransformer;
pub use reverse::ReverseTransformer;
pub use validation::{PatientValidator, RecordValidator, UcsClientValidator, ValidationOutcome};

use crate::domain::{AdministrativeGender, LegacyGender};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// `M/F/O` (any case) to FHIR; anything else is `unknown`
pub fn legacy_to_fhir_gender(code: &str) -> AdministrativeGender {
    match code.parse::<LegacyGender>() {
        Ok(LegacyGender::Male) => AdministrativeGender::Male,
        Ok(LegacyGender::Female) => AdministrativeGender::Female,
        Ok(LegacyGender::Other) => AdministrativeGender::Other,
        Err(_) => AdministrativeGender::Unknown,
    }
}

/// FHIR to `M/F/O`; `unknown` and `null` have no legacy counterpart
pub fn fhir_to_legacy_gender(gender: AdministrativeGender) -> Option<LegacyGender> {
    match gender {
        AdministrativeGender::Male => Some(LegacyGender::Male),
        AdministrativeGender::Female => Some(LegacyGender::Female),
        AdministrativeGender::Other => Some(LegacyGender::Other),
        AdministrativeGender::Unknown | AdministrativeGender::Null => None,
    }
}

/// Parses a birth date given as `YYYY-MM-DD`, an RFC 3339 date-time or a
/// SQL timestamp `YYYY-MM-DD HH:MM:SS[.fff]`
pub fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
                .ok()
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("M", AdministrativeGender::Male ; "upper m")]
    #[test_case("f", AdministrativeGender::Female ; "lower f")]
    #[test_case("O", AdministrativeGender::Other ; "other")]
    #[test_case("X", AdministrativeGender::Unknown ; "unrecognized")]
    #[test_case("", AdministrativeGender::Unknown ; "empty")]
    fn test_legacy_to_fhir_gender(code: &str, expected: AdministrativeGender) {
        assert_eq!(legacy_to_fhir_gender(code), expected);
    }

    #[test_case(AdministrativeGender::Male, Some(LegacyGender::Male) ; "male")]
    #[test_case(AdministrativeGender::Female, Some(LegacyGender::Female) ; "female")]
    #[test_case(AdministrativeGender::Other, Some(LegacyGender::Other) ; "other")]
    #[test_case(AdministrativeGender::Unknown, None ; "unknown is absent")]
    #[test_case(AdministrativeGender::Null, None ; "null is absent")]
    fn test_fhir_to_legacy_gender(gender: AdministrativeGender, expected: Option<LegacyGender>) {
        assert_eq!(fhir_to_legacy_gender(gender), expected);
    }

    #[test_case("1990-05-01" ; "plain date")]
    #[test_case("1990-05-01T00:00:00+03:00" ; "rfc3339")]
    #[test_case("1990-05-01 00:00:00" ; "sql timestamp")]
    #[test_case("1990-05-01 13:45:10.250" ; "sql timestamp with fraction")]
    fn test_parse_birth_date_formats(raw: &str) {
        assert_eq!(parse_birth_date(raw), NaiveDate::from_ymd_opt(1990, 5, 1));
    }

    #[test]
    fn test_parse_birth_date_rejects_garbage() {
        assert_eq!(parse_birth_date("01/05/1990"), None);
        assert_eq!(parse_birth_date(""), None);
    }
}
