//! UCS client record
//!
//! The canonical patient shape of the legacy clinic registry. The four
//! sub-structures are optional on the type so incomplete input can be
//! represented and rejected by validation; a complete record has all of them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default `source` tag for records produced from the FHIR side
pub const DEFAULT_FHIR_SOURCE: &str = "FHIR";

/// Default `source` tag for records that originate in UCS
pub const DEFAULT_UCS_SOURCE: &str = "UCS";

/// Legacy patient record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UcsClient {
    /// Identifiers (opensrpId is the primary key)
    pub identifiers: Option<Identifiers>,

    /// Demographics
    pub demographics: Option<Demographics>,

    /// Clinical data lists
    #[serde(default)]
    pub clinical_data: ClinicalData,

    /// Record metadata
    pub metadata: Option<ClientMetadata>,
}

impl UcsClient {
    /// The opensrpId, when identifiers are present
    pub fn opensrp_id(&self) -> Option<&str> {
        self.identifiers.as_ref().map(|i| i.opensrp_id.as_str())
    }

    /// The first name, when demographics are present
    pub fn first_name(&self) -> Option<&str> {
        self.demographics.as_ref().map(|d| d.first_name.as_str())
    }
}

/// Client identifiers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifiers {
    /// Globally unique primary key
    pub opensrp_id: String,

    /// National identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
}

/// Client demographics
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub first_name: String,
    pub last_name: String,

    /// `M`, `F` or `O`; anything else is treated as unknown
    #[serde(default)]
    pub gender: Option<String>,

    #[serde(default)]
    pub birth_date: Option<NaiveDate>,

    #[serde(default)]
    pub address: Option<UcsAddress>,
}

/// Client address
///
/// Maps to FHIR as `district -> district`, `ward -> city`, `village -> text`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UcsAddress {
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub ward: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
}

impl UcsAddress {
    /// True when no field carries a non-empty value
    pub fn is_empty(&self) -> bool {
        [&self.district, &self.ward, &self.village]
            .iter()
            .all(|f| f.as_deref().map_or(true, str::is_empty))
    }
}

/// Clinical data attached to a client
///
/// Not populated by either transform direction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClinicalData {
    #[serde(default)]
    pub observations: Vec<serde_json::Value>,
    #[serde(default)]
    pub medications: Vec<serde_json::Value>,
    #[serde(default)]
    pub procedures: Vec<serde_json::Value>,
}

/// Record metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Tag of the originating system
    pub source: String,

    /// Back-reference to the linked FHIR Patient
    #[serde(default)]
    pub fhir_id: Option<String>,
}

/// Gender on the UCS side: a closed three-valued domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyGender {
    Male,
    Female,
    Other,
}

impl LegacyGender {
    /// Single-letter wire code
    pub fn code(&self) -> &'static str {
        match self {
            LegacyGender::Male => "M",
            LegacyGender::Female => "F",
            LegacyGender::Other => "O",
        }
    }
}

impl fmt::Display for LegacyGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LegacyGender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "M" => Ok(LegacyGender::Male),
            "F" => Ok(LegacyGender::Female),
            "O" => Ok(LegacyGender::Other),
            other => Err(format!("Unrecognized UCS gender '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_gender_parse_case_insensitive() {
        assert_eq!("m".parse::<LegacyGender>().unwrap(), LegacyGender::Male);
        assert_eq!("F".parse::<LegacyGender>().unwrap(), LegacyGender::Female);
        assert_eq!(" o ".parse::<LegacyGender>().unwrap(), LegacyGender::Other);
        assert!("X".parse::<LegacyGender>().is_err());
    }

    #[test]
    fn test_address_is_empty() {
        assert!(UcsAddress::default().is_empty());
        assert!(UcsAddress {
            district: Some(String::new()),
            ward: None,
            village: Some(String::new()),
        }
        .is_empty());
        assert!(!UcsAddress {
            ward: Some("Kinondoni".to_string()),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn test_client_serializes_camel_case() {
        let client = UcsClient {
            identifiers: Some(Identifiers {
                opensrp_id: "OPENSRP-1".to_string(),
                national_id: None,
            }),
            ..Default::default()
        };
        let json = serde_json::to_value(&client).unwrap();
        assert_eq!(json["identifiers"]["opensrpId"], "OPENSRP-1");
        assert!(json["identifiers"].get("nationalId").is_none());
        assert!(json.get("clinicalData").is_some());
    }
}
