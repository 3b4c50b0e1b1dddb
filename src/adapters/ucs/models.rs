//! Wire models of the UCS (OpenSRP) REST API
//!
//! The registry exposes clients in the OpenSRP shape: flat names, an identifier
//! map and a list of addresses with free-form `addressFields`. [`UcsFeedRecord`]
//! mirrors that shape and [`UcsFeedRecord::to_client`] maps it onto the
//! canonical [`UcsClient`].

use crate::domain::{
    BridgeError, ClientMetadata, Demographics, Identifiers, Result, ServerVersion, UcsAddress,
    UcsClient,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key of the opensrpId in the feed identifier map
pub const OPENSRP_ID_KEY: &str = "opensrp_id";

/// Key of the national id in the feed identifier map
pub const NATIONAL_ID_KEY: &str = "national_id";

/// A client record as returned by the registry change feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UcsFeedRecord {
    /// Registry entity id
    pub base_entity_id: String,

    #[serde(default)]
    pub first_name: Option<String>,

    #[serde(default)]
    pub last_name: Option<String>,

    /// Free-form gender (`Male`, `F`, ...)
    #[serde(default)]
    pub gender: Option<String>,

    /// Date or date-time string; only the date part is used
    #[serde(default)]
    pub birthdate: Option<String>,

    #[serde(default)]
    pub identifiers: BTreeMap<String, String>,

    #[serde(default)]
    pub addresses: Vec<FeedAddress>,

    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,

    #[serde(default)]
    pub date_edited: Option<DateTime<Utc>>,

    /// Position of this record in the change feed
    pub server_version: ServerVersion,
}

/// Address entry of a feed record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedAddress {
    #[serde(default)]
    pub address_type: Option<String>,

    /// `district`, `ward` and `village` are read from here
    #[serde(default)]
    pub address_fields: BTreeMap<String, String>,
}

/// Envelope of `GET /clients/sync`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangePage {
    #[serde(default)]
    pub clients: Vec<UcsFeedRecord>,
}

impl UcsFeedRecord {
    /// Maps the feed record to a canonical client tagged with `source`
    ///
    /// The opensrpId comes from the identifier map and falls back to the
    /// entity id. Names are copied as-is; completeness is checked later by the
    /// forward transformer.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Validation` if the birthdate cannot be parsed.
    pub fn to_client(&self, source: &str) -> Result<UcsClient> {
        let opensrp_id = self
            .identifiers
            .get(OPENSRP_ID_KEY)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| self.base_entity_id.clone());

        let birth_date = match self.birthdate.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(parse_feed_date(raw).ok_or_else(|| {
                BridgeError::Validation(format!(
                    "Client {} has an unparseable birthdate '{}'",
                    self.base_entity_id, raw
                ))
            })?),
            None => None,
        };

        let address = self
            .addresses
            .first()
            .map(|a| UcsAddress {
                district: a.address_fields.get("district").cloned(),
                ward: a.address_fields.get("ward").cloned(),
                village: a.address_fields.get("village").cloned(),
            })
            .filter(|a| !a.is_empty());

        let now = Utc::now();
        let created_at = self.date_created.unwrap_or(now);

        Ok(UcsClient {
            identifiers: Some(Identifiers {
                opensrp_id,
                national_id: self.identifiers.get(NATIONAL_ID_KEY).cloned(),
            }),
            demographics: Some(Demographics {
                first_name: self.first_name.clone().unwrap_or_default(),
                last_name: self.last_name.clone().unwrap_or_default(),
                gender: self.gender.as_deref().map(normalize_feed_gender),
                birth_date,
                address,
            }),
            clinical_data: Default::default(),
            metadata: Some(ClientMetadata {
                created_at,
                updated_at: self.date_edited.unwrap_or(created_at),
                source: source.to_string(),
                fhir_id: None,
            }),
        })
    }
}

/// Collapses spelled-out genders to the single-letter codes
fn normalize_feed_gender(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "m" | "male" => "M".to_string(),
        "f" | "female" => "F".to_string(),
        "o" | "other" => "O".to_string(),
        _ => raw.trim().to_string(),
    }
}

fn parse_feed_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feed_record() -> UcsFeedRecord {
        serde_json::from_value(json!({
            "baseEntityId": "be-1",
            "firstName": "John",
            "lastName": "Doe",
            "gender": "Male",
            "birthdate": "1990-05-01T00:00:00.000+03:00",
            "identifiers": {"opensrp_id": "OPENSRP-1", "national_id": "NID-7"},
            "addresses": [{
                "addressType": "usual_residence",
                "addressFields": {"district": "Dar es Salaam", "ward": "Kinondoni", "village": "Mwenge"}
            }],
            "dateCreated": "2024-01-01T08:00:00Z",
            "serverVersion": 1700
        }))
        .unwrap()
    }

    #[test]
    fn test_to_client_maps_all_fields() {
        let client = feed_record().to_client("UCS").unwrap();

        let ids = client.identifiers.as_ref().unwrap();
        assert_eq!(ids.opensrp_id, "OPENSRP-1");
        assert_eq!(ids.national_id.as_deref(), Some("NID-7"));

        let demo = client.demographics.as_ref().unwrap();
        assert_eq!(demo.gender.as_deref(), Some("M"));
        assert_eq!(demo.birth_date, NaiveDate::from_ymd_opt(1990, 5, 1));
        assert_eq!(
            demo.address.as_ref().unwrap().ward.as_deref(),
            Some("Kinondoni")
        );

        let meta = client.metadata.unwrap();
        assert_eq!(meta.source, "UCS");
        assert_eq!(meta.created_at, meta.updated_at);
    }

    #[test]
    fn test_to_client_falls_back_to_entity_id() {
        let mut record = feed_record();
        record.identifiers.clear();
        let client = record.to_client("UCS").unwrap();
        assert_eq!(client.opensrp_id(), Some("be-1"));
    }

    #[test]
    fn test_to_client_rejects_bad_birthdate() {
        let mut record = feed_record();
        record.birthdate = Some("01/05/1990".to_string());
        assert!(record.to_client("UCS").is_err());
    }

    #[test]
    fn test_unknown_gender_is_kept_verbatim() {
        assert_eq!(normalize_feed_gender("female"), "F");
        assert_eq!(normalize_feed_gender(" x "), "x");
    }

    #[test]
    fn test_change_page_defaults_to_empty() {
        let page: ChangePage = serde_json::from_value(json!({})).unwrap();
        assert!(page.clients.is_empty());
    }
}
