//! FHIR search Bundle
//!
//! Only what is needed to walk search results and input files: entries and
//! the `next` paging link.

use crate::domain::FhirResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// [Bundle](<https://hl7.org/fhir/bundle.html>)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub link: Vec<BundleLink>,
    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    #[serde(default)]
    pub full_url: Option<String>,
    #[serde(default)]
    pub resource: Option<FhirResource>,
}

impl Bundle {
    /// URL of the next search page, if any
    pub fn next_url(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.relation == "next")
            .map(|l| l.url.as_str())
    }

    /// Takes the entry resources, dropping entries without one
    pub fn into_resources(self) -> Vec<FhirResource> {
        self.entry.into_iter().filter_map(|e| e.resource).collect()
    }
}

/// Reads resources from JSON holding a Bundle, an array, or a single resource
///
/// # Errors
///
/// Returns the parse error of the first malformed resource.
pub fn resources_from_json(value: Value) -> Result<Vec<FhirResource>, serde_json::Error> {
    match value {
        Value::Array(items) => items.into_iter().map(FhirResource::from_value).collect(),
        Value::Object(ref obj)
            if obj.get("resourceType").and_then(Value::as_str) == Some("Bundle") =>
        {
            let bundle: Bundle = serde_json::from_value(value)?;
            Ok(bundle.into_resources())
        }
        other => FhirResource::from_value(other).map(|r| vec![r]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bundle_entries_and_next_link() {
        let bundle: Bundle = serde_json::from_value(json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "link": [
                {"relation": "self", "url": "http://fhir/Patient?page=1"},
                {"relation": "next", "url": "http://fhir/Patient?page=2"}
            ],
            "entry": [
                {"resource": {"resourceType": "Patient", "id": "p-1"}},
                {"fullUrl": "http://fhir/Patient/p-2"}
            ]
        }))
        .unwrap();

        assert_eq!(bundle.next_url(), Some("http://fhir/Patient?page=2"));
        let resources = bundle.into_resources();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id(), Some("p-1"));
    }

    #[test]
    fn test_resources_from_json_shapes() {
        let single = resources_from_json(json!({"resourceType": "Patient", "id": "a"})).unwrap();
        assert_eq!(single.len(), 1);

        let array = resources_from_json(json!([
            {"resourceType": "Patient", "id": "a"},
            {"resourceType": "Observation", "id": "b"}
        ]))
        .unwrap();
        assert_eq!(array.len(), 2);

        let bundle = resources_from_json(json!({
            "resourceType": "Bundle",
            "entry": [{"resource": {"resourceType": "Patient", "id": "c"}}]
        }))
        .unwrap();
        assert_eq!(bundle[0].id(), Some("c"));
    }
}
