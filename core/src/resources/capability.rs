//! The CapabilityStatement resource returned by the `metadata` interaction.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::datatypes::Meta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software: Option<Software>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation: Option<Implementation>,
    pub fhir_version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rest: Vec<Rest>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CapabilityStatement {
    /// The `rest` block describing server-side capabilities.
    pub fn server_rest(&self) -> Option<&Rest> {
        self.rest.iter().find(|rest| rest.mode == "server")
    }

    /// Server capabilities for one resource type.
    pub fn rest_resource(&self, resource_type: &str) -> Option<&RestResource> {
        self.server_rest()?
            .resource
            .iter()
            .find(|resource| resource.resource_type == resource_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Software {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rest {
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<RestResource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interaction: Vec<Interaction>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interaction: Vec<Interaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versioning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_history: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_param: Vec<SearchParamDefinition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RestResource {
    pub fn supports(&self, interaction: &str) -> bool {
        self.interaction.iter().any(|i| i.code == interaction)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParamDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn statement() -> CapabilityStatement {
        serde_json::from_value(json!({
            "status": "active",
            "kind": "instance",
            "fhirVersion": "4.0.1",
            "format": ["json"],
            "rest": [
                { "mode": "client" },
                {
                    "mode": "server",
                    "resource": [{
                        "type": "Patient",
                        "interaction": [{ "code": "read" }, { "code": "search-type" }],
                        "searchParam": [{ "name": "name", "type": "string" }]
                    }]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn server_rest_skips_client_mode() {
        let statement = statement();
        assert_eq!(statement.server_rest().unwrap().mode, "server");
    }

    #[test]
    fn rest_resource_lookup_and_interactions() {
        let statement = statement();
        let patient = statement.rest_resource("Patient").unwrap();
        assert!(patient.supports("search-type"));
        assert!(!patient.supports("delete"));
        assert_eq!(patient.search_param[0].param_type, "string");
        assert!(statement.rest_resource("Observation").is_none());
    }

    #[test]
    fn software_extensions_survive_reencoding() {
        let input = json!({
            "meta": { "lastUpdated": "2024", "tag": [{ "code": "subsetted" }] },
            "status": "active",
            "kind": "instance",
            "fhirVersion": "4.0.1",
            "software": {
                "name": "x",
                "extension": [{ "url": "http://example.org/build", "valueString": "42" }]
            },
            "implementation": { "description": "test", "custodian": { "display": "ops" } }
        });
        let statement: CapabilityStatement = serde_json::from_value(input.clone()).unwrap();
        assert!(statement.extra.is_empty());
        assert_eq!(serde_json::to_value(&statement).unwrap(), input);
    }

    #[test]
    fn missing_fhir_version_is_rejected() {
        let result = serde_json::from_value::<CapabilityStatement>(json!({
            "status": "active",
            "kind": "instance"
        }));
        assert!(result.is_err());
    }
}
