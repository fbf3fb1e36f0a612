//! FHIR resource records decoded from server responses.
//!
//! # Design
//! A FHIR JSON resource names its own kind in the `resourceType` member.
//! `Resource` is a tagged union over that discriminator: decoding reads
//! `resourceType` first and then decodes the remaining members into the
//! matching record. Kinds without a dedicated record decode to
//! `Resource::Other`, which keeps the raw JSON object, so a bundle mixing
//! arbitrary resource kinds still decodes.
//!
//! Records keep unknown members in a flattened `extra` map, so re-encoding a
//! decoded resource reproduces the input.

mod bundle;
mod capability;
mod clinical;
mod datatypes;

pub use bundle::{
    Bundle, BundleEntry, BundleEntryRequest, BundleEntryResponse, BundleEntrySearch, BundleLink,
    BundleType,
};
pub use capability::{
    CapabilityStatement, Implementation, Interaction, Rest, RestResource, SearchParamDefinition,
    Software,
};
pub use clinical::{Observation, OperationOutcome, OperationOutcomeIssue, Patient};
pub use datatypes::{CodeableConcept, Coding, HumanName, Meta, Quantity, Reference};

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the discriminator member.
pub const RESOURCE_TYPE: &str = "resourceType";

/// A FHIR resource of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Bundle(Box<Bundle>),
    CapabilityStatement(Box<CapabilityStatement>),
    Observation(Box<Observation>),
    OperationOutcome(Box<OperationOutcome>),
    Patient(Box<Patient>),
    Other(UnknownResource),
}

/// A resource kind without a dedicated record, kept as raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownResource {
    pub resource_type: String,
    /// Every member except `resourceType`.
    pub content: Map<String, Value>,
}

impl Resource {
    pub fn resource_type(&self) -> &str {
        match self {
            Resource::Bundle(_) => "Bundle",
            Resource::CapabilityStatement(_) => "CapabilityStatement",
            Resource::Observation(_) => "Observation",
            Resource::OperationOutcome(_) => "OperationOutcome",
            Resource::Patient(_) => "Patient",
            Resource::Other(other) => &other.resource_type,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Resource::Bundle(r) => r.id.as_deref(),
            Resource::CapabilityStatement(r) => r.id.as_deref(),
            Resource::Observation(r) => r.id.as_deref(),
            Resource::OperationOutcome(r) => r.id.as_deref(),
            Resource::Patient(r) => r.id.as_deref(),
            Resource::Other(r) => r.content.get("id").and_then(Value::as_str),
        }
    }
}

impl<'de> Deserialize<'de> for Resource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut content = Map::<String, Value>::deserialize(deserializer)?;
        let resource_type = match content.remove(RESOURCE_TYPE) {
            Some(Value::String(name)) => name,
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "`{RESOURCE_TYPE}` must be a string, found {other}"
                )))
            }
            None => return Err(de::Error::missing_field(RESOURCE_TYPE)),
        };

        match resource_type.as_str() {
            "Bundle" => record(content).map(Resource::Bundle),
            "CapabilityStatement" => record(content).map(Resource::CapabilityStatement),
            "Observation" => record(content).map(Resource::Observation),
            "OperationOutcome" => record(content).map(Resource::OperationOutcome),
            "Patient" => record(content).map(Resource::Patient),
            _ => Ok(Resource::Other(UnknownResource {
                resource_type,
                content,
            })),
        }
    }
}

fn record<T: DeserializeOwned, E: de::Error>(content: Map<String, Value>) -> Result<Box<T>, E> {
    serde_json::from_value(Value::Object(content))
        .map(Box::new)
        .map_err(E::custom)
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = match self {
            Resource::Bundle(r) => serde_json::to_value(r),
            Resource::CapabilityStatement(r) => serde_json::to_value(r),
            Resource::Observation(r) => serde_json::to_value(r),
            Resource::OperationOutcome(r) => serde_json::to_value(r),
            Resource::Patient(r) => serde_json::to_value(r),
            Resource::Other(r) => Ok(Value::Object(r.content.clone())),
        }
        .map_err(<S::Error as ser::Error>::custom)?;

        let mut object = Map::new();
        object.insert(RESOURCE_TYPE.to_string(), Value::String(self.resource_type().to_string()));
        if let Value::Object(members) = body {
            object.extend(members);
        }
        object.serialize(serializer)
    }
}

impl From<Bundle> for Resource {
    fn from(bundle: Bundle) -> Self {
        Resource::Bundle(Box::new(bundle))
    }
}

impl From<CapabilityStatement> for Resource {
    fn from(statement: CapabilityStatement) -> Self {
        Resource::CapabilityStatement(Box::new(statement))
    }
}

impl From<Patient> for Resource {
    fn from(patient: Patient) -> Self {
        Resource::Patient(Box::new(patient))
    }
}
