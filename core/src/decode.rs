//! Decoders for the two response payloads the client consumes.
//!
//! Both read the whole stream before parsing, so a truncated body fails as a
//! whole instead of yielding a partially populated record.

use std::io::Read;

use crate::error::DecodeError;
use crate::resources::{Bundle, CapabilityStatement, Resource};

/// Decode a CapabilityStatement, e.g. the body of a `metadata` response.
pub fn decode_capability<R: Read>(reader: R) -> Result<CapabilityStatement, DecodeError> {
    match decode_resource(reader)? {
        Resource::CapabilityStatement(statement) => Ok(*statement),
        other => Err(unexpected("CapabilityStatement", &other)),
    }
}

/// Decode a Bundle. Entry resources are decoded by their `resourceType`.
pub fn decode_bundle<R: Read>(reader: R) -> Result<Bundle, DecodeError> {
    match decode_resource(reader)? {
        Resource::Bundle(bundle) => Ok(*bundle),
        other => Err(unexpected("Bundle", &other)),
    }
}

/// Decode any resource kind.
pub fn decode_resource<R: Read>(mut reader: R) -> Result<Resource, DecodeError> {
    let mut body = Vec::new();
    reader.read_to_end(&mut body)?;
    Ok(serde_json::from_slice(&body)?)
}

fn unexpected(expected: &'static str, found: &Resource) -> DecodeError {
    DecodeError::UnexpectedResourceType {
        expected,
        found: found.resource_type().to_string(),
    }
}
