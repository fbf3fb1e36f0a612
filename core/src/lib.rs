//! Client core for the FHIR REST API.
//!
//! # Overview
//! Builds correctly addressed and headered requests for the capability,
//! transaction, batch, search and pagination interactions, sends them through
//! a pluggable synchronous transport with optional basic authentication, and
//! decodes CapabilityStatement and Bundle responses.
//!
//! # Design
//! - `Endpoint` normalizes the base address once so relative interaction
//!   paths always extend the configured path prefix.
//! - `FhirClient` splits every interaction into `build_*` (produces an
//!   `HttpRequest`) and `send` (applies credentials, calls the transport).
//! - `decode_*` turn a response body into resource records; bundle entries
//!   are decoded by their `resourceType`.
//!
//! ```no_run
//! use fhir_rest_core::{decode_bundle, Credentials, FhirClient, SearchParams};
//!
//! # fn main() -> fhir_rest_core::Result<()> {
//! let client = FhirClient::new("http://localhost:8080/fhir", Credentials::new("a", ""))?;
//! let params = SearchParams::new().with("name", "Smith");
//! let response = client.send(client.build_search_request("Patient", &params)?)?;
//! let bundle = decode_bundle(response.body.as_slice())?;
//! if let Some(next) = bundle.next_link() {
//!     let _page = client.send(client.build_pagination_request(next)?)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod decode;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod resources;
pub mod search;
pub mod transport;

pub use auth::{BasicAuth, Credentials};
pub use client::FhirClient;
pub use config::ClientConfig;
pub use decode::{decode_bundle, decode_capability, decode_resource};
pub use endpoint::Endpoint;
pub use error::{AddressError, DecodeError, Error, Result, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, FHIR_JSON};
pub use resources::{Bundle, BundleEntry, BundleType, CapabilityStatement, Resource};
pub use search::SearchParams;
pub use transport::{Transport, TransportConfig, UreqTransport};
