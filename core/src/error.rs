//! Error types for the FHIR client core.
//!
//! # Design
//! Each failure has one home: `AddressError` while building a request,
//! `TransportError` while sending it, `DecodeError` while reading the body.
//! None of them is retried or translated inside the crate. `Error` unifies the
//! three for callers that drive a whole interaction with `?`.

use thiserror::Error;

/// Result type alias over the unified [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A base endpoint, relative path or pagination link that cannot be turned
/// into an absolute request address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid address `{address}`: {source}")]
    Parse {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported scheme `{scheme}` in `{address}`, expected http or https")]
    UnsupportedScheme { address: String, scheme: String },

    #[error("base address `{0}` must not carry a query or fragment")]
    BaseHasQueryOrFragment(String),

    #[error("`{path}` is not a relative interaction path: {reason}")]
    NotRelative { path: String, reason: &'static str },
}

/// A failure while exchanging a request with the server.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The caller's deadline passed before the request was sent.
    #[error("deadline elapsed before the request was sent")]
    DeadlineElapsed,

    #[error(transparent)]
    Http(#[from] ureq::Error),

    /// Failure reported by a custom `Transport` implementation.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// A response body that could not be read or is not the expected JSON shape.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("failed to read response body: {0}")]
    Read(#[from] std::io::Error),

    #[error("invalid FHIR JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a {expected} resource, found {found}")]
    UnexpectedResourceType {
        expected: &'static str,
        found: String,
    },
}

/// Any failure of a FHIR interaction.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
