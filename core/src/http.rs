//! HTTP request and response values exchanged with the transport.
//!
//! # Design
//! Requests are plain data: the client builds an `HttpRequest` per interaction
//! and hands it to a `Transport`, which returns an `HttpResponse`. Nothing in
//! these types performs I/O, so every interaction can be inspected in tests
//! before it reaches the network.
//!
//! All fields use owned types (`String`, `Vec`) so a request can be moved to
//! another thread or kept after the client is gone.

use std::fmt;

/// Media type for FHIR JSON payloads.
pub const FHIR_JSON: &str = "application/fhir+json";

pub const ACCEPT: &str = "Accept";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const AUTHORIZATION: &str = "Authorization";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// Built by the `FhirClient::build_*` methods with an absolute `url`.
/// Credentials are applied at dispatch time, so a freshly built request never
/// carries an `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub(crate) fn get(url: String) -> Self {
        Self {
            method: HttpMethod::Get,
            url,
            headers: vec![(ACCEPT.to_string(), FHIR_JSON.to_string())],
            body: None,
        }
    }

    pub(crate) fn post_fhir_json(url: String, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Post,
            url,
            headers: vec![
                (ACCEPT.to_string(), FHIR_JSON.to_string()),
                (CONTENT_TYPE.to_string(), FHIR_JSON.to_string()),
            ],
            body: Some(body),
        }
    }

    /// First value of the named header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Replace any existing values of `name` with `value`.
    pub(crate) fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value));
    }
}

/// An HTTP response described as plain data.
///
/// Produced by a `Transport` after executing an `HttpRequest`. The body is
/// left raw; pass `body.as_slice()` to one of the `decode_*` functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
