//! FHIR REST client: request builders and dispatch.
//!
//! # Design
//! `FhirClient` holds an immutable `Endpoint`, `Credentials` and a
//! `Transport`. Each interaction is split into a `build_*` method that
//! produces an `HttpRequest` and a `send` call that applies credentials and
//! delegates to the transport. Decoding the body is left to the caller via
//! the `decode_*` functions, so every step can be inspected on its own.
//!
//! No method takes `&mut self`; a client can be shared across threads and
//! used concurrently.

use std::time::Instant;

use url::Url;

use crate::auth::Credentials;
use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::error::{AddressError, TransportError};
use crate::http::{HttpRequest, HttpResponse};
use crate::search::SearchParams;
use crate::transport::{Transport, UreqTransport};

const METADATA_PATH: &str = "metadata";

/// Client for a single FHIR server.
pub struct FhirClient<T = UreqTransport> {
    endpoint: Endpoint,
    credentials: Credentials,
    transport: T,
}

impl FhirClient<UreqTransport> {
    /// Client for `base_url` using a default `ureq` transport.
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, AddressError> {
        Ok(Self::with_transport(
            Endpoint::parse(base_url)?,
            credentials,
            UreqTransport::default(),
        ))
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, AddressError> {
        Ok(Self::with_transport(
            Endpoint::parse(&config.base_url)?,
            config.credentials(),
            UreqTransport::new(&config.transport),
        ))
    }
}

impl<T: Transport> FhirClient<T> {
    pub fn with_transport(endpoint: Endpoint, credentials: Credentials, transport: T) -> Self {
        Self {
            endpoint,
            credentials,
            transport,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `GET [base]/metadata`
    pub fn build_capability_request(&self) -> Result<HttpRequest, AddressError> {
        let url = self.endpoint.resolve(METADATA_PATH)?;
        Ok(HttpRequest::get(url.into()))
    }

    /// `POST [base]` with a transaction Bundle.
    pub fn build_transaction_request(&self, body: impl Into<Vec<u8>>) -> Result<HttpRequest, AddressError> {
        Ok(self.build_system_post(body.into()))
    }

    /// `POST [base]` with a batch Bundle.
    pub fn build_batch_request(&self, body: impl Into<Vec<u8>>) -> Result<HttpRequest, AddressError> {
        Ok(self.build_system_post(body.into()))
    }

    /// `GET [base]/[type]?[params]`
    pub fn build_search_request(
        &self,
        resource_type: &str,
        params: &SearchParams,
    ) -> Result<HttpRequest, AddressError> {
        let url = self.endpoint.resolve_with_query(resource_type, params)?;
        Ok(HttpRequest::get(url.into()))
    }

    /// `GET` of a pagination link returned by the server.
    ///
    /// The address is used as given, so links to another host are followed.
    /// It must be absolute.
    pub fn build_pagination_request(&self, address: &str) -> Result<HttpRequest, AddressError> {
        Url::parse(address).map_err(|source| AddressError::Parse {
            address: address.to_string(),
            source,
        })?;
        Ok(HttpRequest::get(address.to_string()))
    }

    fn build_system_post(&self, body: Vec<u8>) -> HttpRequest {
        HttpRequest::post_fhir_json(self.endpoint.system_address().to_string(), body)
    }

    /// Apply the client's credentials to `request`.
    pub fn authorize(&self, request: HttpRequest) -> HttpRequest {
        self.credentials.authorize(request)
    }

    /// Send `request` through the transport.
    pub fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.dispatch(request, None)
    }

    /// Send `request`, letting the transport give up at `deadline`.
    pub fn send_with_deadline(&self, request: HttpRequest, deadline: Instant) -> Result<HttpResponse, TransportError> {
        self.dispatch(request, Some(deadline))
    }

    fn dispatch(&self, request: HttpRequest, deadline: Option<Instant>) -> Result<HttpResponse, TransportError> {
        let request = self.authorize(request);
        tracing::debug!(
            method = %request.method,
            url = without_query(&request.url),
            authenticated = !self.credentials.is_anonymous(),
            "sending FHIR request"
        );
        self.transport.send(&request, deadline)
    }

    /// Release idle transport connections, e.g. before shutdown.
    pub fn release_idle_connections(&self) {
        tracing::debug!(base = %self.endpoint.as_url(), "releasing idle connections");
        self.transport.release_idle_connections();
    }
}

/// The address without its query, which may carry patient data.
fn without_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(address, _)| address)
}

impl<T> std::fmt::Debug for FhirClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FhirClient")
            .field("endpoint", &self.endpoint.as_url().as_str())
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, ACCEPT, AUTHORIZATION, CONTENT_TYPE, FHIR_JSON};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every request and answers with an empty 200.
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(HttpRequest, Option<Instant>)>>,
        released: AtomicUsize,
    }

    impl Transport for RecordingTransport {
        fn send(&self, request: &HttpRequest, deadline: Option<Instant>) -> Result<HttpResponse, TransportError> {
            self.sent.lock().unwrap().push((request.clone(), deadline));
            Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: Vec::new(),
            })
        }

        fn release_idle_connections(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn send(&self, _request: &HttpRequest, _deadline: Option<Instant>) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Other("connection refused".into()))
        }

        fn release_idle_connections(&self) {}
    }

    fn client(base: &str, credentials: Credentials) -> FhirClient<RecordingTransport> {
        FhirClient::with_transport(
            Endpoint::parse(base).unwrap(),
            credentials,
            RecordingTransport::default(),
        )
    }

    #[test]
    fn capability_request() {
        let req = client("http://localhost:8080/fhir", Credentials::Anonymous)
            .build_capability_request()
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:8080/fhir/metadata");
        assert_eq!(req.headers, vec![(ACCEPT.to_string(), FHIR_JSON.to_string())]);
        assert!(req.body.is_none());
    }

    #[test]
    fn transaction_request_posts_to_base() {
        let req = client("http://localhost:8080/fhir/", Credentials::Anonymous)
            .build_transaction_request(r#"{"resourceType":"Bundle","type":"transaction"}"#)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8080/fhir");
        assert_eq!(req.header(ACCEPT), Some(FHIR_JSON));
        assert_eq!(req.header(CONTENT_TYPE), Some(FHIR_JSON));
        assert_eq!(
            req.body.as_deref(),
            Some(br#"{"resourceType":"Bundle","type":"transaction"}"#.as_slice())
        );
    }

    #[test]
    fn batch_request_posts_to_base_without_path() {
        let req = client("http://localhost:8080", Credentials::Anonymous)
            .build_batch_request(b"{}".to_vec())
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8080");
        assert_eq!(req.header(CONTENT_TYPE), Some(FHIR_JSON));
    }

    #[test]
    fn search_request_with_params() {
        let params = SearchParams::new().with("name", "Smith").with("_count", "5");
        let req = client("http://host/fhir", Credentials::Anonymous)
            .build_search_request("Patient", &params)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://host/fhir/Patient?_count=5&name=Smith");
        assert!(req.body.is_none());
        assert_eq!(req.header(CONTENT_TYPE), None);
    }

    #[test]
    fn search_request_rejects_absolute_resource_path() {
        let err = client("http://host/fhir", Credentials::Anonymous)
            .build_search_request("/Patient", &SearchParams::new())
            .unwrap_err();
        assert!(matches!(err, AddressError::NotRelative { .. }));
    }

    #[test]
    fn search_request_cannot_switch_host() {
        let client = client("http://host/fhir", Credentials::new("user", "secret"));
        for resource_type in ["\t//evil.example/Patient", " /Patient", "..\n/Patient"] {
            let err = client
                .build_search_request(resource_type, &SearchParams::new())
                .unwrap_err();
            assert!(matches!(err, AddressError::NotRelative { .. }), "{resource_type:?}");
        }
        assert!(client.transport().sent.lock().unwrap().is_empty());
    }

    #[test]
    fn pagination_request_keeps_address_verbatim() {
        let next = "https://other-host:9443/page?_getpages=abc&_getpagesoffset=20";
        let req = client("http://host/fhir", Credentials::Anonymous)
            .build_pagination_request(next)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, next);
        assert_eq!(req.header(ACCEPT), Some(FHIR_JSON));
    }

    #[test]
    fn pagination_request_requires_absolute_address() {
        let err = client("http://host/fhir", Credentials::Anonymous)
            .build_pagination_request("Patient?page=2")
            .unwrap_err();
        assert!(matches!(
            err,
            AddressError::Parse {
                source: url::ParseError::RelativeUrlWithoutBase,
                ..
            }
        ));
    }

    #[test]
    fn built_requests_never_carry_credentials() {
        let client = client("http://host/fhir", Credentials::new("a", "b"));
        let req = client.build_capability_request().unwrap();
        assert_eq!(req.header(AUTHORIZATION), None);
    }

    #[test]
    fn send_applies_basic_auth() {
        let client = client("http://host/fhir", Credentials::new("foo", "bar"));
        client.send(client.build_capability_request().unwrap()).unwrap();

        let sent = client.transport().sent.lock().unwrap();
        assert_eq!(sent[0].0.header(AUTHORIZATION), Some("Basic Zm9vOmJhcg=="));
        assert_eq!(sent[0].1, None);
    }

    #[test]
    fn send_without_username_sends_unmodified() {
        let client = client("http://host/fhir", Credentials::new("", "ignored"));
        let req = client.build_capability_request().unwrap();
        client.send(req.clone()).unwrap();

        let sent = client.transport().sent.lock().unwrap();
        assert_eq!(sent[0].0, req);
    }

    #[test]
    fn deadline_is_forwarded() {
        let client = client("http://host/fhir", Credentials::Anonymous);
        let deadline = Instant::now() + Duration::from_secs(30);
        client
            .send_with_deadline(client.build_capability_request().unwrap(), deadline)
            .unwrap();

        let sent = client.transport().sent.lock().unwrap();
        assert_eq!(sent[0].1, Some(deadline));
    }

    #[test]
    fn transport_errors_surface_unchanged() {
        let client = FhirClient::with_transport(
            Endpoint::parse("http://host/fhir").unwrap(),
            Credentials::Anonymous,
            FailingTransport,
        );
        let err = client.send(client.build_capability_request().unwrap()).unwrap_err();
        match err {
            TransportError::Other(source) => assert_eq!(source.to_string(), "connection refused"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn release_idle_connections_passes_through() {
        let client = client("http://host/fhir", Credentials::Anonymous);
        client.release_idle_connections();
        assert_eq!(client.transport().released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn search_scenario_with_empty_password() {
        let client = client("http://host/fhir", Credentials::new("a", ""));
        let params = SearchParams::new().with("name", "Smith");
        let req = client.authorize(client.build_search_request("Patient", &params).unwrap());

        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://host/fhir/Patient?name=Smith");
        assert_eq!(
            req.headers,
            vec![
                (ACCEPT.to_string(), FHIR_JSON.to_string()),
                (AUTHORIZATION.to_string(), "Basic YTo=".to_string()),
            ]
        );
        assert!(req.body.is_none());
    }

    #[test]
    fn logged_address_drops_the_query() {
        assert_eq!(
            without_query("http://host/fhir/Patient?name=Smith&birthdate=1970"),
            "http://host/fhir/Patient"
        );
        assert_eq!(without_query("http://host/fhir/metadata"), "http://host/fhir/metadata");
    }

    #[test]
    fn client_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FhirClient>();
        assert_send_sync::<FhirClient<RecordingTransport>>();
    }

    #[test]
    fn debug_output_hides_password() {
        let client = client("http://host/fhir", Credentials::new("user", "s3cret"));
        let rendered = format!("{client:?}");
        assert!(rendered.contains("http://host/fhir/"));
        assert!(!rendered.contains("s3cret"));
    }
}
