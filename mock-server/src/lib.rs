use std::future::Future;
use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const FHIR_JSON: &str = "application/fhir+json";

/// Listen address used when `FHIR_MOCK_ADDR` is unset.
pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Search results are split across this many pages.
pub const SEARCH_PAGES: u32 = 2;

/// Headers of one request as the server received it.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub uri: String,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
}

pub type RequestLog = Arc<RwLock<Vec<RecordedRequest>>>;

pub fn request_log() -> RequestLog {
    Arc::new(RwLock::new(Vec::new()))
}

pub fn app(log: RequestLog) -> Router {
    Router::new()
        .route("/fhir", post(transaction))
        .route("/fhir/metadata", get(metadata))
        .route("/fhir/{resource_type}", get(search))
        .with_state(log)
}

pub async fn run(listener: TcpListener, log: RequestLog) -> Result<(), std::io::Error> {
    axum::serve(listener, app(log)).await
}

/// Like [`run`], but returns once `shutdown` resolves and in-flight requests finish.
pub async fn run_until(
    listener: TcpListener,
    log: RequestLog,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    axum::serve(listener, app(log))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Socket address to bind: the configured value, or [`DEFAULT_ADDR`].
pub fn listen_addr(configured: Option<&str>) -> Result<SocketAddr, AddrParseError> {
    configured.unwrap_or(DEFAULT_ADDR).parse()
}

async fn metadata(
    State(log): State<RequestLog>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    record(&log, &method, &uri, &headers).await;
    fhir_json(StatusCode::OK, capability_statement())
}

async fn search(
    State(log): State<RequestLog>,
    Path(resource_type): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    record(&log, &method, &uri, &headers).await;
    let host = header_str(&headers, header::HOST).unwrap_or("localhost");
    let page = params
        .iter()
        .find(|(key, _)| key == "_page")
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(1);
    fhir_json(StatusCode::OK, searchset(host, &resource_type, &uri, page))
}

async fn transaction(
    State(log): State<RequestLog>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    record(&log, &method, &uri, &headers).await;

    let is_fhir_json = header_str(&headers, header::CONTENT_TYPE)
        .map(|value| value.starts_with(FHIR_JSON))
        .unwrap_or(false);
    if !is_fhir_json {
        return operation_outcome(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "not-supported",
            "expected application/fhir+json",
        );
    }

    let bundle: Value = match serde_json::from_slice(&body) {
        Ok(bundle) => bundle,
        Err(e) => return operation_outcome(StatusCode::BAD_REQUEST, "structure", &e.to_string()),
    };
    let response_type = match bundle["type"].as_str() {
        Some("transaction") => "transaction-response",
        Some("batch") => "batch-response",
        _ => {
            return operation_outcome(
                StatusCode::BAD_REQUEST,
                "invalid",
                "expected a transaction or batch Bundle",
            )
        }
    };

    let entries: Vec<Value> = bundle["entry"]
        .as_array()
        .map(|entries| entries.iter().map(entry_response).collect())
        .unwrap_or_default();
    fhir_json(
        StatusCode::OK,
        json!({
            "resourceType": "Bundle",
            "id": Uuid::new_v4(),
            "type": response_type,
            "entry": entries,
        }),
    )
}

async fn record(log: &RequestLog, method: &Method, uri: &Uri, headers: &HeaderMap) {
    log.write().await.push(RecordedRequest {
        method: method.to_string(),
        uri: uri.to_string(),
        accept: header_str(headers, header::ACCEPT).map(str::to_string),
        content_type: header_str(headers, header::CONTENT_TYPE).map(str::to_string),
        authorization: header_str(headers, header::AUTHORIZATION).map(str::to_string),
    });
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn fhir_json(status: StatusCode, body: Value) -> Response {
    (status, [(header::CONTENT_TYPE, FHIR_JSON)], body.to_string()).into_response()
}

fn operation_outcome(status: StatusCode, code: &str, diagnostics: &str) -> Response {
    fhir_json(
        status,
        json!({
            "resourceType": "OperationOutcome",
            "issue": [{ "severity": "error", "code": code, "diagnostics": diagnostics }],
        }),
    )
}

pub fn capability_statement() -> Value {
    json!({
        "resourceType": "CapabilityStatement",
        "id": "mock-server",
        "status": "active",
        "date": "2024-01-01",
        "kind": "instance",
        "software": { "name": "mock-server", "version": env!("CARGO_PKG_VERSION") },
        "fhirVersion": "4.0.1",
        "format": ["json"],
        "rest": [{
            "mode": "server",
            "interaction": [{ "code": "transaction" }, { "code": "batch" }],
            "resource": [
                {
                    "type": "Patient",
                    "interaction": [{ "code": "read" }, { "code": "search-type" }],
                    "searchParam": [{ "name": "name", "type": "string" }]
                },
                {
                    "type": "Observation",
                    "interaction": [{ "code": "search-type" }],
                    "searchParam": [{ "name": "code", "type": "token" }]
                }
            ]
        }]
    })
}

/// One page of a searchset. Pages before the last carry an absolute `next`
/// link on `host`.
pub fn searchset(host: &str, resource_type: &str, uri: &Uri, page: u32) -> Value {
    let mut link = vec![json!({ "relation": "self", "url": format!("http://{host}{uri}") })];
    if page < SEARCH_PAGES {
        link.push(json!({
            "relation": "next",
            "url": format!("http://{host}/fhir/{resource_type}?_page={}", page + 1),
        }));
    }

    json!({
        "resourceType": "Bundle",
        "id": Uuid::new_v4(),
        "type": "searchset",
        "total": SEARCH_PAGES * 2,
        "link": link,
        "entry": [
            {
                "fullUrl": format!("http://{host}/fhir/Patient/p{page}"),
                "resource": {
                    "resourceType": "Patient",
                    "id": format!("p{page}"),
                    "name": [{ "family": "Smith", "given": ["Ann"] }],
                    "gender": "female"
                },
                "search": { "mode": "match" }
            },
            {
                "fullUrl": format!("http://{host}/fhir/Observation/o{page}"),
                "resource": {
                    "resourceType": "Observation",
                    "id": format!("o{page}"),
                    "status": "final",
                    "code": { "coding": [{ "system": "http://loinc.org", "code": "29463-7" }] },
                    "subject": { "reference": format!("Patient/p{page}") },
                    "valueQuantity": { "value": 72.5, "unit": "kg" }
                },
                "search": { "mode": "include" }
            },
            {
                "resource": {
                    "resourceType": "OperationOutcome",
                    "issue": [{ "severity": "information", "code": "informational", "diagnostics": "mock data" }]
                },
                "search": { "mode": "outcome" }
            }
        ]
    })
}

fn entry_response(entry: &Value) -> Value {
    let resource_type = entry["resource"]["resourceType"].as_str().unwrap_or("Resource");
    match entry["request"]["method"].as_str() {
        Some("POST") | Some("PUT") => json!({
            "response": {
                "status": "201 Created",
                "location": format!("{resource_type}/{}/_history/1", Uuid::new_v4()),
                "etag": "W/\"1\""
            }
        }),
        _ => json!({ "response": { "status": "200 OK" } }),
    }
}
