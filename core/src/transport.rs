//! The send-request capability the client delegates to.
//!
//! # Design
//! `Transport` is the only place network I/O happens. The client hands over
//! a finished `HttpRequest` (credentials already applied) and gets back an
//! `HttpResponse` or the transport's own error, unchanged. Timeouts, TLS and
//! proxies are the transport's configuration; the client only forwards a
//! caller-supplied deadline.

use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use ureq::config::Config;
use ureq::Agent;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Synchronous HTTP transport.
pub trait Transport: Send + Sync {
    /// Execute `request`, finishing before `deadline` when one is given.
    ///
    /// Non-2xx statuses are responses, not errors.
    fn send(&self, request: &HttpRequest, deadline: Option<Instant>) -> Result<HttpResponse, TransportError>;

    /// Drop pooled connections that are not currently in use.
    fn release_idle_connections(&self);
}

/// Transport settings for [`UreqTransport`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Overall per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    pub max_idle_connections: Option<usize>,
    pub user_agent: Option<String>,
    /// Largest response body accepted, in bytes. Unlimited when unset.
    pub max_body_bytes: Option<u64>,
}

/// [`Transport`] backed by a `ureq` agent and its connection pool.
pub struct UreqTransport {
    config: Config,
    agent: RwLock<Agent>,
    body_limit: u64,
}

impl UreqTransport {
    pub fn new(settings: &TransportConfig) -> Self {
        let mut builder = Agent::config_builder().http_status_as_error(false);
        if let Some(secs) = settings.timeout_secs {
            builder = builder.timeout_global(Some(Duration::from_secs(secs)));
        }
        if let Some(max) = settings.max_idle_connections {
            builder = builder.max_idle_connections(max);
        }
        if let Some(user_agent) = &settings.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        let config = builder.build();
        Self {
            agent: RwLock::new(Agent::new_with_config(config.clone())),
            config,
            body_limit: settings.max_body_bytes.unwrap_or(u64::MAX),
        }
    }

    fn agent(&self) -> Agent {
        self.agent.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest, deadline: Option<Instant>) -> Result<HttpResponse, TransportError> {
        let timeout = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(TransportError::DeadlineElapsed);
                }
                Some(remaining)
            }
            None => None,
        };

        let agent = self.agent();
        let url = request.url.as_str();
        let mut response = match request.method {
            HttpMethod::Get => {
                let mut builder = agent.get(url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                if timeout.is_some() {
                    builder = builder.config().timeout_global(timeout).build();
                }
                builder.call()?
            }
            HttpMethod::Post => {
                let mut builder = agent.post(url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                if timeout.is_some() {
                    builder = builder.config().timeout_global(timeout).build();
                }
                match &request.body {
                    Some(body) => builder.send(body.as_slice())?,
                    None => builder.send_empty()?,
                }
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        // ureq caps bodies at 10 MiB unless told otherwise.
        let body = response
            .body_mut()
            .with_config()
            .limit(self.body_limit)
            .read_to_vec()?;
        tracing::trace!(status, bytes = body.len(), "response received");

        Ok(HttpResponse { status, headers, body })
    }

    /// Replaces the agent with a fresh one so the old pool is dropped once
    /// in-flight requests holding it complete.
    fn release_idle_connections(&self) {
        let fresh = Agent::new_with_config(self.config.clone());
        *self.agent.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }
}
