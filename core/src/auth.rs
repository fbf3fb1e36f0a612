//! Client credentials and HTTP basic authentication.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::http::{HttpRequest, AUTHORIZATION};

/// Credentials presented to the FHIR server.
///
/// Whether a request gets an `Authorization` header depends only on the
/// username: `Credentials::new` yields `Anonymous` for an empty username and
/// `Basic` otherwise, even when the password is empty.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    #[default]
    Anonymous,
    Basic(BasicAuth),
}

/// A non-empty username and its password. Only built by `Credentials::new`.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let username = username.into();
        if username.is_empty() {
            return Credentials::Anonymous;
        }
        Credentials::Basic(BasicAuth {
            username,
            password: password.into(),
        })
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Credentials::Anonymous)
    }

    /// `Authorization` header value, or `None` for anonymous access.
    pub fn header_value(&self) -> Option<String> {
        match self {
            Credentials::Basic(BasicAuth { username, password }) if !username.is_empty() => {
                Some(format!("Basic {}", STANDARD.encode(format!("{username}:{password}"))))
            }
            _ => None,
        }
    }

    /// Return `request` with these credentials applied.
    pub fn authorize(&self, mut request: HttpRequest) -> HttpRequest {
        if let Some(value) = self.header_value() {
            request.set_header(AUTHORIZATION, value);
        }
        request
    }
}

// Keeps passwords out of logs and panic messages.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Anonymous => f.write_str("Anonymous"),
            Credentials::Basic(BasicAuth { username, .. }) => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}
