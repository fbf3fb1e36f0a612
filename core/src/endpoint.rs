//! Base endpoint of a FHIR server and resolution of interaction paths.
//!
//! # Design
//! Relative-reference resolution (RFC 3986) replaces the last segment of a
//! base path that does not end in `/`: `http://host/fhir` + `Patient` gives
//! `http://host/Patient`. `Endpoint` therefore appends the trailing `/` once,
//! when it is constructed, and stores the normalized URL. Every interaction
//! path is then resolved against that stored value and only ever extends it.

use url::Url;

use crate::error::AddressError;
use crate::search::SearchParams;

/// Normalized, immutable base address of a FHIR server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
    /// Address for whole-system interactions (transaction, batch): the base
    /// without its trailing `/`.
    system: String,
}

impl Endpoint {
    /// Parse and normalize a base address such as `https://host/fhir`.
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let base = Url::parse(address).map_err(|source| AddressError::Parse {
            address: address.to_string(),
            source,
        })?;
        Self::from_url(base)
    }

    pub fn from_url(mut base: Url) -> Result<Self, AddressError> {
        if !matches!(base.scheme(), "http" | "https") {
            return Err(AddressError::UnsupportedScheme {
                address: base.to_string(),
                scheme: base.scheme().to_string(),
            });
        }
        if base.query().is_some() || base.fragment().is_some() {
            return Err(AddressError::BaseHasQueryOrFragment(base.to_string()));
        }

        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let system = match base.as_str().strip_suffix('/') {
            Some(trimmed) => trimmed.to_string(),
            None => base.to_string(),
        };

        Ok(Self { base, system })
    }

    pub fn as_url(&self) -> &Url {
        &self.base
    }

    /// The configured path prefix including its trailing `/`, or `""` when
    /// the base has no path.
    pub fn path_prefix(&self) -> &str {
        match self.base.path() {
            "/" => "",
            path => path,
        }
    }

    pub fn system_address(&self) -> &str {
        &self.system
    }

    /// Resolve a relative interaction path such as `metadata` or `Patient`.
    pub fn resolve(&self, path: &str) -> Result<Url, AddressError> {
        check_relative(path)?;
        let resolved = self.base.join(path).map_err(|source| AddressError::Parse {
            address: path.to_string(),
            source,
        })?;
        if !self.extends_base(&resolved) {
            return Err(AddressError::NotRelative {
                path: path.to_string(),
                reason: "resolved address leaves the base path",
            });
        }
        Ok(resolved)
    }

    /// Same origin, and a path strictly below the base path.
    fn extends_base(&self, resolved: &Url) -> bool {
        resolved.scheme() == self.base.scheme()
            && resolved.host_str() == self.base.host_str()
            && resolved.port_or_known_default() == self.base.port_or_known_default()
            && resolved.username() == self.base.username()
            && resolved.password() == self.base.password()
            && resolved.path().len() > self.base.path().len()
            && resolved.path().starts_with(self.base.path())
    }

    /// Resolve `path` and attach `params` as the query, if any.
    pub fn resolve_with_query(&self, path: &str, params: &SearchParams) -> Result<Url, AddressError> {
        let mut url = self.resolve(path)?;
        if !params.is_empty() {
            url.set_query(Some(&params.encode()));
        }
        Ok(url)
    }
}

/// Reject paths whose resolution would replace or escape the base path.
fn check_relative(path: &str) -> Result<(), AddressError> {
    let reason = if path.is_empty() {
        Some("path is empty")
    } else if path.contains(|c: char| c.is_ascii_control() || c == ' ') {
        // `Url::join` strips these before resolving.
        Some("whitespace and control characters are not allowed")
    } else if path.starts_with(|c: char| c == '/' || c == '\\') {
        Some("an absolute path replaces the base path")
    } else if path.contains(|c: char| c == '?' || c == '#') {
        Some("query and fragment delimiters are not allowed")
    } else if Url::parse(path).is_ok() {
        Some("path carries a scheme")
    } else if path.split(|c: char| c == '/' || c == '\\').any(is_dot_segment) {
        Some("dot segments escape the base path")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(AddressError::NotRelative {
            path: path.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn is_dot_segment(segment: &str) -> bool {
    let segment = segment.to_ascii_lowercase();
    matches!(segment.as_str(), "." | ".." | "%2e" | "%2e%2e" | ".%2e" | "%2e.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_without_path_keeps_empty_prefix() {
        let endpoint = Endpoint::parse("http://localhost:8080").unwrap();
        assert_eq!(endpoint.path_prefix(), "");
        assert_eq!(endpoint.system_address(), "http://localhost:8080");
        assert_eq!(
            endpoint.resolve("metadata").unwrap().as_str(),
            "http://localhost:8080/metadata"
        );
    }

    #[test]
    fn base_path_without_slash_gets_one() {
        let endpoint = Endpoint::parse("http://localhost:8080/some-path").unwrap();
        assert_eq!(endpoint.path_prefix(), "/some-path/");
        assert_eq!(endpoint.as_url().as_str(), "http://localhost:8080/some-path/");
    }

    #[test]
    fn base_path_with_slash_is_unchanged() {
        let endpoint = Endpoint::parse("http://localhost:8080/some-path/").unwrap();
        assert_eq!(endpoint.path_prefix(), "/some-path/");
        assert!(!endpoint.as_url().as_str().ends_with("//"));

        let again = Endpoint::from_url(endpoint.as_url().clone()).unwrap();
        assert_eq!(again, endpoint);
    }

    #[test]
    fn resolution_preserves_every_prefix_segment() {
        for base in ["http://h/fhir", "http://h/a/b/c", "https://h:9443/r4/fhir"] {
            let endpoint = Endpoint::parse(base).unwrap();
            for path in ["metadata", "Patient", "Observation/123/_history"] {
                let resolved = endpoint.resolve(path).unwrap();
                let expected_prefix = format!("{base}/");
                assert!(
                    resolved.as_str().starts_with(&expected_prefix),
                    "{resolved} does not extend {base}"
                );
                assert!(resolved.as_str().len() > expected_prefix.len());
            }
        }
    }

    #[test]
    fn system_address_strips_single_trailing_slash() {
        let endpoint = Endpoint::parse("http://host/fhir").unwrap();
        assert_eq!(endpoint.system_address(), "http://host/fhir");
        let endpoint = Endpoint::parse("http://host/fhir/").unwrap();
        assert_eq!(endpoint.system_address(), "http://host/fhir");
    }

    #[test]
    fn query_is_attached_after_resolution() {
        let endpoint = Endpoint::parse("http://host/fhir").unwrap();
        let params = SearchParams::new().with("name", "Smith");
        let url = endpoint.resolve_with_query("Patient", &params).unwrap();
        assert_eq!(url.as_str(), "http://host/fhir/Patient?name=Smith");

        let url = endpoint.resolve_with_query("Patient", &SearchParams::new()).unwrap();
        assert_eq!(url.as_str(), "http://host/fhir/Patient");
    }

    #[test]
    fn unparseable_base_is_rejected() {
        let err = Endpoint::parse("not a url").unwrap_err();
        assert!(matches!(err, AddressError::Parse { .. }));
    }

    #[test]
    fn non_http_base_is_rejected() {
        let err = Endpoint::parse("ftp://host/fhir").unwrap_err();
        assert!(matches!(err, AddressError::UnsupportedScheme { ref scheme, .. } if scheme == "ftp"));
    }

    #[test]
    fn base_with_query_is_rejected() {
        let err = Endpoint::parse("http://host/fhir?tenant=a").unwrap_err();
        assert!(matches!(err, AddressError::BaseHasQueryOrFragment(_)));
    }

    #[test]
    fn paths_that_would_drop_the_prefix_are_rejected() {
        let endpoint = Endpoint::parse("http://host/fhir").unwrap();
        for path in [
            "",
            "/Patient",
            "\\Patient",
            "Patient?name=x",
            "Patient#frag",
            "http://other/Patient",
            "../Patient",
            "Patient/./1",
            "%2E%2E/Patient",
            " /Patient",
            "..\n/Patient",
            "\t//evil.example/Patient",
            "Patient\r",
        ] {
            let err = endpoint.resolve(path).unwrap_err();
            assert!(
                matches!(err, AddressError::NotRelative { .. }),
                "{path:?} was accepted"
            );
        }
    }

    #[test]
    fn resolved_address_stays_on_the_base_origin() {
        let endpoint = Endpoint::parse("http://host/fhir").unwrap();
        let inside = Url::parse("http://host/fhir/Patient").unwrap();
        assert!(endpoint.extends_base(&inside));
        for outside in [
            "http://evil.example/fhir/Patient",
            "http://host/Patient",
            "https://host/fhir/Patient",
            "http://host:8080/fhir/Patient",
            "http://host/fhir/",
            "http://host/fhirPatient",
        ] {
            let url = Url::parse(outside).unwrap();
            assert!(!endpoint.extends_base(&url), "{outside} was accepted");
        }
    }
}
