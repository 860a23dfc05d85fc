//! Remote SPARQL endpoint over HTTP (blocking `reqwest`).

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use tbit_rdfmap::AttributeQuery;
use tracing::debug;

use crate::error::SourceError;
use crate::source::{KnowledgeSource, SelectResults, SourceEntity};

pub use crate::config::{DEFAULT_ENDPOINT, DEFAULT_USER_AGENT};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct SparqlHttpSource {
    client: Client,
    endpoint: String,
}

impl SparqlHttpSource {
    pub fn new(endpoint: &str, timeout: Duration, user_agent: &str) -> Result<Self, SourceError> {
        let agent = HeaderValue::from_str(user_agent).map_err(|e| SourceError::InvalidConfig {
            endpoint: endpoint.to_string(),
            reason: format!("invalid user agent {user_agent:?}: {e}"),
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, agent);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/sparql-results+json"),
        );
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/sparql-query"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                SourceError::unavailable(endpoint, format!("failed to build http client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn wikidata() -> Result<Self, SourceError> {
        Self::new(DEFAULT_ENDPOINT, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Server-side failures and throttling are worth retrying; other
/// non-success codes mean the request itself is wrong.
fn status_error(endpoint: &str, status: StatusCode, body: &str) -> SourceError {
    let reason = format!("http {status}: {}", body.chars().take(200).collect::<String>());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        SourceError::unavailable(endpoint, reason)
    } else {
        SourceError::invalid_response(endpoint, reason)
    }
}

impl KnowledgeSource for SparqlHttpSource {
    fn select(
        &self,
        query: &AttributeQuery,
        subject: &SourceEntity,
    ) -> Result<SelectResults, SourceError> {
        let text = query.bind_subject(&subject.uri)?;
        debug!(endpoint = %self.endpoint, uri = %subject.uri, "posting query");

        let resp = self
            .client
            .post(&self.endpoint)
            .body(text)
            .send()
            .map_err(|e| SourceError::unavailable(&self.endpoint, e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| SourceError::unavailable(&self.endpoint, e.to_string()))?;
        if !status.is_success() {
            return Err(status_error(&self.endpoint, status, &body));
        }

        SelectResults::from_sparql_json(&body)
            .map_err(|reason| SourceError::invalid_response(&self.endpoint, reason))
    }

    fn name(&self) -> String {
        self.endpoint.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_codes() {
        let endpoint = DEFAULT_ENDPOINT;
        assert!(status_error(endpoint, StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(status_error(endpoint, StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(!status_error(endpoint, StatusCode::BAD_REQUEST, "parse error").is_retryable());
    }

    #[test]
    fn builds_client_with_custom_agent() {
        let source =
            SparqlHttpSource::new("http://localhost:7878/sparql", Duration::from_secs(1), "tests")
                .expect("client");
        assert_eq!(source.endpoint(), "http://localhost:7878/sparql");
        assert_eq!(source.name(), "http://localhost:7878/sparql");
    }

    #[test]
    fn invalid_user_agent_is_reported() {
        let err = SparqlHttpSource::new(DEFAULT_ENDPOINT, DEFAULT_TIMEOUT, "tbit\nreconcile")
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidConfig { .. }), "{err}");
        assert!(err.to_string().contains("invalid user agent"), "{err}");
    }

    #[test]
    fn unreachable_endpoint_is_unavailable() {
        let source =
            SparqlHttpSource::new("http://127.0.0.1:9/sparql", Duration::from_millis(500), "tests")
                .expect("client");
        let query =
            AttributeQuery::parse("SELECT ?n WHERE { ?subject rdfs:label ?n }").expect("query");
        let err = source
            .select(&query, &SourceEntity::new("http://www.wikidata.org/entity/Q1"))
            .unwrap_err();
        assert!(err.is_retryable(), "{err}");
    }

    #[test]
    fn invalid_subject_is_rejected_before_sending() {
        let source =
            SparqlHttpSource::new("http://127.0.0.1:9/sparql", Duration::from_millis(500), "tests")
                .expect("client");
        let query =
            AttributeQuery::parse("SELECT ?n WHERE { ?subject rdfs:label ?n }").expect("query");
        let err = source
            .select(&query, &SourceEntity::new("http://x/<bad>"))
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidSubject(_)));
    }
}
