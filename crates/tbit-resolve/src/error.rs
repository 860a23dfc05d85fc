use thiserror::Error;

/// Failure of one query against a knowledge source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Endpoint unreachable, timed out, throttled or failing server-side.
    /// Retryable.
    #[error("{endpoint} unavailable after {attempts} attempt(s): {reason}")]
    Unavailable {
        endpoint: String,
        reason: String,
        attempts: u32,
    },

    /// The endpoint answered, but not with usable SPARQL results.
    #[error("invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    /// The source is misconfigured and cannot send any request.
    #[error("invalid configuration for {endpoint}: {reason}")]
    InvalidConfig { endpoint: String, reason: String },

    /// The subject URI cannot be placed into the query text.
    #[error(transparent)]
    InvalidSubject(#[from] tbit_rdfmap::SubjectBindError),
}

impl SourceError {
    pub fn unavailable(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            endpoint: endpoint.into(),
            reason: reason.into(),
            attempts: 1,
        }
    }

    pub fn invalid_response(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    pub(crate) fn with_attempts(self, n: u32) -> Self {
        match self {
            Self::Unavailable {
                endpoint, reason, ..
            } => Self::Unavailable {
                endpoint,
                reason,
                attempts: n,
            },
            other => other,
        }
    }
}

/// Resolution of one entity failed; no partial attributes are returned.
///
/// Every variant names the entity, its target type and the index of the
/// failing query within the rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Retryable: the source was unreachable, throttled or timed out.
    #[error("resolving {uri} ({target_type}), query #{query}: {source}")]
    SourceUnavailable {
        uri: String,
        target_type: String,
        query: usize,
        #[source]
        source: SourceError,
    },

    #[error("resolving {uri} ({target_type}), query #{query}: {source}")]
    InvalidResponse {
        uri: String,
        target_type: String,
        query: usize,
        #[source]
        source: SourceError,
    },
}

impl ResolveError {
    pub fn new(
        uri: impl Into<String>,
        target_type: impl Into<String>,
        query: usize,
        source: SourceError,
    ) -> Self {
        let (uri, target_type) = (uri.into(), target_type.into());
        if source.is_retryable() {
            Self::SourceUnavailable {
                uri,
                target_type,
                query,
                source,
            }
        } else {
            Self::InvalidResponse {
                uri,
                target_type,
                query,
                source,
            }
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            Self::SourceUnavailable { uri, .. } | Self::InvalidResponse { uri, .. } => uri,
        }
    }

    pub fn query(&self) -> usize {
        match self {
            Self::SourceUnavailable { query, .. } | Self::InvalidResponse { query, .. } => *query,
        }
    }

    pub fn source_error(&self) -> &SourceError {
        match self {
            Self::SourceUnavailable { source, .. } | Self::InvalidResponse { source, .. } => source,
        }
    }

    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}
