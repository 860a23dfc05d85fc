use std::path::PathBuf;

use thiserror::Error;

use crate::sparql::QuerySyntaxError;

/// Errors raised while loading or registering import rules.
///
/// Every variant is a configuration defect: a run must not start when any of
/// them occurs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to scan rules directory {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("no rule files (*.toml) found in {path}")]
    NoRules { path: PathBuf },

    #[error("{origin}: invalid rule file: {source}")]
    Toml {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("{origin}: `superclass` must be a dotted model path, got `{superclass}`")]
    InvalidTargetType { origin: String, superclass: String },

    #[error("{origin}: invalid `regex` `{pattern}`: {source}")]
    InvalidPattern {
        origin: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{origin}: attribute block #{block}: {source}")]
    QuerySyntax {
        origin: String,
        block: usize,
        #[source]
        source: QuerySyntaxError,
    },

    #[error("{origin}: rule declares no attribute queries")]
    NoAttributes { origin: String },

    #[error("{origin}: attribute `{name}` is projected by more than one query")]
    DuplicateAttribute { origin: String, name: String },

    #[error(
        "{origin}: relation attribute `{name}` must look like `field__RelatedModel__RelationModel`"
    )]
    MalformedRelationAttribute { origin: String, name: String },

    #[error("{origin}: filter refers to unknown attribute `{name}`")]
    UnknownFilterAttribute { origin: String, name: String },

    #[error(
        "{origin}: source pattern `{pattern}` is already registered by {existing_origin} ({existing_target})"
    )]
    DuplicatePattern {
        origin: String,
        pattern: String,
        existing_origin: String,
        existing_target: String,
    },
}

/// No registered rule matches an inbound URI.
///
/// Recoverable: the caller skips the entity and reports it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no import rule matches `{uri}`")]
pub struct NoMatchError {
    pub uri: String,
}

#[derive(Debug, Error)]
pub enum RebaseError {
    #[error("base URI must not be empty")]
    EmptyBase,
    #[error("invalid base URI pattern: {0}")]
    Pattern(#[from] regex::Error),
}
