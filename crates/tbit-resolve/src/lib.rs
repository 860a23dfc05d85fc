//! Attribute resolution for TBiT import rules.
//!
//! Given a rule selected by `tbit_rdfmap::RuleRegistry` and an authority URI,
//! the `Resolver` runs the rule's SPARQL queries against a `KnowledgeSource`
//! and coalesces one value per attribute with German-first locale fallback.
//!
//! - `source`: the query contract, result rows and the in-memory fixture source.
//! - `sparql_http`: remote endpoint over HTTP (feature `http`).
//! - `retry`: exponential backoff for unavailable sources.
//! - `coalesce`: the locale priority chain.
//! - `import`: reference batch driver with pluggable sinks.
//! - `config`: `reconcile.toml`.

pub mod coalesce;
pub mod config;
pub mod error;
pub mod import;
pub mod resolver;
pub mod retry;
pub mod source;
#[cfg(feature = "http")]
pub mod sparql_http;

pub use coalesce::{coalesce, locale_matches, CoalescedValue, LocalePreference};
pub use config::{ReconcileConfig, SettingsError};
pub use error::{ResolveError, SourceError};
pub use import::{
    EntitySink, ImportReport, ImportRun, ImportedEntity, JsonLinesSink, MemorySink,
    PersistOutcome, SkipReason, SkippedEntity,
};
pub use resolver::{RelationHint, ResolvedEntity, Resolver};
pub use retry::{RetryPolicy, RetryingSource};
pub use source::{Candidate, KnowledgeSource, MemorySource, SelectResults, SourceEntity, TermKind};
#[cfg(feature = "http")]
pub use sparql_http::SparqlHttpSource;
