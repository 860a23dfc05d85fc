//! RDF import rules for the TBiT APIS instance.
//!
//! An import rule binds a local entity type (the APIS `superclass`) to a
//! regular expression over authority URIs (Wikidata, GND, ...) and a list of
//! SPARQL `SELECT` queries whose projected variables become entity attributes.
//!
//! This crate owns the *configuration* side of reconciliation:
//!
//! - `rule`: the on-disk rule format (`RuleFileV1`) and the validated,
//!   immutable `MappingRule`.
//! - `sparql`: a small lexer-level SPARQL checker. Queries are validated when a
//!   rule is loaded, never on first use.
//! - `registry`: the ordered rule set and URI → rule selection
//!   (first registered wins).
//! - `rebase`: base-URI rewriting for project-internal URIs.
//!
//! Query execution and value coalescing live in `tbit-resolve`.

pub mod error;
pub mod rebase;
pub mod registry;
pub mod rule;
pub mod sparql;

pub use error::{ConfigError, NoMatchError, RebaseError};
pub use rebase::{normalise_base, RebaseSummary, UriRebase};
pub use registry::RuleRegistry;
pub use rule::{
    AttributeBlockV1, AttributeSpec, DataFilters, MappingRule, RelationTarget, RuleFileV1,
    SourcePattern, TargetType,
};
pub use sparql::{AttributeQuery, QuerySyntaxError, SubjectBindError, SUBJECT_VARIABLE};
