//! Knowledge sources: where attribute queries are evaluated.
//!
//! The resolver only needs "given a query and a bound subject, return ordered
//! result rows". Transport is up to the implementation:
//!
//! - `SparqlHttpSource` (feature `http`) talks to a remote SPARQL endpoint.
//! - `MemorySource` answers from fixtures; used offline and in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tbit_rdfmap::AttributeQuery;

use crate::error::SourceError;

// ============================================================================
// Terms and result rows
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
    Iri,
    #[default]
    Literal,
    BlankNode,
}

/// One candidate value for an attribute, optionally language-tagged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default)]
    pub kind: TermKind,
}

impl Candidate {
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            locale: None,
            kind: TermKind::Literal,
        }
    }

    pub fn tagged(value: impl Into<String>, locale: impl Into<String>) -> Self {
        let locale = locale.into();
        Self {
            value: value.into(),
            locale: (!locale.is_empty()).then_some(locale),
            kind: TermKind::Literal,
        }
    }

    pub fn iri(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            locale: None,
            kind: TermKind::Iri,
        }
    }

    /// The language tag, treating an empty tag as untagged.
    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref().filter(|l| !l.is_empty())
    }
}

/// Tabular `SELECT` results: ordered rows of variable → term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectResults {
    pub variables: Vec<String>,
    pub rows: Vec<BTreeMap<String, Candidate>>,
}

impl SelectResults {
    /// Candidates bound to `variable`, in row order. Rows leaving the
    /// variable unbound contribute nothing.
    pub fn candidates(&self, variable: &str) -> Vec<&Candidate> {
        self.rows.iter().filter_map(|row| row.get(variable)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parse `application/sparql-results+json`.
    pub fn from_sparql_json(text: &str) -> Result<Self, String> {
        #[derive(Deserialize)]
        struct Document {
            #[serde(default)]
            head: Head,
            results: Results,
        }

        #[derive(Default, Deserialize)]
        struct Head {
            #[serde(default)]
            vars: Vec<String>,
        }

        #[derive(Deserialize)]
        struct Results {
            bindings: Vec<HashMap<String, Term>>,
        }

        #[derive(Deserialize)]
        struct Term {
            #[serde(rename = "type")]
            kind: String,
            value: String,
            #[serde(rename = "xml:lang", default)]
            lang: Option<String>,
        }

        let doc: Document =
            serde_json::from_str(text).map_err(|e| format!("malformed SPARQL JSON: {e}"))?;

        let mut rows = Vec::with_capacity(doc.results.bindings.len());
        for binding in doc.results.bindings {
            let mut row = BTreeMap::new();
            for (variable, term) in binding {
                let kind = match term.kind.as_str() {
                    "uri" => TermKind::Iri,
                    "literal" | "typed-literal" => TermKind::Literal,
                    "bnode" => TermKind::BlankNode,
                    other => return Err(format!("unknown term type `{other}` for ?{variable}")),
                };
                let candidate = Candidate {
                    value: term.value,
                    locale: term.lang.filter(|l| !l.is_empty()),
                    kind,
                };
                row.insert(variable, candidate);
            }
            rows.push(row);
        }

        Ok(Self {
            variables: doc.head.vars,
            rows,
        })
    }
}

// ============================================================================
// Source contract
// ============================================================================

/// The entity a query is scoped to: the inbound authority URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceEntity {
    pub uri: String,
}

impl SourceEntity {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

/// Evaluates attribute queries. Read-only and safe to share across workers.
pub trait KnowledgeSource: Send + Sync {
    fn select(
        &self,
        query: &AttributeQuery,
        subject: &SourceEntity,
    ) -> Result<SelectResults, SourceError>;

    /// Short label for logs and error messages.
    fn name(&self) -> String;
}

impl<S: KnowledgeSource + ?Sized> KnowledgeSource for &S {
    fn select(
        &self,
        query: &AttributeQuery,
        subject: &SourceEntity,
    ) -> Result<SelectResults, SourceError> {
        (**self).select(query, subject)
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

impl<S: KnowledgeSource + ?Sized> KnowledgeSource for Box<S> {
    fn select(
        &self,
        query: &AttributeQuery,
        subject: &SourceEntity,
    ) -> Result<SelectResults, SourceError> {
        (**self).select(query, subject)
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

impl<S: KnowledgeSource + ?Sized> KnowledgeSource for Arc<S> {
    fn select(
        &self,
        query: &AttributeQuery,
        subject: &SourceEntity,
    ) -> Result<SelectResults, SourceError> {
        (**self).select(query, subject)
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

// ============================================================================
// In-memory source
// ============================================================================

/// Fixture-backed source keyed by subject URI and variable name.
///
/// A query receives one row per candidate index: row `i` binds every
/// projected variable that has an `i`-th candidate.
///
/// Fixture JSON shape:
///
/// ```json
/// { "http://www.wikidata.org/entity/Q123": {
///     "name": [ { "value": "Institut X", "locale": "de" } ] } }
/// ```
#[derive(Debug, Default)]
pub struct MemorySource {
    subjects: HashMap<String, BTreeMap<String, Vec<Candidate>>>,
    outage: AtomicU32,
    calls: AtomicU32,
}

impl MemorySource {
    pub const NAME: &'static str = "memory";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture_json(text: &str) -> Result<Self, serde_json::Error> {
        let subjects: HashMap<String, BTreeMap<String, Vec<Candidate>>> =
            serde_json::from_str(text)?;
        Ok(Self {
            subjects,
            ..Self::default()
        })
    }

    pub fn insert(
        &mut self,
        uri: impl Into<String>,
        variable: impl Into<String>,
        candidates: Vec<Candidate>,
    ) {
        self.subjects
            .entry(uri.into())
            .or_default()
            .insert(variable.into(), candidates);
    }

    pub fn with(
        mut self,
        uri: impl Into<String>,
        variable: impl Into<String>,
        candidates: Vec<Candidate>,
    ) -> Self {
        self.insert(uri, variable, candidates);
        self
    }

    /// Fail the next `n` calls as unavailable.
    pub fn fail_next(&self, n: u32) {
        self.outage.store(n, Ordering::SeqCst);
    }

    /// Number of `select` calls served or failed so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KnowledgeSource for MemorySource {
    fn select(
        &self,
        query: &AttributeQuery,
        subject: &SourceEntity,
    ) -> Result<SelectResults, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .outage
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SourceError::unavailable(Self::NAME, "simulated outage"));
        }

        let variables = query.variables().to_vec();
        let Some(bindings) = self.subjects.get(&subject.uri) else {
            return Ok(SelectResults {
                variables,
                rows: Vec::new(),
            });
        };

        let depth = variables
            .iter()
            .filter_map(|v| bindings.get(v).map(Vec::len))
            .max()
            .unwrap_or(0);
        let rows = (0..depth)
            .map(|i| {
                variables
                    .iter()
                    .filter_map(|v| {
                        let c = bindings.get(v)?.get(i)?;
                        Some((v.clone(), c.clone()))
                    })
                    .collect()
            })
            .collect();

        Ok(SelectResults { variables, rows })
    }

    fn name(&self) -> String {
        Self::NAME.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sparql_json_results() {
        let json = r#"{
            "head": { "vars": ["name", "item"] },
            "results": { "bindings": [
                { "name": { "type": "literal", "xml:lang": "de", "value": "Institut X" },
                  "item": { "type": "uri", "value": "http://www.wikidata.org/entity/Q123" } },
                { "name": { "type": "literal", "value": "Institute X" } },
                { "name": { "type": "typed-literal", "xml:lang": "", "value": "X" } }
            ] }
        }"#;
        let results = SelectResults::from_sparql_json(json).expect("parse");
        assert_eq!(results.variables, vec!["name".to_string(), "item".to_string()]);

        let names = results.candidates("name");
        assert_eq!(names.len(), 3);
        assert_eq!(names[0].locale(), Some("de"));
        assert_eq!(names[1].locale(), None);
        assert_eq!(names[2].locale(), None);

        let items = results.candidates("item");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, TermKind::Iri);
    }

    #[test]
    fn rejects_unknown_term_types() {
        let json = r#"{ "results": { "bindings": [ { "x": { "type": "quoted", "value": "?" } } ] } }"#;
        let err = SelectResults::from_sparql_json(json).unwrap_err();
        assert!(err.contains("quoted"), "{err}");
    }

    #[test]
    fn memory_source_lines_up_rows_by_index() {
        let source = MemorySource::new()
            .with(
                "http://x/1",
                "name",
                vec![Candidate::tagged("A", "de"), Candidate::tagged("B", "en")],
            )
            .with("http://x/1", "founded", vec![Candidate::literal("1950")]);
        let query = AttributeQuery::parse(
            "SELECT ?name ?founded WHERE { ?subject rdfs:label ?name ; wdt:P571 ?founded }",
        )
        .expect("query");

        let results = source
            .select(&query, &SourceEntity::new("http://x/1"))
            .expect("select");
        assert_eq!(results.rows.len(), 2);
        assert_eq!(results.candidates("founded").len(), 1);
        assert_eq!(results.candidates("name")[1].value, "B");

        let empty = source
            .select(&query, &SourceEntity::new("http://x/2"))
            .expect("select");
        assert!(empty.is_empty());
    }

    #[test]
    fn memory_source_simulates_outages() {
        let source = MemorySource::new();
        let query =
            AttributeQuery::parse("SELECT ?n WHERE { ?subject rdfs:label ?n }").expect("query");
        let subject = SourceEntity::new("http://x/1");

        source.fail_next(2);
        assert!(source.select(&query, &subject).is_err());
        assert!(source.select(&query, &subject).is_err());
        assert!(source.select(&query, &subject).is_ok());
        assert_eq!(source.calls(), 3);
    }

    #[test]
    fn loads_fixture_json() {
        let source = MemorySource::from_fixture_json(
            r#"{ "http://www.wikidata.org/entity/Q123": {
                "name": [ { "value": "Institut X", "locale": "de" }, { "value": "Institute X", "locale": "en" } ],
                "website": [ { "value": "https://x.example", "kind": "iri" } ]
            } }"#,
        )
        .expect("fixture");
        let query = AttributeQuery::parse(
            "SELECT ?website WHERE { ?subject wdt:P856 ?website }",
        )
        .expect("query");
        let results = source
            .select(&query, &SourceEntity::new("http://www.wikidata.org/entity/Q123"))
            .expect("select");
        assert_eq!(results.candidates("website")[0].kind, TermKind::Iri);
    }
}
