//! Import rules: on-disk format and validated form.
//!
//! A rule file is TOML and mirrors the RDF import configuration used by the
//! APIS instance:
//!
//! ```toml
//! superclass = "apis_ontology.models.Group"
//! regex = "http://www.wikidata.org.*"
//!
//! [[attributes]]
//! sparql = """
//! PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
//! SELECT ?name WHERE { ?subject rdfs:label ?name }
//! """
//!
//! [filters]
//! drop = ["profession"]
//! full_dates = ["date_of_birth", "date_of_death"]
//! ```
//!
//! Attribute names are the projected SPARQL variables. A variable named
//! `field__RelatedModel__RelationModel` does not populate a field: its value is
//! the URI of a related entity that the importer should create and link.

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sparql::AttributeQuery;

pub const INLINE_ORIGIN: &str = "<inline>";

// ============================================================================
// File format (v1)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFileV1 {
    pub superclass: String,
    pub regex: String,
    #[serde(default)]
    pub attributes: Vec<AttributeBlockV1>,
    #[serde(default)]
    pub filters: DataFilters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeBlockV1 {
    pub sparql: String,
}

/// Post-resolution clean-up applied by the importer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataFilters {
    /// Attributes that are queried but never stored.
    #[serde(default)]
    pub drop: Vec<String>,
    /// Date attributes that are only kept when they carry a full `YYYY-MM-DD` date.
    #[serde(default)]
    pub full_dates: Vec<String>,
}

impl DataFilters {
    pub fn is_empty(&self) -> bool {
        self.drop.is_empty() && self.full_dates.is_empty()
    }
}

// ============================================================================
// Target type
// ============================================================================

/// Local entity type, addressed by its dotted model path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetType(String);

impl TargetType {
    /// Accepts `Group` as well as `apis_ontology.models.Group`.
    pub fn parse(superclass: &str) -> Option<Self> {
        let superclass = superclass.trim();
        if superclass.is_empty() {
            return None;
        }
        let valid = superclass.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
        valid.then(|| Self(superclass.to_string()))
    }

    pub fn path(&self) -> &str {
        &self.0
    }

    /// Model class name (last path segment).
    pub fn model_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Source pattern
// ============================================================================

/// URI pattern, matched from the start of the URI.
#[derive(Debug, Clone)]
pub struct SourcePattern {
    text: String,
    regex: Regex,
}

impl SourcePattern {
    /// The text must be a valid regex on its own before it is anchored.
    pub fn new(text: &str) -> Result<Self, regex::Error> {
        Regex::new(text)?;
        let regex = Regex::new(&format!("^(?:{text})"))?;
        Ok(Self {
            text: text.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn matches(&self, uri: &str) -> bool {
        self.regex.is_match(uri)
    }
}

impl PartialEq for SourcePattern {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for SourcePattern {}

// ============================================================================
// Attributes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationTarget {
    pub field: String,
    pub related_model: String,
    pub relation: String,
}

impl RelationTarget {
    /// `None` for plain attribute names; `Some(Err(()))` for a malformed
    /// double-underscore name.
    fn from_attribute_name(name: &str) -> Option<Result<Self, ()>> {
        if !name.contains("__") {
            return None;
        }
        let parts: Vec<&str> = name.split("__").collect();
        match parts.as_slice() {
            [field, related_model, relation]
                if !field.is_empty() && !related_model.is_empty() && !relation.is_empty() =>
            {
                Some(Ok(Self {
                    field: field.to_string(),
                    related_model: related_model.to_string(),
                    relation: relation.to_string(),
                }))
            }
            _ => Some(Err(())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: String,
    /// Index into `MappingRule::queries`.
    pub query: usize,
    pub relation: Option<RelationTarget>,
}

// ============================================================================
// MappingRule
// ============================================================================

/// A validated import rule. Immutable once built.
#[derive(Debug, Clone)]
pub struct MappingRule {
    target_type: TargetType,
    source_pattern: SourcePattern,
    queries: Vec<AttributeQuery>,
    attributes: Vec<AttributeSpec>,
    filters: DataFilters,
    origin: Option<PathBuf>,
}

impl MappingRule {
    /// Build a rule from inline parts (no filters).
    pub fn new(superclass: &str, pattern: &str, queries: &[&str]) -> Result<Self, ConfigError> {
        Self::from_file_v1(
            RuleFileV1 {
                superclass: superclass.to_string(),
                regex: pattern.to_string(),
                attributes: queries
                    .iter()
                    .map(|q| AttributeBlockV1 {
                        sparql: q.to_string(),
                    })
                    .collect(),
                filters: DataFilters::default(),
            },
            None,
        )
    }

    pub fn from_toml_str(text: &str, origin: Option<&Path>) -> Result<Self, ConfigError> {
        let file: RuleFileV1 = toml::from_str(text).map_err(|source| ConfigError::Toml {
            origin: origin_label(origin),
            source,
        })?;
        Self::from_file_v1(file, origin)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, Some(path))
    }

    pub fn from_file_v1(file: RuleFileV1, origin: Option<&Path>) -> Result<Self, ConfigError> {
        let label = origin_label(origin);

        let target_type =
            TargetType::parse(&file.superclass).ok_or_else(|| ConfigError::InvalidTargetType {
                origin: label.clone(),
                superclass: file.superclass.clone(),
            })?;

        let source_pattern =
            SourcePattern::new(&file.regex).map_err(|source| ConfigError::InvalidPattern {
                origin: label.clone(),
                pattern: file.regex.clone(),
                source,
            })?;

        if file.attributes.is_empty() {
            return Err(ConfigError::NoAttributes { origin: label });
        }

        let mut queries = Vec::with_capacity(file.attributes.len());
        let mut attributes: Vec<AttributeSpec> = Vec::new();
        for (block, attr) in file.attributes.iter().enumerate() {
            let query = AttributeQuery::parse(attr.sparql.as_str()).map_err(|source| {
                ConfigError::QuerySyntax {
                    origin: label.clone(),
                    block,
                    source,
                }
            })?;

            for variable in query.variables() {
                if attributes.iter().any(|a| &a.name == variable) {
                    return Err(ConfigError::DuplicateAttribute {
                        origin: label.clone(),
                        name: variable.clone(),
                    });
                }
                let relation = match RelationTarget::from_attribute_name(variable) {
                    None => None,
                    Some(Ok(target)) => Some(target),
                    Some(Err(())) => {
                        return Err(ConfigError::MalformedRelationAttribute {
                            origin: label.clone(),
                            name: variable.clone(),
                        });
                    }
                };
                attributes.push(AttributeSpec {
                    name: variable.clone(),
                    query: block,
                    relation,
                });
            }
            queries.push(query);
        }

        for name in file.filters.drop.iter().chain(&file.filters.full_dates) {
            if !attributes.iter().any(|a| &a.name == name) {
                return Err(ConfigError::UnknownFilterAttribute {
                    origin: label.clone(),
                    name: name.clone(),
                });
            }
        }

        Ok(Self {
            target_type,
            source_pattern,
            queries,
            attributes,
            filters: file.filters,
            origin: origin.map(Path::to_path_buf),
        })
    }

    pub fn target_type(&self) -> &TargetType {
        &self.target_type
    }

    pub fn source_pattern(&self) -> &SourcePattern {
        &self.source_pattern
    }

    pub fn matches(&self, uri: &str) -> bool {
        self.source_pattern.matches(uri)
    }

    pub fn queries(&self) -> &[AttributeQuery] {
        &self.queries
    }

    /// Attributes in block order, then projection order.
    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn filters(&self) -> &DataFilters {
        &self.filters
    }

    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn origin_label(&self) -> String {
        origin_label(self.origin())
    }
}

fn origin_label(origin: Option<&Path>) -> String {
    origin
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| INLINE_ORIGIN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP_RULE: &str = r#"
superclass = "apis_ontology.models.Group"
regex = "http://www.wikidata.org.*"

[[attributes]]
sparql = """
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
SELECT ?name
WHERE { ?subject rdfs:label ?name }
"""

[[attributes]]
sparql = """
SELECT ?founded ?located__Place__GroupIsLocatedInPlace
WHERE {
  ?subject wdt:P571 ?founded .
  OPTIONAL { ?subject wdt:P159 ?located__Place__GroupIsLocatedInPlace }
}
"""
"#;

    #[test]
    fn loads_group_rule() {
        let rule = MappingRule::from_toml_str(GROUP_RULE, None).expect("rule");
        assert_eq!(rule.target_type().model_name(), "Group");
        assert_eq!(rule.target_type().path(), "apis_ontology.models.Group");
        assert_eq!(rule.queries().len(), 2);

        let names: Vec<&str> = rule.attributes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["name", "founded", "located__Place__GroupIsLocatedInPlace"]
        );
        assert_eq!(rule.attribute("founded").map(|a| a.query), Some(1));

        let relation = rule
            .attribute("located__Place__GroupIsLocatedInPlace")
            .and_then(|a| a.relation.clone())
            .expect("relation target");
        assert_eq!(relation.field, "located");
        assert_eq!(relation.related_model, "Place");
        assert_eq!(relation.relation, "GroupIsLocatedInPlace");
    }

    #[test]
    fn pattern_is_anchored_at_start() {
        let rule = MappingRule::new(
            "Group",
            "http://www.wikidata.org.*",
            &["SELECT ?name WHERE { ?subject rdfs:label ?name }"],
        )
        .expect("rule");
        assert!(rule.matches("http://www.wikidata.org/entity/Q123"));
        assert!(!rule.matches("https://example.org/?see=http://www.wikidata.org/entity/Q1"));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = MappingRule::from_toml_str(
            "superclass = \"Group\"\nregex = \".*\"\nmodel = \"x\"\n",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }), "{err}");
    }

    #[test]
    fn rejects_bad_superclass() {
        let err = MappingRule::new(
            "apis_ontology..Group",
            ".*",
            &["SELECT ?n WHERE { ?subject rdfs:label ?n }"],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTargetType { .. }), "{err}");
    }

    #[test]
    fn rejects_bad_regex() {
        let err = MappingRule::new(
            "Group",
            "http://(www.wikidata.org",
            &["SELECT ?n WHERE { ?subject rdfs:label ?n }"],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }), "{err}");
    }

    #[test]
    fn rejects_pattern_that_only_compiles_once_anchored() {
        let err = MappingRule::new(
            "Group",
            "http://www.wikidata.org/.*)|(viaf",
            &["SELECT ?n WHERE { ?subject rdfs:label ?n }"],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }), "{err}");
        assert!(SourcePattern::new("x)|(y").is_err());
    }

    #[test]
    fn query_errors_name_the_block() {
        let err = MappingRule::new(
            "Group",
            ".*",
            &[
                "SELECT ?n WHERE { ?subject rdfs:label ?n }",
                "SELECT ?m WHERE { ?subject rdfs:label ?m ",
            ],
        )
        .unwrap_err();
        match err {
            ConfigError::QuerySyntax { block, .. } => assert_eq!(block, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_rules_without_queries() {
        let err = MappingRule::new("Group", ".*", &[]).unwrap_err();
        assert!(matches!(err, ConfigError::NoAttributes { .. }), "{err}");
    }

    #[test]
    fn rejects_attribute_projected_twice() {
        let err = MappingRule::new(
            "Group",
            ".*",
            &[
                "SELECT ?name WHERE { ?subject rdfs:label ?name }",
                "SELECT ?name WHERE { ?subject skos:prefLabel ?name }",
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateAttribute { .. }), "{err}");
    }

    #[test]
    fn rejects_malformed_relation_attribute() {
        let err = MappingRule::new(
            "Group",
            ".*",
            &["SELECT ?place__Place WHERE { ?subject wdt:P159 ?place__Place }"],
        )
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::MalformedRelationAttribute { .. }),
            "{err}"
        );
    }

    #[test]
    fn filters_must_name_known_attributes() {
        let text = r#"
superclass = "apis_ontology.models.Person"
regex = "https://d-nb.info.*"

[[attributes]]
sparql = "SELECT ?name ?profession WHERE { ?subject gndo:preferredNameForThePerson ?name ; gndo:professionOrOccupation ?profession }"

[filters]
drop = ["profession"]
full_dates = ["date_of_birth"]
"#;
        let err = MappingRule::from_toml_str(text, Some(Path::new("rules/person.toml")))
            .unwrap_err();
        match err {
            ConfigError::UnknownFilterAttribute { origin, name } => {
                assert_eq!(origin, "rules/person.toml");
                assert_eq!(name, "date_of_birth");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
