//! Ordered rule set and URI → rule selection.
//!
//! Rules are tried in registration order and the first match wins. Loading a
//! directory registers files in lexicographic file-name order, so overlapping
//! patterns resolve the same way on every machine.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{ConfigError, NoMatchError};
use crate::rule::MappingRule;

/// The configured import rules.
///
/// Built once during the load phase and then shared by `&` reference; nothing
/// mutates it while an import runs.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<MappingRule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Identical pattern text would shadow silently, so it is
    /// rejected.
    pub fn register(&mut self, rule: MappingRule) -> Result<(), ConfigError> {
        if let Some(existing) = self
            .rules
            .iter()
            .find(|r| r.source_pattern() == rule.source_pattern())
        {
            return Err(ConfigError::DuplicatePattern {
                origin: rule.origin_label(),
                pattern: rule.source_pattern().as_str().to_string(),
                existing_origin: existing.origin_label(),
                existing_target: existing.target_type().to_string(),
            });
        }
        debug!(
            target_type = %rule.target_type(),
            pattern = rule.source_pattern().as_str(),
            attributes = rule.attributes().len(),
            "registered import rule"
        );
        self.rules.push(rule);
        Ok(())
    }

    /// Select the rule for `uri`: the first registered rule whose pattern matches.
    pub fn match_uri(&self, uri: &str) -> Result<&MappingRule, NoMatchError> {
        match self.rules.iter().find(|r| r.matches(uri)) {
            Some(rule) => {
                debug!(uri, target_type = %rule.target_type(), "matched import rule");
                Ok(rule)
            }
            None => Err(NoMatchError {
                uri: uri.to_string(),
            }),
        }
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Load and validate every rule before returning; any defect aborts the load.
    pub fn from_rules<I>(rules: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = MappingRule>,
    {
        let mut registry = Self::new();
        for rule in rules {
            registry.register(rule)?;
        }
        Ok(registry)
    }

    /// Load a single rule file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_rules([MappingRule::from_path(path)?])
    }

    pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for path in paths {
            registry.register(MappingRule::from_path(path.as_ref())?)?;
        }
        Ok(registry)
    }

    /// Load every `*.toml` file directly inside `dir`, sorted by file name.
    pub fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
        let files = rule_files(dir)?;
        if files.is_empty() {
            return Err(ConfigError::NoRules {
                path: dir.to_path_buf(),
            });
        }
        let registry = Self::load_files(&files)?;
        info!(
            dir = %dir.display(),
            rules = registry.len(),
            "loaded import rules"
        );
        Ok(registry)
    }
}

fn rule_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| ConfigError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABEL: &str = "SELECT ?name WHERE { ?subject rdfs:label ?name }";

    fn rule(superclass: &str, pattern: &str) -> MappingRule {
        MappingRule::new(superclass, pattern, &[LABEL]).expect("rule")
    }

    #[test]
    fn selects_rule_by_pattern() {
        let registry = RuleRegistry::from_rules([
            rule("apis_ontology.models.Group", "http://www.wikidata.org.*"),
            rule("apis_ontology.models.Person", "https://d-nb.info/gnd/.*"),
        ])
        .expect("registry");

        let matched = registry
            .match_uri("https://d-nb.info/gnd/118509861")
            .expect("match");
        assert_eq!(matched.target_type().model_name(), "Person");
    }

    #[test]
    fn unmatched_uri_is_no_match() {
        let registry =
            RuleRegistry::from_rules([rule("Group", "http://www.wikidata.org.*")]).expect("registry");
        let err = registry.match_uri("https://viaf.org/viaf/1").unwrap_err();
        assert_eq!(err.uri, "https://viaf.org/viaf/1");
    }

    #[test]
    fn first_registered_wins_on_overlap() {
        let registry = RuleRegistry::from_rules([
            rule("Work", "http://www.wikidata.org/entity/Q.*"),
            rule("Group", "http://www.wikidata.org.*"),
        ])
        .expect("registry");
        let matched = registry
            .match_uri("http://www.wikidata.org/entity/Q123")
            .expect("match");
        assert_eq!(matched.target_type().model_name(), "Work");
    }

    #[test]
    fn duplicate_pattern_is_rejected() {
        let mut registry = RuleRegistry::new();
        registry
            .register(rule("Group", "http://www.wikidata.org.*"))
            .expect("first");
        let err = registry
            .register(rule("Work", "http://www.wikidata.org.*"))
            .unwrap_err();
        match err {
            ConfigError::DuplicatePattern {
                pattern,
                existing_target,
                ..
            } => {
                assert_eq!(pattern, "http://www.wikidata.org.*");
                assert_eq!(existing_target, "Group");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_registry_matches_nothing() {
        let registry = RuleRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.match_uri("http://www.wikidata.org/entity/Q1").is_err());
    }
}
