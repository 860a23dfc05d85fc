//! Attribute resolution for one matched URI.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tbit_rdfmap::{DataFilters, MappingRule};
use tracing::debug;

use crate::coalesce::{coalesce, CoalescedValue, LocalePreference};
use crate::error::ResolveError;
use crate::source::{KnowledgeSource, SourceEntity};

/// A related object to create from `target_uri` and link via `relation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationHint {
    pub field: String,
    pub related_model: String,
    pub relation: String,
    pub target_uri: String,
}

/// The record handed to the orchestrator for one URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub uri: String,
    pub target_type: String,
    /// Only attributes with at least one candidate are present.
    pub attributes: BTreeMap<String, CoalescedValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RelationHint>,
}

impl ResolvedEntity {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|v| v.value.as_str())
    }

    /// Apply a rule's data filters; returns the names of removed attributes.
    pub fn apply_filters(&mut self, filters: &DataFilters) -> Vec<String> {
        let mut removed = Vec::new();
        for name in &filters.drop {
            if self.attributes.remove(name).is_some() {
                removed.push(name.clone());
            }
        }
        for name in &filters.full_dates {
            let partial = self
                .attributes
                .get(name)
                .is_some_and(|v| v.value.chars().count() < FULL_DATE_LEN);
            if partial {
                self.attributes.remove(name);
                removed.push(name.clone());
            }
        }
        removed
    }
}

/// Length of a `YYYY-MM-DD` date.
const FULL_DATE_LEN: usize = 10;

/// Runs a rule's queries against a knowledge source.
#[derive(Debug, Clone)]
pub struct Resolver<S> {
    source: S,
    locales: LocalePreference,
}

impl<S: KnowledgeSource> Resolver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            locales: LocalePreference::default(),
        }
    }

    pub fn with_locales(mut self, locales: LocalePreference) -> Self {
        self.locales = locales;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn locales(&self) -> &LocalePreference {
        &self.locales
    }

    /// Execute every query of `rule` once and coalesce one value per
    /// attribute. The first failing query aborts the whole call.
    pub fn resolve(
        &self,
        rule: &MappingRule,
        entity: &SourceEntity,
    ) -> Result<ResolvedEntity, ResolveError> {
        let target_type = rule.target_type().to_string();
        let mut resolved = ResolvedEntity {
            uri: entity.uri.clone(),
            target_type: target_type.clone(),
            attributes: BTreeMap::new(),
            relations: Vec::new(),
        };

        for (index, query) in rule.queries().iter().enumerate() {
            let results = self
                .source
                .select(query, entity)
                .map_err(|source| ResolveError::new(&entity.uri, &target_type, index, source))?;
            debug!(
                uri = %entity.uri,
                query = index,
                rows = results.rows.len(),
                "query answered"
            );

            for spec in rule.attributes().iter().filter(|a| a.query == index) {
                let candidates = results.candidates(&spec.name);
                match &spec.relation {
                    Some(target) => {
                        for candidate in candidates {
                            let hint = RelationHint {
                                field: target.field.clone(),
                                related_model: target.related_model.clone(),
                                relation: target.relation.clone(),
                                target_uri: candidate.value.clone(),
                            };
                            if !resolved.relations.contains(&hint) {
                                resolved.relations.push(hint);
                            }
                        }
                    }
                    None => {
                        if let Some(value) = coalesce(candidates, &self.locales) {
                            resolved.attributes.insert(spec.name.clone(), value);
                        }
                    }
                }
            }
        }

        Ok(resolved)
    }
}
