//! Reference batch driver: match → resolve → persist for a list of URIs.
//!
//! Persistence belongs to the host application; the driver only talks to an
//! `EntitySink`. A failing entity is skipped and reported, never fatal for the
//! batch.

use std::collections::{BTreeMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tbit_rdfmap::{MappingRule, RuleRegistry};
use tracing::{debug, info, warn};

use crate::resolver::{ResolvedEntity, Resolver};
use crate::source::{KnowledgeSource, SourceEntity};

// ============================================================================
// Sink contract
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistOutcome {
    Created,
    Existing,
}

/// Where resolved entities go. Implementations synchronize internally.
pub trait EntitySink: Send + Sync {
    /// An entity for `uri` is already stored; the driver will not resolve it again.
    fn contains(&self, _uri: &str) -> bool {
        false
    }

    fn persist(&self, rule: &MappingRule, entity: &ResolvedEntity) -> Result<PersistOutcome>;
}

/// Keeps entities in memory, keyed by URI.
#[derive(Debug, Default)]
pub struct MemorySink {
    entities: Mutex<BTreeMap<String, ResolvedEntity>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uri: &str) -> Option<ResolvedEntity> {
        self.entities.lock().get(uri).cloned()
    }

    pub fn len(&self) -> usize {
        self.entities.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.lock().is_empty()
    }
}

impl EntitySink for MemorySink {
    fn contains(&self, uri: &str) -> bool {
        self.entities.lock().contains_key(uri)
    }

    fn persist(&self, _rule: &MappingRule, entity: &ResolvedEntity) -> Result<PersistOutcome> {
        let mut entities = self.entities.lock();
        if entities.contains_key(&entity.uri) {
            return Ok(PersistOutcome::Existing);
        }
        entities.insert(entity.uri.clone(), entity.clone());
        Ok(PersistOutcome::Created)
    }
}

/// Appends one JSON object per line. URIs already in the file count as existing.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    state: Mutex<JsonLinesState>,
}

#[derive(Debug)]
struct JsonLinesState {
    file: File,
    known: HashSet<String>,
}

impl JsonLinesSink {
    pub fn open(path: &Path) -> Result<Self> {
        let mut known = HashSet::new();
        if path.exists() {
            let reader = BufReader::new(
                File::open(path).with_context(|| format!("failed to read {}", path.display()))?,
            );
            for (line_no, line) in reader.lines().enumerate() {
                let line = line.with_context(|| format!("failed to read {}", path.display()))?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: ResolvedEntity = serde_json::from_str(&line).with_context(|| {
                    format!("{}:{}: not an entity record", path.display(), line_no + 1)
                })?;
                known.insert(record.uri);
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(JsonLinesState { file, known }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EntitySink for JsonLinesSink {
    fn contains(&self, uri: &str) -> bool {
        self.state.lock().known.contains(uri)
    }

    fn persist(&self, _rule: &MappingRule, entity: &ResolvedEntity) -> Result<PersistOutcome> {
        let mut state = self.state.lock();
        if state.known.contains(&entity.uri) {
            return Ok(PersistOutcome::Existing);
        }
        let line = serde_json::to_string(entity)?;
        writeln!(state.file, "{line}")
            .and_then(|_| state.file.flush())
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        state.known.insert(entity.uri.clone());
        Ok(PersistOutcome::Created)
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoMatch,
    SourceUnavailable,
    InvalidResponse,
    Persist,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NoMatch => "no matching rule",
            Self::SourceUnavailable => "source unavailable",
            Self::InvalidResponse => "invalid response",
            Self::Persist => "persist failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedEntity {
    pub uri: String,
    pub target_type: String,
    pub outcome: PersistOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntity {
    pub uri: String,
    pub reason: SkipReason,
    pub detail: String,
}

/// Per-URI outcomes, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: Vec<ImportedEntity>,
    pub skipped: Vec<SkippedEntity>,
}

impl ImportReport {
    pub fn created(&self) -> usize {
        self.count(PersistOutcome::Created)
    }

    pub fn existing(&self) -> usize {
        self.count(PersistOutcome::Existing)
    }

    fn count(&self, outcome: PersistOutcome) -> usize {
        self.imported.iter().filter(|e| e.outcome == outcome).count()
    }

    pub fn skipped_by_reason(&self) -> BTreeMap<SkipReason, usize> {
        let mut counts = BTreeMap::new();
        for s in &self.skipped {
            *counts.entry(s.reason).or_insert(0) += 1;
        }
        counts
    }
}

enum Outcome {
    Imported(ImportedEntity),
    Skipped(SkippedEntity),
}

// ============================================================================
// Driver
// ============================================================================

pub struct ImportRun<'a, S> {
    registry: &'a RuleRegistry,
    resolver: &'a Resolver<S>,
    workers: usize,
    apply_filters: bool,
}

impl<'a, S: KnowledgeSource> ImportRun<'a, S> {
    pub fn new(registry: &'a RuleRegistry, resolver: &'a Resolver<S>) -> Self {
        Self {
            registry,
            resolver,
            workers: 1,
            apply_filters: true,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn apply_filters(mut self, apply: bool) -> Self {
        self.apply_filters = apply;
        self
    }

    /// Import every URI. The report keeps input order whatever the worker count.
    pub fn run<U, K>(&self, uris: &[U], sink: &K) -> Result<ImportReport>
    where
        U: AsRef<str> + Sync,
        K: EntitySink + ?Sized,
    {
        let outcomes: Vec<Outcome> = if self.workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()
                .context("failed to build import worker pool")?;
            pool.install(|| {
                uris.par_iter()
                    .map(|uri| self.import_one(uri.as_ref(), sink))
                    .collect()
            })
        } else {
            uris.iter()
                .map(|uri| self.import_one(uri.as_ref(), sink))
                .collect()
        };

        let mut report = ImportReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Imported(e) => report.imported.push(e),
                Outcome::Skipped(s) => report.skipped.push(s),
            }
        }
        info!(
            created = report.created(),
            existing = report.existing(),
            skipped = report.skipped.len(),
            "import finished"
        );
        Ok(report)
    }

    fn import_one<K: EntitySink + ?Sized>(&self, uri: &str, sink: &K) -> Outcome {
        let skip = |reason: SkipReason, detail: String| {
            warn!(uri, reason = %reason, detail = %detail, "skipping entity");
            Outcome::Skipped(SkippedEntity {
                uri: uri.to_string(),
                reason,
                detail,
            })
        };

        let rule = match self.registry.match_uri(uri) {
            Ok(rule) => rule,
            Err(err) => return skip(SkipReason::NoMatch, err.to_string()),
        };

        if sink.contains(uri) {
            debug!(uri, "entity already stored");
            return Outcome::Imported(ImportedEntity {
                uri: uri.to_string(),
                target_type: rule.target_type().to_string(),
                outcome: PersistOutcome::Existing,
            });
        }

        let mut entity = match self.resolver.resolve(rule, &SourceEntity::new(uri)) {
            Ok(entity) => entity,
            Err(err) if err.is_source_unavailable() => {
                return skip(SkipReason::SourceUnavailable, err.to_string())
            }
            Err(err) => return skip(SkipReason::InvalidResponse, err.to_string()),
        };

        if self.apply_filters {
            let removed = entity.apply_filters(rule.filters());
            if !removed.is_empty() {
                debug!(uri, removed = ?removed, "filtered attributes");
            }
        }

        match sink.persist(rule, &entity) {
            Ok(outcome) => {
                info!(
                    uri,
                    target_type = %rule.target_type(),
                    outcome = ?outcome,
                    "imported entity"
                );
                Outcome::Imported(ImportedEntity {
                    uri: uri.to_string(),
                    target_type: entity.target_type,
                    outcome,
                })
            }
            Err(err) => skip(SkipReason::Persist, format!("{err:#}")),
        }
    }
}
