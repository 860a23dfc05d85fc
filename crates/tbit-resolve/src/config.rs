//! Run configuration (`reconcile.toml`). Every field has a default, so an
//! empty file is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coalesce::LocalePreference;
use crate::retry::RetryPolicy;

pub const DEFAULT_ENDPOINT: &str = "https://query.wikidata.org/sparql";
pub const DEFAULT_USER_AGENT: &str = concat!("tbit-reconcile/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration in {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileConfig {
    pub locales: LocaleSection,
    pub source: SourceSection,
    pub retry: RetrySection,
    pub import: ImportSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocaleSection {
    pub primary: String,
    pub fallback: String,
}

impl Default for LocaleSection {
    fn default() -> Self {
        let prefs = LocalePreference::default();
        Self {
            primary: prefs.primary,
            fallback: prefs.fallback,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSection {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            multiplier: policy.multiplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportSection {
    pub rules_dir: Option<PathBuf>,
    pub workers: usize,
}

impl Default for ImportSection {
    fn default() -> Self {
        Self {
            rules_dir: None,
            workers: 1,
        }
    }
}

impl ReconcileConfig {
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, SettingsError> {
        let config: Self = toml::from_str(text).map_err(|source| SettingsError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.locales.primary.trim().is_empty() {
            return Err(SettingsError::Invalid("locales.primary is empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(SettingsError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            return Err(SettingsError::Invalid(
                "retry.multiplier must be >= 1.0".into(),
            ));
        }
        if self.source.timeout_secs == 0 {
            return Err(SettingsError::Invalid(
                "source.timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn locale_preference(&self) -> LocalePreference {
        LocalePreference::new(&self.locales.primary, &self.locales.fallback)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            multiplier: self.retry.multiplier,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_secs)
    }
}
