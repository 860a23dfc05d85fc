//! Locale-aware coalescing of attribute candidates into one scalar.
//!
//! Priority chain, strictly ordered:
//!
//! 1. a candidate tagged with the primary locale,
//! 2. a candidate tagged with the fallback locale,
//! 3. the first untagged candidate,
//! 4. the first candidate of any tag.
//!
//! Within a tier the first candidate in row order wins. Tags compare
//! ASCII case-insensitively and a regional subtag satisfies its language
//! (`de-AT` counts as `de`).

use serde::{Deserialize, Serialize};

use crate::source::{Candidate, TermKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalePreference {
    pub primary: String,
    pub fallback: String,
}

impl Default for LocalePreference {
    fn default() -> Self {
        Self {
            primary: "de".to_string(),
            fallback: "en".to_string(),
        }
    }
}

impl LocalePreference {
    pub fn new(primary: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
        }
    }
}

/// The value chosen for one (entity, attribute) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoalescedValue {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default)]
    pub kind: TermKind,
}

impl From<&Candidate> for CoalescedValue {
    fn from(c: &Candidate) -> Self {
        Self {
            value: c.value.clone(),
            locale: c.locale().map(str::to_string),
            kind: c.kind,
        }
    }
}

/// `true` when `tag` is `wanted` or one of its subtags.
pub fn locale_matches(tag: &str, wanted: &str) -> bool {
    if wanted.is_empty() {
        return false;
    }
    match (tag.get(..wanted.len()), tag.get(wanted.len()..)) {
        (Some(head), Some(rest)) => {
            head.eq_ignore_ascii_case(wanted) && (rest.is_empty() || rest.starts_with('-'))
        }
        _ => false,
    }
}

/// Pick one value from `candidates`; `None` when there are none.
pub fn coalesce<'a, I>(candidates: I, prefs: &LocalePreference) -> Option<CoalescedValue>
where
    I: IntoIterator<Item = &'a Candidate>,
{
    let candidates: Vec<&Candidate> = candidates.into_iter().collect();
    let tagged = |wanted: &str| {
        candidates
            .iter()
            .find(|c| c.locale().is_some_and(|tag| locale_matches(tag, wanted)))
            .copied()
    };

    tagged(&prefs.primary)
        .or_else(|| tagged(&prefs.fallback))
        .or_else(|| candidates.iter().find(|c| c.locale().is_none()).copied())
        .or_else(|| candidates.first().copied())
        .map(CoalescedValue::from)
}
