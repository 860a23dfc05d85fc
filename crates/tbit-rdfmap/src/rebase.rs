//! Base-URI rewriting for project-internal entity URIs.
//!
//! While an instance is still in development its public base URI may change.
//! Entity URIs minted under the old domain are rewritten to
//! `https://<new base>`, keeping the path. Both `http` and `https` forms of the
//! old domain match, and the domain must be followed by `/` or the end of the
//! URI (`example.org` does not match `example.org.evil`).

use regex::Regex;

use crate::error::RebaseError;

/// Lower-case a domain-ish input and strip any scheme plus trailing `/` or `.`.
pub fn normalise_base(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let trimmed = lowered.trim_end_matches(['/', '.']);
    trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed)
        .to_string()
}

#[derive(Debug, Clone)]
pub struct UriRebase {
    old_domain: String,
    new_base: String,
    pattern: Regex,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebaseSummary {
    /// `(old, new)` pairs for every URI that matched the old base.
    pub rewritten: Vec<(String, String)>,
    /// URIs left untouched.
    pub unchanged: usize,
}

impl UriRebase {
    pub fn new(old_base: &str, new_base: &str) -> Result<Self, RebaseError> {
        let old_domain = normalise_base(old_base);
        let new_domain = normalise_base(new_base);
        if old_domain.is_empty() || new_domain.is_empty() {
            return Err(RebaseError::EmptyBase);
        }
        let pattern = Regex::new(&format!(
            r"(?i)^https?://{}(?P<tail>/|$)",
            regex::escape(&old_domain)
        ))?;
        Ok(Self {
            old_domain,
            new_base: format!("https://{new_domain}"),
            pattern,
        })
    }

    pub fn old_domain(&self) -> &str {
        &self.old_domain
    }

    pub fn new_base(&self) -> &str {
        &self.new_base
    }

    /// The new base already lies under the old one; there is nothing to do.
    pub fn is_noop(&self) -> bool {
        self.pattern.is_match(&self.new_base)
    }

    pub fn matches(&self, uri: &str) -> bool {
        self.pattern.is_match(uri)
    }

    /// Rewrite one URI; `None` when it is not under the old base.
    pub fn rebase(&self, uri: &str) -> Option<String> {
        let caps = self.pattern.captures(uri)?;
        let whole = caps.get(0)?;
        let tail = caps.name("tail").map(|m| m.as_str()).unwrap_or("");
        Some(format!("{}{}{}", self.new_base, tail, &uri[whole.end()..]))
    }

    pub fn apply_all<'a, I>(&self, uris: I) -> RebaseSummary
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut summary = RebaseSummary::default();
        for uri in uris {
            match self.rebase(uri) {
                Some(new_uri) => summary.rewritten.push((uri.to_string(), new_uri)),
                None => summary.unchanged += 1,
            }
        }
        summary
    }
}
