//! Public Suffix List (PSL) utilities for eTLD+1 extraction
//!
//! The list is parsed from the standard `public_suffix_list.dat` text into
//! three rule sets and then queried without any global state: the caller
//! owns the [`SuffixList`] and passes it to whatever needs it.
//!
//! # Examples
//!
//! ```
//! use dg_core::psl::SuffixList;
//!
//! let psl: SuffixList = "com\nuk\nco.uk\n".parse().unwrap();
//! assert_eq!(psl.registrable_domain("analytics.google.com"), Some("google.com"));
//! assert_eq!(psl.registrable_domain("foo.bar.co.uk"), Some("bar.co.uk"));
//! assert_eq!(psl.registrable_domain("co.uk"), None);
//! ```

use std::collections::HashSet;
use std::str::FromStr;

use crate::domain::DomainEntry;

/// Error type for suffix list loading.
#[derive(Debug, thiserror::Error)]
pub enum PslError {
    #[error("suffix list contains no rules")]
    Empty,
}

// =============================================================================
// PSL Rule Sets
// =============================================================================

/// Parsed public suffix rules.
#[derive(Debug, Default, Clone)]
pub struct SuffixList {
    /// Exact rules (e.g., "com", "co.uk")
    exact: HashSet<String>,

    /// Wildcard rules (e.g., "*.ck" stored as "ck")
    wildcard: HashSet<String>,

    /// Exception rules (e.g., "!www.ck" stored as "www.ck")
    exception: HashSet<String>,
}

impl SuffixList {
    /// Parse the `public_suffix_list.dat` format.
    ///
    /// Comment lines (`//`) and blank lines are ignored, as is anything after
    /// the first whitespace on a rule line. Unicode rules are stored in their
    /// punycode form so they match normalized domains.
    pub fn parse(text: &str) -> Result<Self, PslError> {
        let mut list = Self::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }

            let rule = match line.split_whitespace().next() {
                Some(rule) => rule,
                None => continue,
            };

            let (set, name) = if let Some(rest) = rule.strip_prefix('!') {
                (&mut list.exception, rest)
            } else if let Some(rest) = rule.strip_prefix("*.") {
                (&mut list.wildcard, rest)
            } else {
                (&mut list.exact, rule)
            };

            match to_ascii_rule(name) {
                Some(ascii) => {
                    set.insert(ascii);
                }
                None => log::debug!("skipping unparseable suffix rule '{}'", rule),
            }
        }

        if list.rule_count() == 0 {
            return Err(PslError::Empty);
        }

        log::debug!(
            "loaded suffix list: {} exact, {} wildcard, {} exception rules",
            list.exact.len(),
            list.wildcard.len(),
            list.exception.len()
        );

        Ok(list)
    }

    /// Total number of rules.
    pub fn rule_count(&self) -> usize {
        self.exact.len() + self.wildcard.len() + self.exception.len()
    }

    /// Get the eTLD+1 (registrable domain) for a lowercase ASCII hostname.
    ///
    /// The result is always a suffix of `host` ending on a label boundary.
    /// Returns `None` when `host` is itself a public suffix.
    pub fn registrable_domain<'a>(&self, host: &'a str) -> Option<&'a str> {
        let starts = label_starts(host);
        let n = starts.len();

        for i in 0..n {
            let suffix = &host[starts[i]..];

            // Exception rules override wildcards
            if self.exception.contains(suffix) {
                return Some(suffix);
            }

            let is_public = self.exact.contains(suffix)
                || (i + 1 < n && self.wildcard.contains(&host[starts[i + 1]..]));
            if is_public {
                return if i > 0 { Some(&host[starts[i - 1]..]) } else { None };
            }
        }

        // Default rule "*": the public suffix is the last label.
        if n >= 2 {
            Some(&host[starts[n - 2]..])
        } else {
            None
        }
    }

    /// Reduce an entry to its registrable domain.
    ///
    /// Entries that are themselves public suffixes are returned unchanged.
    pub fn collapse(&self, entry: &DomainEntry) -> DomainEntry {
        match self.registrable_domain(entry.as_str()) {
            Some(domain) if domain.len() < entry.as_str().len() => DomainEntry::from_canonical(domain),
            _ => entry.clone(),
        }
    }
}

impl FromStr for SuffixList {
    type Err = PslError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Byte offsets where each label of `host` starts.
fn label_starts(host: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(
        host.bytes()
            .enumerate()
            .filter(|&(_, b)| b == b'.')
            .map(|(i, _)| i + 1),
    );
    starts
}

fn to_ascii_rule(rule: &str) -> Option<String> {
    if rule.is_empty() {
        return None;
    }
    if rule.is_ascii() {
        return Some(rule.to_ascii_lowercase());
    }
    idna::domain_to_ascii(rule).ok()
}
