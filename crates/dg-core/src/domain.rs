//! Canonical domain names and domain sets
//!
//! Every string that reaches the merger passes through [`DomainEntry::parse`],
//! so a `DomainEntry` is always lowercase ASCII (non-ASCII labels are
//! punycode-encoded), has no leading or trailing dot and no empty label.
//!
//! # Examples
//!
//! ```
//! use dg_core::domain::DomainEntry;
//!
//! let entry = DomainEntry::parse("Ads.Example.COM.").unwrap();
//! assert_eq!(entry.as_str(), "ads.example.com");
//!
//! let idn = DomainEntry::parse("bücher.de").unwrap();
//! assert_eq!(idn.as_str(), "xn--bcher-kva.de");
//! ```

use std::borrow::Borrow;
use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

/// Maximum length of a domain name in presentation format.
pub const MAX_DOMAIN_LEN: usize = 253;

/// Maximum length of a single label.
pub const MAX_LABEL_LEN: usize = 63;

/// Reasons a candidate string is not a usable domain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("empty domain")]
    Empty,
    #[error("'{domain}' contains illegal character {ch:?}")]
    IllegalCharacter { domain: String, ch: char },
    #[error("'{domain}' could not be IDNA encoded")]
    Idna { domain: String },
    #[error("'{domain}' is {len} bytes long (max 253)")]
    TooLong { domain: String, len: usize },
    #[error("'{domain}' has an empty or oversized label")]
    LabelLength { domain: String },
    #[error("'{domain}' has a label starting or ending with '-'")]
    Hyphen { domain: String },
    #[error("'{domain}' is an IP address")]
    IpLiteral { domain: String },
    #[error("'{domain}' has a numeric top-level label")]
    NumericTld { domain: String },
}

// =============================================================================
// DomainEntry
// =============================================================================

/// A normalized domain name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DomainEntry(String);

impl DomainEntry {
    /// Canonicalize a raw candidate string.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim().trim_matches('.');
        if trimmed.is_empty() {
            return Err(DomainError::Empty);
        }

        if let Some(ch) = trimmed.chars().find(|c| c.is_whitespace()) {
            return Err(DomainError::IllegalCharacter {
                domain: trimmed.to_string(),
                ch,
            });
        }

        let ascii = if trimmed.is_ascii() {
            trimmed.to_ascii_lowercase()
        } else {
            idna::domain_to_ascii(trimmed).map_err(|_| DomainError::Idna {
                domain: trimmed.to_string(),
            })?
        };

        validate_ascii(&ascii)?;
        Ok(Self(ascii))
    }

    /// Wrap a string that is already known to be canonical, such as a
    /// suffix of an existing entry that ends on a label boundary.
    pub(crate) fn from_canonical(name: &str) -> Self {
        debug_assert!(validate_ascii(name).is_ok());
        Self(name.to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when `self` is a strict sub-domain of `other`.
    pub fn is_subdomain_of(&self, other: &DomainEntry) -> bool {
        let (this, other) = (self.0.as_str(), other.0.as_str());
        this.len() > other.len()
            && this.ends_with(other)
            && this.as_bytes()[this.len() - other.len() - 1] == b'.'
    }

    /// `true` when `self` equals `other` or is one of its sub-domains.
    pub fn is_within(&self, other: &DomainEntry) -> bool {
        self == other || self.is_subdomain_of(other)
    }

    /// Walk the name from most specific to least specific.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors {
            current: Some(self.0.as_str()),
        }
    }
}

impl fmt::Display for DomainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Ord on the newtype matches Ord on the inner string, so sets of entries can
// be probed with plain `&str` keys.
impl Borrow<str> for DomainEntry {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DomainEntry {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn validate_ascii(name: &str) -> Result<(), DomainError> {
    if name.is_empty() {
        return Err(DomainError::Empty);
    }

    if name.len() > MAX_DOMAIN_LEN {
        return Err(DomainError::TooLong {
            domain: name.to_string(),
            len: name.len(),
        });
    }

    if name.parse::<IpAddr>().is_ok() {
        return Err(DomainError::IpLiteral {
            domain: name.to_string(),
        });
    }

    for label in name.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(DomainError::LabelLength {
                domain: name.to_string(),
            });
        }

        if let Some(ch) = label
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_'))
        {
            return Err(DomainError::IllegalCharacter {
                domain: name.to_string(),
                ch,
            });
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(DomainError::Hyphen {
                domain: name.to_string(),
            });
        }
    }

    // Single labels are allowed; only multi-label names need a real TLD.
    if let Some((_, tld)) = name.rsplit_once('.') {
        if tld.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::NumericTld {
                domain: name.to_string(),
            });
        }
    }

    Ok(())
}

/// Get the parent domain (strip leftmost label).
pub fn get_parent_domain(host: &str) -> Option<&str> {
    match host.find('.') {
        Some(idx) if idx < host.len() - 1 => Some(&host[idx + 1..]),
        _ => None,
    }
}

/// Iterator over a name and each of its parent domains.
pub struct Ancestors<'a> {
    current: Option<&'a str>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current?;
        self.current = get_parent_domain(result);
        Some(result)
    }
}

// =============================================================================
// DomainSet
// =============================================================================

/// An ordered set of unique domains.
///
/// Iteration is lexicographic, which keeps rendered output stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSet {
    entries: BTreeSet<DomainEntry>,
}

impl DomainSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. Returns `false` if it was already present.
    pub fn insert(&mut self, entry: DomainEntry) -> bool {
        self.entries.insert(entry)
    }

    pub fn remove(&mut self, entry: &DomainEntry) -> bool {
        self.entries.remove(entry)
    }

    /// Find the member that equals `entry` or is one of its ancestors.
    ///
    /// The most specific covering member is returned.
    pub fn covering(&self, entry: &DomainEntry) -> Option<&DomainEntry> {
        entry
            .ancestors()
            .find_map(|name| self.entries.get(name))
    }

    /// Like [`covering`](Self::covering), but ignores `entry` itself.
    pub fn strict_ancestor_of(&self, entry: &DomainEntry) -> Option<&DomainEntry> {
        entry
            .ancestors()
            .skip(1)
            .find_map(|name| self.entries.get(name))
    }

    /// Add every entry of `other` to this set.
    pub fn union_with(&mut self, other: DomainSet) {
        self.entries.extend(other.entries);
    }

    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&DomainEntry) -> bool,
    {
        self.entries.retain(f);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, DomainEntry> {
        self.entries.iter()
    }
}

impl FromIterator<DomainEntry> for DomainSet {
    fn from_iter<I: IntoIterator<Item = DomainEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<DomainEntry> for DomainSet {
    fn extend<I: IntoIterator<Item = DomainEntry>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for DomainSet {
    type Item = DomainEntry;
    type IntoIter = btree_set::IntoIter<DomainEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a DomainSet {
    type Item = &'a DomainEntry;
    type IntoIter = btree_set::Iter<'a, DomainEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
