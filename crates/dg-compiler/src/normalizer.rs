use dg_core::{DomainEntry, DomainError, DomainSet, SuffixList};

/// Turns parser candidates into canonical entries, optionally collapsing
/// each one to its registrable domain.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    suffixes: Option<&'a SuffixList>,
}

/// Result of normalizing one list.
#[derive(Debug, Clone, Default)]
pub struct NormalizedSet {
    pub domains: DomainSet,
    /// Candidates that produced a valid entry.
    pub normalized: usize,
    /// Candidates rejected as invalid domains.
    pub rejected: usize,
    /// Entries that were shortened to their registrable domain.
    pub collapsed: usize,
}

impl<'a> Normalizer<'a> {
    /// Keep domains at the granularity they were listed.
    pub fn exact() -> Self {
        Self { suffixes: None }
    }

    /// Collapse domains to their registrable domain using `suffixes`.
    pub fn collapsing(suffixes: &'a SuffixList) -> Self {
        Self {
            suffixes: Some(suffixes),
        }
    }

    /// Canonical entry for `raw`, and whether it was shortened to its
    /// registrable domain.
    pub fn normalize(&self, raw: &str) -> Result<(DomainEntry, bool), DomainError> {
        let entry = DomainEntry::parse(raw)?;
        Ok(match self.suffixes {
            Some(psl) => {
                let collapsed = psl.collapse(&entry);
                let shortened = collapsed != entry;
                (collapsed, shortened)
            }
            None => (entry, false),
        })
    }

    pub fn normalize_all<I, S>(&self, candidates: I) -> NormalizedSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = NormalizedSet::default();

        for candidate in candidates {
            match self.normalize(candidate.as_ref()) {
                Ok((entry, shortened)) => {
                    out.normalized += 1;
                    if shortened {
                        out.collapsed += 1;
                    }
                    out.domains.insert(entry);
                }
                Err(e) => {
                    out.rejected += 1;
                    log::debug!("rejected: {}", e);
                }
            }
        }

        out
    }
}
