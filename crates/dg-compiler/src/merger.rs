use dg_core::{DomainEntry, DomainSet};

pub struct MergeStats {
    /// Entries across all blacklists before deduplication.
    pub before: usize,
    /// Size of the blacklist union.
    pub merged: usize,
    /// Entries removed because a whitelist entry covers them.
    pub whitelisted: usize,
    /// Entries dropped because an ancestor is already blocked.
    pub pruned: usize,
    pub after: usize,
    /// Whitelist entries that stay blocked through a blocked parent,
    /// paired with that parent.
    pub shadowed: Vec<(DomainEntry, DomainEntry)>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Drop entries whose parent is also blocked. Only sound when the
    /// output format blocks sub-domains of each entry (dnsmasq).
    pub prune_redundant: bool,
}

/// Union the blacklists and subtract the whitelist.
///
/// A blacklist entry is removed when it equals a whitelist entry or is a
/// sub-domain of one. The result iterates in lexicographic order, and the
/// outcome does not depend on the order of `blacklists`.
pub fn merge_sets<I>(blacklists: I, whitelist: &DomainSet, options: MergeOptions) -> (DomainSet, MergeStats)
where
    I: IntoIterator<Item = DomainSet>,
{
    let mut before = 0usize;
    let mut blocked = DomainSet::new();
    for list in blacklists {
        before += list.len();
        blocked.union_with(list);
    }
    let merged = blocked.len();

    let mut whitelisted = 0usize;
    blocked.retain(|domain| match whitelist.covering(domain) {
        Some(allowed) => {
            whitelisted += 1;
            log::debug!("unblocking {} (whitelisted by {})", domain, allowed);
            false
        }
        None => true,
    });

    let mut pruned = 0usize;
    if options.prune_redundant {
        let redundant: Vec<DomainEntry> = blocked
            .iter()
            .filter(|domain| blocked.strict_ancestor_of(domain).is_some())
            .cloned()
            .collect();
        for domain in &redundant {
            blocked.remove(domain);
        }
        pruned = redundant.len();
    }

    let mut shadowed = Vec::new();
    for allowed in whitelist {
        if let Some(parent) = blocked.strict_ancestor_of(allowed) {
            log::warn!(
                "{} is whitelisted but its parent {} is blocked; whitelist {} to unblock it",
                allowed,
                parent,
                parent
            );
            shadowed.push((allowed.clone(), parent.clone()));
        }
    }

    let after = blocked.len();

    (
        blocked,
        MergeStats {
            before,
            merged,
            whitelisted,
            pruned,
            after,
            shadowed,
        },
    )
}
