//! The full load → parse → normalize → merge → render run.

use std::path::Path;

use dg_core::{Configuration, DomainSet, ListSource, OutputMode, SuffixList};
use serde::Serialize;

use crate::cache::ListCache;
use crate::error::Error;
use crate::loader::{Fetcher, Origin, SourceLoader};
use crate::merger::{merge_sets, MergeOptions};
use crate::normalizer::Normalizer;
use crate::parser::parse_list;
use crate::renderer::render;

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub sources_loaded: usize,
    pub sources_failed: usize,
    pub sources_cached: usize,
    pub lines: usize,
    pub malformed: usize,
    pub reserved: usize,
    pub mixed: usize,
    pub candidates: usize,
    pub normalized: usize,
    pub rejected: usize,
    pub collapsed: usize,
    pub whitelist: usize,
    pub merged: usize,
    pub whitelisted: usize,
    pub pruned: usize,
    pub shadowed: usize,
    #[serde(rename = "final")]
    pub final_count: usize,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub text: String,
    pub domains: DomainSet,
    pub summary: Summary,
}

pub fn run(config: &Configuration, fetcher: &dyn Fetcher) -> Result<RunOutput, Error> {
    let blacklist_sources = with_local_list(&config.blacklists, &config.local_lists.blacklist);
    let whitelist_sources = with_local_list(&config.whitelists, &config.local_lists.whitelist);
    if blacklist_sources.is_empty() {
        return Err(Error::BlacklistUnavailable { failed: 0 });
    }

    let loader = SourceLoader::new(fetcher, ListCache::from_policy(&config.cache));
    let mut summary = Summary::default();

    // Fail before any list is fetched if collapsing cannot be done correctly.
    let suffixes = if config.block_at_tld {
        if config.mode == OutputMode::Hosts {
            log::warn!("block-at-tld in hosts mode blocks only the registrable domain itself, not its sub-domains");
        }
        Some(load_suffix_list(&loader, &config.suffix_list)?)
    } else {
        None
    };

    let mut whitelist = DomainSet::new();
    for source in &whitelist_sources {
        log::info!("Reading whitelist: {}", source);
        if let Some(domains) = load_source(&loader, source, Normalizer::exact(), &mut summary) {
            whitelist.union_with(domains);
        }
    }
    summary.whitelist = whitelist.len();
    log::info!("{} whitelisted domains", whitelist.len());

    let blacklist_normalizer = match &suffixes {
        Some(psl) => Normalizer::collapsing(psl),
        None => Normalizer::exact(),
    };

    let mut blacklists = Vec::with_capacity(blacklist_sources.len());
    let mut failed = 0usize;
    for source in &blacklist_sources {
        log::info!("Reading blacklist: {}", source);
        match load_source(&loader, source, blacklist_normalizer, &mut summary) {
            Some(domains) => blacklists.push(domains),
            None => failed += 1,
        }
    }
    if blacklists.is_empty() {
        return Err(Error::BlacklistUnavailable { failed });
    }

    let options = MergeOptions {
        prune_redundant: config.mode == OutputMode::Dnsmasq,
    };
    let (domains, stats) = merge_sets(blacklists, &whitelist, options);
    log::info!(
        "{} domains merged, {} whitelisted, {} redundant, {} final",
        stats.merged,
        stats.whitelisted,
        stats.pruned,
        stats.after
    );
    if domains.is_empty() {
        log::warn!("the list of domains to block is empty");
    }

    summary.merged = stats.merged;
    summary.whitelisted = stats.whitelisted;
    summary.pruned = stats.pruned;
    summary.shadowed = stats.shadowed.len();
    summary.final_count = stats.after;

    let text = render(&domains, config);
    Ok(RunOutput {
        text,
        domains,
        summary,
    })
}

/// Load and parse the public suffix list.
pub fn load_suffix_list(loader: &SourceLoader<'_>, source: &ListSource) -> Result<SuffixList, Error> {
    let loaded = loader.load(source).map_err(|e| Error::SuffixLookupFailure {
        reason: e.to_string(),
    })?;
    let list = SuffixList::parse(&loaded.text).map_err(|e| Error::SuffixLookupFailure {
        reason: format!("{}: {}", source, e),
    })?;
    log::info!("Loaded {} public suffix rules from {}", list.rule_count(), source);
    Ok(list)
}

/// Configured sources plus the local list when that file exists. A missing
/// local list is the normal state and is neither warned about nor counted.
fn with_local_list(sources: &[ListSource], local: &Path) -> Vec<ListSource> {
    let mut all = sources.to_vec();
    if local.is_file() {
        let source = ListSource::Path(local.to_path_buf());
        if !all.contains(&source) {
            all.push(source);
        }
    } else {
        log::debug!("No local list at {}", local.display());
    }
    all
}

/// Load one list into a normalized set. A source that cannot be loaded is
/// logged and counted, and yields `None`.
fn load_source(
    loader: &SourceLoader<'_>,
    source: &ListSource,
    normalizer: Normalizer<'_>,
    summary: &mut Summary,
) -> Option<DomainSet> {
    let loaded = match loader.load(source) {
        Ok(loaded) => loaded,
        Err(e) => {
            log::warn!("{}, skipping", e);
            summary.sources_failed += 1;
            return None;
        }
    };
    summary.sources_loaded += 1;
    if loaded.origin == Origin::Cache {
        summary.sources_cached += 1;
    }

    let parsed = parse_list(&loaded.text, source.format_hint());
    summary.lines += parsed.lines;
    summary.malformed += parsed.malformed;
    summary.reserved += parsed.reserved;
    summary.mixed += parsed.mixed;
    summary.candidates += parsed.candidates.len();

    let normalized = normalizer.normalize_all(&parsed.candidates);
    summary.normalized += normalized.normalized;
    summary.rejected += normalized.rejected;
    summary.collapsed += normalized.collapsed;

    log::info!(
        "{}: {} lines, {} domains ({} malformed, {} rejected)",
        source,
        parsed.lines,
        normalized.domains.len(),
        parsed.malformed,
        normalized.rejected
    );

    Some(normalized.domains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::net::IpAddr;
    use std::path::PathBuf;
    use std::time::Duration;

    use dg_core::{CachePolicy, DomainEntry, LocalLists, OutputOptions};

    use crate::loader::tests::StaticFetcher;

    const HOSTS_URL: &str = "http://lists.example/hosts";
    const PSL: &str = "com\nnet\norg\nuk\nco.uk\n";

    fn write(dir: &Path, name: &str, text: &str) -> ListSource {
        let path = dir.join(name);
        fs::write(&path, text).expect("write list");
        ListSource::Path(path)
    }

    fn config(dir: &Path, blacklists: Vec<ListSource>, whitelists: Vec<ListSource>) -> Configuration {
        Configuration {
            mode: OutputMode::Dnsmasq,
            block_at_tld: false,
            dest_ip: None,
            blacklists,
            whitelists,
            local_lists: LocalLists {
                blacklist: dir.join("local").join("blacklist"),
                whitelist: dir.join("local").join("whitelist"),
            },
            suffix_list: write(dir, "public_suffix_list.dat", PSL),
            cache: CachePolicy::Disabled,
            fetch_timeout: Duration::from_secs(15),
            output: OutputOptions {
                path: PathBuf::from("-"),
                backup: false,
                no_clobber: false,
            },
        }
    }

    fn body(text: &str) -> Vec<&str> {
        text.lines().filter(|line| !line.starts_with('#') && !line.is_empty()).collect()
    }

    fn names(set: &DomainSet) -> Vec<&str> {
        set.iter().map(DomainEntry::as_str).collect()
    }

    #[test]
    fn whitelist_subsumes_subdomains() {
        let dir = tempfile::tempdir().expect("tempdir");
        let black = write(dir.path(), "black", "ads.example.com\ntracker.net\n");
        let white = write(dir.path(), "white", "example.com\n");
        let cfg = config(dir.path(), vec![black], vec![white]);

        let out = run(&cfg, &StaticFetcher::default()).expect("run");
        assert_eq!(names(&out.domains), vec!["tracker.net"]);
        assert_eq!(body(&out.text), vec!["server=/tracker.net/"]);
        assert_eq!(out.summary.whitelisted, 1);
        assert_eq!(out.summary.final_count, 1);
    }

    #[test]
    fn block_at_tld_collapses_then_whitelists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let black = write(dir.path(), "black", "ads.example.com\ntracker.net\n");
        let white = write(dir.path(), "white", "example.com\n");
        let mut cfg = config(dir.path(), vec![black], vec![white]);
        cfg.block_at_tld = true;

        let out = run(&cfg, &StaticFetcher::default()).expect("run");
        assert_eq!(names(&out.domains), vec!["tracker.net"]);
        assert_eq!(out.summary.collapsed, 1);
        assert_eq!(out.summary.merged, 2);
    }

    #[test]
    fn block_at_tld_keeps_whitelist_granularity() {
        let dir = tempfile::tempdir().expect("tempdir");
        let black = write(dir.path(), "black", "ads.example.com\n");
        let white = write(dir.path(), "white", "mail.example.com\n");
        let mut cfg = config(dir.path(), vec![black], vec![white]);
        cfg.block_at_tld = true;

        let out = run(&cfg, &StaticFetcher::default()).expect("run");
        assert_eq!(names(&out.domains), vec!["example.com"]);
        assert_eq!(out.summary.shadowed, 1);
    }

    #[test]
    fn renders_redirect_modes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let black = write(dir.path(), "black", "tracker.net\n");
        let mut cfg = config(dir.path(), vec![black], vec![]);

        cfg.dest_ip = Some("10.0.0.1".parse::<IpAddr>().expect("ip"));
        let out = run(&cfg, &StaticFetcher::default()).expect("run");
        assert_eq!(body(&out.text), vec!["address=/tracker.net/10.0.0.1"]);

        cfg.mode = OutputMode::Hosts;
        cfg.dest_ip = None;
        let out = run(&cfg, &StaticFetcher::default()).expect("run");
        assert_eq!(body(&out.text), vec!["127.0.0.1 tracker.net"]);
    }

    #[test]
    fn remote_and_local_sources_merge() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = StaticFetcher::default().with(
            HOSTS_URL,
            "# hosts\n127.0.0.1 localhost\n0.0.0.0 ads.example.com\n0.0.0.0 tracker.net # t\n",
        );
        let local = write(dir.path(), "black", "extra.org\ntracker.net\n");
        let cfg = config(dir.path(), vec![ListSource::parse(HOSTS_URL), local], vec![]);

        let out = run(&cfg, &fetcher).expect("run");
        assert_eq!(names(&out.domains), vec!["ads.example.com", "extra.org", "tracker.net"]);
        assert_eq!(out.summary.sources_loaded, 2);
        assert_eq!(out.summary.reserved, 1);
    }

    #[test]
    fn output_is_byte_identical_across_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let black = write(dir.path(), "black", "zeta.net\nads.example.com\nb.org\n");
        let cfg = config(dir.path(), vec![black], vec![]);

        let first = run(&cfg, &StaticFetcher::default()).expect("run");
        let second = run(&cfg, &StaticFetcher::default()).expect("run");
        assert_eq!(first.text, second.text);
    }

    #[test]
    fn source_order_does_not_matter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = write(dir.path(), "a", "ads.example.com\nshared.net\n");
        let b = write(dir.path(), "b", "shared.net\nexample.com\nzz.org\n");
        let ab = config(dir.path(), vec![a.clone(), b.clone()], vec![]);
        let ba = config(dir.path(), vec![b, a], vec![]);

        let out_ab = run(&ab, &StaticFetcher::default()).expect("run");
        let out_ba = run(&ba, &StaticFetcher::default()).expect("run");
        assert_eq!(out_ab.domains, out_ba.domains);
        assert_eq!(body(&out_ab.text), body(&out_ba.text));
    }

    #[test]
    fn one_bad_line_among_nine() {
        let dir = tempfile::tempdir().expect("tempdir");
        let text = "one.com\ntwo.com\nthree.com\nfour.com\nbad..domain\nfive.com\nsix.com\nseven.com\neight.com\nnine.com\n";
        let black = write(dir.path(), "black", text);
        let cfg = config(dir.path(), vec![black], vec![]);

        let out = run(&cfg, &StaticFetcher::default()).expect("run");
        assert_eq!(out.domains.len(), 9);
        assert_eq!(out.summary.rejected, 1);
        assert_eq!(out.summary.malformed, 0);
    }

    #[test]
    fn failed_source_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = write(dir.path(), "black", "tracker.net\n");
        let cfg = config(dir.path(), vec![ListSource::parse(HOSTS_URL), good], vec![]);

        let out = run(&cfg, &StaticFetcher::default()).expect("run");
        assert_eq!(names(&out.domains), vec!["tracker.net"]);
        assert_eq!(out.summary.sources_failed, 1);
    }

    #[test]
    fn all_blacklists_failing_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = ListSource::Path(dir.path().join("missing"));
        let cfg = config(dir.path(), vec![ListSource::parse(HOSTS_URL), missing], vec![]);

        let err = run(&cfg, &StaticFetcher::default()).expect_err("no blacklist");
        assert!(matches!(err, Error::BlacklistUnavailable { failed: 2 }));
    }

    #[test]
    fn missing_whitelist_is_not_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let black = write(dir.path(), "black", "tracker.net\n");
        let white = ListSource::Path(dir.path().join("missing"));
        let cfg = config(dir.path(), vec![black], vec![white]);

        let out = run(&cfg, &StaticFetcher::default()).expect("run");
        assert_eq!(out.summary.sources_failed, 1);
        assert_eq!(out.domains.len(), 1);
    }

    #[test]
    fn missing_suffix_list_is_fatal_with_block_at_tld() {
        let dir = tempfile::tempdir().expect("tempdir");
        let black = write(dir.path(), "black", "tracker.net\n");
        let mut cfg = config(dir.path(), vec![black], vec![]);
        cfg.block_at_tld = true;
        cfg.suffix_list = ListSource::parse("https://publicsuffix.example/list.dat");

        let err = run(&cfg, &StaticFetcher::default()).expect_err("no suffix list");
        assert!(matches!(err, Error::SuffixLookupFailure { .. }));

        cfg.block_at_tld = false;
        assert!(run(&cfg, &StaticFetcher::default()).is_ok());
    }

    #[test]
    fn empty_suffix_list_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let black = write(dir.path(), "black", "tracker.net\n");
        let mut cfg = config(dir.path(), vec![black], vec![]);
        cfg.block_at_tld = true;
        cfg.suffix_list = write(dir.path(), "empty.dat", "// nothing here\n");

        let err = run(&cfg, &StaticFetcher::default()).expect_err("empty suffix list");
        assert!(matches!(err, Error::SuffixLookupFailure { .. }));
    }

    #[test]
    fn dnsmasq_prunes_but_hosts_keeps_subdomains() {
        let dir = tempfile::tempdir().expect("tempdir");
        let black = write(dir.path(), "black", "example.com\nads.example.com\n");
        let mut cfg = config(dir.path(), vec![black], vec![]);

        let out = run(&cfg, &StaticFetcher::default()).expect("run");
        assert_eq!(names(&out.domains), vec!["example.com"]);
        assert_eq!(out.summary.pruned, 1);

        cfg.mode = OutputMode::Hosts;
        let out = run(&cfg, &StaticFetcher::default()).expect("run");
        assert_eq!(names(&out.domains), vec!["ads.example.com", "example.com"]);
    }

    #[test]
    fn cached_remote_list_is_reused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = StaticFetcher::default().with(HOSTS_URL, "0.0.0.0 tracker.net\n");
        let mut cfg = config(dir.path(), vec![ListSource::parse(HOSTS_URL)], vec![]);
        cfg.cache = CachePolicy::Enabled {
            dir: dir.path().join("cache"),
            max_age: Duration::from_secs(3600),
        };

        let first = run(&cfg, &fetcher).expect("run");
        let second = run(&cfg, &fetcher).expect("run");
        assert_eq!(first.text, second.text);
        assert_eq!(second.summary.sources_cached, 1);
        assert_eq!(fetcher.calls.get(), 1);
    }

    #[test]
    fn no_blacklists_configured_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = config(dir.path(), vec![], vec![]);
        let err = run(&cfg, &StaticFetcher::default()).expect_err("nothing to do");
        assert!(matches!(err, Error::BlacklistUnavailable { failed: 0 }));
    }

    #[test]
    fn local_lists_are_read_when_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let black = write(dir.path(), "black", "ads.example.com
tracker.net
");
        let cfg = config(dir.path(), vec![black], vec![]);
        fs::create_dir_all(dir.path().join("local")).expect("mkdir");
        fs::write(&cfg.local_lists.whitelist, "example.com
").expect("write whitelist");
        fs::write(&cfg.local_lists.blacklist, "extra.org
").expect("write blacklist");

        let out = run(&cfg, &StaticFetcher::default()).expect("run");
        assert_eq!(names(&out.domains), vec!["extra.org", "tracker.net"]);
        assert_eq!(out.summary.whitelist, 1);
        assert_eq!(out.summary.sources_loaded, 3);
    }

    #[test]
    fn missing_local_lists_are_not_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let black = write(dir.path(), "black", "tracker.net
");
        let cfg = config(dir.path(), vec![black], vec![]);

        let out = run(&cfg, &StaticFetcher::default()).expect("run");
        assert_eq!(out.summary.sources_loaded, 1);
        assert_eq!(out.summary.sources_failed, 0);
    }

    #[test]
    fn local_blacklist_alone_is_enough() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = config(dir.path(), vec![ListSource::parse(HOSTS_URL)], vec![]);
        fs::create_dir_all(dir.path().join("local")).expect("mkdir");
        fs::write(&cfg.local_lists.blacklist, "tracker.net
").expect("write blacklist");

        let out = run(&cfg, &StaticFetcher::default()).expect("run");
        assert_eq!(names(&out.domains), vec!["tracker.net"]);
        assert_eq!(out.summary.sources_failed, 1);
    }

    #[test]
    fn local_list_given_explicitly_is_read_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("local")).expect("mkdir");
        let local = write(&dir.path().join("local"), "blacklist", "tracker.net
");
        let cfg = config(dir.path(), vec![local], vec![]);

        let out = run(&cfg, &StaticFetcher::default()).expect("run");
        assert_eq!(out.summary.sources_loaded, 1);
    }
}
