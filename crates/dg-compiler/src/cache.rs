//! On-disk cache for fetched remote lists.
//!
//! Each copy lives at `<dir>/<key>_<fetched-at>.list`, where `key` is the
//! xxHash64 of the source locator in hex and `fetched-at` is the fetch time in
//! Unix seconds. Only the newest copy per locator is kept.

use std::fs;
use std::hash::Hasher;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dg_core::CachePolicy;
use twox_hash::XxHash64;

const CACHE_EXTENSION: &str = "list";

/// A cached copy of a source's raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCopy {
    pub path: PathBuf,
    pub fetched_at: u64,
}

#[derive(Debug, Clone)]
pub struct ListCache {
    dir: PathBuf,
    max_age: Duration,
}

impl ListCache {
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
        }
    }

    pub fn from_policy(policy: &CachePolicy) -> Option<Self> {
        match policy {
            CachePolicy::Disabled => None,
            CachePolicy::Enabled { dir, max_age } => Some(Self::new(dir.clone(), *max_age)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache key for a locator.
    pub fn key(locator: &str) -> String {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(locator.as_bytes());
        format!("{:016x}", hasher.finish())
    }

    /// Newest copy for `locator`, fresh or not.
    pub fn newest(&self, locator: &str) -> Option<CachedCopy> {
        match self.copies(locator) {
            Ok(copies) => copies.into_iter().max_by_key(|copy| copy.fetched_at),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("cannot read cache dir {}: {}", self.dir.display(), e);
                }
                None
            }
        }
    }

    /// Raw text of a copy younger than the freshness window.
    pub fn lookup(&self, locator: &str) -> Option<String> {
        self.lookup_at(locator, SystemTime::now())
    }

    pub fn lookup_at(&self, locator: &str, now: SystemTime) -> Option<String> {
        let copy = self.newest(locator)?;
        let age = unix_secs(now).saturating_sub(copy.fetched_at);
        if age >= self.max_age.as_secs() {
            log::debug!("cached copy {} is stale ({}s old)", copy.path.display(), age);
            return None;
        }

        match fs::read_to_string(&copy.path) {
            Ok(text) => Some(text),
            Err(e) => {
                log::warn!("cannot read cached copy {}: {}", copy.path.display(), e);
                None
            }
        }
    }

    /// Write a freshly fetched copy and drop older ones.
    pub fn store(&self, locator: &str, text: &str) -> io::Result<PathBuf> {
        self.store_at(locator, text, SystemTime::now())
    }

    pub fn store_at(&self, locator: &str, text: &str, now: SystemTime) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let fetched_at = unix_secs(now);
        let path = self.dir.join(format!(
            "{}_{}.{}",
            Self::key(locator),
            fetched_at,
            CACHE_EXTENSION
        ));
        fs::write(&path, text)?;

        for copy in self.copies(locator)? {
            if copy.path != path {
                if let Err(e) = fs::remove_file(&copy.path) {
                    log::debug!("cannot remove old cached copy {}: {}", copy.path.display(), e);
                }
            }
        }

        Ok(path)
    }

    fn copies(&self, locator: &str) -> io::Result<Vec<CachedCopy>> {
        let prefix = format!("{}_", Self::key(locator));
        let mut copies = Vec::new();

        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            let fetched_at = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix(&prefix))
                .and_then(|rest| rest.strip_suffix(CACHE_EXTENSION))
                .and_then(|rest| rest.strip_suffix('.'))
                .and_then(|stamp| stamp.parse::<u64>().ok());

            if let Some(fetched_at) = fetched_at {
                copies.push(CachedCopy { path, fetched_at });
            }
        }

        Ok(copies)
    }
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
