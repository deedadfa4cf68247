//! Core type definitions for dnsgate
//!
//! The run [`Configuration`] is built once by the caller and handed by
//! reference to every pipeline stage; nothing in the engine reads flags or
//! environment state on its own.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Serialize, Serializer};

// =============================================================================
// Output Mode
// =============================================================================

/// Artifact format to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// `server=/domain/` or `address=/domain/ip` directives
    Dnsmasq,
    /// `ip domain` lines for `/etc/hosts`
    Hosts,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dnsmasq => f.write_str("dnsmasq"),
            Self::Hosts => f.write_str("hosts"),
        }
    }
}

// =============================================================================
// List Sources
// =============================================================================

/// Expected shape of a list's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatHint {
    /// `<ip> <domain>` lines
    Hosts,
    /// One domain per line
    Bare,
    /// No expectation
    Auto,
}

/// Where a list comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListSource {
    Url(String),
    Path(PathBuf),
}

impl ListSource {
    /// Classify a locator: `http://` and `https://` are remote, anything else
    /// is a local path.
    pub fn parse(locator: &str) -> Self {
        let lower = locator.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(locator.to_string())
        } else {
            Self::Path(PathBuf::from(locator))
        }
    }

    /// The locator as text, used for logging and cache keys.
    pub fn locator(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Path(path) => path.display().to_string(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Url(_))
    }

    /// Remote lists are published in hosts format; local lists are kept by
    /// hand as one domain per line.
    pub fn format_hint(&self) -> FormatHint {
        match self {
            Self::Url(_) => FormatHint::Hosts,
            Self::Path(_) => FormatHint::Bare,
        }
    }
}

impl fmt::Display for ListSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl Serialize for ListSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// Cache Policy
// =============================================================================

/// Whether fetched remote lists are cached on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    Disabled,
    Enabled {
        dir: PathBuf,
        #[serde(serialize_with = "serialize_secs")]
        max_age: Duration,
    },
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_secs())
}

// =============================================================================
// Configuration
// =============================================================================

/// Where and how the rendered artifact is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputOptions {
    /// Target file; `-` means stdout.
    pub path: PathBuf,
    /// Copy an existing target to `<path>.bak.<timestamp>` before replacing it.
    pub backup: bool,
    /// Refuse to replace an existing target.
    pub no_clobber: bool,
}

impl OutputOptions {
    pub fn is_stdout(&self) -> bool {
        self.path.as_os_str() == "-"
    }
}

/// User-maintained lists that are read on every run when the files exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalLists {
    pub blacklist: PathBuf,
    pub whitelist: PathBuf,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, Serialize)]
pub struct Configuration {
    pub mode: OutputMode,
    /// Collapse blacklisted domains to their registrable domain.
    pub block_at_tld: bool,
    /// Redirect target; `None` means NXDOMAIN (dnsmasq) or 127.0.0.1 (hosts).
    pub dest_ip: Option<IpAddr>,
    pub blacklists: Vec<ListSource>,
    pub whitelists: Vec<ListSource>,
    pub local_lists: LocalLists,
    /// Public suffix list, only loaded when `block_at_tld` is set.
    pub suffix_list: ListSource,
    pub cache: CachePolicy,
    #[serde(serialize_with = "serialize_secs")]
    pub fetch_timeout: Duration,
    pub output: OutputOptions,
}
