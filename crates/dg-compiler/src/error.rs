use std::path::PathBuf;

/// Error type for a dnsgate run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("source '{locator}' unavailable: {reason}")]
    SourceUnavailable { locator: String, reason: String },
    #[error("no blacklist could be loaded ({failed} source(s) failed)")]
    BlacklistUnavailable { failed: usize },
    #[error("public suffix list unavailable: {reason}")]
    SuffixLookupFailure { reason: String },
    #[error("'{}' exists and no-clobber is set", path.display())]
    OutputBlocked { path: PathBuf },
    #[error("failed to write '{}': {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
