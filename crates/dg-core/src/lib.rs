//! dnsgate Core Library
//!
//! This crate holds the value types shared by every stage of the dnsgate
//! merge engine: canonical domain names, domain sets, list sources and the
//! run configuration, plus the public suffix list used for registrable
//! domain extraction.
//!
//! # Modules
//!
//! - `domain`: `DomainEntry` canonicalization and `DomainSet`
//! - `psl`: Public Suffix List parsing and eTLD+1 extraction
//! - `types`: Configuration, output mode, list sources and cache policy

pub mod domain;
pub mod psl;
pub mod types;

// Re-export commonly used types
pub use domain::{DomainEntry, DomainError, DomainSet};
pub use psl::{PslError, SuffixList};
pub use types::{
    CachePolicy, Configuration, FormatHint, ListSource, LocalLists, OutputMode, OutputOptions,
};
