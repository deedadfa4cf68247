//! dnsgate Block List Compiler
//!
//! This crate turns hosts-format and plain domain lists into a dnsmasq or
//! hosts artifact: load → parse → normalize → merge → render.

pub mod cache;
pub mod error;
pub mod loader;
pub mod merger;
pub mod normalizer;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod renderer;

pub use error::Error;
pub use loader::{Fetcher, HttpFetcher, SourceLoader};
pub use merger::merge_sets;
pub use parser::{parse_list, LineFormat, ParsedList};
pub use pipeline::{run, RunOutput, Summary};
pub use renderer::render;
