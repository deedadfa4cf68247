use std::fs;
use std::path::Path;

use dg_compiler::normalizer::Normalizer;
use dg_compiler::parser::{parse_list, ParsedList};
use dg_core::FormatHint;

pub struct InspectStats {
    pub parsed: ParsedList,
    pub unique: usize,
    pub rejected: usize,
}

pub fn inspect_text(text: &str, hint: FormatHint) -> InspectStats {
    let parsed = parse_list(text, hint);
    let normalized = Normalizer::exact().normalize_all(&parsed.candidates);
    InspectStats {
        unique: normalized.domains.len(),
        rejected: normalized.rejected,
        parsed,
    }
}

pub fn cmd_inspect(input: &str, hint: FormatHint) -> Result<(), String> {
    let bytes = fs::read(input)
        .map_err(|e| format!("Failed to read '{}': {}", input, e))?;
    let text = String::from_utf8_lossy(&bytes);
    let stats = inspect_text(&text, hint);

    println!("List: {}", Path::new(input).display());
    println!("  Lines:       {}", stats.parsed.lines);
    println!("  Hosts lines: {}", stats.parsed.hosts_lines);
    println!("  Bare lines:  {}", stats.parsed.bare_lines);
    println!("  Mixed:       {}", stats.parsed.mixed);
    println!("  Malformed:   {}", stats.parsed.malformed);
    println!("  Reserved:    {}", stats.parsed.reserved);
    println!("  Candidates:  {}", stats.parsed.candidates.len());
    println!("  Rejected:    {}", stats.rejected);
    println!("  Unique:      {}", stats.unique);

    Ok(())
}
