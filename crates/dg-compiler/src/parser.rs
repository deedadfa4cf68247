use std::net::IpAddr;

use dg_core::FormatHint;

/// Shape of a single list line, decided per line because published lists
/// freely mix hosts entries with bare domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    /// `<ip> <name> [<alias>...]`
    Hosts,
    /// A single domain token
    Bare,
    /// Anything else
    Unknown,
}

/// Candidate domains extracted from one list, plus line statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedList {
    pub candidates: Vec<String>,
    /// Non-blank, non-comment lines seen.
    pub lines: usize,
    pub hosts_lines: usize,
    pub bare_lines: usize,
    /// Lines or tokens that cannot be a domain.
    pub malformed: usize,
    /// Loopback and other hosts-file housekeeping names that were skipped.
    pub reserved: usize,
    /// Lines whose format differs from the list's hint.
    pub mixed: usize,
}

pub fn parse_list(text: &str, hint: FormatHint) -> ParsedList {
    let mut parsed = ParsedList::default();
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);

    for (index, raw_line) in text.lines().enumerate() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() || is_comment_line(line) {
            continue;
        }
        parsed.lines += 1;

        let format = detect_line_format(line);
        match (format, hint) {
            (LineFormat::Hosts, FormatHint::Bare) | (LineFormat::Bare, FormatHint::Hosts) => {
                parsed.mixed += 1;
                log::debug!("line {}: {:?} entry in a {:?} list", index + 1, format, hint);
            }
            _ => {}
        }

        let names: Vec<&str> = match format {
            LineFormat::Hosts => {
                parsed.hosts_lines += 1;
                line.split_whitespace().skip(1).collect()
            }
            LineFormat::Bare => {
                parsed.bare_lines += 1;
                vec![line]
            }
            LineFormat::Unknown => {
                parsed.malformed += 1;
                log::debug!("line {}: unrecognized entry '{}'", index + 1, line);
                continue;
            }
        };

        for name in names {
            match extract_candidate(name) {
                Candidate::Domain(domain) => parsed.candidates.push(domain.to_string()),
                Candidate::Reserved => parsed.reserved += 1,
                Candidate::Implausible => {
                    parsed.malformed += 1;
                    log::debug!("line {}: '{}' is not a domain", index + 1, name);
                }
            }
        }
    }

    parsed
}

/// Classify a comment-free, trimmed line.
pub fn detect_line_format(line: &str) -> LineFormat {
    let mut parts = line.split_whitespace();
    let first = match parts.next() {
        Some(first) => first,
        None => return LineFormat::Unknown,
    };

    if first.parse::<IpAddr>().is_ok() {
        return match parts.next() {
            Some(_) => LineFormat::Hosts,
            None => LineFormat::Unknown,
        };
    }

    match parts.next() {
        None => LineFormat::Bare,
        Some(_) => LineFormat::Unknown,
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[')
}

#[derive(Debug, PartialEq, Eq)]
enum Candidate<'a> {
    Domain(&'a str),
    Reserved,
    Implausible,
}

const RESERVED_NAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
];

fn extract_candidate(token: &str) -> Candidate<'_> {
    let host = strip_url(token).trim_matches('.');
    if host.is_empty() || host.parse::<IpAddr>().is_ok() {
        return Candidate::Implausible;
    }

    let lower = host.to_ascii_lowercase();
    if RESERVED_NAMES.contains(&lower.as_str()) || lower.starts_with("ip6-") {
        return Candidate::Reserved;
    }

    // Non-ASCII is left for IDNA encoding in the normalizer.
    let plausible = host
        .chars()
        .all(|c| !c.is_ascii() || c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');
    if !plausible {
        return Candidate::Implausible;
    }

    Candidate::Domain(host)
}

/// Reduce `scheme://host:port/path` to `host`. Plain tokens pass through.
fn strip_url(token: &str) -> &str {
    let rest = match token.find("://") {
        Some(pos) => &token[pos + 3..],
        None => return token,
    };

    let end = rest.find(['/', '?']).unwrap_or(rest.len());
    let host = &rest[..end];

    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}
