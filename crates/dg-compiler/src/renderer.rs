use std::fmt::Write as _;
use std::net::{IpAddr, Ipv4Addr};

use dg_core::{Configuration, DomainEntry, DomainSet, OutputMode};

/// Redirect target for hosts mode when none is configured.
pub const DEFAULT_HOSTS_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

const RULE: &str = "################################################################";

/// Render the final set, preceded by a comment header describing the run.
pub fn render(domains: &DomainSet, config: &Configuration) -> String {
    let mut out = render_header(config);
    for domain in domains {
        out.push_str(&render_line(config.mode, config.dest_ip, domain));
        out.push('\n');
    }
    out
}

/// One directive for one domain.
pub fn render_line(mode: OutputMode, dest_ip: Option<IpAddr>, domain: &DomainEntry) -> String {
    match (mode, dest_ip) {
        (OutputMode::Dnsmasq, None) => format!("server=/{}/", domain),
        (OutputMode::Dnsmasq, Some(ip)) => format!("address=/{}/{}", domain, ip),
        (OutputMode::Hosts, ip) => format!("{} {}", ip.unwrap_or(DEFAULT_HOSTS_IP), domain),
    }
}

/// `#` comment block. Carries no timestamp so identical inputs give
/// identical files.
pub fn render_header(config: &Configuration) -> String {
    let mut header = String::new();
    let dest = match (config.mode, config.dest_ip) {
        (_, Some(ip)) => ip.to_string(),
        (OutputMode::Dnsmasq, None) => "NXDOMAIN".to_string(),
        (OutputMode::Hosts, None) => DEFAULT_HOSTS_IP.to_string(),
    };

    let _ = writeln!(header, "{}", RULE);
    let _ = writeln!(header, "#");
    let _ = writeln!(header, "# AUTOMATICALLY GENERATED BY dnsgate {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(header, "#");
    let _ = writeln!(header, "# CHANGES WILL BE LOST ON THE NEXT RUN.");
    let _ = writeln!(
        header,
        "# Edit {} or {} instead.",
        config.local_lists.blacklist.display(),
        config.local_lists.whitelist.display()
    );
    let _ = writeln!(header, "#");
    let _ = writeln!(header, "# Configuration:");
    let _ = writeln!(header, "#    mode: {}", config.mode);
    let _ = writeln!(header, "#    block_at_tld: {}", config.block_at_tld);
    let _ = writeln!(header, "#    dest: {}", dest);
    for source in &config.blacklists {
        let _ = writeln!(header, "#    source: {}", source);
    }
    for source in &config.whitelists {
        let _ = writeln!(header, "#    whitelist: {}", source);
    }
    let _ = writeln!(header, "#");
    let _ = writeln!(header, "{}", RULE);
    header.push('\n');
    header
}
