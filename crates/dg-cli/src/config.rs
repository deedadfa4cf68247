use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};

use dg_core::{
    CachePolicy, Configuration, FormatHint, ListSource, LocalLists, OutputMode, OutputOptions,
};

pub const DEFAULT_CACHE_DIRECTORY: &str = "/etc/dnsgate/cache";
pub const DEFAULT_LOCAL_BLACKLIST: &str = "/etc/dnsgate/blacklist";
pub const DEFAULT_LOCAL_WHITELIST: &str = "/etc/dnsgate/whitelist";
pub const DEFAULT_OUTPUT_FILE: &str = "/etc/dnsgate/generated_blacklist";
pub const DEFAULT_SUFFIX_LIST: &str = "https://publicsuffix.org/list/public_suffix_list.dat";
pub const DEFAULT_CACHE_EXPIRE_SECS: u64 = 3600 * 24;
pub const DEFAULT_TIMEOUT_SECS: f64 = 15.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Dnsmasq,
    Hosts,
}

impl From<ModeArg> for OutputMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Dnsmasq => OutputMode::Dnsmasq,
            ModeArg::Hosts => OutputMode::Hosts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Hosts,
    Bare,
    Auto,
}

impl From<FormatArg> for FormatHint {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Hosts => FormatHint::Hosts,
            FormatArg::Bare => FormatHint::Bare,
            FormatArg::Auto => FormatHint::Auto,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct GenerateArgs {
    /// Output format
    #[arg(long, value_enum, default_value = "dnsmasq")]
    pub mode: ModeArg,

    /// Block each domain at its registrable domain (analytics.google.com -> google.com)
    #[arg(long, alias = "block-at-psl")]
    pub block_at_tld: bool,

    /// Blacklist URL or path (repeatable)
    #[arg(
        long = "source",
        value_name = "URL|PATH",
        default_values = ["http://winhelp2002.mvps.org/hosts.txt", "http://someonewhocares.org/hosts/hosts"]
    )]
    pub sources: Vec<String>,

    /// Whitelist URL or path (repeatable)
    #[arg(long = "whitelist", value_name = "URL|PATH")]
    pub whitelists: Vec<String>,

    /// Local blacklist, read on every run when it exists
    #[arg(long, value_name = "PATH", default_value = DEFAULT_LOCAL_BLACKLIST)]
    pub local_blacklist: PathBuf,

    /// Local whitelist, read on every run when it exists
    #[arg(long, value_name = "PATH", default_value = DEFAULT_LOCAL_WHITELIST)]
    pub local_whitelist: PathBuf,

    /// IP to redirect blocked names to (default: NXDOMAIN in dnsmasq mode, 127.0.0.1 in hosts mode)
    #[arg(long)]
    pub dest_ip: Option<IpAddr>,

    /// Do not cache downloaded lists
    #[arg(long)]
    pub no_cache: bool,

    /// Directory for cached lists
    #[arg(long, default_value = DEFAULT_CACHE_DIRECTORY)]
    pub cache_dir: PathBuf,

    /// Seconds until a cached list is downloaded again
    #[arg(long, default_value_t = DEFAULT_CACHE_EXPIRE_SECS)]
    pub cache_expire: u64,

    /// Public suffix list URL or path, used with --block-at-tld
    #[arg(long, value_name = "URL|PATH", default_value = DEFAULT_SUFFIX_LIST)]
    pub suffix_list: String,

    /// Seconds before a download is abandoned
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: f64,

    /// Output file, `-` for stdout
    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    pub output_file: PathBuf,

    /// Back up the output file before replacing it
    #[arg(long)]
    pub backup: bool,

    /// Do not replace an existing output file
    #[arg(long)]
    pub noclobber: bool,

    /// Print the resolved configuration to stderr
    #[arg(long)]
    pub show_config: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl GenerateArgs {
    pub fn to_configuration(&self) -> Result<Configuration, String> {
        if !self.timeout.is_finite() || self.timeout <= 0.0 {
            return Err(format!("Invalid --timeout '{}': must be a positive number of seconds", self.timeout));
        }
        let fetch_timeout = Duration::try_from_secs_f64(self.timeout)
            .map_err(|e| format!("Invalid --timeout '{}': {}", self.timeout, e))?;

        let cache = if self.no_cache {
            CachePolicy::Disabled
        } else {
            CachePolicy::Enabled {
                dir: self.cache_dir.clone(),
                max_age: Duration::from_secs(self.cache_expire),
            }
        };

        Ok(Configuration {
            mode: self.mode.into(),
            block_at_tld: self.block_at_tld,
            dest_ip: self.dest_ip,
            blacklists: self.sources.iter().map(|s| ListSource::parse(s)).collect(),
            whitelists: self.whitelists.iter().map(|s| ListSource::parse(s)).collect(),
            local_lists: LocalLists {
                blacklist: self.local_blacklist.clone(),
                whitelist: self.local_whitelist.clone(),
            },
            suffix_list: ListSource::parse(&self.suffix_list),
            cache,
            fetch_timeout,
            output: OutputOptions {
                path: self.output_file.clone(),
                backup: self.backup,
                no_clobber: self.noclobber,
            },
        })
    }
}
