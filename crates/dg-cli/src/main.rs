//! dnsgate CLI
//!
//! Combines, deduplicates and optionally collapses local and remote DNS
//! block lists into a dnsmasq or hosts file.

mod config;
mod inspect;

use std::io::Write;
use std::time::Instant;

use clap::{Parser, Subcommand};

use dg_compiler::output::{ensure_writable, write_output};
use dg_compiler::{run, HttpFetcher, Summary};

use config::{FormatArg, GenerateArgs};

#[derive(Parser)]
#[command(name = "dnsgate")]
#[command(version)]
#[command(about = "Combine DNS block lists into a dnsmasq or hosts file")]
struct Cli {
    /// Print progress information to stderr
    #[arg(long, global = true)]
    verbose: bool,

    /// Print debugging information to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, merge and write the block list
    Generate(GenerateArgs),

    /// Report what would be taken from a local list
    Inspect {
        /// List file to inspect
        input: String,

        /// Expected line format
        #[arg(long, value_enum, default_value = "auto")]
        format: FormatArg,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.debug);

    let result = match cli.command {
        Commands::Generate(args) => cmd_generate(&args),
        Commands::Inspect { input, format } => inspect::cmd_inspect(&input, format.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool, debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                buf.timestamp(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn cmd_generate(args: &GenerateArgs) -> Result<(), String> {
    let config = args.to_configuration()?;

    if args.show_config {
        let json = serde_json::to_string_pretty(&config)
            .map_err(|e| format!("Failed to serialize configuration: {}", e))?;
        eprintln!("{}", json);
    }

    // Refuse early so nothing is downloaded for a run that cannot be written.
    ensure_writable(&config.output).map_err(|e| e.to_string())?;
    log::info!("Using output file: {}", config.output.path.display());

    let start = Instant::now();
    let fetcher = HttpFetcher::new(config.fetch_timeout)
        .map_err(|e| format!("Failed to create HTTP client: {}", e))?;
    let output = run(&config, &fetcher).map_err(|e| e.to_string())?;

    let report = write_output(&config.output, &output.text).map_err(|e| e.to_string())?;
    let elapsed = start.elapsed();

    if args.json {
        let json = serde_json::to_string_pretty(&output.summary)
            .map_err(|e| format!("Failed to serialize summary: {}", e))?;
        eprintln!("{}", json);
    } else {
        print_summary(&output.summary, elapsed.as_secs_f64() * 1000.0);
    }

    if let Some(backup) = &report.backup {
        eprintln!("  Backup:    {}", backup.display());
    }
    if !config.output.is_stdout() {
        eprintln!(
            "Wrote {} {} entries to '{}' ({} bytes)",
            output.summary.final_count,
            config.mode,
            report.path.display(),
            report.bytes
        );
    }

    Ok(())
}

fn print_summary(summary: &Summary, total_ms: f64) {
    eprintln!("Merged {} source(s)", summary.sources_loaded);
    eprintln!(
        "  Sources:   {} loaded ({} cached), {} failed",
        summary.sources_loaded, summary.sources_cached, summary.sources_failed
    );
    eprintln!(
        "  Lines:     {} ({} malformed, {} reserved)",
        summary.lines, summary.malformed, summary.reserved
    );
    eprintln!(
        "  Domains:   {} candidates, {} rejected, {} collapsed",
        summary.candidates, summary.rejected, summary.collapsed
    );
    eprintln!(
        "  Merge:     {} -> {} ({} whitelisted, {} redundant)",
        summary.merged, summary.final_count, summary.whitelisted, summary.pruned
    );
    if summary.shadowed > 0 {
        eprintln!("  Shadowed:  {} whitelist entries stay blocked by a parent", summary.shadowed);
    }
    eprintln!("  Time:      {:.1}ms", total_ms);
}
