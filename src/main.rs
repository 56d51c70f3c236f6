//! subsieve CLI - filter proxy subscription feeds by endpoint latency

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use subsieve::{
    Config, ConfigFile, FeedFetcher, FilterProgress, OutputFormat, ProbeFailure, Prober,
    SubscriptionFilter, TcpProber,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "subsieve")]
#[command(
    version,
    about = "Probe proxy subscription endpoints and keep only the fast ones"
)]
#[command(after_help = r#"EXAMPLES:
    # Filter a feed, keep endpoints answering under 800ms
    subsieve -u https://feeds.example/tcp --max-latency 800 -o filtered_sub.txt

    # High fan-out with a 90 second budget for the whole run
    subsieve -u https://feeds.example/tcp -n 100 --budget 90

    # Inspect a single descriptor
    subsieve test "vmess://eyJhZGQiOiJob3N0IiwicG9ydCI6NDQzfQ=="

CONFIG FILE:
    Default: ~/.config/subsieve/config.toml
"#)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    feeds: FeedArgs,

    #[command(flatten)]
    budget: BudgetArgs,

    /// Output file path (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format: base64 or plain
    #[arg(long, default_value = "base64")]
    format: String,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args)]
struct FeedArgs {
    /// Upstream subscription URL (can be repeated)
    #[arg(short = 'u', long = "feed", action = clap::ArgAction::Append)]
    urls: Vec<String>,

    /// Load feed URLs from file, one per line
    #[arg(long)]
    feed_file: Option<PathBuf>,
}

#[derive(Args)]
struct BudgetArgs {
    /// Number of concurrent probes
    #[arg(short = 'n', long)]
    concurrency: Option<usize>,

    /// Per-probe connect timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Wall-clock budget for the whole run in seconds (0 = unbounded)
    #[arg(long)]
    budget: Option<u64>,

    /// Maximum accepted latency in milliseconds
    #[arg(long)]
    max_latency: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch feeds, probe endpoints, write the filtered subscription
    Run,

    /// Parse and probe a single descriptor
    Test {
        /// Descriptor string (vmess:// or vless://)
        descriptor: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show config file path
    Path,

    /// Show current config
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::new(filter))
        .init();

    match &cli.command {
        Some(Commands::Test { descriptor }) => {
            return handle_test(descriptor, &cli).await;
        }
        Some(Commands::Config { action }) => {
            return handle_config(action);
        }
        Some(Commands::Run) | None => {}
    }

    run_filter(&cli).await
}

async fn run_filter(cli: &Cli) -> anyhow::Result<()> {
    let config_file = ConfigFile::load_default().ok().flatten();
    let config = build_config(cli, &config_file)?;

    if config.feeds.is_empty() {
        return Err(anyhow::anyhow!(
            "No subscription feeds. Use -u/--feed or add feeds to the config file"
        ));
    }

    let format: OutputFormat = cli.format.parse()?;

    // Fetch all feeds
    if !cli.quiet {
        eprintln!("Fetching {} feed(s)...", config.feeds.len());
    }

    let fetcher = FeedFetcher::new(Duration::from_secs(10))?;
    let raw = fetcher.fetch_all(&config.feeds).await;

    if !cli.quiet {
        eprintln!("Collected {} descriptor lines", raw.len());
    }

    // Set up progress bar
    let pb = if !cli.quiet {
        let pb = ProgressBar::new(raw.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let pb_clone = pb.clone();
    let filter =
        SubscriptionFilter::new(config).with_progress(move |progress: FilterProgress| {
            if let Some(ref pb) = pb_clone {
                pb.set_length(progress.total);
                pb.set_position(progress.tested);
                pb.set_message(format!("{} accepted", progress.accepted));
            }
        });

    let start = Instant::now();
    let report = filter.run(raw).await;
    let elapsed = start.elapsed();

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    // Write output
    subsieve::write_subscription(&report.accepted, format, cli.output.as_deref())?;

    if !cli.quiet {
        eprintln!(
            "Accepted {} of {} unique descriptors in {:.2}s",
            report.accepted.len(),
            report.unique,
            elapsed.as_secs_f64()
        );
        eprintln!(
            "Rejected: {} parse failures, {} unreachable, {} timed out, {} too slow",
            report.rejected.parse_failed,
            report.rejected.connect_failed,
            report.rejected.timed_out,
            report.rejected.too_slow
        );
        if report.truncated() {
            eprintln!(
                "Run budget exhausted: {} descriptors were not probed",
                report.unique - report.tested
            );
        }
    }

    Ok(())
}

fn build_config(cli: &Cli, config_file: &Option<ConfigFile>) -> anyhow::Result<Config> {
    let settings = config_file
        .as_ref()
        .map(|c| c.settings.clone())
        .unwrap_or_default();

    // Feeds from CLI flags, a feed file, then the config file
    let mut feeds = cli.feeds.urls.clone();

    if let Some(path) = &cli.feeds.feed_file {
        let content = std::fs::read_to_string(path)?;
        for line in content.lines() {
            let url = line.trim();
            if !url.is_empty() && !url.starts_with('#') {
                feeds.push(url.to_string());
            }
        }
    }

    if let Some(cf) = config_file {
        for url in &cf.feeds {
            if !feeds.iter().any(|f| f == url) {
                feeds.push(url.clone());
            }
        }
    }

    let config = Config::builder()
        .feeds(feeds)
        .max_concurrency(cli.budget.concurrency.unwrap_or(settings.concurrency))
        .probe_timeout(Duration::from_secs(
            cli.budget.timeout.unwrap_or(settings.timeout_seconds),
        ))
        .run_budget(Duration::from_secs(
            cli.budget.budget.unwrap_or(settings.budget_seconds),
        ))
        .latency_threshold(Duration::from_millis(
            cli.budget.max_latency.unwrap_or(settings.latency_threshold_ms),
        ))
        .build()?;

    Ok(config)
}

async fn handle_test(descriptor: &str, cli: &Cli) -> anyhow::Result<()> {
    println!("Testing descriptor: {}\n", preview(descriptor));

    print!("[1/2] Parse.............. ");
    flush_stdout()?;

    let endpoint = match subsieve::parse(descriptor) {
        Ok(ep) => {
            println!("✓ {}:{} ({:?})", ep.address, ep.port, ep.scheme);
            ep
        }
        Err(e) => {
            println!("✗ FAILED: {}", e);
            return Ok(());
        }
    };

    print!("[2/2] Probe.............. ");
    flush_stdout()?;

    let timeout = Duration::from_secs(cli.budget.timeout.unwrap_or(2));
    match TcpProber.probe(&endpoint.address, endpoint.port, timeout).await {
        Ok(latency) => println!("✓ {}ms", latency.as_millis()),
        Err(ProbeFailure::Timeout) => println!("✗ timed out after {:?}", timeout),
        Err(ProbeFailure::Unreachable) => println!("✗ unreachable"),
    }

    println!("\nDescriptor test complete.");
    Ok(())
}

fn handle_config(action: &ConfigCommands) -> anyhow::Result<()> {
    match action {
        ConfigCommands::Path => {
            println!("{}", ConfigFile::default_path().display());
        }

        ConfigCommands::Show => {
            let path = ConfigFile::default_path();
            if path.exists() {
                let content = std::fs::read_to_string(&path)?;
                println!("# {}\n", path.display());
                println!("{}", content);
            } else {
                println!("No config file found at: {}", path.display());
                println!("\nCreate one with feeds and settings, for example:");
                println!("  feeds = [\"https://feeds.example/tcp\"]");
            }
        }
    }

    Ok(())
}

/// Truncate a descriptor for display
fn preview(descriptor: &str) -> String {
    if descriptor.chars().count() > 48 {
        let cut: String = descriptor.chars().take(48).collect();
        format!("{}...", cut)
    } else {
        descriptor.to_string()
    }
}

fn flush_stdout() -> std::io::Result<()> {
    use std::io::Write;
    std::io::stdout().flush()
}
