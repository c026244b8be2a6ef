use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use clap::{Parser, Subcommand};

use anyloc_vocab_cache::config::{Domain, PopulatorConfig, DEFAULT_CONFIG_FILE};
use anyloc_vocab_cache::modules::vocabulary::{cache_status, CachePopulator, HubLoader};
use anyloc_vocab_cache::utils::init_logging;

const HUB_NOTE: &str = "The built-in hub location is a placeholder. Point the [hub] section of \
vocab_cache.toml (endpoint, repo, revision, checkpoint) at a real mirror of the VLAD checkpoints, \
otherwise every domain is reported as failed.";

#[derive(Parser, Debug)]
#[command(
    name = "populate-vocab-cache",
    version,
    about = "Download AnyLoc VLAD cluster centers into a local cache (configure [hub] first)",
    after_help = HUB_NOTE
)]
struct Cli {
    /// TOML config file (defaults to ./vocab_cache.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache root directory
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Restrict to these domains: urban, indoor, aerial (repeatable)
    #[arg(long = "domain", value_parser = Domain::from_str, global = true)]
    domains: Vec<Domain>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and store cluster centers for every configured domain
    Populate {
        #[arg(long)]
        backbone: Option<String>,

        /// Exit non-zero unless every domain was cached
        #[arg(long)]
        strict: bool,
    },
    /// Show which domains are present in the cache
    Status,
}

fn resolve_config(cli: &Cli, backbone: Option<&str>) -> Result<PopulatorConfig, Box<dyn std::error::Error>> {
    let config = PopulatorConfig::load(cli.config.as_deref())?
        .with_overrides(cli.root.clone(), &cli.domains, backbone);

    config.validate()?;
    Ok(config)
}

async fn populate(config: PopulatorConfig, strict: bool) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let loader = HubLoader::new(config.hub.clone())?;
    let populator = CachePopulator::new(config, loader);

    let report = populator.populate_cache().await?;

    println!();
    for (domain, outcome) in report.outcomes() {
        let marker = if outcome.is_cached() { "✓" } else { "✗" };
        println!("{} {}: {}", marker, domain, outcome);
    }
    println!(
        "Cache location: {} ({}/{} domains cached)",
        populator.config().cache_root.display(),
        report.cached_count(),
        report.outcomes().len()
    );
    if report.cached_count() == 0 {
        println!("No domain was cached. Check the [hub] section of {}.", DEFAULT_CONFIG_FILE);
    }

    if strict && !report.is_complete() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn status(config: PopulatorConfig) -> Result<ExitCode, Box<dyn std::error::Error>> {
    println!("Cache location: {}", config.cache_root.display());
    for status in cache_status(&config).await? {
        match (&status.entry, status.present) {
            (Some(entry), true) => println!(
                "✓ {}: {:?} ({}, cached {})",
                status.domain, entry.shape, entry.backbone, entry.cached_at.to_rfc3339()
            ),
            (_, true) => println!("? {}: present, not in manifest", status.domain),
            (_, false) => println!("✗ {}: missing {}", status.domain, status.path.display()),
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    match &cli.command {
        None => populate(resolve_config(&cli, None)?, false).await,
        Some(Command::Populate { backbone, strict }) => {
            populate(resolve_config(&cli, backbone.as_deref())?, *strict).await
        }
        Some(Command::Status) => status(resolve_config(&cli, None)?).await,
    }
}
