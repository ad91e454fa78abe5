use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use kerala_stats::config::{Config, load_config};
use kerala_stats::fetch::HttpTransport;
use kerala_stats::model::dashboard_date;
use kerala_stats::pipeline::{
    Domain, DomainStatus, SyncOptions, bulletin_hotspots, stored_summary, sync,
};
use kerala_stats::vocab::{Corrections, Vocabulary};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "kerala_stats",
    about = "Scrapes Kerala COVID dashboard figures and bulletin hotspots into JSON archives"
)]
struct Cli {
    #[arg(long, default_value = "configs/kerala_stats.toml")]
    config: PathBuf,

    /// Overrides `paths.data_dir` from the config file.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Sync {
        /// Restrict the run to these domains (repeatable); all by default.
        #[arg(long = "domain")]
        domains: Vec<Domain>,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value_t = false)]
        defer_test_reports: bool,
    },
    Bulletin {
        /// Bulletin date as DD-MM-YYYY.
        #[arg(long)]
        date: String,
        /// Parse a local PDF instead of downloading it.
        #[arg(long)]
        pdf: Option<PathBuf>,
    },
    Summary,
    Validate,
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        config.paths.data_dir = data_dir;
    }

    match cli.command {
        Commands::Sync {
            domains,
            dry_run,
            defer_test_reports,
        } => {
            let domains = if domains.is_empty() {
                Domain::ALL.into_iter().collect::<BTreeSet<_>>()
            } else {
                domains.into_iter().collect()
            };
            let vocabulary = if domains.contains(&Domain::Hotspots) {
                load_vocabulary(&config)
            } else {
                Vocabulary::default()
            };
            let transport = HttpTransport::new(&config.dashboard)?;

            let report = sync(
                &SyncOptions {
                    config,
                    domains,
                    dry_run,
                    defer_test_reports,
                },
                &transport,
                &vocabulary,
            )?;

            for domain in &report.domains {
                match &domain.status {
                    DomainStatus::Updated(outcome) => info!(
                        domain = %domain.domain,
                        outcome = %outcome,
                        elapsed_ms = domain.elapsed_ms,
                        "domain sync summary"
                    ),
                    DomainStatus::Failed(reason) => error!(
                        domain = %domain.domain,
                        reason = %reason,
                        "domain sync summary"
                    ),
                }
            }
            info!(
                last_updated = %report.last_updated,
                failed = report.failed(),
                "sync complete"
            );
        }
        Commands::Bulletin { date, pdf } => {
            let Some(date) = dashboard_date::parse(&date) else {
                bail!("invalid bulletin date {date:?}, expected DD-MM-YYYY");
            };
            let vocabulary = Vocabulary::load(&config.paths.features)?;
            let corrections = Corrections::with_overrides(&config.corrections);
            let transport = HttpTransport::new(&config.dashboard)?;

            let history = bulletin_hotspots(
                &transport,
                &config,
                &vocabulary,
                &corrections,
                date,
                pdf.as_deref(),
            )?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
        Commands::Summary => match stored_summary(&config)? {
            Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
            None => warn!(
                data_dir = %config.paths.data_dir.display(),
                "no case history stored yet"
            ),
        },
        Commands::Validate => {
            let vocabulary = Vocabulary::load(&config.paths.features)?;
            let corrections = Corrections::with_overrides(&config.corrections);
            println!("config ok: {}", cli.config.display());
            println!(
                "vocabulary ok: {} districts, {} LSG divisions",
                vocabulary.district_count(),
                vocabulary.division_count()
            );
            println!("corrections: {} entries", corrections.iter().count());
            for (raw, fixed) in corrections.iter() {
                println!("  {raw} -> {fixed}");
            }
        }
    }

    Ok(())
}

/// A broken feature file fails only the hotspot domain.
fn load_vocabulary(config: &Config) -> Vocabulary {
    match Vocabulary::load(&config.paths.features)
        .context("hotspot vocabulary unavailable")
    {
        Ok(vocabulary) => vocabulary,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "continuing with an empty vocabulary");
            Vocabulary::default()
        }
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}
