use crate::bulletin::download_bulletin;
use crate::config::Config;
use crate::dashboard::{scrape_district_summary, scrape_last_updated, scrape_test_report};
use crate::fetch::Transport;
use crate::history::{self, Reconciliation, build_daily_record, latest_history};
use crate::model::{Archive, DailyRecord, Dated, HotspotHistory, LastUpdated, Latest, Summary};
use crate::parser::BulletinParser;
use crate::store::{self, read_json, write_json};
use crate::vocab::{Corrections, Vocabulary};
use crate::zones::scrape_zones;
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Domain {
    Cases,
    Hotspots,
    Zones,
    TestReports,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::Cases,
        Domain::Hotspots,
        Domain::Zones,
        Domain::TestReports,
    ];
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Domain::Cases => "cases",
            Domain::Hotspots => "hotspots",
            Domain::Zones => "zones",
            Domain::TestReports => "tests",
        })
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cases" | "history" => Ok(Domain::Cases),
            "hotspots" => Ok(Domain::Hotspots),
            "zones" => Ok(Domain::Zones),
            "tests" | "test-reports" | "testreports" => Ok(Domain::TestReports),
            other => Err(format!(
                "unknown domain {other:?} (expected cases, hotspots, zones or tests)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub config: Config,
    pub domains: BTreeSet<Domain>,
    pub dry_run: bool,
    /// Run the test-report task only after the other domains have finished.
    pub defer_test_reports: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainStatus {
    Updated(Reconciliation),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct DomainReport {
    pub domain: Domain,
    pub status: DomainStatus,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub last_updated: String,
    pub date: NaiveDate,
    pub domains: Vec<DomainReport>,
}

impl SyncReport {
    pub fn failed(&self) -> usize {
        self.domains
            .iter()
            .filter(|r| matches!(r.status, DomainStatus::Failed(_)))
            .count()
    }

    pub fn status(&self, domain: Domain) -> Option<&DomainStatus> {
        self.domains
            .iter()
            .find(|r| r.domain == domain)
            .map(|r| &r.status)
    }
}

/// Everything a domain task reads; built once per run and shared read-only.
struct RunContext<'a> {
    config: &'a Config,
    transport: &'a dyn Transport,
    vocabulary: &'a Vocabulary,
    corrections: Corrections,
    last_updated: LastUpdated,
    dry_run: bool,
}

impl RunContext<'_> {
    fn path(&self, file: &str) -> PathBuf {
        self.config.paths.data_dir.join(file)
    }
}

pub fn sync(
    options: &SyncOptions,
    transport: &dyn Transport,
    vocabulary: &Vocabulary,
) -> Result<SyncReport> {
    let last_updated = scrape_last_updated(transport, &options.config)
        .context("cannot determine the dashboard last-updated stamp; aborting run")?;

    let ctx = RunContext {
        config: &options.config,
        transport,
        vocabulary,
        corrections: Corrections::with_overrides(&options.config.corrections),
        last_updated,
        dry_run: options.dry_run,
    };

    let deferred = options.defer_test_reports && options.domains.contains(&Domain::TestReports);
    let concurrent = options
        .domains
        .iter()
        .copied()
        .filter(|d| !(deferred && *d == Domain::TestReports))
        .collect::<Vec<_>>();

    let mut reports = std::thread::scope(|scope| {
        let handles = concurrent
            .iter()
            .map(|domain| {
                let ctx = &ctx;
                let domain = *domain;
                (domain, scope.spawn(move || run_domain(ctx, domain)))
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .map(|(domain, handle)| {
                handle.join().unwrap_or_else(|_| DomainReport {
                    domain,
                    status: DomainStatus::Failed("task panicked".to_string()),
                    elapsed_ms: 0,
                })
            })
            .collect::<Vec<_>>()
    });

    if deferred {
        reports.push(run_domain(&ctx, Domain::TestReports));
    }

    if options.dry_run {
        info!("dry run enabled; archives not persisted");
    }

    Ok(SyncReport {
        last_updated: ctx.last_updated.text.clone(),
        date: ctx.last_updated.date,
        domains: reports,
    })
}

fn run_domain(ctx: &RunContext<'_>, domain: Domain) -> DomainReport {
    let started = Instant::now();
    info!(domain = %domain, date = %ctx.last_updated.date, "domain update start");

    let result = match domain {
        Domain::Cases => update_cases(ctx),
        Domain::TestReports => update_test_reports(ctx),
        Domain::Hotspots => update_hotspots(ctx),
        Domain::Zones => update_zones(ctx),
    };
    let elapsed_ms = started.elapsed().as_millis();

    let status = match result {
        Ok(outcome) => {
            info!(domain = %domain, outcome = %outcome, elapsed_ms, "domain updated");
            DomainStatus::Updated(outcome)
        }
        Err(err) => {
            error!(
                domain = %domain,
                error = %format!("{err:#}"),
                "domain update failed; stored archive left untouched"
            );
            DomainStatus::Failed(format!("{err:#}"))
        }
    };

    DomainReport {
        domain,
        status,
        elapsed_ms,
    }
}

fn update_cases(ctx: &RunContext<'_>) -> Result<Reconciliation> {
    let date = ctx.last_updated.date;
    let stamp = ctx.last_updated.text.as_str();
    let summary = scrape_district_summary(ctx.transport, ctx.config)
        .context("failed to scrape district summary")?;

    let path = ctx.path(store::CASE_HISTORY);
    let mut archive: Archive<DailyRecord> = read_json(&path)?;
    let record = build_daily_record(date, summary, archive.baseline_for(date))?;

    let latest = latest_history(&record, stamp);
    let totals = history::summary(&record, stamp);
    let outcome = archive.reconcile(record, stamp);

    if !ctx.dry_run {
        write_json(&path, &archive)?;
        write_json(&ctx.path(store::CASE_LATEST), &latest)?;
        write_json(&ctx.path(store::CASE_SUMMARY), &totals)?;
    }
    Ok(outcome)
}

fn update_test_reports(ctx: &RunContext<'_>) -> Result<Reconciliation> {
    let report = scrape_test_report(ctx.transport, ctx.config, ctx.last_updated.date)
        .context("failed to scrape test report")?;
    persist(ctx, store::TEST_HISTORY, store::TEST_LATEST, report)
}

fn update_hotspots(ctx: &RunContext<'_>) -> Result<Reconciliation> {
    let history = bulletin_hotspots(
        ctx.transport,
        ctx.config,
        ctx.vocabulary,
        &ctx.corrections,
        ctx.last_updated.date,
        None,
    )?;
    persist(ctx, store::HOTSPOT_HISTORY, store::HOTSPOT_LATEST, history)
}

fn update_zones(ctx: &RunContext<'_>) -> Result<Reconciliation> {
    let record = scrape_zones(
        ctx.transport,
        &ctx.config.zones,
        ctx.last_updated.date,
        ctx.config.matching.min_score,
    )
    .context("failed to scrape zone classification")?;
    persist(ctx, store::ZONE_HISTORY, store::ZONE_LATEST, record)
}

fn persist<T>(
    ctx: &RunContext<'_>,
    history_file: &str,
    latest_file: &str,
    record: T,
) -> Result<Reconciliation>
where
    T: Dated + Serialize + DeserializeOwned,
{
    let path = ctx.path(history_file);
    let mut archive: Archive<T> = read_json(&path)?;
    let outcome = archive.reconcile(record, &ctx.last_updated.text);

    if !ctx.dry_run {
        write_json(&path, &archive)?;
        let latest = archive
            .latest()
            .ok_or_else(|| anyhow!("archive {} is empty after reconcile", path.display()))?;
        write_json(
            &ctx.path(latest_file),
            &Latest {
                record: latest,
                last_updated: &archive.last_updated,
            },
        )?;
    }
    Ok(outcome)
}

/// Hotspots of one bulletin, from a local PDF or downloaded for `date`.
pub fn bulletin_hotspots(
    transport: &dyn Transport,
    config: &Config,
    vocabulary: &Vocabulary,
    corrections: &Corrections,
    date: NaiveDate,
    local_pdf: Option<&Path>,
) -> Result<HotspotHistory> {
    let pdf = match local_pdf {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read bulletin {}", path.display()))?,
        None => download_bulletin(transport, &config.bulletin, date)
            .context("failed to download bulletin")?,
    };

    let parser = BulletinParser::new(vocabulary, corrections, config.matching.min_score);
    let history = parser
        .parse_pdf(&pdf, date)
        .context("failed to parse hotspot bulletin")?;
    if history.hotspots.is_empty() {
        warn!(date = %date, "bulletin lists no hotspots");
    }
    Ok(history)
}

/// State-wide totals of the newest stored case record.
pub fn stored_summary(config: &Config) -> Result<Option<Summary>> {
    let archive: Archive<DailyRecord> = read_json(&config.paths.data_dir.join(store::CASE_HISTORY))?;
    Ok(archive
        .latest()
        .map(|record| history::summary(record, &archive.last_updated)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains_parse_from_cli_names() {
        assert_eq!("cases".parse::<Domain>(), Ok(Domain::Cases));
        assert_eq!("Test-Reports".parse::<Domain>(), Ok(Domain::TestReports));
        assert_eq!(" zones ".parse::<Domain>(), Ok(Domain::Zones));
        assert!("weather".parse::<Domain>().is_err());

        for domain in Domain::ALL {
            assert_eq!(domain.to_string().parse::<Domain>(), Ok(domain));
        }
    }
}
