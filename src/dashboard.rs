//! Scrapes of the state dashboard: the "last updated" stamp, per-district
//! case counts and the daily test report.

use crate::config::Config;
use crate::error::{ScrapeError, ScrapeResult};
use crate::fetch::{Transport, fetch_ok};
use crate::model::{DistrictInfo, LastUpdated, TestReport, dashboard_date};
use crate::table::{self, DistrictRows, parse_count, require_districts};
use crate::vocab::{DISTRICTS, resolve_district};
use chrono::NaiveDate;
use regex::Regex;
use scraper::Html;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, info};

const INDEX_PAGE: &str = "index.php";
const QUARANTINE_PAGE: &str = "quarantined-datewise.php";
const QUARANTINE_SECTION: &str = "table.table:nth-child(1) > tbody:nth-child(3)";
const TESTING_PAGE: &str = "testing-view-public.php";
const TESTING_REFERER: &str = "quar_dst_wise_public.php";
const TESTING_SECTION: &str = ".table > tbody:nth-child(3)";

static GEOJSON_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"geojson/[^"'\s]*center\.geojson"#).expect("geojson link regex must compile")
});
static ROW_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d\d-\d\d-\d\d\d\d").expect("row date regex must compile"));

pub fn scrape_last_updated(transport: &dyn Transport, config: &Config) -> anyhow::Result<LastUpdated> {
    use anyhow::Context;

    let url = config.dashboard_url(INDEX_PAGE)?;
    let doc = fetch_ok(transport, &url, &url).context("failed to fetch dashboard index")?;
    let last_updated = parse_last_updated(&doc.text())?;
    info!(last_updated = %last_updated.text, date = %last_updated.date, "dashboard last updated");
    Ok(last_updated)
}

pub fn parse_last_updated(html: &str) -> ScrapeResult<LastUpdated> {
    let document = Html::parse_document(html);
    let selector = table::parse_selector(".breadcrumb-item")?;
    let breadcrumb = document
        .select(&selector)
        .flat_map(|el| el.text())
        .collect::<String>();

    let text = breadcrumb
        .split(": ")
        .nth(1)
        .map(|v| v.trim().to_uppercase())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ScrapeError::parse("last updated stamp not found on dashboard"))?;

    let date = text
        .split_whitespace()
        .next()
        .and_then(dashboard_date::parse)
        .ok_or_else(|| ScrapeError::parse(format!("last updated stamp has no date: {text:?}")))?;

    Ok(LastUpdated { text, date })
}

/// Per-district snapshot: case counts from the map feed, observation counts
/// from the quarantine table.
pub fn scrape_district_summary(
    transport: &dyn Transport,
    config: &Config,
) -> ScrapeResult<BTreeMap<String, DistrictInfo>> {
    let index_url = dashboard_url(config, INDEX_PAGE)?;
    let index = fetch_ok(transport, &index_url, &index_url)?;
    let link = find_geojson_link(&index.text())
        .ok_or_else(|| ScrapeError::parse("district case feed link not found on dashboard"))?;

    let feed_url = dashboard_url(config, &link)?;
    let feed = fetch_ok(transport, &feed_url, &index_url)?;
    let cases = parse_case_feed(&feed.body, config.matching.min_score)?;

    let quarantine_url = dashboard_url(config, QUARANTINE_PAGE)?;
    let page = fetch_ok(transport, &quarantine_url, &quarantine_url)?;
    let observations = table::extract(&Html::parse_document(&page.text()), QUARANTINE_SECTION)?;

    let summary = merge_observations(cases, &observations)?;
    debug!(districts = summary.len(), "district summary scraped");
    Ok(summary)
}

pub fn find_geojson_link(html: &str) -> Option<String> {
    GEOJSON_LINK.find(html).map(|m| m.as_str().to_string())
}

#[derive(Debug, Deserialize)]
struct CaseFeed {
    #[serde(default)]
    features: Vec<CaseFeature>,
}

#[derive(Debug, Deserialize)]
struct CaseFeature {
    properties: CaseProperties,
}

#[derive(Debug, Deserialize)]
struct CaseProperties {
    #[serde(rename = "District", default)]
    district: String,
    #[serde(rename = "covid_stat", default)]
    confirmed: i64,
    #[serde(rename = "covid_statcured", default)]
    recovered: i64,
    #[serde(rename = "covid_statdeath", default)]
    deceased: i64,
    #[serde(rename = "covid_statactive", default)]
    active: i64,
}

/// Case counters per canonical district; every district must be present.
pub fn parse_case_feed(body: &[u8], min_score: u8) -> ScrapeResult<BTreeMap<String, DistrictInfo>> {
    let feed: CaseFeed = serde_json::from_slice(body)?;
    let mut cases = BTreeMap::new();

    for feature in feed.features {
        let p = feature.properties;
        if [p.confirmed, p.recovered, p.deceased, p.active]
            .iter()
            .any(|v| *v < 0)
        {
            return Err(ScrapeError::validation(format!(
                "negative case count for {}",
                p.district
            )));
        }
        let district = resolve_district(&p.district, min_score)?.matched;
        let previous = cases.insert(
            district.clone(),
            DistrictInfo {
                confirmed: p.confirmed,
                recovered: p.recovered,
                deceased: p.deceased,
                active: p.active,
                ..DistrictInfo::default()
            },
        );
        if previous.is_some() {
            return Err(ScrapeError::validation(format!(
                "case feed entry {:?} resolves to {district} twice",
                p.district
            )));
        }
    }

    if cases.len() != DISTRICTS.len() {
        return Err(ScrapeError::validation(format!(
            "case feed resolved {} districts, expected {}",
            cases.len(),
            DISTRICTS.len()
        )));
    }
    Ok(cases)
}

/// Fills the observation columns (total, hospital, home, hospitalised today).
pub fn merge_observations(
    mut cases: BTreeMap<String, DistrictInfo>,
    observations: &DistrictRows,
) -> ScrapeResult<BTreeMap<String, DistrictInfo>> {
    require_districts(observations, 4, "quarantine observations")?;

    for district in DISTRICTS {
        let info = cases.get_mut(district).ok_or_else(|| {
            ScrapeError::validation(format!("no case counts for {district}"))
        })?;
        let row = &observations[district];
        info.total_observation = parse_count(&row[0])?;
        info.hospital_observation = parse_count(&row[1])?;
        info.home_observation = parse_count(&row[2])?;
        info.hospitalized_today = parse_count(&row[3])?;
    }
    Ok(cases)
}

pub fn scrape_test_report(
    transport: &dyn Transport,
    config: &Config,
    date: NaiveDate,
) -> ScrapeResult<TestReport> {
    let url = dashboard_url(config, TESTING_PAGE)?;
    let referer = dashboard_url(config, TESTING_REFERER)?;
    let page = fetch_ok(transport, &url, &referer)?;
    parse_test_report(&page.text(), date)
}

pub fn parse_test_report(html: &str, date: NaiveDate) -> ScrapeResult<TestReport> {
    let document = Html::parse_document(html);
    let rows = table::table_rows(&document, TESTING_SECTION)?;

    let row = rows
        .iter()
        .find(|cells| {
            ROW_DATE
                .find(&cells.join(" "))
                .and_then(|m| dashboard_date::parse(m.as_str()))
                == Some(date)
        })
        .ok_or_else(|| {
            ScrapeError::parse(format!(
                "no test report row for {}",
                date.format(dashboard_date::FORMAT)
            ))
        })?;

    if row.len() < 6 {
        return Err(ScrapeError::parse(format!(
            "test report row has {} cells, expected at least 6",
            row.len()
        )));
    }

    Ok(TestReport {
        date,
        total: parse_count(&row[1])?,
        negative: parse_count(&row[2])?,
        positive: parse_count(&row[3])?,
        pending: parse_count(&row[4])?,
        today: parse_count(&row[5])?,
        today_positive: row.get(6).map(|cell| parse_count(cell)).transpose()?,
    })
}

fn dashboard_url(config: &Config, page: &str) -> ScrapeResult<String> {
    config
        .dashboard_url(page)
        .map_err(|err| ScrapeError::parse(err.to_string()))
}
