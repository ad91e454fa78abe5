//! Replace-or-append reconciliation of dated archives, plus delta and
//! aggregate computation for the case history.

use crate::error::{ScrapeError, ScrapeResult};
use crate::model::{Archive, DailyRecord, Dated, DistrictInfo, LatestHistory, Summary};
use crate::vocab::DISTRICTS;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Appended,
    Replaced,
}

impl fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reconciliation::Appended => f.write_str("appended"),
            Reconciliation::Replaced => f.write_str("replaced"),
        }
    }
}

impl<T: Dated> Archive<T> {
    /// Replaces the last record when it carries the same date, appends
    /// otherwise. `last_updated` always takes the scraped stamp.
    pub fn reconcile(&mut self, record: T, last_updated: &str) -> Reconciliation {
        let outcome = match self.history.last_mut() {
            Some(last) if last.date() == record.date() => {
                *last = record;
                Reconciliation::Replaced
            }
            _ => {
                self.history.push(record);
                Reconciliation::Appended
            }
        };
        self.last_updated = last_updated.to_string();
        outcome
    }

    /// Newest record dated differently from `date`: the baseline a record
    /// for `date` is compared against, whether it ends up appended or
    /// replacing a same-day entry.
    pub fn baseline_for(&self, date: NaiveDate) -> Option<&T> {
        self.history.iter().rev().find(|r| r.date() != date)
    }

    pub fn latest(&self) -> Option<&T> {
        self.history.last()
    }
}

/// Builds today's record with per-district deltas against `previous`.
/// Without a previous record the baseline is zero.
pub fn build_daily_record(
    date: NaiveDate,
    summary: BTreeMap<String, DistrictInfo>,
    previous: Option<&DailyRecord>,
) -> ScrapeResult<DailyRecord> {
    ensure_canonical_keys(&summary)?;

    let delta = summary
        .iter()
        .map(|(district, today)| {
            let before = previous
                .and_then(|p| p.summary.get(district))
                .copied()
                .unwrap_or_default();
            (district.clone(), *today - before)
        })
        .collect();

    Ok(DailyRecord {
        summary,
        delta,
        date,
    })
}

fn ensure_canonical_keys(summary: &BTreeMap<String, DistrictInfo>) -> ScrapeResult<()> {
    let unknown = summary
        .keys()
        .filter(|k| !DISTRICTS.contains(&k.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    let missing = DISTRICTS
        .iter()
        .filter(|d| !summary.contains_key(**d))
        .copied()
        .collect::<Vec<_>>();

    if unknown.is_empty() && missing.is_empty() {
        return Ok(());
    }
    Err(ScrapeError::validation(format!(
        "district summary does not match canonical set (missing: [{}], unknown: [{}])",
        missing.join(", "),
        unknown.join(", ")
    )))
}

/// State-wide totals of a record's summary and delta.
pub fn aggregate(record: &DailyRecord) -> (DistrictInfo, DistrictInfo) {
    (
        record.summary.values().copied().sum(),
        record.delta.values().copied().sum(),
    )
}

pub fn latest_history(record: &DailyRecord, last_updated: &str) -> LatestHistory {
    LatestHistory {
        summary: record.summary.clone(),
        delta: record.delta.clone(),
        last_updated: last_updated.to_string(),
    }
}

pub fn summary(record: &DailyRecord, last_updated: &str) -> Summary {
    let (summary, delta) = aggregate(record);
    Summary {
        summary,
        delta,
        last_updated: last_updated.to_string(),
    }
}
