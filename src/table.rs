//! District-keyed extraction from dashboard HTML tables.

use crate::error::{ScrapeError, ScrapeResult};
use crate::vocab::{DISTRICTS, district_for_abbreviation};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::debug;

/// Row values keyed by canonical district name.
pub type DistrictRows = BTreeMap<String, Vec<String>>;

pub fn parse_selector(selector: &str) -> ScrapeResult<Selector> {
    Selector::parse(selector)
        .map_err(|err| ScrapeError::parse(format!("invalid CSS selector {selector:?}: {err:?}")))
}

pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Cell texts of every `<tr>` under the elements matching `section`.
/// Rows without any `<td>` are skipped.
pub fn table_rows(document: &Html, section: &str) -> ScrapeResult<Vec<Vec<String>>> {
    let section = parse_selector(section)?;
    let row_selector = parse_selector("tr")?;
    let cell_selector = parse_selector("td")?;

    let mut rows = Vec::new();
    for table in document.select(&section) {
        for row in table.select(&row_selector) {
            let cells = row
                .select(&cell_selector)
                .map(element_text)
                .collect::<Vec<_>>();
            if cells.is_empty() {
                continue;
            }
            rows.push(cells);
        }
    }
    Ok(rows)
}

/// Maps each row's first cell through the abbreviation table. Rows with an
/// unknown abbreviation land under the empty key; callers are expected to
/// run [`require_districts`] on the result.
pub fn extract(document: &Html, section: &str) -> ScrapeResult<DistrictRows> {
    let mut data = DistrictRows::new();
    for mut cells in table_rows(document, section)? {
        let first = cells.remove(0);
        let key = district_for_abbreviation(&first).unwrap_or_default();
        if key.is_empty() {
            debug!(cell = %first, "row label is not a district abbreviation");
        }
        data.insert(key.to_string(), cells);
    }
    Ok(data)
}

/// Checks that every canonical district has a row with at least `columns`
/// values.
pub fn require_districts(rows: &DistrictRows, columns: usize, what: &str) -> ScrapeResult<()> {
    if rows.is_empty() {
        return Err(ScrapeError::parse(format!(
            "table extraction failed for {what}: no rows found"
        )));
    }

    let missing = DISTRICTS
        .iter()
        .filter(|d| rows.get(**d).is_none_or(|values| values.len() < columns))
        .copied()
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(ScrapeError::parse(format!(
            "table extraction failed for {what}: missing or short rows for {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

/// Parses a counter cell, tolerating whitespace and thousands separators.
pub fn parse_count(cell: &str) -> ScrapeResult<i64> {
    let cleaned = cell
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect::<String>();
    let value = cleaned
        .parse::<i64>()
        .map_err(|_| ScrapeError::parse(format!("expected a count, found {cell:?}")))?;
    if value < 0 {
        return Err(ScrapeError::validation(format!(
            "negative count {value} in snapshot"
        )));
    }
    Ok(value)
}
