use crate::config::ZonesConfig;
use crate::error::{ScrapeError, ScrapeResult};
use crate::fetch::{Transport, fetch_ok};
use crate::model::ZoneRecord;
use crate::vocab::resolve_district;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ZoneFeed {
    #[serde(default)]
    zones: Vec<ZoneEntry>,
}

#[derive(Debug, Deserialize)]
struct ZoneEntry {
    #[serde(default)]
    district: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    zone: String,
    #[serde(default, rename = "lastupdated")]
    last_updated: Option<String>,
}

pub fn scrape_zones(
    transport: &dyn Transport,
    config: &ZonesConfig,
    date: NaiveDate,
    min_score: u8,
) -> ScrapeResult<ZoneRecord> {
    let doc = fetch_ok(transport, &config.feed_url, &config.feed_url)?;
    let record = parse_zone_feed(&doc.body, config, date, min_score)?;
    info!(
        state = %config.state,
        districts = record.districts.len(),
        "zone classification scraped"
    );
    Ok(record)
}

/// Projects the feed onto `{canonical district -> lower-cased zone}` for the
/// configured state, rejecting anything but the expected district count.
pub fn parse_zone_feed(
    body: &[u8],
    config: &ZonesConfig,
    date: NaiveDate,
    min_score: u8,
) -> ScrapeResult<ZoneRecord> {
    let feed: ZoneFeed = serde_json::from_slice(body)?;
    let mut districts = BTreeMap::new();

    for entry in feed
        .zones
        .into_iter()
        .filter(|z| z.state.trim().eq_ignore_ascii_case(config.state.trim()))
    {
        let zone = entry.zone.trim().to_lowercase();
        if zone.is_empty() {
            return Err(ScrapeError::validation(format!(
                "zone feed has no label for {}",
                entry.district
            )));
        }
        let district = resolve_district(&entry.district, min_score)?.matched;
        debug!(
            district = %district,
            zone = %zone,
            feed_updated = entry.last_updated.as_deref().unwrap_or(""),
            "zone entry"
        );
        if districts.insert(district.clone(), zone).is_some() {
            return Err(ScrapeError::validation(format!(
                "zone feed entry {:?} resolves to {district} twice",
                entry.district
            )));
        }
    }

    if districts.len() != config.expected_districts {
        return Err(ScrapeError::validation(format!(
            "zone feed lists {} districts for {}, expected {}",
            districts.len(),
            config.state,
            config.expected_districts
        )));
    }

    Ok(ZoneRecord { districts, date })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::DISTRICTS;

    fn feed(names: &[&str]) -> String {
        let mut zones = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let zone = if i % 3 == 0 { "Red" } else { "Orange" };
                format!(
                    r#"{{"district":"{name}","districtcode":"KL_{i}","lastupdated":"01/05/2020","source":"x","state":"Kerala","statecode":"KL","zone":"{zone}"}}"#
                )
            })
            .collect::<Vec<_>>();
        zones.push(
            r#"{"district":"Chennai","districtcode":"TN_1","lastupdated":"01/05/2020","source":"x","state":"Tamil Nadu","statecode":"TN","zone":"Red"}"#
                .to_string(),
        );
        format!(r#"{{"zones":[{}]}}"#, zones.join(","))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 5, 1).unwrap()
    }

    #[test]
    fn filters_state_and_lowercases_labels() {
        let record =
            parse_zone_feed(feed(&DISTRICTS).as_bytes(), &ZonesConfig::default(), date(), 60)
                .unwrap();

        assert_eq!(record.districts.len(), 14);
        assert_eq!(record.districts["Thiruvananthapuram"], "red");
        assert_eq!(record.districts["Kollam"], "orange");
        assert!(!record.districts.contains_key("Chennai"));
        assert_eq!(record.date, date());
    }

    #[test]
    fn partial_feed_is_rejected() {
        let err = parse_zone_feed(
            feed(&DISTRICTS[..12]).as_bytes(),
            &ZonesConfig::default(),
            date(),
            60,
        )
        .unwrap_err();
        assert!(matches!(err, ScrapeError::Validation(_)));
        assert!(err.to_string().contains("12 districts"));
    }

    #[test]
    fn feed_spellings_resolve_to_canonical_names() {
        let mut names = DISTRICTS.to_vec();
        names[13] = "Kasargod";
        let record =
            parse_zone_feed(feed(&names).as_bytes(), &ZonesConfig::default(), date(), 60).unwrap();
        assert!(record.districts.contains_key("Kasaragod"));
    }

    #[test]
    fn duplicate_district_is_rejected() {
        let mut names = DISTRICTS.to_vec();
        names[12] = "Kasargod";
        let err = parse_zone_feed(feed(&names).as_bytes(), &ZonesConfig::default(), date(), 60)
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Validation(_)));
        assert!(err.to_string().contains("Kasaragod twice"));
    }

    #[test]
    fn malformed_feed_is_an_error() {
        let err = parse_zone_feed(b"<html>", &ZonesConfig::default(), date(), 60).unwrap_err();
        assert!(matches!(err, ScrapeError::Json(_)));
    }
}
