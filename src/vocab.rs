//! Canonical reference data: districts, their abbreviations, the LSG
//! divisions of every district, and the curated name-correction table.
//!
//! All of it is loaded once at start-up and only read afterwards.

use crate::error::{ScrapeError, ScrapeResult};
use crate::fuzzy::{self, Resolution};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{info, warn};

pub const DISTRICT_COUNT: usize = 14;

/// Canonical district names, in the order the state publishes them.
pub const DISTRICTS: [&str; DISTRICT_COUNT] = [
    "Thiruvananthapuram",
    "Kollam",
    "Pathanamthitta",
    "Alappuzha",
    "Kottayam",
    "Idukki",
    "Ernakulam",
    "Thrissur",
    "Palakkad",
    "Malappuram",
    "Kozhikode",
    "Wayanad",
    "Kannur",
    "Kasaragod",
];

const ABBREVIATIONS: [(&str, &str); DISTRICT_COUNT] = [
    ("TVM", "Thiruvananthapuram"),
    ("KLM", "Kollam"),
    ("PTA", "Pathanamthitta"),
    ("ALP", "Alappuzha"),
    ("KTM", "Kottayam"),
    ("IDK", "Idukki"),
    ("EKM", "Ernakulam"),
    ("TSR", "Thrissur"),
    ("PKD", "Palakkad"),
    ("MPM", "Malappuram"),
    ("KKD", "Kozhikode"),
    ("WYD", "Wayanad"),
    ("KNR", "Kannur"),
    ("KGD", "Kasaragod"),
];

/// Known misrenderings in the bulletin PDFs and the LSG label they stand for.
pub const DEFAULT_CORRECTIONS: &[(&str, &str)] = &[
    ("Koothuparamba (M)", "Kuthuparambu (M)"),
    ("Changanacherry (M)", "Changanassery (M)"),
    ("District Hospital", "Marutharoad"),
];

static KIND_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(\(.\))\s*").expect("kind marker regex must compile")
});

pub fn district_for_abbreviation(abbreviation: &str) -> Option<&'static str> {
    let abbreviation = abbreviation.trim();
    ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| abbr.eq_ignore_ascii_case(abbreviation))
        .map(|(_, name)| *name)
}

pub fn is_canonical_district(name: &str) -> bool {
    DISTRICTS.contains(&name)
}

/// Resolves a noisy district name against the canonical list.
pub fn resolve_district(query: &str, min_score: u8) -> ScrapeResult<Resolution> {
    fuzzy::resolve("district", query, &DISTRICTS, min_score)
}

/// Exact raw -> canonical replacements applied to bulletin rows before
/// fuzzy matching.
#[derive(Debug, Clone)]
pub struct Corrections {
    table: BTreeMap<String, String>,
}

impl Default for Corrections {
    fn default() -> Self {
        Self {
            table: DEFAULT_CORRECTIONS
                .iter()
                .map(|(raw, fixed)| (raw.to_string(), fixed.to_string()))
                .collect(),
        }
    }
}

impl Corrections {
    /// Built-in table with `overrides` layered on top.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut corrections = Self::default();
        for (raw, fixed) in overrides {
            corrections.table.insert(raw.clone(), fixed.clone());
        }
        corrections
    }

    pub fn apply<'a>(&'a self, raw: &'a str) -> &'a str {
        self.table.get(raw).map(String::as_str).unwrap_or(raw)
    }

    /// `(raw, fixed)` pairs in raw-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.table
            .iter()
            .map(|(raw, fixed)| (raw.as_str(), fixed.as_str()))
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: FeatureProperties,
}

#[derive(Debug, Default, Deserialize)]
struct FeatureProperties {
    #[serde(rename = "DISTRICT", default)]
    district: Option<String>,
    #[serde(rename = "LSGD", default)]
    lsgd: Option<String>,
}

/// District -> LSG division names.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    lsg: BTreeMap<String, Vec<String>>,
}

impl Vocabulary {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read feature file {}", path.display()))?;
        let vocabulary = Self::from_geojson(&text)
            .with_context(|| format!("failed to load vocabulary from {}", path.display()))?;

        info!(
            file = %path.display(),
            districts = vocabulary.lsg.len(),
            divisions = vocabulary.division_count(),
            "vocabulary loaded"
        );
        Ok(vocabulary)
    }

    pub fn from_geojson(text: &str) -> ScrapeResult<Self> {
        let collection: FeatureCollection = serde_json::from_str(text)?;
        let mut lsg: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for feature in collection.features {
            let props = feature.properties;
            let district = props.district.unwrap_or_default();
            let district = district.trim();
            if district.is_empty() {
                continue;
            }
            let Some(name) = props.lsgd.as_deref().map(normalize_lsg_label) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            let key = if is_canonical_district(district) {
                district.to_string()
            } else {
                match resolve_district(district, fuzzy::DEFAULT_MIN_SCORE) {
                    Ok(resolved) => resolved.matched,
                    Err(err) => {
                        warn!(district, error = %err, "skipping feature outside canonical districts");
                        continue;
                    }
                }
            };

            lsg.entry(key).or_default().push(name);
        }

        if lsg.is_empty() {
            return Err(ScrapeError::validation(
                "feature collection contains no district/LSG pairs",
            ));
        }

        Ok(Self { lsg })
    }

    pub fn from_map(lsg: BTreeMap<String, Vec<String>>) -> Self {
        Self { lsg }
    }

    pub fn divisions(&self, district: &str) -> &[String] {
        self.lsg.get(district).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn district_count(&self) -> usize {
        self.lsg.len()
    }

    pub fn division_count(&self) -> usize {
        self.lsg.values().map(Vec::len).sum()
    }
}

/// `Kuthuparambu(M)` -> `Kuthuparambu (M)`.
pub fn normalize_lsg_label(raw: &str) -> String {
    KIND_MARKER.replace_all(raw.trim(), " $1").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_cover_every_district_once() {
        let mut names = ABBREVIATIONS.iter().map(|(_, n)| *n).collect::<Vec<_>>();
        names.sort_unstable();
        let mut expected = DISTRICTS.to_vec();
        expected.sort_unstable();
        assert_eq!(names, expected);

        assert_eq!(district_for_abbreviation(" ekm "), Some("Ernakulam"));
        assert_eq!(district_for_abbreviation("XYZ"), None);
    }

    #[test]
    fn corrections_rewrite_known_names() {
        let corrections = Corrections::default();
        assert_eq!(corrections.apply("Koothuparamba (M)"), "Kuthuparambu (M)");
        assert_eq!(corrections.apply("District Hospital"), "Marutharoad");
        assert_eq!(corrections.apply("Kannur (M)"), "Kannur (M)");
    }

    #[test]
    fn correction_overrides_extend_builtin_table() {
        let overrides = BTreeMap::from([
            ("Kanjirapally".to_string(), "Kanjirappally".to_string()),
            ("District Hospital".to_string(), "Palakkad (M)".to_string()),
        ]);
        let corrections = Corrections::with_overrides(&overrides);
        assert_eq!(corrections.iter().count(), DEFAULT_CORRECTIONS.len() + 1);
        assert!(
            corrections
                .iter()
                .any(|pair| pair == ("Kanjirapally", "Kanjirappally"))
        );
        assert_eq!(corrections.apply("Kanjirapally"), "Kanjirappally");
        assert_eq!(corrections.apply("District Hospital"), "Palakkad (M)");
    }

    #[test]
    fn normalizes_kind_marker_spacing() {
        assert_eq!(normalize_lsg_label("Kuthuparambu(M)"), "Kuthuparambu (M)");
        assert_eq!(normalize_lsg_label("Kannur  (C) "), "Kannur (C)");
        assert_eq!(normalize_lsg_label("Aralam"), "Aralam");
    }

    #[test]
    fn loads_divisions_from_feature_collection() {
        let vocabulary = Vocabulary::from_geojson(
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature", "properties": {"DISTRICT": "Kannur", "LSGD": "Kuthuparambu(M)"}},
                    {"type": "Feature", "properties": {"DISTRICT": "Kannur", "LSGD": "Aralam"}},
                    {"type": "Feature", "properties": {"DISTRICT": "", "LSGD": "Nowhere"}},
                    {"type": "Feature", "properties": {"DISTRICT": "Kottayam", "LSGD": "Changanassery(M)"}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(vocabulary.district_count(), 2);
        assert_eq!(
            vocabulary.divisions("Kannur"),
            ["Kuthuparambu (M)".to_string(), "Aralam".to_string()]
        );
        assert!(vocabulary.divisions("Idukki").is_empty());
    }

    #[test]
    fn empty_feature_collection_is_rejected() {
        let err = Vocabulary::from_geojson(r#"{"features": []}"#).unwrap_err();
        assert!(matches!(err, ScrapeError::Validation(_)));
    }
}
