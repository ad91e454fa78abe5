use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, Sub};

/// Per-district counters. Snapshots are non-negative; deltas may not be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictInfo {
    #[serde(rename = "hospital_obs")]
    pub hospital_observation: i64,
    #[serde(rename = "home_obs")]
    pub home_observation: i64,
    #[serde(rename = "total_obs")]
    pub total_observation: i64,
    #[serde(rename = "hospital_today")]
    pub hospitalized_today: i64,
    pub confirmed: i64,
    pub recovered: i64,
    pub deceased: i64,
    pub active: i64,
}

impl DistrictInfo {
    fn zip_with(self, other: Self, f: impl Fn(i64, i64) -> i64) -> Self {
        Self {
            hospital_observation: f(self.hospital_observation, other.hospital_observation),
            home_observation: f(self.home_observation, other.home_observation),
            total_observation: f(self.total_observation, other.total_observation),
            hospitalized_today: f(self.hospitalized_today, other.hospitalized_today),
            confirmed: f(self.confirmed, other.confirmed),
            recovered: f(self.recovered, other.recovered),
            deceased: f(self.deceased, other.deceased),
            active: f(self.active, other.active),
        }
    }
}

impl Add for DistrictInfo {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Sub for DistrictInfo {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl std::iter::Sum for DistrictInfo {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub summary: BTreeMap<String, DistrictInfo>,
    pub delta: BTreeMap<String, DistrictInfo>,
    #[serde(with = "dashboard_date")]
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    #[serde(with = "dashboard_date")]
    pub date: NaiveDate,
    pub total: i64,
    pub negative: i64,
    pub positive: i64,
    pub pending: i64,
    pub today: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today_positive: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotspot {
    pub district: String,
    #[serde(rename = "lsgd")]
    pub lsg_division: String,
    #[serde(default)]
    pub wards: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotHistory {
    pub hotspots: Vec<Hotspot>,
    #[serde(with = "dashboard_date")]
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub districts: BTreeMap<String, String>,
    #[serde(with = "dashboard_date")]
    pub date: NaiveDate,
}

/// Records that live in an append-only, date-keyed archive.
pub trait Dated {
    fn date(&self) -> NaiveDate;
}

impl Dated for DailyRecord {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Dated for TestReport {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Dated for HotspotHistory {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Dated for ZoneRecord {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive<T> {
    #[serde(alias = "histories", alias = "reports")]
    pub history: Vec<T>,
    #[serde(default)]
    pub last_updated: String,
}

impl<T> Default for Archive<T> {
    fn default() -> Self {
        Self {
            history: Vec::new(),
            last_updated: String::new(),
        }
    }
}

/// Dashboard "last updated" stamp; the run date is its leading `DD-MM-YYYY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastUpdated {
    pub text: String,
    pub date: NaiveDate,
}

/// Companion of the case archive holding only the newest record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestHistory {
    pub summary: BTreeMap<String, DistrictInfo>,
    pub delta: BTreeMap<String, DistrictInfo>,
    pub last_updated: String,
}

/// State-wide totals of the newest case record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub summary: DistrictInfo,
    pub delta: DistrictInfo,
    pub last_updated: String,
}

/// Companion file for the non-case domains: the record plus `last_updated`.
#[derive(Debug, Serialize)]
pub struct Latest<'a, T> {
    #[serde(flatten)]
    pub record: &'a T,
    pub last_updated: &'a str,
}

pub mod dashboard_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub const FORMAT: &str = "%d-%m-%Y";

    pub fn parse(value: &str) -> Option<NaiveDate> {
        let value = value.trim();
        NaiveDate::parse_from_str(value, FORMAT)
            .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
            .ok()
    }

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid date {raw:?}")))
    }
}
