use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub bulletin: BulletinConfig,
    #[serde(default)]
    pub zones: ZonesConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    /// Extra raw -> canonical LSG label overrides, merged over the built-in table.
    #[serde(default)]
    pub corrections: BTreeMap<String, String>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("dashboard.base_url", &self.dashboard.base_url),
            ("bulletin.site_url", &self.bulletin.site_url),
            ("bulletin.index_url", &self.bulletin.index_url),
            ("zones.feed_url", &self.zones.feed_url),
        ] {
            Url::parse(value).with_context(|| format!("{key} is not a valid url: {value}"))?;
        }

        if self.matching.min_score > 100 {
            bail!(
                "matching.min_score must be within 0..=100, got {}",
                self.matching.min_score
            );
        }
        if self.bulletin.max_pages == 0 {
            bail!("bulletin.max_pages must be at least 1");
        }
        if self.zones.state.trim().is_empty() {
            bail!("zones.state must not be empty");
        }
        if self.zones.expected_districts == 0 {
            bail!("zones.expected_districts must be at least 1");
        }

        Ok(())
    }

    pub fn dashboard_url(&self, page: &str) -> Result<String> {
        join_url(&self.dashboard.base_url, page)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_dashboard_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept")]
    pub accept: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: default_dashboard_url(),
            user_agent: default_user_agent(),
            accept: default_accept(),
            accept_language: default_accept_language(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulletinConfig {
    #[serde(default = "default_bulletin_site")]
    pub site_url: String,
    #[serde(default = "default_bulletin_index")]
    pub index_url: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
}

impl Default for BulletinConfig {
    fn default() -> Self {
        Self {
            site_url: default_bulletin_site(),
            index_url: default_bulletin_index(),
            max_pages: default_max_pages(),
            page_delay_ms: default_page_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZonesConfig {
    #[serde(default = "default_zones_feed")]
    pub feed_url: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default = "default_expected_districts")]
    pub expected_districts: usize,
}

impl Default for ZonesConfig {
    fn default() -> Self {
        Self {
            feed_url: default_zones_feed(),
            state: default_state(),
            expected_districts: default_expected_districts(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_min_score")]
    pub min_score: u8,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_features")]
    pub features: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            features: default_features(),
        }
    }
}

/// Loads the config file, or the built-in defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        toml::from_str::<Config>(&text)
            .with_context(|| format!("failed to parse toml in {}", path.display()))?
    } else {
        Config::default()
    };

    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

pub fn join_url(base: &str, path: &str) -> Result<String> {
    let base = Url::parse(base).with_context(|| format!("invalid base url {base}"))?;
    let joined = base
        .join(path)
        .with_context(|| format!("cannot join {path} onto {base}"))?;
    Ok(joined.to_string())
}

fn default_dashboard_url() -> String {
    "https://dashboard.kerala.gov.in/".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:75.0) Gecko/20100101 Firefox/75.0".to_string()
}

fn default_accept() -> String {
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8".to_string()
}

fn default_accept_language() -> String {
    "en-GB,en;q=0.5".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_bulletin_site() -> String {
    "https://dhs.kerala.gov.in/".to_string()
}

fn default_bulletin_index() -> String {
    "https://dhs.kerala.gov.in/category/daily-bulletin/".to_string()
}

fn default_max_pages() -> usize {
    30
}

fn default_page_delay_ms() -> u64 {
    200
}

fn default_zones_feed() -> String {
    "https://api.covid19india.org/zones.json".to_string()
}

fn default_state() -> String {
    "Kerala".to_string()
}

fn default_expected_districts() -> usize {
    14
}

fn default_min_score() -> u8 {
    crate::fuzzy::DEFAULT_MIN_SCORE
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_features() -> PathBuf {
    PathBuf::from("data/features.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.matching.min_score, 60);
        assert_eq!(config.bulletin.max_pages, 30);
        assert_eq!(config.zones.state, "Kerala");
        assert!(config.corrections.is_empty());
    }

    #[test]
    fn corrections_and_threshold_are_read_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [matching]
            min_score = 75

            [corrections]
            "Pazhayangadi (P)" = "Pazhayangadi"
            "#,
        )
        .unwrap();
        assert_eq!(config.matching.min_score, 75);
        assert_eq!(
            config.corrections.get("Pazhayangadi (P)").map(String::as_str),
            Some("Pazhayangadi")
        );
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let config: Config = toml::from_str("[matching]\nmin_score = 140\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_page_cap() {
        let config: Config = toml::from_str("[bulletin]\nmax_pages = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn joins_relative_dashboard_pages() {
        let config = Config::default();
        assert_eq!(
            config.dashboard_url("index.php").unwrap(),
            "https://dashboard.kerala.gov.in/index.php"
        );
    }
}
