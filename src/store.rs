use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

pub const CASE_HISTORY: &str = "histories.json";
pub const CASE_LATEST: &str = "latest.json";
pub const CASE_SUMMARY: &str = "summary.json";
pub const TEST_HISTORY: &str = "testreports.json";
pub const TEST_LATEST: &str = "testreports_latest.json";
pub const HOTSPOT_HISTORY: &str = "hotspots_history.json";
pub const HOTSPOT_LATEST: &str = "hotspots.json";
pub const ZONE_HISTORY: &str = "zones_history.json";
pub const ZONE_LATEST: &str = "zones.json";

/// Reads a JSON document, or `T::default()` when the file does not exist yet.
pub fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(value)
}

/// Writes compact JSON through a sibling temp file and a rename, so readers
/// never observe a half-written document.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let serialized = serde_json::to_string(value)?;
    let tmp = tmp_path(path);
    std::fs::write(&tmp, serialized)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
