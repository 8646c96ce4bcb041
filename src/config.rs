use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::DEFAULT_UPDATE_URL;
#[cfg(feature = "update")]
use crate::fetch::UpdateConfig;

/// Edition opened when none are configured
pub const DEFAULT_EDITION: &str = "GeoLite2-City";

pub struct GeolensConfig {
    /// Path to the directory holding dataset snapshots
    pub data_dir: String,

    /// Editions to open, in lookup order
    pub editions: Vec<String>,

    /// Seconds between background refreshes; 0 fetches once at startup only
    pub update_frequency_secs: u64,

    /// MaxMind account ID
    pub account_id: Option<u32>,

    /// MaxMind license key
    pub license_key: Option<String>,

    /// Base URL of the update service
    pub update_url: String,
}

const EMPTY_CONFIG: &str = r#"### geolens configuration file

### directory holding dataset snapshots
# data_dir = "~/.geolens"

### editions to open, comma separated, in lookup order
# editions = "GeoLite2-City,GeoLite2-ASN"

### seconds between background updates (0 = fetch missing datasets at startup only)
# update_frequency_secs = 86400

### MaxMind credentials, both required to download datasets
# account_id = 123456
# license_key = "xxxxxxxxxxxxxxxx"

### update service
# update_url = "https://updates.maxmind.com"
"#;

impl Default for GeolensConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.geolens", home_dir),
            editions: vec![DEFAULT_EDITION.to_string()],
            update_frequency_secs: 0,
            account_id: None,
            license_key: None,
            update_url: DEFAULT_UPDATE_URL.to_string(),
        }
    }
}

impl GeolensConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<GeolensConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.geolens/geolens.toml as the configuration file path
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let geolens_dir = format!("{}/.geolens", home_dir.as_str());

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(geolens_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create geolens directory: {}", e))?;
                let p = format!("{}/geolens.toml", geolens_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // E.g., `GEOLENS_LICENSE_KEY=... geolens lookup 1.1.1.1`
        builder = builder.add_source(config::Environment::with_prefix("GEOLENS"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        let parsed = Self::from_map(&config, &geolens_dir)?;
        std::fs::create_dir_all(parsed.data_dir.as_str())
            .map_err(|e| anyhow!("Unable to create data directory: {}", e))?;
        Ok(parsed)
    }

    /// Build from flattened key/value settings
    fn from_map(config: &HashMap<String, String>, default_data_dir: &str) -> Result<Self> {
        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p),
            None => default_data_dir.to_string(),
        };

        let editions = match config.get("editions") {
            Some(list) => parse_editions(list),
            None => vec![DEFAULT_EDITION.to_string()],
        };
        if editions.is_empty() {
            return Err(anyhow!("editions must name at least one edition"));
        }

        let update_frequency_secs = match config.get("update_frequency_secs") {
            Some(s) => s
                .trim()
                .parse()
                .map_err(|_| anyhow!("Invalid update_frequency_secs: {}", s))?,
            None => 0,
        };

        let account_id = match config.get("account_id").map(|s| s.trim()) {
            Some(s) if !s.is_empty() => match s.parse::<u32>() {
                Ok(id) if id > 0 => Some(id),
                _ => return Err(anyhow!("Invalid account_id: {}", s)),
            },
            _ => None,
        };

        let license_key = config
            .get("license_key")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let update_url = config
            .get("update_url")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_UPDATE_URL.to_string());

        Ok(GeolensConfig {
            data_dir,
            editions,
            update_frequency_secs,
            account_id,
            license_key,
            update_url,
        })
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn update_frequency(&self) -> Duration {
        Duration::from_secs(self.update_frequency_secs)
    }

    /// Whether both credentials are present
    pub fn has_credentials(&self) -> bool {
        self.account_id.is_some() && self.license_key.is_some()
    }

    /// Update service settings, if credentials are configured
    #[cfg(feature = "update")]
    pub fn update_config(&self) -> Option<UpdateConfig> {
        match (self.account_id, &self.license_key) {
            (Some(account_id), Some(license_key)) => Some(
                UpdateConfig::new(account_id, license_key.as_str())
                    .with_url(self.update_url.as_str()),
            ),
            _ => None,
        }
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let credentials = match (self.account_id, &self.license_key) {
            (Some(id), Some(_)) => format!("account {} (license key set)", id),
            (Some(id), None) => format!("account {} (license key missing)", id),
            (None, Some(_)) => "license key set (account id missing)".to_string(),
            (None, None) => "not configured".to_string(),
        };
        let frequency = match self.update_frequency_secs {
            0 => "disabled (fetch missing datasets at startup)".to_string(),
            secs => format!("every {} seconds", secs),
        };

        [
            format!("Data Directory:     {}", self.data_dir),
            format!("Editions:           {}", self.editions.join(", ")),
            format!("Update Frequency:   {}", frequency),
            format!("Update URL:         {}", self.update_url),
            format!("Credentials:        {}", credentials),
        ]
        .join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.geolens/geolens.toml", home_dir)
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().to_string(),
        _ => path.to_string(),
    }
}

/// Split a comma separated edition list, dropping blanks and duplicates
pub fn parse_editions(list: &str) -> Vec<String> {
    let mut editions: Vec<String> = Vec::new();
    for edition in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !editions.iter().any(|e| e == edition) {
            editions.push(edition.to_string());
        }
    }
    editions
}

// =============================================================================
// Dataset file info (used by the config command)
// =============================================================================

/// Information about one edition's snapshot on disk
#[derive(Debug, Serialize, Clone)]
pub struct DatasetInfo {
    pub edition: String,
    pub path: String,
    pub status: DatasetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

/// Status of a snapshot file
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatasetStatus {
    /// Snapshot present
    Ready,
    /// No snapshot; will be fetched on open if credentials are set
    Missing,
}

impl std::fmt::Display for DatasetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetStatus::Ready => write!(f, "ready"),
            DatasetStatus::Missing => write!(f, "missing"),
        }
    }
}

/// Describe the snapshot file of every configured edition
pub fn get_dataset_info(config: &GeolensConfig) -> Vec<DatasetInfo> {
    use crate::database::{snapshot_path, MmdbDecoder};

    let data_dir = config.data_path();
    config
        .editions
        .iter()
        .map(|edition| {
            let path = snapshot_path::<MmdbDecoder>(&data_dir, edition);
            let meta = std::fs::metadata(&path).ok();
            DatasetInfo {
                edition: edition.clone(),
                path: path.to_string_lossy().to_string(),
                status: match meta {
                    Some(_) => DatasetStatus::Ready,
                    None => DatasetStatus::Missing,
                },
                size_bytes: meta.as_ref().map(|m| m.len()),
                last_modified: meta
                    .and_then(|m| m.modified().ok())
                    .map(DateTime::<Utc>::from),
            }
        })
        .collect()
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
