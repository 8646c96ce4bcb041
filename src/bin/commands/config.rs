use anyhow::Result;
use clap::Args;
use geolens::config::{format_size, get_dataset_info, DatasetInfo};
use geolens::GeolensConfig;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::print_json;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Output as JSON
    #[clap(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    data_dir: String,
    editions: Vec<String>,
    update_frequency_secs: u64,
    update_url: String,
    credentials_configured: bool,
    datasets: Vec<DatasetInfo>,
}

#[derive(Tabled)]
struct DatasetRow {
    edition: String,
    status: String,
    size: String,
    modified: String,
}

impl From<&DatasetInfo> for DatasetRow {
    fn from(info: &DatasetInfo) -> Self {
        DatasetRow {
            edition: info.edition.clone(),
            status: info.status.to_string(),
            size: info.size_bytes.map(format_size).unwrap_or_default(),
            modified: info
                .last_modified
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_default(),
        }
    }
}

pub fn run(config: &GeolensConfig, args: ConfigArgs) -> Result<()> {
    let datasets = get_dataset_info(config);

    if args.json {
        let info = ConfigInfo {
            config_file: GeolensConfig::config_file_path(),
            data_dir: config.data_dir.clone(),
            editions: config.editions.clone(),
            update_frequency_secs: config.update_frequency_secs,
            update_url: config.update_url.clone(),
            credentials_configured: config.has_credentials(),
            datasets,
        };
        return print_json(&info, true);
    }

    println!("Config File:        {}", GeolensConfig::config_file_path());
    println!("{}", config.summary());
    println!();
    let rows: Vec<DatasetRow> = datasets.iter().map(DatasetRow::from).collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}
