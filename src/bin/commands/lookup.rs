use std::time::Duration;

use anyhow::Result;
use clap::Args;
use geolens::database::DatabaseSet;
use geolens::lens::geo::GeoLens;
use geolens::GeolensConfig;
use tabled::settings::Style;
use tabled::Table;

use super::{configured_fetcher, print_json};

/// Arguments for the Lookup command
#[derive(Args)]
pub struct LookupArgs {
    /// IP addresses to look up; a port or IPv6 zone suffix is ignored
    #[clap(required = true)]
    pub ips: Vec<String>,

    /// Output as JSON
    #[clap(long)]
    pub json: bool,

    /// Output the flat geoip2.* field table (implies JSON)
    #[clap(long)]
    pub fields: bool,

    /// Editions to query instead of the configured ones
    #[clap(short, long)]
    pub edition: Vec<String>,
}

pub async fn run(config: &GeolensConfig, args: LookupArgs) -> Result<()> {
    let LookupArgs {
        ips,
        json,
        fields,
        edition,
    } = args;
    let editions = if edition.is_empty() {
        config.editions.clone()
    } else {
        edition
    };

    // fetches missing editions once; no background refresh for a one-shot command
    let set = DatabaseSet::open(
        &editions,
        &config.data_path(),
        configured_fetcher(config),
        Duration::ZERO,
    )
    .await?;

    let output = print_results(&set, &ips, json, fields);
    let closed = set.close().await;
    output?;
    closed?;
    Ok(())
}

fn print_results(set: &DatabaseSet, ips: &[String], json: bool, fields: bool) -> Result<()> {
    let lens = GeoLens::new(set);
    let results = lens.lookup_all(ips)?;

    if fields {
        let tables: Vec<_> = results.iter().map(|r| r.fields()).collect();
        return print_json(&tables, true);
    }
    if json {
        return print_json(&results, true);
    }

    let rows: Vec<_> = results.iter().map(|r| r.summary()).collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}
