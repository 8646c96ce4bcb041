pub mod config;
pub mod lookup;
pub mod update;

use std::sync::Arc;

use geolens::fetch::{Fetcher, MaxMindFetcher};
use geolens::GeolensConfig;

/// MaxMind fetcher built from the configured credentials, if any
pub(crate) fn configured_fetcher(config: &GeolensConfig) -> Option<Arc<dyn Fetcher>> {
    config
        .update_config()
        .map(|update| Arc::new(MaxMindFetcher::new(update)) as Arc<dyn Fetcher>)
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}
