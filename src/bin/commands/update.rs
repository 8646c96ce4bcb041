use anyhow::{anyhow, Result};
use clap::Args;
use geolens::database::{snapshot_path, MmdbDecoder};
use geolens::fetch::{FetchOutcome, Fetcher};
use geolens::GeolensConfig;
use tracing::info;

use super::configured_fetcher;

/// Arguments for the Update command
#[derive(Args)]
pub struct UpdateArgs {
    /// Editions to update instead of the configured ones
    #[clap(short, long)]
    pub edition: Vec<String>,
}

pub async fn run(config: &GeolensConfig, args: UpdateArgs) -> Result<()> {
    let fetcher = configured_fetcher(config).ok_or_else(|| {
        anyhow!(
            "account_id and license_key must be set in {} or the environment",
            GeolensConfig::config_file_path()
        )
    })?;
    let editions = if args.edition.is_empty() {
        config.editions.clone()
    } else {
        args.edition
    };

    let data_dir = config.data_path();
    let mut failed = 0;
    for edition in editions {
        let path = snapshot_path::<MmdbDecoder>(&data_dir, &edition);
        info!(edition = %edition, path = %path.display(), "updating");

        let fetcher = fetcher.clone();
        let (e, p) = (edition.clone(), path.clone());
        let result =
            tokio::task::spawn_blocking(move || fetcher.fetch(&e, Some(&p), &p)).await?;

        match result {
            Ok(FetchOutcome::Updated) => println!("{}: updated ({})", edition, path.display()),
            Ok(FetchOutcome::Unchanged) => println!("{}: up to date", edition),
            Err(e) => {
                eprintln!("{}: update failed: {}", edition, e);
                failed += 1;
            }
        }
    }

    match failed {
        0 => Ok(()),
        n => Err(anyhow!("{} edition(s) failed to update", n)),
    }
}
