//! Background refresh task

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{open_decoder, Shared};
use crate::database::core::Decoder;
use crate::error::{Error, Result};
use crate::fetch::{lock_path, FetchOutcome, Fetcher, LockFile};

/// Refresh bookkeeping for one handle
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RefreshStatus {
    /// Whether a background refresh task is running
    pub refreshing: bool,
    /// Number of snapshots installed since open; 0 is the snapshot opened at construction
    pub generation: u64,
    pub attempts: u64,
    pub failures: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    /// Error of the most recent attempt, cleared by the next success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Staging path next to the live snapshot
fn staging_path(live: &std::path::Path) -> PathBuf {
    let mut name = live.as_os_str().to_owned();
    name.push(".staging");
    PathBuf::from(name)
}

pub(crate) struct Refresher<D> {
    shared: Arc<Shared<D>>,
    fetcher: Arc<dyn Fetcher>,
    staging: PathBuf,
    interval: Duration,
}

impl<D: Decoder> Refresher<D> {
    pub(crate) fn new(shared: Arc<Shared<D>>, fetcher: Arc<dyn Fetcher>, interval: Duration) -> Self {
        let staging = staging_path(&shared.path);
        Self {
            shared,
            fetcher,
            staging,
            interval,
        }
    }

    /// Refresh every interval until cancelled.
    ///
    /// Returns the error of the last attempt if it failed. Cancellation is
    /// only observed between attempts.
    pub(crate) async fn run(self, cancel: CancellationToken) -> Option<Error> {
        let edition = self.shared.edition.clone();
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(edition = %edition, "next update in {:?}", self.interval);

        let mut last_error = None;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    debug!(edition = %edition, "updating database");
                    last_error = match self.refresh_once().await {
                        Ok(_) => None,
                        Err(e) => {
                            // best effort: keep serving the current snapshot
                            warn!(edition = %edition, error = %e, "failed to update database");
                            Some(e)
                        }
                    };
                }
            }
        }

        debug!(edition = %edition, "refresh task stopped");
        last_error
    }

    /// One fetch-open-swap cycle
    async fn refresh_once(&self) -> Result<FetchOutcome> {
        let started = Utc::now();
        self.shared.status.lock().last_attempt = Some(started);

        let result = self.fetch_and_swap().await;

        let mut status = self.shared.status.lock();
        status.attempts += 1;
        match &result {
            Ok(outcome) => {
                if *outcome == FetchOutcome::Updated {
                    status.generation += 1;
                }
                status.last_success = Some(started);
                status.last_error = None;
            }
            Err(e) => {
                status.failures += 1;
                status.last_error = Some(e.to_string());
            }
        }
        result
    }

    async fn fetch_and_swap(&self) -> Result<FetchOutcome> {
        let edition = self.shared.edition.clone();

        let fetcher = self.fetcher.clone();
        let (e, live, staging) = (
            edition.clone(),
            self.shared.path.clone(),
            self.staging.clone(),
        );
        let outcome = tokio::task::spawn_blocking(move || fetcher.fetch(&e, Some(&live), &staging))
            .await
            .map_err(|e| Error::TaskAborted {
                edition: edition.clone(),
                reason: e.to_string(),
            })?;
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(source) => {
                self.discard_staging();
                return Err(Error::RefreshFetch { edition, source });
            }
        };
        if outcome == FetchOutcome::Unchanged {
            debug!(edition = %edition, "dataset unchanged");
            return Ok(outcome);
        }

        let decoder = match open_decoder::<D>(self.staging.clone()).await {
            Ok(decoder) => decoder,
            Err(source) => {
                self.discard_staging();
                return Err(Error::RefreshOpen { edition, source });
            }
        };
        let database_type = decoder.metadata().database_type;

        let previous = self.shared.swap(decoder);

        self.persist_staging();
        drop(previous);

        info!(edition = %edition, database_type = %database_type, "installed new snapshot");
        Ok(outcome)
    }

    /// Rename staging onto the live path under the live file's lock. While
    /// another writer holds it the staging file is dropped and that writer's
    /// copy stands.
    fn persist_staging(&self) {
        let live = &self.shared.path;
        let result = LockFile::acquire(&lock_path(live)).and_then(|_lock| {
            std::fs::rename(&self.staging, live)?;
            Ok(())
        });
        if let Err(e) = result {
            warn!(
                edition = %self.shared.edition,
                error = %e,
                "new snapshot is live but could not replace {}",
                live.display()
            );
            self.discard_staging();
        }
    }

    fn discard_staging(&self) {
        if self.staging.exists() {
            let _ = std::fs::remove_file(&self.staging);
        }
    }
}
