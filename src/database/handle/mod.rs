//! Self-updating database handle
//!
//! A [`DatabaseHandle`] owns the decoder for one edition and serves
//! concurrent lookups against it. When a fetcher and a non-zero refresh
//! interval are configured, a background task periodically fetches a new
//! snapshot and swaps it in.
//!
//! # Concurrency
//!
//! The current decoder lives in a `RwLock<Option<D>>`:
//! - a lookup holds the read lock for exactly one decoder call, so it always
//!   completes against the decoder it started with;
//! - the refresh task fetches and opens the new snapshot without any lock,
//!   then takes the write lock only to replace the decoder;
//! - the replaced decoder is dropped after the write lock is released.
//!
//! `None` in the slot means the handle is closed.
//!
//! # Lifecycle
//!
//! ```rust,ignore
//! use geolens::database::{DatabaseHandle, HandleOptions};
//!
//! let handle = DatabaseHandle::open(
//!     HandleOptions::new("GeoLite2-City", "/var/lib/geolens")
//!         .with_fetcher(fetcher)
//!         .with_refresh_interval(Duration::from_secs(86400)),
//! )
//! .await?;
//!
//! let city = handle.city("8.8.8.8".parse()?)?;
//!
//! // must be awaited once before shutdown
//! handle.close().await?;
//! ```

mod refresh;

pub use refresh::RefreshStatus;

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ipnet::IpNet;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::database::core::{Decoder, DecoderMetadata, MmdbDecoder};
use crate::error::{DecodeError, Error, Result};
use crate::fetch::Fetcher;
use crate::records::{AsnRecord, CityRecord, CountryRecord, GeoRecord};
use refresh::Refresher;

// =============================================================================
// Options
// =============================================================================

/// Construction parameters for a [`DatabaseHandle`]
#[derive(Clone)]
pub struct HandleOptions {
    /// Edition identifier, e.g. `GeoLite2-City`
    pub edition: String,
    /// Directory holding `<edition>.<ext>` snapshots
    pub data_dir: PathBuf,
    /// Remote source; `None` disables fetching entirely
    pub fetcher: Option<Arc<dyn Fetcher>>,
    /// Zero disables background refresh (fetch-once-at-startup only)
    pub refresh_interval: Duration,
}

impl HandleOptions {
    pub fn new(edition: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            edition: edition.into(),
            data_dir: data_dir.into(),
            fetcher: None,
            refresh_interval: Duration::ZERO,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_optional_fetcher(mut self, fetcher: Option<Arc<dyn Fetcher>>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}

impl std::fmt::Debug for HandleOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleOptions")
            .field("edition", &self.edition)
            .field("data_dir", &self.data_dir)
            .field("fetcher", &self.fetcher.is_some())
            .field("refresh_interval", &self.refresh_interval)
            .finish()
    }
}

/// Live snapshot path for `edition` in `data_dir`
pub fn snapshot_path<D: Decoder>(data_dir: &Path, edition: &str) -> PathBuf {
    data_dir.join(format!("{}.{}", edition, D::EXTENSION))
}

// =============================================================================
// Handle
// =============================================================================

/// State shared between the handle and its refresh task
pub(crate) struct Shared<D> {
    pub(crate) edition: String,
    pub(crate) path: PathBuf,
    pub(crate) decoder: RwLock<Option<D>>,
    pub(crate) status: Mutex<RefreshStatus>,
}

impl<D: Decoder> Shared<D> {
    /// Install `decoder` as current, returning the one it replaced
    pub(crate) fn swap(&self, decoder: D) -> Option<D> {
        self.decoder.write().replace(decoder)
    }
}

enum Task {
    /// No background refresh was started
    Idle,
    Running {
        cancel: CancellationToken,
        join: JoinHandle<Option<Error>>,
    },
    Closed,
}

/// Concurrently readable, self-updating handle on one dataset edition
pub struct DatabaseHandle<D: Decoder = MmdbDecoder> {
    shared: Arc<Shared<D>>,
    task: Mutex<Task>,
}

impl<D: Decoder> DatabaseHandle<D> {
    /// Open the snapshot for `options.edition`, fetching it first if missing.
    ///
    /// Starts the background refresh task when a fetcher is configured and the
    /// refresh interval is non-zero. Returns without waiting for any refresh.
    /// Must be called within a tokio runtime.
    pub async fn open(options: HandleOptions) -> Result<Self> {
        let HandleOptions {
            edition,
            data_dir,
            fetcher,
            refresh_interval,
        } = options;
        let path = snapshot_path::<D>(&data_dir, &edition);

        if !path.exists() {
            let Some(fetcher) = fetcher.clone() else {
                return Err(Error::MissingDataset { edition, path });
            };
            info!(edition = %edition, path = %path.display(), "no local dataset, fetching");
            let (e, p) = (edition.clone(), path.clone());
            tokio::task::spawn_blocking(move || fetcher.fetch(&e, None, &p))
                .await
                .map_err(|e| Error::TaskAborted {
                    edition: edition.clone(),
                    reason: e.to_string(),
                })?
                .map_err(|source| Error::InitialFetch {
                    edition: edition.clone(),
                    source,
                })?;
        }

        let decoder = open_decoder::<D>(path.clone())
            .await
            .map_err(|source| Error::Open {
                path: path.clone(),
                source,
            })?;
        info!(
            edition = %edition,
            path = %path.display(),
            database_type = %decoder.metadata().database_type,
            "opened dataset"
        );

        let shared = Arc::new(Shared {
            edition,
            path,
            decoder: RwLock::new(Some(decoder)),
            status: Mutex::new(RefreshStatus::default()),
        });

        let task = match fetcher {
            Some(fetcher) if !refresh_interval.is_zero() => {
                let cancel = CancellationToken::new();
                let refresher = Refresher::new(shared.clone(), fetcher, refresh_interval);
                let join = tokio::spawn(refresher.run(cancel.clone()));
                shared.status.lock().refreshing = true;
                Task::Running { cancel, join }
            }
            _ => {
                debug!(edition = %shared.edition, "background refresh disabled");
                Task::Idle
            }
        };

        Ok(Self {
            shared,
            task: Mutex::new(task),
        })
    }

    pub fn edition(&self) -> &str {
        &self.shared.edition
    }

    /// Path of the live snapshot file
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Whether a background refresh task is running
    pub fn is_refreshing(&self) -> bool {
        matches!(&*self.task.lock(), Task::Running { join, .. } if !join.is_finished())
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.task.lock(), Task::Closed)
    }

    /// Snapshot of the refresh bookkeeping
    pub fn status(&self) -> RefreshStatus {
        let mut status = self.shared.status.lock().clone();
        status.refreshing &= self.is_refreshing();
        status
    }

    /// Metadata of the current snapshot
    pub fn metadata(&self) -> Result<DecoderMetadata> {
        self.with_decoder(|decoder| Ok(decoder.metadata()))
    }

    /// Look up `ip` in the current snapshot.
    ///
    /// `Ok(None)` means the dataset has no entry for `ip`. Decoder errors are
    /// returned unchanged inside [`Error::Lookup`].
    pub fn lookup<T: DeserializeOwned>(&self, ip: IpAddr) -> Result<Option<T>> {
        self.with_decoder(|decoder| {
            decoder.lookup(ip).map_err(|source| Error::Lookup {
                edition: self.shared.edition.clone(),
                source,
            })
        })
    }

    /// Look up `ip` together with the network it was found in
    pub fn lookup_network<T: DeserializeOwned>(&self, ip: IpAddr) -> Result<Option<(T, IpNet)>> {
        let found = self.with_decoder(|decoder| {
            decoder.lookup_prefix(ip).map_err(|source| Error::Lookup {
                edition: self.shared.edition.clone(),
                source,
            })
        })?;
        Ok(found.map(|(record, prefix_len)| {
            let network = IpNet::new(ip, prefix_len)
                .map(|net| net.trunc())
                .unwrap_or_else(|_| IpNet::from(ip));
            (record, network)
        }))
    }

    /// Typed lookup with the covering network attached to the record
    pub fn lookup_record<R: GeoRecord>(&self, ip: IpAddr) -> Result<Option<R>> {
        Ok(self
            .lookup_network::<R>(ip)?
            .map(|(mut record, network)| {
                record.attach_network(network);
                record
            }))
    }

    pub fn city(&self, ip: IpAddr) -> Result<Option<CityRecord>> {
        self.lookup_record(ip)
    }

    pub fn country(&self, ip: IpAddr) -> Result<Option<CountryRecord>> {
        self.lookup_record(ip)
    }

    pub fn asn(&self, ip: IpAddr) -> Result<Option<AsnRecord>> {
        self.lookup_record(ip)
    }

    /// Run `f` against the current decoder under the read lock
    fn with_decoder<T>(&self, f: impl FnOnce(&D) -> Result<T>) -> Result<T> {
        let slot = self.shared.decoder.read();
        match slot.as_ref() {
            Some(decoder) => f(decoder),
            None => Err(Error::Closed {
                edition: self.shared.edition.clone(),
            }),
        }
    }

    /// Stop the refresh task, wait for it to exit, then release the decoder.
    ///
    /// Returns [`Error::Close`] if the last refresh attempt before shutdown
    /// failed, [`Error::TaskAborted`] if the task panicked, and
    /// [`Error::AlreadyClosed`] on a second call. The decoder is released in
    /// every case except `AlreadyClosed`.
    pub async fn close(&self) -> Result<()> {
        let task = std::mem::replace(&mut *self.task.lock(), Task::Closed);
        let edition = self.shared.edition.clone();

        let result = match task {
            Task::Closed => return Err(Error::AlreadyClosed { edition }),
            Task::Idle => Ok(()),
            Task::Running { cancel, join } => {
                cancel.cancel();
                match join.await {
                    Ok(None) => Ok(()),
                    Ok(Some(err)) => Err(Error::Close {
                        edition: edition.clone(),
                        source: Box::new(err),
                    }),
                    Err(e) => Err(Error::TaskAborted {
                        edition: edition.clone(),
                        reason: e.to_string(),
                    }),
                }
            }
        };

        let released = self.shared.decoder.write().take();
        drop(released);
        self.shared.status.lock().refreshing = false;
        info!(edition = %edition, "closed dataset");

        result
    }
}

impl<D: Decoder> Drop for DatabaseHandle<D> {
    fn drop(&mut self) {
        if let Task::Running { cancel, .. } = self.task.get_mut() {
            debug!(edition = %self.shared.edition, "handle dropped without close");
            cancel.cancel();
        }
    }
}

impl<D: Decoder> std::fmt::Debug for DatabaseHandle<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("edition", &self.shared.edition)
            .field("path", &self.shared.path)
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}

/// Open a decoder on a blocking thread
pub(crate) async fn open_decoder<D: Decoder>(path: PathBuf) -> std::result::Result<D, DecodeError> {
    tokio::task::spawn_blocking(move || D::open(&path))
        .await
        .map_err(|e| DecodeError::Io(std::io::Error::other(e.to_string())))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::{
        city_dataset, live_decoders, write_atomically, write_dataset, FnFetcher, JsonDecoder,
    };
    use crate::fetch::FetchOutcome;
    use std::sync::mpsc;

    const EDITION: &str = "GeoLite2-City";

    fn ip() -> IpAddr {
        "8.8.8.8".parse().unwrap()
    }

    /// Version encoded in a city record built by `city_dataset`
    fn version_of(record: &CityRecord) -> u64 {
        let version = record.city.geoname_id.unwrap() as u64;
        assert_eq!(record.postal.code.as_deref(), Some(format!("{version:05}").as_str()));
        assert_eq!(record.location.latitude, Some(version as f64));
        assert_eq!(
            record.subdivisions[0].name(),
            Some(format!("Region v{version}").as_str())
        );
        version
    }

    async fn wait_for(what: &str, condition: impl Fn() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_open_local_dataset_without_refresh() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_dataset(temp_dir.path(), EDITION, &city_dataset(1));

        let handle = DatabaseHandle::<JsonDecoder>::open(HandleOptions::new(EDITION, temp_dir.path()))
            .await
            .unwrap();
        assert!(!handle.is_refreshing());
        assert!(!handle.status().refreshing);
        assert_eq!(handle.metadata().unwrap().database_type, "test-v1");

        let record = handle.city(ip()).unwrap().unwrap();
        assert_eq!(version_of(&record), 1);
        assert_eq!(record.traits.network.as_deref(), Some("8.8.8.0/24"));
        assert!(handle.city("9.9.9.9".parse().unwrap()).unwrap().is_none());

        handle.close().await.unwrap();
        assert_eq!(live_decoders(temp_dir.path()), 0);
    }

    #[tokio::test]
    async fn test_fetcher_without_interval_does_not_refresh() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_dataset(temp_dir.path(), EDITION, &city_dataset(1));
        let fetcher = Arc::new(FnFetcher::serving(city_dataset, 2));

        let handle = DatabaseHandle::<JsonDecoder>::open(
            HandleOptions::new(EDITION, temp_dir.path()).with_fetcher(fetcher.clone()),
        )
        .await
        .unwrap();
        assert!(!handle.is_refreshing());
        assert_eq!(fetcher.calls(), 0);

        handle.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_missing_dataset_without_fetcher() {
        let temp_dir = tempfile::tempdir().unwrap();

        let err = DatabaseHandle::<JsonDecoder>::open(HandleOptions::new(EDITION, temp_dir.path()))
            .await
            .unwrap_err();
        match err {
            Error::MissingDataset { edition, path } => {
                assert_eq!(edition, EDITION);
                assert_eq!(path, temp_dir.path().join("GeoLite2-City.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_open_fetches_missing_dataset() {
        let temp_dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FnFetcher::serving(city_dataset, 1));

        let handle = DatabaseHandle::<JsonDecoder>::open(
            HandleOptions::new(EDITION, temp_dir.path()).with_fetcher(fetcher.clone()),
        )
        .await
        .unwrap();
        assert_eq!(fetcher.calls(), 1);
        assert!(handle.path().exists());
        assert_eq!(version_of(&handle.city(ip()).unwrap().unwrap()), 1);

        handle.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_initial_fetch_failure() {
        let temp_dir = tempfile::tempdir().unwrap();

        let err = DatabaseHandle::<JsonDecoder>::open(
            HandleOptions::new(EDITION, temp_dir.path())
                .with_fetcher(Arc::new(FnFetcher::failing()))
                .with_refresh_interval(Duration::from_secs(60)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InitialFetch { .. }));
        assert_eq!(live_decoders(temp_dir.path()), 0);
    }

    #[tokio::test]
    async fn test_open_corrupt_dataset() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("GeoLite2-City.json"), "not json").unwrap();

        let err = DatabaseHandle::<JsonDecoder>::open(HandleOptions::new(EDITION, temp_dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Open {
                source: DecodeError::InvalidDatabase(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_refresh_installs_new_snapshot() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_dataset(temp_dir.path(), EDITION, &city_dataset(1));
        let fetcher = Arc::new(FnFetcher::serving(city_dataset, 2));

        let handle = DatabaseHandle::<JsonDecoder>::open(
            HandleOptions::new(EDITION, temp_dir.path())
                .with_fetcher(fetcher.clone())
                .with_refresh_interval(Duration::from_millis(20)),
        )
        .await
        .unwrap();
        assert!(handle.is_refreshing());

        wait_for("first refresh", || handle.status().generation >= 1).await;
        assert!(version_of(&handle.city(ip()).unwrap().unwrap()) >= 2);

        handle.close().await.unwrap();
        assert!(!handle.status().refreshing);
        assert_eq!(live_decoders(temp_dir.path()), 0);
        // staging file was renamed onto the live path
        assert!(!temp_dir.path().join("GeoLite2-City.json.staging").exists());
        let on_disk = JsonDecoder::open(handle.path()).unwrap();
        assert!(on_disk.version() >= 2);
    }

    #[tokio::test]
    async fn test_panicked_refresh_task_is_not_refreshing() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_dataset(temp_dir.path(), EDITION, &city_dataset(1));
        let fetcher = Arc::new(FnFetcher::new(|_, destination| {
            let mut dataset = city_dataset(2);
            dataset["poisoned"] = serde_json::Value::Bool(true);
            write_atomically(destination, &dataset)?;
            Ok(FetchOutcome::Updated)
        }));

        let handle = DatabaseHandle::<JsonDecoder>::open(
            HandleOptions::new(EDITION, temp_dir.path())
                .with_fetcher(fetcher)
                .with_refresh_interval(Duration::from_millis(20)),
        )
        .await
        .unwrap();
        assert!(handle.is_refreshing());

        wait_for("refresh task to die", || !handle.is_refreshing()).await;
        assert!(!handle.status().refreshing);
        assert!(!handle.is_closed());
        assert_eq!(version_of(&handle.city(ip()).unwrap().unwrap()), 1);

        let err = handle.close().await.unwrap_err();
        assert!(matches!(err, Error::TaskAborted { .. }));
        assert_eq!(live_decoders(temp_dir.path()), 0);
    }

    #[tokio::test]
    async fn test_refresh_leaves_locked_live_file_alone() {
        use crate::fetch::{lock_path, LockFile};

        let temp_dir = tempfile::tempdir().unwrap();
        let live = write_dataset(temp_dir.path(), EDITION, &city_dataset(1));
        let lock = LockFile::acquire(&lock_path(&live)).unwrap();
        let fetcher = Arc::new(FnFetcher::serving(city_dataset, 2));

        let handle = DatabaseHandle::<JsonDecoder>::open(
            HandleOptions::new(EDITION, temp_dir.path())
                .with_fetcher(fetcher)
                .with_refresh_interval(Duration::from_millis(20)),
        )
        .await
        .unwrap();

        wait_for("first refresh", || handle.status().generation >= 1).await;
        assert!(version_of(&handle.city(ip()).unwrap().unwrap()) >= 2);
        assert_eq!(JsonDecoder::open(&live).unwrap().version(), 1);

        drop(lock);
        let seen = handle.status().generation;
        wait_for("refresh after unlock", || handle.status().generation > seen + 1).await;
        handle.close().await.unwrap();

        assert!(JsonDecoder::open(&live).unwrap().version() >= 2);
        assert!(!temp_dir.path().join("GeoLite2-City.json.staging").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lookups_see_whole_snapshots() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_dataset(temp_dir.path(), EDITION, &city_dataset(1));
        let fetcher = Arc::new(FnFetcher::serving(city_dataset, 2));

        let handle = Arc::new(
            DatabaseHandle::<JsonDecoder>::open(
                HandleOptions::new(EDITION, temp_dir.path())
                    .with_fetcher(fetcher)
                    .with_refresh_interval(Duration::from_millis(5)),
            )
            .await
            .unwrap(),
        );

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                tokio::spawn(async move {
                    let mut last = 0;
                    for _ in 0..500 {
                        let record = handle.city(ip()).unwrap().unwrap();
                        let version = version_of(&record);
                        assert!(version >= last, "snapshot went backwards");
                        last = version;
                        tokio::task::yield_now().await;
                    }
                    last
                })
            })
            .collect();
        for reader in readers {
            assert!(reader.await.unwrap() >= 1);
        }

        wait_for("a refresh", || handle.status().generation >= 1).await;
        handle.close().await.unwrap();
        assert_eq!(live_decoders(temp_dir.path()), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lookup_not_blocked_by_slow_fetch() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_dataset(temp_dir.path(), EDITION, &city_dataset(1));

        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let started_tx = parking_lot::Mutex::new(started_tx);
        let release_rx = parking_lot::Mutex::new(release_rx);
        let fetcher = Arc::new(FnFetcher::new(move |call, destination| {
            if call == 0 {
                let _ = started_tx.lock().send(());
                let _ = release_rx.lock().recv();
            }
            crate::database::testing::write_atomically(destination, &city_dataset(2 + call as u64))?;
            Ok(FetchOutcome::Updated)
        }));

        let handle = DatabaseHandle::<JsonDecoder>::open(
            HandleOptions::new(EDITION, temp_dir.path())
                .with_fetcher(fetcher)
                .with_refresh_interval(Duration::from_millis(10)),
        )
        .await
        .unwrap();

        tokio::task::spawn_blocking(move || started_rx.recv().unwrap())
            .await
            .unwrap();
        // the fetch is parked; lookups keep answering from the old snapshot
        for _ in 0..10 {
            assert_eq!(version_of(&handle.city(ip()).unwrap().unwrap()), 1);
        }
        assert_eq!(handle.status().generation, 0);

        release_tx.send(()).unwrap();
        wait_for("swap after release", || handle.status().generation >= 1).await;
        assert!(version_of(&handle.city(ip()).unwrap().unwrap()) >= 2);

        handle.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_snapshot_and_reports_on_close() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_dataset(temp_dir.path(), EDITION, &city_dataset(1));

        let handle = DatabaseHandle::<JsonDecoder>::open(
            HandleOptions::new(EDITION, temp_dir.path())
                .with_fetcher(Arc::new(FnFetcher::failing()))
                .with_refresh_interval(Duration::from_millis(10)),
        )
        .await
        .unwrap();

        wait_for("two failed refreshes", || handle.status().failures >= 2).await;
        assert_eq!(version_of(&handle.city(ip()).unwrap().unwrap()), 1);
        let status = handle.status();
        assert_eq!(status.generation, 0);
        assert!(status.last_error.unwrap().contains("connection refused"));

        let err = handle.close().await.unwrap_err();
        match err {
            Error::Close { edition, source } => {
                assert_eq!(edition, EDITION);
                assert!(matches!(*source, Error::RefreshFetch { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(live_decoders(temp_dir.path()), 0);
    }

    #[tokio::test]
    async fn test_bad_snapshot_is_discarded() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_dataset(temp_dir.path(), EDITION, &city_dataset(1));
        let fetcher = Arc::new(FnFetcher::new(|_, destination| {
            std::fs::write(destination, "truncated")?;
            Ok(FetchOutcome::Updated)
        }));

        let handle = DatabaseHandle::<JsonDecoder>::open(
            HandleOptions::new(EDITION, temp_dir.path())
                .with_fetcher(fetcher)
                .with_refresh_interval(Duration::from_millis(10)),
        )
        .await
        .unwrap();

        wait_for("a failed refresh", || handle.status().failures >= 1).await;
        assert_eq!(version_of(&handle.city(ip()).unwrap().unwrap()), 1);

        let err = handle.close().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Close { ref source, .. } if matches!(**source, Error::RefreshOpen { .. })
        ));
        assert!(!temp_dir.path().join("GeoLite2-City.json.staging").exists());
        assert_eq!(JsonDecoder::open(handle.path()).unwrap().version(), 1);
    }

    #[tokio::test]
    async fn test_later_success_clears_refresh_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_dataset(temp_dir.path(), EDITION, &city_dataset(1));
        let fetcher = Arc::new(FnFetcher::new(|call, destination| {
            if call == 0 {
                return Err(crate::error::FetchError::Http("timeout".to_string()));
            }
            crate::database::testing::write_atomically(destination, &city_dataset(1 + call as u64))?;
            Ok(FetchOutcome::Updated)
        }));

        let handle = DatabaseHandle::<JsonDecoder>::open(
            HandleOptions::new(EDITION, temp_dir.path())
                .with_fetcher(fetcher)
                .with_refresh_interval(Duration::from_millis(10)),
        )
        .await
        .unwrap();

        wait_for("recovery", || handle.status().generation >= 1).await;
        let status = handle.status();
        assert_eq!(status.failures, 1);
        assert!(status.last_error.is_none());

        handle.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unchanged_fetch_keeps_decoder() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_dataset(temp_dir.path(), EDITION, &city_dataset(1));
        let fetcher = Arc::new(FnFetcher::new(|_, _| Ok(FetchOutcome::Unchanged)));

        let handle = DatabaseHandle::<JsonDecoder>::open(
            HandleOptions::new(EDITION, temp_dir.path())
                .with_fetcher(fetcher)
                .with_refresh_interval(Duration::from_millis(10)),
        )
        .await
        .unwrap();

        wait_for("two attempts", || handle.status().attempts >= 2).await;
        let status = handle.status();
        assert_eq!(status.generation, 0);
        assert!(status.last_success.is_some());
        assert_eq!(live_decoders(temp_dir.path()), 1);

        handle.close().await.unwrap();
        assert_eq!(live_decoders(temp_dir.path()), 0);
    }

    #[tokio::test]
    async fn test_lookup_after_close() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_dataset(temp_dir.path(), EDITION, &city_dataset(1));

        let handle = DatabaseHandle::<JsonDecoder>::open(HandleOptions::new(EDITION, temp_dir.path()))
            .await
            .unwrap();
        handle.close().await.unwrap();
        assert!(handle.is_closed());

        let err = handle.city(ip()).unwrap_err();
        assert!(matches!(err, Error::Closed { .. }));
        assert!(err.is_closed());
        assert!(matches!(handle.metadata(), Err(Error::Closed { .. })));

        let err = handle.close().await.unwrap_err();
        assert!(matches!(err, Error::AlreadyClosed { .. }));
    }
}
