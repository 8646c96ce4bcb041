//! Test doubles for the decoder and fetcher seams
//!
//! `JsonDecoder` reads a small JSON document of `{network, record}` pairs so
//! tests can build datasets by hand, and counts live instances per directory
//! so tests can assert that handles release their decoders.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::LazyLock;

use ipnet::IpNet;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::core::{Decoder, DecoderMetadata};
use crate::error::{DecodeError, FetchError};
use crate::fetch::{FetchOutcome, Fetcher};

static LIVE_DECODERS: LazyLock<Mutex<HashMap<PathBuf, usize>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Number of `JsonDecoder`s currently open on files inside `dir`
pub(crate) fn live_decoders(dir: &Path) -> usize {
    LIVE_DECODERS
        .lock()
        .get(dir)
        .copied()
        .unwrap_or_default()
}

#[derive(Deserialize)]
struct Dataset {
    version: u64,
    networks: Vec<Entry>,
    /// Makes `metadata` panic, standing in for a decoder bug
    #[serde(default)]
    poisoned: bool,
}

#[derive(Deserialize)]
struct Entry {
    network: IpNet,
    record: Value,
}

pub(crate) struct JsonDecoder {
    dir: PathBuf,
    dataset: Dataset,
}

impl JsonDecoder {
    pub(crate) fn version(&self) -> u64 {
        self.dataset.version
    }
}

impl Decoder for JsonDecoder {
    const EXTENSION: &'static str = "json";

    fn open(path: &Path) -> Result<Self, DecodeError> {
        let content = std::fs::read_to_string(path)?;
        let dataset: Dataset = serde_json::from_str(&content)
            .map_err(|e| DecodeError::InvalidDatabase(e.to_string()))?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        *LIVE_DECODERS.lock().entry(dir.clone()).or_default() += 1;
        Ok(Self { dir, dataset })
    }

    fn lookup_prefix<T: DeserializeOwned>(
        &self,
        ip: IpAddr,
    ) -> Result<Option<(T, u8)>, DecodeError> {
        let Some(entry) = self
            .dataset
            .networks
            .iter()
            .find(|entry| entry.network.contains(&ip))
        else {
            return Ok(None);
        };
        let record = serde_json::from_value(entry.record.clone()).map_err(|e| {
            DecodeError::Malformed {
                ip,
                reason: e.to_string(),
            }
        })?;
        Ok(Some((record, entry.network.prefix_len())))
    }

    fn metadata(&self) -> DecoderMetadata {
        assert!(!self.dataset.poisoned, "poisoned test dataset");
        DecoderMetadata {
            database_type: format!("test-v{}", self.dataset.version),
            ..Default::default()
        }
    }
}

impl Drop for JsonDecoder {
    fn drop(&mut self) {
        if let Some(count) = LIVE_DECODERS.lock().get_mut(&self.dir) {
            *count -= 1;
        }
    }
}

// =============================================================================
// Datasets
// =============================================================================

/// City dataset covering 8.8.8.0/24 whose fields all encode `version`
pub(crate) fn city_dataset(version: u64) -> Value {
    json!({
        "version": version,
        "networks": [{
            "network": "8.8.8.0/24",
            "record": {
                "city": {"geoname_id": version, "names": {"en": format!("City v{version}")}},
                "continent": {"code": "NA", "names": {"en": "North America"}},
                "country": {"iso_code": "US", "names": {"en": "United States"}},
                "location": {"latitude": version as f64, "longitude": -(version as f64), "time_zone": "America/Chicago"},
                "postal": {"code": format!("{version:05}")},
                "subdivisions": [{"iso_code": "CA", "names": {"en": format!("Region v{version}")}}]
            }
        }]
    })
}

/// Country dataset covering 1.1.1.0/24 and 8.8.8.0/24
pub(crate) fn country_dataset(version: u64) -> Value {
    json!({
        "version": version,
        "networks": [
            {
                "network": "1.1.1.0/24",
                "record": {
                    "continent": {"code": "OC", "names": {"en": "Oceania"}},
                    "country": {"iso_code": "AU", "geoname_id": 2077456, "names": {"en": "Australia"}}
                }
            },
            {
                "network": "8.8.8.0/24",
                "record": {
                    "continent": {"code": "NA", "names": {"en": "North America"}},
                    "country": {"iso_code": "US", "geoname_id": 6252001, "names": {"en": "United States"}}
                }
            }
        ]
    })
}

/// ASN dataset covering 8.8.8.0/24
pub(crate) fn asn_dataset(version: u64) -> Value {
    json!({
        "version": version,
        "networks": [{
            "network": "8.8.8.0/24",
            "record": {"autonomous_system_number": 15169, "autonomous_system_organization": "GOOGLE"}
        }]
    })
}

/// Write `dataset` as the live snapshot of `edition` in `dir`
pub(crate) fn write_dataset(dir: &Path, edition: &str, dataset: &Value) -> PathBuf {
    let path = dir.join(format!("{edition}.{}", JsonDecoder::EXTENSION));
    write_atomically(&path, dataset).unwrap();
    path
}

pub(crate) fn write_atomically(path: &Path, dataset: &Value) -> std::io::Result<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    std::fs::write(&temp, dataset.to_string())?;
    std::fs::rename(&temp, path)
}

// =============================================================================
// Fetchers
// =============================================================================

type FetchFn = dyn Fn(usize, &Path) -> Result<FetchOutcome, FetchError> + Send + Sync;

/// Fetcher driven by a closure receiving the call index and destination
pub(crate) struct FnFetcher {
    calls: AtomicUsize,
    f: Box<FetchFn>,
}

impl FnFetcher {
    pub(crate) fn new(
        f: impl Fn(usize, &Path) -> Result<FetchOutcome, FetchError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            f: Box::new(f),
        }
    }

    /// Fetcher that writes `dataset(first + n)` on its n-th call
    pub(crate) fn serving(dataset: fn(u64) -> Value, first: u64) -> Self {
        Self::new(move |call, destination| {
            write_atomically(destination, &dataset(first + call as u64))?;
            Ok(FetchOutcome::Updated)
        })
    }

    pub(crate) fn failing() -> Self {
        Self::new(|_, _| Err(FetchError::Http("connection refused".to_string())))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for FnFetcher {
    fn fetch(
        &self,
        _edition: &str,
        _current: Option<&Path>,
        destination: &Path,
    ) -> Result<FetchOutcome, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.f)(call, destination)
    }
}
