//! Dataset decoders
//!
//! A [`Decoder`] owns one opened snapshot file and answers point lookups
//! against it. The handle never looks inside the file itself; any
//! key/value structure that can be opened from a path and queried by IP
//! address can be plugged in.

use std::net::IpAddr;
use std::path::Path;

use chrono::{DateTime, Utc};
use maxminddb::Reader;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::DecodeError;

/// Descriptive information about an opened snapshot
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DecoderMetadata {
    /// Dataset type as recorded in the file, e.g. `GeoLite2-City`
    pub database_type: String,
    /// When the snapshot was built
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_time: Option<DateTime<Utc>>,
    pub ip_version: u16,
    pub node_count: u32,
    pub languages: Vec<String>,
}

/// Point-lookup access to one immutable snapshot file
pub trait Decoder: Send + Sync + Sized + 'static {
    /// File extension of snapshots, without the dot
    const EXTENSION: &'static str = "mmdb";

    /// Open the snapshot at `path`
    fn open(path: &Path) -> Result<Self, DecodeError>;

    /// Look up `ip`, returning the decoded record and the prefix length of the
    /// network it was found in. `Ok(None)` means the IP is not in the dataset.
    fn lookup_prefix<T: DeserializeOwned>(
        &self,
        ip: IpAddr,
    ) -> Result<Option<(T, u8)>, DecodeError>;

    /// Look up `ip`, discarding the network information
    fn lookup<T: DeserializeOwned>(&self, ip: IpAddr) -> Result<Option<T>, DecodeError> {
        Ok(self.lookup_prefix(ip)?.map(|(record, _)| record))
    }

    fn metadata(&self) -> DecoderMetadata;
}

// =============================================================================
// MaxMind DB
// =============================================================================

/// Decoder for MaxMind DB (`.mmdb`) files
///
/// The whole file is read into memory on open, so the file on disk can be
/// replaced or removed while the decoder is in use.
pub struct MmdbDecoder {
    reader: Reader<Vec<u8>>,
}

impl std::fmt::Debug for MmdbDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmdbDecoder")
            .field("database_type", &self.reader.metadata.database_type)
            .field("build_epoch", &self.reader.metadata.build_epoch)
            .finish()
    }
}

impl Decoder for MmdbDecoder {
    fn open(path: &Path) -> Result<Self, DecodeError> {
        if !path.exists() {
            return Err(DecodeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }
        let reader = Reader::open_readfile(path)
            .map_err(|e| DecodeError::InvalidDatabase(e.to_string()))?;
        Ok(Self { reader })
    }

    fn lookup_prefix<T: DeserializeOwned>(
        &self,
        ip: IpAddr,
    ) -> Result<Option<(T, u8)>, DecodeError> {
        let (record, prefix_len) =
            self.reader
                .lookup_prefix::<T>(ip)
                .map_err(|e| DecodeError::Malformed {
                    ip,
                    reason: e.to_string(),
                })?;
        // prefix lengths never exceed 128
        let prefix_len = u8::try_from(prefix_len).unwrap_or(u8::MAX);
        Ok(record.map(|r| (r, prefix_len)))
    }

    fn metadata(&self) -> DecoderMetadata {
        let meta = &self.reader.metadata;
        DecoderMetadata {
            database_type: meta.database_type.clone(),
            build_time: i64::try_from(meta.build_epoch)
                .ok()
                .and_then(|epoch| DateTime::from_timestamp(epoch, 0)),
            ip_version: meta.ip_version,
            node_count: meta.node_count,
            languages: meta.languages.clone(),
        }
    }
}
