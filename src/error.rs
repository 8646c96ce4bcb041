//! Error types
//!
//! Every fallible library operation returns [`Error`]. The two collaborator
//! seams, dataset decoding and remote fetching, carry their own error types
//! ([`DecodeError`], [`FetchError`]) which are wrapped with the edition they
//! occurred in.

use std::net::IpAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by a [`Decoder`](crate::database::Decoder)
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read dataset file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid dataset: {0}")]
    InvalidDatabase(String),

    #[error("malformed record for {ip}: {reason}")]
    Malformed { ip: IpAddr, reason: String },
}

/// Errors raised by a [`Fetcher`](crate::fetch::Fetcher)
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock file {0} is held by another writer")]
    Locked(PathBuf),

    #[error("request failed: {0}")]
    Http(String),

    #[error("unexpected status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Checksum { expected: String, actual: String },

    #[error("{0}")]
    Other(String),
}

/// Library error
#[derive(Debug, Error)]
pub enum Error {
    /// No local snapshot and no way to fetch one
    #[error("no dataset for edition {edition} at {} and no update configuration", path.display())]
    MissingDataset { edition: String, path: PathBuf },

    #[error("no existing dataset for edition {edition} and initial fetch failed: {source}")]
    InitialFetch {
        edition: String,
        #[source]
        source: FetchError,
    },

    #[error("failed to open dataset {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("refresh of edition {edition} failed to fetch: {source}")]
    RefreshFetch {
        edition: String,
        #[source]
        source: FetchError,
    },

    #[error("refresh of edition {edition} failed to open new snapshot: {source}")]
    RefreshOpen {
        edition: String,
        #[source]
        source: DecodeError,
    },

    #[error("lookup in edition {edition} failed: {source}")]
    Lookup {
        edition: String,
        #[source]
        source: DecodeError,
    },

    /// The handle was closed; its dataset is no longer available
    #[error("database handle for edition {edition} is closed")]
    Closed { edition: String },

    #[error("database handle for edition {edition} was already closed")]
    AlreadyClosed { edition: String },

    /// The last refresh attempt before shutdown had failed
    #[error("edition {edition} closed after a failed refresh: {source}")]
    Close {
        edition: String,
        #[source]
        source: Box<Error>,
    },

    #[error("refresh task for edition {edition} aborted: {reason}")]
    TaskAborted { edition: String, reason: String },

    #[error("{}", join_errors(.0))]
    Aggregate(Vec<Error>),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Collapse a list of errors: none is `Ok`, one is itself, more are aggregated
    pub fn from_many(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Aggregate(errors)),
        }
    }

    /// Whether the error means the handle is shut down
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed { .. } | Error::AlreadyClosed { .. })
    }
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
