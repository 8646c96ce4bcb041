//! Remote dataset retrieval
//!
//! A [`Fetcher`] produces a fresh snapshot file for an edition. Handles only
//! rely on the contract below; the MaxMind update client lives in
//! [`maxmind`] behind the `update` feature.
//!
//! Contract for implementors:
//! - the file at `destination` is replaced atomically (write to a temporary
//!   file in the same directory, then rename), so a reader never observes a
//!   half-written snapshot;
//! - concurrent writers to the same destination are excluded by an advisory
//!   lock on `<destination>.lock`;
//! - the call blocks; handles run it on a blocking thread.

#[cfg(feature = "update")]
pub mod maxmind;

#[cfg(feature = "update")]
pub use maxmind::{MaxMindFetcher, UpdateConfig};

use std::fs::File;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt as FileLockExt;

use crate::error::FetchError;

/// Default MaxMind update endpoint
pub const DEFAULT_UPDATE_URL: &str = "https://updates.maxmind.com";

/// What a successful fetch did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A new snapshot was written to the destination
    Updated,
    /// The remote dataset matches `current`; nothing was written
    Unchanged,
}

/// Retrieves dataset snapshots from a remote source
pub trait Fetcher: Send + Sync {
    /// Fetch `edition` into `destination`.
    ///
    /// `current` is the snapshot presently served, if any, which lets the
    /// fetcher skip the download when the remote copy is identical.
    fn fetch(
        &self,
        edition: &str,
        current: Option<&Path>,
        destination: &Path,
    ) -> Result<FetchOutcome, FetchError>;
}

/// Path of the advisory lock file guarding `destination`
pub fn lock_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Exclusive advisory lock, released on drop
pub(crate) struct LockFile {
    file: File,
}

impl LockFile {
    /// Take the lock at `path` without waiting; a held lock is `FetchError::Locked`
    pub(crate) fn acquire(path: &Path) -> Result<Self, FetchError> {
        let file = File::options()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        match FileLockExt::try_lock_exclusive(&file) {
            Ok(true) => Ok(Self { file }),
            Ok(false) => Err(FetchError::Locked(path.to_path_buf())),
            Err(e) => Err(FetchError::Io(e)),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = FileLockExt::unlock(&self.file);
    }
}
