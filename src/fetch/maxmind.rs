//! MaxMind update endpoint client
//!
//! Speaks the `geoipupdate` v4 protocol: a single authenticated GET per
//! edition, answered either with `304 Not Modified` (the MD5 we sent matches
//! the remote dataset) or a gzip-compressed `.mmdb` body plus its MD5 in the
//! `X-Database-MD5` header.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

use base64::Engine;
use flate2::read::GzDecoder;
use md5::{Digest, Md5};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{lock_path, FetchOutcome, Fetcher, LockFile, DEFAULT_UPDATE_URL};
use crate::error::FetchError;

/// MD5 sent when no local snapshot exists, forcing a full download
const ZERO_MD5: &str = "00000000000000000000000000000000";

const MD5_HEADER: &str = "X-Database-MD5";

/// Credentials and endpoint for the MaxMind update service
#[derive(Clone)]
pub struct UpdateConfig {
    pub account_id: u32,
    pub license_key: String,
    pub url: String,
    pub timeout: Duration,
}

impl UpdateConfig {
    pub fn new(account_id: u32, license_key: impl Into<String>) -> Self {
        Self {
            account_id,
            license_key: license_key.into(),
            url: DEFAULT_UPDATE_URL.to_string(),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn authorization(&self) -> String {
        let credentials = format!("{}:{}", self.account_id, self.license_key);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }

    fn endpoint(&self, edition: &str) -> String {
        format!(
            "{}/geoip/databases/{}/update",
            self.url.trim_end_matches('/'),
            edition
        )
    }
}

impl std::fmt::Debug for UpdateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateConfig")
            .field("account_id", &self.account_id)
            .field("license_key", &"<redacted>")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// [`Fetcher`] backed by the MaxMind update endpoint
pub struct MaxMindFetcher {
    config: UpdateConfig,
    agent: ureq::Agent,
}

impl MaxMindFetcher {
    pub fn new(config: UpdateConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { config, agent }
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }
}

impl std::fmt::Debug for MaxMindFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaxMindFetcher")
            .field("config", &self.config)
            .finish()
    }
}

impl Fetcher for MaxMindFetcher {
    fn fetch(
        &self,
        edition: &str,
        current: Option<&Path>,
        destination: &Path,
    ) -> Result<FetchOutcome, FetchError> {
        let dir = destination
            .parent()
            .ok_or_else(|| FetchError::Other(format!("{} has no parent", destination.display())))?;
        std::fs::create_dir_all(dir)?;

        let _lock = LockFile::acquire(&lock_path(destination))?;

        let current_md5 = match current.filter(|p| p.exists()) {
            Some(path) => md5_file(path)?,
            None => ZERO_MD5.to_string(),
        };

        let url = self.config.endpoint(edition);
        debug!(edition, %url, md5 = %current_md5, "requesting dataset update");

        let response = self
            .agent
            .get(&url)
            .query("db_md5", &current_md5)
            .header("Authorization", &self.config.authorization())
            .call()
            .map_err(|e| FetchError::Http(e.to_string()))?;

        let code = response.status().as_u16();
        let expected_md5 = response
            .headers()
            .get(MD5_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_ascii_lowercase());
        let mut body = response.into_body();

        match code {
            304 => {
                debug!(edition, "dataset is up to date");
                Ok(FetchOutcome::Unchanged)
            }
            200 => {
                let reader = GzDecoder::new(body.into_reader());
                let (temp, actual_md5) = write_temp(reader, dir)?;
                if let Some(expected) = expected_md5 {
                    if expected != actual_md5 {
                        return Err(FetchError::Checksum {
                            expected,
                            actual: actual_md5,
                        });
                    }
                }
                temp.persist(destination)
                    .map_err(|e| FetchError::Io(e.error))?;
                info!(edition, path = %destination.display(), "downloaded new dataset");
                Ok(FetchOutcome::Updated)
            }
            code => {
                let body = body.read_to_string().unwrap_or_default();
                Err(FetchError::Status {
                    code,
                    body: body.trim().to_string(),
                })
            }
        }
    }
}

// =============================================================================
// File helpers
// =============================================================================

/// Stream `reader` into a synced temp file in `dir`, returning it with the
/// hex MD5 of the written bytes. The caller persists it onto the destination.
fn write_temp<R: Read>(mut reader: R, dir: &Path) -> Result<(NamedTempFile, String), FetchError> {
    let mut temp = NamedTempFile::new_in(dir)?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        temp.write_all(&buf[..n])?;
    }
    temp.as_file().sync_all()?;
    Ok((temp, hex::encode(hasher.finalize())))
}

fn md5_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
