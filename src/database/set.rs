//! Ordered collection of database handles
//!
//! A [`DatabaseSet`] opens one [`DatabaseHandle`] per edition and answers
//! typed lookups from the first edition that has data for the address.

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::core::{Decoder, MmdbDecoder};
use super::handle::{DatabaseHandle, HandleOptions};
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::records::{AsnRecord, CityRecord, CountryRecord, GeoRecord};

pub struct DatabaseSet<D: Decoder = MmdbDecoder> {
    handles: Vec<DatabaseHandle<D>>,
}

impl<D: Decoder> DatabaseSet<D> {
    /// Open one handle per edition, in order.
    ///
    /// If any edition fails to open, the handles opened so far are closed
    /// before the error is returned.
    pub async fn open<S: AsRef<str>>(
        editions: &[S],
        data_dir: &Path,
        fetcher: Option<Arc<dyn Fetcher>>,
        refresh_interval: Duration,
    ) -> Result<Self> {
        let mut handles = Vec::with_capacity(editions.len());
        for edition in editions {
            let options = HandleOptions::new(edition.as_ref(), data_dir)
                .with_optional_fetcher(fetcher.clone())
                .with_refresh_interval(refresh_interval);
            match DatabaseHandle::open(options).await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    for handle in handles {
                        if let Err(close_err) = handle.close().await {
                            warn!(edition = %handle.edition(), error = %close_err, "error closing handle");
                        }
                    }
                    return Err(e);
                }
            }
        }
        debug!(editions = handles.len(), "opened database set");
        Ok(Self { handles })
    }

    /// Build a set from already-open handles
    pub fn from_handles(handles: Vec<DatabaseHandle<D>>) -> Self {
        Self { handles }
    }

    pub fn handles(&self) -> &[DatabaseHandle<D>] {
        &self.handles
    }

    pub fn get(&self, edition: &str) -> Option<&DatabaseHandle<D>> {
        self.handles.iter().find(|h| h.edition() == edition)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// First record of type `R` with data for `ip`, in edition order.
    ///
    /// Editions that fail to decode `R` (e.g. an ASN dataset asked for a city
    /// record) are skipped. A closed handle is an error.
    pub fn lookup<R: GeoRecord>(&self, ip: IpAddr) -> Result<Option<R>> {
        for handle in &self.handles {
            match handle.lookup_record::<R>(ip) {
                Ok(Some(record)) if record.has_data() => return Ok(Some(record)),
                Ok(_) => {}
                Err(e @ Error::Lookup { .. }) => {
                    debug!(edition = %handle.edition(), kind = %R::KIND, error = %e, "skipping edition");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    pub fn city(&self, ip: IpAddr) -> Result<Option<CityRecord>> {
        self.lookup(ip)
    }

    pub fn country(&self, ip: IpAddr) -> Result<Option<CountryRecord>> {
        self.lookup(ip)
    }

    pub fn asn(&self, ip: IpAddr) -> Result<Option<AsnRecord>> {
        self.lookup(ip)
    }

    /// Close every handle, collecting all errors
    pub async fn close(&self) -> Result<()> {
        let mut errors = Vec::new();
        for handle in &self.handles {
            if let Err(e) = handle.close().await {
                errors.push(e);
            }
        }
        Error::from_many(errors)
    }
}

impl<D: Decoder> std::fmt::Debug for DatabaseSet<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handles.iter().map(|h| h.edition()))
            .finish()
    }
}
