//! Geolocation lookup lens
//!
//! Answers "where is this address" from an open [`DatabaseSet`], merging the
//! City, Country and ASN answers into one result.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::net::IpAddr;

use crate::database::{DatabaseSet, Decoder, MmdbDecoder};
use crate::lens::fields::{parse_client_ip, GeoFields};
use crate::records::{AsnRecord, CityRecord, CountryRecord};

// =============================================================================
// Types
// =============================================================================

/// Everything the configured editions know about one address
#[derive(Debug, Clone, Serialize)]
pub struct GeoLookup {
    pub ip: IpAddr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<CityRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<CountryRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<AsnRecord>,
}

impl GeoLookup {
    /// Whether any edition had data for the address
    pub fn found(&self) -> bool {
        self.city.is_some() || self.country.is_some() || self.asn.is_some()
    }

    pub fn fields(&self) -> GeoFields {
        GeoFields::from_records(
            self.ip,
            self.city.as_ref(),
            self.country.as_ref(),
            self.asn.as_ref(),
        )
    }

    /// One-line summary for table output
    pub fn summary(&self) -> GeoSummary {
        let country = self
            .city
            .as_ref()
            .map(|c| &c.country)
            .filter(|c| c.has_data())
            .or_else(|| self.country.as_ref().map(|c| &c.country));
        let city = self.city.as_ref();

        GeoSummary {
            ip: self.ip.to_string(),
            country: country
                .and_then(|c| c.iso_code.clone())
                .unwrap_or_default(),
            region: city
                .and_then(|c| c.subdivisions.first())
                .and_then(|s| s.name())
                .unwrap_or_default()
                .to_string(),
            city: city
                .and_then(|c| c.city.name())
                .unwrap_or_default()
                .to_string(),
            coordinates: city
                .and_then(|c| c.location.latitude.zip(c.location.longitude))
                .map(|(lat, lon)| format!("{:.4}, {:.4}", lat, lon))
                .unwrap_or_default(),
            asn: self
                .asn
                .as_ref()
                .and_then(|a| a.autonomous_system_number)
                .map(|n| format!("AS{}", n))
                .unwrap_or_default(),
            organization: self
                .asn
                .as_ref()
                .and_then(|a| a.autonomous_system_organization.clone())
                .unwrap_or_default(),
        }
    }
}

/// Flattened lookup row
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct GeoSummary {
    pub ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub coordinates: String,
    pub asn: String,
    pub organization: String,
}

// =============================================================================
// Lens
// =============================================================================

/// Geolocation lens over an open [`DatabaseSet`]
pub struct GeoLens<'a, D: Decoder = MmdbDecoder> {
    set: &'a DatabaseSet<D>,
}

impl<'a, D: Decoder> GeoLens<'a, D> {
    pub fn new(set: &'a DatabaseSet<D>) -> Self {
        Self { set }
    }

    /// Look up every record kind for `ip`
    pub fn lookup(&self, ip: IpAddr) -> Result<GeoLookup> {
        Ok(GeoLookup {
            ip,
            city: self.set.city(ip)?,
            country: self.set.country(ip)?,
            asn: self.set.asn(ip)?,
        })
    }

    /// Look up `ip` and flatten the result into `geoip2.*` fields
    pub fn fields(&self, ip: IpAddr) -> Result<GeoFields> {
        Ok(self.lookup(ip)?.fields())
    }

    /// Resolve a client address (with optional port or zone) and look it up.
    ///
    /// The result is seeded with every fixed key, so callers binding the
    /// fields into templates always see the same key set.
    pub fn bind(&self, address: &str) -> Result<GeoFields> {
        let ip = parse_client_ip(address)
            .ok_or_else(|| anyhow!("no client IP could be resolved from '{}'", address))?;
        if ip.is_unspecified() {
            return Err(anyhow!("unspecified client IP '{}'", address));
        }
        let mut fields = GeoFields::with_defaults();
        fields.merge(self.fields(ip)?);
        Ok(fields)
    }

    /// Parse and look up each query; the first invalid address is an error
    pub fn lookup_all(&self, queries: &[String]) -> Result<Vec<GeoLookup>> {
        queries
            .iter()
            .map(|q| {
                let ip = parse_client_ip(q).ok_or_else(|| anyhow!("invalid IP address '{}'", q))?;
                self.lookup(ip)
            })
            .collect()
    }
}
