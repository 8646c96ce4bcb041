//! GeoIP2 record types
//!
//! Records mirror the MaxMind DB document layout so the same structs decode
//! City, Country and ASN editions. Every section exposes `has_data()`; an
//! empty section is a section the dataset did not populate and must not be
//! reported as an answer.

mod sections;

pub use sections::*;

use ipnet::IpNet;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// =============================================================================
// Record kinds
// =============================================================================

/// The kind of answer a lookup asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    City,
    Country,
    Asn,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::City => write!(f, "city"),
            RecordKind::Country => write!(f, "country"),
            RecordKind::Asn => write!(f, "asn"),
        }
    }
}

/// A typed lookup result
pub trait GeoRecord: DeserializeOwned + Send + 'static {
    const KIND: RecordKind;

    /// Whether the section this kind answers for was populated
    fn has_data(&self) -> bool;

    /// Record the network the answer was found in
    fn attach_network(&mut self, _network: IpNet) {}
}

// =============================================================================
// City
// =============================================================================

/// Result of a city-level lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CityRecord {
    #[serde(skip_serializing_if = "City::is_empty")]
    pub city: City,
    #[serde(skip_serializing_if = "Continent::is_empty")]
    pub continent: Continent,
    #[serde(skip_serializing_if = "Country::is_empty")]
    pub country: Country,
    #[serde(skip_serializing_if = "Location::is_empty")]
    pub location: Location,
    #[serde(skip_serializing_if = "Postal::is_empty")]
    pub postal: Postal,
    #[serde(skip_serializing_if = "Country::is_empty")]
    pub registered_country: Country,
    #[serde(skip_serializing_if = "RepresentedCountry::is_empty")]
    pub represented_country: RepresentedCountry,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subdivisions: Vec<Subdivision>,
    #[serde(skip_serializing_if = "Traits::is_empty")]
    pub traits: Traits,
}

impl GeoRecord for CityRecord {
    const KIND: RecordKind = RecordKind::City;

    fn has_data(&self) -> bool {
        self.city.has_data()
            || self.location.has_data()
            || self.postal.has_data()
            || self.subdivisions.iter().any(Subdivision::has_data)
    }

    fn attach_network(&mut self, network: IpNet) {
        if self.traits.network.is_none() {
            self.traits.network = Some(network.to_string());
        }
    }
}

// =============================================================================
// Country
// =============================================================================

/// Result of a country-level lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountryRecord {
    #[serde(skip_serializing_if = "Continent::is_empty")]
    pub continent: Continent,
    #[serde(skip_serializing_if = "Country::is_empty")]
    pub country: Country,
    #[serde(skip_serializing_if = "Country::is_empty")]
    pub registered_country: Country,
    #[serde(skip_serializing_if = "RepresentedCountry::is_empty")]
    pub represented_country: RepresentedCountry,
    #[serde(skip_serializing_if = "Traits::is_empty")]
    pub traits: Traits,
}

impl GeoRecord for CountryRecord {
    const KIND: RecordKind = RecordKind::Country;

    fn has_data(&self) -> bool {
        self.country.has_data() || self.registered_country.has_data()
    }
}

// =============================================================================
// ASN
// =============================================================================

/// Result of an autonomous-system lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsnRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autonomous_system_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autonomous_system_organization: Option<String>,
    /// Covering network, filled in from the lookup rather than the record
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

impl GeoRecord for AsnRecord {
    const KIND: RecordKind = RecordKind::Asn;

    fn has_data(&self) -> bool {
        self.autonomous_system_number.is_some() || self.autonomous_system_organization.is_some()
    }

    fn attach_network(&mut self, network: IpNet) {
        self.network = Some(network.to_string());
    }
}
