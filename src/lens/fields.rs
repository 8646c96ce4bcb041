//! Flat `geoip2.*` field table
//!
//! Lookup results are flattened into string keys so they can be bound into
//! request variables, log lines or templates. Keys are stable; a section the
//! dataset did not populate produces no keys at all.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::Serialize;

use crate::records::{
    AsnRecord, CityRecord, Continent, Country, CountryRecord, Location, Names, Postal,
    RepresentedCountry, Subdivision, Traits,
};

/// Locales MaxMind publishes names in
pub const LOCALES: &[&str] = &["de", "en", "es", "fr", "ja", "pt-BR", "ru", "zh-CN"];

/// Key prefix shared by every field
pub const PREFIX: &str = "geoip2.";

/// Number of subdivisions that get pre-seeded keys
const SEEDED_SUBDIVISIONS: usize = 2;

/// Keys pre-seeded by [`GeoFields::with_defaults`]
pub const FIXED_KEYS: &[&str] = &[
    "geoip2.ip_address",
    "geoip2.country_code",
    "geoip2.country_name",
    "geoip2.country_eu",
    "geoip2.country_confidence",
    "geoip2.country_geoname_id",
    "geoip2.continent_code",
    "geoip2.continent_name",
    "geoip2.continent_geoname_id",
    "geoip2.city_confidence",
    "geoip2.city_geoname_id",
    "geoip2.city_name",
    "geoip2.location_latitude",
    "geoip2.location_longitude",
    "geoip2.location_time_zone",
    "geoip2.location_accuracy_radius",
    "geoip2.location_average_income",
    "geoip2.location_metro_code",
    "geoip2.location_population_density",
    "geoip2.postal_code",
    "geoip2.postal_confidence",
    "geoip2.registeredcountry_geoname_id",
    "geoip2.registeredcountry_is_in_european_union",
    "geoip2.registeredcountry_iso_code",
    "geoip2.registeredcountry_name",
    "geoip2.representedcountry_geoname_id",
    "geoip2.representedcountry_is_in_european_union",
    "geoip2.representedcountry_iso_code",
    "geoip2.representedcountry_confidence",
    "geoip2.representedcountry_type",
    "geoip2.representedcountry_name",
    "geoip2.traits_is_anonymous_proxy",
    "geoip2.traits_is_anonymous_vpn",
    "geoip2.traits_is_satellite_provider",
    "geoip2.traits_autonomous_system_number",
    "geoip2.traits_autonomous_system_organization",
    "geoip2.traits_connection_type",
    "geoip2.traits_domain",
    "geoip2.traits_is_hosting_provider",
    "geoip2.traits_is_legitimate_proxy",
    "geoip2.traits_is_public_proxy",
    "geoip2.traits_is_residential_proxy",
    "geoip2.traits_is_tor_exit_node",
    "geoip2.traits_isp",
    "geoip2.traits_mobile_country_code",
    "geoip2.traits_mobile_network_code",
    "geoip2.traits_network",
    "geoip2.traits_organization",
    "geoip2.traits_user_type",
    "geoip2.traits_userCount",
    "geoip2.traits_static_ip_score",
];

/// Per-subdivision suffixes, seeded for the first subdivisions
const SUBDIVISION_SUFFIXES: &[&str] = &["confidence", "geoname_id", "iso_code", "name"];

// =============================================================================
// Values
// =============================================================================

/// A single field value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<u16> for FieldValue {
    fn from(i: u16) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

// =============================================================================
// Field table
// =============================================================================

/// Ordered `geoip2.*` key/value table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GeoFields {
    fields: BTreeMap<String, FieldValue>,
}

impl GeoFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with every fixed key set to an empty string
    pub fn with_defaults() -> Self {
        let mut fields: BTreeMap<String, FieldValue> = FIXED_KEYS
            .iter()
            .map(|key| (key.to_string(), FieldValue::from("")))
            .collect();
        for n in 1..=SEEDED_SUBDIVISIONS {
            for suffix in SUBDIVISION_SUFFIXES {
                fields.insert(
                    format!("{PREFIX}subdivisions_{n}_{suffix}"),
                    FieldValue::from(""),
                );
            }
        }
        Self { fields }
    }

    /// Flatten lookup results. Earlier sources win: the city record first,
    /// then the country record, then the ASN record. `traits_network` is the
    /// exception and prefers the ASN record's network.
    pub fn from_records(
        ip: IpAddr,
        city: Option<&CityRecord>,
        country: Option<&CountryRecord>,
        asn: Option<&AsnRecord>,
    ) -> Self {
        let mut out = Self::new();
        out.set("ip_address", ip.to_string());

        if let Some(city) = city {
            out.add_country("country", &city.country);
            out.add_continent(&city.continent);
            out.add_city(city);
            out.add_location(&city.location);
            out.add_postal(&city.postal);
            out.add_country("registeredcountry", &city.registered_country);
            out.add_represented_country(&city.represented_country);
            out.add_subdivisions(&city.subdivisions);
            out.add_traits(&city.traits);
        }
        if let Some(country) = country {
            out.add_country("country", &country.country);
            out.add_continent(&country.continent);
            out.add_country("registeredcountry", &country.registered_country);
            out.add_represented_country(&country.represented_country);
            out.add_traits(&country.traits);
        }
        if let Some(asn) = asn {
            if let Some(number) = asn.autonomous_system_number {
                out.set("traits_autonomous_system_number", number);
            }
            if let Some(org) = &asn.autonomous_system_organization {
                out.set("traits_autonomous_system_organization", org.as_str());
            }
        }
        let network = asn
            .and_then(|a| a.network.as_deref())
            .or_else(|| city.and_then(|c| c.traits.network.as_deref()))
            .or_else(|| country.and_then(|c| c.traits.network.as_deref()));
        out.set_opt("traits_network", network);
        out
    }

    /// Overwrite entries with those of `other`
    pub fn merge(&mut self, other: GeoFields) {
        self.fields.extend(other.fields);
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Insert `geoip2.<key>` unless an earlier source already set it
    fn set(&mut self, key: &str, value: impl Into<FieldValue>) {
        self.fields
            .entry(format!("{PREFIX}{key}"))
            .or_insert_with(|| value.into());
    }

    fn set_opt<V: Into<FieldValue>>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    fn add_names(&mut self, section: &str, names: &Names) {
        for locale in LOCALES {
            if let Some(name) = names.get(*locale) {
                self.set(&format!("{section}_names_{locale}"), name.as_str());
            }
        }
        self.set_opt(&format!("{section}_name"), names.get("en").map(String::as_str));
    }

    /// `country` and `registeredcountry` share a shape but not key names
    fn add_country(&mut self, section: &str, country: &Country) {
        if !country.has_data() {
            return;
        }
        if section == "country" {
            self.set_opt("country_code", country.iso_code.as_deref());
            self.set("country_eu", country.is_in_european_union);
        } else {
            self.set_opt(
                &format!("{section}_iso_code"),
                country.iso_code.as_deref(),
            );
            self.set(
                &format!("{section}_is_in_european_union"),
                country.is_in_european_union,
            );
        }
        self.set_opt(&format!("{section}_confidence"), country.confidence);
        self.set_opt(&format!("{section}_geoname_id"), country.geoname_id);
        self.add_names(section, &country.names);
    }

    fn add_represented_country(&mut self, country: &RepresentedCountry) {
        if !country.has_data() {
            return;
        }
        self.set_opt("representedcountry_iso_code", country.iso_code.as_deref());
        self.set(
            "representedcountry_is_in_european_union",
            country.is_in_european_union,
        );
        self.set_opt("representedcountry_confidence", country.confidence);
        self.set_opt("representedcountry_geoname_id", country.geoname_id);
        self.set_opt(
            "representedcountry_type",
            country.representation_type.as_deref(),
        );
        self.add_names("representedcountry", &country.names);
    }

    fn add_continent(&mut self, continent: &Continent) {
        if !continent.has_data() {
            return;
        }
        self.set_opt("continent_code", continent.code.as_deref());
        self.set_opt("continent_geoname_id", continent.geoname_id);
        self.add_names("continent", &continent.names);
    }

    fn add_city(&mut self, record: &CityRecord) {
        if !record.city.has_data() {
            return;
        }
        self.set_opt("city_confidence", record.city.confidence);
        self.set_opt("city_geoname_id", record.city.geoname_id);
        self.add_names("city", &record.city.names);
    }

    fn add_location(&mut self, location: &Location) {
        if !location.has_data() {
            return;
        }
        self.set_opt("location_latitude", location.latitude);
        self.set_opt("location_longitude", location.longitude);
        self.set_opt("location_time_zone", location.time_zone.as_deref());
        self.set_opt("location_accuracy_radius", location.accuracy_radius);
        self.set_opt("location_average_income", location.average_income);
        self.set_opt("location_metro_code", location.metro_code);
        self.set_opt(
            "location_population_density",
            location.population_density,
        );
    }

    fn add_postal(&mut self, postal: &Postal) {
        if !postal.has_data() {
            return;
        }
        self.set_opt("postal_code", postal.code.as_deref());
        self.set_opt("postal_confidence", postal.confidence);
    }

    fn add_subdivisions(&mut self, subdivisions: &[Subdivision]) {
        for (index, subdivision) in subdivisions.iter().enumerate() {
            if !subdivision.has_data() {
                continue;
            }
            let section = format!("subdivisions_{}", index + 1);
            self.set_opt(&format!("{section}_confidence"), subdivision.confidence);
            self.set_opt(&format!("{section}_geoname_id"), subdivision.geoname_id);
            self.set_opt(
                &format!("{section}_iso_code"),
                subdivision.iso_code.as_deref(),
            );
            self.add_names(&section, &subdivision.names);
        }
    }

    fn add_traits(&mut self, traits: &Traits) {
        if !traits.has_data() {
            return;
        }
        self.set_opt(
            "traits_autonomous_system_number",
            traits.autonomous_system_number,
        );
        self.set_opt(
            "traits_autonomous_system_organization",
            traits.autonomous_system_organization.as_deref(),
        );
        self.set_opt("traits_connection_type", traits.connection_type.as_deref());
        self.set_opt("traits_domain", traits.domain.as_deref());
        self.set_opt("traits_isp", traits.isp.as_deref());
        self.set_opt(
            "traits_mobile_country_code",
            traits.mobile_country_code.as_deref(),
        );
        self.set_opt(
            "traits_mobile_network_code",
            traits.mobile_network_code.as_deref(),
        );
        self.set_opt("traits_organization", traits.organization.as_deref());
        self.set_opt("traits_user_type", traits.user_type.as_deref());
        self.set_opt("traits_userCount", traits.user_count);
        self.set_opt("traits_static_ip_score", traits.static_ip_score);

        self.set("traits_is_anonymous_proxy", traits.is_anonymous_proxy);
        self.set("traits_is_anonymous_vpn", traits.is_anonymous_vpn);
        self.set("traits_is_satellite_provider", traits.is_satellite_provider);
        self.set("traits_is_hosting_provider", traits.is_hosting_provider);
        self.set("traits_is_legitimate_proxy", traits.is_legitimate_proxy);
        self.set("traits_is_public_proxy", traits.is_public_proxy);
        self.set("traits_is_residential_proxy", traits.is_residential_proxy);
        self.set("traits_is_tor_exit_node", traits.is_tor_exit_node);
    }
}

/// Extract the IP from a client address such as `1.2.3.4:8080`,
/// `[fe80::1%eth0]:443` or `::1`
pub fn parse_client_ip(address: &str) -> Option<IpAddr> {
    let address = address.trim();
    let host = if let Some(rest) = address.strip_prefix('[') {
        rest.split_once(']').map(|(host, _)| host)?
    } else if address.matches(':').count() == 1 {
        address.split_once(':').map(|(host, _)| host)?
    } else {
        address
    };
    let host = host.split_once('%').map(|(ip, _)| ip).unwrap_or(host);
    host.parse().ok()
}
