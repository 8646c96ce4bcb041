//! Record sections shared between editions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Localized names keyed by locale code (e.g. `en`, `pt-BR`)
pub type Names = BTreeMap<String, String>;

fn english(names: &Names) -> Option<&str> {
    names.get("en").map(String::as_str)
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Country {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoname_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso_code: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub is_in_european_union: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u16>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub names: Names,
}

impl Country {
    pub fn has_data(&self) -> bool {
        self.geoname_id.is_some() || self.iso_code.is_some() || !self.names.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_data()
    }

    pub fn name(&self) -> Option<&str> {
        english(&self.names)
    }
}

/// A country the IP is represented by, such as a military base abroad
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepresentedCountry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoname_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso_code: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub is_in_european_union: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u16>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub names: Names,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub representation_type: Option<String>,
}

impl RepresentedCountry {
    pub fn has_data(&self) -> bool {
        self.geoname_id.is_some()
            || self.iso_code.is_some()
            || !self.names.is_empty()
            || self.representation_type.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_data()
    }

    pub fn name(&self) -> Option<&str> {
        english(&self.names)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Continent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoname_id: Option<u32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub names: Names,
}

impl Continent {
    pub fn has_data(&self) -> bool {
        self.code.is_some() || self.geoname_id.is_some() || !self.names.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_data()
    }

    pub fn name(&self) -> Option<&str> {
        english(&self.names)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct City {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoname_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u16>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub names: Names,
}

impl City {
    pub fn has_data(&self) -> bool {
        self.geoname_id.is_some() || !self.names.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_data()
    }

    pub fn name(&self) -> Option<&str> {
        english(&self.names)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    /// Radius in kilometers around the coordinates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_radius: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metro_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_income: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_density: Option<u32>,
}

impl Location {
    pub fn has_data(&self) -> bool {
        self.latitude.is_some()
            || self.longitude.is_some()
            || self.time_zone.is_some()
            || self.accuracy_radius.is_some()
            || self.metro_code.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_data()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Postal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u16>,
}

impl Postal {
    pub fn has_data(&self) -> bool {
        self.code.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_data()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subdivision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoname_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u16>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub names: Names,
}

impl Subdivision {
    pub fn has_data(&self) -> bool {
        self.geoname_id.is_some() || self.iso_code.is_some() || !self.names.is_empty()
    }

    pub fn name(&self) -> Option<&str> {
        english(&self.names)
    }
}

/// Network ownership and anonymizer flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Traits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autonomous_system_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autonomous_system_organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_network_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_ip_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_count: Option<u32>,
    #[serde(skip_serializing_if = "is_false")]
    pub is_anonymous: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_anonymous_proxy: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_anonymous_vpn: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_hosting_provider: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_legitimate_proxy: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_public_proxy: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_residential_proxy: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_satellite_provider: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_tor_exit_node: bool,
}

impl Traits {
    pub fn has_data(&self) -> bool {
        self.autonomous_system_number.is_some()
            || self.autonomous_system_organization.is_some()
            || self.connection_type.is_some()
            || self.domain.is_some()
            || self.isp.is_some()
            || self.organization.is_some()
            || self.user_type.is_some()
            || self.mobile_country_code.is_some()
            || self.mobile_network_code.is_some()
            || self.static_ip_score.is_some()
            || self.user_count.is_some()
            || self.is_anonymous
            || self.is_anonymous_proxy
            || self.is_anonymous_vpn
            || self.is_hosting_provider
            || self.is_legitimate_proxy
            || self.is_public_proxy
            || self.is_residential_proxy
            || self.is_satellite_provider
            || self.is_tor_exit_node
    }

    /// A section holding only the lookup's `network` still serializes
    pub fn is_empty(&self) -> bool {
        !self.has_data() && self.network.is_none()
    }
}
