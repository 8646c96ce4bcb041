//! Lens module
//!
//! High-level views over open datasets, shared by the CLI and library users.
//!
//! | Lens | Purpose |
//! |------|---------|
//! | `GeoLens` | City, Country and ASN lookup merged per address |
//! | `fields` | Flat `geoip2.*` key/value table for binding into templates |
//!
//! ```rust,ignore
//! use geolens::lens::geo::GeoLens;
//!
//! let lens = GeoLens::new(&set);
//! let result = lens.lookup("8.8.8.8".parse()?)?;
//! println!("{}", serde_json::to_string_pretty(&result.fields())?);
//! ```

pub mod fields;
pub mod geo;
