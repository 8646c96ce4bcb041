#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Geolens - self-updating GeoIP2 database handles
//!
//! Geolens keeps MaxMind GeoIP2 / GeoLite2 datasets open for concurrent
//! lookups while a background task replaces them with fresh snapshots. It can
//! be used as both a command-line application and a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `update` | MaxMind update endpoint client | `ureq`, `flate2`, `md-5` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | Full CLI binary | All above + `clap`, `tracing-subscriber` |
//!
//! ## Choosing Features
//!
//! ```toml
//! # Handles over local datasets, bring your own fetcher
//! geolens = { version = "0.1", default-features = false }
//!
//! # Handles that refresh from MaxMind
//! geolens = { version = "0.1", default-features = false, features = ["update"] }
//!
//! # Default (CLI binary)
//! geolens = "0.1"
//! ```
//!
//! # Architecture
//!
//! - **[`database`]**: [`DatabaseHandle`] and [`DatabaseSet`]
//!   - `core`: the [`Decoder`] seam and the MaxMind DB decoder
//! - **[`fetch`]**: the [`Fetcher`] seam and the MaxMind update client
//! - **[`records`]**: typed City, Country and ASN records
//! - **[`lens`]**: merged lookups and the flat `geoip2.*` field table
//! - **[`config`]**: Configuration management
//! - **[`error`]**: library error type
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use geolens::{DatabaseSet, GeolensConfig};
//! use geolens::fetch::MaxMindFetcher;
//!
//! let config = GeolensConfig::new(&None)?;
//! let fetcher = config
//!     .update_config()
//!     .map(|c| Arc::new(MaxMindFetcher::new(c)) as Arc<dyn Fetcher>);
//!
//! let set = DatabaseSet::open(
//!     &config.editions,
//!     &config.data_path(),
//!     fetcher,
//!     config.update_frequency(),
//! )
//! .await?;
//!
//! if let Some(record) = set.city("81.2.69.160".parse()?)? {
//!     println!("{:?}", record.city.name());
//! }
//!
//! set.close().await?;
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod fetch;
pub mod lens;
pub mod records;

pub use config::GeolensConfig;
pub use database::{
    snapshot_path, DatabaseHandle, DatabaseSet, Decoder, DecoderMetadata, HandleOptions,
    MmdbDecoder, RefreshStatus,
};
pub use error::{DecodeError, Error, FetchError, Result};
pub use fetch::{FetchOutcome, Fetcher};
pub use records::{AsnRecord, CityRecord, CountryRecord, GeoRecord, RecordKind};
