//! Database module
//!
//! This module provides the self-updating dataset handles, organized into:
//!
//! - **core**: Decoder seam and the MaxMind DB decoder
//! - **handle**: [`DatabaseHandle`], one edition with optional background refresh
//! - **set**: [`DatabaseSet`], an ordered group of handles answering typed lookups
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   └── decoder     # Decoder trait, MmdbDecoder
//! │
//! ├── handle/         # One edition
//! │   └── refresh     # Background fetch-open-swap task
//! │
//! └── set             # Ordered editions, first match wins
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use geolens::database::DatabaseSet;
//! use geolens::fetch::{MaxMindFetcher, UpdateConfig};
//!
//! let fetcher = Arc::new(MaxMindFetcher::new(UpdateConfig::new(account_id, license_key)));
//! let set = DatabaseSet::open(
//!     &["GeoLite2-City", "GeoLite2-ASN"],
//!     Path::new("/var/lib/geolens"),
//!     Some(fetcher),
//!     Duration::from_secs(86400),
//! )
//! .await?;
//!
//! if let Some(city) = set.city("8.8.8.8".parse()?)? {
//!     println!("{:?}", city.city.name());
//! }
//!
//! set.close().await?;
//! ```

pub mod core;
mod handle;
mod set;

#[cfg(test)]
pub(crate) mod testing;

pub use core::{Decoder, DecoderMetadata, MmdbDecoder};
pub use handle::{snapshot_path, DatabaseHandle, HandleOptions, RefreshStatus};
pub use set::DatabaseSet;
