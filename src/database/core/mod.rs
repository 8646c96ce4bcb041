//! Core database infrastructure
//!
//! This module provides the foundational components the handles are built on:
//! - `Decoder`: point-lookup access to one opened snapshot file
//! - `MmdbDecoder`: the MaxMind DB implementation
//! - `DecoderMetadata`: what an opened snapshot says about itself

mod decoder;

pub use decoder::{Decoder, DecoderMetadata, MmdbDecoder};
