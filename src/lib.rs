//! Locate a query image, or a crop of it, inside a directory of images.
//!
//! Each corpus image is cut into a grid of square regions whose mean colour
//! is packed into a 24-bit fingerprint. A query is first checked against the
//! whole-image perceptual hashes; failing that, random regions of the query
//! vote for `(image, horizontal offset)` pairs and the image with the densest
//! run of offsets wins.

pub mod builder;
pub mod config;
pub mod decode;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod matcher;
pub mod phash;
pub mod scorer;
pub mod store;

#[cfg(test)]
mod testutil;

pub use builder::{BuildStats, IndexBuilder, build_index};
pub use config::{FingerprintLayout, MatchConfig};
pub use error::{Result, SearchError};
pub use fingerprint::Fingerprint;
pub use index::Index;
pub use matcher::{MatchOutcome, Matcher, find_best_match};
