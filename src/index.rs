use std::collections::HashMap;

use crate::config::FingerprintLayout;
use crate::fingerprint::Fingerprint;

/// Position of an image path in the index's image table.
pub type ImageId = u32;

/// One indexed region: which image it came from and its trailing x coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Posting {
    pub image: ImageId,
    pub position: u32,
}

/// Region fingerprints and whole-image hashes for a corpus.
///
/// Produced once by [`crate::builder::IndexBuilder`] or
/// [`crate::store::load`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub(crate) region_size: u32,
    pub(crate) layout: FingerprintLayout,
    pub(crate) images: Vec<String>,
    pub(crate) postings: HashMap<Fingerprint, Vec<Posting>>,
    pub(crate) hashes: HashMap<u64, ImageId>,
}

impl Index {
    pub fn region_size(&self) -> u32 {
        self.region_size
    }

    pub fn layout(&self) -> FingerprintLayout {
        self.layout
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn image_path(&self, id: ImageId) -> Option<&str> {
        self.images.get(id as usize).map(String::as_str)
    }

    /// All regions sharing `fingerprint`, possibly across many images.
    pub fn lookup(&self, fingerprint: Fingerprint) -> &[Posting] {
        self.postings
            .get(&fingerprint)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Image whose whole-image hash equals `hash`, if any.
    pub fn exact_match(&self, hash: u64) -> Option<ImageId> {
        self.hashes.get(&hash).copied()
    }

    pub fn entry_count(&self) -> usize {
        self.postings.values().map(Vec::len).sum()
    }

    pub fn hash_count(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty() && self.hashes.is_empty()
    }
}
