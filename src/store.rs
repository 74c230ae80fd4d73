//! Versioned on-disk form of an [`Index`].

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::config::FingerprintLayout;
use crate::error::{Result, SearchError};
use crate::fingerprint::Fingerprint;
use crate::index::{ImageId, Index, Posting};

pub const FORMAT_TAG: &str = "regionmatch-index";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRecord {
    pub fingerprint: Fingerprint,
    /// `(image id, trailing x)` pairs.
    pub postings: Vec<(ImageId, u32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashRecord {
    pub hash: u64,
    pub image: ImageId,
}

/// Self-describing snapshot of an index as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub format: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub region_size: u32,
    pub layout: FingerprintLayout,
    pub images: Vec<String>,
    pub entries: Vec<EntryRecord>,
    pub hashes: Vec<HashRecord>,
}

impl IndexSnapshot {
    pub fn from_index(index: &Index) -> Self {
        let mut entries: Vec<EntryRecord> = index
            .postings
            .iter()
            .map(|(fingerprint, postings)| EntryRecord {
                fingerprint: *fingerprint,
                postings: postings.iter().map(|p| (p.image, p.position)).collect(),
            })
            .collect();
        entries.sort_by_key(|entry| entry.fingerprint);

        let mut hashes: Vec<HashRecord> = index
            .hashes
            .iter()
            .map(|(&hash, &image)| HashRecord { hash, image })
            .collect();
        hashes.sort_by_key(|record| record.hash);

        Self {
            format: FORMAT_TAG.to_string(),
            version: FORMAT_VERSION,
            created_at: Utc::now(),
            region_size: index.region_size,
            layout: index.layout,
            images: index.images.clone(),
            entries,
            hashes,
        }
    }

    /// Validate the header and references, then rebuild the index.
    pub fn into_index(self) -> Result<Index> {
        if self.format != FORMAT_TAG {
            return Err(SearchError::Format(format!(
                "unexpected format tag {:?}",
                self.format
            )));
        }
        if self.version != FORMAT_VERSION {
            return Err(SearchError::Format(format!(
                "unsupported version {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        if self.region_size == 0 {
            return Err(SearchError::Format("region size is zero".to_string()));
        }

        let image_count = self.images.len();
        let check_id = |id: ImageId| -> Result<ImageId> {
            if (id as usize) < image_count {
                Ok(id)
            } else {
                Err(SearchError::Format(format!(
                    "image id {} out of range ({} images)",
                    id, image_count
                )))
            }
        };

        let mut postings = HashMap::with_capacity(self.entries.len());
        for entry in self.entries {
            let list = entry
                .postings
                .into_iter()
                .map(|(image, position)| -> Result<Posting> {
                    Ok(Posting {
                        image: check_id(image)?,
                        position,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            if postings.insert(entry.fingerprint, list).is_some() {
                return Err(SearchError::Format(format!(
                    "duplicate entry for fingerprint {:#08x}",
                    entry.fingerprint.0
                )));
            }
        }

        let mut hashes = HashMap::with_capacity(self.hashes.len());
        for record in self.hashes {
            hashes.insert(record.hash, check_id(record.image)?);
        }

        debug!(
            "Loaded index created at {} ({} images)",
            self.created_at, image_count
        );

        Ok(Index {
            region_size: self.region_size,
            layout: self.layout,
            images: self.images,
            postings,
            hashes,
        })
    }
}

/// Serialize `index` into the versioned JSON layout.
pub fn encode(index: &Index) -> Result<Vec<u8>> {
    serde_json::to_vec(&IndexSnapshot::from_index(index))
        .map_err(|e| SearchError::Format(e.to_string()))
}

pub fn decode(bytes: &[u8]) -> Result<Index> {
    let snapshot: IndexSnapshot =
        serde_json::from_slice(bytes).map_err(|e| SearchError::Format(e.to_string()))?;
    snapshot.into_index()
}

pub fn save(index: &Index, path: &Path) -> Result<()> {
    let bytes = encode(index)?;
    fs::write(path, bytes).map_err(|e| SearchError::io(path, e))
}

pub fn load(path: &Path) -> Result<Index> {
    let bytes = fs::read(path).map_err(|e| SearchError::io(path, e))?;
    decode(&bytes)
}
