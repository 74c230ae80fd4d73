use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

pub const DEFAULT_REGION_SIZE: u32 = 50;
pub const DEFAULT_SAMPLES: usize = 5000;
pub const DEFAULT_SEED: u64 = 21;
pub const DEFAULT_WINDOW: usize = 10;

/// How the three channel means are packed into a fingerprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintLayout {
    /// `(R << 16) | (G << 8) | B`
    #[default]
    Rgb,
    /// `(R << 16) | (G << 8) | R`, as written by older fingerprint-search builds.
    /// Blue never contributes.
    LegacyRgr,
}

/// Tunables for one build-or-load plus match run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchConfig {
    /// Side length in pixels of the square fingerprint regions.
    pub region_size: u32,
    /// Number of regions sampled from the query image.
    pub samples: usize,
    /// Seed for query sampling. Fixed so repeated runs agree.
    pub seed: u64,
    /// Number of consecutive populated offset buckets summed by the scorer.
    pub window: usize,
    pub layout: FingerprintLayout,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            region_size: DEFAULT_REGION_SIZE,
            samples: DEFAULT_SAMPLES,
            seed: DEFAULT_SEED,
            window: DEFAULT_WINDOW,
            layout: FingerprintLayout::Rgb,
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.region_size == 0 {
            return Err(SearchError::Config(
                "region size must be at least 1 pixel".to_string(),
            ));
        }
        if self.window == 0 {
            return Err(SearchError::Config(
                "scoring window must span at least 1 bucket".to_string(),
            ));
        }
        Ok(())
    }
}
