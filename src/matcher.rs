use image::{DynamicImage, RgbImage};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::MatchConfig;
use crate::fingerprint::{Fingerprint, region_fingerprint};
use crate::index::{ImageId, Index};
use crate::phash::PerceptualHasher;
use crate::scorer::{self, OffsetHistogram};

/// One region sampled from the query: its fingerprint and trailing x.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerySample {
    pub fingerprint: Fingerprint,
    pub x: u32,
}

/// Result of looking a query up before scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Exact(ImageId),
    Sampled(BTreeMap<ImageId, OffsetHistogram>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateScore {
    pub image: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchOutcome {
    Exact {
        image: String,
    },
    Sampled {
        image: String,
        score: u32,
        /// Every candidate with at least one hit, best first.
        candidates: Vec<CandidateScore>,
    },
    None,
}

pub struct Matcher<'a> {
    index: &'a Index,
    samples: usize,
    seed: u64,
    window: usize,
    hasher: PerceptualHasher,
}

impl<'a> Matcher<'a> {
    /// Region size and fingerprint layout always come from `index`; the
    /// config supplies sampling and scoring parameters.
    pub fn new(index: &'a Index, config: &MatchConfig) -> Self {
        Self {
            index,
            samples: config.samples,
            seed: config.seed,
            window: config.window,
            hasher: PerceptualHasher::new(),
        }
    }

    /// Draw the configured number of regions from `image` with a generator
    /// seeded from the config, so the same image always yields the same
    /// samples. An image smaller than one region yields none.
    pub fn sample(&self, image: &RgbImage) -> Vec<QuerySample> {
        let size = self.index.region_size();
        let (width, height) = image.dimensions();
        if width < size || height < size {
            debug!("Query {}x{} is smaller than region size {}", width, height, size);
            return Vec::new();
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..self.samples)
            .map(|_| {
                let x = rng.random_range(size..=width);
                let y = rng.random_range(size..=height);
                QuerySample {
                    fingerprint: region_fingerprint(image, x, y, size, self.index.layout()),
                    x,
                }
            })
            .collect()
    }

    /// Vote for `indexed position - sampled x` in each candidate's histogram
    /// for every indexed region sharing a sample's fingerprint.
    pub fn histograms(&self, samples: &[QuerySample]) -> BTreeMap<ImageId, OffsetHistogram> {
        let mut histograms: BTreeMap<ImageId, OffsetHistogram> = BTreeMap::new();
        let mut hits = 0usize;
        for sample in samples {
            for posting in self.index.lookup(sample.fingerprint) {
                let offset = i64::from(posting.position) - i64::from(sample.x);
                *histograms
                    .entry(posting.image)
                    .or_default()
                    .entry(offset)
                    .or_insert(0) += 1;
                hits += 1;
            }
        }
        debug!(
            "{} samples produced {} hits across {} candidates",
            samples.len(),
            hits,
            histograms.len()
        );
        histograms
    }

    /// Exact whole-image hash first; sampling only runs when that misses.
    pub fn lookup(&self, query: &DynamicImage) -> Lookup {
        let hash = self.hasher.hash(query);
        if let Some(image) = self.index.exact_match(hash) {
            debug!("Whole-image hash {:016x} matched exactly", hash);
            return Lookup::Exact(image);
        }

        let samples = self.sample(&query.to_rgb8());
        Lookup::Sampled(self.histograms(&samples))
    }

    pub fn find_best_match(&self, query: &DynamicImage) -> MatchOutcome {
        let histograms = match self.lookup(query) {
            Lookup::Exact(image) => {
                return MatchOutcome::Exact {
                    image: self.path(image),
                };
            }
            Lookup::Sampled(histograms) => histograms,
        };

        let ranked = scorer::rank(&histograms, self.window);
        let candidates: Vec<CandidateScore> = ranked
            .iter()
            .map(|r| CandidateScore {
                image: self.path(r.candidate),
                score: r.score,
            })
            .collect();
        for candidate in &candidates {
            debug!("{}: {}", candidate.image, candidate.score);
        }

        match candidates.first() {
            Some(best) => MatchOutcome::Sampled {
                image: best.image.clone(),
                score: best.score,
                candidates,
            },
            None => MatchOutcome::None,
        }
    }

    fn path(&self, image: ImageId) -> String {
        self.index.image_path(image).unwrap_or_default().to_string()
    }
}

/// Match `query` against `index` using `config`'s sampling parameters.
pub fn find_best_match(index: &Index, query: &DynamicImage, config: &MatchConfig) -> MatchOutcome {
    Matcher::new(index, config).find_best_match(query)
}
