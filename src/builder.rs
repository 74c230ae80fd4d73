use image::{DynamicImage, RgbImage};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{fs, io};
use walkdir::WalkDir;

use crate::config::{FingerprintLayout, MatchConfig};
use crate::decode::open_image;
use crate::error::{Result, SearchError};
use crate::fingerprint::{Fingerprint, region_fingerprint};
use crate::index::{ImageId, Index, Posting};
use crate::phash::PerceptualHasher;

/// Everything the index needs from one decoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub hash: u64,
    /// `(fingerprint, trailing x)` for every grid cell and edge strip.
    pub regions: Vec<(Fingerprint, u32)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub files: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub entries: usize,
}

/// Fingerprint every `size` x `size` grid cell of `image`, plus the strips
/// anchored to the bottom edge, the right edge and the bottom-right corner so
/// the remainder is covered when the dimensions are not multiples of `size`.
///
/// Each cell is recorded with its trailing x coordinate. Images smaller than
/// one region in either dimension yield nothing.
pub fn fingerprint_grid(
    image: &RgbImage,
    size: u32,
    layout: FingerprintLayout,
) -> Vec<(Fingerprint, u32)> {
    let (width, height) = image.dimensions();
    let mut regions = Vec::new();
    if size == 0 || width < size || height < size {
        return regions;
    }

    let step = size as usize;
    for x in (size..width).step_by(step) {
        for y in (size..height).step_by(step) {
            regions.push((region_fingerprint(image, x, y, size, layout), x));
        }
        regions.push((region_fingerprint(image, x, height, size, layout), x));
    }
    for y in (size..height).step_by(step) {
        regions.push((region_fingerprint(image, width, y, size, layout), width));
    }
    regions.push((region_fingerprint(image, width, height, size, layout), width));

    regions
}

/// Accumulates images into an [`Index`].
pub struct IndexBuilder {
    region_size: u32,
    layout: FingerprintLayout,
    hasher: PerceptualHasher,
    images: Vec<String>,
    postings: HashMap<Fingerprint, Vec<Posting>>,
    hashes: HashMap<u64, ImageId>,
}

impl IndexBuilder {
    pub fn new(config: &MatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            region_size: config.region_size,
            layout: config.layout,
            hasher: PerceptualHasher::new(),
            images: Vec::new(),
            postings: HashMap::new(),
            hashes: HashMap::new(),
        })
    }

    /// Compute the whole-image hash and region grid. Pure; safe to call from
    /// many threads at once.
    pub fn record(&self, image: &DynamicImage) -> ImageRecord {
        let rgb = image.to_rgb8();
        ImageRecord {
            hash: self.hasher.hash(image),
            regions: fingerprint_grid(&rgb, self.region_size, self.layout),
        }
    }

    /// Add a computed record. A hash already present is reassigned to this
    /// image.
    pub fn insert(&mut self, path: impl Into<String>, record: ImageRecord) -> ImageId {
        let id = self.images.len() as ImageId;
        self.images.push(path.into());

        self.hashes.insert(record.hash, id);
        for (fingerprint, position) in record.regions {
            self.postings
                .entry(fingerprint)
                .or_default()
                .push(Posting { image: id, position });
        }
        id
    }

    pub fn add_image(&mut self, path: impl Into<String>, image: &DynamicImage) -> ImageId {
        let record = self.record(image);
        self.insert(path, record)
    }

    pub fn finish(self) -> Index {
        Index {
            region_size: self.region_size,
            layout: self.layout,
            images: self.images,
            postings: self.postings,
            hashes: self.hashes,
        }
    }
}

/// Regular files directly inside `dir`, sorted by file name.
///
/// `dir` must be a directory; anything else is an [`SearchError::Io`].
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(dir).map_err(|e| SearchError::io(dir, e))?;
    if !metadata.is_dir() {
        return Err(SearchError::io(
            dir,
            io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(SearchError::io(dir, err.into()));
            }
            Err(err) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), err);
                continue;
            }
        };
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Scan `dir` (non-recursively) and index every file that decodes as an
/// image. Undecodable files are logged and skipped.
///
/// Files are decoded and fingerprinted in parallel, then merged in file-name
/// order, so the result matches a sequential build.
pub fn build_index(
    dir: &Path,
    config: &MatchConfig,
    progress: &ProgressBar,
) -> Result<(Index, BuildStats)> {
    let mut builder = IndexBuilder::new(config)?;
    let files = list_files(dir)?;
    progress.set_length(files.len() as u64);

    let records: Vec<(&PathBuf, Result<ImageRecord>)> = files
        .par_iter()
        .map(|path| {
            let record = open_image(path).map(|image| builder.record(&image));
            progress.inc(1);
            (path, record)
        })
        .collect();
    progress.finish_and_clear();

    let mut stats = BuildStats {
        files: files.len(),
        ..BuildStats::default()
    };
    for (path, record) in records {
        match record {
            Ok(record) => {
                if record.regions.is_empty() {
                    debug!("{} is smaller than one region; hash only", path.display());
                }
                debug!("Indexed {} ({} regions)", path.display(), record.regions.len());
                stats.entries += record.regions.len();
                stats.indexed += 1;
                builder.insert(path.to_string_lossy().into_owned(), record);
            }
            Err(err) => {
                warn!("Skipping {}: {}", path.display(), err);
                stats.skipped += 1;
            }
        }
    }

    info!(
        "Indexed {} of {} files ({} skipped, {} region entries)",
        stats.indexed, stats.files, stats.skipped, stats.entries
    );
    Ok((builder.finish(), stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{block_pattern, solid};
    use image::Rgb;
    use tempfile::TempDir;

    fn config(region_size: u32) -> MatchConfig {
        MatchConfig {
            region_size,
            ..MatchConfig::default()
        }
    }

    #[test]
    fn test_grid_100_has_one_interior_cell_and_edges() {
        let image = solid(100, 100, [9, 9, 9]);
        let regions = fingerprint_grid(&image, 50, FingerprintLayout::Rgb);
        // interior (50,50), bottom (50,100), right (100,50), corner (100,100)
        let positions: Vec<u32> = regions.iter().map(|(_, x)| *x).collect();
        assert_eq!(positions, vec![50, 50, 100, 100]);
    }

    #[test]
    fn test_grid_covers_remainder_strips() {
        let image = solid(130, 130, [1, 2, 3]);
        let regions = fingerprint_grid(&image, 50, FingerprintLayout::Rgb);
        // 2x2 interior, 2 bottom, 2 right, 1 corner
        assert_eq!(regions.len(), 9);
        assert_eq!(regions.iter().filter(|(_, x)| *x == 130).count(), 3);
    }

    #[test]
    fn test_grid_edge_strips_see_edge_pixels() {
        // Only the last 30 columns and rows differ; interior cells never see them.
        let image = RgbImage::from_fn(130, 130, |x, y| {
            if x >= 100 || y >= 100 { Rgb([200, 0, 0]) } else { Rgb([0, 0, 0]) }
        });
        let regions = fingerprint_grid(&image, 50, FingerprintLayout::Rgb);
        let black = Fingerprint(0);
        let corner = regions.last().unwrap();
        assert_eq!(corner.1, 130);
        assert_ne!(corner.0, black);
        assert_eq!(regions[0], (black, 50));
    }

    #[test]
    fn test_grid_exact_region_size_only_corner() {
        let image = solid(50, 50, [5, 5, 5]);
        let regions = fingerprint_grid(&image, 50, FingerprintLayout::Rgb);
        assert_eq!(regions, vec![(Fingerprint(0x050505), 50)]);
    }

    #[test]
    fn test_grid_smaller_than_region_is_empty() {
        let image = solid(40, 120, [5, 5, 5]);
        assert!(fingerprint_grid(&image, 50, FingerprintLayout::Rgb).is_empty());
    }

    #[test]
    fn test_builder_hash_collision_last_write_wins() {
        let mut builder = IndexBuilder::new(&config(50)).unwrap();
        let image = DynamicImage::ImageRgb8(block_pattern(100, 100, 10, 0));
        builder.add_image("first.png", &image);
        let second = builder.add_image("second.png", &image);
        let index = builder.finish();

        let hash = PerceptualHasher::new().hash(&image);
        assert_eq!(index.exact_match(hash), Some(second));
        assert_eq!(index.hash_count(), 1);
        assert_eq!(index.images().len(), 2);
    }

    #[test]
    fn test_builder_rejects_zero_region() {
        assert!(IndexBuilder::new(&config(0)).is_err());
    }

    #[test]
    fn test_build_index_skips_non_images() {
        let temp_dir = TempDir::new().unwrap();
        block_pattern(100, 100, 10, 0).save(temp_dir.path().join("a.png")).unwrap();
        solid(130, 130, [7, 8, 9]).save(temp_dir.path().join("b.png")).unwrap();
        fs::write(temp_dir.path().join("readme.txt"), b"hello").unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        solid(100, 100, [1, 1, 1]).save(temp_dir.path().join("nested").join("c.png")).unwrap();

        let (index, stats) = build_index(temp_dir.path(), &config(50), &ProgressBar::hidden()).unwrap();

        assert_eq!(stats.files, 3);
        assert_eq!(stats.indexed, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.entries, 4 + 9);
        assert_eq!(index.entry_count(), 13);
        assert!(index.images()[0].ends_with("a.png"));
        assert!(index.images()[1].ends_with("b.png"));

        let postings = index.lookup(Fingerprint(0x070809));
        assert_eq!(postings.len(), 9);
        assert!(postings.iter().all(|p| p.image == 1));
    }

    #[test]
    fn test_build_index_empty_dir() {
        let temp_dir = TempDir::new().unwrap();
        let (index, stats) = build_index(temp_dir.path(), &config(50), &ProgressBar::hidden()).unwrap();
        assert!(index.is_empty());
        assert_eq!(stats, BuildStats::default());
    }

    #[test]
    fn test_build_index_missing_dir_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        let result = build_index(&missing, &config(50), &ProgressBar::hidden());
        assert!(matches!(result, Err(SearchError::Io { .. })));
    }

    #[test]
    fn test_build_index_on_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.png");
        solid(60, 60, [1, 2, 3]).save(&file).unwrap();

        let result = build_index(&file, &config(50), &ProgressBar::hidden());
        match result {
            Err(SearchError::Io { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::NotADirectory)
            }
            other => panic!("expected an io error, got {:?}", other),
        }
    }

    #[test]
    fn test_parallel_build_matches_sequential() {
        let temp_dir = TempDir::new().unwrap();
        for seed in 0..6u8 {
            block_pattern(120, 90, 10, seed * 9).save(temp_dir.path().join(format!("img{seed}.png"))).unwrap();
        }
        let (parallel, _) = build_index(temp_dir.path(), &config(30), &ProgressBar::hidden()).unwrap();

        let mut builder = IndexBuilder::new(&config(30)).unwrap();
        for path in list_files(temp_dir.path()).unwrap() {
            let image = open_image(&path).unwrap();
            builder.add_image(path.to_string_lossy().into_owned(), &image);
        }
        assert_eq!(parallel, builder.finish());
    }
}
