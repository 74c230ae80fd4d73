use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig};

/// 64-bit whole-image perceptual hash (8x8 DCT mean hash).
pub struct PerceptualHasher {
    hasher: Hasher,
}

impl PerceptualHasher {
    pub fn new() -> Self {
        let hasher = HasherConfig::new()
            .hash_size(8, 8)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();
        Self { hasher }
    }

    pub fn hash(&self, image: &DynamicImage) -> u64 {
        let hash = self.hasher.hash_image(image);
        hash.as_bytes()
            .iter()
            .take(8)
            .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte))
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new()
    }
}
