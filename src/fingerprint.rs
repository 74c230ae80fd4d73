use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::config::FingerprintLayout;

/// Coarse colour summary of one square region: three 8-bit channel means
/// packed into the low 24 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub u32);

impl Fingerprint {
    pub fn pack(means: [u8; 3], layout: FingerprintLayout) -> Self {
        let [r, g, b] = means.map(u32::from);
        let low = match layout {
            FingerprintLayout::Rgb => b,
            FingerprintLayout::LegacyRgr => r,
        };
        Fingerprint((r << 16) | (g << 8) | low)
    }
}

/// Fingerprint of the `size` x `size` square whose exclusive bottom-right
/// corner is `(right, bottom)`, i.e. pixels `[right - size, right) x
/// [bottom - size, bottom)`.
///
/// The caller guarantees the square lies inside `image`.
pub fn region_fingerprint(
    image: &RgbImage,
    right: u32,
    bottom: u32,
    size: u32,
    layout: FingerprintLayout,
) -> Fingerprint {
    debug_assert!(size > 0 && size <= right && size <= bottom);
    debug_assert!(right <= image.width() && bottom <= image.height());

    let mut sums = [0u64; 3];
    for y in bottom - size..bottom {
        for x in right - size..right {
            let pixel = image.get_pixel(x, y);
            for (sum, channel) in sums.iter_mut().zip(pixel.0) {
                *sum += u64::from(channel);
            }
        }
    }

    let count = u64::from(size) * u64::from(size);
    // Truncating mean of u8 samples always fits in u8.
    let means = sums.map(|sum| (sum / count) as u8);
    Fingerprint::pack(means, layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::solid;
    use image::Rgb;

    #[test]
    fn test_solid_region_packs_channel_means() {
        let image = solid(60, 60, [0x12, 0x34, 0x56]);
        let fp = region_fingerprint(&image, 50, 50, 50, FingerprintLayout::Rgb);
        assert_eq!(fp, Fingerprint(0x123456));
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let image = RgbImage::from_fn(80, 80, |x, y| Rgb([(x * 3) as u8, (y * 2) as u8, (x ^ y) as u8]));
        let first = region_fingerprint(&image, 70, 65, 50, FingerprintLayout::Rgb);
        let second = region_fingerprint(&image.clone(), 70, 65, 50, FingerprintLayout::Rgb);
        assert_eq!(first, second);
    }

    #[test]
    fn test_mean_truncates() {
        // Left half 0, right half 255 -> mean 127.5 -> 127
        let image = RgbImage::from_fn(4, 4, |x, _| if x < 2 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) });
        let fp = region_fingerprint(&image, 4, 4, 4, FingerprintLayout::Rgb);
        assert_eq!(fp, Fingerprint(0x7f7f7f));
    }

    #[test]
    fn test_only_pixels_inside_region_count() {
        let mut image = solid(20, 20, [10, 20, 30]);
        // Paint everything outside [5, 15) x [5, 15) white.
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            if !(5..15).contains(&x) || !(5..15).contains(&y) {
                *pixel = Rgb([255, 255, 255]);
            }
        }
        let fp = region_fingerprint(&image, 15, 15, 10, FingerprintLayout::Rgb);
        assert_eq!(fp, Fingerprint((10 << 16) | (20 << 8) | 30));
    }

    #[test]
    fn test_legacy_layout_repeats_first_channel() {
        let image = solid(10, 10, [0xaa, 0xbb, 0xcc]);
        let fp = region_fingerprint(&image, 10, 10, 10, FingerprintLayout::LegacyRgr);
        assert_eq!(fp, Fingerprint(0xaabbaa));

        let other_blue = solid(10, 10, [0xaa, 0xbb, 0x00]);
        let fp2 = region_fingerprint(&other_blue, 10, 10, 10, FingerprintLayout::LegacyRgr);
        assert_eq!(fp, fp2);
    }
}
