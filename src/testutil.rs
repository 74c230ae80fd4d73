use image::{Rgb, RgbImage};

pub fn solid(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(color))
}

/// Grid of `block` x `block` squares. Red follows the block column and green
/// the block row through a scrambled ramp, blue is constant. Within 20 blocks
/// every square has a distinct colour, and a region that straddles two
/// columns or rows never averages to the colour of a whole square.
pub fn block_pattern(width: u32, height: u32, block: u32, blue: u8) -> RgbImage {
    let level = |k: u32| (((k * 7) % 20) * 12) as u8;
    RgbImage::from_fn(width, height, |x, y| Rgb([level(x / block), level(y / block), blue]))
}
