use image::{DynamicImage, ImageError, ImageReader};
use std::path::Path;

use crate::error::{Result, SearchError};

/// Open and decode an image, sniffing the format from its contents so files
/// without a recognised extension still load.
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    let decode_error = |source: ImageError| SearchError::Decode {
        path: path.to_path_buf(),
        source,
    };

    ImageReader::open(path)
        .map_err(|e| decode_error(ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| decode_error(ImageError::IoError(e)))?
        .decode()
        .map_err(decode_error)
}
