//! Pixel-level comparison of a reference page against its comparison.
//!
//! The difference raster stores, per channel, the larger of the
//! absolute colour difference and the absolute alpha difference, so a
//! pixel is nonzero exactly when the two inputs disagree anywhere.

use image::{Rgb, RgbImage, RgbaImage};

use crate::types::Dimensions;

/// Outcome of comparing one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Every pixel matches.
    Identical,
    /// At least one pixel differs; carries the difference raster.
    Changed(RgbImage),
}

/// Errors that prevent a page comparison.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The two rasters have different sizes.
    #[error("page size changed from {reference} to {comparison}")]
    DimensionMismatch {
        /// Reference raster size.
        reference: Dimensions,
        /// Comparison raster size.
        comparison: Dimensions,
    },

    /// A raster could not be read or decoded.
    #[error("failed to decode page: {0}")]
    Decode(#[from] image::ImageError),
}

/// Decode an encoded page (PNG, JPEG, BMP, WebP) to RGBA.
///
/// # Errors
///
/// Returns [`DiffError::Decode`] if the bytes are not a supported image.
pub fn decode_page(bytes: &[u8]) -> Result<RgbaImage, DiffError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Compare two rasters element by element.
///
/// # Errors
///
/// Returns [`DiffError::DimensionMismatch`] if the sizes differ.
pub fn diff_pages(reference: &RgbaImage, comparison: &RgbaImage) -> Result<PageOutcome, DiffError> {
    if reference.dimensions() != comparison.dimensions() {
        return Err(DiffError::DimensionMismatch {
            reference: dimensions_of(reference),
            comparison: dimensions_of(comparison),
        });
    }

    let mut changed = false;
    let diff = RgbImage::from_fn(reference.width(), reference.height(), |x, y| {
        let a = reference.get_pixel(x, y).0;
        let b = comparison.get_pixel(x, y).0;
        let alpha = a[3].abs_diff(b[3]);
        let px = [
            a[0].abs_diff(b[0]).max(alpha),
            a[1].abs_diff(b[1]).max(alpha),
            a[2].abs_diff(b[2]).max(alpha),
        ];
        changed |= px != [0, 0, 0];
        Rgb(px)
    });

    Ok(if changed {
        PageOutcome::Changed(diff)
    } else {
        PageOutcome::Identical
    })
}

/// Number of nonzero pixels in a difference raster.
#[must_use]
pub fn changed_pixel_count(diff: &RgbImage) -> u64 {
    diff.pixels().filter(|p| p.0 != [0, 0, 0]).count() as u64
}

fn dimensions_of(img: &RgbaImage) -> Dimensions {
    let (width, height) = img.dimensions();
    Dimensions { width, height }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    fn page(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn identical_pages_produce_no_diff() {
        let a = page(16, 16);
        let b = page(16, 16);
        assert_eq!(diff_pages(&a, &b).unwrap(), PageOutcome::Identical);
    }

    #[test]
    fn single_changed_pixel_is_the_only_nonzero_pixel() {
        let a = page(16, 12);
        let mut b = page(16, 12);
        b.put_pixel(7, 3, Rgba([250, 255, 255, 255]));

        let PageOutcome::Changed(diff) = diff_pages(&a, &b).unwrap() else {
            unreachable!("expected a changed page");
        };
        assert_eq!(changed_pixel_count(&diff), 1);
        assert_eq!(diff.get_pixel(7, 3).0, [5, 0, 0]);
        for (x, y, p) in diff.enumerate_pixels() {
            if (x, y) != (7, 3) {
                assert_eq!(p.0, [0, 0, 0], "unexpected change at ({x}, {y})");
            }
        }
    }

    #[test]
    fn difference_is_symmetric() {
        let a = page(4, 4);
        let mut b = page(4, 4);
        b.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        assert_eq!(diff_pages(&a, &b).unwrap(), diff_pages(&b, &a).unwrap());
    }

    #[test]
    fn alpha_only_change_is_detected() {
        let a = page(4, 4);
        let mut b = page(4, 4);
        b.put_pixel(2, 2, Rgba([255, 255, 255, 128]));
        let PageOutcome::Changed(diff) = diff_pages(&a, &b).unwrap() else {
            unreachable!("expected a changed page");
        };
        assert_eq!(diff.get_pixel(2, 2).0, [127, 127, 127]);
    }

    #[test]
    fn size_mismatch_is_an_error() {
        let result = diff_pages(&page(10, 10), &page(10, 11));
        assert!(matches!(
            result,
            Err(DiffError::DimensionMismatch {
                reference: Dimensions { width: 10, height: 10 },
                comparison: Dimensions { width: 10, height: 11 },
            })
        ));
    }

    #[test]
    fn corrupt_bytes_fail_to_decode() {
        assert!(matches!(
            decode_page(&[0x89, 0x50, 0x4E, 0x47, 0x00]),
            Err(DiffError::Decode(_))
        ));
    }
}
