use image::{GrayImage, Luma};
use imageproc::contrast::{ThresholdType, threshold as ip_threshold};

use crate::buffer::PixelBuffer;
use crate::quantize::IndexMap;
use crate::{VectorizeError, VectorizeResult};

/// Mask value for a set pixel.
pub const MASK_SET: u8 = 255;
/// Mask value for an unset pixel.
pub const MASK_UNSET: u8 = 0;

/// Binary mask for one palette color: set where the index map points at `color_index`.
pub fn build_mask(index_map: &IndexMap, color_index: usize) -> GrayImage {
    let (h, w) = index_map.dim();
    GrayImage::from_fn(w as u32, h as u32, |x, y| {
        let hit = index_map[[y as usize, x as usize]].is_some_and(|i| i as usize == color_index);
        Luma([if hit { MASK_SET } else { MASK_UNSET }])
    })
}

/// Binary mask of pixels whose luminance is strictly below `threshold`.
///
/// `threshold == 0` yields an empty mask. Fully transparent pixels are never set.
pub fn threshold_mask(buffer: &PixelBuffer, threshold: u8) -> GrayImage {
    let gray = image::imageops::grayscale(buffer.image());
    let mut mask = match threshold {
        0 => GrayImage::new(gray.width(), gray.height()),
        // imageproc: <= value -> 255 for the inverted variant
        t => ip_threshold(&gray, t - 1, ThresholdType::BinaryInverted),
    };
    if buffer.has_transparency() {
        for (idx, px) in mask.pixels_mut().enumerate() {
            if buffer.is_transparent(idx) {
                *px = Luma([MASK_UNSET]);
            }
        }
    }
    mask
}

/// Wrap raw mask bytes (non-zero = set) into a binary mask.
pub fn mask_from_raw(width: u32, height: u32, data: Vec<u8>) -> VectorizeResult<GrayImage> {
    let len = data.len();
    let mismatch = || {
        VectorizeError::Tracing(format!(
            "mask of {len} bytes does not match dimensions {width}x{height}"
        ))
    };
    if (width as usize).checked_mul(height as usize) != Some(len) {
        return Err(mismatch());
    }
    let binary: Vec<u8> = data
        .into_iter()
        .map(|v| if v > 0 { MASK_SET } else { MASK_UNSET })
        .collect();
    GrayImage::from_raw(width, height, binary).ok_or_else(mismatch)
}

/// Number of set pixels.
pub fn mask_area(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] > 0).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{PixelFormat, RawImage, normalize};
    use image::{Rgb, RgbImage};
    use ndarray::arr2;

    fn gray_buffer(w: u32, h: u32, value: u8) -> PixelBuffer {
        PixelBuffer::from_rgb(RgbImage::from_pixel(w, h, Rgb([value, value, value])))
    }

    mod build_mask {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn selects_matching_index() {
                let map = arr2(&[[Some(0u8), Some(1)], [Some(1), None]]);
                let mask = build_mask(&map, 1);
                assert_eq!(mask.dimensions(), (2, 2));
                assert_eq!(mask.get_pixel(0, 0).0[0], 0);
                assert_eq!(mask.get_pixel(1, 0).0[0], 255);
                assert_eq!(mask.get_pixel(0, 1).0[0], 255);
                assert_eq!(mask.get_pixel(1, 1).0[0], 0);
            }

            #[test]
            fn out_of_range_index_is_empty() {
                let map = arr2(&[[Some(0u8), Some(0)]]);
                let mask = build_mask(&map, 3);
                assert_eq!(mask_area(&mask), 0);
            }

            #[test]
            fn width_and_height_follow_array_shape() {
                let map = IndexMap::from_elem((2, 3), Some(0));
                let mask = build_mask(&map, 0);
                // ndarray is (rows, cols) = (h, w), image is (w, h)
                assert_eq!(mask.dimensions(), (3, 2));
            }
        }

        mod prop {
            use super::*;
            use proptest::prelude::*;

            proptest! {
                /// Every pixel with an index lands in exactly one color mask.
                #[test]
                fn masks_partition_visible_pixels(
                    cells in proptest::collection::vec(proptest::option::of(0u8..4), 1..60)
                ) {
                    let len = cells.len();
                    let map = IndexMap::from_shape_vec((1, len), cells.clone()).unwrap();
                    let masks: Vec<GrayImage> = (0..4).map(|c| build_mask(&map, c)).collect();

                    for (x, cell) in cells.iter().enumerate() {
                        let hits = masks
                            .iter()
                            .filter(|m| m.get_pixel(x as u32, 0).0[0] == MASK_SET)
                            .count();
                        prop_assert_eq!(hits, if cell.is_some() { 1 } else { 0 });
                    }
                }
            }
        }
    }

    mod threshold_mask {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn threshold_zero_sets_nothing() {
                let mask = threshold_mask(&gray_buffer(3, 3, 0), 0);
                assert_eq!(mask_area(&mask), 0);
            }

            #[test]
            fn darker_than_threshold_is_set() {
                let mask = threshold_mask(&gray_buffer(2, 2, 127), 128);
                assert_eq!(mask_area(&mask), 4);
            }

            #[test]
            fn exact_threshold_is_not_set() {
                let mask = threshold_mask(&gray_buffer(2, 2, 128), 128);
                assert_eq!(mask_area(&mask), 0);
            }

            #[test]
            fn threshold_255_sets_all_but_white() {
                let mut img = RgbImage::from_pixel(2, 1, Rgb([254, 254, 254]));
                img.put_pixel(1, 0, Rgb([255, 255, 255]));
                let mask = threshold_mask(&PixelBuffer::from_rgb(img), 255);
                assert_eq!(mask.get_pixel(0, 0).0[0], 255);
                assert_eq!(mask.get_pixel(1, 0).0[0], 0);
            }

            #[test]
            fn transparent_pixels_never_set() {
                // black opaque, black transparent
                let samples = [0, 0, 0, 255, 0, 0, 0, 0];
                let raw = RawImage::new(2, 1, PixelFormat::Rgba8, &samples);
                let buffer = normalize(&raw, Rgb([0, 0, 0])).unwrap();
                let mask = threshold_mask(&buffer, 200);
                assert_eq!(mask.get_pixel(0, 0).0[0], 255);
                assert_eq!(mask.get_pixel(1, 0).0[0], 0);
            }
        }

        mod prop {
            use super::*;
            use proptest::prelude::*;

            proptest! {
                /// Output is binary and follows the strict less-than rule.
                #[test]
                fn respects_threshold(value in any::<u8>(), threshold in any::<u8>()) {
                    let mask = threshold_mask(&gray_buffer(1, 1, value), threshold);
                    let out = mask.get_pixel(0, 0).0[0];
                    if value < threshold {
                        prop_assert_eq!(out, MASK_SET);
                    } else {
                        prop_assert_eq!(out, MASK_UNSET);
                    }
                }
            }
        }
    }

    mod mask_from_raw {
        use super::*;

        #[test]
        fn binarizes_values() {
            let mask = mask_from_raw(3, 1, vec![0, 1, 200]).unwrap();
            assert_eq!(mask.as_raw(), &vec![0, 255, 255]);
        }

        #[test]
        fn length_mismatch_is_tracing_error() {
            let err = mask_from_raw(2, 2, vec![0; 3]).unwrap_err();
            assert!(matches!(err, VectorizeError::Tracing(_)));
            assert!(mask_from_raw(2, 2, vec![0; 5]).is_err());
        }
    }
}
