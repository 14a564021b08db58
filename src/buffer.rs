use image::{DynamicImage, Rgb, RgbImage};

use crate::{VectorizeError, VectorizeResult};

/// Sample layout of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    Luma8,
    LumaA8,
}

impl PixelFormat {
    /// Number of 8-bit samples per pixel.
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
            PixelFormat::Luma8 => 1,
            PixelFormat::LumaA8 => 2,
        }
    }

    fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::Rgba8 | PixelFormat::LumaA8)
    }
}

/// Borrowed, decoded pixel samples as handed over by an external decoder.
#[derive(Debug, Clone, Copy)]
pub struct RawImage<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Row-major samples, `width * height * format.channels()` bytes.
    pub samples: &'a [u8],
}

impl<'a> RawImage<'a> {
    pub fn new(width: u32, height: u32, format: PixelFormat, samples: &'a [u8]) -> Self {
        Self {
            width,
            height,
            format,
            samples,
        }
    }
}

/// Opaque RGB pixels ready for quantization.
///
/// Pixels whose source alpha was exactly zero are remembered so that no mask
/// ever claims them.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    image: RgbImage,
    transparent: Option<Vec<bool>>,
}

impl PixelBuffer {
    /// Wrap an already opaque RGB image.
    pub fn from_rgb(image: RgbImage) -> Self {
        Self {
            image,
            transparent: None,
        }
    }

    /// Normalize any decoded `image` value, compositing alpha against `background`.
    pub fn from_dynamic(image: &DynamicImage, background: Rgb<u8>) -> VectorizeResult<Self> {
        let rgba = image.to_rgba8();
        let (w, h) = rgba.dimensions();
        normalize(
            &RawImage::new(w, h, PixelFormat::Rgba8, rgba.as_raw()),
            background,
        )
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Get a reference to the composited RGB image.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Whether the pixel at row-major index `idx` was fully transparent.
    pub fn is_transparent(&self, idx: usize) -> bool {
        self.transparent
            .as_ref()
            .is_some_and(|flags| flags.get(idx).copied().unwrap_or(false))
    }

    /// Whether any source pixel was fully transparent.
    pub fn has_transparency(&self) -> bool {
        self.transparent.is_some()
    }
}

/// Composite a single channel over the background ("over" operator, rounded).
fn blend_channel(src: u8, bg: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((src as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8
}

/// Normalize decoded samples into an opaque [`PixelBuffer`].
pub fn normalize(raw: &RawImage<'_>, background: Rgb<u8>) -> VectorizeResult<PixelBuffer> {
    if raw.width == 0 || raw.height == 0 {
        return Err(VectorizeError::Decode(format!(
            "image dimensions must be positive, got {}x{}",
            raw.width, raw.height
        )));
    }

    let channels = raw.format.channels();
    let expected = (raw.width as usize)
        .checked_mul(raw.height as usize)
        .and_then(|n| n.checked_mul(channels))
        .ok_or_else(|| {
            VectorizeError::Decode(format!(
                "image dimensions {}x{} overflow the addressable size",
                raw.width, raw.height
            ))
        })?;
    if raw.samples.len() != expected {
        return Err(VectorizeError::Decode(format!(
            "sample buffer length {} does not match {}x{}x{} = {}",
            raw.samples.len(),
            raw.width,
            raw.height,
            channels,
            expected
        )));
    }

    let Rgb([bg_r, bg_g, bg_b]) = background;
    let pixel_count = expected / channels;
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut transparent = vec![false; pixel_count];
    let mut any_transparent = false;

    for (px, flag) in raw.samples.chunks_exact(channels).zip(transparent.iter_mut()) {
        let (r, g, b, a) = match raw.format {
            PixelFormat::Rgb8 => (px[0], px[1], px[2], 255),
            PixelFormat::Rgba8 => (px[0], px[1], px[2], px[3]),
            PixelFormat::Luma8 => (px[0], px[0], px[0], 255),
            PixelFormat::LumaA8 => (px[0], px[0], px[0], px[1]),
        };
        if a == 0 {
            *flag = true;
            any_transparent = true;
        }
        if a == 255 {
            rgb.extend_from_slice(&[r, g, b]);
        } else {
            rgb.extend_from_slice(&[
                blend_channel(r, bg_r, a),
                blend_channel(g, bg_g, a),
                blend_channel(b, bg_b, a),
            ]);
        }
    }

    let image = RgbImage::from_raw(raw.width, raw.height, rgb).ok_or_else(|| {
        VectorizeError::Decode("composited buffer does not match image dimensions".into())
    })?;

    Ok(PixelBuffer {
        image,
        transparent: (raw.format.has_alpha() && any_transparent).then_some(transparent),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    mod normalize {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn rgb_passes_through() {
                let samples = [10, 20, 30, 40, 50, 60];
                let raw = RawImage::new(2, 1, PixelFormat::Rgb8, &samples);
                let buffer = normalize(&raw, WHITE).unwrap();
                assert_eq!(buffer.dimensions(), (2, 1));
                assert_eq!(buffer.image().get_pixel(0, 0).0, [10, 20, 30]);
                assert_eq!(buffer.image().get_pixel(1, 0).0, [40, 50, 60]);
                assert!(!buffer.has_transparency());
            }

            #[test]
            fn opaque_rgba_keeps_color() {
                let samples = [200, 100, 50, 255];
                let raw = RawImage::new(1, 1, PixelFormat::Rgba8, &samples);
                let buffer = normalize(&raw, Rgb([0, 0, 0])).unwrap();
                assert_eq!(buffer.image().get_pixel(0, 0).0, [200, 100, 50]);
            }

            #[test]
            fn transparent_pixel_takes_background() {
                let samples = [200, 100, 50, 0];
                let raw = RawImage::new(1, 1, PixelFormat::Rgba8, &samples);
                let buffer = normalize(&raw, Rgb([1, 2, 3])).unwrap();
                assert_eq!(buffer.image().get_pixel(0, 0).0, [1, 2, 3]);
                assert!(buffer.is_transparent(0));
            }

            #[test]
            fn half_alpha_blends() {
                // (0 * 128 + 255 * 127 + 127) / 255 = 127
                let samples = [0, 0, 0, 128];
                let raw = RawImage::new(1, 1, PixelFormat::Rgba8, &samples);
                let buffer = normalize(&raw, WHITE).unwrap();
                assert_eq!(buffer.image().get_pixel(0, 0).0, [127, 127, 127]);
                assert!(!buffer.is_transparent(0));
                assert!(!buffer.has_transparency());
            }

            #[test]
            fn luma_expands_to_gray() {
                let samples = [7, 9];
                let raw = RawImage::new(2, 1, PixelFormat::Luma8, &samples);
                let buffer = normalize(&raw, WHITE).unwrap();
                assert_eq!(buffer.image().get_pixel(0, 0).0, [7, 7, 7]);
                assert_eq!(buffer.image().get_pixel(1, 0).0, [9, 9, 9]);
            }

            #[test]
            fn luma_alpha_marks_transparency() {
                let samples = [0, 255, 0, 0];
                let raw = RawImage::new(2, 1, PixelFormat::LumaA8, &samples);
                let buffer = normalize(&raw, WHITE).unwrap();
                assert!(!buffer.is_transparent(0));
                assert!(buffer.is_transparent(1));
                assert_eq!(buffer.image().get_pixel(1, 0).0, [255, 255, 255]);
            }

            #[test]
            fn zero_width_is_decode_error() {
                let raw = RawImage::new(0, 3, PixelFormat::Rgb8, &[]);
                let err = normalize(&raw, WHITE).unwrap_err();
                assert!(matches!(err, VectorizeError::Decode(_)));
            }

            #[test]
            fn short_buffer_is_decode_error() {
                let samples = [0u8; 11];
                let raw = RawImage::new(2, 2, PixelFormat::Rgb8, &samples);
                let err = normalize(&raw, WHITE).unwrap_err();
                assert!(matches!(err, VectorizeError::Decode(_)));
            }

            #[test]
            fn long_buffer_is_decode_error() {
                let samples = [0u8; 17];
                let raw = RawImage::new(2, 2, PixelFormat::Rgba8, &samples);
                assert!(normalize(&raw, WHITE).is_err());
            }
        }

        mod prop {
            use super::*;
            use proptest::prelude::*;

            proptest! {
                /// Blended channels always lie between the source and background values.
                #[test]
                fn blend_is_bounded(src in any::<u8>(), bg in any::<u8>(), alpha in any::<u8>()) {
                    let out = blend_channel(src, bg, alpha);
                    prop_assert!(out >= src.min(bg) && out <= src.max(bg));
                }

                /// Output dimensions always match the input for well-formed buffers.
                #[test]
                fn dimensions_preserved(w in 1u32..12, h in 1u32..12, value in any::<u8>()) {
                    let samples = vec![value; (w * h * 4) as usize];
                    let raw = RawImage::new(w, h, PixelFormat::Rgba8, &samples);
                    let buffer = normalize(&raw, WHITE).unwrap();
                    prop_assert_eq!(buffer.dimensions(), (w, h));
                }
            }
        }
    }

    mod from_dynamic {
        use super::*;
        use image::{Rgba, RgbaImage};

        #[test]
        fn rgba_image_is_composited() {
            let mut img = RgbaImage::from_pixel(2, 1, Rgba([10, 20, 30, 255]));
            img.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
            let buffer =
                PixelBuffer::from_dynamic(&DynamicImage::ImageRgba8(img), Rgb([9, 9, 9])).unwrap();
            assert_eq!(buffer.image().get_pixel(0, 0).0, [10, 20, 30]);
            assert_eq!(buffer.image().get_pixel(1, 0).0, [9, 9, 9]);
            assert!(buffer.is_transparent(1));
        }
    }
}
