pub mod buffer;
pub mod config;
pub mod contour;
pub mod error;
pub mod layer;
pub mod mask;
pub mod quantize;
pub mod simplify;
pub mod svg;
pub mod vectorizer;

pub use buffer::{PixelBuffer, PixelFormat, RawImage, normalize};
pub use config::{ColorMode, SimplifyOptions, TraceOptions, VectorizeOptions};
pub use contour::{Contour, ContourKind, group_shapes, trace_contours};
pub use error::{VectorizeError, VectorizeResult};
pub use layer::{FillRule, Layer, Shape, VectorDocument, compose};
pub use mask::{build_mask, mask_area, mask_from_raw, threshold_mask};
pub use quantize::{IndexMap, Palette, quantize};
pub use simplify::{max_deviation, simplify};
pub use svg::SvgOptions;
pub use vectorizer::{MaskVectorizer, PathTracer, PathTracerOptions};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::{GrayImage, Rgb};
use rayon::prelude::*;
use tracing::{debug, debug_span, info};

/// Cooperative cancellation flag shared between a caller and a running invocation.
///
/// Checked between stages and before each per-color unit; a cancelled run
/// returns [`VectorizeError::Cancelled`] and no document.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> VectorizeResult<()> {
        if self.is_cancelled() {
            Err(VectorizeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Entry point for configuring and running vectorization.
#[derive(Debug, Clone, Default)]
pub struct Vectorizer {
    options: VectorizeOptions,
}

impl Vectorizer {
    pub fn new(options: VectorizeOptions) -> Self {
        Self { options }
    }

    /// Set the color mode.
    pub fn with_mode(mut self, mode: ColorMode) -> Self {
        self.options.mode = mode;
        self
    }

    /// Set the maximum palette size.
    pub fn with_max_colors(mut self, max_colors: usize) -> Self {
        self.options.max_colors = max_colors;
        self
    }

    /// Set the binary-mode luminance threshold.
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.options.threshold = threshold;
        self
    }

    /// Set the simplification tolerance in pixels.
    pub fn with_simplify_tolerance(mut self, tolerance: f64) -> Self {
        self.options.simplify_tolerance = tolerance;
        self
    }

    /// Set the minimum contour area in square pixels.
    pub fn with_min_contour_area(mut self, area: f64) -> Self {
        self.options.min_contour_area = area;
        self
    }

    /// Enable or disable corner preservation.
    pub fn with_corner_preserve(mut self, enabled: bool) -> Self {
        self.options.corner_preserve = enabled;
        self
    }

    /// Get a reference to the options.
    pub fn options(&self) -> &VectorizeOptions {
        &self.options
    }

    /// Set the SVG stroke width in pixels; zero disables strokes.
    pub fn with_stroke_width(mut self, width: f64) -> Self {
        self.options.stroke_width = width;
        self
    }

    /// SVG options matching the configured precision, stroke and scale.
    pub fn svg_options(&self) -> SvgOptions {
        SvgOptions::from(&self.options)
    }

    fn tracer_options(&self) -> PathTracerOptions {
        PathTracerOptions {
            trace: self.options.trace_options(),
            simplify: self.options.simplify_options(),
        }
    }

    /// Normalize decoded samples, then vectorize them.
    pub fn vectorize_raw(&self, raw: &RawImage<'_>) -> VectorizeResult<VectorDocument> {
        self.options.validate()?;
        let buffer = normalize(raw, self.options.background_color)?;
        self.vectorize(&buffer)
    }

    /// Vectorize a normalized pixel buffer.
    pub fn vectorize(&self, buffer: &PixelBuffer) -> VectorizeResult<VectorDocument> {
        self.vectorize_with_cancel(buffer, &CancelToken::new())
    }

    /// Vectorize a normalized pixel buffer, stopping early once `cancel` fires.
    pub fn vectorize_with_cancel(
        &self,
        buffer: &PixelBuffer,
        cancel: &CancelToken,
    ) -> VectorizeResult<VectorDocument> {
        self.options.validate()?;
        cancel.check()?;

        let (width, height) = buffer.dimensions();
        let per_color = match self.options.mode {
            ColorMode::Color => self.trace_colors(buffer, cancel)?,
            ColorMode::Binary => {
                let mask = threshold_mask(buffer, self.options.threshold);
                debug!(
                    threshold = self.options.threshold,
                    set_pixels = mask_area(&mask),
                    "built threshold mask"
                );
                cancel.check()?;
                let shapes = self.trace_mask(&mask)?;
                vec![(self.options.foreground_color, shapes)]
            }
        };
        cancel.check()?;

        let document = compose(width, height, per_color);
        info!(
            width,
            height,
            mode = ?self.options.mode,
            layers = document.layers.len(),
            shapes = document.shape_count(),
            "vectorized image"
        );
        Ok(document)
    }

    /// Quantize, then trace one mask per palette color in parallel.
    ///
    /// Results are collected in palette order regardless of scheduling.
    fn trace_colors(
        &self,
        buffer: &PixelBuffer,
        cancel: &CancelToken,
    ) -> VectorizeResult<Vec<(Rgb<u8>, Vec<Shape>)>> {
        let (palette, index_map) = quantize(buffer, self.options.max_colors)?;
        cancel.check()?;

        palette
            .colors()
            .par_iter()
            .enumerate()
            .map(|(index, &color)| -> VectorizeResult<(Rgb<u8>, Vec<Shape>)> {
                let _span = debug_span!("color", index, rgb = ?color.0).entered();
                cancel.check()?;
                let mask = build_mask(&index_map, index);
                debug!(set_pixels = mask_area(&mask), "built color mask");
                Ok((color, self.trace_mask(&mask)?))
            })
            .collect()
    }

    /// Trace and fit a single binary mask with the configured options.
    pub fn trace_mask(&self, mask: &GrayImage) -> VectorizeResult<Vec<Shape>> {
        PathTracer.vectorize(mask, &self.tracer_options())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn two_color() -> PixelBuffer {
        PixelBuffer::from_rgb(RgbImage::from_fn(8, 4, |x, _| {
            if x < 4 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) }
        }))
    }

    mod cancel_token {
        use super::*;

        #[test]
        fn clones_share_state() {
            let token = CancelToken::new();
            let clone = token.clone();
            assert!(!clone.is_cancelled());
            token.cancel();
            assert!(clone.is_cancelled());
            assert!(matches!(clone.check(), Err(VectorizeError::Cancelled)));
        }
    }

    mod vectorize_with_cancel {
        use super::*;

        #[test]
        fn cancelled_token_returns_no_document() {
            let token = CancelToken::new();
            token.cancel();
            let err = Vectorizer::default()
                .vectorize_with_cancel(&two_color(), &token)
                .unwrap_err();
            assert!(matches!(err, VectorizeError::Cancelled));
        }

        #[test]
        fn invalid_options_rejected_before_work() {
            let err = Vectorizer::default()
                .with_max_colors(0)
                .vectorize(&two_color())
                .unwrap_err();
            assert!(matches!(
                err,
                VectorizeError::InvalidConfig {
                    field: "max_colors",
                    ..
                }
            ));
        }
    }

    mod vectorize {
        use super::*;

        #[test]
        fn one_layer_per_color() {
            let doc = Vectorizer::default().vectorize(&two_color()).unwrap();
            assert_eq!(doc.layers.len(), 2);
            assert_eq!((doc.width, doc.height), (8, 4));
            for layer in &doc.layers {
                assert_eq!(layer.shapes.len(), 1);
                assert!((layer.shapes[0].area() - 16.0).abs() < 1e-9);
            }
        }

        #[test]
        fn binary_mode_uses_foreground_color() {
            let vectorizer = Vectorizer::new(
                VectorizeOptions::default()
                    .with_mode(ColorMode::Binary)
                    .with_foreground_color(Rgb([9, 8, 7])),
            );
            let doc = vectorizer.vectorize(&two_color()).unwrap();
            assert_eq!(doc.layers.len(), 1);
            assert_eq!(doc.layers[0].color, Rgb([9, 8, 7]));
        }
    }

    mod vectorize_raw {
        use super::*;

        #[test]
        fn malformed_samples_are_decode_errors() {
            let samples = [0u8; 5];
            let raw = RawImage::new(2, 1, PixelFormat::Rgb8, &samples);
            let err = Vectorizer::default().vectorize_raw(&raw).unwrap_err();
            assert!(matches!(err, VectorizeError::Decode(_)));
        }
    }
}
