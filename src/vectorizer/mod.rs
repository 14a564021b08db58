use image::GrayImage;
use tracing::debug;

use crate::VectorizeResult;
use crate::config::{SimplifyOptions, TraceOptions};
use crate::contour::{Contour, group_shapes, trace_contours};
use crate::layer::Shape;
use crate::simplify::simplify;

/// A trait representing an algorithm that can turn a mask into a vector representation.
pub trait MaskVectorizer {
    type Options;
    type Output;

    fn vectorize(&self, mask: &GrayImage, options: &Self::Options) -> VectorizeResult<Self::Output>;
}

/// Options for [`PathTracer`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PathTracerOptions {
    pub trace: TraceOptions,
    pub simplify: SimplifyOptions,
}

/// Traces lattice contours and fits them into filled shapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathTracer;

impl MaskVectorizer for PathTracer {
    type Options = PathTracerOptions;
    type Output = Vec<Shape>;

    fn vectorize(&self, mask: &GrayImage, options: &Self::Options) -> VectorizeResult<Vec<Shape>> {
        let contours = trace_contours(mask, &options.trace)?;
        let shapes = shapes_from_contours(&contours, &options.simplify);
        debug!(
            contours = contours.len(),
            shapes = shapes.len(),
            segments = shapes.iter().map(Shape::segment_count).sum::<usize>(),
            "fitted mask shapes"
        );
        Ok(shapes)
    }
}

/// Simplify every contour and nest holes under their outer contour.
pub fn shapes_from_contours(contours: &[Contour], options: &SimplifyOptions) -> Vec<Shape> {
    group_shapes(contours)
        .into_iter()
        .map(|(outer, holes)| Shape {
            outer: simplify(&contours[outer], options),
            holes: holes
                .into_iter()
                .map(|h| simplify(&contours[h], options))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn exact() -> PathTracerOptions {
        PathTracerOptions {
            trace: TraceOptions::default(),
            simplify: SimplifyOptions {
                tolerance: 0.0,
                corner_preserve: true,
            },
        }
    }

    mod vectorize {
        use super::*;

        #[test]
        fn ring_becomes_one_shape_with_hole() {
            let mask = GrayImage::from_fn(10, 10, |x, y| {
                let inner = (2..8).contains(&x) && (2..8).contains(&y);
                Luma([if inner { 0 } else { 255 }])
            });
            let shapes = PathTracer.vectorize(&mask, &exact()).unwrap();
            assert_eq!(shapes.len(), 1);
            assert_eq!(shapes[0].holes.len(), 1);
            assert!((shapes[0].area() - 64.0).abs() < 1e-9);
        }

        #[test]
        fn island_in_hole_is_separate_shape() {
            let mask = GrayImage::from_fn(7, 7, |x, y| {
                let ring = x == 0 || y == 0 || x == 6 || y == 6;
                Luma([if ring || (x, y) == (3, 3) { 255 } else { 0 }])
            });
            let shapes = PathTracer.vectorize(&mask, &exact()).unwrap();
            assert_eq!(shapes.len(), 2);
            assert_eq!(shapes.iter().map(|s| s.holes.len()).sum::<usize>(), 1);
        }

        #[test]
        fn empty_mask_has_no_shapes() {
            let mask = GrayImage::new(5, 5);
            assert!(PathTracer.vectorize(&mask, &exact()).unwrap().is_empty());
        }

        #[test]
        fn zero_sized_mask_is_error() {
            let mask = GrayImage::new(0, 4);
            assert!(PathTracer.vectorize(&mask, &exact()).is_err());
        }
    }
}
