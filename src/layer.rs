use image::Rgb;
use kurbo::{BezPath, Shape as _};

/// How overlapping subpaths of a shape decide what is inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    /// A point is inside when a ray from it crosses an odd number of edges.
    #[default]
    EvenOdd,
}

impl FillRule {
    /// Attribute value used by SVG `fill-rule`.
    pub fn as_svg(self) -> &'static str {
        match self {
            FillRule::EvenOdd => "evenodd",
        }
    }
}

/// One filled region: an outer boundary and the holes cut out of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub outer: BezPath,
    pub holes: Vec<BezPath>,
}

impl Shape {
    pub fn new(outer: BezPath) -> Self {
        Self {
            outer,
            holes: Vec::new(),
        }
    }

    /// Add a hole path.
    pub fn with_hole(mut self, hole: BezPath) -> Self {
        self.holes.push(hole);
        self
    }

    /// Filled area: outer area minus the hole areas.
    pub fn area(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(|h| h.area().abs()).sum();
        self.outer.area().abs() - holes
    }

    /// Outer and hole subpaths in drawing order.
    pub fn subpaths(&self) -> impl Iterator<Item = &BezPath> {
        std::iter::once(&self.outer).chain(self.holes.iter())
    }

    /// Number of drawn segments over all subpaths.
    pub fn segment_count(&self) -> usize {
        self.subpaths().map(|p| p.segments().count()).sum()
    }
}

/// All shapes filled with one color.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub color: Rgb<u8>,
    pub fill_rule: FillRule,
    pub shapes: Vec<Shape>,
}

impl Layer {
    pub fn new(color: Rgb<u8>, shapes: Vec<Shape>) -> Self {
        Self {
            color,
            fill_rule: FillRule::EvenOdd,
            shapes,
        }
    }

    /// Fill color as `#rrggbb`.
    pub fn hex_color(&self) -> String {
        let Rgb([r, g, b]) = self.color;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// The final vector result: canvas size plus layers drawn in order.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorDocument {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<Layer>,
}

impl VectorDocument {
    /// Number of shapes across all layers.
    pub fn shape_count(&self) -> usize {
        self.layers.iter().map(|l| l.shapes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Stack per-color shape lists into a document.
///
/// Layers keep the input order and colors without shapes are skipped. Layers
/// are not reordered for overlap: callers are expected to pass disjoint regions.
pub fn compose(width: u32, height: u32, per_color: Vec<(Rgb<u8>, Vec<Shape>)>) -> VectorDocument {
    let layers = per_color
        .into_iter()
        .filter(|(_, shapes)| !shapes.is_empty())
        .map(|(color, shapes)| Layer::new(color, shapes))
        .collect();
    VectorDocument {
        width,
        height,
        layers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Rect, Shape as _};

    fn square(x: f64, y: f64, side: f64) -> BezPath {
        Rect::new(x, y, x + side, y + side).to_path(0.1)
    }

    mod compose {
        use super::*;

        #[test]
        fn keeps_input_order() {
            let doc = compose(
                4,
                4,
                vec![
                    (Rgb([1, 1, 1]), vec![Shape::new(square(0.0, 0.0, 2.0))]),
                    (Rgb([2, 2, 2]), vec![Shape::new(square(2.0, 2.0, 2.0))]),
                ],
            );
            let colors: Vec<_> = doc.layers.iter().map(|l| l.color).collect();
            assert_eq!(colors, vec![Rgb([1, 1, 1]), Rgb([2, 2, 2])]);
            assert_eq!((doc.width, doc.height), (4, 4));
        }

        #[test]
        fn skips_colors_without_shapes() {
            let doc = compose(
                2,
                2,
                vec![
                    (Rgb([1, 1, 1]), Vec::new()),
                    (Rgb([2, 2, 2]), vec![Shape::new(square(0.0, 0.0, 1.0))]),
                ],
            );
            assert_eq!(doc.layers.len(), 1);
            assert_eq!(doc.layers[0].color, Rgb([2, 2, 2]));
        }

        #[test]
        fn empty_input_is_empty_document() {
            let doc = compose(3, 5, Vec::new());
            assert!(doc.is_empty());
            assert_eq!(doc.shape_count(), 0);
        }

        #[test]
        fn fill_rule_is_even_odd() {
            let doc = compose(2, 2, vec![(Rgb([0, 0, 0]), vec![Shape::new(square(0.0, 0.0, 2.0))])]);
            assert_eq!(doc.layers[0].fill_rule, FillRule::EvenOdd);
            assert_eq!(doc.layers[0].fill_rule.as_svg(), "evenodd");
        }
    }

    mod shape {
        use super::*;

        #[test]
        fn area_subtracts_holes() {
            let shape = Shape::new(square(0.0, 0.0, 10.0)).with_hole(square(2.0, 2.0, 6.0));
            assert!((shape.area() - 64.0).abs() < 1e-9);
            assert_eq!(shape.subpaths().count(), 2);
            assert_eq!(shape.segment_count(), 8);
        }
    }

    #[test]
    fn hex_color_is_lowercase_padded() {
        let layer = Layer::new(Rgb([255, 10, 0]), Vec::new());
        assert_eq!(layer.hex_color(), "#ff0a00");
    }
}
