use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use image::Rgb;
use kurbo::{BezPath, PathEl, Point};

use crate::VectorizeResult;
use crate::config::VectorizeOptions;
use crate::layer::VectorDocument;

/// Options for SVG serialization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvgOptions {
    /// Decimal places for coordinates; `None` prints the shortest exact form.
    pub path_precision: Option<u32>,
    /// Paint a full-canvas rectangle of this color below all layers.
    pub background: Option<Rgb<u8>>,
    /// Outline each layer in its own color with this width, in pixels.
    ///
    /// Fitted paths of neighbouring layers only agree to within the simplify
    /// tolerance, and anti-aliasing leaves hairlines even where they agree.
    /// The stroke closes those seams. Zero (or any non-finite value) disables it.
    pub stroke_width: f64,
    /// Factor between canvas pixels and the SVG's `width`/`height`.
    /// The `viewBox` stays in canvas pixels. Non-positive values mean 1.
    pub scale: f64,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            path_precision: Some(2),
            background: None,
            stroke_width: 1.0,
            scale: 1.0,
        }
    }
}

impl SvgOptions {
    /// Set the coordinate precision.
    pub fn with_path_precision(mut self, precision: Option<u32>) -> Self {
        self.path_precision = precision;
        self
    }

    /// Set the background rectangle color.
    pub fn with_background(mut self, background: Option<Rgb<u8>>) -> Self {
        self.background = background;
        self
    }

    /// Set the seam-closing stroke width; zero disables strokes.
    pub fn with_stroke_width(mut self, width: f64) -> Self {
        self.stroke_width = width;
        self
    }

    /// Set the output scale factor.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    fn effective_stroke(&self) -> Option<f64> {
        (self.stroke_width.is_finite() && self.stroke_width > 0.0).then_some(self.stroke_width)
    }

    fn effective_scale(&self) -> f64 {
        if self.scale.is_finite() && self.scale > 0.0 {
            self.scale
        } else {
            1.0
        }
    }
}

impl From<&VectorizeOptions> for SvgOptions {
    fn from(options: &VectorizeOptions) -> Self {
        Self {
            path_precision: options.path_precision,
            background: None,
            stroke_width: options.stroke_width,
            scale: options.svg_scale,
        }
    }
}

fn hex(Rgb([r, g, b]): Rgb<u8>) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Format a coordinate with at most `precision` decimals, trailing zeros trimmed.
fn format_number(value: f64, precision: Option<u32>) -> String {
    let mut s = match precision {
        Some(p) => format!("{:.*}", p as usize, value),
        None => format!("{value}"),
    };
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

fn push_point(d: &mut String, p: Point, precision: Option<u32>) {
    d.push(' ');
    d.push_str(&format_number(p.x, precision));
    d.push(' ');
    d.push_str(&format_number(p.y, precision));
}

/// SVG path data (`M`, `L`, `Q`, `C`, `Z`) for one or more subpaths.
pub fn path_data<'a>(paths: impl IntoIterator<Item = &'a BezPath>, precision: Option<u32>) -> String {
    let mut d = String::new();
    for path in paths {
        for el in path.elements() {
            if !d.is_empty() {
                d.push(' ');
            }
            match *el {
                PathEl::MoveTo(p) => {
                    d.push('M');
                    push_point(&mut d, p, precision);
                }
                PathEl::LineTo(p) => {
                    d.push('L');
                    push_point(&mut d, p, precision);
                }
                PathEl::QuadTo(p1, p2) => {
                    d.push('Q');
                    push_point(&mut d, p1, precision);
                    push_point(&mut d, p2, precision);
                }
                PathEl::CurveTo(p1, p2, p3) => {
                    d.push('C');
                    push_point(&mut d, p1, precision);
                    push_point(&mut d, p2, precision);
                    push_point(&mut d, p3, precision);
                }
                PathEl::ClosePath => d.push('Z'),
            }
        }
    }
    d
}

impl VectorDocument {
    /// Serialize to an SVG document string.
    pub fn to_svg(&self, options: &SvgOptions) -> String {
        let mut svg = String::new();
        let scale = options.effective_scale();
        writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">"#,
            format_number(self.width as f64 * scale, options.path_precision),
            format_number(self.height as f64 * scale, options.path_precision),
            self.width,
            self.height
        )
        .ok();
        if let Some(bg) = options.background {
            writeln!(
                svg,
                r#"  <rect width="{}" height="{}" fill="{}"/>"#,
                self.width,
                self.height,
                hex(bg)
            )
            .ok();
        }
        let stroke = options.effective_stroke();
        for layer in &self.layers {
            let color = hex(layer.color);
            write!(
                svg,
                r#"  <g fill="{color}" fill-rule="{}""#,
                layer.fill_rule.as_svg()
            )
            .ok();
            if let Some(width) = stroke {
                write!(
                    svg,
                    r#" stroke="{color}" stroke-width="{}" stroke-linejoin="round""#,
                    format_number(width, options.path_precision)
                )
                .ok();
            }
            svg.push_str(">\n");
            for shape in &layer.shapes {
                writeln!(
                    svg,
                    r#"    <path d="{}"/>"#,
                    path_data(shape.subpaths(), options.path_precision)
                )
                .ok();
            }
            svg.push_str("  </g>\n");
        }
        svg.push_str("</svg>\n");
        svg
    }

    /// Write the SVG document to `writer`.
    pub fn write_svg<W: Write>(&self, mut writer: W, options: &SvgOptions) -> VectorizeResult<()> {
        writer.write_all(self.to_svg(options).as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Save the SVG document to the specified path.
    pub fn save_svg(&self, path: impl AsRef<Path>, options: &SvgOptions) -> VectorizeResult<()> {
        let file = std::fs::File::create(path)?;
        self.write_svg(std::io::BufWriter::new(file), options)
    }
}
