use image::Rgb;

use crate::{VectorizeError, VectorizeResult};

/// Largest palette the quantizer will produce; indices must fit in a `u8`.
pub const MAX_PALETTE_SIZE: usize = 256;

/// Binary-mode luminance threshold used when none is given.
pub const DEFAULT_THRESHOLD: u8 = 180;

/// Largest number of decimal places accepted for SVG coordinates.
pub const MAX_PATH_PRECISION: u32 = 8;

/// How the pixel buffer is split into masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// Quantize to a palette and trace one layer per palette color.
    #[default]
    Color,
    /// Threshold luminance and trace a single foreground layer.
    Binary,
}

/// Options for the contour tracer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceOptions {
    /// Contours whose absolute area (in square pixels) is below this are dropped.
    pub min_contour_area: f64,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            min_contour_area: 0.0,
        }
    }
}

/// Options for the path simplifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplifyOptions {
    /// Maximum distance, in pixels, between a contour point and the fitted path.
    pub tolerance: f64,
    /// Keep right-angle corners sharp instead of fitting curves through them.
    pub corner_preserve: bool,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.5,
            corner_preserve: true,
        }
    }
}

/// Full configuration for one vectorization invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorizeOptions {
    pub mode: ColorMode,
    /// Upper bound on the palette size in color mode.
    pub max_colors: usize,
    /// Luminance threshold for binary mode; pixels strictly darker are traced.
    /// Defaults to 180 so that mid-gray line art is kept.
    pub threshold: u8,
    /// Color that partially transparent pixels are blended against.
    pub background_color: Rgb<u8>,
    /// Fill color of the single layer produced in binary mode.
    pub foreground_color: Rgb<u8>,
    pub simplify_tolerance: f64,
    pub min_contour_area: f64,
    pub corner_preserve: bool,
    /// Decimal places for SVG coordinates (`None` prints full precision).
    pub path_precision: Option<u32>,
    /// Width of the same-color stroke drawn around each SVG layer; 0 disables it.
    pub stroke_width: f64,
    /// Factor applied to the SVG's `width` and `height`.
    pub svg_scale: f64,
}

impl Default for VectorizeOptions {
    fn default() -> Self {
        Self {
            mode: ColorMode::Color,
            max_colors: 8,
            threshold: DEFAULT_THRESHOLD,
            background_color: Rgb([255, 255, 255]),
            foreground_color: Rgb([0, 0, 0]),
            simplify_tolerance: SimplifyOptions::default().tolerance,
            min_contour_area: TraceOptions::default().min_contour_area,
            corner_preserve: true,
            path_precision: Some(2),
            stroke_width: 1.0,
            svg_scale: 1.0,
        }
    }
}

impl VectorizeOptions {
    /// Set the color mode.
    pub fn with_mode(mut self, mode: ColorMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the maximum palette size.
    pub fn with_max_colors(mut self, max_colors: usize) -> Self {
        self.max_colors = max_colors;
        self
    }

    /// Set the binary-mode luminance threshold.
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the background color used for alpha compositing.
    pub fn with_background_color(mut self, color: Rgb<u8>) -> Self {
        self.background_color = color;
        self
    }

    /// Set the binary-mode fill color.
    pub fn with_foreground_color(mut self, color: Rgb<u8>) -> Self {
        self.foreground_color = color;
        self
    }

    /// Set the simplification tolerance in pixels.
    pub fn with_simplify_tolerance(mut self, tolerance: f64) -> Self {
        self.simplify_tolerance = tolerance;
        self
    }

    /// Set the minimum contour area in square pixels.
    pub fn with_min_contour_area(mut self, area: f64) -> Self {
        self.min_contour_area = area;
        self
    }

    /// Enable or disable right-angle corner preservation.
    pub fn with_corner_preserve(mut self, enabled: bool) -> Self {
        self.corner_preserve = enabled;
        self
    }

    /// Set the SVG coordinate precision.
    pub fn with_path_precision(mut self, precision: Option<u32>) -> Self {
        self.path_precision = precision;
        self
    }

    /// Set the SVG stroke width in pixels.
    pub fn with_stroke_width(mut self, width: f64) -> Self {
        self.stroke_width = width;
        self
    }

    /// Set the SVG output scale.
    pub fn with_svg_scale(mut self, scale: f64) -> Self {
        self.svg_scale = scale;
        self
    }

    pub fn trace_options(&self) -> TraceOptions {
        TraceOptions {
            min_contour_area: self.min_contour_area,
        }
    }

    pub fn simplify_options(&self) -> SimplifyOptions {
        SimplifyOptions {
            tolerance: self.simplify_tolerance,
            corner_preserve: self.corner_preserve,
        }
    }

    /// Check every field against its accepted range.
    pub fn validate(&self) -> VectorizeResult<()> {
        validate_max_colors(self.max_colors)?;
        validate_non_negative("simplify_tolerance", self.simplify_tolerance)?;
        validate_non_negative("min_contour_area", self.min_contour_area)?;
        validate_non_negative("stroke_width", self.stroke_width)?;
        if !self.svg_scale.is_finite() || self.svg_scale <= 0.0 {
            return Err(VectorizeError::invalid_config(
                "svg_scale",
                format!("must be a finite value > 0, got {}", self.svg_scale),
            ));
        }
        if let Some(precision) = self.path_precision {
            if precision > MAX_PATH_PRECISION {
                return Err(VectorizeError::invalid_config(
                    "path_precision",
                    format!("must be at most {MAX_PATH_PRECISION}, got {precision}"),
                ));
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_max_colors(max_colors: usize) -> VectorizeResult<()> {
    if max_colors == 0 || max_colors > MAX_PALETTE_SIZE {
        return Err(VectorizeError::invalid_config(
            "max_colors",
            format!("must be between 1 and {MAX_PALETTE_SIZE}, got {max_colors}"),
        ));
    }
    Ok(())
}

pub(crate) fn validate_non_negative(field: &'static str, value: f64) -> VectorizeResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(VectorizeError::invalid_config(
            field,
            format!("must be a finite value >= 0, got {value}"),
        ));
    }
    Ok(())
}
