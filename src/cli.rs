use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use image::Rgb;
use pixtrace::config::DEFAULT_THRESHOLD;
use pixtrace::{ColorMode, VectorizeOptions};

/// Command line interface definition.
#[derive(Parser, Debug)]
#[command(author, version, about, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalOptions {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Trace an image into an SVG document
    Trace(TraceCommand),
    /// Export the binary mask of one palette color as a PNG
    Mask(MaskCommand),
    /// Print the quantized palette with pixel counts
    Palette(PaletteCommand),
}

/// Color handling for tracing.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    Color,
    Binary,
}

impl From<ModeArg> for ColorMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Color => ColorMode::Color,
            ModeArg::Binary => ColorMode::Binary,
        }
    }
}

#[derive(Args, Debug)]
pub struct TraceCommand {
    /// Input image path
    pub input: PathBuf,
    /// Output SVG path (defaults to input name with `.svg`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub options: VectorizeArgs,
    /// Decimal places for path coordinates
    #[arg(long = "path-precision", default_value_t = 2, conflicts_with = "no_path_precision")]
    pub path_precision: u32,
    /// Print coordinates at full precision
    #[arg(long = "no-path-precision")]
    pub no_path_precision: bool,
    /// Paint the background color as a full-canvas rectangle
    #[arg(long = "svg-background")]
    pub svg_background: bool,
    /// Same-color outline width that closes seams between layers (0 disables)
    #[arg(long = "stroke-width", default_value_t = 1.0)]
    pub stroke_width: f64,
    /// Multiply the SVG width and height by this factor
    #[arg(long, default_value_t = 1.0)]
    pub scale: f64,
}

#[derive(Args, Debug)]
pub struct MaskCommand {
    /// Input image path
    pub input: PathBuf,
    /// Output path (defaults to `<name>-mask-<index>.png`, or `<name>-mask.png` in binary mode)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Palette index to export (0 is the most frequent color)
    #[arg(long = "color-index", default_value_t = 0)]
    pub color_index: usize,
    #[command(flatten)]
    pub options: VectorizeArgs,
}

#[derive(Args, Debug)]
pub struct PaletteCommand {
    /// Input image path
    pub input: PathBuf,
    /// Maximum number of palette colors
    #[arg(long = "colors", env = "PIXTRACE_COLORS", default_value_t = 8)]
    pub colors: usize,
    /// Color blended under partially transparent pixels (RRGGBB)
    #[arg(long, default_value = "ffffff", value_parser = parse_hex_color)]
    pub background: Rgb<u8>,
}

#[derive(Args, Debug)]
pub struct VectorizeArgs {
    /// Palette-based color layers or a single thresholded layer
    #[arg(long, value_enum, default_value_t = ModeArg::Color)]
    pub mode: ModeArg,
    /// Maximum number of palette colors
    #[arg(long = "colors", env = "PIXTRACE_COLORS", default_value_t = 8)]
    pub colors: usize,
    /// Luminance threshold for binary mode; darker pixels are traced
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: u8,
    /// Color blended under partially transparent pixels (RRGGBB)
    #[arg(long, default_value = "ffffff", value_parser = parse_hex_color)]
    pub background: Rgb<u8>,
    /// Fill color of the binary-mode layer (RRGGBB)
    #[arg(long, default_value = "000000", value_parser = parse_hex_color)]
    pub foreground: Rgb<u8>,
    /// Maximum distance in pixels between traced edges and fitted paths
    #[arg(long, env = "PIXTRACE_TOLERANCE", default_value_t = 0.5)]
    pub tolerance: f64,
    /// Drop contours smaller than this many square pixels
    #[arg(long = "min-area", default_value_t = 0.0)]
    pub min_area: f64,
    /// Smooth through right-angle corners instead of keeping them sharp
    #[arg(long = "no-corners")]
    pub no_corners: bool,
}

impl From<&VectorizeArgs> for VectorizeOptions {
    fn from(args: &VectorizeArgs) -> Self {
        VectorizeOptions::default()
            .with_mode(args.mode.into())
            .with_max_colors(args.colors)
            .with_threshold(args.threshold)
            .with_background_color(args.background)
            .with_foreground_color(args.foreground)
            .with_simplify_tolerance(args.tolerance)
            .with_min_contour_area(args.min_area)
            .with_corner_preserve(!args.no_corners)
    }
}

fn parse_hex_color(value: &str) -> Result<Rgb<u8>, String> {
    let digits = value.strip_prefix('#').unwrap_or(value);
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(format!("color must be RRGGBB hex, got `{value}`"));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map_err(|_| format!("color must be RRGGBB hex, got `{value}`"))
    };
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse_hex_color {
        use super::*;

        #[test]
        fn accepts_with_and_without_hash() {
            assert_eq!(parse_hex_color("ff8000").unwrap(), Rgb([255, 128, 0]));
            assert_eq!(parse_hex_color("#0A0b0C").unwrap(), Rgb([10, 11, 12]));
        }

        #[test]
        fn rejects_bad_input() {
            assert!(parse_hex_color("fff").is_err());
            assert!(parse_hex_color("gg0000").is_err());
            assert!(parse_hex_color("ééé").is_err());
        }
    }

    #[test]
    fn trace_defaults_match_library() {
        let cli = Cli::parse_from(["pixtrace", "trace", "in.png"]);
        let Commands::Trace(cmd) = cli.command else {
            panic!("expected trace command");
        };
        let options = VectorizeOptions::from(&cmd.options);
        assert_eq!(options, VectorizeOptions::default());
        assert_eq!(cmd.path_precision, 2);
        assert_eq!(cmd.stroke_width, options.stroke_width);
        assert_eq!(cmd.scale, options.svg_scale);
    }

    #[test]
    fn verifies_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
