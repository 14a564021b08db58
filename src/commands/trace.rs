use pixtrace::{VectorizeOptions, VectorizeResult, Vectorizer};

use crate::cli::TraceCommand;

use super::utils::{derive_svg_path, load_buffer};

/// The main function to run the trace command.
pub fn run(cmd: TraceCommand) -> VectorizeResult<()> {
    let path_precision = (!cmd.no_path_precision).then_some(cmd.path_precision);
    let options = VectorizeOptions::from(&cmd.options)
        .with_path_precision(path_precision)
        .with_stroke_width(cmd.stroke_width)
        .with_svg_scale(cmd.scale);
    let vectorizer = Vectorizer::new(options);

    let buffer = load_buffer(&cmd.input, vectorizer.options().background_color)?;
    let document = vectorizer.vectorize(&buffer)?;

    let mut svg_options = vectorizer.svg_options();
    if cmd.svg_background {
        svg_options = svg_options.with_background(Some(vectorizer.options().background_color));
    }

    let output_path = cmd
        .output
        .clone()
        .unwrap_or_else(|| derive_svg_path(&cmd.input));
    document.save_svg(&output_path, &svg_options)?;
    println!(
        "SVG with {} layers saved to {}",
        document.layers.len(),
        output_path.display()
    );

    Ok(())
}
