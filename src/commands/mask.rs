use pixtrace::{
    ColorMode, VectorizeError, VectorizeOptions, VectorizeResult, build_mask, mask_area,
    quantize, threshold_mask,
};

use crate::cli::MaskCommand;

use super::utils::{derive_variant_path, load_buffer};

/// The main function to run the mask command.
pub fn run(cmd: MaskCommand) -> VectorizeResult<()> {
    let options = VectorizeOptions::from(&cmd.options);
    options.validate()?;
    let buffer = load_buffer(&cmd.input, options.background_color)?;

    let mask = match options.mode {
        ColorMode::Color => {
            let (palette, index_map) = quantize(&buffer, options.max_colors)?;
            if cmd.color_index >= palette.len() {
                return Err(VectorizeError::InvalidConfig {
                    field: "color_index",
                    reason: format!(
                        "palette has {} colors, got index {}",
                        palette.len(),
                        cmd.color_index
                    ),
                });
            }
            build_mask(&index_map, cmd.color_index)
        }
        ColorMode::Binary => threshold_mask(&buffer, options.threshold),
    };

    let output_path = cmd.output.clone().unwrap_or_else(|| {
        derive_variant_path(&cmd.input, &mask_suffix(options.mode, cmd.color_index), "png")
    });
    mask.save(&output_path)?;
    println!(
        "Mask with {} set pixels saved to {}",
        mask_area(&mask),
        output_path.display()
    );

    Ok(())
}

/// File name suffix for a mask; binary mode has no palette index.
fn mask_suffix(mode: ColorMode, color_index: usize) -> String {
    match mode {
        ColorMode::Color => format!("mask-{color_index}"),
        ColorMode::Binary => "mask".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_mask_suffix_has_no_index() {
        assert_eq!(mask_suffix(ColorMode::Binary, 0), "mask");
        assert_eq!(mask_suffix(ColorMode::Binary, 3), "mask");
    }

    #[test]
    fn color_mask_suffix_names_palette_index() {
        assert_eq!(mask_suffix(ColorMode::Color, 2), "mask-2");
    }
}
