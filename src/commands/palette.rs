use pixtrace::{VectorizeResult, quantize};

use crate::cli::PaletteCommand;

use super::utils::load_buffer;

/// The main function to run the palette command.
pub fn run(cmd: PaletteCommand) -> VectorizeResult<()> {
    let buffer = load_buffer(&cmd.input, cmd.background)?;
    let (palette, index_map) = quantize(&buffer, cmd.colors)?;

    let mut counts = vec![0usize; palette.len()];
    for index in index_map.iter().flatten() {
        counts[*index as usize] += 1;
    }

    for (i, (color, count)) in palette.iter().zip(&counts).enumerate() {
        let [r, g, b] = color.0;
        println!("{i:>3}  #{r:02x}{g:02x}{b:02x}  {count}");
    }

    Ok(())
}
