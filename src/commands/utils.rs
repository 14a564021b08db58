use std::path::{Path, PathBuf};

use image::Rgb;
use pixtrace::{PixelBuffer, VectorizeResult};
use tracing::debug;

/// Decode an image file and composite it against `background`.
pub fn load_buffer(path: &Path, background: Rgb<u8>) -> VectorizeResult<PixelBuffer> {
    let image = image::open(path)?;
    debug!(path = %path.display(), width = image.width(), height = image.height(), "decoded input");
    PixelBuffer::from_dynamic(&image, background)
}

/// Derive a variant file path by appending a suffix before the extension.
pub fn derive_variant_path(input: &Path, suffix: &str, extension: &str) -> PathBuf {
    let mut derived = input.to_path_buf();
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| suffix.to_string());
    let filename = format!("{}-{}.{}", stem, suffix, extension);
    derived.set_file_name(filename);
    derived
}

/// Derive an SVG file path by changing the extension to "svg".
pub fn derive_svg_path(input: &Path) -> PathBuf {
    let mut path = input.to_path_buf();
    path.set_extension("svg");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_path_keeps_directory() {
        let derived = derive_variant_path(Path::new("dir/photo.jpg"), "mask-2", "png");
        assert_eq!(derived, PathBuf::from("dir/photo-mask-2.png"));
    }

    #[test]
    fn svg_path_swaps_extension() {
        assert_eq!(derive_svg_path(Path::new("a/b.png")), PathBuf::from("a/b.svg"));
    }
}
