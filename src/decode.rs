use std::path::Path;

use crate::{
    error::{FrameupError, FrameupResult},
    layer::LayerRgba,
};

/// Decodes an artwork image into a premultiplied layer.
///
/// A raster with an alpha channel (e.g. output of a background-removal
/// service) is accepted as-is; opaque rasters come back fully opaque.
pub fn decode_artwork(bytes: &[u8]) -> FrameupResult<LayerRgba> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| FrameupError::unsupported_format(format!("decode artwork: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    LayerRgba::from_straight_rgba8(width, height, rgba.into_raw())
}

pub fn load_artwork(path: &Path) -> FrameupResult<LayerRgba> {
    let bytes = std::fs::read(path).map_err(|e| {
        FrameupError::unsupported_format(format!("read '{}': {e}", path.display()))
    })?;
    decode_artwork(&bytes)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn decode_png_dimensions_and_premul() {
        let img = image::RgbaImage::from_raw(1, 1, vec![100u8, 50, 200, 128]).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let layer = decode_artwork(&buf).unwrap();
        assert_eq!((layer.width, layer.height), (1, 1));
        assert_eq!(layer.pixel(0, 0)[3], 128);
        assert_eq!(layer.pixel(0, 0)[0], ((100u16 * 128 + 127) / 255) as u8);
    }

    #[test]
    fn garbage_is_unsupported_format() {
        let err = decode_artwork(b"not an image").unwrap_err();
        assert!(matches!(err, FrameupError::UnsupportedFormat(_)));
    }
}
