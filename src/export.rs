use std::path::Path;

use anyhow::Context as _;
use image::{RgbaImage, imageops};
use kurbo::Point;

use crate::{
    error::{FrameupError, FrameupResult},
    layer::LayerRgba,
};

/// One requested output size/format. Purely descriptive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ExportVariant {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub format: OutputFormat,
}

impl ExportVariant {
    pub fn validate(&self) -> FrameupResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameupError::validation(
                "export variant width/height must be > 0",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// How to reconcile the composite's aspect ratio with the variant's.
/// Aspect is never stretched; the choice is what to sacrifice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CropPolicy {
    /// Crop to the target aspect around the focal point (template's
    /// designated focal point if present, else the geometric center).
    #[default]
    CenterCrop,
    /// Letterbox onto a white canvas instead of cropping.
    Pad,
}

const PAD_FILL: [u8; 4] = [255, 255, 255, 255];

/// Produces the variant's raster from a finished composite: aspect-aware
/// crop or pad, then Lanczos3 resample to the exact target dimensions.
pub fn resize_to_variant(
    composite: &LayerRgba,
    variant: &ExportVariant,
    focal_point: Option<Point>,
    policy: CropPolicy,
) -> FrameupResult<LayerRgba> {
    variant.validate()?;

    let straight = composite.to_straight_rgba8();
    let img = RgbaImage::from_raw(composite.width, composite.height, straight)
        .ok_or_else(|| FrameupError::validation("composite buffer is inconsistent"))?;

    let out = match policy {
        CropPolicy::CenterCrop => {
            let (cx, cy, cw, ch) = crop_rect(
                composite.width,
                composite.height,
                variant.width,
                variant.height,
                focal_point,
            );
            let cropped = imageops::crop_imm(&img, cx, cy, cw, ch).to_image();
            imageops::resize(
                &cropped,
                variant.width,
                variant.height,
                imageops::FilterType::Lanczos3,
            )
        }
        CropPolicy::Pad => pad_to_variant(&img, variant),
    };

    debug_assert_eq!(out.dimensions(), (variant.width, variant.height));
    LayerRgba::from_straight_rgba8(variant.width, variant.height, out.into_raw())
}

/// Largest target-aspect rectangle inside the source, centered on the focal
/// point and clamped to stay in bounds.
fn crop_rect(
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
    focal_point: Option<Point>,
) -> (u32, u32, u32, u32) {
    let src_aspect = f64::from(src_w) / f64::from(src_h);
    let dst_aspect = f64::from(dst_w) / f64::from(dst_h);

    let (cw, ch) = if src_aspect > dst_aspect {
        let cw = (f64::from(src_h) * dst_aspect).round().max(1.0) as u32;
        (cw.min(src_w), src_h)
    } else {
        let ch = (f64::from(src_w) / dst_aspect).round().max(1.0) as u32;
        (src_w, ch.min(src_h))
    };

    let focal = focal_point.unwrap_or_else(|| {
        Point::new(f64::from(src_w) / 2.0, f64::from(src_h) / 2.0)
    });
    let cx = (focal.x - f64::from(cw) / 2.0)
        .round()
        .clamp(0.0, f64::from(src_w - cw)) as u32;
    let cy = (focal.y - f64::from(ch) / 2.0)
        .round()
        .clamp(0.0, f64::from(src_h - ch)) as u32;

    (cx, cy, cw, ch)
}

fn pad_to_variant(img: &RgbaImage, variant: &ExportVariant) -> RgbaImage {
    let (src_w, src_h) = img.dimensions();
    let scale = (f64::from(variant.width) / f64::from(src_w))
        .min(f64::from(variant.height) / f64::from(src_h));
    let fit_w = ((f64::from(src_w) * scale).round().max(1.0) as u32).min(variant.width);
    let fit_h = ((f64::from(src_h) * scale).round().max(1.0) as u32).min(variant.height);

    let fitted = imageops::resize(img, fit_w, fit_h, imageops::FilterType::Lanczos3);
    let mut canvas = RgbaImage::from_pixel(variant.width, variant.height, image::Rgba(PAD_FILL));
    let ox = i64::from((variant.width - fit_w) / 2);
    let oy = i64::from((variant.height - fit_h) / 2);
    imageops::overlay(&mut canvas, &fitted, ox, oy);
    canvas
}

/// Encodes a finished layer to disk. JPEG flattens alpha onto white since
/// the format has no transparency.
pub fn write_layer(path: &Path, layer: &LayerRgba, format: OutputFormat) -> FrameupResult<()> {
    let straight = layer.to_straight_rgba8();
    match format {
        OutputFormat::Png => {
            image::save_buffer_with_format(
                path,
                &straight,
                layer.width,
                layer.height,
                image::ExtendedColorType::Rgba8,
                image::ImageFormat::Png,
            )
            .with_context(|| format!("write png '{}'", path.display()))?;
        }
        OutputFormat::Jpeg => {
            let mut rgb = Vec::with_capacity(straight.len() / 4 * 3);
            for px in straight.chunks_exact(4) {
                let a = u16::from(px[3]);
                for c in 0..3 {
                    rgb.push(((u16::from(px[c]) * a + 255 * (255 - a) + 127) / 255) as u8);
                }
            }
            image::save_buffer_with_format(
                path,
                &rgb,
                layer.width,
                layer.height,
                image::ExtendedColorType::Rgb8,
                image::ImageFormat::Jpeg,
            )
            .with_context(|| format!("write jpeg '{}'", path.display()))?;
        }
    }
    Ok(())
}
