use crate::{
    error::{FrameupError, FrameupResult},
    layer::LayerRgba,
};

/// Background removal as a swappable capability: opaque raster in,
/// same-dimension alpha-masked raster out. The core never talks to any
/// vendor API; an external service's output simply enters through this
/// shape.
pub trait CutoutProvider {
    fn cutout(&self, artwork: &LayerRgba) -> FrameupResult<LayerRgba>;
}

/// Runs a provider and enforces the same-dimensions contract on its output.
pub fn checked_cutout(
    provider: &dyn CutoutProvider,
    artwork: &LayerRgba,
) -> FrameupResult<LayerRgba> {
    let out = provider.cutout(artwork)?;
    if out.width != artwork.width || out.height != artwork.height {
        return Err(FrameupError::dimension_mismatch(format!(
            "cutout output is {}x{}, artwork is {}x{}",
            out.width, out.height, artwork.width, artwork.height
        )));
    }
    Ok(out)
}

/// The no-op fallback when no removal service is configured.
pub struct PassThrough;

impl CutoutProvider for PassThrough {
    fn cutout(&self, artwork: &LayerRgba) -> FrameupResult<LayerRgba> {
        Ok(artwork.clone())
    }
}

/// Basic luma threshold: near-white pixels are treated as background and
/// cleared. Crude next to a real matting service, but satisfies the
/// contract for flat-background product shots.
pub struct LumaThreshold {
    pub threshold: u8,
}

impl Default for LumaThreshold {
    fn default() -> Self {
        Self { threshold: 245 }
    }
}

impl CutoutProvider for LumaThreshold {
    fn cutout(&self, artwork: &LayerRgba) -> FrameupResult<LayerRgba> {
        let mut out = artwork.clone();
        for px in out.data.chunks_exact_mut(4) {
            // Rec. 601 luma on the premultiplied channels.
            let luma =
                (u32::from(px[0]) * 299 + u32::from(px[1]) * 587 + u32::from(px[2]) * 114) / 1000;
            if luma >= u32::from(self.threshold) {
                px.copy_from_slice(&[0, 0, 0, 0]);
            }
        }
        Ok(out)
    }
}
