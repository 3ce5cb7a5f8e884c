use crate::{
    composite::over,
    error::{FrameupError, FrameupResult},
    layer::LayerRgba,
};

/// Mat-and-frame decoration applied to the artwork before warping: the
/// artwork is flattened onto a mat-colored board with a mat border sized as
/// a fraction of the artwork width, inside a solid frame border.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct MatFrameSpec {
    /// Mat border as a fraction of the artwork width.
    pub mat_pct: f32,
    /// Frame border thickness in pixels.
    pub frame_px: u32,
    pub mat_rgba: [u8; 4],
    pub frame_rgba: [u8; 4],
}

impl Default for MatFrameSpec {
    fn default() -> Self {
        Self {
            mat_pct: 0.08,
            frame_px: 30,
            mat_rgba: [255, 255, 255, 255],
            frame_rgba: [10, 10, 10, 255],
        }
    }
}

impl MatFrameSpec {
    pub fn validate(&self) -> FrameupResult<()> {
        if !self.mat_pct.is_finite() || !(0.0..=1.0).contains(&self.mat_pct) {
            return Err(FrameupError::validation("mat_pct must be in 0..=1"));
        }
        if self.frame_px > 4096 {
            return Err(FrameupError::validation("frame_px must be <= 4096"));
        }
        Ok(())
    }

    pub fn mat_width(&self, artwork_width: u32) -> u32 {
        (artwork_width as f32 * self.mat_pct).round() as u32
    }
}

/// Produces the decorated, fully opaque artwork board. Transparent artwork
/// regions (background-removed cutouts) show the mat color through.
pub fn add_mat_and_frame(artwork: &LayerRgba, spec: &MatFrameSpec) -> FrameupResult<LayerRgba> {
    spec.validate()?;

    let mat = spec.mat_width(artwork.width);
    let inset = spec
        .frame_px
        .checked_add(mat)
        .ok_or_else(|| FrameupError::validation("mat+frame border overflow"))?;
    let total_w = artwork
        .width
        .checked_add(inset * 2)
        .ok_or_else(|| FrameupError::validation("framed width overflow"))?;
    let total_h = artwork
        .height
        .checked_add(inset * 2)
        .ok_or_else(|| FrameupError::validation("framed height overflow"))?;

    let mut board = LayerRgba::solid(total_w, total_h, spec.frame_rgba)?;

    // Mat field inside the frame border.
    let mat_premul = LayerRgba::solid(1, 1, spec.mat_rgba)?.pixel(0, 0);
    for y in spec.frame_px..total_h - spec.frame_px {
        for x in spec.frame_px..total_w - spec.frame_px {
            board.put_pixel(x, y, mat_premul);
        }
    }

    // Artwork flattened onto the mat, centered.
    for y in 0..artwork.height {
        for x in 0..artwork.width {
            let src = artwork.pixel(x, y);
            if src[3] == 0 {
                continue;
            }
            let dst = board.pixel(inset + x, inset + y);
            board.put_pixel(inset + x, inset + y, over(dst, src));
        }
    }

    Ok(board)
}
