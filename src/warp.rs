use kurbo::Point;

use crate::{
    error::{FrameupError, FrameupResult},
    geometry::{CornerQuad, Homography},
    layer::LayerRgba,
};

/// Subsample offsets for coverage anti-aliasing. A destination pixel's alpha
/// is the fraction of these that back-map inside the artwork, so quad edges
/// come out with fractional coverage instead of a binary inside/outside test.
const SUBSAMPLES: [(f64, f64); 4] = [(0.25, 0.25), (0.75, 0.25), (0.25, 0.75), (0.75, 0.75)];

/// Warps the artwork into background pixel space, producing a layer sized to
/// the background whose alpha marks the artwork silhouette.
///
/// Inverse mapping: each destination subsample inside the quad's bounding box
/// is taken back through the inverse homography and bilinear-sampled from the
/// premultiplied artwork; back-mapped coordinates outside `[0,W)x[0,H)`
/// contribute transparency.
pub fn warp_into_background(
    artwork: &LayerRgba,
    quad: &CornerQuad,
    bg_width: u32,
    bg_height: u32,
) -> FrameupResult<LayerRgba> {
    let forward = Homography::rect_to_quad(f64::from(artwork.width), f64::from(artwork.height), quad)?;
    let inv = forward.inverse()?;

    let mut out = LayerRgba::new_transparent(bg_width, bg_height)?;

    let bb = quad.bounding_box();
    if !bb.x0.is_finite() || !bb.y0.is_finite() {
        return Err(FrameupError::degenerate_geometry(
            "destination quad has no finite bounds",
        ));
    }
    let x0 = bb.x0.floor().max(0.0) as u32;
    let y0 = bb.y0.floor().max(0.0) as u32;
    let x1 = (bb.x1.ceil().max(0.0) as u32).min(bg_width);
    let y1 = (bb.y1.ceil().max(0.0) as u32).min(bg_height);

    let src_w = f64::from(artwork.width);
    let src_h = f64::from(artwork.height);

    for y in y0..y1 {
        for x in x0..x1 {
            let mut acc = [0.0f32; 4];
            for (ox, oy) in SUBSAMPLES {
                let dst = Point::new(f64::from(x) + ox, f64::from(y) + oy);
                let src = inv.apply(dst);
                if !src.x.is_finite() || !src.y.is_finite() {
                    continue;
                }
                if src.x < 0.0 || src.x >= src_w || src.y < 0.0 || src.y >= src_h {
                    continue;
                }
                let px = bilinear_premul(artwork, src.x, src.y);
                for c in 0..4 {
                    acc[c] += px[c];
                }
            }
            if acc[3] > 0.0 {
                let n = SUBSAMPLES.len() as f32;
                out.put_pixel(
                    x,
                    y,
                    [
                        quantize(acc[0] / n),
                        quantize(acc[1] / n),
                        quantize(acc[2] / n),
                        quantize(acc[3] / n),
                    ],
                );
            }
        }
    }

    Ok(out)
}

/// Bilinear sample at a continuous source coordinate, pixel centers at
/// half-integer positions. Neighbor fetches clamp to the image edge; the
/// caller has already rejected coordinates outside the source rectangle.
fn bilinear_premul(layer: &LayerRgba, sx: f64, sy: f64) -> [f32; 4] {
    let max_x = f64::from(layer.width - 1);
    let max_y = f64::from(layer.height - 1);
    let fx = (sx - 0.5).clamp(0.0, max_x);
    let fy = (sy - 0.5).clamp(0.0, max_y);

    let x0 = fx.floor() as u32;
    let y0 = fy.floor() as u32;
    let x1 = (x0 + 1).min(layer.width - 1);
    let y1 = (y0 + 1).min(layer.height - 1);
    let tx = (fx - f64::from(x0)) as f32;
    let ty = (fy - f64::from(y0)) as f32;

    let p00 = layer.pixel(x0, y0);
    let p10 = layer.pixel(x1, y0);
    let p01 = layer.pixel(x0, y1);
    let p11 = layer.pixel(x1, y1);

    let mut out = [0.0f32; 4];
    for c in 0..4 {
        let top = f32::from(p00[c]) * (1.0 - tx) + f32::from(p10[c]) * tx;
        let bot = f32::from(p01[c]) * (1.0 - tx) + f32::from(p11[c]) * tx;
        out[c] = top * (1.0 - ty) + bot * ty;
    }
    out
}

fn quantize(v: f32) -> u8 {
    (v + 0.5).clamp(0.0, 255.0) as u8
}
