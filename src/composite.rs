use crate::{
    error::{FrameupError, FrameupResult},
    layer::LayerRgba,
    shadow::LightingMask,
};

pub type PremulRgba8 = [u8; 4];

/// Standard premultiplied `over`.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255(u16::from(dst[i]), inv));
    }
    out
}

pub fn over_in_place(dst: &mut LayerRgba, src: &LayerRgba) -> FrameupResult<()> {
    if dst.width != src.width || dst.height != src.height {
        return Err(FrameupError::dimension_mismatch(format!(
            "over expects equal layer dimensions, got {}x{} over {}x{}",
            src.width, src.height, dst.width, dst.height
        )));
    }
    for (d, s) in dst.data.chunks_exact_mut(4).zip(src.data.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Multiplies the warped artwork's color channels by the lighting gain.
/// Alpha is untouched; premultiplication is preserved by clamping each
/// channel to the pixel's alpha.
pub fn apply_lighting(layer: &mut LayerRgba, mask: &LightingMask) -> FrameupResult<()> {
    if layer.width != mask.width || layer.height != mask.height {
        return Err(FrameupError::dimension_mismatch(
            "lighting mask dimensions must match the warped layer",
        ));
    }
    for y in 0..layer.height {
        for x in 0..layer.width {
            let mut px = layer.pixel(x, y);
            if px[3] == 0 {
                continue;
            }
            let g = mask.gain_at(x, y);
            if g == 1.0 {
                continue;
            }
            let alpha = px[3];
            for c in px.iter_mut().take(3) {
                let lit = (f32::from(*c) * g + 0.5).clamp(0.0, 255.0) as u8;
                *c = lit.min(alpha);
            }
            layer.put_pixel(x, y, px);
        }
    }
    Ok(())
}

/// Merges one mockup, back to front: background, drop shadow, lit artwork,
/// then any occluding template elements (frame lip, glass glare). Pure
/// function of its inputs; absent shadow/lighting/occlusion steps are
/// identity passes. Output dimensions always equal the background's.
pub fn composite_mockup(
    background: &LayerRgba,
    shadow: Option<&LayerRgba>,
    warped: &LayerRgba,
    lighting: Option<&LightingMask>,
    occlusion: Option<&LayerRgba>,
) -> FrameupResult<LayerRgba> {
    let mut out = background.clone();

    if let Some(shadow) = shadow {
        over_in_place(&mut out, shadow)?;
    }

    if let Some(mask) = lighting {
        let mut lit = warped.clone();
        apply_lighting(&mut lit, mask)?;
        over_in_place(&mut out, &lit)?;
    } else {
        over_in_place(&mut out, warped)?;
    }

    if let Some(occlusion) = occlusion {
        over_in_place(&mut out, occlusion)?;
    }

    Ok(out)
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_transparent_src_is_noop() {
        let dst = [10, 20, 30, 255];
        assert_eq!(over(dst, [255, 255, 255, 0]), dst);
    }

    #[test]
    fn over_opaque_src_replaces_dst() {
        let src = [255, 0, 0, 255];
        assert_eq!(over([0, 0, 0, 255], src), src);
    }

    #[test]
    fn over_half_alpha_blends() {
        let out = over([0, 0, 0, 255], [128, 0, 0, 128]);
        assert_eq!(out[3], 255);
        assert_eq!(out[0], 128);
    }

    #[test]
    fn over_in_place_rejects_mismatched_layers() {
        let mut dst = LayerRgba::new_transparent(2, 2).unwrap();
        let src = LayerRgba::new_transparent(3, 2).unwrap();
        assert!(matches!(
            over_in_place(&mut dst, &src).unwrap_err(),
            FrameupError::DimensionMismatch(_)
        ));
    }

    #[test]
    fn lighting_gain_scales_color_not_alpha() {
        let mut layer = LayerRgba::solid(2, 1, [200, 100, 50, 255]).unwrap();
        let mask = LightingMask {
            width: 2,
            height: 1,
            gain: vec![0.5, 1.0],
        };
        apply_lighting(&mut layer, &mask).unwrap();
        assert_eq!(layer.pixel(0, 0), [100, 50, 25, 255]);
        assert_eq!(layer.pixel(1, 0), [200, 100, 50, 255]);
    }

    #[test]
    fn lighting_gain_never_exceeds_alpha() {
        let mut layer = LayerRgba::new_transparent(1, 1).unwrap();
        layer.put_pixel(0, 0, [100, 100, 100, 128]);
        let mask = LightingMask {
            width: 1,
            height: 1,
            gain: vec![2.0],
        };
        apply_lighting(&mut layer, &mask).unwrap();
        let px = layer.pixel(0, 0);
        assert!(px[0] <= px[3]);
        assert_eq!(px[3], 128);
    }

    #[test]
    fn absent_occlusion_equals_transparent_occlusion() {
        let background = LayerRgba::solid(4, 4, [20, 30, 40, 255]).unwrap();
        let warped = LayerRgba::solid(4, 4, [255, 0, 0, 255]).unwrap();
        let transparent = LayerRgba::new_transparent(4, 4).unwrap();

        let without = composite_mockup(&background, None, &warped, None, None).unwrap();
        let with = composite_mockup(&background, None, &warped, None, Some(&transparent)).unwrap();
        assert_eq!(without, with);
    }

    #[test]
    fn occlusion_renders_above_artwork() {
        let background = LayerRgba::solid(2, 2, [20, 30, 40, 255]).unwrap();
        let warped = LayerRgba::solid(2, 2, [255, 0, 0, 255]).unwrap();
        let mut occlusion = LayerRgba::new_transparent(2, 2).unwrap();
        occlusion.put_pixel(0, 0, [0, 0, 255, 255]);

        let out = composite_mockup(&background, None, &warped, None, Some(&occlusion)).unwrap();
        assert_eq!(out.pixel(0, 0), [0, 0, 255, 255]);
        assert_eq!(out.pixel(1, 1), [255, 0, 0, 255]);
    }

    #[test]
    fn shadow_sits_beneath_artwork() {
        let background = LayerRgba::solid(2, 1, [200, 200, 200, 255]).unwrap();
        let mut shadow = LayerRgba::new_transparent(2, 1).unwrap();
        shadow.put_pixel(0, 0, [0, 0, 0, 128]);
        shadow.put_pixel(1, 0, [0, 0, 0, 128]);
        let mut warped = LayerRgba::new_transparent(2, 1).unwrap();
        warped.put_pixel(0, 0, [255, 0, 0, 255]);

        let out = composite_mockup(&background, Some(&shadow), &warped, None, None).unwrap();
        // Artwork covers the shadow where present.
        assert_eq!(out.pixel(0, 0), [255, 0, 0, 255]);
        // Bare shadow darkens the background.
        assert!(out.pixel(1, 0)[0] < 200);
    }
}
