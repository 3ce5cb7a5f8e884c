use std::{
    collections::{HashMap, VecDeque, hash_map::DefaultHasher},
    hash::{Hash, Hasher},
    sync::{Arc, Mutex},
};

use kurbo::Vec2;

use crate::{
    blur::blur_mask,
    error::{FrameupError, FrameupResult},
    geometry::CornerQuad,
    layer::LayerRgba,
};

/// Drop shadow parameters for one template. The silhouette is offset by
/// `offset`, blurred by `blur_radius` and rendered as semi-transparent black
/// beneath the artwork.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ShadowSpec {
    pub offset: Vec2,
    pub blur_radius: u32,
    #[serde(default = "default_shadow_opacity")]
    pub opacity: f32,
}

fn default_shadow_opacity() -> f32 {
    0.35
}

impl ShadowSpec {
    pub fn validate(&self) -> FrameupResult<()> {
        if !self.offset.x.is_finite() || !self.offset.y.is_finite() {
            return Err(FrameupError::validation("shadow offset must be finite"));
        }
        if self.blur_radius > 256 {
            return Err(FrameupError::validation("shadow blur_radius must be <= 256"));
        }
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(FrameupError::validation("shadow opacity must be in 0..=1"));
        }
        Ok(())
    }
}

/// Ambient light model for one template. `direction` points the way the
/// light travels across the wall; its magnitude is the gradient strength
/// (0.3 means a ±15% swing across the opening). `intensity` is the overall
/// gain, 1.0 neutral.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct LightingSpec {
    pub direction: Vec2,
    pub intensity: f32,
}

impl Default for LightingSpec {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl LightingSpec {
    pub const NEUTRAL: Self = Self {
        direction: Vec2::new(0.0, 0.0),
        intensity: 1.0,
    };

    pub fn validate(&self) -> FrameupResult<()> {
        if !self.direction.x.is_finite() || !self.direction.y.is_finite() {
            return Err(FrameupError::validation("light direction must be finite"));
        }
        if !self.intensity.is_finite() || self.intensity <= 0.0 || self.intensity > 4.0 {
            return Err(FrameupError::validation(
                "light intensity must be finite and in (0, 4]",
            ));
        }
        Ok(())
    }
}

/// Per-pixel multiplicative gain applied to the warped artwork's color
/// channels, centered at 1.0 for neutral lighting.
#[derive(Clone, Debug)]
pub struct LightingMask {
    pub width: u32,
    pub height: u32,
    pub gain: Vec<f32>,
}

impl LightingMask {
    #[inline]
    pub fn gain_at(&self, x: u32, y: u32) -> f32 {
        self.gain[(y * self.width + x) as usize]
    }
}

/// Builds the lighting gain plane for a template: a linear gradient along
/// the light direction across the destination quad, scaled by intensity.
/// Zero direction gives a flat `intensity` plane; intensity 1.0 with zero
/// direction is exactly neutral.
pub fn lighting_mask(
    spec: &LightingSpec,
    quad: &CornerQuad,
    width: u32,
    height: u32,
) -> FrameupResult<LightingMask> {
    spec.validate()?;

    let len = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| FrameupError::validation("lighting mask size overflow"))?;

    let strength = spec.direction.hypot();
    if strength < 1e-9 {
        return Ok(LightingMask {
            width,
            height,
            gain: vec![spec.intensity; len],
        });
    }

    let u = spec.direction / strength;
    let center = quad.center();
    let projections = quad
        .corners
        .map(|c| u.dot(Vec2::new(c.x - center.x, c.y - center.y)));
    let lo = projections.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = projections.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = (hi - lo).max(1e-9);

    let mut gain = vec![1.0f32; len];
    for y in 0..height {
        for x in 0..width {
            let d = Vec2::new(f64::from(x) + 0.5 - center.x, f64::from(y) + 0.5 - center.y);
            // Normalized position along the light direction, -0.5 at the lit
            // edge of the opening, +0.5 at the far edge.
            let t = (u.dot(d) / span).clamp(-0.5, 0.5);
            let g = spec.intensity * (1.0 - strength as f32 * t as f32);
            gain[(y * width + x) as usize] = g.clamp(0.0, 2.0);
        }
    }

    Ok(LightingMask {
        width,
        height,
        gain,
    })
}

/// Renders the drop shadow for a silhouette: offset, Gaussian blur, then
/// semi-transparent black. Output layer matches the silhouette dimensions.
pub fn shadow_layer(
    silhouette: &[u8],
    width: u32,
    height: u32,
    spec: &ShadowSpec,
) -> FrameupResult<LayerRgba> {
    spec.validate()?;
    let expected = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| FrameupError::validation("silhouette size overflow"))?;
    if silhouette.len() != expected {
        return Err(FrameupError::validation(
            "silhouette length must be width*height",
        ));
    }

    let dx = spec.offset.x.round() as i64;
    let dy = spec.offset.y.round() as i64;

    let mut shifted = vec![0u8; expected];
    for y in 0..i64::from(height) {
        let sy = y - dy;
        if sy < 0 || sy >= i64::from(height) {
            continue;
        }
        for x in 0..i64::from(width) {
            let sx = x - dx;
            if sx < 0 || sx >= i64::from(width) {
                continue;
            }
            shifted[(y * i64::from(width) + x) as usize] =
                silhouette[(sy * i64::from(width) + sx) as usize];
        }
    }

    let blurred = if spec.blur_radius > 0 {
        blur_mask(
            &shifted,
            width,
            height,
            spec.blur_radius,
            spec.blur_radius as f32 / 2.0,
        )?
    } else {
        shifted
    };

    let mut layer = LayerRgba::new_transparent(width, height)?;
    for (px, &m) in layer.data.chunks_exact_mut(4).zip(blurred.iter()) {
        // Premultiplied black: rgb stays 0, alpha carries the shadow.
        px[3] = ((f32::from(m) * spec.opacity) + 0.5).clamp(0.0, 255.0) as u8;
    }
    Ok(layer)
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct CacheKey {
    template: String,
    silhouette: u64,
}

/// Opt-in cache for shadow layers keyed by template and a digest of the
/// warped silhouette. Two requests share an entry only when their
/// silhouettes are byte-identical, so an alpha-masked artwork never reuses
/// a shadow cast by a different outline. Bounded LRU, never an unbounded
/// memoization.
pub struct SilhouetteCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    map: HashMap<CacheKey, Arc<LayerRgba>>,
    order: VecDeque<CacheKey>,
}

impl SilhouetteCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_or_insert_with(
        &self,
        template: &str,
        silhouette: &[u8],
        build: impl FnOnce() -> FrameupResult<LayerRgba>,
    ) -> FrameupResult<Arc<LayerRgba>> {
        let key = CacheKey {
            template: template.to_string(),
            silhouette: silhouette_digest(silhouette),
        };

        {
            let mut inner = self.inner.lock().expect("cache lock poisoned");
            if let Some(hit) = inner.map.get(&key).cloned() {
                inner.order.retain(|k| k != &key);
                inner.order.push_back(key);
                return Ok(hit);
            }
        }

        // Build outside the lock; concurrent misses may race and both build,
        // which is correct because the synthesis is deterministic.
        let built = Arc::new(build()?);

        let mut inner = self.inner.lock().expect("cache lock poisoned");
        if !inner.map.contains_key(&key) {
            while inner.map.len() >= self.capacity {
                let Some(evict) = inner.order.pop_front() else {
                    break;
                };
                inner.map.remove(&evict);
            }
            inner.map.insert(key.clone(), built.clone());
            inner.order.push_back(key);
        }
        Ok(built)
    }
}

fn silhouette_digest(mask: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    mask.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    fn square_quad() -> CornerQuad {
        CornerQuad::new([
            Point::new(2.0, 2.0),
            Point::new(6.0, 2.0),
            Point::new(6.0, 6.0),
            Point::new(2.0, 6.0),
        ])
        .unwrap()
    }

    #[test]
    fn neutral_lighting_is_exactly_one() {
        let mask = lighting_mask(&LightingSpec::NEUTRAL, &square_quad(), 8, 8).unwrap();
        assert!(mask.gain.iter().all(|&g| g == 1.0));
    }

    #[test]
    fn gradient_darkens_along_direction() {
        let spec = LightingSpec {
            direction: Vec2::new(0.5, 0.0),
            intensity: 1.0,
        };
        let mask = lighting_mask(&spec, &square_quad(), 8, 8).unwrap();
        assert!(mask.gain_at(0, 4) > mask.gain_at(7, 4));
        let mid = mask.gain_at(4, 4);
        assert!((mid - 1.0).abs() < 0.2);
    }

    #[test]
    fn intensity_scales_flat_plane() {
        let spec = LightingSpec {
            direction: Vec2::new(0.0, 0.0),
            intensity: 1.2,
        };
        let mask = lighting_mask(&spec, &square_quad(), 4, 4).unwrap();
        assert!(mask.gain.iter().all(|&g| (g - 1.2).abs() < 1e-6));
    }

    #[test]
    fn bad_lighting_is_rejected() {
        let spec = LightingSpec {
            direction: Vec2::new(f64::NAN, 0.0),
            intensity: 1.0,
        };
        assert!(lighting_mask(&spec, &square_quad(), 4, 4).is_err());
        let spec = LightingSpec {
            direction: Vec2::new(0.0, 0.0),
            intensity: 0.0,
        };
        assert!(spec.validate().is_err());
    }

    fn block_silhouette(w: u32, h: u32) -> Vec<u8> {
        let mut s = vec![0u8; (w * h) as usize];
        for y in 2..4u32 {
            for x in 2..4u32 {
                s[(y * w + x) as usize] = 255;
            }
        }
        s
    }

    #[test]
    fn shadow_is_offset_silhouette() {
        let spec = ShadowSpec {
            offset: Vec2::new(2.0, 1.0),
            blur_radius: 0,
            opacity: 1.0,
        };
        let shadow = shadow_layer(&block_silhouette(8, 8), 8, 8, &spec).unwrap();
        assert_eq!(shadow.pixel(4, 3)[3], 255);
        assert_eq!(shadow.pixel(5, 4)[3], 255);
        assert_eq!(shadow.pixel(2, 2)[3], 0);
        // Shadow is black.
        assert_eq!(&shadow.pixel(4, 3)[..3], &[0, 0, 0]);
    }

    #[test]
    fn shadow_opacity_scales_alpha() {
        let spec = ShadowSpec {
            offset: Vec2::new(0.0, 0.0),
            blur_radius: 0,
            opacity: 0.5,
        };
        let shadow = shadow_layer(&block_silhouette(8, 8), 8, 8, &spec).unwrap();
        let a = shadow.pixel(2, 2)[3];
        assert!((i16::from(a) - 128).abs() <= 1);
    }

    #[test]
    fn blurred_shadow_spreads_past_silhouette() {
        let spec = ShadowSpec {
            offset: Vec2::new(0.0, 0.0),
            blur_radius: 2,
            opacity: 1.0,
        };
        let shadow = shadow_layer(&block_silhouette(8, 8), 8, 8, &spec).unwrap();
        assert!(shadow.pixel(5, 2)[3] > 0);
        assert!(shadow.pixel(5, 2)[3] < 255);
    }

    #[test]
    fn invalid_shadow_spec_is_rejected() {
        let spec = ShadowSpec {
            offset: Vec2::new(0.0, 0.0),
            blur_radius: 0,
            opacity: 1.5,
        };
        assert!(shadow_layer(&[0u8; 4], 2, 2, &spec).is_err());
    }

    #[test]
    fn cache_hits_identical_silhouette_and_evicts_lru() {
        let cache = SilhouetteCache::new(2);
        let make = || LayerRgba::new_transparent(4, 4);
        let sil = vec![255u8; 16];

        let a = cache.get_or_insert_with("t1", &sil, make).unwrap();
        let b = cache.get_or_insert_with("t1", &sil, make).unwrap();
        assert!(Arc::ptr_eq(&a, &b), "identical silhouettes must hit");
        assert_eq!(cache.len(), 1);

        cache.get_or_insert_with("t2", &sil, make).unwrap();
        cache.get_or_insert_with("t3", &sil, make).unwrap();
        assert_eq!(cache.len(), 2);

        // t1 was evicted; a fresh build produces a distinct Arc.
        let c = cache.get_or_insert_with("t1", &sil, make).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn different_silhouettes_never_share_an_entry() {
        let cache = SilhouetteCache::new(4);
        let opaque = vec![255u8; 16];
        let mut masked = opaque.clone();
        masked[5] = 0;

        let a = cache
            .get_or_insert_with("t", &opaque, || LayerRgba::new_transparent(4, 4))
            .unwrap();
        let b = cache
            .get_or_insert_with("t", &masked, || LayerRgba::new_transparent(4, 4))
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn cache_build_errors_propagate_and_do_not_poison() {
        let cache = SilhouetteCache::new(2);
        let err = cache.get_or_insert_with("t1", &[0u8; 1], || {
            Err(FrameupError::validation("nope"))
        });
        assert!(err.is_err());
        assert!(cache.is_empty());
        assert!(
            cache
                .get_or_insert_with("t1", &[0u8; 1], || LayerRgba::new_transparent(2, 2))
                .is_ok()
        );
    }
}
