use tracing::debug;

use crate::{
    composite::composite_mockup,
    error::FrameupResult,
    export::{CropPolicy, ExportVariant, resize_to_variant},
    layer::LayerRgba,
    matting::{MatFrameSpec, add_mat_and_frame},
    shadow::{SilhouetteCache, lighting_mask, shadow_layer},
    template::Template,
    warp::warp_into_background,
};

/// Per-request knobs. Everything else comes from the template.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockupOptions {
    /// Decorate the artwork with a mat and frame before placement.
    pub mat_frame: Option<MatFrameSpec>,
    pub crop: CropPolicy,
}

#[derive(Clone, Debug)]
pub struct MockupOutput {
    pub variant: ExportVariant,
    pub layer: LayerRgba,
}

/// Runs the full compositing chain for one (artwork, template) pair and
/// returns the composite at the template background's dimensions.
///
/// All intermediate layers are request-scoped and dropped on return; the
/// optional cache only retains the shadow layer per (template, silhouette).
#[tracing::instrument(skip_all, fields(template = %template.id))]
pub fn compose_mockup(
    artwork: &LayerRgba,
    template: &Template,
    options: &MockupOptions,
    cache: Option<&SilhouetteCache>,
) -> FrameupResult<LayerRgba> {
    let decorated;
    let placed: &LayerRgba = match &options.mat_frame {
        Some(spec) => {
            decorated = add_mat_and_frame(artwork, spec)?;
            &decorated
        }
        None => artwork,
    };

    let bg = &template.background;
    let warped = warp_into_background(placed, &template.quad, bg.width, bg.height)?;
    debug!(width = bg.width, height = bg.height, "warped artwork into template space");

    let shadow_arc;
    let shadow_owned;
    let shadow: Option<&LayerRgba> = match &template.shadow {
        Some(spec) => {
            let silhouette = warped.alpha_mask();
            match cache {
                Some(cache) => {
                    shadow_arc = cache.get_or_insert_with(&template.id, &silhouette, || {
                        shadow_layer(&silhouette, bg.width, bg.height, spec)
                    })?;
                    Some(&*shadow_arc)
                }
                None => {
                    shadow_owned = shadow_layer(&silhouette, bg.width, bg.height, spec)?;
                    Some(&shadow_owned)
                }
            }
        }
        None => None,
    };

    let lighting = if is_neutral_light(template) {
        None
    } else {
        Some(lighting_mask(&template.light, &template.quad, bg.width, bg.height)?)
    };

    composite_mockup(bg, shadow, &warped, lighting.as_ref(), template.occlusion.as_ref())
}

/// Full request: compose once, then emit every export variant.
pub fn render_mockup(
    artwork: &LayerRgba,
    template: &Template,
    variants: &[ExportVariant],
    options: &MockupOptions,
    cache: Option<&SilhouetteCache>,
) -> FrameupResult<Vec<MockupOutput>> {
    for variant in variants {
        variant.validate()?;
    }

    let composite = compose_mockup(artwork, template, options, cache)?;

    let mut outputs = Vec::with_capacity(variants.len());
    for variant in variants {
        let layer = resize_to_variant(&composite, variant, template.focal_point, options.crop)?;
        outputs.push(MockupOutput {
            variant: *variant,
            layer,
        });
    }
    Ok(outputs)
}

fn is_neutral_light(template: &Template) -> bool {
    template.light.direction.hypot() < 1e-9 && template.light.intensity == 1.0
}
