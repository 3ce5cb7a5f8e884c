use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use kurbo::Point;
use tracing::{debug, info};

use crate::{
    error::{FrameupError, FrameupResult},
    geometry::CornerQuad,
    layer::LayerRgba,
    shadow::{LightingSpec, ShadowSpec},
};

/// On-disk form of one catalog entry. Raster paths resolve relative to the
/// catalog file.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TemplateDescriptor {
    pub id: String,
    pub background: PathBuf,
    /// Frame opening corners, clockwise from top-left, background pixels.
    pub corners: [Point; 4],
    #[serde(default)]
    pub light: LightingSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<ShadowSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occlusion: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_point: Option<Point>,
}

/// A loaded, validated frame/room style. Immutable shared state: one
/// catalog backs any number of concurrent requests.
#[derive(Clone, Debug)]
pub struct Template {
    pub id: String,
    pub background: LayerRgba,
    pub quad: CornerQuad,
    pub light: LightingSpec,
    pub shadow: Option<ShadowSpec>,
    pub occlusion: Option<LayerRgba>,
    pub focal_point: Option<Point>,
}

impl Template {
    /// All template validation happens here, at load time, so requests never
    /// see a malformed descriptor.
    pub fn from_parts(
        id: impl Into<String>,
        background: LayerRgba,
        corners: [Point; 4],
        light: LightingSpec,
        shadow: Option<ShadowSpec>,
        occlusion: Option<LayerRgba>,
        focal_point: Option<Point>,
    ) -> FrameupResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(FrameupError::validation("template id must be non-empty"));
        }

        let quad = CornerQuad::new(corners)?;
        light.validate()?;
        if let Some(shadow) = &shadow {
            shadow.validate()?;
        }

        if let Some(occlusion) = &occlusion
            && (occlusion.width != background.width || occlusion.height != background.height)
        {
            return Err(FrameupError::dimension_mismatch(format!(
                "template '{}': occlusion mask is {}x{}, background is {}x{}",
                id, occlusion.width, occlusion.height, background.width, background.height
            )));
        }

        Ok(Self {
            id,
            background,
            quad,
            light,
            shadow,
            occlusion,
            focal_point,
        })
    }

    pub fn load(descriptor: &TemplateDescriptor, base_dir: &Path) -> FrameupResult<Self> {
        let bg_path = base_dir.join(&descriptor.background);
        let background = load_raster(&bg_path)
            .with_context(|| format!("template '{}' background", descriptor.id))?;

        let occlusion = match &descriptor.occlusion {
            Some(rel) => {
                let path = base_dir.join(rel);
                Some(
                    load_raster(&path)
                        .with_context(|| format!("template '{}' occlusion", descriptor.id))?,
                )
            }
            None => None,
        };

        debug!(
            id = %descriptor.id,
            width = background.width,
            height = background.height,
            "loaded template"
        );

        Self::from_parts(
            descriptor.id.clone(),
            background,
            descriptor.corners,
            descriptor.light,
            descriptor.shadow,
            occlusion,
            descriptor.focal_point,
        )
    }
}

fn load_raster(path: &Path) -> anyhow::Result<LayerRgba> {
    let bytes = std::fs::read(path).with_context(|| format!("read '{}'", path.display()))?;
    let dyn_img =
        image::load_from_memory(&bytes).with_context(|| format!("decode '{}'", path.display()))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(LayerRgba::from_straight_rgba8(width, height, rgba.into_raw())?)
}

/// The template catalog: loaded once at startup, validated eagerly, then
/// shared read-only across request workers.
#[derive(Clone, Debug, Default)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, Arc<Template>>,
}

impl TemplateCatalog {
    /// Reads a JSON array of descriptors and loads every referenced raster.
    /// A single malformed entry fails the whole load; a catalog is either
    /// fully valid or rejected.
    pub fn load(catalog_path: &Path) -> FrameupResult<Self> {
        let bytes = std::fs::read(catalog_path)
            .with_context(|| format!("read catalog '{}'", catalog_path.display()))?;
        let descriptors: Vec<TemplateDescriptor> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse catalog '{}'", catalog_path.display()))?;

        let base_dir = catalog_path.parent().unwrap_or_else(|| Path::new("."));
        let mut templates = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            templates.push(Template::load(descriptor, base_dir)?);
        }

        let catalog = Self::from_templates(templates)?;
        info!(count = catalog.len(), "template catalog ready");
        Ok(catalog)
    }

    pub fn from_templates(templates: impl IntoIterator<Item = Template>) -> FrameupResult<Self> {
        let mut map = BTreeMap::new();
        for template in templates {
            let id = template.id.clone();
            if map.insert(id.clone(), Arc::new(template)).is_some() {
                return Err(FrameupError::validation(format!(
                    "duplicate template id '{id}'"
                )));
            }
        }
        Ok(Self { templates: map })
    }

    pub fn get(&self, id: &str) -> FrameupResult<&Arc<Template>> {
        self.templates
            .get(id)
            .ok_or_else(|| FrameupError::template_not_found(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
