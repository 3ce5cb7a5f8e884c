#![forbid(unsafe_code)]

pub mod blur;
pub mod composite;
pub mod cutout;
pub mod decode;
pub mod error;
pub mod export;
pub mod geometry;
pub mod layer;
pub mod matting;
pub mod pipeline;
pub mod shadow;
pub mod template;
pub mod warp;

pub use error::{FrameupError, FrameupResult};
pub use export::{CropPolicy, ExportVariant, OutputFormat};
pub use geometry::{CornerQuad, Homography};
pub use layer::LayerRgba;
pub use pipeline::{MockupOptions, MockupOutput, compose_mockup, render_mockup};
pub use shadow::{LightingSpec, ShadowSpec, SilhouetteCache};
pub use template::{Template, TemplateCatalog, TemplateDescriptor};
