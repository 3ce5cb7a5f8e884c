pub type FrameupResult<T> = Result<T, FrameupError>;

#[derive(thiserror::Error, Debug)]
pub enum FrameupError {
    /// The corner quadrilateral is degenerate or its homography is singular.
    /// Unrecoverable for that template; skip it rather than retry.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// The artwork raster could not be decoded.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The requested template id is absent from the catalog.
    #[error("template not found: '{0}'")]
    TemplateNotFound(String),

    /// An auxiliary raster disagrees with the declared template geometry.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FrameupError {
    pub fn degenerate_geometry(msg: impl Into<String>) -> Self {
        Self::DegenerateGeometry(msg.into())
    }

    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn template_not_found(id: impl Into<String>) -> Self {
        Self::TemplateNotFound(id.into())
    }

    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
