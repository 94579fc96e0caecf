use thiserror::Error;

/// Render-side errors.
///
/// All of these are "resource unavailable" conditions: a drawer contains them
/// to the failing task and keeps running the rest of its queue.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Render result alias.
pub type RenderResult<T = ()> = Result<T, RenderError>;
