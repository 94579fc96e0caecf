use thiserror::Error;
use vs_rendering::RenderError;

use crate::types::ElementId;

/// Drawing-side errors.
#[derive(Debug, Error)]
pub enum DrawingError {
    #[error("Unknown element type: '{0}'")]
    UnknownElementType(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Element not found: {0}")]
    ElementNotFound(ElementId),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Undo/redo contract violations.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("{command}: {direction} is not implemented")]
    NotImplemented {
        command: String,
        direction: &'static str,
    },

    #[error("Command target {0} does not exist")]
    MissingTarget(ElementId),
}

/// Drawing result alias.
pub type DrawingResult<T> = Result<T, DrawingError>;
