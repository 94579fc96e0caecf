//! Layered 2D vector drawing stage.
//!
//! `vstage` bundles the element model, selection, transform handles and
//! undo/redo of [`vs_drawing`] with the layered tiny-skia renderer of
//! [`vs_rendering`] and the JSON settings of [`vs_settings`].

use std::path::Path;

pub mod logging;

pub use vs_drawing as drawing;
pub use vs_rendering as rendering;
pub use vs_settings as settings;

pub use vs_drawing::{
    DrawingError, DrawingResult, Element, ElementFactory, ElementId, ElementKind, ElementStyle,
    HitTarget, Stage, StageFrame, StageTransform,
};
pub use vs_rendering::{Color, LayerKind, Point, ResourceCache};
pub use vs_settings::{ConfigManager, Settings};

/// Open a stage configured from the manager's current settings.
pub fn open_stage(config: &ConfigManager, width: u32, height: u32) -> DrawingResult<Stage> {
    Stage::open(config.get(), width, height)
}

/// Render a frame and write the flattened layers as PNG.
pub async fn export_png(stage: &mut Stage, path: impl AsRef<Path>) -> anyhow::Result<StageFrame> {
    let frame = stage.render_frame().await;
    let png = stage.flatten()?.encode_png()?;
    tokio::fs::write(path.as_ref(), png).await?;
    tracing::info!(path = %path.as_ref().display(), failed = frame.failed(), "frame exported");
    Ok(frame)
}
