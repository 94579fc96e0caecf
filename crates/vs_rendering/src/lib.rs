pub mod drawer;
pub mod error;
pub mod layer;
pub mod resources;
pub mod surface;
pub mod task;
pub mod types;

pub use drawer::{Drawer, FrameReport};
pub use error::{RenderError, RenderResult};
pub use layer::{LayerInvalidation, LayerKind, LayerState};
pub use resources::{FontDatabase, ResourceCache, decode_pixmap};
pub use surface::{PixmapSurface, Surface};
pub use task::{ClearTask, ElementTask, MaskTask, Primitive, RenderTask};
pub use types::{Color, DrawStyle, Point, Rectangle, TextStyle};
