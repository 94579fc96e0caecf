pub mod collection;
pub mod element;
pub mod error;
pub mod geometry;
pub mod history;
pub mod render;
pub mod selection;
pub mod stage;
pub mod transformer;
pub mod types;

pub use vs_rendering;

pub use collection::{ChangeSet, DrawOrder, Listeners, OrderedCollection, SubscriptionId};
pub use element::{
    DerivedState, Element, ElementFactory, ElementModel, ElementStyle, FontStyle, defaults,
};
pub use error::{DrawingError, DrawingResult, HistoryError};
pub use geometry::StageTransform;
pub use history::{
    Command, CommandPayload, CommandRecord, CommandType, DEFAULT_HISTORY_LIMIT, Document,
    ElementSnapshot, HistoryEvent, HistoryEventKind, SnapshotCommand, UndoRedoStack,
};
pub use selection::{Boxer, MaskModel, Selection};
pub use stage::{HitTarget, MIN_RESIZE_EXTENT, Stage, StageFrame};
pub use transformer::{
    DEFAULT_ROTATION_OFFSET_DEG, Handle, ROTATE_HANDLE_OFFSET_PX, RotationController, Transformer,
    TransformerSet,
};
pub use types::{ElementId, ElementKind, HandleDirection, Modifiers, PointerInput};
