use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use vs_rendering::Point;

use crate::error::DrawingError;

/// Process-wide element id generator.
static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable element identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl ElementId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        ElementId(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Element type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Rectangle,
    Ellipse,
    Circle,
    Polygon,
    Image,
    Text,
    Path,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Rectangle => "rectangle",
            ElementKind::Ellipse => "ellipse",
            ElementKind::Circle => "circle",
            ElementKind::Polygon => "polygon",
            ElementKind::Image => "image",
            ElementKind::Text => "text",
            ElementKind::Path => "path",
        }
    }

    /// Kinds defined by two opposite corners.
    pub fn is_box(&self) -> bool {
        matches!(
            self,
            ElementKind::Rectangle | ElementKind::Ellipse | ElementKind::Image
        )
    }

    /// Whether the outline encloses an area.
    pub fn is_closed(&self) -> bool {
        !matches!(self, ElementKind::Path)
    }

    /// Minimum number of defining points.
    pub fn min_points(&self) -> usize {
        match self {
            ElementKind::Text => 1,
            ElementKind::Rectangle
            | ElementKind::Ellipse
            | ElementKind::Circle
            | ElementKind::Image
            | ElementKind::Path => 2,
            ElementKind::Polygon => 3,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = DrawingError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "rectangle" | "rect" => Ok(ElementKind::Rectangle),
            "ellipse" => Ok(ElementKind::Ellipse),
            "circle" => Ok(ElementKind::Circle),
            "polygon" => Ok(ElementKind::Polygon),
            "image" => Ok(ElementKind::Image),
            "text" => Ok(ElementKind::Text),
            "path" => Ok(ElementKind::Path),
            _ => Err(DrawingError::UnknownElementType(tag.to_string())),
        }
    }
}

/// Handle anchor around a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleDirection {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
    Rotate,
}

impl HandleDirection {
    pub const CORNERS: [HandleDirection; 4] = [
        HandleDirection::TopLeft,
        HandleDirection::TopRight,
        HandleDirection::BottomRight,
        HandleDirection::BottomLeft,
    ];

    pub const EDGES: [HandleDirection; 4] = [
        HandleDirection::Top,
        HandleDirection::Right,
        HandleDirection::Bottom,
        HandleDirection::Left,
    ];

    pub fn is_corner(&self) -> bool {
        Self::CORNERS.contains(self)
    }

    pub fn is_edge(&self) -> bool {
        Self::EDGES.contains(self)
    }

    /// Unit offset of the anchor from the box center, in box-local space.
    ///
    /// `(-1, -1)` is top-left; `0` on an axis means the anchor is centered on it.
    pub fn unit_offset(&self) -> (f64, f64) {
        match self {
            HandleDirection::TopLeft => (-1.0, -1.0),
            HandleDirection::Top => (0.0, -1.0),
            HandleDirection::TopRight => (1.0, -1.0),
            HandleDirection::Right => (1.0, 0.0),
            HandleDirection::BottomRight => (1.0, 1.0),
            HandleDirection::Bottom => (0.0, 1.0),
            HandleDirection::BottomLeft => (-1.0, 1.0),
            HandleDirection::Left => (-1.0, 0.0),
            HandleDirection::Rotate => (0.0, -1.0),
        }
    }
}

/// Keyboard modifiers held during a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
}

impl Modifiers {
    /// Whether the click should add to or toggle the selection.
    pub fn is_additive(&self) -> bool {
        self.ctrl || self.shift
    }
}

/// One pointer event in both coordinate spaces.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerInput {
    pub screen: Point,
    pub world: Point,
    pub modifiers: Modifiers,
}
