use vs_rendering::{Point, Rectangle};

use crate::element::Element;
use crate::types::ElementId;

/// Ordered set of selected element ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<ElementId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection with one element.
    pub fn select(&mut self, id: ElementId) {
        self.ids.clear();
        self.ids.push(id);
    }

    /// Add `id` if absent, remove it otherwise. Returns whether it is now selected.
    pub fn toggle(&mut self, id: ElementId) -> bool {
        if let Some(pos) = self.ids.iter().position(|s| *s == id) {
            self.ids.remove(pos);
            false
        } else {
            self.ids.push(id);
            true
        }
    }

    /// Append ids not yet selected, keeping selection order.
    pub fn extend(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        for id in ids {
            if !self.ids.contains(&id) {
                self.ids.push(id);
            }
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Whether `id` is selected.
    pub fn contains(&self, id: ElementId) -> bool {
        self.ids.contains(&id)
    }

    /// Selected ids, oldest first.
    pub fn ids(&self) -> &[ElementId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Drop ids for which `exists` is false. Returns whether anything was dropped.
    pub fn retain_existing(&mut self, exists: impl Fn(ElementId) -> bool) -> bool {
        let before = self.ids.len();
        self.ids.retain(|id| exists(*id));
        self.ids.len() != before
    }
}

/// Rotated box around a selection, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskModel {
    pub center: Point,
    pub width: f64,
    pub height: f64,
    /// Clockwise degrees.
    pub angle: f64,
}

impl MaskModel {
    /// World point to box-local coordinates (origin at center, unrotated).
    pub fn to_local(&self, world: Point) -> Point {
        world.rotate_around(self.center, -self.angle) - self.center
    }

    /// Box-local coordinates back to world.
    pub fn to_world(&self, local: Point) -> Point {
        (local + self.center).rotate_around(self.center, self.angle)
    }

    /// Unrotated box centered on the origin.
    pub fn local_rect(&self) -> Rectangle {
        Rectangle::new(
            -self.width / 2.0,
            -self.height / 2.0,
            self.width,
            self.height,
        )
    }

    /// World corners clockwise from top-left.
    pub fn corners(&self) -> [Point; 4] {
        self.local_rect().corners().map(|p| self.to_world(p))
    }

    /// World point at a unit offset (`-1..=1` per axis) from the center.
    pub fn anchor(&self, ux: f64, uy: f64) -> Point {
        self.to_world(Point::new(ux * self.width / 2.0, uy * self.height / 2.0))
    }

    pub fn contains(&self, world: Point) -> bool {
        let local = self.to_local(world);
        self.local_rect().contains(local.x, local.y)
    }
}

/// Owns the current mask model.
#[derive(Debug, Clone, Default)]
pub struct Boxer {
    model: Option<MaskModel>,
}

impl Boxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the envelope computed for the current selection.
    pub fn set_model(&mut self, model: Option<MaskModel>) {
        self.model = model;
    }

    /// Current envelope, `None` when nothing is selected.
    pub fn model(&self) -> Option<&MaskModel> {
        self.model.as_ref()
    }

    pub fn clear(&mut self) {
        self.model = None;
    }

    /// Minimal rotated envelope of the given elements.
    ///
    /// A single element boxes at its own rotation. Several elements box at
    /// `shared_angle`, or axis-aligned when none is given. The envelope is
    /// taken over every outline point in the rotated frame, so rotated
    /// members are not inflated to their world-axis bounds first.
    pub fn compute(elements: &[&Element], shared_angle: Option<f64>) -> Option<MaskModel> {
        let angle = match elements {
            [] => return None,
            [only] => only.rotation(),
            _ => shared_angle.unwrap_or(0.0),
        };

        let unrotated: Vec<Point> = elements
            .iter()
            .flat_map(|e| e.path_points().iter())
            .map(|p| p.rotate_around(Point::ZERO, -angle))
            .collect();
        let bounds = Rectangle::enclosing(&unrotated)?;

        Some(MaskModel {
            center: bounds.center().rotate_around(Point::ZERO, angle),
            width: bounds.width,
            height: bounds.height,
            angle,
        })
    }
}
