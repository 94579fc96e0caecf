use vs_rendering::Point;
use vs_settings::{HandleMode, Settings};

use crate::geometry::{self, StageTransform};
use crate::selection::MaskModel;
use crate::types::HandleDirection;

/// Rotation handle angle offset in degrees.
pub use vs_settings::defaults::DEFAULT_ROTATION_OFFSET_DEG;

/// Distance from the top edge to the rotation handle, in stage pixels.
pub const ROTATE_HANDLE_OFFSET_PX: f64 = 24.0;

/// An interactive handle placed around an owner box.
///
/// Positions are derived from the owner's mask model on every call; handles
/// keep no geometry of their own.
pub trait Handle: std::fmt::Debug {
    fn direction(&self) -> HandleDirection;

    /// Handle outline in stage coordinates.
    fn points(&self, owner: &MaskModel, stage: &StageTransform) -> Vec<Point>;

    /// Hit-test a stage point.
    fn is_contains_point(&self, owner: &MaskModel, stage: &StageTransform, screen: Point) -> bool {
        geometry::point_in_polygon(screen, &self.points(owner, stage))
    }

    /// Angle implied by the pointer position, in degrees.
    fn angle(&self, _owner: &MaskModel, _pointer: Point) -> f64 {
        0.0
    }

    fn is_active(&self) -> bool;
    fn set_active(&mut self, active: bool);
}

/// Resize handle on a corner or an edge.
#[derive(Debug, Clone)]
pub struct Transformer {
    direction: HandleDirection,
    size: f64,
    edge_tolerance: f64,
    active: bool,
}

impl Transformer {
    pub fn new(direction: HandleDirection, size: f64, edge_tolerance: f64) -> Self {
        Self {
            direction,
            size,
            edge_tolerance,
            active: false,
        }
    }

    fn anchor_stage(&self, owner: &MaskModel, stage: &StageTransform) -> Point {
        let (ux, uy) = self.direction.unit_offset();
        stage.world_to_stage(owner.anchor(ux, uy))
    }

    /// The edge segment in stage space, for edge handles.
    fn edge_segment(&self, owner: &MaskModel, stage: &StageTransform) -> Option<(Point, Point)> {
        let [tl, tr, br, bl] = owner.corners().map(|p| stage.world_to_stage(p));
        match self.direction {
            HandleDirection::Top => Some((tl, tr)),
            HandleDirection::Right => Some((tr, br)),
            HandleDirection::Bottom => Some((br, bl)),
            HandleDirection::Left => Some((bl, tl)),
            _ => None,
        }
    }

    /// New box for a drag of this handle to `pointer` (world).
    ///
    /// Works in the box's rotated frame; the anchor opposite the handle stays
    /// fixed, and dragging past it flips the box rather than inverting it.
    pub fn resize(&self, owner: &MaskModel, pointer: Point) -> MaskModel {
        let local = owner.to_local(pointer);
        let r = owner.local_rect();
        let (mut left, mut top, mut right, mut bottom) = (r.x, r.y, r.right(), r.bottom());

        let (ux, uy) = self.direction.unit_offset();
        if ux < 0.0 {
            left = local.x;
        } else if ux > 0.0 {
            right = local.x;
        }
        if uy < 0.0 {
            top = local.y;
        } else if uy > 0.0 {
            bottom = local.y;
        }

        let (left, right) = (left.min(right), left.max(right));
        let (top, bottom) = (top.min(bottom), top.max(bottom));
        let local_center = Point::new((left + right) / 2.0, (top + bottom) / 2.0);

        MaskModel {
            center: owner.to_world(local_center),
            width: right - left,
            height: bottom - top,
            angle: owner.angle,
        }
    }
}

impl Handle for Transformer {
    fn direction(&self) -> HandleDirection {
        self.direction
    }

    fn points(&self, owner: &MaskModel, stage: &StageTransform) -> Vec<Point> {
        geometry::square_around(self.anchor_stage(owner, stage), self.size, owner.angle)
    }

    fn is_contains_point(&self, owner: &MaskModel, stage: &StageTransform, screen: Point) -> bool {
        if geometry::point_in_polygon(screen, &self.points(owner, stage)) {
            return true;
        }
        match self.edge_segment(owner, stage) {
            Some((a, b)) => geometry::distance_to_segment(screen, a, b) <= self.edge_tolerance,
            None => false,
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

/// Rotation handle above the owner's top edge.
#[derive(Debug, Clone)]
pub struct RotationController {
    size: f64,
    offset_deg: f64,
    active: bool,
}

impl RotationController {
    pub fn new(size: f64, offset_deg: f64) -> Self {
        Self {
            size,
            offset_deg,
            active: false,
        }
    }

    pub fn offset_deg(&self) -> f64 {
        self.offset_deg
    }

    /// Handle center in stage coordinates.
    pub fn position(&self, owner: &MaskModel, stage: &StageTransform) -> Point {
        let lift = stage.stage_dist_to_world(ROTATE_HANDLE_OFFSET_PX);
        let top = Point::new(0.0, -owner.height / 2.0 - lift);
        stage.world_to_stage(owner.to_world(top))
    }
}

impl Default for RotationController {
    fn default() -> Self {
        Self::new(8.0, DEFAULT_ROTATION_OFFSET_DEG)
    }
}

impl Handle for RotationController {
    fn direction(&self) -> HandleDirection {
        HandleDirection::Rotate
    }

    fn points(&self, owner: &MaskModel, stage: &StageTransform) -> Vec<Point> {
        geometry::square_around(self.position(owner, stage), self.size, owner.angle)
    }

    /// Angle from the owner center to the pointer (world), plus the offset.
    fn angle(&self, owner: &MaskModel, pointer: Point) -> f64 {
        geometry::angle_deg(owner.center, pointer) + self.offset_deg
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

/// The handles built around one owner.
#[derive(Debug, Default)]
pub struct TransformerSet {
    handles: Vec<Box<dyn Handle>>,
}

impl TransformerSet {
    /// Build handles for `mode`. Corners come before edges so they win overlaps.
    pub fn new(mode: HandleMode, rotation: Option<RotationController>, size: f64, edge_tolerance: f64) -> Self {
        let directions: &[HandleDirection] = match mode {
            HandleMode::Full => &[
                HandleDirection::TopLeft,
                HandleDirection::TopRight,
                HandleDirection::BottomRight,
                HandleDirection::BottomLeft,
                HandleDirection::Top,
                HandleDirection::Right,
                HandleDirection::Bottom,
                HandleDirection::Left,
            ],
            HandleMode::Corners => &HandleDirection::CORNERS,
            HandleMode::None => &[],
        };

        let mut handles: Vec<Box<dyn Handle>> = Vec::with_capacity(directions.len() + 1);
        if let Some(rotation) = rotation {
            handles.push(Box::new(rotation));
        }
        handles.extend(
            directions
                .iter()
                .map(|d| Box::new(Transformer::new(*d, size, edge_tolerance)) as Box<dyn Handle>),
        );
        Self { handles }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let rotation = settings
            .rotation_enabled
            .then(|| RotationController::new(settings.handle_size, settings.rotation_offset_deg));
        Self::new(
            settings.handle_mode,
            rotation,
            settings.handle_size,
            settings.edge_tolerance,
        )
    }

    pub fn handles(&self) -> &[Box<dyn Handle>] {
        &self.handles
    }

    pub fn handle(&self, direction: HandleDirection) -> Option<&dyn Handle> {
        self.handles
            .iter()
            .find(|h| h.direction() == direction)
            .map(|h| h.as_ref())
    }

    /// First handle containing `screen`.
    pub fn hit(&self, owner: &MaskModel, stage: &StageTransform, screen: Point) -> Option<HandleDirection> {
        self.handles
            .iter()
            .find(|h| h.is_contains_point(owner, stage, screen))
            .map(|h| h.direction())
    }

    /// Mark one handle active and the rest inactive. `None` deactivates all.
    pub fn activate(&mut self, direction: Option<HandleDirection>) {
        for h in &mut self.handles {
            let active = Some(h.direction()) == direction;
            h.set_active(active);
        }
    }

    pub fn active(&self) -> Option<HandleDirection> {
        self.handles
            .iter()
            .find(|h| h.is_active())
            .map(|h| h.direction())
    }

    /// Outline of every handle, for mask rendering.
    pub fn outlines(&self, owner: &MaskModel, stage: &StageTransform) -> Vec<Vec<Point>> {
        self.handles.iter().map(|h| h.points(owner, stage)).collect()
    }

    /// Resize `owner` by dragging `direction` to `pointer` (world).
    pub fn resize(&self, direction: HandleDirection, owner: &MaskModel, pointer: Point) -> Option<MaskModel> {
        if direction == HandleDirection::Rotate {
            return None;
        }
        self.handle(direction)?;
        Some(Transformer::new(direction, 0.0, 0.0).resize(owner, pointer))
    }

    /// Rotation angle for a pointer at `pointer` (world), if rotation is enabled.
    pub fn rotation_angle(&self, owner: &MaskModel, pointer: Point) -> Option<f64> {
        self.handle(HandleDirection::Rotate)
            .map(|h| h.angle(owner, pointer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> MaskModel {
        MaskModel {
            center: Point::new(50.0, 50.0),
            width: 40.0,
            height: 20.0,
            angle: 0.0,
        }
    }

    #[test]
    fn test_corner_handle_polygon_hit() {
        let stage = StageTransform::new(200, 200);
        let handle = Transformer::new(HandleDirection::TopLeft, 8.0, 0.0);
        // top-left corner at (30, 40)
        assert!(handle.is_contains_point(&owner(), &stage, Point::new(31.0, 41.0)));
        assert!(handle.is_contains_point(&owner(), &stage, Point::new(27.0, 37.0)));
        assert!(!handle.is_contains_point(&owner(), &stage, Point::new(35.0, 40.0)));
        assert!(!handle.is_contains_point(&owner(), &stage, Point::new(25.0, 45.0)));
    }

    #[test]
    fn test_rotated_corner_handle_hit() {
        let stage = StageTransform::new(200, 200);
        let mut rotated = owner();
        rotated.angle = 45.0;
        let handle = Transformer::new(HandleDirection::TopLeft, 8.0, 0.0);
        let corner = stage.world_to_stage(rotated.corners()[0]);
        // inside the diamond along its diagonal, outside an axis-aligned corner test
        assert!(handle.is_contains_point(&rotated, &stage, corner + Point::new(0.0, 5.0)));
        assert!(!handle.is_contains_point(&rotated, &stage, corner + Point::new(3.5, 3.5)));
    }

    #[test]
    fn test_edge_handle_uses_segment_distance() {
        let stage = StageTransform::new(200, 200);
        let handle = Transformer::new(HandleDirection::Top, 8.0, 3.0);
        assert!(handle.is_contains_point(&owner(), &stage, Point::new(35.0, 42.0)));
        assert!(!handle.is_contains_point(&owner(), &stage, Point::new(35.0, 45.0)));
    }

    #[test]
    fn test_resize_keeps_opposite_anchor() {
        let handle = Transformer::new(HandleDirection::BottomRight, 8.0, 0.0);
        let resized = handle.resize(&owner(), Point::new(90.0, 80.0));
        assert_eq!(resized.corners()[0], Point::new(30.0, 40.0));
        assert_eq!((resized.width, resized.height), (60.0, 40.0));

        let edge = Transformer::new(HandleDirection::Left, 8.0, 0.0);
        let resized = edge.resize(&owner(), Point::new(10.0, 999.0));
        assert_eq!((resized.width, resized.height), (60.0, 20.0));
        assert_eq!(resized.center, Point::new(40.0, 50.0));
    }

    #[test]
    fn test_resize_rotated_box() {
        let mut rotated = owner();
        rotated.angle = 90.0;
        let handle = Transformer::new(HandleDirection::Right, 8.0, 0.0);
        // local +x points down in world when rotated 90 degrees
        let resized = handle.resize(&rotated, Point::new(50.0, 90.0));
        assert!((resized.width - 60.0).abs() < 1e-9);
        assert!(resized.corners()[0].approx_eq(rotated.corners()[0], 1e-9));
    }

    #[test]
    fn test_rotation_angle_uses_offset() {
        let rotation = RotationController::new(8.0, DEFAULT_ROTATION_OFFSET_DEG);
        let angle = rotation.angle(&owner(), Point::new(50.0, 80.0));
        assert_eq!(angle, 90.0 + DEFAULT_ROTATION_OFFSET_DEG);

        let custom = RotationController::new(8.0, 10.0);
        assert_eq!(custom.angle(&owner(), Point::new(60.0, 50.0)), 10.0);
    }

    #[test]
    fn test_rotation_handle_sits_above_top_edge() {
        let stage = StageTransform::new(200, 200);
        let rotation = RotationController::default();
        let pos = rotation.position(&owner(), &stage);
        assert_eq!(pos, Point::new(50.0, 40.0 - ROTATE_HANDLE_OFFSET_PX));
    }

    #[test]
    fn test_set_from_settings() {
        let settings = Settings {
            handle_mode: HandleMode::Corners,
            ..Settings::default()
        };
        let set = TransformerSet::from_settings(&settings);
        assert_eq!(set.handles().len(), 5);
        let stage = StageTransform::new(200, 200);
        assert_eq!(set.hit(&owner(), &stage, Point::new(70.0, 60.0)), Some(HandleDirection::BottomRight));
        assert_eq!(set.hit(&owner(), &stage, Point::new(50.0, 50.0)), None);

        let none = TransformerSet::from_settings(&Settings {
            handle_mode: HandleMode::None,
            rotation_enabled: false,
            ..Settings::default()
        });
        assert!(none.handles().is_empty());
        assert!(none.rotation_angle(&owner(), Point::ZERO).is_none());
    }

    #[test]
    fn test_activate() {
        let mut set = TransformerSet::from_settings(&Settings::default());
        set.activate(Some(HandleDirection::Left));
        assert_eq!(set.active(), Some(HandleDirection::Left));
        set.activate(None);
        assert_eq!(set.active(), None);
    }
}
