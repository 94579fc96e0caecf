use serde::{Deserialize, Serialize};
use vs_rendering::{Color, Point, Rectangle};

use crate::error::{DrawingError, DrawingResult};
use crate::geometry::{self, StageTransform};
use crate::types::{ElementId, ElementKind};

/// Element defaults.
pub mod defaults {
    pub const STROKE_WIDTH: f64 = 2.0;
    pub const FONT_SIZE: f64 = 20.0;
    pub const MIN_FONT_SIZE: f64 = 8.0;
    pub const FONT_FAMILY: &str = "sans-serif";
    /// Segments used to approximate ellipses and circles.
    pub const ELLIPSE_SEGMENTS: usize = 48;
    /// Estimated glyph advance relative to font size.
    pub const TEXT_CHAR_WIDTH_SCALE: f64 = 0.6;
    pub const TEXT_LINE_HEIGHT_SCALE: f64 = 1.35;
}

// ==================== Persisted model ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontStyle {
    pub family: String,
    pub size: f64,
}

impl Default for FontStyle {
    fn default() -> Self {
        Self {
            family: defaults::FONT_FAMILY.to_string(),
            size: defaults::FONT_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementStyle {
    #[serde(default)]
    pub fill: Option<Color>,
    #[serde(default)]
    pub stroke: Option<Color>,
    pub stroke_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<FontStyle>,
}

impl Default for ElementStyle {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: Some(Color::BLACK),
            stroke_width: defaults::STROKE_WIDTH,
            font: None,
        }
    }
}

impl ElementStyle {
    pub fn filled(fill: Color) -> Self {
        Self {
            fill: Some(fill),
            ..Self::default()
        }
    }

    pub fn font_or_default(&self) -> FontStyle {
        self.font.clone().unwrap_or_default()
    }
}

/// An element's persisted attributes.
///
/// `points` are world coordinates. Box kinds carry two opposite corners,
/// circles carry the center and a point on the circumference, polygons and
/// paths carry every vertex, and text carries its top-left anchor.
/// `rotation` is clockwise degrees about the element center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementModel {
    pub kind: ElementKind,
    pub points: Vec<Point>,
    pub style: ElementStyle,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ElementModel {
    pub fn new(kind: ElementKind, points: Vec<Point>, style: ElementStyle) -> Self {
        let mut model = Self {
            kind,
            points,
            style,
            rotation: 0.0,
            width: 0.0,
            height: 0.0,
            text: None,
            source: None,
        };
        model.recompute_size();
        model
    }

    fn font_size(&self) -> f64 {
        self.style
            .font
            .as_ref()
            .map_or(defaults::FONT_SIZE, |f| f.size)
    }

    fn circle_radius(&self) -> f64 {
        match self.points.as_slice() {
            [center, edge, ..] => center.distance_to(*edge),
            _ => 0.0,
        }
    }

    fn text_extent(&self) -> (f64, f64) {
        let text = self.text.as_deref().unwrap_or_default();
        let font_size = self.font_size();
        let columns = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        let lines = text.lines().count().max(1);
        (
            columns as f64 * font_size * defaults::TEXT_CHAR_WIDTH_SCALE,
            lines as f64 * font_size * defaults::TEXT_LINE_HEIGHT_SCALE,
        )
    }

    /// Unrotated box in world space.
    pub fn local_box(&self) -> Rectangle {
        match self.kind {
            ElementKind::Circle => {
                let Some(center) = self.points.first() else {
                    return Rectangle::ZERO;
                };
                let r = self.circle_radius();
                Rectangle::new(center.x - r, center.y - r, r * 2.0, r * 2.0)
            }
            ElementKind::Text => {
                let anchor = self.points.first().copied().unwrap_or_default();
                let (w, h) = self.text_extent();
                Rectangle::new(anchor.x, anchor.y, w, h)
            }
            ElementKind::Rectangle | ElementKind::Ellipse | ElementKind::Image => {
                Rectangle::enclosing(&self.points[..self.points.len().min(2)])
                    .unwrap_or(Rectangle::ZERO)
            }
            ElementKind::Polygon | ElementKind::Path => {
                Rectangle::enclosing(&self.points).unwrap_or(Rectangle::ZERO)
            }
        }
    }

    pub fn center(&self) -> Point {
        match self.kind {
            ElementKind::Circle => self.points.first().copied().unwrap_or_default(),
            _ => self.local_box().center(),
        }
    }

    /// Recompute `width`/`height` from the raw coordinates.
    pub fn recompute_size(&mut self) {
        let b = self.local_box();
        self.width = b.width;
        self.height = b.height;
    }

    /// Check kind-specific requirements.
    pub fn validate(&self) -> DrawingResult<()> {
        let kind = self.kind;
        if self.points.len() < kind.min_points() {
            return Err(DrawingError::InvalidGeometry(format!(
                "{kind} needs at least {} points, got {}",
                kind.min_points(),
                self.points.len()
            )));
        }
        if self
            .points
            .iter()
            .any(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(DrawingError::InvalidGeometry(format!(
                "{kind} has non-finite coordinates"
            )));
        }
        if !self.rotation.is_finite() {
            return Err(DrawingError::InvalidGeometry(format!(
                "{kind} has non-finite rotation"
            )));
        }

        match kind {
            ElementKind::Rectangle | ElementKind::Ellipse | ElementKind::Image => {
                let b = self.local_box();
                if b.width <= 0.0 || b.height <= 0.0 {
                    return Err(DrawingError::InvalidGeometry(format!(
                        "{kind} has zero area ({}x{})",
                        b.width, b.height
                    )));
                }
            }
            ElementKind::Circle if self.circle_radius() <= 0.0 => {
                return Err(DrawingError::InvalidGeometry(
                    "circle has zero radius".to_string(),
                ));
            }
            _ => {}
        }

        if kind == ElementKind::Image && self.source.as_deref().is_none_or(str::is_empty) {
            return Err(DrawingError::InvalidGeometry(
                "image requires a source".to_string(),
            ));
        }
        Ok(())
    }

    /// World-space outline: rotated corners for boxes, a polygon for round kinds.
    pub fn outline(&self) -> Vec<Point> {
        let center = self.center();
        let raw = match self.kind {
            ElementKind::Rectangle | ElementKind::Image | ElementKind::Text => {
                self.local_box().corners().to_vec()
            }
            ElementKind::Ellipse => {
                let b = self.local_box();
                geometry::ellipse_points(
                    b.center(),
                    b.width / 2.0,
                    b.height / 2.0,
                    defaults::ELLIPSE_SEGMENTS,
                )
            }
            ElementKind::Circle => {
                let r = self.circle_radius();
                geometry::ellipse_points(center, r, r, defaults::ELLIPSE_SEGMENTS)
            }
            ElementKind::Polygon | ElementKind::Path => self.points.clone(),
        };
        raw.into_iter()
            .map(|p| p.rotate_around(center, self.rotation))
            .collect()
    }
}

// ==================== Derived state ====================

/// Render state computed from the model and the stage transform. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedState {
    /// Model points in stage space.
    pub stage_points: Vec<Point>,
    /// Outline in world space.
    pub path_points: Vec<Point>,
    /// Outline in stage space.
    pub stage_path: Vec<Point>,
}

impl DerivedState {
    fn compute(model: &ElementModel, stage: &StageTransform) -> Self {
        let path_points = model.outline();
        Self {
            stage_points: stage.map_to_stage(&model.points),
            stage_path: stage.map_to_stage(&path_points),
            path_points,
        }
    }
}

// ==================== Element ====================

/// A drawable element: identity, persisted model and derived render state.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    id: ElementId,
    model: ElementModel,
    derived: DerivedState,
    stage: StageTransform,
}

impl Element {
    /// Rebuild an element from a persisted model.
    pub fn from_model(
        id: ElementId,
        mut model: ElementModel,
        stage: &StageTransform,
    ) -> DrawingResult<Self> {
        model.validate()?;
        model.recompute_size();
        let derived = DerivedState::compute(&model, stage);
        Ok(Self {
            id,
            model,
            derived,
            stage: *stage,
        })
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn kind(&self) -> ElementKind {
        self.model.kind
    }

    pub fn model(&self) -> &ElementModel {
        &self.model
    }

    pub fn derived(&self) -> &DerivedState {
        &self.derived
    }

    pub fn path_points(&self) -> &[Point] {
        &self.derived.path_points
    }

    pub fn stage_path(&self) -> &[Point] {
        &self.derived.stage_path
    }

    pub fn rotation(&self) -> f64 {
        self.model.rotation
    }

    pub fn center(&self) -> Point {
        self.model.center()
    }

    /// World-axis-aligned bounds of the rotated outline.
    pub fn bounds(&self) -> Rectangle {
        Rectangle::enclosing(&self.derived.path_points).unwrap_or(Rectangle::ZERO)
    }

    fn refresh(&mut self) {
        self.derived = DerivedState::compute(&self.model, &self.stage);
    }

    /// Recompute derived state for a new stage transform.
    pub fn refresh_stage_points(&mut self, stage: &StageTransform) {
        self.stage = *stage;
        self.refresh();
    }

    /// Replace the model wholesale.
    pub fn set_model(&mut self, mut model: ElementModel) -> DrawingResult<()> {
        model.validate()?;
        model.recompute_size();
        self.model = model;
        self.refresh();
        Ok(())
    }

    /// Translate every model point by `offset`.
    pub fn transform(&mut self, offset: Point) {
        for p in &mut self.model.points {
            *p = *p + offset;
        }
        self.model.recompute_size();
        self.refresh();
    }

    /// Scale model points about `origin`. Text scales its font proportionally.
    pub fn scale(&mut self, origin: Point, sx: f64, sy: f64) {
        let scale_point = |p: Point| {
            Point::new(
                origin.x + (p.x - origin.x) * sx,
                origin.y + (p.y - origin.y) * sy,
            )
        };
        match self.model.kind {
            ElementKind::Circle => {
                if let [center, edge, ..] = self.model.points.as_mut_slice() {
                    let factor = (sx.abs() + sy.abs()) / 2.0;
                    let radius = *edge - *center;
                    *center = scale_point(*center);
                    *edge = *center + radius * factor;
                }
            }
            ElementKind::Text => {
                for p in &mut self.model.points {
                    *p = scale_point(*p);
                }
                let factor = (sx.abs() + sy.abs()) / 2.0;
                let mut font = self.model.style.font_or_default();
                font.size = (font.size * factor).max(defaults::MIN_FONT_SIZE);
                self.model.style.font = Some(font);
            }
            _ => {
                for p in &mut self.model.points {
                    *p = scale_point(*p);
                }
            }
        }
        self.model.recompute_size();
        self.refresh();
    }

    pub fn set_rotation(&mut self, degrees: f64) {
        self.model.rotation = geometry::normalize_degrees(degrees);
        self.refresh();
    }

    /// Rotate around `pivot`: the center orbits the pivot and the rotation accumulates.
    pub fn rotate_about(&mut self, pivot: Point, degrees: f64) {
        let center = self.center();
        let moved = center.rotate_around(pivot, degrees) - center;
        for p in &mut self.model.points {
            *p = *p + moved;
        }
        self.model.rotation = geometry::normalize_degrees(self.model.rotation + degrees);
        self.model.recompute_size();
        self.refresh();
    }

    pub fn set_style(&mut self, style: ElementStyle) {
        self.model.style = style;
        self.model.recompute_size();
        self.refresh();
    }

    /// Hit-test a world point. Closed kinds test their area and outline;
    /// paths test distance to the stroke.
    pub fn contains_point(&self, world: Point, tolerance: f64) -> bool {
        let outline = &self.derived.path_points;
        if self.model.kind.is_closed() {
            geometry::point_in_polygon(world, outline)
                || geometry::distance_to_polyline(world, outline, true) <= tolerance
        } else {
            let reach = tolerance + self.model.style.stroke_width / 2.0;
            geometry::distance_to_polyline(world, outline, false) <= reach
        }
    }
}

// ==================== Factory ====================

/// Creates elements from a type tag.
pub struct ElementFactory;

impl ElementFactory {
    /// Create an element of the kind named by `tag`.
    ///
    /// Unknown tags are rejected rather than defaulted.
    pub fn create(tag: &str, points: Vec<Point>, style: ElementStyle) -> DrawingResult<Element> {
        let kind: ElementKind = tag.parse()?;
        let mut model = ElementModel::new(kind, points, style);
        if kind == ElementKind::Text {
            model.text = Some(String::new());
        }
        Self::build(model, &StageTransform::default())
    }

    pub fn text(anchor: Point, text: impl Into<String>, style: ElementStyle) -> DrawingResult<Element> {
        let mut model = ElementModel::new(ElementKind::Text, vec![anchor], style);
        model.text = Some(text.into());
        Self::build(model, &StageTransform::default())
    }

    pub fn image(
        corners: [Point; 2],
        source: impl Into<String>,
        style: ElementStyle,
    ) -> DrawingResult<Element> {
        let mut model = ElementModel::new(ElementKind::Image, corners.to_vec(), style);
        model.source = Some(source.into());
        Self::build(model, &StageTransform::default())
    }

    /// Validate `model` and wrap it in an element with a fresh id.
    pub fn build(model: ElementModel, stage: &StageTransform) -> DrawingResult<Element> {
        Element::from_model(ElementId::next(), model, stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Element {
        ElementFactory::create(
            "rectangle",
            vec![Point::new(x0, y0), Point::new(x1, y1)],
            ElementStyle::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let result = ElementFactory::create("hexagon", vec![Point::ZERO], ElementStyle::default());
        assert!(matches!(result, Err(DrawingError::UnknownElementType(_))));
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        let too_few = ElementFactory::create("polygon", vec![Point::ZERO, Point::new(1.0, 1.0)], ElementStyle::default());
        assert!(matches!(too_few, Err(DrawingError::InvalidGeometry(_))));

        let flat = ElementFactory::create("rectangle", vec![Point::ZERO, Point::new(10.0, 0.0)], ElementStyle::default());
        assert!(matches!(flat, Err(DrawingError::InvalidGeometry(_))));

        let no_source = ElementFactory::create("image", vec![Point::ZERO, Point::new(4.0, 4.0)], ElementStyle::default());
        assert!(matches!(no_source, Err(DrawingError::InvalidGeometry(_))));
    }

    #[test]
    fn test_rectangle_transform() {
        let mut e = rect(0.0, 0.0, 10.0, 10.0);
        e.transform(Point::new(5.0, 0.0));
        assert_eq!(e.model().points, vec![Point::new(5.0, 0.0), Point::new(15.0, 10.0)]);
        assert_eq!((e.model().width, e.model().height), (10.0, 10.0));
    }

    #[test]
    fn test_transform_inverse_restores_geometry() {
        let mut e = ElementFactory::create(
            "polygon",
            vec![Point::new(0.3, 0.1), Point::new(7.7, 2.2), Point::new(3.3, 9.9)],
            ElementStyle::default(),
        )
        .unwrap();
        e.set_rotation(33.0);
        let before = e.clone();
        let delta = Point::new(12.345, -6.789);
        e.transform(delta);
        e.transform(-delta);
        for (a, b) in e.path_points().iter().zip(before.path_points()) {
            assert!(a.approx_eq(*b, 1e-9));
        }
    }

    #[test]
    fn test_rotated_rectangle_outline() {
        let mut e = rect(0.0, 0.0, 10.0, 10.0);
        e.set_rotation(90.0);
        let outline = e.path_points();
        assert_eq!(outline.len(), 4);
        assert!(outline[0].approx_eq(Point::new(10.0, 0.0), 1e-9));
        assert_eq!(e.model().width, 10.0);
    }

    #[test]
    fn test_circle_and_ellipse_outline() {
        let circle = ElementFactory::create(
            "circle",
            vec![Point::new(5.0, 5.0), Point::new(8.0, 9.0)],
            ElementStyle::default(),
        )
        .unwrap();
        assert_eq!(circle.model().width, 10.0);
        assert_eq!(circle.path_points().len(), defaults::ELLIPSE_SEGMENTS);
        assert!(circle.contains_point(Point::new(5.0, 5.0), 0.0));
        assert!(!circle.contains_point(Point::new(5.0, 11.0), 0.5));
    }

    #[test]
    fn test_path_hit_uses_stroke_distance() {
        let path = ElementFactory::create(
            "path",
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)],
            ElementStyle::default(),
        )
        .unwrap();
        assert!(path.contains_point(Point::new(5.0, 1.5), 1.0));
        assert!(!path.contains_point(Point::new(5.0, 5.0), 1.0));
    }

    #[test]
    fn test_text_size_and_scale() {
        let mut t = ElementFactory::text(Point::ZERO, "abcd\nxy", ElementStyle::default()).unwrap();
        let expected_w = 4.0 * defaults::FONT_SIZE * defaults::TEXT_CHAR_WIDTH_SCALE;
        assert!((t.model().width - expected_w).abs() < 1e-9);

        t.scale(Point::ZERO, 0.01, 0.01);
        assert_eq!(t.model().style.font.as_ref().unwrap().size, defaults::MIN_FONT_SIZE);
    }

    #[test]
    fn test_rotate_about_pivot() {
        let mut e = rect(10.0, -1.0, 12.0, 1.0);
        e.rotate_about(Point::ZERO, 90.0);
        assert!(e.center().approx_eq(Point::new(0.0, 11.0), 1e-9));
        assert_eq!(e.rotation(), 90.0);
    }

    #[test]
    fn test_stage_points_follow_transform() {
        let mut e = rect(0.0, 0.0, 10.0, 10.0);
        let stage = StageTransform::new(100, 100).with_scale(2.0);
        e.refresh_stage_points(&stage);
        assert_eq!(e.derived().stage_points[1], Point::new(20.0, 20.0));
        e.transform(Point::new(1.0, 0.0));
        assert_eq!(e.derived().stage_points[0], Point::new(2.0, 0.0));
    }

    #[test]
    fn test_model_serializes_camel_case() {
        let e = rect(0.0, 0.0, 2.0, 2.0);
        let json = serde_json::to_value(e.model()).unwrap();
        assert_eq!(json["kind"], "rectangle");
        assert!(json["style"].get("strokeWidth").is_some());
        let back: ElementModel = serde_json::from_value(json).unwrap();
        assert_eq!(&back, e.model());
    }
}
