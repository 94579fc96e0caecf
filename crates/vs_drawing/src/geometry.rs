//! Stateless geometry helpers and the stage/world mapping.

use vs_rendering::{Point, Rectangle};

/// Ray-casting point-in-polygon test. Points on the boundary may go either way.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y) {
            let x_cross = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Shortest distance from `point` to the segment `a`-`b`.
pub fn distance_to_segment(point: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return point.distance_to(a);
    }
    let t = (((point.x - a.x) * dx + (point.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    point.distance_to(Point::new(a.x + t * dx, a.y + t * dy))
}

/// Shortest distance from `point` to a polyline, optionally closed.
pub fn distance_to_polyline(point: Point, points: &[Point], closed: bool) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => point.distance_to(*only),
        _ => {
            let mut best = points
                .windows(2)
                .map(|w| distance_to_segment(point, w[0], w[1]))
                .fold(f64::INFINITY, f64::min);
            if closed && let (Some(first), Some(last)) = (points.first(), points.last()) {
                best = best.min(distance_to_segment(point, *last, *first));
            }
            best
        }
    }
}

/// Direction from `from` to `to` in degrees, clockwise from +x (y down).
pub fn angle_deg(from: Point, to: Point) -> f64 {
    (to.y - from.y).atan2(to.x - from.x).to_degrees()
}

/// Wrap an angle into `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Whether two angles describe the same orientation.
pub fn same_angle(a: f64, b: f64) -> bool {
    let diff = normalize_degrees(a - b);
    diff < 1e-6 || 360.0 - diff < 1e-6
}

/// Unsigned area enclosed by `points` taken as a closed ring.
pub fn polygon_area(points: &[Point]) -> f64 {
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();
    twice.abs() / 2.0
}

/// Center of the bounding box of `points`.
pub fn bounds_center(points: &[Point]) -> Point {
    Rectangle::enclosing(points).map_or(Point::ZERO, |r| r.center())
}

/// `segments`-gon approximating an axis-aligned ellipse.
pub fn ellipse_points(center: Point, rx: f64, ry: f64, segments: usize) -> Vec<Point> {
    let step = std::f64::consts::TAU / segments as f64;
    (0..segments)
        .map(|i| {
            let (sin, cos) = (step * i as f64).sin_cos();
            Point::new(center.x + rx * cos, center.y + ry * sin)
        })
        .collect()
}

/// Square of side `size` centered on `center`, rotated by `degrees`.
pub fn square_around(center: Point, size: f64, degrees: f64) -> Vec<Point> {
    let half = size / 2.0;
    Rectangle::new(center.x - half, center.y - half, size, size)
        .corners()
        .iter()
        .map(|p| p.rotate_around(center, degrees))
        .collect()
}

/// Mapping between world coordinates and stage (canvas pixel) coordinates.
///
/// `origin` is the world point shown at the stage's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageTransform {
    pub origin: Point,
    pub scale: f64,
    pub width: u32,
    pub height: u32,
}

impl StageTransform {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            origin: Point::ZERO,
            scale: 1.0,
            width,
            height,
        }
    }

    pub fn with_origin(mut self, origin: Point) -> Self {
        self.origin = origin;
        self
    }

    /// Zoom factor. Non-positive values are ignored.
    pub fn with_scale(mut self, scale: f64) -> Self {
        if scale > 0.0 && scale.is_finite() {
            self.scale = scale;
        }
        self
    }

    #[inline]
    pub fn world_to_stage(&self, world: Point) -> Point {
        (world - self.origin) * self.scale
    }

    #[inline]
    pub fn stage_to_world(&self, stage: Point) -> Point {
        Point::new(stage.x / self.scale, stage.y / self.scale) + self.origin
    }

    /// Stage pixels to world distance.
    #[inline]
    pub fn stage_dist_to_world(&self, distance: f64) -> f64 {
        distance / self.scale
    }

    pub fn map_to_stage(&self, points: &[Point]) -> Vec<Point> {
        points.iter().map(|p| self.world_to_stage(*p)).collect()
    }

    /// World rectangle covered by the stage.
    pub fn visible_world(&self) -> Rectangle {
        Rectangle::new(
            self.origin.x,
            self.origin.y,
            f64::from(self.width) / self.scale,
            f64::from(self.height) / self.scale,
        )
    }
}

impl Default for StageTransform {
    fn default() -> Self {
        Self::new(1, 1)
    }
}
