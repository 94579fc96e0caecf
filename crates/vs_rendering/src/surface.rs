use std::fmt::Write as _;
use std::sync::Arc;

use tiny_skia::{
    BlendMode, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, StrokeDash, Transform,
};

use crate::error::{RenderError, RenderResult};
use crate::resources::FontDatabase;
use crate::types::{Color, Point, Rectangle, TextStyle};

/// Line height relative to font size for multi-line text.
const TEXT_LINE_HEIGHT_SCALE: f64 = 1.35;
/// Baseline offset relative to font size (text is anchored at its top-left).
const TEXT_BASELINE_SCALE: f64 = 0.8;

/// The 2D drawing surface a render task writes to.
///
/// Coordinates are stage (screen) pixels. Implementations must treat every
/// call as an immediate write; later calls paint over earlier ones.
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Clear the whole surface to transparent.
    fn clear(&mut self);

    /// Clear one region to transparent.
    fn clear_rect(&mut self, rect: Rectangle);

    /// Fill a closed polygon.
    fn fill_path(&mut self, points: &[Point], color: Color) -> RenderResult;

    /// Stroke a polyline, optionally closing it.
    fn stroke_path(
        &mut self,
        points: &[Point],
        closed: bool,
        color: Color,
        width: f64,
        dash_pattern: Option<&[f32]>,
    ) -> RenderResult;

    /// Draw a bitmap scaled into `dest`, rotated by `rotation` degrees around the dest center.
    fn draw_image(&mut self, image: &Pixmap, dest: Rectangle, rotation: f64) -> RenderResult;

    /// Draw text with its top-left at `position`, rotated around that point.
    fn draw_text(
        &mut self,
        text: &str,
        position: Point,
        style: &TextStyle,
        rotation: f64,
        fonts: &FontDatabase,
    ) -> RenderResult;
}

/// `Surface` backed by a tiny-skia pixmap.
#[derive(Clone)]
pub struct PixmapSurface {
    pixmap: Pixmap,
}

impl std::fmt::Debug for PixmapSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixmapSurface")
            .field("width", &self.pixmap.width())
            .field("height", &self.pixmap.height())
            .finish()
    }
}

impl PixmapSurface {
    /// Allocate a transparent surface. Zero-sized surfaces are rejected.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        let pixmap = Pixmap::new(width, height).ok_or_else(|| {
            RenderError::SurfaceUnavailable(format!("cannot allocate {width}x{height} surface"))
        })?;
        Ok(Self { pixmap })
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Premultiplied RGBA of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixmap
            .pixel(x, y)
            .map(|p| [p.red(), p.green(), p.blue(), p.alpha()])
    }

    /// True when every pixel is fully transparent.
    pub fn is_blank(&self) -> bool {
        self.pixmap.pixels().iter().all(|p| p.alpha() == 0)
    }

    /// Raw premultiplied RGBA bytes.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// Paint `other` over this surface at the origin.
    pub fn composite(&mut self, other: &PixmapSurface) {
        self.pixmap.draw_pixmap(
            0,
            0,
            other.pixmap.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    pub fn encode_png(&self) -> RenderResult<Vec<u8>> {
        self.pixmap
            .encode_png()
            .map_err(|e| RenderError::Encode(e.to_string()))
    }
}

fn build_path(points: &[Point], closed: bool) -> RenderResult<tiny_skia::Path> {
    let (first, rest) = points
        .split_first()
        .ok_or_else(|| RenderError::InvalidGeometry("empty path".to_string()))?;

    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    for p in rest {
        pb.line_to(p.x as f32, p.y as f32);
    }
    if closed {
        pb.close();
    }
    pb.finish()
        .ok_or_else(|| RenderError::InvalidGeometry(format!("degenerate path ({} points)", points.len())))
}

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}

impl Surface for PixmapSurface {
    fn width(&self) -> u32 {
        self.pixmap.width()
    }

    fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn clear(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    fn clear_rect(&mut self, rect: Rectangle) {
        let Some(r) = tiny_skia::Rect::from_xywh(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
        ) else {
            return;
        };
        let paint = Paint {
            blend_mode: BlendMode::Clear,
            ..Paint::default()
        };
        self.pixmap.fill_rect(r, &paint, Transform::identity(), None);
    }

    fn fill_path(&mut self, points: &[Point], color: Color) -> RenderResult {
        let path = build_path(points, true)?;
        self.pixmap.fill_path(
            &path,
            &solid_paint(color),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
        Ok(())
    }

    fn stroke_path(
        &mut self,
        points: &[Point],
        closed: bool,
        color: Color,
        width: f64,
        dash_pattern: Option<&[f32]>,
    ) -> RenderResult {
        let path = build_path(points, closed)?;
        let mut stroke = Stroke {
            width: width.max(0.0) as f32,
            ..Stroke::default()
        };
        if let Some(pattern) = dash_pattern {
            stroke.dash = StrokeDash::new(pattern.to_vec(), 0.0);
        }
        self.pixmap.stroke_path(
            &path,
            &solid_paint(color),
            &stroke,
            Transform::identity(),
            None,
        );
        Ok(())
    }

    fn draw_image(&mut self, image: &Pixmap, dest: Rectangle, rotation: f64) -> RenderResult {
        if dest.width <= 0.0 || dest.height <= 0.0 {
            return Err(RenderError::InvalidGeometry(format!(
                "image destination {}x{}",
                dest.width, dest.height
            )));
        }
        let sx = dest.width as f32 / image.width() as f32;
        let sy = dest.height as f32 / image.height() as f32;
        let center = dest.center();
        let transform = Transform::from_rotate_at(rotation as f32, center.x as f32, center.y as f32)
            .pre_concat(Transform::from_row(sx, 0.0, 0.0, sy, dest.x as f32, dest.y as f32));

        self.pixmap.draw_pixmap(
            0,
            0,
            image.as_ref(),
            &PixmapPaint::default(),
            transform,
            None,
        );
        Ok(())
    }

    fn draw_text(
        &mut self,
        text: &str,
        position: Point,
        style: &TextStyle,
        rotation: f64,
        fonts: &FontDatabase,
    ) -> RenderResult {
        if fonts.len() == 0 {
            return Err(RenderError::ResourceUnavailable(format!(
                "no fonts loaded for '{}'",
                style.font_family
            )));
        }

        let svg = text_svg(text, position, style, rotation, self.width(), self.height());
        let mut options = usvg::Options::default();
        options.fontdb = Arc::clone(fonts);
        let tree = usvg::Tree::from_str(&svg, &options)
            .map_err(|e| RenderError::Decode(format!("text layout: {e}")))?;

        resvg::render(&tree, Transform::identity(), &mut self.pixmap.as_mut());
        Ok(())
    }
}

/// Build a surface-sized SVG document holding one `<text>` per line.
fn text_svg(
    text: &str,
    position: Point,
    style: &TextStyle,
    rotation: f64,
    width: u32,
    height: u32,
) -> String {
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    let _ = write!(
        svg,
        r#"<g transform="rotate({rotation} {} {})" font-family="{}" font-size="{}" fill="{}" fill-opacity="{}">"#,
        position.x,
        position.y,
        escape_xml(&style.font_family),
        style.font_size,
        style.color.to_hex(),
        style.color.a,
    );
    for (i, line) in text.lines().enumerate() {
        let baseline = position.y
            + style.font_size * TEXT_BASELINE_SCALE
            + i as f64 * style.font_size * TEXT_LINE_HEIGHT_SCALE;
        let _ = write!(
            svg,
            r#"<text x="{}" y="{baseline}" xml:space="preserve">{}</text>"#,
            position.x,
            escape_xml(line)
        );
    }
    svg.push_str("</g></svg>");
    svg
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
