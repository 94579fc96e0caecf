use crate::error::{RenderError, RenderResult};
use crate::resources::ResourceCache;
use crate::surface::Surface;
use crate::types::{Color, DrawStyle, Point, Rectangle, TextStyle};

/// A drawable primitive in stage coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Closed outline, filled and/or stroked.
    Polygon { points: Vec<Point>, style: DrawStyle },
    /// Open outline, stroke only.
    Polyline { points: Vec<Point>, style: DrawStyle },
    /// Bitmap scaled into `dest` and rotated around its center.
    Image {
        source: String,
        dest: Rectangle,
        rotation: f64,
    },
    Text {
        text: String,
        position: Point,
        style: TextStyle,
        rotation: f64,
    },
}

/// Clear the whole surface, or only `region`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClearTask {
    pub region: Option<Rectangle>,
}

/// Draw one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementTask {
    pub element_id: u64,
    pub primitive: Primitive,
}

/// Draw the selection outline and its handles.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskTask {
    pub outline: Vec<Point>,
    pub border: Color,
    pub border_width: f64,
    pub dash_pattern: Option<Vec<f32>>,
    /// One closed polygon per handle.
    pub handles: Vec<Vec<Point>>,
    pub handle_fill: Color,
    pub handle_border: Color,
}

/// One unit of drawing work for a single layer surface.
///
/// Tasks read their inputs and write pixels; they never touch the element
/// model they were built from.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderTask {
    Clear(ClearTask),
    Element(ElementTask),
    Mask(MaskTask),
}

impl RenderTask {
    pub fn clear() -> Self {
        RenderTask::Clear(ClearTask::default())
    }

    pub fn clear_region(region: Rectangle) -> Self {
        RenderTask::Clear(ClearTask {
            region: Some(region),
        })
    }

    /// Short label for logs.
    pub fn describe(&self) -> String {
        match self {
            RenderTask::Clear(task) => match task.region {
                Some(r) => format!("clear {}x{}@{},{}", r.width, r.height, r.x, r.y),
                None => "clear".to_string(),
            },
            RenderTask::Element(task) => {
                let what = match &task.primitive {
                    Primitive::Polygon { .. } => "polygon",
                    Primitive::Polyline { .. } => "polyline",
                    Primitive::Image { .. } => "image",
                    Primitive::Text { .. } => "text",
                };
                format!("element #{} ({what})", task.element_id)
            }
            RenderTask::Mask(task) => format!("mask ({} handles)", task.handles.len()),
        }
    }

    /// Execute against `surface`. Without a bound surface this is a no-op.
    pub async fn run(
        &self,
        surface: Option<&mut dyn Surface>,
        resources: &ResourceCache,
    ) -> RenderResult<()> {
        let Some(surface) = surface else {
            return Ok(());
        };

        match self {
            RenderTask::Clear(task) => {
                match task.region {
                    Some(region) => surface.clear_rect(region),
                    None => surface.clear(),
                }
                Ok(())
            }
            RenderTask::Element(task) => draw_primitive(surface, &task.primitive, resources).await,
            RenderTask::Mask(task) => draw_mask(surface, task),
        }
    }
}

async fn draw_primitive(
    surface: &mut dyn Surface,
    primitive: &Primitive,
    resources: &ResourceCache,
) -> RenderResult<()> {
    match primitive {
        Primitive::Polygon { points, style } => {
            if let Some(fill) = style.fill_color {
                surface.fill_path(points, fill)?;
            }
            if let Some(stroke) = style.stroke_color {
                surface.stroke_path(
                    points,
                    true,
                    stroke,
                    style.stroke_width,
                    style.dash_pattern.as_deref(),
                )?;
            }
            Ok(())
        }
        Primitive::Polyline { points, style } => {
            let color = style.stroke_color.unwrap_or_default();
            surface.stroke_path(
                points,
                false,
                color,
                style.stroke_width,
                style.dash_pattern.as_deref(),
            )
        }
        Primitive::Image {
            source,
            dest,
            rotation,
        } => {
            let image = resources.image(source).await?;
            surface.draw_image(&image, *dest, *rotation)
        }
        Primitive::Text {
            text,
            position,
            style,
            rotation,
        } => {
            if text.is_empty() {
                return Ok(());
            }
            surface.draw_text(text, *position, style, *rotation, resources.fonts())
        }
    }
}

fn draw_mask(surface: &mut dyn Surface, task: &MaskTask) -> RenderResult<()> {
    if task.outline.len() < 2 {
        return Err(RenderError::InvalidGeometry(format!(
            "mask outline with {} points",
            task.outline.len()
        )));
    }
    surface.stroke_path(
        &task.outline,
        true,
        task.border,
        task.border_width,
        task.dash_pattern.as_deref(),
    )?;
    for handle in &task.handles {
        surface.fill_path(handle, task.handle_fill)?;
        surface.stroke_path(handle, true, task.handle_border, 1.0, None)?;
    }
    Ok(())
}
