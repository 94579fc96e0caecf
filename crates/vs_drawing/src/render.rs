//! Turns elements and the selection mask into render tasks.

use vs_rendering::{
    Color, DrawStyle, ElementTask, MaskTask, Point, Primitive, Rectangle, RenderTask, TextStyle,
};

use crate::element::{Element, ElementModel};
use crate::geometry::StageTransform;
use crate::selection::MaskModel;
use crate::transformer::TransformerSet;
use crate::types::ElementKind;

/// Dash pattern of the selection outline, in stage pixels.
pub const MASK_DASH: [f32; 2] = [4.0, 3.0];

fn draw_style(model: &ElementModel, stage: &StageTransform) -> DrawStyle {
    DrawStyle {
        stroke_color: model.style.stroke,
        fill_color: model.style.fill,
        stroke_width: model.style.stroke_width * stage.scale,
        dash_pattern: None,
    }
}

/// Render task for one element at its current derived state.
pub fn element_task(element: &Element, stage: &StageTransform) -> RenderTask {
    let model = element.model();
    let primitive = match model.kind {
        ElementKind::Rectangle | ElementKind::Ellipse | ElementKind::Circle | ElementKind::Polygon => {
            Primitive::Polygon {
                points: element.stage_path().to_vec(),
                style: draw_style(model, stage),
            }
        }
        ElementKind::Path => Primitive::Polyline {
            points: element.stage_path().to_vec(),
            style: draw_style(model, stage),
        },
        ElementKind::Image => {
            let local = model.local_box();
            let center = stage.world_to_stage(local.center());
            let (w, h) = (local.width * stage.scale, local.height * stage.scale);
            Primitive::Image {
                source: model.source.clone().unwrap_or_default(),
                dest: Rectangle::new(center.x - w / 2.0, center.y - h / 2.0, w, h),
                rotation: model.rotation,
            }
        }
        ElementKind::Text => {
            let font = model.style.font_or_default();
            // top-left corner after rotation about the element center
            let anchor = model.points.first().copied().unwrap_or_default();
            let rotated = anchor.rotate_around(model.center(), model.rotation);
            Primitive::Text {
                text: model.text.clone().unwrap_or_default(),
                position: stage.world_to_stage(rotated),
                style: TextStyle {
                    font_size: font.size * stage.scale,
                    color: model.style.fill.or(model.style.stroke).unwrap_or(Color::BLACK),
                    font_family: font.family,
                },
                rotation: model.rotation,
            }
        }
    };
    RenderTask::Element(ElementTask {
        element_id: element.id().get(),
        primitive,
    })
}

/// Clear followed by every element in draw order.
pub fn content_queue<'a>(
    elements: impl IntoIterator<Item = &'a Element>,
    stage: &StageTransform,
) -> Vec<RenderTask> {
    std::iter::once(RenderTask::clear())
        .chain(elements.into_iter().map(|e| element_task(e, stage)))
        .collect()
}

/// Outline and handles of the selection mask.
pub fn mask_task(
    mask: &MaskModel,
    handles: &TransformerSet,
    stage: &StageTransform,
    color: Color,
) -> RenderTask {
    let outline: Vec<Point> = mask
        .corners()
        .iter()
        .map(|p| stage.world_to_stage(*p))
        .collect();
    RenderTask::Mask(MaskTask {
        outline,
        border: color,
        border_width: 1.0,
        dash_pattern: Some(MASK_DASH.to_vec()),
        handles: handles.outlines(mask, stage),
        handle_fill: Color::WHITE,
        handle_border: color,
    })
}

/// Clear followed by the mask, when there is one.
pub fn mask_queue(
    mask: Option<&MaskModel>,
    handles: &TransformerSet,
    stage: &StageTransform,
    color: Color,
) -> Vec<RenderTask> {
    let mut queue = vec![RenderTask::clear()];
    if let Some(mask) = mask {
        queue.push(mask_task(mask, handles, stage, color));
    }
    queue
}

/// Preview of an in-progress gesture: the outline it would commit, dashed.
pub fn provisional_queue(outline: &[Point], style: &DrawStyle, closed: bool) -> Vec<RenderTask> {
    let mut queue = vec![RenderTask::clear()];
    if outline.len() >= 2 {
        let style = DrawStyle {
            dash_pattern: Some(MASK_DASH.to_vec()),
            ..style.clone()
        };
        let primitive = if closed {
            Primitive::Polygon {
                points: outline.to_vec(),
                style,
            }
        } else {
            Primitive::Polyline {
                points: outline.to_vec(),
                style,
            }
        };
        queue.push(RenderTask::Element(ElementTask {
            element_id: 0,
            primitive,
        }));
    }
    queue
}
