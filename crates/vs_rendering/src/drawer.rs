use crate::error::RenderResult;
use crate::layer::LayerKind;
use crate::resources::ResourceCache;
use crate::surface::{PixmapSurface, Surface};
use crate::task::RenderTask;

/// Outcome of one drawer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub layer: LayerKind,
    pub executed: usize,
    pub failed: usize,
    /// Tasks drained without a bound surface.
    pub skipped: usize,
}

impl FrameReport {
    fn empty(layer: LayerKind) -> Self {
        Self {
            layer,
            executed: 0,
            failed: 0,
            skipped: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.executed + self.failed + self.skipped
    }
}

/// Owns one layer surface and its per-frame task queue.
#[derive(Debug)]
pub struct Drawer {
    layer: LayerKind,
    surface: Option<PixmapSurface>,
    queue: Vec<RenderTask>,
}

impl Drawer {
    /// Drawer with its own `width` x `height` surface.
    pub fn new(layer: LayerKind, width: u32, height: u32) -> RenderResult<Self> {
        Ok(Self {
            layer,
            surface: Some(PixmapSurface::new(width, height)?),
            queue: Vec::new(),
        })
    }

    /// Drawer with no surface bound. Its runs drain the queue without painting.
    pub fn detached(layer: LayerKind) -> Self {
        Self {
            layer,
            surface: None,
            queue: Vec::new(),
        }
    }

    pub fn layer(&self) -> LayerKind {
        self.layer
    }

    pub fn surface(&self) -> Option<&PixmapSurface> {
        self.surface.as_ref()
    }

    /// Reallocate the surface at a new size. Detached drawers stay detached.
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if self.surface.is_some() {
            self.surface = Some(PixmapSurface::new(width, height)?);
        }
        Ok(())
    }

    pub fn set_queue(&mut self, tasks: Vec<RenderTask>) {
        self.queue = tasks;
    }

    pub fn push(&mut self, task: RenderTask) {
        self.queue.push(task);
    }

    pub fn queue(&self) -> &[RenderTask] {
        &self.queue
    }

    /// Drop pending tasks without running them.
    pub fn discard_queue(&mut self) {
        self.queue.clear();
    }

    /// Clear the bound surface immediately.
    pub fn clear_surface(&mut self) {
        if let Some(surface) = self.surface.as_mut() {
            surface.clear();
        }
    }

    /// Drain the queue, running each task after the previous one resolves.
    ///
    /// A failing task is logged and counted; later tasks still run.
    pub async fn run(&mut self, resources: &ResourceCache) -> FrameReport {
        let mut report = FrameReport::empty(self.layer);
        let tasks = std::mem::take(&mut self.queue);

        for task in &tasks {
            let Some(surface) = self.surface.as_mut() else {
                report.skipped += 1;
                continue;
            };
            match task.run(Some(surface as &mut dyn Surface), resources).await {
                Ok(()) => report.executed += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        layer = ?self.layer,
                        task = %task.describe(),
                        error = %e,
                        "render task failed"
                    );
                }
            }
        }

        tracing::debug!(
            layer = ?self.layer,
            executed = report.executed,
            failed = report.failed,
            skipped = report.skipped,
            "drawer run finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{ElementTask, Primitive};
    use crate::types::{Color, DrawStyle, Rectangle};

    fn fill(id: u64, rect: Rectangle, color: Color) -> RenderTask {
        RenderTask::Element(ElementTask {
            element_id: id,
            primitive: Primitive::Polygon {
                points: rect.corners().to_vec(),
                style: DrawStyle {
                    fill_color: Some(color),
                    stroke_color: None,
                    ..DrawStyle::default()
                },
            },
        })
    }

    fn broken_image(id: u64) -> RenderTask {
        RenderTask::Element(ElementTask {
            element_id: id,
            primitive: Primitive::Image {
                source: "/missing.png".to_string(),
                dest: Rectangle::new(0.0, 0.0, 4.0, 4.0),
                rotation: 0.0,
            },
        })
    }

    #[tokio::test]
    async fn test_tasks_run_in_order() {
        let resources = ResourceCache::new();
        let mut drawer = Drawer::new(LayerKind::Content, 10, 10).unwrap();
        let rect = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        drawer.set_queue(vec![
            RenderTask::clear(),
            fill(1, rect, Color::rgb(1.0, 0.0, 0.0)),
            fill(2, rect, Color::rgb(0.0, 0.0, 1.0)),
        ]);

        let report = drawer.run(&resources).await;
        assert_eq!(report.executed, 3);
        assert!(drawer.queue().is_empty());
        assert_eq!(drawer.surface().unwrap().pixel(5, 5), Some([0, 0, 255, 255]));
    }

    #[tokio::test]
    async fn test_failed_task_does_not_abort_frame() {
        let resources = ResourceCache::new();
        let mut drawer = Drawer::new(LayerKind::Content, 10, 10).unwrap();
        drawer.push(RenderTask::clear());
        drawer.push(broken_image(1));
        drawer.push(fill(2, Rectangle::new(0.0, 0.0, 10.0, 10.0), Color::BLACK));

        let report = drawer.run(&resources).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.executed, 2);
        assert!(!drawer.surface().unwrap().is_blank());
    }

    #[tokio::test]
    async fn test_detached_drawer_skips() {
        let resources = ResourceCache::new();
        let mut drawer = Drawer::detached(LayerKind::Mask);
        drawer.push(RenderTask::clear());
        let report = drawer.run(&resources).await;
        assert_eq!(report.skipped, 1);
        assert_eq!(report.total(), 1);
    }

    #[tokio::test]
    async fn test_discard_queue_and_clear() {
        let resources = ResourceCache::new();
        let mut drawer = Drawer::new(LayerKind::Provisional, 8, 8).unwrap();
        drawer.push(fill(1, Rectangle::new(0.0, 0.0, 8.0, 8.0), Color::BLACK));
        drawer.run(&resources).await;
        assert!(!drawer.surface().unwrap().is_blank());

        drawer.push(fill(2, Rectangle::new(0.0, 0.0, 8.0, 8.0), Color::WHITE));
        drawer.discard_queue();
        drawer.clear_surface();
        assert!(drawer.queue().is_empty());
        assert!(drawer.surface().unwrap().is_blank());
    }
}
