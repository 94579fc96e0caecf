use std::cell::Cell;
use std::rc::Rc;

use vs_rendering::{
    Color, DrawStyle, Drawer, FrameReport, LayerInvalidation, LayerKind, PixmapSurface, Point,
    RenderTask, ResourceCache,
};
use vs_settings::Settings;

use crate::collection::SubscriptionId;
use crate::element::{Element, ElementFactory, ElementModel, ElementStyle};
use crate::error::{DrawingError, DrawingResult};
use crate::geometry::{self, StageTransform};
use crate::history::{Command, Document, ElementSnapshot, SnapshotCommand, UndoRedoStack};
use crate::render;
use crate::selection::{Boxer, MaskModel, Selection};
use crate::transformer::TransformerSet;
use crate::types::{ElementId, ElementKind, HandleDirection, PointerInput};

/// Smallest width or height a resize may produce, in world units.
pub const MIN_RESIZE_EXTENT: f64 = 1.0;

/// What a stage point hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Handle(HandleDirection),
    Element(ElementId),
}

/// Result of one `render_frame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFrame {
    /// Layers whose queues were rebuilt, in composition order.
    pub rebuilt: Vec<LayerKind>,
    pub reports: Vec<FrameReport>,
}

impl StageFrame {
    /// Failed tasks across all layers.
    pub fn failed(&self) -> usize {
        self.reports.iter().map(|r| r.failed).sum()
    }

    /// Report for `layer`, if it ran this frame.
    pub fn report(&self, layer: LayerKind) -> Option<&FrameReport> {
        self.reports.iter().find(|r| r.layer == layer)
    }
}

/// In-progress drawing gesture.
#[derive(Debug, Clone)]
struct Draft {
    kind: ElementKind,
    points: Vec<Point>,
    style: ElementStyle,
    text: String,
}

impl Draft {
    fn model(&self) -> ElementModel {
        let mut model = ElementModel::new(self.kind, self.points.clone(), self.style.clone());
        if self.kind == ElementKind::Text {
            model.text = Some(self.text.clone());
            model.recompute_size();
        }
        model
    }

    /// Why the gesture would commit nothing visible, if it would.
    fn degenerate_reason(&self) -> Option<&'static str> {
        match self.kind {
            ElementKind::Path if self.points.windows(2).all(|w| w[0] == w[1]) => {
                Some("path has no extent")
            }
            ElementKind::Polygon if geometry::polygon_area(&self.points) < f64::EPSILON => {
                Some("polygon has zero area")
            }
            ElementKind::Text if self.text.trim().is_empty() => Some("text is empty"),
            _ => None,
        }
    }
}

/// One open drawing document with its layers, selection and history.
pub struct Stage {
    document: Document,
    selection: Selection,
    boxer: Boxer,
    history: UndoRedoStack,
    transformers: TransformerSet,
    content: Drawer,
    mask: Drawer,
    provisional: Drawer,
    resources: ResourceCache,
    settings: Settings,
    invalidation: LayerInvalidation,
    content_dirty: Rc<Cell<bool>>,
    subscription: SubscriptionId,
    draft: Option<Draft>,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("elements", &self.document.elements.len())
            .field("selection", &self.selection)
            .field("undo", &self.history.undo_count())
            .field("redo", &self.history.redo_count())
            .field("transform", self.document.stage())
            .finish()
    }
}

impl Stage {
    /// Open a stage with `width` x `height` layer surfaces.
    pub fn open(settings: Settings, width: u32, height: u32) -> DrawingResult<Self> {
        let mut document = Document::new(StageTransform::new(width, height));
        let content_dirty = Rc::new(Cell::new(true));
        let flag = Rc::clone(&content_dirty);
        let subscription = document.elements.subscribe(move |changes| {
            if !changes.is_empty() {
                flag.set(true);
            }
        });

        let stage = Self {
            document,
            selection: Selection::new(),
            boxer: Boxer::new(),
            history: UndoRedoStack::with_capacity(settings.history_limit),
            transformers: TransformerSet::from_settings(&settings),
            content: Drawer::new(LayerKind::Content, width, height)?,
            mask: Drawer::new(LayerKind::Mask, width, height)?,
            provisional: Drawer::new(LayerKind::Provisional, width, height)?,
            resources: ResourceCache::new(),
            settings,
            invalidation: LayerInvalidation::new(),
            content_dirty,
            subscription,
            draft: None,
        };
        tracing::info!(width, height, "stage opened");
        Ok(stage)
    }

    /// Use `resources` for images and fonts.
    pub fn with_resources(mut self, resources: ResourceCache) -> Self {
        self.resources = resources;
        self.invalidation.invalidate(LayerKind::Content);
        self
    }

    /// Tear down. Pending queues are dropped unrun.
    pub fn close(mut self) {
        self.document.elements.unsubscribe(self.subscription);
        for drawer in [&mut self.content, &mut self.mask, &mut self.provisional] {
            drawer.discard_queue();
        }
        tracing::info!(
            elements = self.document.elements.len(),
            undo = self.history.undo_count(),
            "stage closed"
        );
    }

    // ==================== Accessors ====================

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Element by id.
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.document.get(id)
    }

    /// Element ids in draw order.
    pub fn element_ids(&self) -> Vec<ElementId> {
        self.document.elements.keys().to_vec()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Envelope of the current selection.
    pub fn mask(&self) -> Option<&MaskModel> {
        self.boxer.model()
    }

    pub fn history(&self) -> &UndoRedoStack {
        &self.history
    }

    /// Mutable history, for subscribing to its events.
    pub fn history_mut(&mut self) -> &mut UndoRedoStack {
        &mut self.history
    }

    pub fn transformers(&self) -> &TransformerSet {
        &self.transformers
    }

    pub fn resources(&self) -> &ResourceCache {
        &self.resources
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// World to stage mapping of the current viewport.
    pub fn transform(&self) -> &StageTransform {
        self.document.stage()
    }

    pub fn invalidation(&self) -> &LayerInvalidation {
        &self.invalidation
    }

    /// Surface backing `layer`, if it has one.
    pub fn surface(&self, layer: LayerKind) -> Option<&PixmapSurface> {
        self.drawer(layer).surface()
    }

    /// Compose every layer in z-order onto one surface.
    pub fn flatten(&self) -> DrawingResult<PixmapSurface> {
        let stage = self.document.stage();
        let mut flat = PixmapSurface::new(stage.width, stage.height)?;
        for layer in LayerKind::all_layers() {
            if let Some(surface) = self.surface(*layer) {
                flat.composite(surface);
            }
        }
        Ok(flat)
    }

    /// Whether a draw gesture is in progress.
    pub fn is_drawing(&self) -> bool {
        self.draft.is_some()
    }

    fn drawer(&self, layer: LayerKind) -> &Drawer {
        match layer {
            LayerKind::Content => &self.content,
            LayerKind::Mask => &self.mask,
            LayerKind::Provisional => &self.provisional,
        }
    }

    /// Swap settings; handles and history limit follow.
    pub fn apply_settings(&mut self, settings: Settings) {
        self.transformers = TransformerSet::from_settings(&settings);
        self.history.set_limit(settings.history_limit);
        self.settings = settings;
        self.invalidation.invalidate(LayerKind::Mask);
    }

    fn mask_color(&self) -> Color {
        let (r, g, b) = self.settings.mask_color;
        Color::from_rgba8(r, g, b, 255)
    }

    // ==================== Document edits ====================

    fn commit(&mut self, mut command: SnapshotCommand) -> DrawingResult<()> {
        command.redo(&mut self.document)?;
        self.history.add(Box::new(command));
        Ok(())
    }

    /// Drop stale selection ids and recompute the mask.
    fn sync_selection(&mut self, shared_angle: Option<f64>) {
        let elements = &self.document.elements;
        self.selection.retain_existing(|id| elements.contains_key(&id));
        self.refresh_mask(shared_angle);
    }

    fn refresh_mask(&mut self, shared_angle: Option<f64>) {
        let selected: Vec<&Element> = self
            .selection
            .ids()
            .iter()
            .filter_map(|id| self.document.get(*id))
            .collect();
        self.boxer.set_model(Boxer::compute(&selected, shared_angle));
        self.invalidation.invalidate(LayerKind::Mask);
    }

    fn mask_angle(&self) -> Option<f64> {
        self.boxer.model().map(|m| m.angle)
    }

    fn indexed(&self, ids: &[ElementId]) -> DrawingResult<Vec<(usize, &Element)>> {
        let mut pairs = Vec::with_capacity(ids.len());
        for id in ids {
            let element = self
                .document
                .get(*id)
                .ok_or(DrawingError::ElementNotFound(*id))?;
            let index = self
                .document
                .elements
                .index_of(id)
                .ok_or(DrawingError::ElementNotFound(*id))?;
            if !pairs.iter().any(|(_, e): &(usize, &Element)| e.id() == *id) {
                pairs.push((index, element));
            }
        }
        Ok(pairs)
    }

    /// Edit clones of the elements, then commit one modify command.
    fn modify_elements(
        &mut self,
        ids: &[ElementId],
        mut edit: impl FnMut(&mut Element),
    ) -> DrawingResult<bool> {
        let mut before = Vec::with_capacity(ids.len());
        let mut after = Vec::with_capacity(ids.len());
        for (index, element) in self.indexed(ids)? {
            let mut edited = element.clone();
            edit(&mut edited);
            if edited.model() == element.model() {
                continue;
            }
            edited.model().validate()?;
            before.push(snapshot(index, element.id(), element.model()));
            after.push(snapshot(index, element.id(), edited.model()));
        }
        if after.is_empty() {
            return Ok(false);
        }
        self.commit(SnapshotCommand::modify(before, after))?;
        Ok(true)
    }

    /// Append an element on top.
    pub fn add_element(&mut self, mut element: Element) -> DrawingResult<ElementId> {
        let id = element.id();
        if self.document.elements.contains_key(&id) {
            return Err(DrawingError::InvalidGeometry(format!(
                "element {id} is already on the stage"
            )));
        }
        element.refresh_stage_points(self.document.stage());
        let index = self.document.elements.len();
        self.commit(SnapshotCommand::add(&[(index, &element)]))?;
        tracing::debug!(%id, kind = %element.kind(), "element added");
        Ok(id)
    }

    /// Remove elements in one undoable step. Returns how many were removed.
    pub fn remove_elements(&mut self, ids: &[ElementId]) -> DrawingResult<usize> {
        let command = {
            let pairs = self.indexed(ids)?;
            if pairs.is_empty() {
                return Ok(0);
            }
            SnapshotCommand::remove(&pairs)
        };
        let count = command.record().targets().len();
        self.commit(command)?;
        self.sync_selection(None);
        Ok(count)
    }

    /// Translate elements by `offset` (world).
    pub fn transform_elements(&mut self, ids: &[ElementId], offset: Point) -> DrawingResult<bool> {
        if offset == Point::ZERO {
            return Ok(false);
        }
        let angle = self.mask_angle();
        let changed = self.modify_elements(ids, |e| e.transform(offset))?;
        self.sync_selection(angle);
        Ok(changed)
    }

    /// Rotate elements by `degrees` around `pivot`, or around their common box center.
    pub fn rotate_elements(
        &mut self,
        ids: &[ElementId],
        degrees: f64,
        pivot: Option<Point>,
    ) -> DrawingResult<bool> {
        if degrees == 0.0 {
            return Ok(false);
        }
        let shared = if ids == self.selection.ids() {
            self.mask_angle()
        } else {
            None
        };
        let pivot = match pivot {
            Some(p) => p,
            None => {
                let elements: Vec<&Element> = self.indexed(ids)?.into_iter().map(|(_, e)| e).collect();
                match Boxer::compute(&elements, shared) {
                    Some(mask) => mask.center,
                    None => return Ok(false),
                }
            }
        };
        let changed = self.modify_elements(ids, |e| e.rotate_about(pivot, degrees))?;
        self.sync_selection(Some(shared.unwrap_or(0.0) + degrees));
        Ok(changed)
    }

    /// Rotate the selection by the pointer's sweep around the mask center.
    pub fn rotate_selection_by_pointer(&mut self, from: Point, to: Point) -> DrawingResult<bool> {
        let Some(mask) = self.boxer.model().copied() else {
            return Ok(false);
        };
        let (Some(start), Some(end)) = (
            self.transformers.rotation_angle(&mask, from),
            self.transformers.rotation_angle(&mask, to),
        ) else {
            return Ok(false);
        };
        let ids = self.selection.ids().to_vec();
        self.rotate_elements(&ids, end - start, Some(mask.center))
    }

    /// Drag the selection's `direction` handle to `pointer` (world).
    pub fn resize_selection(
        &mut self,
        direction: HandleDirection,
        pointer: Point,
    ) -> DrawingResult<bool> {
        let Some(old) = self.boxer.model().copied() else {
            return Ok(false);
        };
        let Some(new) = self.transformers.resize(direction, &old, pointer) else {
            return Ok(false);
        };
        if new.width < MIN_RESIZE_EXTENT || new.height < MIN_RESIZE_EXTENT {
            return Ok(false);
        }
        let sx = if old.width > 0.0 { new.width / old.width } else { 1.0 };
        let sy = if old.height > 0.0 { new.height / old.height } else { 1.0 };

        let ids = self.selection.ids().to_vec();
        let changed = self.modify_elements(&ids, |e| {
            let center = e.center();
            let local = old.to_local(center);
            let target = new.to_world(Point::new(local.x * sx, local.y * sy));
            e.transform(target - center);
            if geometry::same_angle(e.rotation(), old.angle) {
                e.scale(target, sx, sy);
            } else {
                // frame differs from the box; keep the shape, scale uniformly
                let uniform = (sx * sy).sqrt();
                e.scale(target, uniform, uniform);
            }
        })?;
        self.sync_selection(Some(old.angle));
        Ok(changed)
    }

    /// Apply `style` to every element in `ids` as one history step.
    pub fn set_style(&mut self, ids: &[ElementId], style: ElementStyle) -> DrawingResult<bool> {
        let angle = self.mask_angle();
        let changed = self.modify_elements(ids, |e| e.set_style(style.clone()))?;
        self.sync_selection(angle);
        Ok(changed)
    }

    /// Move one element to `index` in the draw order (clamped).
    pub fn reorder_element(&mut self, id: ElementId, index: usize) -> DrawingResult<bool> {
        let from = self
            .document
            .elements
            .index_of(&id)
            .ok_or(DrawingError::ElementNotFound(id))?;
        let to = index.min(self.document.elements.len() - 1);
        if from == to {
            return Ok(false);
        }
        let element = self
            .document
            .get(id)
            .ok_or(DrawingError::ElementNotFound(id))?;
        let command = SnapshotCommand::reorder(element, from, to);
        self.commit(command)?;
        Ok(true)
    }

    /// Revert the newest history step, with its related steps.
    ///
    /// Returns `Ok(false)` when there is nothing to undo. The selection drops
    /// elements the step removed.
    pub fn undo(&mut self) -> DrawingResult<bool> {
        let result = self.history.undo(&mut self.document);
        self.sync_selection(None);
        result
    }

    /// Reapply the newest undone step. Mirrors [`undo`](Self::undo).
    pub fn redo(&mut self) -> DrawingResult<bool> {
        let result = self.history.redo(&mut self.document);
        self.sync_selection(None);
        result
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ==================== Drawing gestures ====================

    /// Start drawing a `kind` element at `world`.
    pub fn begin_draw(&mut self, kind: ElementKind, world: Point, style: ElementStyle) {
        let points = match kind {
            ElementKind::Text => vec![world],
            _ => vec![world, world],
        };
        self.draft = Some(Draft {
            kind,
            points,
            style,
            text: String::new(),
        });
        self.invalidation.invalidate(LayerKind::Provisional);
    }

    /// Move the gesture's current point. Paths record every point.
    pub fn update_draw(&mut self, world: Point) -> bool {
        let Some(draft) = self.draft.as_mut() else {
            return false;
        };
        match draft.kind {
            ElementKind::Path => draft.points.push(world),
            _ => {
                if let Some(last) = draft.points.last_mut() {
                    *last = world;
                }
            }
        }
        self.invalidation.invalidate(LayerKind::Provisional);
        true
    }

    /// Set the string a text gesture will commit.
    pub fn set_draw_text(&mut self, text: impl Into<String>) -> bool {
        let Some(draft) = self.draft.as_mut().filter(|d| d.kind == ElementKind::Text) else {
            return false;
        };
        draft.text = text.into();
        self.invalidation.invalidate(LayerKind::Provisional);
        true
    }

    /// Fix the current polygon vertex and start a new one at `world`.
    pub fn add_draw_vertex(&mut self, world: Point) -> bool {
        let Some(draft) = self.draft.as_mut() else {
            return false;
        };
        if draft.kind != ElementKind::Polygon {
            return self.update_draw(world);
        }
        draft.points.push(world);
        self.invalidation.invalidate(LayerKind::Provisional);
        true
    }

    /// Turn the gesture into an element. Degenerate gestures are dropped.
    pub fn commit_draw(&mut self) -> DrawingResult<Option<ElementId>> {
        let Some(draft) = self.draft.take() else {
            return Ok(None);
        };
        self.clear_provisional();

        if let Some(reason) = draft.degenerate_reason() {
            tracing::debug!(kind = %draft.kind, reason, "discarded degenerate gesture");
            return Ok(None);
        }
        let element = match ElementFactory::build(draft.model(), self.document.stage()) {
            Ok(element) => element,
            Err(DrawingError::InvalidGeometry(reason)) => {
                tracing::debug!(kind = %draft.kind, %reason, "discarded degenerate gesture");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let id = self.add_element(element)?;
        self.selection.select(id);
        self.refresh_mask(None);
        Ok(Some(id))
    }

    /// Abandon the gesture and wipe the provisional layer.
    pub fn cancel_draw(&mut self) {
        if self.draft.take().is_some() {
            tracing::debug!("gesture cancelled");
        }
        self.clear_provisional();
    }

    fn clear_provisional(&mut self) {
        self.provisional.discard_queue();
        self.provisional.clear_surface();
        self.invalidation.validate(LayerKind::Provisional);
    }

    fn provisional_tasks(&self, stage: &StageTransform) -> Vec<RenderTask> {
        let Some(draft) = &self.draft else {
            return vec![RenderTask::clear()];
        };
        let model = draft.model();
        let outline = stage.map_to_stage(&model.outline());
        let degenerate = outline.windows(2).all(|w| w[0] == w[1]);
        if degenerate {
            return vec![RenderTask::clear()];
        }
        let style = DrawStyle {
            stroke_color: Some(draft.style.stroke.unwrap_or(self.mask_color())),
            fill_color: None,
            stroke_width: (draft.style.stroke_width * stage.scale).max(1.0),
            dash_pattern: None,
        };
        render::provisional_queue(&outline, &style, draft.kind.is_closed())
    }

    // ==================== Selection & hit-testing ====================

    /// Make `id` the only selected element and rebuild the mask.
    pub fn select(&mut self, id: ElementId) -> DrawingResult<()> {
        if !self.document.elements.contains_key(&id) {
            return Err(DrawingError::ElementNotFound(id));
        }
        self.selection.select(id);
        self.refresh_mask(None);
        Ok(())
    }

    /// Replace the selection with `ids`. Unknown ids fail without touching it.
    pub fn select_many(&mut self, ids: &[ElementId]) -> DrawingResult<()> {
        if let Some(missing) = ids.iter().find(|id| !self.document.elements.contains_key(id)) {
            return Err(DrawingError::ElementNotFound(*missing));
        }
        self.selection.clear();
        self.selection.extend(ids.iter().copied());
        self.refresh_mask(None);
        Ok(())
    }

    /// Drop the selection, its mask and any active handle.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.transformers.activate(None);
        self.refresh_mask(None);
    }

    /// Handles of the current mask first, then the topmost element.
    pub fn hit_test(&self, screen: Point) -> Option<HitTarget> {
        let stage = self.document.stage();
        if let Some(mask) = self.boxer.model()
            && let Some(direction) = self.transformers.hit(mask, stage, screen)
        {
            return Some(HitTarget::Handle(direction));
        }

        let world = stage.stage_to_world(screen);
        let tolerance = stage.stage_dist_to_world(self.settings.hit_tolerance);
        self.document
            .elements
            .values()
            .rev()
            .find(|e| e.contains_point(world, tolerance))
            .map(|e| HitTarget::Element(e.id()))
    }

    /// Pointer press: activate a handle, or update the selection.
    pub fn pointer_down(&mut self, input: &PointerInput) -> Option<HitTarget> {
        let hit = self.hit_test(input.screen);
        match hit {
            Some(HitTarget::Handle(direction)) => {
                self.transformers.activate(Some(direction));
            }
            Some(HitTarget::Element(id)) => {
                self.transformers.activate(None);
                if input.modifiers.is_additive() {
                    self.selection.toggle(id);
                } else if !self.selection.contains(id) {
                    self.selection.select(id);
                }
                self.refresh_mask(None);
            }
            None => {
                if !input.modifiers.is_additive() {
                    self.clear_selection();
                }
            }
        }
        hit
    }

    /// Pointer release: deactivate handles.
    pub fn pointer_up(&mut self) {
        self.transformers.activate(None);
    }

    // ==================== Viewport & rendering ====================

    /// Replace the stage transform; every layer is rebuilt on the next frame.
    pub fn set_viewport(&mut self, transform: StageTransform) -> DrawingResult<()> {
        let current = *self.document.stage();
        if (current.width, current.height) != (transform.width, transform.height) {
            for drawer in [&mut self.content, &mut self.mask, &mut self.provisional] {
                drawer.resize(transform.width, transform.height)?;
            }
        }
        self.document.set_stage(transform);
        self.invalidation.invalidate_all();
        Ok(())
    }

    /// Rebuild invalid layer queues and run all three drawers.
    pub async fn render_frame(&mut self) -> StageFrame {
        if self.content_dirty.replace(false) {
            self.invalidation.invalidate(LayerKind::Content);
        }

        let stage = *self.document.stage();
        let mask_color = self.mask_color();
        let rebuilt = self.invalidation.invalid_layers();
        for layer in &rebuilt {
            match layer {
                LayerKind::Content => self
                    .content
                    .set_queue(render::content_queue(self.document.elements.values(), &stage)),
                LayerKind::Mask => self.mask.set_queue(render::mask_queue(
                    self.boxer.model(),
                    &self.transformers,
                    &stage,
                    mask_color,
                )),
                LayerKind::Provisional => {
                    let tasks = self.provisional_tasks(&stage);
                    self.provisional.set_queue(tasks);
                }
            }
            self.invalidation.validate(*layer);
            tracing::debug!(?layer, "layer queue rebuilt");
        }

        let mut reports = Vec::with_capacity(LayerKind::all_layers().len());
        for layer in LayerKind::all_layers() {
            let drawer = match layer {
                LayerKind::Content => &mut self.content,
                LayerKind::Mask => &mut self.mask,
                LayerKind::Provisional => &mut self.provisional,
            };
            reports.push(drawer.run(&self.resources).await);
        }
        StageFrame { rebuilt, reports }
    }
}

fn snapshot(index: usize, id: ElementId, model: &ElementModel) -> ElementSnapshot {
    ElementSnapshot {
        id,
        index,
        model: Some(model.clone()),
    }
}
