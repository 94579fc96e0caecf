use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::collection::{Listeners, OrderedCollection, SubscriptionId};
use crate::element::{Element, ElementModel};
use crate::error::{DrawingResult, HistoryError};
use crate::geometry::StageTransform;
use crate::types::ElementId;

static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

/// Default number of undo steps kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

// ==================== Document ====================

/// The element collection commands operate on.
#[derive(Debug, Default)]
pub struct Document {
    pub elements: OrderedCollection<ElementId, Element>,
    stage: StageTransform,
}

impl Document {
    /// Empty document viewed through `stage`.
    pub fn new(stage: StageTransform) -> Self {
        Self {
            elements: OrderedCollection::new(),
            stage,
        }
    }

    pub fn stage(&self) -> &StageTransform {
        &self.stage
    }

    /// Change the stage transform and refresh every element's derived state.
    pub fn set_stage(&mut self, stage: StageTransform) {
        self.stage = stage;
        self.elements
            .update_all(|element| element.refresh_stage_points(&stage));
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    /// Run `f` with collection notifications coalesced into one.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.elements.begin_batch();
        let result = f(self);
        self.elements.end_batch();
        result
    }

    /// Capture one element as it currently is.
    pub fn snapshot(&self, id: ElementId) -> Option<ElementSnapshot> {
        let element = self.elements.get(&id)?;
        Some(ElementSnapshot {
            id,
            index: self.elements.index_of(&id)?,
            model: Some(element.model().clone()),
        })
    }

    /// Bring the document in line with `snapshot`: insert, replace and move,
    /// or delete when the snapshot marks the element absent.
    pub fn apply_snapshot(&mut self, snapshot: &ElementSnapshot) -> DrawingResult<()> {
        let id = snapshot.id;
        match &snapshot.model {
            Some(model) => {
                if self.elements.contains_key(&id) {
                    let model = model.clone();
                    self.elements
                        .update(&id, |element| element.set_model(model))
                        .ok_or(HistoryError::MissingTarget(id))??;
                    self.elements.move_to(&id, snapshot.index);
                } else {
                    let element = Element::from_model(id, model.clone(), &self.stage)?;
                    self.elements.insert_at(snapshot.index, id, element);
                }
            }
            None => {
                self.elements
                    .delete(&id)
                    .ok_or(HistoryError::MissingTarget(id))?;
            }
        }
        Ok(())
    }

    /// Check that `snapshots` would apply in order, without touching the document.
    ///
    /// Every absent snapshot must name an element present at that point and
    /// every present snapshot must carry a valid model.
    pub fn check_snapshots(&self, snapshots: &[ElementSnapshot]) -> DrawingResult<()> {
        let mut present: HashSet<ElementId> = self.elements.keys().iter().copied().collect();
        for snapshot in snapshots {
            match &snapshot.model {
                Some(model) => {
                    model.validate()?;
                    present.insert(snapshot.id);
                }
                None => {
                    if !present.remove(&snapshot.id) {
                        return Err(HistoryError::MissingTarget(snapshot.id).into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Apply snapshots in order inside one batch. Either all apply or none do.
    pub fn apply_snapshots(&mut self, snapshots: &[ElementSnapshot]) -> DrawingResult<()> {
        self.check_snapshots(snapshots)?;
        self.batch(|doc| {
            snapshots
                .iter()
                .try_for_each(|snapshot| doc.apply_snapshot(snapshot))
        })
    }
}

// ==================== Command payload ====================

/// State of one element at one side of a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub id: ElementId,
    /// Position in the draw order.
    pub index: usize,
    /// `None` means the element does not exist on this side.
    pub model: Option<ElementModel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Add,
    Remove,
    Modify,
    Reorder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo_data: Option<Vec<ElementSnapshot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redo_data: Option<Vec<ElementSnapshot>>,
    #[serde(rename = "type")]
    pub kind: CommandType,
}

/// Serializable command record: `{ id, relationId?, payload }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_id: Option<u64>,
    pub payload: CommandPayload,
}

impl CommandRecord {
    /// Record with a fresh id and no relation.
    pub fn new(kind: CommandType, undo_data: Option<Vec<ElementSnapshot>>, redo_data: Option<Vec<ElementSnapshot>>) -> Self {
        Self {
            id: NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed),
            relation_id: None,
            payload: CommandPayload {
                undo_data,
                redo_data,
                kind,
            },
        }
    }

    /// Elements touched by either side.
    pub fn targets(&self) -> Vec<ElementId> {
        let mut ids = Vec::new();
        let sides = [&self.payload.undo_data, &self.payload.redo_data];
        for snapshot in sides.into_iter().flatten().flatten() {
            if !ids.contains(&snapshot.id) {
                ids.push(snapshot.id);
            }
        }
        ids
    }
}

// ==================== Command ====================

/// A reversible user action.
pub trait Command: std::fmt::Debug {
    fn record(&self) -> &CommandRecord;

    fn description(&self) -> &str;

    /// Restore the pre-command state.
    fn undo(&mut self, _doc: &mut Document) -> DrawingResult<()> {
        Err(HistoryError::NotImplemented {
            command: self.description().to_string(),
            direction: "undo",
        }
        .into())
    }

    /// Restore the post-command state.
    fn redo(&mut self, _doc: &mut Document) -> DrawingResult<()> {
        Err(HistoryError::NotImplemented {
            command: self.description().to_string(),
            direction: "redo",
        }
        .into())
    }

    fn relation_id(&self) -> Option<u64> {
        self.record().relation_id
    }
}

/// Command replaying element snapshots in either direction.
///
/// A side without data is a no-op in that direction.
#[derive(Debug, Clone)]
pub struct SnapshotCommand {
    record: CommandRecord,
    description: String,
}

impl SnapshotCommand {
    /// Wrap a deserialized record so it can be replayed.
    pub fn from_record(record: CommandRecord, description: impl Into<String>) -> Self {
        Self {
            record,
            description: description.into(),
        }
    }

    /// Elements that did not exist before. `added` pairs draw index with element.
    pub fn add(added: &[(usize, &Element)]) -> Self {
        let mut added = added.to_vec();
        added.sort_by_key(|(index, _)| *index);
        let undo = added.iter().rev().map(|(index, e)| absent(e.id(), *index)).collect();
        let redo = added.iter().map(|(index, e)| present(*index, e)).collect();
        Self::from_record(
            CommandRecord::new(CommandType::Add, Some(undo), Some(redo)),
            format!("add {} element(s)", added.len()),
        )
    }

    /// Elements that stop existing. `removed` pairs draw index with element.
    pub fn remove(removed: &[(usize, &Element)]) -> Self {
        let mut removed = removed.to_vec();
        removed.sort_by_key(|(index, _)| *index);
        let undo = removed.iter().map(|(index, e)| present(*index, e)).collect();
        let redo = removed.iter().rev().map(|(index, e)| absent(e.id(), *index)).collect();
        Self::from_record(
            CommandRecord::new(CommandType::Remove, Some(undo), Some(redo)),
            format!("remove {} element(s)", removed.len()),
        )
    }

    /// In-place edit between two captured states.
    pub fn modify(before: Vec<ElementSnapshot>, after: Vec<ElementSnapshot>) -> Self {
        let description = format!("modify {} element(s)", after.len());
        Self::from_record(
            CommandRecord::new(CommandType::Modify, Some(before), Some(after)),
            description,
        )
    }

    /// Move one element from `from` to `to` in the draw order.
    pub fn reorder(element: &Element, from: usize, to: usize) -> Self {
        Self::from_record(
            CommandRecord::new(
                CommandType::Reorder,
                Some(vec![present(from, element)]),
                Some(vec![present(to, element)]),
            ),
            format!("reorder {} {from} -> {to}", element.id()),
        )
    }

    /// Group with other commands sharing `relation_id`.
    pub fn with_relation(mut self, relation_id: u64) -> Self {
        self.record.relation_id = Some(relation_id);
        self
    }

    fn apply(doc: &mut Document, side: Option<&Vec<ElementSnapshot>>) -> DrawingResult<()> {
        match side {
            Some(snapshots) => doc.apply_snapshots(snapshots),
            None => Ok(()),
        }
    }
}

fn present(index: usize, element: &Element) -> ElementSnapshot {
    ElementSnapshot {
        id: element.id(),
        index,
        model: Some(element.model().clone()),
    }
}

fn absent(id: ElementId, index: usize) -> ElementSnapshot {
    ElementSnapshot {
        id,
        index,
        model: None,
    }
}

impl Command for SnapshotCommand {
    fn record(&self) -> &CommandRecord {
        &self.record
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn undo(&mut self, doc: &mut Document) -> DrawingResult<()> {
        Self::apply(doc, self.record.payload.undo_data.as_ref())
    }

    fn redo(&mut self, doc: &mut Document) -> DrawingResult<()> {
        Self::apply(doc, self.record.payload.redo_data.as_ref())
    }
}

// ==================== Undo/redo stack ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEventKind {
    Added,
    Undone,
    Redone,
}

/// Emitted once per history step.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEvent {
    pub kind: HistoryEventKind,
    pub command_ids: Vec<u64>,
    pub can_undo: bool,
    pub can_redo: bool,
}

/// Undo and redo stacks of commands.
///
/// Consecutive commands sharing a relation id move between the stacks as one step.
#[derive(Debug)]
pub struct UndoRedoStack {
    undo_stack: Vec<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
    max_history: usize,
    listeners: Listeners<HistoryEvent>,
}

impl Default for UndoRedoStack {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoRedoStack {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_LIMIT)
    }

    /// Stack holding at most `max_history` steps (at least one).
    pub fn with_capacity(max_history: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_history: max_history.max(1),
            listeners: Listeners::default(),
        }
    }

    /// Change the limit, trimming the oldest steps right away.
    pub fn set_limit(&mut self, max_history: usize) {
        self.max_history = max_history.max(1);
        self.trim();
    }

    /// Drop the oldest steps until the limit holds. A related group goes
    /// as a whole; the newest step is always kept.
    fn trim(&mut self) {
        while self.undo_stack.len() > self.max_history {
            let relation = self.undo_stack[0].relation_id();
            let step = match relation {
                Some(_) => self
                    .undo_stack
                    .iter()
                    .take_while(|c| c.relation_id() == relation)
                    .count(),
                None => 1,
            };
            if step >= self.undo_stack.len() {
                break;
            }
            self.undo_stack.drain(..step);
        }
    }

    /// Push an already applied command. Clears the redo stack.
    pub fn add(&mut self, command: Box<dyn Command>) {
        self.redo_stack.clear();
        let id = command.record().id;
        tracing::debug!(command = command.description(), id, "history push");
        self.undo_stack.push(command);
        self.trim();
        self.emit(HistoryEventKind::Added, vec![id]);
    }

    /// Pop the top step: the top command plus any directly below it with the same relation id.
    pub fn pop(&mut self, is_redo: bool) -> Vec<Box<dyn Command>> {
        let stack = if is_redo {
            &mut self.redo_stack
        } else {
            &mut self.undo_stack
        };
        let Some(top) = stack.pop() else {
            return Vec::new();
        };
        let relation = top.relation_id();
        let mut group = vec![top];
        if relation.is_some() {
            while stack.last().is_some_and(|c| c.relation_id() == relation) {
                if let Some(next) = stack.pop() {
                    group.push(next);
                }
            }
        }
        group
    }

    /// Undo (`is_redo == false`) or redo one step. An empty stack is a no-op.
    ///
    /// On failure the failed command and everything after it in the step go
    /// back on their original stack, and the error is returned.
    pub fn execute(&mut self, is_redo: bool, doc: &mut Document) -> DrawingResult<bool> {
        let group = self.pop(is_redo);
        if group.is_empty() {
            return Ok(false);
        }

        let mut done: Vec<Box<dyn Command>> = Vec::with_capacity(group.len());
        let mut pending = group.into_iter();
        let outcome = doc.batch(|doc| {
            for mut command in pending.by_ref() {
                let result = if is_redo {
                    command.redo(doc)
                } else {
                    command.undo(doc)
                };
                if let Err(e) = result {
                    return Err((command, e));
                }
                done.push(command);
            }
            Ok(())
        });

        let ids: Vec<u64> = done.iter().map(|c| c.record().id).collect();
        let target = if is_redo {
            &mut self.undo_stack
        } else {
            &mut self.redo_stack
        };
        target.extend(done);

        match outcome {
            Ok(()) => {
                let kind = if is_redo {
                    HistoryEventKind::Redone
                } else {
                    HistoryEventKind::Undone
                };
                tracing::debug!(?kind, commands = ids.len(), "history step");
                self.emit(kind, ids);
                Ok(true)
            }
            Err((failed, e)) => {
                tracing::warn!(command = failed.description(), error = %e, "history step failed");
                let origin = if is_redo {
                    &mut self.redo_stack
                } else {
                    &mut self.undo_stack
                };
                let rest: Vec<Box<dyn Command>> = std::iter::once(failed).chain(pending).collect();
                origin.extend(rest.into_iter().rev());
                Err(e)
            }
        }
    }

    /// Undo the newest step and every step sharing its relation id.
    pub fn undo(&mut self, doc: &mut Document) -> DrawingResult<bool> {
        self.execute(false, doc)
    }

    /// Redo the newest undone step and every step sharing its relation id.
    pub fn redo(&mut self, doc: &mut Document) -> DrawingResult<bool> {
        self.execute(true, doc)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Steps on the undo side. Related steps count individually.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Forget every step. The document is left as is.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Records on the undo stack, oldest first.
    pub fn undo_records(&self) -> impl Iterator<Item = &CommandRecord> {
        self.undo_stack.iter().map(|c| c.record())
    }

    /// Listen for added, undone and redone steps.
    pub fn subscribe(&mut self, handler: impl FnMut(&HistoryEvent) + 'static) -> SubscriptionId {
        self.listeners.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn emit(&mut self, kind: HistoryEventKind, command_ids: Vec<u64>) {
        let event = HistoryEvent {
            kind,
            command_ids,
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        };
        self.listeners.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementFactory, ElementStyle};
    use crate::error::DrawingError;
    use std::cell::RefCell;
    use std::rc::Rc;
    use vs_rendering::Point;

    fn rect(x: f64) -> Element {
        ElementFactory::create(
            "rectangle",
            vec![Point::new(x, 0.0), Point::new(x + 10.0, 10.0)],
            ElementStyle::default(),
        )
        .unwrap()
    }

    fn doc_with(elements: &[&Element]) -> Document {
        let mut doc = Document::default();
        for e in elements {
            doc.elements.set(e.id(), (*e).clone());
        }
        doc
    }

    fn models(doc: &Document) -> Vec<(ElementId, ElementModel)> {
        doc.elements
            .iter()
            .map(|(id, e)| (*id, e.model().clone()))
            .collect()
    }

    /// Apply `command` forward and record it.
    fn commit(stack: &mut UndoRedoStack, doc: &mut Document, mut command: SnapshotCommand) {
        command.redo(doc).unwrap();
        stack.add(Box::new(command));
    }

    #[derive(Debug)]
    struct Opaque(CommandRecord);

    impl Command for Opaque {
        fn record(&self) -> &CommandRecord {
            &self.0
        }

        fn description(&self) -> &str {
            "opaque"
        }
    }

    #[test]
    fn test_delete_undo_redo_scenario() {
        let (a, b, c) = (rect(0.0), rect(20.0), rect(40.0));
        let mut doc = doc_with(&[&a, &b, &c]);
        let original = models(&doc);
        let mut stack = UndoRedoStack::new();

        commit(&mut stack, &mut doc, SnapshotCommand::remove(&[(1, &b)]));
        assert_eq!(doc.elements.keys(), &[a.id(), c.id()]);

        assert!(stack.undo(&mut doc).unwrap());
        assert_eq!(models(&doc), original);

        assert!(stack.redo(&mut doc).unwrap());
        assert_eq!(doc.elements.keys(), &[a.id(), c.id()]);
    }

    #[test]
    fn test_undo_in_reverse_restores_initial_state() {
        let a = rect(0.0);
        let mut doc = doc_with(&[&a]);
        let initial = models(&doc);
        let mut stack = UndoRedoStack::new();

        let b = rect(30.0);
        commit(&mut stack, &mut doc, SnapshotCommand::add(&[(1, &b)]));

        let before = vec![doc.snapshot(a.id()).unwrap()];
        let mut moved = a.clone();
        moved.transform(Point::new(5.0, 5.0));
        let after = vec![ElementSnapshot {
            id: a.id(),
            index: 0,
            model: Some(moved.model().clone()),
        }];
        commit(&mut stack, &mut doc, SnapshotCommand::modify(before, after));

        let b_now = doc.get(b.id()).unwrap().clone();
        commit(&mut stack, &mut doc, SnapshotCommand::reorder(&b_now, 1, 0));
        assert_eq!(doc.elements.keys(), &[b.id(), a.id()]);

        while stack.undo(&mut doc).unwrap() {}
        assert_eq!(models(&doc), initial);
        assert_eq!(stack.redo_count(), 3);
    }

    #[test]
    fn test_push_after_undo_discards_redo_branch() {
        let mut doc = Document::default();
        let mut stack = UndoRedoStack::new();
        let c1 = rect(0.0);
        commit(&mut stack, &mut doc, SnapshotCommand::add(&[(0, &c1)]));
        stack.undo(&mut doc).unwrap();
        assert!(stack.can_redo());

        let c2 = rect(50.0);
        commit(&mut stack, &mut doc, SnapshotCommand::add(&[(0, &c2)]));
        assert!(!stack.can_redo());
        assert!(!stack.redo(&mut doc).unwrap());
        assert_eq!(doc.elements.keys(), &[c2.id()]);
    }

    #[test]
    fn test_empty_stack_is_noop() {
        let mut doc = Document::default();
        let mut stack = UndoRedoStack::new();
        assert!(!stack.undo(&mut doc).unwrap());
        assert!(!stack.redo(&mut doc).unwrap());
    }

    #[test]
    fn test_related_commands_step_together() {
        let mut doc = Document::default();
        let mut stack = UndoRedoStack::new();
        let (a, b) = (rect(0.0), rect(20.0));
        commit(&mut stack, &mut doc, SnapshotCommand::add(&[(0, &a)]).with_relation(7));
        commit(&mut stack, &mut doc, SnapshotCommand::add(&[(1, &b)]).with_relation(7));

        assert!(stack.undo(&mut doc).unwrap());
        assert!(doc.elements.is_empty());
        assert_eq!(stack.redo_count(), 2);

        assert!(stack.redo(&mut doc).unwrap());
        assert_eq!(doc.elements.keys(), &[a.id(), b.id()]);
        assert_eq!(stack.undo_count(), 2);
    }

    #[test]
    fn test_one_notification_per_step() {
        let (a, b, c) = (rect(0.0), rect(20.0), rect(40.0));
        let mut doc = doc_with(&[&a, &b, &c]);
        let mut stack = UndoRedoStack::new();

        let changes = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&changes);
        doc.elements.subscribe(move |_| *counter.borrow_mut() += 1);
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        stack.subscribe(move |e: &HistoryEvent| sink.borrow_mut().push(e.kind));

        commit(&mut stack, &mut doc, SnapshotCommand::remove(&[(0, &a), (2, &c)]));
        assert_eq!(*changes.borrow(), 1);
        stack.undo(&mut doc).unwrap();
        assert_eq!(*changes.borrow(), 2);
        assert_eq!(doc.elements.keys(), &[a.id(), b.id(), c.id()]);
        assert_eq!(*events.borrow(), vec![HistoryEventKind::Added, HistoryEventKind::Undone]);
    }

    #[test]
    fn test_not_implemented_propagates_and_restores_stack() {
        let mut doc = Document::default();
        let mut stack = UndoRedoStack::new();
        stack.add(Box::new(Opaque(CommandRecord::new(CommandType::Modify, None, None))));

        let err = stack.undo(&mut doc).unwrap_err();
        assert!(matches!(
            err,
            DrawingError::History(HistoryError::NotImplemented { direction: "undo", .. })
        ));
        assert_eq!(stack.undo_count(), 1);
        assert_eq!(stack.redo_count(), 0);
    }

    #[test]
    fn test_failed_step_leaves_document_untouched() {
        let a = rect(0.0);
        let mut doc = doc_with(&[&a]);
        let before = models(&doc);
        let mut stack = UndoRedoStack::new();

        let mut moved = a.clone();
        moved.transform(Point::new(50.0, 0.0));
        let ghost = ElementId(u64::MAX - 1);
        let undo = vec![
            ElementSnapshot {
                id: a.id(),
                index: 0,
                model: Some(moved.model().clone()),
            },
            ElementSnapshot {
                id: ghost,
                index: 1,
                model: None,
            },
        ];
        let record = CommandRecord::new(CommandType::Modify, Some(undo), None);
        stack.add(Box::new(SnapshotCommand::from_record(record, "half valid")));

        let err = stack.undo(&mut doc).unwrap_err();
        assert!(matches!(
            err,
            DrawingError::History(HistoryError::MissingTarget(id)) if id == ghost
        ));
        assert_eq!(models(&doc), before);
        assert_eq!(stack.undo_count(), 1);
        assert_eq!(stack.redo_count(), 0);

        // retrying fails the same way instead of applying the first half
        assert!(stack.undo(&mut doc).is_err());
        assert_eq!(models(&doc), before);
    }

    #[test]
    fn test_invalid_model_rejected_before_apply() {
        let (a, b) = (rect(0.0), rect(20.0));
        let mut doc = doc_with(&[&a, &b]);
        let before = models(&doc);

        let mut flat = b.model().clone();
        flat.points = vec![Point::new(20.0, 0.0), Point::new(20.0, 0.0)];
        let snapshots = vec![
            ElementSnapshot {
                id: a.id(),
                index: 1,
                model: Some(a.model().clone()),
            },
            ElementSnapshot {
                id: b.id(),
                index: 0,
                model: Some(flat),
            },
        ];
        assert!(matches!(
            doc.apply_snapshots(&snapshots),
            Err(DrawingError::InvalidGeometry(_))
        ));
        assert_eq!(models(&doc), before);
    }

    #[test]
    fn test_missing_side_is_noop() {
        let a = rect(0.0);
        let mut doc = doc_with(&[&a]);
        let mut stack = UndoRedoStack::new();
        let record = CommandRecord::new(CommandType::Modify, None, Some(vec![doc.snapshot(a.id()).unwrap()]));
        stack.add(Box::new(SnapshotCommand::from_record(record, "redo only")));
        assert!(stack.undo(&mut doc).unwrap());
        assert_eq!(doc.elements.len(), 1);
    }

    #[test]
    fn test_history_limit_drops_oldest() {
        let mut doc = Document::default();
        let mut stack = UndoRedoStack::with_capacity(2);
        for i in 0..3 {
            let e = rect(i as f64 * 20.0);
            commit(&mut stack, &mut doc, SnapshotCommand::add(&[(i, &e)]));
        }
        assert_eq!(stack.undo_count(), 2);
    }

    #[test]
    fn test_history_limit_drops_whole_groups() {
        let mut doc = Document::default();
        let mut stack = UndoRedoStack::with_capacity(2);
        let (a, b, c) = (rect(0.0), rect(20.0), rect(40.0));
        commit(&mut stack, &mut doc, SnapshotCommand::add(&[(0, &a)]).with_relation(3));
        commit(&mut stack, &mut doc, SnapshotCommand::add(&[(1, &b)]).with_relation(3));
        commit(&mut stack, &mut doc, SnapshotCommand::add(&[(2, &c)]));

        assert_eq!(stack.undo_count(), 1);
        assert!(stack.undo(&mut doc).unwrap());
        assert_eq!(doc.elements.keys(), &[a.id(), b.id()]);
        assert!(!stack.undo(&mut doc).unwrap());
    }

    #[test]
    fn test_newest_group_survives_small_limit() {
        let mut doc = Document::default();
        let mut stack = UndoRedoStack::with_capacity(1);
        let (a, b) = (rect(0.0), rect(20.0));
        commit(&mut stack, &mut doc, SnapshotCommand::add(&[(0, &a)]).with_relation(9));
        commit(&mut stack, &mut doc, SnapshotCommand::add(&[(1, &b)]).with_relation(9));

        assert_eq!(stack.undo_count(), 2);
        assert!(stack.undo(&mut doc).unwrap());
        assert!(doc.elements.is_empty());
    }

    #[test]
    fn test_record_json_shape() {
        let a = rect(0.0);
        let command = SnapshotCommand::add(&[(0, &a)]).with_relation(3);
        let json = serde_json::to_value(command.record()).unwrap();
        assert_eq!(json["relationId"], 3);
        assert_eq!(json["payload"]["type"], "add");
        assert!(json["payload"]["undoData"][0]["model"].is_null());
        assert_eq!(json["payload"]["redoData"][0]["id"], a.id().get());

        let plain = CommandRecord::new(CommandType::Remove, None, None);
        let json = serde_json::to_value(&plain).unwrap();
        assert!(json.get("relationId").is_none());
        assert!(json["payload"].get("undoData").is_none());
        let back: CommandRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, plain);
    }
}
