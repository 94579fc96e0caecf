use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

/// Handle returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered list of event handlers.
pub struct Listeners<E> {
    handlers: Vec<(SubscriptionId, Box<dyn FnMut(&E)>)>,
    next_id: u64,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
            next_id: 1,
        }
    }
}

impl<E> std::fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.handlers.len())
            .finish()
    }
}

impl<E> Listeners<E> {
    /// Register `handler`; it runs on every later `emit`.
    pub fn subscribe(&mut self, handler: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Returns false when `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sid, _)| *sid != id);
        self.handlers.len() != before
    }

    /// Call every handler in subscription order.
    pub fn emit(&mut self, event: &E) {
        for (_, handler) in &mut self.handlers {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Keys affected by one logical batch of mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet<K> {
    pub inserted: Vec<K>,
    pub removed: Vec<K>,
    pub updated: Vec<K>,
    pub reordered: bool,
}

impl<K> Default for ChangeSet<K> {
    fn default() -> Self {
        Self {
            inserted: Vec::new(),
            removed: Vec::new(),
            updated: Vec::new(),
            reordered: false,
        }
    }
}

impl<K: PartialEq> ChangeSet<K> {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
            && self.removed.is_empty()
            && self.updated.is_empty()
            && !self.reordered
    }

    fn insert(&mut self, key: K) {
        if let Some(pos) = self.removed.iter().position(|k| *k == key) {
            // removed then re-added within one batch
            self.removed.remove(pos);
            push_unique(&mut self.updated, key);
        } else {
            push_unique(&mut self.inserted, key);
        }
    }

    fn remove(&mut self, key: K) {
        self.updated.retain(|k| *k != key);
        if let Some(pos) = self.inserted.iter().position(|k| *k == key) {
            self.inserted.remove(pos);
        } else {
            push_unique(&mut self.removed, key);
        }
    }

    fn update(&mut self, key: K) {
        if !self.inserted.contains(&key) {
            push_unique(&mut self.updated, key);
        }
    }
}

fn push_unique<K: PartialEq>(list: &mut Vec<K>, key: K) {
    if !list.contains(&key) {
        list.push(key);
    }
}

/// Traversal order of an `OrderedCollection`.
pub enum DrawOrder<V> {
    /// Insertion order, adjusted by explicit moves.
    Sequence,
    /// Custom comparison; the sequence breaks ties.
    By(Box<dyn Fn(&V, &V) -> Ordering>),
}

impl<V> std::fmt::Debug for DrawOrder<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrawOrder::Sequence => f.write_str("Sequence"),
            DrawOrder::By(_) => f.write_str("By(..)"),
        }
    }
}

/// A keyed map with an explicit draw order and change notifications.
///
/// Every key lives exactly once in both the map and the sequence. Mutations
/// made inside `batch` are coalesced into a single `ChangeSet`.
pub struct OrderedCollection<K, V> {
    entries: HashMap<K, V>,
    order: Vec<K>,
    draw_order: DrawOrder<V>,
    listeners: Listeners<ChangeSet<K>>,
    batch_depth: usize,
    pending: ChangeSet<K>,
    /// Sequence positions of keys removed in the open batch.
    removed_at: HashMap<K, usize>,
}

impl<K, V> std::fmt::Debug for OrderedCollection<K, V>
where
    K: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedCollection")
            .field("order", &self.order)
            .field("draw_order", &self.draw_order)
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl<K, V> Default for OrderedCollection<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> OrderedCollection<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::with_order(DrawOrder::Sequence)
    }

    /// Empty collection drawn according to `draw_order`.
    pub fn with_order(draw_order: DrawOrder<V>) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            draw_order,
            listeners: Listeners::default(),
            batch_depth: 0,
            pending: ChangeSet::default(),
            removed_at: HashMap::new(),
        }
    }

    /// Replace the draw order. Listeners see a reorder.
    pub fn set_draw_order(&mut self, draw_order: DrawOrder<V>) {
        self.draw_order = draw_order;
        self.pending.reordered = true;
        self.flush_if_idle();
    }

    // ==================== Lookup ====================

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Position of `key` in the sequence.
    pub fn index_of(&self, key: &K) -> Option<usize> {
        if !self.entries.contains_key(key) {
            return None;
        }
        self.order.iter().position(|k| k == key)
    }

    /// Keys in sequence order.
    pub fn keys(&self) -> &[K] {
        &self.order
    }

    /// Ordered traversal (bottom first).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> {
        let mut items: Vec<(&K, &V)> = self
            .order
            .iter()
            .filter_map(|k| self.entries.get(k).map(|v| (k, v)))
            .collect();
        if let DrawOrder::By(cmp) = &self.draw_order {
            // stable sort keeps the sequence as tiebreak
            items.sort_by(|a, b| cmp(a.1, b.1));
        }
        items.into_iter()
    }

    /// Values in draw order, bottom first.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    // ==================== Mutation ====================

    /// Insert on top, or replace the value in place. Returns the old value.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        let old = self.entries.insert(key.clone(), value);
        if old.is_some() {
            self.pending.update(key);
        } else {
            self.note_reinsert(&key, self.order.len());
            self.order.push(key.clone());
            self.pending.insert(key);
        }
        self.flush_if_idle();
        old
    }

    /// Insert at `index` (clamped). An existing key is replaced and moved.
    pub fn insert_at(&mut self, index: usize, key: K, value: V) -> Option<V> {
        let old = self.entries.insert(key.clone(), value);
        if old.is_some() {
            self.order.retain(|k| *k != key);
            self.pending.update(key.clone());
            self.pending.reordered = true;
            let index = index.min(self.order.len());
            self.order.insert(index, key);
        } else {
            let index = index.min(self.order.len());
            self.note_reinsert(&key, index);
            self.pending.insert(key.clone());
            self.order.insert(index, key);
        }
        self.flush_if_idle();
        old
    }

    /// Remove `key` and return its value. Unknown keys are a no-op and emit nothing.
    pub fn delete(&mut self, key: &K) -> Option<V> {
        let removed = self.entries.remove(key)?;
        if let Some(index) = self.order.iter().position(|k| k == key) {
            self.order.remove(index);
            self.removed_at.entry(key.clone()).or_insert(index);
        }
        self.pending.remove(key.clone());
        self.flush_if_idle();
        Some(removed)
    }

    /// Mutate one value in place.
    pub fn update<R>(&mut self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let value = self.entries.get_mut(key)?;
        let result = f(value);
        self.pending.update(key.clone());
        self.flush_if_idle();
        Some(result)
    }

    /// Mutate every value in place.
    pub fn update_all(&mut self, mut f: impl FnMut(&mut V)) {
        for key in &self.order {
            if let Some(value) = self.entries.get_mut(key) {
                f(value);
                self.pending.update(key.clone());
            }
        }
        self.flush_if_idle();
    }

    /// Move `key` to `index` (clamped). Returns false for unknown keys.
    pub fn move_to(&mut self, key: &K, index: usize) -> bool {
        let Some(current) = self.index_of(key) else {
            return false;
        };
        let index = index.min(self.order.len() - 1);
        if current != index {
            let k = self.order.remove(current);
            self.order.insert(index, k);
            self.pending.reordered = true;
            self.flush_if_idle();
        }
        true
    }

    /// Remove everything. Each key is reported as removed.
    pub fn clear(&mut self) {
        for (index, key) in std::mem::take(&mut self.order).into_iter().enumerate() {
            self.removed_at.entry(key.clone()).or_insert(index);
            self.pending.remove(key);
        }
        self.entries.clear();
        self.flush_if_idle();
    }

    // ==================== Notifications ====================

    /// Listen for change sets. Inside a batch nothing is delivered until the
    /// outermost batch closes.
    pub fn subscribe(&mut self, handler: impl FnMut(&ChangeSet<K>) + 'static) -> SubscriptionId {
        self.listeners.subscribe(handler)
    }

    /// Returns false when `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Run `f` as one batch. Nested batches flatten into the outermost one.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_batch();
        let result = f(self);
        self.end_batch();
        result
    }

    /// Open a batch. Pair with [`end_batch`](Self::end_batch).
    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Close a batch; the outermost close emits the pending change set.
    pub fn end_batch(&mut self) {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        self.flush_if_idle();
    }

    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    /// A key deleted earlier in the batch and inserted elsewhere changed its z-order.
    fn note_reinsert(&mut self, key: &K, index: usize) {
        if let Some(previous) = self.removed_at.remove(key)
            && previous != index
        {
            self.pending.reordered = true;
        }
    }

    fn flush_if_idle(&mut self) {
        if self.batch_depth > 0 {
            return;
        }
        self.removed_at.clear();
        if self.pending.is_empty() {
            return;
        }
        let changes = std::mem::take(&mut self.pending);
        self.listeners.emit(&changes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(c: &mut OrderedCollection<u32, &'static str>) -> Rc<RefCell<Vec<ChangeSet<u32>>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        c.subscribe(move |changes| sink.borrow_mut().push(changes.clone()));
        log
    }

    fn assert_consistent(c: &OrderedCollection<u32, &'static str>) {
        assert_eq!(c.keys().len(), c.len());
        for key in c.keys() {
            assert!(c.contains_key(key));
            assert_eq!(c.keys().iter().filter(|k| *k == key).count(), 1);
        }
    }

    #[test]
    fn test_set_and_order() {
        let mut c = OrderedCollection::new();
        c.set(1, "a");
        c.set(2, "b");
        c.set(3, "c");
        assert_eq!(c.keys(), &[1, 2, 3]);
        assert_eq!(c.set(2, "B"), Some("b"));
        assert_eq!(c.keys(), &[1, 2, 3]);
        assert_eq!(c.values().copied().collect::<Vec<_>>(), vec!["a", "B", "c"]);
    }

    #[test]
    fn test_insert_delete_move_stay_consistent() {
        let mut c = OrderedCollection::new();
        for k in 0..6 {
            c.set(k, "x");
        }
        c.delete(&2);
        c.insert_at(0, 9, "y");
        c.move_to(&5, 0);
        c.insert_at(100, 4, "z");
        c.delete(&0);
        c.move_to(&9, 99);
        assert_consistent(&c);
        assert_eq!(c.keys(), &[5, 1, 3, 4, 9]);
        assert!(!c.move_to(&42, 0));
    }

    #[test]
    fn test_each_mutation_notifies_outside_batch() {
        let mut c = OrderedCollection::new();
        let log = recorder(&mut c);
        c.set(1, "a");
        c.set(2, "b");
        c.delete(&1);
        assert_eq!(log.borrow().len(), 3);
        assert_eq!(log.borrow()[2].removed, vec![1]);
    }

    #[test]
    fn test_batch_emits_once() {
        let mut c = OrderedCollection::new();
        c.set(1, "a");
        c.set(2, "b");
        c.set(3, "c");
        let log = recorder(&mut c);

        c.batch(|c| {
            c.delete(&1);
            c.batch(|c| {
                c.delete(&3);
            });
            c.update(&2, |v| *v = "B");
        });

        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].removed, vec![1, 3]);
        assert_eq!(log[0].updated, vec![2]);
    }

    #[test]
    fn test_reinsert_in_batch_reports_reorder() {
        let mut c = OrderedCollection::new();
        c.set(1, "a");
        c.set(2, "b");
        c.set(3, "c");
        let log = recorder(&mut c);

        c.batch(|c| {
            c.delete(&1);
            c.set(1, "A");
        });
        assert_eq!(c.keys(), &[2, 3, 1]);
        let changes = log.borrow()[0].clone();
        assert_eq!(changes.updated, vec![1]);
        assert!(changes.inserted.is_empty() && changes.removed.is_empty());
        assert!(changes.reordered);

        // same slot again is a plain update
        c.batch(|c| {
            c.delete(&1);
            c.insert_at(2, 1, "a");
        });
        let changes = log.borrow()[1].clone();
        assert_eq!(changes.updated, vec![1]);
        assert!(!changes.reordered);
        assert_consistent(&c);
    }

    #[test]
    fn test_empty_batch_is_silent() {
        let mut c: OrderedCollection<u32, &'static str> = OrderedCollection::new();
        let log = recorder(&mut c);
        c.batch(|c| {
            c.set(7, "tmp");
            c.delete(&7);
        });
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_unsubscribe() {
        let mut c = OrderedCollection::new();
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        let id = c.subscribe(move |_| *counter.borrow_mut() += 1);
        c.set(1, "a");
        assert!(c.unsubscribe(id));
        c.set(2, "b");
        assert_eq!(*hits.borrow(), 1);
        assert!(!c.unsubscribe(id));
    }

    #[test]
    fn test_custom_draw_order_uses_sequence_as_tiebreak() {
        let mut c: OrderedCollection<u32, (u8, char)> =
            OrderedCollection::with_order(DrawOrder::By(Box::new(
                |a: &(u8, char), b: &(u8, char)| a.0.cmp(&b.0),
            )));
        c.set(1, (2, 'a'));
        c.set(2, (1, 'b'));
        c.set(3, (2, 'c'));
        c.set(4, (1, 'd'));
        let order: String = c.values().map(|v| v.1).collect();
        assert_eq!(order, "bdac");
    }
}
