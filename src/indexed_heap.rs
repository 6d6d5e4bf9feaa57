use crate::error::InvariantViolation;

/// IndexedMinHeap is a binary min-heap of `f64` keys addressed by item
/// handles. Every item remembers its slot in the heap, so the key of an
/// arbitrary item can be changed or removed in O(log(N)) time. Ties are broken
/// by the smaller handle so that the order is fully deterministic.
#[derive(Debug, Clone, Default)]
pub struct IndexedMinHeap {
    heap: Vec<usize>,
    keys: Vec<f64>,
    positions: Vec<Option<usize>>,
}

impl IndexedMinHeap {
    pub fn new() -> Self {
        IndexedMinHeap::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, item: usize) -> bool {
        self.position(item).is_some()
    }

    fn position(&self, item: usize) -> Option<usize> {
        self.positions.get(item).copied().flatten()
    }

    pub fn key(&self, item: usize) -> Option<f64> {
        self.position(item).map(|_| self.keys[item])
    }

    /// The item with the smallest key.
    pub fn peek(&self) -> Option<(usize, f64)> {
        self.heap.first().map(|&item| (item, self.keys[item]))
    }

    /// Inserts `item`, or changes its key if it is already present.
    pub fn push(&mut self, item: usize, key: f64) {
        debug_assert!(!key.is_nan());
        if self.contains(item) {
            self.update(item, key);
            return;
        }
        if item >= self.positions.len() {
            self.positions.resize(item + 1, None);
            self.keys.resize(item + 1, f64::INFINITY);
        }
        self.keys[item] = key;
        self.heap.push(item);
        self.positions[item] = Some(self.heap.len() - 1);
        self.sift_up(self.heap.len() - 1);
    }

    /// Changes the key of a present item. Returns `false` if it is absent.
    pub fn update(&mut self, item: usize, key: f64) -> bool {
        debug_assert!(!key.is_nan());
        let Some(slot) = self.position(item) else {
            return false;
        };
        let old = self.keys[item];
        self.keys[item] = key;
        if key < old {
            self.sift_up(slot);
        } else {
            self.sift_down(slot);
        }
        true
    }

    /// Removes `item` and returns its key.
    pub fn remove(&mut self, item: usize) -> Option<f64> {
        let slot = self.position(item)?;
        let last = self.heap.len() - 1;
        self.swap(slot, last);
        self.heap.pop();
        self.positions[item] = None;
        if slot < self.heap.len() {
            self.sift_down(slot);
            self.sift_up(slot);
        }
        Some(self.keys[item])
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.keys.clear();
        self.positions.clear();
    }

    /// Verifies the heap property and the back-pointers.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for (slot, &item) in self.heap.iter().enumerate() {
            if self.position(item) != Some(slot) {
                return Err(InvariantViolation::HeapCorrupted { slot });
            }
            if slot > 0 && self.less(slot, (slot - 1) / 2) {
                return Err(InvariantViolation::HeapCorrupted { slot });
            }
        }
        let indexed = self.positions.iter().filter(|p| p.is_some()).count();
        if indexed != self.heap.len() {
            return Err(InvariantViolation::HeapCorrupted {
                slot: self.heap.len(),
            });
        }
        Ok(())
    }

    fn less(&self, a: usize, b: usize) -> bool {
        let (item_a, item_b) = (self.heap[a], self.heap[b]);
        let (key_a, key_b) = (self.keys[item_a], self.keys[item_b]);
        key_a < key_b || (key_a == key_b && item_a < item_b)
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.positions[self.heap[a]] = Some(a);
        self.positions[self.heap[b]] = Some(b);
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !self.less(slot, parent) {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut smallest = slot;
            if left < self.heap.len() && self.less(left, smallest) {
                smallest = left;
            }
            if right < self.heap.len() && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == slot {
                break;
            }
            self.swap(slot, smallest);
            slot = smallest;
        }
    }
}
