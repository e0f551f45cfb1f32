//! Fixed-capacity history of the most recently written items

/// Ring buffer addressed by absolute write index.
///
/// Holds the last `min(count, capacity)` items. Items older than
/// `count - capacity` are gone; callers must not rely on them.
#[derive(Debug, Clone)]
pub struct SlidingWindow<T> {
    items: Vec<T>,
    capacity: usize,
    count: usize,
}

impl<T: Clone> SlidingWindow<T> {
    /// A zero capacity window discards every write.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of writes so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Absolute index of the oldest retained item.
    pub fn horizon(&self) -> usize {
        self.count.saturating_sub(self.capacity)
    }

    pub fn write(&mut self, item: T) {
        if self.capacity > 0 {
            if self.items.len() < self.capacity {
                self.items.push(item);
            } else {
                let slot = self.count % self.capacity;
                self.items[slot] = item;
            }
        }
        self.count += 1;
    }

    /// The most recently written item.
    pub fn front(&self) -> Option<&T> {
        if self.capacity == 0 || self.count == 0 {
            return None;
        }
        self.items.get((self.count - 1) % self.capacity)
    }

    /// Items with absolute indices in `[start, end)`, oldest first.
    ///
    /// A `start` before the retention horizon yields nothing, and `end` is
    /// clamped to [`count`](Self::count).
    ///
    /// # Panics
    ///
    /// Panics if `end < start`.
    pub fn slice(&self, start: usize, end: usize) -> Vec<T> {
        assert!(
            start <= end,
            "window slice end {} precedes start {}",
            end,
            start
        );
        if self.capacity == 0 || start < self.horizon() {
            return Vec::new();
        }
        let end = end.min(self.count);
        (start..end)
            .map(|index| self.items[index % self.capacity].clone())
            .collect()
    }
}
