use std::collections::VecDeque;

/// Count-bounded rolling window of samples.
///
/// Pushing onto a full window silently evicts the oldest sample, so the
/// window never holds more than `capacity` values.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    /// All values in the window (oldest first)
    values: VecDeque<f64>,

    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// The most recent `n` values, oldest first. Shorter when the window
    /// holds fewer than `n` samples.
    pub fn tail(&self, n: usize) -> Vec<f64> {
        let skip = self.values.len().saturating_sub(n);
        self.values.iter().skip(skip).copied().collect()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn oldest(&self) -> Option<f64> {
        self.values.front().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
