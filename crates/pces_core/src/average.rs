//! Bounded running average.

use std::collections::VecDeque;

/// Integer mean of the last `capacity` values added.
#[derive(Debug, Clone)]
pub(crate) struct RunningAverage {
    values: VecDeque<i64>,
    capacity: usize,
    sum: i128,
}

impl RunningAverage {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0,
        }
    }

    pub(crate) fn add(&mut self, value: i64) {
        if self.values.len() == self.capacity {
            if let Some(evicted) = self.values.pop_front() {
                self.sum -= i128::from(evicted);
            }
        }
        self.values.push_back(value);
        self.sum += i128::from(value);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns 0 when empty.
    pub(crate) fn average(&self) -> i64 {
        if self.values.is_empty() {
            return 0;
        }
        // The mean of i64 values always fits in an i64.
        (self.sum / self.values.len() as i128) as i64
    }
}
