//! Bounded FIFO history with a session-wide running maximum
//!
//! The maximum is "largest ever observed since the last reset", not "largest
//! still in the window": evicting the sample that produced it does not lower it.

use std::collections::VecDeque;

/// Default number of samples kept per history
pub const DEFAULT_HISTORY_CAPACITY: usize = 30;

/// Anything that can be ranked for the running maximum
pub trait HistorySample {
    fn magnitude(&self) -> f32;
}

impl HistorySample for f32 {
    fn magnitude(&self) -> f32 {
        self.abs()
    }
}

/// Where and what the running maximum was
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningMax<T> {
    /// The sample itself, sign and all
    pub sample: T,
    /// Magnitude of that sample
    pub value: f32,
    /// Sequence number of that sample (counts every push since reset)
    pub sequence: u64,
}

#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    samples: VecDeque<T>,
    capacity: usize,
    max: Option<RunningMax<T>>,
    pushed: u64,
}

impl<T: HistorySample + Clone> HistoryBuffer<T> {
    /// A zero capacity is bumped to one so the latest sample is always kept.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            max: None,
            pushed: 0,
        }
    }

    /// Append a sample, evicting the oldest when full.
    ///
    /// Returns `true` when this sample became the new running maximum.
    pub fn push(&mut self, sample: T) -> bool {
        let magnitude = sample.magnitude();
        let sequence = self.pushed;
        self.pushed += 1;

        // NaN never wins, it compares false
        let is_new_max = match &self.max {
            Some(max) => magnitude > max.value,
            None => !magnitude.is_nan(),
        };
        if is_new_max {
            self.max = Some(RunningMax {
                sample: sample.clone(),
                value: magnitude,
                sequence,
            });
        }

        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        is_new_max
    }

    pub fn latest(&self) -> Option<&T> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn running_max(&self) -> Option<&RunningMax<T>> {
        self.max.as_ref()
    }

    /// Total pushes since the last reset, including evicted samples
    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }

    /// Oldest to newest copy of the current window
    pub fn snapshot(&self) -> Vec<T> {
        self.samples.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.max = None;
        self.pushed = 0;
    }
}

impl<T: HistorySample + Clone> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
