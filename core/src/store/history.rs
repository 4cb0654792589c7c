use crate::measurement::Measurement;
use std::collections::VecDeque;

/// Number of measurements retained for live display.
pub const HISTORY_CAPACITY: usize = 100;

/// Fixed-capacity FIFO window over the most recent measurements.
#[derive(Debug)]
pub struct HistoryBuffer {
    entries: VecDeque<Measurement>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends one measurement, evicting the oldest entry when full.
    pub fn push(&mut self, measurement: Measurement) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(measurement);
    }

    /// Copies the retained window in capture order.
    pub fn snapshot(&self) -> Vec<Measurement> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::record::sample_measurement;

    fn numbered(marker: f64) -> Measurement {
        let mut m = sample_measurement();
        m.reynolds_number = marker;
        m
    }

    #[test]
    fn history_drops_oldest_beyond_capacity() {
        let mut buffer = HistoryBuffer::new();
        for i in 0..150 {
            buffer.push(numbered(i as f64));
        }

        let window = buffer.snapshot();
        assert_eq!(window.len(), HISTORY_CAPACITY);
        assert_eq!(window[0].reynolds_number, 50.0);
        assert_eq!(window[99].reynolds_number, 149.0);
    }

    #[test]
    fn snapshot_preserves_capture_order() {
        let mut buffer = HistoryBuffer::with_capacity(8);
        for i in 0..5 {
            buffer.push(numbered(i as f64));
        }

        let window = buffer.snapshot();
        for (i, entry) in window.iter().enumerate() {
            assert_eq!(entry.reynolds_number, i as f64);
        }
    }

    #[test]
    fn clear_empties_the_window() {
        let mut buffer = HistoryBuffer::with_capacity(4);
        buffer.push(numbered(1.0));
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
