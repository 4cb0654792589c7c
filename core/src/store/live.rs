use crate::measurement::Measurement;
use crate::store::history::{HistoryBuffer, HISTORY_CAPACITY};
use std::sync::Mutex;

/// Shared live view of the measurement stream.
///
/// All mutation funnels through [`MeasurementStore::record`], so readers
/// always observe a consistent current/history pair and never a torn
/// history mid-append.
pub struct MeasurementStore {
    inner: Mutex<StoreState>,
}

struct StoreState {
    current: Option<Measurement>,
    history: HistoryBuffer,
}

impl MeasurementStore {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(StoreState {
                current: None,
                history: HistoryBuffer::with_capacity(capacity),
            }),
        }
    }

    /// Appends to history and replaces the current reading in one step.
    pub fn record(&self, measurement: Measurement) {
        if let Ok(mut state) = self.inner.lock() {
            state.history.push(measurement.clone());
            state.current = Some(measurement);
        }
    }

    pub fn current(&self) -> Option<Measurement> {
        self.inner
            .lock()
            .ok()
            .and_then(|state| state.current.clone())
    }

    /// Snapshot of the retained window in capture order.
    pub fn history(&self) -> Vec<Measurement> {
        self.inner
            .lock()
            .map(|state| state.history.snapshot())
            .unwrap_or_default()
    }

    pub fn history_len(&self) -> usize {
        self.inner.lock().map(|state| state.history.len()).unwrap_or(0)
    }

    /// Empties the rolling window; the current reading is kept.
    pub fn clear_history(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.history.clear();
        }
    }
}

impl Default for MeasurementStore {
    fn default() -> Self {
        Self::new()
    }
}
