use std::sync::Mutex;

/// Point-in-time relay state for operator output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelayStatus {
    pub running: bool,
    pub client_count: usize,
    pub port: u16,
}

/// Traffic counters for a running relay.
pub struct RelayMetrics {
    inner: Mutex<Counters>,
}

struct Counters {
    connections: usize,
    broadcasts: usize,
    decode_errors: usize,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Counters {
                connections: 0,
                broadcasts: 0,
                decode_errors: 0,
            }),
        }
    }

    pub fn record_connection(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.connections += 1;
        }
    }

    pub fn record_broadcast(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.broadcasts += 1;
        }
    }

    pub fn record_decode_error(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.decode_errors += 1;
        }
    }

    /// Returns (connections, broadcasts, decode errors) seen so far.
    pub fn snapshot(&self) -> (usize, usize, usize) {
        if let Ok(counters) = self.inner.lock() {
            (
                counters.connections,
                counters.broadcasts,
                counters.decode_errors,
            )
        } else {
            (0, 0, 0)
        }
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}
