use crate::measurement::{GeneratorConfig, Measurement};
use crate::prelude::{TunnelError, TunnelResult};
use crate::session::stats::{ChannelStats, SessionStats};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Most measurements kept per session before FIFO truncation.
pub const SESSION_CAPACITY: usize = 10_000;

/// A named, time-bounded recording of measurements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub data: Vec<Measurement>,
    pub config: GeneratorConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Groups contiguous runs of measurements into named sessions.
///
/// At most one session is active at a time. A session holds at most
/// [`SESSION_CAPACITY`] measurements; past that the oldest entries are
/// silently dropped, so very long recordings keep only their tail.
pub struct SessionRecorder {
    inner: Mutex<RecorderState>,
}

struct RecorderState {
    sessions: Vec<Session>,
    current: Option<Uuid>,
}

impl RecorderState {
    fn session_mut(&mut self, id: Uuid) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RecorderState {
                sessions: Vec::new(),
                current: None,
            }),
        }
    }

    fn lock(&self) -> TunnelResult<MutexGuard<'_, RecorderState>> {
        self.inner
            .lock()
            .map_err(|_| TunnelError::Internal("session state lock poisoned".to_string()))
    }

    /// Opens a new active session and returns its id.
    ///
    /// A blank name is rejected before any state changes. A session still
    /// active at this point is sealed at `started_at` first.
    pub fn start_session(
        &self,
        name: &str,
        config: GeneratorConfig,
        notes: Option<String>,
        started_at: DateTime<Utc>,
    ) -> TunnelResult<Uuid> {
        if name.trim().is_empty() {
            return Err(TunnelError::Validation(
                "session name must not be blank".to_string(),
            ));
        }

        let mut state = self.lock()?;
        if let Some(previous) = state.current.take() {
            if let Some(open) = state.session_mut(previous) {
                open.end_time = Some(started_at);
                warn!("session '{}' was still active, sealed it", open.name);
            }
        }

        let session = Session {
            id: Uuid::new_v4(),
            name: name.to_string(),
            start_time: started_at,
            end_time: None,
            data: Vec::new(),
            config,
            notes,
        };
        let id = session.id;
        info!("started session '{}' ({})", session.name, id);
        state.sessions.push(session);
        state.current = Some(id);
        Ok(id)
    }

    /// Appends to the active session; warns and drops the sample when none.
    pub fn add_measurement(&self, measurement: Measurement) {
        if let Ok(mut state) = self.inner.lock() {
            let current = match state.current {
                Some(id) => id,
                None => {
                    warn!("no active session, measurement dropped");
                    return;
                }
            };
            if let Some(session) = state.session_mut(current) {
                session.data.push(measurement);
                if session.data.len() > SESSION_CAPACITY {
                    let excess = session.data.len() - SESSION_CAPACITY;
                    session.data.drain(..excess);
                }
            }
        }
    }

    /// Seals the active session and returns it.
    pub fn end_session(&self, ended_at: DateTime<Utc>) -> TunnelResult<Session> {
        let mut state = self.lock()?;
        let current = state.current.take().ok_or(TunnelError::NoActiveSession)?;
        let session = state
            .session_mut(current)
            .ok_or(TunnelError::NoActiveSession)?;
        session.end_time = Some(ended_at);
        info!(
            "ended session '{}' with {} measurements",
            session.name,
            session.data.len()
        );
        Ok(session.clone())
    }

    /// Channel aggregates for one session; `None` when it is missing or empty.
    ///
    /// `now` bounds the duration of a session that is still active.
    pub fn stats(&self, id: Uuid, now: DateTime<Utc>) -> Option<SessionStats> {
        let state = self.inner.lock().ok()?;
        let session = state.sessions.iter().find(|s| s.id == id)?;
        if session.data.is_empty() {
            return None;
        }

        let drag: Vec<f64> = session.data.iter().map(|m| m.drag_force).collect();
        let lift: Vec<f64> = session.data.iter().map(|m| m.lift_force).collect();
        let wind: Vec<f64> = session.data.iter().map(|m| m.wind_speed).collect();
        let pressure: Vec<f64> = session.data.iter().map(|m| m.pressure).collect();

        let end = session.end_time.unwrap_or(now);
        let duration_secs = (end - session.start_time).num_milliseconds() as f64 / 1000.0;

        Some(SessionStats {
            session_id: session.id,
            session_name: session.name.clone(),
            data_points: session.data.len(),
            duration_secs,
            drag_force: ChannelStats::from_values(&drag)?,
            lift_force: ChannelStats::from_values(&lift)?,
            wind_speed: ChannelStats::from_values(&wind)?,
            pressure: ChannelStats::from_values(&pressure)?,
        })
    }

    /// Removes a session regardless of its state.
    pub fn delete_session(&self, id: Uuid) -> bool {
        if let Ok(mut state) = self.inner.lock() {
            let before = state.sessions.len();
            state.sessions.retain(|s| s.id != id);
            let deleted = state.sessions.len() != before;
            if deleted && state.current == Some(id) {
                state.current = None;
            }
            deleted
        } else {
            false
        }
    }

    pub fn current_session(&self) -> Option<Session> {
        let state = self.inner.lock().ok()?;
        let current = state.current?;
        state.sessions.iter().find(|s| s.id == current).cloned()
    }

    pub fn session(&self, id: Uuid) -> Option<Session> {
        let state = self.inner.lock().ok()?;
        state.sessions.iter().find(|s| s.id == id).cloned()
    }

    /// All sessions in creation order.
    pub fn all_sessions(&self) -> Vec<Session> {
        self.inner
            .lock()
            .map(|state| state.sessions.clone())
            .unwrap_or_default()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().map(|state| state.sessions.len()).unwrap_or(0)
    }

    pub fn clear_all_sessions(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.sessions.clear();
            state.current = None;
            info!("cleared all sessions");
        }
    }
}

impl Default for SessionRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::record::sample_measurement;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn with_drag(drag: f64) -> Measurement {
        let mut m = sample_measurement();
        m.drag_force = drag;
        m
    }

    #[test]
    fn blank_session_name_is_rejected() {
        let recorder = SessionRecorder::new();
        let err = recorder
            .start_session("   ", GeneratorConfig::default(), None, ts(0))
            .unwrap_err();
        assert!(matches!(err, TunnelError::Validation(_)));
        assert_eq!(recorder.session_count(), 0);
    }

    #[test]
    fn end_without_active_session_fails() {
        let recorder = SessionRecorder::new();
        let err = recorder.end_session(ts(0)).unwrap_err();
        assert!(matches!(err, TunnelError::NoActiveSession));
        assert_eq!(recorder.session_count(), 0);
    }

    #[test]
    fn lifecycle_records_and_seals() {
        let recorder = SessionRecorder::new();
        let id = recorder
            .start_session("run 1", GeneratorConfig::default(), None, ts(0))
            .unwrap();

        for drag in [0.30, 0.32, 0.34] {
            recorder.add_measurement(with_drag(drag));
        }

        let sealed = recorder.end_session(ts(2)).unwrap();
        assert_eq!(sealed.id, id);
        assert_eq!(sealed.data.len(), 3);
        assert!(!sealed.is_active());
        assert!(recorder.current_session().is_none());
    }

    #[test]
    fn measurements_without_session_are_dropped() {
        let recorder = SessionRecorder::new();
        recorder.add_measurement(sample_measurement());
        assert_eq!(recorder.session_count(), 0);
    }

    #[test]
    fn starting_while_active_seals_previous() {
        let recorder = SessionRecorder::new();
        let first = recorder
            .start_session("first", GeneratorConfig::default(), None, ts(0))
            .unwrap();
        let second = recorder
            .start_session("second", GeneratorConfig::default(), None, ts(5))
            .unwrap();

        let sealed = recorder.session(first).unwrap();
        assert_eq!(sealed.end_time, Some(ts(5)));
        assert_eq!(recorder.current_session().unwrap().id, second);
    }

    #[test]
    fn session_capacity_drops_oldest_entries() {
        let recorder = SessionRecorder::new();
        let id = recorder
            .start_session("long run", GeneratorConfig::default(), None, ts(0))
            .unwrap();

        for i in 0..(SESSION_CAPACITY + 50) {
            let mut m = sample_measurement();
            m.reynolds_number = i as f64;
            recorder.add_measurement(m);
        }

        let session = recorder.session(id).unwrap();
        assert_eq!(session.data.len(), SESSION_CAPACITY);
        assert_eq!(session.data[0].reynolds_number, 50.0);
    }

    #[test]
    fn stats_aggregate_each_channel() {
        let recorder = SessionRecorder::new();
        let id = recorder
            .start_session("stats run", GeneratorConfig::default(), None, ts(0))
            .unwrap();

        for drag in [0.30, 0.32, 0.34] {
            recorder.add_measurement(with_drag(drag));
        }
        recorder.end_session(ts(2)).unwrap();

        let stats = recorder.stats(id, ts(60)).unwrap();
        assert_eq!(stats.data_points, 3);
        assert_eq!(stats.duration_secs, 2.0);
        assert_eq!(stats.drag_force.min, 0.30);
        assert_eq!(stats.drag_force.max, 0.34);
        assert!((stats.drag_force.avg - 0.32).abs() < 1e-12);
        assert_eq!(stats.wind_speed.avg, 20.0);
    }

    #[test]
    fn stats_for_empty_session_is_none() {
        let recorder = SessionRecorder::new();
        let id = recorder
            .start_session("empty", GeneratorConfig::default(), None, ts(0))
            .unwrap();
        assert!(recorder.stats(id, ts(1)).is_none());
    }

    #[test]
    fn delete_session_clears_current() {
        let recorder = SessionRecorder::new();
        let id = recorder
            .start_session("doomed", GeneratorConfig::default(), None, ts(0))
            .unwrap();

        assert!(recorder.delete_session(id));
        assert!(recorder.current_session().is_none());
        assert_eq!(recorder.session_count(), 0);
        assert!(!recorder.delete_session(id));
    }
}
