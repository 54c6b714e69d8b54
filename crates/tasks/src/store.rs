// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Shared aggregate storage with per-event exclusive locking.
//!
//! Every event aggregate lives behind its own async mutex: at most one
//! mutation is in flight per event, while different events proceed
//! independently. Lock acquisition is bounded by a timeout so a stuck task
//! surfaces as a transient error instead of blocking the queue forever.

use crate::error::TaskError;
use admit::EventState;
use admit_audit::AuditEvent;
use admit_domain::EventId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Lock acquisition bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfig {
    /// How long a task may wait for an event's lock.
    pub acquire_timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Registry of event aggregates, one exclusive lock per event.
#[derive(Debug, Default)]
pub struct EventStore {
    events: RwLock<HashMap<EventId, Arc<Mutex<EventState>>>>,
    config: LockConfig,
}

impl EventStore {
    /// Creates an empty store with the given lock bounds.
    #[must_use]
    pub fn new(config: LockConfig) -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Registers (or replaces) an event aggregate.
    pub async fn insert(&self, state: EventState) {
        let event_id = state.event.id;
        self.events
            .write()
            .await
            .insert(event_id, Arc::new(Mutex::new(state)));
    }

    /// Acquires the exclusive lock for an event.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEvent` if the event is not registered, or
    /// `LockTimeout` if the lock could not be acquired within the
    /// configured window.
    pub async fn lock(&self, event_id: EventId) -> Result<OwnedMutexGuard<EventState>, TaskError> {
        let cell = self
            .events
            .read()
            .await
            .get(&event_id)
            .cloned()
            .ok_or(TaskError::UnknownEvent(event_id))?;
        tokio::time::timeout(self.config.acquire_timeout, cell.lock_owned())
            .await
            .map_err(|_| TaskError::LockTimeout(event_id))
    }

    /// Clones the current aggregate for read-only use.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEvent` or `LockTimeout` like [`Self::lock`].
    pub async fn snapshot(&self, event_id: EventId) -> Result<EventState, TaskError> {
        Ok(self.lock(event_id).await?.clone())
    }
}

/// Append-only in-memory record of committed transitions.
///
/// Every committed transition contributes exactly one audit event; the log
/// preserves arrival order.
#[derive(Debug, Default)]
pub struct AuditLog {
    events: std::sync::Mutex<Vec<AuditEvent>>,
}

impl AuditLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a committed transition's audit event.
    pub fn push(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// A snapshot of all recorded events in arrival order.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use admit_domain::Event;
    use chrono::{TimeZone, Utc};

    fn state(id: i64) -> EventState {
        let event = Event::new(
            EventId::new(id),
            Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).single().unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 2, 20, 0, 0).single().unwrap(),
        )
        .unwrap();
        EventState::new(event)
    }

    #[tokio::test]
    async fn test_unknown_event_is_rejected() {
        let store = EventStore::new(LockConfig::default());
        let result = store.lock(EventId::new(9)).await;
        assert!(matches!(result, Err(TaskError::UnknownEvent(_))));
    }

    #[tokio::test]
    async fn test_lock_times_out_while_held() {
        let store = EventStore::new(LockConfig {
            acquire_timeout: Duration::from_millis(10),
        });
        store.insert(state(1)).await;

        let guard = store.lock(EventId::new(1)).await.unwrap();
        let contender = store.lock(EventId::new(1)).await;
        let err = contender.map(|_| ()).unwrap_err();
        assert_eq!(err, TaskError::LockTimeout(EventId::new(1)));
        assert!(err.is_transient());
        drop(guard);

        // Released: the next acquisition succeeds.
        assert!(store.lock(EventId::new(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_different_events_lock_independently() {
        let store = EventStore::new(LockConfig {
            acquire_timeout: Duration::from_millis(10),
        });
        store.insert(state(1)).await;
        store.insert(state(2)).await;

        let _one = store.lock(EventId::new(1)).await.unwrap();
        assert!(store.lock(EventId::new(2)).await.is_ok());
    }
}
