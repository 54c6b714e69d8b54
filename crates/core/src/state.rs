// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::bump::BumpReport;
use crate::error::CoreError;
use admit_audit::{AuditEvent, StateSnapshot};
use admit_domain::{Event, Pool, PoolId, Registration, RegistrationId, UserId};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Explicit ordered index over the waiting list.
///
/// Keyed by `(registration_date, registration_id)` so that iteration order
/// is the FIFO fairness contract: earliest registration date first, with
/// the row identifier as a deterministic tie-breaker. This makes the
/// waiting-list pop a first-class, testable operation instead of an
/// incidental property of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitingList {
    entries: BTreeSet<(DateTime<Utc>, RegistrationId)>,
}

impl WaitingList {
    /// Creates an empty waiting list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeSet::new(),
        }
    }

    /// Inserts a registration into the index.
    pub fn insert(&mut self, registration_date: DateTime<Utc>, id: RegistrationId) {
        self.entries.insert((registration_date, id));
    }

    /// Removes a registration from the index. Returns whether it was
    /// present.
    pub fn remove(&mut self, registration_date: DateTime<Utc>, id: RegistrationId) -> bool {
        self.entries.remove(&(registration_date, id))
    }

    /// Whether the registration is indexed.
    #[must_use]
    pub fn contains(&self, registration_date: DateTime<Utc>, id: RegistrationId) -> bool {
        self.entries.contains(&(registration_date, id))
    }

    /// Iterates registration ids in FIFO order.
    pub fn iter(&self) -> impl Iterator<Item = RegistrationId> + '_ {
        self.entries.iter().map(|(_, id)| *id)
    }

    /// Number of waiting registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the waiting list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The complete system state scoped to a single event.
///
/// The event exclusively owns its pools and registrations; registrations
/// reference pools only within this aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventState {
    /// The event this state is scoped to.
    pub event: Event,
    /// All pools of the event.
    pub pools: Vec<Pool>,
    /// All registration rows of the event, active and inactive.
    pub registrations: Vec<Registration>,
    /// Ordered index over waiting registrations.
    pub waiting: WaitingList,
    next_registration_id: i64,
    next_pool_id: i64,
}

impl EventState {
    /// Creates a new empty state for an event.
    #[must_use]
    pub const fn new(event: Event) -> Self {
        Self {
            event,
            pools: Vec::new(),
            registrations: Vec::new(),
            waiting: WaitingList::new(),
            next_registration_id: 1,
            next_pool_id: 1,
        }
    }

    /// Allocates the next registration identifier.
    pub(crate) const fn alloc_registration_id(&mut self) -> RegistrationId {
        let id = RegistrationId::new(self.next_registration_id);
        self.next_registration_id += 1;
        id
    }

    /// Allocates the next pool identifier.
    pub(crate) const fn alloc_pool_id(&mut self) -> PoolId {
        let id = PoolId::new(self.next_pool_id);
        self.next_pool_id += 1;
        id
    }

    /// Looks up a pool by id.
    #[must_use]
    pub fn pool(&self, id: PoolId) -> Option<&Pool> {
        self.pools.iter().find(|pool| pool.id == id)
    }

    pub(crate) fn pool_mut(&mut self, id: PoolId) -> Option<&mut Pool> {
        self.pools.iter_mut().find(|pool| pool.id == id)
    }

    /// Looks up a registration by id.
    #[must_use]
    pub fn registration(&self, id: RegistrationId) -> Option<&Registration> {
        self.registrations.iter().find(|reg| reg.id == id)
    }

    pub(crate) fn registration_mut(&mut self, id: RegistrationId) -> Option<&mut Registration> {
        self.registrations.iter_mut().find(|reg| reg.id == id)
    }

    /// Looks up the single registration row for a user.
    #[must_use]
    pub fn registration_for_user(&self, user_id: UserId) -> Option<&Registration> {
        self.registrations.iter().find(|reg| reg.user_id == user_id)
    }

    /// Total admitted registrations across all pools, from the counters.
    #[must_use]
    pub fn total_admitted(&self) -> u32 {
        self.pools.iter().map(|pool| pool.counter).sum()
    }

    /// Event-wide capacity across activated pools at `now`.
    ///
    /// `None` means unlimited (some activated pool has capacity zero).
    #[must_use]
    pub fn total_capacity(&self, now: DateTime<Utc>) -> Option<u64> {
        let mut total: u64 = 0;
        for pool in self.pools.iter().filter(|pool| pool.is_activated(now)) {
            if pool.is_unlimited() {
                return None;
            }
            total += u64::from(pool.capacity);
        }
        Some(total)
    }

    /// Whether event-wide admitted count is below event-wide capacity.
    #[must_use]
    pub fn has_event_capacity(&self, now: DateTime<Utc>) -> bool {
        match self.total_capacity(now) {
            None => true,
            Some(capacity) => u64::from(self.total_admitted()) < capacity,
        }
    }

    /// Converts the state to a snapshot for audit purposes.
    #[must_use]
    pub fn to_snapshot(&self) -> StateSnapshot {
        StateSnapshot::new(format!(
            "event={},pools={},admitted={},waiting={}",
            self.event.id,
            self.pools.len(),
            self.total_admitted(),
            self.waiting.len()
        ))
    }
}

/// The result of a successful state transition.
///
/// Transitions are atomic: they either succeed completely or fail without
/// side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    /// The new state after the transition.
    pub new_state: EventState,
    /// The audit event recording this transition.
    pub audit_event: AuditEvent,
    /// Waiting registrants promoted as part of this transition.
    pub bumps: Vec<BumpReport>,
}

/// Verifies that every pool counter equals its live admitted count and
/// that every pool reference resolves within the event.
///
/// # Errors
///
/// Returns a consistency violation on the first divergence found. A
/// mismatch indicates a concurrency bug and is never silently corrected.
pub fn check_pool_counters(state: &EventState) -> Result<(), CoreError> {
    for registration in &state.registrations {
        if let Some(pool_id) = registration.pool
            && state.pool(pool_id).is_none()
        {
            return Err(CoreError::ForeignPool {
                pool_id,
                event_id: state.event.id,
            });
        }
    }

    for pool in &state.pools {
        let admitted = state
            .registrations
            .iter()
            .filter(|reg| reg.is_admitted() && reg.pool == Some(pool.id))
            .count();
        let admitted = u32::try_from(admitted).unwrap_or(u32::MAX);
        if admitted != pool.counter {
            return Err(CoreError::CounterMismatch {
                pool_id: pool.id,
                counter: pool.counter,
                admitted,
            });
        }
    }

    Ok(())
}
