// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Pool eligibility resolution.
//!
//! A pool qualifies for a user when its activation date, adjusted by the
//! user's penalty delay, has been reached and the user's effective groups
//! intersect the pool's groups. An empty result is not an error: it signals
//! waiting-list placement, or a terminal failure when the user matches no
//! pool at all.
//!
//! The most-exclusive ordering protects registrants with narrower access
//! from being starved by broader-access users before pools merge.

use crate::error::CoreError;
use crate::state::EventState;
use admit_domain::{
    Event, MembershipDirectory, PenaltyConfig, PenaltyLedger, Pool, UserId, registration_delay,
};
use chrono::{DateTime, Duration, Utc};

/// Everything a transition needs beyond the aggregate itself: the clock
/// and the membership/penalty views resolved once for the operation.
#[derive(Debug, Clone, Copy)]
pub struct EngineContext<'a> {
    /// The instant the transition is evaluated at.
    pub now: DateTime<Utc>,
    /// Resolved membership snapshot for this operation.
    pub memberships: &'a MembershipDirectory,
    /// Penalty ledger for this operation.
    pub penalties: &'a PenaltyLedger,
    /// Penalty expiry and delay configuration.
    pub penalty_config: &'a PenaltyConfig,
}

/// The user's effective registration delay for this event.
///
/// `Ok(None)` means admission is blocked outright (waiting list only).
///
/// # Errors
///
/// Returns an error if penalty expiry cannot be evaluated.
pub(crate) fn effective_delay(
    event: &Event,
    user_id: UserId,
    ctx: &EngineContext<'_>,
) -> Result<Option<Duration>, CoreError> {
    if !event.heed_penalties {
        return Ok(Some(Duration::zero()));
    }
    let weight = ctx
        .penalties
        .active_weight(user_id, ctx.now, ctx.penalty_config)?;
    Ok(registration_delay(weight))
}

/// Whether the user may join the given pool right now: group match plus
/// penalty-adjusted activation.
///
/// # Errors
///
/// Returns an error if penalty expiry cannot be evaluated.
pub fn may_join(
    event: &Event,
    pool: &Pool,
    user_id: UserId,
    ctx: &EngineContext<'_>,
) -> Result<bool, CoreError> {
    if !ctx.memberships.is_member_of_any(user_id, &pool.groups) {
        return Ok(false);
    }
    match effective_delay(event, user_id, ctx)? {
        None => Ok(false),
        Some(delay) => Ok(pool.activation_date + delay <= ctx.now),
    }
}

/// Pools whose eligible groups intersect the user's effective groups,
/// in pool order.
#[must_use]
pub fn group_matched_pools<'a>(
    pools: &'a [Pool],
    user_id: UserId,
    memberships: &MembershipDirectory,
) -> Vec<&'a Pool> {
    pools
        .iter()
        .filter(|pool| memberships.is_member_of_any(user_id, &pool.groups))
        .collect()
}

/// Pools the user may join right now, in pool order.
///
/// # Errors
///
/// Returns an error if penalty expiry cannot be evaluated.
pub fn eligible_pools<'a>(
    state: &'a EventState,
    user_id: UserId,
    ctx: &EngineContext<'_>,
) -> Result<Vec<&'a Pool>, CoreError> {
    let mut eligible: Vec<&Pool> = Vec::new();
    for pool in &state.pools {
        if may_join(&state.event, pool, user_id, ctx)? {
            eligible.push(pool);
        }
    }
    Ok(eligible)
}

/// Partitions candidate pools into `(full, open)`.
///
/// Only pools with a positive capacity can be full; an unlimited pool is
/// always open.
#[must_use]
pub fn partition_full_open<'a>(pools: &[&'a Pool]) -> (Vec<&'a Pool>, Vec<&'a Pool>) {
    let mut full: Vec<&Pool> = Vec::new();
    let mut open: Vec<&Pool> = Vec::new();
    for pool in pools.iter().copied() {
        if pool.has_open_slot() {
            open.push(pool);
        } else {
            full.push(pool);
        }
    }
    (full, open)
}

/// Selects the most exclusive pool: lowest distinct eligible-group
/// membership count, ties broken by highest capacity (unlimited counts as
/// largest), then lowest pool id for determinism.
#[must_use]
pub fn most_exclusive<'a>(
    pools: &[&'a Pool],
    memberships: &MembershipDirectory,
) -> Option<&'a Pool> {
    pools.iter().copied().min_by(|a, b| {
        let members_a = memberships.distinct_member_count(&a.groups);
        let members_b = memberships.distinct_member_count(&b.groups);
        let capacity_a = if a.is_unlimited() { u32::MAX } else { a.capacity };
        let capacity_b = if b.is_unlimited() { u32::MAX } else { b.capacity };
        members_a
            .cmp(&members_b)
            .then(capacity_b.cmp(&capacity_a))
            .then(a.id.cmp(&b.id))
    })
}
