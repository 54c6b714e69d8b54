// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Waiting-list promotion: bump and rebalance.
//!
//! A bump promotes the earliest eligible waiting registration into an open
//! slot. When no waiting registrant is eligible for a vacated pool, the
//! rebalance pass looks for an admitted registrant in a full pool who could
//! occupy the vacated slot instead, freeing their slot for a waiting
//! registrant who is eligible there.
//!
//! ## Invariants
//!
//! - The waiting list is scanned strictly in FIFO order
//! - Rebalance is greedy: it stops at the first successful move per scan,
//!   bounding the cascade to O(waiting registrants x pools)
//! - A bump never decreases the total admitted count

use crate::eligibility::{EngineContext, may_join};
use crate::error::CoreError;
use crate::state::EventState;
use admit_domain::{DomainError, GroupId, PoolId, RegistrationId, UserId};

/// A waiting registrant promoted into a pool slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpReport {
    /// The promoted registration.
    pub registration_id: RegistrationId,
    /// The promoted user.
    pub user_id: UserId,
    /// The pool the registrant was admitted into.
    pub into_pool: PoolId,
    /// The admitted registrant relocated to make room, if any.
    pub moved: Option<RebalanceMove>,
}

/// An admitted registrant moved between pools during a rebalance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalanceMove {
    /// The relocated registration.
    pub registration_id: RegistrationId,
    /// The relocated user.
    pub user_id: UserId,
    /// The pool the registrant was moved out of.
    pub from_pool: PoolId,
    /// The pool the registrant was moved into.
    pub to_pool: PoolId,
}

/// Returns the earliest waiting registration eligible for `to_pool`, or the
/// earliest eligible for any pool when `to_pool` is `None` (post-merge
/// semantics), together with the target pool.
pub(crate) fn pop_from_waiting_list(
    state: &EventState,
    to_pool: Option<PoolId>,
    ctx: &EngineContext<'_>,
) -> Result<Option<(RegistrationId, PoolId)>, CoreError> {
    for registration_id in state.waiting.iter() {
        let registration = state
            .registration(registration_id)
            .ok_or(CoreError::WaitingIndexInconsistent { registration_id })?;
        // A row mid-unregistration stays indexed until the unregister
        // commits; it must not be promoted.
        if !registration.is_waiting() {
            continue;
        }
        match to_pool {
            Some(pool_id) => {
                let pool = state
                    .pool(pool_id)
                    .ok_or(CoreError::DomainViolation(DomainError::PoolNotFound {
                        pool_id,
                    }))?;
                if may_join(&state.event, pool, registration.user_id, ctx)? {
                    return Ok(Some((registration_id, pool_id)));
                }
            }
            None => {
                for pool in &state.pools {
                    if may_join(&state.event, pool, registration.user_id, ctx)? {
                        return Ok(Some((registration_id, pool.id)));
                    }
                }
            }
        }
    }
    Ok(None)
}

/// Admits a waiting registration into a pool: removes it from the waiting
/// index, binds the pool, and increments the counter.
pub(crate) fn admit_waiter(
    state: &mut EventState,
    registration_id: RegistrationId,
    pool_id: PoolId,
) -> Result<(), CoreError> {
    let registration_date = state
        .registration(registration_id)
        .ok_or(CoreError::WaitingIndexInconsistent { registration_id })?
        .registration_date;
    state.waiting.remove(registration_date, registration_id);
    if let Some(registration) = state.registration_mut(registration_id) {
        registration.pool = Some(pool_id);
    }
    let event_id = state.event.id;
    match state.pool_mut(pool_id) {
        Some(pool) => {
            pool.counter += 1;
            Ok(())
        }
        None => Err(CoreError::ForeignPool { pool_id, event_id }),
    }
}

/// Promotes a waiting registrant after a slot opened in `vacated`.
///
/// Scans the waiting list in FIFO order for the first registrant eligible
/// for the vacated pool; failing that, attempts one greedy rebalance move.
pub(crate) fn check_for_bump_or_rebalance(
    state: &mut EventState,
    vacated: PoolId,
    ctx: &EngineContext<'_>,
) -> Result<Option<BumpReport>, CoreError> {
    if !state.has_event_capacity(ctx.now) {
        return Ok(None);
    }

    if state.event.is_merged(ctx.now) {
        if let Some((registration_id, pool_id)) = pop_from_waiting_list(state, None, ctx)? {
            let user_id = state
                .registration(registration_id)
                .ok_or(CoreError::WaitingIndexInconsistent { registration_id })?
                .user_id;
            admit_waiter(state, registration_id, pool_id)?;
            return Ok(Some(BumpReport {
                registration_id,
                user_id,
                into_pool: pool_id,
                moved: None,
            }));
        }
        return Ok(None);
    }

    if let Some((registration_id, pool_id)) = pop_from_waiting_list(state, Some(vacated), ctx)? {
        let user_id = state
            .registration(registration_id)
            .ok_or(CoreError::WaitingIndexInconsistent { registration_id })?
            .user_id;
        admit_waiter(state, registration_id, pool_id)?;
        return Ok(Some(BumpReport {
            registration_id,
            user_id,
            into_pool: pool_id,
            moved: None,
        }));
    }

    rebalance_into(state, vacated, ctx)
}

/// Attempts one greedy rebalance move toward the open slot in `target`.
///
/// Walks the waiting list in FIFO order; for each waiting registrant, walks
/// the full pools they are eligible for in pool order and looks for an
/// admitted registrant there whose groups also cover `target`. The first
/// such pair is applied and the scan stops.
pub(crate) fn rebalance_into(
    state: &mut EventState,
    target: PoolId,
    ctx: &EngineContext<'_>,
) -> Result<Option<BumpReport>, CoreError> {
    let target_groups: Vec<GroupId> = state
        .pool(target)
        .ok_or(CoreError::DomainViolation(DomainError::PoolNotFound {
            pool_id: target,
        }))?
        .groups
        .clone();

    let waiting_ids: Vec<RegistrationId> = state.waiting.iter().collect();
    for registration_id in waiting_ids {
        let waiter = state
            .registration(registration_id)
            .ok_or(CoreError::WaitingIndexInconsistent { registration_id })?;
        if !waiter.is_waiting() {
            continue;
        }
        let waiter_user = waiter.user_id;

        let full_pool_ids: Vec<PoolId> = state
            .pools
            .iter()
            .filter(|pool| !pool.is_unlimited() && pool.counter >= pool.capacity)
            .map(|pool| pool.id)
            .collect();

        for pool_id in full_pool_ids {
            let Some(pool) = state.pool(pool_id) else {
                continue;
            };
            if !may_join(&state.event, pool, waiter_user, ctx)? {
                continue;
            }

            let mover = state
                .registrations
                .iter()
                .find(|reg| {
                    reg.is_admitted()
                        && reg.pool == Some(pool_id)
                        && ctx.memberships.is_member_of_any(reg.user_id, &target_groups)
                })
                .map(|reg| (reg.id, reg.user_id));

            if let Some((mover_id, mover_user)) = mover {
                if let Some(registration) = state.registration_mut(mover_id) {
                    registration.pool = Some(target);
                }
                if let Some(from) = state.pool_mut(pool_id) {
                    from.counter -= 1;
                }
                if let Some(to) = state.pool_mut(target) {
                    to.counter += 1;
                }
                admit_waiter(state, registration_id, pool_id)?;
                return Ok(Some(BumpReport {
                    registration_id,
                    user_id: waiter_user,
                    into_pool: pool_id,
                    moved: Some(RebalanceMove {
                        registration_id: mover_id,
                        user_id: mover_user,
                        from_pool: pool_id,
                        to_pool: target,
                    }),
                }));
            }
        }
    }
    Ok(None)
}

/// Re-runs the bump/rebalance scan against every open slot until no
/// further promotion applies. Idempotent: with no capacity change since
/// the last run, the scan is a no-op.
pub(crate) fn bump_open_slots(
    state: &mut EventState,
    ctx: &EngineContext<'_>,
) -> Result<Vec<BumpReport>, CoreError> {
    let mut reports: Vec<BumpReport> = Vec::new();
    loop {
        if state.waiting.is_empty() || !state.has_event_capacity(ctx.now) {
            break;
        }
        let merged = state.event.is_merged(ctx.now);

        let popped = if merged {
            pop_from_waiting_list(state, None, ctx)?
        } else {
            let open_ids: Vec<PoolId> = state
                .pools
                .iter()
                .filter(|pool| pool.has_open_slot())
                .map(|pool| pool.id)
                .collect();
            let mut found = None;
            for pool_id in open_ids {
                if let Some(hit) = pop_from_waiting_list(state, Some(pool_id), ctx)? {
                    found = Some(hit);
                    break;
                }
            }
            found
        };

        if let Some((registration_id, pool_id)) = popped {
            let user_id = state
                .registration(registration_id)
                .ok_or(CoreError::WaitingIndexInconsistent { registration_id })?
                .user_id;
            admit_waiter(state, registration_id, pool_id)?;
            reports.push(BumpReport {
                registration_id,
                user_id,
                into_pool: pool_id,
                moved: None,
            });
            continue;
        }

        if !merged {
            let open_ids: Vec<PoolId> = state
                .pools
                .iter()
                .filter(|pool| pool.has_open_slot())
                .map(|pool| pool.id)
                .collect();
            let mut moved = false;
            for pool_id in open_ids {
                if let Some(report) = rebalance_into(state, pool_id, ctx)? {
                    reports.push(report);
                    moved = true;
                    break;
                }
            }
            if moved {
                continue;
            }
        }
        break;
    }
    Ok(reports)
}
