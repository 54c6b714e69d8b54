// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::bump::{BumpReport, bump_open_slots, check_for_bump_or_rebalance};
use crate::command::Command;
use crate::eligibility::{
    EngineContext, effective_delay, group_matched_pools, most_exclusive, partition_full_open,
};
use crate::error::CoreError;
use crate::state::{EventState, TransitionResult};
use admit_audit::{Action, Actor, AuditEvent, Cause, StateSnapshot};
use admit_domain::{
    DomainError, Operation, PaymentStatus, Pool, PoolId, Registration, RegistrationId,
    RegistrationStatus, UserId,
};

/// Where a register request lands.
enum Placement {
    Admit(PoolId),
    Waiting,
}

fn record(
    actor: Actor,
    cause: Cause,
    name: &str,
    details: String,
    before: StateSnapshot,
    after: &EventState,
    ctx: &EngineContext<'_>,
) -> AuditEvent {
    AuditEvent::new(
        actor,
        cause,
        Action::new(String::from(name), Some(details)),
        before,
        after.to_snapshot(),
        after.event.id,
        ctx.now,
    )
}

/// A transition that leaves the aggregate untouched but still produces its
/// audit event (idempotent hits).
fn no_op(
    state: &EventState,
    actor: Actor,
    cause: Cause,
    name: &str,
    details: String,
    ctx: &EngineContext<'_>,
) -> TransitionResult {
    let before: StateSnapshot = state.to_snapshot();
    TransitionResult {
        audit_event: record(actor, cause, name, details, before, state, ctx),
        new_state: state.clone(),
        bumps: Vec::new(),
    }
}

/// The `(event, user)` uniqueness invariant. More than one row per user is
/// a consistency violation, not a request error.
fn ensure_unique_registration(state: &EventState, user_id: UserId) -> Result<(), CoreError> {
    let rows = state
        .registrations
        .iter()
        .filter(|reg| reg.user_id == user_id)
        .count();
    if rows > 1 {
        return Err(CoreError::DuplicateRegistration { user_id });
    }
    Ok(())
}

/// Resolves where a register request lands, per the pool-selection rules.
fn select_placement(
    state: &EventState,
    user_id: UserId,
    ctx: &EngineContext<'_>,
) -> Result<Placement, CoreError> {
    let matched = group_matched_pools(&state.pools, user_id, ctx.memberships);
    if matched.is_empty() {
        return Err(CoreError::DomainViolation(DomainError::NoAvailablePools {
            user_id,
        }));
    }
    if !matched.iter().any(|pool| pool.is_activated(ctx.now)) {
        return Err(CoreError::DomainViolation(DomainError::RegistrationNotOpen {
            user_id,
        }));
    }

    // A penalty-delayed activation that has not been reached yet is not an
    // error: the registrant waits.
    let eligible: Vec<&Pool> = match effective_delay(&state.event, user_id, ctx)? {
        None => Vec::new(),
        Some(delay) => matched
            .into_iter()
            .filter(|pool| pool.activation_date + delay <= ctx.now)
            .collect(),
    };
    if eligible.is_empty() {
        return Ok(Placement::Waiting);
    }

    if state.event.is_merged(ctx.now) || state.pools.len() == 1 {
        // Unified pool: only the event-wide capacity binds.
        if !state.has_event_capacity(ctx.now) {
            return Ok(Placement::Waiting);
        }
        let target = eligible
            .iter()
            .find(|pool| pool.has_open_slot())
            .copied()
            .unwrap_or(eligible[0]);
        return Ok(Placement::Admit(target.id));
    }

    let (_, open) = partition_full_open(&eligible);
    if open.is_empty() {
        return Ok(Placement::Waiting);
    }
    if open.len() == 1 {
        return Ok(Placement::Admit(open[0].id));
    }
    most_exclusive(&open, ctx.memberships)
        .map_or(Ok(Placement::Waiting), |pool| Ok(Placement::Admit(pool.id)))
}

fn describe_bumps(bumps: &[BumpReport]) -> String {
    bumps
        .iter()
        .map(|bump| match &bump.moved {
            Some(moved) => format!(
                "; bumped user {} into pool {} after moving user {} from pool {} to pool {}",
                bump.user_id, bump.into_pool, moved.user_id, moved.from_pool, moved.to_pool
            ),
            None => format!("; bumped user {} into pool {}", bump.user_id, bump.into_pool),
        })
        .collect()
}

/// Applies a command to the current state, producing a new state and audit
/// event.
///
/// Transitions are atomic: they either succeed completely or fail without
/// side effects. Every successful transition produces exactly one audit
/// event.
///
/// # Errors
///
/// Returns an error if:
/// - The command violates a domain rule (terminal, not retried)
/// - The command would break a consistency invariant (fatal)
#[allow(clippy::too_many_lines)]
pub fn apply(
    state: &EventState,
    command: Command,
    ctx: &EngineContext<'_>,
    actor: Actor,
    cause: Cause,
) -> Result<TransitionResult, CoreError> {
    match command {
        Command::MarkPending { user_id, op } => apply_mark_pending(state, user_id, op, ctx, actor, cause),
        Command::Register { user_id } => apply_register(state, user_id, ctx, actor, cause),
        Command::AdminRegister {
            requester,
            user_id,
            pool_id,
            reason,
        } => apply_admin_register(state, requester, user_id, pool_id, &reason, ctx, actor, cause),
        Command::Unregister { registration_id } => {
            apply_unregister(state, registration_id, ctx, actor, cause)
        }
        Command::MarkFailure { user_id, op } => {
            apply_mark_failure(state, user_id, op, ctx, actor, cause)
        }
        Command::CreatePool {
            name,
            capacity,
            activation_date,
            groups,
        } => {
            let before: StateSnapshot = state.to_snapshot();
            let mut new_state = state.clone();
            let pool_id = new_state.alloc_pool_id();
            let pool = Pool::new(pool_id, &name, capacity, activation_date, groups)?;
            new_state.pools.push(pool);
            let bumps = bump_open_slots(&mut new_state, ctx)?;
            let details = format!(
                "Created pool '{name}' with capacity {capacity}{}",
                describe_bumps(&bumps)
            );
            Ok(TransitionResult {
                audit_event: record(actor, cause, "CreatePool", details, before, &new_state, ctx),
                new_state,
                bumps,
            })
        }
        Command::UpdatePoolCapacity { pool_id, capacity } => {
            let pool = state
                .pool(pool_id)
                .ok_or(CoreError::DomainViolation(DomainError::PoolNotFound {
                    pool_id,
                }))?;
            if capacity > 0 && pool.counter > capacity {
                return Err(CoreError::DomainViolation(
                    DomainError::CapacityBelowAdmitted {
                        pool_id,
                        capacity,
                        admitted: pool.counter,
                    },
                ));
            }
            let grew =
                (capacity == 0 && !pool.is_unlimited()) || (!pool.is_unlimited() && capacity > pool.capacity);
            let old_capacity = pool.capacity;

            let before: StateSnapshot = state.to_snapshot();
            let mut new_state = state.clone();
            if let Some(pool) = new_state.pool_mut(pool_id) {
                pool.capacity = capacity;
            }
            let bumps = if grew {
                bump_open_slots(&mut new_state, ctx)?
            } else {
                Vec::new()
            };
            let details = format!(
                "Changed pool {pool_id} capacity from {old_capacity} to {capacity}{}",
                describe_bumps(&bumps)
            );
            Ok(TransitionResult {
                audit_event: record(
                    actor,
                    cause,
                    "UpdatePoolCapacity",
                    details,
                    before,
                    &new_state,
                    ctx,
                ),
                new_state,
                bumps,
            })
        }
        Command::DeletePool { pool_id } => {
            let pool = state
                .pool(pool_id)
                .ok_or(CoreError::DomainViolation(DomainError::PoolNotFound {
                    pool_id,
                }))?;
            let referenced = pool.counter > 0
                || state
                    .registrations
                    .iter()
                    .any(|reg| reg.pool == Some(pool_id));
            if referenced {
                return Err(CoreError::DomainViolation(DomainError::PoolNotEmpty {
                    pool_id,
                }));
            }
            let name = pool.name.clone();

            let before: StateSnapshot = state.to_snapshot();
            let mut new_state = state.clone();
            new_state.pools.retain(|pool| pool.id != pool_id);
            let details = format!("Deleted pool '{name}'");
            Ok(TransitionResult {
                audit_event: record(actor, cause, "DeletePool", details, before, &new_state, ctx),
                new_state,
                bumps: Vec::new(),
            })
        }
        Command::BumpOnPoolChange => {
            let before: StateSnapshot = state.to_snapshot();
            let mut new_state = state.clone();
            let bumps = bump_open_slots(&mut new_state, ctx)?;
            let details = if bumps.is_empty() {
                String::from("No promotions applied")
            } else {
                format!("Promoted {} waiting registrations{}", bumps.len(), describe_bumps(&bumps))
            };
            Ok(TransitionResult {
                audit_event: record(
                    actor,
                    cause,
                    "BumpOnPoolChange",
                    details,
                    before,
                    &new_state,
                    ctx,
                ),
                new_state,
                bumps,
            })
        }
        Command::PaymentInitiated {
            registration_id,
            intent_id,
            amount,
        } => {
            let registration = state.registration(registration_id).ok_or(
                CoreError::DomainViolation(DomainError::RegistrationNotFound { registration_id }),
            )?;
            registration
                .payment
                .status
                .validate_transition(PaymentStatus::Pending)?;

            let before: StateSnapshot = state.to_snapshot();
            let mut new_state = state.clone();
            if let Some(registration) = new_state.registration_mut(registration_id) {
                registration.payment.intent_id = Some(intent_id.clone());
                registration.payment.amount = Some(amount);
                registration.payment.status = PaymentStatus::Pending;
            }
            let details =
                format!("Created payment intent {intent_id} ({amount}) for registration {registration_id}");
            Ok(TransitionResult {
                audit_event: record(
                    actor,
                    cause,
                    "PaymentInitiated",
                    details,
                    before,
                    &new_state,
                    ctx,
                ),
                new_state,
                bumps: Vec::new(),
            })
        }
        Command::PaymentStatusChanged {
            registration_id,
            status,
        } => {
            let registration = state.registration(registration_id).ok_or(
                CoreError::DomainViolation(DomainError::RegistrationNotFound { registration_id }),
            )?;
            registration.payment.status.validate_transition(status)?;

            let before: StateSnapshot = state.to_snapshot();
            let mut new_state = state.clone();
            if let Some(registration) = new_state.registration_mut(registration_id) {
                registration.payment.status = status;
            }
            let details =
                format!("Payment for registration {registration_id} moved to {status}");
            Ok(TransitionResult {
                audit_event: record(
                    actor,
                    cause,
                    "PaymentStatusChanged",
                    details,
                    before,
                    &new_state,
                    ctx,
                ),
                new_state,
                bumps: Vec::new(),
            })
        }
    }
}

fn apply_mark_pending(
    state: &EventState,
    user_id: UserId,
    op: Operation,
    ctx: &EngineContext<'_>,
    actor: Actor,
    cause: Cause,
) -> Result<TransitionResult, CoreError> {
    ensure_unique_registration(state, user_id)?;
    match op {
        Operation::Register => {
            if let Some(existing) = state.registration_for_user(user_id) {
                if existing.status == RegistrationStatus::PendingRegister
                    || existing.is_admitted()
                    || existing.is_waiting()
                {
                    return Ok(no_op(
                        state,
                        actor,
                        cause,
                        "MarkPending",
                        format!("User {user_id} already has registration {}", existing.id),
                        ctx,
                    ));
                }
                existing
                    .status
                    .validate_transition(RegistrationStatus::PendingRegister)?;

                let before: StateSnapshot = state.to_snapshot();
                let mut new_state = state.clone();
                let registration_id = existing.id;
                if let Some(registration) = new_state.registration_mut(registration_id) {
                    registration.status = RegistrationStatus::PendingRegister;
                }
                let details =
                    format!("Registration {registration_id} pending register for user {user_id}");
                return Ok(TransitionResult {
                    audit_event: record(actor, cause, "MarkPending", details, before, &new_state, ctx),
                    new_state,
                    bumps: Vec::new(),
                });
            }

            let before: StateSnapshot = state.to_snapshot();
            let mut new_state = state.clone();
            let registration_id = new_state.alloc_registration_id();
            new_state
                .registrations
                .push(Registration::new(registration_id, user_id, ctx.now));
            let details = format!("Created pending registration {registration_id} for user {user_id}");
            Ok(TransitionResult {
                audit_event: record(actor, cause, "MarkPending", details, before, &new_state, ctx),
                new_state,
                bumps: Vec::new(),
            })
        }
        Operation::Unregister => {
            let existing = state.registration_for_user(user_id).ok_or(
                CoreError::DomainViolation(DomainError::RegistrationNotFoundForUser { user_id }),
            )?;
            if !existing.is_active() || existing.status == RegistrationStatus::PendingUnregister {
                return Ok(no_op(
                    state,
                    actor,
                    cause,
                    "MarkPending",
                    format!("Registration {} requires no unregister transition", existing.id),
                    ctx,
                ));
            }
            existing
                .status
                .validate_transition(RegistrationStatus::PendingUnregister)?;

            let before: StateSnapshot = state.to_snapshot();
            let mut new_state = state.clone();
            let registration_id = existing.id;
            if let Some(registration) = new_state.registration_mut(registration_id) {
                registration.status = RegistrationStatus::PendingUnregister;
            }
            let details =
                format!("Registration {registration_id} pending unregister for user {user_id}");
            Ok(TransitionResult {
                audit_event: record(actor, cause, "MarkPending", details, before, &new_state, ctx),
                new_state,
                bumps: Vec::new(),
            })
        }
    }
}

#[allow(clippy::too_many_lines)]
fn apply_register(
    state: &EventState,
    user_id: UserId,
    ctx: &EngineContext<'_>,
    actor: Actor,
    cause: Cause,
) -> Result<TransitionResult, CoreError> {
    ensure_unique_registration(state, user_id)?;
    // The idempotent hit comes first: a repeated call for an already
    // placed user succeeds even after the close time.
    if let Some(existing) = state.registration_for_user(user_id) {
        if existing.is_admitted() || existing.is_waiting() {
            return Ok(no_op(
                state,
                actor,
                cause,
                "Register",
                format!("User {user_id} is already registered"),
                ctx,
            ));
        }
        existing
            .status
            .validate_transition(RegistrationStatus::SuccessRegister)?;
    }
    if !state.event.registration_open(ctx.now) {
        return Err(CoreError::DomainViolation(DomainError::RegistrationClosed {
            event_id: state.event.id,
        }));
    }

    let placement = select_placement(state, user_id, ctx)?;

    let before: StateSnapshot = state.to_snapshot();
    let mut new_state = state.clone();
    let registration_id = match new_state.registration_for_user(user_id) {
        Some(existing) => existing.id,
        None => {
            let id = new_state.alloc_registration_id();
            new_state
                .registrations
                .push(Registration::new(id, user_id, ctx.now));
            id
        }
    };

    let details = match placement {
        Placement::Admit(pool_id) => {
            if let Some(registration) = new_state.registration_mut(registration_id) {
                registration.unregistration_date = None;
                registration.pool = Some(pool_id);
                registration.status = RegistrationStatus::SuccessRegister;
            }
            let event_id = new_state.event.id;
            let pool_name = match new_state.pool_mut(pool_id) {
                Some(pool) => {
                    pool.counter += 1;
                    pool.name.clone()
                }
                None => return Err(CoreError::ForeignPool { pool_id, event_id }),
            };
            format!("Admitted user {user_id} into pool '{pool_name}'")
        }
        Placement::Waiting => {
            let mut registration_date = ctx.now;
            if let Some(registration) = new_state.registration_mut(registration_id) {
                registration.unregistration_date = None;
                registration.pool = None;
                registration.status = RegistrationStatus::SuccessRegister;
                registration_date = registration.registration_date;
            }
            new_state.waiting.insert(registration_date, registration_id);
            format!("User {user_id} appended to the waiting list")
        }
    };

    Ok(TransitionResult {
        audit_event: record(actor, cause, "Register", details, before, &new_state, ctx),
        new_state,
        bumps: Vec::new(),
    })
}

#[allow(clippy::too_many_arguments)]
fn apply_admin_register(
    state: &EventState,
    requester: UserId,
    user_id: UserId,
    pool_id: Option<PoolId>,
    reason: &str,
    ctx: &EngineContext<'_>,
    actor: Actor,
    cause: Cause,
) -> Result<TransitionResult, CoreError> {
    ensure_unique_registration(state, user_id)?;
    if let Some(existing) = state.registration_for_user(user_id) {
        if existing.is_admitted() || existing.is_waiting() {
            return Ok(no_op(
                state,
                actor,
                cause,
                "AdminRegister",
                format!("User {user_id} is already registered"),
                ctx,
            ));
        }
        existing
            .status
            .validate_transition(RegistrationStatus::SuccessRegister)?;
    }

    // The target pool must belong to this event. Anything else is a broken
    // aggregate, not a rejected request.
    let target: Option<PoolId> = match pool_id {
        Some(requested) => {
            let pool = state.pool(requested).ok_or(CoreError::ForeignPool {
                pool_id: requested,
                event_id: state.event.id,
            })?;
            if !pool.has_open_slot() {
                return Err(CoreError::DomainViolation(DomainError::PoolFull {
                    pool_id: requested,
                }));
            }
            Some(requested)
        }
        None => state
            .pools
            .iter()
            .find(|pool| pool.has_open_slot())
            .map(|pool| pool.id),
    };

    let before: StateSnapshot = state.to_snapshot();
    let mut new_state = state.clone();
    let registration_id = match new_state.registration_for_user(user_id) {
        Some(existing) => existing.id,
        None => {
            let id = new_state.alloc_registration_id();
            new_state
                .registrations
                .push(Registration::new(id, user_id, ctx.now));
            id
        }
    };

    let details = match target {
        Some(pool_id) => {
            if let Some(registration) = new_state.registration_mut(registration_id) {
                registration.unregistration_date = None;
                registration.pool = Some(pool_id);
                registration.status = RegistrationStatus::SuccessRegister;
            }
            let event_id = new_state.event.id;
            let pool_name = match new_state.pool_mut(pool_id) {
                Some(pool) => {
                    pool.counter += 1;
                    pool.name.clone()
                }
                None => return Err(CoreError::ForeignPool { pool_id, event_id }),
            };
            format!(
                "Requester {requester} admitted user {user_id} into pool '{pool_name}': {reason}"
            )
        }
        None => {
            let mut registration_date = ctx.now;
            if let Some(registration) = new_state.registration_mut(registration_id) {
                registration.unregistration_date = None;
                registration.pool = None;
                registration.status = RegistrationStatus::SuccessRegister;
                registration_date = registration.registration_date;
            }
            new_state.waiting.insert(registration_date, registration_id);
            format!(
                "Requester {requester} appended user {user_id} to the waiting list: {reason}"
            )
        }
    };

    Ok(TransitionResult {
        audit_event: record(actor, cause, "AdminRegister", details, before, &new_state, ctx),
        new_state,
        bumps: Vec::new(),
    })
}

fn apply_unregister(
    state: &EventState,
    registration_id: RegistrationId,
    ctx: &EngineContext<'_>,
    actor: Actor,
    cause: Cause,
) -> Result<TransitionResult, CoreError> {
    let registration = state.registration(registration_id).ok_or(
        CoreError::DomainViolation(DomainError::RegistrationNotFound { registration_id }),
    )?;
    if !registration.is_active() {
        return Ok(no_op(
            state,
            actor,
            cause,
            "Unregister",
            format!("Registration {registration_id} is already unregistered"),
            ctx,
        ));
    }
    if !state.event.unregistration_open(ctx.now) {
        return Err(CoreError::DomainViolation(
            DomainError::UnregistrationDeadlinePassed {
                event_id: state.event.id,
            },
        ));
    }
    registration
        .status
        .validate_transition(RegistrationStatus::SuccessUnregister)?;

    let user_id = registration.user_id;
    let vacated = registration.pool;
    let registration_date = registration.registration_date;
    // The row may have left the waiting status already (pending
    // unregister); the index entry is keyed by date and id, so check it
    // directly.
    let was_indexed = state.waiting.contains(registration_date, registration_id);

    // Catch a drifted counter before it underflows.
    if let Some(pool_id) = vacated {
        let pool = state.pool(pool_id).ok_or(CoreError::ForeignPool {
            pool_id,
            event_id: state.event.id,
        })?;
        if pool.counter == 0 {
            let admitted = state
                .registrations
                .iter()
                .filter(|reg| reg.is_admitted() && reg.pool == Some(pool_id))
                .count();
            return Err(CoreError::CounterMismatch {
                pool_id,
                counter: 0,
                admitted: u32::try_from(admitted).unwrap_or(u32::MAX),
            });
        }
    }

    let before: StateSnapshot = state.to_snapshot();
    let mut new_state = state.clone();
    if let Some(registration) = new_state.registration_mut(registration_id) {
        registration.pool = None;
        registration.unregistration_date = Some(ctx.now);
        registration.status = RegistrationStatus::SuccessUnregister;
    }
    if was_indexed {
        new_state.waiting.remove(registration_date, registration_id);
    }

    let mut bumps: Vec<BumpReport> = Vec::new();
    if let Some(pool_id) = vacated {
        if let Some(pool) = new_state.pool_mut(pool_id) {
            pool.counter -= 1;
        }
        if let Some(report) = check_for_bump_or_rebalance(&mut new_state, pool_id, ctx)? {
            bumps.push(report);
        }
    }

    let details = format!("Unregistered user {user_id}{}", describe_bumps(&bumps));
    Ok(TransitionResult {
        audit_event: record(actor, cause, "Unregister", details, before, &new_state, ctx),
        new_state,
        bumps,
    })
}

fn apply_mark_failure(
    state: &EventState,
    user_id: UserId,
    op: Operation,
    ctx: &EngineContext<'_>,
    actor: Actor,
    cause: Cause,
) -> Result<TransitionResult, CoreError> {
    let existing = state.registration_for_user(user_id).ok_or(
        CoreError::DomainViolation(DomainError::RegistrationNotFoundForUser { user_id }),
    )?;
    let target = op.failure_status();
    if existing.status == target {
        return Ok(no_op(
            state,
            actor,
            cause,
            "MarkFailure",
            format!("Registration {} already marked failed", existing.id),
            ctx,
        ));
    }
    existing.status.validate_transition(target)?;

    let before: StateSnapshot = state.to_snapshot();
    let mut new_state = state.clone();
    let registration_id = existing.id;
    if let Some(registration) = new_state.registration_mut(registration_id) {
        registration.status = target;
    }
    let details = format!("Registration {registration_id} forced to {target} for user {user_id}");
    Ok(TransitionResult {
        audit_event: record(actor, cause, "MarkFailure", details, before, &new_state, ctx),
        new_state,
        bumps: Vec::new(),
    })
}
