// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Task orchestration over the registration engine.
//!
//! Every operation runs as a short retryable unit: acquire the event's
//! exclusive lock, apply the engine commands against a working copy, and
//! commit by replacing the aggregate. A task that fails before commit has
//! no partial effect. Transient errors are retried with bounded backoff;
//! terminal errors force the registration to its failure status and emit a
//! failure notification; consistency violations surface loudly and are
//! never converted.

use crate::error::TaskError;
use crate::notify::{Notification, NotificationBroadcaster};
use crate::retry::RetryPolicy;
use crate::store::{AuditLog, EventStore, LockConfig};
use admit::{
    BumpReport, Command, CoreError, EngineContext, EventState, TransitionResult, apply,
    check_pool_counters,
};
use admit_audit::{Actor, AuditEvent, Cause};
use admit_domain::{
    DomainError, Event, EventId, GroupId, MembershipDirectory, Operation, PaymentStatus, Penalty,
    PenaltyConfig, PenaltyLedger, PoolId, Registration, RegistrationId, UserId,
};
use admit_payment::{PaymentGateway, WebhookEvent, WebhookOutcome, ensure_intent, match_webhook,
    reconcile_status};
use chrono::{DateTime, Utc};
use tokio::sync::{OwnedMutexGuard, RwLock};
use tracing::{debug, error, info, warn};

/// Definition of a pool created during event bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSpec {
    /// Human-readable pool name.
    pub name: String,
    /// Maximum admitted registrations. Zero means unlimited.
    pub capacity: u32,
    /// When the pool opens for registration.
    pub activation_date: DateTime<Utc>,
    /// Groups whose members may register through this pool.
    pub groups: Vec<GroupId>,
}

/// Drives the registration engine under per-event locking with retries,
/// notifications, audit recording, and the payment-intent lifecycle.
pub struct Orchestrator<G> {
    pub(crate) store: EventStore,
    audit: AuditLog,
    notifier: NotificationBroadcaster,
    memberships: RwLock<MembershipDirectory>,
    penalties: RwLock<PenaltyLedger>,
    penalty_config: PenaltyConfig,
    retry: RetryPolicy,
    gateway: G,
}

impl<G: PaymentGateway> Orchestrator<G> {
    /// Creates an orchestrator with default lock, retry, and penalty
    /// configuration.
    #[must_use]
    pub fn new(gateway: G) -> Self {
        Self {
            store: EventStore::new(LockConfig::default()),
            audit: AuditLog::new(),
            notifier: NotificationBroadcaster::new(),
            memberships: RwLock::new(MembershipDirectory::new()),
            penalties: RwLock::new(PenaltyLedger::new()),
            penalty_config: PenaltyConfig::default(),
            retry: RetryPolicy::default(),
            gateway,
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the lock configuration. Call before registering events.
    #[must_use]
    pub fn with_lock_config(mut self, config: LockConfig) -> Self {
        self.store = EventStore::new(config);
        self
    }

    /// Replaces the penalty configuration.
    #[must_use]
    pub fn with_penalty_config(mut self, config: PenaltyConfig) -> Self {
        self.penalty_config = config;
        self
    }

    /// The payment gateway this orchestrator drives.
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Subscribes to outcome notifications.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    /// A snapshot of all committed audit events.
    #[must_use]
    pub fn audit_log(&self) -> Vec<AuditEvent> {
        self.audit.events()
    }

    /// Replaces the resolved membership directory.
    pub async fn set_memberships(&self, directory: MembershipDirectory) {
        *self.memberships.write().await = directory;
    }

    /// Records a penalty against a user.
    pub async fn record_penalty(&self, penalty: Penalty) {
        self.penalties.write().await.record(penalty);
    }

    /// A read-only clone of an event aggregate.
    ///
    /// # Errors
    ///
    /// Returns an error if the event is unknown or its lock times out.
    pub async fn event_state(&self, event_id: EventId) -> Result<EventState, TaskError> {
        self.store.snapshot(event_id).await
    }

    /// Registers an event aggregate and bootstraps its pools.
    ///
    /// # Errors
    ///
    /// Returns an error if a pool definition is invalid.
    pub async fn add_event(
        &self,
        event: Event,
        pools: Vec<PoolSpec>,
        now: DateTime<Utc>,
    ) -> Result<(), TaskError> {
        let event_id = event.id;
        self.store.insert(EventState::new(event)).await;
        for spec in pools {
            let mut guard = self.store.lock(event_id).await?;
            self.apply_committed(
                &mut guard,
                vec![Command::CreatePool {
                    name: spec.name,
                    capacity: spec.capacity,
                    activation_date: spec.activation_date,
                    groups: spec.groups,
                }],
                now,
                Actor::system(),
                Cause::new(
                    format!("bootstrap-{event_id}"),
                    String::from("Event bootstrap"),
                ),
            )
            .await?;
        }
        Ok(())
    }

    /// Registers a user for an event: admits into an eligible pool or
    /// appends to the waiting list.
    ///
    /// Idempotent at the business-entity level: repeated calls for the
    /// same `(event, user)` yield the same single registration row.
    ///
    /// # Errors
    ///
    /// Transient errors are retried internally; the returned error is
    /// terminal (the row has been forced to its failure status) or fatal.
    pub async fn register(
        &self,
        event_id: EventId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Registration, TaskError> {
        let result = self
            .retry
            .run(TaskError::is_transient, || {
                self.register_once(event_id, user_id, now)
            })
            .await;
        match result {
            Ok(registration) => Ok(registration),
            Err(err) if err.is_fatal() => {
                error!(%event_id, %user_id, %err, "Fatal error during registration");
                Err(err)
            }
            Err(err) => {
                self.fail_operation(event_id, user_id, Operation::Register, now, &err)
                    .await;
                Err(err)
            }
        }
    }

    async fn register_once(
        &self,
        event_id: EventId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Registration, TaskError> {
        let mut guard = self.store.lock(event_id).await?;
        let actor = Actor::new(user_id.to_string(), String::from("user"));
        let cause = Cause::new(
            format!("register-{event_id}-{user_id}"),
            String::from("Registration request"),
        );
        self.apply_committed(
            &mut guard,
            vec![
                Command::MarkPending {
                    user_id,
                    op: Operation::Register,
                },
                Command::Register { user_id },
            ],
            now,
            actor,
            cause,
        )
        .await?;
        let registration = guard
            .registration_for_user(user_id)
            .cloned()
            .ok_or(TaskError::Engine(CoreError::DomainViolation(
                DomainError::RegistrationNotFoundForUser { user_id },
            )))?;
        let is_priced = guard.event.is_priced;
        drop(guard);

        info!(%event_id, %user_id, pool = ?registration.pool, "Registration committed");
        self.notifier.broadcast(&Notification::RegistrationSuccess {
            event_id,
            user_id,
            pool_id: registration.pool,
        });

        if registration.is_admitted() && is_priced {
            self.initiate_payment(event_id, user_id, now).await?;
            let state = self.store.snapshot(event_id).await?;
            if let Some(updated) = state.registration_for_user(user_id) {
                return Ok(updated.clone());
            }
        }
        Ok(registration)
    }

    /// Unregisters a registration: soft-marks the row, frees its slot, and
    /// promotes waiting registrants. A pending payment intent is canceled
    /// at the gateway.
    ///
    /// # Errors
    ///
    /// Transient errors are retried internally; the returned error is
    /// terminal (the row has been forced to its failure status) or fatal.
    pub async fn unregister(
        &self,
        event_id: EventId,
        registration_id: RegistrationId,
        now: DateTime<Utc>,
    ) -> Result<Registration, TaskError> {
        let user_id = {
            let state = self.store.snapshot(event_id).await?;
            state
                .registration(registration_id)
                .map(|registration| registration.user_id)
                .ok_or(TaskError::Engine(CoreError::DomainViolation(
                    DomainError::RegistrationNotFound { registration_id },
                )))?
        };

        let result = self
            .retry
            .run(TaskError::is_transient, || {
                self.unregister_once(event_id, registration_id, user_id, now)
            })
            .await;
        match result {
            Ok(registration) => Ok(registration),
            Err(err) if err.is_fatal() => {
                error!(%event_id, %registration_id, %err, "Fatal error during unregistration");
                Err(err)
            }
            Err(err) => {
                self.fail_operation(event_id, user_id, Operation::Unregister, now, &err)
                    .await;
                Err(err)
            }
        }
    }

    async fn unregister_once(
        &self,
        event_id: EventId,
        registration_id: RegistrationId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Registration, TaskError> {
        let mut guard = self.store.lock(event_id).await?;
        let actor = Actor::new(user_id.to_string(), String::from("user"));
        let cause = Cause::new(
            format!("unregister-{event_id}-{registration_id}"),
            String::from("Unregistration request"),
        );
        let transitions = self
            .apply_committed(
                &mut guard,
                vec![
                    Command::MarkPending {
                        user_id,
                        op: Operation::Unregister,
                    },
                    Command::Unregister { registration_id },
                ],
                now,
                actor,
                cause,
            )
            .await?;
        let bumps: Vec<BumpReport> = transitions
            .iter()
            .flat_map(|transition| transition.bumps.clone())
            .collect();
        let registration = guard
            .registration(registration_id)
            .cloned()
            .ok_or(TaskError::Engine(CoreError::DomainViolation(
                DomainError::RegistrationNotFound { registration_id },
            )))?;
        drop(guard);

        info!(%event_id, %user_id, bumps = bumps.len(), "Unregistration committed");
        self.notifier
            .broadcast(&Notification::UnregistrationSuccess { event_id, user_id });
        self.notify_bumps(event_id, &bumps);

        if registration.payment.status == PaymentStatus::Pending
            && let Some(intent_id) = registration.payment.intent_id.clone()
        {
            self.gateway.cancel_intent(&intent_id).await?;
            let mut guard = self.store.lock(event_id).await?;
            self.apply_committed(
                &mut guard,
                vec![Command::PaymentStatusChanged {
                    registration_id,
                    status: PaymentStatus::Canceled,
                }],
                now,
                Actor::system(),
                Cause::new(
                    format!("cancel-intent-{intent_id}"),
                    String::from("Intent canceled after unregistration"),
                ),
            )
            .await?;
            let updated = guard.registration(registration_id).cloned();
            drop(guard);
            self.notifier.broadcast(&Notification::PaymentOutcome {
                event_id,
                user_id,
                status: PaymentStatus::Canceled,
            });
            if let Some(updated) = updated {
                return Ok(updated);
            }
        }
        Ok(registration)
    }

    /// Administrative placement bypassing activation, penalty, and group
    /// gates.
    ///
    /// # Errors
    ///
    /// Returns a fatal error for a pool outside the event, a terminal
    /// error for a full target pool.
    pub async fn admin_register(
        &self,
        requester: UserId,
        event_id: EventId,
        user_id: UserId,
        pool_id: Option<PoolId>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Registration, TaskError> {
        let result = self
            .retry
            .run(TaskError::is_transient, || {
                self.admin_register_once(requester, event_id, user_id, pool_id, reason, now)
            })
            .await;
        if let Err(err) = &result {
            error!(%event_id, %user_id, %err, "Administrative registration failed");
        }
        result
    }

    async fn admin_register_once(
        &self,
        requester: UserId,
        event_id: EventId,
        user_id: UserId,
        pool_id: Option<PoolId>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Registration, TaskError> {
        let mut guard = self.store.lock(event_id).await?;
        let actor = Actor::new(requester.to_string(), String::from("admin"));
        let cause = Cause::new(
            format!("admin-register-{event_id}-{user_id}"),
            String::from(reason),
        );
        self.apply_committed(
            &mut guard,
            vec![Command::AdminRegister {
                requester,
                user_id,
                pool_id,
                reason: String::from(reason),
            }],
            now,
            actor,
            cause,
        )
        .await?;
        let registration = guard
            .registration_for_user(user_id)
            .cloned()
            .ok_or(TaskError::Engine(CoreError::DomainViolation(
                DomainError::RegistrationNotFoundForUser { user_id },
            )))?;
        drop(guard);
        self.notifier.broadcast(&Notification::RegistrationSuccess {
            event_id,
            user_id,
            pool_id: registration.pool,
        });
        Ok(registration)
    }

    /// Creates a pool on an existing event and promotes any waiting
    /// registrants into the new capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool definition is invalid.
    pub async fn create_pool(
        &self,
        event_id: EventId,
        spec: PoolSpec,
        now: DateTime<Utc>,
    ) -> Result<PoolId, TaskError> {
        let mut guard = self.store.lock(event_id).await?;
        let transitions = self
            .apply_committed(
                &mut guard,
                vec![Command::CreatePool {
                    name: spec.name,
                    capacity: spec.capacity,
                    activation_date: spec.activation_date,
                    groups: spec.groups,
                }],
                now,
                Actor::system(),
                Cause::new(format!("create-pool-{event_id}"), String::from("Pool created")),
            )
            .await?;
        let pool_id = guard
            .pools
            .last()
            .map(|pool| pool.id)
            .ok_or(TaskError::Engine(CoreError::DomainViolation(
                DomainError::InvalidPoolName(String::from("pool missing after creation")),
            )))?;
        let bumps: Vec<BumpReport> = transitions
            .iter()
            .flat_map(|transition| transition.bumps.clone())
            .collect();
        drop(guard);
        self.notify_bumps(event_id, &bumps);
        Ok(pool_id)
    }

    /// Changes a pool's capacity; growth promotes waiting registrants.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is unknown or would shrink below its
    /// admitted count.
    pub async fn update_pool_capacity(
        &self,
        event_id: EventId,
        pool_id: PoolId,
        capacity: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<BumpReport>, TaskError> {
        let mut guard = self.store.lock(event_id).await?;
        let transitions = self
            .apply_committed(
                &mut guard,
                vec![Command::UpdatePoolCapacity { pool_id, capacity }],
                now,
                Actor::system(),
                Cause::new(
                    format!("resize-pool-{pool_id}"),
                    String::from("Pool capacity changed"),
                ),
            )
            .await?;
        let bumps: Vec<BumpReport> = transitions
            .iter()
            .flat_map(|transition| transition.bumps.clone())
            .collect();
        drop(guard);
        self.notify_bumps(event_id, &bumps);
        Ok(bumps)
    }

    /// Deletes a pool that no registration references.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is unknown or still referenced.
    pub async fn delete_pool(
        &self,
        event_id: EventId,
        pool_id: PoolId,
        now: DateTime<Utc>,
    ) -> Result<(), TaskError> {
        let mut guard = self.store.lock(event_id).await?;
        self.apply_committed(
            &mut guard,
            vec![Command::DeletePool { pool_id }],
            now,
            Actor::system(),
            Cause::new(format!("delete-pool-{pool_id}"), String::from("Pool deleted")),
        )
        .await?;
        Ok(())
    }

    /// Re-runs the bump/rebalance scan against every open slot.
    /// Idempotent: with no capacity change since the last run, nothing
    /// happens.
    ///
    /// # Errors
    ///
    /// Returns an error if the event is unknown or the scan hits a broken
    /// invariant.
    pub async fn bump_on_pool_change(
        &self,
        event_id: EventId,
        now: DateTime<Utc>,
    ) -> Result<Vec<BumpReport>, TaskError> {
        let result = self
            .retry
            .run(TaskError::is_transient, || async {
                let mut guard = self.store.lock(event_id).await?;
                let transitions = self
                    .apply_committed(
                        &mut guard,
                        vec![Command::BumpOnPoolChange],
                        now,
                        Actor::system(),
                        Cause::new(
                            format!("bump-scan-{event_id}"),
                            String::from("Periodic capacity scan"),
                        ),
                    )
                    .await?;
                Ok::<Vec<TransitionResult>, TaskError>(transitions)
            })
            .await?;
        let bumps: Vec<BumpReport> = result
            .iter()
            .flat_map(|transition| transition.bumps.clone())
            .collect();
        self.notify_bumps(event_id, &bumps);
        Ok(bumps)
    }

    /// Verifies every pool counter against the live admitted count,
    /// alerting on divergence.
    ///
    /// This backs the periodic audit task. A mismatch is never silently
    /// corrected, since it indicates a concurrency bug.
    ///
    /// # Errors
    ///
    /// Returns an error describing the broken invariant.
    pub async fn audit_pool_counters(&self, event_id: EventId) -> Result<(), TaskError> {
        let state = self.store.snapshot(event_id).await?;
        match check_pool_counters(&state) {
            Ok(()) => Ok(()),
            Err(err) => {
                if let CoreError::CounterMismatch {
                    pool_id,
                    counter,
                    admitted,
                } = &err
                {
                    self.notifier.broadcast(&Notification::CounterMismatch {
                        event_id,
                        pool_id: *pool_id,
                        counter: *counter,
                        admitted: *admitted,
                    });
                }
                error!(%event_id, %err, "Aggregate consistency violation detected");
                Err(err.into())
            }
        }
    }

    /// Whether every pool counter equals its live admitted count.
    ///
    /// # Errors
    ///
    /// Returns an error if the event is unknown.
    pub async fn check_pool_counters_consistent(
        &self,
        event_id: EventId,
    ) -> Result<bool, TaskError> {
        match self.audit_pool_counters(event_id).await {
            Ok(()) => Ok(true),
            Err(TaskError::Engine(err)) if err.is_consistency_violation() => Ok(false),
            Err(other) => Err(other),
        }
    }

    /// Applies an inbound gateway webhook.
    ///
    /// Duplicate deliveries of the same outcome are absorbed; a webhook
    /// matching no registration is a hard error.
    ///
    /// # Errors
    ///
    /// Returns an error for unmatched or malformed webhooks.
    pub async fn handle_webhook(
        &self,
        event_id: EventId,
        webhook: &WebhookEvent,
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome, TaskError> {
        let mut guard = self.store.lock(event_id).await?;
        let outcome = match_webhook(webhook, event_id, &guard.registrations)?;
        match &outcome {
            WebhookOutcome::StatusChanged {
                registration_id,
                status,
            } => {
                let current = guard
                    .registration(*registration_id)
                    .map(|registration| (registration.payment.status, registration.user_id));
                if let Some((current_status, user_id)) = current {
                    if current_status == *status {
                        drop(guard);
                        debug!(external_id = %webhook.external_id, "Duplicate webhook delivery absorbed");
                    } else {
                        self.apply_committed(
                            &mut guard,
                            vec![Command::PaymentStatusChanged {
                                registration_id: *registration_id,
                                status: *status,
                            }],
                            now,
                            Actor::system(),
                            Cause::new(
                                format!("webhook-{}", webhook.external_id),
                                format!("Gateway event {}", webhook.event_type),
                            ),
                        )
                        .await?;
                        drop(guard);
                        self.notifier.broadcast(&Notification::PaymentOutcome {
                            event_id,
                            user_id,
                            status: *status,
                        });
                    }
                }
            }
            WebhookOutcome::Ignored { event_type } => {
                drop(guard);
                warn!(%event_id, event_type, "Webhook carried no local meaning");
            }
        }
        Ok(outcome)
    }

    /// Reconciles a registration's payment status against the gateway's
    /// view of its intent.
    ///
    /// # Errors
    ///
    /// Returns an error if the registration is unknown or the gateway
    /// cannot be reached after retries.
    pub async fn reconcile_payment(
        &self,
        event_id: EventId,
        registration_id: RegistrationId,
        now: DateTime<Utc>,
    ) -> Result<PaymentStatus, TaskError> {
        let state = self.store.snapshot(event_id).await?;
        let registration = state.registration(registration_id).ok_or(TaskError::Engine(
            CoreError::DomainViolation(DomainError::RegistrationNotFound { registration_id }),
        ))?;
        let Some(intent_id) = registration.payment.intent_id.clone() else {
            return Ok(registration.payment.status);
        };
        let current_status = registration.payment.status;
        let user_id = registration.user_id;

        let intent = self
            .retry
            .run(TaskError::is_transient, || {
                let intent_id = intent_id.clone();
                async move {
                    self.gateway
                        .retrieve_intent(&intent_id)
                        .await
                        .map_err(TaskError::from)
                }
            })
            .await?;

        let status = reconcile_status(&intent);
        if status != current_status {
            let mut guard = self.store.lock(event_id).await?;
            self.apply_committed(
                &mut guard,
                vec![Command::PaymentStatusChanged {
                    registration_id,
                    status,
                }],
                now,
                Actor::system(),
                Cause::new(
                    format!("reconcile-{intent_id}"),
                    String::from("Gateway reconciliation"),
                ),
            )
            .await?;
            drop(guard);
            self.notifier.broadcast(&Notification::PaymentOutcome {
                event_id,
                user_id,
                status,
            });
        }
        Ok(status)
    }

    /// Applies engine commands against a working copy and commits them
    /// atomically by replacing the aggregate. Audit events are recorded
    /// only after the commit.
    async fn apply_committed(
        &self,
        guard: &mut OwnedMutexGuard<EventState>,
        commands: Vec<Command>,
        now: DateTime<Utc>,
        actor: Actor,
        cause: Cause,
    ) -> Result<Vec<TransitionResult>, TaskError> {
        let memberships = self.memberships.read().await;
        let penalties = self.penalties.read().await;
        let ctx = EngineContext {
            now,
            memberships: &memberships,
            penalties: &penalties,
            penalty_config: &self.penalty_config,
        };
        let mut state: EventState = (**guard).clone();
        let mut transitions: Vec<TransitionResult> = Vec::new();
        for command in commands {
            let transition = apply(&state, command, &ctx, actor.clone(), cause.clone())?;
            state = transition.new_state.clone();
            transitions.push(transition);
        }
        **guard = state;
        for transition in &transitions {
            self.audit.push(transition.audit_event.clone());
        }
        Ok(transitions)
    }

    async fn initiate_payment(
        &self,
        event_id: EventId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), TaskError> {
        let state = self.store.snapshot(event_id).await?;
        let Some(registration) = state.registration_for_user(user_id) else {
            return Ok(());
        };
        if registration.payment.status == PaymentStatus::Pending
            || registration.payment.status.is_terminal()
        {
            return Ok(());
        }

        let intent = ensure_intent(&self.gateway, &state.event, registration).await?;

        let mut guard = self.store.lock(event_id).await?;
        let needs_recording = guard
            .registration_for_user(user_id)
            .is_some_and(|registration| {
                matches!(
                    registration.payment.status,
                    PaymentStatus::None | PaymentStatus::Failure
                )
            });
        if needs_recording {
            let registration_id = guard
                .registration_for_user(user_id)
                .map(|registration| registration.id)
                .ok_or(TaskError::Engine(CoreError::DomainViolation(
                    DomainError::RegistrationNotFoundForUser { user_id },
                )))?;
            self.apply_committed(
                &mut guard,
                vec![Command::PaymentInitiated {
                    registration_id,
                    intent_id: intent.id.clone(),
                    amount: intent.amount,
                }],
                now,
                Actor::system(),
                Cause::new(
                    format!("payment-intent-{}", intent.id),
                    String::from("Payment intent created"),
                ),
            )
            .await?;
        }
        drop(guard);
        self.notifier.broadcast(&Notification::PaymentInitiated {
            event_id,
            user_id,
            intent_id: intent.id,
            amount: intent.amount,
        });
        Ok(())
    }

    /// Forces the row to its failure status after a terminal error or
    /// exhausted retries, and emits the user-visible failure notification.
    async fn fail_operation(
        &self,
        event_id: EventId,
        user_id: UserId,
        op: Operation,
        now: DateTime<Utc>,
        err: &TaskError,
    ) {
        if !matches!(err, TaskError::UnknownEvent(_)) {
            let forced: Result<(), TaskError> = async {
                let mut guard = self.store.lock(event_id).await?;
                self.apply_committed(
                    &mut guard,
                    vec![
                        Command::MarkPending { user_id, op },
                        Command::MarkFailure { user_id, op },
                    ],
                    now,
                    Actor::system(),
                    Cause::new(
                        format!("force-failure-{event_id}-{user_id}"),
                        format!("Operation failed: {err}"),
                    ),
                )
                .await?;
                Ok(())
            }
            .await;
            if let Err(force_err) = forced {
                warn!(%event_id, %user_id, %force_err, "Could not force failure status");
            }
        }

        error!(%event_id, %user_id, %err, "Task failed terminally");
        let reason = err.to_string();
        let notification = match op {
            Operation::Register => Notification::RegistrationFailure {
                event_id,
                user_id,
                reason,
            },
            Operation::Unregister => Notification::UnregistrationFailure {
                event_id,
                user_id,
                reason,
            },
        };
        self.notifier.broadcast(&notification);
    }

    fn notify_bumps(&self, event_id: EventId, bumps: &[BumpReport]) {
        for bump in bumps {
            self.notifier.broadcast(&Notification::UserBumped {
                event_id,
                user_id: bump.user_id,
                pool_id: bump.into_pool,
            });
        }
    }
}
