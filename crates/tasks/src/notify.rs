// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Fire-and-forget notification broadcasting.
//!
//! Notifications are emitted only after a transition has committed, never
//! for a rolled-back one, and carry no delivery guarantee: with no
//! subscriber they are dropped.

use admit_domain::{EventId, PaymentStatus, PoolId, UserId};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

const NOTIFICATION_BUFFER_SIZE: usize = 256;

/// A message for external listeners about a committed outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A register request succeeded (admitted or waiting).
    RegistrationSuccess {
        /// The event.
        event_id: EventId,
        /// The registered user.
        user_id: UserId,
        /// The admitting pool, or `None` for the waiting list.
        pool_id: Option<PoolId>,
    },
    /// A register request failed terminally.
    RegistrationFailure {
        /// The event.
        event_id: EventId,
        /// The affected user.
        user_id: UserId,
        /// Why the registration failed.
        reason: String,
    },
    /// An unregister request succeeded.
    UnregistrationSuccess {
        /// The event.
        event_id: EventId,
        /// The unregistered user.
        user_id: UserId,
    },
    /// An unregister request failed terminally.
    UnregistrationFailure {
        /// The event.
        event_id: EventId,
        /// The affected user.
        user_id: UserId,
        /// Why the unregistration failed.
        reason: String,
    },
    /// A waiting registrant was promoted into a pool.
    UserBumped {
        /// The event.
        event_id: EventId,
        /// The promoted user.
        user_id: UserId,
        /// The admitting pool.
        pool_id: PoolId,
    },
    /// A payment intent was created for a registration.
    PaymentInitiated {
        /// The event.
        event_id: EventId,
        /// The paying user.
        user_id: UserId,
        /// The gateway intent identifier.
        intent_id: String,
        /// Amount in minor currency units.
        amount: i64,
    },
    /// A payment reached an outcome.
    PaymentOutcome {
        /// The event.
        event_id: EventId,
        /// The paying user.
        user_id: UserId,
        /// The resulting payment status.
        status: PaymentStatus,
    },
    /// A pool counter diverged from the live admitted count. Alerting.
    CounterMismatch {
        /// The event.
        event_id: EventId,
        /// The diverged pool.
        pool_id: PoolId,
        /// The stored counter value.
        counter: u32,
        /// The recomputed admitted count.
        admitted: u32,
    },
}

/// Broadcaster for registration outcome notifications.
///
/// A lightweight wrapper around `tokio::sync::broadcast` that lets any
/// number of listeners observe committed outcomes.
#[derive(Debug, Clone)]
pub struct NotificationBroadcaster {
    tx: broadcast::Sender<Notification>,
}

impl NotificationBroadcaster {
    /// Creates a new broadcaster.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(NOTIFICATION_BUFFER_SIZE);
        Self { tx }
    }

    /// Broadcasts a notification to all subscribers.
    ///
    /// If no subscriber is connected, the notification is silently
    /// dropped. This is non-blocking.
    pub fn broadcast(&self, notification: &Notification) {
        match self.tx.send(notification.clone()) {
            Ok(count) => {
                debug!(?notification, receivers = count, "Broadcast notification");
            }
            Err(_) => {
                // No receivers, which is fine
                debug!(?notification, "No receivers for notification");
            }
        }
    }

    /// Subscribes to the notification stream.
    ///
    /// Notifications sent before subscription are not received.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for NotificationBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
