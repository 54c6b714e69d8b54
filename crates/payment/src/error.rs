// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use admit_domain::{EventId, UserId};
use thiserror::Error;

/// Errors raised by the payment gateway boundary.
///
/// Transient errors (timeouts, gateway unavailability) are safe to retry;
/// everything else is terminal and maps onto the payment state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// The gateway did not answer in time.
    #[error("payment gateway timed out: {0}")]
    GatewayTimeout(String),
    /// The gateway refused the connection or is down.
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
    /// The gateway does not know the referenced intent.
    #[error("unknown payment intent {0}")]
    UnknownIntent(String),
    /// The gateway declined the payment.
    #[error("payment declined for intent {intent_id}: {reason}")]
    Declined {
        /// The declined intent.
        intent_id: String,
        /// The gateway's stated reason.
        reason: String,
    },
    /// Intent creation was requested for an unpriced event.
    #[error("event {event_id} is not priced")]
    EventNotPriced {
        /// The unpriced event.
        event_id: EventId,
    },
    /// A webhook matched no registration. This is a hard error: it
    /// indicates state drift between the gateway and the engine.
    #[error("webhook {external_id} matches no registration for event {event_id}, user {user_id}")]
    NoMatchingRegistration {
        /// The gateway's event identifier.
        external_id: String,
        /// The event named in the intent metadata.
        event_id: EventId,
        /// The user named in the intent metadata.
        user_id: UserId,
    },
    /// A webhook payload could not be interpreted.
    #[error("malformed webhook {external_id}: {reason}")]
    MalformedWebhook {
        /// The gateway's event identifier.
        external_id: String,
        /// What was wrong with the payload.
        reason: String,
    },
}

impl PaymentError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::GatewayTimeout(_) | Self::GatewayUnavailable(_))
    }
}
