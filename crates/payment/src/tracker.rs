// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Intent lifecycle decisions.
//!
//! The idempotency key is derived from `(event, user)` and reused across
//! retries, so re-invocation never double-charges. Reconciliation maps the
//! gateway's view of an intent onto the local payment status.

use crate::error::PaymentError;
use crate::gateway::{
    CreateIntentRequest, GatewayIntentStatus, Intent, IntentMetadata, PaymentGateway,
};
use admit_domain::{Event, EventId, PaymentStatus, Registration, UserId};

/// Currency used for intents until per-event currencies exist.
pub const DEFAULT_CURRENCY: &str = "usd";

/// The deterministic idempotency key for a registration's payment.
#[must_use]
pub fn idempotency_key(event_id: EventId, user_id: UserId) -> String {
    format!("registration-{event_id}-{user_id}")
}

/// Builds the intent-creation request for a registration on a priced
/// event.
///
/// # Errors
///
/// Returns an error if the event is not priced.
pub fn intent_request(
    event: &Event,
    registration: &Registration,
) -> Result<CreateIntentRequest, PaymentError> {
    if !event.is_priced {
        return Err(PaymentError::EventNotPriced { event_id: event.id });
    }
    Ok(CreateIntentRequest {
        idempotency_key: idempotency_key(event.id, registration.user_id),
        amount: event.price,
        currency: String::from(DEFAULT_CURRENCY),
        metadata: IntentMetadata {
            event_id: event.id,
            user_id: registration.user_id,
        },
    })
}

/// Maps the gateway's view of an intent onto the local payment status.
#[must_use]
pub const fn reconcile_status(intent: &Intent) -> PaymentStatus {
    match intent.status {
        GatewayIntentStatus::Processing => PaymentStatus::Pending,
        GatewayIntentStatus::Succeeded => PaymentStatus::Success,
        GatewayIntentStatus::Failed => PaymentStatus::Failure,
        GatewayIntentStatus::Canceled => PaymentStatus::Canceled,
    }
}

/// Returns the registration's intent, creating it at the gateway if none
/// exists yet. Safe to call repeatedly: creation is deduplicated by the
/// idempotency key and an existing intent is retrieved instead.
///
/// # Errors
///
/// Returns an error if the event is not priced or the gateway call fails.
pub async fn ensure_intent<G: PaymentGateway>(
    gateway: &G,
    event: &Event,
    registration: &Registration,
) -> Result<Intent, PaymentError> {
    match &registration.payment.intent_id {
        Some(intent_id) => gateway.retrieve_intent(intent_id).await,
        None => {
            let request = intent_request(event, registration)?;
            gateway.create_intent(request).await
        }
    }
}
