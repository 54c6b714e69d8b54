// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Inbound gateway webhook events.
//!
//! Webhooks are matched to registrations through the `(event, user)`
//! identifiers embedded in the intent metadata. A webhook that matches no
//! registration is a hard error, never silently dropped: it means the
//! gateway and the engine disagree about what exists. Unrecognized event
//! types are tolerated with a warning, since gateways add types over time.

use crate::error::PaymentError;
use crate::gateway::IntentMetadata;
use admit_domain::{EventId, PaymentStatus, Registration, RegistrationId};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// An asynchronous event delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// The gateway's identifier for this delivery.
    pub external_id: String,
    /// The gateway's event type string.
    pub event_type: String,
    /// The intent the event refers to.
    pub intent_id: String,
    /// Amount in minor currency units, when the gateway includes it.
    pub amount: Option<i64>,
    /// Correlation identifiers copied from the intent.
    pub metadata: IntentMetadata,
}

/// The interpreted result of a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The payment sub-state of a registration changes.
    StatusChanged {
        /// The matched registration.
        registration_id: RegistrationId,
        /// The new payment status.
        status: PaymentStatus,
    },
    /// The event type carries no local meaning and was skipped.
    Ignored {
        /// The skipped event type.
        event_type: String,
    },
}

/// Matches a webhook to a registration of the given event.
///
/// # Errors
///
/// Returns an error if the webhook is addressed to a different event, or
/// if no registration exists for the user named in the metadata.
pub fn match_webhook(
    webhook: &WebhookEvent,
    event_id: EventId,
    registrations: &[Registration],
) -> Result<WebhookOutcome, PaymentError> {
    if webhook.metadata.event_id != event_id {
        return Err(PaymentError::MalformedWebhook {
            external_id: webhook.external_id.clone(),
            reason: format!(
                "addressed to event {}, routed to event {event_id}",
                webhook.metadata.event_id
            ),
        });
    }

    let status = match webhook.event_type.as_str() {
        "intent.succeeded" => PaymentStatus::Success,
        "intent.payment_failed" => PaymentStatus::Failure,
        "intent.canceled" => PaymentStatus::Canceled,
        other => {
            warn!(event_type = other, external_id = %webhook.external_id, "Ignoring unrecognized webhook type");
            return Ok(WebhookOutcome::Ignored {
                event_type: webhook.event_type.clone(),
            });
        }
    };

    let registration = registrations
        .iter()
        .find(|reg| reg.user_id == webhook.metadata.user_id)
        .ok_or_else(|| PaymentError::NoMatchingRegistration {
            external_id: webhook.external_id.clone(),
            event_id,
            user_id: webhook.metadata.user_id,
        })?;

    Ok(WebhookOutcome::StatusChanged {
        registration_id: registration.id,
        status,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use admit_domain::UserId;
    use chrono::{TimeZone, Utc};

    fn registration(id: i64, user: i64) -> Registration {
        Registration::new(
            RegistrationId::new(id),
            UserId::new(user),
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().unwrap(),
        )
    }

    fn webhook(event_type: &str, event: i64, user: i64) -> WebhookEvent {
        WebhookEvent {
            external_id: String::from("evt_1"),
            event_type: String::from(event_type),
            intent_id: String::from("in_1"),
            amount: Some(25_000),
            metadata: IntentMetadata {
                event_id: EventId::new(event),
                user_id: UserId::new(user),
            },
        }
    }

    #[test]
    fn test_success_webhook_matches_registration() {
        let rows = vec![registration(1, 7), registration(2, 8)];
        let outcome =
            match_webhook(&webhook("intent.succeeded", 1, 8), EventId::new(1), &rows).unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::StatusChanged {
                registration_id: RegistrationId::new(2),
                status: PaymentStatus::Success,
            }
        );
    }

    #[test]
    fn test_failure_and_cancel_webhooks_map_one_to_one() {
        let rows = vec![registration(1, 7)];
        let failed =
            match_webhook(&webhook("intent.payment_failed", 1, 7), EventId::new(1), &rows)
                .unwrap();
        assert_eq!(
            failed,
            WebhookOutcome::StatusChanged {
                registration_id: RegistrationId::new(1),
                status: PaymentStatus::Failure,
            }
        );

        let canceled =
            match_webhook(&webhook("intent.canceled", 1, 7), EventId::new(1), &rows).unwrap();
        assert_eq!(
            canceled,
            WebhookOutcome::StatusChanged {
                registration_id: RegistrationId::new(1),
                status: PaymentStatus::Canceled,
            }
        );
    }

    #[test]
    fn test_unmatched_webhook_is_a_hard_error() {
        let rows = vec![registration(1, 7)];
        let result = match_webhook(&webhook("intent.succeeded", 1, 99), EventId::new(1), &rows);
        assert_eq!(
            result,
            Err(PaymentError::NoMatchingRegistration {
                external_id: String::from("evt_1"),
                event_id: EventId::new(1),
                user_id: UserId::new(99),
            })
        );
    }

    #[test]
    fn test_webhook_for_wrong_event_is_malformed() {
        let rows = vec![registration(1, 7)];
        let result = match_webhook(&webhook("intent.succeeded", 2, 7), EventId::new(1), &rows);
        assert!(matches!(
            result,
            Err(PaymentError::MalformedWebhook { .. })
        ));
    }

    #[test]
    fn test_webhook_payload_round_trips_through_json() {
        let payload = r#"{
            "external_id": "evt_1",
            "event_type": "intent.succeeded",
            "intent_id": "in_1",
            "amount": 25000,
            "metadata": { "event_id": 1, "user_id": 7 }
        }"#;
        let parsed: WebhookEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed, webhook("intent.succeeded", 1, 7));
    }

    #[test]
    fn test_unknown_event_type_is_ignored_not_failed() {
        let rows = vec![registration(1, 7)];
        let outcome =
            match_webhook(&webhook("intent.created", 1, 7), EventId::new(1), &rows).unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event_type: String::from("intent.created"),
            }
        );
    }
}
