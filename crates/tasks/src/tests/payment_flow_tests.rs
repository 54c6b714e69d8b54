// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::helpers::{EVENT, at, drain, setup, user};
use crate::{Notification, TaskError};
use admit_domain::{PaymentStatus, UserId};
use admit_payment::{
    GatewayIntentStatus, IntentMetadata, PaymentError, PaymentGateway, WebhookEvent,
    WebhookOutcome,
};

fn webhook(event_type: &str, user_id: i64) -> WebhookEvent {
    WebhookEvent {
        external_id: format!("evt-{event_type}-{user_id}"),
        event_type: String::from(event_type),
        intent_id: String::from("in_1"),
        amount: Some(25_000),
        metadata: IntentMetadata {
            event_id: EVENT,
            user_id: UserId::new(user_id),
        },
    }
}

#[tokio::test]
async fn test_admission_on_priced_event_creates_intent() {
    let orchestrator = setup(2, 2, true).await;
    let mut rx = orchestrator.subscribe();

    let registration = orchestrator.register(EVENT, user(1), at(9)).await.unwrap();

    assert_eq!(registration.payment.status, PaymentStatus::Pending);
    assert_eq!(registration.payment.amount, Some(25_000));
    assert!(registration.payment.intent_id.is_some());
    assert_eq!(orchestrator.gateway().intent_count(), 1);

    let notifications = drain(&mut rx);
    assert!(notifications.iter().any(|notification| matches!(
        notification,
        Notification::PaymentInitiated { user_id, amount: 25_000, .. } if *user_id == user(1)
    )));
}

#[tokio::test]
async fn test_waiting_list_placement_creates_no_intent() {
    let orchestrator = setup(1, 1, true).await;
    orchestrator.register(EVENT, user(1), at(9)).await.unwrap();
    assert_eq!(orchestrator.gateway().intent_count(), 1);

    let waiting = orchestrator.register(EVENT, user(3), at(10)).await.unwrap();
    assert!(waiting.is_waiting());
    assert_eq!(waiting.payment.status, PaymentStatus::None);
    assert_eq!(orchestrator.gateway().intent_count(), 1);
}

#[tokio::test]
async fn test_transient_gateway_failure_never_double_charges() {
    let orchestrator = setup(2, 2, true).await;
    orchestrator.gateway().fail_next_creates(1);

    let registration = orchestrator.register(EVENT, user(1), at(9)).await.unwrap();

    assert_eq!(registration.payment.status, PaymentStatus::Pending);
    // Two create calls were observed, but the idempotency key collapsed
    // them onto a single intent.
    assert_eq!(orchestrator.gateway().create_calls(), 2);
    assert_eq!(orchestrator.gateway().intent_count(), 1);

    let state = orchestrator.event_state(EVENT).await.unwrap();
    assert_eq!(state.registrations.len(), 1);
}

#[tokio::test]
async fn test_success_webhook_resolves_payment() {
    let orchestrator = setup(2, 2, true).await;
    let registration = orchestrator.register(EVENT, user(1), at(9)).await.unwrap();
    let intent_id = registration.payment.intent_id.unwrap();
    orchestrator
        .gateway()
        .settle(&intent_id, GatewayIntentStatus::Succeeded);

    let mut rx = orchestrator.subscribe();
    let outcome = orchestrator
        .handle_webhook(EVENT, &webhook("intent.succeeded", 1), at(10))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::StatusChanged {
            registration_id: registration.id,
            status: PaymentStatus::Success,
        }
    );

    let state = orchestrator.event_state(EVENT).await.unwrap();
    assert_eq!(
        state.registration_for_user(user(1)).unwrap().payment.status,
        PaymentStatus::Success
    );

    let notifications = drain(&mut rx);
    assert_eq!(
        notifications,
        vec![Notification::PaymentOutcome {
            event_id: EVENT,
            user_id: user(1),
            status: PaymentStatus::Success,
        }]
    );
}

#[tokio::test]
async fn test_duplicate_webhook_delivery_is_absorbed() {
    let orchestrator = setup(2, 2, true).await;
    orchestrator.register(EVENT, user(1), at(9)).await.unwrap();

    orchestrator
        .handle_webhook(EVENT, &webhook("intent.succeeded", 1), at(10))
        .await
        .unwrap();

    // At-least-once delivery: the second copy must not error or emit a
    // second outcome notification.
    let mut rx = orchestrator.subscribe();
    orchestrator
        .handle_webhook(EVENT, &webhook("intent.succeeded", 1), at(10))
        .await
        .unwrap();
    assert!(drain(&mut rx).is_empty());

    let state = orchestrator.event_state(EVENT).await.unwrap();
    assert_eq!(
        state.registration_for_user(user(1)).unwrap().payment.status,
        PaymentStatus::Success
    );
}

#[tokio::test]
async fn test_unmatched_webhook_is_a_hard_error() {
    let orchestrator = setup(2, 2, true).await;
    orchestrator.register(EVENT, user(1), at(9)).await.unwrap();

    let result = orchestrator
        .handle_webhook(EVENT, &webhook("intent.succeeded", 99), at(10))
        .await;
    assert!(matches!(
        result,
        Err(TaskError::Payment(PaymentError::NoMatchingRegistration { .. }))
    ));
}

#[tokio::test]
async fn test_unknown_webhook_type_is_ignored() {
    let orchestrator = setup(2, 2, true).await;
    orchestrator.register(EVENT, user(1), at(9)).await.unwrap();

    let outcome = orchestrator
        .handle_webhook(EVENT, &webhook("intent.created", 1), at(10))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::Ignored {
            event_type: String::from("intent.created"),
        }
    );
}

#[tokio::test]
async fn test_unregister_cancels_pending_intent() {
    let orchestrator = setup(2, 2, true).await;
    let registration = orchestrator.register(EVENT, user(1), at(9)).await.unwrap();
    let intent_id = registration.payment.intent_id.clone().unwrap();

    let mut rx = orchestrator.subscribe();
    let unregistered = orchestrator
        .unregister(EVENT, registration.id, at(10))
        .await
        .unwrap();

    assert_eq!(unregistered.payment.status, PaymentStatus::Canceled);
    let intent = orchestrator.gateway().retrieve_intent(&intent_id).await.unwrap();
    assert_eq!(intent.status, GatewayIntentStatus::Canceled);

    let notifications = drain(&mut rx);
    assert!(notifications.iter().any(|notification| matches!(
        notification,
        Notification::PaymentOutcome { status: PaymentStatus::Canceled, .. }
    )));
}

#[tokio::test]
async fn test_reconcile_pulls_gateway_view() {
    let orchestrator = setup(2, 2, true).await;
    let registration = orchestrator.register(EVENT, user(1), at(9)).await.unwrap();
    let intent_id = registration.payment.intent_id.unwrap();

    // Gateway settles the payment, but the webhook never arrives.
    orchestrator
        .gateway()
        .settle(&intent_id, GatewayIntentStatus::Succeeded);

    let status = orchestrator
        .reconcile_payment(EVENT, registration.id, at(11))
        .await
        .unwrap();
    assert_eq!(status, PaymentStatus::Success);

    let state = orchestrator.event_state(EVENT).await.unwrap();
    assert_eq!(
        state.registration_for_user(user(1)).unwrap().payment.status,
        PaymentStatus::Success
    );
}

#[tokio::test]
async fn test_reconcile_without_intent_reports_current_status() {
    let orchestrator = setup(1, 1, true).await;
    orchestrator.register(EVENT, user(1), at(9)).await.unwrap();
    let waiting = orchestrator.register(EVENT, user(3), at(10)).await.unwrap();

    let status = orchestrator
        .reconcile_payment(EVENT, waiting.id, at(11))
        .await
        .unwrap();
    assert_eq!(status, PaymentStatus::None);
}
