// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The payment gateway boundary.
//!
//! The engine drives a binary-outcome state machine from an external
//! gateway. Intent metadata embeds the `(event, user)` pair because no
//! other reliable foreign key exists at this boundary; webhooks are matched
//! back to registrations through it.

use crate::error::PaymentError;
use admit_domain::{EventId, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Correlation identifiers embedded in every intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentMetadata {
    /// The event the payment belongs to.
    pub event_id: EventId,
    /// The paying user.
    pub user_id: UserId,
}

/// A request to create a payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIntentRequest {
    /// Caller-supplied token; reusing it across retries guarantees the
    /// gateway creates at most one intent.
    pub idempotency_key: String,
    /// Amount in minor currency units.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Correlation identifiers.
    pub metadata: IntentMetadata,
}

/// The gateway's view of an intent's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayIntentStatus {
    /// The intent exists and awaits completion.
    Processing,
    /// The payment went through.
    Succeeded,
    /// The payment failed.
    Failed,
    /// The intent was canceled.
    Canceled,
}

/// A payment intent as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    /// The gateway's intent identifier.
    pub id: String,
    /// Amount in minor currency units.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// The gateway's view of the intent.
    pub status: GatewayIntentStatus,
    /// Correlation identifiers.
    pub metadata: IntentMetadata,
}

/// The external payment gateway client.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates an intent, deduplicated by the request's idempotency key.
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<Intent, PaymentError>;

    /// Fetches the gateway's current view of an intent.
    async fn retrieve_intent(&self, intent_id: &str) -> Result<Intent, PaymentError>;

    /// Cancels an intent that has not completed.
    async fn cancel_intent(&self, intent_id: &str) -> Result<Intent, PaymentError>;
}

#[derive(Debug, Default)]
struct StubState {
    intents: HashMap<String, Intent>,
    by_key: HashMap<String, String>,
    next_id: u64,
    create_calls: u64,
    fail_creates: u32,
}

/// In-memory gateway double for tests and local development.
///
/// Honors idempotency keys the way a real gateway does and can be told to
/// fail the next `n` intent creations with a transient timeout.
#[derive(Debug, Default)]
pub struct StubGateway {
    state: Mutex<StubState>,
}

impl StubGateway {
    /// Creates an empty stub gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // The stub never panics while holding the lock, so poisoning cannot
    // occur outside an already-failing test.
    #[allow(clippy::unwrap_used)]
    fn locked(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap()
    }

    /// Makes the next `n` `create_intent` calls fail with a timeout.
    pub fn fail_next_creates(&self, n: u32) {
        self.locked().fail_creates = n;
    }

    /// Number of `create_intent` calls observed, including failed ones.
    #[must_use]
    pub fn create_calls(&self) -> u64 {
        self.locked().create_calls
    }

    /// Number of distinct intents the gateway holds.
    #[must_use]
    pub fn intent_count(&self) -> usize {
        self.locked().intents.len()
    }

    /// Moves an intent to the given status, simulating gateway-side
    /// settlement.
    pub fn settle(&self, intent_id: &str, status: GatewayIntentStatus) {
        if let Some(intent) = self.locked().intents.get_mut(intent_id) {
            intent.status = status;
        }
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<Intent, PaymentError> {
        let mut state = self.locked();
        state.create_calls += 1;
        if state.fail_creates > 0 {
            state.fail_creates -= 1;
            return Err(PaymentError::GatewayTimeout(String::from(
                "stub gateway timeout",
            )));
        }
        if let Some(existing_id) = state.by_key.get(&request.idempotency_key) {
            let existing_id = existing_id.clone();
            if let Some(intent) = state.intents.get(&existing_id) {
                return Ok(intent.clone());
            }
        }
        state.next_id += 1;
        let intent = Intent {
            id: format!("in_{}", state.next_id),
            amount: request.amount,
            currency: request.currency,
            status: GatewayIntentStatus::Processing,
            metadata: request.metadata,
        };
        state
            .by_key
            .insert(request.idempotency_key, intent.id.clone());
        state.intents.insert(intent.id.clone(), intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<Intent, PaymentError> {
        self.locked()
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| PaymentError::UnknownIntent(intent_id.to_string()))
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<Intent, PaymentError> {
        let mut state = self.locked();
        match state.intents.get_mut(intent_id) {
            Some(intent) => {
                intent.status = GatewayIntentStatus::Canceled;
                Ok(intent.clone())
            }
            None => Err(PaymentError::UnknownIntent(intent_id.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(key: &str) -> CreateIntentRequest {
        CreateIntentRequest {
            idempotency_key: String::from(key),
            amount: 25_000,
            currency: String::from("usd"),
            metadata: IntentMetadata {
                event_id: EventId::new(1),
                user_id: UserId::new(7),
            },
        }
    }

    #[tokio::test]
    async fn test_idempotency_key_deduplicates_creates() {
        let gateway = StubGateway::new();

        let first = gateway.create_intent(request("reg-1-7")).await.unwrap();
        let second = gateway.create_intent(request("reg-1-7")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(gateway.intent_count(), 1);
        assert_eq!(gateway.create_calls(), 2);
    }

    #[tokio::test]
    async fn test_distinct_keys_create_distinct_intents() {
        let gateway = StubGateway::new();

        let first = gateway.create_intent(request("reg-1-7")).await.unwrap();
        let second = gateway.create_intent(request("reg-1-8")).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(gateway.intent_count(), 2);
    }

    #[tokio::test]
    async fn test_fail_next_creates_is_transient_then_recovers() {
        let gateway = StubGateway::new();
        gateway.fail_next_creates(1);

        let err = gateway.create_intent(request("reg-1-7")).await.unwrap_err();
        assert!(err.is_transient());

        let intent = gateway.create_intent(request("reg-1-7")).await.unwrap();
        assert_eq!(intent.status, GatewayIntentStatus::Processing);
    }

    #[tokio::test]
    async fn test_cancel_and_retrieve() {
        let gateway = StubGateway::new();
        let intent = gateway.create_intent(request("reg-1-7")).await.unwrap();

        gateway.settle(&intent.id, GatewayIntentStatus::Succeeded);
        let retrieved = gateway.retrieve_intent(&intent.id).await.unwrap();
        assert_eq!(retrieved.status, GatewayIntentStatus::Succeeded);

        let canceled = gateway.cancel_intent(&intent.id).await.unwrap();
        assert_eq!(canceled.status, GatewayIntentStatus::Canceled);

        let missing = gateway.retrieve_intent("in_999").await;
        assert_eq!(
            missing,
            Err(PaymentError::UnknownIntent(String::from("in_999")))
        );
    }
}
